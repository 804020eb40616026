//! Payment gateway collaborator
//!
//! Deposits enter through an external crypto-payment provider: the engine
//! asks it for an invoice URL, the player pays out-of-band, and the
//! provider's webhook eventually confirms the credit. Only the trait and
//! a simulated provider live here; the ledger credit itself goes through
//! the settlement coordinator's deposit path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("provider error: {0}")]
    Provider(String),
}

/// Invoice handed to the player for an off-platform payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: String,
    pub account_id: String,
    pub currency: String,
    pub pay_url: String,
    pub created_at: DateTime<Utc>,
}

/// External payment provider contract
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_invoice(&self, account_id: &str, currency: &str)
        -> Result<Invoice, PaymentError>;

    fn supported_currencies(&self) -> Vec<String>;
}

/// Stand-in provider for development and tests
pub struct SimulatedGateway {
    base_url: String,
    currencies: Vec<String>,
}

impl SimulatedGateway {
    pub fn new(base_url: impl Into<String>, currencies: Vec<String>) -> Self {
        Self {
            base_url: base_url.into(),
            currencies,
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn create_invoice(
        &self,
        account_id: &str,
        currency: &str,
    ) -> Result<Invoice, PaymentError> {
        if !self.currencies.iter().any(|c| c.eq_ignore_ascii_case(currency)) {
            return Err(PaymentError::UnsupportedCurrency(currency.to_string()));
        }

        let invoice_id = Uuid::new_v4().to_string();
        Ok(Invoice {
            invoice_id: invoice_id.clone(),
            account_id: account_id.to_string(),
            currency: currency.to_uppercase(),
            pay_url: format!("{}/invoice/{}", self.base_url, invoice_id),
            created_at: Utc::now(),
        })
    }

    fn supported_currencies(&self) -> Vec<String> {
        self.currencies.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> SimulatedGateway {
        SimulatedGateway::new(
            "https://pay.example.test",
            vec!["BTC".to_string(), "USDT".to_string()],
        )
    }

    #[tokio::test]
    async fn test_invoice_for_supported_currency() {
        let invoice = gateway()
            .create_invoice("acct-1", "btc")
            .await
            .expect("invoice failed");
        assert_eq!(invoice.currency, "BTC");
        assert!(invoice.pay_url.contains(&invoice.invoice_id));
    }

    #[tokio::test]
    async fn test_unsupported_currency_rejected() {
        let err = gateway().create_invoice("acct-1", "DOGE").await.unwrap_err();
        assert!(matches!(err, PaymentError::UnsupportedCurrency(_)));
    }
}
