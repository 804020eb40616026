//! VRF-backed random outcome source
//!
//! Every game draws from the same source: a sr25519 VRF signature over a
//! deterministic input message, hashed to 32 outcome bytes. The outcome
//! bytes seed a ChaCha-based generator (`StdRng`) from which the rule
//! modules derive rolls, subsets, and weighted picks without modulo bias.
//! Anyone holding the bundle can re-verify the proof and recompute the
//! outcome offline.

use crate::errors::{EngineError, EngineResult};
use crate::games::GameKind;
use rand::rngs::StdRng;
use rand::SeedableRng;
use schnorrkel::{Keypair, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

const VRF_SIGNING_CONTEXT: &[u8] = b"croupier-draw";

/// Proof material published with every settled wager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawProof {
    /// Hex-encoded VRF output (32 bytes)
    pub vrf_output: String,
    /// Hex-encoded VRF proof (64 bytes for schnorrkel)
    pub vrf_proof: String,
    /// Hex-encoded public key (32 bytes)
    pub public_key: String,
    /// Input message the VRF was evaluated over
    pub input_message: String,
}

/// One drawn outcome: the proof bundle plus the raw outcome bytes
#[derive(Debug, Clone)]
pub struct Draw {
    pub proof: DrawProof,
    output: [u8; 32],
}

impl Draw {
    /// Reconstruct a draw from published outcome bytes, for verification.
    pub fn from_output(output: [u8; 32]) -> Self {
        Self {
            proof: DrawProof {
                vrf_output: hex::encode(output),
                vrf_proof: String::new(),
                public_key: String::new(),
                input_message: String::new(),
            },
            output,
        }
    }

    pub fn output_bytes(&self) -> &[u8; 32] {
        &self.output
    }

    /// Deterministic generator seeded from the VRF output.
    pub fn rng(&self) -> StdRng {
        StdRng::from_seed(self.output)
    }
}

/// VRF-based outcome generator shared by all game rule modules
pub struct VrfOutcomeSource {
    keypair: Arc<Keypair>,
}

impl VrfOutcomeSource {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    /// Fresh random keypair, suitable for tests and single-node deployments.
    pub fn new_random() -> Self {
        use rand_core::OsRng;
        let keypair = Keypair::generate_with(OsRng);
        Self::new(keypair)
    }

    /// Draw the outcome for one wager.
    ///
    /// The input message binds the draw to the wager id, game, account, and
    /// the player's committed parameters, so a proof cannot be replayed
    /// across wagers.
    pub fn draw(
        &self,
        wager_id: &str,
        game: GameKind,
        account_id: &str,
        commitment: &str,
    ) -> EngineResult<Draw> {
        let input_message = format!("{}:{}:{}:{}", wager_id, game, account_id, commitment);
        let (output, proof) = self.vrf_sign(input_message.as_bytes());

        Ok(Draw {
            proof: DrawProof {
                vrf_output: hex::encode(output),
                vrf_proof: hex::encode(proof),
                public_key: hex::encode(self.keypair.public.to_bytes()),
                input_message,
            },
            output,
        })
    }

    /// Sign the message and derive the 32 outcome bytes from the signature.
    fn vrf_sign(&self, message: &[u8]) -> ([u8; 32], Vec<u8>) {
        use schnorrkel::context::SigningContext;

        let ctx = SigningContext::new(VRF_SIGNING_CONTEXT);
        let transcript = ctx.bytes(message);
        let signature = self.keypair.sign(transcript);

        let mut hasher = Sha256::new();
        hasher.update(signature.to_bytes());
        let digest = hasher.finalize();

        let mut output = [0u8; 32];
        output.copy_from_slice(&digest);
        (output, signature.to_bytes().to_vec())
    }

    /// Publicly verify a proof bundle against its expected input message.
    pub fn verify_proof(proof: &DrawProof, expected_input: &str) -> EngineResult<bool> {
        if proof.input_message != expected_input {
            return Ok(false);
        }

        let vrf_output = hex::decode(&proof.vrf_output)
            .map_err(|e| EngineError::Validation(format!("invalid VRF output hex: {}", e)))?;
        let vrf_proof = hex::decode(&proof.vrf_proof)
            .map_err(|e| EngineError::Validation(format!("invalid VRF proof hex: {}", e)))?;
        let public_key_bytes = hex::decode(&proof.public_key)
            .map_err(|e| EngineError::Validation(format!("invalid public key hex: {}", e)))?;

        let public_key_array: [u8; 32] = public_key_bytes
            .try_into()
            .map_err(|_| EngineError::Validation("public key must be 32 bytes".to_string()))?;
        let public_key = PublicKey::from_bytes(&public_key_array)
            .map_err(|e| EngineError::Validation(format!("invalid public key: {:?}", e)))?;

        let signature_array: [u8; 64] = vrf_proof
            .try_into()
            .map_err(|_| EngineError::Validation("VRF proof must be 64 bytes".to_string()))?;
        let signature = Signature::from_bytes(&signature_array)
            .map_err(|e| EngineError::Validation(format!("invalid signature: {:?}", e)))?;

        use schnorrkel::context::SigningContext;
        let ctx = SigningContext::new(VRF_SIGNING_CONTEXT);
        let transcript = ctx.bytes(expected_input.as_bytes());

        if public_key.verify(transcript, &signature).is_err() {
            return Ok(false);
        }

        let mut hasher = Sha256::new();
        hasher.update(signature_array);
        let computed_output = hasher.finalize();

        Ok(computed_output.as_slice() == vrf_output.as_slice())
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.keypair.public.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_and_verify() {
        let source = VrfOutcomeSource::new_random();
        let draw = source
            .draw("wager-123", GameKind::Dice, "acct-456", "threshold=50,over")
            .expect("draw failed");

        let expected_input = "wager-123:dice:acct-456:threshold=50,over";
        assert_eq!(draw.proof.input_message, expected_input);

        let is_valid =
            VrfOutcomeSource::verify_proof(&draw.proof, expected_input).expect("verify failed");
        assert!(is_valid, "fresh proof must verify");
    }

    #[test]
    fn test_tampered_output_rejected() {
        let source = VrfOutcomeSource::new_random();
        let mut draw = source
            .draw("wager-1", GameKind::Limbo, "acct-1", "target=20000")
            .expect("draw failed");

        draw.proof.vrf_output = hex::encode([0xffu8; 32]);

        let is_valid =
            VrfOutcomeSource::verify_proof(&draw.proof, "wager-1:limbo:acct-1:target=20000")
                .expect("verify failed");
        assert!(!is_valid, "tampered output must not verify");
    }

    #[test]
    fn test_mismatched_input_rejected() {
        let source = VrfOutcomeSource::new_random();
        let draw = source
            .draw("wager-1", GameKind::Wheel, "acct-1", "tier=low")
            .expect("draw failed");

        let is_valid = VrfOutcomeSource::verify_proof(&draw.proof, "wager-2:wheel:acct-1:tier=low")
            .expect("verify failed");
        assert!(!is_valid);
    }

    #[test]
    fn test_rng_is_deterministic_per_output() {
        use rand::Rng;

        let draw = Draw::from_output([7u8; 32]);
        let a: u64 = draw.rng().gen();
        let b: u64 = draw.rng().gen();
        assert_eq!(a, b, "same output bytes must seed the same stream");
    }

    #[test]
    fn test_distinct_wagers_distinct_outputs() {
        let source = VrfOutcomeSource::new_random();
        let a = source
            .draw("wager-1", GameKind::Dice, "acct-1", "x")
            .unwrap();
        let b = source
            .draw("wager-2", GameKind::Dice, "acct-1", "x")
            .unwrap();
        assert_ne!(a.output_bytes(), b.output_bytes());
    }
}
