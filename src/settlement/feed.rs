//! Live bet feed
//!
//! A bounded projection of the most recently settled wagers across all
//! accounts, pruned oldest-first, plus a broadcast channel for websocket
//! fan-out. Accounts with ghost mode enabled appear under an anonymized
//! name; the feed never stores their real display name.

use crate::games::{Amount, GameKind};
use crate::ledger::{WagerRecord, WagerStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::RwLock;
use tokio::sync::broadcast;

pub const DEFAULT_FEED_CAPACITY: usize = 10;

const GHOST_NAME: &str = "Hidden";

/// One public feed entry for a settled wager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    pub wager_id: String,
    pub display_name: String,
    pub game: GameKind,
    pub stake: Amount,
    pub multiplier_bp: u64,
    pub payout: Amount,
    pub status: WagerStatus,
    pub settled_at: DateTime<Utc>,
}

/// Bounded feed of recent settlements with broadcast fan-out
pub struct LiveBetFeed {
    capacity: usize,
    entries: RwLock<VecDeque<FeedEntry>>,
    sender: broadcast::Sender<FeedEntry>,
}

impl LiveBetFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(VecDeque::new()),
            sender,
        }
    }

    /// Project a settled wager into the feed, honoring ghost mode.
    pub fn push(&self, record: &WagerRecord, ghost_mode: bool) {
        let entry = FeedEntry {
            wager_id: record.id.clone(),
            display_name: if ghost_mode {
                GHOST_NAME.to_string()
            } else {
                record.display_name.clone()
            },
            game: record.game,
            stake: record.stake,
            multiplier_bp: record.multiplier_bp,
            payout: record.payout,
            status: record.status,
            settled_at: record.created_at,
        };

        if let Ok(mut entries) = self.entries.write() {
            entries.push_back(entry.clone());
            while entries.len() > self.capacity {
                entries.pop_front();
            }
        }
        // No receivers is fine; the feed is also served by snapshot.
        let _ = self.sender.send(entry);
    }

    /// Current entries, newest last.
    pub fn snapshot(&self) -> Vec<FeedEntry> {
        self.entries
            .read()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEntry> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::{BetParams, OutcomeData, RollDirection};
    use crate::rng::DrawProof;

    fn record(id: &str, name: &str) -> WagerRecord {
        WagerRecord {
            id: id.to_string(),
            account_id: "acct".to_string(),
            display_name: name.to_string(),
            game: GameKind::Dice,
            stake: 1_000_000,
            params: BetParams::Dice {
                threshold: 50,
                direction: RollDirection::Over,
            },
            outcome: OutcomeData::Dice { roll: 60 },
            multiplier_bp: 19_800,
            payout: 1_980_000,
            status: WagerStatus::Won,
            proof: DrawProof {
                vrf_output: String::new(),
                vrf_proof: String::new(),
                public_key: String::new(),
                input_message: String::new(),
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_feed_is_bounded_and_prunes_oldest() {
        let feed = LiveBetFeed::new(10);
        for i in 0..15 {
            feed.push(&record(&format!("w{}", i), "alice"), false);
        }

        let snapshot = feed.snapshot();
        assert_eq!(snapshot.len(), 10);
        assert_eq!(snapshot[0].wager_id, "w5", "oldest entries pruned first");
        assert_eq!(snapshot[9].wager_id, "w14");
    }

    #[test]
    fn test_ghost_mode_anonymizes() {
        let feed = LiveBetFeed::new(10);
        feed.push(&record("w1", "alice"), true);
        feed.push(&record("w2", "bob"), false);

        let snapshot = feed.snapshot();
        assert_eq!(snapshot[0].display_name, GHOST_NAME);
        assert_eq!(snapshot[1].display_name, "bob");
    }

    #[tokio::test]
    async fn test_broadcast_delivers_entries() {
        let feed = LiveBetFeed::new(10);
        let mut rx = feed.subscribe();
        feed.push(&record("w1", "alice"), false);

        let entry = rx.recv().await.expect("entry delivered");
        assert_eq!(entry.wager_id, "w1");
    }
}
