// =============================================================================
// SHARED/SRC/TYPES/DECOY.RS - Canary decoy types
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Decoy lifecycle. `Triggered` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoyStatus {
    Armed,
    Triggered,
}

/// A bait file planted to reveal unauthorized encryption activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decoy {
    pub id: Uuid,
    /// File name including the declared extension, e.g. `BAIT.txt`.
    pub name: String,
    /// Resolved deployment directory.
    pub directory: PathBuf,
    /// Declared extension with its leading dot; empty when none was given.
    pub extension: String,
    pub bait_path: PathBuf,
    /// Operator asked for trigger details to be logged.
    pub logging: bool,
    pub status: DecoyStatus,
    pub deployed_at: DateTime<Utc>,
    pub triggered_at: Option<DateTime<Utc>>,
}

impl Decoy {
    pub fn is_armed(&self) -> bool {
        self.status == DecoyStatus::Armed
    }

    /// Moves an armed decoy to `Triggered`. Returns false, leaving the decoy
    /// untouched, when it was already triggered.
    pub fn trigger(&mut self, at: DateTime<Utc>) -> bool {
        if !self.is_armed() {
            return false;
        }
        self.status = DecoyStatus::Triggered;
        self.triggered_at = Some(at);
        true
    }
}

/// Live summary published to observers after every registry mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoyCounts {
    pub armed: usize,
    pub triggered: usize,
    pub last_triggered_at: Option<DateTime<Utc>>,
}

impl DecoyCounts {
    pub fn tally<'a>(decoys: impl IntoIterator<Item = &'a Decoy>) -> Self {
        decoys.into_iter().fold(Self::default(), |mut counts, decoy| {
            match decoy.status {
                DecoyStatus::Armed => counts.armed += 1,
                DecoyStatus::Triggered => {
                    counts.triggered += 1;
                    if decoy.triggered_at > counts.last_triggered_at {
                        counts.last_triggered_at = decoy.triggered_at;
                    }
                }
            }
            counts
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed(name: &str) -> Decoy {
        Decoy {
            id: Uuid::new_v4(),
            name: name.to_string(),
            directory: PathBuf::from("/sandbox/docs"),
            extension: ".txt".into(),
            bait_path: PathBuf::from("/sandbox/docs").join(name),
            logging: false,
            status: DecoyStatus::Armed,
            deployed_at: Utc::now(),
            triggered_at: None,
        }
    }

    #[test]
    fn trigger_is_terminal() {
        let mut decoy = armed("BAIT.txt");
        let first = Utc::now();
        assert!(decoy.trigger(first));
        assert_eq!(decoy.status, DecoyStatus::Triggered);

        let later = first + chrono::Duration::seconds(5);
        assert!(!decoy.trigger(later));
        assert_eq!(decoy.triggered_at, Some(first));
    }

    #[test]
    fn tally_counts_and_tracks_latest_trigger() {
        let mut a = armed("a.txt");
        let mut b = armed("b.txt");
        let c = armed("c.txt");
        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::seconds(1);
        a.trigger(t2);
        b.trigger(t1);

        let counts = DecoyCounts::tally([&a, &b, &c]);
        assert_eq!(counts.armed, 1);
        assert_eq!(counts.triggered, 2);
        assert_eq!(counts.last_triggered_at, Some(t2));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&DecoyStatus::Triggered).unwrap();
        assert_eq!(json, "\"triggered\"");
    }
}
