// =============================================================================
// SHARED/SRC/TYPES/METRICS.RS - Simulation telemetry records
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

use super::algorithm::EncryptionAlgorithm;

/// Progress report emitted once before the first file and after every file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationProgress {
    /// Files processed so far, successful or failed.
    pub done: usize,
    pub total: usize,
    pub elapsed_seconds: f64,
}

impl SimulationProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.done.min(self.total) * 100) / self.total) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.done >= self.total
    }
}

/// Per-file measurement recorded by the encryptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTelemetry {
    pub source: PathBuf,
    pub artifact: PathBuf,
    /// Lowercase extension with its leading dot, or `(none)`.
    pub extension: String,
    pub original_bytes: u64,
    pub ciphertext_bytes: u64,
    /// Shannon entropy of the plaintext, bits per byte.
    pub entropy_before: f64,
    /// Shannon entropy of the written envelope, bits per byte.
    pub entropy_after: f64,
}

impl FileTelemetry {
    pub fn entropy_delta(&self) -> f64 {
        self.entropy_after - self.entropy_before
    }
}

/// Run-level aggregate handed to the reporting collaborator.
///
/// Computed once when a run finishes or is cancelled and never mutated after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationMetrics {
    pub run_id: Uuid,
    pub algorithm: EncryptionAlgorithm,
    pub root: PathBuf,
    pub encrypted_dir: PathBuf,
    pub key_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub cancelled: bool,

    pub total_files: usize,
    pub encrypted_files: usize,
    pub failed_files: usize,
    pub notes_dropped: usize,

    /// Plaintext bytes of the files that were encrypted.
    pub total_bytes: u64,
    pub files_per_second: f64,
    pub data_rate_mb_per_sec: f64,
    pub mean_file_size_bytes: f64,

    pub peak_cpu_percent: f64,
    pub peak_memory_bytes: u64,

    pub mean_entropy_before: f64,
    pub mean_entropy_after: f64,
    pub mean_entropy_delta: f64,

    pub failure_rate_pct: f64,
    /// Share of discovered targets left without an encrypted copy.
    pub survival_rate_pct: f64,
    /// Extension to percentage of all discovered targets.
    pub extension_distribution: BTreeMap<String, f64>,

    pub files: Vec<FileTelemetry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_percent_handles_empty_runs() {
        let progress = SimulationProgress { done: 0, total: 0, elapsed_seconds: 0.0 };
        assert_eq!(progress.percent(), 100);
        assert!(progress.is_complete());
    }

    #[test]
    fn progress_percent_truncates() {
        let progress = SimulationProgress { done: 1, total: 3, elapsed_seconds: 0.2 };
        assert_eq!(progress.percent(), 33);
        assert!(!progress.is_complete());
    }

    #[test]
    fn entropy_delta_is_after_minus_before() {
        let record = FileTelemetry {
            source: PathBuf::from("a.txt"),
            artifact: PathBuf::from("encrypted/a.txt.encrypted"),
            extension: ".txt".into(),
            original_bytes: 10,
            ciphertext_bytes: 38,
            entropy_before: 3.5,
            entropy_after: 5.0,
        };
        assert!((record.entropy_delta() - 1.5).abs() < f64::EPSILON);
    }
}
