// =============================================================================
// RUN TELEMETRY - src/telemetry/mod.rs
// Entropy, resource sampling and aggregate metrics for simulation runs
// =============================================================================

//! Measurement side of a simulation run.
//!
//! The orchestrator feeds a [`RunLedger`] as it works and samples process
//! resources through a [`ResourceSampler`]; [`RunLedger::finish`] turns both
//! into the immutable [`SimulationMetrics`] record.

pub mod entropy;
pub mod rusage;

pub use self::entropy::shannon_entropy;
pub use self::rusage::ProcUsage;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use uuid::Uuid;

use shared::{EncryptionAlgorithm, FileTelemetry, SimulationMetrics};

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Tracks peak process CPU utilisation and peak resident memory.
///
/// CPU percent is process CPU time over wall time between consecutive
/// samples, so it can exceed 100 on multi-core hosts.
#[derive(Debug)]
pub struct ResourceSampler {
    last_wall: Instant,
    last_usage: ProcUsage,
    peak_cpu_percent: f64,
    peak_memory_bytes: u64,
}

impl ResourceSampler {
    pub fn start() -> Self {
        let usage = ProcUsage::current();
        Self {
            last_wall: Instant::now(),
            peak_memory_bytes: usage.max_rss_bytes,
            last_usage: usage,
            peak_cpu_percent: 0.0,
        }
    }

    /// Take one sample and fold it into the peaks.
    pub fn sample(&mut self) {
        let now = Instant::now();
        let usage = ProcUsage::current();
        let wall = now.duration_since(self.last_wall);

        if wall > Duration::ZERO {
            let cpu = usage
                .total_cpu_time()
                .saturating_sub(self.last_usage.total_cpu_time());
            let percent = cpu.as_secs_f64() / wall.as_secs_f64() * 100.0;
            self.peak_cpu_percent = self.peak_cpu_percent.max(percent);
            self.last_wall = now;
            self.last_usage = usage;
        }
        self.peak_memory_bytes = self.peak_memory_bytes.max(usage.max_rss_bytes);
    }

    pub fn peak_cpu_percent(&self) -> f64 {
        self.peak_cpu_percent
    }

    pub fn peak_memory_bytes(&self) -> u64 {
        self.peak_memory_bytes
    }
}

/// Mutable record of one run, consumed by [`RunLedger::finish`].
#[derive(Debug)]
pub struct RunLedger {
    pub run_id: Uuid,
    pub algorithm: EncryptionAlgorithm,
    pub root: PathBuf,
    pub encrypted_dir: PathBuf,
    pub key_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub notes_dropped: usize,
    /// Extension key of every discovered target.
    pub discovered: Vec<String>,
    pub files: Vec<FileTelemetry>,
    pub failed_files: usize,
    pub cancelled: bool,
}

impl RunLedger {
    pub fn new(algorithm: EncryptionAlgorithm, root: PathBuf, encrypted_dir: PathBuf, key_path: PathBuf) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            algorithm,
            root,
            encrypted_dir,
            key_path,
            started_at: Utc::now(),
            notes_dropped: 0,
            discovered: Vec::new(),
            files: Vec::new(),
            failed_files: 0,
            cancelled: false,
        }
    }

    pub fn processed(&self) -> usize {
        self.files.len() + self.failed_files
    }

    /// Compute the aggregate record over the work done so far.
    pub fn finish(self, elapsed: Duration, sampler: &ResourceSampler) -> SimulationMetrics {
        let elapsed_seconds = elapsed.as_secs_f64();
        let total_files = self.discovered.len();
        let encrypted_files = self.files.len();
        let processed = self.processed();
        let total_bytes: u64 = self.files.iter().map(|f| f.original_bytes).sum();

        let (files_per_second, data_rate_mb_per_sec) = if elapsed_seconds > 0.0 {
            (
                processed as f64 / elapsed_seconds,
                total_bytes as f64 / BYTES_PER_MIB / elapsed_seconds,
            )
        } else {
            (0.0, 0.0)
        };

        let mean_entropy_before = mean(self.files.iter().map(|f| f.entropy_before));
        let mean_entropy_after = mean(self.files.iter().map(|f| f.entropy_after));

        SimulationMetrics {
            run_id: self.run_id,
            algorithm: self.algorithm,
            root: self.root,
            encrypted_dir: self.encrypted_dir,
            key_path: self.key_path,
            started_at: self.started_at,
            finished_at: Utc::now(),
            elapsed_seconds,
            cancelled: self.cancelled,
            total_files,
            encrypted_files,
            failed_files: self.failed_files,
            notes_dropped: self.notes_dropped,
            total_bytes,
            files_per_second,
            data_rate_mb_per_sec,
            mean_file_size_bytes: mean(self.files.iter().map(|f| f.original_bytes as f64)),
            peak_cpu_percent: sampler.peak_cpu_percent(),
            peak_memory_bytes: sampler.peak_memory_bytes(),
            mean_entropy_before,
            mean_entropy_after,
            mean_entropy_delta: mean(self.files.iter().map(FileTelemetry::entropy_delta)),
            failure_rate_pct: percent(self.failed_files, total_files),
            survival_rate_pct: percent(total_files.saturating_sub(encrypted_files), total_files),
            extension_distribution: distribution(&self.discovered),
            files: self.files,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn distribution(extensions: &[String]) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for ext in extensions {
        *counts.entry(ext.clone()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(ext, n)| (ext, percent(n, extensions.len())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry(ext: &str, bytes: u64, before: f64, after: f64) -> FileTelemetry {
        FileTelemetry {
            source: PathBuf::from(format!("f{}", ext)),
            artifact: PathBuf::from(format!("f{}.encrypted", ext)),
            extension: ext.to_string(),
            original_bytes: bytes,
            ciphertext_bytes: bytes + 28,
            entropy_before: before,
            entropy_after: after,
        }
    }

    fn ledger() -> RunLedger {
        RunLedger::new(
            EncryptionAlgorithm::Aes256Gcm,
            PathBuf::from("/zone"),
            PathBuf::from("/zone/encrypted"),
            PathBuf::from("/zone/encrypted/sim_key.bin"),
        )
    }

    #[test]
    fn zero_elapsed_reports_zero_throughput() {
        let mut ledger = ledger();
        ledger.discovered = vec![".txt".into()];
        ledger.files.push(telemetry(".txt", 100, 4.0, 7.0));
        let metrics = ledger.finish(Duration::ZERO, &ResourceSampler::start());
        assert_eq!(metrics.files_per_second, 0.0);
        assert_eq!(metrics.data_rate_mb_per_sec, 0.0);
        assert_eq!(metrics.encrypted_files, 1);
    }

    #[test]
    fn aggregates_rates_and_distribution() {
        let mut ledger = ledger();
        ledger.discovered = vec![".txt".into(), ".txt".into(), ".pdf".into(), "(none)".into()];
        ledger.files.push(telemetry(".txt", 1024 * 1024, 4.0, 8.0));
        ledger.files.push(telemetry(".pdf", 1024 * 1024, 6.0, 8.0));
        ledger.failed_files = 1;

        let metrics = ledger.finish(Duration::from_secs(2), &ResourceSampler::start());
        assert_eq!(metrics.total_files, 4);
        assert_eq!(metrics.encrypted_files, 2);
        assert_eq!(metrics.failed_files, 1);
        assert!((metrics.files_per_second - 1.5).abs() < 1e-9);
        assert!((metrics.data_rate_mb_per_sec - 1.0).abs() < 1e-9);
        assert!((metrics.mean_file_size_bytes - 1_048_576.0).abs() < 1e-9);
        assert!((metrics.mean_entropy_delta - 3.0).abs() < 1e-9);
        assert!((metrics.failure_rate_pct - 25.0).abs() < 1e-9);
        assert!((metrics.survival_rate_pct - 50.0).abs() < 1e-9);
        assert_eq!(metrics.extension_distribution.get(".txt"), Some(&50.0));
        assert_eq!(metrics.extension_distribution.get(".pdf"), Some(&25.0));
        assert_eq!(metrics.extension_distribution.get("(none)"), Some(&25.0));
    }

    #[test]
    fn empty_run_has_no_rates() {
        let metrics = ledger().finish(Duration::from_millis(5), &ResourceSampler::start());
        assert_eq!(metrics.total_files, 0);
        assert_eq!(metrics.survival_rate_pct, 0.0);
        assert_eq!(metrics.failure_rate_pct, 0.0);
        assert_eq!(metrics.mean_entropy_delta, 0.0);
        assert!(metrics.extension_distribution.is_empty());
    }

    #[test]
    fn sampler_peaks_never_decrease() {
        let mut sampler = ResourceSampler::start();
        sampler.sample();
        let first = sampler.peak_memory_bytes();
        let _buffer = vec![1u8; 4 * 1024 * 1024];
        sampler.sample();
        assert!(sampler.peak_memory_bytes() >= first);
        assert!(sampler.peak_cpu_percent() >= 0.0);
    }
}
