// =============================================================================
// SIMULATION ORCHESTRATOR - src/simulation/mod.rs
// Guarded, cancellable, copy-only encryption runs over the safe zone
// =============================================================================

//! One simulation run, start to finish.
//!
//! [`run_simulation`] is the synchronous core: guard the root, generate the run
//! key, optionally drop notes, persist the key, enumerate targets and encrypt
//! them one at a time. Files are processed sequentially so progress reports
//! and metrics stay strictly ordered. Cancellation is cooperative and checked
//! once per file; artifacts already written are left in place.
//!
//! [`spawn_simulation`] runs the same body on a dedicated blocking worker and
//! hands progress back over a channel.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use shared::{EncryptionAlgorithm, SimulationError, SimulationMetrics, SimulationProgress, SimulationResult};

use crate::crypto::{artifact_name, generate_key, save_key, FileEncryptor};
use crate::safe_zone::SafeZone;
use crate::scanner::{drop_decoy_notes, scan, ExtensionFilter, TargetFile};
use crate::telemetry::{ResourceSampler, RunLedger};
use crate::{ENCRYPTED_DIRNAME, KEYFILE_NAME};

/// Shared stop signal. Set once, observed by every clone.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    flag: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Receives `(done, total, elapsed)` reports from the run's worker thread.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: SimulationProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(SimulationProgress) + Send + Sync,
{
    fn report(&self, progress: SimulationProgress) {
        self(progress)
    }
}

/// Parameters of one run.
#[derive(Debug, Clone)]
pub struct SimulationRequest {
    pub root: PathBuf,
    pub algorithm: EncryptionAlgorithm,
    pub filter: ExtensionFilter,
    /// Note text dropped into every visited directory; `None` or empty skips
    /// the step.
    pub note_text: Option<String>,
    /// Operator SPKI public key, required for the hybrid algorithm.
    pub operator_public_key_pem: Option<String>,
}

impl SimulationRequest {
    pub fn new(root: impl Into<PathBuf>, algorithm: EncryptionAlgorithm) -> Self {
        Self {
            root: root.into(),
            algorithm,
            filter: ExtensionFilter::default_targets(),
            note_text: None,
            operator_public_key_pem: None,
        }
    }
}

/// Execute a run and return its metrics.
///
/// Fails before any file is touched when the root is outside the zone, is not
/// a directory, or the key cannot be produced. Per-file failures are counted
/// and the batch continues. A cancelled run still returns metrics over the
/// work done so far.
pub fn run_simulation(
    zone: &SafeZone,
    request: &SimulationRequest,
    cancel: &CancellationFlag,
    progress: &dyn ProgressSink,
) -> SimulationResult<SimulationMetrics> {
    let clock = Instant::now();
    let root = zone.ensure_contained(&request.root)?;
    if !root.is_dir() {
        return Err(SimulationError::missing("simulation root is not a directory", root));
    }
    info!(
        "Starting {} simulation over {}",
        request.algorithm,
        root.display()
    );

    let key = generate_key(request.algorithm, request.operator_public_key_pem.as_deref())?;

    let encrypted_dir = zone.ensure_contained(&root.join(ENCRYPTED_DIRNAME))?;
    let key_path = encrypted_dir.join(KEYFILE_NAME);
    let mut ledger = RunLedger::new(request.algorithm, root.clone(), encrypted_dir.clone(), key_path.clone());

    if let Some(text) = request.note_text.as_deref().filter(|t| !t.is_empty()) {
        ledger.notes_dropped = drop_decoy_notes(zone, &root, text)?.len();
    }

    fs::create_dir_all(&encrypted_dir).map_err(|e| SimulationError::io(&encrypted_dir, e))?;
    save_key(zone, &key, &key_path)?;

    let targets: Vec<TargetFile> = scan(zone, &root, &request.filter)?.collect();
    let total = targets.len();
    ledger.discovered = targets.iter().map(|t| t.extension.clone()).collect();
    info!("Discovered {} target files", total);

    let encryptor = FileEncryptor::new(zone.clone(), key);
    let mut sampler = ResourceSampler::start();
    progress.report(SimulationProgress {
        done: 0,
        total,
        elapsed_seconds: clock.elapsed().as_secs_f64(),
    });

    let mut produced: HashMap<String, PathBuf> = HashMap::new();
    for target in &targets {
        if cancel.is_cancelled() {
            info!("Simulation cancelled after {} of {} files", ledger.processed(), total);
            ledger.cancelled = true;
            break;
        }

        let name = artifact_name(&target.relative_path);
        let dest = encrypted_dir.join(&name);
        if let Some(earlier) = produced.get(&name) {
            warn!(
                "Artifact {} for {} overwrites the one written for {}",
                name,
                target.relative_path.display(),
                earlier.display()
            );
        } else if dest.exists() {
            debug!("Replacing artifact {} left by an earlier run", name);
        }
        match encryptor.encrypt(&target.path, &dest) {
            Ok(record) => {
                debug!("Encrypted {}", target.relative_path.display());
                produced.insert(name, target.relative_path.clone());
                ledger.files.push(record);
            }
            Err(e) => {
                warn!("Failed to encrypt {}: {}", target.path.display(), e);
                ledger.failed_files += 1;
            }
        }
        sampler.sample();

        progress.report(SimulationProgress {
            done: ledger.processed(),
            total,
            elapsed_seconds: clock.elapsed().as_secs_f64(),
        });
    }

    let metrics = ledger.finish(clock.elapsed(), &sampler);
    info!(
        "Simulation finished: {}/{} encrypted, {} failed in {:.3}s",
        metrics.encrypted_files, metrics.total_files, metrics.failed_files, metrics.elapsed_seconds
    );
    Ok(metrics)
}

/// A run executing on a blocking worker.
pub struct SimulationHandle {
    cancel: CancellationFlag,
    progress: mpsc::UnboundedReceiver<SimulationProgress>,
    task: JoinHandle<SimulationResult<SimulationMetrics>>,
}

impl SimulationHandle {
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Next progress report; `None` once the run has finished and every
    /// report has been drained.
    pub async fn next_progress(&mut self) -> Option<SimulationProgress> {
        self.progress.recv().await
    }

    /// Wait for the run and return its metrics.
    pub async fn join(self) -> SimulationResult<SimulationMetrics> {
        self.task.await.map_err(|e| SimulationError::Worker {
            message: format!("simulation worker failed: {}", e),
        })?
    }
}

/// Start a run on tokio's blocking pool. Must be called within a runtime.
pub fn spawn_simulation(zone: SafeZone, request: SimulationRequest) -> SimulationHandle {
    let cancel = CancellationFlag::new();
    let (tx, rx) = mpsc::unbounded_channel();
    let worker_cancel = cancel.clone();

    let task = tokio::task::spawn_blocking(move || {
        let sink = move |progress: SimulationProgress| {
            let _ = tx.send(progress);
        };
        run_simulation(&zone, &request, &worker_cancel, &sink)
    });

    SimulationHandle {
        cancel,
        progress: rx,
        task,
    }
}
