// =============================================================================
// CANARY DETECTOR - src/canary/detector.rs
// =============================================================================

//! Watches decoy directories and triggers decoys whose encrypted copies show
//! up in a shadow `encrypted/` tree.
//!
//! The OS watcher thread only forwards raw events into a bounded channel. A
//! single consumer task owns every registry mutation caused by events, so the
//! detector's consistency rests on the terminal `Triggered` state rather than
//! on event ordering: duplicates and out-of-order events are harmless.
//!
//! A recursive watch only reaches a new subdirectory after its creation event,
//! so the consumer sweeps every created directory for files that landed first.

use log::{debug, info, warn};
use notify::{
    Event as FileEvent, EventKind as FileEventKind, RecommendedWatcher, RecursiveMode,
    Result as NotifyResult, Watcher,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use shared::{Decoy, SimulationError, SimulationResult};

use super::registry::{DecoyDeployment, DecoyRegistry};
use crate::safe_zone::resolve_path;
use crate::{ENCRYPTED_DIRNAME, ENCRYPTED_SUFFIX};

pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

/// How an event path is related to a decoy's shadow directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// The file's parent is `<dir>/encrypted` or one of its descendants.
    #[default]
    Structural,
    /// Structural, or the path text merely starts with `<dir>/encrypted`.
    LenientPrefix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorSettings {
    pub match_policy: MatchPolicy,
    pub queue_capacity: usize,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            match_policy: MatchPolicy::Structural,
            queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }
}

/// Receives each decoy exactly once, when it becomes triggered.
pub trait TriggerSink: Send + Sync + 'static {
    fn on_trigger(&self, decoy: &Decoy);
}

impl<F> TriggerSink for F
where
    F: Fn(&Decoy) + Send + Sync + 'static,
{
    fn on_trigger(&self, decoy: &Decoy) {
        self(decoy)
    }
}

/// Forwards triggered decoys to an async consumer.
pub struct ChannelSink(pub mpsc::UnboundedSender<Decoy>);

impl TriggerSink for ChannelSink {
    fn on_trigger(&self, decoy: &Decoy) {
        if self.0.send(decoy.clone()).is_err() {
            debug!("Trigger receiver dropped; {} not forwarded", decoy.name);
        }
    }
}

/// Does an event for `path` named `file_name` reveal that `decoy` was encrypted?
pub fn matches_decoy(decoy: &Decoy, file_name: &str, path: &Path, policy: MatchPolicy) -> bool {
    if file_name != format!("{}{}", decoy.name, ENCRYPTED_SUFFIX) {
        return false;
    }
    let shadow = decoy.directory.join(ENCRYPTED_DIRNAME);
    let structural = path.parent().map_or(false, |parent| parent.starts_with(&shadow));
    match policy {
        MatchPolicy::Structural => structural,
        MatchPolicy::LenientPrefix => {
            structural || path.to_string_lossy().starts_with(shadow.to_string_lossy().as_ref())
        }
    }
}

/// Running detector: an OS watcher plus the consumer task it feeds.
pub struct CanaryDetector {
    registry: DecoyRegistry,
    watcher: Option<RecommendedWatcher>,
    watched: HashSet<PathBuf>,
    stop: Option<oneshot::Sender<()>>,
    consumer: Option<JoinHandle<()>>,
}

impl CanaryDetector {
    /// Create the watcher and consumer, then watch every directory already
    /// holding a decoy. Must be called within a tokio runtime.
    pub async fn start(
        registry: DecoyRegistry,
        sink: impl TriggerSink,
        settings: DetectorSettings,
    ) -> SimulationResult<Self> {
        if settings.queue_capacity == 0 {
            return Err(SimulationError::configuration("event queue capacity must be positive"));
        }
        let (event_tx, event_rx) = mpsc::channel::<NotifyResult<FileEvent>>(settings.queue_capacity);
        let (stop_tx, stop_rx) = oneshot::channel();

        // Runs on the watcher's own thread, outside the runtime.
        let watcher = notify::recommended_watcher(move |event: NotifyResult<FileEvent>| {
            if event_tx.blocking_send(event).is_err() {
                debug!("Detector consumer gone; dropping filesystem event");
            }
        })
        .map_err(detector_error)?;

        let consumer = tokio::spawn(consume_events(
            registry.clone(),
            Arc::new(sink),
            settings.match_policy,
            event_rx,
            stop_rx,
        ));

        let mut detector = Self {
            registry,
            watcher: Some(watcher),
            watched: HashSet::new(),
            stop: Some(stop_tx),
            consumer: Some(consumer),
        };
        for dir in detector.registry.deployment_directories().await {
            detector.watch_directory(&dir)?;
        }
        info!("Canary detector started ({:?} matching)", settings.match_policy);
        Ok(detector)
    }

    pub fn registry(&self) -> &DecoyRegistry {
        &self.registry
    }

    /// Deploy a decoy and start watching its directory.
    pub async fn deploy(&mut self, request: DecoyDeployment) -> SimulationResult<Decoy> {
        let decoy = self.registry.deploy(request).await?;
        self.watch_directory(&decoy.directory)?;
        Ok(decoy)
    }

    /// Watch `dir` recursively. Each resolved directory is watched once.
    pub fn watch_directory(&mut self, dir: &Path) -> SimulationResult<()> {
        let dir = self.registry.zone().ensure_contained(dir)?;
        if self.watched.contains(&dir) {
            return Ok(());
        }
        let watcher = self.watcher.as_mut().ok_or_else(|| SimulationError::Detector {
            message: "detector has been shut down".into(),
        })?;
        watcher.watch(&dir, RecursiveMode::Recursive).map_err(detector_error)?;
        info!("Watching {} for encrypted decoys", dir.display());
        self.watched.insert(dir);
        Ok(())
    }

    /// Stop watching and wait for the consumer to finish.
    pub async fn shutdown(mut self) -> SimulationResult<()> {
        self.watcher.take();
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(consumer) = self.consumer.take() {
            consumer.await.map_err(|e| SimulationError::Worker {
                message: format!("detector consumer failed: {}", e),
            })?;
        }
        info!("Canary detector stopped");
        Ok(())
    }
}

impl Drop for CanaryDetector {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

async fn consume_events(
    registry: DecoyRegistry,
    sink: Arc<dyn TriggerSink>,
    policy: MatchPolicy,
    mut events: mpsc::Receiver<NotifyResult<FileEvent>>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(Ok(event)) => handle_event(&registry, sink.as_ref(), policy, &event).await,
                Some(Err(e)) => warn!("Filesystem watcher error: {}", e),
                None => break,
            },
            _ = &mut stop => break,
        }
    }
    debug!("Detector consumer exiting");
}

/// Match one event against the armed decoys. Never fails: problems with a
/// single event are logged so later events are still processed.
pub(crate) async fn handle_event(
    registry: &DecoyRegistry,
    sink: &dyn TriggerSink,
    policy: MatchPolicy,
    event: &FileEvent,
) {
    let created = matches!(event.kind, FileEventKind::Create(_));
    if !created && !matches!(event.kind, FileEventKind::Modify(_)) {
        return;
    }

    for path in &event.paths {
        if created && is_directory(path) {
            // Files written before the recursive watch reached this
            // directory produce no events of their own.
            for swept in sweep_directory(path.clone()).await {
                check_path(registry, sink, policy, &swept).await;
            }
            continue;
        }
        check_path(registry, sink, policy, path).await;
    }
}

async fn check_path(registry: &DecoyRegistry, sink: &dyn TriggerSink, policy: MatchPolicy, path: &Path) {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    if !file_name.ends_with(ENCRYPTED_SUFFIX) {
        return;
    }
    let resolved = match resolve_path(path) {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!("Cannot resolve event path {}: {}", path.display(), e);
            return;
        }
    };
    debug!("Checking {} against armed decoys", resolved.display());

    let triggered = registry
        .trigger_first(|decoy| matches_decoy(decoy, file_name, &resolved, policy))
        .await;
    if let Some(decoy) = triggered {
        if decoy.logging {
            info!(
                "Decoy {} ({}) triggered by {} at {:?}",
                decoy.name,
                decoy.id,
                resolved.display(),
                decoy.triggered_at
            );
        }
        warn!("ALERT: decoy {} in {} was encrypted", decoy.name, decoy.directory.display());
        sink.on_trigger(&decoy);
    }
}

fn is_directory(path: &Path) -> bool {
    std::fs::symlink_metadata(path).map_or(false, |meta| meta.is_dir())
}

/// Regular files currently beneath a newly created directory.
async fn sweep_directory(dir: PathBuf) -> Vec<PathBuf> {
    let listing = tokio::task::spawn_blocking(move || {
        WalkDir::new(&dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping entry while sweeping {}: {}", dir.display(), e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect::<Vec<_>>()
    })
    .await;
    match listing {
        Ok(files) => files,
        Err(e) => {
            warn!("Directory sweep failed: {}", e);
            Vec::new()
        }
    }
}

fn detector_error(e: notify::Error) -> SimulationError {
    SimulationError::Detector {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe_zone::SafeZone;
    use notify::event::{AccessKind, CreateKind, ModifyKind};
    use std::sync::Mutex;
    use uuid::Uuid;

    fn decoy(dir: &Path) -> Decoy {
        Decoy {
            id: Uuid::new_v4(),
            name: "BAIT.txt".into(),
            directory: dir.to_path_buf(),
            extension: ".txt".into(),
            bait_path: dir.join("BAIT.txt"),
            logging: false,
            status: shared::DecoyStatus::Armed,
            deployed_at: chrono::Utc::now(),
            triggered_at: None,
        }
    }

    #[test]
    fn structural_match_accepts_shadow_tree_only() {
        let d = decoy(Path::new("/zone/docs"));
        let name = "BAIT.txt.encrypted";
        let policy = MatchPolicy::Structural;

        assert!(matches_decoy(&d, name, Path::new("/zone/docs/encrypted/BAIT.txt.encrypted"), policy));
        assert!(matches_decoy(&d, name, Path::new("/zone/docs/encrypted/sub/BAIT.txt.encrypted"), policy));
        assert!(!matches_decoy(&d, name, Path::new("/zone/docs/BAIT.txt.encrypted"), policy));
        assert!(!matches_decoy(&d, name, Path::new("/zone/other/encrypted/BAIT.txt.encrypted"), policy));
        assert!(!matches_decoy(&d, "OTHER.txt.encrypted", Path::new("/zone/docs/encrypted/OTHER.txt.encrypted"), policy));
    }

    #[test]
    fn lenient_prefix_also_accepts_sibling_lookalikes() {
        let d = decoy(Path::new("/zone/docs"));
        let lookalike = Path::new("/zone/docs/encrypted_old/BAIT.txt.encrypted");
        assert!(!matches_decoy(&d, "BAIT.txt.encrypted", lookalike, MatchPolicy::Structural));
        assert!(matches_decoy(&d, "BAIT.txt.encrypted", lookalike, MatchPolicy::LenientPrefix));
    }

    #[tokio::test]
    async fn duplicate_events_trigger_once() {
        let dir = tempfile::tempdir().unwrap();
        let zone = SafeZone::establish(dir.path(), "zone").unwrap();
        let registry = DecoyRegistry::new(zone.clone());
        let deployed = registry
            .deploy(DecoyDeployment::from_file_name("BAIT.txt", zone.root()))
            .await
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let sink = move |d: &Decoy| recorder.lock().unwrap().push(d.id);

        let artifact = zone.root().join("encrypted").join("BAIT.txt.encrypted");
        let create = FileEvent::new(FileEventKind::Create(CreateKind::File)).add_path(artifact.clone());
        let modify = FileEvent::new(FileEventKind::Modify(ModifyKind::Any)).add_path(artifact.clone());
        let access = FileEvent::new(FileEventKind::Access(AccessKind::Any)).add_path(artifact);

        handle_event(&registry, &sink, MatchPolicy::Structural, &access).await;
        assert!(registry.get(deployed.id).await.unwrap().is_armed());

        handle_event(&registry, &sink, MatchPolicy::Structural, &create).await;
        let first = registry.get(deployed.id).await.unwrap().triggered_at;
        handle_event(&registry, &sink, MatchPolicy::Structural, &modify).await;
        handle_event(&registry, &sink, MatchPolicy::Structural, &create).await;

        assert_eq!(*seen.lock().unwrap(), vec![deployed.id]);
        assert_eq!(registry.get(deployed.id).await.unwrap().triggered_at, first);
        assert_eq!(registry.counts().triggered, 1);
    }

    #[tokio::test]
    async fn created_directory_is_swept_for_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let zone = SafeZone::establish(dir.path(), "zone").unwrap();
        let registry = DecoyRegistry::new(zone.clone());
        let deployed = registry
            .deploy(DecoyDeployment::from_file_name("BAIT.txt", zone.root()))
            .await
            .unwrap();

        let shadow = zone.root().join("encrypted");
        std::fs::create_dir_all(&shadow).unwrap();
        std::fs::write(shadow.join("sim_key.bin"), b"key").unwrap();
        std::fs::write(shadow.join("BAIT.txt.encrypted"), b"sealed").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let sink = move |d: &Decoy| recorder.lock().unwrap().push(d.id);

        let create_dir = FileEvent::new(FileEventKind::Create(CreateKind::Folder)).add_path(shadow.clone());
        handle_event(&registry, &sink, MatchPolicy::Structural, &create_dir).await;
        let late_file = FileEvent::new(FileEventKind::Create(CreateKind::File)).add_path(shadow.join("BAIT.txt.encrypted"));
        handle_event(&registry, &sink, MatchPolicy::Structural, &late_file).await;

        assert_eq!(*seen.lock().unwrap(), vec![deployed.id]);
        assert!(!registry.get(deployed.id).await.unwrap().is_armed());
    }

    #[tokio::test]
    async fn zero_capacity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let zone = SafeZone::establish(dir.path(), "zone").unwrap();
        let settings = DetectorSettings {
            queue_capacity: 0,
            ..DetectorSettings::default()
        };
        let result = CanaryDetector::start(DecoyRegistry::new(zone), |_: &Decoy| {}, settings).await;
        assert!(matches!(result, Err(SimulationError::Configuration { .. })));
    }

    #[tokio::test]
    async fn watching_outside_zone_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let zone = SafeZone::establish(dir.path(), "zone").unwrap();
        let mut detector = CanaryDetector::start(DecoyRegistry::new(zone), |_: &Decoy| {}, DetectorSettings::default())
            .await
            .unwrap();
        assert!(detector.watch_directory(dir.path()).unwrap_err().is_containment_violation());
        detector.shutdown().await.unwrap();
    }
}
