// =============================================================================
// DECOY REGISTRY - src/canary/registry.rs
// =============================================================================

//! Live set of deployed decoys, shared between operators deploying bait and
//! the detector that arms and triggers it. Every mutation recomputes
//! [`DecoyCounts`] and publishes them on a watch channel.

use chrono::{Local, Utc};
use log::{info, warn};
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

use shared::{Decoy, DecoyCounts, DecoyStatus, SimulationError, SimulationResult};

use crate::safe_zone::SafeZone;

/// Operator request to plant one decoy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoyDeployment {
    pub base_name: String,
    /// Declared extension; a leading dot is added when missing.
    pub extension: String,
    pub directory: PathBuf,
    pub logging: bool,
}

impl DecoyDeployment {
    pub fn new(base_name: impl Into<String>, extension: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            base_name: base_name.into(),
            extension: extension.into(),
            directory: directory.into(),
            logging: false,
        }
    }

    /// Split a full file name such as `BAIT.txt` at its last dot.
    pub fn from_file_name(file_name: &str, directory: impl Into<PathBuf>) -> Self {
        match file_name.rsplit_once('.') {
            Some((base, ext)) if !base.is_empty() => Self::new(base, ext, directory),
            _ => Self::new(file_name, "", directory),
        }
    }

    pub fn with_logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }

    fn extension(&self) -> String {
        let ext = self.extension.trim();
        if ext.is_empty() || ext.starts_with('.') {
            ext.to_string()
        } else {
            format!(".{}", ext)
        }
    }

    fn file_name(&self) -> SimulationResult<String> {
        let base = self.base_name.trim();
        let name = format!("{}{}", base, self.extension());
        let single_segment = Path::new(&name).file_name() == Some(OsStr::new(&name));
        let invalid = base.is_empty() || !single_segment || name.contains('\\');
        if invalid {
            return Err(SimulationError::configuration(format!(
                "decoy name '{}' must be a plain file name",
                name
            )));
        }
        Ok(name)
    }
}

/// Shared, synchronized decoy set. Clones observe the same decoys.
#[derive(Clone)]
pub struct DecoyRegistry {
    zone: SafeZone,
    decoys: Arc<RwLock<Vec<Decoy>>>,
    counts: Arc<watch::Sender<DecoyCounts>>,
}

impl DecoyRegistry {
    pub fn new(zone: SafeZone) -> Self {
        let (counts, _) = watch::channel(DecoyCounts::default());
        Self {
            zone,
            decoys: Arc::new(RwLock::new(Vec::new())),
            counts: Arc::new(counts),
        }
    }

    pub fn zone(&self) -> &SafeZone {
        &self.zone
    }

    /// Write the bait file and register an armed decoy for it.
    pub async fn deploy(&self, request: DecoyDeployment) -> SimulationResult<Decoy> {
        let name = request.file_name()?;
        let directory = self.zone.ensure_contained(&request.directory)?;
        if !directory.is_dir() {
            return Err(SimulationError::missing("decoy directory does not exist", directory));
        }
        let bait_path = self.zone.ensure_contained(&directory.join(&name))?;

        let content = format!(
            "CANARY FILE\nName: {}\nDeployed: {}\nDo not modify or delete.",
            name,
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        tokio::fs::write(&bait_path, content)
            .await
            .map_err(|e| SimulationError::io(&bait_path, e))?;

        let decoy = Decoy {
            id: Uuid::new_v4(),
            extension: request.extension(),
            name,
            directory,
            bait_path,
            logging: request.logging,
            status: DecoyStatus::Armed,
            deployed_at: Utc::now(),
            triggered_at: None,
        };
        info!("Deployed decoy {} at {}", decoy.name, decoy.bait_path.display());

        let mut decoys = self.decoys.write().await;
        decoys.push(decoy.clone());
        self.publish(&decoys);
        Ok(decoy)
    }

    /// Delete the decoy's bait file and forget it.
    pub async fn remove(&self, id: Uuid) -> SimulationResult<Decoy> {
        let mut decoys = self.decoys.write().await;
        let index = decoys
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| SimulationError::missing("no such decoy", id.to_string()))?;

        let bait_path = self.zone.ensure_contained(&decoys[index].bait_path)?;
        match tokio::fs::remove_file(&bait_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Bait file {} was already gone", bait_path.display());
            }
            Err(e) => return Err(SimulationError::io(&bait_path, e)),
        }

        let decoy = decoys.remove(index);
        self.publish(&decoys);
        info!("Removed decoy {}", decoy.name);
        Ok(decoy)
    }

    pub async fn snapshot(&self) -> Vec<Decoy> {
        self.decoys.read().await.clone()
    }

    pub async fn get(&self, id: Uuid) -> Option<Decoy> {
        self.decoys.read().await.iter().find(|d| d.id == id).cloned()
    }

    pub fn counts(&self) -> DecoyCounts {
        *self.counts.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DecoyCounts> {
        self.counts.subscribe()
    }

    /// Distinct directories that hold at least one decoy.
    pub async fn deployment_directories(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.decoys.read().await.iter().map(|d| d.directory.clone()).collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }

    /// Trigger the first armed decoy accepted by `matches`, under one write
    /// lock so a decoy can never be triggered twice.
    pub(crate) async fn trigger_first<F>(&self, matches: F) -> Option<Decoy>
    where
        F: Fn(&Decoy) -> bool,
    {
        let mut decoys = self.decoys.write().await;
        let decoy = decoys.iter_mut().find(|d| d.is_armed() && matches(d))?;
        decoy.trigger(Utc::now());
        let triggered = decoy.clone();
        self.publish(&decoys);
        Some(triggered)
    }

    fn publish(&self, decoys: &[Decoy]) {
        self.counts.send_replace(DecoyCounts::tally(decoys));
    }
}
