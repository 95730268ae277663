// =============================================================================
// SIMULATOR CONFIGURATION - src/config/mod.rs
// TOML-backed settings for the sandbox, simulation runs and canary detector
// =============================================================================

//! Simulator configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration. Files are TOML:
//!
//! ```toml
//! [sandbox]
//! name = "Ransomware_Test"
//!
//! [simulation]
//! algorithm = "chacha20-poly1305"
//! extensions = [".txt", ".pdf"]
//! drop_notes = true
//! note_text = "Your files were encrypted by a training exercise."
//!
//! [canary]
//! match_policy = "structural"
//! event_queue_capacity = 1024
//! ```

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use shared::{EncryptionAlgorithm, SimulationError, SimulationResult};

use crate::canary::{DetectorSettings, MatchPolicy, DEFAULT_EVENT_QUEUE_CAPACITY};
use crate::safe_zone::{SafeZone, SAFE_ZONE_NAME};
use crate::scanner::{normalize_extension, ExtensionFilter, DEFAULT_TARGET_EXTENSIONS};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfiguration {
    pub sandbox: SandboxSettings,
    pub simulation: SimulationSettings,
    pub canary: CanarySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    /// Sandbox directory name; a single path segment.
    pub name: String,
    /// Directory the sandbox is created in; the working directory when unset.
    pub base_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub algorithm: EncryptionAlgorithm,
    pub extensions: Vec<String>,
    /// Ignore `extensions` and target every regular file.
    pub all_files: bool,
    pub drop_notes: bool,
    pub note_text: String,
    /// Operator SPKI PEM public key, required for `rsa-hybrid`.
    pub public_key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanarySettings {
    pub match_policy: MatchPolicy,
    pub event_queue_capacity: usize,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            name: SAFE_ZONE_NAME.to_string(),
            base_directory: None,
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            algorithm: EncryptionAlgorithm::default(),
            extensions: DEFAULT_TARGET_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            all_files: false,
            drop_notes: false,
            note_text: String::new(),
            public_key_path: None,
        }
    }
}

impl Default for CanarySettings {
    fn default() -> Self {
        Self {
            match_policy: MatchPolicy::default(),
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }
}

impl SimulatorConfiguration {
    pub fn load_default() -> SimulationResult<Self> {
        let config = Self::default();
        config.validate()?;
        debug!("Using default simulator configuration");
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> SimulationResult<Self> {
        info!("Loading configuration from file: {}", path.display());
        if !path.is_file() {
            return Err(SimulationError::missing("configuration file not found", path));
        }
        let text = fs::read_to_string(path).map_err(|e| SimulationError::io(path, e))?;
        let mut config: Self = toml::from_str(&text)
            .map_err(|e| SimulationError::configuration(format!("{}: {}", path.display(), e)))?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> SimulationResult<String> {
        toml::to_string_pretty(self).map_err(|e| SimulationError::configuration(e.to_string()))
    }

    /// Rewrite extensions into their canonical `.ext` form.
    pub fn normalize(&mut self) {
        for ext in &mut self.simulation.extensions {
            let normalized = normalize_extension(ext);
            if !normalized.is_empty() {
                *ext = normalized;
            }
        }
    }

    pub fn validate(&self) -> SimulationResult<()> {
        let name = self.sandbox.name.as_str();
        if name.is_empty() || name == "." || name == ".." || Path::new(name).components().count() != 1 {
            return Err(SimulationError::configuration(format!(
                "sandbox name '{}' must be a single path segment",
                name
            )));
        }

        let simulation = &self.simulation;
        if !simulation.all_files {
            if simulation.extensions.is_empty() {
                return Err(SimulationError::configuration(
                    "extensions must not be empty unless all_files is set",
                ));
            }
            if let Some(bad) = simulation.extensions.iter().find(|e| normalize_extension(e).is_empty()) {
                return Err(SimulationError::configuration(format!(
                    "extension '{}' is empty",
                    bad
                )));
            }
        }
        if simulation.algorithm == EncryptionAlgorithm::RsaHybrid && simulation.public_key_path.is_none() {
            return Err(SimulationError::configuration(
                "rsa-hybrid requires simulation.public_key_path",
            ));
        }

        if self.canary.event_queue_capacity == 0 {
            return Err(SimulationError::configuration("canary.event_queue_capacity must be positive"));
        }
        Ok(())
    }

    /// Create (if needed) and resolve the sandbox root.
    pub fn establish_zone(&self) -> SimulationResult<SafeZone> {
        let base = match &self.sandbox.base_directory {
            Some(dir) => dir.clone(),
            None => env::current_dir().map_err(|e| SimulationError::io(".", e))?,
        };
        SafeZone::establish(&base, &self.sandbox.name)
    }

    pub fn extension_filter(&self) -> ExtensionFilter {
        if self.simulation.all_files {
            ExtensionFilter::all()
        } else {
            ExtensionFilter::new(&self.simulation.extensions)
        }
    }

    /// Note text to drop, when notes are enabled and the text is non-empty.
    pub fn note_text(&self) -> Option<String> {
        let text = &self.simulation.note_text;
        (self.simulation.drop_notes && !text.is_empty()).then(|| text.clone())
    }

    /// Read the operator public key named by `public_key_path`, if any.
    pub fn operator_public_key(&self) -> SimulationResult<Option<String>> {
        let Some(path) = &self.simulation.public_key_path else {
            return Ok(None);
        };
        if !path.is_file() {
            return Err(SimulationError::missing("operator public key not found", path));
        }
        fs::read_to_string(path)
            .map(Some)
            .map_err(|e| SimulationError::io(path, e))
    }

    pub fn detector_settings(&self) -> DetectorSettings {
        DetectorSettings {
            match_policy: self.canary.match_policy,
            queue_capacity: self.canary.event_queue_capacity,
        }
    }
}
