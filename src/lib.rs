//! # ransim: sandboxed ransomware simulator
//!
//! Reproduces the filesystem footprint of a ransomware attack inside a single
//! sandbox directory so that detection tooling can be exercised safely.
//!
//! ## Safety model
//!
//! Every component that touches the filesystem goes through the
//! [`SafeZone`] guard immediately before doing so and fails closed on any path
//! that does not resolve beneath the sandbox root. Encryption is copy-only:
//! originals are read, sealed and written to a shadow `encrypted/` directory,
//! never modified or removed.
//!
//! ## Components
//!
//! - [`safe_zone`]: containment guard and sandbox population
//! - [`scanner`]: lazy, shadow-skipping target discovery
//! - [`crypto`]: run keys, envelope formats, file encryption and recovery
//! - [`simulation`]: the cancellable orchestrator
//! - [`telemetry`]: entropy, resource sampling, run metrics
//! - [`canary`]: decoy deployment and encrypted-decoy detection
//! - [`config`]: TOML configuration
//!
//! ```no_run
//! use ransim::{run_simulation, CancellationFlag, SafeZone, SimulationRequest};
//! use shared::{EncryptionAlgorithm, SimulationProgress};
//!
//! let zone = SafeZone::from_working_directory()?;
//! let request = SimulationRequest::new(zone.root(), EncryptionAlgorithm::Aes256Gcm);
//! let report = |p: SimulationProgress| println!("{}/{}", p.done, p.total);
//! let metrics = run_simulation(&zone, &request, &CancellationFlag::new(), &report)?;
//! println!("{} files encrypted", metrics.encrypted_files);
//! # Ok::<(), shared::SimulationError>(())
//! ```

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

pub mod canary;
pub mod config;
pub mod crypto;
pub mod safe_zone;
pub mod scanner;
pub mod simulation;
pub mod telemetry;

// =============================================================================
// ON-DISK LAYOUT CONSTANTS
// =============================================================================

/// Shadow directory receiving artifacts and the key file. Never scanned.
pub const ENCRYPTED_DIRNAME: &str = "encrypted";

/// Suffix appended to every flattened artifact name.
pub const ENCRYPTED_SUFFIX: &str = ".encrypted";

/// Key file name inside the shadow directory.
pub const KEYFILE_NAME: &str = "sim_key.bin";

// =============================================================================
// PUBLIC RE-EXPORTS
// =============================================================================

pub use canary::{
    CanaryDetector, ChannelSink, DecoyDeployment, DecoyRegistry, DetectorSettings, MatchPolicy, TriggerSink,
};
pub use config::SimulatorConfiguration;
pub use crypto::{
    artifact_name, decrypt_file, generate_key, generate_operator_keypair, load_key, load_private_key, save_key,
    CipherKey, DecryptionKey, FileEncryptor, OperatorKeyPair,
};
pub use safe_zone::{populate_safe_zone, resolve_path, SafeZone, SAFE_ZONE_NAME};
pub use scanner::{drop_decoy_notes, scan, ExtensionFilter, TargetFile, TargetScanner};
pub use simulation::{
    run_simulation, spawn_simulation, CancellationFlag, ProgressSink, SimulationHandle, SimulationRequest,
};
pub use telemetry::shannon_entropy;
