// =============================================================================
// SHARED FOUNDATION - shared/src/lib.rs
// Shared type definitions for the simulator, the sentinel and the CLI
// =============================================================================

//! Shared types for the ransim workspace.
//!
//! Every layer of the workspace (safe-zone guard, encryptor, orchestrator,
//! canary detector, command line) speaks in terms of the types defined here.
//! The crate performs no I/O: it only fixes the vocabulary, the error taxonomy
//! and the serialized shape of the records handed to reporting collaborators.

// Module declarations
pub mod types;

// =============================================================================
// PUBLIC RE-EXPORTS
// =============================================================================

// Algorithm selection exports
pub use types::algorithm::EncryptionAlgorithm;

// Error handling exports
pub use types::error::{SimulationError, SimulationResult};

// Telemetry exports
pub use types::metrics::{FileTelemetry, SimulationMetrics, SimulationProgress};

// Canary exports
pub use types::decoy::{Decoy, DecoyCounts, DecoyStatus};
