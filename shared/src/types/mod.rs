// =============================================================================
// SHARED TYPE ORGANIZATION - shared/src/types/mod.rs
// =============================================================================

//! Type definitions grouped by the component that owns their semantics.

pub use self::algorithm::*;
pub use self::decoy::*;
pub use self::error::*;
pub use self::metrics::*;

pub mod algorithm;
pub mod decoy;
pub mod error;
pub mod metrics;
