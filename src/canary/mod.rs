// =============================================================================
// CANARY DETECTOR - src/canary/mod.rs
// Decoy deployment and encrypted-decoy detection
// =============================================================================

//! Canary decoys.
//!
//! A decoy is a bait file planted in a directory inside the safe zone. When an
//! encrypted copy of it (`<name>.encrypted`) appears under that directory's
//! `encrypted/` tree, the decoy moves from armed to triggered, exactly once.

pub mod detector;
pub mod registry;

pub use self::detector::{
    matches_decoy, CanaryDetector, ChannelSink, DetectorSettings, MatchPolicy, TriggerSink,
    DEFAULT_EVENT_QUEUE_CAPACITY,
};
pub use self::registry::{DecoyDeployment, DecoyRegistry};
