//! Atomic coordination of multi-output build units
//!
//! A unit of work that produces several output artifacts must run exactly
//! once per build invocation when any output is stale or missing — never
//! once per output, and never twice under parallel execution. This crate
//! provides:
//! - Staleness evaluation against a persisted last-run stamp
//! - Missing-output detection by direct target scan
//! - A single-flight execution gate coalescing concurrent consumers
//! - A shell-command work adapter and TOML unit manifests

pub mod coordinator;
pub mod error;
pub mod gate;
pub mod manifest;
pub mod staleness;
pub mod stamp;
pub mod unit;
pub mod work;

// Re-export main types
pub use coordinator::{RunStats, UnitCoordinator};
pub use error::{UnitError, UnitResult};
pub use gate::RunGate;
pub use manifest::{UnitDecl, UnitManifest};
pub use staleness::{check_staleness, missing_target, newest_mtime, StaleReason};
pub use stamp::{RunStamp, StampStore};
pub use unit::{RunOutcome, UnitSpec};
pub use work::{CommandWork, UnitWork, WorkContext};
