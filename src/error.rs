//! Error taxonomy for the detector.
//!
//! `ConfigRejected` is raised only from `Configurator`/`configure`, never
//! from a detection round. `RoundFailed` is raised only inside a round, is
//! logged, and never escapes `detect_round` — the public round entry point
//! is infallible by design (see `detector.rs`).

use thiserror::Error;

/// A tunable failed parsing or range validation at configuration time.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigRejected {
    #[error("`{key}` = {value} is out of range: {constraint}")]
    OutOfRange {
        key: &'static str,
        value: String,
        constraint: &'static str,
    },

    #[error("`{key}` has the wrong type: expected {expected}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
    },

    #[error("invalid configuration: {detail}")]
    InvalidRelationship { detail: String },
}

/// An unexpected failure inside a detection round.
///
/// Never returned to callers of `DetectRound`; see `spec.md` §7 and
/// `SPEC_FULL.md` §7 for the recovery policy this type supports.
#[derive(Debug, Error)]
pub enum RoundFailed {
    #[error("round failed: {0}")]
    Internal(String),
}
