//! Structured error types for the resource-error / startup-refusal path.
//!
//! Most of the crate reports errors with `anyhow`, following the teacher's
//! split between rich, one-off `anyhow::Result` chains at operational
//! boundaries and a small number of `thiserror` enums for errors callers
//! need to match on. `SequencerError` is that enum: the only errors that
//! should ever stop the sequencer from starting or reject a well-formed API
//! call outright, per the taxonomy in the error-handling design.
use thiserror::Error;

use crate::config::{FixtureGroupKey, FixtureId};

/// Errors that cause the sequencer to refuse to start, or a public API call
/// to be rejected outright, rather than being logged and recovered from.
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("fixture configuration is empty; refusing to start with no patched fixtures")]
    EmptyConfiguration,

    #[error("duplicate fixture id {0:?} in configuration")]
    DuplicateFixture(FixtureId),

    #[error("group {0:?} has no fixtures")]
    EmptyGroup(FixtureGroupKey),

    #[error("no groups matched the requested selection")]
    NoMatchingGroups,

    #[error("control inbox disconnected")]
    InboxDisconnected,
}
