//! Error types for dearjack-core.

use crate::value::ParamKind;
use thiserror::Error;

/// Error type for dearjack-core operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Unknown DSP type: {0}")]
    UnknownType(String),

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Type mismatch for '{name}': expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: ParamKind,
        found: ParamKind,
    },

    #[error("Invalid voice count: {0}. Must be at least 1")]
    InvalidVoiceCount(usize),

    #[error("Voice index {index} out of range ({voices} voices)")]
    VoiceIndexOutOfRange { index: usize, voices: usize },

    #[error("Voices disagree on their shape: {0}")]
    VoiceMismatch(String),

    #[error("Too many channels: {channels} (max {max})")]
    TooManyChannels { channels: usize, max: usize },
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
