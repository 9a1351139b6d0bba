//! Error types for dearjack-client.

use crate::backend::PortDirection;
use thiserror::Error;

/// Error type for audio server and client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to open client '{name}': {reason}")]
    OpenFailed { name: String, reason: String },

    #[error("Failed to activate client '{name}': {reason}")]
    ActivateFailed { name: String, reason: String },

    #[error("Failed to register port '{port}': {reason}")]
    PortRegistration { port: String, reason: String },

    #[error("Unit has {ports} {direction} ports, at most {max} are supported")]
    TooManyPorts {
        direction: PortDirection,
        ports: usize,
        max: usize,
    },

    #[error("Connection to the audio server is closed")]
    ConnectionClosed,

    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[cfg(feature = "cpal")]
    #[error("Audio device not available")]
    DeviceNotAvailable(#[from] cpal::DefaultStreamConfigError),

    #[cfg(feature = "cpal")]
    #[error("Failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[cfg(feature = "cpal")]
    #[error("Failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[cfg(feature = "cpal")]
    #[error("Failed to enumerate devices")]
    DevicesError(#[from] cpal::DevicesError),

    #[cfg(feature = "cpal")]
    #[error("Failed to get device name")]
    DeviceNameError(#[from] cpal::DeviceNameError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
