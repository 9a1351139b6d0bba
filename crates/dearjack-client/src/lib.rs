//! Real-time audio client boundary for dearjack.
//!
//! An [`AudioClient`] hosts one [`DspUnit`](dearjack_core::DspUnit) inside
//! the process callback of an audio server reached through the
//! [`AudioBackend`] trait.
//!
//! # Servers
//!
//! - [`DummyBackend`]: in-process, manually clocked; for tests and offline rendering
//! - [`CpalBackend`]: system audio through CPAL (feature `cpal`, on by default)
//!
//! # Example
//!
//! ```
//! use dearjack_client::{AudioClient, DummyBackend};
//! use dearjack_core::Oscillator;
//!
//! let server = DummyBackend::new(48_000.0);
//! let client = AudioClient::new(&server, "Lead", Box::new(Oscillator::sine())).unwrap();
//!
//! server.run_cycle(256);
//! assert_eq!(server.output("Lead", 0).unwrap().len(), 256);
//! client.close().unwrap();
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod backend;
pub use backend::{
    AudioBackend, AudioConnection, PortDirection, PortId, ProcessCallback, ProcessScope,
    ShutdownCallback,
};

pub mod client;
pub use client::{AudioClient, ClientState};

pub mod dummy;
pub use dummy::DummyBackend;

#[cfg(feature = "cpal")]
pub mod cpal_backend;
#[cfg(feature = "cpal")]
pub use cpal_backend::CpalBackend;
