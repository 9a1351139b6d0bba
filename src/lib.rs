//! # dearjack - Real-time DSP host
//!
//! Hosts interchangeable DSP units inside low-latency audio callbacks, with
//! polyphonic voice stacking and lock-free parameter control.
//!
//! ## Architecture
//!
//! dearjack is an umbrella crate that coordinates:
//! - **dearjack-core** - DSP unit contract, parameters, oscillators, factory, polyphony
//! - **dearjack-client** - Audio server boundary, client lifecycle, dummy and CPAL servers
//! - **dearjack-worker** - Worker pool for blocking client setup and teardown
//!
//! ## Quick Start
//!
//! ```ignore
//! use dearjack::prelude::*;
//!
//! let engine = DearJackEngine::builder().build()?;
//!
//! let lead = engine.spawn_client(ClientSpec::new("Lead", "SinOsc").voices(4))?;
//! lead.set_parameter("frequency", 220.0)?;
//!
//! engine.shutdown();
//! ```
//!
//! ## Feature Flags
//!
//! - `cpal` (default) - system audio through CPAL

/// Re-export of dearjack-core for direct access
pub use dearjack_core as core;

/// Re-export of dearjack-client for direct access
pub use dearjack_client as client;

/// Re-export of dearjack-worker for direct access
pub use dearjack_worker as worker;

pub use dearjack_core::{
    params, DspConstructor, DspFactory, DspUnit, Oscillator, ParamHandle, ParamKind, ParamValue,
    ParameterBag, ParameterRange, ParameterSnapshot, PolyDsp, Waveform,
};

pub use dearjack_client::{AudioBackend, AudioClient, ClientState, DummyBackend};

#[cfg(feature = "cpal")]
pub use dearjack_client::CpalBackend;

pub use dearjack_worker::WorkerPool;

mod error;
pub use error::{Error, Result};

mod config;
pub use config::EngineConfig;

mod builder;
pub use builder::DearJackEngineBuilder;

mod engine;
pub use engine::{ClientHandle, ClientSpec, DearJackEngine, Pending};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        params, ClientHandle, ClientSpec, DearJackEngine, DspFactory, DspUnit, DummyBackend,
        EngineConfig, Error, ParamValue, Result,
    };

    #[cfg(feature = "cpal")]
    pub use crate::CpalBackend;

    pub use std::sync::Arc;
}
