//! DSP unit contract and real-time building blocks for dearjack.
//!
//! # Primary API
//!
//! - [`DspUnit`]: processing contract shared by every signal generator
//! - [`ParamValue`] / [`ParamSet`] / [`ParamHandle`]: lock-free named parameters
//! - [`Oscillator`]: built-in sine, square and sawtooth generators
//! - [`DspFactory`]: thread-safe registry that creates units by type name
//! - [`PolyDsp`]: N voices of one unit type mixed into a single stream
//!
//! # Example
//!
//! ```
//! use dearjack_core::{DspFactory, DspUnit, ParamValue};
//!
//! let factory = DspFactory::default();
//! let mut osc = factory.create("SinOsc").unwrap();
//! osc.set_parameter("frequency", ParamValue::Float(220.0)).unwrap();
//!
//! let mut out = vec![0.0f32; 64];
//! osc.process_audio(64, &[], &mut [&mut out[..]], 48_000.0);
//! ```

#[macro_use]
mod macros;

pub mod error;
pub use error::{Error, Result};

pub(crate) mod lockfree;
pub use lockfree::{AtomicDouble, AtomicFlag};

pub mod value;
pub use value::{ParamKind, ParamValue};

pub mod parameter;
pub use parameter::{
    ParamHandle, ParamSet, ParamSpec, ParameterBag, ParameterEntry, ParameterRange,
    ParameterScale, ParameterSnapshot,
};

pub mod unit;
pub use unit::DspUnit;

pub mod oscillator;
pub use oscillator::{Oscillator, Waveform};

pub mod registry;
pub use registry::{DspConstructor, DspFactory};

pub mod poly;
pub use poly::PolyDsp;

/// Largest block a [`PolyDsp`] mixes in one pass; longer calls are chunked.
pub const MAX_BLOCK_SIZE: usize = 2048;

/// Maximum number of ports per direction handled without heap allocation.
pub const MAX_CHANNELS: usize = 16;

/// Type names of the built-in generators.
pub mod types {
    pub const SIN_OSC: &str = "SinOsc";
    pub const SQUARE_WAVE: &str = "SquareWave";
    pub const SAW_WAVE: &str = "SawWave";
}
