//! Phase-accumulator oscillators: sine, square and sawtooth.

use crate::parameter::{ParamHandle, ParamSet, ParamSpec, ParameterRange};
use crate::types;
use crate::unit::DspUnit;
use std::f64::consts::{PI, TAU};
use std::sync::Arc;

const FREQUENCY: usize = 0;
const AMPLITUDE: usize = 1;

pub const DEFAULT_FREQUENCY: f64 = 440.0;
pub const DEFAULT_AMPLITUDE: f64 = 0.5;

/// Oscillator waveform type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Saw,
}

impl Waveform {
    /// Raw waveform value in [-1, 1] for a phase in [0, 2π).
    #[inline]
    pub fn value(self, phase: f64) -> f64 {
        match self {
            Self::Sine => phase.sin(),
            Self::Square => {
                if phase < PI {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::Saw => phase / PI - 1.0,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Self::Sine => types::SIN_OSC,
            Self::Square => types::SQUARE_WAVE,
            Self::Saw => types::SAW_WAVE,
        }
    }
}

/// Single-output generator driven by a phase accumulator.
///
/// Parameters: `frequency` (Hz) and `amplitude` (linear gain), both floats.
/// The phase is the only audio-rate state and carries over between calls.
pub struct Oscillator {
    waveform: Waveform,
    phase: f64,
    params: Arc<ParamSet>,
    handle: ParamHandle,
}

impl Oscillator {
    pub fn new(waveform: Waveform) -> Self {
        let params = Arc::new(ParamSet::new([
            ParamSpec::float("frequency", DEFAULT_FREQUENCY)
                .range(ParameterRange::logarithmic(20.0, 20_000.0)),
            ParamSpec::float("amplitude", DEFAULT_AMPLITUDE)
                .range(ParameterRange::linear(0.0, 1.0)),
        ]));
        let handle: ParamHandle = params.clone();

        Self {
            waveform,
            phase: 0.0,
            params,
            handle,
        }
    }

    pub fn sine() -> Self {
        Self::new(Waveform::Sine)
    }

    pub fn square() -> Self {
        Self::new(Waveform::Square)
    }

    pub fn saw() -> Self {
        Self::new(Waveform::Saw)
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Current phase in [0, 2π).
    pub fn phase(&self) -> f64 {
        self.phase
    }

    #[inline]
    fn advance(&mut self, increment: f64) {
        self.phase = (self.phase + increment).rem_euclid(TAU);
    }
}

impl DspUnit for Oscillator {
    fn type_name(&self) -> &str {
        self.waveform.type_name()
    }

    fn num_inputs(&self) -> usize {
        0
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn process_audio(
        &mut self,
        frames: usize,
        _inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        sample_rate: f64,
    ) {
        let frequency = self.params.float_at(FREQUENCY);
        let amplitude = self.params.float_at(AMPLITUDE);
        let increment = if sample_rate > 0.0 {
            TAU * frequency / sample_rate
        } else {
            0.0
        };

        let Some((first, rest)) = outputs.split_first_mut() else {
            self.advance(increment * frames as f64);
            return;
        };

        let frames = frames.min(first.len());
        for sample in first[..frames].iter_mut() {
            *sample = (self.waveform.value(self.phase) * amplitude) as f32;
            self.advance(increment);
        }

        for out in rest.iter_mut() {
            let n = frames.min(out.len());
            out[..n].copy_from_slice(&first[..n]);
        }
    }

    fn parameters(&self) -> &ParamHandle {
        &self.handle
    }
}
