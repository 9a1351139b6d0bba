//! The processing contract every DSP unit implements.

use crate::parameter::ParamHandle;
use crate::value::ParamValue;
use crate::Result;

/// A signal generator or transformer with a fixed channel shape and named parameters.
///
/// `process_audio` runs on the audio thread and takes `&mut self`; the
/// parameter methods take `&self` and go through the unit's lock-free
/// [`ParamHandle`], so the control thread can hold a clone of that handle
/// while the unit itself lives inside an audio callback.
pub trait DspUnit: Send {
    /// Factory type name, e.g. `"SinOsc"`.
    fn type_name(&self) -> &str;

    /// Number of input channels. Fixed for the unit's lifetime.
    fn num_inputs(&self) -> usize;

    /// Number of output channels. Fixed for the unit's lifetime.
    fn num_outputs(&self) -> usize;

    /// Render `frames` samples into every output buffer.
    ///
    /// Parameters are read once per call and held for the whole buffer.
    /// Every buffer holds at least `frames` samples. Must not allocate,
    /// block or panic.
    fn process_audio(
        &mut self,
        frames: usize,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        sample_rate: f64,
    );

    fn parameters(&self) -> &ParamHandle;

    fn set_parameter(&self, name: &str, value: ParamValue) -> Result<()> {
        self.parameters().set(name, value)
    }

    fn get_parameter(&self, name: &str) -> Result<ParamValue> {
        self.parameters().get(name)
    }

    fn parameter_names(&self) -> Vec<String> {
        self.parameters().names()
    }
}

/// Allow boxed units to be used as units (for dynamic dispatch).
impl DspUnit for Box<dyn DspUnit> {
    fn type_name(&self) -> &str {
        (**self).type_name()
    }

    fn num_inputs(&self) -> usize {
        (**self).num_inputs()
    }

    fn num_outputs(&self) -> usize {
        (**self).num_outputs()
    }

    fn process_audio(
        &mut self,
        frames: usize,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        sample_rate: f64,
    ) {
        (**self).process_audio(frames, inputs, outputs, sample_rate)
    }

    fn parameters(&self) -> &ParamHandle {
        (**self).parameters()
    }
}
