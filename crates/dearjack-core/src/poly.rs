//! Polyphonic DSP: N voices of one unit type summed into one stream.
//!
//! The voice array and the scratch buffer are allocated once in
//! [`PolyDsp::new`]. Control writes land in one ensemble parameter set and
//! mark the slots they touched; `process_audio` copies marked slots into
//! every voice before rendering, so all voices change on the same buffer.
//! Neither side takes a lock.

use crate::lockfree::AtomicFlag;
use crate::parameter::{ParamHandle, ParamSet, ParamSpec, ParameterBag, ParameterRange};
use crate::registry::DspConstructor;
use crate::unit::DspUnit;
use crate::value::ParamValue;
use crate::{Error, Result, MAX_BLOCK_SIZE, MAX_CHANNELS};
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Parameter view over every voice of a [`PolyDsp`].
///
/// Holds the ensemble values. Reads see a write immediately; the voices pick
/// it up at the start of the next `process_audio` call. Writing a text slot
/// costs one string copy per voice on that call.
pub struct PolyParams {
    values: ParamSet,
    dirty: Box<[AtomicFlag]>,
    version: AtomicU64,
}

impl PolyParams {
    /// Mirror the declarations and current values of `template`.
    fn from_template(template: &dyn ParameterBag) -> Self {
        let specs = template.snapshot().entries.into_iter().map(|entry| {
            let spec = ParamSpec::new(entry.name, entry.value);
            match entry.range {
                Some(range) => spec.range(range),
                None => spec,
            }
        });
        let values = ParamSet::new(specs);
        let dirty = (0..values.len()).map(|_| AtomicFlag::new(false)).collect();

        Self {
            values,
            dirty,
            version: AtomicU64::new(0),
        }
    }

    fn slot(&self, index: usize) -> Option<(&str, ParamValue)> {
        Some((self.values.name_at(index)?, self.values.value_at(index)?))
    }

    /// Write every ensemble value into `voice`. Allocates for text slots.
    fn copy_all(&self, voice: &dyn DspUnit) -> Result<()> {
        for index in 0..self.values.len() {
            if let Some((name, value)) = self.slot(index) {
                voice.set_parameter(name, value)?;
            }
        }
        Ok(())
    }

    /// Push slots written since the last call into every voice.
    ///
    /// Each slot is read once and the same value goes to all voices.
    fn sync(&self, seen: &mut u64, voices: &[Box<dyn DspUnit>]) {
        let version = self.version.load(Ordering::Acquire);
        if version == *seen {
            return;
        }
        *seen = version;

        for (index, dirty) in self.dirty.iter().enumerate() {
            if !dirty.swap(false) {
                continue;
            }
            let Some((name, value)) = self.slot(index) else {
                continue;
            };
            for voice in voices {
                let _ = voice.set_parameter(name, value.clone());
            }
        }
    }
}

impl ParameterBag for PolyParams {
    fn names(&self) -> Vec<String> {
        self.values.names()
    }

    fn get(&self, name: &str) -> Result<ParamValue> {
        self.values.get(name)
    }

    fn set(&self, name: &str, value: ParamValue) -> Result<()> {
        let Some(index) = self.values.index_of(name) else {
            tracing::trace!(name, "ignoring write to unknown parameter");
            return Ok(());
        };
        self.values.set(name, value)?;
        self.dirty[index].set(true);
        self.version.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn range(&self, name: &str) -> Option<ParameterRange> {
        self.values.range(name)
    }
}

/// A composite unit owning a fixed number of identical voices.
///
/// Output is the plain sum of the voices; nothing compensates for the voice
/// count, so loud ensembles can exceed [-1, 1].
pub struct PolyDsp {
    type_name: String,
    voices: Box<[Box<dyn DspUnit>]>,
    constructor: DspConstructor,
    params: Arc<PolyParams>,
    handle: ParamHandle,
    /// Last ensemble version copied into the voices.
    seen: u64,
    /// `num_outputs` consecutive channels of `MAX_BLOCK_SIZE` samples.
    scratch: Box<[f32]>,
    num_inputs: usize,
    num_outputs: usize,
}

impl PolyDsp {
    /// Build `voices` instances with `constructor`.
    ///
    /// Voice 0's initial values become the ensemble values and are copied
    /// into the other voices.
    pub fn new(constructor: DspConstructor, voices: usize) -> Result<Self> {
        if voices == 0 {
            return Err(Error::InvalidVoiceCount(voices));
        }

        let units: Vec<Box<dyn DspUnit>> = (0..voices).map(|_| constructor()).collect();

        let first = &units[0];
        let type_name = first.type_name().to_string();
        let num_inputs = first.num_inputs();
        let num_outputs = first.num_outputs();
        let names = first.parameter_names();

        let channels = num_inputs.max(num_outputs);
        if channels > MAX_CHANNELS {
            return Err(Error::TooManyChannels {
                channels,
                max: MAX_CHANNELS,
            });
        }

        for unit in &units[1..] {
            check_shape(unit.as_ref(), num_inputs, num_outputs, &names)?;
        }

        let params = Arc::new(PolyParams::from_template(first.parameters().as_ref()));
        for unit in &units[1..] {
            params.copy_all(unit.as_ref())?;
        }
        let handle: ParamHandle = params.clone();

        tracing::debug!(%type_name, voices, "built polyphonic unit");

        Ok(Self {
            type_name,
            voices: units.into_boxed_slice(),
            constructor,
            params,
            handle,
            seen: 0,
            scratch: vec![0.0; MAX_BLOCK_SIZE * num_outputs].into_boxed_slice(),
            num_inputs,
            num_outputs,
        })
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// A single voice, for inspection.
    ///
    /// Its parameters trail the ensemble until the next `process_audio` call.
    pub fn voice(&self, index: usize) -> Option<&dyn DspUnit> {
        self.voices.get(index).map(|voice| voice.as_ref())
    }

    /// Refill slot `index` with a fresh voice from the stored constructor.
    ///
    /// The new voice starts from the ensemble's current parameter values and
    /// a reset audio state. Allocates; not for the audio thread.
    pub fn replace_voice(&mut self, index: usize) -> Result<()> {
        let voices = self.voices.len();
        if index >= voices {
            return Err(Error::VoiceIndexOutOfRange { index, voices });
        }

        let fresh = (self.constructor)();
        check_shape(
            fresh.as_ref(),
            self.num_inputs,
            self.num_outputs,
            &self.params.names(),
        )?;

        self.params.copy_all(fresh.as_ref())?;
        self.voices[index] = fresh;

        tracing::debug!(type_name = %self.type_name, index, "replaced voice");
        Ok(())
    }
}

fn check_shape(
    unit: &dyn DspUnit,
    num_inputs: usize,
    num_outputs: usize,
    names: &[String],
) -> Result<()> {
    if unit.num_inputs() != num_inputs || unit.num_outputs() != num_outputs {
        return Err(Error::VoiceMismatch(format!(
            "expected {num_inputs} in / {num_outputs} out, got {} / {}",
            unit.num_inputs(),
            unit.num_outputs()
        )));
    }
    if unit.parameter_names() != names {
        return Err(Error::VoiceMismatch(format!(
            "parameter names differ: {:?}",
            unit.parameter_names()
        )));
    }
    Ok(())
}

impl DspUnit for PolyDsp {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    fn process_audio(
        &mut self,
        frames: usize,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        sample_rate: f64,
    ) {
        let frames = inputs
            .iter()
            .map(|input| input.len())
            .chain(outputs.iter().map(|out| out.len()))
            .fold(frames, usize::min);

        self.params.sync(&mut self.seen, &self.voices);

        for out in outputs.iter_mut() {
            out[..frames].fill(0.0);
        }

        let mut offset = 0;
        while offset < frames {
            let block = (frames - offset).min(MAX_BLOCK_SIZE);
            let end = offset + block;

            let block_inputs: SmallVec<[&[f32]; MAX_CHANNELS]> =
                inputs.iter().map(|input| &input[offset..end]).collect();

            for voice in self.voices.iter_mut() {
                let mut scratch: SmallVec<[&mut [f32]; MAX_CHANNELS]> = self
                    .scratch
                    .chunks_mut(MAX_BLOCK_SIZE)
                    .map(|channel| &mut channel[..block])
                    .collect();
                for channel in scratch.iter_mut() {
                    channel.fill(0.0);
                }

                voice.process_audio(block, &block_inputs, &mut scratch, sample_rate);

                for (out, channel) in outputs.iter_mut().zip(scratch.iter()) {
                    for (o, v) in out[offset..end].iter_mut().zip(channel.iter()) {
                        *o += *v;
                    }
                }
            }

            offset = end;
        }
    }

    fn parameters(&self) -> &ParamHandle {
        &self.handle
    }
}
