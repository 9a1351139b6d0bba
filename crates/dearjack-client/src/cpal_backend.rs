//! CPAL-backed audio server.
//!
//! Each client drives its own output stream on the chosen output device.
//! Input ports are fed from the default input device through a ring buffer;
//! without an input device they receive silence.

use crate::backend::{
    AudioBackend, AudioConnection, PortDirection, PortId, ProcessCallback, ProcessScope,
    ShutdownCallback,
};
use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use dearjack_core::MAX_CHANNELS;
use parking_lot::Mutex;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::sync::Arc;

/// Capacity of the capture ring, in frames.
const INPUT_RING_FRAMES: usize = 8192;

type SharedShutdown = Arc<Mutex<Option<ShutdownCallback>>>;

/// Wrapper to hold `cpal::Stream` in a `Send` context.
///
/// # Safety
/// `cpal::Stream` is `!Send` due to platform internals. The stream is only
/// created, kept and dropped by its connection, which is itself only
/// reached through the owning client's mutex.
struct StreamHandle(#[allow(dead_code)] cpal::Stream);

unsafe impl Send for StreamHandle {}

/// Audio server on top of the system's default CPAL host.
pub struct CpalBackend {
    device_index: Option<usize>,
    clients: Arc<Mutex<HashSet<String>>>,
}

impl CpalBackend {
    /// Use the default output device.
    pub fn new() -> Self {
        Self {
            device_index: None,
            clients: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Use the output device at `index` in [`CpalBackend::list_devices`].
    pub fn with_output_device(index: usize) -> Self {
        Self {
            device_index: Some(index),
            ..Self::new()
        }
    }

    pub fn device_name(&self) -> Result<String> {
        Ok(output_device(self.device_index)?.name()?)
    }

    pub fn list_devices() -> Result<Vec<String>> {
        cpal::default_host()
            .output_devices()?
            .enumerate()
            .map(|(i, d)| Ok(format!("{i}: {}", d.name()?)))
            .collect()
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn open(&self, client_name: &str) -> Result<Box<dyn AudioConnection>> {
        let device = output_device(self.device_index)?;
        let config = device.default_output_config()?;

        if !self.clients.lock().insert(client_name.to_string()) {
            return Err(Error::OpenFailed {
                name: client_name.to_string(),
                reason: "client name already in use".into(),
            });
        }

        tracing::debug!(
            client = client_name,
            device = %device.name().unwrap_or_default(),
            sample_rate = config.sample_rate().0,
            channels = config.channels(),
            "opened CPAL connection"
        );

        Ok(Box::new(CpalConnection {
            name: client_name.to_string(),
            clients: Arc::clone(&self.clients),
            device_index: self.device_index,
            config,
            ports: Vec::new(),
            process: None,
            shutdown: Arc::new(Mutex::new(None)),
            streams: Vec::new(),
            closed: false,
        }))
    }
}

fn output_device(index: Option<usize>) -> Result<cpal::Device> {
    let host = cpal::default_host();

    match index {
        Some(i) => {
            let devices: Vec<_> = host.output_devices()?.collect();
            let count = devices.len();
            devices.into_iter().nth(i).ok_or_else(|| {
                Error::InvalidDevice(format!("Device index {i} out of range ({count} available)"))
            })
        }
        None => host
            .default_output_device()
            .ok_or_else(|| Error::InvalidDevice("No output device available".into())),
    }
}

struct CpalConnection {
    name: String,
    clients: Arc<Mutex<HashSet<String>>>,
    device_index: Option<usize>,
    config: cpal::SupportedStreamConfig,
    ports: Vec<PortId>,
    process: Option<ProcessCallback>,
    shutdown: SharedShutdown,
    streams: Vec<StreamHandle>,
    closed: bool,
}

impl CpalConnection {
    fn ports(&self, direction: PortDirection) -> SmallVec<[PortId; MAX_CHANNELS]> {
        self.ports
            .iter()
            .filter(|port| port.direction() == direction)
            .copied()
            .collect()
    }

    fn activation_error(&self, reason: impl Into<String>) -> Error {
        Error::ActivateFailed {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn release(&mut self) {
        self.streams.clear();
        if !self.closed {
            self.clients.lock().remove(&self.name);
            self.closed = true;
        }
    }
}

impl AudioConnection for CpalConnection {
    fn client_name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> f64 {
        self.config.sample_rate().0 as f64
    }

    fn register_port(&mut self, direction: PortDirection, index: usize) -> Result<PortId> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        let id = PortId::new(direction, index);
        let reason = if !self.streams.is_empty() {
            Some("client is already active")
        } else if self.ports.contains(&id) {
            Some("port already registered")
        } else if self.ports(direction).len() >= MAX_CHANNELS {
            Some("too many ports")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(Error::PortRegistration {
                port: id.name(),
                reason: reason.into(),
            });
        }

        self.ports.push(id);
        Ok(id)
    }

    fn set_process_callback(&mut self, callback: ProcessCallback) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        self.process = Some(callback);
        Ok(())
    }

    fn set_shutdown_callback(&mut self, callback: ShutdownCallback) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        *self.shutdown.lock() = Some(callback);
        Ok(())
    }

    fn activate(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        if !self.streams.is_empty() {
            return Ok(());
        }
        let process = self
            .process
            .take()
            .ok_or_else(|| self.activation_error("no process callback installed"))?;

        let inputs = self.ports(PortDirection::Input);
        let outputs = self.ports(PortDirection::Output);

        let mut streams = Vec::new();
        let capture = if inputs.is_empty() {
            None
        } else {
            match open_capture(&self.name, &self.shutdown)? {
                Some((stream, capture)) => {
                    streams.push(stream);
                    Some(capture)
                }
                None => {
                    tracing::warn!(
                        client = %self.name,
                        "no input device, input ports receive silence"
                    );
                    None
                }
            }
        };

        let cycle = Cycle {
            process,
            inputs,
            outputs,
            sample_rate: self.sample_rate(),
            input_buffers: Vec::new(),
            output_buffers: Vec::new(),
            capture,
        };

        let device = output_device(self.device_index)?;
        let config: cpal::StreamConfig = self.config.clone().into();
        let on_error = stream_error_handler(self.name.clone(), Arc::clone(&self.shutdown));

        let stream = match self.config.sample_format() {
            cpal::SampleFormat::F32 => {
                build_output_stream::<f32>(&device, &config, cycle, on_error)?
            }
            cpal::SampleFormat::I16 => {
                build_output_stream::<i16>(&device, &config, cycle, on_error)?
            }
            cpal::SampleFormat::U16 => {
                build_output_stream::<u16>(&device, &config, cycle, on_error)?
            }
            format => return Err(Error::UnsupportedFormat(format!("{format:?}"))),
        };

        stream.play()?;
        streams.push(StreamHandle(stream));
        self.streams = streams;

        tracing::debug!(client = %self.name, "CPAL streams started");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.release();
        Ok(())
    }
}

impl Drop for CpalConnection {
    fn drop(&mut self) {
        self.release();
    }
}

/// Everything the output stream callback owns.
struct Cycle {
    process: ProcessCallback,
    inputs: SmallVec<[PortId; MAX_CHANNELS]>,
    outputs: SmallVec<[PortId; MAX_CHANNELS]>,
    sample_rate: f64,
    /// Planar buffers, one per port (grow on first callback, then stable).
    input_buffers: Vec<Vec<f32>>,
    output_buffers: Vec<Vec<f32>>,
    capture: Option<Capture>,
}

struct Capture {
    consumer: HeapCons<f32>,
    channels: usize,
    interleaved: Vec<f32>,
}

impl Cycle {
    fn run(&mut self, frames: usize) {
        prepare(&mut self.input_buffers, self.inputs.len(), frames);
        prepare(&mut self.output_buffers, self.outputs.len(), frames);

        if let Some(capture) = self.capture.as_mut() {
            capture.read(&mut self.input_buffers, frames);
        }

        let mut ports: SmallVec<[(PortId, *mut f32); 32]> = SmallVec::new();
        for (port, buffer) in self.inputs.iter().zip(self.input_buffers.iter_mut()) {
            ports.push((*port, buffer.as_mut_ptr()));
        }
        for (port, buffer) in self.outputs.iter().zip(self.output_buffers.iter_mut()) {
            ports.push((*port, buffer.as_mut_ptr()));
        }

        let scope = CpalScope {
            frames,
            sample_rate: self.sample_rate,
            ports,
        };
        (self.process)(&scope);
    }

    /// Interleave the output ports into the device buffer. A mono unit feeds
    /// every device channel; otherwise port `n` feeds channel `n`.
    fn write_output<T: cpal::SizedSample + cpal::FromSample<f32>>(
        &self,
        data: &mut [T],
        channels: usize,
    ) {
        let ports = self.output_buffers.len();
        for (i, sample) in data.iter_mut().enumerate() {
            let frame = i / channels;
            let ch = i % channels;
            let value = match ports {
                0 => 0.0,
                1 => self.output_buffers[0][frame],
                _ if ch < ports => self.output_buffers[ch][frame],
                _ => 0.0,
            };
            *sample = T::from_sample(value);
        }
    }
}

impl Capture {
    fn read(&mut self, inputs: &mut [Vec<f32>], frames: usize) {
        let needed = frames * self.channels;
        if self.interleaved.len() < needed {
            self.interleaved.resize(needed, 0.0);
        }
        let read = self.consumer.pop_slice(&mut self.interleaved[..needed]);
        self.interleaved[read..needed].fill(0.0);

        for (ch, buffer) in inputs.iter_mut().enumerate() {
            if ch >= self.channels {
                break;
            }
            for (frame, sample) in buffer[..frames].iter_mut().enumerate() {
                *sample = self.interleaved[frame * self.channels + ch];
            }
        }
    }
}

fn prepare(buffers: &mut Vec<Vec<f32>>, ports: usize, frames: usize) {
    buffers.resize_with(ports, Vec::new);
    for buffer in buffers.iter_mut() {
        if buffer.len() != frames {
            buffer.resize(frames, 0.0);
        }
        buffer.fill(0.0);
    }
}

struct CpalScope {
    frames: usize,
    sample_rate: f64,
    ports: SmallVec<[(PortId, *mut f32); 32]>,
}

// SAFETY: each pointer addresses a distinct planar buffer resized to
// `frames` before the process callback runs; the buffers are not touched
// again until it returns.
unsafe impl ProcessScope for CpalScope {
    fn n_frames(&self) -> usize {
        self.frames
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn port_buffer(&self, port: PortId) -> *mut f32 {
        self.ports
            .iter()
            .find(|(id, _)| *id == port)
            .map_or(std::ptr::null_mut(), |(_, ptr)| *ptr)
    }
}

fn stream_error_handler(
    name: String,
    shutdown: SharedShutdown,
) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| match err {
        cpal::StreamError::DeviceNotAvailable => {
            if let Some(mut callback) = shutdown.lock().take() {
                callback();
            }
        }
        other => tracing::warn!(client = %name, error = %other, "audio stream error"),
    }
}

fn build_output_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut cycle: Cycle,
    on_error: impl FnMut(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels;
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                cycle.run(frames);
            }));

            match result {
                Ok(()) => cycle.write_output(data, channels),
                Err(_) => output_silence(data),
            }
        },
        on_error,
        None,
    )?;

    Ok(stream)
}

fn open_capture(name: &str, shutdown: &SharedShutdown) -> Result<Option<(StreamHandle, Capture)>> {
    let Some(device) = cpal::default_host().default_input_device() else {
        return Ok(None);
    };
    let supported = device.default_input_config()?;
    let channels = supported.channels() as usize;
    let config: cpal::StreamConfig = supported.clone().into();

    let (producer, consumer) = HeapRb::<f32>::new(INPUT_RING_FRAMES * channels).split();
    let on_error = stream_error_handler(name.to_string(), Arc::clone(shutdown));

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_input_stream::<f32>(&device, &config, producer, on_error)?,
        cpal::SampleFormat::I16 => build_input_stream::<i16>(&device, &config, producer, on_error)?,
        cpal::SampleFormat::U16 => build_input_stream::<u16>(&device, &config, producer, on_error)?,
        format => return Err(Error::UnsupportedFormat(format!("{format:?}"))),
    };
    stream.play()?;

    Ok(Some((
        StreamHandle(stream),
        Capture {
            consumer,
            channels,
            interleaved: Vec::new(),
        },
    )))
}

fn build_input_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut producer: HeapProd<f32>,
    on_error: impl FnMut(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            for &sample in data {
                let _ = producer.try_push(sample.to_sample::<f32>());
            }
        },
        on_error,
        None,
    )?;

    Ok(stream)
}

/// Output silence (panic recovery).
#[inline]
fn output_silence<T: cpal::SizedSample + cpal::FromSample<f32>>(data: &mut [T]) {
    for sample in data.iter_mut() {
        *sample = T::from_sample(0.0);
    }
}
