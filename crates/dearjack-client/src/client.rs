//! Audio client: hosts one DSP unit inside a server's process callback.

use crate::backend::{
    AudioBackend, AudioConnection, PortDirection, PortId, ProcessCallback, ProcessScope,
    ShutdownCallback,
};
use crate::{Error, Result};
use dearjack_core::{DspUnit, ParamHandle, ParamValue, ParameterSnapshot, MAX_CHANNELS};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

type PortList = SmallVec<[PortId; MAX_CHANNELS]>;

/// Lifecycle of an [`AudioClient`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Unopened = 0,
    Open = 1,
    Activated = 2,
    /// The server dropped the client.
    Shutdown = 3,
    Closed = 4,
}

impl ClientState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Unopened,
            1 => Self::Open,
            2 => Self::Activated,
            3 => Self::Shutdown,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unopened => "unopened",
            Self::Open => "open",
            Self::Activated => "activated",
            Self::Shutdown => "shutdown",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new(state: ClientState) -> Self {
        Self(Arc::new(AtomicU8::new(state as u8)))
    }

    fn load(&self) -> ClientState {
        ClientState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn store(&self, state: ClientState) {
        self.0.store(state as u8, Ordering::Release);
    }

    fn swap(&self, state: ClientState) -> ClientState {
        ClientState::from_u8(self.0.swap(state as u8, Ordering::AcqRel))
    }

    fn transition(&self, from: ClientState, to: ClientState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// A named session on an audio server that runs one DSP unit per buffer.
///
/// Construction opens the connection, registers one port per unit channel,
/// installs the callbacks and activates. The unit moves into the process
/// callback; the control side keeps the unit's [`ParamHandle`].
pub struct AudioClient {
    name: String,
    type_name: String,
    num_inputs: usize,
    num_outputs: usize,
    params: ParamHandle,
    state: SharedState,
    connection: Mutex<Option<Box<dyn AudioConnection>>>,
}

impl AudioClient {
    pub fn new(
        backend: &dyn AudioBackend,
        client_name: &str,
        dsp: Box<dyn DspUnit>,
    ) -> Result<Self> {
        let num_inputs = dsp.num_inputs();
        let num_outputs = dsp.num_outputs();
        for (direction, ports) in [
            (PortDirection::Input, num_inputs),
            (PortDirection::Output, num_outputs),
        ] {
            if ports > MAX_CHANNELS {
                return Err(Error::TooManyPorts {
                    direction,
                    ports,
                    max: MAX_CHANNELS,
                });
            }
        }

        let type_name = dsp.type_name().to_string();
        let params = dsp.parameters().clone();
        let state = SharedState::new(ClientState::Unopened);

        let mut connection = backend.open(client_name)?;
        state.store(ClientState::Open);
        tracing::debug!(client = client_name, backend = backend.name(), "opened audio client");

        if let Err(err) = start(connection.as_mut(), dsp, &state) {
            tracing::warn!(
                client = client_name,
                error = %err,
                "client setup failed, closing connection"
            );
            if let Err(close_err) = connection.close() {
                tracing::warn!(
                    client = client_name,
                    error = %close_err,
                    "failed to close connection"
                );
            }
            state.store(ClientState::Closed);
            return Err(err);
        }

        tracing::info!(
            client = client_name,
            dsp = %type_name,
            inputs = num_inputs,
            outputs = num_outputs,
            "audio client activated"
        );

        Ok(Self {
            name: client_name.to_string(),
            type_name,
            num_inputs,
            num_outputs,
            params,
            state,
            connection: Mutex::new(Some(connection)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ClientState {
        self.state.load()
    }

    pub fn is_active(&self) -> bool {
        self.state() == ClientState::Activated
    }

    /// Type name of the hosted unit.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Server sample rate, while the connection is held.
    pub fn sample_rate(&self) -> Option<f64> {
        self.connection.lock().as_ref().map(|c| c.sample_rate())
    }

    pub fn parameters(&self) -> &ParamHandle {
        &self.params
    }

    pub fn set_parameter(&self, name: &str, value: ParamValue) -> dearjack_core::Result<()> {
        self.params.set(name, value)
    }

    pub fn get_parameter(&self, name: &str) -> dearjack_core::Result<ParamValue> {
        self.params.get(name)
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.params.names()
    }

    pub fn snapshot(&self) -> ParameterSnapshot {
        self.params.snapshot()
    }

    /// Release the connection. Idempotent.
    ///
    /// After a server-initiated shutdown the connection is dropped without
    /// calling back into the server.
    pub fn close(&self) -> Result<()> {
        let Some(mut connection) = self.connection.lock().take() else {
            return Ok(());
        };

        match self.state.swap(ClientState::Closed) {
            ClientState::Shutdown => {
                tracing::debug!(client = %self.name, "dropping connection of shut down client");
                Ok(())
            }
            _ => {
                connection.close()?;
                tracing::info!(client = %self.name, "audio client closed");
                Ok(())
            }
        }
    }
}

impl Drop for AudioClient {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(client = %self.name, error = %err, "error closing audio client");
        }
    }
}

impl fmt::Debug for AudioClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioClient")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("state", &self.state())
            .finish()
    }
}

fn start(
    connection: &mut dyn AudioConnection,
    dsp: Box<dyn DspUnit>,
    state: &SharedState,
) -> Result<()> {
    let inputs = register_ports(connection, PortDirection::Input, dsp.num_inputs())?;
    let outputs = register_ports(connection, PortDirection::Output, dsp.num_outputs())?;

    connection.set_process_callback(process_callback(dsp, inputs, outputs))?;

    let name = connection.client_name().to_string();
    connection.set_shutdown_callback(shutdown_callback(state.clone(), name))?;

    connection.activate()?;
    state.transition(ClientState::Open, ClientState::Activated);
    Ok(())
}

/// Marks a live client as shut down. A client already closed stays closed.
fn shutdown_callback(state: SharedState, name: String) -> ShutdownCallback {
    Box::new(move || {
        let live = state.transition(ClientState::Activated, ClientState::Shutdown)
            || state.transition(ClientState::Open, ClientState::Shutdown);
        if live {
            tracing::warn!(client = %name, "audio server shut down the client");
        } else {
            tracing::debug!(client = %name, state = %state.load(), "ignoring late server shutdown");
        }
    })
}

fn register_ports(
    connection: &mut dyn AudioConnection,
    direction: PortDirection,
    count: usize,
) -> Result<PortList> {
    (0..count)
        .map(|index| connection.register_port(direction, index))
        .collect()
}

fn process_callback(
    mut dsp: Box<dyn DspUnit>,
    inputs: PortList,
    outputs: PortList,
) -> ProcessCallback {
    Box::new(move |scope: &dyn ProcessScope| {
        let frames = scope.n_frames();
        let sample_rate = scope.sample_rate();

        // SAFETY: ProcessScope guarantees each pointer covers n_frames
        // samples for the duration of this call and that ports never alias.
        let input_buffers: SmallVec<[&[f32]; MAX_CHANNELS]> = inputs
            .iter()
            .map(|port| unsafe { input_slice(scope, *port, frames) })
            .collect();
        let mut output_buffers: SmallVec<[&mut [f32]; MAX_CHANNELS]> = outputs
            .iter()
            .map(|port| unsafe { output_slice(scope, *port, frames) })
            .collect();

        let complete = input_buffers.iter().all(|b| b.len() == frames)
            && output_buffers.iter().all(|b| b.len() == frames);

        let processed = complete
            && std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                dsp.process_audio(frames, &input_buffers, &mut output_buffers, sample_rate);
            }))
            .is_ok();

        if !processed {
            for buffer in output_buffers.iter_mut() {
                buffer.fill(0.0);
            }
        }
    })
}

unsafe fn input_slice<'a>(scope: &'a dyn ProcessScope, port: PortId, frames: usize) -> &'a [f32] {
    let ptr = scope.port_buffer(port);
    if ptr.is_null() {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, frames)
    }
}

#[allow(clippy::mut_from_ref)]
unsafe fn output_slice<'a>(
    scope: &'a dyn ProcessScope,
    port: PortId,
    frames: usize,
) -> &'a mut [f32] {
    let ptr = scope.port_buffer(port);
    if ptr.is_null() {
        &mut []
    } else {
        std::slice::from_raw_parts_mut(ptr, frames)
    }
}
