//! The audio I/O boundary: what a client needs from an audio server.
//!
//! A server hands out [`AudioConnection`]s. The connection registers ports,
//! takes the process and shutdown callbacks, and starts calling the process
//! callback once per buffer after [`AudioConnection::activate`].

use crate::Result;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Identifies one registered port of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId {
    direction: PortDirection,
    index: usize,
}

impl PortId {
    pub fn new(direction: PortDirection, index: usize) -> Self {
        Self { direction, index }
    }

    pub fn input(index: usize) -> Self {
        Self::new(PortDirection::Input, index)
    }

    pub fn output(index: usize) -> Self {
        Self::new(PortDirection::Output, index)
    }

    pub fn direction(&self) -> PortDirection {
        self.direction
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Server-visible port name: `input0`, `output1`, ...
    pub fn name(&self) -> String {
        format!("{}{}", self.direction, self.index)
    }
}

/// One process cycle as seen from inside the process callback.
///
/// # Safety
///
/// Implementors guarantee that every non-null pointer returned by
/// [`port_buffer`](Self::port_buffer) addresses `n_frames()` initialized
/// samples, stays valid until the callback returns, and never aliases the
/// buffer of another port. Unknown ports return null.
pub unsafe trait ProcessScope {
    fn n_frames(&self) -> usize;

    fn sample_rate(&self) -> f64;

    fn port_buffer(&self, port: PortId) -> *mut f32;
}

/// Called on the server's real-time thread once per buffer.
pub type ProcessCallback = Box<dyn FnMut(&dyn ProcessScope) + Send>;

/// Called from a server thread when the server drops the client.
pub type ShutdownCallback = Box<dyn FnMut() + Send>;

/// An open client session on an audio server.
pub trait AudioConnection: Send {
    fn client_name(&self) -> &str;

    /// Nominal sample rate of the server.
    fn sample_rate(&self) -> f64;

    fn register_port(&mut self, direction: PortDirection, index: usize) -> Result<PortId>;

    fn set_process_callback(&mut self, callback: ProcessCallback) -> Result<()>;

    fn set_shutdown_callback(&mut self, callback: ShutdownCallback) -> Result<()>;

    /// Start delivering process cycles.
    fn activate(&mut self) -> Result<()>;

    /// Stop processing and release the session. No process callback runs
    /// after this returns.
    fn close(&mut self) -> Result<()>;
}

/// An audio server clients can connect to.
pub trait AudioBackend: Send + Sync {
    fn name(&self) -> &str;

    fn open(&self, client_name: &str) -> Result<Box<dyn AudioConnection>>;
}
