//! In-process audio server with manual cycle control.
//!
//! Nothing runs on its own: each [`DummyBackend::run_cycle`] call processes
//! every active client once on the calling thread. Used by the test suites
//! and for offline rendering.

use crate::backend::{
    AudioBackend, AudioConnection, PortDirection, PortId, ProcessCallback, ProcessScope,
    ShutdownCallback,
};
use crate::{Error, Result};
use dearjack_core::AtomicFlag;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_SAMPLE_RATE: f64 = 48_000.0;

struct Port {
    id: PortId,
    buffer: Vec<f32>,
}

struct Slot {
    name: String,
    ports: Vec<Port>,
    /// Samples fed to input ports on the next cycles, by port index.
    pending_input: HashMap<usize, Vec<f32>>,
    process: Option<ProcessCallback>,
    shutdown: Option<ShutdownCallback>,
    active: bool,
}

impl Slot {
    fn port(&self, id: PortId) -> Option<&Port> {
        self.ports.iter().find(|p| p.id == id)
    }
}

struct Server {
    sample_rate: f64,
    slots: Mutex<HashMap<u64, Slot>>,
    next_id: Mutex<u64>,
    reject_open: AtomicFlag,
    reject_activate: AtomicFlag,
}

impl Server {
    fn find<'a>(slots: &'a HashMap<u64, Slot>, name: &str) -> Option<&'a Slot> {
        slots.values().find(|slot| slot.name == name)
    }

    fn find_mut<'a>(slots: &'a mut HashMap<u64, Slot>, name: &str) -> Option<&'a mut Slot> {
        slots.values_mut().find(|slot| slot.name == name)
    }
}

/// Manually clocked audio server.
///
/// Clones share the same server.
#[derive(Clone)]
pub struct DummyBackend {
    server: Arc<Server>,
}

impl DummyBackend {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            server: Arc::new(Server {
                sample_rate,
                slots: Mutex::new(HashMap::new()),
                next_id: Mutex::new(0),
                reject_open: AtomicFlag::new(false),
                reject_activate: AtomicFlag::new(false),
            }),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.server.sample_rate
    }

    /// Run one process cycle of `frames` samples for every active client.
    ///
    /// Returns the number of clients processed.
    pub fn run_cycle(&self, frames: usize) -> usize {
        let mut slots = self.server.slots.lock();
        let mut processed = 0;

        for slot in slots.values_mut().filter(|slot| slot.active) {
            let Some(process) = slot.process.as_mut() else {
                continue;
            };

            for port in slot.ports.iter_mut() {
                port.buffer.clear();
                port.buffer.resize(frames, 0.0);
                if port.id.direction() == PortDirection::Input {
                    if let Some(pending) = slot.pending_input.get_mut(&port.id.index()) {
                        let n = frames.min(pending.len());
                        port.buffer[..n].copy_from_slice(&pending[..n]);
                        pending.drain(..n);
                    }
                }
            }

            let scope = DummyScope {
                frames,
                sample_rate: self.server.sample_rate,
                ports: slot
                    .ports
                    .iter_mut()
                    .map(|port| (port.id, port.buffer.as_mut_ptr()))
                    .collect(),
            };
            process(&scope);
            processed += 1;
        }

        processed
    }

    /// Queue samples for an input port of `client`. Consumed by the next
    /// cycles; silence once exhausted.
    pub fn set_input(&self, client: &str, index: usize, samples: &[f32]) -> bool {
        let mut slots = self.server.slots.lock();
        match Server::find_mut(&mut slots, client) {
            Some(slot) => {
                slot.pending_input
                    .entry(index)
                    .or_default()
                    .extend_from_slice(samples);
                true
            }
            None => false,
        }
    }

    /// Samples written to an output port during the last cycle.
    pub fn output(&self, client: &str, index: usize) -> Option<Vec<f32>> {
        let slots = self.server.slots.lock();
        Server::find(&slots, client)
            .and_then(|slot| slot.port(PortId::output(index)))
            .map(|port| port.buffer.clone())
    }

    /// Make subsequent `open` calls fail.
    pub fn reject_open(&self, reject: bool) {
        self.server.reject_open.set(reject);
    }

    /// Make subsequent `activate` calls fail.
    pub fn reject_activate(&self, reject: bool) {
        self.server.reject_activate.set(reject);
    }

    pub fn is_open(&self, client: &str) -> bool {
        Server::find(&self.server.slots.lock(), client).is_some()
    }

    pub fn is_active(&self, client: &str) -> bool {
        Server::find(&self.server.slots.lock(), client).is_some_and(|slot| slot.active)
    }

    pub fn client_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .server
            .slots
            .lock()
            .values()
            .map(|slot| slot.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Registered port names of `client`, in registration order.
    pub fn port_names(&self, client: &str) -> Option<Vec<String>> {
        Server::find(&self.server.slots.lock(), client)
            .map(|slot| slot.ports.iter().map(|port| port.id.name()).collect())
    }

    /// Drop every client as a dying server would, firing their shutdown
    /// callbacks.
    pub fn shutdown_server(&self) {
        let slots: Vec<Slot> = self.server.slots.lock().drain().map(|(_, slot)| slot).collect();
        tracing::debug!(clients = slots.len(), "dummy server shutting down");

        for mut slot in slots {
            if let Some(shutdown) = slot.shutdown.as_mut() {
                shutdown();
            }
        }
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl AudioBackend for DummyBackend {
    fn name(&self) -> &str {
        "dummy"
    }

    fn open(&self, client_name: &str) -> Result<Box<dyn AudioConnection>> {
        let reject = |reason: &str| Error::OpenFailed {
            name: client_name.to_string(),
            reason: reason.to_string(),
        };

        if self.server.reject_open.get() {
            return Err(reject("server refused the connection"));
        }

        let mut slots = self.server.slots.lock();
        if Server::find(&slots, client_name).is_some() {
            return Err(reject("client name already in use"));
        }

        let id = {
            let mut next = self.server.next_id.lock();
            *next += 1;
            *next
        };
        slots.insert(
            id,
            Slot {
                name: client_name.to_string(),
                ports: Vec::new(),
                pending_input: HashMap::new(),
                process: None,
                shutdown: None,
                active: false,
            },
        );

        Ok(Box::new(DummyConnection {
            server: Arc::clone(&self.server),
            id,
            name: client_name.to_string(),
        }))
    }
}

struct DummyConnection {
    server: Arc<Server>,
    id: u64,
    name: String,
}

impl DummyConnection {
    fn with_slot<T>(&self, f: impl FnOnce(&mut Slot) -> Result<T>) -> Result<T> {
        let mut slots = self.server.slots.lock();
        let slot = slots.get_mut(&self.id).ok_or(Error::ConnectionClosed)?;
        f(slot)
    }
}

impl AudioConnection for DummyConnection {
    fn client_name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> f64 {
        self.server.sample_rate
    }

    fn register_port(&mut self, direction: PortDirection, index: usize) -> Result<PortId> {
        let id = PortId::new(direction, index);
        self.with_slot(|slot| {
            if slot.port(id).is_some() {
                return Err(Error::PortRegistration {
                    port: id.name(),
                    reason: "port already registered".into(),
                });
            }
            slot.ports.push(Port {
                id,
                buffer: Vec::new(),
            });
            Ok(id)
        })
    }

    fn set_process_callback(&mut self, callback: ProcessCallback) -> Result<()> {
        self.with_slot(|slot| {
            slot.process = Some(callback);
            Ok(())
        })
    }

    fn set_shutdown_callback(&mut self, callback: ShutdownCallback) -> Result<()> {
        self.with_slot(|slot| {
            slot.shutdown = Some(callback);
            Ok(())
        })
    }

    fn activate(&mut self) -> Result<()> {
        if self.server.reject_activate.get() {
            return Err(Error::ActivateFailed {
                name: self.name.clone(),
                reason: "server refused activation".into(),
            });
        }
        self.with_slot(|slot| {
            slot.active = true;
            Ok(())
        })
    }

    fn close(&mut self) -> Result<()> {
        // Taking the slot lock waits for a running cycle to finish.
        self.server.slots.lock().remove(&self.id);
        Ok(())
    }
}

struct DummyScope {
    frames: usize,
    sample_rate: f64,
    ports: Vec<(PortId, *mut f32)>,
}

// SAFETY: every pointer comes from a distinct port buffer resized to
// `frames` just before the callback, and the slot lock is held until it
// returns.
unsafe impl ProcessScope for DummyScope {
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
