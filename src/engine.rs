//! DearJackEngine - owns the factory, the worker pool and the running clients.

use crate::builder::DearJackEngineBuilder;
use crate::config::EngineConfig;
use crate::{Error, Result};
use crossbeam_channel::Receiver;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dearjack_client::{AudioBackend, AudioClient, ClientState};
use dearjack_core::{AtomicFlag, DspFactory, DspUnit, ParamHandle, ParamValue, ParameterSnapshot};
use dearjack_worker::WorkerPool;
use std::fmt;
use std::sync::Arc;

/// What to run in a new client.
///
/// # Example
/// ```
/// use dearjack::ClientSpec;
///
/// let spec = ClientSpec::new("Pad", "SinOsc")
///     .voices(4)
///     .param("frequency", 220.0)
///     .param("amplitude", 0.1);
/// assert_eq!(spec.name(), "Pad");
/// ```
#[derive(Debug, Clone)]
pub struct ClientSpec {
    name: String,
    dsp_type: String,
    voices: Option<usize>,
    params: Vec<(String, ParamValue)>,
}

impl ClientSpec {
    pub fn new(name: impl Into<String>, dsp_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dsp_type: dsp_type.into(),
            voices: None,
            params: Vec::new(),
        }
    }

    /// Wrap the unit in a [`PolyDsp`](dearjack_core::PolyDsp) of `count` voices.
    pub fn voices(mut self, count: usize) -> Self {
        self.voices = Some(count);
        self
    }

    /// Initial parameter value, applied before the client activates.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Initial parameter values, e.g. from [`params!`](dearjack_core::params).
    pub fn params(mut self, values: impl IntoIterator<Item = (String, ParamValue)>) -> Self {
        self.params.extend(values);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dsp_type(&self) -> &str {
        &self.dsp_type
    }
}

/// Control-surface handle to a running client. Cheap to clone.
#[derive(Clone)]
pub struct ClientHandle {
    client: Arc<AudioClient>,
}

impl ClientHandle {
    pub fn name(&self) -> &str {
        self.client.name()
    }

    pub fn type_name(&self) -> &str {
        self.client.type_name()
    }

    pub fn num_inputs(&self) -> usize {
        self.client.num_inputs()
    }

    pub fn num_outputs(&self) -> usize {
        self.client.num_outputs()
    }

    pub fn state(&self) -> ClientState {
        self.client.state()
    }

    pub fn is_active(&self) -> bool {
        self.client.is_active()
    }

    pub fn parameters(&self) -> &ParamHandle {
        self.client.parameters()
    }

    pub fn set_parameter(&self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        Ok(self.client.set_parameter(name, value.into())?)
    }

    pub fn get_parameter(&self, name: &str) -> Result<ParamValue> {
        Ok(self.client.get_parameter(name)?)
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.client.parameter_names()
    }

    pub fn snapshot(&self) -> ParameterSnapshot {
        self.client.snapshot()
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("name", &self.name())
            .field("type_name", &self.type_name())
            .field("state", &self.state())
            .finish()
    }
}

/// Result of a job handed to the worker pool.
pub struct Pending<T> {
    rx: Receiver<Result<T>>,
}

impl<T> Pending<T> {
    /// Block until the job finishes.
    pub fn wait(self) -> Result<T> {
        self.rx.recv().map_err(|_| Error::TaskDropped)?
    }

    /// The job's result if it has finished.
    pub fn try_wait(&self) -> Option<Result<T>> {
        self.rx.try_recv().ok()
    }
}

struct EngineInner {
    backend: Arc<dyn AudioBackend>,
    factory: DspFactory,
    clients: DashMap<String, Arc<AudioClient>>,
    config: EngineConfig,
    shut_down: AtomicFlag,
}

impl EngineInner {
    fn spawn(&self, spec: ClientSpec) -> Result<ClientHandle> {
        if self.shut_down.get() {
            return Err(Error::ShutDown);
        }
        // A name freed by the server can be reused.
        if let Some((name, stale)) = self
            .clients
            .remove_if(&spec.name, |_, client| client.state() == ClientState::Shutdown)
        {
            stale.close()?;
            tracing::debug!(client = %name, "dropped client shut down by the server");
        }
        if self.clients.contains_key(&spec.name) {
            return Err(Error::ClientExists(spec.name));
        }
        if self.clients.len() >= self.config.max_clients {
            return Err(Error::InvalidConfig(format!(
                "client limit of {} reached",
                self.config.max_clients
            )));
        }

        let dsp: Box<dyn DspUnit> = match spec.voices {
            None => self.factory.create(&spec.dsp_type)?,
            Some(voices) => Box::new(self.factory.create_poly(&spec.dsp_type, voices)?),
        };
        for (name, value) in spec.params {
            dsp.set_parameter(&name, value)?;
        }

        let client = Arc::new(AudioClient::new(self.backend.as_ref(), &spec.name, dsp)?);

        let inserted = match self.clients.entry(spec.name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&client));
                true
            }
            Entry::Occupied(_) => false,
        };
        if !inserted {
            client.close()?;
            return Err(Error::ClientExists(spec.name));
        }

        tracing::info!(
            client = %spec.name,
            dsp = %spec.dsp_type,
            voices = spec.voices.unwrap_or(1),
            "spawned client"
        );
        Ok(ClientHandle { client })
    }

    fn remove(&self, name: &str) -> Result<()> {
        let (_, client) = self
            .clients
            .remove(name)
            .ok_or_else(|| Error::UnknownClient(name.to_string()))?;
        client.close()?;
        tracing::info!(client = name, "removed client");
        Ok(())
    }

    fn close_all(&self) {
        let names: Vec<String> = self.clients.iter().map(|e| e.key().clone()).collect();
        for name in names {
            if let Some((_, client)) = self.clients.remove(&name) {
                if let Err(err) = client.close() {
                    tracing::warn!(client = %name, error = %err, "failed to close client");
                }
            }
        }
    }
}

/// Real-time DSP host.
///
/// Creates DSP units by type name, hosts each one in its own audio client and
/// keeps the clients' parameter handles for the control surface.
///
/// # Example
///
/// ```
/// use dearjack::prelude::*;
///
/// let server = DummyBackend::new(48_000.0);
/// let engine = DearJackEngine::builder()
///     .backend(Arc::new(server.clone()))
///     .worker_threads(1)
///     .build()
///     .unwrap();
///
/// let lead = engine.spawn_client(ClientSpec::new("Lead", "SawWave")).unwrap();
/// lead.set_parameter("frequency", 110.0).unwrap();
///
/// server.run_cycle(128);
/// engine.shutdown();
/// ```
pub struct DearJackEngine {
    inner: Arc<EngineInner>,
    pool: WorkerPool,
}

impl DearJackEngine {
    pub fn builder() -> DearJackEngineBuilder {
        DearJackEngineBuilder::default()
    }

    pub(crate) fn from_parts(
        backend: Arc<dyn AudioBackend>,
        factory: DspFactory,
        pool: WorkerPool,
        config: EngineConfig,
    ) -> Self {
        tracing::info!(
            backend = backend.name(),
            workers = pool.size(),
            max_clients = config.max_clients,
            "engine started"
        );
        Self {
            inner: Arc::new(EngineInner {
                backend,
                factory,
                clients: DashMap::new(),
                config,
                shut_down: AtomicFlag::new(false),
            }),
            pool,
        }
    }

    /// Create the unit described by `spec` and run it in a new client.
    ///
    /// A client the server shut down is replaced rather than reported as a
    /// duplicate. Fails with [`Error::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn spawn_client(&self, spec: ClientSpec) -> Result<ClientHandle> {
        self.inner.spawn(spec)
    }

    /// Same as [`spawn_client`](Self::spawn_client), on the worker pool.
    pub fn spawn_client_async(&self, spec: ClientSpec) -> Result<Pending<ClientHandle>> {
        let inner = Arc::clone(&self.inner);
        let rx = self.pool.submit(move || inner.spawn(spec))?;
        Ok(Pending { rx })
    }

    /// Close a client and forget it.
    pub fn remove_client(&self, name: &str) -> Result<()> {
        self.inner.remove(name)
    }

    pub fn remove_client_async(&self, name: &str) -> Result<Pending<()>> {
        let inner = Arc::clone(&self.inner);
        let name = name.to_string();
        let rx = self.pool.submit(move || inner.remove(&name))?;
        Ok(Pending { rx })
    }

    pub fn client(&self, name: &str) -> Option<ClientHandle> {
        self.inner.clients.get(name).map(|entry| ClientHandle {
            client: Arc::clone(entry.value()),
        })
    }

    /// Running client names, sorted.
    pub fn client_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .clients
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn client_count(&self) -> usize {
        self.inner.clients.len()
    }

    /// Current parameter values of a client, for display.
    pub fn inspect(&self, name: &str) -> Result<ParameterSnapshot> {
        self.inner
            .clients
            .get(name)
            .map(|entry| entry.value().snapshot())
            .ok_or_else(|| Error::UnknownClient(name.to_string()))
    }

    pub fn factory(&self) -> &DspFactory {
        &self.inner.factory
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.inner.backend
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Finish queued jobs, then close every client and refuse new ones. Idempotent.
    pub fn shutdown(&self) {
        self.pool.shutdown();
        self.inner.shut_down.set(true);
        self.inner.close_all();
        tracing::debug!("engine shut down");
    }
}

impl Drop for DearJackEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for DearJackEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DearJackEngine")
            .field("backend", &self.inner.backend.name())
            .field("clients", &self.client_names())
            .field("pool", &self.pool)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dearjack_client::DummyBackend;

    fn engine(server: &DummyBackend) -> DearJackEngine {
        DearJackEngine::builder()
            .backend(Arc::new(server.clone()))
            .worker_threads(2)
            .build()
            .unwrap()
    }

    #[test]
    fn test_spawn_and_remove() {
        let server = DummyBackend::default();
        let engine = engine(&server);

        let handle = engine.spawn_client(ClientSpec::new("Lead", "SinOsc")).unwrap();
        assert_eq!(handle.type_name(), "SinOsc");
        assert!(handle.is_active());
        assert_eq!(engine.client_names(), vec!["Lead"]);
        assert!(server.is_active("Lead"));

        engine.remove_client("Lead").unwrap();
        assert!(engine.client("Lead").is_none());
        assert!(!server.is_open("Lead"));
        assert_eq!(handle.state(), ClientState::Closed);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let server = DummyBackend::default();
        let engine = engine(&server);

        engine.spawn_client(ClientSpec::new("Lead", "SinOsc")).unwrap();
        assert!(matches!(
            engine.spawn_client(ClientSpec::new("Lead", "SawWave")),
            Err(Error::ClientExists(_))
        ));
    }

    #[test]
    fn test_unknown_type_opens_nothing() {
        let server = DummyBackend::default();
        let engine = engine(&server);

        assert!(matches!(
            engine.spawn_client(ClientSpec::new("X", "Theremin")),
            Err(Error::Core(dearjack_core::Error::UnknownType(_)))
        ));
        assert!(server.client_names().is_empty());
    }

    #[test]
    fn test_initial_params_applied() {
        let server = DummyBackend::default();
        let engine = engine(&server);

        let handle = engine
            .spawn_client(ClientSpec::new("Pad", "SinOsc").voices(3).param("frequency", 220.0))
            .unwrap();
        assert_eq!(handle.get_parameter("frequency").unwrap(), ParamValue::Float(220.0));

        let snapshot = engine.inspect("Pad").unwrap();
        assert_eq!(snapshot.get("frequency"), Some(&ParamValue::Float(220.0)));
        assert!(matches!(engine.inspect("Nope"), Err(Error::UnknownClient(_))));
    }

    #[test]
    fn test_wrong_param_type_rejected() {
        let server = DummyBackend::default();
        let engine = engine(&server);

        let result =
            engine.spawn_client(ClientSpec::new("Lead", "SinOsc").param("frequency", "high"));
        assert!(matches!(
            result,
            Err(Error::Core(dearjack_core::Error::TypeMismatch { .. }))
        ));
        assert!(!server.is_open("Lead"));
    }

    #[test]
    fn test_client_limit() {
        let server = DummyBackend::default();
        let engine = DearJackEngine::builder()
            .backend(Arc::new(server.clone()))
            .worker_threads(1)
            .max_clients(1)
            .build()
            .unwrap();

        engine.spawn_client(ClientSpec::new("A", "SinOsc")).unwrap();
        assert!(matches!(
            engine.spawn_client(ClientSpec::new("B", "SinOsc")),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_remove_unknown() {
        let server = DummyBackend::default();
        let engine = engine(&server);
        assert!(matches!(engine.remove_client("ghost"), Err(Error::UnknownClient(_))));
    }

    #[test]
    fn test_shutdown_closes_everything() {
        let server = DummyBackend::default();
        let engine = engine(&server);
        engine.spawn_client(ClientSpec::new("A", "SinOsc")).unwrap();
        engine.spawn_client(ClientSpec::new("B", "SquareWave")).unwrap();

        engine.shutdown();
        assert_eq!(engine.client_count(), 0);
        assert!(server.client_names().is_empty());
        assert!(matches!(
            engine.spawn_client_async(ClientSpec::new("C", "SinOsc")),
            Err(Error::Worker(dearjack_worker::Error::ShutDown))
        ));
        assert!(matches!(
            engine.spawn_client(ClientSpec::new("C", "SinOsc")),
            Err(Error::ShutDown)
        ));
        assert!(!server.is_open("C"));

        engine.shutdown();
    }

    #[test]
    fn test_name_reusable_after_server_shutdown() {
        let server = DummyBackend::default();
        let engine = engine(&server);
        let old = engine.spawn_client(ClientSpec::new("Lead", "SinOsc")).unwrap();

        server.shutdown_server();
        assert_eq!(old.state(), ClientState::Shutdown);

        let new = engine.spawn_client(ClientSpec::new("Lead", "SawWave")).unwrap();
        assert_eq!(new.type_name(), "SawWave");
        assert!(new.is_active());
        assert_eq!(old.state(), ClientState::Closed);
        assert_eq!(engine.client_count(), 1);
        assert!(server.is_active("Lead"));
    }
}
