//! Builder for configuring and constructing a `DearJackEngine`.

use crate::config::EngineConfig;
use crate::{DearJackEngine, Result};
use dearjack_client::AudioBackend;
use dearjack_core::DspFactory;
use dearjack_worker::WorkerPool;
use std::sync::Arc;

/// Without an explicit backend the engine talks to the system audio server
/// through CPAL (feature `cpal`). Without an explicit factory it starts with
/// the built-in oscillators registered.
///
/// # Example
///
/// ```ignore
/// use dearjack::prelude::*;
///
/// let engine = DearJackEngine::builder()
///     .worker_threads(2)
///     .build()?;
///
/// let pad = engine.spawn_client(ClientSpec::new("Pad", "SinOsc").voices(4))?;
/// pad.set_parameter("frequency", 220.0)?;
/// ```
#[derive(Default)]
pub struct DearJackEngineBuilder {
    backend: Option<Arc<dyn AudioBackend>>,
    factory: Option<DspFactory>,
    config: EngineConfig,
}

impl DearJackEngineBuilder {
    pub fn backend(mut self, backend: Arc<dyn AudioBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Share an existing factory; types registered on it later are visible
    /// to the engine.
    pub fn factory(mut self, factory: DspFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Default: available hardware parallelism
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = Some(count);
        self
    }

    /// Default: 64
    pub fn max_clients(mut self, count: usize) -> Self {
        self.config.max_clients = count;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<DearJackEngine> {
        self.config.validate()?;

        let backend = match self.backend {
            Some(backend) => backend,
            None => default_backend()?,
        };

        let pool = match self.config.worker_threads {
            Some(size) => WorkerPool::new(size)?,
            None => WorkerPool::with_default_size()?,
        };

        Ok(DearJackEngine::from_parts(
            backend,
            self.factory.unwrap_or_default(),
            pool,
            self.config,
        ))
    }
}

#[cfg(feature = "cpal")]
fn default_backend() -> Result<Arc<dyn AudioBackend>> {
    Ok(Arc::new(dearjack_client::CpalBackend::new()))
}

#[cfg(not(feature = "cpal"))]
fn default_backend() -> Result<Arc<dyn AudioBackend>> {
    Err(crate::Error::InvalidConfig(
        "no audio backend given and the `cpal` feature is disabled".into(),
    ))
}
