//! DSP Factory for dynamic unit creation
//!
//! Maps type names to constructors so units can be created by name from a
//! control surface or configuration. Names are case-sensitive exact matches.

use crate::oscillator::Oscillator;
use crate::poly::PolyDsp;
use crate::types;
use crate::unit::DspUnit;
use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Function that constructs a fresh, fully initialized unit
pub type DspConstructor = Arc<dyn Fn() -> Box<dyn DspUnit> + Send + Sync>;

/// Registry of unit constructors.
///
/// Cloning is cheap and clones share the same table, so one factory can be
/// handed to the engine, the worker pool and the control surface.
pub struct DspFactory {
    constructors: Arc<RwLock<HashMap<String, DspConstructor>>>,
}

impl DspFactory {
    /// Create a new empty factory
    pub fn new() -> Self {
        Self {
            constructors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a constructor. Re-registering a name replaces the previous constructor.
    ///
    /// # Example
    /// ```
    /// use dearjack_core::{DspFactory, Oscillator};
    ///
    /// let factory = DspFactory::new();
    /// factory.register("Lead", || Box::new(Oscillator::saw()));
    /// assert!(factory.has_type("Lead"));
    /// ```
    pub fn register<F>(&self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn DspUnit> + Send + Sync + 'static,
    {
        let name = name.into();
        let replaced = self
            .constructors
            .write()
            .insert(name.clone(), Arc::new(constructor))
            .is_some();
        tracing::debug!(%name, replaced, "registered DSP type");
    }

    /// Create a unit from a registered name.
    pub fn create(&self, name: &str) -> Result<Box<dyn DspUnit>> {
        let constructor = self.constructor(name)?;
        tracing::trace!(name, "creating DSP unit");
        Ok(constructor())
    }

    /// Create a polyphonic unit with `voices` instances of a registered type.
    pub fn create_poly(&self, name: &str, voices: usize) -> Result<PolyDsp> {
        PolyDsp::new(self.constructor(name)?, voices)
    }

    /// The constructor registered under `name`.
    ///
    /// The table lock is released before the constructor runs.
    pub fn constructor(&self, name: &str) -> Result<DspConstructor> {
        self.constructors
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    /// Registered type names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a type is registered
    pub fn has_type(&self, name: &str) -> bool {
        self.constructors.read().contains_key(name)
    }

    /// Unregister a type
    pub fn unregister(&self, name: &str) -> bool {
        self.constructors.write().remove(name).is_some()
    }
}

impl Default for DspFactory {
    fn default() -> Self {
        let factory = Self::new();
        register_builtin_units(&factory);
        factory
    }
}

impl Clone for DspFactory {
    fn clone(&self) -> Self {
        Self {
            constructors: Arc::clone(&self.constructors),
        }
    }
}

impl std::fmt::Debug for DspFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DspFactory")
            .field("types", &self.list())
            .finish()
    }
}

/// Register built-in unit types
fn register_builtin_units(factory: &DspFactory) {
    factory.register(types::SIN_OSC, || Box::new(Oscillator::sine()));
    factory.register(types::SQUARE_WAVE, || Box::new(Oscillator::square()));
    factory.register(types::SAW_WAVE, || Box::new(Oscillator::saw()));
}
