//! Named, lock-free parameter storage shared between the control and audio threads.
//!
//! A DSP unit owns an [`Arc<ParamSet>`](ParamSet) and reads it by slot index on
//! the audio thread; the control surface and the display layer hold the same
//! set as a [`ParamHandle`] and address it by name. Every slot is a single
//! atomic cell, so neither side ever waits on the other.
//!
//! # Example
//!
//! ```
//! use dearjack_core::{ParamSet, ParamSpec, ParameterBag, ParameterRange, ParamValue};
//!
//! let params = ParamSet::new([
//!     ParamSpec::float("cutoff", 1000.0).range(ParameterRange::logarithmic(20.0, 20000.0)),
//!     ParamSpec::int("stages", 2),
//! ]);
//!
//! params.set("cutoff", ParamValue::Float(250.0)).unwrap();
//! assert_eq!(params.get("cutoff").unwrap(), ParamValue::Float(250.0));
//! assert_eq!(params.names(), vec!["cutoff", "stages"]);
//! ```

use crate::lockfree::AtomicDouble;
use crate::value::{ParamKind, ParamValue};
use crate::{Error, Result};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// How a parameter value maps to a normalized (0-1) control position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ParameterScale {
    /// `real = min + normalized * (max - min)`
    #[default]
    Linear,

    /// `real = min * (max/min)^normalized`
    ///
    /// Requires `min > 0` and `max > min`.
    Logarithmic,

    /// Discrete integer steps between `min` and `max`.
    Integer,
}

/// Valid range of a parameter, as a hint for the display layer.
///
/// The core never clamps written values; a control panel uses the range to
/// size its widgets and to clamp user input before calling `set`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
    pub scale: ParameterScale,
}

impl ParameterRange {
    pub fn new(min: f64, max: f64, scale: ParameterScale) -> Self {
        debug_assert!(max > min, "max must be greater than min");
        Self { min, max, scale }
    }

    pub fn linear(min: f64, max: f64) -> Self {
        Self::new(min, max, ParameterScale::Linear)
    }

    /// # Panics
    ///
    /// Panics in debug mode if `min <= 0`.
    pub fn logarithmic(min: f64, max: f64) -> Self {
        debug_assert!(min > 0.0, "logarithmic scale requires min > 0");
        Self::new(min, max, ParameterScale::Logarithmic)
    }

    pub fn integer(min: i64, max: i64) -> Self {
        Self::new(min as f64, max as f64, ParameterScale::Integer)
    }

    /// Convert a real value to normalized (0.0-1.0).
    #[inline]
    pub fn normalize(&self, value: f64) -> f64 {
        let value = self.clamp(value);
        let span = self.max - self.min;

        if span <= 0.0 {
            return 0.0;
        }

        match self.scale {
            ParameterScale::Linear => (value - self.min) / span,

            ParameterScale::Logarithmic => {
                if self.min <= 0.0 {
                    (value - self.min) / span
                } else {
                    let log_min = self.min.ln();
                    let log_max = self.max.ln();
                    (value.ln() - log_min) / (log_max - log_min)
                }
            }

            ParameterScale::Integer => (value.round() - self.min) / span,
        }
    }

    /// Convert a normalized value (0.0-1.0) to a real value.
    #[inline]
    pub fn denormalize(&self, normalized: f64) -> f64 {
        let normalized = normalized.clamp(0.0, 1.0);
        let span = self.max - self.min;

        match self.scale {
            ParameterScale::Linear => self.min + normalized * span,

            ParameterScale::Logarithmic => {
                if self.min <= 0.0 {
                    self.min + normalized * span
                } else {
                    let log_min = self.min.ln();
                    let log_max = self.max.ln();
                    (log_min + normalized * (log_max - log_min)).exp()
                }
            }

            ParameterScale::Integer => (self.min + normalized * span).round(),
        }
    }

    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Declaration of one parameter slot: name, initial value, optional range.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    name: String,
    default: ParamValue,
    range: Option<ParameterRange>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, default: impl Into<ParamValue>) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
            range: None,
        }
    }

    pub fn float(name: impl Into<String>, default: f64) -> Self {
        Self::new(name, ParamValue::Float(default))
    }

    pub fn int(name: impl Into<String>, default: i64) -> Self {
        Self::new(name, ParamValue::Int(default))
    }

    pub fn text(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self::new(name, ParamValue::Text(default.into()))
    }

    /// Attach a display range.
    pub fn range(mut self, range: ParameterRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

enum Cell {
    Float(AtomicDouble),
    Int(AtomicI64),
    Text(ArcSwap<String>),
}

impl Cell {
    fn new(value: ParamValue) -> Self {
        match value {
            ParamValue::Float(f) => Self::Float(AtomicDouble::new(f)),
            ParamValue::Int(i) => Self::Int(AtomicI64::new(i)),
            ParamValue::Text(s) => Self::Text(ArcSwap::from_pointee(s)),
        }
    }

    fn kind(&self) -> ParamKind {
        match self {
            Self::Float(_) => ParamKind::Float,
            Self::Int(_) => ParamKind::Int,
            Self::Text(_) => ParamKind::Text,
        }
    }

    fn load(&self) -> ParamValue {
        match self {
            Self::Float(cell) => ParamValue::Float(cell.get()),
            Self::Int(cell) => ParamValue::Int(cell.load(Ordering::Acquire)),
            Self::Text(cell) => ParamValue::Text(cell.load().as_ref().clone()),
        }
    }
}

struct Slot {
    name: String,
    cell: Cell,
    range: Option<ParameterRange>,
}

/// Ordered, fixed set of lock-free parameter slots.
///
/// The set of names and their tags never change after construction.
pub struct ParamSet {
    slots: Box<[Slot]>,
}

impl ParamSet {
    /// Build a set from slot declarations. A repeated name keeps its first declaration.
    pub fn new(specs: impl IntoIterator<Item = ParamSpec>) -> Self {
        let mut slots: Vec<Slot> = Vec::new();
        for spec in specs {
            if slots.iter().any(|slot| slot.name == spec.name) {
                tracing::warn!(name = %spec.name, "duplicate parameter declaration ignored");
                continue;
            }
            slots.push(Slot {
                name: spec.name,
                cell: Cell::new(spec.default),
                range: spec.range,
            });
        }

        Self {
            slots: slots.into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot index for `name`, for units that cache indices at construction.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|slot| slot.name == name)
    }

    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.slots.get(index).map(|slot| slot.name.as_str())
    }

    pub fn kind_at(&self, index: usize) -> Option<ParamKind> {
        self.slots.get(index).map(|slot| slot.cell.kind())
    }

    /// Real-time read of a float slot.
    ///
    /// Returns 0.0 for an out-of-range index or a non-float slot; both are
    /// programming errors in the unit that owns the set.
    #[inline]
    pub fn float_at(&self, index: usize) -> f64 {
        match self.slots.get(index).map(|slot| &slot.cell) {
            Some(Cell::Float(cell)) => cell.get(),
            _ => {
                debug_assert!(false, "slot {index} is not a float parameter");
                0.0
            }
        }
    }

    /// Real-time read of an integer slot. Same fallback rules as [`float_at`](Self::float_at).
    #[inline]
    pub fn int_at(&self, index: usize) -> i64 {
        match self.slots.get(index).map(|slot| &slot.cell) {
            Some(Cell::Int(cell)) => cell.load(Ordering::Acquire),
            _ => {
                debug_assert!(false, "slot {index} is not an integer parameter");
                0
            }
        }
    }

    /// Read a text slot without copying the string.
    #[inline]
    pub fn text_at(&self, index: usize) -> Option<Arc<String>> {
        match self.slots.get(index).map(|slot| &slot.cell) {
            Some(Cell::Text(cell)) => Some(cell.load_full()),
            _ => None,
        }
    }

    pub fn value_at(&self, index: usize) -> Option<ParamValue> {
        self.slots.get(index).map(|slot| slot.cell.load())
    }

    fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.name == name)
    }
}

impl std::fmt::Debug for ParamSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.slots.iter().map(|slot| (&slot.name, slot.cell.load())))
            .finish()
    }
}

/// Named parameter access shared by the control surface and the display layer.
pub trait ParameterBag: Send + Sync {
    /// Recognized names in stable declaration order.
    fn names(&self) -> Vec<String>;

    /// Current value, or [`Error::UnknownParameter`].
    fn get(&self, name: &str) -> Result<ParamValue>;

    /// Store `value` under `name`.
    ///
    /// Unknown names are ignored and return `Ok(())`. A known name written
    /// with a different tag returns [`Error::TypeMismatch`] and keeps the old value.
    fn set(&self, name: &str, value: ParamValue) -> Result<()>;

    /// Display range for `name`, if one was declared.
    fn range(&self, name: &str) -> Option<ParameterRange>;

    /// Every parameter with its current value, in declaration order.
    fn snapshot(&self) -> ParameterSnapshot {
        let entries = self
            .names()
            .into_iter()
            .filter_map(|name| {
                let value = self.get(&name).ok()?;
                let range = self.range(&name);
                Some(ParameterEntry { name, value, range })
            })
            .collect();
        ParameterSnapshot { entries }
    }
}

/// Shared handle to a unit's parameters.
pub type ParamHandle = Arc<dyn ParameterBag>;

impl ParameterBag for ParamSet {
    fn names(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.name.clone()).collect()
    }

    fn get(&self, name: &str) -> Result<ParamValue> {
        self.slot(name)
            .map(|slot| slot.cell.load())
            .ok_or_else(|| Error::UnknownParameter(name.to_string()))
    }

    fn set(&self, name: &str, value: ParamValue) -> Result<()> {
        let Some(slot) = self.slot(name) else {
            tracing::trace!(name, "ignoring write to unknown parameter");
            return Ok(());
        };

        match (&slot.cell, value) {
            (Cell::Float(cell), ParamValue::Float(f)) => cell.set(f),
            (Cell::Int(cell), ParamValue::Int(i)) => cell.store(i, Ordering::Release),
            (Cell::Text(cell), ParamValue::Text(s)) => cell.store(Arc::new(s)),
            (cell, value) => {
                return Err(Error::TypeMismatch {
                    name: name.to_string(),
                    expected: cell.kind(),
                    found: value.kind(),
                })
            }
        }
        Ok(())
    }

    fn range(&self, name: &str) -> Option<ParameterRange> {
        self.slot(name).and_then(|slot| slot.range)
    }
}

/// One row of a [`ParameterSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub name: String,
    pub value: ParamValue,
    pub range: Option<ParameterRange>,
}

/// Point-in-time view of a unit's parameters, for rendering controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub entries: Vec<ParameterEntry>,
}

impl ParameterSnapshot {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
