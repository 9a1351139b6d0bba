//! Tagged parameter values.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of a named DSP control.
///
/// The tag is part of the value: reading a `Float` parameter as an integer is
/// an error, never a cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Text(String),
}

/// Tag of a [`ParamValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Float,
    Int,
    Text,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Float => "float",
            Self::Int => "integer",
            Self::Text => "text",
        })
    }
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Float(_) => ParamKind::Float,
            Self::Int(_) => ParamKind::Int,
            Self::Text(_) => ParamKind::Text,
        }
    }

    /// Read as float. `name` is only used for the error message.
    pub fn as_float(&self, name: &str) -> Result<f64> {
        match self {
            Self::Float(f) => Ok(*f),
            other => Err(mismatch(name, ParamKind::Float, other.kind())),
        }
    }

    pub fn as_int(&self, name: &str) -> Result<i64> {
        match self {
            Self::Int(i) => Ok(*i),
            other => Err(mismatch(name, ParamKind::Int, other.kind())),
        }
    }

    pub fn as_text(&self, name: &str) -> Result<&str> {
        match self {
            Self::Text(s) => Ok(s.as_str()),
            other => Err(mismatch(name, ParamKind::Text, other.kind())),
        }
    }
}

fn mismatch(name: &str, expected: ParamKind, found: ParamKind) -> Error {
    Error::TypeMismatch {
        name: name.to_string(),
        expected,
        found,
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<f32> for ParamValue {
    fn from(f: f32) -> Self {
        Self::Float(f as f64)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for ParamValue {
    fn from(i: i32) -> Self {
        Self::Int(i as i64)
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}
