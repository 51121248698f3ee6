//! Values that cross the host boundary.
//!
//! The host only ever sees [`HostValue`]s: plain data is copied, host-resident
//! objects travel as opaque [`HostRef`] ids, and managed callbacks travel as a
//! [`CallbackRef`] (a token plus the relay that resolves it).

use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::host::EventRelay;

/// Opaque id of an object living in the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostRef(u64);

impl HostRef {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host#{}", self.0)
    }
}

/// Token handed to the host in place of a managed object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackToken(u64);

impl CallbackToken {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callback#{}", self.0)
    }
}

/// A durable callback the host can invoke to relay events back.
#[derive(Clone)]
pub struct CallbackRef {
    pub token: CallbackToken,
    pub relay: Arc<dyn EventRelay>,
}

impl CallbackRef {
    pub fn new(token: CallbackToken, relay: Arc<dyn EventRelay>) -> Self {
        Self { token, relay }
    }
}

impl fmt::Debug for CallbackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRef")
            .field("token", &self.token)
            .field("relay", &"EventRelay { ... }")
            .finish()
    }
}

/// A value passed to or returned from the host.
#[derive(Debug, Clone)]
pub enum HostValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Bytes(Bytes),
    Object(HostRef),
    Array(Vec<HostValue>),
    Record(BTreeMap<String, HostValue>),
    Callback(CallbackRef),
}

impl HostValue {
    /// Name of the value's shape, used in conversion errors and host messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::Bytes(_) => "bytes",
            HostValue::Object(_) => "object",
            HostValue::Array(_) => "array",
            HostValue::Record(_) => "record",
            HostValue::Callback(_) => "callback",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    pub fn as_object(&self) -> Option<HostRef> {
        match self {
            HostValue::Object(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts into a typed value.
    pub fn cast<T: FromHostValue>(self) -> Result<T, ValueTypeError> {
        T::from_host_value(self)
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Number(a), HostValue::Number(b)) => a == b,
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::Bytes(a), HostValue::Bytes(b)) => a == b,
            (HostValue::Object(a), HostValue::Object(b)) => a == b,
            (HostValue::Array(a), HostValue::Array(b)) => a == b,
            (HostValue::Record(a), HostValue::Record(b)) => a == b,
            (HostValue::Callback(a), HostValue::Callback(b)) => a.token == b.token,
            _ => false,
        }
    }
}

/// The host returned a value of an unexpected shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected {expected}, found {found}")]
pub struct ValueTypeError {
    pub expected: &'static str,
    pub found: &'static str,
}

impl ValueTypeError {
    fn new(expected: &'static str, value: &HostValue) -> Self {
        Self {
            expected,
            found: value.kind_name(),
        }
    }
}

/// Typed extraction of a [`HostValue`].
pub trait FromHostValue: Sized {
    fn from_host_value(value: HostValue) -> Result<Self, ValueTypeError>;
}

impl FromHostValue for HostValue {
    fn from_host_value(value: HostValue) -> Result<Self, ValueTypeError> {
        Ok(value)
    }
}

impl FromHostValue for () {
    fn from_host_value(_value: HostValue) -> Result<Self, ValueTypeError> {
        Ok(())
    }
}

impl FromHostValue for bool {
    fn from_host_value(value: HostValue) -> Result<Self, ValueTypeError> {
        match value {
            HostValue::Bool(b) => Ok(b),
            other => Err(ValueTypeError::new("boolean", &other)),
        }
    }
}

impl FromHostValue for f64 {
    fn from_host_value(value: HostValue) -> Result<Self, ValueTypeError> {
        match value {
            HostValue::Number(n) => Ok(n),
            other => Err(ValueTypeError::new("number", &other)),
        }
    }
}

impl FromHostValue for u64 {
    fn from_host_value(value: HostValue) -> Result<Self, ValueTypeError> {
        match value {
            HostValue::Number(n) if n.is_finite() && n >= 0.0 && n.fract() == 0.0 => Ok(n as u64),
            other => Err(ValueTypeError::new("unsigned integer", &other)),
        }
    }
}

impl FromHostValue for i64 {
    fn from_host_value(value: HostValue) -> Result<Self, ValueTypeError> {
        match value {
            HostValue::Number(n) if n.is_finite() && n.fract() == 0.0 => Ok(n as i64),
            other => Err(ValueTypeError::new("integer", &other)),
        }
    }
}

impl FromHostValue for u16 {
    fn from_host_value(value: HostValue) -> Result<Self, ValueTypeError> {
        match value {
            HostValue::Number(n) if n.is_finite() && n >= 0.0 && n <= u16::MAX as f64 && n.fract() == 0.0 => {
                Ok(n as u16)
            }
            other => Err(ValueTypeError::new("unsigned short", &other)),
        }
    }
}

impl FromHostValue for String {
    fn from_host_value(value: HostValue) -> Result<Self, ValueTypeError> {
        match value {
            HostValue::String(s) => Ok(s),
            other => Err(ValueTypeError::new("string", &other)),
        }
    }
}

impl FromHostValue for Bytes {
    fn from_host_value(value: HostValue) -> Result<Self, ValueTypeError> {
        match value {
            HostValue::Bytes(b) => Ok(b),
            other => Err(ValueTypeError::new("bytes", &other)),
        }
    }
}

impl FromHostValue for HostRef {
    fn from_host_value(value: HostValue) -> Result<Self, ValueTypeError> {
        match value {
            HostValue::Object(r) => Ok(r),
            other => Err(ValueTypeError::new("object", &other)),
        }
    }
}

impl<T: FromHostValue> FromHostValue for Option<T> {
    fn from_host_value(value: HostValue) -> Result<Self, ValueTypeError> {
        match value {
            HostValue::Null => Ok(None),
            other => T::from_host_value(other).map(Some),
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Number(value)
    }
}

impl From<u64> for HostValue {
    fn from(value: u64) -> Self {
        HostValue::Number(value as f64)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Number(value as f64)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(value)
    }
}

impl From<Bytes> for HostValue {
    fn from(value: Bytes) -> Self {
        HostValue::Bytes(value)
    }
}

impl From<Vec<u8>> for HostValue {
    fn from(value: Vec<u8>) -> Self {
        HostValue::Bytes(Bytes::from(value))
    }
}

impl From<HostRef> for HostValue {
    fn from(value: HostRef) -> Self {
        HostValue::Object(value)
    }
}

impl From<CallbackRef> for HostValue {
    fn from(value: CallbackRef) -> Self {
        HostValue::Callback(value)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(HostValue::Null, Into::into)
    }
}

impl From<serde_json::Value> for HostValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => HostValue::Null,
            serde_json::Value::Bool(b) => HostValue::Bool(b),
            serde_json::Value::Number(n) => HostValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => HostValue::String(s),
            serde_json::Value::Array(items) => {
                HostValue::Array(items.into_iter().map(HostValue::from).collect())
            }
            serde_json::Value::Object(map) => HostValue::Record(
                map.into_iter()
                    .map(|(key, value)| (key, HostValue::from(value)))
                    .collect(),
            ),
        }
    }
}
