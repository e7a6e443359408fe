//! Defines the key/value output through which the drivetrain reports its state.
//!
//! Telemetry flows one way. Nothing that is published is read back by the control core.

use std::{
    collections::HashMap,
    fmt::Display,
    sync::{Arc, Mutex},
};

use tracing::trace;

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod telemetry_tests;

/// Defines a single published value.
#[derive(Clone, Debug, PartialEq)]
pub enum TelemetryValue {
    /// A numerical value
    Number(f64),
    /// A boolean value
    Flag(bool),
    /// A text value
    Text(String),
}

impl Display for TelemetryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelemetryValue::Number(n) => write!(f, "{}", n),
            TelemetryValue::Flag(b) => write!(f, "{}", b),
            TelemetryValue::Text(t) => write!(f, "{}", t),
        }
    }
}

impl From<f64> for TelemetryValue {
    fn from(value: f64) -> Self {
        TelemetryValue::Number(value)
    }
}

impl From<bool> for TelemetryValue {
    fn from(value: bool) -> Self {
        TelemetryValue::Flag(value)
    }
}

impl From<&str> for TelemetryValue {
    fn from(value: &str) -> Self {
        TelemetryValue::Text(value.to_string())
    }
}

/// Defines the interface for the collaborator that receives the telemetry.
///
/// Publishing must not block the control loop.
pub trait TelemetrySink: Send {
    /// Publishes the value for the given key, replacing the previous value for that key.
    fn publish(&mut self, key: &str, value: TelemetryValue);
}

/// A [TelemetrySink] that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn publish(&mut self, _key: &str, _value: TelemetryValue) {}
}

/// A [TelemetrySink] that writes every value to the `tracing` output at trace level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    #[cfg_attr(test, mutants::skip)]
    fn publish(&mut self, key: &str, value: TelemetryValue) {
        trace!(key, %value, "telemetry");
    }
}

/// A [TelemetrySink] that keeps the latest value for every key.
///
/// Clones share the same values, so a clone can be kept to read what the drivetrain published.
#[derive(Clone, Debug, Default)]
pub struct RecordingTelemetry {
    values: Arc<Mutex<HashMap<String, TelemetryValue>>>,
}

impl RecordingTelemetry {
    /// Returns the latest value for the given key, if any.
    pub fn get(&self, key: &str) -> Option<TelemetryValue> {
        let guard = self.values.lock().unwrap_or_else(|err| err.into_inner());
        guard.get(key).cloned()
    }

    /// Returns the latest flag for the given key. None if the key is unknown or not a flag.
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(TelemetryValue::Flag(b)) => Some(b),
            _ => None,
        }
    }

    /// Returns the number of keys that have been published.
    pub fn len(&self) -> usize {
        let guard = self.values.lock().unwrap_or_else(|err| err.into_inner());
        guard.len()
    }

    /// Returns a value indicating whether nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates a new, empty [RecordingTelemetry].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the latest number for the given key. None if the key is unknown or not a number.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.get(key) {
            Some(TelemetryValue::Number(n)) => Some(n),
            _ => None,
        }
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn publish(&mut self, key: &str, value: TelemetryValue) {
        let mut guard = self.values.lock().unwrap_or_else(|err| err.into_inner());
        guard.insert(key.to_string(), value);
    }
}
