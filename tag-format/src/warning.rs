//! Diagnostics for recoverable problems found while encoding tags.
//!
//! Codecs never abort a save because one field holds a malformed value. They
//! substitute the field's default and report the substitution to a
//! [`WarningSink`] that the caller passes in explicitly.

use std::fmt;
use std::sync::Mutex;

/// A default-substitution event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Namespaced field name, e.g. `bext.timeReference`.
    pub field: String,
    /// The raw value that was rejected.
    pub value: String,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' : {}; {} found", self.field, self.message, self.value)
    }
}

/// Receives warnings. Implementations must be callable from several
/// documents at once.
pub trait WarningSink: Send + Sync {
    fn warn(&self, warning: Warning);
}

/// Forwards warnings to `tracing` at WARN level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl WarningSink for TracingSink {
    fn warn(&self, warning: Warning) {
        tracing::warn!(
            field = %warning.field,
            value = %warning.value,
            "{}",
            warning.message
        );
    }
}

/// Keeps every warning in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    warnings: Mutex<Vec<Warning>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<Warning> {
        match self.warnings.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.warnings().is_empty()
    }
}

impl WarningSink for CollectingSink {
    fn warn(&self, warning: Warning) {
        tracing::debug!(field = %warning.field, "collected warning");
        match self.warnings.lock() {
            Ok(mut guard) => guard.push(warning),
            Err(poisoned) => poisoned.into_inner().push(warning),
        }
    }
}

pub(crate) fn emit(sink: &dyn WarningSink, field: &str, value: &str, message: &str) {
    sink.warn(Warning {
        field: field.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    });
}
