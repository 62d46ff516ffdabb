//! crates/threadboard_core/src/counters/mod.rs
//!
//! The counter maintenance engine and the trigger events it consumes.
//!
//! Events are delivered by an external layer, at least once and in no
//! particular order. Counter adjustments are single atomic increments on the
//! store; the engine never reads a counter in order to write it.

use serde_json::Value;

use crate::domain::{DocPath, Fields};

pub mod buckets;
mod engine;

pub use engine::{Clock, CounterEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Created,
    Updated,
    Deleted,
}

/// A committed change to one document.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub kind: TriggerKind,
    pub path: DocPath,
    pub before: Option<Fields>,
    pub after: Option<Fields>,
}

impl TriggerEvent {
    pub fn created(path: DocPath, doc: Fields) -> Self {
        Self {
            kind: TriggerKind::Created,
            path,
            before: None,
            after: Some(doc),
        }
    }

    pub fn updated(path: DocPath, before: Fields, after: Fields) -> Self {
        Self {
            kind: TriggerKind::Updated,
            path,
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn deleted(path: DocPath, doc: Fields) -> Self {
        Self {
            kind: TriggerKind::Deleted,
            path,
            before: Some(doc),
            after: None,
        }
    }
}

/// What a handler did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A counter moved to `value`.
    Adjusted { field: &'static str, value: i64 },
    /// Bookkeeping fields were written.
    Stamped(Fields),
    /// The handler ran but nothing needed writing.
    Unchanged,
    /// The document to write no longer exists.
    Missing,
    /// No handler is registered for this event.
    Ignored,
}

impl Outcome {
    pub fn value(&self) -> Option<i64> {
        match self {
            Outcome::Adjusted { value, .. } => Some(*value),
            _ => None,
        }
    }
}

pub(crate) fn flag(doc: Option<&Fields>, key: &str) -> bool {
    doc.and_then(|d| d.get(key)).and_then(Value::as_bool) == Some(true)
}
