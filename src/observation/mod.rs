//! Observation records shared by all producers in one graph

pub mod body_state;

pub use body_state::BodyStateObservations;

use serde_json::{Map, Value};

/// One tick's observation output: a flat field map every producer in the
/// composite writes into.
///
/// Field-name collisions are last-write-wins in registration order. That
/// behavior is pinned by a test; whether it is desirable is an open
/// question, so producers should prefix their fields.
#[derive(Debug, Clone, Default)]
pub struct ObservationRecord {
    fields: Map<String, Value>,
}

impl ObservationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The record as one JSON object.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}
