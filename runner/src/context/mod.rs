// Module: Context
// Run-scoped key/value store shared by every step and custom handler of one
// test-case run. Never shared between runs.

use std::collections::HashMap;

use serde_json::Value;

/// Holds values captured during a run (e.g. by custom actions) so later
/// steps can read them.
#[derive(Debug, Default, Clone)]
pub struct Context {
    pub variables: HashMap<String, Value>,
}

impl Context {
    /// Creates a new empty context.
    pub fn new() -> Self {
        Self {
            variables: HashMap::new(),
        }
    }

    /// Updates a variable in the context.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    /// Bulk insert of variables.
    pub fn extend(&mut self, entries: &HashMap<String, Value>) {
        for (k, v) in entries {
            self.variables.insert(k.clone(), v.clone());
        }
    }

    /// Retrieves a variable from the context.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// String view of a variable; non-string values are rendered as JSON.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.variables.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.variables.remove(key)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
