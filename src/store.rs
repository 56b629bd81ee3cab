//! Host state store access for Helios
//!
//! The home-automation host exposes a flat datapoint namespace
//! (`adapter.instance.path.to.value`). Everything the controller reads or
//! writes goes through the [`StateStore`] trait so the control loop can run
//! against the real host or an in-process store.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

mod memory;
mod simple_api;

pub use memory::MemoryStateStore;
pub use simple_api::SimpleApiStateStore;

/// A datapoint value as typed by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl StateValue {
    /// Convert a JSON value from the host; `null`, arrays and objects carry no value
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Numeric view; numeric strings are accepted since some adapters store text
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            Self::Bool(_) => None,
        }
    }

    /// Boolean view; `0`/`1` and `"true"`/`"false"` are accepted
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Number(n) if *n == 0.0 => Some(false),
            Self::Number(n) if *n == 1.0 => Some(true),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            Self::Number(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            // Whole numbers go out without a trailing ".0" so integer datapoints accept them
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for StateValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Notification that a watched datapoint was updated
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub key: String,
    pub value: Option<StateValue>,
    /// Host timestamp of the update in milliseconds, when known
    pub ts: Option<i64>,
}

/// Access to the host's datapoint store
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    /// Current value of `key`; `Ok(None)` when the datapoint is absent or empty
    async fn get(&self, key: &str) -> Result<Option<StateValue>>;

    /// Write `value` to `key`, last write wins
    async fn set(&self, key: &str, value: StateValue) -> Result<()>;

    /// Ensure `key` exists, seeding it with `initial` if it does not.
    /// Returns `true` when the datapoint was created by this call.
    async fn create(&self, key: &str, initial: StateValue) -> Result<bool>;

    /// Stream of updates to `key`. Every update is reported, even if the
    /// value did not change.
    async fn watch(&self, key: &str) -> Result<mpsc::UnboundedReceiver<StateChange>>;
}
