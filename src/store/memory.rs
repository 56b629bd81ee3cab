use super::{StateChange, StateStore, StateValue};
use crate::error::{HeliosError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

#[derive(Default)]
struct Inner {
    values: HashMap<String, (StateValue, i64)>,
    watchers: HashMap<String, Vec<mpsc::UnboundedSender<StateChange>>>,
    journal: Vec<(String, StateValue)>,
}

/// In-process datapoint store.
///
/// Keeps a journal of every write so callers can inspect what the
/// controller sent, and fans updates out to watchers like the host does.
#[derive(Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| HeliosError::store("memory store lock poisoned"))
    }

    /// Remove a datapoint, as if the owning adapter had not populated it yet
    pub fn remove(&self, key: &str) {
        if let Ok(mut inner) = self.lock() {
            inner.values.remove(key);
        }
    }

    /// All values written to `key`, oldest first
    pub fn writes(&self, key: &str) -> Vec<StateValue> {
        self.lock()
            .map(|inner| {
                inner
                    .journal
                    .iter()
                    .filter(|(k, _)| k == key)
                    .map(|(_, v)| v.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn write_count(&self, key: &str) -> usize {
        self.writes(key).len()
    }

    /// Synchronous read for inspection outside async code
    pub fn peek(&self, key: &str) -> Option<StateValue> {
        self.lock()
            .ok()
            .and_then(|inner| inner.values.get(key).map(|(v, _)| v.clone()))
    }
}

#[async_trait::async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<StateValue>> {
        Ok(self.lock()?.values.get(key).map(|(v, _)| v.clone()))
    }

    async fn set(&self, key: &str, value: StateValue) -> Result<()> {
        let ts = chrono::Utc::now().timestamp_millis();
        let mut inner = self.lock()?;
        inner.values.insert(key.to_string(), (value.clone(), ts));
        inner.journal.push((key.to_string(), value.clone()));
        if let Some(senders) = inner.watchers.get_mut(key) {
            let change = StateChange {
                key: key.to_string(),
                value: Some(value),
                ts: Some(ts),
            };
            senders.retain(|tx| tx.send(change.clone()).is_ok());
        }
        Ok(())
    }

    async fn create(&self, key: &str, initial: StateValue) -> Result<bool> {
        let mut inner = self.lock()?;
        if inner.values.contains_key(key) {
            return Ok(false);
        }
        let ts = chrono::Utc::now().timestamp_millis();
        inner.values.insert(key.to_string(), (initial, ts));
        Ok(true)
    }

    async fn watch(&self, key: &str) -> Result<mpsc::UnboundedReceiver<StateChange>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock()?
            .watchers
            .entry(key.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}
