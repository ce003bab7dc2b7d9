//! Cache store collaborator and the bundled in-memory implementation.

// std
use std::collections::HashMap;
// crates.io
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
// self
use crate::_prelude::*;

/// Asynchronous key-value store holding discovery documents as opaque JSON.
///
/// Implementations own persistence and eviction policy. The coordinator needs
/// only the three operations below and never inspects stored values beyond
/// deserializing them; a write fully replaces the previous value.
#[async_trait]
pub trait ConfigStore: std::fmt::Debug + Send + Sync {
	/// Read the value stored under `key`.
	async fn get(&self, key: &str) -> Result<Option<Value>>;

	/// Store `value` under `key`, replacing any previous value in full.
	async fn set(&self, key: &str, value: Value) -> Result<()>;

	/// Remove the value stored under `key`, if any.
	async fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store backed by a map; suited to tests and short-lived clients.
#[derive(Debug, Default)]
pub struct MemoryStore {
	entries: RwLock<HashMap<String, Value>>,
}
impl MemoryStore {
	/// Create an empty store.
	pub fn new() -> Self {
		Self::default()
	}
}
#[async_trait]
impl ConfigStore for MemoryStore {
	async fn get(&self, key: &str) -> Result<Option<Value>> {
		Ok(self.entries.read().await.get(key).cloned())
	}

	async fn set(&self, key: &str, value: Value) -> Result<()> {
		self.entries.write().await.insert(key.to_string(), value);

		Ok(())
	}

	async fn remove(&self, key: &str) -> Result<()> {
		self.entries.write().await.remove(key);

		Ok(())
	}
}
