//! Typed event channel publishing discovery lifecycle notifications.

// crates.io
use tokio::sync::broadcast;
// self
use crate::{
	_prelude::*,
	document::{ExternalDocument, InitialDocument},
};

/// Buffered events retained per subscriber before it starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Lifecycle notifications published by the coordinator.
#[derive(Clone, Debug)]
pub enum DiscoveryEvent {
	/// Bootstrap completed; carries the initial document now in effect.
	Initialized(Arc<InitialDocument>),
	/// A fresh external document was fetched and persisted.
	ExternalDataUpdated(Arc<ExternalDocument>),
}

/// Broadcast channel owned by the coordinator.
///
/// Emission is fire-and-forget: publishing with zero subscribers is not an
/// error, and a slow subscriber lags rather than blocking the publisher.
#[derive(Debug)]
pub struct EventChannel {
	tx: broadcast::Sender<DiscoveryEvent>,
}
impl EventChannel {
	/// Create a channel with the default capacity.
	pub fn new() -> Self {
		let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

		Self { tx }
	}

	/// Register a subscriber receiving every event emitted from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
		self.tx.subscribe()
	}

	/// Publish `event` to all current subscribers.
	pub fn emit(&self, event: DiscoveryEvent) {
		let _ = self.tx.send(event);
	}
}
impl Default for EventChannel {
	fn default() -> Self {
		Self::new()
	}
}
