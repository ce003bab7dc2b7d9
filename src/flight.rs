//! Single-flight coordination for deduplicating concurrent async work.
//!
//! The outcome is published over a level-triggered `watch` channel, so a
//! caller that joins after the leader finishes but before its own first poll
//! still observes the settled value instead of missing a wakeup.

// std
use std::future::Future;
// crates.io
use tokio::sync::{Mutex, watch};
// self
use crate::_prelude::*;

type Outcome<T> = Option<std::result::Result<T, Arc<Error>>>;

/// One in-flight slot shared by every concurrent caller of one logical operation.
///
/// The first caller becomes the leader and runs the operation; callers that
/// arrive while it is outstanding await the leader's outcome. The slot clears
/// when the run settles, success and failure alike, so the next call starts a
/// fresh attempt instead of replaying a stale result.
#[derive(Debug)]
pub struct SingleFlight<T> {
	slot: Mutex<Option<watch::Receiver<Outcome<T>>>>,
}
impl<T> SingleFlight<T>
where
	T: Clone,
{
	/// Create an empty flight slot.
	pub fn new() -> Self {
		Self::default()
	}

	/// Run `operation` as the leader, or join the outstanding run.
	///
	/// Every caller of one run resolves with the identical outcome; a shared
	/// failure surfaces as [`Error::Flight`]. A leader dropped mid-run closes
	/// the channel, failing joiners with [`Error::Interrupted`] and leaving the
	/// slot reclaimable by the next caller.
	pub async fn run_or_join<F, Fut>(&self, operation: F) -> Result<T>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let tx = {
			let mut slot = self.slot.lock().await;

			// A closed channel means the previous leader was dropped before
			// settling; reclaim the slot instead of joining a dead run.
			if let Some(rx) = slot.as_ref().filter(|rx| rx.has_changed().is_ok()) {
				let rx = rx.clone();

				drop(slot);

				return join(rx).await;
			}

			let (tx, rx) = watch::channel(None);

			*slot = Some(rx);

			tx
		};
		let outcome = operation().await.map_err(Arc::new);

		// Clear before publishing so a caller racing the settlement becomes a
		// new leader rather than observing the finished run.
		*self.slot.lock().await = None;

		let _ = tx.send(Some(outcome.clone()));

		outcome.map_err(Error::Flight)
	}
}
impl<T> Default for SingleFlight<T> {
	fn default() -> Self {
		Self { slot: Mutex::new(None) }
	}
}

async fn join<T>(mut rx: watch::Receiver<Outcome<T>>) -> Result<T>
where
	T: Clone,
{
	loop {
		let settled = rx.borrow().clone();

		if let Some(outcome) = settled {
			return outcome.map_err(Error::Flight);
		}

		if rx.changed().await.is_err() {
			return Err(Error::Interrupted);
		}
	}
}
