//! Discovery coordinator: bootstrap sequencing, deduplicated fetches, and
//! server-steered refresh.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use tokio::{sync::broadcast, time};
use url::Url;
// self
use crate::{
	_prelude::*,
	document::{DISCOVERY_TAG_HEADER, ExternalDocument, InitialDocument},
	events::{DiscoveryEvent, EventChannel},
	flight::SingleFlight,
	store::ConfigStore,
	transport::{FetchOptions, Transport},
};

/// Default safety margin subtracted from the expiry before a refresh is due.
pub const DEFAULT_REFRESH_HANDICAP: Duration = Duration::from_secs(60);
/// Default settling delay applied before a refresh hits the network.
pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_millis(100);

/// Coordinates retrieval, caching, and refresh of the two discovery documents.
///
/// Clones are cheap and share the same cache slots, in-flight cells, and event
/// channel. Building a coordinator spawns the bootstrap in the background;
/// [`init`](Self::init) can be awaited explicitly to join or retry it.
///
/// Each network operation is single-flight: concurrent callers share one
/// underlying fetch and observe its outcome, and the cell clears once the run
/// settles so a failure is never replayed.
#[derive(Clone, Debug)]
pub struct DiscoveryCoordinator {
	store: Arc<dyn ConfigStore>,
	transport: Arc<dyn Transport>,
	config: Arc<DiscoveryConfig>,
	events: Arc<EventChannel>,
	initialized: Arc<AtomicBool>,
	init_flight: Arc<SingleFlight<Arc<InitialDocument>>>,
	initial_fetch_flight: Arc<SingleFlight<Arc<InitialDocument>>>,
	external_fetch_flight: Arc<SingleFlight<Arc<ExternalDocument>>>,
	refresh_flight: Arc<SingleFlight<Arc<ExternalDocument>>>,
}
impl DiscoveryCoordinator {
	/// Create a builder.
	pub fn builder() -> DiscoveryCoordinatorBuilder {
		DiscoveryCoordinatorBuilder::default()
	}

	/// Whether bootstrap has succeeded at least once.
	///
	/// Monotone: once `true`, stays `true` for the coordinator's lifetime.
	pub fn initialized(&self) -> bool {
		self.initialized.load(Ordering::Relaxed)
	}

	/// Subscribe to lifecycle events emitted from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
		self.events.subscribe()
	}

	/// Cached initial document, if any.
	pub async fn initial_data(&self) -> Result<Option<InitialDocument>> {
		match self.store.get(&self.config.initial_key).await? {
			Some(value) => Ok(Some(serde_json::from_value(value)?)),
			None => Ok(None),
		}
	}

	/// Cached external document, if any.
	pub async fn external_data(&self) -> Result<Option<ExternalDocument>> {
		match self.store.get(&self.config.external_key).await? {
			Some(value) => Ok(Some(serde_json::from_value(value)?)),
			None => Ok(None),
		}
	}

	/// Ensure the coordinator reaches ready state, using at most one concurrent
	/// bootstrap attempt regardless of caller count.
	///
	/// A cached initial document satisfies bootstrap without touching the
	/// network; otherwise the initial fetch runs. Either way
	/// [`DiscoveryEvent::Initialized`] is emitted once per successful attempt.
	/// The attempt cell clears on failure, so a later call retries.
	#[tracing::instrument(skip(self))]
	pub async fn init(&self) -> Result<Arc<InitialDocument>> {
		if self.config.client_id.trim().is_empty() {
			return Err(Error::Configuration {
				field: "client_id",
				reason: "Must not be empty.".into(),
			});
		}

		self.init_flight
			.run_or_join(|| async move {
				if let Some(document) = self.initial_data().await? {
					let document = Arc::new(document);

					self.mark_ready(document.clone());

					tracing::debug!("bootstrap satisfied from cache");

					return Ok(document);
				}

				let document = self.fetch_initial_data().await?;

				self.mark_ready(document.clone());

				Ok(document)
			})
			.await
	}

	/// Fetch the initial document from the network, deduplicating concurrent
	/// calls, and replace the initial cache slot with it verbatim.
	///
	/// The initial endpoint is queried with the client identifier and must be
	/// reachable pre-authentication, so the auth precondition is skipped.
	#[tracing::instrument(skip(self))]
	pub async fn fetch_initial_data(&self) -> Result<Arc<InitialDocument>> {
		self.initial_fetch_flight
			.run_or_join(|| async move {
				let query = [("clientId", self.config.client_id.as_str())];
				let options = FetchOptions { skip_auth_check: true, ..FetchOptions::default() };
				let response =
					self.transport.fetch_get(&self.config.initial_endpoint, &query, options).await?;
				let document: InitialDocument = response.json()?;

				// Persisted verbatim; the initial document carries no derived fields.
				self.store.set(&self.config.initial_key, serde_json::to_value(&document)?).await?;

				Ok(Arc::new(document))
			})
			.await
	}

	/// Fetch the external document from `endpoint`, deduplicating concurrent
	/// calls.
	///
	/// A successful fetch attaches the server's discovery tag when the response
	/// carries one, stamps the expiry, replaces the external cache slot in
	/// full, and publishes [`DiscoveryEvent::ExternalDataUpdated`]. Nothing is
	/// persisted on failure. Refresh delegates here, so a refresh and a direct
	/// fetch racing each other share one underlying request.
	#[tracing::instrument(skip(self))]
	pub async fn fetch_external_data(&self, endpoint: Url) -> Result<Arc<ExternalDocument>> {
		self.external_fetch_flight
			.run_or_join(|| async move {
				// This call is the discovery refresh; it cannot itself require
				// fresh discovery data.
				let options = FetchOptions { skip_discovery_check: true, ..FetchOptions::default() };
				let response = self.transport.fetch_get(&endpoint, &[], options).await?;
				let mut document: ExternalDocument = response.json()?;

				if let Some(tag) = response.header(DISCOVERY_TAG_HEADER) {
					document.tag = Some(tag.to_string());
				}

				self.write_external_data(&mut document).await?;

				let document = Arc::new(document);

				self.events.emit(DiscoveryEvent::ExternalDataUpdated(document.clone()));

				Ok(document)
			})
			.await
	}

	/// Re-fetch the external document from the URI the cached document
	/// designates for the next discovery round, deduplicating concurrent
	/// refresh calls.
	///
	/// Fails with [`Error::MissingExternalData`] when nothing is cached yet;
	/// callers fetch at least once before refreshing.
	#[tracing::instrument(skip(self))]
	pub async fn refresh_external_data(&self) -> Result<Arc<ExternalDocument>> {
		self.refresh_flight
			.run_or_join(|| async move {
				// Let transient conditions, e.g. an in-flight token refresh,
				// settle before hitting discovery.
				time::sleep(self.config.refresh_delay).await;

				let document = self.external_data().await?.ok_or(Error::MissingExternalData)?;
				let endpoint = document.external_uri().clone();

				self.fetch_external_data(endpoint).await
			})
			.await
	}

	/// Whether the cached external document is due for refresh.
	///
	/// `true` always and only means refresh now: nothing is cached, or the
	/// stamped expiry minus the refresh handicap has passed. A document without
	/// a stamp never becomes due via the timer.
	pub async fn external_data_expired(&self) -> Result<bool> {
		let Some(document) = self.external_data().await? else {
			return Ok(true);
		};
		let handicap_ms = self.config.refresh_handicap.as_millis() as i64;

		Ok(document.is_due(Utc::now().timestamp_millis(), handicap_ms))
	}

	/// Remove both cached documents, e.g. when the client logs out.
	///
	/// Readiness is not reset; a later [`init`](Self::init) re-fetches.
	pub async fn clear(&self) -> Result<()> {
		self.store.remove(&self.config.initial_key).await?;
		self.store.remove(&self.config.external_key).await?;

		Ok(())
	}

	fn mark_ready(&self, document: Arc<InitialDocument>) {
		self.initialized.store(true, Ordering::Relaxed);
		self.events.emit(DiscoveryEvent::Initialized(document));
	}

	async fn write_external_data(&self, document: &mut ExternalDocument) -> Result<()> {
		document.stamp_expiry(Utc::now().timestamp_millis());

		self.store.set(&self.config.external_key, serde_json::to_value(&*document)?).await?;

		Ok(())
	}
}

#[derive(Debug)]
struct DiscoveryConfig {
	client_id: String,
	initial_endpoint: Url,
	initial_key: String,
	external_key: String,
	refresh_handicap: Duration,
	refresh_delay: Duration,
}

/// Builder assembling a [`DiscoveryCoordinator`].
#[derive(Debug)]
pub struct DiscoveryCoordinatorBuilder {
	store: Option<Arc<dyn ConfigStore>>,
	transport: Option<Arc<dyn Transport>>,
	cache_key_prefix: Option<String>,
	initial_endpoint: Option<String>,
	client_id: Option<String>,
	refresh_handicap: Duration,
	refresh_delay: Duration,
}
impl DiscoveryCoordinatorBuilder {
	/// Set the cache store collaborator.
	pub fn store(mut self, store: impl ConfigStore + 'static) -> Self {
		self.store = Some(Arc::new(store));

		self
	}

	/// Set the HTTP transport collaborator.
	pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
		self.transport = Some(Arc::new(transport));

		self
	}

	/// Set the prefix namespacing the `-initial` and `-external` cache slots.
	pub fn cache_key_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.cache_key_prefix = Some(prefix.into());

		self
	}

	/// Set the URL serving the initial bootstrap document.
	pub fn initial_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.initial_endpoint = Some(endpoint.into());

		self
	}

	/// Set the application client identifier sent with the initial fetch.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Override the refresh handicap (default 60 s).
	pub fn refresh_handicap(mut self, value: Duration) -> Self {
		self.refresh_handicap = value;

		self
	}

	/// Override the refresh settling delay (default 100 ms).
	pub fn refresh_delay(mut self, value: Duration) -> Self {
		self.refresh_delay = value;

		self
	}

	/// Validate required parts, construct the coordinator, and spawn the
	/// background bootstrap.
	///
	/// Must be called within a Tokio runtime. An empty client identifier is
	/// accepted here and rejected by [`DiscoveryCoordinator::init`], so a
	/// misconfigured client still constructs and surfaces the error on use.
	/// The background bootstrap's failure is logged, not raised; a later
	/// explicit `init` retries it.
	pub fn build(self) -> Result<DiscoveryCoordinator> {
		let store = self.store.ok_or_else(|| Error::Configuration {
			field: "store",
			reason: "A cache store is required.".into(),
		})?;
		let transport = self.transport.ok_or_else(|| Error::Configuration {
			field: "transport",
			reason: "A transport is required.".into(),
		})?;
		let prefix = self.cache_key_prefix.ok_or_else(|| Error::Configuration {
			field: "cache_key_prefix",
			reason: "A cache key prefix is required.".into(),
		})?;
		let initial_endpoint = self.initial_endpoint.ok_or_else(|| Error::Configuration {
			field: "initial_endpoint",
			reason: "An initial discovery endpoint is required.".into(),
		})?;
		let client_id = self.client_id.ok_or_else(|| Error::Configuration {
			field: "client_id",
			reason: "A client identifier is required.".into(),
		})?;
		let config = DiscoveryConfig {
			client_id,
			initial_endpoint: Url::parse(&initial_endpoint)?,
			initial_key: format!("{prefix}-initial"),
			external_key: format!("{prefix}-external"),
			refresh_handicap: self.refresh_handicap,
			refresh_delay: self.refresh_delay,
		};
		let coordinator = DiscoveryCoordinator {
			store,
			transport,
			config: Arc::new(config),
			events: Arc::new(EventChannel::new()),
			initialized: Arc::new(AtomicBool::new(false)),
			init_flight: Arc::new(SingleFlight::new()),
			initial_fetch_flight: Arc::new(SingleFlight::new()),
			external_fetch_flight: Arc::new(SingleFlight::new()),
			refresh_flight: Arc::new(SingleFlight::new()),
		};
		let bootstrap = coordinator.clone();

		tokio::spawn(async move {
			if let Err(err) = bootstrap.init().await {
				tracing::debug!(error = %err, "background bootstrap failed");
			}
		});

		Ok(coordinator)
	}
}
impl Default for DiscoveryCoordinatorBuilder {
	fn default() -> Self {
		Self {
			store: None,
			transport: None,
			cache_key_prefix: None,
			initial_endpoint: None,
			client_id: None,
			refresh_handicap: DEFAULT_REFRESH_HANDICAP,
			refresh_delay: DEFAULT_REFRESH_DELAY,
		}
	}
}
