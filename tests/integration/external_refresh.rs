//! Integration tests for external-document fetch, tagging, expiry, and refresh chaining.

// std
use std::time::Duration;
// crates.io
use chrono::Utc;
use discovery_cache::{
	DiscoveryCoordinator, DiscoveryEvent, Result, store::MemoryStore, transport::HttpTransport,
};
use serde_json::json;
use url::Url;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};

fn external_doc(external_uri: &str, version: &str) -> serde_json::Value {
	json!({
		"version": version,
		"expiresIn": 3600,
		"retryCount": 3,
		"retryInterval": 3,
		"retryCycleDelay": 86400,
		"discovery": { "externalUri": external_uri },
		"auth": { "baseUri": "https://auth.example.com" },
		"coreApi": { "baseUri": "https://platform.example.com" },
		"messaging": { "baseUri": "https://messaging.example.com" },
		"video": { "baseUri": "https://video.example.com" }
	})
}

/// Coordinator whose background bootstrap fails instantly on the empty client
/// id, keeping these tests' request accounting to the external mocks alone.
fn external_only_coordinator(server: &MockServer) -> Result<DiscoveryCoordinator> {
	DiscoveryCoordinator::builder()
		.store(MemoryStore::new())
		.transport(HttpTransport::new()?)
		.cache_key_prefix("acme")
		.initial_endpoint(format!("{}/.well-known/entry-points/initial", server.uri()))
		.client_id("")
		.refresh_delay(Duration::from_millis(5))
		.build()
}

#[tokio::test]
async fn external_fetch_attaches_the_tag_and_derives_expiry() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let external_path = "/.well-known/entry-points/external";

	Mock::given(method("GET"))
		.and(path(external_path))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(external_doc("https://disc2.example.com/entry-points/external", "1.0"))
				.insert_header("content-type", "application/json")
				.insert_header("discovery-tag", "v2"),
		)
		.expect(1)
		.mount(&server)
		.await;

	let coordinator = external_only_coordinator(&server)?;
	let mut events = coordinator.subscribe();
	let endpoint = Url::parse(&format!("{}{external_path}", server.uri()))?;
	let before_ms = Utc::now().timestamp_millis();
	let document = coordinator.fetch_external_data(endpoint).await?;

	assert_eq!(document.tag.as_deref(), Some("v2"));

	// Derived locally from expiresIn, within a small tolerance of fetch time.
	let expire_time = document.expire_time.expect("stamped expiry");

	assert!(expire_time >= before_ms + 3_600_000);
	assert!(expire_time <= Utc::now().timestamp_millis() + 3_600_000);

	let cached = coordinator.external_data().await?.expect("cached document");

	assert_eq!(cached, *document);
	assert!(!coordinator.external_data_expired().await?);
	assert!(matches!(events.try_recv(), Ok(DiscoveryEvent::ExternalDataUpdated(_))));

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn refresh_chains_to_the_cached_external_uri_and_replaces_in_full() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let first_path = "/gen1/entry-points/external";
	let second_path = "/gen2/entry-points/external";
	let second_uri = format!("{}{second_path}", server.uri());

	Mock::given(method("GET"))
		.and(path(first_path))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(external_doc(&second_uri, "1.0"))
				.insert_header("content-type", "application/json")
				.insert_header("discovery-tag", "gen1"),
		)
		.expect(1)
		.mount(&server)
		.await;
	// The second generation carries no tag header, proving full replacement.
	Mock::given(method("GET"))
		.and(path(second_path))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(external_doc(&second_uri, "2.0"))
				.insert_header("content-type", "application/json"),
		)
		.expect(1)
		.mount(&server)
		.await;

	let coordinator = external_only_coordinator(&server)?;
	let endpoint = Url::parse(&format!("{}{first_path}", server.uri()))?;
	let first = coordinator.fetch_external_data(endpoint).await?;

	assert_eq!(first.tag.as_deref(), Some("gen1"));

	// Concurrent refresh calls collapse into one chained fetch.
	let (a, b) =
		tokio::join!(coordinator.refresh_external_data(), coordinator.refresh_external_data());
	let refreshed = a?;

	assert_eq!(refreshed.version, "2.0");
	assert_eq!(b?.version, "2.0");

	let cached = coordinator.external_data().await?.expect("cached document");

	assert_eq!(cached.version, "2.0");
	// No field merging: the old tag did not survive the replacement.
	assert_eq!(cached.tag, None);

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn expiry_query_with_nothing_cached_needs_no_network() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

	let coordinator = external_only_coordinator(&server)?;

	assert!(coordinator.external_data_expired().await?);

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn concurrent_external_fetches_share_one_request() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let external_path = "/.well-known/entry-points/external";

	Mock::given(method("GET"))
		.and(path(external_path))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(external_doc("https://disc2.example.com/entry-points/external", "1.0"))
				.insert_header("content-type", "application/json")
				.set_delay(Duration::from_millis(30)),
		)
		.expect(2)
		.mount(&server)
		.await;

	let coordinator = external_only_coordinator(&server)?;
	let endpoint = Url::parse(&format!("{}{external_path}", server.uri()))?;
	let (a, b, c) = tokio::join!(
		coordinator.fetch_external_data(endpoint.clone()),
		coordinator.fetch_external_data(endpoint.clone()),
		coordinator.fetch_external_data(endpoint.clone()),
	);

	assert_eq!(a?.version, "1.0");
	assert_eq!(b?.version, "1.0");
	assert_eq!(c?.version, "1.0");

	// The settled cell is not sticky; a later call fetches again.
	coordinator.fetch_external_data(endpoint).await?;

	server.verify().await;
	Ok(())
}
