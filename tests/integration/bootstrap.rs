//! Integration tests for bootstrap sequencing and initial-document caching.

// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use discovery_cache::{
	DiscoveryCoordinator, DiscoveryEvent, Error, Result,
	store::{ConfigStore, MemoryStore},
	transport::HttpTransport,
};
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path, query_param},
};

const INITIAL_PATH: &str = "/.well-known/entry-points/initial";
const INITIAL_BODY: &str = r#"{
    "version": "1.0",
    "retryCount": 3,
    "retryInterval": 3,
    "discovery": {
        "defaultExternalUri": "https://discovery.example.com/.well-known/entry-points/external"
    },
    "auth": { "baseUri": "https://auth.example.com" },
    "coreApi": { "baseUri": "https://platform.example.com" },
    "messaging": { "baseUri": "https://messaging.example.com" },
    "video": { "baseUri": "https://video.example.com" }
}"#;

fn coordinator_for(server: &MockServer, client_id: &str) -> Result<DiscoveryCoordinator> {
	DiscoveryCoordinator::builder()
		.store(MemoryStore::new())
		.transport(HttpTransport::new()?)
		.cache_key_prefix("acme")
		.initial_endpoint(format!("{}{INITIAL_PATH}", server.uri()))
		.client_id(client_id)
		.build()
}

#[tokio::test]
async fn bootstrap_fetches_and_caches_the_initial_document() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path(INITIAL_PATH))
		.and(query_param("clientId", "app-key"))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_string(INITIAL_BODY)
				.insert_header("content-type", "application/json"),
		)
		.expect(1)
		.mount(&server)
		.await;

	let coordinator = coordinator_for(&server, "app-key")?;
	let mut events = coordinator.subscribe();
	let document = coordinator.init().await?;

	assert_eq!(document.version, "1.0");
	assert!(coordinator.initialized());

	// The cache now answers without the network.
	let cached = coordinator.initial_data().await?.expect("cached document");

	assert_eq!(cached, *document);

	// Exactly one emission: the explicit call and the background bootstrap
	// joined the same attempt.
	assert!(matches!(events.try_recv(), Ok(DiscoveryEvent::Initialized(_))));
	assert!(events.try_recv().is_err());

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn bootstrap_short_circuits_on_a_cached_document() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

	let store = MemoryStore::new();

	store.set("acme-initial", serde_json::from_str(INITIAL_BODY)?).await?;

	let coordinator = DiscoveryCoordinator::builder()
		.store(store)
		.transport(HttpTransport::new()?)
		.cache_key_prefix("acme")
		.initial_endpoint(format!("{}{INITIAL_PATH}", server.uri()))
		.client_id("app-key")
		.build()?;
	let mut events = coordinator.subscribe();
	let document = coordinator.init().await?;

	assert_eq!(document.version, "1.0");
	assert!(coordinator.initialized());
	assert!(matches!(events.try_recv(), Ok(DiscoveryEvent::Initialized(_))));

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn failed_bootstrap_is_retryable() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let attempts = Arc::new(AtomicUsize::new(0));
	let counter = attempts.clone();

	Mock::given(method("GET"))
		.and(path(INITIAL_PATH))
		.respond_with(move |_: &wiremock::Request| {
			if counter.fetch_add(1, Ordering::SeqCst) == 0 {
				ResponseTemplate::new(503)
			} else {
				ResponseTemplate::new(200)
					.set_body_string(INITIAL_BODY)
					.insert_header("content-type", "application/json")
			}
		})
		.expect(2)
		.mount(&server)
		.await;

	let coordinator = coordinator_for(&server, "app-key")?;
	let err = coordinator.init().await.expect_err("first attempt fails");

	assert!(matches!(err.root(), Error::HttpStatus { .. }));
	assert!(!coordinator.initialized());

	// The in-flight cell cleared, so this is a fresh attempt.
	let document = coordinator.init().await?;

	assert_eq!(document.version, "1.0");
	assert!(coordinator.initialized());

	server.verify().await;
	Ok(())
}
