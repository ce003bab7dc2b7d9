//! HTTP transport collaborator and the bundled reqwest-backed implementation.

// crates.io
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use reqwest::{Client, redirect::Policy};
use serde::de::DeserializeOwned;
use url::Url;
// self
use crate::_prelude::*;

/// Options controlling precondition checks an SDK transport may enforce.
///
/// Both flags exist to break circular preconditions during bootstrap and
/// refresh: the initial endpoint must be reachable before authentication, and
/// the external fetch is itself the discovery refresh. The bundled
/// [`HttpTransport`] enforces no preconditions, so they are no-ops there.
#[derive(Clone, Copy, Debug, Default)]
pub struct FetchOptions {
	/// Skip any authentication precondition.
	pub skip_auth_check: bool,
	/// Skip any discovery-freshness precondition.
	pub skip_discovery_check: bool,
}

/// Response surface the coordinator consumes: status, headers, JSON body.
#[derive(Clone, Debug)]
pub struct TransportResponse {
	status: StatusCode,
	headers: HeaderMap,
	body: Vec<u8>,
}
impl TransportResponse {
	/// Assemble a response from its parts.
	pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
		Self { status, headers, body }
	}

	/// HTTP status of the exchange.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// Look up a header value by name, when present and valid UTF-8.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	/// Deserialize the body as JSON.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		serde_json::from_slice(&self.body).map_err(Error::from)
	}
}

/// Injected GET transport used for every discovery fetch.
///
/// Retry, backoff, and authentication behaviour belong to the implementation;
/// the coordinator performs no retries of its own.
#[async_trait]
pub trait Transport: std::fmt::Debug + Send + Sync {
	/// Issue a GET to `url` with the given query parameters and options.
	async fn fetch_get(
		&self,
		url: &Url,
		query: &[(&str, &str)],
		options: FetchOptions,
	) -> Result<TransportResponse>;
}

/// Default transport backed by a shared reqwest client.
#[derive(Clone, Debug)]
pub struct HttpTransport {
	client: Client,
}
impl HttpTransport {
	/// Build a transport with the default client settings.
	pub fn new() -> Result<Self> {
		let client = Client::builder()
			.redirect(Policy::limited(10))
			.user_agent(format!("discovery-cache/{}", env!("CARGO_PKG_VERSION")))
			.connect_timeout(Duration::from_secs(5))
			.build()?;

		Ok(Self { client })
	}

	/// Build a transport using the supplied HTTP client (primarily for tests).
	pub fn with_client(client: Client) -> Self {
		Self { client }
	}
}
#[async_trait]
impl Transport for HttpTransport {
	async fn fetch_get(
		&self,
		url: &Url,
		query: &[(&str, &str)],
		_options: FetchOptions,
	) -> Result<TransportResponse> {
		let mut request = self.client.get(url.clone());

		if !query.is_empty() {
			request = request.query(query);
		}

		let response = request.send().await?;
		let status = response.status();
		let headers = response.headers().clone();

		if !status.is_success() {
			let body = response.text().await.ok();

			return Err(Error::HttpStatus { status, url: url.clone(), body });
		}

		let body = response.bytes().await?.to_vec();

		tracing::debug!(%url, %status, bytes = body.len(), "discovery fetch complete");

		Ok(TransportResponse::new(status, headers, body))
	}
}
