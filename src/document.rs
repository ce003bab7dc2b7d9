//! Discovery document wire shapes and expiry bookkeeping.
//!
//! Two tiers: the long-lived [`InitialDocument`] bootstraps the client, the
//! short-lived [`ExternalDocument`] carries live endpoint URIs plus the URI to
//! use for the next discovery round. Field names follow the service's
//! camelCase JSON; only `expireTime` is local, stamped at write time and never
//! trusted from the wire.

// crates.io
use serde::{Deserialize, Serialize};
use url::Url;

/// Well-known path serving the initial bootstrap document.
pub const INITIAL_ENTRY_POINT: &str = "/.well-known/entry-points/initial";
/// Well-known path serving the external live-endpoint document.
pub const EXTERNAL_ENTRY_POINT: &str = "/.well-known/entry-points/external";
/// Response header carrying the server-assigned discovery tag.
pub const DISCOVERY_TAG_HEADER: &str = "discovery-tag";

/// Long-lived bootstrap configuration, fetched once and cached until replaced.
///
/// Carries no expiry; validity is presence. The retry fields are advisory data
/// for the caller and are never enforced by this crate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialDocument {
	/// Discovery protocol version.
	pub version: String,
	/// Advisory retry attempt count for callers.
	#[serde(default)]
	pub retry_count: u32,
	/// Advisory delay between caller retries, in seconds.
	#[serde(default)]
	pub retry_interval: u64,
	/// Discovery-service defaults.
	pub discovery: InitialDiscoveryEndpoints,
	/// Authentication endpoints.
	pub auth: AuthEndpoints,
	/// Core API base.
	pub core_api: CoreApiEndpoints,
	/// Messaging product endpoints.
	pub messaging: ProductEndpoints,
	/// Video product endpoints.
	pub video: ProductEndpoints,
	/// Optional add-on endpoint sets.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub extensions: Vec<ExtensionEndpoints>,
}

/// Discovery-service defaults carried by the initial document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialDiscoveryEndpoints {
	/// Default URI for the first external-document fetch.
	pub default_external_uri: Url,
}

/// Authentication endpoint group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthEndpoints {
	/// Base URI of the authentication service.
	pub base_uri: Url,
	/// Authorization endpoint, when split from the base.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub authorize_uri: Option<Url>,
	/// Token endpoint, when split from the base.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_uri: Option<Url>,
}

/// Core API base URI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreApiEndpoints {
	/// Base URI of the core API.
	pub base_uri: Url,
}

/// Product-specific endpoint set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductEndpoints {
	/// Base URI of the product service.
	pub base_uri: Url,
}

/// Named add-on endpoint set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionEndpoints {
	/// Add-on identifier.
	pub name: String,
	/// Base URI of the add-on service.
	pub base_uri: Url,
}

/// Short-lived, server-steerable configuration with explicit expiry and tag.
///
/// Every endpoint group carries the currently active URI and, optionally, the
/// URI that will serve it after the next discovery round; the discovery
/// group's next-round URI is the refresh chain target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDocument {
	/// Discovery protocol version.
	pub version: String,
	/// Server-assigned discovery tag, attached locally from the response header.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tag: Option<String>,
	/// Validity window in seconds, as received.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_in: Option<u64>,
	/// Absolute expiry in epoch milliseconds, derived locally at write time.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expire_time: Option<i64>,
	/// Advisory retry attempt count for callers.
	#[serde(default)]
	pub retry_count: u32,
	/// Advisory delay between caller retries, in seconds.
	#[serde(default)]
	pub retry_interval: u64,
	/// Advisory pause before restarting a full retry cycle, in seconds.
	#[serde(default)]
	pub retry_cycle_delay: u64,
	/// Discovery endpoints, including where to re-discover from.
	pub discovery: ExternalDiscoveryEndpoints,
	/// Authentication endpoints.
	pub auth: ExternalEndpointGroup,
	/// Core API base.
	pub core_api: ExternalEndpointGroup,
	/// Messaging product endpoints.
	pub messaging: ExternalEndpointGroup,
	/// Video product endpoints.
	pub video: ExternalEndpointGroup,
	/// Optional add-on endpoint sets.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub extensions: Vec<ExternalExtensionEndpoints>,
}
impl ExternalDocument {
	/// URI designated for the next discovery round.
	pub fn external_uri(&self) -> &Url {
		&self.discovery.external_uri
	}

	/// Restamp the absolute expiry from `expires_in` relative to `now_ms`.
	///
	/// The wire value of `expireTime` is never trusted. A missing or zero
	/// `expiresIn` clears the stamp, leaving the document without a timer.
	pub fn stamp_expiry(&mut self, now_ms: i64) {
		self.expire_time = self
			.expires_in
			.filter(|seconds| *seconds > 0)
			.map(|seconds| now_ms + seconds as i64 * 1_000);
	}

	/// Whether the stamped expiry is within `handicap_ms` of `now_ms` or past it.
	///
	/// A document without a stamp never becomes due via the timer.
	pub fn is_due(&self, now_ms: i64, handicap_ms: i64) -> bool {
		match self.expire_time {
			Some(expire_time) => now_ms >= expire_time - handicap_ms,
			None => false,
		}
	}
}

/// Discovery endpoints carried by the external document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDiscoveryEndpoints {
	/// Initial endpoint override, when the server redirects bootstrap as well.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub initial_uri: Option<Url>,
	/// Where the next external-document fetch must go.
	pub external_uri: Url,
}

/// Endpoint group carried by the external document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalEndpointGroup {
	/// Currently active base URI.
	pub base_uri: Url,
	/// URI serving this group after the next discovery round.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub external_uri: Option<Url>,
}

/// Named add-on endpoint set carried by the external document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalExtensionEndpoints {
	/// Add-on identifier.
	pub name: String,
	/// Currently active base URI.
	pub base_uri: Url,
	/// URI serving this add-on after the next discovery round.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub external_uri: Option<Url>,
}
