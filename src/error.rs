//! Crate-wide error types and `Result` alias.

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the discovery cache crate.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error("Configuration error for {field}: {reason}")]
	Configuration { field: &'static str, reason: String },
	#[error("{0}")]
	Flight(std::sync::Arc<Error>),
	#[error("Upstream HTTP status {status} from {url}: {body:?}")]
	HttpStatus { status: http::StatusCode, url: url::Url, body: Option<String> },
	#[error("In-flight discovery operation dropped before settling.")]
	Interrupted,
	#[error("No cached external data to chain discovery from.")]
	MissingExternalData,
	#[error("Store error: {0}")]
	Store(String),
}
impl Error {
	/// Innermost error, unwrapping any shared single-flight layers.
	pub fn root(&self) -> &Error {
		match self {
			Error::Flight(inner) => inner.root(),
			other => other,
		}
	}
}
