//! Async service-discovery cache with single-flight fetch coordination, derived expiry, and
//! server-steered refresh — built for modern Rust API client SDKs.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod document;
pub mod store;
pub mod transport;

mod coordinator;
mod error;
mod events;
mod flight;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::Utc;

	pub use crate::{Error, Result};
}

pub use crate::{
	coordinator::{
		DEFAULT_REFRESH_DELAY, DEFAULT_REFRESH_HANDICAP, DiscoveryCoordinator,
		DiscoveryCoordinatorBuilder,
	},
	error::{Error, Result},
	events::DiscoveryEvent,
};
