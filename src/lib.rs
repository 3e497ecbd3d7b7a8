//! OAuth 2.0 authorized, header-paced HTTP client layer: self-calibrating token buckets, durable
//! token caches, and transport-aware observability for services that poll a third-party API.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod context;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod rate;
pub mod settings;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{env, path::PathBuf, process};
	// self
	use crate::{
		oauth::BasicOAuthConfig,
		rate::HeaderKeys,
		settings::{ClientAuthMethod, ClientSettings, Endpoints},
	};

	/// Header names used by the mock upstream API across integration tests.
	pub fn test_header_keys() -> HeaderKeys {
		HeaderKeys::new("X-RateLimit-Limit", "X-RateLimit-Remaining", "X-RateLimit-Reset")
			.expect("Test rate limit header names should be valid.")
	}

	/// Builds a [`BasicOAuthConfig`] whose endpoints point at the provided mock server base URL.
	pub fn build_test_oauth_config(base_url: &str) -> BasicOAuthConfig {
		let endpoints = Endpoints {
			authorization: Url::parse(&format!("{base_url}/authorize"))
				.expect("Mock authorization endpoint should parse successfully."),
			token: Url::parse(&format!("{base_url}/token"))
				.expect("Mock token endpoint should parse successfully."),
		};
		let settings = ClientSettings::new("client-it", endpoints)
			.with_client_secret("secret-it")
			.with_scopes(["activity", "heartrate"])
			.with_auth_method(ClientAuthMethod::ClientSecretPost);

		BasicOAuthConfig::new(&settings).expect("Test OAuth configuration should build.")
	}

	/// Returns a unique, not-yet-existing path inside the system temp directory.
	pub fn temp_token_path(label: &str) -> PathBuf {
		let unique = format!(
			"oauth2_pacer_{label}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::{Duration, Instant},
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	pub use reqwest::{
		Client as ReqwestClient, Error as ReqwestError, Request, Response,
		header::{HeaderMap, HeaderName, HeaderValue},
	};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use httpmock as _;
