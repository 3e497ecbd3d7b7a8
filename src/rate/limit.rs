//! Rate limit snapshots and the header names they are parsed from.

// std
use std::num::ParseIntError;
// self
use crate::{_prelude::*, error::ConfigError};

/// Failure to read a [`Limit`] out of response headers.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum MalformedHeader {
	/// Required header was absent.
	#[error("Rate limit header `{header}` is missing.")]
	Missing {
		/// Header name that was looked up.
		header: HeaderName,
	},
	/// Header value contained non-visible ASCII.
	#[error("Rate limit header `{header}` is not valid text.")]
	NotText {
		/// Header name that was looked up.
		header: HeaderName,
	},
	/// Header value was not a non-negative decimal integer.
	#[error("Rate limit header `{header}` holds `{value}`, which is not a non-negative integer.")]
	NotAnInteger {
		/// Header name that was looked up.
		header: HeaderName,
		/// Raw header value.
		value: String,
		/// Underlying integer parsing failure.
		#[source]
		source: ParseIntError,
	},
}

/// Snapshot of an upstream rate limit window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Limit {
	/// Requests allowed per window.
	pub ceiling: u64,
	/// Requests left in the current window.
	pub remaining: u64,
	/// Seconds until the window resets.
	pub reset_after_seconds: u64,
}
impl Limit {
	/// Reset interval as a [`Duration`].
	pub fn reset_after(&self) -> Duration {
		Duration::from_secs(self.reset_after_seconds)
	}
}

/// Literal header names carrying the rate limit fields of an upstream API.
///
/// Names are validated once at construction; lookups are case-insensitive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderKeys {
	limit: HeaderName,
	used: Option<HeaderName>,
	remaining: HeaderName,
	resets_after: HeaderName,
}
impl HeaderKeys {
	/// Creates keys for APIs that report `limit`, `remaining`, and `reset` headers.
	pub fn new(
		limit: impl AsRef<str>,
		remaining: impl AsRef<str>,
		resets_after: impl AsRef<str>,
	) -> Result<Self, ConfigError> {
		Ok(Self {
			limit: header_name(limit.as_ref())?,
			used: None,
			remaining: header_name(remaining.as_ref())?,
			resets_after: header_name(resets_after.as_ref())?,
		})
	}

	/// Adds a `used` header; when present on a response it takes precedence over `remaining`.
	pub fn with_used(mut self, used: impl AsRef<str>) -> Result<Self, ConfigError> {
		self.used = Some(header_name(used.as_ref())?);

		Ok(self)
	}

	/// Header names published by the Fitbit Web API.
	pub fn fitbit() -> Self {
		Self {
			limit: HeaderName::from_static("fitbit-rate-limit-limit"),
			used: None,
			remaining: HeaderName::from_static("fitbit-rate-limit-remaining"),
			resets_after: HeaderName::from_static("fitbit-rate-limit-reset"),
		}
	}

	/// Header carrying the window ceiling.
	pub fn limit(&self) -> &HeaderName {
		&self.limit
	}

	/// Header carrying the consumed count, if configured.
	pub fn used(&self) -> Option<&HeaderName> {
		self.used.as_ref()
	}

	/// Header carrying the remaining count.
	pub fn remaining(&self) -> &HeaderName {
		&self.remaining
	}

	/// Header carrying the seconds until reset.
	pub fn resets_after(&self) -> &HeaderName {
		&self.resets_after
	}
}

/// Reads a [`Limit`] from `headers` using the names in `keys`.
///
/// `remaining` is derived as `ceiling - used` when the `used` header is configured and carries a
/// non-blank value, otherwise it is read directly.
pub fn parse_limit(headers: &HeaderMap, keys: &HeaderKeys) -> Result<Limit, MalformedHeader> {
	let ceiling = read_required(headers, &keys.limit)?;
	let used = keys
		.used
		.as_ref()
		.and_then(|name| headers.get(name).map(|value| (name, value)))
		.filter(|(_, value)| !value.as_bytes().trim_ascii().is_empty());
	let remaining = match used {
		Some((name, value)) => ceiling.saturating_sub(parse_value(name, value)?),
		None => read_required(headers, &keys.remaining)?,
	};
	let reset_after_seconds = read_required(headers, &keys.resets_after)?;

	Ok(Limit { ceiling, remaining, reset_after_seconds })
}

fn header_name(name: &str) -> Result<HeaderName, ConfigError> {
	HeaderName::try_from(name).map_err(|_| ConfigError::InvalidHeaderName { name: name.into() })
}

fn read_required(headers: &HeaderMap, name: &HeaderName) -> Result<u64, MalformedHeader> {
	let value = headers.get(name).ok_or_else(|| MalformedHeader::Missing { header: name.clone() })?;

	parse_value(name, value)
}

fn parse_value(name: &HeaderName, value: &HeaderValue) -> Result<u64, MalformedHeader> {
	let raw = value.to_str().map_err(|_| MalformedHeader::NotText { header: name.clone() })?;

	raw.trim().parse::<u64>().map_err(|source| MalformedHeader::NotAnInteger {
		header: name.clone(),
		value: raw.into(),
		source,
	})
}
