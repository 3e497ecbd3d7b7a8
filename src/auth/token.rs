//! OAuth2 access/refresh token value and its validity rules.

pub mod secret;

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret};

/// Tokens are treated as expired this long before their actual expiry, so a request never
/// leaves with a token that lapses in flight.
const EXPIRY_DELTA: time::Duration = time::Duration::seconds(10);

/// OAuth2 token as issued by the token endpoint.
///
/// Serializes field-for-field (`access_token`, `token_type`, `refresh_token`, `expiry`), with
/// the expiry as RFC 3339.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Token type reported by the provider (usually `bearer`).
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub token_type: String,
	/// Refresh token secret, if the provider issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Absolute expiry; `None` means the token never expires.
	#[serde(default, skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
	pub expiry: Option<OffsetDateTime>,
}
impl Token {
	/// Creates a bearer token without refresh token or expiry.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			token_type: "Bearer".into(),
			refresh_token: None,
			expiry: None,
		}
	}

	/// Sets the token type.
	pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = token_type.into();

		self
	}

	/// Sets the refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(refresh_token));

		self
	}

	/// Sets an absolute expiry instant.
	pub fn with_expiry(mut self, expiry: OffsetDateTime) -> Self {
		self.expiry = Some(expiry);

		self
	}

	/// Sets the expiry relative to the current clock.
	pub fn expires_in(self, lifetime: Duration) -> Self {
		self.with_expiry(OffsetDateTime::now_utc() + lifetime)
	}

	/// Returns `true` if the token is expired (within a small skew) at `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expiry.is_some_and(|expiry| expiry - EXPIRY_DELTA <= instant)
	}

	/// Returns `true` if the token has an access value and is not expired at `instant`.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		!self.access_token.is_empty() && !self.is_expired_at(instant)
	}

	/// Convenience helper that checks validity using the current UTC instant.
	pub fn is_valid(&self) -> bool {
		self.is_valid_at(OffsetDateTime::now_utc())
	}

	/// Canonical `Authorization` scheme for the token type; defaults to `Bearer`.
	pub fn scheme(&self) -> &str {
		if self.token_type.eq_ignore_ascii_case("bearer") || self.token_type.is_empty() {
			"Bearer"
		} else if self.token_type.eq_ignore_ascii_case("mac") {
			"MAC"
		} else if self.token_type.eq_ignore_ascii_case("basic") {
			"Basic"
		} else {
			&self.token_type
		}
	}

	/// Renders the `Authorization` header value, marked sensitive.
	pub fn authorization_header(&self) -> Option<HeaderValue> {
		let mut value =
			HeaderValue::try_from(format!("{} {}", self.scheme(), self.access_token.expose()))
				.ok()?;

		value.set_sensitive(true);

		Some(value)
	}
}
