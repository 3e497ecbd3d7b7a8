//! Client registration settings and their environment-variable loader.

// std
use std::{env, path::PathBuf};
// self
use crate::{_prelude::*, error::ConfigError};

/// Environment variable holding the OAuth client identifier.
pub const ENV_CLIENT_ID: &str = "OAUTH2_CLIENT_ID";
/// Environment variable holding the OAuth client secret.
pub const ENV_CLIENT_SECRET: &str = "OAUTH2_CLIENT_SECRET";
/// Environment variable holding the registered redirect URL.
pub const ENV_REDIRECT_URL: &str = "OAUTH2_REDIRECT_URL";
/// Environment variable holding the token cache file path.
pub const ENV_TOKEN_FILE: &str = "OAUTH2_TOKEN_FILE";

/// Scopes requested from Fitbit by [`ClientSettings::from_env`].
pub const FITBIT_SCOPES: [&str; 9] = [
	"activity",
	"heartrate",
	"location",
	"nutrition",
	"profile",
	"settings",
	"sleep",
	"social",
	"weight",
];

/// Authorization server endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
	/// Consent page the user is redirected to.
	pub authorization: Url,
	/// Token endpoint for code exchange and refresh.
	pub token: Url,
}
impl Endpoints {
	/// Parses both endpoint URLs.
	pub fn parse(authorization: &str, token: &str) -> Result<Self, ConfigError> {
		Ok(Self { authorization: parse_url(authorization)?, token: parse_url(token)? })
	}

	/// Fitbit's OAuth 2.0 endpoints.
	pub fn fitbit() -> Result<Self, ConfigError> {
		Self::parse("https://www.fitbit.com/oauth2/authorize", "https://api.fitbit.com/oauth2/token")
	}
}

/// How the client authenticates to the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// HTTP Basic authentication with the client id and secret.
	#[default]
	ClientSecretBasic,
	/// Client id and secret sent in the form body.
	ClientSecretPost,
}

/// OAuth client registration used to build a [`BasicOAuthConfig`](crate::oauth::BasicOAuthConfig).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
	/// Registered client identifier.
	pub client_id: String,
	/// Client secret for confidential clients.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub client_secret: Option<String>,
	/// Redirect URL registered with the authorization server.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub redirect_url: Option<Url>,
	/// Scopes requested during consent.
	#[serde(default)]
	pub scopes: Vec<String>,
	/// Authorization server endpoints.
	pub endpoints: Endpoints,
	/// Token endpoint authentication method.
	#[serde(default)]
	pub auth_method: ClientAuthMethod,
}
impl ClientSettings {
	/// Creates settings for a public client with no scopes.
	pub fn new(client_id: impl Into<String>, endpoints: Endpoints) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: None,
			redirect_url: None,
			scopes: Vec::new(),
			endpoints,
			auth_method: ClientAuthMethod::default(),
		}
	}

	/// Sets the client secret.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Sets the redirect URL.
	pub fn with_redirect_url(mut self, redirect_url: Url) -> Self {
		self.redirect_url = Some(redirect_url);

		self
	}

	/// Replaces the requested scopes.
	pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Sets the token endpoint authentication method.
	pub fn with_auth_method(mut self, auth_method: ClientAuthMethod) -> Self {
		self.auth_method = auth_method;

		self
	}

	/// Reads Fitbit client settings from the process environment.
	///
	/// `OAUTH2_CLIENT_ID` is required; `OAUTH2_CLIENT_SECRET` and `OAUTH2_REDIRECT_URL` are
	/// optional.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Builds Fitbit client settings from an arbitrary variable lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let read = |name: &str| lookup(name).filter(|value| !value.is_empty());
		let client_id = read(ENV_CLIENT_ID).ok_or(ConfigError::MissingEnv(ENV_CLIENT_ID))?;
		let mut settings =
			Self::new(client_id, Endpoints::fitbit()?).with_scopes(FITBIT_SCOPES);

		if let Some(secret) = read(ENV_CLIENT_SECRET) {
			settings = settings.with_client_secret(secret);
		}
		if let Some(redirect) = read(ENV_REDIRECT_URL) {
			settings = settings.with_redirect_url(parse_url(&redirect)?);
		}

		Ok(settings)
	}
}

/// Returns the token cache path from `OAUTH2_TOKEN_FILE`.
pub fn token_file_from_env() -> Result<PathBuf, ConfigError> {
	env::var_os(ENV_TOKEN_FILE)
		.filter(|value| !value.is_empty())
		.map(PathBuf::from)
		.ok_or(ConfigError::MissingEnv(ENV_TOKEN_FILE))
}

fn parse_url(url: &str) -> Result<Url, ConfigError> {
	Url::parse(url).map_err(|source| ConfigError::InvalidUrl { url: url.into(), source })
}
