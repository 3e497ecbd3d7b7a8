//! OAuth 2.0 configuration: consent URLs, code exchange, and token refresh.
//!
//! [`OAuthConfig`] is the seam the provider consumes. [`BasicOAuthConfig`] implements it on the
//! `oauth2` crate's [`BasicClient`], sending token requests through a non-redirecting
//! [`TokenEndpointClient`].

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
	EndpointSet, HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, Scope,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError, BasicTokenResponse, BasicTokenType},
};
// self
use crate::{
	_prelude::*,
	auth::{RefreshingTokenSource, Token, TokenFuture, TokenRefresher, TokenSource},
	error::ExchangeError,
	http::{TokenEndpointClient, TokenResponseSlot},
	settings::{ClientAuthMethod, ClientSettings},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
const GRANT_REFRESH_TOKEN: &str = "refresh_token";

/// OAuth 2.0 client operations consumed by the provider.
pub trait OAuthConfig
where
	Self: Send + Sync,
{
	/// Exchanges an authorization code for a token.
	fn exchange<'a>(&'a self, code: &'a str) -> TokenFuture<'a>;

	/// Returns a source that yields `token` and refreshes it once expired.
	fn token_source(&self, token: Token) -> Arc<dyn TokenSource>;

	/// Builds the consent URL carrying `state`, requesting offline access.
	fn authorization_url(&self, state: &str) -> Url;
}

/// [`OAuthConfig`] backed by the `oauth2` crate.
///
/// Cloning is cheap; clones share the underlying client.
#[derive(Clone)]
pub struct BasicOAuthConfig(Arc<BasicOAuthConfigInner>);
impl BasicOAuthConfig {
	/// Builds a configuration from client settings with the default token endpoint client.
	pub fn new(settings: &ClientSettings) -> Result<Self> {
		Self::with_token_client(settings, TokenEndpointClient::new()?)
	}

	/// Builds a configuration that sends token requests through `http`.
	pub fn with_token_client(settings: &ClientSettings, http: TokenEndpointClient) -> Result<Self> {
		let auth_url = AuthUrl::from_url(settings.endpoints.authorization.clone());
		let token_url = TokenUrl::from_url(settings.endpoints.token.clone());
		let mut client = BasicClient::new(ClientId::new(settings.client_id.clone()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url);

		if let Some(secret) = &settings.client_secret {
			client = client.set_client_secret(ClientSecret::new(secret.clone()));
		}
		if let Some(redirect) = &settings.redirect_url {
			client = client.set_redirect_uri(RedirectUrl::from_url(redirect.clone()));
		}
		if matches!(settings.auth_method, ClientAuthMethod::ClientSecretPost) {
			client = client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self(Arc::new(BasicOAuthConfigInner {
			client,
			http,
			scopes: settings.scopes.clone(),
		})))
	}

	/// Scopes requested during consent.
	pub fn scopes(&self) -> &[String] {
		&self.0.scopes
	}
}
impl OAuthConfig for BasicOAuthConfig {
	fn exchange<'a>(&'a self, code: &'a str) -> TokenFuture<'a> {
		Box::pin(async move {
			let slot = TokenResponseSlot::default();
			let handle = self.0.http.with_slot(slot.clone());
			let response = self
				.0
				.client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.request_async(&handle)
				.await
				.map_err(|e| map_request_error(GRANT_AUTHORIZATION_CODE, slot.take(), e))?;

			Ok(map_token_response(&response))
		})
	}

	fn token_source(&self, token: Token) -> Arc<dyn TokenSource> {
		Arc::new(RefreshingTokenSource::new(token, Arc::new(self.clone())))
	}

	fn authorization_url(&self, state: &str) -> Url {
		let state = CsrfToken::new(state.to_owned());
		let (url, _) = self
			.0
			.client
			.authorize_url(|| state)
			.add_scopes(self.0.scopes.iter().cloned().map(Scope::new))
			.add_extra_param("access_type", "offline")
			.url();

		url
	}
}
impl TokenRefresher for BasicOAuthConfig {
	fn refresh<'a>(&'a self, refresh_token: &'a str) -> TokenFuture<'a> {
		Box::pin(async move {
			let slot = TokenResponseSlot::default();
			let handle = self.0.http.with_slot(slot.clone());
			let refresh_secret = RefreshToken::new(refresh_token.to_owned());
			let response = self
				.0
				.client
				.exchange_refresh_token(&refresh_secret)
				.request_async(&handle)
				.await
				.map_err(|e| map_request_error(GRANT_REFRESH_TOKEN, slot.take(), e))?;

			Ok(map_token_response(&response))
		})
	}
}
impl Debug for BasicOAuthConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BasicOAuthConfig")
			.field("client_id", self.0.client.client_id())
			.field("scopes", &self.0.scopes)
			.finish()
	}
}

struct BasicOAuthConfigInner {
	client: ConfiguredBasicClient,
	http: TokenEndpointClient,
	scopes: Vec<String>,
}

fn map_token_response(response: &BasicTokenResponse) -> Token {
	let mut token = Token::new(response.access_token().secret().to_owned())
		.with_token_type(token_type_label(response.token_type()));

	if let Some(refresh) = response.refresh_token() {
		token = token.with_refresh_token(refresh.secret().to_owned());
	}
	if let Some(expiry) = response
		.expires_in()
		.and_then(|lifetime| time::Duration::try_from(lifetime).ok())
		.and_then(|lifetime| OffsetDateTime::now_utc().checked_add(lifetime))
	{
		token = token.with_expiry(expiry);
	}

	token
}

fn token_type_label(token_type: &BasicTokenType) -> String {
	match token_type {
		BasicTokenType::Bearer => "Bearer".into(),
		BasicTokenType::Mac => "MAC".into(),
		BasicTokenType::Extension(other) => other.clone(),
	}
}

fn map_request_error(
	grant: &'static str,
	status: Option<u16>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	match err {
		RequestTokenError::ServerResponse(response) => ExchangeError::Rejected {
			grant,
			error: response.error().as_ref().to_owned(),
			description: response.error_description().cloned(),
			status,
		},
		RequestTokenError::Request(source) =>
			ExchangeError::Network { grant, source: Box::new(source) },
		RequestTokenError::Parse(source, _body) => ExchangeError::Parse { grant, source, status },
		RequestTokenError::Other(message) => ExchangeError::Unexpected { grant, message },
	}
	.into()
}
