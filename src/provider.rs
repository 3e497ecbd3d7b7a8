//! Authorization state machine that hands out authenticated, rate-limited API clients.
//!
//! [`AuthorizedClientProvider`] starts `Unauthorized` and becomes `Authorized` once it holds a
//! token source, either restored from a [`TokenCache`] or minted by [`authorize`]. Every call to
//! [`client`] builds a fresh transport chain over the shared token source, limiter, and
//! instrumentation decorator:
//!
//! ```text
//! Instrument(RateLimit(Bearer(Reqwest)))
//! ```
//!
//! [`authorize`]: AuthorizedClientProvider::authorize
//! [`client`]: AuthorizedClientProvider::client

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	auth::{BearerTransport, CachingTokenSource, TokenSource},
	cache::{CacheError, TokenCache},
	context::RequestContext,
	http::{ApiClient, ReqwestTransport, Transport},
	oauth::OAuthConfig,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	rate::{AdjustableLimiter, RateLimitingTransport},
};

/// Decorator applied to the assembled transport chain, outermost.
pub type InstrumentFn = Arc<dyn Fn(Arc<dyn Transport>) -> Arc<dyn Transport> + Send + Sync>;

/// Boxed future resolving to an [`ApiClient`].
pub type ClientFuture<'a> = Pin<Box<dyn Future<Output = Result<ApiClient>> + 'a + Send>>;

/// Source of authorized API clients for schedulers and collectors.
pub trait ClientProvider
where
	Self: Send + Sync,
{
	/// Returns a client scoped to `ctx`, or [`Error::Unauthorized`] before authorization.
	fn client<'a>(&'a self, ctx: &'a RequestContext) -> ClientFuture<'a>;
}

/// Length of nonces produced by [`AuthorizedClientProvider::generate_state`].
pub const STATE_LEN: usize = 32;

/// OAuth-authorized client factory with optional rate limiting and instrumentation.
///
/// Share it by reference (or `Arc`); it owns the only copy of the authorization state.
pub struct AuthorizedClientProvider {
	oauth: Arc<dyn OAuthConfig>,
	state: String,
	limiter: Option<Arc<dyn AdjustableLimiter>>,
	instrument: Option<InstrumentFn>,
	http: ReqwestClient,
	shared: Mutex<ProviderState>,
}
impl AuthorizedClientProvider {
	/// Creates an unauthorized provider whose consent requests carry `state`.
	pub fn new(oauth: Arc<dyn OAuthConfig>, state: impl Into<String>) -> Self {
		Self {
			oauth,
			state: state.into(),
			limiter: None,
			instrument: None,
			http: ReqwestClient::new(),
			shared: Mutex::new(ProviderState::default()),
		}
	}

	/// Returns a random alphanumeric nonce suitable for the `state` parameter.
	pub fn generate_state() -> String {
		rand::rng().sample_iter(&Alphanumeric).take(STATE_LEN).map(char::from).collect()
	}

	/// Paces every client's requests through `limiter`.
	pub fn with_rate_limiter(mut self, limiter: Arc<dyn AdjustableLimiter>) -> Self {
		self.limiter = Some(limiter);

		self
	}

	/// Wraps every client's transport chain with `instrument`.
	pub fn with_instrumentation(mut self, instrument: InstrumentFn) -> Self {
		self.instrument = Some(instrument);

		self
	}

	/// Sends API requests through `client` instead of a default one.
	pub fn with_http_client(mut self, client: ReqwestClient) -> Self {
		self.http = client;

		self
	}

	/// Installs `cache` and resumes from its token, if it holds one.
	///
	/// An empty cache leaves the authorization state unchanged; any other cache failure is
	/// returned.
	pub fn set_token_cache(&self, cache: Arc<dyn TokenCache>) -> Result<()> {
		let cached = match cache.token() {
			Ok(token) => Some(token),
			Err(CacheError::Uninitialized) => None,
			Err(e) => return Err(e.into()),
		};
		let mut shared = self.shared.lock();

		if let Some(token) = cached {
			let inner = self.oauth.token_source(token.clone());

			shared.source =
				Some(Arc::new(CachingTokenSource::new(inner, Arc::clone(&cache), Some(&token))));
		}

		shared.cache = Some(cache);

		Ok(())
	}

	/// Exchanges `code` for a token and becomes authorized.
	///
	/// The token is persisted when a cache is installed. A persist failure is returned as
	/// [`Error::CachePersist`], yet the provider remains authorized for this process.
	pub async fn authorize(&self, ctx: &RequestContext, code: &str) -> Result<()> {
		const KIND: FlowKind = FlowKind::Authorize;

		let span = FlowSpan::new(KIND, "authorize");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.authorize_inner(ctx, code)).await;

		obs::record_flow_outcome(
			KIND,
			if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure },
		);

		result
	}

	async fn authorize_inner(&self, ctx: &RequestContext, code: &str) -> Result<()> {
		let token = ctx.run(self.oauth.exchange(code)).await??;
		let inner = self.oauth.token_source(token.clone());
		let cache = self.shared.lock().cache.clone();
		let Some(cache) = cache else {
			self.shared.lock().source = Some(inner);

			return Ok(());
		};
		let persisted = cache.refresh(&token);
		let source = CachingTokenSource::new(
			inner,
			Arc::clone(&cache),
			persisted.as_ref().ok().map(|_| &token),
		);

		self.shared.lock().source = Some(Arc::new(source));

		persisted.map_err(|source| Error::CachePersist { source })
	}

	/// Returns `true` if a token source exists and yields a valid token; may refresh.
	pub async fn is_authorized(&self) -> bool {
		let Some(source) = self.token_source() else {
			return false;
		};

		source.token().await.is_ok_and(|token| token.is_valid())
	}

	/// Returns `true` if `candidate` equals this provider's state nonce.
	pub fn is_state_valid(&self, candidate: &str) -> bool {
		self.state == candidate
	}

	/// Consent URL carrying this provider's state nonce.
	pub fn authorization_url(&self) -> Url {
		self.oauth.authorization_url(&self.state)
	}

	/// Builds an API client scoped to `ctx`.
	///
	/// The current token is resolved (and refreshed if needed) before the client is returned, so
	/// an unusable session fails here rather than on the first request.
	pub async fn client(&self, ctx: &RequestContext) -> Result<ApiClient> {
		let source = self.token_source().ok_or(Error::Unauthorized)?;

		ctx.run(source.token()).await??;

		let base: Arc<dyn Transport> = Arc::new(ReqwestTransport::with_client(self.http.clone()));
		let mut transport: Arc<dyn Transport> = Arc::new(BearerTransport::new(source, base));

		if let Some(limiter) = &self.limiter {
			transport = Arc::new(RateLimitingTransport::new(Arc::clone(limiter), transport));
		}
		if let Some(instrument) = &self.instrument {
			transport = instrument(transport);
		}

		Ok(ApiClient::new(self.http.clone(), transport, ctx.clone()))
	}

	fn token_source(&self) -> Option<Arc<dyn TokenSource>> {
		self.shared.lock().source.clone()
	}
}
impl ClientProvider for AuthorizedClientProvider {
	fn client<'a>(&'a self, ctx: &'a RequestContext) -> ClientFuture<'a> {
		Box::pin(AuthorizedClientProvider::client(self, ctx))
	}
}
impl Debug for AuthorizedClientProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let shared = self.shared.lock();

		f.debug_struct("AuthorizedClientProvider")
			.field("authorized", &shared.source.is_some())
			.field("has_cache", &shared.cache.is_some())
			.field("rate_limited", &self.limiter.is_some())
			.field("instrumented", &self.instrument.is_some())
			.finish()
	}
}

#[derive(Default)]
struct ProviderState {
	cache: Option<Arc<dyn TokenCache>>,
	source: Option<Arc<dyn TokenSource>>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{StaticTokenSource, Token, TokenFuture},
		cache::MemoryTokenCache,
		context::CancelError,
		error::ExchangeError,
	};

	struct StubOAuth;
	impl OAuthConfig for StubOAuth {
		fn exchange<'a>(&'a self, code: &'a str) -> TokenFuture<'a> {
			Box::pin(async move {
				match code {
					"bad" => Err(ExchangeError::Rejected {
						grant: "authorization_code",
						error: "invalid_grant".into(),
						description: None,
						status: Some(400),
					}
					.into()),
					"slow" => {
						tokio::time::sleep(Duration::from_secs(5)).await;

						Ok(Token::new("slow"))
					},
					_ => Ok(Token::new(format!("access-{code}"))
						.with_refresh_token("refresh")
						.expires_in(Duration::from_secs(3600))),
				}
			})
		}

		fn token_source(&self, token: Token) -> Arc<dyn TokenSource> {
			Arc::new(StaticTokenSource::new(token))
		}

		fn authorization_url(&self, state: &str) -> Url {
			let mut url = Url::parse("https://auth.example.com/authorize")
				.expect("Authorization URL fixture should parse.");

			url.query_pairs_mut().append_pair("state", state);

			url
		}
	}

	struct BrokenCache;
	impl TokenCache for BrokenCache {
		fn token(&self) -> Result<Token, CacheError> {
			Err(CacheError::Uninitialized)
		}

		fn refresh(&self, _token: &Token) -> Result<(), CacheError> {
			Err(CacheError::Persist { message: "read-only filesystem".into() })
		}
	}

	fn provider() -> AuthorizedClientProvider {
		AuthorizedClientProvider::new(Arc::new(StubOAuth), "state-123")
	}

	#[tokio::test]
	async fn client_requires_authorization() {
		let provider = provider();
		let err = provider
			.client(&RequestContext::background())
			.await
			.expect_err("Unauthorized provider must not hand out clients.");

		assert!(matches!(err, Error::Unauthorized));
		assert!(!provider.is_authorized().await);
	}

	#[tokio::test]
	async fn authorize_installs_source_and_persists() {
		let provider = provider();
		let cache = Arc::new(MemoryTokenCache::default());

		provider.set_token_cache(cache.clone()).expect("Empty cache should install.");

		assert!(!provider.is_authorized().await);

		provider
			.authorize(&RequestContext::background(), "code-1")
			.await
			.expect("Authorization should succeed.");

		assert!(provider.is_authorized().await);
		assert_eq!(cache.writes(), 1);
		assert_eq!(
			cache.token().map(|token| token.access_token.expose().to_owned()),
			Ok("access-code-1".into())
		);

		provider
			.client(&RequestContext::background())
			.await
			.expect("Authorized provider should build a client.");

		assert_eq!(cache.writes(), 1);
	}

	#[tokio::test]
	async fn cached_token_restores_authorization() {
		let provider = provider();
		let token = Token::new("cached").expires_in(Duration::from_secs(600));

		provider
			.set_token_cache(Arc::new(MemoryTokenCache::with_token(token)))
			.expect("Seeded cache should install.");

		assert!(provider.is_authorized().await);
	}

	#[tokio::test]
	async fn expired_cached_token_is_not_authorized() {
		let provider = provider();
		let token =
			Token::new("cached").with_expiry(OffsetDateTime::now_utc() - time::Duration::hours(1));

		provider
			.set_token_cache(Arc::new(MemoryTokenCache::with_token(token)))
			.expect("Seeded cache should install.");

		assert!(!provider.is_authorized().await);
	}

	#[tokio::test]
	async fn persist_failure_keeps_authorization() {
		let provider = provider();

		provider.set_token_cache(Arc::new(BrokenCache)).expect("Empty cache should install.");

		let err = provider
			.authorize(&RequestContext::background(), "code-2")
			.await
			.expect_err("Persist failure should surface.");

		assert!(matches!(err, Error::CachePersist { source: CacheError::Persist { .. } }));
		assert!(provider.is_authorized().await);
	}

	#[tokio::test]
	async fn rejected_exchange_stays_unauthorized() {
		let provider = provider();
		let err = provider
			.authorize(&RequestContext::background(), "bad")
			.await
			.expect_err("Rejected exchange should fail.");

		assert!(matches!(err, Error::Exchange(ExchangeError::Rejected { .. })));
		assert!(!provider.is_authorized().await);
	}

	#[tokio::test]
	async fn canceled_exchange_stays_unauthorized() {
		let provider = provider();
		let ctx = RequestContext::background().with_timeout(Duration::from_millis(20));
		let err = provider
			.authorize(&ctx, "slow")
			.await
			.expect_err("Exchange past the deadline should fail.");

		assert!(matches!(err, Error::Canceled(CancelError::DeadlineExceeded)));
		assert!(!provider.is_authorized().await);
	}

	#[test]
	fn state_nonce_checks_and_url() {
		let provider = provider();

		assert!(provider.is_state_valid("state-123"));
		assert!(!provider.is_state_valid("state-124"));
		assert!(provider.authorization_url().as_str().ends_with("state=state-123"));

		let generated = AuthorizedClientProvider::generate_state();

		assert_eq!(generated.len(), STATE_LEN);
		assert!(generated.chars().all(|c| c.is_ascii_alphanumeric()));
		assert_ne!(generated, AuthorizedClientProvider::generate_state());
	}
}
