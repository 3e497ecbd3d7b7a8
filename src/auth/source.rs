//! Token sources and the bearer transport that consumes them.
//!
//! A [`TokenSource`] yields the credential to attach to the next request. The
//! [`RefreshingTokenSource`] silently runs the refresh-token grant once the held token expires,
//! serializing concurrent refreshes behind an async mutex so only one call reaches the token
//! endpoint. [`CachingTokenSource`] mirrors every newly minted token into a
//! [`TokenCache`] so restarts resume with the latest credential.

// crates.io
use reqwest::header::AUTHORIZATION;
// self
use crate::{
	_prelude::*,
	auth::{Token, TokenSecret},
	cache::TokenCache,
	context::RequestContext,
	error::{ConfigError, ExchangeError},
	http::{Transport, TransportFuture},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Boxed future resolving to a [`Token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<Token>> + 'a + Send>>;

/// Yields the current credential, refreshing it if the implementation supports that.
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Returns a token suitable for the next request.
	fn token(&self) -> TokenFuture<'_>;
}

/// Runs the refresh-token grant against a token endpoint.
pub trait TokenRefresher
where
	Self: Send + Sync,
{
	/// Exchanges `refresh_token` for a new token.
	fn refresh<'a>(&'a self, refresh_token: &'a str) -> TokenFuture<'a>;
}

/// Source that always returns the same token, valid or not.
#[derive(Clone, Debug)]
pub struct StaticTokenSource(Token);
impl StaticTokenSource {
	/// Wraps `token`.
	pub fn new(token: Token) -> Self {
		Self(token)
	}
}
impl TokenSource for StaticTokenSource {
	fn token(&self) -> TokenFuture<'_> {
		Box::pin(async move { Ok(self.0.clone()) })
	}
}

/// Source that reuses its token until expiry, then refreshes it through a [`TokenRefresher`].
pub struct RefreshingTokenSource {
	current: AsyncMutex<Token>,
	refresher: Arc<dyn TokenRefresher>,
}
impl RefreshingTokenSource {
	/// Seeds the source with `token`.
	pub fn new(token: Token, refresher: Arc<dyn TokenRefresher>) -> Self {
		Self { current: AsyncMutex::new(token), refresher }
	}
}
impl TokenSource for RefreshingTokenSource {
	fn token(&self) -> TokenFuture<'_> {
		Box::pin(async move {
			// Held across the refresh so concurrent callers share one token endpoint call.
			let mut current = self.current.lock().await;

			if current.is_valid() {
				return Ok(current.clone());
			}

			const KIND: FlowKind = FlowKind::Refresh;

			let span = FlowSpan::new(KIND, "refresh_token");

			obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

			let result = span
				.instrument(async {
					let refresh =
						current.refresh_token.clone().ok_or(ExchangeError::MissingRefreshToken)?;
					let mut fresh = self.refresher.refresh(refresh.expose()).await?;

					if fresh.refresh_token.is_none() {
						fresh.refresh_token = Some(refresh);
					}

					Ok::<_, Error>(fresh)
				})
				.await;

			match result {
				Ok(fresh) => {
					obs::record_flow_outcome(KIND, FlowOutcome::Success);

					*current = fresh.clone();

					Ok(fresh)
				},
				Err(e) => {
					obs::record_flow_outcome(KIND, FlowOutcome::Failure);

					Err(e)
				},
			}
		})
	}
}
impl Debug for RefreshingTokenSource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("RefreshingTokenSource(..)")
	}
}

/// Source that persists every token it has not seen before into a [`TokenCache`].
///
/// Persist failures are logged; the token is still returned so the session keeps working with
/// degraded durability.
pub struct CachingTokenSource {
	inner: Arc<dyn TokenSource>,
	cache: Arc<dyn TokenCache>,
	persisted: Mutex<Option<TokenSecret>>,
}
impl CachingTokenSource {
	/// Wraps `inner`; `persisted` is the token already present in `cache`, if any.
	pub fn new(
		inner: Arc<dyn TokenSource>,
		cache: Arc<dyn TokenCache>,
		persisted: Option<&Token>,
	) -> Self {
		Self {
			inner,
			cache,
			persisted: Mutex::new(persisted.map(|token| token.access_token.clone())),
		}
	}
}
impl TokenSource for CachingTokenSource {
	fn token(&self) -> TokenFuture<'_> {
		Box::pin(async move {
			let token = self.inner.token().await?;
			let is_new = self.persisted.lock().as_ref() != Some(&token.access_token);

			if is_new {
				match self.cache.refresh(&token) {
					Ok(()) => *self.persisted.lock() = Some(token.access_token.clone()),
					Err(e) => obs::log_cache_persist_failure(&e),
				}
			}

			Ok(token)
		})
	}
}
impl Debug for CachingTokenSource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CachingTokenSource(..)")
	}
}

/// Transport layer that attaches the source's current token as an `Authorization` header.
#[derive(Clone)]
pub struct BearerTransport {
	source: Arc<dyn TokenSource>,
	inner: Arc<dyn Transport>,
}
impl BearerTransport {
	/// Authenticates requests sent through `inner` with tokens from `source`.
	pub fn new(source: Arc<dyn TokenSource>, inner: Arc<dyn Transport>) -> Self {
		Self { source, inner }
	}
}
impl Transport for BearerTransport {
	fn round_trip<'a>(
		&'a self,
		ctx: &'a RequestContext,
		mut request: Request,
	) -> TransportFuture<'a> {
		Box::pin(async move {
			let token = ctx.run(self.source.token()).await??;
			let value = token.authorization_header().ok_or(ConfigError::InvalidAuthorizationHeader)?;

			request.headers_mut().insert(AUTHORIZATION, value);

			self.inner.round_trip(ctx, request).await
		})
	}
}
impl Debug for BearerTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("BearerTransport(..)")
	}
}
