//! Transport primitives for API calls.
//!
//! [`Transport`] is the crate's round-trip seam: every layer of the request chain (bearer
//! authentication, rate limiting, instrumentation) implements it and delegates to the next.
//! [`ApiClient`] is the handle callers receive from the provider; it builds requests with a
//! [`ReqwestClient`] and executes them through its transport chain.

pub mod token_endpoint;

pub use token_endpoint::*;

// crates.io
use reqwest::{IntoUrl, Method, RequestBuilder};
// self
use crate::{
	_prelude::*,
	context::RequestContext,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`Transport::round_trip`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<Response>> + 'a + Send>>;

/// A single HTTP exchange, free to observe or gate the request before delegating onward.
///
/// Implementations must not hold locks across the inner `.await`; concurrent requests share
/// layers through `Arc`.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves with the upstream response.
	fn round_trip<'a>(&'a self, ctx: &'a RequestContext, request: Request) -> TransportFuture<'a>;
}

/// Base transport executing requests on a [`ReqwestClient`].
///
/// The request races against `ctx`; cancellation mid-flight drops the underlying connection
/// future.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
impl Transport for ReqwestTransport {
	fn round_trip<'a>(&'a self, ctx: &'a RequestContext, request: Request) -> TransportFuture<'a> {
		Box::pin(async move {
			let response = ctx.run(self.0.execute(request)).await?.map_err(TransportError::from)?;

			Ok(response)
		})
	}
}

/// Authorized, rate-limited API client returned by
/// [`AuthorizedClientProvider::client`](crate::provider::AuthorizedClientProvider::client).
///
/// Requests inherit cancellation from the context the client was created with; each request
/// runs under its own child context.
#[derive(Clone)]
pub struct ApiClient {
	http: ReqwestClient,
	transport: Arc<dyn Transport>,
	ctx: RequestContext,
}
impl ApiClient {
	/// Assembles a client from a request builder client, a transport chain, and a parent context.
	pub fn new(http: ReqwestClient, transport: Arc<dyn Transport>, ctx: RequestContext) -> Self {
		Self { http, transport, ctx }
	}

	/// Starts a request; send it with [`ApiClient::send`].
	pub fn request(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
		self.http.request(method, url)
	}

	/// Builds and executes a request produced by [`ApiClient::request`].
	pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
		let request = builder.build().map_err(ConfigError::http_client_build)?;

		self.execute(request).await
	}

	/// Issues a `GET` for `url` through the transport chain.
	pub async fn get(&self, url: &str) -> Result<Response> {
		let url = Url::parse(url)
			.map_err(|source| ConfigError::InvalidUrl { url: url.into(), source })?;

		self.execute(Request::new(Method::GET, url)).await
	}

	/// Executes a prepared request through the transport chain.
	pub async fn execute(&self, request: Request) -> Result<Response> {
		let ctx = self.ctx.child();

		self.transport.round_trip(&ctx, request).await
	}

	/// Context that scopes every request issued by this client.
	pub fn context(&self) -> &RequestContext {
		&self.ctx
	}
}
impl Debug for ApiClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient").field("ctx", &self.ctx).finish()
	}
}
