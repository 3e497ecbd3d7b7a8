//! `oauth2` HTTP adapter used for token endpoint calls.
//!
//! The adapter implements [`AsyncHttpClient`] on top of a [`ReqwestClient`] and records the HTTP
//! status of the last response in a [`TokenResponseSlot`], so exchange failures can report the
//! status that accompanied an OAuth error payload.

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
// self
use crate::_prelude::*;

/// Thread-safe slot holding the status of the most recent token endpoint response.
///
/// A fresh slot is created per token request and read immediately after `oauth2` resolves.
#[derive(Clone, Debug, Default)]
pub struct TokenResponseSlot(Arc<Mutex<Option<u16>>>);
impl TokenResponseSlot {
	/// Stores the status for the current request.
	pub fn store(&self, status: u16) {
		*self.0.lock() = Some(status);
	}

	/// Returns the captured status, if any, consuming it from the slot.
	pub fn take(&self) -> Option<u16> {
		self.0.lock().take()
	}
}

/// Reqwest client for token endpoint calls.
///
/// Token requests should not follow redirects, matching OAuth 2.0 guidance that token
/// endpoints return results directly instead of delegating to another URI.
#[derive(Clone, Debug)]
pub struct TokenEndpointClient(ReqwestClient);
impl TokenEndpointClient {
	/// Builds the default non-redirecting client.
	pub fn new() -> Result<Self> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(crate::error::ConfigError::http_client_build)?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`]; configure it to disable redirects.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a handle that records response statuses in `slot`.
	pub fn with_slot(&self, slot: TokenResponseSlot) -> TokenEndpointHandle {
		TokenEndpointHandle(Arc::new(HandleInner { client: self.0.clone(), slot }))
	}
}

struct HandleInner {
	client: ReqwestClient,
	slot: TokenResponseSlot,
}

/// [`AsyncHttpClient`] handle returned by [`TokenEndpointClient::with_slot`].
#[derive(Clone)]
pub struct TokenEndpointHandle(Arc<HandleInner>);
impl<'c> AsyncHttpClient<'c> for TokenEndpointHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let inner = Arc::clone(&self.0);

		Box::pin(async move {
			inner.slot.take();

			let response = inner
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			inner.slot.store(status.as_u16());

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
