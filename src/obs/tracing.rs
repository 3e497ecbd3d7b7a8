// crates.io
use reqwest::{
	Method,
	header::{AUTHORIZATION, COOKIE, PROXY_AUTHORIZATION, SET_COOKIE},
};
// self
use crate::{
	_prelude::*,
	cache::CacheError,
	obs::FlowKind,
	rate::{Limit, MalformedHeader},
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by OAuth flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("oauth2_pacer.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs the limit a header limiter calibrated itself against.
pub fn log_calibration(limit: &Limit) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			ceiling = limit.ceiling,
			remaining = limit.remaining,
			reset_after_seconds = limit.reset_after_seconds,
			"Rate limiter calibrated from response headers."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = limit;
	}
}

/// Logs a response whose rate limit headers could not be applied to the limiter.
pub fn log_limit_adjust_failure(error: &MalformedHeader) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(error = %error, "Failed to adjust rate limiter from response headers.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = error;
	}
}

/// Logs a refreshed token that could not be written to the token cache.
pub fn log_cache_persist_failure(error: &CacheError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			error = %error,
			"Failed to persist refreshed token; continuing with the in-memory token."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = error;
	}
}

/// Logs an outgoing request with credentials redacted.
pub fn log_request(request: &Request) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			method = %request.method(),
			url = %request.url(),
			headers = ?redacted_headers(request.headers()),
			body_bytes = request.body().and_then(|body| body.as_bytes()).map(<[u8]>::len),
			"Sending request."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = request;
	}
}

/// Logs the response to a request previously passed to [`log_request`].
pub fn log_response(method: &Method, url: &Url, response: &Response, elapsed: Duration) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			method = %method,
			url = %url,
			status = response.status().as_u16(),
			headers = ?redacted_headers(response.headers()),
			elapsed_ms = elapsed.as_millis() as u64,
			"Received response."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (method, url, response, elapsed);
	}
}

/// Logs a request that ended without a response.
pub fn log_round_trip_failure(method: &Method, url: &Url, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(method = %method, url = %url, error = %error, "Request failed.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (method, url, error);
	}
}

/// Renders headers for logging, replacing credential values with `<redacted>`.
pub fn redacted_headers(headers: &HeaderMap) -> Vec<(String, String)> {
	headers
		.iter()
		.map(|(name, value)| {
			let secret = value.is_sensitive()
				|| [AUTHORIZATION, PROXY_AUTHORIZATION, COOKIE, SET_COOKIE].contains(name);
			let shown = if secret {
				"<redacted>".to_owned()
			} else {
				String::from_utf8_lossy(value.as_bytes()).into_owned()
			};

			(name.as_str().to_owned(), shown)
		})
		.collect()
}
