//! Transport decorator that paces requests through an [`AdjustableLimiter`].

// self
use crate::{
	_prelude::*,
	context::RequestContext,
	http::{Transport, TransportFuture},
	obs,
	rate::AdjustableLimiter,
};

/// Waits on the limiter before dispatch and feeds every response's headers back into it.
///
/// Limiter adjustment failures are logged and never replace the response or error returned by
/// the wrapped transport.
#[derive(Clone)]
pub struct RateLimitingTransport {
	limiter: Arc<dyn AdjustableLimiter>,
	inner: Arc<dyn Transport>,
}
impl RateLimitingTransport {
	/// Wraps `inner` so it honors `limiter`.
	pub fn new(limiter: Arc<dyn AdjustableLimiter>, inner: Arc<dyn Transport>) -> Self {
		Self { limiter, inner }
	}
}
impl Transport for RateLimitingTransport {
	fn round_trip<'a>(&'a self, ctx: &'a RequestContext, request: Request) -> TransportFuture<'a> {
		Box::pin(async move {
			let queued_at = Instant::now();

			self.limiter.wait(ctx).await?;
			ctx.metadata().record_limiter_wait(queued_at.elapsed());

			let result = self.inner.round_trip(ctx, request).await;

			if let Ok(response) = &result
				&& let Err(e) = self.limiter.adjust_limit(response.headers())
			{
				obs::log_limit_adjust_failure(&e);
			}

			result
		})
	}
}
impl Debug for RateLimitingTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("RateLimitingTransport(..)")
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{
		context::CancelError,
		error::TransportError,
		rate::{HeaderKeys, HeaderLimiter},
	};

	#[derive(Default)]
	struct ScriptedTransport {
		calls: AtomicUsize,
		headers: Vec<(&'static str, &'static str)>,
		fail: bool,
	}
	impl Transport for ScriptedTransport {
		fn round_trip<'a>(
			&'a self,
			_ctx: &'a RequestContext,
			_request: Request,
		) -> TransportFuture<'a> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Box::pin(async move {
				if self.fail {
					return Err(TransportError::network(std::io::Error::other("reset")).into());
				}

				let mut builder = oauth2::http::Response::builder().status(200);

				for (name, value) in &self.headers {
					builder = builder.header(*name, *value);
				}

				let response =
					builder.body(Vec::<u8>::new()).expect("Scripted response should build.");

				Ok(Response::from(response))
			})
		}
	}

	fn limiter() -> Arc<HeaderLimiter> {
		let keys = HeaderKeys::new("x-limit", "x-remaining", "x-reset")
			.expect("Header key fixture should be valid.");

		Arc::new(HeaderLimiter::new(keys))
	}

	fn request() -> Request {
		Request::new(
			reqwest::Method::GET,
			Url::parse("https://api.example.com/1/user/-/profile.json")
				.expect("Request URL fixture should parse."),
		)
	}

	#[tokio::test]
	async fn responses_calibrate_the_limiter() {
		let limiter = limiter();
		let inner = Arc::new(ScriptedTransport {
			headers: vec![("x-limit", "150"), ("x-remaining", "150"), ("x-reset", "3600")],
			..Default::default()
		});
		let transport = RateLimitingTransport::new(limiter.clone(), inner.clone());
		let ctx = RequestContext::background();
		let response =
			transport.round_trip(&ctx, request()).await.expect("Round trip should succeed.");

		assert_eq!(response.status(), 200);
		assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
		assert_eq!(limiter.calibration().map(|c| c.capacity), Some(150));
		assert!(ctx.metadata().take().limiter_wait.is_some());
	}

	#[tokio::test]
	async fn malformed_headers_do_not_mask_the_response() {
		let limiter = limiter();
		let inner = Arc::new(ScriptedTransport {
			headers: vec![("x-limit", "oops")],
			..Default::default()
		});
		let transport = RateLimitingTransport::new(limiter.clone(), inner);
		let response = transport
			.round_trip(&RequestContext::background(), request())
			.await
			.expect("Malformed limit headers must not fail the request.");

		assert_eq!(response.status(), 200);
		assert!(limiter.calibration().is_none());
	}

	#[tokio::test]
	async fn transport_errors_pass_through_unchanged() {
		let limiter = limiter();
		let inner = Arc::new(ScriptedTransport { fail: true, ..Default::default() });
		let transport = RateLimitingTransport::new(limiter.clone(), inner);
		let err = transport
			.round_trip(&RequestContext::background(), request())
			.await
			.expect_err("Inner transport failure should surface.");

		assert!(matches!(err, Error::Transport(_)));
		assert!(limiter.calibration().is_none());
	}

	#[tokio::test]
	async fn canceled_wait_never_dispatches() {
		let limiter = limiter();
		let inner = Arc::new(ScriptedTransport {
			headers: vec![("x-limit", "1"), ("x-remaining", "1"), ("x-reset", "3600")],
			..Default::default()
		});
		let transport = RateLimitingTransport::new(limiter, inner.clone());

		transport
			.round_trip(&RequestContext::background(), request())
			.await
			.expect("First request should pass and calibrate.");

		let ctx = RequestContext::background().with_timeout(Duration::from_millis(50));
		let err = transport
			.round_trip(&ctx, request())
			.await
			.expect_err("Second request should time out on the limiter.");

		assert!(matches!(err, Error::Canceled(CancelError::DeadlineExceeded)));
		assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
	}
}
