// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use reqwest::{Method, StatusCode};
// self
use crate::{
	_prelude::*,
	context::RequestContext,
	http::{Transport, TransportFuture},
	obs,
	provider::InstrumentFn,
	rate::{HeaderKeys, Limit, parse_limit},
};

/// Sink for per-request transport measurements.
///
/// Observers are injected into [`InstrumentedTransport`]; nothing is registered globally. With
/// the `metrics` feature, [`MetricsObserver`](crate::obs::MetricsObserver) forwards to the
/// global recorder.
pub trait TransportObserver
where
	Self: Send + Sync,
{
	/// A request entered the transport chain, before any limiter wait.
	fn request_started(&self);

	/// A request left the chain; `status` is `None` when no response was produced.
	fn request_finished(&self, method: &Method, status: Option<StatusCode>);

	/// Round-trip latency of a completed request, limiter wait excluded.
	fn observe_latency(&self, latency: Duration);

	/// Rate limit advertised by the most recent response.
	fn observe_limit(&self, limit: &Limit);
}

/// Thread-safe counters fed by [`InstrumentedTransport`].
#[derive(Debug, Default)]
pub struct TransportStats {
	in_flight: AtomicU64,
	started: AtomicU64,
	responses: AtomicU64,
	failures: AtomicU64,
	last_status: Mutex<Option<StatusCode>>,
	last_latency: Mutex<Option<Duration>>,
	last_limit: Mutex<Option<Limit>>,
}
impl TransportStats {
	/// Requests currently inside the chain, limiter wait included.
	pub fn in_flight(&self) -> u64 {
		self.in_flight.load(Ordering::Relaxed)
	}

	/// Total number of requests that entered the chain.
	pub fn requests(&self) -> u64 {
		self.started.load(Ordering::Relaxed)
	}

	/// Requests that produced a response, whatever its status.
	pub fn responses(&self) -> u64 {
		self.responses.load(Ordering::Relaxed)
	}

	/// Requests that ended without a response.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Status of the most recent response.
	pub fn last_status(&self) -> Option<StatusCode> {
		*self.last_status.lock()
	}

	/// Latency of the most recent response.
	pub fn last_latency(&self) -> Option<Duration> {
		*self.last_latency.lock()
	}

	/// Most recently advertised rate limit.
	pub fn last_limit(&self) -> Option<Limit> {
		*self.last_limit.lock()
	}
}
impl TransportObserver for TransportStats {
	fn request_started(&self) {
		self.started.fetch_add(1, Ordering::Relaxed);
		self.in_flight.fetch_add(1, Ordering::Relaxed);
	}

	fn request_finished(&self, _method: &Method, status: Option<StatusCode>) {
		self.in_flight.fetch_sub(1, Ordering::Relaxed);

		match status {
			Some(status) => {
				self.responses.fetch_add(1, Ordering::Relaxed);

				*self.last_status.lock() = Some(status);
			},
			None => {
				self.failures.fetch_add(1, Ordering::Relaxed);
			},
		}
	}

	fn observe_latency(&self, latency: Duration) {
		*self.last_latency.lock() = Some(latency);
	}

	fn observe_limit(&self, limit: &Limit) {
		*self.last_limit.lock() = Some(*limit);
	}
}

/// Outermost transport layer reporting every request to a [`TransportObserver`].
///
/// Never alters the request, the response, or the error.
#[derive(Clone)]
pub struct InstrumentedTransport {
	observer: Arc<dyn TransportObserver>,
	keys: HeaderKeys,
	inner: Arc<dyn Transport>,
}
impl InstrumentedTransport {
	/// Wraps `inner`; `keys` name the headers republished through [`TransportObserver::observe_limit`].
	pub fn new(
		observer: Arc<dyn TransportObserver>,
		keys: HeaderKeys,
		inner: Arc<dyn Transport>,
	) -> Self {
		Self { observer, keys, inner }
	}

	/// Returns a decorator suitable for
	/// [`AuthorizedClientProvider::with_instrumentation`](crate::provider::AuthorizedClientProvider::with_instrumentation).
	pub fn layer(observer: Arc<dyn TransportObserver>, keys: HeaderKeys) -> InstrumentFn {
		Arc::new(move |inner: Arc<dyn Transport>| -> Arc<dyn Transport> {
			Arc::new(Self::new(Arc::clone(&observer), keys.clone(), inner))
		})
	}
}
impl Transport for InstrumentedTransport {
	fn round_trip<'a>(&'a self, ctx: &'a RequestContext, request: Request) -> TransportFuture<'a> {
		Box::pin(async move {
			let started_at = Instant::now();
			let mut guard = InFlightGuard::enter(self.observer.as_ref(), request.method().clone());
			let result = self.inner.round_trip(ctx, request).await;

			if let Ok(response) = &result {
				let waited = ctx.metadata().take().limiter_wait.unwrap_or_default();

				guard.status = Some(response.status());
				self.observer.observe_latency(started_at.elapsed().saturating_sub(waited));

				if let Ok(limit) = parse_limit(response.headers(), &self.keys) {
					self.observer.observe_limit(&limit);
				}
			}

			result
		})
	}
}
impl Debug for InstrumentedTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("InstrumentedTransport").field("keys", &self.keys).finish()
	}
}

/// Transport layer logging each request and its response at `debug` level.
///
/// Credential headers are redacted and bodies are never read. Requires the `tracing` feature to
/// emit anything.
#[derive(Clone)]
pub struct LoggingTransport {
	inner: Arc<dyn Transport>,
}
impl LoggingTransport {
	/// Logs traffic passing through `inner`.
	pub fn new(inner: Arc<dyn Transport>) -> Self {
		Self { inner }
	}

	/// Returns a decorator suitable for
	/// [`AuthorizedClientProvider::with_instrumentation`](crate::provider::AuthorizedClientProvider::with_instrumentation).
	pub fn layer() -> InstrumentFn {
		Arc::new(|inner: Arc<dyn Transport>| -> Arc<dyn Transport> { Arc::new(Self::new(inner)) })
	}
}
impl Transport for LoggingTransport {
	fn round_trip<'a>(&'a self, ctx: &'a RequestContext, request: Request) -> TransportFuture<'a> {
		Box::pin(async move {
			let method = request.method().clone();
			let url = request.url().clone();
			let started_at = Instant::now();

			obs::log_request(&request);

			let result = self.inner.round_trip(ctx, request).await;

			match &result {
				Ok(response) => obs::log_response(&method, &url, response, started_at.elapsed()),
				Err(e) => obs::log_round_trip_failure(&method, &url, e),
			}

			result
		})
	}
}
impl Debug for LoggingTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("LoggingTransport(..)")
	}
}

// Reports completion on drop so canceled requests still leave the in-flight count.
struct InFlightGuard<'a> {
	observer: &'a dyn TransportObserver,
	method: Method,
	status: Option<StatusCode>,
}
impl<'a> InFlightGuard<'a> {
	fn enter(observer: &'a dyn TransportObserver, method: Method) -> Self {
		observer.request_started();

		Self { observer, method, status: None }
	}
}
impl Drop for InFlightGuard<'_> {
	fn drop(&mut self) {
		self.observer.request_finished(&self.method, self.status);
	}
}
