// crates.io
#[cfg(feature = "metrics")] use reqwest::{Method, StatusCode};
// self
#[cfg(feature = "metrics")]
use crate::{_prelude::*, obs::TransportObserver, rate::Limit};
use crate::obs::{FlowKind, FlowOutcome};

/// Observer publishing to the global `metrics` recorder.
///
/// Responses are counted under `oauth2_pacer_client_api_requests_total{code,method}`; requests
/// that fail before a response only affect the in-flight gauge.
#[cfg(feature = "metrics")]
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricsObserver;
#[cfg(feature = "metrics")]
impl TransportObserver for MetricsObserver {
	fn request_started(&self) {
		metrics::gauge!("oauth2_pacer_client_in_flight_requests").increment(1.0);
	}

	fn request_finished(&self, method: &Method, status: Option<StatusCode>) {
		metrics::gauge!("oauth2_pacer_client_in_flight_requests").decrement(1.0);

		if let Some(status) = status {
			metrics::counter!(
				"oauth2_pacer_client_api_requests_total",
				"code" => status.as_str().to_owned(),
				"method" => method.as_str().to_owned()
			)
			.increment(1);
		}
	}

	fn observe_latency(&self, latency: Duration) {
		metrics::histogram!("oauth2_pacer_request_duration_seconds").record(latency.as_secs_f64());
	}

	fn observe_limit(&self, limit: &Limit) {
		metrics::gauge!("oauth2_pacer_rate_limiter_limit").set(limit.ceiling as f64);
		metrics::gauge!("oauth2_pacer_rate_limiter_remaining").set(limit.remaining as f64);
		metrics::gauge!("oauth2_pacer_rate_limiter_reset_after_seconds")
			.set(limit.reset_after_seconds as f64);
	}
}

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_pacer_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}
