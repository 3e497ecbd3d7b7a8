//! Optional observability helpers for OAuth flows and the transport chain.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_pacer.flow` with the `flow` (grant)
//!   and `stage` (call site) fields, plus log events for limiter calibration and degraded
//!   durability.
//! - Enable `metrics` to increment the `oauth2_pacer_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and to publish transport metrics via
//!   [`MetricsObserver`].

mod metrics;
mod tracing;
mod transport;

pub use metrics::*;
pub use tracing::*;
pub use transport::*;

// self
use crate::_prelude::*;

/// OAuth flow kinds observed by the provider and token sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization code exchange after user consent.
	Authorize,
	/// Silent refresh-token grant.
	Refresh,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Authorize => "authorize",
			FlowKind::Refresh => "refresh",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
