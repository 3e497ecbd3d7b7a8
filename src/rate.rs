//! Header-driven rate limiting: limit parsing, self-calibrating token buckets, and the transport
//! decorator that gates requests on them.

pub mod limit;
pub mod limiter;
pub mod transport;

pub use limit::*;
pub use limiter::*;
pub use transport::*;

// self
use crate::{_prelude::*, context::CancelError, context::RequestContext};

/// Boxed future returned by [`AdjustableLimiter::wait`].
pub type LimiterFuture<'a> = Pin<Box<dyn Future<Output = Result<(), CancelError>> + 'a + Send>>;

/// Admission control that can be re-tuned from upstream response headers.
pub trait AdjustableLimiter
where
	Self: Send + Sync,
{
	/// Resolves once the caller may dispatch a request, or fails when `ctx` is canceled.
	fn wait<'a>(&'a self, ctx: &'a RequestContext) -> LimiterFuture<'a>;

	/// Feeds response headers back into the limiter.
	fn adjust_limit(&self, headers: &HeaderMap) -> Result<(), MalformedHeader>;
}
