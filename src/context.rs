//! Cancellation and deadline context threaded through every blocking operation.
//!
//! [`RequestContext`] pairs a [`CancellationToken`] with an optional deadline. Limiter waits,
//! transport round trips, and token exchanges race their futures against both via
//! [`RequestContext::run`]. Each outbound request also carries a fresh [`ExchangeMetadataSlot`]
//! so inner transport layers can report timings (such as limiter wait) to outer layers without
//! sharing state across concurrent requests.

// crates.io
use tokio::time::{self, Instant as TokioInstant};
use tokio_util::sync::CancellationToken;
// self
use crate::_prelude::*;

/// Reason a context-bound operation stopped early.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum CancelError {
	/// The context was canceled explicitly.
	#[error("Context was canceled.")]
	Canceled,
	/// The context deadline elapsed.
	#[error("Context deadline exceeded.")]
	DeadlineExceeded,
}

/// Per-request timings shared between transport layers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExchangeMetadata {
	/// Time spent blocked on the rate limiter before dispatch.
	pub limiter_wait: Option<Duration>,
}

/// Thread-safe slot for sharing [`ExchangeMetadata`] between transport layers.
///
/// [`ApiClient`](crate::http::ApiClient) creates a fresh slot for every request, so layers never
/// observe timings from a concurrent call.
#[derive(Clone, Debug, Default)]
pub struct ExchangeMetadataSlot(Arc<Mutex<ExchangeMetadata>>);
impl ExchangeMetadataSlot {
	/// Records how long the request waited on the limiter.
	pub fn record_limiter_wait(&self, wait: Duration) {
		self.0.lock().limiter_wait = Some(wait);
	}

	/// Returns the captured metadata, leaving the slot empty.
	pub fn take(&self) -> ExchangeMetadata {
		std::mem::take(&mut *self.0.lock())
	}
}

/// Cancellation token plus optional deadline, cloned into every layer of a request.
#[derive(Clone, Debug)]
pub struct RequestContext {
	cancel: CancellationToken,
	deadline: Option<TokioInstant>,
	metadata: ExchangeMetadataSlot,
}
impl RequestContext {
	/// Context that is never canceled and carries no deadline.
	pub fn background() -> Self {
		Self {
			cancel: CancellationToken::new(),
			deadline: None,
			metadata: ExchangeMetadataSlot::default(),
		}
	}

	/// Bounds the context by `timeout` from now, keeping any earlier deadline.
	pub fn with_timeout(self, timeout: Duration) -> Self {
		self.with_deadline(TokioInstant::now() + timeout)
	}

	/// Bounds the context by an absolute deadline, keeping any earlier deadline.
	pub fn with_deadline(mut self, deadline: TokioInstant) -> Self {
		self.deadline = Some(match self.deadline {
			Some(current) => current.min(deadline),
			None => deadline,
		});

		self
	}

	/// Derives a context that is canceled with its parent and owns a fresh metadata slot.
	pub fn child(&self) -> Self {
		Self {
			cancel: self.cancel.child_token(),
			deadline: self.deadline,
			metadata: ExchangeMetadataSlot::default(),
		}
	}

	/// Cancels this context and every child derived from it.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Returns `true` once the context has been canceled.
	pub fn is_canceled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Absolute deadline, if one was configured.
	pub fn deadline(&self) -> Option<TokioInstant> {
		self.deadline
	}

	/// Metadata slot owned by this request.
	pub fn metadata(&self) -> &ExchangeMetadataSlot {
		&self.metadata
	}

	/// Drives `fut` to completion unless the context is canceled or its deadline passes first.
	pub async fn run<F>(&self, fut: F) -> Result<F::Output, CancelError>
	where
		F: Future,
	{
		if self.is_canceled() {
			return Err(CancelError::Canceled);
		}

		let deadline = async {
			match self.deadline {
				Some(at) => time::sleep_until(at).await,
				None => std::future::pending::<()>().await,
			}
		};

		tokio::select! {
			biased;
			_ = self.cancel.cancelled() => Err(CancelError::Canceled),
			_ = deadline => Err(CancelError::DeadlineExceeded),
			output = fut => Ok(output),
		}
	}
}
impl Default for RequestContext {
	fn default() -> Self {
		Self::background()
	}
}
