//! Token-bucket limiters backed by `governor`.
//!
//! [`HeaderLimiter`] starts permissive and calibrates exactly once from the first response that
//! carries parseable rate limit headers. After that the bucket's own time-driven refill is
//! authoritative; later headers never re-seed it, even when the upstream window changes.

// std
use std::num::NonZeroU32;
// crates.io
use governor::{
	Quota, RateLimiter,
	clock::DefaultClock,
	state::{InMemoryState, NotKeyed},
};
// self
use crate::{
	_prelude::*,
	context::RequestContext,
	obs,
	rate::{AdjustableLimiter, HeaderKeys, LimiterFuture, MalformedHeader, parse_limit},
};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

// Largest refill window (`period * burst`) handed to governor, which tracks time in `u64`
// nanoseconds and adds windows to its clock unchecked. A quarter of the range (about 146 years)
// leaves headroom for the bucket's theoretical arrival time to advance past it.
const MAX_WINDOW_NANOS: u64 = u64::MAX / 4;

/// Bucket parameters derived from the calibrating response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Calibration {
	/// Burst size; equals `remaining` at calibration.
	pub capacity: u64,
	/// Time to refill one token; equals `reset_after_seconds` at calibration.
	pub refill_interval: Duration,
}
impl Calibration {
	/// Returns `true` when the bucket admits every request (zero refill interval).
	pub fn is_unthrottled(&self) -> bool {
		self.refill_interval.is_zero()
	}
}

struct Bucket {
	calibration: Calibration,
	// `None` for unthrottled calibrations.
	limiter: Option<DirectRateLimiter>,
}
impl Bucket {
	fn calibrate(calibration: Calibration) -> Self {
		let (period, burst) = Self::clamp(calibration);
		let Some(quota) = Quota::with_period(period) else {
			return Self { calibration, limiter: None };
		};
		let limiter = match NonZeroU32::new(burst) {
			Some(burst) => RateLimiter::direct(quota.allow_burst(burst)),
			None => {
				// Exhausted window: a single-token bucket that starts drained.
				let limiter = RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN));
				let _ = limiter.check();

				limiter
			},
		};

		Self { calibration, limiter: Some(limiter) }
	}

	// Saturates the period, then shrinks the burst, until `period * burst` fits the window.
	fn clamp(calibration: Calibration) -> (Duration, u32) {
		let period = calibration.refill_interval.min(Duration::from_nanos(MAX_WINDOW_NANOS));
		let period_nanos = u64::try_from(period.as_nanos()).unwrap_or(MAX_WINDOW_NANOS).max(1);
		let max_burst = u32::try_from(MAX_WINDOW_NANOS / period_nanos).unwrap_or(u32::MAX);
		let burst = u32::try_from(calibration.capacity).unwrap_or(u32::MAX).min(max_burst);

		(period, burst)
	}
}
impl Debug for Bucket {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Bucket").field("calibration", &self.calibration).finish()
	}
}

/// Limiter that calibrates itself from upstream rate limit headers.
#[derive(Debug)]
pub struct HeaderLimiter {
	keys: HeaderKeys,
	bucket: Mutex<Option<Arc<Bucket>>>,
}
impl HeaderLimiter {
	/// Creates an uncalibrated limiter reading the provided header names.
	pub fn new(keys: HeaderKeys) -> Self {
		Self { keys, bucket: Mutex::new(None) }
	}

	/// Header names this limiter reads.
	pub fn header_keys(&self) -> &HeaderKeys {
		&self.keys
	}

	/// Parameters of the calibrated bucket, or `None` while uncalibrated.
	pub fn calibration(&self) -> Option<Calibration> {
		self.bucket.lock().as_ref().map(|bucket| bucket.calibration)
	}

	fn current_bucket(&self) -> Option<Arc<Bucket>> {
		self.bucket.lock().clone()
	}
}
impl AdjustableLimiter for HeaderLimiter {
	fn wait<'a>(&'a self, ctx: &'a RequestContext) -> LimiterFuture<'a> {
		// Copy the bucket out so waiters never hold the calibration lock.
		let bucket = self.current_bucket();

		Box::pin(async move {
			let Some(limiter) = bucket.as_ref().and_then(|bucket| bucket.limiter.as_ref()) else {
				return Ok(());
			};

			ctx.run(limiter.until_ready()).await.map(|_| ())
		})
	}

	fn adjust_limit(&self, headers: &HeaderMap) -> Result<(), MalformedHeader> {
		let mut slot = self.bucket.lock();

		if slot.is_some() {
			return Ok(());
		}

		let limit = parse_limit(headers, &self.keys)?;
		let calibration =
			Calibration { capacity: limit.remaining, refill_interval: limit.reset_after() };

		obs::log_calibration(&limit);

		*slot = Some(Arc::new(Bucket::calibrate(calibration)));

		Ok(())
	}
}

/// Limiter with a fixed quota; response headers are ignored.
#[derive(Debug)]
pub struct FixedLimiter {
	limiter: DirectRateLimiter,
}
impl FixedLimiter {
	/// Admits `burst` requests at once and refills one token every `period`.
	///
	/// Returns `None` when `period` is zero.
	pub fn new(period: Duration, burst: NonZeroU32) -> Option<Self> {
		let quota = Quota::with_period(period)?.allow_burst(burst);

		Some(Self { limiter: RateLimiter::direct(quota) })
	}
}
impl AdjustableLimiter for FixedLimiter {
	fn wait<'a>(&'a self, ctx: &'a RequestContext) -> LimiterFuture<'a> {
		Box::pin(async move { ctx.run(self.limiter.until_ready()).await.map(|_| ()) })
	}

	fn adjust_limit(&self, _headers: &HeaderMap) -> Result<(), MalformedHeader> {
		Ok(())
	}
}
