//! Thread-safe in-memory [`TokenCache`] for tests and ephemeral deployments.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// self
use crate::{
	_prelude::*,
	auth::Token,
	cache::{CacheError, TokenCache},
};

/// Keeps the token in-process; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenCache {
	current: Mutex<Option<Token>>,
	writes: AtomicUsize,
}
impl MemoryTokenCache {
	/// Creates a cache already holding `token`.
	pub fn with_token(token: Token) -> Self {
		Self { current: Mutex::new(Some(token)), writes: AtomicUsize::new(0) }
	}

	/// Number of successful [`TokenCache::refresh`] calls.
	pub fn writes(&self) -> usize {
		self.writes.load(Ordering::Relaxed)
	}
}
impl TokenCache for MemoryTokenCache {
	fn token(&self) -> Result<Token, CacheError> {
		self.current.lock().clone().ok_or(CacheError::Uninitialized)
	}

	fn refresh(&self, token: &Token) -> Result<(), CacheError> {
		*self.current.lock() = Some(token.clone());

		self.writes.fetch_add(1, Ordering::Relaxed);

		Ok(())
	}
}
