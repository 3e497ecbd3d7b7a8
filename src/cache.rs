//! Token cache contract and the built-in file and in-memory caches.
//!
//! A cache holds at most one [`Token`]: the credential the provider resumes with after a restart.
//! Implementations must update their in-memory view only after the token has been durably
//! stored, so a failed write never leaves memory and storage disagreeing.

pub mod file;
pub mod memory;

pub use file::JsonFileTokenCache;
pub use memory::MemoryTokenCache;

// self
use crate::{_prelude::*, auth::Token};

/// Persistence contract for the provider's current token.
pub trait TokenCache
where
	Self: Send + Sync,
{
	/// Returns the held token, or [`CacheError::Uninitialized`] when none is held.
	fn token(&self) -> Result<Token, CacheError>;

	/// Durably stores `token` and makes it the held token.
	fn refresh(&self, token: &Token) -> Result<(), CacheError>;
}

/// Error type produced by [`TokenCache`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CacheError {
	/// No token has been stored yet.
	#[error("Token cache has not been initialized with a token.")]
	Uninitialized,
	/// Writing the token to durable storage failed.
	#[error("Failed to persist token: {message}.")]
	Persist {
		/// Human-readable error payload.
		message: String,
	},
	/// Reading the stored token failed.
	#[error("Failed to load token: {message}.")]
	Load {
		/// Human-readable error payload.
		message: String,
	},
	/// The stored token could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
}
