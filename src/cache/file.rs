//! JSON file-backed [`TokenCache`] for single-process deployments.

// std
use std::{
	ffi::OsString,
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::Token,
	cache::{CacheError, TokenCache},
};

/// Persists the current token to an indented JSON file on every refresh.
///
/// Writes go to a sibling temp file that is synced and then renamed over the target, so a
/// crash mid-write leaves the previous token intact.
#[derive(Debug)]
pub struct JsonFileTokenCache {
	path: PathBuf,
	current: Mutex<Option<Token>>,
}
impl JsonFileTokenCache {
	/// Opens the cache at `path`, loading any token already stored there.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
		let cache = Self { path: path.into(), current: Mutex::new(None) };

		cache.load()?;

		Ok(cache)
	}

	/// Creates a cache at `path` seeded with `token`, writing it to disk immediately.
	pub fn from_token(path: impl Into<PathBuf>, token: &Token) -> Result<Self, CacheError> {
		let cache = Self { path: path.into(), current: Mutex::new(None) };

		cache.refresh(token)?;

		Ok(cache)
	}

	/// Re-reads the file into memory; a missing or empty file means no token.
	pub fn load(&self) -> Result<(), CacheError> {
		let mut current = self.current.lock();

		*current = Self::read_token(&self.path)?;

		Ok(())
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn read_token(path: &Path) -> Result<Option<Token>, CacheError> {
		if !path.exists() {
			return Ok(None);
		}

		let bytes = fs::read(path).map_err(|e| CacheError::Load {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(None);
		}

		let token = serde_json::from_slice(&bytes).map_err(|e| CacheError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})?;

		Ok(Some(token))
	}

	fn write_token(&self, token: &Token) -> Result<(), CacheError> {
		if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| CacheError::Persist {
				message: format!("Failed to create token directory {}: {e}", parent.display()),
			})?;
		}

		let serialized =
			serde_json::to_vec_pretty(token).map_err(|e| CacheError::Serialization {
				message: format!("Failed to serialize token: {e}"),
			})?;
		let tmp_path = Self::temp_path(&self.path);
		let written = Self::write_synced(&tmp_path, &serialized).and_then(|()| {
			fs::rename(&tmp_path, &self.path).map_err(|e| CacheError::Persist {
				message: format!("Failed to replace {}: {e}", self.path.display()),
			})
		});

		if written.is_err() {
			let _ = fs::remove_file(&tmp_path);
		}

		written
	}

	// `<file name>.tmp` beside the target, so caches sharing a directory never share a temp file.
	fn temp_path(path: &Path) -> PathBuf {
		let mut name = path.file_name().map(OsString::from).unwrap_or_default();

		name.push(".tmp");

		path.with_file_name(name)
	}

	fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
		let mut file = File::create(path).map_err(|e| CacheError::Persist {
			message: format!("Failed to create {}: {e}", path.display()),
		})?;

		file.write_all(bytes).map_err(|e| CacheError::Persist {
			message: format!("Failed to write {}: {e}", path.display()),
		})?;
		file.sync_all().map_err(|e| CacheError::Persist {
			message: format!("Failed to sync {}: {e}", path.display()),
		})
	}
}
impl TokenCache for JsonFileTokenCache {
	fn token(&self) -> Result<Token, CacheError> {
		self.current.lock().clone().ok_or(CacheError::Uninitialized)
	}

	fn refresh(&self, token: &Token) -> Result<(), CacheError> {
		let mut current = self.current.lock();

		self.write_token(token)?;

		*current = Some(token.clone());

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;

	fn temp_path(label: &str) -> PathBuf {
		let unique = format!(
			"oauth2_pacer_file_cache_{label}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn token() -> Token {
		Token::new("access-token")
			.with_refresh_token("refresh-token")
			.with_expiry(time::macros::datetime!(2030-01-01 00:00 UTC))
	}

	#[test]
	fn refresh_then_reopen_restores_token() {
		let path = temp_path("reopen");
		let cache = JsonFileTokenCache::open(&path).expect("Failed to open empty token cache.");

		assert_eq!(cache.token(), Err(CacheError::Uninitialized));

		cache.refresh(&token()).expect("Failed to persist token fixture.");
		drop(cache);

		let reopened = JsonFileTokenCache::open(&path).expect("Failed to reopen token cache.");

		assert_eq!(reopened.token(), Ok(token()));

		let raw = fs::read_to_string(&path).expect("Token file should be readable.");

		assert!(raw.contains("\n  \"access_token\": \"access-token\""));
		assert!(raw.contains("\"expiry\": \"2030-01-01T00:00:00Z\""));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary token file {}: {e}", path.display())
		});
	}

	#[test]
	fn empty_file_means_no_token() {
		let path = temp_path("empty");

		fs::write(&path, b"").expect("Failed to create empty token file.");

		let cache = JsonFileTokenCache::open(&path).expect("Empty token file should load.");

		assert_eq!(cache.token(), Err(CacheError::Uninitialized));

		fs::remove_file(&path).expect("Failed to remove empty token file.");
	}

	#[test]
	fn corrupt_file_fails_to_load() {
		let path = temp_path("corrupt");

		fs::write(&path, b"{not json").expect("Failed to create corrupt token file.");

		let err = JsonFileTokenCache::open(&path).expect_err("Corrupt token file must not load.");

		assert!(matches!(err, CacheError::Serialization { .. }));

		fs::remove_file(&path).expect("Failed to remove corrupt token file.");
	}

	#[test]
	fn persist_failure_leaves_memory_unchanged() {
		let blocker = temp_path("blocker");

		fs::write(&blocker, b"not a directory").expect("Failed to create blocking file.");

		let cache = JsonFileTokenCache::open(blocker.join("token.json"))
			.expect("Missing token file should open as empty.");
		let err = cache.refresh(&token()).expect_err("Writing beneath a regular file must fail.");

		assert!(matches!(err, CacheError::Persist { .. }));
		assert_eq!(cache.token(), Err(CacheError::Uninitialized));

		fs::remove_file(&blocker).expect("Failed to remove blocking file.");
	}

	#[test]
	fn from_token_creates_parent_directories() {
		let dir = temp_path("nested");
		let path = dir.join("state").join("token.json");
		let cache =
			JsonFileTokenCache::from_token(&path, &token()).expect("Seeded cache should persist.");

		assert_eq!(cache.path(), path.as_path());
		assert!(path.exists());
		assert_eq!(cache.token(), Ok(token()));

		fs::remove_dir_all(&dir).expect("Failed to remove nested token directory.");
	}

	#[test]
	fn temp_files_are_named_after_the_full_file_name() {
		let dir = env::temp_dir();

		assert_eq!(
			JsonFileTokenCache::temp_path(&dir.join("token.json")),
			dir.join("token.json.tmp")
		);
		assert_ne!(
			JsonFileTokenCache::temp_path(&dir.join("token.json")),
			JsonFileTokenCache::temp_path(&dir.join("token.yaml"))
		);
		assert_eq!(
			JsonFileTokenCache::temp_path(&dir.join("token.tmp")),
			dir.join("token.tmp.tmp")
		);
	}

	#[test]
	fn failed_replace_removes_the_temp_file() {
		let target = temp_path("occupied");

		fs::create_dir_all(target.join("child")).expect("Failed to create occupying directory.");

		let err = JsonFileTokenCache::from_token(&target, &token())
			.expect_err("Replacing a non-empty directory must fail.");

		assert!(matches!(err, CacheError::Persist { .. }));
		assert!(!JsonFileTokenCache::temp_path(&target).exists());

		fs::remove_dir_all(&target).expect("Failed to remove occupying directory.");
	}

}
