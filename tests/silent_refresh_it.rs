#![cfg(feature = "test")]

// std
use std::fs;
// crates.io
use httpmock::prelude::*;
// self
use oauth2_pacer::{
	_preludet::*,
	auth::Token,
	cache::{JsonFileTokenCache, TokenCache},
	context::RequestContext,
	provider::AuthorizedClientProvider,
};

fn expired_token() -> Token {
	Token::new("access-stale")
		.with_refresh_token("refresh-kept")
		.with_expiry(OffsetDateTime::now_utc() - time::Duration::minutes(5))
}

#[tokio::test]
async fn expired_cached_token_is_refreshed_and_persisted() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("grant_type", "refresh_token")
				.form_urlencoded_tuple("refresh_token", "refresh-kept");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-fresh\",\"token_type\":\"bearer\",\"expires_in\":28800}");
		})
		.await;
	let path = temp_token_path("silent_refresh");
	let cache = Arc::new(
		JsonFileTokenCache::from_token(&path, &expired_token())
			.expect("Seeded token cache should persist."),
	);
	let provider = AuthorizedClientProvider::new(
		Arc::new(build_test_oauth_config(&server.base_url())),
		"state-refresh",
	);

	provider.set_token_cache(cache.clone()).expect("Seeded cache should install.");

	let ctx = RequestContext::background();
	let (first, second) = tokio::join!(provider.client(&ctx), provider.client(&ctx));

	first.expect("First client should refresh the token.");
	second.expect("Second client should share the refreshed token.");
	mock.assert_calls_async(1).await;

	assert!(provider.is_authorized().await);

	let cached = cache.token().expect("Cache should hold the refreshed token.");

	assert_eq!(cached.access_token.expose(), "access-fresh");
	assert_eq!(cached.refresh_token.as_ref().map(|secret| secret.expose()), Some("refresh-kept"));
	assert!(cached.is_valid());

	let on_disk = JsonFileTokenCache::open(&path)
		.expect("Refreshed token file should reopen.")
		.token()
		.expect("Refreshed token should be on disk.");

	assert_eq!(on_disk, cached);

	fs::remove_file(&path).unwrap_or_else(|e| {
		panic!("Failed to remove temporary token file {}: {e}", path.display())
	});
}

#[tokio::test]
async fn revoked_refresh_token_fails_the_client() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"Refresh token invalid.\"}");
		})
		.await;
	let path = temp_token_path("revoked_refresh");
	let cache = Arc::new(
		JsonFileTokenCache::from_token(&path, &expired_token())
			.expect("Seeded token cache should persist."),
	);
	let provider = AuthorizedClientProvider::new(
		Arc::new(build_test_oauth_config(&server.base_url())),
		"state-revoked",
	);

	provider.set_token_cache(cache.clone()).expect("Seeded cache should install.");

	let err = provider
		.client(&RequestContext::background())
		.await
		.expect_err("Refresh with a revoked token must fail.");

	mock.assert_async().await;

	assert!(matches!(err, Error::Exchange(_)));
	assert!(!provider.is_authorized().await);
	assert_eq!(
		cache.token().map(|token| token.access_token.expose().to_owned()),
		Ok("access-stale".into())
	);

	fs::remove_file(&path).unwrap_or_else(|e| {
		panic!("Failed to remove temporary token file {}: {e}", path.display())
	});
}
