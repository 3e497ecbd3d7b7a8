#![cfg(feature = "test")]

// crates.io
use httpmock::prelude::*;
// self
use oauth2_pacer::{
	_preludet::*,
	cache::{JsonFileTokenCache, TokenCache},
	context::RequestContext,
	obs::{InstrumentedTransport, TransportStats},
	provider::AuthorizedClientProvider,
	rate::{HeaderLimiter, Limit},
};

async fn mock_token_endpoint(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded")
				.form_urlencoded_tuple("grant_type", "authorization_code")
				.form_urlencoded_tuple("code", "consent-code")
				.form_urlencoded_tuple("client_secret", "secret-it");
			then.status(200)
				.header("content-type", "application/json")
				.body(
					"{\"access_token\":\"access-chain\",\"refresh_token\":\"refresh-chain\",\"token_type\":\"bearer\",\"expires_in\":3600}",
				);
		})
		.await
}

#[tokio::test]
async fn authorized_client_sends_bearer_calibrates_and_reports() {
	let server = MockServer::start_async().await;
	let token_mock = mock_token_endpoint(&server).await;
	let api_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/1/user/-/profile.json")
				.header("authorization", "Bearer access-chain");
			then.status(200)
				.header("content-type", "application/json")
				.header("X-RateLimit-Limit", "150")
				.header("X-RateLimit-Remaining", "149")
				.header("X-RateLimit-Reset", "1200")
				.body("{\"user\":{}}");
		})
		.await;
	let limiter = Arc::new(HeaderLimiter::new(test_header_keys()));
	let stats = Arc::new(TransportStats::default());
	let provider = AuthorizedClientProvider::new(
		Arc::new(build_test_oauth_config(&server.base_url())),
		AuthorizedClientProvider::generate_state(),
	)
	.with_rate_limiter(limiter.clone())
	.with_instrumentation(InstrumentedTransport::layer(stats.clone(), test_header_keys()));
	let path = temp_token_path("chain");
	let cache = Arc::new(JsonFileTokenCache::open(&path).expect("Empty token cache should open."));

	provider.set_token_cache(cache.clone()).expect("Empty cache should install.");
	provider
		.authorize(&RequestContext::background(), "consent-code")
		.await
		.expect("Authorization code exchange should succeed.");

	token_mock.assert_async().await;

	let client = provider
		.client(&RequestContext::background())
		.await
		.expect("Authorized provider should build a client.");
	let response = client
		.get(&server.url("/1/user/-/profile.json"))
		.await
		.expect("API request should succeed.");

	assert_eq!(response.status(), 200);
	api_mock.assert_async().await;

	let calibration = limiter.calibration().expect("Limiter should calibrate from the response.");

	assert_eq!(calibration.capacity, 149);
	assert_eq!(calibration.refill_interval, Duration::from_secs(1200));
	assert_eq!(stats.requests(), 1);
	assert_eq!(stats.responses(), 1);
	assert_eq!(stats.in_flight(), 0);
	assert_eq!(
		stats.last_limit(),
		Some(Limit { ceiling: 150, remaining: 149, reset_after_seconds: 1200 })
	);

	let persisted = JsonFileTokenCache::open(&path)
		.expect("Persisted token cache should reopen.")
		.token()
		.expect("Authorized token should be persisted.");

	assert_eq!(persisted.access_token.expose(), "access-chain");
	assert_eq!(
		persisted.refresh_token.as_ref().map(|secret| secret.expose()),
		Some("refresh-chain")
	);
	assert_eq!(cache.path(), path.as_path());

	std::fs::remove_file(&path).unwrap_or_else(|e| {
		panic!("Failed to remove temporary token file {}: {e}", path.display())
	});
}

#[tokio::test]
async fn unauthorized_provider_never_reaches_the_api() {
	let server = MockServer::start_async().await;
	let api_mock = server
		.mock_async(|when, then| {
			when.any_request();
			then.status(200);
		})
		.await;
	let provider = AuthorizedClientProvider::new(
		Arc::new(build_test_oauth_config(&server.base_url())),
		"state-it",
	);
	let err = provider
		.client(&RequestContext::background())
		.await
		.expect_err("Unauthorized provider must refuse to build clients.");

	assert!(matches!(err, Error::Unauthorized));
	assert!(!provider.is_authorized().await);
	assert!(provider.is_state_valid("state-it"));

	let consent = provider.authorization_url();

	assert!(consent.as_str().starts_with(&server.url("/authorize")));
	assert!(consent.query_pairs().any(|(k, v)| k == "access_type" && v == "offline"));

	api_mock.assert_calls_async(0).await;
}
