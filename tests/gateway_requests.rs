//! Integration coverage for the request pipeline: caching, connectivity, and classification.

// std
use std::{sync::Arc, time::Duration};
// crates.io
use gateway_client::{
	ApiGatewayClient, Error, GatewayConfig, MemoryTokenStore, RequestSpec, ResponseSource, Result,
	SharedConnectivity, TokenStore,
};
use serde_json::json;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};

fn make_config(server: &MockServer) -> GatewayConfig {
	GatewayConfig::new(server.uri()).expect("config")
}

#[tokio::test]
async fn read_responses_are_cached_within_ttl() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/pets"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "pets": [{ "id": 1 }] })))
		.expect(1)
		.mount(&server)
		.await;

	let client = ApiGatewayClient::new(make_config(&server))?;
	let spec = RequestSpec::get("/pets").with_query("user", "1");

	let first = client.request(spec.clone()).await?;
	let second = client.request(spec).await?;

	assert_eq!(first.source, ResponseSource::Network);
	assert_eq!(second.source, ResponseSource::Cache);
	assert!(Arc::ptr_eq(&first.body, &second.body), "cache hit shares the payload handle");

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn mutating_requests_are_never_cached() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/bookings"))
		.respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
		.expect(2)
		.mount(&server)
		.await;

	let client = ApiGatewayClient::new(make_config(&server))?;
	let spec = RequestSpec::post("/bookings").with_body(json!({ "petId": 1 }));

	let first = client.request(spec.clone()).await?;
	let second = client.request(spec).await?;

	assert_eq!(first.source, ResponseSource::Network);
	assert_eq!(second.source, ResponseSource::Network);

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn bypassing_the_cache_forces_a_dispatch() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/bookings"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "bookings": [] })))
		.expect(2)
		.mount(&server)
		.await;

	let client = ApiGatewayClient::new(make_config(&server))?;

	client.request(RequestSpec::get("/bookings")).await?;

	let refreshed = client.request(RequestSpec::get("/bookings").bypass_cache()).await?;

	assert_eq!(refreshed.source, ResponseSource::Network);

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn offline_probe_fails_fast_without_dispatching() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/pets"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "pets": [] })))
		.expect(1)
		.mount(&server)
		.await;

	let probe = SharedConnectivity::new(false);
	let client = ApiGatewayClient::builder(make_config(&server))
		.connectivity(Arc::new(probe.clone()))
		.build()?;

	let offline = client.request(RequestSpec::get("/pets")).await;

	assert!(matches!(offline, Err(Error::NetworkUnavailable)));

	probe.set_online(true);
	client.request(RequestSpec::get("/pets")).await?;

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn bearer_header_is_attached_to_non_exempt_paths_only() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET")).and(path("/pets")).respond_with(
		move |request: &wiremock::Request| {
			assert_eq!(
				request.headers.get("authorization").and_then(|value| value.to_str().ok()),
				Some("Bearer token-1"),
				"business paths carry the bearer credential"
			);

			ResponseTemplate::new(200).set_body_json(json!({ "pets": [] }))
		},
	)
	.expect(1)
	.mount(&server)
	.await;
	Mock::given(method("POST")).and(path("/register")).respond_with(
		move |request: &wiremock::Request| {
			assert!(
				!request.headers.contains_key("authorization"),
				"exempt paths must never carry the bearer credential"
			);

			ResponseTemplate::new(201).set_body_json(json!({ "ok": true }))
		},
	)
	.expect(1)
	.mount(&server)
	.await;

	let tokens = Arc::new(MemoryTokenStore::new());

	tokens.set("token-1".into()).await?;

	let client =
		ApiGatewayClient::builder(make_config(&server)).token_store(tokens).build()?;

	client.request(RequestSpec::get("/pets")).await?;
	client.request(RequestSpec::post("/register").with_body(json!({ "email": "a@b.c" }))).await?;

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn business_errors_propagate_with_status_and_body() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/pets/404"))
		.respond_with(ResponseTemplate::new(404).set_body_string("no such pet"))
		.expect(1)
		.mount(&server)
		.await;

	let client = ApiGatewayClient::new(make_config(&server))?;
	let outcome = client.request(RequestSpec::get("/pets/404")).await;

	match outcome {
		Err(Error::HttpStatus { status, body, .. }) => {
			assert_eq!(status.as_u16(), 404);
			assert_eq!(body.as_deref(), Some("no such pet"));
		},
		other => panic!("expected HttpStatus error, got {other:?}"),
	}

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn unparseable_bodies_surface_as_malformed_response() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/pets"))
		.respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
		.expect(1)
		.mount(&server)
		.await;

	let client = ApiGatewayClient::new(make_config(&server))?;
	let outcome = client.request(RequestSpec::get("/pets")).await;

	assert!(matches!(outcome, Err(Error::MalformedResponse { .. })));

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn slow_backends_fail_with_request_timeout() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/pets"))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(json!({ "pets": [] }))
				.set_delay(Duration::from_millis(500)),
		)
		.mount(&server)
		.await;

	let mut config = make_config(&server);

	config.request_timeout = Duration::from_millis(150);

	let client = ApiGatewayClient::new(config)?;
	let outcome = client.request(RequestSpec::get("/pets")).await;

	assert!(matches!(outcome, Err(Error::RequestTimeout { .. })));
	Ok(())
}

#[tokio::test]
async fn a_401_from_an_exempt_path_is_a_plain_http_error() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/login"))
		.respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
		.expect(1)
		.mount(&server)
		.await;

	let client = ApiGatewayClient::new(make_config(&server))?;
	let outcome =
		client.request(RequestSpec::post("/login").with_body(json!({ "email": "a@b.c" }))).await;

	assert!(matches!(outcome, Err(Error::HttpStatus { status, .. }) if status.as_u16() == 401));

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn logout_clears_the_cache_and_the_token() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/pets"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "pets": [] })))
		.expect(2)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/logout"))
		.respond_with(ResponseTemplate::new(200))
		.expect(1)
		.mount(&server)
		.await;

	let tokens = Arc::new(MemoryTokenStore::new());

	tokens.set("token-1".into()).await?;

	let client = ApiGatewayClient::builder(make_config(&server))
		.token_store(tokens.clone())
		.build()?;

	client.request(RequestSpec::get("/pets")).await?;
	client.logout().await?;

	assert_eq!(tokens.get().await?, None);

	let status = client.status().await;

	assert_eq!(status.cached_entries, 0);
	assert!(!status.token_present);

	// A fresh session must not observe the previous session's cached payloads.
	let after = client.request(RequestSpec::get("/pets")).await?;

	assert_eq!(after.source, ResponseSource::Network);

	server.verify().await;
	Ok(())
}

#[tokio::test]
async fn login_stores_the_returned_access_token() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/login"))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(json!({ "accessToken": "token-9", "user": { "id": 3 } })),
		)
		.expect(1)
		.mount(&server)
		.await;

	let tokens = Arc::new(MemoryTokenStore::new());
	let client = ApiGatewayClient::builder(make_config(&server))
		.token_store(tokens.clone())
		.build()?;

	client.login(json!({ "email": "a@b.c", "password": "hunter2" })).await?;

	assert_eq!(tokens.get().await?.as_deref(), Some("token-9"));

	server.verify().await;
	Ok(())
}
