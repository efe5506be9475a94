use std::time::Duration;

use mockito::{Matcher, Server};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wings_api::{ApiError, ClientConfig, RequestContext, RetryPolicy, WingsClient};
use wings_types::{ValueEvaluation, VariantKind};

const BOOL_VALUE: &str = include_str!("data/bool.json");
const INT_VALUE: &str = include_str!("data/int.json");
const STRING_VALUE: &str = include_str!("data/string.json");
const OBJECT_VALUE: &str = include_str!("data/object.json");

fn fast_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(max_retries)
        .with_wait(Duration::from_millis(1), Duration::from_millis(5))
}

fn client_for(endpoint: &str, retry: RetryPolicy) -> WingsClient {
    let config = ClientConfig::new(endpoint, "test_key_id", "test_key")
        .expect("valid config")
        .with_retry_policy(retry);
    WingsClient::new(config).expect("build client")
}

#[tokio::test]
async fn get_sends_identity_headers_and_decodes_value() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/values/test-bool-value")
        .match_header("x-api-key-id", "test_key_id")
        .match_header("x-api-key", "test_key")
        .match_header("content-type", "application/json")
        .match_header("user-agent", Matcher::Regex("^wings-provider/".to_string()))
        .with_status(200)
        .with_body(BOOL_VALUE)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server.url(), RetryPolicy::none());
    let value = client
        .get_value(&RequestContext::default(), "test-bool-value")
        .await
        .expect("get value");

    mock.assert_async().await;
    assert_eq!(value.id, "test-bool-value");
    assert_eq!(value.variant("on"), Some(&ValueEvaluation::Bool(true)));
    assert_eq!(value.targeting.rules[1].expr, "userId == 'XXX'");
    assert_eq!(value.tests[0].expected, "on");
}

#[tokio::test]
async fn decodes_every_variant_kind() {
    let mut server = Server::new_async().await;
    let fixtures = [
        ("test-integer-value", INT_VALUE, VariantKind::Int),
        ("test-string-value", STRING_VALUE, VariantKind::String),
        ("test-json-value", OBJECT_VALUE, VariantKind::Object),
    ];
    for (id, body, _) in fixtures {
        server
            .mock("GET", format!("/values/{id}").as_str())
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
    }

    let client = client_for(&server.url(), RetryPolicy::none());
    for (id, _, kind) in fixtures {
        let value = client
            .get_value(&RequestContext::default(), id)
            .await
            .unwrap_or_else(|error| panic!("get {id}: {error}"));
        let evaluation = value.variant(&value.default_variant).expect("default variant present");
        assert_eq!(evaluation.kind(), kind, "{id}");
    }
}

#[tokio::test]
async fn create_posts_value_json() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/values")
        .match_body(Matcher::PartialJson(json!({
            "id": "test-bool-value",
            "defaultVariant": "off",
            "variants": {"on": {"bool": {"value": true}}},
            "targeting": {"rules": [{"variant": "on", "expr": "env == 'dev'"}]}
        })))
        .with_status(200)
        .with_body(BOOL_VALUE)
        .expect(1)
        .create_async()
        .await;

    let mut value: wings_types::Value = serde_json::from_str(BOOL_VALUE).expect("fixture");
    value.targeting.rules.truncate(1);
    let client = client_for(&server.url(), RetryPolicy::none());
    let created = client
        .create_value(&RequestContext::default(), &value)
        .await
        .expect("create value");

    mock.assert_async().await;
    assert_eq!(created.id, "test-bool-value");
}

#[tokio::test]
async fn update_puts_to_value_path() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/values/test-json-value")
        .match_body(Matcher::PartialJson(json!({"id": "test-json-value"})))
        .with_status(200)
        .with_body(OBJECT_VALUE)
        .expect(1)
        .create_async()
        .await;

    let value: wings_types::Value = serde_json::from_str(OBJECT_VALUE).expect("fixture");
    let client = client_for(&server.url(), RetryPolicy::none());
    let updated = client
        .update_value(&RequestContext::default(), &value)
        .await
        .expect("update value");

    mock.assert_async().await;
    assert_eq!(updated, value);
}

#[tokio::test]
async fn delete_accepts_no_content_and_not_found() {
    let mut server = Server::new_async().await;
    server
        .mock("DELETE", "/values/present")
        .with_status(204)
        .create_async()
        .await;
    server
        .mock("DELETE", "/values/missing")
        .with_status(404)
        .with_body("not found")
        .create_async()
        .await;

    let client = client_for(&server.url(), RetryPolicy::none());
    let ctx = RequestContext::default();
    client.delete_value(&ctx, "present").await.expect("delete present value");
    client.delete_value(&ctx, "missing").await.expect("delete is idempotent");
}

#[tokio::test]
async fn delete_surfaces_other_client_errors() {
    let mut server = Server::new_async().await;
    server
        .mock("DELETE", "/values/locked")
        .with_status(400)
        .with_body("value is locked")
        .create_async()
        .await;

    let client = client_for(&server.url(), RetryPolicy::none());
    let error = client
        .delete_value(&RequestContext::default(), "locked")
        .await
        .expect_err("400 must fail");
    assert_eq!(error.status(), Some(400));
    assert_eq!(error.to_string(), "unexpected status code: 400, value is locked");
}

#[tokio::test]
async fn get_create_update_fail_on_error_statuses() {
    for status in [400_usize, 401, 404, 409, 422, 500, 501, 503, 599] {
        let mut server = Server::new_async().await;
        for method in ["GET", "POST", "PUT"] {
            server
                .mock(method, Matcher::Any)
                .with_status(status)
                .with_body("nope")
                .create_async()
                .await;
        }

        let client = client_for(&server.url(), RetryPolicy::none());
        let ctx = RequestContext::default();
        let value: wings_types::Value = serde_json::from_str(INT_VALUE).expect("fixture");

        let get = client.get_value(&ctx, "test-integer-value").await;
        let create = client.create_value(&ctx, &value).await;
        let update = client.update_value(&ctx, &value).await;
        for result in [get, create, update] {
            match result {
                Err(ApiError::RemoteRequest { status: got, body }) => {
                    assert_eq!(usize::from(got), status);
                    assert_eq!(body, "nope");
                }
                other => panic!("expected remote error for {status}, got {other:?}"),
            }
        }
    }
}

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let mut server = Server::new_async().await;
    let failing = server
        .mock("GET", "/values/test-integer-value")
        .with_status(503)
        .expect(2)
        .create_async()
        .await;
    let succeeding = server
        .mock("GET", "/values/test-integer-value")
        .with_status(200)
        .with_body(INT_VALUE)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server.url(), fast_retries(5));
    let value = client
        .get_value(&RequestContext::default(), "test-integer-value")
        .await
        .expect("value after retries");

    failing.assert_async().await;
    succeeding.assert_async().await;
    assert_eq!(value.variant("one"), Some(&ValueEvaluation::Int(1)));
}

#[tokio::test]
async fn exhausted_retries_surface_last_status() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/values/flaky")
        .with_status(500)
        .with_body("boom")
        .expect(3)
        .create_async()
        .await;

    let client = client_for(&server.url(), fast_retries(2));
    let error = client
        .get_value(&RequestContext::default(), "flaky")
        .await
        .expect_err("server keeps failing");

    mock.assert_async().await;
    assert_eq!(error.status(), Some(500));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/values/bad")
        .with_status(400)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server.url(), fast_retries(5));
    let error = client
        .get_value(&RequestContext::default(), "bad")
        .await
        .expect_err("400 must fail");

    mock.assert_async().await;
    assert_eq!(error.status(), Some(400));
}

#[tokio::test]
async fn transport_failures_are_retried_then_surfaced() {
    // Nothing listens on port 1.
    let client = client_for("http://127.0.0.1:1", fast_retries(2));
    let error = client
        .get_value(&RequestContext::default(), "any")
        .await
        .expect_err("connection must fail");

    match error {
        ApiError::Transport { attempts, url, .. } => {
            assert_eq!(attempts, 3);
            assert_eq!(url, "http://127.0.0.1:1/values/any");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_context_aborts_request() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/values/test-bool-value")
        .with_status(200)
        .with_body(BOOL_VALUE)
        .expect(0)
        .create_async()
        .await;

    let token = CancellationToken::new();
    token.cancel();
    let ctx = RequestContext::new().with_cancellation(token);
    let client = client_for(&server.url(), RetryPolicy::none());
    let error = client
        .get_value(&ctx, "test-bool-value")
        .await
        .expect_err("cancelled before dispatch");

    assert!(matches!(error, ApiError::Cancelled));
    mock.assert_async().await;
}

#[tokio::test]
async fn deadline_interrupts_pending_retry() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/values/slow")
        .with_status(503)
        .create_async()
        .await;

    let retry = RetryPolicy::default().with_wait(Duration::from_secs(30), Duration::from_secs(30));
    let client = client_for(&server.url(), retry);
    let ctx = RequestContext::new().with_timeout(Duration::from_millis(200));

    let error = client.get_value(&ctx, "slow").await.expect_err("deadline must fire");
    assert!(matches!(error, ApiError::DeadlineExceeded));
}

#[tokio::test]
async fn malformed_response_body_is_a_decode_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/values/broken")
        .with_status(200)
        .with_body(r#"{"id":"broken","variants":{"x":{}}}"#)
        .create_async()
        .await;

    let client = client_for(&server.url(), RetryPolicy::none());
    let error = client
        .get_value(&RequestContext::default(), "broken")
        .await
        .expect_err("empty variant entry must fail");
    assert!(matches!(error, ApiError::Decode(_)));
}
