//! Integration tests for the HTTP provider against a mock Hide My Email server.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hidemail_core::{
    AliasCandidate, AliasProvider, AliasStatus, CollectingSink, GenerationError, GenerationLoop,
    HttpSessionClient, Operation, ProviderError, RunBudget, Session,
};
use serde_json::json;
use support::socket_guard::start_mock_server_or_skip;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const COOKIE: &str = "X-APPLE-WEBAUTH-USER=\"v=1:s=0:d=987654\"; X-APPLE-WEBAUTH-TOKEN=\"v=2:t=abc\"";

fn client_for(server: &MockServer) -> HttpSessionClient {
    let session = Session::from_cookie(COOKIE, &server.uri()).unwrap();
    HttpSessionClient::new(session).unwrap()
}

fn generated(address: &str) -> serde_json::Value {
    json!({"success": true, "result": {"hme": address}})
}

fn reserved(address: &str, created_ms: i64) -> serde_json::Value {
    json!({
        "success": true,
        "result": {"hme": {"hme": address, "label": "ignored", "createTimestamp": created_ms}}
    })
}

/// Hands out a fresh address on every generate call.
struct SequentialAddresses {
    calls: AtomicUsize,
}

impl Respond for SequentialAddresses {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        ResponseTemplate::new(200).set_body_json(generated(&format!("seq{n}@icloud.com")))
    }
}

// ==================== Request Shape ====================

#[tokio::test]
async fn test_generate_sends_session_headers_and_query() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/v1/hme/generate"))
        .and(query_param("dsid", "987654"))
        .and(query_param("clientBuildNumber", "2206Hotfix12"))
        .and(query_param("clientMasteringNumber", "2206Hotfix12"))
        .and(header("origin", "https://www.icloud.com"))
        .and(header("content-type", "text/plain"))
        .and(header("cookie", COOKIE))
        .and(body_json(json!({"langCode": "en-us"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(generated("fresh@icloud.com")))
        .expect(1)
        .mount(&server)
        .await;

    let candidate = client_for(&server).generate_candidate().await.unwrap();
    assert_eq!(candidate.address, "fresh@icloud.com");
}

#[tokio::test]
async fn test_reserve_sends_label_and_parses_timestamp() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/v1/hme/reserve"))
        .and(body_partial_json(json!({"hme": "fresh@icloud.com", "label": "shopping"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(reserved("fresh@icloud.com", 1_700_000_000_000)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let record = client_for(&server)
        .reserve(&AliasCandidate::new("fresh@icloud.com"), "shopping")
        .await
        .unwrap();

    assert_eq!(record.address, "fresh@icloud.com");
    assert_eq!(record.label, "shopping");
    assert_eq!(record.status, AliasStatus::Reserved);
    assert_eq!(record.created_at.timestamp_millis(), 1_700_000_000_000);
}

#[tokio::test]
async fn test_reserve_forwards_generate_token() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/v1/hme/reserve"))
        .and(body_partial_json(json!({"hme": "t@icloud.com", "token": "tok-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(reserved("t@icloud.com", 0)))
        .expect(1)
        .mount(&server)
        .await;

    let candidate = AliasCandidate::new("t@icloud.com").with_token("tok-1");
    client_for(&server).reserve(&candidate, "x").await.unwrap();
}

// ==================== Error Classification ====================

#[tokio::test]
async fn test_session_rejection_statuses_map_to_auth() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    for status in [401_u16, 403, 421] {
        server.reset().await;
        Mock::given(method("POST"))
            .and(path("/v1/hme/generate"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let error = client_for(&server).generate_candidate().await.unwrap_err();
        match error {
            ProviderError::Auth {
                operation, status: got, ..
            } => {
                assert_eq!(operation, Operation::Generate);
                assert_eq!(got, status);
            }
            other => panic!("HTTP {status} should be Auth, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_429_with_retry_after_is_rate_limited() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/v1/hme/generate"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let error = client_for(&server).generate_candidate().await.unwrap_err();
    match error {
        ProviderError::RateLimited { retry_after, .. } => {
            assert_eq!(retry_after, Some(Duration::from_secs(30)));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_without_header_is_rate_limited() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/v1/hme/reserve"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let error = client_for(&server)
        .reserve(&AliasCandidate::new("a@icloud.com"), "x")
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        ProviderError::RateLimited {
            operation: Operation::Reserve,
            retry_after: None,
            ..
        }
    ));
}

#[tokio::test]
async fn test_unparseable_body_is_protocol_error() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/v1/hme/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let error = client_for(&server).generate_candidate().await.unwrap_err();
    assert!(matches!(error, ProviderError::Protocol { .. }), "got {error:?}");
}

#[tokio::test]
async fn test_failure_envelope_about_session_is_auth() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/v1/hme/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": {"errorCode": "-1", "errorMessage": "Session expired"}
        })))
        .mount(&server)
        .await;

    let error = client_for(&server).generate_candidate().await.unwrap_err();
    assert!(error.is_fatal(), "got {error:?}");
}

#[tokio::test]
async fn test_reserve_already_in_use_is_already_reserved() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/v1/hme/reserve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": 1,
            "reason": "This address is already in use"
        })))
        .mount(&server)
        .await;

    let error = client_for(&server)
        .reserve(&AliasCandidate::new("dup@icloud.com"), "x")
        .await
        .unwrap_err();
    match error {
        ProviderError::AlreadyReserved { address, .. } => assert_eq!(address, "dup@icloud.com"),
        other => panic!("expected AlreadyReserved, got {other:?}"),
    }
}

#[tokio::test]
async fn test_generic_failure_envelope_is_rate_limited() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/v1/hme/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": {"errorMessage": "You have reached the limit of addresses"}
        })))
        .mount(&server)
        .await;

    let error = client_for(&server).generate_candidate().await.unwrap_err();
    match error {
        ProviderError::RateLimited { reason, .. } => assert!(reason.contains("limit")),
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn test_json_without_envelope_is_protocol_error() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    for body in [json!({}), json!({"status": "maintenance"})] {
        server.reset().await;
        Mock::given(method("POST"))
            .and(path("/v1/hme/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
            .mount(&server)
            .await;

        let error = client_for(&server).generate_candidate().await.unwrap_err();
        assert!(
            matches!(error, ProviderError::Protocol { .. }),
            "{body} should be Protocol, got {error:?}"
        );
    }
}

#[tokio::test]
async fn test_reserve_service_outage_message_is_rate_limited() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/v1/hme/reserve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "error": {"errorMessage": "Service not available"}
        })))
        .mount(&server)
        .await;

    let error = client_for(&server)
        .reserve(&AliasCandidate::new("a@icloud.com"), "x")
        .await
        .unwrap_err();
    assert!(matches!(error, ProviderError::RateLimited { .. }), "got {error:?}");
}

#[tokio::test]
async fn test_success_without_address_is_rate_limited() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/v1/hme/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "result": {}})))
        .mount(&server)
        .await;

    let error = client_for(&server).generate_candidate().await.unwrap_err();
    assert!(matches!(error, ProviderError::RateLimited { .. }), "got {error:?}");
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    if support::socket_guard::should_skip_socket_bound_test() {
        return;
    }
    // Bind then release a port so nothing is listening on it.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let session = Session::from_cookie(COOKIE, &format!("http://127.0.0.1:{port}")).unwrap();
    let client = HttpSessionClient::new(session).unwrap();

    let error = client.generate_candidate().await.unwrap_err();
    assert!(matches!(error, ProviderError::Transport { .. }), "got {error:?}");
    assert!(!error.is_fatal());
}

// ==================== Listing ====================

#[tokio::test]
async fn test_list_aliases_parses_entries() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/v2/hme/list"))
        .and(query_param("dsid", "987654"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "result": {"hmeEmails": [
                {"hme": "one@icloud.com", "label": "shop", "createTimestamp": 1_700_000_000_000_i64, "isActive": true},
                {"hme": "two@icloud.com", "label": "old", "isActive": false}
            ]}
        })))
        .mount(&server)
        .await;

    let aliases = client_for(&server).list_aliases().await.unwrap();
    assert_eq!(aliases.len(), 2);
    assert_eq!(aliases[0].address, "one@icloud.com");
    assert!(aliases[0].active);
    assert!(aliases[0].created_at.is_some());
    assert_eq!(aliases[1].label, "old");
    assert!(!aliases[1].active);
    assert!(aliases[1].created_at.is_none());
}

// ==================== Full Loop ====================

#[tokio::test]
async fn test_generation_loop_against_mock_server() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/v1/hme/generate"))
        .respond_with(SequentialAddresses {
            calls: AtomicUsize::new(0),
        })
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/hme/reserve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "result": {}})))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut sink = CollectingSink::new();
    let budget = RunBudget {
        delay_between_requests: Duration::ZERO,
        ..RunBudget::new(3)
    };

    let report = GenerationLoop::new(budget)
        .run(&client, "batch", &mut sink)
        .await
        .unwrap();

    assert_eq!(report.reserved(), 3);
    let addresses: Vec<&str> = sink.records().iter().map(|r| r.address.as_str()).collect();
    assert_eq!(
        addresses,
        vec!["seq0@icloud.com", "seq1@icloud.com", "seq2@icloud.com"]
    );
    assert!(sink.records().iter().all(|r| r.label == "batch"));
}

#[tokio::test]
async fn test_generation_loop_aborts_on_rejected_session() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("POST"))
        .and(path("/v1/hme/generate"))
        .respond_with(ResponseTemplate::new(421))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/hme/reserve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reserved("x@icloud.com", 0)))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut sink = CollectingSink::new();

    let error = GenerationLoop::new(RunBudget::new(5))
        .run(&client, "x", &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(error, GenerationError::SessionRejected { .. }));
    assert_eq!(error.reserved_before_abort(), 0);
    assert!(sink.records().is_empty());
}
