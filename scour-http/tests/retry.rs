use std::time::{Duration, Instant};

use scour_http::{Auth, HttpClient, HttpError, RequestOpts};
use serde_json::Value;
use wiremock::matchers::{basic_auth, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BACKOFF: Duration = Duration::from_millis(40);

fn client(server: &MockServer) -> HttpClient {
    HttpClient::new(&server.uri())
        .unwrap()
        .with_retries(2)
        .with_backoff(BACKOFF)
}

#[tokio::test]
async fn server_errors_are_retried_with_linear_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
        .mount(&server)
        .await;

    let started = Instant::now();
    let got: Value = client(&server)
        .get_json("/search", RequestOpts::default())
        .await
        .expect("third attempt succeeds");

    assert_eq!(got["results"], serde_json::json!([]));
    // 1x + 2x backoff between three attempts
    assert!(started.elapsed() >= BACKOFF * 3);
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 3);
}

#[tokio::test]
async fn client_errors_fail_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such page"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server)
        .get_json::<Value>("/search", RequestOpts::default())
        .await
        .unwrap_err();

    match err {
        HttpError::Api { status, message } => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(message, "no such page");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn retries_exhausted_surface_last_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server)
        .get_json::<Value>("/search", RequestOpts::default())
        .await
        .unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(502));
}

#[tokio::test]
async fn basic_auth_and_query_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(basic_auth("svc", "pw"))
        .and(query_param("q", "минск"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let opts = RequestOpts {
        auth: Some(Auth::Basic {
            username: "svc",
            password: "pw",
        }),
        query: Some(vec![("q", "минск".into()), ("format", "json".into())]),
        ..Default::default()
    };
    let got: Value = client(&server).get_json("/search", opts).await.unwrap();
    assert_eq!(got["ok"], Value::Bool(true));
}

#[tokio::test]
async fn unexpected_content_type_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(b"%PDF-1.7".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let opts = RequestOpts {
        expect_content_type: Some("text/html"),
        ..Default::default()
    };
    let err = client(&server).get_text("/doc", opts).await.unwrap_err();
    assert!(matches!(err, HttpError::ContentType { .. }), "{err:?}");
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let opts = RequestOpts {
        retries: Some(0),
        timeout: Some(Duration::from_millis(50)),
        ..Default::default()
    };
    let err = client(&server).get_text("/slow", opts).await.unwrap_err();
    assert!(matches!(err, HttpError::Timeout(_)), "{err:?}");
}

#[tokio::test]
async fn timeouts_are_retried_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(3)
        .mount(&server)
        .await;

    let opts = RequestOpts {
        timeout: Some(Duration::from_millis(50)),
        ..Default::default()
    };
    let err = client(&server).get_text("/slow", opts).await.unwrap_err();
    assert!(matches!(err, HttpError::Timeout(_)), "{err:?}");
}
