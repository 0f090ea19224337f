use std::time::Duration;

use automation_dashboard::api::{ApiClient, ApiError, ApiRequest, JobsApi, Payload};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

async fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri()).unwrap()
}

#[tokio::test]
async fn list_jobs_accepts_bare_array() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "j1", "status": "queued", "created_at": "2024-05-01T10:00:00Z"},
            {"id": "j2", "status": "completed"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let jobs = client_for(&server)
        .await
        .list_jobs(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].id, "j1");
    assert_eq!(jobs[0].created_at.as_deref(), Some("2024-05-01T10:00:00Z"));
    assert_eq!(jobs[1].status, "completed");
}

#[tokio::test]
async fn list_jobs_accepts_items_wrapper() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"items": [{"job_id": "j7", "status": "running"}]})),
        )
        .mount(&server)
        .await;

    let jobs = client_for(&server)
        .await
        .list_jobs(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, "j7");
}

#[tokio::test]
async fn empty_job_list_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let jobs = client_for(&server)
        .await
        .list_jobs(&CancellationToken::new())
        .await
        .unwrap();
    assert!(jobs.is_empty());
}

#[tokio::test]
async fn list_artifacts_normalizes_shape() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/j1/artifacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"name": "test_login.py", "size": 1536}, {"filename": "cases.json"}]
        })))
        .mount(&server)
        .await;

    let artifacts = client_for(&server)
        .await
        .list_artifacts("j1", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(artifacts.len(), 2);
    assert_eq!(artifacts[0].size, Some(1536));
    assert_eq!(artifacts[1].name, "cases.json");
}

#[tokio::test]
async fn json_error_detail_becomes_the_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/jobs/j1/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "queue full"})))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .trigger_generate("j1", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ApiError::Api {
            status: 500,
            detail: "queue full".into()
        }
    );
    assert_eq!(err.to_string(), "queue full");
}

#[tokio::test]
async fn json_error_message_field_is_used() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/jobs/j1/execute"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"message": "generation not finished"})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .trigger_execute("j1", &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(409));
    assert_eq!(err.to_string(), "generation not finished");
}

#[tokio::test]
async fn text_error_body_is_the_detail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .list_jobs(&CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "upstream unavailable");
    assert_eq!(err.status(), Some(502));
}

#[tokio::test]
async fn empty_error_body_falls_back_to_reason_phrase() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .list_jobs(&CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Internal Server Error");
}

#[tokio::test]
async fn json_body_gets_json_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/echo"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"retry": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let payload = client_for(&server)
        .await
        .send(
            ApiRequest::post(["api", "echo"]).json(json!({"retry": true})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(payload, Payload::Json(json!({"ok": true})));
}

#[tokio::test]
async fn supplied_content_type_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/echo"))
        .and(header("content-type", "application/merge-patch+json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let payload = client_for(&server)
        .await
        .send(
            ApiRequest::post(["api", "echo"])
                .header(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/merge-patch+json"),
                )
                .json(json!({"status": "queued"})),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(payload, Payload::Text(String::new()));
}

#[tokio::test]
async fn non_json_success_is_returned_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/j1/allure"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>report</html>"))
        .mount(&server)
        .await;

    let payload = client_for(&server)
        .await
        .send(
            ApiRequest::get(["api", "jobs", "j1", "allure"]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(payload, Payload::Text("<html>report</html>".into()));
}

#[tokio::test]
async fn upload_sends_multipart_file_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/jobs"))
        .and(|req: &Request| {
            let multipart = req
                .headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.starts_with("multipart/form-data"));
            let body = String::from_utf8_lossy(&req.body);
            multipart && body.contains("name=\"file\"") && body.contains("filename=\"srs.csv\"")
        })
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"job_id": "j42"})))
        .expect(1)
        .mount(&server)
        .await;

    let receipt = client_for(&server)
        .await
        .upload_job("srs.csv", b"id,req\n1,login\n".to_vec(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(receipt.job_id, "j42");
}

#[tokio::test]
async fn download_returns_raw_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/j1/artifacts/results.zip"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(vec![0x50, 0x4b, 0x03, 0x04], "application/zip"),
        )
        .mount(&server)
        .await;

    let bytes = client_for(&server)
        .await
        .download_artifact("j1", "results.zip", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(bytes, vec![0x50, 0x4b, 0x03, 0x04]);
}

#[tokio::test]
async fn cancellation_interrupts_a_slow_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });
    }

    let err = client.list_jobs(&cancel).await.unwrap_err();
    assert_eq!(err, ApiError::Cancelled);
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let client = ApiClient::new("http://127.0.0.1:1").unwrap();
    let err = client
        .list_jobs(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn never_retries_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server)
        .await
        .list_jobs(&CancellationToken::new())
        .await;
    assert!(result.is_err());
}
