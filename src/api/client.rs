use std::future::Future;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::error::ApiError;
use super::types::{ActionReply, Artifact, Job, Listing, UploadReceipt};

/// Origin used when the configured base URL is empty.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// The operations the synchronizer and the dispatcher need from the backend.
///
/// [`ApiClient`] is the real implementation; tests substitute scripted ones.
pub trait JobsApi: Send + Sync {
    fn list_jobs(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<Job>, ApiError>> + Send;

    fn list_artifacts(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<Artifact>, ApiError>> + Send;

    fn upload_job(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<UploadReceipt, ApiError>> + Send;

    fn trigger_generate(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ActionReply, ApiError>> + Send;

    fn trigger_execute(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ActionReply, ApiError>> + Send;
}

/// Request body: structured data sent as JSON, or a multipart form.
pub enum RequestBody {
    Json(Value),
    Multipart(Form),
}

/// A request relative to the client's base URL.
///
/// The path is kept as raw segments; each one is percent-encoded when the
/// final URL is built, so job ids and artifact names can contain anything.
pub struct ApiRequest {
    method: Method,
    segments: Vec<String>,
    body: Option<RequestBody>,
    headers: HeaderMap,
}

impl ApiRequest {
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::GET, segments)
    }

    pub fn post<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Method::POST, segments)
    }

    pub fn json(mut self, value: Value) -> Self {
        self.body = Some(RequestBody::Json(value));
        self
    }

    pub fn multipart(mut self, form: Form) -> Self {
        self.body = Some(RequestBody::Multipart(form));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A successful response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    /// Deserializes a JSON payload into `T`. Text payloads are a decode error.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            Payload::Json(value) => {
                serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
            }
            Payload::Text(text) => Err(ApiError::Decode(format!(
                "expected JSON, got text: {}",
                text.chars().take(80).collect::<String>()
            ))),
        }
    }
}

/// HTTP client for the pipeline backend.
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Builds a client for `base_url`. An empty string means [`DEFAULT_BASE_URL`].
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let raw = match base_url.trim() {
            "" => DEFAULT_BASE_URL,
            other => other,
        };
        let base_url =
            Url::parse(raw).map_err(|e| ApiError::InvalidUrl(format!("{raw}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(raw.to_string()));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Joins percent-encoded `segments` onto the base URL.
    pub fn url<I, S>(&self, segments: I) -> Url
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Direct download URL for one artifact.
    pub fn artifact_url(&self, job_id: &str, name: &str) -> Url {
        self.url(["api", "jobs", job_id, "artifacts", name])
    }

    /// URL of the embeddable HTML report for a job.
    pub fn report_url(&self, job_id: &str) -> Url {
        self.url(["api", "jobs", job_id, "allure"])
    }

    /// Sends `request` and returns the parsed body.
    ///
    /// Never retries. When `cancel` fires first the call fails with
    /// [`ApiError::Cancelled`].
    pub async fn send(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<Payload, ApiError> {
        with_cancel(cancel, async {
            let response = self.dispatch(request).await?;
            read_payload(response).await
        })
        .await
    }

    /// Like [`send`](Self::send) but returns the raw body bytes.
    pub async fn fetch_bytes(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ApiError> {
        with_cancel(cancel, async {
            let response = self.dispatch(request).await?;
            Ok(response.bytes().await?.to_vec())
        })
        .await
    }

    /// Downloads one artifact's contents.
    pub async fn download_artifact(
        &self,
        job_id: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ApiError> {
        let request = ApiRequest::get(["api", "jobs", job_id, "artifacts", name]);
        self.fetch_bytes(request, cancel).await
    }

    async fn dispatch(&self, request: ApiRequest) -> Result<Response, ApiError> {
        let ApiRequest {
            method,
            segments,
            body,
            mut headers,
        } = request;
        let url = self.url(&segments);
        tracing::debug!(%method, %url, "sending request");

        let builder = self.client.request(method, url);
        let builder = match body {
            Some(RequestBody::Json(value)) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                let bytes =
                    serde_json::to_vec(&value).map_err(|e| ApiError::Decode(e.to_string()))?;
                builder.headers(headers).body(bytes)
            }
            Some(RequestBody::Multipart(form)) => builder.headers(headers).multipart(form),
            None => builder.headers(headers),
        };

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response)
    }
}

impl JobsApi for ApiClient {
    async fn list_jobs(&self, cancel: &CancellationToken) -> Result<Vec<Job>, ApiError> {
        let payload = self.send(ApiRequest::get(["api", "jobs"]), cancel).await?;
        Ok(payload.decode::<Listing<Job>>()?.into_vec())
    }

    async fn list_artifacts(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Artifact>, ApiError> {
        let request = ApiRequest::get(["api", "jobs", job_id, "artifacts"]);
        let payload = self.send(request, cancel).await?;
        Ok(payload.decode::<Listing<Artifact>>()?.into_vec())
    }

    async fn upload_job(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<UploadReceipt, ApiError> {
        let part = Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str(mime_for(file_name))?;
        let form = Form::new().part("file", part);
        let payload = self
            .send(ApiRequest::post(["api", "jobs"]).multipart(form), cancel)
            .await?;
        payload.decode()
    }

    async fn trigger_generate(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ActionReply, ApiError> {
        let request = ApiRequest::post(["api", "jobs", job_id, "generate"]);
        Ok(action_reply(self.send(request, cancel).await?))
    }

    async fn trigger_execute(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ActionReply, ApiError> {
        let request = ApiRequest::post(["api", "jobs", job_id, "execute"]);
        Ok(action_reply(self.send(request, cancel).await?))
    }
}

async fn with_cancel<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, ApiError>>,
) -> Result<T, ApiError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        result = fut => result,
    }
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"))
}

async fn read_payload(response: Response) -> Result<Payload, ApiError> {
    if is_json(&response) {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Payload::Json(Value::Null));
        }
        let value = serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(Payload::Json(value))
    } else {
        Ok(Payload::Text(response.text().await?))
    }
}

async fn error_from_response(response: Response) -> ApiError {
    let status = response.status();
    let json = is_json(&response);
    let body = response.text().await.unwrap_or_default();
    let detail = extract_detail(&body, json).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });
    tracing::debug!(status = status.as_u16(), %detail, "request rejected");
    ApiError::Api {
        status: status.as_u16(),
        detail,
    }
}

/// Human-readable detail from an error body: `detail`, then `message`, then
/// the body itself. `None` for an empty body.
fn extract_detail(body: &str, is_json: bool) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if is_json {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return Some(detail_from_value(&value));
        }
    }
    Some(trimmed.to_string())
}

fn detail_from_value(value: &Value) -> String {
    for key in ["detail", "message"] {
        match value.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return s.clone(),
            None | Some(Value::Null) | Some(Value::String(_)) => {}
            // FastAPI validation errors put a list under `detail`.
            Some(other) => return other.to_string(),
        }
    }
    value.to_string()
}

fn action_reply(payload: Payload) -> ActionReply {
    match payload {
        Payload::Json(value @ Value::Object(_)) => {
            serde_json::from_value(value).unwrap_or_default()
        }
        _ => ActionReply::default(),
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".csv") {
        "text/csv"
    } else if lower.ends_with(".xlsx") {
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_base_falls_back_to_default_origin() {
        let client = ApiClient::new("").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8000/");
    }

    #[test]
    fn invalid_base_is_rejected() {
        assert!(matches!(
            ApiClient::new("not a url"),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(matches!(
            ApiClient::new("mailto:someone@example.com"),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn segments_are_percent_encoded() {
        let client = ApiClient::new("http://backend:9000").unwrap();
        let url = client.artifact_url("job 1", "report/final.html");
        assert_eq!(
            url.as_str(),
            "http://backend:9000/api/jobs/job%201/artifacts/report%2Ffinal.html"
        );
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let client = ApiClient::new("http://backend:9000/pipeline/").unwrap();
        assert_eq!(
            client.report_url("j1").as_str(),
            "http://backend:9000/pipeline/api/jobs/j1/allure"
        );
    }

    #[test]
    fn detail_field_wins() {
        let body = r#"{"detail":"queue full","message":"other"}"#;
        assert_eq!(extract_detail(body, true).as_deref(), Some("queue full"));
    }

    #[test]
    fn message_field_is_second_choice() {
        let body = r#"{"message":"bad input"}"#;
        assert_eq!(extract_detail(body, true).as_deref(), Some("bad input"));
    }

    #[test]
    fn structured_detail_is_rendered_as_json() {
        let body = r#"{"detail":[{"loc":["file"],"msg":"field required"}]}"#;
        let detail = extract_detail(body, true).unwrap();
        assert!(detail.starts_with('['));
        assert!(detail.contains("field required"));
    }

    #[test]
    fn json_without_known_fields_falls_back_to_body() {
        let body = r#"{"code":17}"#;
        assert_eq!(extract_detail(body, true).as_deref(), Some(r#"{"code":17}"#));
    }

    #[test]
    fn text_body_is_used_verbatim() {
        assert_eq!(
            extract_detail("upstream timed out\n", false).as_deref(),
            Some("upstream timed out")
        );
        assert_eq!(extract_detail("   ", false), None);
    }

    #[test]
    fn text_payload_does_not_decode() {
        let result = Payload::Text("<html>".into()).decode::<Vec<Job>>();
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[test]
    fn action_reply_from_non_object_is_empty() {
        assert_eq!(action_reply(Payload::Text("ok".into())).text(), None);
        assert_eq!(action_reply(Payload::Json(Value::Null)).text(), None);
        let reply = action_reply(Payload::Json(serde_json::json!({"message": "queued"})));
        assert_eq!(reply.text(), Some("queued"));
    }

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(mime_for("a.CSV"), "text/csv");
        assert!(mime_for("b.xlsx").contains("spreadsheetml"));
    }
}
