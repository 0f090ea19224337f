//! Tipos de dados trocados com o backend do pipeline.
//!
//! As respostas de listagem chegam como array puro ou como `{"items": [...]}`;
//! [`Listing`] aceita os dois formatos e [`Listing::into_vec`] entrega sempre
//! um `Vec`, de modo que o resto do crate nunca precisa olhar o formato.

use serde::{Deserialize, Serialize};

/// One pipeline run as reported by `GET /api/jobs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    #[serde(alias = "job_id")]
    pub id: String,
    #[serde(default = "unknown_status")]
    pub status: String,
    #[serde(default, alias = "created", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updated", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

fn unknown_status() -> String {
    "unknown".to_string()
}

impl Job {
    /// Convenience constructor used by tests and mocks.
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
            created_at: None,
            updated_at: None,
        }
    }
}

/// A named output file produced by a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default = "unnamed_artifact", alias = "filename", alias = "path")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

fn unnamed_artifact() -> String {
    "artifact".to_string()
}

/// List response, either a bare array or wrapped under `items`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(default = "Vec::new")]
        items: Vec<T>,
    },
}

impl<T> Listing<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(items) | Listing::Wrapped { items } => items,
        }
    }
}

/// Body of `POST /api/jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadReceipt {
    #[serde(alias = "id")]
    pub job_id: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl UploadReceipt {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            detail: None,
            message: None,
        }
    }

    /// Server-provided text, if any, with the same precedence as [`ActionReply::text`].
    pub fn text(&self) -> Option<&str> {
        pick_text(&self.detail, &self.message)
    }
}

/// Body of the generate/execute triggers. Both fields are optional; servers
/// send one or the other.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionReply {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ActionReply {
    /// `detail` wins over `message`; blank strings count as absent.
    pub fn text(&self) -> Option<&str> {
        pick_text(&self.detail, &self.message)
    }
}

fn pick_text<'a>(detail: &'a Option<String>, message: &'a Option<String>) -> Option<&'a str> {
    let non_blank = |s: &&str| !s.trim().is_empty();
    detail
        .as_deref()
        .filter(non_blank)
        .or_else(|| message.as_deref().filter(non_blank))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_and_wrapped_listings_normalize_the_same() {
        let bare: Listing<Job> =
            serde_json::from_str(r#"[{"id":"j1","status":"queued"}]"#).unwrap();
        let wrapped: Listing<Job> =
            serde_json::from_str(r#"{"items":[{"id":"j1","status":"queued"}]}"#).unwrap();
        assert_eq!(bare.into_vec(), wrapped.into_vec());
    }

    #[test]
    fn empty_listing_is_valid() {
        let bare: Listing<Job> = serde_json::from_str("[]").unwrap();
        assert!(bare.into_vec().is_empty());
        let wrapped: Listing<Job> = serde_json::from_str(r#"{"items":[]}"#).unwrap();
        assert!(wrapped.into_vec().is_empty());
    }

    #[test]
    fn job_accepts_alternate_field_names() {
        let job: Job = serde_json::from_str(
            r#"{"job_id":"j9","created":"2024-05-01T10:00:00Z","updated":"2024-05-01T10:05:00Z"}"#,
        )
        .unwrap();
        assert_eq!(job.id, "j9");
        assert_eq!(job.status, "unknown");
        assert_eq!(job.created_at.as_deref(), Some("2024-05-01T10:00:00Z"));
        assert_eq!(job.updated_at.as_deref(), Some("2024-05-01T10:05:00Z"));
    }

    #[test]
    fn artifact_name_fallbacks() {
        let a: Artifact = serde_json::from_str(r#"{"filename":"tests.py","size":2048}"#).unwrap();
        assert_eq!(a.name, "tests.py");
        assert_eq!(a.size, Some(2048));

        let b: Artifact = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(b.name, "artifact");
        assert_eq!(b.size, None);
    }

    #[test]
    fn upload_receipt_accepts_id_alias() {
        let r: UploadReceipt = serde_json::from_str(r#"{"id":"abc"}"#).unwrap();
        assert_eq!(r.job_id, "abc");
        assert_eq!(r.text(), None);

        let r: UploadReceipt =
            serde_json::from_str(r#"{"job_id":"abc","message":"stored"}"#).unwrap();
        assert_eq!(r.text(), Some("stored"));
    }

    #[test]
    fn action_reply_prefers_detail() {
        let reply: ActionReply =
            serde_json::from_str(r#"{"detail":"started","message":"ignored"}"#).unwrap();
        assert_eq!(reply.text(), Some("started"));

        let reply: ActionReply = serde_json::from_str(r#"{"detail":"","message":"ok"}"#).unwrap();
        assert_eq!(reply.text(), Some("ok"));

        assert_eq!(ActionReply::default().text(), None);
    }
}
