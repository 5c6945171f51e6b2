//! HTTP client for the intake endpoint.
//!
//! The client posts one encoded body per call and classifies what came back:
//!
//! - a JSON body with a truthy `success` field is an accepted upload
//! - a JSON body with a falsy `success` field is a business rejection, returned as a normal
//!   [`UploadResult`] carrying the server's message
//! - a body that is not JSON, or is a bare `null`, is an [`UploadError::NonJsonResponse`], even
//!   when the HTTP status is 200, so an HTML error page from a proxy is never mistaken for a rejection
//! - connection, DNS and TLS failures are [`UploadError::Transport`]
//!
//! There is no retry here.

use crate::config::AgentConfig;
use crate::constants::{RAW_BODY_DIAGNOSTIC_CHARS, STATUS_ENDPOINT_PATH, UPLOAD_ENDPOINT_PATH};
use crate::multipart::EncodedBody;
use crate::{AgentError, AgentResult};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

/// Outcome of an upload the server answered with JSON.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadResult {
    pub success: bool,
    pub message: Option<String>,
    pub raw_body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("could not reach server: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("non-JSON response (HTTP {status}): {body}")]
    NonJsonResponse { status: StatusCode, body: String },
}

/// Client bound to one intake server.
#[derive(Clone, Debug)]
pub struct UploadClient {
    http: Client,
    upload_url: Url,
    status_url: Url,
}

impl UploadClient {
    /// Build a client for the server in `config`.
    ///
    /// Plain HTTP or TLS is chosen per request from the URL scheme.
    pub fn new(config: &AgentConfig) -> AgentResult<Self> {
        let http = Client::builder().build().map_err(AgentError::HttpClient)?;
        Ok(Self {
            http,
            upload_url: config.endpoint_url(UPLOAD_ENDPOINT_PATH)?,
            status_url: config.endpoint_url(STATUS_ENDPOINT_PATH)?,
        })
    }

    /// POST `body` to the upload endpoint and classify the response.
    pub async fn upload(&self, body: EncodedBody) -> Result<UploadResult, UploadError> {
        let content_type = body.content_type();
        let content_length = body.content_length();

        let response = self
            .http
            .post(self.upload_url.clone())
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, content_length)
            .body(body.into_bytes())
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        classify_response(status, &bytes)
    }

    /// GET the status endpoint. Any HTTP status means the server is reachable; the body is
    /// drained but not interpreted.
    pub async fn check_status(&self) -> Result<StatusCode, UploadError> {
        let response = self.http.get(self.status_url.clone()).send().await?;
        let status = response.status();
        let _ = response.bytes().await;
        Ok(status)
    }
}

/// Interpret a response body according to the intake contract.
pub fn classify_response(status: StatusCode, body: &[u8]) -> Result<UploadResult, UploadError> {
    let raw_body = String::from_utf8_lossy(body).into_owned();

    // A bare `null` has no fields to read and counts as unparseable.
    let parsed: Value = match serde_json::from_slice(body) {
        Ok(Value::Null) | Err(_) => {
            return Err(UploadError::NonJsonResponse {
                status,
                body: truncate_chars(&raw_body, RAW_BODY_DIAGNOSTIC_CHARS),
            })
        }
        Ok(value) => value,
    };

    let success = parsed.get("success").map(is_truthy).unwrap_or(false);
    let message = parsed.get("message").and_then(|m| match m {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    });

    Ok(UploadResult {
        success,
        message,
        raw_body,
    })
}

/// JavaScript-style truthiness, which is what the intake server's `success` has always meant.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// First `max` characters of `s`, never splitting a character.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
