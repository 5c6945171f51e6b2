//! `multipart/form-data` body construction.
//!
//! Bodies are assembled into a single fixed-length buffer so the exact `Content-Length` is known
//! before the request is sent. Text parts are written through their CRLF-terminated grammar; the
//! file part's header is written on its own and the payload bytes are appended verbatim after it,
//! so binary content never passes through any text conversion.
//!
//! ```text
//! --<boundary>\r\n
//! Content-Disposition: form-data; name="codigoLIS"\r\n
//! \r\n
//! 1005\r\n
//! --<boundary>\r\n
//! Content-Disposition: form-data; name="archivo"; filename="1005_chest.dcm"\r\n
//! Content-Type: application/dicom\r\n
//! \r\n
//! <raw bytes>\r\n
//! --<boundary>--\r\n
//! ```

use crate::constants::{
    BOUNDARY_PREFIX, FIELD_CORRELATION_ID, FIELD_FILE, FIELD_MEDIA_KIND, FIELD_STATION_NAME,
};
use crate::metadata::{CorrelationId, MediaKind};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

const CRLF: &str = "\r\n";

static BOUNDARY_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a boundary token unique within this process.
///
/// The token is the fixed prefix, the current UTC time in nanoseconds and a process-local
/// sequence number. It is not cryptographically random.
pub fn new_boundary() -> String {
    let nanos = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros() * 1_000);
    let sequence = BOUNDARY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{BOUNDARY_PREFIX}{nanos}{sequence}")
}

/// Everything sent in one upload attempt.
#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub correlation_id: Option<CorrelationId>,
    pub station_name: String,
    pub media_kind: MediaKind,
    pub filename: String,
    pub mime_type: String,
    pub contents: Vec<u8>,
}

/// A fully serialised multipart body.
#[derive(Clone, Debug)]
pub struct EncodedBody {
    boundary: String,
    bytes: Vec<u8>,
}

impl EncodedBody {
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Exact serialised size in bytes, for the `Content-Length` header.
    pub fn content_length(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Incremental builder for a multipart body.
#[derive(Debug)]
pub struct MultipartEncoder {
    boundary: String,
    buffer: Vec<u8>,
}

impl Default for MultipartEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartEncoder {
    /// Start a body with a freshly generated boundary.
    pub fn new() -> Self {
        Self::with_boundary(new_boundary())
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            buffer: Vec::new(),
        }
    }

    /// Append a text field.
    pub fn text_part(&mut self, name: &str, value: &str) -> &mut Self {
        let part = format!(
            "--{boundary}{CRLF}Content-Disposition: form-data; name=\"{name}\"{CRLF}{CRLF}{value}{CRLF}",
            boundary = self.boundary,
            name = escape_quoted(name),
        );
        self.buffer.extend_from_slice(part.as_bytes());
        self
    }

    /// Append a file field. `contents` is copied byte for byte.
    pub fn file_part(
        &mut self,
        name: &str,
        filename: &str,
        content_type: &str,
        contents: &[u8],
    ) -> &mut Self {
        let header = format!(
            "--{boundary}{CRLF}Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"{CRLF}Content-Type: {content_type}{CRLF}{CRLF}",
            boundary = self.boundary,
            name = escape_quoted(name),
            filename = escape_quoted(filename),
        );
        self.buffer.extend_from_slice(header.as_bytes());
        self.buffer.extend_from_slice(contents);
        self.buffer.extend_from_slice(CRLF.as_bytes());
        self
    }

    /// Write the closing delimiter and return the finished body.
    pub fn finish(mut self) -> EncodedBody {
        let closing = format!("--{}--{CRLF}", self.boundary);
        self.buffer.extend_from_slice(closing.as_bytes());
        EncodedBody {
            boundary: self.boundary,
            bytes: self.buffer,
        }
    }
}

/// Quoted-string values cannot carry raw quotes or line breaks.
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Serialise an upload request with a fresh boundary.
///
/// Parts are emitted in the order the intake endpoint expects: `codigoLIS` (only when a
/// correlation id is present), `station_name`, `tipo`, then `archivo`.
pub fn encode_upload(request: &UploadRequest) -> EncodedBody {
    encode_upload_with(MultipartEncoder::new(), request)
}

pub fn encode_upload_with(mut encoder: MultipartEncoder, request: &UploadRequest) -> EncodedBody {
    if let Some(id) = &request.correlation_id {
        encoder.text_part(FIELD_CORRELATION_ID, id.as_str());
    }
    encoder
        .text_part(FIELD_STATION_NAME, &request.station_name)
        .text_part(FIELD_MEDIA_KIND, request.media_kind.tag())
        .file_part(
            FIELD_FILE,
            &request.filename,
            &request.mime_type,
            &request.contents,
        );
    encoder.finish()
}
