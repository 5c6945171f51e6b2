//! File model and filename-derived metadata.
//!
//! Imaging stations name their output files in a handful of site conventions
//! (`1005_imagen.dcm`, `L1005.jpg`, `paciente_1005.dcm`). The correlation id linking an image to
//! its study is the first run of four or five digits in the name; files that follow no digit
//! convention are uploaded without one.

use crate::constants::DICOM_EXTENSION;
use crate::{AgentError, AgentResult};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};

static CORRELATION_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]{4,5}").expect("static correlation id pattern is valid"));

/// Patient/study code extracted from a filename.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the leftmost match of four to five consecutive ASCII digits in `filename`.
///
/// A longer run still matches at its start, so `scan_123456.png` yields `12345`.
pub fn extract_correlation_id(filename: &str) -> Option<CorrelationId> {
    CORRELATION_ID_PATTERN
        .find(filename)
        .map(|m| CorrelationId(m.as_str().to_string()))
}

/// Kind of media being uploaded, derived from the file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Dicom,
    Image,
}

impl MediaKind {
    /// Classify a lowercase extension with its leading dot.
    pub fn from_extension(extension: &str) -> Self {
        if extension.eq_ignore_ascii_case(DICOM_EXTENSION) {
            MediaKind::Dicom
        } else {
            MediaKind::Image
        }
    }

    /// Tag sent in the `tipo` field.
    pub fn tag(self) -> &'static str {
        match self {
            MediaKind::Dicom => "dicom",
            MediaKind::Image => "imagen",
        }
    }

    /// MIME type declared on the file part.
    pub fn mime_type(self, extension: &str) -> String {
        match self {
            MediaKind::Dicom => "application/dicom".to_string(),
            MediaKind::Image => format!(
                "image/{}",
                extension.trim_start_matches('.').to_ascii_lowercase()
            ),
        }
    }
}

/// Lowercase extension of `path` including the leading dot, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// A file observed in the watched directory.
#[derive(Clone, Debug)]
pub struct WatchedFile {
    pub path: PathBuf,
    pub filename: String,
    /// Lowercase, with leading dot.
    pub extension: String,
    pub size_at_discovery: u64,
    pub discovered_at: DateTime<Utc>,
}

impl WatchedFile {
    /// Build the record for a file the scanner has just observed.
    pub fn new(path: PathBuf, size_at_discovery: u64) -> AgentResult<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AgentError::MissingFileName(path.clone()))?
            .to_string();
        let extension = extension_of(&path);

        Ok(Self {
            path,
            filename,
            extension,
            size_at_discovery,
            discovered_at: Utc::now(),
        })
    }

    /// Stat `path` and build its record.
    pub fn discover(path: PathBuf) -> AgentResult<Self> {
        let metadata = std::fs::metadata(&path).map_err(AgentError::FileRead)?;
        Self::new(path, metadata.len())
    }

    pub fn media_kind(&self) -> MediaKind {
        MediaKind::from_extension(&self.extension)
    }

    pub fn correlation_id(&self) -> Option<CorrelationId> {
        extract_correlation_id(&self.filename)
    }
}
