//! # Rayos X Agent Core
//!
//! Core logic of the imaging station agent.
//!
//! The agent watches a local folder where X-ray/DICOM equipment drops its output, uploads each
//! new file to the diagnostic centre's intake endpoint as `multipart/form-data`, and moves
//! accepted files into a processed folder:
//!
//! ```text
//! Scanner --(per file, concurrently)--> debounce -> metadata -> encode -> upload -> archive
//! ```
//!
//! **No process concerns**: command-line parsing, logging setup and the runtime live in the
//! `rayosx-agent` and `rayosx-cli` binaries.

pub mod archive;
pub mod config;
pub mod constants;
pub mod diagnostics;
mod error;
pub mod metadata;
pub mod multipart;
pub mod pipeline;
pub mod scanner;
pub mod stability;
pub mod station;
#[cfg(test)]
mod test_logs;
pub mod tracker;
pub mod upload;

pub use config::AgentConfig;
pub use diagnostics::{run_connectivity_check, DiagnosticReport};
pub use error::{AgentError, AgentResult};
pub use metadata::{extract_correlation_id, CorrelationId, MediaKind, WatchedFile};
pub use pipeline::{PipelineContext, PipelineOutcome};
pub use scanner::{ScanReport, Scanner};
pub use tracker::{FileTracker, PipelineState, TrackerCounts};
pub use upload::{UploadClient, UploadError, UploadResult};
