//! Connectivity check run from the agent's diagnostic mode and the operator CLI.

use crate::config::AgentConfig;
use crate::scanner::matching_files;
use crate::upload::UploadClient;
use std::path::PathBuf;

/// Everything the diagnostic mode reports.
#[derive(Clone, Debug)]
pub struct DiagnosticReport {
    pub server_url: String,
    pub watch_dir: PathBuf,
    pub extensions: Vec<String>,
    /// `None` when the watched directory does not exist (or cannot be read).
    pub matching_files: Option<usize>,
    /// HTTP status of the status endpoint, or the network error message.
    pub reachability: Result<u16, String>,
}

impl DiagnosticReport {
    pub fn is_reachable(&self) -> bool {
        self.reachability.is_ok()
    }

    /// Process exit code for this report: 0 when reachable, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_reachable() {
            0
        } else {
            1
        }
    }
}

/// Probe the status endpoint and count the files currently waiting in the watched directory.
pub async fn run_connectivity_check(config: &AgentConfig, client: &UploadClient) -> DiagnosticReport {
    let reachability = client
        .check_status()
        .await
        .map(|status| status.as_u16())
        .map_err(|e| e.to_string());

    let watch_dir = config.watch_dir().to_path_buf();
    let matching = if watch_dir.is_dir() {
        matching_files(&watch_dir, config).ok().map(|files| files.len())
    } else {
        None
    };

    DiagnosticReport {
        server_url: config.server_url().as_str().trim_end_matches('/').to_string(),
        watch_dir,
        extensions: config.extensions().to_vec(),
        matching_files: matching,
        reachability,
    }
}
