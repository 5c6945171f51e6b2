//! Per-file pipeline: debounce, metadata, encode, upload, archive.
//!
//! ```text
//! Discovered -> Debouncing -> Gone
//!                          -> Uploading -> Uploaded -> Archived
//!                                       -> Rejected
//!                                       -> Failed
//! ```
//!
//! Every run ends in exactly one terminal [`PipelineState`] and emits exactly one outcome log
//! line. Nothing here retries.

use crate::archive::archive_file;
use crate::config::AgentConfig;
use crate::constants::OK_TARGET;
use crate::metadata::WatchedFile;
use crate::multipart::{encode_upload, UploadRequest};
use crate::stability::wait_until_stable;
use crate::tracker::PipelineState;
use crate::upload::{UploadClient, UploadError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Shared, read-only inputs of every pipeline run.
#[derive(Debug)]
pub struct PipelineContext {
    client: UploadClient,
    station_name: String,
    processed_dir_name: String,
    debounce: Duration,
    limiter: Option<Arc<Semaphore>>,
}

impl PipelineContext {
    pub fn new(config: &AgentConfig, client: UploadClient, station_name: String) -> Self {
        Self {
            client,
            station_name,
            processed_dir_name: config.processed_dir_name().to_string(),
            debounce: config.debounce(),
            limiter: config
                .max_concurrent_uploads()
                .map(|n| Arc::new(Semaphore::new(n))),
        }
    }
}

/// Terminal result of one pipeline run, reported back to the scanner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub filename: String,
    pub state: PipelineState,
}

/// Run the whole pipeline for a freshly dispatched file.
pub async fn run_pipeline(ctx: Arc<PipelineContext>, file: WatchedFile) -> PipelineOutcome {
    let state = process(&ctx, &file).await;
    PipelineOutcome {
        filename: file.filename,
        state,
    }
}

async fn process(ctx: &PipelineContext, file: &WatchedFile) -> PipelineState {
    if !wait_until_stable(&file.path, ctx.debounce).await {
        tracing::debug!("{} disappeared before upload, skipping", file.filename);
        return PipelineState::Gone;
    }

    // Held through upload and archive; released when this function returns.
    let _permit = match &ctx.limiter {
        Some(limiter) => limiter.clone().acquire_owned().await.ok(),
        None => None,
    };

    upload_and_archive(ctx, file).await
}

/// Upload `file` and archive it on success, without the debounce.
pub async fn upload_and_archive(ctx: &PipelineContext, file: &WatchedFile) -> PipelineState {
    let correlation_id = file.correlation_id();
    match &correlation_id {
        Some(id) => tracing::info!("Uploading {} (LIS: {})", file.filename, id),
        None => tracing::info!("Uploading {}", file.filename),
    }

    let contents = match tokio::fs::read(&file.path).await {
        Ok(contents) => contents,
        Err(e) => {
            tracing::error!("Error processing {}: failed to read file: {}", file.filename, e);
            return PipelineState::Failed;
        }
    };

    let media_kind = file.media_kind();
    let request = UploadRequest {
        correlation_id,
        station_name: ctx.station_name.clone(),
        media_kind,
        filename: file.filename.clone(),
        mime_type: media_kind.mime_type(&file.extension),
        contents,
    };
    let body = encode_upload(&request);

    match ctx.client.upload(body).await {
        Ok(result) if result.success => {
            tracing::info!(target: OK_TARGET, "Image uploaded: {}", file.filename);
            match archive_file(&file.path, &ctx.processed_dir_name).await {
                Ok(destination) => {
                    tracing::info!("Moved to: {}", destination.display());
                    PipelineState::Archived
                }
                Err(e) => {
                    tracing::error!("Could not move {}: {}", file.filename, e);
                    PipelineState::Uploaded
                }
            }
        }
        Ok(result) => {
            tracing::warn!(
                "Server rejected {}: {}",
                file.filename,
                result.message.as_deref().unwrap_or("no message")
            );
            PipelineState::Rejected
        }
        Err(UploadError::NonJsonResponse { status, body }) => {
            tracing::error!(
                "Error processing {}: non-JSON response (HTTP {}): {}",
                file.filename,
                status.as_u16(),
                body
            );
            PipelineState::Failed
        }
        Err(UploadError::Transport(e)) => {
            tracing::error!("Error processing {}: could not connect: {}", file.filename, e);
            PipelineState::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfig;
    use crate::test_logs::CapturedLogs;
    use crate::upload::test_server;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;
    use tokio::task::JoinSet;

    fn context(base_url: &str, debounce_ms: u64) -> Arc<PipelineContext> {
        context_with_cap(base_url, debounce_ms, Some(2))
    }

    fn context_with_cap(
        base_url: &str,
        debounce_ms: u64,
        cap: Option<usize>,
    ) -> Arc<PipelineContext> {
        let mut json = serde_json::json!({
            "servidor": { "url": base_url },
            "carpetaMonitoreo": "entrada",
            "esperaEstabilidad": debounce_ms,
        });
        if let Some(cap) = cap {
            json["maxSubidasConcurrentes"] = cap.into();
        }
        let raw: RawConfig = serde_json::from_value(json).unwrap();
        let config = AgentConfig::from_raw(raw, Path::new(".")).unwrap();
        let client = UploadClient::new(&config).unwrap();
        Arc::new(PipelineContext::new(&config, client, "RX-SALA-1".into()))
    }

    fn watched(dir: &Path, name: &str, contents: &[u8]) -> WatchedFile {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        WatchedFile::discover(path).unwrap()
    }

    /// Run one pipeline per file concurrently and wait for all of them.
    async fn run_batch(ctx: Arc<PipelineContext>, dir: &Path, count: usize) -> Vec<PipelineState> {
        let mut tasks = JoinSet::new();
        for i in 0..count {
            let file = watched(dir, &format!("{}_rx.dcm", 1000 + i), b"DICM");
            tasks.spawn(run_pipeline(ctx.clone(), file));
        }
        let mut states = Vec::new();
        while let Some(outcome) = tasks.join_next().await {
            states.push(outcome.unwrap().state);
        }
        states
    }

    #[tokio::test]
    async fn test_accepted_upload_is_archived() {
        let server = test_server::spawn_json(r#"{"success":true}"#).await;
        let temp = TempDir::new().unwrap();
        let file = watched(temp.path(), "1005_chest.dcm", b"DICM\x00\x01");

        let outcome = run_pipeline(context(&server.base_url(), 0), file).await;

        assert_eq!(outcome.filename, "1005_chest.dcm");
        assert_eq!(outcome.state, PipelineState::Archived);
        assert!(!temp.path().join("1005_chest.dcm").exists());
        assert!(temp.path().join("procesados/1005_chest.dcm").exists());

        let upload = &server.uploads()[0];
        assert_eq!(upload.text("codigoLIS").as_deref(), Some("1005"));
        assert_eq!(upload.text("tipo").as_deref(), Some("dicom"));
        assert_eq!(upload.part("archivo").unwrap().data, b"DICM\x00\x01");
    }

    #[tokio::test]
    async fn test_image_without_correlation_id() {
        let server = test_server::spawn_json(r#"{"success":true}"#).await;
        let temp = TempDir::new().unwrap();
        let file = watched(temp.path(), "scan.png", b"\x89PNG");

        let outcome = run_pipeline(context(&server.base_url(), 0), file).await;
        assert_eq!(outcome.state, PipelineState::Archived);

        let upload = &server.uploads()[0];
        assert!(upload.part("codigoLIS").is_none());
        assert_eq!(upload.text("tipo").as_deref(), Some("imagen"));
        assert_eq!(
            upload.part("archivo").unwrap().content_type.as_deref(),
            Some("image/png")
        );
    }

    #[tokio::test]
    async fn test_rejected_upload_stays_in_place() {
        let server =
            test_server::spawn_json(r#"{"success":false,"message":"formato no soportado"}"#).await;
        let temp = TempDir::new().unwrap();
        let file = watched(temp.path(), "1005_chest.dcm", b"DICM");

        let outcome = run_pipeline(context(&server.base_url(), 0), file).await;

        assert_eq!(outcome.state, PipelineState::Rejected);
        assert!(temp.path().join("1005_chest.dcm").exists());
        assert!(!temp.path().join("procesados").exists());
    }

    #[tokio::test]
    async fn test_rejection_is_logged_as_warning_with_server_message() {
        let server =
            test_server::spawn_json(r#"{"success":false,"message":"formato no soportado"}"#).await;
        let temp = TempDir::new().unwrap();
        let file = watched(temp.path(), "1005_chest.dcm", b"DICM");
        let (logs, _guard) = CapturedLogs::install();

        run_pipeline(context(&server.base_url(), 0), file).await;

        let line = logs.line_with("Server rejected 1005_chest.dcm").unwrap();
        assert!(line.contains("WARN"), "{line}");
        assert!(line.contains("formato no soportado"), "{line}");
        assert!(logs.line_with("ERROR").is_none());
    }

    #[tokio::test]
    async fn test_non_json_reply_logs_truncated_body() {
        let page: &'static str = Box::leak("y".repeat(300).into_boxed_str());
        let server = test_server::spawn("text/html", page).await;
        let temp = TempDir::new().unwrap();
        let file = watched(temp.path(), "1005_chest.dcm", b"DICM");
        let (logs, _guard) = CapturedLogs::install();

        run_pipeline(context(&server.base_url(), 0), file).await;

        let line = logs.line_with("non-JSON response").unwrap();
        assert!(line.contains("ERROR"), "{line}");
        assert!(line.contains("HTTP 200"), "{line}");
        assert!(line.contains(&"y".repeat(200)));
        assert!(!line.contains(&"y".repeat(201)));
    }

    #[tokio::test]
    async fn test_concurrency_cap_serialises_uploads() {
        let server = test_server::spawn_with_delay(
            "application/json",
            r#"{"success":true}"#,
            Duration::from_millis(100),
        )
        .await;
        let temp = TempDir::new().unwrap();

        let states = run_batch(
            context_with_cap(&server.base_url(), 0, Some(1)),
            temp.path(),
            4,
        )
        .await;

        assert_eq!(states, vec![PipelineState::Archived; 4]);
        assert_eq!(server.uploads().len(), 4);
        assert_eq!(server.peak_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_uncapped_uploads_overlap() {
        let server = test_server::spawn_with_delay(
            "application/json",
            r#"{"success":true}"#,
            Duration::from_millis(100),
        )
        .await;
        let temp = TempDir::new().unwrap();

        let states = run_batch(context_with_cap(&server.base_url(), 0, None), temp.path(), 4).await;

        assert_eq!(states, vec![PipelineState::Archived; 4]);
        assert!(server.peak_concurrency() > 1);
    }

    #[tokio::test]
    async fn test_non_json_reply_is_failure_and_file_stays() {
        let server = test_server::spawn("text/html", "<html>Bad Gateway</html>").await;
        let temp = TempDir::new().unwrap();
        let file = watched(temp.path(), "1005_chest.dcm", b"DICM");

        let outcome = run_pipeline(context(&server.base_url(), 0), file).await;

        assert_eq!(outcome.state, PipelineState::Failed);
        assert!(temp.path().join("1005_chest.dcm").exists());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_failure() {
        let addr = test_server::closed_addr().await;
        let temp = TempDir::new().unwrap();
        let file = watched(temp.path(), "scan.jpg", b"jpeg");

        let outcome = run_pipeline(context(&format!("http://{addr}"), 0), file).await;

        assert_eq!(outcome.state, PipelineState::Failed);
        assert!(temp.path().join("scan.jpg").exists());
    }

    #[tokio::test]
    async fn test_file_gone_after_debounce() {
        let server = test_server::spawn_json(r#"{"success":true}"#).await;
        let temp = TempDir::new().unwrap();
        let file = watched(temp.path(), "1005_chest.dcm", b"DICM");
        fs::remove_file(&file.path).unwrap();

        let outcome = run_pipeline(context(&server.base_url(), 10), file).await;

        assert_eq!(outcome.state, PipelineState::Gone);
        assert!(server.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_archive_collision_reports_uploaded() {
        let server = test_server::spawn_json(r#"{"success":true}"#).await;
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("procesados")).unwrap();
        fs::write(temp.path().join("procesados/scan.png"), b"earlier").unwrap();
        let file = watched(temp.path(), "scan.png", b"later");

        let outcome = run_pipeline(context(&server.base_url(), 0), file).await;

        assert_eq!(outcome.state, PipelineState::Uploaded);
        assert_eq!(fs::read(temp.path().join("scan.png")).unwrap(), b"later");
    }
}
