mod logging;

use anyhow::Context;
use clap::Parser;
use rayosx_core::constants::{DEFAULT_CONFIG_FILE_NAME, OK_TARGET};
use rayosx_core::station::resolve_station_name;
use rayosx_core::{run_connectivity_check, AgentConfig, PipelineContext, Scanner, UploadClient};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "rayosx-agent")]
#[command(about = "Uploads images dropped by X-ray/DICOM equipment to the intake server")]
struct Args {
    /// Path to config.json (defaults to the file next to the executable)
    #[arg(long, env = "RAYOSX_CONFIG")]
    config: Option<PathBuf>,
    /// Check connectivity with the server, report the watched folder and exit
    #[arg(long)]
    test: bool,
}

/// Main entry point for the imaging station agent
///
/// Loads `config.json`, installs console and file logging, then either runs the connectivity
/// check (`--test`) or polls the watched folder until Ctrl+C.
///
/// Everything runs on a single-threaded runtime: the poll timer, directory scans and all
/// in-flight uploads are multiplexed on one thread.
///
/// # Environment Variables
/// - `RAYOSX_CONFIG`: configuration file path (also read from `.env`)
/// - `RUST_LOG`: log filter (default: "info")
///
/// # Exit status
/// - `0` on Ctrl+C, or in `--test` mode when the server answered
/// - `1` if the configuration cannot be loaded, the server is unreachable in `--test` mode, or
///   the agent fails while running
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(default_config_path);
    let config = AgentConfig::load(&config_path).with_context(|| {
        format!(
            "could not load {}; place config.json next to the executable",
            config_path.display()
        )
    })?;

    logging::init(config.log_file());
    print_banner();

    if args.test {
        let code = match run_test_mode(&config).await {
            Ok(code) => code,
            Err(e) => {
                tracing::error!("Fatal error: {:#}", e);
                1
            }
        };
        std::process::exit(code);
    }

    if let Err(e) = run_agent(config).await {
        tracing::error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_CONFIG_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE_NAME))
}

fn print_banner() {
    println!();
    println!("  Rayos X Agent - Diagnostic Centre");
    println!("  DICOM/CR image monitor");
    println!();
}

async fn run_agent(config: AgentConfig) -> anyhow::Result<()> {
    tracing::info!("Server: {}", config.server_url());
    tracing::info!("Watched folder: {}", config.watch_dir().display());
    tracing::info!("Extensions: {}", config.extensions().join(", "));

    let station_name = resolve_station_name(config.station_name());
    tracing::info!("Station: {}", station_name);

    let client = UploadClient::new(&config).context("failed to create upload client")?;
    let ctx = Arc::new(PipelineContext::new(&config, client, station_name));

    tracing::info!(
        target: OK_TARGET,
        "Agent running. Watching {} every {}s",
        config.watch_dir().display(),
        config.poll_interval().as_secs_f64()
    );
    tracing::info!("Press Ctrl+C to stop");

    let mut scanner = Scanner::new(config, ctx);
    scanner.run(shutdown_signal()).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Could not listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Connectivity check; returns the process exit code.
async fn run_test_mode(config: &AgentConfig) -> anyhow::Result<i32> {
    tracing::info!("TEST MODE - checking connection to the server...");
    tracing::info!("   Server: {}", config.server_url());
    tracing::info!("   Folder: {}", config.watch_dir().display());

    let client = UploadClient::new(config).context("failed to create upload client")?;
    let report = run_connectivity_check(config, &client).await;

    match &report.reachability {
        Ok(status) => {
            tracing::info!(target: OK_TARGET, "Server responded (HTTP {})", status);
            tracing::info!("   Configured folder: {}", report.watch_dir.display());
            tracing::info!("   Extensions: {}", report.extensions.join(", "));
            match report.matching_files {
                Some(count) => tracing::info!("   Files found: {}", count),
                None => tracing::warn!(
                    "   The folder does not exist yet. It will be created automatically."
                ),
            }
        }
        Err(e) => {
            tracing::error!("Could not connect to the server: {}", e);
            tracing::info!("   Check the URL in config.json");
        }
    }

    Ok(report.exit_code())
}
