use clap::{Parser, Subcommand};
use rayosx_core::pipeline::upload_and_archive;
use rayosx_core::scanner::matching_files;
use rayosx_core::station::resolve_station_name;
use rayosx_core::{
    run_connectivity_check, AgentConfig, PipelineContext, PipelineState, UploadClient, WatchedFile,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rayosx")]
#[command(about = "Operator tools for the Rayos X imaging agent")]
struct Cli {
    /// Path to the agent's config.json
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check connectivity with the intake server
    Check,
    /// List files the agent would upload right now
    Pending,
    /// Upload a single file immediately and archive it on success
    Send {
        /// File to upload
        file: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .without_time()
        .init();

    let Some(command) = cli.command else {
        println!("Use 'rayosx --help' for commands");
        return Ok(());
    };

    let config = AgentConfig::load(&cli.config)?;

    match command {
        Commands::Check => {
            let client = UploadClient::new(&config)?;
            let report = run_connectivity_check(&config, &client).await;
            println!("Server: {}", report.server_url);
            println!("Folder: {}", report.watch_dir.display());
            println!("Extensions: {}", report.extensions.join(", "));
            match report.matching_files {
                Some(count) => println!("Files found: {}", count),
                None => println!("Folder does not exist yet"),
            }
            match &report.reachability {
                Ok(status) => println!("Server responded (HTTP {})", status),
                Err(e) => eprintln!("Could not connect to the server: {}", e),
            }
            std::process::exit(report.exit_code());
        }
        Commands::Pending => {
            if !config.watch_dir().is_dir() {
                println!("Folder {} does not exist yet.", config.watch_dir().display());
                return Ok(());
            }
            let files = matching_files(config.watch_dir(), &config)?;
            if files.is_empty() {
                println!("No files waiting.");
            }
            for path in files {
                match WatchedFile::discover(path) {
                    Ok(file) => println!(
                        "{}  {} bytes  tipo={}  LIS={}",
                        file.filename,
                        file.size_at_discovery,
                        file.media_kind().tag(),
                        file.correlation_id()
                            .map(|id| id.to_string())
                            .unwrap_or_else(|| "-".into()),
                    ),
                    Err(e) => eprintln!("Error reading file: {}", e),
                }
            }
        }
        Commands::Send { file } => {
            let extension = rayosx_core::metadata::extension_of(&file);
            if !config.is_allowed_extension(&extension) {
                anyhow::bail!(
                    "extension '{}' is not in the configured list ({})",
                    extension,
                    config.extensions().join(", ")
                );
            }

            let watched = WatchedFile::discover(file)?;
            let client = UploadClient::new(&config)?;
            let station_name = resolve_station_name(config.station_name());
            let ctx = PipelineContext::new(&config, client, station_name);

            match upload_and_archive(&ctx, &watched).await {
                PipelineState::Archived => println!("Uploaded and archived {}", watched.filename),
                PipelineState::Uploaded => {
                    println!("Uploaded {} but it could not be archived", watched.filename)
                }
                other => {
                    eprintln!("{} was not uploaded ({})", watched.filename, other);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
