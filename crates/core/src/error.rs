use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to read configuration file {path}: {source}", path = path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path}: {source}", path = path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid server url: {0}")]
    InvalidServerUrl(String),
    #[error("failed to create watched directory: {0}")]
    WatchDirCreation(std::io::Error),
    #[error("failed to read watched directory: {0}")]
    WatchDirRead(std::io::Error),
    #[error("failed to read file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to create processed directory: {0}")]
    ProcessedDirCreation(std::io::Error),
    #[error("archive destination already exists: {}", .0.display())]
    ArchiveCollision(PathBuf),
    #[error("failed to move file to processed directory: {0}")]
    ArchiveRename(std::io::Error),
    #[error("path has no file name: {}", .0.display())]
    MissingFileName(PathBuf),
    #[error("failed to build http client: {0}")]
    HttpClient(reqwest::Error),
}

pub type AgentResult<T> = std::result::Result<T, AgentError>;
