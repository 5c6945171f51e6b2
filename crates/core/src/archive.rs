//! Relocation of uploaded files into the processed folder.

use crate::{AgentError, AgentResult};
use std::path::{Path, PathBuf};

/// Directory that `source` is archived into: `<parent>/<processed_dir_name>`.
pub fn processed_dir_for(source: &Path, processed_dir_name: &str) -> PathBuf {
    source
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(processed_dir_name)
}

/// Move `source` into the processed folder beside it, keeping its filename.
///
/// The processed folder is created recursively when absent. An existing file at the destination
/// is never overwritten; the call fails with [`AgentError::ArchiveCollision`] and the source is
/// left where it is. Calling this again after a successful move is a no-op that returns the
/// same destination.
///
/// # Returns
///
/// The destination path on success.
///
/// # Errors
///
/// - [`AgentError::MissingFileName`] if `source` has no file name component
/// - [`AgentError::ProcessedDirCreation`] if the processed folder cannot be created
/// - [`AgentError::ArchiveCollision`] if the destination is taken
/// - [`AgentError::ArchiveRename`] if the rename itself fails
pub async fn archive_file(source: &Path, processed_dir_name: &str) -> AgentResult<PathBuf> {
    let filename = source
        .file_name()
        .ok_or_else(|| AgentError::MissingFileName(source.to_path_buf()))?;
    let processed_dir = processed_dir_for(source, processed_dir_name);
    let destination = processed_dir.join(filename);

    let source_exists = tokio::fs::try_exists(source)
        .await
        .map_err(AgentError::ArchiveRename)?;
    let destination_exists = tokio::fs::try_exists(&destination)
        .await
        .map_err(AgentError::ArchiveRename)?;

    if !source_exists && destination_exists {
        return Ok(destination);
    }
    if destination_exists {
        return Err(AgentError::ArchiveCollision(destination));
    }

    tokio::fs::create_dir_all(&processed_dir)
        .await
        .map_err(AgentError::ProcessedDirCreation)?;

    tokio::fs::rename(source, &destination)
        .await
        .map_err(AgentError::ArchiveRename)?;

    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_archive_creates_processed_dir_and_moves() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("1005_chest.dcm");
        fs::write(&source, b"DICM").unwrap();

        let destination = archive_file(&source, "procesados").await.unwrap();

        assert_eq!(destination, temp.path().join("procesados").join("1005_chest.dcm"));
        assert!(!source.exists());
        assert_eq!(fs::read(&destination).unwrap(), b"DICM");
    }

    #[tokio::test]
    async fn test_archive_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("scan.png");
        fs::write(&source, b"png").unwrap();

        let first = archive_file(&source, "procesados").await.unwrap();
        let second = archive_file(&source, "procesados").await.unwrap();

        assert_eq!(first, second);
        assert!(second.exists());
    }

    #[tokio::test]
    async fn test_archive_collision_leaves_source_in_place() {
        let temp = TempDir::new().unwrap();
        let processed = temp.path().join("procesados");
        fs::create_dir_all(&processed).unwrap();
        fs::write(processed.join("scan.png"), b"old").unwrap();

        let source = temp.path().join("scan.png");
        fs::write(&source, b"new").unwrap();

        let result = archive_file(&source, "procesados").await;

        assert!(matches!(result, Err(AgentError::ArchiveCollision(_))));
        assert_eq!(fs::read(&source).unwrap(), b"new");
        assert_eq!(fs::read(processed.join("scan.png")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_archive_missing_source_is_rename_error() {
        let temp = TempDir::new().unwrap();
        let result = archive_file(&temp.path().join("gone.dcm"), "procesados").await;
        assert!(matches!(result, Err(AgentError::ArchiveRename(_))));
    }

    #[test]
    fn test_processed_dir_for() {
        assert_eq!(
            processed_dir_for(Path::new("/data/rx/1005.dcm"), "procesados"),
            PathBuf::from("/data/rx/procesados")
        );
    }
}
