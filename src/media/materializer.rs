//! Moves matched captures from temp storage to their permanent location.
//!
//! The permanent name is `{library_id}.{ext}`, with the extension derived
//! from the payload header by the sniffer. Files are moved (renamed), not
//! copied: captures are large, and a matched capture should leave temp
//! storage as soon as the decision is made.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::sniffer::{self, ContainerKind};

/// Errors that can occur while materializing a capture.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("target {0} already exists with different content")]
    TargetConflict(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Materializer bound to one output directory.
#[derive(Debug, Clone)]
pub struct MediaMaterializer {
    out_dir: PathBuf,
}

impl MediaMaterializer {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Move a matched temp file to `{library_id}.{ext}` in the output dir.
    ///
    /// If the target already exists with identical content the temp file is
    /// simply dropped and the existing path returned. A target with
    /// different content is a conflict: Library IDs are unique, so this
    /// only happens when an earlier session left files behind.
    pub async fn materialize(
        &self,
        library_id: &str,
        temp_path: &Path,
    ) -> Result<(PathBuf, ContainerKind), MaterializeError> {
        let kind = sniff_file(temp_path).await?;
        let target = self
            .out_dir
            .join(format!("{}.{}", library_id, kind.extension()));

        if fs::try_exists(&target).await? {
            if file_digest(temp_path).await? == file_digest(&target).await? {
                debug!(library_id, target = %target.display(), "Target already materialized");
                fs::remove_file(temp_path).await?;
                return Ok((target, kind));
            }
            return Err(MaterializeError::TargetConflict(target));
        }

        fs::create_dir_all(&self.out_dir).await?;
        fs::rename(temp_path, &target).await?;
        debug!(library_id, target = %target.display(), "Materialized capture");

        Ok((target, kind))
    }
}

/// Sniff the container format from the leading bytes of a file.
async fn sniff_file(path: &Path) -> Result<ContainerKind, std::io::Error> {
    let mut file = fs::File::open(path).await?;
    let mut header = [0u8; 16];
    let mut filled = 0;

    // A payload shorter than 16 bytes still sniffs (and defaults to MP4)
    while filled < header.len() {
        let n = file.read(&mut header[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    Ok(sniffer::detect(&header[..filled]))
}

/// Full-content sha256, used only for conflict detection.
async fn file_digest(path: &Path) -> Result<[u8; 32], std::io::Error> {
    let content = fs::read(path).await?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MP4_HEADER: &[u8] = b"\x00\x00\x00\x20ftypmp42\x00\x00\x00\x00moov";

    #[tokio::test]
    async fn test_materialize_moves_file() {
        let temp = TempDir::new().unwrap();
        let staged = temp.path().join("cap_abc.bin");
        fs::write(&staged, MP4_HEADER).await.unwrap();

        let materializer = MediaMaterializer::new(temp.path().join("out"));
        let (path, kind) = materializer.materialize("1234567890", &staged).await.unwrap();

        assert_eq!(kind, ContainerKind::Mp4);
        assert!(path.ends_with("1234567890.mp4"));
        assert!(fs::try_exists(&path).await.unwrap());
        assert!(!fs::try_exists(&staged).await.unwrap());
    }

    #[tokio::test]
    async fn test_identical_target_is_not_a_conflict() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        fs::create_dir_all(&out).await.unwrap();
        fs::write(out.join("42.mp4"), MP4_HEADER).await.unwrap();

        let staged = temp.path().join("cap.bin");
        fs::write(&staged, MP4_HEADER).await.unwrap();

        let materializer = MediaMaterializer::new(out);
        let (path, _) = materializer.materialize("42", &staged).await.unwrap();

        assert!(path.ends_with("42.mp4"));
        assert!(!fs::try_exists(&staged).await.unwrap());
    }

    #[tokio::test]
    async fn test_conflicting_target_fails() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        fs::create_dir_all(&out).await.unwrap();
        fs::write(out.join("42.mp4"), b"\x00\x00\x00\x20ftypmp42 other bytes")
            .await
            .unwrap();

        let staged = temp.path().join("cap.bin");
        fs::write(&staged, MP4_HEADER).await.unwrap();

        let materializer = MediaMaterializer::new(out);
        let err = materializer.materialize("42", &staged).await.unwrap_err();

        assert!(matches!(err, MaterializeError::TargetConflict(_)));
        // The capture stays staged so cleanup can remove it
        assert!(fs::try_exists(&staged).await.unwrap());
    }
}
