use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

const SPOOL_PREFIX: &str = "upload-";

/// An upload spooled to a temporary file before any record exists for it.
///
/// Bytes are appended chunk by chunk as they arrive, so memory use does not
/// grow with the upload size. The spool file is removed when the value is
/// dropped; an upload that is rejected or fails halfway leaves nothing behind.
#[derive(Debug)]
pub struct StagedUpload {
    file: File,
    path: TempPath,
    size: u64,
}

impl StagedUpload {
    /// Creates an empty spool file inside `dir`.
    pub async fn create_in(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        let spool = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(SPOOL_PREFIX)
                .tempfile_in(dir)
        })
        .await
        .map_err(io::Error::other)??;

        let (file, path) = spool.into_parts();
        Ok(Self {
            file: File::from_std(file),
            path,
            size: 0,
        })
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await?;
        self.size += chunk.len() as u64;
        Ok(())
    }

    /// Flushes everything written so far to disk.
    pub async fn finish(&mut self) -> io::Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far.
    pub fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spool_counts_bytes_and_removes_itself() {
        let dir = tempfile::tempdir().unwrap();

        let mut staged = StagedUpload::create_in(dir.path()).await.unwrap();
        staged.write_chunk(b"hello ").await.unwrap();
        staged.write_chunk(b"world").await.unwrap();
        staged.finish().await.unwrap();

        let path = staged.path().to_path_buf();
        assert_eq!(staged.size(), 11);
        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");

        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn spool_files_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();

        let first = StagedUpload::create_in(dir.path()).await.unwrap();
        let second = StagedUpload::create_in(dir.path()).await.unwrap();

        assert_ne!(first.path(), second.path());
    }
}
