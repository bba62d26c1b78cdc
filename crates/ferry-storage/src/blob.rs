use ferry_core::{Code, ContentKind, StagedUpload};
use jiff::Timestamp;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tracing::debug;

const FALLBACK_FILE_NAME: &str = "file";
const MAX_FILE_NAME_LEN: usize = 200;
// Spool files for in-flight uploads. Subdirectories are never listed as blobs.
const STAGING_DIR: &str = ".incoming";

/// A blob found on disk by [`BlobStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub code: Code,
    /// Sanitized name following the `{code}_` prefix.
    pub file_name: String,
    pub modified: Timestamp,
}

/// The directory holding file payloads, one blob per file record.
///
/// A blob is named `{code}_{file_name}` where `file_name` is the sanitized
/// upload name, so the owning record can be recovered from the path alone.
/// Uploads are spooled under `.incoming/` and hard-linked into place once a
/// code is minted, which never overwrites an existing blob.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Opens the blob directory, creating it if missing.
    pub async fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(STAGING_DIR)).await?;
        debug!(root = %root.display(), "opened blob directory");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    fn path(&self, code: &Code, file_name: &str) -> PathBuf {
        self.root.join(format!("{code}_{file_name}"))
    }

    /// Opens a spool file for an upload whose code is not minted yet.
    pub async fn stage(&self) -> io::Result<StagedUpload> {
        StagedUpload::create_in(self.staging_dir()).await
    }

    /// Links a finished upload into place under `code` and returns the
    /// sanitized name it was stored under.
    ///
    /// Fails with [`io::ErrorKind::AlreadyExists`] rather than overwrite a blob
    /// that belongs to another record. The spool file is left untouched, so a
    /// failed promotion can be retried under another code.
    pub async fn promote(
        &self,
        staged: &StagedUpload,
        code: &Code,
        original_name: &str,
    ) -> io::Result<String> {
        let file_name = sanitize_file_name(original_name);
        fs::hard_link(staged.path(), self.path(code, &file_name)).await?;
        Ok(file_name)
    }

    /// Writes a small blob in one go through the same spool-and-promote path
    /// as streamed uploads.
    pub async fn store(&self, code: &Code, original_name: &str, bytes: &[u8]) -> io::Result<String> {
        let mut staged = self.stage().await?;
        staged.write_chunk(bytes).await?;
        staged.finish().await?;
        self.promote(&staged, code, original_name).await
    }

    /// Removes spool files last written before `cutoff`, left behind by a
    /// process that died mid-upload. Returns how many were removed.
    pub async fn purge_staging(&self, cutoff: Timestamp) -> io::Result<usize> {
        let mut removed = 0;
        let mut dir = fs::read_dir(self.staging_dir()).await?;

        while let Some(entry) = dir.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            };
            let modified = Timestamp::try_from(metadata.modified()?)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            if modified >= cutoff {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => {
                    debug!(path = %entry.path().display(), "removed stale spool file");
                    removed += 1;
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
        }

        Ok(removed)
    }

    /// Opens a blob for reading. Returns `None` if it is missing.
    pub async fn open_blob(&self, code: &Code, file_name: &str) -> io::Result<Option<(File, u64)>> {
        let file = match File::open(self.path(code, file_name)).await {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        let size = file.metadata().await?.len();
        Ok(Some((file, size)))
    }

    pub async fn exists(&self, code: &Code, file_name: &str) -> io::Result<bool> {
        fs::try_exists(self.path(code, file_name)).await
    }

    /// Removes a blob. Returns `false` if it was already gone.
    pub async fn remove(&self, code: &Code, file_name: &str) -> io::Result<bool> {
        match fs::remove_file(self.path(code, file_name)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Enumerates the blobs in the directory.
    ///
    /// Entries whose name does not start with a valid file code are skipped.
    pub async fn list(&self) -> io::Result<Vec<BlobEntry>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;

        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                debug!(name = ?name, "skipping non utf-8 entry in blob directory");
                continue;
            };
            let Some((code, file_name)) = name.split_once('_') else {
                debug!(name, "skipping unrecognized entry in blob directory");
                continue;
            };
            let Ok(code) = Code::parse(ContentKind::File, code) else {
                debug!(name, "skipping unrecognized entry in blob directory");
                continue;
            };

            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                // removed between read_dir and stat
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            };
            let modified = Timestamp::try_from(metadata.modified()?)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

            entries.push(BlobEntry {
                code,
                file_name: file_name.to_string(),
                modified,
            });
        }

        Ok(entries)
    }
}

/// Reduces an uploaded file name to a safe, portable component.
///
/// Path separators become word breaks, whitespace runs collapse to `_`,
/// everything outside `[A-Za-z0-9_.-]` is dropped and leading or trailing
/// dots and underscores are trimmed, which also defeats `..` traversal.
/// Falls back to `"file"` when nothing survives.
///
/// ```
/// use ferry_storage::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("../../etc/passwd"), "etc_passwd");
/// assert_eq!(sanitize_file_name("My cool movie.mov"), "My_cool_movie.mov");
/// assert_eq!(sanitize_file_name("..."), "file");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    let spaced = name.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let mut trimmed = kept.trim_matches(['.', '_']).to_string();
    // ASCII only at this point, so byte truncation is on a char boundary.
    trimmed.truncate(MAX_FILE_NAME_LEN);

    if trimmed.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn code(s: &str) -> Code {
        Code::new_unchecked(s)
    }

    #[test]
    fn sanitize_strips_traversal_and_separators() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_file_name("..\\windows\\system32"), "windows_system32");
        assert_eq!(sanitize_file_name("/abs/path.txt"), "abs_path.txt");
    }

    #[test]
    fn sanitize_keeps_portable_characters() {
        assert_eq!(sanitize_file_name("report-2024_v2.pdf"), "report-2024_v2.pdf");
        assert_eq!(sanitize_file_name("  spaced   out  .txt"), "spaced_out_.txt");
        assert_eq!(sanitize_file_name("weird<>:|?*\"name.zip"), "weirdname.zip");
    }

    #[test]
    fn sanitize_falls_back_when_empty() {
        assert_eq!(sanitize_file_name(""), "file");
        assert_eq!(sanitize_file_name("..."), "file");
        assert_eq!(sanitize_file_name("日本語"), "file");
    }

    #[test]
    fn sanitize_bounds_length() {
        let long = "a".repeat(1000);
        assert_eq!(sanitize_file_name(&long).len(), MAX_FILE_NAME_LEN);
    }

    #[tokio::test]
    async fn store_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::open(dir.path()).await.unwrap();

        let file_name = blobs
            .store(&code("123456"), "my notes.txt", b"hello")
            .await
            .unwrap();
        assert_eq!(file_name, "my_notes.txt");
        assert!(dir.path().join("123456_my_notes.txt").exists());

        let (mut file, size) = blobs
            .open_blob(&code("123456"), &file_name)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(size, 5);
        let mut contents = String::new();
        file.read_to_string(&mut contents).await.unwrap();
        assert_eq!(contents, "hello");
    }

    #[tokio::test]
    async fn store_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::open(dir.path()).await.unwrap();

        blobs.store(&code("123456"), "a.txt", b"first").await.unwrap();
        let err = blobs
            .store(&code("123456"), "a.txt", b"second")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        let on_disk = std::fs::read(dir.path().join("123456_a.txt")).unwrap();
        assert_eq!(on_disk, b"first");
    }

    #[tokio::test]
    async fn promote_keeps_spool_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::open(dir.path()).await.unwrap();
        blobs.store(&code("123456"), "a.txt", b"first").await.unwrap();

        let mut staged = blobs.stage().await.unwrap();
        staged.write_chunk(b"sec").await.unwrap();
        staged.write_chunk(b"ond").await.unwrap();
        staged.finish().await.unwrap();

        let err = blobs
            .promote(&staged, &code("123456"), "a.txt")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        let file_name = blobs
            .promote(&staged, &code("654321"), "a.txt")
            .await
            .unwrap();
        let spool = staged.path().to_path_buf();
        drop(staged);

        assert!(!spool.exists());
        assert_eq!(
            std::fs::read(dir.path().join(format!("654321_{file_name}"))).unwrap(),
            b"second"
        );
        assert_eq!(std::fs::read(dir.path().join("123456_a.txt")).unwrap(), b"first");
    }

    #[tokio::test]
    async fn abandoned_upload_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::open(dir.path()).await.unwrap();

        let mut staged = blobs.stage().await.unwrap();
        staged.write_chunk(b"half an upl").await.unwrap();
        drop(staged);

        let spooled = std::fs::read_dir(dir.path().join(STAGING_DIR)).unwrap().count();
        assert_eq!(spooled, 0);
        assert!(blobs.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn purge_staging_respects_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join(STAGING_DIR).join("upload-crashed"), b"x").unwrap();

        let an_hour = jiff::SignedDuration::from_hours(1);
        assert_eq!(blobs.purge_staging(Timestamp::now() - an_hour).await.unwrap(), 0);
        assert_eq!(blobs.purge_staging(Timestamp::now() + an_hour).await.unwrap(), 1);
        assert_eq!(
            std::fs::read_dir(dir.path().join(STAGING_DIR)).unwrap().count(),
            0
        );
    }

    #[tokio::test]
    async fn open_missing_blob() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::open(dir.path()).await.unwrap();

        assert!(blobs.open_blob(&code("123456"), "a.txt").await.unwrap().is_none());
        assert!(!blobs.exists(&code("123456"), "a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn remove_twice_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::open(dir.path()).await.unwrap();
        blobs.store(&code("123456"), "a.txt", b"x").await.unwrap();

        assert!(blobs.remove(&code("123456"), "a.txt").await.unwrap());
        assert!(!blobs.remove(&code("123456"), "a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn open_handle_survives_removal() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::open(dir.path()).await.unwrap();
        blobs.store(&code("123456"), "a.txt", b"still here").await.unwrap();

        let (mut file, _) = blobs.open_blob(&code("123456"), "a.txt").await.unwrap().unwrap();
        blobs.remove(&code("123456"), "a.txt").await.unwrap();

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.unwrap();
        assert_eq!(contents, "still here");
    }

    #[tokio::test]
    async fn list_parses_owner_codes() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::open(dir.path().join("uploads")).await.unwrap();
        blobs.store(&code("123456"), "a_b.txt", b"x").await.unwrap();
        blobs.store(&code("654321"), "c.txt", b"y").await.unwrap();
        std::fs::write(blobs.root().join("stray.txt"), b"z").unwrap();
        std::fs::write(blobs.root().join("012345_bad.txt"), b"z").unwrap();
        std::fs::create_dir(blobs.root().join("111111_dir")).unwrap();

        let mut entries = blobs.list().await.unwrap();
        entries.sort_by(|a, b| a.code.as_str().cmp(b.code.as_str()));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].code, code("123456"));
        assert_eq!(entries[0].file_name, "a_b.txt");
        assert_eq!(entries[1].code, code("654321"));
        assert_eq!(entries[1].file_name, "c.txt");
    }
}
