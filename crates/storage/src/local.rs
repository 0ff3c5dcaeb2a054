use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::reader::ChunkReader;
use crate::validation::validate_filename;
use crate::StorageError;

/// Storage rooted at a single flat directory.
///
/// Files are name-addressed blobs directly under the root: no
/// subdirectories, no sidecar metadata. Concurrent appends to the same
/// name are not serialised and may interleave.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    chunk_size: usize,
}

impl LocalStorage {
    /// Opens the storage root, creating the directory if it is absent.
    ///
    /// `chunk_size` is the size of each chunk produced by
    /// [`read_sequential`](Self::read_sequential); 0 selects 1024.
    pub async fn open(root: impl Into<PathBuf>, chunk_size: usize) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        tracing::info!(root = %root.display(), "storage root ready");
        Ok(Self {
            root,
            chunk_size: if chunk_size == 0 { 1024 } else { chunk_size },
        })
    }

    /// Returns the storage root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists the names of all entries directly under the root.
    ///
    /// Order is whatever the directory enumeration produces.
    pub async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    /// Opens `filename` for appending, creating it if absent.
    ///
    /// Safe to call repeatedly for the same name: every handle appends
    /// at the current end of file.
    pub async fn open_append(&self, filename: &str) -> Result<AppendHandle, StorageError> {
        validate_filename(filename)?;
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(filename))
            .await?;
        Ok(AppendHandle {
            file,
            filename: filename.to_owned(),
            written: 0,
        })
    }

    /// Opens `filename` for chunked sequential reading from offset 0.
    ///
    /// Fails with [`StorageError::NotFound`] if the file does not exist now.
    pub async fn read_sequential(&self, filename: &str) -> Result<ChunkReader, StorageError> {
        validate_filename(filename)?;
        let file = match tokio::fs::File::open(self.root.join(filename)).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(filename.to_owned()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(ChunkReader::new(file, filename.to_owned(), self.chunk_size))
    }
}

// ---------------------------------------------------------------------------
// AppendHandle
// ---------------------------------------------------------------------------

/// Append-only handle to a stored file.
pub struct AppendHandle {
    file: tokio::fs::File,
    filename: String,
    written: u64,
}

impl AppendHandle {
    /// Appends `bytes` and flushes them to the OS before returning.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        self.file.write_all(bytes).await?;
        self.file.flush().await?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Bytes appended through this handle.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Name of the file being appended to.
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[tokio::test]
    async fn open_creates_missing_root() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("files");
        assert!(!root.exists());

        let storage = LocalStorage::open(&root, 0).await.unwrap();
        assert!(root.is_dir());
        assert_eq!(storage.root(), root.as_path());
    }

    #[tokio::test]
    async fn list_returns_exact_set() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("file1.txt"), b"content1").unwrap();
        std::fs::write(dir.path().join("file2.png"), b"content2").unwrap();
        let storage = LocalStorage::open(dir.path(), 0).await.unwrap();

        let names: HashSet<String> = storage.list().await.unwrap().into_iter().collect();
        let expected: HashSet<String> = ["file1.txt", "file2.png"].map(String::from).into();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn list_empty_root() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::open(dir.path(), 0).await.unwrap();
        assert!(storage.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_fails_when_root_removed() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("files");
        let storage = LocalStorage::open(&root, 0).await.unwrap();
        std::fs::remove_dir(&root).unwrap();

        assert!(matches!(storage.list().await, Err(StorageError::Io(_))));
    }

    #[tokio::test]
    async fn repeated_open_append_accumulates() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::open(dir.path(), 0).await.unwrap();

        let mut first = storage.open_append("log.txt").await.unwrap();
        first.write(b"Hello").await.unwrap();
        drop(first);

        let mut second = storage.open_append("log.txt").await.unwrap();
        second.write(b" World").await.unwrap();
        assert_eq!(second.written(), 6);

        let content = std::fs::read(dir.path().join("log.txt")).unwrap();
        assert_eq!(content, b"Hello World");
    }

    #[tokio::test]
    async fn open_append_creates_empty_file() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::open(dir.path(), 0).await.unwrap();

        let handle = storage.open_append("empty.bin").await.unwrap();
        assert_eq!(handle.filename(), "empty.bin");
        drop(handle);

        let meta = std::fs::metadata(dir.path().join("empty.bin")).unwrap();
        assert_eq!(meta.len(), 0);
    }

    #[tokio::test]
    async fn open_append_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::open(dir.path().join("files"), 0).await.unwrap();

        let result = storage.open_append("../escape.txt").await;
        assert!(matches!(result, Err(StorageError::InvalidName(_))));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn read_sequential_missing_file() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::open(dir.path(), 0).await.unwrap();

        match storage.read_sequential("missing.txt").await {
            Err(StorageError::NotFound(name)) => assert_eq!(name, "missing.txt"),
            other => panic!("expected NotFound, got {:?}", other.map(|r| r.offset())),
        }
    }

    #[tokio::test]
    async fn not_found_message_names_file() {
        let err = StorageError::NotFound("missing.txt".into());
        assert_eq!(err.to_string(), "File 'missing.txt' not found.");
    }

    #[tokio::test]
    async fn read_sequential_restarts_from_zero() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("data.bin"), b"0123456789").unwrap();
        let storage = LocalStorage::open(dir.path(), 4).await.unwrap();

        let mut first = storage.read_sequential("data.bin").await.unwrap();
        assert_eq!(first.next_chunk().await.unwrap().unwrap().as_ref(), b"0123");

        let mut second = storage.read_sequential("data.bin").await.unwrap();
        assert_eq!(second.next_chunk().await.unwrap().unwrap().as_ref(), b"0123");
        assert_eq!(first.next_chunk().await.unwrap().unwrap().as_ref(), b"4567");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn write_failure_is_io_error() {
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink("/dev/full", dir.path().join("full.bin")).unwrap();
        let storage = LocalStorage::open(dir.path(), 0).await.unwrap();

        let mut handle = storage.open_append("full.bin").await.unwrap();
        assert!(matches!(handle.write(b"data").await, Err(StorageError::Io(_))));
    }
}
