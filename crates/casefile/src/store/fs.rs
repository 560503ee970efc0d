use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use super::{BlobStore, StoreError};

/// Blob store backed by a local directory tree.
///
/// Remote paths are interpreted relative to the base directory, so
/// `/forensic/0_0/05_0_0_35` lives at `{base}/forensic/0_0/05_0_0_35`.
pub struct FsBlobStore {
    base_path: PathBuf,
}

impl FsBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Create the base directory.
    pub fn init(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.base_path)?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map a remote path to a local one, refusing anything that escapes the base.
    fn local_path(&self, remote_path: &str) -> Result<PathBuf, StoreError> {
        let mut path = self.base_path.clone();
        for component in Path::new(remote_path).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(StoreError::InvalidPath(remote_path.to_string()));
                }
            }
        }
        Ok(path)
    }
}

impl BlobStore for FsBlobStore {
    fn copy_from_reader(
        &self,
        source: &mut dyn Read,
        remote_path: &str,
    ) -> Result<u64, StoreError> {
        let dest = self.local_path(remote_path)?;
        let parent = dest
            .parent()
            .ok_or_else(|| StoreError::InvalidPath(remote_path.to_string()))?;
        fs::create_dir_all(parent)?;

        // Write to tempfile, then rename
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        let bytes = io::copy(source, temp.as_file_mut())?;
        temp.as_file().sync_all()?;
        temp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;

        debug!(remote_path, bytes, "Wrote blob");
        Ok(bytes)
    }

    fn ensure_directory(&self, remote_path: &str) -> Result<(), StoreError> {
        fs::create_dir_all(self.local_path(remote_path)?)?;
        Ok(())
    }

    fn exists(&self, remote_path: &str) -> Result<bool, StoreError> {
        Ok(fs::exists(self.local_path(remote_path)?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn copy_creates_parents() {
        let base = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let local = src.path().join("evidence.bin");
        fs::write(&local, b"some bytes").unwrap();

        let store = FsBlobStore::new(base.path());
        let copied = store
            .copy_local_file_to(&local, "/forensic/0_0/01_0_0_1")
            .unwrap();

        assert_eq!(copied, 10);
        assert!(store.exists("/forensic/0_0/01_0_0_1").unwrap());
        let stored = fs::read(base.path().join("forensic/0_0/01_0_0_1")).unwrap();
        assert_eq!(stored, b"some bytes");
    }

    #[test]
    fn copy_replaces_existing() {
        let base = TempDir::new().unwrap();
        let src = TempDir::new().unwrap();
        let local = src.path().join("f");
        let store = FsBlobStore::new(base.path());

        fs::write(&local, b"first").unwrap();
        store.copy_local_file_to(&local, "a/f").unwrap();
        fs::write(&local, b"second").unwrap();
        store.copy_local_file_to(&local, "a/f").unwrap();

        assert_eq!(fs::read(base.path().join("a/f")).unwrap(), b"second");
    }

    #[test]
    fn copy_missing_source_fails() {
        let base = TempDir::new().unwrap();
        let store = FsBlobStore::new(base.path());
        let err = store
            .copy_local_file_to(Path::new("/nonexistent/source"), "a/f")
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(!store.exists("a/f").unwrap());
    }

    #[test]
    fn copy_from_reader_writes_stream() {
        let base = TempDir::new().unwrap();
        let store = FsBlobStore::new(base.path());
        let mut source = io::Cursor::new(b"head".to_vec()).chain(&b"-tail"[..]);

        let written = store.copy_from_reader(&mut source, "/x/0_0/y").unwrap();
        assert_eq!(written, 9);
        assert_eq!(fs::read(base.path().join("x/0_0/y")).unwrap(), b"head-tail");
    }

    #[test]
    fn ensure_directory_is_idempotent() {
        let base = TempDir::new().unwrap();
        let store = FsBlobStore::new(base.path());
        store.ensure_directory("/forensic/3_1").unwrap();
        store.ensure_directory("/forensic/3_1").unwrap();
        assert!(base.path().join("forensic/3_1").is_dir());
        assert!(store.exists("forensic/3_1").unwrap());
    }

    #[test]
    fn rejects_escaping_paths() {
        let base = TempDir::new().unwrap();
        let store = FsBlobStore::new(base.path());
        assert!(matches!(
            store.ensure_directory("/forensic/../../etc"),
            Err(StoreError::InvalidPath(_))
        ));
        assert!(matches!(
            store.exists("../x"),
            Err(StoreError::InvalidPath(_))
        ));
    }
}
