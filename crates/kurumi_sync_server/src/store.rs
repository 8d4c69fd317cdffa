//! On-disk storage for the single synced document.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::Mutex;

/// File name of the stored document inside the data directory.
pub const OBJECT_KEY: &str = "kurumi-doc.ydoc";

/// Stores one opaque object in a directory, replacing it atomically.
#[derive(Debug)]
pub struct FsObjectStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FsObjectStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn object_path(&self) -> PathBuf {
        self.dir.join(OBJECT_KEY)
    }

    /// The stored object, or `None` if nothing was written yet.
    pub async fn read(&self) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.object_path()).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Replace the object. Readers see either the old or the new content.
    pub async fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.dir).await?;
        let tmp = self.dir.join(format!("{}.tmp", OBJECT_KEY));
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, self.object_path()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().join("nested"));
        assert_eq!(store.read().await.unwrap(), None);

        store.write(b"first").await.unwrap();
        store.write(b"second").await.unwrap();
        assert_eq!(store.read().await.unwrap().as_deref(), Some(&b"second"[..]));
        assert!(!dir.path().join("nested").join("kurumi-doc.ydoc.tmp").exists());
    }
}
