use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use newsqa_core::NewsqaError;
use parking_lot::Mutex;

use crate::DurableBackend;

/// A durable tier backed by a single JSON file on disk.
///
/// The file holds one JSON object mapping full keys to serialized envelopes.
/// Every write rewrites the whole file through a temporary sibling and an
/// atomic rename, so a crash mid-write leaves the previous contents intact.
pub struct FileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileBackend {
    /// Create a backend storing its data at `path`. The file and its parent
    /// directory are created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, NewsqaError> {
        match self.read_contents()? {
            Some(contents) => self.parse_map(&contents),
            None => Ok(BTreeMap::new()),
        }
    }

    /// The map a write should start from. A file that no longer parses is
    /// moved aside to `<path>.corrupt` and replaced by an empty store.
    fn writable_map(&self) -> Result<BTreeMap<String, String>, NewsqaError> {
        let Some(contents) = self.read_contents()? else {
            return Ok(BTreeMap::new());
        };
        match self.parse_map(&contents) {
            Ok(map) => Ok(map),
            Err(e) => {
                let aside = self.sibling(".corrupt");
                tracing::warn!(
                    path = %self.path.display(),
                    aside = %aside.display(),
                    error = %e,
                    "durable store is corrupt, starting a new one"
                );
                std::fs::rename(&self.path, &aside).map_err(|e| {
                    NewsqaError::Storage(format!(
                        "failed to move {} aside: {e}",
                        self.path.display()
                    ))
                })?;
                Ok(BTreeMap::new())
            }
        }
    }

    /// File contents, or `None` when the file is missing or blank.
    fn read_contents(&self) -> Result<Option<String>, NewsqaError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(None),
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(NewsqaError::Storage(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn parse_map(&self, contents: &str) -> Result<BTreeMap<String, String>, NewsqaError> {
        serde_json::from_str(contents).map_err(|e| {
            NewsqaError::Storage(format!("failed to parse {}: {e}", self.path.display()))
        })
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(suffix);
        PathBuf::from(path)
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), NewsqaError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    NewsqaError::Storage(format!("failed to create directory: {e}"))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(map)
            .map_err(|e| NewsqaError::Storage(format!("failed to serialize store: {e}")))?;

        let tmp = self.sibling(".tmp");

        std::fs::write(&tmp, json)
            .map_err(|e| NewsqaError::Storage(format!("failed to write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            NewsqaError::Storage(format!(
                "failed to replace {}: {e}",
                self.path.display()
            ))
        })
    }
}

impl DurableBackend for FileBackend {
    fn try_read(&self, key: &str) -> Result<Option<String>, NewsqaError> {
        let _guard = self.lock.lock();
        Ok(self.read_map()?.remove(key))
    }

    fn try_write(&self, key: &str, value: &str) -> Result<(), NewsqaError> {
        let _guard = self.lock.lock();
        let mut map = self.writable_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), NewsqaError> {
        let _guard = self.lock.lock();
        let mut map = self.read_map()?;
        if map.remove(key).is_none() {
            return Ok(());
        }
        self.write_map(&map)
    }

    fn keys(&self) -> Result<Vec<String>, NewsqaError> {
        let _guard = self.lock.lock();
        Ok(self.read_map()?.into_keys().collect())
    }
}
