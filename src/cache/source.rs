use std::io::ErrorKind;
use std::path::PathBuf;

#[cfg(test)]
use mockall::automock;
use tracing::debug;

use super::rows::ConfigRows;
use crate::Result;
use crate::SourceError;

/// Supplier of configuration row sets.
///
/// A fetch either returns every row set or fails as a whole; the synchronizer never
/// applies a partial fetch.
#[cfg_attr(test, automock)]
pub trait ConfigSource: Send + Sync + 'static {
    fn fetch(&self) -> Result<ConfigRows>;
}

/// Reads row sets from a JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileConfigSource {
    fn fetch(&self) -> Result<ConfigRows> {
        let data = std::fs::read(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                SourceError::ConnectionDown(format!("{}: {}", self.path.display(), e))
            }
            _ => SourceError::Query {
                kind: "all",
                reason: e.to_string(),
            },
        })?;

        let rows: ConfigRows =
            serde_json::from_slice(&data).map_err(|e| SourceError::Parse(e.to_string()))?;
        debug!("fetched {} rows from {}", rows.row_count(), self.path.display());
        Ok(rows)
    }
}
