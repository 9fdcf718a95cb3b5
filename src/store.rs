use crate::error::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs;

/// One JSON array document holding a whole collection.
///
/// Every call goes back to disk: nothing is cached between operations, and
/// writes replace the entire file with a single `write`. There is no temp
/// file and rename, so a crash mid-write can leave a truncated document, and
/// two callers doing read-modify-write on the same file race with
/// last-write-wins semantics.
#[derive(Debug)]
pub struct JsonCollection<T> {
    name: &'static str,
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCollection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(name: &'static str, path: impl Into<PathBuf>) -> Self {
        Self {
            name,
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the parent directory and an empty `[]` document if missing.
    pub async fn ensure(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        if !fs::try_exists(&self.path).await? {
            fs::write(&self.path, "[]").await?;
        }
        Ok(())
    }

    /// Reads the whole collection. Missing, unreadable or corrupt documents
    /// are logged and read as empty.
    pub async fn read_all(&self) -> Vec<T> {
        if let Err(error) = self.ensure().await {
            tracing::warn!(collection = self.name, path = %self.path.display(), error = %error, "failed to prepare collection; reading as empty");
            return Vec::new();
        }

        let data = match fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(error) => {
                tracing::warn!(collection = self.name, path = %self.path.display(), error = %error, "failed to read collection; reading as empty");
                return Vec::new();
            }
        };

        match serde_json::from_str(&data) {
            Ok(items) => items,
            Err(error) => {
                tracing::warn!(collection = self.name, path = %self.path.display(), error = %error, "failed to parse collection; reading as empty");
                Vec::new()
            }
        }
    }

    /// Replaces the whole collection with `items`, pretty-printed.
    pub async fn write_all(&self, items: &[T]) -> AppResult<()> {
        self.ensure()
            .await
            .map_err(|error| AppError::save(self.name, error))?;
        let json = serde_json::to_string_pretty(items)
            .map_err(|error| AppError::save(self.name, error))?;
        fs::write(&self.path, json)
            .await
            .map_err(|error| AppError::save(self.name, error))?;
        tracing::debug!(collection = self.name, count = items.len(), "collection saved");
        Ok(())
    }
}
