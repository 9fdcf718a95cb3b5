use crate::error::AppResult;
use crate::ids::{generate_id, FILE_PREFIX};
use crate::models::{NewUpload, StoredFile};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Directory holding attachment bytes for one domain (notes or tasks).
#[derive(Debug, Clone)]
pub struct UploadDir {
    dir: PathBuf,
}

impl UploadDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute location of an attachment. Only the final component of the
    /// recorded path is used, so metadata cannot point outside the directory.
    pub fn locate(&self, file: &StoredFile) -> PathBuf {
        match Path::new(&file.path).file_name() {
            Some(name) => self.dir.join(name),
            None => self.dir.join(&file.id),
        }
    }

    /// Writes the bytes as `<file id><original extension>` and returns the
    /// metadata record to attach.
    pub async fn save(&self, upload: NewUpload) -> AppResult<StoredFile> {
        let id = generate_id(FILE_PREFIX);
        let file_name = format!("{}{}", id, extension_of(&upload.name));

        fs::create_dir_all(&self.dir).await?;
        fs::write(self.dir.join(&file_name), &upload.bytes).await?;
        tracing::debug!(file_id = %id, size = upload.bytes.len(), dir = %self.dir.display(), "attachment written");

        Ok(StoredFile {
            id,
            name: upload.name,
            size: upload.bytes.len() as u64,
            mime_type: upload.mime_type,
            path: file_name,
            uploaded_at: Utc::now(),
        })
    }

    /// Best-effort delete. Failures are logged and reported as `false`;
    /// callers drop the metadata regardless.
    pub async fn remove(&self, file: &StoredFile) -> bool {
        let path = self.locate(file);
        match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(file_id = %file.id, path = %path.display(), error = %error, "failed to delete attachment from disk");
                false
            }
        }
    }

    pub async fn remove_all(&self, files: &[StoredFile]) {
        for file in files {
            self.remove(file).await;
        }
    }
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, bytes: &[u8]) -> NewUpload {
        NewUpload {
            name: name.to_string(),
            mime_type: "text/plain".to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[tokio::test]
    async fn save_names_file_by_id_and_extension() {
        let root = tempfile::tempdir().expect("temp root");
        let uploads = UploadDir::new(root.path().join("uploads/notes"));

        let stored = uploads.save(upload("Report.PDF", b"%PDF")).await.expect("save");
        assert!(stored.id.starts_with("file_"));
        assert_eq!(stored.path, format!("{}.pdf", stored.id));
        assert_eq!(stored.name, "Report.PDF");
        assert_eq!(stored.size, 4);
        assert_eq!(std::fs::read(uploads.locate(&stored)).expect("bytes"), b"%PDF");
    }

    #[test]
    fn odd_extensions_are_dropped() {
        assert_eq!(extension_of("notes"), "");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("weird.e x"), "");
    }

    #[tokio::test]
    async fn locate_ignores_directory_components() {
        let uploads = UploadDir::new("/srv/uploads");
        let file = StoredFile {
            id: "file_1".to_string(),
            name: "x".to_string(),
            size: 0,
            mime_type: String::new(),
            path: "../../etc/passwd".to_string(),
            uploaded_at: Utc::now(),
        };
        assert_eq!(uploads.locate(&file), PathBuf::from("/srv/uploads/passwd"));
    }

    #[tokio::test]
    async fn remove_reports_failure_without_erroring() {
        let root = tempfile::tempdir().expect("temp root");
        let uploads = UploadDir::new(root.path());
        let stored = uploads.save(upload("a.txt", b"abc")).await.expect("save");

        assert!(uploads.remove(&stored).await);
        assert!(!uploads.locate(&stored).exists());
        assert!(!uploads.remove(&stored).await);
    }
}
