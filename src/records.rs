use crate::error::AppResult;
use crate::models::{Label, NewUpload, Note, StoredFile, Task};
use crate::store::JsonCollection;
use crate::uploads::UploadDir;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;

/// A user-owned record carrying embedded label snapshots and attachments.
pub trait OwnedRecord: Clone + Serialize + DeserializeOwned {
    fn id(&self) -> &str;
    fn user_id(&self) -> &str;
    fn labels_mut(&mut self) -> &mut Vec<Label>;
    fn files(&self) -> &[StoredFile];
    fn files_mut(&mut self) -> &mut Vec<StoredFile>;
    fn updated_at(&self) -> DateTime<Utc>;
    fn set_updated_at(&mut self, at: DateTime<Utc>);

    /// Re-stamps `updatedAt`, never moving it backwards.
    fn touch(&mut self, now: DateTime<Utc>) {
        let at = now.max(self.updated_at());
        self.set_updated_at(at);
    }

    fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id() == user_id
    }
}

macro_rules! owned_record {
    ($ty:ty) => {
        impl OwnedRecord for $ty {
            fn id(&self) -> &str {
                &self.id
            }
            fn user_id(&self) -> &str {
                &self.user_id
            }
            fn labels_mut(&mut self) -> &mut Vec<Label> {
                &mut self.labels
            }
            fn files(&self) -> &[StoredFile] {
                &self.files
            }
            fn files_mut(&mut self) -> &mut Vec<StoredFile> {
                &mut self.files
            }
            fn updated_at(&self) -> DateTime<Utc> {
                self.updated_at
            }
            fn set_updated_at(&mut self, at: DateTime<Utc>) {
                self.updated_at = at;
            }
        }
    };
}

owned_record!(Note);
owned_record!(Task);

/// Owner-scoped CRUD shared by notes and tasks. Every operation is a full
/// read-modify-write of the backing collection.
///
/// `find_by_id` performs no ownership check; anything acting for a user goes
/// through the `*_and_user` lookups.
#[derive(Debug)]
pub struct RecordRepository<R> {
    collection: JsonCollection<R>,
    uploads: UploadDir,
}

impl<R: OwnedRecord> RecordRepository<R> {
    pub(crate) fn from_parts(collection: JsonCollection<R>, uploads: UploadDir) -> Self {
        Self { collection, uploads }
    }

    pub fn collection(&self) -> &JsonCollection<R> {
        &self.collection
    }

    pub fn uploads(&self) -> &UploadDir {
        &self.uploads
    }

    pub async fn find_all(&self) -> Vec<R> {
        self.collection.read_all().await
    }

    pub async fn find_all_by_user(&self, user_id: &str) -> Vec<R> {
        self.collection
            .read_all()
            .await
            .into_iter()
            .filter(|record| record.is_owned_by(user_id))
            .collect()
    }

    pub async fn find_by_id(&self, id: &str) -> Option<R> {
        self.collection
            .read_all()
            .await
            .into_iter()
            .find(|record| record.id() == id)
    }

    pub async fn find_by_id_and_user(&self, id: &str, user_id: &str) -> Option<R> {
        self.collection
            .read_all()
            .await
            .into_iter()
            .find(|record| record.id() == id && record.is_owned_by(user_id))
    }

    pub(crate) async fn insert(&self, record: R) -> AppResult<R> {
        let mut records = self.collection.read_all().await;
        records.push(record.clone());
        self.collection.write_all(&records).await?;
        tracing::info!(collection = self.collection.name(), id = record.id(), "record created");
        Ok(record)
    }

    /// Applies `change` to the owned record, re-stamps it and persists.
    /// `None` when no record matches `(id, user_id)`.
    pub(crate) async fn modify<F>(&self, id: &str, user_id: &str, change: F) -> AppResult<Option<R>>
    where
        F: FnOnce(&mut R),
    {
        let mut records = self.collection.read_all().await;
        let Some(record) = records
            .iter_mut()
            .find(|record| record.id() == id && record.is_owned_by(user_id))
        else {
            return Ok(None);
        };

        change(record);
        record.touch(Utc::now());
        let updated = record.clone();
        self.collection.write_all(&records).await?;
        Ok(Some(updated))
    }

    /// Removes the record, then best-effort deletes its attachments. The
    /// bytes are only touched once the collection is saved.
    pub async fn delete(&self, id: &str, user_id: &str) -> AppResult<bool> {
        let mut records = self.collection.read_all().await;
        let Some(index) = records
            .iter()
            .position(|record| record.id() == id && record.is_owned_by(user_id))
        else {
            return Ok(false);
        };

        let removed = records.remove(index);
        self.collection.write_all(&records).await?;
        self.uploads.remove_all(removed.files()).await;
        tracing::info!(collection = self.collection.name(), id, files = removed.files().len(), "record deleted");
        Ok(true)
    }

    /// Stores the bytes and appends the metadata to the owned record.
    /// `None` (and nothing written) when the record is not found.
    pub async fn attach_file(
        &self,
        id: &str,
        user_id: &str,
        upload: NewUpload,
    ) -> AppResult<Option<StoredFile>> {
        let mut records = self.collection.read_all().await;
        let Some(record) = records
            .iter_mut()
            .find(|record| record.id() == id && record.is_owned_by(user_id))
        else {
            return Ok(None);
        };

        let stored = self.uploads.save(upload).await?;
        record.files_mut().push(stored.clone());
        record.touch(Utc::now());

        if let Err(error) = self.collection.write_all(&records).await {
            self.uploads.remove(&stored).await;
            return Err(error);
        }
        Ok(Some(stored))
    }

    /// Drops the attachment metadata; once that is saved the bytes are
    /// deleted best-effort.
    pub async fn remove_file(&self, id: &str, user_id: &str, file_id: &str) -> AppResult<bool> {
        let mut records = self.collection.read_all().await;
        let Some(record) = records
            .iter_mut()
            .find(|record| record.id() == id && record.is_owned_by(user_id))
        else {
            return Ok(false);
        };
        let Some(index) = record.files().iter().position(|file| file.id == file_id) else {
            return Ok(false);
        };

        let removed = record.files_mut().remove(index);
        record.touch(Utc::now());
        self.collection.write_all(&records).await?;
        self.uploads.remove(&removed).await;
        Ok(true)
    }

    pub async fn file_location(
        &self,
        id: &str,
        user_id: &str,
        file_id: &str,
    ) -> Option<(StoredFile, PathBuf)> {
        let record = self.find_by_id_and_user(id, user_id).await?;
        let file = record.files().iter().find(|file| file.id == file_id)?.clone();
        let path = self.uploads.locate(&file);
        Some((file, path))
    }
}
