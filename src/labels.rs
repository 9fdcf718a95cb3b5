use crate::config::{StorageConfig, NOTES_FILE, NOTE_LABELS_FILE, TASKS_FILE, TASK_LABELS_FILE};
use crate::error::{AppError, AppResult};
use crate::ids::{generate_id, LABEL_PREFIX, TASK_LABEL_PREFIX};
use crate::models::{eq_ignoring_case, Label, LabelPatch, Note, Task};
use crate::records::OwnedRecord;
use crate::store::JsonCollection;
use chrono::Utc;

const DUPLICATE_NAME: &str = "Label with this name already exists";

/// Label vocabulary for one family, plus the parent collection whose
/// embedded snapshots must be stripped when a label is deleted.
#[derive(Debug)]
pub struct LabelRepository<P> {
    id_prefix: &'static str,
    labels: JsonCollection<Label>,
    parents: JsonCollection<P>,
}

pub type NoteLabelRepository = LabelRepository<Note>;
pub type TaskLabelRepository = LabelRepository<Task>;

impl LabelRepository<Note> {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            id_prefix: LABEL_PREFIX,
            labels: JsonCollection::new("labels", config.collection(NOTE_LABELS_FILE)),
            parents: JsonCollection::new("notes", config.collection(NOTES_FILE)),
        }
    }
}

impl LabelRepository<Task> {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            id_prefix: TASK_LABEL_PREFIX,
            labels: JsonCollection::new("task labels", config.collection(TASK_LABELS_FILE)),
            parents: JsonCollection::new("tasks", config.collection(TASKS_FILE)),
        }
    }
}

impl<P: OwnedRecord> LabelRepository<P> {
    pub fn collection(&self) -> &JsonCollection<Label> {
        &self.labels
    }

    pub async fn find_all(&self) -> Vec<Label> {
        self.labels.read_all().await
    }

    pub async fn find_by_id(&self, id: &str) -> Option<Label> {
        self.labels
            .read_all()
            .await
            .into_iter()
            .find(|label| label.id == id)
    }

    /// Labels whose id is in `ids`, in collection order. Unknown ids are
    /// skipped.
    pub async fn find_by_ids(&self, ids: &[String]) -> Vec<Label> {
        if ids.is_empty() {
            return Vec::new();
        }
        self.labels
            .read_all()
            .await
            .into_iter()
            .filter(|label| ids.iter().any(|id| *id == label.id))
            .collect()
    }

    pub async fn create(&self, name: &str, color: &str) -> AppResult<Label> {
        let mut labels = self.labels.read_all().await;
        if labels.iter().any(|label| eq_ignoring_case(&label.name, name)) {
            return Err(AppError::Conflict(DUPLICATE_NAME.to_string()));
        }

        let now = Utc::now();
        let label = Label {
            id: generate_id(self.id_prefix),
            name: name.to_string(),
            color: color.to_string(),
            created_at: now,
            updated_at: now,
        };
        labels.push(label.clone());
        self.labels.write_all(&labels).await?;
        tracing::info!(collection = self.labels.name(), id = %label.id, "label created");
        Ok(label)
    }

    /// Renames are checked against every other label. Embedded snapshots on
    /// notes and tasks are left as they were.
    pub async fn update(&self, id: &str, patch: LabelPatch) -> AppResult<Option<Label>> {
        let mut labels = self.labels.read_all().await;
        let Some(index) = labels.iter().position(|label| label.id == id) else {
            return Ok(None);
        };

        if let Some(name) = &patch.name {
            let taken = labels
                .iter()
                .any(|label| label.id != id && eq_ignoring_case(&label.name, name));
            if taken {
                return Err(AppError::Conflict(DUPLICATE_NAME.to_string()));
            }
        }

        let label = &mut labels[index];
        if let Some(name) = patch.name {
            label.name = name;
        }
        if let Some(color) = patch.color {
            label.color = color;
        }
        label.updated_at = Utc::now().max(label.updated_at);
        let updated = label.clone();

        self.labels.write_all(&labels).await?;
        Ok(Some(updated))
    }

    /// Strips the label from every parent, then removes the label itself.
    /// The two writes are not atomic: if the second fails the label survives
    /// detached from all parents.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let mut labels = self.labels.read_all().await;
        let Some(index) = labels.iter().position(|label| label.id == id) else {
            return Ok(false);
        };

        let now = Utc::now();
        let mut parents = self.parents.read_all().await;
        let mut detached = 0usize;
        for parent in parents.iter_mut() {
            let embedded = parent.labels_mut();
            let before = embedded.len();
            embedded.retain(|label| label.id != id);
            if embedded.len() != before {
                parent.touch(now);
                detached += 1;
            }
        }
        self.parents.write_all(&parents).await?;

        labels.remove(index);
        self.labels.write_all(&labels).await?;
        tracing::info!(collection = self.labels.name(), id, detached, "label deleted");
        Ok(true)
    }
}
