use crate::config::{StorageConfig, TASKS_FILE};
use crate::error::AppResult;
use crate::ids::{generate_id, TASK_PREFIX};
use crate::models::{NewTask, Task, TaskPatch, TaskStatus};
use crate::records::RecordRepository;
use crate::store::JsonCollection;
use crate::uploads::UploadDir;
use chrono::{DateTime, Duration, Utc};

pub type TaskRepository = RecordRepository<Task>;

/// Due date used when a task is created without one.
pub fn default_due_date(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(2)
}

impl RecordRepository<Task> {
    pub fn new(config: &StorageConfig) -> Self {
        Self::from_parts(
            JsonCollection::new("tasks", config.collection(TASKS_FILE)),
            UploadDir::new(config.task_uploads()),
        )
    }

    pub async fn create(&self, user_id: &str, task: NewTask) -> AppResult<Task> {
        let now = Utc::now();
        self.insert(Task {
            id: generate_id(TASK_PREFIX),
            title: task.title,
            content: task.content,
            user_id: user_id.to_string(),
            status: task.status,
            due_date: task.due_date.unwrap_or_else(|| default_due_date(now)),
            labels: task.labels,
            files: Vec::new(),
            created_at: now,
            updated_at: now,
        })
        .await
    }

    /// Shallow merge of the provided fields. Any status may follow any other.
    pub async fn update(&self, id: &str, user_id: &str, patch: TaskPatch) -> AppResult<Option<Task>> {
        self.modify(id, user_id, |task| {
            if let Some(title) = patch.title {
                task.title = title;
            }
            if let Some(content) = patch.content {
                task.content = content;
            }
            if let Some(status) = patch.status {
                task.status = status;
            }
            if let Some(due_date) = patch.due_date {
                task.due_date = due_date;
            }
            if let Some(labels) = patch.labels {
                task.labels = labels;
            }
        })
        .await
    }

    /// Removes every Done task owned by `user_id` in a single write and
    /// returns how many went.
    pub async fn delete_all_done(&self, user_id: &str) -> AppResult<usize> {
        let records = self.collection().read_all().await;
        let (done, kept): (Vec<Task>, Vec<Task>) = records
            .into_iter()
            .partition(|task| task.user_id == user_id && task.status == TaskStatus::Done);

        if done.is_empty() {
            return Ok(0);
        }

        self.collection().write_all(&kept).await?;
        for task in &done {
            self.uploads().remove_all(&task.files).await;
        }
        tracing::info!(user_id, count = done.len(), "done tasks deleted");
        Ok(done.len())
    }
}
