//! Caller-facing service. Request contracts are validated here and label ids
//! are resolved into embedded snapshots before anything reaches a
//! repository; repository misses become `NotFound`.

use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};
use crate::labels::{NoteLabelRepository, TaskLabelRepository};
use crate::models::{
    CreateLabelRequest, CreateNoteRequest, CreateTaskRequest, Label, LabelPatch, NewNote,
    NewTask, NewUpload, Note, NotePatch, StoredFile, Task, TaskPatch, TaskStatus,
    UpdateLabelRequest, UpdateNoteRequest, UpdateTaskRequest,
};
use crate::notes::NoteRepository;
use crate::tasks::TaskRepository;
use crate::user_models::{LoginRequest, SignupRequest, UserProfile};
use crate::user_storage::UserRepository;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;

const MIN_PASSWORD_LEN: usize = 6;
const MAX_LABEL_NAME_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelFamily {
    Notes,
    Tasks,
}

pub struct App {
    pub users: UserRepository,
    pub notes: NoteRepository,
    pub note_labels: NoteLabelRepository,
    pub tasks: TaskRepository,
    pub task_labels: TaskLabelRepository,
}

impl App {
    pub fn open(config: &StorageConfig) -> Self {
        Self {
            users: UserRepository::new(config),
            notes: NoteRepository::new(config),
            note_labels: NoteLabelRepository::new(config),
            tasks: TaskRepository::new(config),
            task_labels: TaskLabelRepository::new(config),
        }
    }

    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.users = self.users.with_hash_cost(cost);
        self
    }

    pub async fn signup(&self, request: SignupRequest) -> AppResult<UserProfile> {
        let email = request.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Invalid("A valid email is required".to_string()));
        }
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::Invalid("Name is required".to_string()));
        }
        if request.password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::Invalid(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LEN
            )));
        }

        let user = self.users.create(email, &request.password, name).await?;
        Ok(user.into())
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<UserProfile> {
        self.users
            .authenticate(request.email.trim(), &request.password)
            .await?
            .map(UserProfile::from)
            .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))
    }

    pub async fn profile(&self, user_id: &str) -> AppResult<UserProfile> {
        self.users
            .find_by_id(user_id)
            .await
            .map(UserProfile::from)
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    // Notes

    pub async fn list_notes(&self, user_id: &str) -> Vec<Note> {
        self.notes.find_all_by_user(user_id).await
    }

    pub async fn get_note(&self, user_id: &str, id: &str) -> AppResult<Note> {
        self.notes
            .find_by_id_and_user(id, user_id)
            .await
            .ok_or_else(|| AppError::NotFound("Note".to_string()))
    }

    pub async fn create_note(&self, user_id: &str, request: CreateNoteRequest) -> AppResult<Note> {
        let title = required_title(&request.title)?;
        let labels = self.note_labels.find_by_ids(&request.label_ids).await;
        self.notes
            .create(
                user_id,
                NewNote {
                    title,
                    content: request.content,
                    labels,
                },
            )
            .await
    }

    pub async fn update_note(&self, user_id: &str, id: &str, request: UpdateNoteRequest) -> AppResult<Note> {
        let title = request.title.as_deref().map(required_title).transpose()?;
        let labels = match &request.label_ids {
            Some(ids) => Some(self.note_labels.find_by_ids(ids).await),
            None => None,
        };
        let patch = NotePatch {
            title,
            content: request.content,
            labels,
        };
        self.notes
            .update(id, user_id, patch)
            .await?
            .ok_or_else(|| AppError::NotFound("Note".to_string()))
    }

    pub async fn delete_note(&self, user_id: &str, id: &str) -> AppResult<()> {
        if self.notes.delete(id, user_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound("Note".to_string()))
        }
    }

    pub async fn attach_to_note(&self, user_id: &str, id: &str, upload: NewUpload) -> AppResult<StoredFile> {
        validate_upload(&upload)?;
        self.notes
            .attach_file(id, user_id, upload)
            .await?
            .ok_or_else(|| AppError::NotFound("Note".to_string()))
    }

    pub async fn detach_from_note(&self, user_id: &str, id: &str, file_id: &str) -> AppResult<()> {
        if self.notes.remove_file(id, user_id, file_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound("File".to_string()))
        }
    }

    pub async fn note_file(&self, user_id: &str, id: &str, file_id: &str) -> AppResult<(StoredFile, PathBuf)> {
        self.notes
            .file_location(id, user_id, file_id)
            .await
            .ok_or_else(|| AppError::NotFound("File".to_string()))
    }

    // Tasks

    pub async fn list_tasks(&self, user_id: &str, status: Option<&str>) -> AppResult<Vec<Task>> {
        let status = status.map(parse_status).transpose()?;
        let mut tasks = self.tasks.find_all_by_user(user_id).await;
        if let Some(status) = status {
            tasks.retain(|task| task.status == status);
        }
        Ok(tasks)
    }

    pub async fn get_task(&self, user_id: &str, id: &str) -> AppResult<Task> {
        self.tasks
            .find_by_id_and_user(id, user_id)
            .await
            .ok_or_else(|| AppError::NotFound("Task".to_string()))
    }

    pub async fn create_task(&self, user_id: &str, request: CreateTaskRequest) -> AppResult<Task> {
        let title = required_title(&request.title)?;
        let status = request
            .status
            .as_deref()
            .map(parse_status)
            .transpose()?
            .unwrap_or_default();
        let due_date = request.due_date.as_deref().map(parse_due_date).transpose()?;
        let labels = self.task_labels.find_by_ids(&request.label_ids).await;
        self.tasks
            .create(
                user_id,
                NewTask {
                    title,
                    content: request.content,
                    status,
                    due_date,
                    labels,
                },
            )
            .await
    }

    pub async fn update_task(&self, user_id: &str, id: &str, request: UpdateTaskRequest) -> AppResult<Task> {
        let title = request.title.as_deref().map(required_title).transpose()?;
        let status = request.status.as_deref().map(parse_status).transpose()?;
        let due_date = request.due_date.as_deref().map(parse_due_date).transpose()?;
        let labels = match &request.label_ids {
            Some(ids) => Some(self.task_labels.find_by_ids(ids).await),
            None => None,
        };
        let patch = TaskPatch {
            title,
            content: request.content,
            status,
            due_date,
            labels,
        };
        self.tasks
            .update(id, user_id, patch)
            .await?
            .ok_or_else(|| AppError::NotFound("Task".to_string()))
    }

    pub async fn delete_task(&self, user_id: &str, id: &str) -> AppResult<()> {
        if self.tasks.delete(id, user_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound("Task".to_string()))
        }
    }

    /// Bulk delete is only ever allowed for Done tasks.
    pub async fn delete_tasks_by_status(&self, user_id: &str, status: &str) -> AppResult<usize> {
        if parse_status(status)? != TaskStatus::Done {
            return Err(AppError::Invalid(
                "Only tasks with status 'Done' can be deleted in bulk".to_string(),
            ));
        }
        self.tasks.delete_all_done(user_id).await
    }

    pub async fn attach_to_task(&self, user_id: &str, id: &str, upload: NewUpload) -> AppResult<StoredFile> {
        validate_upload(&upload)?;
        self.tasks
            .attach_file(id, user_id, upload)
            .await?
            .ok_or_else(|| AppError::NotFound("Task".to_string()))
    }

    pub async fn detach_from_task(&self, user_id: &str, id: &str, file_id: &str) -> AppResult<()> {
        if self.tasks.remove_file(id, user_id, file_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound("File".to_string()))
        }
    }

    pub async fn task_file(&self, user_id: &str, id: &str, file_id: &str) -> AppResult<(StoredFile, PathBuf)> {
        self.tasks
            .file_location(id, user_id, file_id)
            .await
            .ok_or_else(|| AppError::NotFound("File".to_string()))
    }

    // Labels

    pub async fn list_labels(&self, family: LabelFamily) -> Vec<Label> {
        match family {
            LabelFamily::Notes => self.note_labels.find_all().await,
            LabelFamily::Tasks => self.task_labels.find_all().await,
        }
    }

    pub async fn create_label(&self, family: LabelFamily, request: CreateLabelRequest) -> AppResult<Label> {
        let name = label_name(&request.name)?;
        let color = label_color(&request.color)?;
        match family {
            LabelFamily::Notes => self.note_labels.create(&name, &color).await,
            LabelFamily::Tasks => self.task_labels.create(&name, &color).await,
        }
    }

    pub async fn update_label(&self, family: LabelFamily, id: &str, request: UpdateLabelRequest) -> AppResult<Label> {
        let patch = LabelPatch {
            name: request.name.as_deref().map(label_name).transpose()?,
            color: request.color.as_deref().map(label_color).transpose()?,
        };
        let updated = match family {
            LabelFamily::Notes => self.note_labels.update(id, patch).await?,
            LabelFamily::Tasks => self.task_labels.update(id, patch).await?,
        };
        updated.ok_or_else(|| AppError::NotFound("Label".to_string()))
    }

    pub async fn delete_label(&self, family: LabelFamily, id: &str) -> AppResult<()> {
        let deleted = match family {
            LabelFamily::Notes => self.note_labels.delete(id).await?,
            LabelFamily::Tasks => self.task_labels.delete(id).await?,
        };
        if deleted {
            Ok(())
        } else {
            Err(AppError::NotFound("Label".to_string()))
        }
    }
}

fn required_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Invalid("Title is required".to_string()));
    }
    Ok(title.to_string())
}

fn label_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Invalid("Label name is required".to_string()));
    }
    if name.chars().count() > MAX_LABEL_NAME_LEN {
        return Err(AppError::Invalid(format!(
            "Label name must be at most {} characters",
            MAX_LABEL_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// `#rgb` or `#rrggbb`, stored lowercase.
fn label_color(color: &str) -> AppResult<String> {
    let color = color.trim();
    let valid = color
        .strip_prefix('#')
        .map(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false);
    if !valid {
        return Err(AppError::Invalid(
            "Color must be a hex value such as #3b82f6".to_string(),
        ));
    }
    Ok(color.to_ascii_lowercase())
}

pub fn parse_status(value: &str) -> AppResult<TaskStatus> {
    value.parse().map_err(AppError::Invalid)
}

/// RFC 3339 timestamps, or a bare `YYYY-MM-DD` meaning midnight UTC.
pub fn parse_due_date(value: &str) -> AppResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            AppError::Invalid(
                "Invalid date format. Use ISO 8601 (e.g., 2025-11-04T15:30:00Z) or YYYY-MM-DD"
                    .to_string(),
            )
        })
}

fn validate_upload(upload: &NewUpload) -> AppResult<()> {
    if upload.name.trim().is_empty() {
        return Err(AppError::Invalid("File name is required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(root: &tempfile::TempDir) -> App {
        App::open(&StorageConfig::new(root.path())).with_hash_cost(4 /* bcrypt minimum cost */)
    }

    #[test]
    fn colors_must_be_hex() {
        assert_eq!(label_color("#3B82F6").expect("valid"), "#3b82f6");
        assert_eq!(label_color("#abc").expect("short form"), "#abc");
        assert!(label_color("3b82f6").is_err());
        assert!(label_color("#3b82f").is_err());
        assert!(label_color("#zzzzzz").is_err());
    }

    #[test]
    fn due_dates_accept_timestamps_and_plain_dates() {
        let ts = parse_due_date("2025-11-04T15:30:00+02:00").expect("rfc3339");
        assert_eq!(ts.to_rfc3339(), "2025-11-04T13:30:00+00:00");
        let day = parse_due_date("2025-11-04").expect("date");
        assert_eq!(day.to_rfc3339(), "2025-11-04T00:00:00+00:00");
        assert!(matches!(parse_due_date("next tuesday"), Err(AppError::Invalid(_))));
    }

    #[tokio::test]
    async fn signup_validates_and_login_round_trips() {
        let root = tempfile::tempdir().expect("temp root");
        let app = app(&root);

        let short = app
            .signup(SignupRequest {
                email: "ada@example.com".to_string(),
                password: "123".to_string(),
                name: "Ada".to_string(),
            })
            .await;
        assert!(matches!(short, Err(AppError::Invalid(_))));

        let profile = app
            .signup(SignupRequest {
                email: " ada@example.com ".to_string(),
                password: "secret1".to_string(),
                name: "Ada".to_string(),
            })
            .await
            .expect("signup");
        assert_eq!(profile.email, "ada@example.com");

        let logged_in = app
            .login(LoginRequest {
                email: "ADA@example.com".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .expect("login");
        assert_eq!(logged_in.id, profile.id);

        let denied = app
            .login(LoginRequest {
                email: "ada@example.com".to_string(),
                password: "nope".to_string(),
            })
            .await;
        assert!(matches!(denied, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn bulk_delete_rejects_statuses_other_than_done() {
        let root = tempfile::tempdir().expect("temp root");
        let app = app(&root);
        app.create_task(
            "user_a",
            CreateTaskRequest {
                title: "Open".to_string(),
                status: Some("In Progress".to_string()),
                ..CreateTaskRequest::default()
            },
        )
        .await
        .expect("create");

        for status in ["Todo", "In Progress", "bogus"] {
            let result = app.delete_tasks_by_status("user_a", status).await;
            assert!(matches!(result, Err(AppError::Invalid(_))), "{status} accepted");
        }
        assert_eq!(app.delete_tasks_by_status("user_a", "done").await.expect("done"), 0);
        assert_eq!(app.list_tasks("user_a", None).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn task_requests_are_parsed_at_the_boundary() {
        let root = tempfile::tempdir().expect("temp root");
        let app = app(&root);
        let label = app
            .create_label(
                LabelFamily::Tasks,
                CreateLabelRequest {
                    name: " Urgent ".to_string(),
                    color: "#EF4444".to_string(),
                },
            )
            .await
            .expect("label");
        assert_eq!(label.name, "Urgent");

        let task = app
            .create_task(
                "user_a",
                CreateTaskRequest {
                    title: "Deploy".to_string(),
                    content: "prod".to_string(),
                    status: Some("in-progress".to_string()),
                    due_date: Some("2030-01-01".to_string()),
                    label_ids: vec![label.id.clone(), "task_label_missing".to_string()],
                },
            )
            .await
            .expect("create");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.labels, vec![label]);
        assert_eq!(task.due_date.to_rfc3339(), "2030-01-01T00:00:00+00:00");

        let bad = app
            .update_task(
                "user_a",
                &task.id,
                UpdateTaskRequest {
                    status: Some("Blocked".to_string()),
                    ..UpdateTaskRequest::default()
                },
            )
            .await;
        assert!(matches!(bad, Err(AppError::Invalid(_))));

        let cleared = app
            .update_task(
                "user_a",
                &task.id,
                UpdateTaskRequest {
                    label_ids: Some(Vec::new()),
                    ..UpdateTaskRequest::default()
                },
            )
            .await
            .expect("clear labels");
        assert!(cleared.labels.is_empty());
        assert_eq!(cleared.title, "Deploy");

        let done = app.list_tasks("user_a", Some("Done")).await.expect("filter");
        assert!(done.is_empty());
    }

    #[tokio::test]
    async fn misses_become_not_found() {
        let root = tempfile::tempdir().expect("temp root");
        let app = app(&root);
        let note = app
            .create_note(
                "owner",
                CreateNoteRequest {
                    title: "Mine".to_string(),
                    ..CreateNoteRequest::default()
                },
            )
            .await
            .expect("create");

        assert!(matches!(app.get_note("intruder", &note.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(app.delete_note("intruder", &note.id).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            app.delete_label(LabelFamily::Notes, "label_missing").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            app.create_note("owner", CreateNoteRequest::default()).await,
            Err(AppError::Invalid(_))
        ));
    }
}
