use crate::config::{StorageConfig, NOTES_FILE};
use crate::error::AppResult;
use crate::ids::{generate_id, NOTE_PREFIX};
use crate::models::{NewNote, Note, NotePatch};
use crate::records::RecordRepository;
use crate::store::JsonCollection;
use crate::uploads::UploadDir;
use chrono::Utc;

pub type NoteRepository = RecordRepository<Note>;

impl RecordRepository<Note> {
    pub fn new(config: &StorageConfig) -> Self {
        Self::from_parts(
            JsonCollection::new("notes", config.collection(NOTES_FILE)),
            UploadDir::new(config.note_uploads()),
        )
    }

    pub async fn create(&self, user_id: &str, note: NewNote) -> AppResult<Note> {
        let now = Utc::now();
        self.insert(Note {
            id: generate_id(NOTE_PREFIX),
            title: note.title,
            content: note.content,
            user_id: user_id.to_string(),
            labels: note.labels,
            files: Vec::new(),
            created_at: now,
            updated_at: now,
        })
        .await
    }

    /// Shallow merge of the provided fields. `None` when the note does not
    /// exist for this user.
    pub async fn update(&self, id: &str, user_id: &str, patch: NotePatch) -> AppResult<Option<Note>> {
        self.modify(id, user_id, |note| {
            if let Some(title) = patch.title {
                note.title = title;
            }
            if let Some(content) = patch.content {
                note.content = content;
            }
            if let Some(labels) = patch.labels {
                note.labels = labels;
            }
        })
        .await
    }
}
