use std::env;
use std::path::{Path, PathBuf};

pub const ROOT_ENV: &str = "NOTEDECK_ROOT";
const DEFAULT_ROOT: &str = "./storage";

pub const USERS_FILE: &str = "users.json";
pub const NOTES_FILE: &str = "notes.json";
pub const NOTE_LABELS_FILE: &str = "labels.json";
pub const TASKS_FILE: &str = "tasks.json";
pub const TASK_LABELS_FILE: &str = "task-labels.json";
const SESSION_FILE: &str = ".session";

/// Where every collection and upload directory lives. Handed to each
/// repository constructor so separate roots never share state.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl StorageConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_env() -> Self {
        let root = env::var(ROOT_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ROOT.to_string());
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn collection(&self, file_name: &str) -> PathBuf {
        self.data_dir().join(file_name)
    }

    pub fn note_uploads(&self) -> PathBuf {
        self.root.join("uploads").join("notes")
    }

    pub fn task_uploads(&self) -> PathBuf {
        self.root.join("uploads").join("tasks")
    }

    pub fn session_file(&self) -> PathBuf {
        self.root.join(SESSION_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_hang_off_the_root() {
        let config = StorageConfig::new("/srv/notedeck");
        assert_eq!(
            config.collection(TASK_LABELS_FILE),
            PathBuf::from("/srv/notedeck/data/task-labels.json")
        );
        assert_eq!(config.note_uploads(), PathBuf::from("/srv/notedeck/uploads/notes"));
        assert_eq!(config.task_uploads(), PathBuf::from("/srv/notedeck/uploads/tasks"));
        assert_eq!(config.session_file(), PathBuf::from("/srv/notedeck/.session"));
    }
}
