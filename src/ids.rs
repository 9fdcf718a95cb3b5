use uuid::Uuid;

pub const USER_PREFIX: &str = "user";
pub const NOTE_PREFIX: &str = "note";
pub const TASK_PREFIX: &str = "task";
pub const LABEL_PREFIX: &str = "label";
pub const TASK_LABEL_PREFIX: &str = "task_label";
pub const FILE_PREFIX: &str = "file";

/// Opaque identifier of the form `<prefix>_<32 hex digits>`.
pub fn generate_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}
