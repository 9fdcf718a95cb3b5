pub mod app;
pub mod config;
pub mod error;
pub mod ids;
pub mod labels;
pub mod models;
pub mod notes;
pub mod records;
pub mod store;
pub mod tasks;
pub mod uploads;
pub mod user_models;
pub mod user_storage;

pub use app::{App, LabelFamily};
pub use config::StorageConfig;
pub use error::{AppError, AppResult};
