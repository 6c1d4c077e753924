//! Concrete backup pipeline stages.

mod cleanup;
mod rename;
mod upload;

pub use cleanup::CleanupTask;
pub use rename::RenameTask;
pub use upload::{REMOTE_PATH_KEY, UploadTask};
