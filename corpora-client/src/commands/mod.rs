mod completion;
mod download;
mod upload;

pub use completion::GenCompletionsCommand;
pub use download::DownloadCommand;
pub use upload::UploadCommand;

use std::time::Duration;

pub const PROGRESS_BAR_TICKRATE: Duration = Duration::from_millis(80);
