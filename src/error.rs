use std::path::PathBuf;

use thiserror::Error;

/// Failures produced while handling one inbound update.
///
/// None of these are fatal: the pipeline in `bot` catches each one at the
/// step that produced it and turns it into a log entry, a degraded reply,
/// or a silent drop.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("malformed update: {0}")]
    MalformedUpdate(String),

    #[error("{method} failed: {description}")]
    RemoteApi {
        method: &'static str,
        description: String,
    },

    #[error("file lookup failed for {file_id}: {reason}")]
    FileLookupFailed { file_id: String, reason: String },

    #[error("download failed for {file_id}: {reason}")]
    DownloadFailed { file_id: String, reason: String },

    #[error("i/o error at {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BotError {
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
