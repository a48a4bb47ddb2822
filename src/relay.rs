use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::eventlog::EventLog;
use crate::platform::BotApi;
use crate::update::Attachment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    MetadataLookup,
    Download,
    StorageWrite,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::MetadataLookup => write!(f, "metadata lookup failed"),
            FailureReason::Download => write!(f, "download failed"),
            FailureReason::StorageWrite => write!(f, "storage write failed"),
        }
    }
}

/// Outcome of archiving one attachment.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadResult {
    Saved { local_path: PathBuf, byte_size: u64 },
    Failed { reason: FailureReason },
}

/// Downloads attachments referenced by file id into local storage.
///
/// One attempt per attachment: a failed lookup or download is final.
/// Existing files with the same name are overwritten.
pub struct FileRelay {
    api: Arc<dyn BotApi>,
    storage_dir: PathBuf,
    log: EventLog,
}

impl FileRelay {
    pub fn new(api: Arc<dyn BotApi>, storage_dir: impl Into<PathBuf>, log: EventLog) -> Self {
        Self {
            api,
            storage_dir: storage_dir.into(),
            log,
        }
    }

    pub async fn relay(&self, attachment: &Attachment) -> DownloadResult {
        let kind = attachment.kind();
        let file_id = attachment.file_id();

        let remote = match self.api.get_file(file_id).await {
            Ok(remote) => remote,
            Err(e) => {
                warn!("getFile failed for {}: {}", file_id, e);
                self.log.record_with(
                    &format!("FAILED TO LOOK UP {}", kind.label()),
                    &json!({ "file_id": file_id, "error": e.to_string() }),
                );
                return DownloadResult::Failed {
                    reason: FailureReason::MetadataLookup,
                };
            }
        };

        debug!(
            "Resolved {} to {} ({:?} bytes)",
            file_id, remote.path, remote.size
        );
        let file_name = local_file_name(attachment, &remote.path);

        if let Err(e) = tokio::fs::create_dir_all(&self.storage_dir).await {
            return self.storage_failed(attachment, &self.storage_dir, e);
        }

        let file_url = self.api.file_url(&remote.path);
        self.log.record(&format!("DOWNLOAD FROM {}", file_url));

        let bytes = match self.api.download(&remote.path).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            outcome => {
                let error = match outcome {
                    Err(e) => e.to_string(),
                    Ok(_) => "empty response body".to_string(),
                };
                warn!("Download of {} failed: {}", file_id, error);
                self.log.record_with(
                    &format!("FAILED TO DOWNLOAD {}", kind.label()),
                    &json!({ "file_id": file_id, "file_url": file_url, "error": error }),
                );
                return DownloadResult::Failed {
                    reason: FailureReason::Download,
                };
            }
        };

        let local_path = self.storage_dir.join(&file_name);
        if let Err(e) = tokio::fs::write(&local_path, &bytes).await {
            return self.storage_failed(attachment, &local_path, e);
        }

        let byte_size = bytes.len() as u64;
        info!("Saved {} to {} ({} bytes)", kind, local_path.display(), byte_size);
        self.log.record_with(
            &format!("{} SAVED TO STORAGE", kind.label()),
            &json!({
                "original_name": file_name,
                "local_path": local_path.display().to_string(),
                "file_size": byte_size,
            }),
        );

        DownloadResult::Saved {
            local_path,
            byte_size,
        }
    }

    fn storage_failed(
        &self,
        attachment: &Attachment,
        path: &Path,
        err: std::io::Error,
    ) -> DownloadResult {
        warn!("Failed to write {}: {}", path.display(), err);
        self.log.record_with(
            &format!("ERROR SAVING {} TO STORAGE", attachment.kind().label()),
            &json!({
                "file_id": attachment.file_id(),
                "path": path.display().to_string(),
                "error": err.to_string(),
            }),
        );
        DownloadResult::Failed {
            reason: FailureReason::StorageWrite,
        }
    }
}

/// Name the archived file gets inside the storage directory.
///
/// The sender's declared name wins, reduced to its last path component.
/// Otherwise `{file_unique_id}.{ext}`, with the extension taken from the
/// remote path (and `file_id` standing in for a missing unique id).
pub fn local_file_name(attachment: &Attachment, remote_path: &str) -> String {
    let declared = attachment
        .file_name()
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty());
    if let Some(name) = declared {
        return name.to_string();
    }

    let stem = attachment
        .file_unique_id()
        .filter(|unique| !unique.is_empty())
        .unwrap_or(attachment.file_id());
    match Path::new(remote_path).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}
