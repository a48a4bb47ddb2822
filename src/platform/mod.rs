pub mod telegram;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::update::MediaKind;

/// A file resolved through `getFile`, ready to be downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    /// Path relative to the Bot API file endpoint, e.g. `documents/file_3.pdf`
    pub path: String,
    pub size: Option<u64>,
}

/// A message the bot sent successfully
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentMessage {
    pub message_id: i32,
}

/// Outbound side of the Bot API, as far as the dispatcher and file relay need it.
///
/// Every call either completes or fails before the caller moves on; there is
/// no retry policy behind this trait.
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<SentMessage>;

    async fn send_file(
        &self,
        chat_id: i64,
        kind: MediaKind,
        path: &Path,
        caption: &str,
    ) -> Result<SentMessage>;

    async fn get_file(&self, file_id: &str) -> Result<RemoteFile>;

    async fn download(&self, remote_path: &str) -> Result<Vec<u8>>;

    /// Method URL with the token masked, safe to log.
    fn method_url(&self, method: &str) -> String;

    /// Download URL with the token masked, safe to log.
    fn file_url(&self, remote_path: &str) -> String;
}

/// Bot API method that uploads a file of the given kind.
pub fn send_method(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "sendPhoto",
        MediaKind::Video => "sendVideo",
        MediaKind::Document => "sendDocument",
        MediaKind::Audio => "sendAudio",
    }
}

/// Multipart field name carrying the file for [`send_method`].
pub fn file_param(kind: MediaKind) -> &'static str {
    kind.as_str()
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{BotApi, RemoteFile, SentMessage};
    use crate::error::{BotError, Result};
    use crate::update::MediaKind;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Text {
            chat_id: i64,
            text: String,
        },
        File {
            chat_id: i64,
            kind: MediaKind,
            path: PathBuf,
            caption: String,
        },
        GetFile(String),
        Download(String),
    }

    /// Records every call; `getFile` and downloads are answered from scripted tables.
    #[derive(Default)]
    pub struct FakeApi {
        calls: Mutex<Vec<Call>>,
        files: HashMap<String, String>,
        blobs: HashMap<String, Vec<u8>>,
        fail_sends: bool,
    }

    impl FakeApi {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make `file_id` resolve to `remote_path` and serve `bytes` from it.
        pub fn with_file(mut self, file_id: &str, remote_path: &str, bytes: &[u8]) -> Self {
            self.files
                .insert(file_id.to_string(), remote_path.to_string());
            self.blobs.insert(remote_path.to_string(), bytes.to_vec());
            self
        }

        /// Make `file_id` resolve, but fail the download.
        pub fn with_unreachable_file(mut self, file_id: &str, remote_path: &str) -> Self {
            self.files
                .insert(file_id.to_string(), remote_path.to_string());
            self
        }

        pub fn failing_sends(mut self) -> Self {
            self.fail_sends = true;
            self
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn texts(&self) -> Vec<(i64, String)> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Text { chat_id, text } => Some((chat_id, text)),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn sent(&self, method: &'static str) -> Result<SentMessage> {
            if self.fail_sends {
                return Err(BotError::RemoteApi {
                    method,
                    description: "Bad Request: chat not found".to_string(),
                });
            }
            let message_id = self.calls.lock().unwrap().len() as i32;
            Ok(SentMessage { message_id })
        }
    }

    #[async_trait]
    impl BotApi for FakeApi {
        async fn send_text(&self, chat_id: i64, text: &str) -> Result<SentMessage> {
            self.record(Call::Text {
                chat_id,
                text: text.to_string(),
            });
            self.sent("sendMessage")
        }

        async fn send_file(
            &self,
            chat_id: i64,
            kind: MediaKind,
            path: &Path,
            caption: &str,
        ) -> Result<SentMessage> {
            self.record(Call::File {
                chat_id,
                kind,
                path: path.to_path_buf(),
                caption: caption.to_string(),
            });
            self.sent(super::send_method(kind))
        }

        async fn get_file(&self, file_id: &str) -> Result<RemoteFile> {
            self.record(Call::GetFile(file_id.to_string()));
            self.files
                .get(file_id)
                .map(|path| RemoteFile {
                    path: path.clone(),
                    size: self.blobs.get(path).map(|b| b.len() as u64),
                })
                .ok_or_else(|| BotError::FileLookupFailed {
                    file_id: file_id.to_string(),
                    reason: "Bad Request: invalid file_id".to_string(),
                })
        }

        async fn download(&self, remote_path: &str) -> Result<Vec<u8>> {
            self.record(Call::Download(remote_path.to_string()));
            self.blobs
                .get(remote_path)
                .cloned()
                .ok_or_else(|| BotError::DownloadFailed {
                    file_id: remote_path.to_string(),
                    reason: "404 Not Found".to_string(),
                })
        }

        fn method_url(&self, method: &str) -> String {
            format!("https://api.test/bot<redacted>/{method}")
        }

        fn file_url(&self, remote_path: &str) -> String {
            format!("https://api.test/file/bot<redacted>/{remote_path}")
        }
    }
}
