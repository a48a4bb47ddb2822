use std::path::Path;

use async_trait::async_trait;
use reqwest::Url;
use teloxide::net::Download;
use teloxide::payloads::setters::*;
use teloxide::requests::Requester;
use teloxide::types::{ChatId, FileId, InputFile};
use teloxide::{Bot, RequestError};
use tracing::debug;

use super::{BotApi, RemoteFile, SentMessage};
use crate::error::{BotError, Result};
use crate::update::MediaKind;

const REDACTED: &str = "<redacted>";

/// Production [`BotApi`] adapter backed by teloxide's `Bot`.
pub struct TelegramApi {
    bot: Bot,
    api_url: Url,
}

impl TelegramApi {
    pub fn new(token: &str, api_url: Url) -> Self {
        let bot = Bot::new(token).set_api_url(api_url.clone());
        Self { bot, api_url }
    }

    fn base(&self) -> &str {
        self.api_url.as_str().trim_end_matches('/')
    }
}

fn remote(method: &'static str, err: RequestError) -> BotError {
    BotError::RemoteApi {
        method,
        description: err.to_string(),
    }
}

#[async_trait]
impl BotApi for TelegramApi {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<SentMessage> {
        let message = self
            .bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| remote("sendMessage", e))?;
        Ok(SentMessage {
            message_id: message.id.0,
        })
    }

    async fn send_file(
        &self,
        chat_id: i64,
        kind: MediaKind,
        path: &Path,
        caption: &str,
    ) -> Result<SentMessage> {
        let chat = ChatId(chat_id);
        let file = InputFile::file(path.to_path_buf());
        let method = super::send_method(kind);

        debug!("Uploading {} via {}", path.display(), method);

        let message = match kind {
            MediaKind::Photo => self.bot.send_photo(chat, file).caption(caption).await,
            MediaKind::Video => self.bot.send_video(chat, file).caption(caption).await,
            MediaKind::Document => self.bot.send_document(chat, file).caption(caption).await,
            MediaKind::Audio => self.bot.send_audio(chat, file).caption(caption).await,
        }
        .map_err(|e| remote(method, e))?;

        Ok(SentMessage {
            message_id: message.id.0,
        })
    }

    async fn get_file(&self, file_id: &str) -> Result<RemoteFile> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| BotError::FileLookupFailed {
                file_id: file_id.to_string(),
                reason: e.to_string(),
            })?;

        if file.path.is_empty() {
            return Err(BotError::FileLookupFailed {
                file_id: file_id.to_string(),
                reason: "response carried no file_path".to_string(),
            });
        }

        Ok(RemoteFile {
            path: file.path,
            size: Some(u64::from(file.meta.size)),
        })
    }

    async fn download(&self, remote_path: &str) -> Result<Vec<u8>> {
        let mut bytes: Vec<u8> = Vec::new();
        self.bot
            .download_file(remote_path, &mut bytes)
            .await
            .map_err(|e| BotError::DownloadFailed {
                file_id: remote_path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(bytes)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base(), REDACTED, method)
    }

    fn file_url(&self, remote_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.base(), REDACTED, remote_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> TelegramApi {
        TelegramApi::new("123:SECRET", Url::parse(base).unwrap())
    }

    #[test]
    fn test_method_url_is_redacted() {
        let url = api("https://api.telegram.org").method_url("sendMessage");
        assert_eq!(url, "https://api.telegram.org/bot<redacted>/sendMessage");
        assert!(!url.contains("SECRET"));
    }

    #[test]
    fn test_file_url_uses_override() {
        let url = api("http://localhost:8081/").file_url("documents/file_3.pdf");
        assert_eq!(
            url,
            "http://localhost:8081/file/bot<redacted>/documents/file_3.pdf"
        );
    }
}
