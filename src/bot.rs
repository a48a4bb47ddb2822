use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::dispatch::{dispatch, Action, AssetCatalog, StaticAsset, ASSET_CAPTION};
use crate::eventlog::EventLog;
use crate::platform::{self, BotApi, SentMessage};
use crate::relay::{DownloadResult, FileRelay};
use crate::update::{parse_update, Attachment};

/// Everything needed to process one inbound update, start to finish.
pub struct UpdateHandler {
    api: Arc<dyn BotApi>,
    assets: AssetCatalog,
    relay: FileRelay,
    log: EventLog,
}

impl UpdateHandler {
    pub fn new(api: Arc<dyn BotApi>, config: &Config) -> Self {
        let log = EventLog::open(&config.storage.log_file);
        Self::from_parts(
            api,
            AssetCatalog::new(&config.assets.directory),
            &config.storage.directory,
            log,
        )
    }

    pub fn from_parts(
        api: Arc<dyn BotApi>,
        assets: AssetCatalog,
        storage_dir: &Path,
        log: EventLog,
    ) -> Self {
        let relay = FileRelay::new(api.clone(), storage_dir, log.clone());
        Self {
            api,
            assets,
            relay,
            log,
        }
    }

    /// Parse, dispatch and execute one webhook body.
    ///
    /// Never fails: malformed input is logged and dropped, and each action's
    /// failure is logged without stopping the ones after it.
    pub async fn handle_payload(&self, body: &str) {
        let update = match parse_update(body) {
            Ok(update) => update,
            Err(e) => {
                warn!("Discarding update: {}", e);
                self.log.record(&format!("INVALID UPDATE RECEIVED : {}", body));
                return;
            }
        };

        self.log.record_with("RAW UPDATE RECEIVED", &update.raw);

        let Some(message) = &update.message else {
            debug!("Update {:?} carries no message", update.update_id);
            return;
        };

        info!(
            "Message {:?} from user {:?} in chat {}: {:?}",
            message.message_id, message.user_id, message.chat_id, message.text
        );
        self.log.record_with("MESSAGE RECEIVED", &message.raw);

        let actions = dispatch(&update, &self.assets);
        if actions.is_empty() {
            self.log.record_with(
                "UNHANDLED MESSAGE",
                &json!({ "chat_id": message.chat_id, "text": message.text }),
            );
            return;
        }

        for action in &actions {
            self.execute(action).await;
        }
    }

    async fn execute(&self, action: &Action) {
        match action {
            Action::Reply { chat_id, text } => self.send_text(*chat_id, text).await,
            Action::SendAsset {
                chat_id,
                asset,
                path,
            } => self.send_asset(*chat_id, asset, path).await,
            Action::MissingAsset {
                chat_id,
                asset,
                path,
            } => {
                warn!("Static asset missing: {}", path.display());
                self.log.record(&format!(
                    "{} FILE NOT FOUND : {}",
                    asset.kind.label(),
                    path.display()
                ));
                self.send_text(*chat_id, &asset.missing_text()).await;
            }
            Action::Archive {
                chat_id,
                attachment,
            } => self.archive(*chat_id, attachment).await,
        }
    }

    async fn send_text(&self, chat_id: i64, text: &str) {
        let method = "sendMessage";
        self.log.record_with(
            &format!("SEND REQUEST TO BOT SERVER : {}", self.api.method_url(method)),
            &json!({ "chat_id": chat_id, "text": text }),
        );
        let result = self.api.send_text(chat_id, text).await;
        self.log_response(method, result);
    }

    async fn send_asset(&self, chat_id: i64, asset: &StaticAsset, path: &Path) {
        let method = platform::send_method(asset.kind);
        let file_param = platform::file_param(asset.kind);
        self.log.record_with(
            &format!("SEND REQUEST TO BOT SERVER : {}", self.api.method_url(method)),
            &json!({
                "chat_id": chat_id,
                "caption": ASSET_CAPTION,
                file_param: path.display().to_string(),
                "mime_type": asset.mime_type,
            }),
        );
        let result = self
            .api
            .send_file(chat_id, asset.kind, path, ASSET_CAPTION)
            .await;
        self.log_response(method, result);
    }

    async fn archive(&self, chat_id: i64, attachment: &Attachment) {
        let outcome = self.relay.relay(attachment).await;

        match attachment.metadata_json() {
            Ok(metadata) => self.send_text(chat_id, &metadata).await,
            Err(e) => error!("Failed to render attachment metadata: {}", e),
        }

        if let DownloadResult::Failed { reason } = outcome {
            let text = format!("Could not save {}: {}.", attachment.kind(), reason);
            self.send_text(chat_id, &text).await;
        }
    }

    fn log_response(&self, method: &str, result: crate::error::Result<SentMessage>) {
        match result {
            Ok(sent) => {
                debug!("{} succeeded, message_id {}", method, sent.message_id);
                self.log.record_with(
                    "RECEIVED RESPONSE FROM BOT SERVER",
                    &json!({ "ok": true, "method": method, "message_id": sent.message_id }),
                );
            }
            Err(e) => {
                error!("{} failed: {}", method, e);
                self.log.record_with(
                    &format!("REQUEST TO BOT SERVER FAILED : {}", method),
                    &json!({ "ok": false, "error": e.to_string() }),
                );
            }
        }
    }
}
