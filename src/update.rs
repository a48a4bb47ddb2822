use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{BotError, Result};

/// The four media kinds the bot both receives and sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Document,
    Photo,
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Document => "document",
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    /// Upper-case label used in event log messages, e.g. `PHOTO SAVED TO STORAGE`.
    pub fn label(self) -> String {
        self.as_str().to_uppercase()
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub file_id: String,
    pub file_unique_id: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub file_unique_id: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
    #[serde(default, alias = "thumb", deserialize_with = "lenient")]
    pub thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub file_unique_id: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub file_id: String,
    pub file_unique_id: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration: Option<u32>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
    #[serde(default, alias = "thumb", deserialize_with = "lenient")]
    pub thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audio {
    pub file_id: String,
    pub file_unique_id: Option<String>,
    pub duration: Option<u32>,
    pub performer: Option<String>,
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
    #[serde(default, alias = "thumb", deserialize_with = "lenient")]
    pub thumbnail: Option<Thumbnail>,
}

/// Media attached to a message. Only `file_id` is needed to fetch the bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Attachment {
    Document(Document),
    Photo(PhotoSize),
    Video(Video),
    Audio(Audio),
}

impl Attachment {
    pub fn kind(&self) -> MediaKind {
        match self {
            Attachment::Document(_) => MediaKind::Document,
            Attachment::Photo(_) => MediaKind::Photo,
            Attachment::Video(_) => MediaKind::Video,
            Attachment::Audio(_) => MediaKind::Audio,
        }
    }

    pub fn file_id(&self) -> &str {
        match self {
            Attachment::Document(d) => &d.file_id,
            Attachment::Photo(p) => &p.file_id,
            Attachment::Video(v) => &v.file_id,
            Attachment::Audio(a) => &a.file_id,
        }
    }

    pub fn file_unique_id(&self) -> Option<&str> {
        match self {
            Attachment::Document(d) => d.file_unique_id.as_deref(),
            Attachment::Photo(p) => p.file_unique_id.as_deref(),
            Attachment::Video(v) => v.file_unique_id.as_deref(),
            Attachment::Audio(a) => a.file_unique_id.as_deref(),
        }
    }

    /// Original file name as declared by the sender, if the media type carries one.
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Attachment::Document(d) => d.file_name.as_deref(),
            Attachment::Audio(a) => a.file_name.as_deref(),
            Attachment::Photo(_) | Attachment::Video(_) => None,
        }
    }

    /// Pretty-printed metadata sent back to the chat after archiving.
    pub fn metadata_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Serialize)]
struct Tagged<'a, T: Serialize> {
    #[serde(flatten)]
    inner: &'a T,
    #[serde(rename = "type")]
    kind: MediaKind,
}

impl Serialize for Attachment {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let kind = self.kind();
        match self {
            Attachment::Document(inner) => Tagged { inner, kind }.serialize(serializer),
            Attachment::Photo(inner) => Tagged { inner, kind }.serialize(serializer),
            Attachment::Video(inner) => Tagged { inner, kind }.serialize(serializer),
            Attachment::Audio(inner) => Tagged { inner, kind }.serialize(serializer),
        }
    }
}

/// A message normalized out of an update.
#[derive(Debug, Clone)]
pub struct Message {
    pub message_id: Option<i64>,
    pub chat_id: i64,
    pub user_id: Option<i64>,
    /// `text`, or the media `caption` when there is no text.
    pub text: Option<String>,
    pub attachment: Option<Attachment>,
    /// The `message` object exactly as received, for the event log.
    pub raw: Value,
}

/// One inbound update. `message` is `None` for update types the bot ignores.
#[derive(Debug, Clone)]
pub struct Update {
    pub update_id: Option<i64>,
    pub message: Option<Message>,
    pub raw: Value,
}

#[derive(Deserialize)]
struct RawUpdate {
    #[serde(default, deserialize_with = "lenient")]
    update_id: Option<i64>,
    #[serde(default)]
    message: Option<Value>,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default, deserialize_with = "lenient")]
    message_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    chat: Option<RawPeer>,
    #[serde(default, deserialize_with = "lenient")]
    from: Option<RawPeer>,
    #[serde(default, deserialize_with = "lenient")]
    text: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    caption: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    document: Option<Document>,
    #[serde(default, deserialize_with = "lenient_seq")]
    photo: Vec<PhotoSize>,
    #[serde(default, deserialize_with = "lenient")]
    video: Option<Video>,
    #[serde(default, deserialize_with = "lenient")]
    audio: Option<Audio>,
}

#[derive(Deserialize)]
struct RawPeer {
    id: i64,
}

/// Absent, null and wrongly shaped values all become `None`.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Like [`lenient`], but keeps the well-formed elements of a sequence.
fn lenient_seq<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let items = match value {
        Some(Value::Array(items)) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// Parse a raw webhook body into an [`Update`].
///
/// Empty bodies, invalid JSON, non-object JSON, and messages without a
/// `chat.id` are reported as [`BotError::MalformedUpdate`].
pub fn parse_update(body: &str) -> Result<Update> {
    if body.trim().is_empty() {
        return Err(BotError::MalformedUpdate("empty body".to_string()));
    }

    let raw: Value =
        serde_json::from_str(body).map_err(|e| BotError::MalformedUpdate(e.to_string()))?;
    if !raw.is_object() {
        return Err(BotError::MalformedUpdate(
            "update is not a JSON object".to_string(),
        ));
    }

    let parsed: RawUpdate = serde_json::from_value(raw.clone())
        .map_err(|e| BotError::MalformedUpdate(e.to_string()))?;

    let message = match parsed.message {
        Some(Value::Null) | None => None,
        Some(value) => Some(parse_message(value)?),
    };

    Ok(Update {
        update_id: parsed.update_id,
        message,
        raw,
    })
}

fn parse_message(raw: Value) -> Result<Message> {
    let parsed: RawMessage = serde_json::from_value(raw.clone())
        .map_err(|e| BotError::MalformedUpdate(format!("invalid message: {e}")))?;

    let chat = parsed
        .chat
        .ok_or_else(|| BotError::MalformedUpdate("message without chat id".to_string()))?;

    // Telegram sends at most one of these per message.
    let attachment = parsed
        .document
        .map(Attachment::Document)
        .or_else(|| parsed.photo.into_iter().last().map(Attachment::Photo))
        .or_else(|| parsed.video.map(Attachment::Video))
        .or_else(|| parsed.audio.map(Attachment::Audio));

    Ok(Message {
        message_id: parsed.message_id,
        chat_id: chat.id,
        user_id: parsed.from.map(|u| u.id),
        text: parsed.text.or(parsed.caption),
        attachment,
        raw,
    })
}
