use std::path::PathBuf;

use crate::update::{Attachment, MediaKind, Update};

/// Caption attached to every static asset the bot sends.
pub const ASSET_CAPTION: &str = "THIS IS CAPTION";

/// A demo file shipped with the bot and sent on a fixed keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticAsset {
    pub keyword: &'static str,
    pub file_name: &'static str,
    pub mime_type: &'static str,
    pub kind: MediaKind,
}

impl StaticAsset {
    /// Reply used when the asset is missing on disk, e.g. `Image file not found.`
    pub fn missing_text(&self) -> String {
        let mut chars = self.keyword.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        format!("{} file not found.", capitalized)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Reply(&'static str),
    SendAsset(StaticAsset),
}

/// One row of the command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub keyword: &'static str,
    pub reaction: Reaction,
}

pub const COMMANDS: &[Command] = &[
    Command {
        keyword: "hi",
        reaction: Reaction::Reply("hello"),
    },
    Command {
        keyword: "image",
        reaction: Reaction::SendAsset(StaticAsset {
            keyword: "image",
            file_name: "image.jpg",
            mime_type: "image/jpeg",
            kind: MediaKind::Photo,
        }),
    },
    Command {
        keyword: "video",
        reaction: Reaction::SendAsset(StaticAsset {
            keyword: "video",
            file_name: "video.mp4",
            mime_type: "video/mp4",
            kind: MediaKind::Video,
        }),
    },
    Command {
        keyword: "pdf",
        reaction: Reaction::SendAsset(StaticAsset {
            keyword: "pdf",
            file_name: "pdf.pdf",
            mime_type: "application/pdf",
            kind: MediaKind::Document,
        }),
    },
    Command {
        keyword: "sound",
        reaction: Reaction::SendAsset(StaticAsset {
            keyword: "sound",
            file_name: "sound.wav",
            mime_type: "audio/wav",
            kind: MediaKind::Audio,
        }),
    },
];

/// Case-insensitive, whole-text match against the command table.
pub fn find_command(text: &str) -> Option<&'static Command> {
    COMMANDS
        .iter()
        .find(|command| command.keyword.eq_ignore_ascii_case(text))
}

/// Resolves static assets under the configured assets directory.
#[derive(Debug, Clone)]
pub struct AssetCatalog {
    dir: PathBuf,
}

impl AssetCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_of(&self, asset: &StaticAsset) -> PathBuf {
        self.dir.join(asset.file_name)
    }
}

/// What the bot does in response to an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Reply {
        chat_id: i64,
        text: String,
    },
    SendAsset {
        chat_id: i64,
        asset: StaticAsset,
        path: PathBuf,
    },
    /// The asset is not provisioned; reply with [`StaticAsset::missing_text`] instead.
    MissingAsset {
        chat_id: i64,
        asset: StaticAsset,
        path: PathBuf,
    },
    /// Save the attachment to storage, then echo its metadata.
    Archive {
        chat_id: i64,
        attachment: Attachment,
    },
}

/// Map an update to the actions it triggers.
///
/// A text command and an attachment may both fire for one message; the
/// command's action always comes first. Updates without a message, and
/// messages matching nothing, yield no actions.
pub fn dispatch(update: &Update, assets: &AssetCatalog) -> Vec<Action> {
    let Some(message) = &update.message else {
        return Vec::new();
    };
    let chat_id = message.chat_id;
    let mut actions = Vec::new();

    if let Some(command) = message.text.as_deref().and_then(find_command) {
        actions.push(match command.reaction {
            Reaction::Reply(text) => Action::Reply {
                chat_id,
                text: text.to_string(),
            },
            Reaction::SendAsset(asset) => {
                let path = assets.path_of(&asset);
                if path.is_file() {
                    Action::SendAsset {
                        chat_id,
                        asset,
                        path,
                    }
                } else {
                    Action::MissingAsset {
                        chat_id,
                        asset,
                        path,
                    }
                }
            }
        });
    }

    if let Some(attachment) = &message.attachment {
        actions.push(Action::Archive {
            chat_id,
            attachment: attachment.clone(),
        });
    }

    actions
}
