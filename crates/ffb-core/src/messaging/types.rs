use crate::domain::{ChatId, MessageRef};

/// Transport-neutral incoming update.
///
/// Telegram-specific fields stay in the Telegram adapter.
#[derive(Clone, Debug)]
pub enum IncomingUpdate {
    Command(Command),
    Text(TextMessage),
    Callback(CallbackQuery),
}

impl IncomingUpdate {
    pub fn chat_id(&self) -> ChatId {
        match self {
            IncomingUpdate::Command(c) => c.chat_id,
            IncomingUpdate::Text(t) => t.chat_id,
            IncomingUpdate::Callback(q) => q.chat_id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Command {
    pub chat_id: ChatId,
    /// Lowercased command name without the leading `/` or `@botname` suffix.
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub chat_id: ChatId,
    pub callback_id: String,
    pub data: String,
    /// The message carrying the keyboard, when Telegram still has it.
    pub message: Option<MessageRef>,
}

/// Inline keyboard (buttons) rendered one button per row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    pub fn new(buttons: Vec<InlineButton>) -> Self {
        Self { buttons }
    }
}
