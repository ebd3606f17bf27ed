use teloxide::types::CallbackQuery as TgCallbackQuery;

use ffb_core::{
    domain::{ChatId, MessageId, MessageRef},
    messaging::types::{CallbackQuery, IncomingUpdate},
};

/// Convert a Telegram button press. Presses without data carry nothing to route.
pub(crate) fn callback_update(q: &TgCallbackQuery) -> Option<IncomingUpdate> {
    let data = q.data.clone().filter(|d| !d.is_empty())?;

    // Private chats share the user's id, so fall back to the sender when
    // Telegram no longer has the keyboard message.
    let chat_id = q
        .message
        .as_ref()
        .map(|m| ChatId(m.chat.id.0))
        .unwrap_or(ChatId(q.from.id.0 as i64));

    let message = q.message.as_ref().map(|m| MessageRef {
        chat_id: ChatId(m.chat.id.0),
        message_id: MessageId(m.id.0),
    });

    Some(IncomingUpdate::Callback(CallbackQuery {
        chat_id,
        callback_id: q.id.clone(),
        data,
        message,
    }))
}
