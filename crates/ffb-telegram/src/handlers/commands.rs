use ffb_core::{
    domain::ChatId,
    messaging::types::{Command, IncomingUpdate, TextMessage},
};

/// Command name of `/cmd@botname arg1 ...`. None of the commands take arguments.
pub(crate) fn parse_command(text: &str) -> String {
    let first = text.split_whitespace().next().unwrap_or("");

    first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Map a chat text into a command or a plain text update.
pub(crate) fn text_update(chat_id: ChatId, text: &str) -> IncomingUpdate {
    if text.starts_with('/') {
        return IncomingUpdate::Command(Command {
            chat_id,
            name: parse_command(text),
        });
    }

    IncomingUpdate::Text(TextMessage {
        chat_id,
        text: text.to_string(),
    })
}
