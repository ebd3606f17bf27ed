//! Telegram update handlers.
//!
//! Each handler converts a teloxide update into a core `IncomingUpdate`,
//! serializes it per chat and hands it to the core router. Errors are logged
//! together with the update and never bubble up to the dispatcher.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use ffb_core::{domain::ChatId, messaging::types::IncomingUpdate};

use crate::router::AppState;

mod callback;
mod commands;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let Some(update) = callback::callback_update(&q) else {
        // Always answer callback query eventually.
        let _ = bot.answer_callback_query(q.id).await;
        return Ok(());
    };

    dispatch(&state, update).await;
    Ok(())
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let chat_id = ChatId(msg.chat.id.0);
    let Some(text) = msg.text() else {
        tracing::debug!(chat_id = %chat_id, "ignoring non-text message");
        return Ok(());
    };
    dispatch(&state, commands::text_update(chat_id, text)).await;
    Ok(())
}

async fn dispatch(state: &AppState, update: IncomingUpdate) {
    // One update per chat at a time: the core does no locking of its own.
    let _guard = state.chat_locks.lock_chat(update.chat_id().0).await;

    if let Err(e) = state.bot.handle(update.clone()).await {
        tracing::warn!(update = ?update, error = %e, "update caused error");
    }
}
