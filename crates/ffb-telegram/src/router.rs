use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, error_handlers::LoggingErrorHandler, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};

use ffb_core::{
    bot::LedgerBot,
    config::Config,
    ledger::LedgerClient,
    messaging::port::MessagingPort,
    security::AccessGuard,
    session::{FileSessionBackend, SessionStore},
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub bot: Arc<LedgerBot>,
    pub chat_locks: Arc<ChatLocks>,
}

#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub async fn run_polling(cfg: Arc<Config>, ledger: Arc<dyn LedgerClient>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        tracing::info!(username = %me.username(), "ffb started");
    }
    tracing::info!(config_dir = %cfg.config_dir.display(), "using config dir");

    let guard = Arc::new(AccessGuard::load(cfg.principal_file.clone())?);
    match guard.principal().await {
        Some(principal) => tracing::info!(chat_id = %principal, "authorized user loaded"),
        None => tracing::info!("no authorized user yet; first chat to message the bot claims it"),
    }

    let sessions = SessionStore::new(Arc::new(FileSessionBackend::new(cfg.session_file.clone())));
    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));

    let state = Arc::new(AppState {
        bot: Arc::new(LedgerBot::new(guard, sessions, ledger, messenger)),
        chat_locks: Arc::new(ChatLocks::default()),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error from the update handler",
        ))
        .build()
        .dispatch()
        .await;

    Ok(())
}
