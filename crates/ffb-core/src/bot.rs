use std::sync::Arc;

use crate::{
    dialogue::SetupDialogue,
    domain::ChatId,
    formatting::pre,
    ledger::LedgerClient,
    messaging::{
        port::MessagingPort,
        types::{Command, IncomingUpdate},
    },
    security::{rejection_message, Access, AccessGuard},
    session::SessionStore,
    spend::{is_spend_message, SpendInterpreter, GENERIC_FAILURE, SETUP_PROMPT},
    Result,
};

const HELP_HTML: &str = "All you need to do is send a message to the bot with the following format -
<code>Amount, Description, Category, Budget, Source account, Destination account</code>

Only the first two values are needed. The rest are optional. The description value is used for destination account as well.

A simple one -
        <code>5, Starbucks</code>

One with all the fields being used -
        <code>5, Mocha with an extra shot for Steve, Coffee, Food Budget, UCO Bank, Starbucks</code>

You can skip specific fields by leaving them empty (except the first two) -
        <code>5, Starbucks, , Food Budget, UCO Bank</code>";

/// Routes updates through the access guard into the dialogue, the spend
/// interpreter or the read-only commands.
pub struct LedgerBot {
    guard: Arc<AccessGuard>,
    sessions: SessionStore,
    ledger: Arc<dyn LedgerClient>,
    messenger: Arc<dyn MessagingPort>,
    dialogue: SetupDialogue,
    spend: SpendInterpreter,
}

impl LedgerBot {
    pub fn new(
        guard: Arc<AccessGuard>,
        sessions: SessionStore,
        ledger: Arc<dyn LedgerClient>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        let dialogue = SetupDialogue::new(sessions.clone(), ledger.clone(), messenger.clone());
        let spend = SpendInterpreter::new(sessions.clone(), ledger.clone(), messenger.clone());
        Self {
            guard,
            sessions,
            ledger,
            messenger,
            dialogue,
            spend,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn handle(&self, update: IncomingUpdate) -> Result<()> {
        if !self.authorize(&update).await? {
            return Ok(());
        }

        match update {
            IncomingUpdate::Command(cmd) => self.handle_command(cmd).await,
            IncomingUpdate::Text(msg) => self.handle_text(msg.chat_id, &msg.text).await,
            IncomingUpdate::Callback(q) => self.dialogue.on_account_selected(&q).await,
        }
    }

    /// Policy step in front of every handler. Rejections are answered here.
    async fn authorize(&self, update: &IncomingUpdate) -> Result<bool> {
        let chat_id = update.chat_id();
        let authorized = match self.guard.authorize(chat_id).await? {
            Access::Granted => return Ok(true),
            Access::Denied { authorized } => authorized,
        };

        tracing::info!(chat_id = %chat_id, "rejected unauthorized chat");
        if let IncomingUpdate::Callback(q) = update {
            self.messenger
                .answer_callback_query(&q.callback_id, Some("Unauthorized"))
                .await?;
        }
        self.messenger
            .send_text(chat_id, &rejection_message(chat_id, authorized))
            .await?;
        Ok(false)
    }

    async fn handle_command(&self, cmd: Command) -> Result<()> {
        match cmd.name.as_str() {
            "start" => self.dialogue.start(cmd.chat_id).await,
            "cancel" => self.dialogue.cancel(cmd.chat_id).await,
            "help" => self.help(cmd.chat_id).await,
            "about" => self.about(cmd.chat_id).await,
            other => {
                tracing::debug!(command = other, "unknown command");
                self.messenger
                    .send_text(cmd.chat_id, "Unknown command. Try /help")
                    .await?;
                Ok(())
            }
        }
    }

    async fn handle_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let session = self.sessions.get(chat_id)?;
        if session.state.in_setup() {
            return self.dialogue.on_text(chat_id, &session, text).await;
        }
        if is_spend_message(text) {
            return self.spend.handle(chat_id, text).await;
        }
        tracing::debug!(chat_id = %chat_id, "ignoring free text");
        Ok(())
    }

    async fn help(&self, chat_id: ChatId) -> Result<()> {
        let profile = self.sessions.get(chat_id)?.profile;
        if profile.default_account_id.is_none() {
            self.messenger.send_text(chat_id, SETUP_PROMPT).await?;
        } else {
            self.messenger.send_html(chat_id, HELP_HTML).await?;
        }
        Ok(())
    }

    async fn about(&self, chat_id: ChatId) -> Result<()> {
        let Some(creds) = self.sessions.get(chat_id)?.profile.credentials() else {
            self.messenger.send_text(chat_id, SETUP_PROMPT).await?;
            return Ok(());
        };

        match self.ledger.about_user(&creds).await {
            Ok(about) => {
                self.messenger.send_html(chat_id, &pre(&about)).await?;
            }
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "about request failed");
                self.messenger.send_text(chat_id, GENERIC_FAILURE).await?;
            }
        }
        Ok(())
    }
}
