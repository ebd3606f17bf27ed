//! Setup dialogue: ledger URL -> token (+ account listing) -> default account.
//!
//! Every transition is persisted before the reply goes out.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use crate::{
    domain::{ChatId, MessageRef},
    formatting::escape_html,
    ledger::{AccountChoice, AccountKind, LedgerClient, LedgerCredentials},
    messaging::{
        port::MessagingPort,
        types::{CallbackQuery, InlineButton, InlineKeyboard},
    },
    session::{ChatSession, ConversationState, SessionStore},
    Result,
};

pub const CANCELLED: &str = "Cancelled";
pub const SETUP_COMPLETE: &str = "Setup Complete. Happy Spending!(?)";
pub const CHOOSE_ACCOUNT: &str = "Please choose the default Source account:";
pub const USE_BUTTONS: &str =
    "Please choose the default Source account using the buttons above, or send /cancel to stop the setup.";
pub const SELECTION_EXPIRED: &str = "This selection is no longer active";
pub const INVALID_SELECTION: &str = "Invalid selection";

static ACCOUNT_ID_RE: OnceLock<Regex> = OnceLock::new();

fn is_account_id(data: &str) -> bool {
    ACCOUNT_ID_RE
        .get_or_init(|| Regex::new(r"^[0-9]+$").expect("valid regex"))
        .is_match(data)
}

/// Trim whitespace and every trailing `/`.
pub fn normalize_ledger_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

pub fn token_prompt(ledger_url: &str) -> String {
    format!(
        "Please enter your Firefly III User Token\n\nYou can generate it from the OAuth section here - {ledger_url}/profile"
    )
}

pub fn account_keyboard(accounts: &[AccountChoice]) -> InlineKeyboard {
    InlineKeyboard::new(
        accounts
            .iter()
            .map(|a| InlineButton {
                label: a.name.clone(),
                callback_data: a.id.clone(),
            })
            .collect(),
    )
}

#[derive(Clone)]
pub struct SetupDialogue {
    sessions: SessionStore,
    ledger: Arc<dyn LedgerClient>,
    messenger: Arc<dyn MessagingPort>,
}

impl SetupDialogue {
    pub fn new(
        sessions: SessionStore,
        ledger: Arc<dyn LedgerClient>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            sessions,
            ledger,
            messenger,
        }
    }

    /// `/start` from any state. Previously stored fields are kept until each
    /// step overwrites them.
    pub async fn start(&self, chat_id: ChatId) -> Result<()> {
        self.sessions.update(chat_id, |s| {
            s.state = ConversationState::AwaitingLedgerUrl;
        })?;
        self.messenger
            .send_text(
                chat_id,
                &format!(
                    "You are user {chat_id} and authorised.\nPlease enter your Firefly III URL"
                ),
            )
            .await?;
        Ok(())
    }

    /// `/cancel` from any state. The profile is left untouched.
    pub async fn cancel(&self, chat_id: ChatId) -> Result<()> {
        let before = self.sessions.get(chat_id)?.state;
        self.sessions.update(chat_id, |s| {
            s.state = ConversationState::Idle;
        })?;
        tracing::info!(chat_id = %chat_id, from = ?before, "setup cancelled");
        self.messenger.send_text(chat_id, CANCELLED).await?;
        Ok(())
    }

    /// Free text while `session.state.in_setup()`.
    pub async fn on_text(&self, chat_id: ChatId, session: &ChatSession, text: &str) -> Result<()> {
        match session.state {
            ConversationState::AwaitingLedgerUrl => self.receive_url(chat_id, text).await,
            ConversationState::AwaitingToken => self.receive_token(chat_id, session, text).await,
            ConversationState::AwaitingDefaultAccount => {
                self.messenger.send_text(chat_id, USE_BUTTONS).await?;
                Ok(())
            }
            ConversationState::Idle | ConversationState::Ready => Ok(()),
        }
    }

    async fn receive_url(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let url = normalize_ledger_url(text);
        if url.is_empty() {
            self.messenger
                .send_text(chat_id, "Please enter your Firefly III URL")
                .await?;
            return Ok(());
        }

        self.sessions.update(chat_id, |s| {
            s.profile.ledger_url = Some(url.clone());
            s.state = ConversationState::AwaitingToken;
        })?;
        self.messenger
            .send_text(chat_id, &token_prompt(&url))
            .await?;
        Ok(())
    }

    async fn receive_token(&self, chat_id: ChatId, session: &ChatSession, text: &str) -> Result<()> {
        let token = text.trim().to_string();
        let Some(base_url) = session.profile.ledger_url.clone() else {
            // URL step was never completed; restart it.
            return self.start(chat_id).await;
        };
        if token.is_empty() {
            self.messenger
                .send_text(chat_id, &token_prompt(&base_url))
                .await?;
            return Ok(());
        }

        let creds = LedgerCredentials {
            base_url,
            token: token.clone(),
        };
        let accounts = match self.ledger.list_accounts(&creds, AccountKind::Asset).await {
            Ok(accounts) => accounts,
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "listing accounts failed");
                self.messenger
                    .send_html(
                        chat_id,
                        &format!(
                            "Could not fetch accounts from <code>{}</code>:\n<code>{}</code>\n\nCheck the URL and token, then send the token again or /cancel.",
                            escape_html(&creds.base_url),
                            escape_html(&e.to_string())
                        ),
                    )
                    .await?;
                return Ok(());
            }
        };

        if accounts.is_empty() {
            self.messenger
                .send_text(
                    chat_id,
                    "No asset accounts found. Create one in Firefly III, then send the token again or /cancel.",
                )
                .await?;
            return Ok(());
        }

        self.sessions.update(chat_id, |s| {
            s.profile.auth_token = Some(token);
            s.state = ConversationState::AwaitingDefaultAccount;
        })?;
        self.messenger
            .send_inline_keyboard(chat_id, CHOOSE_ACCOUNT, account_keyboard(&accounts))
            .await?;
        Ok(())
    }

    /// Button press carrying an account id.
    pub async fn on_account_selected(&self, q: &CallbackQuery) -> Result<()> {
        let chat_id = q.chat_id;
        if !is_account_id(&q.data) {
            self.messenger
                .answer_callback_query(&q.callback_id, Some(INVALID_SELECTION))
                .await?;
            return Ok(());
        }

        if self.sessions.get(chat_id)?.state != ConversationState::AwaitingDefaultAccount {
            self.messenger
                .answer_callback_query(&q.callback_id, Some(SELECTION_EXPIRED))
                .await?;
            return Ok(());
        }

        self.sessions.update(chat_id, |s| {
            s.profile.default_account_id = Some(q.data.clone());
            s.state = ConversationState::Ready;
        })?;
        tracing::info!(chat_id = %chat_id, account_id = %q.data, "setup complete");

        // The button spinner must stop even if the confirmation fails.
        let confirmed = self.confirm_setup(chat_id, q.message).await;
        self.messenger
            .answer_callback_query(&q.callback_id, None)
            .await?;
        confirmed
    }

    /// Replace the keyboard message, or post a fresh one when Telegram no
    /// longer lets us edit it.
    async fn confirm_setup(&self, chat_id: ChatId, message: Option<MessageRef>) -> Result<()> {
        if let Some(msg) = message {
            match self.messenger.edit_html(msg, SETUP_COMPLETE).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(chat_id = %chat_id, error = %e, "editing keyboard message failed");
                }
            }
        }
        self.messenger.send_text(chat_id, SETUP_COMPLETE).await?;
        Ok(())
    }
}
