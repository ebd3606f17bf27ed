//! One-line spend commands: `amount, description[, category, budget, source, destination]`.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Deserialize;

use crate::{
    domain::ChatId,
    formatting::link,
    ledger::{LedgerClient, LedgerResponse, TransactionRequest},
    messaging::port::MessagingPort,
    session::SessionStore,
    Result,
};

pub const USAGE_HINT: &str =
    "Just type in an expense with a description. Like this - '5 Starbucks`";
pub const SETUP_PROMPT: &str = "Type /start to initiate the setup process.";
pub const CHECK_INPUT: &str = "Please check input values";
pub const GENERIC_FAILURE: &str = "Something went wrong, check logs";

static SPEND_RE: OnceLock<Regex> = OnceLock::new();

/// Spend messages are recognised by a leading digit.
pub fn is_spend_message(text: &str) -> bool {
    SPEND_RE
        .get_or_init(|| Regex::new(r"^[0-9]+").expect("valid regex"))
        .is_match(text)
}

/// Split a message into a transaction request.
///
/// Commas win over spaces as the separator. Returns `None` when fewer than
/// two fields are present; empty optional fields count as absent.
pub fn parse_spend(text: &str) -> Option<TransactionRequest> {
    let fields: Vec<&str> = if text.contains(',') {
        text.split(',').map(str::trim).collect()
    } else {
        text.split(' ').map(str::trim).collect()
    };

    if fields.len() < 2 {
        return None;
    }

    let optional = |idx: usize| {
        fields
            .get(idx)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    };

    Some(TransactionRequest {
        amount: fields[0].to_string(),
        description: fields[1].to_string(),
        category: optional(2),
        budget: optional(3),
        source_account: optional(4),
        destination_account: optional(5),
    })
}

/// What a create-transaction response means for the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpendOutcome {
    Logged { id: String },
    Rejected { message: String },
    Malformed,
    Failed,
}

#[derive(Deserialize)]
struct CreatedEnvelope {
    data: CreatedData,
}

#[derive(Deserialize)]
struct CreatedData {
    id: IdValue,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdValue {
    Text(String),
    Number(u64),
}

#[derive(Deserialize)]
struct ValidationEnvelope {
    message: Option<String>,
}

pub fn classify_response(resp: &LedgerResponse) -> SpendOutcome {
    match resp.status {
        422 => match serde_json::from_str::<ValidationEnvelope>(&resp.body) {
            Ok(ValidationEnvelope {
                message: Some(message),
            }) if !message.trim().is_empty() => SpendOutcome::Rejected { message },
            _ => SpendOutcome::Malformed,
        },
        200 => match serde_json::from_str::<CreatedEnvelope>(&resp.body) {
            Ok(env) => {
                let id = match env.data.id {
                    IdValue::Text(s) => s,
                    IdValue::Number(n) => n.to_string(),
                };
                if id.is_empty() {
                    SpendOutcome::Malformed
                } else {
                    SpendOutcome::Logged { id }
                }
            }
            Err(_) => SpendOutcome::Malformed,
        },
        _ => SpendOutcome::Failed,
    }
}

pub fn transaction_link(ledger_url: &str, id: &str) -> String {
    link(
        &format!("{ledger_url}/transactions/show/{id}"),
        "Expense logged successfully",
    )
}

/// Turns spend messages into ledger transactions for a configured chat.
#[derive(Clone)]
pub struct SpendInterpreter {
    sessions: SessionStore,
    ledger: Arc<dyn LedgerClient>,
    messenger: Arc<dyn MessagingPort>,
}

impl SpendInterpreter {
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

    pub async fn handle(&self, chat_id: ChatId, text: &str) -> Result<()> {
        let Some(mut req) = parse_spend(text) else {
            self.messenger.send_text(chat_id, USAGE_HINT).await?;
            return Ok(());
        };

        let profile = self.sessions.get(chat_id)?.profile;
        let (Some(creds), Some(default_account)) =
            (profile.credentials(), profile.default_account_id.clone())
        else {
            self.messenger.send_text(chat_id, SETUP_PROMPT).await?;
            return Ok(());
        };

        if req.source_account.is_none() {
            req.source_account = Some(default_account);
        }

        let resp = match self.ledger.create_transaction(&creds, &req).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "create transaction request failed");
                self.messenger.send_text(chat_id, GENERIC_FAILURE).await?;
                return Ok(());
            }
        };

        match classify_response(&resp) {
            SpendOutcome::Logged { id } => {
                tracing::info!(chat_id = %chat_id, transaction_id = %id, "expense logged");
                self.messenger
                    .send_html(chat_id, &transaction_link(&creds.base_url, &id))
                    .await?;
            }
            SpendOutcome::Rejected { message } => {
                self.messenger.send_text(chat_id, &message).await?;
            }
            SpendOutcome::Malformed => {
                self.messenger.send_text(chat_id, CHECK_INPUT).await?;
            }
            SpendOutcome::Failed => {
                tracing::warn!(
                    chat_id = %chat_id,
                    status = resp.status,
                    body = %resp.body,
                    "unexpected ledger response"
                );
                self.messenger.send_text(chat_id, GENERIC_FAILURE).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(status: u16, body: &str) -> LedgerResponse {
        LedgerResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn comma_form_maps_amount_and_description() {
        assert_eq!(
            parse_spend("5, Starbucks"),
            Some(TransactionRequest {
                amount: "5".to_string(),
                description: "Starbucks".to_string(),
                ..Default::default()
            })
        );
    }

    #[test]
    fn space_form_splits_on_single_space() {
        assert_eq!(parse_spend("5 Starbucks"), parse_spend("5, Starbucks"));
        // Only the second word is the description in space form.
        let req = parse_spend("5 Coffee Food").unwrap();
        assert_eq!(req.description, "Coffee");
        assert_eq!(req.category.as_deref(), Some("Food"));
    }

    #[test]
    fn single_field_is_not_a_spend() {
        assert_eq!(parse_spend("5"), None);
        // A trailing separator still yields two (empty) fields.
        assert_eq!(parse_spend("5,").map(|r| r.description), Some(String::new()));
    }

    #[test]
    fn all_positions_are_mapped_and_trimmed() {
        let req = parse_spend(
            "5, Mocha with an extra shot for Steve , Coffee, Food Budget, UCO Bank, Starbucks",
        )
        .unwrap();
        assert_eq!(req.amount, "5");
        assert_eq!(req.description, "Mocha with an extra shot for Steve");
        assert_eq!(req.category.as_deref(), Some("Coffee"));
        assert_eq!(req.budget.as_deref(), Some("Food Budget"));
        assert_eq!(req.source_account.as_deref(), Some("UCO Bank"));
        assert_eq!(req.destination_account.as_deref(), Some("Starbucks"));
    }

    #[test]
    fn skipped_fields_are_absent() {
        let req = parse_spend("5, Starbucks, , Food Budget, UCO Bank").unwrap();
        assert_eq!(req.category, None);
        assert_eq!(req.budget.as_deref(), Some("Food Budget"));
        assert_eq!(req.source_account.as_deref(), Some("UCO Bank"));
        assert_eq!(req.destination_account, None);
    }

    #[test]
    fn spend_trigger_needs_leading_digit() {
        assert!(is_spend_message("5 Starbucks"));
        assert!(is_spend_message("12.50, Lunch"));
        assert!(!is_spend_message("Starbucks 5"));
        assert!(!is_spend_message(" 5 Starbucks"));
        assert!(!is_spend_message(""));
    }

    #[test]
    fn created_transaction_yields_id() {
        let out = classify_response(&resp(200, r#"{"data":{"type":"transactions","id":"812"}}"#));
        assert_eq!(out, SpendOutcome::Logged { id: "812".to_string() });

        let out = classify_response(&resp(200, r#"{"data":{"id":9}}"#));
        assert_eq!(out, SpendOutcome::Logged { id: "9".to_string() });
    }

    #[test]
    fn success_with_wrong_shape_is_malformed() {
        assert_eq!(classify_response(&resp(200, "<html>")), SpendOutcome::Malformed);
        assert_eq!(classify_response(&resp(200, r#"{"data":null}"#)), SpendOutcome::Malformed);
        assert_eq!(classify_response(&resp(200, r#"{"data":{"id":""}}"#)), SpendOutcome::Malformed);
    }

    #[test]
    fn validation_failure_echoes_server_message() {
        let out = classify_response(&resp(
            422,
            r#"{"message":"The given data was invalid.","errors":{"transactions.0.amount":["bad"]}}"#,
        ));
        assert_eq!(
            out,
            SpendOutcome::Rejected {
                message: "The given data was invalid.".to_string()
            }
        );
        assert_eq!(classify_response(&resp(422, "{}")), SpendOutcome::Malformed);
    }

    #[test]
    fn other_statuses_fail() {
        assert_eq!(classify_response(&resp(500, "oops")), SpendOutcome::Failed);
        assert_eq!(classify_response(&resp(401, r#"{"message":"Unauthenticated."}"#)), SpendOutcome::Failed);
    }

    #[test]
    fn link_points_at_transaction_page() {
        assert_eq!(
            transaction_link("https://ff.example", "812"),
            "<a href=\"https://ff.example/transactions/show/812\">Expense logged successfully</a>"
        );
    }
}
