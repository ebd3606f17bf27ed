/// Base URL (no trailing slash) + personal access token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerCredentials {
    pub base_url: String,
    pub token: String,
}

/// Account type filter for listing. Setup only ever offers asset accounts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountKind {
    Asset,
}

impl AccountKind {
    pub fn as_query(self) -> &'static str {
        match self {
            AccountKind::Asset => "asset",
        }
    }
}

/// One selectable account in the setup keyboard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountChoice {
    pub id: String,
    pub name: String,
}

/// A spend parsed from one chat message. Never persisted.
///
/// Account references are either numeric ids or account names; the ledger
/// adapter decides how to send each.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionRequest {
    pub amount: String,
    pub description: String,
    pub category: Option<String>,
    pub budget: Option<String>,
    pub source_account: Option<String>,
    pub destination_account: Option<String>,
}

/// Raw outcome of a create-transaction call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerResponse {
    pub status: u16,
    pub body: String,
}
