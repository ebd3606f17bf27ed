use async_trait::async_trait;

use crate::Result;

use super::types::*;

/// Ledger client interface used by the dialogue and the spend interpreter.
///
/// Credentials travel with every call: they live in the per-chat session, not
/// in the client.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn list_accounts(
        &self,
        creds: &LedgerCredentials,
        kind: AccountKind,
    ) -> Result<Vec<AccountChoice>>;

    /// Returns whatever status the ledger answered with; only transport failures
    /// are errors.
    async fn create_transaction(
        &self,
        creds: &LedgerCredentials,
        req: &TransactionRequest,
    ) -> Result<LedgerResponse>;

    async fn about_user(&self, creds: &LedgerCredentials) -> Result<String>;
}
