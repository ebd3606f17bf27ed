//! Ledger port (Firefly III today).

pub mod client;
pub mod types;

pub use client::LedgerClient;
pub use types::{AccountChoice, AccountKind, LedgerCredentials, LedgerResponse, TransactionRequest};
