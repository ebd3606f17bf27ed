//! Core domain + application logic for the Firefly III Telegram bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the Firefly III
//! HTTP API live behind ports (traits) implemented in adapter crates.

pub mod bot;
pub mod config;
pub mod dialogue;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod ledger;
pub mod logging;
pub mod messaging;
pub mod security;
pub mod session;
pub mod spend;

pub use errors::{Error, Result};
