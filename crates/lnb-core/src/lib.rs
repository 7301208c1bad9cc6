//! Core domain + application logic for the Lightning node Telegram bot.
//!
//! This crate is framework-agnostic. Telegram, the LND REST gateway and the market
//! data API live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod host;
pub mod logging;
pub mod messaging;
pub mod monitor;
pub mod node;
pub mod outbox;
pub mod ports;
pub mod reports;
pub mod security;
pub mod supervisor;

#[cfg(test)]
mod fakes;

pub use errors::{Error, ErrorKind, Result};
