//! Civic Ledger
//!
//! # Overview
//!
//! The economy engine of a role-play community: citizen bank accounts,
//! transfers, loans with late penalties, time-locked savings, a daily
//! lottery, department payroll and the government treasury. Every balance
//! change is one journal row written in the same unit of work as the
//! balance update.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (accounts, journal rows, loans, tickets, ...)
//! - [`config`] - Economy policy loaded from TOML
//! - [`core`] - Business logic:
//!   - [`core::ledger_store`] - Balances and the append-only journal
//!   - [`core::account_registry`] - Account numbers and owners
//!   - [`core::government_fund`] - Treasury balance
//!   - [`core::loan_service`], [`core::savings_vault`], [`core::lottery_engine`],
//!     [`core::payroll`] - The financial products
//!   - [`core::engine`] - Facade checking roles and running ticks
//! - [`io`] - Script replay, CSV output and notification delivery
//! - [`cli`] - CLI arguments parsing
//!
//! # Time
//!
//! Nothing runs in the background. Late penalties accrue when the borrower's
//! account is next touched and the lottery draws when the first request of a
//! new day arrives. Both read the [`core::clock::Clock`] given to the engine.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod types;

pub use config::EconomyConfig;
pub use core::{EconomyEngine, LedgerStore};
pub use io::{write_accounts_csv, Replay, ReplaySummary};
pub use types::{
    Account, AccountId, AccountNumber, EconomyError, Movement, OwnerId, Principal, Role,
    Transaction, TransactionKind,
};
