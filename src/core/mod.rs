//! Core business logic module
//!
//! This module contains the economy services:
//! - `ledger_store` - Balances and the append-only journal
//! - `account_registry` - Owner and account number resolution
//! - `government_fund` - Treasury balance with staged changes
//! - `loan_service` - Fixed-term loans and late penalties
//! - `savings_vault` - Time-locked deposits with interest
//! - `lottery_engine` - Daily draw, tickets and jackpot
//! - `payroll` - Department salary batches
//! - `engine` - Facade enforcing roles and ticks over the services
//! - `clock`, `numbers`, `traits` - Seams for time, randomness and identity

pub mod account_registry;
pub mod clock;
pub mod engine;
pub mod government_fund;
pub mod ledger_store;
pub mod loan_service;
pub mod lottery_engine;
pub mod numbers;
pub mod payroll;
pub mod savings_vault;
pub mod traits;

pub use account_registry::AccountRegistry;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{AccountLookup, EconomyEngine, TickReport, TransferReceipt};
pub use government_fund::{FundEntry, FundEntryKind, FundTransaction, GovernmentFund};
pub use ledger_store::{LedgerStore, Reconciliation};
pub use loan_service::LoanService;
pub use lottery_engine::LotteryEngine;
pub use numbers::{NumberSource, RandomDigits, ScriptedDigits};
pub use payroll::PayrollProcessor;
pub use savings_vault::SavingsVault;
pub use traits::{InMemoryDirectory, OwnerDirectory, OwnerIdentity};
