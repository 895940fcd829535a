//! Error types for the civic economy engine
//!
//! Every operation returns `Result<_, EconomyError>`. Business failures
//! (insufficient funds, a locked deposit, a payroll that was already approved)
//! are ordinary variants that callers render to the user; none of them leave
//! partial state behind.
//!
//! # Error Categories
//!
//! - **Lookup Errors**: unknown accounts, loans, deposits, payroll requests
//! - **Business Rule Errors**: insufficient funds, duplicate loans, locked savings,
//!   already-processed requests, self transfers, lost lottery draw races
//! - **Input Errors**: malformed amounts, ticket numbers, account numbers, empty batches
//! - **System Errors**: I/O, script parsing, configuration, storage failures

use super::account::AccountId;
use super::loan::LoanId;
use super::payroll::PayrollId;
use super::principal::OwnerId;
use super::savings::DepositId;
use super::AccountNumber;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// How an account was referenced when it could not be found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountRef {
    Id(AccountId),
    Number(AccountNumber),
    Owner(OwnerId),
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRef::Id(id) => write!(f, "id {}", id),
            AccountRef::Number(number) => write!(f, "number {}", number),
            AccountRef::Owner(owner) => write!(f, "owner {}", owner),
        }
    }
}

/// Why a savings withdrawal was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockReason {
    /// The lock window has not elapsed yet
    StillLocked { unlock_at: DateTime<Utc> },
    /// The deposit was already paid out
    AlreadyWithdrawn,
    /// The deposit was forfeited when its account was removed
    Closed,
    /// The deposit belongs to a different account than the caller's
    NotOwner,
    /// No deposit exists with that id
    Unknown,
}

impl fmt::Display for LockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockReason::StillLocked { unlock_at } => {
                write!(f, "locked until {}", unlock_at.format("%Y-%m-%d %H:%M UTC"))
            }
            LockReason::AlreadyWithdrawn => write!(f, "already withdrawn"),
            LockReason::Closed => write!(f, "closed with its account"),
            LockReason::NotOwner => write!(f, "deposit belongs to another account"),
            LockReason::Unknown => write!(f, "no such deposit"),
        }
    }
}

/// Main error type for the economy engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EconomyError {
    /// Referenced account does not exist
    #[error("Account not found ({reference})")]
    AccountNotFound { reference: AccountRef },

    /// Balance is lower than the amount the operation requires
    ///
    /// The operation is rejected and no balance changes.
    #[error(
        "Insufficient funds in account {account}: available {available}, requested {requested}"
    )]
    InsufficientFunds {
        account: AccountId,
        available: Decimal,
        requested: Decimal,
    },

    /// The account already carries an Active loan
    #[error("Account {account} already has an active loan")]
    DuplicateActiveLoan { account: AccountId },

    /// Repayment requested but nothing is owed
    #[error("Account {account} has no active loan")]
    NoActiveLoan { account: AccountId },

    #[error("Loan {loan} not found")]
    LoanNotFound { loan: LoanId },

    /// Savings deposit cannot be paid out
    #[error("Savings deposit {deposit} cannot be withdrawn: {reason}")]
    LockedSavings {
        deposit: DepositId,
        reason: LockReason,
    },

    /// Lottery ticket numbers are not exactly five decimal digits
    #[error("Invalid lottery ticket '{numbers}': expected exactly 5 digits")]
    InvalidTicketFormat { numbers: String },

    /// A one-shot workflow step was attempted twice
    #[error("{subject} has already been processed")]
    AlreadyProcessed { subject: String },

    #[error("Account {account} cannot transfer to itself")]
    SelfTransferNotAllowed { account: AccountId },

    /// Another caller holds the lottery draw; the caller may retry
    #[error("Lottery draw is being resolved by another request, retry shortly")]
    ConcurrentDrawConflict,

    /// Malformed amount, empty batch or otherwise invalid input
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Payroll request {request} not found")]
    PayrollNotFound { request: PayrollId },

    /// Principal lacks the role the operation requires
    #[error("Owner {owner} is not permitted to {action}")]
    Forbidden { owner: OwnerId, action: String },

    /// Balance arithmetic would leave the representable range
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow { operation: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    /// Script row could not be parsed
    #[error(
        "Script parse error{}: {message}",
        line.map(|l| format!(" at line {}", l)).unwrap_or_default()
    )]
    Parse { line: Option<u64>, message: String },

    /// Infrastructure failure; the unit of work was discarded
    #[error("System failure: {message}")]
    Storage { message: String },
}

impl From<std::io::Error> for EconomyError {
    fn from(error: std::io::Error) -> Self {
        EconomyError::Io {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for EconomyError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        EconomyError::Parse {
            line,
            message: error.to_string(),
        }
    }
}

impl From<toml::de::Error> for EconomyError {
    fn from(error: toml::de::Error) -> Self {
        EconomyError::InvalidConfig {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl EconomyError {
    pub fn account_not_found(account: AccountId) -> Self {
        EconomyError::AccountNotFound {
            reference: AccountRef::Id(account),
        }
    }

    pub fn number_not_found(number: &AccountNumber) -> Self {
        EconomyError::AccountNotFound {
            reference: AccountRef::Number(number.clone()),
        }
    }

    pub fn owner_has_no_account(owner: OwnerId) -> Self {
        EconomyError::AccountNotFound {
            reference: AccountRef::Owner(owner),
        }
    }

    pub fn insufficient_funds(account: AccountId, available: Decimal, requested: Decimal) -> Self {
        EconomyError::InsufficientFunds {
            account,
            available,
            requested,
        }
    }

    pub fn locked_savings(deposit: DepositId, reason: LockReason) -> Self {
        EconomyError::LockedSavings { deposit, reason }
    }

    pub fn already_processed(subject: impl Into<String>) -> Self {
        EconomyError::AlreadyProcessed {
            subject: subject.into(),
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        EconomyError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn forbidden(owner: OwnerId, action: &str) -> Self {
        EconomyError::Forbidden {
            owner,
            action: action.to_string(),
        }
    }

    pub fn arithmetic_overflow(operation: &str) -> Self {
        EconomyError::ArithmeticOverflow {
            operation: operation.to_string(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        EconomyError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether the failure is a caller-facing business outcome rather than a system fault
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            EconomyError::Io { .. }
                | EconomyError::Storage { .. }
                | EconomyError::InvalidConfig { .. }
        )
    }
}

/// Reject zero and negative amounts
pub fn ensure_positive(amount: Decimal, field: &str) -> Result<Decimal, EconomyError> {
    if amount <= Decimal::ZERO {
        return Err(EconomyError::validation(
            field,
            format!("must be greater than zero, got {}", amount),
        ));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case::account_not_found_by_id(
        EconomyError::account_not_found(7),
        "Account not found (id 7)"
    )]
    #[case::account_not_found_by_owner(
        EconomyError::owner_has_no_account(12),
        "Account not found (owner 12)"
    )]
    #[case::insufficient_funds(
        EconomyError::insufficient_funds(1, Decimal::new(5000, 2), Decimal::new(10000, 2)),
        "Insufficient funds in account 1: available 50.00, requested 100.00"
    )]
    #[case::duplicate_loan(
        EconomyError::DuplicateActiveLoan { account: 3 },
        "Account 3 already has an active loan"
    )]
    #[case::already_withdrawn(
        EconomyError::locked_savings(9, LockReason::AlreadyWithdrawn),
        "Savings deposit 9 cannot be withdrawn: already withdrawn"
    )]
    #[case::invalid_ticket(
        EconomyError::InvalidTicketFormat { numbers: "12a45".to_string() },
        "Invalid lottery ticket '12a45': expected exactly 5 digits"
    )]
    #[case::already_processed(
        EconomyError::already_processed("Payroll request 4"),
        "Payroll request 4 has already been processed"
    )]
    #[case::self_transfer(
        EconomyError::SelfTransferNotAllowed { account: 2 },
        "Account 2 cannot transfer to itself"
    )]
    #[case::validation(
        EconomyError::validation("payroll items", "batch is empty"),
        "Invalid payroll items: batch is empty"
    )]
    #[case::forbidden(
        EconomyError::forbidden(5, "approve payroll"),
        "Owner 5 is not permitted to approve payroll"
    )]
    #[case::parse_error_with_line(
        EconomyError::Parse { line: Some(42), message: "unknown op".to_string() },
        "Script parse error at line 42: unknown op"
    )]
    #[case::parse_error_without_line(
        EconomyError::Parse { line: None, message: "unknown op".to_string() },
        "Script parse error: unknown op"
    )]
    fn test_error_display(#[case] error: EconomyError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_still_locked_message_names_unlock_time() {
        let unlock_at = Utc.with_ymd_and_hms(2025, 3, 31, 9, 30, 0).unwrap();
        let error = EconomyError::locked_savings(1, LockReason::StillLocked { unlock_at });
        assert_eq!(
            error.to_string(),
            "Savings deposit 1 cannot be withdrawn: locked until 2025-03-31 09:30 UTC"
        );
    }

    #[rstest]
    #[case::zero(Decimal::ZERO)]
    #[case::negative(Decimal::new(-1, 0))]
    fn test_ensure_positive_rejects(#[case] amount: Decimal) {
        assert!(matches!(
            ensure_positive(amount, "amount"),
            Err(EconomyError::Validation { .. })
        ));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(EconomyError::ConcurrentDrawConflict.is_recoverable());
        assert!(!EconomyError::Storage {
            message: "connection lost".to_string()
        }
        .is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: EconomyError = io_error.into();
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }
}
