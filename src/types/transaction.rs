//! Transaction-related types
//!
//! A [`Transaction`] is an immutable journal row: once the ledger store has
//! appended it, nothing mutates or deletes it. A [`Movement`] is the request
//! the ledger store turns into a balance change plus its transaction.

use super::account::{AccountId, AccountNumber};
use super::error::EconomyError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;

/// Journal row identifier
pub type TransactionId = u64;

/// Whether a movement adds to or removes from a balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "credit",
            Direction::Debit => "debit",
        }
    }
}

/// Kinds of balance-affecting movements
///
/// Every kind except [`TransactionKind::ManualAdjustment`] has a fixed
/// direction; the ledger store rejects a movement whose sign disagrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    TransferIn,
    TransferOut,
    /// Cash paid in by an external service
    Deposit,
    /// Cash paid out by an external service
    Withdrawal,
    LoanReceived,
    LoanPayment,
    /// Late penalty on an overdue loan
    LoanFee,
    SavingsDeposit,
    /// Principal plus interest paid back from a matured deposit
    SavingsWithdrawal,
    LotteryTicket,
    LotteryWin,
    Salary,
    FinePayment,
    /// License or other government fee
    Purchase,
    /// Administrative correction in either direction
    ManualAdjustment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::LoanReceived => "loan_received",
            TransactionKind::LoanPayment => "loan_payment",
            TransactionKind::LoanFee => "loan_fee",
            TransactionKind::SavingsDeposit => "savings_deposit",
            TransactionKind::SavingsWithdrawal => "savings_withdrawal",
            TransactionKind::LotteryTicket => "lottery_ticket",
            TransactionKind::LotteryWin => "lottery_win",
            TransactionKind::Salary => "salary",
            TransactionKind::FinePayment => "fine_payment",
            TransactionKind::Purchase => "purchase",
            TransactionKind::ManualAdjustment => "manual_adjustment",
        }
    }

    /// The direction this kind always moves money, if it is fixed
    pub fn fixed_direction(&self) -> Option<Direction> {
        match self {
            TransactionKind::TransferIn
            | TransactionKind::Deposit
            | TransactionKind::LoanReceived
            | TransactionKind::SavingsWithdrawal
            | TransactionKind::LotteryWin
            | TransactionKind::Salary => Some(Direction::Credit),
            TransactionKind::TransferOut
            | TransactionKind::Withdrawal
            | TransactionKind::LoanPayment
            | TransactionKind::LoanFee
            | TransactionKind::SavingsDeposit
            | TransactionKind::LotteryTicket
            | TransactionKind::FinePayment
            | TransactionKind::Purchase => Some(Direction::Debit),
            TransactionKind::ManualAdjustment => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable journal row describing one balance change
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,

    /// Account whose balance changed
    pub account: AccountId,

    pub kind: TransactionKind,

    pub direction: Direction,

    /// Magnitude of the change, never negative
    pub amount: Decimal,

    /// Other side of a transfer, when there is one
    pub counterparty: Option<AccountNumber>,

    pub description: String,

    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Amount with the sign of its direction
    ///
    /// Summing this over an account's journal yields its balance.
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            Direction::Credit => self.amount,
            Direction::Debit => -self.amount,
        }
    }
}

/// Request to change one account's balance
///
/// `delta` is signed: positive credits, negative debits. When
/// `required_balance` is set, the ledger store refuses the movement with
/// `InsufficientFunds` unless the balance before the movement is at least that
/// much. Debits without a requirement may drive the balance negative (late
/// fees do).
#[derive(Debug, Clone, PartialEq)]
pub struct Movement {
    pub account: AccountId,
    pub delta: Decimal,
    pub kind: TransactionKind,
    pub description: String,
    pub counterparty: Option<AccountNumber>,
    pub required_balance: Option<Decimal>,
}

impl Movement {
    pub fn credit(
        account: AccountId,
        amount: Decimal,
        kind: TransactionKind,
        description: impl Into<String>,
    ) -> Self {
        Movement {
            account,
            delta: amount,
            kind,
            description: description.into(),
            counterparty: None,
            required_balance: None,
        }
    }

    /// Debit that never fails for lack of funds
    pub fn debit(
        account: AccountId,
        amount: Decimal,
        kind: TransactionKind,
        description: impl Into<String>,
    ) -> Self {
        Movement {
            account,
            delta: -amount,
            kind,
            description: description.into(),
            counterparty: None,
            required_balance: None,
        }
    }

    /// Debit that requires the balance to cover the amount
    pub fn covered_debit(
        account: AccountId,
        amount: Decimal,
        kind: TransactionKind,
        description: impl Into<String>,
    ) -> Self {
        Movement::debit(account, amount, kind, description).requiring(amount)
    }

    pub fn requiring(mut self, minimum_balance: Decimal) -> Self {
        self.required_balance = Some(minimum_balance);
        self
    }

    pub fn with_counterparty(mut self, counterparty: AccountNumber) -> Self {
        self.counterparty = Some(counterparty);
        self
    }

    pub fn direction(&self) -> Direction {
        if self.delta.is_sign_negative() && !self.delta.is_zero() {
            Direction::Debit
        } else {
            Direction::Credit
        }
    }

    /// Check the movement is well-formed before it touches any balance
    ///
    /// A zero delta is only accepted for manual adjustments (an administrative
    /// "set balance" to the current value still leaves an audit row).
    pub fn validate(&self) -> Result<(), EconomyError> {
        if self.delta.is_zero() {
            if self.kind == TransactionKind::ManualAdjustment {
                return Ok(());
            }
            return Err(EconomyError::validation(
                "movement amount",
                format!("{} movement of zero", self.kind),
            ));
        }

        if let Some(expected) = self.kind.fixed_direction() {
            if expected != self.direction() {
                return Err(EconomyError::validation(
                    "movement direction",
                    format!(
                        "{} must be a {}, got {}",
                        self.kind,
                        expected.as_str(),
                        self.direction().as_str()
                    ),
                ));
            }
        }

        if self.required_balance.is_some_and(|r| r.is_sign_negative()) {
            return Err(EconomyError::validation(
                "required balance",
                "must not be negative",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::credit(Direction::Credit, Decimal::new(300, 0))]
    #[case::debit(Direction::Debit, Decimal::new(-300, 0))]
    fn test_signed_amount(#[case] direction: Direction, #[case] expected: Decimal) {
        let tx = Transaction {
            id: 1,
            account: 1,
            kind: TransactionKind::ManualAdjustment,
            direction,
            amount: Decimal::new(300, 0),
            counterparty: None,
            description: String::new(),
            timestamp: Utc::now(),
        };
        assert_eq!(tx.signed_amount(), expected);
    }

    #[rstest]
    #[case::salary_credit(Movement::credit(1, Decimal::ONE, TransactionKind::Salary, "pay"), true)]
    #[case::salary_debit(Movement::debit(1, Decimal::ONE, TransactionKind::Salary, "pay"), false)]
    #[case::fee_debit(Movement::debit(1, Decimal::ONE, TransactionKind::LoanFee, "fee"), true)]
    #[case::fee_credit(Movement::credit(1, Decimal::ONE, TransactionKind::LoanFee, "fee"), false)]
    #[case::adjust_either(
        Movement::debit(1, Decimal::ONE, TransactionKind::ManualAdjustment, "fix"),
        true
    )]
    #[case::adjust_zero(
        Movement::credit(1, Decimal::ZERO, TransactionKind::ManualAdjustment, "set"),
        true
    )]
    #[case::transfer_zero(
        Movement::credit(1, Decimal::ZERO, TransactionKind::TransferIn, "t"),
        false
    )]
    fn test_movement_validation(#[case] movement: Movement, #[case] valid: bool) {
        assert_eq!(movement.validate().is_ok(), valid);
    }

    #[test]
    fn test_covered_debit_requires_amount() {
        let movement = Movement::covered_debit(
            4,
            Decimal::new(500, 0),
            TransactionKind::LotteryTicket,
            "ticket",
        );
        assert_eq!(movement.delta, Decimal::new(-500, 0));
        assert_eq!(movement.required_balance, Some(Decimal::new(500, 0)));
        assert_eq!(movement.direction(), Direction::Debit);
    }

    #[test]
    fn test_kind_names_are_snake_case() {
        assert_eq!(TransactionKind::SavingsWithdrawal.as_str(), "savings_withdrawal");
        assert_eq!(TransactionKind::LoanFee.to_string(), "loan_fee");
    }
}
