//! Loan types
//!
//! A loan moves `Active -> Paid` exactly once, or `Active -> Closed` when its
//! owner is removed. While Active it accrues late penalties past its due
//! date; after that it accrues nothing.

use super::account::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub type LoanId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanStatus {
    Active,
    Paid,
    /// Written off because the borrowing account was removed
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loan {
    pub id: LoanId,
    pub account: AccountId,

    /// Outstanding debt, principal plus fee plus any penalties, less repayments
    pub amount_due: Decimal,

    pub due_date: DateTime<Utc>,

    pub status: LoanStatus,

    /// When a penalty was last applied; `None` until the first one
    pub last_penalty_check: Option<DateTime<Utc>>,

    pub issued_at: DateTime<Utc>,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }
}

/// Late penalty applied by one accrual tick
#[derive(Debug, Clone, PartialEq)]
pub struct PenaltyCharge {
    pub loan: LoanId,
    pub account: AccountId,
    /// Whole billing intervals charged
    pub intervals: i64,
    pub amount: Decimal,
    pub amount_due: Decimal,
}

/// Result of a repayment
#[derive(Debug, Clone, PartialEq)]
pub struct Repayment {
    pub loan: LoanId,
    /// Amount actually debited; never more than what was owed
    pub paid: Decimal,
    pub remaining: Decimal,
    pub settled: bool,
}
