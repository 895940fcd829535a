//! Government fund
//!
//! The singleton treasury that loan principal is drawn from and that ticket
//! rake, loan repayments and fines flow into. The balance has no floor.
//!
//! Multi-step operations open a [`FundTransaction`], stage their fund changes,
//! perform their ledger legs and only then `commit`. Dropping an uncommitted
//! transaction discards everything it staged, so a failed ledger leg never
//! leaves a dangling fund change behind.

use crate::core::clock::Clock;
use crate::types::{ensure_positive, EconomyError};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundEntryKind {
    Credit,
    Debit,
    /// Administrative override
    Set,
}

/// One row of the fund's audit log
#[derive(Debug, Clone, PartialEq)]
pub struct FundEntry {
    pub kind: FundEntryKind,
    pub amount: Decimal,
    pub reason: String,
    pub balance_after: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
struct FundState {
    balance: Decimal,
    entries: Vec<FundEntry>,
}

pub struct GovernmentFund {
    state: Mutex<FundState>,
    clock: Arc<dyn Clock>,
}

impl GovernmentFund {
    pub fn new(opening_balance: Decimal, clock: Arc<dyn Clock>) -> Self {
        GovernmentFund {
            state: Mutex::new(FundState {
                balance: opening_balance,
                entries: Vec::new(),
            }),
            clock,
        }
    }

    pub fn balance(&self) -> Decimal {
        self.state.lock().balance
    }

    /// Audit log, oldest first
    pub fn entries(&self) -> Vec<FundEntry> {
        self.state.lock().entries.clone()
    }

    /// Start a unit of work; the fund stays locked until it is committed or dropped
    pub fn begin(&self) -> FundTransaction<'_> {
        let guard = self.state.lock();
        let balance = guard.balance;
        FundTransaction {
            guard,
            balance,
            staged: Vec::new(),
            clock: self.clock.as_ref(),
        }
    }

    pub fn credit(&self, amount: Decimal, reason: &str) -> Result<Decimal, EconomyError> {
        let mut tx = self.begin();
        tx.credit(amount, reason)?;
        Ok(tx.commit())
    }

    pub fn debit(&self, amount: Decimal, reason: &str) -> Result<Decimal, EconomyError> {
        let mut tx = self.begin();
        tx.debit(amount, reason)?;
        Ok(tx.commit())
    }

    pub fn set_balance(&self, amount: Decimal, reason: &str) -> Decimal {
        let mut tx = self.begin();
        tx.set_balance(amount, reason);
        tx.commit()
    }
}

/// Staged fund changes holding the fund lock
pub struct FundTransaction<'a> {
    guard: MutexGuard<'a, FundState>,
    balance: Decimal,
    staged: Vec<FundEntry>,
    clock: &'a dyn Clock,
}

impl FundTransaction<'_> {
    /// Balance including everything staged so far
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn credit(&mut self, amount: Decimal, reason: &str) -> Result<(), EconomyError> {
        ensure_positive(amount, "fund credit")?;
        let next = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| EconomyError::arithmetic_overflow("fund credit"))?;
        self.stage(FundEntryKind::Credit, amount, reason, next);
        Ok(())
    }

    /// Debit without a floor; the fund may go negative
    pub fn debit(&mut self, amount: Decimal, reason: &str) -> Result<(), EconomyError> {
        ensure_positive(amount, "fund debit")?;
        let next = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| EconomyError::arithmetic_overflow("fund debit"))?;
        self.stage(FundEntryKind::Debit, amount, reason, next);
        Ok(())
    }

    pub fn set_balance(&mut self, amount: Decimal, reason: &str) {
        self.stage(FundEntryKind::Set, amount, reason, amount);
    }

    /// Apply the staged changes and release the fund; returns the new balance
    pub fn commit(mut self) -> Decimal {
        let balance = self.balance;
        self.guard.balance = balance;
        let staged = std::mem::take(&mut self.staged);
        for entry in &staged {
            tracing::info!(
                kind = ?entry.kind,
                amount = %entry.amount,
                balance = %entry.balance_after,
                reason = %entry.reason,
                "Government fund updated"
            );
        }
        self.guard.entries.extend(staged);
        balance
    }

    fn stage(
        &mut self,
        kind: FundEntryKind,
        amount: Decimal,
        reason: &str,
        balance_after: Decimal,
    ) {
        self.balance = balance_after;
        self.staged.push(FundEntry {
            kind,
            amount,
            reason: reason.to_string(),
            balance_after,
            timestamp: self.clock.now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use chrono::TimeZone;

    fn fund(opening: i64) -> GovernmentFund {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        ));
        GovernmentFund::new(Decimal::new(opening, 0), clock)
    }

    #[test]
    fn test_credit_and_debit_without_floor() {
        let fund = fund(1000);
        assert_eq!(
            fund.debit(Decimal::new(5500, 0), "Loan principal").unwrap(),
            Decimal::new(-4500, 0)
        );
        assert_eq!(
            fund.credit(Decimal::new(250, 0), "Lottery ticket").unwrap(),
            Decimal::new(-4250, 0)
        );

        let entries = fund.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, FundEntryKind::Debit);
        assert_eq!(entries[0].balance_after, Decimal::new(-4500, 0));
        assert_eq!(entries[1].reason, "Lottery ticket");
    }

    #[test]
    fn test_rejects_non_positive_amounts() {
        let fund = fund(0);
        assert!(matches!(
            fund.credit(Decimal::ZERO, "nothing"),
            Err(EconomyError::Validation { .. })
        ));
        assert!(fund.entries().is_empty());
    }

    #[test]
    fn test_dropped_transaction_discards_staged_changes() {
        let fund = fund(100);
        {
            let mut tx = fund.begin();
            tx.debit(Decimal::new(60, 0), "Loan principal").unwrap();
            tx.credit(Decimal::new(5, 0), "rake").unwrap();
            assert_eq!(tx.balance(), Decimal::new(45, 0));
        }
        assert_eq!(fund.balance(), Decimal::new(100, 0));
        assert!(fund.entries().is_empty());
    }

    #[test]
    fn test_set_balance_is_audited() {
        let fund = fund(100);
        assert_eq!(
            fund.set_balance(Decimal::new(75000, 0), "Budget reset"),
            Decimal::new(75000, 0)
        );
        let entries = fund.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, FundEntryKind::Set);
        assert_eq!(entries[0].balance_after, Decimal::new(75000, 0));
    }
}
