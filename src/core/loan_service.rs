//! Loan service
//!
//! Loans move `none -> Active -> Paid`. Issuance draws the principal from the
//! government fund; repayments flow back into it. Late penalties are charged
//! to the borrower's account and vanish from the economy.
//!
//! Check-then-act steps are serialized per account through the `active` index:
//! issuance and repayment hold the account's entry for the whole operation,
//! penalty accrual holds the loan row.

use crate::config::LoanPolicy;
use crate::core::clock::Clock;
use crate::core::government_fund::GovernmentFund;
use crate::core::ledger_store::LedgerStore;
use crate::types::{
    ensure_positive, AccountId, EconomyError, Loan, LoanId, LoanStatus, Movement, PenaltyCharge,
    Repayment, TransactionKind,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct LoanService {
    ledger: Arc<LedgerStore>,
    fund: Arc<GovernmentFund>,
    clock: Arc<dyn Clock>,
    policy: LoanPolicy,
    loans: DashMap<LoanId, Loan>,
    /// The one Active loan of each account
    active: DashMap<AccountId, LoanId>,
    next_id: AtomicU64,
}

impl LoanService {
    pub fn new(
        ledger: Arc<LedgerStore>,
        fund: Arc<GovernmentFund>,
        clock: Arc<dyn Clock>,
        policy: LoanPolicy,
    ) -> Self {
        LoanService {
            ledger,
            fund,
            clock,
            policy,
            loans: DashMap::new(),
            active: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Issue the standard loan to an account
    ///
    /// # Arguments
    ///
    /// * `account` - Borrowing account
    ///
    /// # Returns
    ///
    /// The new Active loan, owing the policy's `amount_due` at `now + term`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The account does not exist
    /// - The account already has an Active loan (nothing changes)
    pub fn issue_loan(&self, account: AccountId) -> Result<Loan, EconomyError> {
        if !self.ledger.contains(account) {
            return Err(EconomyError::account_not_found(account));
        }

        match self.active.entry(account) {
            Entry::Occupied(_) => Err(EconomyError::DuplicateActiveLoan { account }),
            Entry::Vacant(slot) => {
                let now = self.clock.now();
                let due_date = self
                    .policy
                    .term()
                    .and_then(|term| now.checked_add_signed(term))
                    .ok_or_else(|| EconomyError::arithmetic_overflow("loan due date"))?;
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);

                let mut fund = self.fund.begin();
                fund.debit(self.policy.principal, &format!("Loan {} principal", id))?;
                self.ledger.apply_movement(Movement::credit(
                    account,
                    self.policy.principal,
                    TransactionKind::LoanReceived,
                    format!("Loan {} disbursement", id),
                ))?;
                fund.commit();

                let loan = Loan {
                    id,
                    account,
                    amount_due: self.policy.amount_due,
                    due_date,
                    status: LoanStatus::Active,
                    last_penalty_check: None,
                    issued_at: now,
                };
                self.loans.insert(id, loan.clone());
                slot.insert(id);

                tracing::info!(
                    loan = id,
                    account,
                    principal = %self.policy.principal,
                    amount_due = %loan.amount_due,
                    due = %loan.due_date,
                    "Issued loan"
                );
                Ok(loan)
            }
        }
    }

    /// Charge late penalties owed by the account's Active loan, if any
    ///
    /// Charges `amount_due * rate * intervals` for every whole billing
    /// interval elapsed since the last check (or the due date), then moves
    /// the check to now. Calling it again within the same interval charges
    /// nothing.
    ///
    /// # Returns
    ///
    /// The charge applied, or `None` when nothing was due
    pub fn accrue_penalty(
        &self,
        account: AccountId,
    ) -> Result<Option<PenaltyCharge>, EconomyError> {
        let loan_id = match self.active.get(&account) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        let mut loan = match self.loans.get_mut(&loan_id) {
            Some(loan) => loan,
            None => return Ok(None),
        };
        if !loan.is_active() {
            return Ok(None);
        }

        let now = self.clock.now();
        if now <= loan.due_date {
            return Ok(None);
        }

        let baseline = loan.last_penalty_check.unwrap_or(loan.due_date);
        let elapsed_days = (now - baseline).num_days();
        let intervals = elapsed_days / self.policy.penalty_interval_days;
        if intervals < 1 {
            tracing::debug!(loan = loan_id, elapsed_days, "No penalty interval elapsed");
            return Ok(None);
        }

        let penalty = loan
            .amount_due
            .checked_mul(self.policy.penalty_rate)
            .and_then(|per_interval| per_interval.checked_mul(Decimal::from(intervals)))
            .ok_or_else(|| EconomyError::arithmetic_overflow("loan penalty"))?
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let amount_due = loan
            .amount_due
            .checked_add(penalty)
            .ok_or_else(|| EconomyError::arithmetic_overflow("loan penalty"))?;

        if !penalty.is_zero() {
            self.ledger.apply_movement(Movement::debit(
                account,
                penalty,
                TransactionKind::LoanFee,
                format!(
                    "Late fee on loan {} ({} x {} days)",
                    loan_id, intervals, self.policy.penalty_interval_days
                ),
            ))?;
        }
        loan.amount_due = amount_due;
        loan.last_penalty_check = Some(now);

        tracing::info!(
            loan = loan_id,
            account,
            intervals,
            penalty = %penalty,
            amount_due = %amount_due,
            "Charged late penalty"
        );
        Ok(Some(PenaltyCharge {
            loan: loan_id,
            account,
            intervals,
            amount: penalty,
            amount_due,
        }))
    }

    /// Pay down the account's Active loan
    ///
    /// Only `min(amount, amount_due)` is debited, but the account must hold at
    /// least the full requested `amount`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The amount is not positive
    /// - The account has no Active loan
    /// - The account balance is below `amount`
    pub fn repay_loan(
        &self,
        account: AccountId,
        amount: Decimal,
    ) -> Result<Repayment, EconomyError> {
        ensure_positive(amount, "repayment amount")?;

        let active = match self.active.entry(account) {
            Entry::Occupied(active) => active,
            Entry::Vacant(_) => return Err(EconomyError::NoActiveLoan { account }),
        };
        let loan_id = *active.get();
        let mut loan = self
            .loans
            .get_mut(&loan_id)
            .ok_or(EconomyError::LoanNotFound { loan: loan_id })?;

        let paid = amount.min(loan.amount_due);
        let mut fund = self.fund.begin();
        fund.credit(paid, &format!("Loan {} repayment", loan_id))?;
        self.ledger.apply_movement(
            Movement::debit(
                account,
                paid,
                TransactionKind::LoanPayment,
                format!("Loan {} repayment", loan_id),
            )
            .requiring(amount),
        )?;
        fund.commit();

        loan.amount_due -= paid;
        let remaining = loan.amount_due;
        let settled = remaining.is_zero();
        if settled {
            loan.status = LoanStatus::Paid;
            drop(loan);
            active.remove();
        }

        tracing::info!(
            loan = loan_id,
            account,
            paid = %paid,
            remaining = %remaining,
            settled,
            "Recorded loan repayment"
        );
        Ok(Repayment {
            loan: loan_id,
            paid,
            remaining,
            settled,
        })
    }

    /// Write off the account's Active loan once the account is gone
    ///
    /// The outstanding `amount_due` is kept on the Closed row; nothing moves
    /// through the fund or the ledger.
    pub fn close_for_account(&self, account: AccountId) -> Option<Loan> {
        let (_, loan_id) = self.active.remove(&account)?;
        let mut loan = self.loans.get_mut(&loan_id)?;
        loan.status = LoanStatus::Closed;

        tracing::info!(
            loan = loan_id,
            account,
            amount_due = %loan.amount_due,
            "Closed loan of removed account"
        );
        Some(loan.value().clone())
    }

    pub fn active_loan(&self, account: AccountId) -> Option<Loan> {
        let id = self.active.get(&account).map(|entry| *entry.value())?;
        self.loan(id)
    }

    pub fn loan(&self, id: LoanId) -> Option<Loan> {
        self.loans.get(&id).map(|loan| loan.value().clone())
    }

    /// Every loan ever issued to the account, oldest first
    pub fn loans_for(&self, account: AccountId) -> Vec<Loan> {
        let mut loans: Vec<Loan> = self
            .loans
            .iter()
            .filter(|loan| loan.account == account)
            .map(|loan| loan.value().clone())
            .collect();
        loans.sort_by_key(|loan| loan.id);
        loans
    }
}
