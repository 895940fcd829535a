//! Savings vault
//!
//! Time-locked deposits. The principal leaves the account on deposit and comes
//! back with interest once the lock window has elapsed. Interest is created,
//! not drawn from the government fund.

use crate::config::SavingsPolicy;
use crate::core::clock::Clock;
use crate::core::ledger_store::LedgerStore;
use crate::types::{
    ensure_positive, AccountId, DepositId, EconomyError, LockReason, Movement, SavingsDeposit,
    SavingsOverview, SavingsStatus, SavingsWithdrawal, TransactionKind,
};
use dashmap::DashMap;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct SavingsVault {
    ledger: Arc<LedgerStore>,
    clock: Arc<dyn Clock>,
    policy: SavingsPolicy,
    deposits: DashMap<DepositId, SavingsDeposit>,
    next_id: AtomicU64,
}

impl SavingsVault {
    pub fn new(ledger: Arc<LedgerStore>, clock: Arc<dyn Clock>, policy: SavingsPolicy) -> Self {
        SavingsVault {
            ledger,
            clock,
            policy,
            deposits: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Lock `amount` from the account
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The amount is not positive
    /// - The account does not exist or holds less than `amount`
    pub fn deposit(
        &self,
        account: AccountId,
        amount: Decimal,
    ) -> Result<SavingsDeposit, EconomyError> {
        ensure_positive(amount, "savings amount")?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tx = self.ledger.apply_movement(Movement::covered_debit(
            account,
            amount,
            TransactionKind::SavingsDeposit,
            format!("Savings deposit {}", id),
        ))?;

        let deposit = SavingsDeposit {
            id,
            account,
            principal: amount,
            deposit_date: tx.timestamp,
            status: SavingsStatus::Active,
            withdrawn_at: None,
        };
        self.deposits.insert(id, deposit.clone());

        tracing::info!(
            deposit = id,
            account,
            principal = %amount,
            unlock = %deposit.unlock_date(self.policy.lock()),
            "Locked savings"
        );
        Ok(deposit)
    }

    /// Pay out a matured deposit with interest
    ///
    /// # Errors
    ///
    /// `LockedSavings` with the matching [`LockReason`] when the deposit is
    /// unknown, belongs to another account, was already withdrawn or is still
    /// inside its lock window.
    pub fn withdraw(
        &self,
        account: AccountId,
        deposit_id: DepositId,
    ) -> Result<SavingsWithdrawal, EconomyError> {
        let mut deposit = self
            .deposits
            .get_mut(&deposit_id)
            .ok_or_else(|| EconomyError::locked_savings(deposit_id, LockReason::Unknown))?;

        if deposit.account != account {
            return Err(EconomyError::locked_savings(deposit_id, LockReason::NotOwner));
        }
        match deposit.status {
            SavingsStatus::Active => {}
            SavingsStatus::Withdrawn => {
                return Err(EconomyError::locked_savings(deposit_id, LockReason::AlreadyWithdrawn));
            }
            SavingsStatus::Closed => {
                return Err(EconomyError::locked_savings(deposit_id, LockReason::Closed));
            }
        }

        let now = self.clock.now();
        let lock = self.policy.lock();
        if !deposit.is_unlocked(lock, now) {
            return Err(EconomyError::locked_savings(
                deposit_id,
                LockReason::StillLocked {
                    unlock_at: deposit.unlock_date(lock),
                },
            ));
        }

        let payout = self.payout_for(deposit.principal)?;
        self.ledger.apply_movement(Movement::credit(
            account,
            payout,
            TransactionKind::SavingsWithdrawal,
            format!("Savings withdrawal {}", deposit_id),
        ))?;
        deposit.status = SavingsStatus::Withdrawn;
        deposit.withdrawn_at = Some(now);

        tracing::info!(deposit = deposit_id, account, payout = %payout, "Paid out savings");
        Ok(SavingsWithdrawal {
            deposit: deposit_id,
            account,
            principal: deposit.principal,
            payout,
        })
    }

    /// Active deposits of the account with their unlock state, oldest first
    pub fn overview(&self, account: AccountId) -> Vec<SavingsOverview> {
        let now = self.clock.now();
        let lock = self.policy.lock();
        let mut rows: Vec<SavingsOverview> = self
            .deposits
            .iter()
            .filter(|deposit| deposit.account == account && deposit.status == SavingsStatus::Active)
            .map(|deposit| SavingsOverview {
                deposit: deposit.id,
                principal: deposit.principal,
                unlock_date: deposit.unlock_date(lock),
                can_withdraw: deposit.is_unlocked(lock, now),
            })
            .collect();
        rows.sort_by_key(|row| row.deposit);
        rows
    }

    /// Sum of the principals still locked for the account
    pub fn locked_total(&self, account: AccountId) -> Decimal {
        self.deposits
            .iter()
            .filter(|deposit| deposit.account == account && deposit.status == SavingsStatus::Active)
            .map(|deposit| deposit.principal)
            .sum()
    }

    /// Forfeit every Active deposit of a removed account
    ///
    /// # Returns
    ///
    /// The ids of the deposits closed, in ascending order
    pub fn close_for_account(&self, account: AccountId) -> Vec<DepositId> {
        let mut closed: Vec<DepositId> = self
            .deposits
            .iter_mut()
            .filter(|deposit| deposit.account == account && deposit.status == SavingsStatus::Active)
            .map(|mut deposit| {
                deposit.status = SavingsStatus::Closed;
                deposit.id
            })
            .collect();
        closed.sort_unstable();

        if !closed.is_empty() {
            tracing::info!(account, deposits = closed.len(), "Closed savings of removed account");
        }
        closed
    }

    pub fn deposit_record(&self, id: DepositId) -> Option<SavingsDeposit> {
        self.deposits.get(&id).map(|deposit| deposit.value().clone())
    }

    fn payout_for(&self, principal: Decimal) -> Result<Decimal, EconomyError> {
        let factor = Decimal::ONE + self.policy.interest_rate;
        principal
            .checked_mul(factor)
            .map(|payout| payout.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
            .ok_or_else(|| EconomyError::arithmetic_overflow("savings interest"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::types::{Account, AccountNumber};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rstest::rstest;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap()
    }

    fn vault() -> (Arc<ManualClock>, Arc<LedgerStore>, SavingsVault) {
        vault_with(SavingsPolicy::default())
    }

    fn vault_with(policy: SavingsPolicy) -> (Arc<ManualClock>, Arc<LedgerStore>, SavingsVault) {
        let clock = Arc::new(ManualClock::new(start()));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let ledger = Arc::new(LedgerStore::new(Arc::clone(&dyn_clock)));
        for id in [1, 2] {
            let number = AccountNumber::parse(&format!("{:010}", id)).unwrap();
            ledger.open(Account::new(id, number, id as u32, start())).unwrap();
            ledger
                .apply_movement(Movement::credit(
                    id,
                    Decimal::new(2000, 0),
                    TransactionKind::Deposit,
                    "cash",
                ))
                .unwrap();
        }
        let vault = SavingsVault::new(Arc::clone(&ledger), dyn_clock, policy);
        (clock, ledger, vault)
    }

    #[test]
    fn test_matured_withdrawal_pays_interest_once() {
        let (clock, ledger, vault) = vault();
        let deposit = vault.deposit(1, Decimal::new(1000, 0)).unwrap();
        assert_eq!(ledger.balance(1).unwrap(), Decimal::new(1000, 0));
        assert_eq!(vault.locked_total(1), Decimal::new(1000, 0));

        clock.advance(Duration::days(30));
        let withdrawal = vault.withdraw(1, deposit.id).unwrap();
        assert_eq!(withdrawal.payout, Decimal::new(104000, 2));
        assert_eq!(ledger.balance(1).unwrap(), Decimal::new(2040, 0));
        assert_eq!(vault.deposit_record(deposit.id).unwrap().status, SavingsStatus::Withdrawn);
        assert_eq!(vault.locked_total(1), Decimal::ZERO);

        assert_eq!(
            vault.withdraw(1, deposit.id).unwrap_err(),
            EconomyError::locked_savings(deposit.id, LockReason::AlreadyWithdrawn)
        );
        assert_eq!(ledger.balance(1).unwrap(), Decimal::new(2040, 0));
    }

    #[rstest]
    #[case::one_second_early(Duration::days(30) - Duration::seconds(1), false)]
    #[case::exact_boundary(Duration::days(30), true)]
    #[case::long_after(Duration::days(45), true)]
    fn test_unlock_boundary(#[case] elapsed: Duration, #[case] allowed: bool) {
        let (clock, _ledger, vault) = vault();
        let deposit = vault.deposit(1, Decimal::new(500, 0)).unwrap();

        clock.set(start() + elapsed);
        let result = vault.withdraw(1, deposit.id);
        assert_eq!(result.is_ok(), allowed);
        if !allowed {
            assert!(matches!(
                result,
                Err(EconomyError::LockedSavings {
                    reason: LockReason::StillLocked { .. },
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_unrepresentable_lock_stays_locked() {
        let (clock, ledger, vault) = vault_with(SavingsPolicy {
            lock_days: 1_000_000_000_000,
            ..SavingsPolicy::default()
        });
        let deposit = vault.deposit(1, Decimal::new(500, 0)).unwrap();
        clock.advance(Duration::days(36_500));

        assert_eq!(
            vault.withdraw(1, deposit.id).unwrap_err(),
            EconomyError::locked_savings(
                deposit.id,
                LockReason::StillLocked {
                    unlock_at: DateTime::<Utc>::MAX_UTC,
                },
            )
        );
        assert!(!vault.overview(1)[0].can_withdraw);
        assert_eq!(ledger.balance(1).unwrap(), Decimal::new(1500, 0));
    }

    #[test]
    fn test_close_for_account_forfeits_active_deposits() {
        let (clock, ledger, vault) = vault();
        let matured = vault.deposit(1, Decimal::new(100, 0)).unwrap();
        clock.advance(Duration::days(30));
        vault.withdraw(1, matured.id).unwrap();
        let first = vault.deposit(1, Decimal::new(200, 0)).unwrap();
        let second = vault.deposit(1, Decimal::new(300, 0)).unwrap();
        let other = vault.deposit(2, Decimal::new(400, 0)).unwrap();

        assert_eq!(vault.close_for_account(1), vec![first.id, second.id]);
        assert_eq!(vault.deposit_record(matured.id).unwrap().status, SavingsStatus::Withdrawn);
        assert_eq!(vault.deposit_record(first.id).unwrap().status, SavingsStatus::Closed);
        assert_eq!(vault.locked_total(1), Decimal::ZERO);
        assert!(vault.overview(1).is_empty());
        assert_eq!(vault.locked_total(2), other.principal);

        clock.advance(Duration::days(30));
        assert_eq!(
            vault.withdraw(1, first.id).unwrap_err(),
            EconomyError::locked_savings(first.id, LockReason::Closed)
        );
        assert_eq!(ledger.balance(1).unwrap(), Decimal::new(1504, 0));
    }

    #[test]
    fn test_withdraw_other_accounts_deposit() {
        let (clock, ledger, vault) = vault();
        let deposit = vault.deposit(1, Decimal::new(500, 0)).unwrap();
        clock.advance(Duration::days(31));

        assert_eq!(
            vault.withdraw(2, deposit.id).unwrap_err(),
            EconomyError::locked_savings(deposit.id, LockReason::NotOwner)
        );
        assert_eq!(
            vault.withdraw(1, 99).unwrap_err(),
            EconomyError::locked_savings(99, LockReason::Unknown)
        );
        assert_eq!(ledger.balance(2).unwrap(), Decimal::new(2000, 0));
    }

    #[test]
    fn test_deposit_requires_funds() {
        let (_clock, ledger, vault) = vault();
        assert!(matches!(
            vault.deposit(1, Decimal::new(2001, 0)),
            Err(EconomyError::InsufficientFunds { .. })
        ));
        assert_eq!(ledger.balance(1).unwrap(), Decimal::new(2000, 0));
        assert!(vault.overview(1).is_empty());
    }

    #[test]
    fn test_overview_lists_active_deposits() {
        let (clock, _ledger, vault) = vault();
        let first = vault.deposit(1, Decimal::new(100, 0)).unwrap();
        clock.advance(Duration::days(10));
        vault.deposit(1, Decimal::new(200, 0)).unwrap();
        clock.advance(Duration::days(20));

        let rows = vault.overview(1);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].deposit, first.id);
        assert!(rows[0].can_withdraw);
        assert!(!rows[1].can_withdraw);
        assert_eq!(rows[1].unlock_date, start() + Duration::days(40));
    }
}
