//! Account registry
//!
//! Creates accounts, allocates their unique 10-digit numbers and answers
//! lookups by number and by owner. Balances themselves live in the
//! [`LedgerStore`]; the registry only keeps the indexes that point into it.

use crate::core::clock::Clock;
use crate::core::ledger_store::LedgerStore;
use crate::core::numbers::NumberSource;
use crate::types::{Account, AccountId, AccountNumber, EconomyError, OwnerId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct AccountRegistry {
    ledger: Arc<LedgerStore>,
    numbers: Arc<dyn NumberSource>,
    clock: Arc<dyn Clock>,
    by_number: DashMap<AccountNumber, AccountId>,
    /// Personal account of each owner
    by_owner: DashMap<OwnerId, AccountId>,
    /// Salary account designations; may point at numbers that no longer resolve
    salary_accounts: DashMap<OwnerId, AccountNumber>,
    next_id: AtomicU64,
}

impl AccountRegistry {
    pub fn new(
        ledger: Arc<LedgerStore>,
        numbers: Arc<dyn NumberSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        AccountRegistry {
            ledger,
            numbers,
            clock,
            by_number: DashMap::new(),
            by_owner: DashMap::new(),
            salary_accounts: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new account for `owner`
    ///
    /// Does not check whether the owner already has one; the first account
    /// created stays the owner's personal account. Use
    /// [`AccountRegistry::open_for_owner`] for the one-account-per-owner flow.
    pub fn create_account(&self, owner: OwnerId) -> Result<Account, EconomyError> {
        let account = self.allocate(owner)?;
        self.by_owner.entry(owner).or_insert(account.id);
        Ok(account)
    }

    /// Return the owner's account, creating it on first visit
    ///
    /// The `bool` is `true` when the account was created by this call.
    pub fn open_for_owner(&self, owner: OwnerId) -> Result<(Account, bool), EconomyError> {
        match self.by_owner.entry(owner) {
            Entry::Occupied(entry) => {
                let id = *entry.get();
                drop(entry);
                let account = self
                    .ledger
                    .account(id)
                    .ok_or_else(|| EconomyError::account_not_found(id))?;
                Ok((account, false))
            }
            Entry::Vacant(slot) => {
                let account = self.allocate(owner)?;
                slot.insert(account.id);
                tracing::info!(
                    owner,
                    account = account.id,
                    number = %account.number,
                    "Opened account"
                );
                Ok((account, true))
            }
        }
    }

    pub fn lookup_by_number(&self, number: &AccountNumber) -> Option<Account> {
        let id = self.by_number.get(number).map(|entry| *entry.value())?;
        self.ledger.account(id)
    }

    pub fn account_id_of(&self, owner: OwnerId) -> Option<AccountId> {
        self.by_owner.get(&owner).map(|entry| *entry.value())
    }

    pub fn account_of(&self, owner: OwnerId) -> Option<Account> {
        self.account_id_of(owner).and_then(|id| self.ledger.account(id))
    }

    /// The owner's account, or `AccountNotFound` naming the owner
    pub fn require_account(&self, owner: OwnerId) -> Result<Account, EconomyError> {
        self.account_of(owner)
            .ok_or_else(|| EconomyError::owner_has_no_account(owner))
    }

    /// Route the owner's salary to `number`
    pub fn designate_salary_account(
        &self,
        owner: OwnerId,
        number: &AccountNumber,
    ) -> Result<(), EconomyError> {
        if !self.by_number.contains_key(number) {
            return Err(EconomyError::number_not_found(number));
        }
        self.salary_accounts.insert(owner, number.clone());
        tracing::info!(owner, number = %number, "Designated salary account");
        Ok(())
    }

    pub fn clear_salary_account(&self, owner: OwnerId) -> Option<AccountNumber> {
        self.salary_accounts.remove(&owner).map(|(_, number)| number)
    }

    /// Account a salary payment for `owner` should be credited to
    ///
    /// A designated salary account wins when it still resolves. A designation
    /// that no longer resolves yields `None` rather than silently paying the
    /// personal account; with no designation the personal account is used.
    pub fn salary_target(&self, owner: OwnerId) -> Option<AccountId> {
        let designated = self
            .salary_accounts
            .get(&owner)
            .map(|entry| entry.value().clone());
        match designated {
            Some(number) => self.by_number.get(&number).map(|entry| *entry.value()),
            None => self.account_id_of(owner),
        }
    }

    /// Cascade an owner's removal to their personal account
    pub fn remove_owner(&self, owner: OwnerId) -> Result<Account, EconomyError> {
        let (_, id) = self
            .by_owner
            .remove(&owner)
            .ok_or_else(|| EconomyError::owner_has_no_account(owner))?;
        self.salary_accounts.remove(&owner);
        let closed = self.ledger.close(id)?;
        self.by_number.remove(&closed.number);
        Ok(closed)
    }

    /// Draw numbers until an unused one comes up, then open the account
    fn allocate(&self, owner: OwnerId) -> Result<Account, EconomyError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        loop {
            let candidate = AccountNumber::parse(&self.numbers.digits(AccountNumber::WIDTH))?;
            match self.by_number.entry(candidate) {
                Entry::Occupied(taken) => {
                    tracing::debug!(
                        number = %taken.key(),
                        "Account number collision, drawing again"
                    );
                }
                Entry::Vacant(slot) => {
                    let account = Account::new(id, slot.key().clone(), owner, self.clock.now());
                    self.ledger.open(account.clone())?;
                    slot.insert(id);
                    return Ok(account);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::numbers::ScriptedDigits;
    use chrono::{TimeZone, Utc};
    use std::thread;

    fn registry(numbers: ScriptedDigits) -> AccountRegistry {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        ));
        let ledger = Arc::new(LedgerStore::new(Arc::clone(&clock)));
        AccountRegistry::new(ledger, Arc::new(numbers), clock)
    }

    fn number(digits: &str) -> AccountNumber {
        AccountNumber::parse(digits).unwrap()
    }

    #[test]
    fn test_collision_draws_again() {
        let registry = registry(ScriptedDigits::new(["1111111111", "1111111111", "2222222222"]));

        let first = registry.create_account(1).unwrap();
        let second = registry.create_account(2).unwrap();

        assert_eq!(first.number.as_str(), "1111111111");
        assert_eq!(second.number.as_str(), "2222222222");
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_lookup_by_number() {
        let registry = registry(ScriptedDigits::new(["0000000042"]));
        let account = registry.create_account(9).unwrap();

        let found = registry.lookup_by_number(&number("0000000042")).unwrap();
        assert_eq!(found.id, account.id);
        assert_eq!(found.owner, 9);
        assert!(registry.lookup_by_number(&number("0000000043")).is_none());
    }

    #[test]
    fn test_open_for_owner_is_idempotent() {
        let registry = registry(ScriptedDigits::new(["1000000000", "2000000000"]));

        let (first, created) = registry.open_for_owner(5).unwrap();
        assert!(created);
        let (again, created) = registry.open_for_owner(5).unwrap();
        assert!(!created);
        assert_eq!(first.id, again.id);
        assert!(registry.lookup_by_number(&number("2000000000")).is_none());
    }

    #[test]
    fn test_concurrent_first_visits_create_one_account() {
        let registry = Arc::new(registry(ScriptedDigits::new(Vec::<String>::new())));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.open_for_owner(77).unwrap().0.id)
            })
            .collect();
        let ids: Vec<AccountId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn test_salary_target_resolution() {
        let registry = registry(ScriptedDigits::new(["1000000001", "1000000002", "1000000003"]));
        let personal = registry.create_account(1).unwrap();
        let work = registry.create_account(2).unwrap();
        let other = registry.create_account(3).unwrap();

        assert_eq!(registry.salary_target(1), Some(personal.id));

        registry.designate_salary_account(1, &work.number).unwrap();
        assert_eq!(registry.salary_target(1), Some(work.id));

        registry.designate_salary_account(3, &work.number).unwrap();
        registry.remove_owner(2).unwrap();
        assert_eq!(registry.salary_target(1), None);
        assert_eq!(registry.salary_target(3), None);
        assert_eq!(registry.salary_target(4), None);

        registry.clear_salary_account(3);
        assert_eq!(registry.salary_target(3), Some(other.id));
    }

    #[test]
    fn test_designation_requires_known_number() {
        let registry = registry(ScriptedDigits::new(["1000000001"]));
        registry.create_account(1).unwrap();
        assert!(matches!(
            registry.designate_salary_account(1, &number("9999999999")),
            Err(EconomyError::AccountNotFound { .. })
        ));
    }
}
