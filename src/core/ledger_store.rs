//! Ledger store
//!
//! This module provides the `LedgerStore`, the single choke point for balance
//! changes. It keeps the current balance of every account together with the
//! append-only journal of transactions that explains it.
//!
//! The LedgerStore is responsible for:
//! - Opening accounts (always at a zero balance)
//! - Applying movements: each balance change appends exactly one transaction
//! - Composing multi-leg movements (transfers, payroll, lottery payouts) into
//!   one all-or-nothing unit
//! - Per-account locking in ascending id order, so opposite-direction
//!   transfers cannot deadlock
//! - Reconciling balances against the journal

use crate::core::clock::Clock;
use crate::types::{
    ensure_positive, Account, AccountId, AccountNumber, CardStyle, EconomyError, Movement,
    Transaction, TransactionKind,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Balance versus journal for one account
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub account: AccountId,
    pub balance: Decimal,
    /// Sum of the signed amounts of every journal row
    pub journal_sum: Decimal,
}

impl Reconciliation {
    pub fn is_balanced(&self) -> bool {
        self.balance == self.journal_sum
    }
}

/// Durable-style store of balances and their journal
///
/// Balances live in a `DashMap` keyed by account id; journals in a second map
/// with the same keys. Writers additionally hold the per-account mutexes from
/// `locks` for the whole stage-and-commit of a unit of work.
pub struct LedgerStore {
    accounts: DashMap<AccountId, Account>,
    journal: DashMap<AccountId, Vec<Transaction>>,
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
    next_tx: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl LedgerStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        LedgerStore {
            accounts: DashMap::new(),
            journal: DashMap::new(),
            locks: DashMap::new(),
            next_tx: AtomicU64::new(1),
            clock,
        }
    }

    /// Register a freshly created account
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The account does not start at a zero balance
    /// - An account with the same id already exists
    pub fn open(&self, account: Account) -> Result<(), EconomyError> {
        if !account.balance.is_zero() {
            return Err(EconomyError::validation(
                "opening balance",
                "accounts open at zero; fund them through a movement",
            ));
        }

        match self.accounts.entry(account.id) {
            Entry::Occupied(_) => Err(EconomyError::Storage {
                message: format!("account id {} already exists", account.id),
            }),
            Entry::Vacant(slot) => {
                self.journal.insert(account.id, Vec::new());
                slot.insert(account);
                Ok(())
            }
        }
    }

    /// Remove an account and its journal when its owner is removed
    pub fn close(&self, account: AccountId) -> Result<Account, EconomyError> {
        let closed = self.with_locked(&[account], || {
            let (_, closed) = self
                .accounts
                .remove(&account)
                .ok_or_else(|| EconomyError::account_not_found(account))?;
            self.journal.remove(&account);
            Ok::<_, EconomyError>(closed)
        })?;
        self.locks.remove(&account);
        tracing::info!(account, balance = %closed.balance, "Closed account");
        Ok(closed)
    }

    pub fn contains(&self, account: AccountId) -> bool {
        self.accounts.contains_key(&account)
    }

    /// Snapshot of an account
    pub fn account(&self, account: AccountId) -> Option<Account> {
        self.accounts.get(&account).map(|entry| entry.value().clone())
    }

    pub fn balance(&self, account: AccountId) -> Result<Decimal, EconomyError> {
        self.accounts
            .get(&account)
            .map(|entry| entry.balance)
            .ok_or_else(|| EconomyError::account_not_found(account))
    }

    pub fn number_of(&self, account: AccountId) -> Result<AccountNumber, EconomyError> {
        self.accounts
            .get(&account)
            .map(|entry| entry.number.clone())
            .ok_or_else(|| EconomyError::account_not_found(account))
    }

    /// All accounts sorted by id
    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by_key(|account| account.id);
        accounts
    }

    /// Journal of an account, oldest first
    pub fn transactions(&self, account: AccountId) -> Vec<Transaction> {
        self.journal
            .get(&account)
            .map(|rows| rows.value().clone())
            .unwrap_or_default()
    }

    /// Change the cosmetic card style; not a balance change, so no journal row
    pub fn set_card_style(&self, account: AccountId, style: CardStyle) -> Result<(), EconomyError> {
        let mut entry = self
            .accounts
            .get_mut(&account)
            .ok_or_else(|| EconomyError::account_not_found(account))?;
        entry.card_style = style;
        Ok(())
    }

    /// Apply one movement and append its transaction
    pub fn apply_movement(&self, movement: Movement) -> Result<Transaction, EconomyError> {
        let mut committed = self.apply_movements(vec![movement])?;
        committed.pop().ok_or_else(|| EconomyError::Storage {
            message: "movement produced no transaction".to_string(),
        })
    }

    /// Apply several movements as one unit
    ///
    /// Either every leg is applied and journaled, or none is. Legs may touch
    /// the same account more than once; later legs see the balance left by
    /// earlier ones.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Any leg is malformed (wrong direction for its kind, zero amount)
    /// - Any leg references an unknown account
    /// - Any leg's balance requirement is not met
    /// - Any balance would overflow
    pub fn apply_movements(&self, legs: Vec<Movement>) -> Result<Vec<Transaction>, EconomyError> {
        if legs.is_empty() {
            return Ok(Vec::new());
        }
        for leg in &legs {
            leg.validate()?;
        }

        let ids: Vec<AccountId> = legs.iter().map(|leg| leg.account).collect();
        self.with_locked(&ids, || self.commit_locked(legs))
    }

    /// Move funds between two accounts
    ///
    /// Descriptions name the counterparty's account number.
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<(Transaction, Transaction), EconomyError> {
        let from_number = self.number_of(from)?;
        let to_number = self.number_of(to)?;
        self.transfer_with_notes(
            from,
            to,
            amount,
            format!("Transfer to {}", to_number),
            format!("Transfer from {}", from_number),
        )
    }

    /// Move funds between two accounts with caller-supplied descriptions
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `from == to` (`SelfTransferNotAllowed`)
    /// - The amount is not positive
    /// - Either account does not exist
    /// - The source balance is below the amount
    pub fn transfer_with_notes(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        outgoing_note: String,
        incoming_note: String,
    ) -> Result<(Transaction, Transaction), EconomyError> {
        if from == to {
            return Err(EconomyError::SelfTransferNotAllowed { account: from });
        }
        ensure_positive(amount, "transfer amount")?;

        let from_number = self.number_of(from)?;
        let to_number = self.number_of(to)?;
        let legs = vec![
            Movement::covered_debit(from, amount, TransactionKind::TransferOut, outgoing_note)
                .with_counterparty(to_number),
            Movement::credit(to, amount, TransactionKind::TransferIn, incoming_note)
                .with_counterparty(from_number),
        ];

        let mut committed = self.apply_movements(legs)?.into_iter();
        match (committed.next(), committed.next()) {
            (Some(outgoing), Some(incoming)) => Ok((outgoing, incoming)),
            _ => Err(EconomyError::Storage {
                message: "transfer did not produce both legs".to_string(),
            }),
        }
    }

    /// Administrative override of a balance
    ///
    /// Always journals a manual adjustment for the difference, even when the
    /// difference is zero.
    pub fn set_balance(
        &self,
        account: AccountId,
        target: Decimal,
        description: impl Into<String>,
    ) -> Result<Transaction, EconomyError> {
        let description = description.into();
        let mut committed = self.with_locked(&[account], || {
            let current = self.balance(account)?;
            let delta = target
                .checked_sub(current)
                .ok_or_else(|| EconomyError::arithmetic_overflow("set balance"))?;
            self.commit_locked(vec![Movement {
                account,
                delta,
                kind: TransactionKind::ManualAdjustment,
                description,
                counterparty: None,
                required_balance: None,
            }])
        })?;
        committed.pop().ok_or_else(|| EconomyError::Storage {
            message: "balance override produced no transaction".to_string(),
        })
    }

    pub fn reconcile(&self, account: AccountId) -> Result<Reconciliation, EconomyError> {
        self.with_locked(&[account], || {
            let balance = self.balance(account)?;
            let journal_sum = self
                .journal
                .get(&account)
                .map(|rows| rows.iter().map(Transaction::signed_amount).sum())
                .unwrap_or(Decimal::ZERO);
            Ok(Reconciliation {
                account,
                balance,
                journal_sum,
            })
        })
    }

    pub fn reconcile_all(&self) -> Vec<Reconciliation> {
        let mut ids: Vec<AccountId> = self.accounts.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.reconcile(id).ok())
            .collect()
    }

    /// Run `f` while holding the mutexes of `ids`, acquired in ascending order
    fn with_locked<R>(&self, ids: &[AccountId], f: impl FnOnce() -> R) -> R {
        let mut ordered = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mutexes: Vec<Arc<Mutex<()>>> = ordered
            .iter()
            .map(|id| Arc::clone(self.locks.entry(*id).or_default().value()))
            .collect();
        let _guards: Vec<_> = mutexes.iter().map(|mutex| mutex.lock()).collect();

        f()
    }

    /// Stage and commit legs; the caller holds every touched account's mutex
    fn commit_locked(&self, legs: Vec<Movement>) -> Result<Vec<Transaction>, EconomyError> {
        // Nothing is written until every leg has been staged successfully.
        let mut staged: HashMap<AccountId, Decimal> = HashMap::new();
        for leg in &legs {
            let current = match staged.get(&leg.account) {
                Some(balance) => *balance,
                None => self.balance(leg.account)?,
            };

            if let Some(required) = leg.required_balance {
                if current < required {
                    return Err(EconomyError::insufficient_funds(leg.account, current, required));
                }
            }

            let next = current
                .checked_add(leg.delta)
                .ok_or_else(|| EconomyError::arithmetic_overflow(leg.kind.as_str()))?;
            staged.insert(leg.account, next);
        }

        let timestamp = self.clock.now();
        let committed: Vec<Transaction> = legs
            .into_iter()
            .map(|leg| Transaction {
                id: self.next_tx.fetch_add(1, Ordering::Relaxed),
                account: leg.account,
                kind: leg.kind,
                direction: leg.direction(),
                amount: leg.delta.abs(),
                counterparty: leg.counterparty,
                description: leg.description,
                timestamp,
            })
            .collect();

        for (account, balance) in staged {
            if let Some(mut entry) = self.accounts.get_mut(&account) {
                entry.balance = balance;
            }
        }
        for tx in &committed {
            self.journal.entry(tx.account).or_default().push(tx.clone());
            tracing::debug!(
                tx = tx.id,
                account = tx.account,
                kind = tx.kind.as_str(),
                amount = %tx.signed_amount(),
                "Journaled movement"
            );
        }

        Ok(committed)
    }
}
