//! Script replay
//!
//! Drives an [`EconomyEngine`] from a CSV script. Time is taken from each
//! row, so a replay is reproducible: the engine runs on a manual clock that
//! is moved to the row's `at` before the row is applied. Rows that fail to
//! parse or are rejected by the engine are logged and skipped; the replay
//! then writes one summary row per account.

use crate::config::EconomyConfig;
use crate::core::clock::{Clock, ManualClock};
use crate::core::engine::EconomyEngine;
use crate::core::numbers::RandomDigits;
use crate::core::traits::{InMemoryDirectory, OwnerIdentity};
use crate::io::csv_format::{
    write_accounts_csv, write_journal_csv, AccountSummary, Action, ScriptCommand,
};
use crate::io::notify::Outbox;
use crate::io::script_reader::ScriptReader;
use crate::types::{EconomyError, OwnerId, Principal};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::io::{Read, Write};
use std::sync::Arc;

/// Counts reported once a replay finishes
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub rejected: usize,
    pub accounts: usize,
    pub fund_balance: Decimal,
}

struct Session {
    clock: Arc<ManualClock>,
    directory: Arc<InMemoryDirectory>,
    engine: EconomyEngine,
}

/// Replays script commands against a fresh economy
pub struct Replay {
    config: EconomyConfig,
    outbox: Outbox,
    session: Option<Session>,
    applied: usize,
    rejected: usize,
}

impl Replay {
    pub fn new(config: EconomyConfig, outbox: Outbox) -> Self {
        Replay {
            config,
            outbox,
            session: None,
            applied: 0,
            rejected: 0,
        }
    }

    /// The engine, once the first command has started the economy
    pub fn engine(&self) -> Option<&EconomyEngine> {
        self.session.as_ref().map(|session| &session.engine)
    }

    /// Apply every row of `reader`
    ///
    /// # Errors
    ///
    /// Only system failures abort the replay; business rejections are
    /// counted and logged.
    pub fn run<R: Read>(&mut self, reader: ScriptReader<R>) -> Result<(), EconomyError> {
        for row in reader {
            match row {
                Ok(command) => {
                    let op = format!("{:?}", command.action);
                    match self.apply(command) {
                        Ok(()) => self.applied += 1,
                        Err(error) if error.is_recoverable() => {
                            self.rejected += 1;
                            tracing::warn!(
                                command = %op,
                                error = %error,
                                "Rejected script command"
                            );
                        }
                        Err(error) => return Err(error),
                    }
                }
                Err(row_error) => {
                    self.rejected += 1;
                    tracing::warn!(
                        line = row_error.line,
                        error = %row_error.message,
                        "Skipping malformed script row"
                    );
                }
            }
        }
        Ok(())
    }

    /// Apply one command at its own timestamp
    ///
    /// # Errors
    ///
    /// - `Validation` if the timestamp is earlier than the previous command's
    /// - Whatever the engine rejects the operation with
    pub fn apply(&mut self, command: ScriptCommand) -> Result<(), EconomyError> {
        let session = self.session_at(command.at)?;
        let now = session.clock.now();
        if command.at < now {
            return Err(EconomyError::validation(
                "timestamp",
                format!("{} is earlier than {}", command.at.to_rfc3339(), now.to_rfc3339()),
            ));
        }
        session.clock.set(command.at);
        session.dispatch(&command.principal, command.action)
    }

    /// Write the account summary and, if asked, the full journal
    pub fn finish(
        &self,
        output: &mut dyn Write,
        journal: Option<&mut dyn Write>,
    ) -> Result<ReplaySummary, EconomyError> {
        let engine = self.engine();
        let accounts = engine.map(|engine| engine.accounts()).unwrap_or_default();

        let summaries: Vec<AccountSummary> = match engine {
            Some(engine) => accounts
                .iter()
                .map(|account| {
                    let loan_due = engine
                        .loan_for(account.owner)
                        .map(|loan| loan.amount_due)
                        .unwrap_or(Decimal::ZERO);
                    AccountSummary::new(account, loan_due, engine.locked_savings_for(account.owner))
                })
                .collect(),
            None => Vec::new(),
        };
        write_accounts_csv(&summaries, output).map_err(|message| EconomyError::Io { message })?;

        if let Some(journal) = journal {
            let mut rows = Vec::new();
            if let Some(engine) = engine {
                for account in &accounts {
                    rows.extend(
                        engine
                            .ledger()
                            .transactions(account.id)
                            .into_iter()
                            .map(|tx| (account.owner, tx)),
                    );
                }
            }
            rows.sort_by_key(|(_, tx)| tx.id);
            write_journal_csv(&rows, journal).map_err(|message| EconomyError::Io { message })?;
        }

        let summary = ReplaySummary {
            applied: self.applied,
            rejected: self.rejected,
            accounts: accounts.len(),
            fund_balance: engine
                .map(|engine| engine.fund_balance())
                .unwrap_or(self.config.fund.opening_balance),
        };
        if let Some(engine) = engine {
            for row in engine.reconcile() {
                tracing::error!(
                    account = row.account,
                    balance = %row.balance,
                    journal = %row.journal_sum,
                    "Replay left an unbalanced account"
                );
            }
        }
        tracing::info!(
            applied = summary.applied,
            rejected = summary.rejected,
            accounts = summary.accounts,
            fund_balance = %summary.fund_balance,
            "Replay finished"
        );
        Ok(summary)
    }

    fn session_at(&mut self, start: DateTime<Utc>) -> Result<&Session, EconomyError> {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                let clock = Arc::new(ManualClock::new(start));
                let directory = Arc::new(InMemoryDirectory::new());
                let engine = EconomyEngine::new(
                    self.config.clone(),
                    clock.clone(),
                    Arc::new(RandomDigits::new(self.config.seed)),
                    directory.clone(),
                    self.outbox.clone(),
                )?;
                tracing::debug!(start = %start.to_rfc3339(), "Started replay economy");
                Session {
                    clock,
                    directory,
                    engine,
                }
            }
        };
        Ok(self.session.insert(session))
    }
}

impl Session {
    fn dispatch(&self, principal: &Principal, action: Action) -> Result<(), EconomyError> {
        let engine = &self.engine;
        match action {
            Action::Open { name } => {
                if let Some(name) = name {
                    self.directory.register(OwnerIdentity {
                        owner: principal.owner,
                        name,
                        notify_address: None,
                    });
                }
                engine.open_account(principal)?;
            }
            Action::Adjust { owner, delta, reason } => {
                engine.admin_adjust_account(principal, owner, delta, &reason)?;
            }
            Action::SetBalance { owner, amount } => {
                engine.admin_set_account_balance(principal, owner, amount)?;
            }
            Action::FundAdjust { delta } => {
                engine.admin_adjust_fund(principal, delta)?;
            }
            Action::FundSet { amount } => {
                engine.admin_set_fund_balance(principal, amount)?;
            }
            Action::Transfer { to, amount } => {
                let number = self.number_of(to)?;
                engine.transfer(principal, &number, amount)?;
            }
            Action::Loan => {
                engine.issue_loan(principal)?;
            }
            Action::Repay { amount } => {
                engine.repay_loan(principal, amount)?;
            }
            Action::Save { amount } => {
                engine.savings_deposit(principal, amount)?;
            }
            Action::WithdrawSavings { deposit } => {
                engine.savings_withdraw(principal, deposit)?;
            }
            Action::Ticket { numbers } => {
                engine.buy_ticket(principal, &numbers)?;
            }
            Action::Draw => {
                engine.ensure_lottery_drawn()?;
            }
            Action::PayrollSubmit { department, items } => {
                engine.submit_payroll(principal, &department, items)?;
            }
            Action::PayrollApprove { request } => {
                engine.approve_payroll(principal, request)?;
            }
            Action::PayrollReject { request } => {
                engine.reject_payroll(principal, request)?;
            }
            Action::Fine { fine } => {
                engine.pay_fine(principal, fine)?;
            }
            Action::License { items } => {
                engine.purchase_licenses(principal, &items)?;
            }
            Action::Card { style } => {
                engine.update_card_style(principal, style)?;
            }
            Action::SalaryAccount { owner } => {
                let number = self.number_of(owner)?;
                engine.designate_salary_account(principal, &number)?;
            }
            Action::Tick => {
                engine.tick(principal)?;
            }
        }
        Ok(())
    }

    fn number_of(&self, owner: OwnerId) -> Result<String, EconomyError> {
        self.engine
            .account_for(owner)
            .map(|account| account.number.to_string())
            .ok_or_else(|| EconomyError::owner_has_no_account(owner))
    }
}
