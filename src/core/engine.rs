//! Economy engine
//!
//! This module provides the `EconomyEngine`, the single entry point callers
//! use. It resolves the calling principal's account through the registry,
//! runs the explicit ticks an access path owes (late penalties, the daily
//! draw), delegates to the services, and posts notifications.
//!
//! The engine enforces:
//! - Role checks (government-only administration, department-scoped payroll)
//! - Penalty accrual before any operation that touches the caller's account
//! - Draw resolution before ticket purchases and lottery views
//! - Fire-and-forget notifications that never affect the financial outcome

use crate::config::EconomyConfig;
use crate::core::account_registry::AccountRegistry;
use crate::core::clock::Clock;
use crate::core::government_fund::{FundEntry, GovernmentFund};
use crate::core::ledger_store::{LedgerStore, Reconciliation};
use crate::core::loan_service::LoanService;
use crate::core::lottery_engine::LotteryEngine;
use crate::core::numbers::NumberSource;
use crate::core::payroll::PayrollProcessor;
use crate::core::savings_vault::SavingsVault;
use crate::core::traits::OwnerDirectory;
use crate::io::notify::{Notification, Outbox};
use crate::types::{
    ensure_positive, Account, AccountNumber, CardStyle, DepositId, DrawOutcome, EconomyError,
    Fine, FineStatus, LicenseItem, Loan, LotteryView, Movement, OwnerId, PayrollId, PayrollItem,
    PayrollOutcome, PayrollRequest, PenaltyCharge, Principal, Repayment, SavingsDeposit,
    SavingsOverview, SavingsWithdrawal, TicketPurchase, Transaction, TransactionKind,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Answer to "whose account is this number"
#[derive(Debug, Clone, PartialEq)]
pub struct AccountLookup {
    pub number: AccountNumber,
    pub owner: OwnerId,
    pub name: String,
}

/// Both journal rows of a completed transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub outgoing: Transaction,
    pub incoming: Transaction,
}

/// What an explicit tick did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub penalty: Option<PenaltyCharge>,
    pub draw: Option<DrawOutcome>,
}

/// Facade over the economy services
pub struct EconomyEngine {
    config: EconomyConfig,
    ledger: Arc<LedgerStore>,
    registry: Arc<AccountRegistry>,
    fund: Arc<GovernmentFund>,
    loans: LoanService,
    savings: SavingsVault,
    lottery: LotteryEngine,
    payroll: PayrollProcessor,
    directory: Arc<dyn OwnerDirectory>,
    outbox: Outbox,
}

impl EconomyEngine {
    /// Wire the services together
    ///
    /// # Arguments
    ///
    /// * `config` - Economy policy; validated here
    /// * `clock` - Time source shared by every service
    /// * `numbers` - Digit source for account and winning numbers
    /// * `directory` - Display names and notification addresses
    /// * `outbox` - Where notifications are posted
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the policy is inconsistent
    pub fn new(
        config: EconomyConfig,
        clock: Arc<dyn Clock>,
        numbers: Arc<dyn NumberSource>,
        directory: Arc<dyn OwnerDirectory>,
        outbox: Outbox,
    ) -> Result<Self, EconomyError> {
        config.validate()?;

        let ledger = Arc::new(LedgerStore::new(Arc::clone(&clock)));
        let fund = Arc::new(GovernmentFund::new(
            config.fund.opening_balance,
            Arc::clone(&clock),
        ));
        let registry = Arc::new(AccountRegistry::new(
            Arc::clone(&ledger),
            Arc::clone(&numbers),
            Arc::clone(&clock),
        ));
        let loans = LoanService::new(
            Arc::clone(&ledger),
            Arc::clone(&fund),
            Arc::clone(&clock),
            config.loans.clone(),
        );
        let savings = SavingsVault::new(
            Arc::clone(&ledger),
            Arc::clone(&clock),
            config.savings.clone(),
        );
        let lottery = LotteryEngine::new(
            Arc::clone(&ledger),
            Arc::clone(&fund),
            Arc::clone(&clock),
            numbers,
            config.lottery.clone(),
        );
        let payroll = PayrollProcessor::new(Arc::clone(&ledger), Arc::clone(&registry), clock);

        Ok(EconomyEngine {
            config,
            ledger,
            registry,
            fund,
            loans,
            savings,
            lottery,
            payroll,
            directory,
            outbox,
        })
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    /// Ledger store, for collaborators that post their own movements
    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    pub fn fund(&self) -> &GovernmentFund {
        &self.fund
    }

    // ----- accounts -------------------------------------------------------

    /// The caller's account, created on first visit
    pub fn open_account(&self, principal: &Principal) -> Result<Account, EconomyError> {
        let (account, _created) = self.registry.open_for_owner(principal.owner)?;
        self.touch(&account)?;
        self.ledger
            .account(account.id)
            .ok_or_else(|| EconomyError::account_not_found(account.id))
    }

    /// Resolve an account number to its owner's display name
    pub fn lookup_account(&self, number: &str) -> Result<AccountLookup, EconomyError> {
        let number = AccountNumber::parse(number)?;
        let account = self
            .registry
            .lookup_by_number(&number)
            .ok_or_else(|| EconomyError::number_not_found(&number))?;
        Ok(AccountLookup {
            number: account.number,
            owner: account.owner,
            name: self.display_name(account.owner),
        })
    }

    /// The caller's account after pending ticks
    pub fn account(&self, principal: &Principal) -> Result<Account, EconomyError> {
        let account = self.registry.require_account(principal.owner)?;
        self.touch(&account)?;
        self.ledger
            .account(account.id)
            .ok_or_else(|| EconomyError::account_not_found(account.id))
    }

    /// Account of an owner without running any tick
    pub fn account_for(&self, owner: OwnerId) -> Option<Account> {
        self.registry.account_of(owner)
    }

    /// All accounts sorted by id
    pub fn accounts(&self) -> Vec<Account> {
        self.ledger.accounts()
    }

    pub fn update_card_style(
        &self,
        principal: &Principal,
        style: CardStyle,
    ) -> Result<Account, EconomyError> {
        let account = self.require_touched(principal)?;
        self.ledger.set_card_style(account.id, style)?;
        self.ledger
            .account(account.id)
            .ok_or_else(|| EconomyError::account_not_found(account.id))
    }

    pub fn designate_salary_account(
        &self,
        principal: &Principal,
        number: &str,
    ) -> Result<(), EconomyError> {
        let number = AccountNumber::parse(number)?;
        self.registry.designate_salary_account(principal.owner, &number)
    }

    /// The caller's journal, newest first
    pub fn statement(&self, principal: &Principal) -> Result<Vec<Transaction>, EconomyError> {
        let account = self.require_touched(principal)?;
        let mut rows = self.ledger.transactions(account.id);
        rows.reverse();
        Ok(rows)
    }

    /// Run the ticks owed to the caller's account and the lottery
    pub fn tick(&self, principal: &Principal) -> Result<TickReport, EconomyError> {
        let penalty = match self.registry.account_of(principal.owner) {
            Some(account) => self.touch(&account)?,
            None => None,
        };
        let draw = self.ensure_lottery_drawn()?;
        Ok(TickReport { penalty, draw })
    }

    /// Post a movement on behalf of an integrating government service
    pub fn apply_movement(
        &self,
        principal: &Principal,
        movement: Movement,
    ) -> Result<Transaction, EconomyError> {
        principal.require_government("post ledger movements")?;
        self.ledger.apply_movement(movement)
    }

    /// Transfer to another citizen by account number
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The caller has no account, or `to` does not resolve
    /// - `to` is the caller's own account
    /// - The amount is not positive or exceeds the caller's balance
    pub fn transfer(
        &self,
        principal: &Principal,
        to: &str,
        amount: Decimal,
    ) -> Result<TransferReceipt, EconomyError> {
        let from = self.require_touched(principal)?;
        let number = AccountNumber::parse(to)?;
        let target = self
            .registry
            .lookup_by_number(&number)
            .ok_or_else(|| EconomyError::number_not_found(&number))?;

        let (outgoing, incoming) = self.ledger.transfer_with_notes(
            from.id,
            target.id,
            amount,
            format!("Transfer to {}", self.display_name(target.owner)),
            format!("Transfer from {}", self.display_name(from.owner)),
        )?;

        tracing::info!(from = from.id, to = target.id, amount = %amount, "Transfer completed");
        self.notify(
            from.owner,
            "Transfer sent",
            format!("You sent {:.2} to {}", amount, self.display_name(target.owner)),
        );
        self.notify(
            target.owner,
            "Transfer received",
            format!("{} sent you {:.2}", self.display_name(from.owner), amount),
        );
        Ok(TransferReceipt { outgoing, incoming })
    }

    // ----- loans ----------------------------------------------------------

    pub fn issue_loan(&self, principal: &Principal) -> Result<Loan, EconomyError> {
        let account = self.require_touched(principal)?;
        let loan = self.loans.issue_loan(account.id)?;
        self.notify(
            principal.owner,
            "Loan approved",
            format!(
                "{:.2} credited, {:.2} due by {}",
                self.config.loans.principal,
                loan.amount_due,
                loan.due_date.format("%Y-%m-%d")
            ),
        );
        Ok(loan)
    }

    pub fn repay_loan(
        &self,
        principal: &Principal,
        amount: Decimal,
    ) -> Result<Repayment, EconomyError> {
        let account = self.require_touched(principal)?;
        self.loans.repay_loan(account.id, amount)
    }

    /// The caller's Active loan after penalties are brought up to date
    pub fn active_loan(&self, principal: &Principal) -> Result<Option<Loan>, EconomyError> {
        let account = self.require_touched(principal)?;
        Ok(self.loans.active_loan(account.id))
    }

    /// Active loan of an owner without running any tick
    pub fn loan_for(&self, owner: OwnerId) -> Option<Loan> {
        self.registry
            .account_id_of(owner)
            .and_then(|account| self.loans.active_loan(account))
    }

    // ----- savings --------------------------------------------------------

    pub fn savings_deposit(
        &self,
        principal: &Principal,
        amount: Decimal,
    ) -> Result<SavingsDeposit, EconomyError> {
        let account = self.require_touched(principal)?;
        self.savings.deposit(account.id, amount)
    }

    pub fn savings_withdraw(
        &self,
        principal: &Principal,
        deposit: DepositId,
    ) -> Result<SavingsWithdrawal, EconomyError> {
        let account = self.require_touched(principal)?;
        self.savings.withdraw(account.id, deposit)
    }

    pub fn savings_overview(
        &self,
        principal: &Principal,
    ) -> Result<Vec<SavingsOverview>, EconomyError> {
        let account = self.require_touched(principal)?;
        Ok(self.savings.overview(account.id))
    }

    /// Principal still locked for an owner
    pub fn locked_savings_for(&self, owner: OwnerId) -> Decimal {
        self.registry
            .account_id_of(owner)
            .map(|account| self.savings.locked_total(account))
            .unwrap_or(Decimal::ZERO)
    }

    // ----- lottery --------------------------------------------------------

    pub fn buy_ticket(
        &self,
        principal: &Principal,
        numbers: &str,
    ) -> Result<TicketPurchase, EconomyError> {
        let account = self.require_touched(principal)?;
        self.ensure_lottery_drawn()?;
        let purchase = self.lottery.buy_ticket(account.id, principal.owner, numbers)?;
        if let Some(draw) = &purchase.draw {
            self.announce_winners(draw);
        }
        Ok(purchase)
    }

    /// Resolve the last open lottery day if the calendar moved past it
    pub fn ensure_lottery_drawn(&self) -> Result<Option<DrawOutcome>, EconomyError> {
        let draw = self.lottery.ensure_drawn()?;
        if let Some(draw) = &draw {
            self.announce_winners(draw);
        }
        Ok(draw)
    }

    pub fn lottery_view(&self, principal: &Principal) -> Result<LotteryView, EconomyError> {
        let account = self.require_touched(principal)?;
        let (view, draw) = self.lottery.view(account.id)?;
        if let Some(draw) = &draw {
            self.announce_winners(draw);
        }
        Ok(view)
    }

    // ----- payroll --------------------------------------------------------

    pub fn submit_payroll(
        &self,
        principal: &Principal,
        department: &str,
        items: Vec<PayrollItem>,
    ) -> Result<PayrollRequest, EconomyError> {
        principal.require_payroll_submitter(department)?;
        self.payroll.submit(department, items)
    }

    pub fn approve_payroll(
        &self,
        principal: &Principal,
        request: PayrollId,
    ) -> Result<PayrollOutcome, EconomyError> {
        principal.require_government("approve payroll")?;
        let outcome = self.payroll.approve(request)?;
        for line in &outcome.paid {
            self.notify(
                line.recipient,
                "Salary received",
                format!("{:.2} paid by payroll request {}", line.amount, request),
            );
        }
        Ok(outcome)
    }

    pub fn reject_payroll(
        &self,
        principal: &Principal,
        request: PayrollId,
    ) -> Result<PayrollRequest, EconomyError> {
        principal.require_government("reject payroll")?;
        self.payroll.reject(request)
    }

    pub fn payroll_request(&self, request: PayrollId) -> Option<PayrollRequest> {
        self.payroll.request(request)
    }

    pub fn pending_payroll(&self) -> Vec<PayrollRequest> {
        self.payroll.pending()
    }

    // ----- fines and licenses ---------------------------------------------

    /// Pay a pending fine from the caller's account into the government fund
    ///
    /// # Returns
    ///
    /// The fine marked Paid, for the records subsystem to persist
    pub fn pay_fine(&self, principal: &Principal, fine: Fine) -> Result<Fine, EconomyError> {
        if fine.owner != principal.owner {
            return Err(EconomyError::forbidden(principal.owner, &format!("pay fine {}", fine.id)));
        }
        if fine.status != FineStatus::Pending {
            return Err(EconomyError::already_processed(format!("Fine {}", fine.id)));
        }
        ensure_positive(fine.amount, "fine amount")?;

        let account = self.require_touched(principal)?;
        let mut fund = self.fund.begin();
        fund.credit(fine.amount, &format!("Fine {}", fine.id))?;
        self.ledger.apply_movement(Movement::covered_debit(
            account.id,
            fine.amount,
            TransactionKind::FinePayment,
            format!("Fine {}: {}", fine.id, fine.reason),
        ))?;
        fund.commit();

        tracing::info!(fine = fine.id, owner = fine.owner, amount = %fine.amount, "Fine paid");
        self.notify(
            principal.owner,
            "Fine paid",
            format!("{:.2} for {}", fine.amount, fine.reason),
        );
        Ok(Fine {
            status: FineStatus::Paid,
            ..fine
        })
    }

    /// Charge the caller for a basket of licenses
    pub fn purchase_licenses(
        &self,
        principal: &Principal,
        items: &[LicenseItem],
    ) -> Result<Transaction, EconomyError> {
        if items.is_empty() {
            return Err(EconomyError::validation("licenses", "no license selected"));
        }
        let mut total = Decimal::ZERO;
        for item in items {
            ensure_positive(item.price, "license price")?;
            total = total
                .checked_add(item.price)
                .ok_or_else(|| EconomyError::arithmetic_overflow("license total"))?;
        }
        let names: Vec<&str> = items.iter().map(|item| item.name.as_str()).collect();
        let description = format!("Licenses: {}", names.join(", "));

        let account = self.require_touched(principal)?;
        let mut fund = self.fund.begin();
        if self.config.fund.license_fees_to_fund {
            fund.credit(total, &description)?;
        }
        let tx = self.ledger.apply_movement(Movement::covered_debit(
            account.id,
            total,
            TransactionKind::Purchase,
            description,
        ))?;
        fund.commit();
        Ok(tx)
    }

    // ----- administration -------------------------------------------------

    pub fn admin_set_fund_balance(
        &self,
        principal: &Principal,
        amount: Decimal,
    ) -> Result<Decimal, EconomyError> {
        principal.require_government("set the fund balance")?;
        Ok(self
            .fund
            .set_balance(amount, &format!("Set by owner {}", principal.owner)))
    }

    /// Add to (positive `delta`) or take from (negative) the fund
    pub fn admin_adjust_fund(
        &self,
        principal: &Principal,
        delta: Decimal,
    ) -> Result<Decimal, EconomyError> {
        principal.require_government("adjust the fund balance")?;
        let reason = format!("Adjusted by owner {}", principal.owner);
        if delta.is_sign_negative() && !delta.is_zero() {
            self.fund.debit(-delta, &reason)
        } else {
            self.fund.credit(delta, &reason)
        }
    }

    pub fn admin_set_account_balance(
        &self,
        principal: &Principal,
        owner: OwnerId,
        amount: Decimal,
    ) -> Result<Transaction, EconomyError> {
        principal.require_government("set account balances")?;
        let account = self.registry.require_account(owner)?;
        let tx = self
            .ledger
            .set_balance(account.id, amount, "Balance set by the government")?;
        self.notify(owner, "Balance updated", format!("Your balance was set to {:.2}", amount));
        Ok(tx)
    }

    /// Audited correction of an owner's balance; `delta` may be negative
    pub fn admin_adjust_account(
        &self,
        principal: &Principal,
        owner: OwnerId,
        delta: Decimal,
        reason: &str,
    ) -> Result<Transaction, EconomyError> {
        principal.require_government("adjust account balances")?;
        let account = self.registry.require_account(owner)?;
        let description = if reason.trim().is_empty() {
            "Government adjustment".to_string()
        } else {
            reason.trim().to_string()
        };
        let tx = self.ledger.apply_movement(Movement {
            account: account.id,
            delta,
            kind: TransactionKind::ManualAdjustment,
            description,
            counterparty: None,
            required_balance: None,
        })?;
        self.notify(owner, "Balance updated", format!("Adjustment of {:.2}", delta));
        Ok(tx)
    }

    /// Cascade the removal of an owner to their account
    ///
    /// The account and its number mapping go away; its Active loan is
    /// written off as Closed and its Active savings deposits are forfeited.
    pub fn remove_owner(
        &self,
        principal: &Principal,
        owner: OwnerId,
    ) -> Result<Account, EconomyError> {
        principal.require_government("remove owners")?;
        let account = self.registry.remove_owner(owner)?;
        self.loans.close_for_account(account.id);
        self.savings.close_for_account(account.id);
        Ok(account)
    }

    pub fn fund_balance(&self) -> Decimal {
        self.fund.balance()
    }

    pub fn fund_entries(&self) -> Vec<FundEntry> {
        self.fund.entries()
    }

    /// Accounts whose balance disagrees with their journal
    pub fn reconcile(&self) -> Vec<Reconciliation> {
        let discrepancies: Vec<Reconciliation> = self
            .ledger
            .reconcile_all()
            .into_iter()
            .filter(|row| !row.is_balanced())
            .collect();
        for row in &discrepancies {
            tracing::warn!(
                account = row.account,
                balance = %row.balance,
                journal = %row.journal_sum,
                "Ledger discrepancy"
            );
        }
        discrepancies
    }

    // ----- internals ------------------------------------------------------

    fn require_touched(&self, principal: &Principal) -> Result<Account, EconomyError> {
        let account = self.registry.require_account(principal.owner)?;
        self.touch(&account)?;
        Ok(account)
    }

    /// Bring the account's late penalties up to date
    fn touch(&self, account: &Account) -> Result<Option<PenaltyCharge>, EconomyError> {
        let charge = self.loans.accrue_penalty(account.id)?;
        if let Some(charge) = &charge {
            self.notify(
                account.owner,
                "Late fee charged",
                format!(
                    "{:.2} added to loan {}, now owing {:.2}",
                    charge.amount, charge.loan, charge.amount_due
                ),
            );
        }
        Ok(charge)
    }

    fn announce_winners(&self, draw: &DrawOutcome) {
        for ticket in &draw.winners {
            self.notify(
                ticket.owner,
                "Lottery win",
                format!(
                    "Ticket {} won {:.2} in the {} draw",
                    ticket.numbers, draw.prize_per_winner, draw.closed_date
                ),
            );
        }
    }

    fn display_name(&self, owner: OwnerId) -> String {
        self.directory
            .resolve_owner(owner)
            .map(|identity| identity.name)
            .unwrap_or_else(|| format!("Citizen {}", owner))
    }

    fn notify(&self, owner: OwnerId, title: &str, body: String) {
        if !self.outbox.is_enabled() {
            return;
        }
        match self.directory.resolve_owner(owner) {
            Some(identity) => self.outbox.post(Notification::new(identity, title, body)),
            None => tracing::debug!(owner, title, "Owner not in directory, notification skipped"),
        }
    }
}
