//! Payroll batch processor
//!
//! Departments submit batches of salary lines; the government approves or
//! rejects each batch exactly once. Approval credits every resolvable
//! employee in one ledger unit. Salaries are new money: the government fund
//! is not debited.

use crate::core::account_registry::AccountRegistry;
use crate::core::clock::Clock;
use crate::core::ledger_store::LedgerStore;
use crate::types::{
    Disbursement, EconomyError, Movement, PayrollId, PayrollItem, PayrollOutcome, PayrollRequest,
    PayrollStatus, TransactionKind,
};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct PayrollProcessor {
    ledger: Arc<LedgerStore>,
    registry: Arc<AccountRegistry>,
    clock: Arc<dyn Clock>,
    requests: DashMap<PayrollId, PayrollRequest>,
    next_id: AtomicU64,
}

impl PayrollProcessor {
    pub fn new(
        ledger: Arc<LedgerStore>,
        registry: Arc<AccountRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        PayrollProcessor {
            ledger,
            registry,
            clock,
            requests: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a Pending request
    ///
    /// # Errors
    ///
    /// `Validation` for a blank department, an empty batch or a
    /// non-positive item.
    pub fn submit(
        &self,
        department: &str,
        items: Vec<PayrollItem>,
    ) -> Result<PayrollRequest, EconomyError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = PayrollRequest::new(id, department, items, self.clock.now())?;
        self.requests.insert(id, request.clone());

        tracing::info!(
            request = id,
            department = %request.department,
            items = request.items.len(),
            total = %request.total_amount,
            "Submitted payroll request"
        );
        Ok(request)
    }

    /// Approve a Pending request and pay every resolvable line
    ///
    /// Lines whose employee has no resolvable salary target are skipped and
    /// reported in the outcome; the rest are credited together.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request does not exist
    /// - The request is no longer Pending (`AlreadyProcessed`)
    pub fn approve(&self, id: PayrollId) -> Result<PayrollOutcome, EconomyError> {
        let mut request = self
            .requests
            .get_mut(&id)
            .ok_or(EconomyError::PayrollNotFound { request: id })?;
        if request.status != PayrollStatus::Pending {
            return Err(EconomyError::already_processed(format!("Payroll request {}", id)));
        }

        let now = self.clock.now();
        let description = format!(
            "Payroll {} ({})",
            request.department,
            request.created_at.format("%d/%m")
        );

        let mut paid = Vec::with_capacity(request.items.len());
        let mut skipped = Vec::new();
        for item in &request.items {
            let target = self
                .registry
                .salary_target(item.employee)
                .and_then(|account| self.ledger.account(account));
            match target {
                Some(account) => paid.push(Disbursement {
                    employee: item.employee,
                    account: account.id,
                    recipient: account.owner,
                    amount: item.amount,
                }),
                None => {
                    tracing::warn!(
                        request = id,
                        employee = item.employee,
                        amount = %item.amount,
                        "No salary account for employee, skipping"
                    );
                    skipped.push(item.employee);
                }
            }
        }

        let legs = paid
            .iter()
            .map(|line| {
                Movement::credit(
                    line.account,
                    line.amount,
                    TransactionKind::Salary,
                    description.clone(),
                )
            })
            .collect();
        self.ledger.apply_movements(legs)?;

        let total_paid: Decimal = paid.iter().map(|line| line.amount).sum();
        request.status = PayrollStatus::Approved;
        request.processed_at = Some(now);

        tracing::info!(
            request = id,
            paid = paid.len(),
            skipped = skipped.len(),
            total_paid = %total_paid,
            "Approved payroll request"
        );
        Ok(PayrollOutcome {
            request: id,
            paid,
            skipped,
            total_paid,
        })
    }

    /// Reject a Pending request; no money moves
    pub fn reject(&self, id: PayrollId) -> Result<PayrollRequest, EconomyError> {
        let mut request = self
            .requests
            .get_mut(&id)
            .ok_or(EconomyError::PayrollNotFound { request: id })?;
        if request.status != PayrollStatus::Pending {
            return Err(EconomyError::already_processed(format!("Payroll request {}", id)));
        }

        request.status = PayrollStatus::Rejected;
        request.processed_at = Some(self.clock.now());
        tracing::info!(request = id, department = %request.department, "Rejected payroll request");
        Ok(request.clone())
    }

    pub fn request(&self, id: PayrollId) -> Option<PayrollRequest> {
        self.requests.get(&id).map(|request| request.value().clone())
    }

    /// Requests awaiting a decision, oldest first
    pub fn pending(&self) -> Vec<PayrollRequest> {
        let mut pending: Vec<PayrollRequest> = self
            .requests
            .iter()
            .filter(|request| request.status == PayrollStatus::Pending)
            .map(|request| request.value().clone())
            .collect();
        pending.sort_by_key(|request| request.id);
        pending
    }
}
