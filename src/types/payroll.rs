//! Payroll batch types

use super::account::AccountId;
use super::error::EconomyError;
use super::principal::OwnerId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub type PayrollId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayrollStatus {
    Pending,
    Approved,
    Rejected,
}

impl PayrollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayrollStatus::Pending => "pending",
            PayrollStatus::Approved => "approved",
            PayrollStatus::Rejected => "rejected",
        }
    }
}

/// One employee's line on a payroll request
#[derive(Debug, Clone, PartialEq)]
pub struct PayrollItem {
    pub employee: OwnerId,
    pub amount: Decimal,
}

/// Multi-recipient disbursement awaiting government approval
///
/// `total_amount` always equals the sum of the item amounts; items are fixed
/// at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct PayrollRequest {
    pub id: PayrollId,
    pub department: String,
    pub total_amount: Decimal,
    pub status: PayrollStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub items: Vec<PayrollItem>,
}

impl PayrollRequest {
    /// Build a pending request, validating the batch
    ///
    /// # Errors
    ///
    /// `Validation` if the department is blank, the batch is empty, any item
    /// amount is not positive, or the total overflows.
    pub fn new(
        id: PayrollId,
        department: &str,
        items: Vec<PayrollItem>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, EconomyError> {
        let department = department.trim();
        if department.is_empty() {
            return Err(EconomyError::validation("department", "must not be blank"));
        }
        if items.is_empty() {
            return Err(EconomyError::validation("payroll items", "batch is empty"));
        }

        let mut total = Decimal::ZERO;
        for item in &items {
            if item.amount <= Decimal::ZERO {
                return Err(EconomyError::validation(
                    "payroll items",
                    format!("employee {} has non-positive amount {}", item.employee, item.amount),
                ));
            }
            total = total
                .checked_add(item.amount)
                .ok_or_else(|| EconomyError::arithmetic_overflow("payroll total"))?;
        }

        Ok(PayrollRequest {
            id,
            department: department.to_string(),
            total_amount: total,
            status: PayrollStatus::Pending,
            created_at,
            processed_at: None,
            items,
        })
    }
}

/// One credited payroll line
#[derive(Debug, Clone, PartialEq)]
pub struct Disbursement {
    pub employee: OwnerId,
    pub account: AccountId,
    /// Owner of `account`; differs from `employee` for a designated account
    pub recipient: OwnerId,
    pub amount: Decimal,
}

/// Result of approving a payroll request
///
/// Items whose employee had no resolvable account are listed in `skipped`
/// rather than failing the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PayrollOutcome {
    pub request: PayrollId,
    pub paid: Vec<Disbursement>,
    pub skipped: Vec<OwnerId>,
    pub total_paid: Decimal,
}
