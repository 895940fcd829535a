//! Time-locked savings deposits

use super::account::AccountId;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

pub type DepositId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavingsStatus {
    Active,
    Withdrawn,
    /// Forfeited because the account was removed
    Closed,
}

/// Locked deposit; the principal never changes after creation
#[derive(Debug, Clone, PartialEq)]
pub struct SavingsDeposit {
    pub id: DepositId,
    pub account: AccountId,
    pub principal: Decimal,
    pub deposit_date: DateTime<Utc>,
    pub status: SavingsStatus,
    pub withdrawn_at: Option<DateTime<Utc>>,
}

impl SavingsDeposit {
    /// Earliest moment the deposit may be withdrawn, saturating at the end of time
    pub fn unlock_date(&self, lock: Duration) -> DateTime<Utc> {
        self.deposit_date
            .checked_add_signed(lock)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Boundary inclusive: withdrawable exactly at the unlock instant
    pub fn is_unlocked(&self, lock: Duration, now: DateTime<Utc>) -> bool {
        now >= self.unlock_date(lock)
    }
}

/// Payout of a matured deposit
#[derive(Debug, Clone, PartialEq)]
pub struct SavingsWithdrawal {
    pub deposit: DepositId,
    pub account: AccountId,
    pub principal: Decimal,
    pub payout: Decimal,
}

/// Dashboard row for an active deposit
#[derive(Debug, Clone, PartialEq)]
pub struct SavingsOverview {
    pub deposit: DepositId,
    pub principal: Decimal,
    pub unlock_date: DateTime<Utc>,
    pub can_withdraw: bool,
}
