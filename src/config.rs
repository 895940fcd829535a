//! Economy policy configuration
//!
//! Loaded from TOML. Every field has a default matching the live policy, so an
//! empty file (or no file) yields the standard economy.
//!
//! ```toml
//! seed = 7
//!
//! [loans]
//! principal = 5500
//! amount_due = 6000
//! penalty_rate = "0.01"
//!
//! [lottery]
//! ticket_price = 500
//! ```

use crate::types::EconomyError;
use chrono::Duration;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

/// Environment variable consulted when no `--config` flag is given
pub const CONFIG_ENV: &str = "CIVIC_LEDGER_CONFIG";

/// Longest loan term or savings lock a config may ask for
pub const MAX_POLICY_DAYS: i64 = 36_500;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoanPolicy {
    /// Paid out of the government fund into the borrower's account
    pub principal: Decimal,
    /// Owed on issue: principal plus the flat fee
    pub amount_due: Decimal,
    pub term_days: i64,
    /// Fraction of the outstanding debt charged per overdue interval
    pub penalty_rate: Decimal,
    pub penalty_interval_days: i64,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        LoanPolicy {
            principal: Decimal::new(5500, 0),
            amount_due: Decimal::new(6000, 0),
            term_days: 14,
            penalty_rate: Decimal::new(1, 2),
            penalty_interval_days: 2,
        }
    }
}

impl LoanPolicy {
    /// `None` when `term_days` does not fit a [`Duration`]
    pub fn term(&self) -> Option<Duration> {
        Duration::try_days(self.term_days)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SavingsPolicy {
    pub lock_days: i64,
    /// Interest paid on the principal at withdrawal
    pub interest_rate: Decimal,
}

impl Default for SavingsPolicy {
    fn default() -> Self {
        SavingsPolicy {
            lock_days: 30,
            interest_rate: Decimal::new(4, 2),
        }
    }
}

impl SavingsPolicy {
    /// Saturates at [`Duration::MAX`], so an out-of-range lock never opens
    pub fn lock(&self) -> Duration {
        Duration::try_days(self.lock_days).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LotteryPolicy {
    pub ticket_price: Decimal,
    /// Part of each ticket added to the jackpot
    pub jackpot_share: Decimal,
    /// Part of each ticket credited to the government fund
    pub fund_share: Decimal,
    /// Jackpot after every draw
    pub base_jackpot: Decimal,
    /// How long a caller waits for a draw in progress before giving up
    pub draw_lock_timeout_ms: u64,
}

impl Default for LotteryPolicy {
    fn default() -> Self {
        LotteryPolicy {
            ticket_price: Decimal::new(500, 0),
            jackpot_share: Decimal::new(250, 0),
            fund_share: Decimal::new(250, 0),
            base_jackpot: Decimal::new(50000, 0),
            draw_lock_timeout_ms: 250,
        }
    }
}

impl LotteryPolicy {
    pub fn draw_lock_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.draw_lock_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FundPolicy {
    pub opening_balance: Decimal,
    /// Credit license purchases to the government fund
    pub license_fees_to_fund: bool,
}

impl Default for FundPolicy {
    fn default() -> Self {
        FundPolicy {
            opening_balance: Decimal::ZERO,
            license_fees_to_fund: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NotificationPolicy {
    pub enabled: bool,
    pub timeout_ms: u64,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        NotificationPolicy {
            enabled: true,
            timeout_ms: 2000,
        }
    }
}

impl NotificationPolicy {
    pub fn timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.timeout_ms)
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub loans: LoanPolicy,
    pub savings: SavingsPolicy,
    pub lottery: LotteryPolicy,
    pub fund: FundPolicy,
    pub notifications: NotificationPolicy,
    /// Seed for account and winning numbers; entropy when absent
    pub seed: Option<u64>,
}

impl EconomyConfig {
    pub fn from_toml(content: &str) -> Result<Self, EconomyError> {
        let config: EconomyConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, EconomyError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EconomyError::invalid_config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Resolve the configuration from an explicit path, the environment, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, EconomyError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        match path {
            Some(path) => {
                let config = Self::from_file(&path)?;
                tracing::info!(path = %path.display(), "Loaded economy configuration");
                Ok(config)
            }
            None => {
                tracing::debug!("No configuration file given, using default policy");
                Ok(EconomyConfig::default())
            }
        }
    }

    /// Reject policies that would break the economy's invariants
    pub fn validate(&self) -> Result<(), EconomyError> {
        let loans = &self.loans;
        if loans.principal <= Decimal::ZERO {
            return Err(EconomyError::invalid_config("loans.principal must be positive"));
        }
        if loans.amount_due < loans.principal {
            return Err(EconomyError::invalid_config(
                "loans.amount_due must not be below loans.principal",
            ));
        }
        if !(0..=MAX_POLICY_DAYS).contains(&loans.term_days) {
            return Err(EconomyError::invalid_config(format!(
                "loans.term_days must be between 0 and {}",
                MAX_POLICY_DAYS
            )));
        }
        if loans.penalty_interval_days <= 0 {
            return Err(EconomyError::invalid_config(
                "loans.penalty_interval_days must be at least 1",
            ));
        }
        if loans.penalty_rate.is_sign_negative() {
            return Err(EconomyError::invalid_config("loans.penalty_rate must not be negative"));
        }

        if !(0..=MAX_POLICY_DAYS).contains(&self.savings.lock_days) {
            return Err(EconomyError::invalid_config(format!(
                "savings.lock_days must be between 0 and {}",
                MAX_POLICY_DAYS
            )));
        }
        if self.savings.interest_rate.is_sign_negative() {
            return Err(EconomyError::invalid_config(
                "savings.interest_rate must not be negative",
            ));
        }

        let lottery = &self.lottery;
        if lottery.ticket_price <= Decimal::ZERO {
            return Err(EconomyError::invalid_config("lottery.ticket_price must be positive"));
        }
        if lottery.jackpot_share.is_sign_negative() || lottery.fund_share.is_sign_negative() {
            return Err(EconomyError::invalid_config("lottery shares must not be negative"));
        }
        if lottery.jackpot_share + lottery.fund_share != lottery.ticket_price {
            return Err(EconomyError::invalid_config(format!(
                "lottery shares ({} + {}) must add up to the ticket price {}",
                lottery.jackpot_share, lottery.fund_share, lottery.ticket_price
            )));
        }
        if lottery.base_jackpot.is_sign_negative() {
            return Err(EconomyError::invalid_config("lottery.base_jackpot must not be negative"));
        }

        Ok(())
    }
}
