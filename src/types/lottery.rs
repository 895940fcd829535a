//! Lottery types
//!
//! One [`LotteryState`] exists per engine. Its `last_run_date` marks the most
//! recent calendar day whose tickets have been resolved.

use super::account::AccountId;
use super::error::EconomyError;
use super::principal::OwnerId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;

pub type TicketId = u64;

/// Exactly five decimal digits, leading zeros significant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TicketNumber(String);

impl TicketNumber {
    pub const WIDTH: usize = 5;

    pub fn parse(input: &str) -> Result<Self, EconomyError> {
        let trimmed = input.trim();
        if trimmed.len() == Self::WIDTH && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(TicketNumber(trimmed.to_string()))
        } else {
            Err(EconomyError::InvalidTicketFormat {
                numbers: input.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Singleton draw state
#[derive(Debug, Clone, PartialEq)]
pub struct LotteryState {
    pub current_jackpot: Decimal,
    pub last_run_date: NaiveDate,
    pub last_winning_number: Option<TicketNumber>,
}

/// Purchased ticket; immutable once created
#[derive(Debug, Clone, PartialEq)]
pub struct LotteryTicket {
    pub id: TicketId,
    pub account: AccountId,
    pub owner: OwnerId,
    pub numbers: TicketNumber,
    pub date: NaiveDate,
}

/// Result of resolving one closed day
#[derive(Debug, Clone, PartialEq)]
pub struct DrawOutcome {
    /// The day whose tickets were resolved
    pub closed_date: NaiveDate,
    /// The day `last_run_date` advanced to
    pub run_date: NaiveDate,
    pub winning_number: TicketNumber,
    pub winners: Vec<LotteryTicket>,
    pub prize_per_winner: Decimal,
    /// Jackpot that was up for grabs before the reset
    pub jackpot: Decimal,
}

/// What a successful ticket purchase produced
#[derive(Debug, Clone, PartialEq)]
pub struct TicketPurchase {
    pub ticket: LotteryTicket,
    /// Draw performed implicitly before the purchase, if a day had closed
    pub draw: Option<DrawOutcome>,
    pub jackpot: Decimal,
}

/// Lottery page contents for one citizen
#[derive(Debug, Clone, PartialEq)]
pub struct LotteryView {
    pub state: LotteryState,
    pub tickets_today: Vec<LotteryTicket>,
}
