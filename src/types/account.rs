//! Account-related types
//!
//! An account is a balance plus a unique 10-digit number. It refers to its
//! owner by id only; the owner directory lives outside the engine.

use super::error::EconomyError;
use super::principal::OwnerId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Internal account identifier
pub type AccountId = u64;

/// Public, fixed-width numeric account number
///
/// Always exactly [`AccountNumber::WIDTH`] ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountNumber(String);

impl AccountNumber {
    pub const WIDTH: usize = 10;

    /// Parse a user-supplied account number
    ///
    /// Surrounding whitespace is ignored; anything other than exactly ten
    /// digits is a validation error.
    pub fn parse(input: &str) -> Result<Self, EconomyError> {
        let trimmed = input.trim();
        if trimmed.len() == Self::WIDTH && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(AccountNumber(trimmed.to_string()))
        } else {
            Err(EconomyError::validation(
                "account number",
                format!("'{}' is not a {}-digit number", input, Self::WIDTH),
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountNumber {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountNumber::parse(s)
    }
}

/// Cosmetic card design shown on the banking dashboard
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CardStyle {
    #[default]
    Blue,
    Gold,
    Black,
    /// Uploaded artwork, stored by reference
    Custom { image: String },
}

impl CardStyle {
    /// Parse `blue`, `gold`, `black` or `custom:<image>`
    pub fn parse(input: &str) -> Result<Self, EconomyError> {
        let trimmed = input.trim();
        match trimmed.to_lowercase().as_str() {
            "blue" => Ok(CardStyle::Blue),
            "gold" => Ok(CardStyle::Gold),
            "black" => Ok(CardStyle::Black),
            lowered if lowered.starts_with("custom:") => {
                let image = trimmed["custom:".len()..].trim();
                if image.is_empty() {
                    return Err(EconomyError::validation(
                        "card style",
                        "custom style requires an image reference",
                    ));
                }
                Ok(CardStyle::Custom {
                    image: image.to_string(),
                })
            }
            _ => Err(EconomyError::validation(
                "card style",
                format!("unknown style '{}'", input),
            )),
        }
    }
}

impl fmt::Display for CardStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardStyle::Blue => f.write_str("blue"),
            CardStyle::Gold => f.write_str("gold"),
            CardStyle::Black => f.write_str("black"),
            CardStyle::Custom { image } => write!(f, "custom:{}", image),
        }
    }
}

/// Bank account state
///
/// The balance is only ever changed by the ledger store, which appends a
/// matching transaction for every change.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: AccountId,

    /// Unique public number used for transfers and lookups
    pub number: AccountNumber,

    /// Weak reference to the owning citizen
    pub owner: OwnerId,

    /// Current balance; starts at zero
    pub balance: Decimal,

    pub card_style: CardStyle,

    pub opened_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a zero balance and the default card style
    pub fn new(
        id: AccountId,
        number: AccountNumber,
        owner: OwnerId,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Account {
            id,
            number,
            owner,
            balance: Decimal::ZERO,
            card_style: CardStyle::default(),
            opened_at,
        }
    }
}
