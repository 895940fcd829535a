//! Fines and license fees owned by the citizen subsystem
//!
//! The engine only settles them; issuing and storing fines happens elsewhere.

use super::principal::OwnerId;
use rust_decimal::Decimal;

pub type FineId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FineStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fine {
    pub id: FineId,
    pub owner: OwnerId,
    pub amount: Decimal,
    pub reason: String,
    pub status: FineStatus,
}

/// Priced license line in a purchase
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseItem {
    pub name: String,
    pub price: Decimal,
}
