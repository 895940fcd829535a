//! Types module
//!
//! Contains core data structures used throughout the engine:
//! - `account`: accounts, account numbers and card styles
//! - `transaction`: journal rows, kinds and movement requests
//! - `loan`, `savings`, `lottery`, `payroll`, `fine`: per-service records
//! - `principal`: caller identity and roles
//! - `error`: the error taxonomy

pub mod account;
pub mod error;
pub mod fine;
pub mod loan;
pub mod lottery;
pub mod payroll;
pub mod principal;
pub mod savings;
pub mod transaction;

pub use account::{Account, AccountId, AccountNumber, CardStyle};
pub use error::{ensure_positive, AccountRef, EconomyError, LockReason};
pub use fine::{Fine, FineId, FineStatus, LicenseItem};
pub use loan::{Loan, LoanId, LoanStatus, PenaltyCharge, Repayment};
pub use lottery::{
    DrawOutcome, LotteryState, LotteryTicket, LotteryView, TicketId, TicketNumber, TicketPurchase,
};
pub use payroll::{
    Disbursement, PayrollId, PayrollItem, PayrollOutcome, PayrollRequest, PayrollStatus,
};
pub use principal::{OwnerId, Principal, Role};
pub use savings::{DepositId, SavingsDeposit, SavingsOverview, SavingsStatus, SavingsWithdrawal};
pub use transaction::{Direction, Movement, Transaction, TransactionId, TransactionKind};
