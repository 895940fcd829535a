//! CSV format handling for replay scripts and ledger output
//!
//! This module centralizes all CSV format concerns, providing:
//! - ScriptRecord structure for deserialization
//! - Conversion from script records to [`ScriptCommand`]s
//! - Account summary and journal serialization
//!
//! All functions are pure (no I/O beyond the writer they are given) for easy
//! testing.
//!
//! # Script columns
//!
//! `op,actor,role,target,amount,memo,at`
//!
//! - `actor` - owner id of the principal performing the operation
//! - `role` - `citizen`, `government` or `lead:<department>`
//! - `target` - owner id the operation is aimed at (transfer recipient,
//!   adjusted account), or the department for `payroll_submit`
//! - `memo` - operation specific text (ticket numbers, deposit id, ...)
//! - `at` - RFC 3339 timestamp the operation happens at

use crate::types::{
    Account, CardStyle, DepositId, Fine, FineStatus, LicenseItem, OwnerId, PayrollId, PayrollItem,
    Principal, Role, Transaction,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Raw script row
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ScriptRecord {
    pub op: String,
    pub actor: OwnerId,
    pub role: Option<String>,
    pub target: Option<String>,
    pub amount: Option<String>,
    pub memo: Option<String>,
    pub at: String,
}

/// One parsed script step
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCommand {
    pub principal: Principal,
    pub at: DateTime<Utc>,
    pub action: Action,
}

/// What a script step asks the engine to do
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Open { name: Option<String> },
    Adjust { owner: OwnerId, delta: Decimal, reason: String },
    SetBalance { owner: OwnerId, amount: Decimal },
    FundAdjust { delta: Decimal },
    FundSet { amount: Decimal },
    Transfer { to: OwnerId, amount: Decimal },
    Loan,
    Repay { amount: Decimal },
    Save { amount: Decimal },
    WithdrawSavings { deposit: DepositId },
    Ticket { numbers: String },
    Draw,
    PayrollSubmit { department: String, items: Vec<PayrollItem> },
    PayrollApprove { request: PayrollId },
    PayrollReject { request: PayrollId },
    Fine { fine: Fine },
    License { items: Vec<LicenseItem> },
    Card { style: CardStyle },
    SalaryAccount { owner: OwnerId },
    Tick,
}

/// Convert a ScriptRecord to a ScriptCommand
///
/// # Arguments
///
/// * `record` - The deserialized script row
///
/// # Returns
///
/// Result containing either:
/// - Ok(ScriptCommand) - Successfully converted row
/// - Err(String) - Error message describing the conversion failure
pub fn convert_script_record(record: ScriptRecord) -> Result<ScriptCommand, String> {
    let principal = parse_principal(record.actor, record.role.as_deref())?;
    let at = DateTime::parse_from_rfc3339(record.at.trim())
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| format!("Invalid timestamp '{}': {}", record.at, e))?;

    let op = record.op.to_lowercase();
    let memo = record.memo.as_deref().map(str::trim).unwrap_or("");

    let action = match op.as_str() {
        "open" => Action::Open {
            name: Some(memo.to_string()).filter(|name| !name.is_empty()),
        },
        "adjust" => Action::Adjust {
            owner: target_owner(&record)?,
            delta: required_amount(&record)?,
            reason: memo.to_string(),
        },
        "set_balance" => Action::SetBalance {
            owner: target_owner(&record)?,
            amount: required_amount(&record)?,
        },
        "fund_adjust" => Action::FundAdjust {
            delta: required_amount(&record)?,
        },
        "fund_set" => Action::FundSet {
            amount: required_amount(&record)?,
        },
        "transfer" => Action::Transfer {
            to: target_owner(&record)?,
            amount: required_amount(&record)?,
        },
        "loan" => Action::Loan,
        "repay" => Action::Repay {
            amount: required_amount(&record)?,
        },
        "save" => Action::Save {
            amount: required_amount(&record)?,
        },
        "withdraw_savings" => Action::WithdrawSavings {
            deposit: parse_id(memo, "deposit id")?,
        },
        "ticket" => Action::Ticket {
            numbers: memo.to_string(),
        },
        "draw" => Action::Draw,
        "payroll_submit" => Action::PayrollSubmit {
            department: record
                .target
                .as_deref()
                .map(str::trim)
                .filter(|dept| !dept.is_empty())
                .ok_or_else(|| "payroll_submit requires a department in target".to_string())?
                .to_string(),
            items: parse_payroll_items(memo)?,
        },
        "payroll_approve" => Action::PayrollApprove {
            request: parse_id(memo, "payroll request id")?,
        },
        "payroll_reject" => Action::PayrollReject {
            request: parse_id(memo, "payroll request id")?,
        },
        "fine" => {
            let amount = required_amount(&record)?;
            let (id, reason) = memo.split_once(':').unwrap_or((memo, ""));
            Action::Fine {
                fine: Fine {
                    id: parse_id(id, "fine id")?,
                    owner: record.actor,
                    amount,
                    reason: reason.trim().to_string(),
                    status: FineStatus::Pending,
                },
            }
        }
        "license" => Action::License {
            items: parse_license_items(memo)?,
        },
        "card" => Action::Card {
            style: CardStyle::parse(memo).map_err(|e| e.to_string())?,
        },
        "salary_account" => Action::SalaryAccount {
            owner: target_owner(&record)?,
        },
        "tick" => Action::Tick,
        _ => return Err(format!("Invalid operation: '{}'", record.op)),
    };

    Ok(ScriptCommand {
        principal,
        at,
        action,
    })
}

fn parse_principal(actor: OwnerId, role: Option<&str>) -> Result<Principal, String> {
    let role = role.map(str::trim).unwrap_or("");
    let lowered = role.to_lowercase();
    let role = match lowered.as_str() {
        "" | "citizen" => Role::Citizen,
        "government" | "gov" => Role::Government,
        _ => match role.split_once(':') {
            Some((kind, department))
                if kind.eq_ignore_ascii_case("lead") && !department.trim().is_empty() =>
            {
                Role::DepartmentLead {
                    department: department.trim().to_string(),
                }
            }
            _ => return Err(format!("Invalid role: '{}'", role)),
        },
    };
    Ok(Principal { owner: actor, role })
}

fn required_amount(record: &ScriptRecord) -> Result<Decimal, String> {
    match record.amount.as_deref().map(str::trim) {
        Some(amount) if !amount.is_empty() => {
            Decimal::from_str(amount).map_err(|_| format!("Invalid amount '{}'", amount))
        }
        _ => Err(format!("{} requires an amount", record.op)),
    }
}

fn target_owner(record: &ScriptRecord) -> Result<OwnerId, String> {
    match record.target.as_deref().map(str::trim) {
        Some(target) if !target.is_empty() => target
            .parse()
            .map_err(|_| format!("Invalid target owner '{}'", target)),
        _ => Err(format!("{} requires a target owner", record.op)),
    }
}

fn parse_id(value: &str, what: &str) -> Result<u64, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid {} '{}'", what, value))
}

/// `owner=amount;owner=amount`
fn parse_payroll_items(memo: &str) -> Result<Vec<PayrollItem>, String> {
    memo.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (employee, amount) = part
                .split_once('=')
                .ok_or_else(|| format!("Invalid payroll item '{}'", part))?;
            Ok(PayrollItem {
                employee: employee
                    .trim()
                    .parse()
                    .map_err(|_| format!("Invalid employee '{}'", employee))?,
                amount: Decimal::from_str(amount.trim())
                    .map_err(|_| format!("Invalid amount '{}'", amount))?,
            })
        })
        .collect()
}

/// `name=price;name=price`
fn parse_license_items(memo: &str) -> Result<Vec<LicenseItem>, String> {
    memo.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (name, price) = part
                .split_once('=')
                .ok_or_else(|| format!("Invalid license item '{}'", part))?;
            Ok(LicenseItem {
                name: name.trim().to_string(),
                price: Decimal::from_str(price.trim())
                    .map_err(|_| format!("Invalid price '{}'", price))?,
            })
        })
        .collect()
}

/// Summary row of one account for the replay output
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSummary {
    pub owner: OwnerId,
    pub balance: Decimal,
    pub loan_due: Decimal,
    pub savings_locked: Decimal,
    pub card: CardStyle,
}

impl AccountSummary {
    pub fn new(account: &Account, loan_due: Decimal, savings_locked: Decimal) -> Self {
        AccountSummary {
            owner: account.owner,
            balance: account.balance,
            loan_due,
            savings_locked,
            card: account.card_style.clone(),
        }
    }
}

/// Write account summaries in CSV format
///
/// Writes columns: owner, balance, loan_due, savings_locked, card.
/// Rows are sorted by owner id for deterministic output.
///
/// # Arguments
///
/// * `accounts` - Summaries to write
/// * `output` - Mutable reference to a writer for outputting CSV
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_accounts_csv(
    accounts: &[AccountSummary],
    output: &mut dyn Write,
) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record(["owner", "balance", "loan_due", "savings_locked", "card"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted = accounts.to_vec();
    sorted.sort_by_key(|summary| summary.owner);

    for summary in sorted {
        writer
            .write_record(&[
                summary.owner.to_string(),
                format!("{:.2}", summary.balance),
                format!("{:.2}", summary.loan_due),
                format!("{:.2}", summary.savings_locked),
                summary.card.to_string(),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

/// Write journal rows in CSV format, in the order given
///
/// Columns: tx, owner, kind, direction, amount, counterparty, description, timestamp.
pub fn write_journal_csv(
    rows: &[(OwnerId, Transaction)],
    output: &mut dyn Write,
) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record([
            "tx",
            "owner",
            "kind",
            "direction",
            "amount",
            "counterparty",
            "description",
            "timestamp",
        ])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    for (owner, tx) in rows {
        writer
            .write_record(&[
                tx.id.to_string(),
                owner.to_string(),
                tx.kind.to_string(),
                tx.direction.as_str().to_string(),
                format!("{:.2}", tx.amount),
                tx.counterparty
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                tx.description.clone(),
                tx.timestamp.to_rfc3339(),
            ])
            .map_err(|e| format!("Failed to write journal record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush journal: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountNumber, Direction, TransactionKind};
    use rstest::rstest;

    fn record(op: &str, role: &str, target: &str, amount: &str, memo: &str) -> ScriptRecord {
        let opt = |value: &str| Some(value.to_string()).filter(|v| !v.is_empty());
        ScriptRecord {
            op: op.to_string(),
            actor: 1,
            role: opt(role),
            target: opt(target),
            amount: opt(amount),
            memo: opt(memo),
            at: "2025-01-01T10:00:00Z".to_string(),
        }
    }

    #[rstest]
    #[case::open("open", "", "", "", "Ana", Action::Open { name: Some("Ana".to_string()) })]
    #[case::transfer(
        "transfer", "", "2", "300", "",
        Action::Transfer { to: 2, amount: Decimal::new(300, 0) }
    )]
    #[case::loan_uppercase("LOAN", "", "", "", "", Action::Loan)]
    #[case::ticket("ticket", "", "", "", "00042", Action::Ticket { numbers: "00042".to_string() })]
    #[case::withdraw("withdraw_savings", "", "", "", "3", Action::WithdrawSavings { deposit: 3 })]
    #[case::negative_adjust(
        "adjust", "government", "4", "-25.50", "Correction",
        Action::Adjust { owner: 4, delta: Decimal::new(-2550, 2), reason: "Correction".to_string() }
    )]
    #[case::card(
        "card", "", "", "", "custom:dragon.png",
        Action::Card { style: CardStyle::Custom { image: "dragon.png".to_string() } }
    )]
    #[case::tick("tick", "", "", "", "", Action::Tick)]
    fn test_convert_script_record_valid(
        #[case] op: &str,
        #[case] role: &str,
        #[case] target: &str,
        #[case] amount: &str,
        #[case] memo: &str,
        #[case] expected: Action,
    ) {
        let command = convert_script_record(record(op, role, target, amount, memo)).unwrap();
        assert_eq!(command.action, expected);
        assert_eq!(command.principal.owner, 1);
    }

    #[rstest]
    #[case::citizen_default("", Role::Citizen)]
    #[case::government("Government", Role::Government)]
    #[case::lead("lead:Police", Role::DepartmentLead { department: "Police".to_string() })]
    fn test_role_parsing(#[case] role: &str, #[case] expected: Role) {
        let command = convert_script_record(record("loan", role, "", "", "")).unwrap();
        assert_eq!(command.principal.role, expected);
    }

    #[test]
    fn test_payroll_submit_items() {
        let command = convert_script_record(record(
            "payroll_submit",
            "lead:Police",
            "Police",
            "",
            "2=2000; 3=3000",
        ))
        .unwrap();
        match command.action {
            Action::PayrollSubmit { department, items } => {
                assert_eq!(department, "Police");
                assert_eq!(items.len(), 2);
                assert_eq!(items[1].employee, 3);
                assert_eq!(items[1].amount, Decimal::new(3000, 0));
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_fine_memo_carries_id_and_reason() {
        let command = convert_script_record(record("fine", "", "", "150", "12: Speeding")).unwrap();
        match command.action {
            Action::Fine { fine } => {
                assert_eq!(fine.id, 12);
                assert_eq!(fine.owner, 1);
                assert_eq!(fine.reason, "Speeding");
                assert_eq!(fine.status, FineStatus::Pending);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[rstest]
    #[case::unknown_op("mint", "", "", "", "", "Invalid operation")]
    #[case::missing_amount("transfer", "", "2", "", "", "requires an amount")]
    #[case::bad_amount("save", "", "", "lots", "", "Invalid amount")]
    #[case::missing_target("transfer", "", "", "10", "", "requires a target owner")]
    #[case::bad_role("loan", "mayor", "", "", "", "Invalid role")]
    #[case::bad_deposit_id("withdraw_savings", "", "", "", "first", "Invalid deposit id")]
    #[case::bad_payroll_item(
        "payroll_submit", "government", "Police", "", "2:2000",
        "Invalid payroll item"
    )]
    #[case::missing_department(
        "payroll_submit", "government", "", "", "2=2000",
        "requires a department"
    )]
    fn test_convert_script_record_errors(
        #[case] op: &str,
        #[case] role: &str,
        #[case] target: &str,
        #[case] amount: &str,
        #[case] memo: &str,
        #[case] expected_error: &str,
    ) {
        let result = convert_script_record(record(op, role, target, amount, memo));
        assert!(result.unwrap_err().contains(expected_error));
    }

    #[test]
    fn test_invalid_timestamp() {
        let mut row = record("loan", "", "", "", "");
        row.at = "yesterday".to_string();
        assert!(convert_script_record(row).unwrap_err().contains("Invalid timestamp"));
    }

    #[rstest]
    #[case::single(
        vec![AccountSummary {
            owner: 1,
            balance: Decimal::new(70000, 2),
            loan_due: Decimal::ZERO,
            savings_locked: Decimal::ZERO,
            card: CardStyle::Blue,
        }],
        "owner,balance,loan_due,savings_locked,card\n1,700.00,0.00,0.00,blue\n"
    )]
    #[case::sorted_by_owner(
        vec![
            AccountSummary {
                owner: 3,
                balance: Decimal::new(-60, 0),
                loan_due: Decimal::new(6060, 0),
                savings_locked: Decimal::ZERO,
                card: CardStyle::Gold,
            },
            AccountSummary {
                owner: 1,
                balance: Decimal::new(5, 1),
                loan_due: Decimal::ZERO,
                savings_locked: Decimal::new(1000, 0),
                card: CardStyle::Blue,
            },
        ],
        "owner,balance,loan_due,savings_locked,card\n\
         1,0.50,0.00,1000.00,blue\n\
         3,-60.00,6060.00,0.00,gold\n"
    )]
    #[case::empty(vec![], "owner,balance,loan_due,savings_locked,card\n")]
    fn test_write_accounts_csv(
        #[case] accounts: Vec<AccountSummary>,
        #[case] expected_output: &str,
    ) {
        let mut output = Vec::new();
        write_accounts_csv(&accounts, &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), expected_output);
    }

    #[test]
    fn test_write_journal_csv() {
        let tx = Transaction {
            id: 4,
            account: 1,
            kind: TransactionKind::TransferOut,
            direction: Direction::Debit,
            amount: Decimal::new(300, 0),
            counterparty: Some(AccountNumber::parse("0000000002").unwrap()),
            description: "Transfer to Bea".to_string(),
            timestamp: DateTime::parse_from_rfc3339("2025-01-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let mut output = Vec::new();
        write_journal_csv(&[(1, tx)], &mut output).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "tx,owner,kind,direction,amount,counterparty,description,timestamp\n\
             4,1,transfer_out,debit,300.00,0000000002,Transfer to Bea,2025-01-01T10:00:00+00:00\n"
        );
    }
}
