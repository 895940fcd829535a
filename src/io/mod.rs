//! I/O module
//!
//! Handles replay scripts, CSV output and notification delivery.
//!
//! # Components
//!
//! - `csv_format` - Script row conversion and account/journal serialization
//! - `script_reader` - Streaming reader over script files
//! - `replay` - Drives the engine from a script on a manual clock
//! - `notify` - Outbox and delivery worker for citizen notifications

pub mod csv_format;
pub mod notify;
pub mod replay;
pub mod script_reader;

pub use csv_format::{
    convert_script_record, write_accounts_csv, write_journal_csv, AccountSummary, Action,
    ScriptCommand, ScriptRecord,
};
pub use notify::{spawn_worker, LogSink, Notification, NotificationSink, Outbox, RecordingSink};
pub use replay::{Replay, ReplaySummary};
pub use script_reader::{RowError, ScriptReader};
