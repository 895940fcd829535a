use clap::Parser;
use std::path::PathBuf;

/// Replay an economy script and print the resulting accounts
#[derive(Parser, Debug)]
#[command(name = "civic-ledger")]
#[command(
    about = "Replay an in-world economy script and print account balances",
    long_about = None
)]
pub struct CliArgs {
    /// Input CSV script
    #[arg(value_name = "INPUT", help = "Path to the input CSV script")]
    pub input_file: PathBuf,

    /// Economy policy file; falls back to $CIVIC_LEDGER_CONFIG, then defaults
    #[arg(long = "config", value_name = "FILE", help = "Path to a TOML economy configuration")]
    pub config: Option<PathBuf>,

    /// Where to write the full journal
    #[arg(long = "journal", value_name = "FILE", help = "Write every journal row to this CSV file")]
    pub journal: Option<PathBuf>,

    /// Seed for account and winning numbers
    #[arg(
        long = "seed",
        value_name = "SEED",
        help = "Seed for account and winning numbers (overrides the configuration)"
    )]
    pub seed: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(
        long = "log-level",
        value_name = "FILTER",
        default_value = "info",
        help = "Log filter when RUST_LOG is unset, e.g. 'warn' or 'civic_ledger=debug'"
    )]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::defaults(&["program", "script.csv"], None, None, None, "info")]
    #[case::config(
        &["program", "--config", "economy.toml", "script.csv"],
        Some("economy.toml"),
        None,
        None,
        "info"
    )]
    #[case::journal(
        &["program", "--journal", "journal.csv", "script.csv"],
        None,
        Some("journal.csv"),
        None,
        "info"
    )]
    #[case::all_options(
        &[
            "program", "--config", "e.toml", "--journal", "j.csv", "--seed", "42",
            "--log-level", "debug", "script.csv",
        ],
        Some("e.toml"),
        Some("j.csv"),
        Some(42),
        "debug"
    )]
    fn test_options(
        #[case] args: &[&str],
        #[case] config: Option<&str>,
        #[case] journal: Option<&str>,
        #[case] seed: Option<u64>,
        #[case] log_level: &str,
    ) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.input_file, PathBuf::from("script.csv"));
        assert_eq!(parsed.config, config.map(PathBuf::from));
        assert_eq!(parsed.journal, journal.map(PathBuf::from));
        assert_eq!(parsed.seed, seed);
        assert_eq!(parsed.log_level, log_level);
    }

    #[rstest]
    #[case::missing_input(&["program"])]
    #[case::bad_seed(&["program", "--seed", "lucky", "script.csv"])]
    #[case::unknown_flag(&["program", "--strategy", "sync", "script.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
