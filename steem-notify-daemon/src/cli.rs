use crate::error::DaemonError;
use clap::{Parser, Subcommand};

/// The main CLI structure for the notification daemon.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the daemon configuration TOML file.
    /// If not provided, default values and environment overrides are used.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Defines the available subcommands for the application.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the block scanner until interrupted.
    Run,
    /// Print an account's stored notifications as JSON, newest first.
    Feed(FeedCmd),
    /// Print the height of the last fully processed block.
    Cursor,
}

/// Arguments for the `feed` subcommand.
#[derive(Parser, Debug)]
pub struct FeedCmd {
    /// The account whose feed is printed.
    #[arg(value_parser = parse_account)]
    pub account: String,
}

/// Accepts ledger account names: 3 to 16 characters of lowercase letters, digits, `-`
/// and `.`.
pub fn parse_account(raw: &str) -> Result<String, DaemonError> {
    if !(3..=16).contains(&raw.len()) {
        return Err(DaemonError::InvalidArgument(format!(
            "account name `{raw}` must be 3 to 16 characters long"
        )));
    }
    if !raw
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(DaemonError::InvalidArgument(format!(
            "account name `{raw}` may only contain lowercase letters, digits, '-' and '.'"
        )));
    }
    Ok(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_takes_a_global_config_flag() {
        let cli = Cli::try_parse_from(["steem-notify-daemon", "feed", "alice", "--config", "a.toml"])
            .unwrap();

        assert_eq!(cli.config.as_deref(), Some("a.toml"));
        assert!(matches!(cli.command, Commands::Feed(FeedCmd { account }) if account == "alice"));
    }

    #[test]
    fn rejects_invalid_account_names() {
        assert!(parse_account("ab").is_err());
        assert!(parse_account("Alice").is_err());
        assert!(parse_account("bob@home").is_err());
        assert!(parse_account("steem.dao").is_ok());
    }
}
