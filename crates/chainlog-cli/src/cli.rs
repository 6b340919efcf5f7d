use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::BackendKind;

#[derive(Parser)]
#[command(
    name = "chainlog",
    about = "chainlog: tamper-evident, hash-chained event ledger",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to ./chainlog.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Ledger data directory, overriding the config file
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    /// Storage backend, overriding the config file
    #[arg(long, global = true)]
    pub backend: Option<BackendKind>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the ledger (bootstrapping genesis) or open an existing one
    Init(InitArgs),
    /// Append a JSON record as a new block
    Append(AppendArgs),
    /// Show blocks, newest first
    Log(LogArgs),
    /// Show one block by index or hash
    Show(ShowArgs),
    /// Verify chain integrity
    Verify(VerifyArgs),
    /// Show ledger location, size, and tail
    Status(StatusArgs),
}

#[derive(Args)]
pub struct InitArgs {}

#[derive(Args)]
pub struct AppendArgs {
    /// Record as inline JSON, e.g. '{"event":"register","name":"Alice"}'
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub data: Option<String>,
    /// Read the JSON record from a file (`-` for stdin)
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct LogArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub oneline: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Block index, or a full or abbreviated block hash
    pub block: String,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Report every violation instead of stopping at the first
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct StatusArgs {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["chainlog", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init(_)));
    }

    #[test]
    fn parse_append_inline() {
        let cli =
            Cli::try_parse_from(["chainlog", "append", r#"{"event":"register"}"#]).unwrap();
        let Command::Append(args) = cli.command else {
            panic!("wrong command");
        };
        assert_eq!(args.data.as_deref(), Some(r#"{"event":"register"}"#));
        assert!(args.file.is_none());
    }

    #[test]
    fn parse_append_file() {
        let cli = Cli::try_parse_from(["chainlog", "append", "--file", "event.json"]).unwrap();
        let Command::Append(args) = cli.command else {
            panic!("wrong command");
        };
        assert_eq!(args.file, Some(PathBuf::from("event.json")));
    }

    #[test]
    fn append_requires_a_record() {
        assert!(Cli::try_parse_from(["chainlog", "append"]).is_err());
        assert!(Cli::try_parse_from(["chainlog", "append", "{}", "--file", "x.json"]).is_err());
    }

    #[test]
    fn parse_log_oneline() {
        let cli = Cli::try_parse_from(["chainlog", "log", "--oneline", "-n", "5"]).unwrap();
        let Command::Log(args) = cli.command else {
            panic!("wrong command");
        };
        assert!(args.oneline);
        assert_eq!(args.limit, 5);
    }

    #[test]
    fn parse_show() {
        let cli = Cli::try_parse_from(["chainlog", "show", "3"]).unwrap();
        let Command::Show(args) = cli.command else {
            panic!("wrong command");
        };
        assert_eq!(args.block, "3");
    }

    #[test]
    fn parse_verify_all() {
        let cli = Cli::try_parse_from(["chainlog", "verify", "--all"]).unwrap();
        let Command::Verify(args) = cli.command else {
            panic!("wrong command");
        };
        assert!(args.all);
    }

    #[test]
    fn parse_global_overrides() {
        let cli = Cli::try_parse_from([
            "chainlog",
            "status",
            "--store-dir",
            "/var/lib/chainlog",
            "--backend",
            "log",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.store_dir, Some(PathBuf::from("/var/lib/chainlog")));
        assert!(matches!(cli.backend, Some(BackendKind::Log)));
        assert!(matches!(cli.format, OutputFormat::Json));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["chainlog", "--verbose", "init"]).unwrap();
        assert!(cli.verbose);
    }
}
