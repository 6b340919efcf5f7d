use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{bail, Context};
use chainlog_ledger::{Block, BlockStore, IntegrityReport, Ledger, LedgerError};
use colored::Colorize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cli::*;
use crate::config::CliConfig;

type CliLedger = Ledger<Box<dyn BlockStore>>;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?.with_overrides(cli.store_dir, cli.backend);
    debug!(
        backend = %config.storage.backend,
        path = %config.storage.path.display(),
        "configuration resolved"
    );

    let format = cli.format;
    match cli.command {
        Command::Init(_) => cmd_init(&config, &format),
        Command::Append(args) => cmd_append(&config, &format, args),
        Command::Log(args) => cmd_log(&config, &format, args),
        Command::Show(args) => cmd_show(&config, &format, args),
        Command::Verify(args) => cmd_verify(&config, &format, args),
        Command::Status(_) => cmd_status(&config, &format),
    }
}

/// Load the configured ledger. With `tolerate_corruption` a chain that fails
/// verification is still returned (in the `Corrupted` state) so it can be
/// inspected.
fn open_ledger(config: &CliConfig, tolerate_corruption: bool) -> anyhow::Result<CliLedger> {
    let ledger = Ledger::new(config.storage.open_store(), config.ledger.clone());
    match ledger.load() {
        Ok(()) => Ok(ledger),
        Err(e) if tolerate_corruption && e.is_corruption() => {
            warn!(error = %e, "ledger loaded in corrupted state");
            Ok(ledger)
        }
        Err(e) => {
            Err(e).with_context(|| format!("opening ledger at {}", config.storage.path.display()))
        }
    }
}

fn cmd_init(config: &CliConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let ledger = open_ledger(config, false)?;
    let genesis = ledger.get(0)?.context("ledger has no genesis block")?;
    let len = ledger.len()?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "store": ledger.store().describe(),
            "blocks": len,
            "genesis": genesis.hash(),
        })),
        OutputFormat::Text => {
            println!(
                "{} Ledger ready at {}",
                "✓".green().bold(),
                ledger.store().describe().bold()
            );
            println!("  Genesis: {}", genesis.hash().cyan());
            println!("  Blocks: {}", len.to_string().bold());
            Ok(())
        }
    }
}

fn cmd_append(config: &CliConfig, format: &OutputFormat, args: AppendArgs) -> anyhow::Result<()> {
    let data = read_record(&args)?;
    let ledger = open_ledger(config, false)?;
    let block = ledger.append(data)?;

    match format {
        OutputFormat::Json => print_json(&block),
        OutputFormat::Text => {
            println!(
                "{} Appended block {}",
                "✓".green().bold(),
                format!("#{}", block.index()).yellow().bold()
            );
            println!("  Hash: {}", block.hash().cyan());
            println!("  Previous: {}", block.previous_hash().dimmed());
            Ok(())
        }
    }
}

fn cmd_log(config: &CliConfig, format: &OutputFormat, args: LogArgs) -> anyhow::Result<()> {
    let ledger = open_ledger(config, true)?;
    let blocks = newest_first(ledger.blocks()?, args.limit);

    match format {
        OutputFormat::Json => print_json(&blocks),
        OutputFormat::Text => {
            for block in &blocks {
                if args.oneline {
                    println!(
                        "{} {} {}",
                        format!("#{}", block.index()).yellow(),
                        block.short_hash().dimmed(),
                        summarize(block.data())
                    );
                } else {
                    println!(
                        "{}  {}",
                        format!("#{}", block.index()).yellow().bold(),
                        block.hash().dimmed()
                    );
                    println!("  Time: {}", display_time(block));
                    println!("  Data: {}", block.data());
                    println!();
                }
            }
            Ok(())
        }
    }
}

fn cmd_show(config: &CliConfig, format: &OutputFormat, args: ShowArgs) -> anyhow::Result<()> {
    let ledger = open_ledger(config, true)?;
    let block = find_block(&ledger, &args.block)?;

    match format {
        OutputFormat::Json => print_json(&block),
        OutputFormat::Text => {
            let valid = if block.is_hash_valid() {
                "✓ hash valid".green()
            } else {
                "✗ hash mismatch".red()
            };
            println!("Block {}  ({})", format!("#{}", block.index()).yellow().bold(), valid);
            println!("  Time: {}", display_time(&block));
            println!("  Hash: {}", block.hash().cyan());
            println!("  Previous: {}", block.previous_hash().dimmed());
            println!("{}", serde_json::to_string_pretty(block.data())?);
            Ok(())
        }
    }
}

fn cmd_verify(config: &CliConfig, format: &OutputFormat, args: VerifyArgs) -> anyhow::Result<()> {
    let ledger = open_ledger(config, true)?;

    if args.all {
        let report = ledger.audit()?;
        match format {
            OutputFormat::Json => print_json(&report)?,
            OutputFormat::Text => print_report(&report),
        }
        if !report.is_valid() {
            bail!("chain failed verification at {} block(s)", report.violations.len());
        }
        return Ok(());
    }

    match ledger.verify() {
        Ok(()) => {
            let len = ledger.len()?;
            match format {
                OutputFormat::Json => print_json(&json!({ "valid": true, "blocks": len })),
                OutputFormat::Text => {
                    println!("{} Chain integrity verified", "✓".green().bold());
                    println!("  Blocks: {}", len.to_string().bold());
                    Ok(())
                }
            }
        }
        Err(LedgerError::Corruption(corruption)) => {
            if let OutputFormat::Json = format {
                print_json(&json!({ "valid": false, "violation": corruption }))?;
            } else {
                println!("{} {}", "✗".red().bold(), corruption.to_string().red());
            }
            Err(LedgerError::Corruption(corruption).into())
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_status(config: &CliConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let ledger = open_ledger(config, true)?;
    let status = ledger.status()?;
    let len = ledger.len()?;
    let tail = ledger.last_block()?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "backend": config.storage.backend.to_string(),
            "store": ledger.store().describe(),
            "status": status,
            "blocks": len,
            "tail": { "index": tail.index(), "hash": tail.hash() },
        })),
        OutputFormat::Text => {
            let state = if status.is_terminal() {
                status.to_string().red().bold()
            } else {
                status.to_string().green()
            };
            println!("Ledger: {}", ledger.store().describe().bold());
            println!("Backend: {}", config.storage.backend.to_string().cyan());
            println!("State: {}", state);
            println!("Blocks: {}", len.to_string().bold());
            println!("Tail: {} {}", format!("#{}", tail.index()).yellow(), tail.hash().dimmed());
            Ok(())
        }
    }
}

fn read_record(args: &AppendArgs) -> anyhow::Result<Value> {
    let raw = match (&args.data, &args.file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) if path.as_os_str() == "-" => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("reading record from stdin")?;
            buf
        }
        (None, Some(path)) => read_file(path)?,
        (None, None) => bail!("no record given"),
    };
    parse_record(&raw)
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading record from {}", path.display()))
}

fn parse_record(raw: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).context("record is not valid JSON")
}

/// Resolve `selector` as a chain position, else as a full hash, else as a
/// unique hash prefix.
fn find_block(ledger: &CliLedger, selector: &str) -> anyhow::Result<Block> {
    if let Ok(index) = selector.parse::<u64>() {
        if let Some(block) = ledger.get(index)? {
            return Ok(block);
        }
    }
    if let Some(block) = ledger.find_by_hash(selector)? {
        return Ok(block);
    }

    let prefix = selector.to_ascii_lowercase();
    let mut matches = ledger
        .blocks()?
        .into_iter()
        .filter(|b| !prefix.is_empty() && b.hash().starts_with(&prefix));
    match (matches.next(), matches.next()) {
        (Some(block), None) => Ok(block),
        (Some(_), Some(_)) => bail!("hash prefix {selector} is ambiguous"),
        (None, _) => bail!("no block matches {selector}"),
    }
}

fn newest_first(mut blocks: Vec<Block>, limit: usize) -> Vec<Block> {
    blocks.reverse();
    blocks.truncate(limit);
    blocks
}

fn summarize(data: &Value) -> String {
    const WIDTH: usize = 60;
    let text = data.to_string();
    if text.chars().count() <= WIDTH {
        text
    } else {
        let cut: String = text.chars().take(WIDTH - 3).collect();
        format!("{cut}...")
    }
}

fn display_time(block: &Block) -> String {
    match block.created_at() {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string(),
        None => format!("{} ms", block.timestamp()),
    }
}

fn print_report(report: &IntegrityReport) {
    if report.is_valid() {
        println!("{} Chain integrity verified", "✓".green().bold());
    } else {
        println!("{} Chain integrity check failed", "✗".red().bold());
        for violation in &report.violations {
            println!(
                "  {} {} {}",
                format!("#{}", violation.index).yellow(),
                violation.invariant.to_string().red(),
                violation.detail
            );
        }
    }
    println!("  Blocks: {}", report.block_count.to_string().bold());
    if let Some(tail) = &report.tail_hash {
        println!("  Tail: {}", tail.dimmed());
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chainlog_ledger::LedgerStatus;

    use super::*;
    use crate::config::{BackendKind, StorageConfig};

    fn config_in(dir: &Path, backend: BackendKind) -> CliConfig {
        CliConfig {
            storage: StorageConfig {
                backend,
                path: dir.to_path_buf(),
                sync_writes: false,
            },
            ..CliConfig::default()
        }
    }

    fn append_args(data: &str) -> AppendArgs {
        AppendArgs {
            data: Some(data.into()),
            file: None,
        }
    }

    #[test]
    fn init_then_append_then_verify() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), BackendKind::Directory);

        cmd_init(&config, &OutputFormat::Json).unwrap();
        let register = append_args(r#"{"event":"register","name":"Alice"}"#);
        cmd_append(&config, &OutputFormat::Json, register).unwrap();
        let login = append_args(r#"{"event":"login","name":"Alice"}"#);
        cmd_append(&config, &OutputFormat::Text, login).unwrap();
        cmd_verify(&config, &OutputFormat::Text, VerifyArgs { all: false }).unwrap();
        cmd_verify(&config, &OutputFormat::Json, VerifyArgs { all: true }).unwrap();

        let ledger = open_ledger(&config, false).unwrap();
        assert_eq!(ledger.len().unwrap(), 3);
        assert_eq!(ledger.last_block().unwrap().data()["event"], "login");
    }

    #[test]
    fn log_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), BackendKind::Log);
        cmd_append(&config, &OutputFormat::Json, append_args(r#"{"n":1}"#)).unwrap();
        cmd_status(&config, &OutputFormat::Text).unwrap();
        assert!(dir.path().join(crate::config::LOG_FILE_NAME).is_file());
    }

    #[test]
    fn invalid_json_is_rejected_before_touching_storage() {
        let dir = tempfile::tempdir().unwrap();
        let store_dir = dir.path().join("ledger");
        let config = config_in(&store_dir, BackendKind::Directory);
        assert!(cmd_append(&config, &OutputFormat::Text, append_args("{not json")).is_err());
        assert!(!store_dir.exists());
    }

    #[test]
    fn record_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.json");
        fs::write(&path, r#"{"event":"upload","file":"a.pdf"}"#).unwrap();
        let args = AppendArgs {
            data: None,
            file: Some(path),
        };
        assert_eq!(read_record(&args).unwrap()["file"], "a.pdf");

        let missing = AppendArgs {
            data: None,
            file: Some(PathBuf::from("/nonexistent/event.json")),
        };
        assert!(read_record(&missing).is_err());
    }

    #[test]
    fn verify_fails_on_tampered_chain() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), BackendKind::Directory);
        cmd_append(&config, &OutputFormat::Text, append_args(r#"{"amount":10}"#)).unwrap();

        let path = dir.path().join("block_1.json");
        let mut raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        raw["data"]["amount"] = json!(1000);
        fs::write(&path, serde_json::to_vec_pretty(&raw).unwrap()).unwrap();

        assert!(cmd_verify(&config, &OutputFormat::Text, VerifyArgs { all: false }).is_err());
        assert!(cmd_verify(&config, &OutputFormat::Json, VerifyArgs { all: true }).is_err());
        assert!(cmd_append(&config, &OutputFormat::Text, append_args("{}")).is_err());

        let ledger = open_ledger(&config, true).unwrap();
        assert_eq!(ledger.status().unwrap(), LedgerStatus::Corrupted);
        cmd_status(&config, &OutputFormat::Json).unwrap();
    }

    #[test]
    fn find_block_by_index_hash_and_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), BackendKind::Directory);
        let ledger = open_ledger(&config, false).unwrap();
        let block = ledger.append(json!({"k": "v"})).unwrap();

        assert_eq!(find_block(&ledger, "1").unwrap(), block);
        assert_eq!(find_block(&ledger, block.hash()).unwrap(), block);
        assert_eq!(find_block(&ledger, &block.hash()[..16]).unwrap(), block);
        assert_eq!(find_block(&ledger, &block.hash()[..16].to_uppercase()).unwrap(), block);
        assert!(find_block(&ledger, "zz").is_err());
        assert!(find_block(&ledger, "").is_err());
    }

    #[test]
    fn newest_first_limits() {
        let blocks: Vec<Block> = (0..5)
            .map(|i| Block::with_timestamp(i, 1_000, json!({}), "0"))
            .collect();
        let picked = newest_first(blocks, 2);
        assert_eq!(picked.iter().map(Block::index).collect::<Vec<_>>(), vec![4, 3]);
    }

    #[test]
    fn summarize_truncates_long_records() {
        assert_eq!(summarize(&json!({"a":1})), r#"{"a":1}"#);
        let long = json!({ "text": "x".repeat(200) });
        let s = summarize(&long);
        assert!(s.ends_with("..."));
        assert_eq!(s.chars().count(), 60);
    }
}
