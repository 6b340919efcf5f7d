use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chainlog_ledger::{BlockStore, LedgerOptions};
use chainlog_store::{DirectoryBlockStore, LogFileBlockStore};
use serde::{Deserialize, Serialize};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "chainlog.toml";

/// File name of the log backend inside the data directory.
pub const LOG_FILE_NAME: &str = "chain.log";

/// `chainlog.toml`:
///
/// ```toml
/// [storage]
/// backend = "directory"   # or "log"
/// path = "chainlog-data"
/// sync_writes = true
///
/// [ledger]
/// verify_on_load = true
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub storage: StorageConfig,
    pub ledger: LedgerOptions,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendKind,
    /// Data directory. The log backend keeps `chain.log` inside it.
    pub path: PathBuf,
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Directory,
            path: PathBuf::from("chainlog-data"),
            sync_writes: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One `block_<index>.json` file per block
    Directory,
    /// Single CRC-framed append-only file
    Log,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Directory => f.write_str("directory"),
            Self::Log => f.write_str("log"),
        }
    }
}

impl CliConfig {
    /// Load `explicit` if given (it must exist), else `./chainlog.toml` if it
    /// exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply command-line overrides.
    pub fn with_overrides(
        mut self,
        store_dir: Option<PathBuf>,
        backend: Option<BackendKind>,
    ) -> Self {
        if let Some(dir) = store_dir {
            self.storage.path = dir;
        }
        if let Some(backend) = backend {
            self.storage.backend = backend;
        }
        self
    }
}

impl StorageConfig {
    /// Build the configured backend. No I/O happens until the ledger loads.
    pub fn open_store(&self) -> Box<dyn BlockStore> {
        match self.backend {
            BackendKind::Directory => Box::new(
                DirectoryBlockStore::new(&self.path).with_sync_writes(self.sync_writes),
            ),
            BackendKind::Log => Box::new(
                LogFileBlockStore::new(self.path.join(LOG_FILE_NAME))
                    .with_sync_writes(self.sync_writes),
            ),
        }
    }
}
