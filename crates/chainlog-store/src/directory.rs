use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chainlog_types::Block;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::BlockStore;

const RECORD_PREFIX: &str = "block_";
const RECORD_SUFFIX: &str = ".json";

/// Directory-backed block store: one JSON file per block.
///
/// Layout:
/// ```text
/// <root>/block_0.json
/// <root>/block_1.json
/// ...
/// ```
///
/// Each record is first written to a temporary file inside `<root>` and then
/// linked into place without clobbering, so a crash never leaves a partial
/// `block_<n>.json` behind and an existing record is never replaced.
/// Unrelated files in the directory are ignored.
#[derive(Debug)]
pub struct DirectoryBlockStore {
    root: PathBuf,
    sync_writes: bool,
}

impl DirectoryBlockStore {
    /// Store rooted at `root`. No I/O happens until [`BlockStore::initialize`].
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sync_writes: false,
        }
    }

    /// `fsync` every record before it is linked into place.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record for `index`.
    pub fn record_path(&self, index: u64) -> PathBuf {
        self.root.join(format!("{RECORD_PREFIX}{index}{RECORD_SUFFIX}"))
    }

    fn read_record(path: &Path) -> StoreResult<Block> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Malformed {
            location: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Parse the index out of a `block_<index>.json` file name.
fn record_index(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix(RECORD_PREFIX)?
        .strip_suffix(RECORD_SUFFIX)?
        .parse()
        .ok()
}

impl BlockStore for DirectoryBlockStore {
    fn initialize(&self) -> StoreResult<()> {
        fs::create_dir_all(&self.root)?;
        if !self.root.is_dir() {
            return Err(StoreError::Io(io::Error::other(format!(
                "{} is not a directory",
                self.root.display()
            ))));
        }
        Ok(())
    }

    fn put(&self, index: u64, block: &Block) -> StoreResult<()> {
        if block.index() != index {
            return Err(StoreError::IndexMismatch {
                key: index,
                record: block.index(),
            });
        }

        let target = self.record_path(index);
        if target.exists() {
            return Err(StoreError::AlreadyExists { index });
        }

        let encoded = serde_json::to_vec_pretty(block)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&encoded)?;
        tmp.flush()?;
        if self.sync_writes {
            tmp.as_file().sync_all()?;
        }

        // The temp file is removed on drop if persisting fails.
        tmp.persist_noclobber(&target).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                StoreError::AlreadyExists { index }
            } else {
                StoreError::Io(e.error)
            }
        })?;

        debug!(index, path = %target.display(), bytes = encoded.len(), "block record written");
        Ok(())
    }

    fn list_ordered(&self) -> StoreResult<Vec<Block>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(index) = file_name.to_str().and_then(record_index) else {
                continue;
            };
            if !entry.file_type()?.is_file() {
                continue;
            }

            let block = Self::read_record(&entry.path())?;
            if block.index() != index {
                warn!(
                    file_index = index,
                    record_index = block.index(),
                    "record file name and contents disagree"
                );
            }
            records.push((index, block));
        }

        // Numeric, not lexical: block_10 sorts after block_9.
        records.sort_by_key(|(index, _)| *index);
        debug!(count = records.len(), root = %self.root.display(), "block records listed");
        Ok(records.into_iter().map(|(_, block)| block).collect())
    }

    fn len(&self) -> StoreResult<u64> {
        let mut count = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let is_record = entry.file_name().to_str().and_then(record_index).is_some();
            if is_record && entry.file_type()?.is_file() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn describe(&self) -> String {
        format!("directory:{}", self.root.display())
    }
}
