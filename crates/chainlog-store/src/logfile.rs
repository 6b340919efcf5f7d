use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chainlog_types::Block;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::BlockStore;

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

/// Upper bound on a single record, to reject garbage length fields.
const MAX_RECORD_SIZE: u32 = 64 * 1024 * 1024;

/// Single-file, append-only block store.
///
/// On-disk format, one frame per block:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (JSON-encoded Block)]
/// ```
///
/// A frame cut short by a crash can only be the last one. `initialize`
/// truncates such a torn tail so the file ends on a frame boundary. A
/// complete frame whose CRC or payload does not check out is corruption and
/// is reported, never skipped.
pub struct LogFileBlockStore {
    path: PathBuf,
    sync_writes: bool,
    writer: Mutex<Option<LogWriter>>,
}

/// Mutable state owned by the open store.
struct LogWriter {
    file: File,
    /// End of the last complete frame.
    offset: u64,
    indices: BTreeSet<u64>,
}

/// One complete frame read back from disk.
struct Frame {
    offset: u64,
    expected_crc: u32,
    payload: Vec<u8>,
}

impl Frame {
    fn decode(&self) -> StoreResult<Block> {
        let actual = crc32fast::hash(&self.payload);
        if actual != self.expected_crc {
            return Err(StoreError::Corrupt {
                offset: self.offset,
                reason: format!(
                    "CRC mismatch: expected {:#010x}, got {actual:#010x}",
                    self.expected_crc
                ),
            });
        }
        serde_json::from_slice(&self.payload).map_err(|e| StoreError::Corrupt {
            offset: self.offset,
            reason: e.to_string(),
        })
    }
}

/// Little-endian `u32` at `at`. The caller guarantees four bytes are there.
fn read_u32_le(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Frames read from a log, plus where the valid prefix ends.
struct Scan {
    frames: Vec<Frame>,
    valid_len: u64,
    file_len: u64,
}

impl LogFileBlockStore {
    /// Store backed by the file at `path`. No I/O until [`BlockStore::initialize`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sync_writes: false,
            writer: Mutex::new(None),
        }
    }

    /// `fsync` after every appended frame.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every complete frame. Stops at the first incomplete one.
    fn scan(path: &Path) -> StoreResult<Scan> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;
        let file_len = bytes.len() as u64;

        let mut frames = Vec::new();
        let mut pos = 0usize;
        while pos + HEADER_SIZE <= bytes.len() {
            let length = read_u32_le(&bytes, pos);
            let expected_crc = read_u32_le(&bytes, pos + 4);

            if length == 0 || length > MAX_RECORD_SIZE {
                return Err(StoreError::Corrupt {
                    offset: pos as u64,
                    reason: format!("invalid frame length {length}"),
                });
            }

            let start = pos + HEADER_SIZE;
            let end = start + length as usize;
            if end > bytes.len() {
                break;
            }

            frames.push(Frame {
                offset: pos as u64,
                expected_crc,
                payload: bytes[start..end].to_vec(),
            });
            pos = end;
        }

        Ok(Scan {
            frames,
            valid_len: pos as u64,
            file_len,
        })
    }

    fn encode_frame(block: &Block) -> StoreResult<Vec<u8>> {
        let payload =
            serde_json::to_vec(block).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .ok()
            .filter(|len| *len <= MAX_RECORD_SIZE)
            .ok_or_else(|| {
                StoreError::Serialization(format!(
                    "record of {} bytes is too large",
                    payload.len()
                ))
            })?;
        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }
}

impl BlockStore for LogFileBlockStore {
    fn initialize(&self) -> StoreResult<()> {
        let mut guard = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        if guard.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        let scan = Self::scan(&self.path)?;
        if scan.valid_len < scan.file_len {
            warn!(
                path = %self.path.display(),
                valid_len = scan.valid_len,
                file_len = scan.file_len,
                "torn frame at end of block log; truncating"
            );
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }

        // Indices of frames that fail to decode are left out here;
        // `list_ordered` reports those frames as corrupt.
        let indices = scan
            .frames
            .iter()
            .filter_map(|frame| frame.decode().ok())
            .map(|block| block.index())
            .collect();

        info!(path = %self.path.display(), frames = scan.frames.len(), "block log opened");
        *guard = Some(LogWriter {
            file,
            offset: scan.valid_len,
            indices,
        });
        Ok(())
    }

    fn put(&self, index: u64, block: &Block) -> StoreResult<()> {
        if block.index() != index {
            return Err(StoreError::IndexMismatch {
                key: index,
                record: block.index(),
            });
        }

        let mut guard = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        let w = guard.as_mut().ok_or(StoreError::NotInitialized)?;
        if w.indices.contains(&index) {
            return Err(StoreError::AlreadyExists { index });
        }

        let frame = Self::encode_frame(block)?;
        let written = w.file.write_all(&frame).and_then(|()| {
            if self.sync_writes {
                w.file.sync_data()
            } else {
                w.file.flush()
            }
        });
        if let Err(e) = written {
            // Roll back whatever part of the frame reached the file.
            if let Err(rollback) = w.file.set_len(w.offset) {
                warn!(index, error = %rollback, "failed to roll back partial frame");
            }
            return Err(e.into());
        }

        let entry_offset = w.offset;
        w.offset += frame.len() as u64;
        w.indices.insert(index);

        debug!(index, offset = entry_offset, len = frame.len(), "block frame appended");
        Ok(())
    }

    fn list_ordered(&self) -> StoreResult<Vec<Block>> {
        let scan = Self::scan(&self.path)?;
        if scan.valid_len < scan.file_len {
            warn!(
                path = %self.path.display(),
                valid_len = scan.valid_len,
                "ignoring torn frame at end of block log"
            );
        }

        let mut blocks = scan
            .frames
            .iter()
            .map(Frame::decode)
            .collect::<StoreResult<Vec<Block>>>()?;
        blocks.sort_by_key(Block::index);
        Ok(blocks)
    }

    fn len(&self) -> StoreResult<u64> {
        let guard = self.writer.lock().map_err(|_| StoreError::LockPoisoned)?;
        match guard.as_ref() {
            Some(w) => Ok(w.indices.len() as u64),
            None => Ok(self.list_ordered()?.len() as u64),
        }
    }

    fn describe(&self) -> String {
        format!("log:{}", self.path.display())
    }
}

impl std::fmt::Debug for LogFileBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogFileBlockStore")
            .field("path", &self.path)
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}
