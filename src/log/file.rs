//! File-backed log
//!
//! A single append-only file of CRC32-checked frames.
//!
//! ## File Format
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │ Frame 1                                           │
//! │ ┌─────────┬─────────┬───────────┬───────────────┐ │
//! │ │ Len (4) │ CRC (4) │ Flags (1) │ Payload (Len) │ │
//! │ └─────────┴─────────┴───────────┴───────────────┘ │
//! ├───────────────────────────────────────────────────┤
//! │ Frame 2 ...                                       │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! - CRC covers flags + payload
//! - The last frame of every `append` call carries `FLAG_COMMIT`; frames
//!   after the last commit belong to an interrupted append and are dropped
//!   on open, which is what makes multi-entry appends atomic

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::config::LogSyncStrategy;
use crate::error::{BrambleError, Result};

use super::Log;

/// Frame header: Len (4) + CRC (4) + Flags (1)
const FRAME_HEADER_SIZE: u64 = 9;

/// Set on the final frame of an append group
const FLAG_COMMIT: u8 = 0x01;

/// Largest payload a frame may declare (64 MB)
const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

/// Result of scanning the file on open
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Number of committed entries found
    pub entries_recovered: u64,

    /// Bytes removed from the tail (torn or uncommitted frames)
    pub bytes_truncated: u64,

    /// Whether the file was truncated
    pub was_truncated: bool,
}

/// Location of one entry's payload inside the file
#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: u64,
    len: u32,
}

/// Where appended frames go
trait FrameSink: Write + Send {
    fn sync_frames(&mut self) -> io::Result<()>;

    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl FrameSink for File {
    fn sync_frames(&mut self) -> io::Result<()> {
        self.sync_data()
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Append side, serialized by its mutex
struct Appender {
    sink: Box<dyn FrameSink>,
    /// End of the last committed frame; the file never holds more
    end: u64,
    unsynced: usize,
    strategy: LogSyncStrategy,
    /// Set when a failed append could not be rolled back
    poisoned: bool,
}

impl Appender {
    /// Write one encoded group and sync it if the strategy asks for it
    fn write_group(&mut self, buf: &[u8]) -> io::Result<()> {
        let should_sync = match self.strategy {
            LogSyncStrategy::EveryAppend => true,
            LogSyncStrategy::EveryNAppends { count } => self.unsynced + 1 >= count,
        };

        self.sink.write_all(buf)?;
        self.sink.flush()?;
        if should_sync {
            self.sink.sync_frames()?;
            self.unsynced = 0;
        } else {
            self.unsynced += 1;
        }
        Ok(())
    }
}

/// Log stored in a single append-only file
pub struct FileLog {
    path: PathBuf,
    appender: Mutex<Appender>,
    /// Shared handle for positional reads
    reader: File,
    index: RwLock<Vec<Slot>>,
    recovery: RecoveryStats,
}

impl FileLog {
    /// Open or create a log file
    ///
    /// On open:
    /// 1. Scan every frame and verify its checksum
    /// 2. Drop a torn or uncommitted tail
    /// 3. Build the in-memory position index
    pub fn open(path: &Path, strategy: LogSyncStrategy) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let file_len = file.metadata()?.len();
        let (slots, committed_end) = scan_frames(&mut file, file_len)?;

        let mut recovery = RecoveryStats {
            entries_recovered: slots.len() as u64,
            ..RecoveryStats::default()
        };

        if committed_end < file_len {
            tracing::warn!(
                path = %path.display(),
                committed_end,
                file_len,
                "truncating torn log tail"
            );
            file.set_len(committed_end)?;
            file.sync_all()?;
            recovery.bytes_truncated = file_len - committed_end;
            recovery.was_truncated = true;
        }

        tracing::debug!(
            path = %path.display(),
            entries = recovery.entries_recovered,
            "opened file log"
        );

        let reader = File::open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            appender: Mutex::new(Appender {
                sink: Box::new(file),
                end: committed_end,
                unsynced: 0,
                strategy,
                poisoned: false,
            }),
            reader,
            index: RwLock::new(slots),
            recovery,
        })
    }

    /// What the scan on open found
    pub fn recovery(&self) -> &RecoveryStats {
        &self.recovery
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Log for FileLog {
    fn append(&self, entries: &[Vec<u8>]) -> Result<u64> {
        let mut appender = self.appender.lock();

        if appender.poisoned {
            return Err(BrambleError::LogCorruption(
                "log is read-only after a failed rollback".to_string(),
            ));
        }
        if entries.is_empty() {
            return Ok(self.len());
        }

        let mut buf = Vec::new();
        let mut slots = Vec::with_capacity(entries.len());
        let mut offset = appender.end;

        for (i, payload) in entries.iter().enumerate() {
            let len = u32::try_from(payload.len())
                .ok()
                .filter(|len| *len <= MAX_FRAME_SIZE)
                .ok_or_else(|| {
                    BrambleError::Serialization(format!(
                        "log entry of {} bytes exceeds frame limit",
                        payload.len()
                    ))
                })?;
            let flags = if i + 1 == entries.len() { FLAG_COMMIT } else { 0 };

            let mut hasher = crc32fast::Hasher::new();
            hasher.update(&[flags]);
            hasher.update(payload);

            buf.extend_from_slice(&len.to_le_bytes());
            buf.extend_from_slice(&hasher.finalize().to_le_bytes());
            buf.push(flags);
            buf.extend_from_slice(payload);

            slots.push(Slot {
                offset: offset + FRAME_HEADER_SIZE,
                len,
            });
            offset += FRAME_HEADER_SIZE + len as u64;
        }

        if let Err(e) = appender.write_group(&buf) {
            // Nothing of a failed group may stay in the file, or the next
            // group's offsets would point at it
            let end = appender.end;
            if let Err(rollback) = appender.sink.truncate_to(end) {
                appender.poisoned = true;
                tracing::error!(
                    path = %self.path.display(),
                    end,
                    error = %rollback,
                    "could not roll back failed append, refusing further writes"
                );
                return Err(BrambleError::LogCorruption(format!(
                    "append failed ({}) and rollback to offset {} failed ({})",
                    e, end, rollback
                )));
            }
            tracing::warn!(path = %self.path.display(), error = %e, "append rolled back");
            return Err(e.into());
        }
        appender.end = offset;

        let mut index = self.index.write();
        index.extend(slots);
        Ok(index.len() as u64)
    }

    fn get(&self, position: u64) -> Result<Bytes> {
        let slot = {
            let index = self.index.read();
            match index.get(position as usize) {
                Some(slot) => *slot,
                None => {
                    return Err(BrambleError::EntryUnavailable {
                        position,
                        length: index.len() as u64,
                    })
                }
            }
        };

        let mut payload = vec![0u8; slot.len as usize];
        read_exact_at(&self.reader, &mut payload, slot.offset)?;
        Ok(Bytes::from(payload))
    }

    fn len(&self) -> u64 {
        self.index.read().len() as u64
    }

    fn sync(&self) -> Result<()> {
        let mut appender = self.appender.lock();
        appender.sink.sync_frames()?;
        appender.unsynced = 0;
        Ok(())
    }
}

/// Fill `buf` from `offset` without touching a shared cursor
#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(io::Error::from(ErrorKind::UnexpectedEof)),
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Scan all frames from the start of the file
///
/// Returns the committed slots and the offset just past the last committed
/// frame. A damaged frame that reaches the end of the file is a torn write
/// and ends the scan; damage with more data behind it is corruption.
fn scan_frames(file: &mut File, file_len: u64) -> Result<(Vec<Slot>, u64)> {
    file.seek(SeekFrom::Start(0))?;
    let mut reader = BufReader::new(&*file);

    let mut committed = Vec::new();
    let mut pending = Vec::new();
    let mut committed_end = 0u64;
    let mut offset = 0u64;

    while offset < file_len {
        if file_len - offset < FRAME_HEADER_SIZE {
            break;
        }

        let mut header = [0u8; FRAME_HEADER_SIZE as usize];
        if let Err(e) = reader.read_exact(&mut header) {
            if e.kind() == ErrorKind::UnexpectedEof {
                break;
            }
            return Err(e.into());
        }

        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let flags = header[8];

        if len > MAX_FRAME_SIZE {
            return Err(BrambleError::LogCorruption(format!(
                "frame at offset {} declares {} bytes",
                offset, len
            )));
        }

        let frame_end = offset + FRAME_HEADER_SIZE + len as u64;
        if frame_end > file_len {
            break;
        }

        let mut payload = vec![0u8; len as usize];
        reader.read_exact(&mut payload)?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&[flags]);
        hasher.update(&payload);
        if hasher.finalize() != crc {
            if frame_end == file_len {
                break;
            }
            return Err(BrambleError::LogCorruption(format!(
                "checksum mismatch in frame at offset {}",
                offset
            )));
        }

        pending.push(Slot {
            offset: offset + FRAME_HEADER_SIZE,
            len,
        });
        offset = frame_end;

        if flags & FLAG_COMMIT != 0 {
            committed.append(&mut pending);
            committed_end = offset;
        }
    }

    Ok((committed, committed_end))
}
