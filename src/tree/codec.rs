//! Record codec
//!
//! Encoding and decoding of log records.
//!
//! ## Record Format
//! ```text
//! ┌──────────┬──────────────────────────────────────┐
//! │ CRC (4)  │        bincode(Record)               │
//! └──────────┴──────────────────────────────────────┘
//! ```
//!
//! bincode runs with fixed-width little-endian integers and rejects
//! trailing bytes, so identical records always produce identical bytes and
//! every byte of an entry is accounted for.

use bincode::Options;

use crate::error::{BrambleError, Result};

use super::{Block, Header, Record};

/// Magic bytes identifying a Bramble log header
pub const MAGIC: [u8; 4] = *b"BRBL";

/// Current record format version
pub const FORMAT_VERSION: u16 = 1;

/// CRC prefix size
pub const CHECKSUM_SIZE: usize = 4;

/// Largest record the codec will produce or accept (64 MB)
pub const MAX_RECORD_SIZE: u64 = 64 * 1024 * 1024;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
        .with_limit(MAX_RECORD_SIZE)
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a record with its checksum
pub fn encode_record(record: &Record) -> Result<Vec<u8>> {
    let payload = options()
        .serialize(record)
        .map_err(|e| BrambleError::Serialization(e.to_string()))?;

    let mut bytes = Vec::with_capacity(CHECKSUM_SIZE + payload.len());
    bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Build the header record for a new log
pub fn encode_header(max_entries: u16, comparator: &str) -> Result<Vec<u8>> {
    encode_record(&Record::Header(Header {
        magic: MAGIC,
        format_version: FORMAT_VERSION,
        max_entries,
        comparator: comparator.to_string(),
    }))
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a record, verifying its checksum
pub fn decode_record(bytes: &[u8]) -> Result<Record> {
    if bytes.len() < CHECKSUM_SIZE {
        return Err(BrambleError::CorruptNode(format!(
            "record too short: {} bytes",
            bytes.len()
        )));
    }

    let (crc_bytes, payload) = bytes.split_at(CHECKSUM_SIZE);
    let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    let actual = crc32fast::hash(payload);
    if expected != actual {
        return Err(BrambleError::CorruptNode(format!(
            "checksum mismatch: expected {:08x}, got {:08x}",
            expected, actual
        )));
    }

    options()
        .deserialize(payload)
        .map_err(|e| BrambleError::CorruptNode(e.to_string()))
}

/// Decode the header stored at log position 0
pub fn decode_header(bytes: &[u8]) -> Result<Header> {
    match decode_record(bytes)? {
        Record::Header(header) => {
            if header.magic != MAGIC {
                return Err(BrambleError::IncompatibleLog(format!(
                    "bad magic {:?}",
                    header.magic
                )));
            }
            if header.format_version != FORMAT_VERSION {
                return Err(BrambleError::IncompatibleLog(format!(
                    "unsupported format version {}",
                    header.format_version
                )));
            }
            Ok(header)
        }
        Record::Block(_) => Err(BrambleError::IncompatibleLog(
            "log does not start with a header".to_string(),
        )),
    }
}

/// Decode a node block
pub fn decode_block(bytes: &[u8]) -> Result<Block> {
    match decode_record(bytes)? {
        Record::Block(block) => Ok(block),
        Record::Header(_) => Err(BrambleError::CorruptNode(
            "expected a node block, found a header".to_string(),
        )),
    }
}
