//! LLVM bitstream container.
//!
//! ```text
//! bytes ──► open_bitcode ──► BitReader ──► parse_bitstream ──► Vec<Entry>
//!           (wrapper strip)   (bits, VBR)   (blocks, abbrevs, records)
//! ```
//!
//! The container knows nothing about bitcode semantics; block and record codes
//! are interpreted by [`crate::ir::builder`].

pub mod abbrev;
pub mod parser;
pub mod reader;
pub mod writer;

pub use abbrev::{Abbrev, AbbrevOp, Operand};
pub use parser::{parse_bitstream, Block, BlockMeta, Entry, Record};
pub use reader::{BitReader, Vbr};
pub use writer::{AbbrevField, BitWriter};

use crate::error::TranslateError;
use anyhow::Result;

// Built-in abbreviation IDs.
pub const END_BLOCK: u64 = 0;
pub const ENTER_SUBBLOCK: u64 = 1;
pub const DEFINE_ABBREV: u64 = 2;
pub const UNABBREV_RECORD: u64 = 3;
/// First ID that selects a user-defined abbreviation.
pub const FIRST_APPLICATION_ABBREV: u64 = 4;

/// Abbreviation-ID width at the top level of a stream.
pub const ABBREV_ID_WIDTH: u32 = 2;

pub const BLOCKINFO_BLOCK_ID: u64 = 0;

// BLOCKINFO directives.
pub const BLOCKINFO_CODE_SETBID: u64 = 1;
pub const BLOCKINFO_CODE_BLOCKNAME: u64 = 2;
pub const BLOCKINFO_CODE_SETRECORDNAME: u64 = 3;

// Abbreviation operand encodings.
pub const FIXED_ENCODING: u64 = 1;
pub const VBR_ENCODING: u64 = 2;
pub const ARRAY_ENCODING: u64 = 3;
pub const CHAR6_ENCODING: u64 = 4;
pub const BLOB_ENCODING: u64 = 5;

/// `'BC' 0xC0DE` read as a little-endian word.
pub const BITCODE_MAGIC: u32 = 0xdec0_4342;
pub const WRAPPER_MAGIC: u32 = 0x0b17_c0de;
const WRAPPER_HEADER_LEN: usize = 20;

/// Return the raw bitstream inside `bytes`, stripping the optional wrapper header.
pub fn open_bitcode(bytes: &[u8]) -> Result<&[u8]> {
    let mut reader = BitReader::new(bytes);
    let magic = reader.read_u32_aligned()?;
    if magic == BITCODE_MAGIC {
        return Ok(bytes);
    }
    if magic != WRAPPER_MAGIC {
        return Err(TranslateError::format(0, format!("bad magic {:#010x}", magic)).into());
    }
    if bytes.len() < WRAPPER_HEADER_LEN {
        return Err(TranslateError::format(0, "truncated wrapper header").into());
    }
    let version = reader.read_u32_aligned()?;
    let offset = reader.read_u32_aligned()? as usize;
    let size = reader.read_u32_aligned()? as usize;
    let _cpu_type = reader.read_u32_aligned()?;
    if version != 0 {
        return Err(
            TranslateError::format(32, format!("unsupported wrapper version {}", version)).into(),
        );
    }
    offset
        .checked_add(size)
        .and_then(|end| bytes.get(offset..end))
        .ok_or_else(|| {
            TranslateError::format(
                64,
                format!("wrapper range {}+{} outside {} bytes", offset, size, bytes.len()),
            )
            .into()
        })
}
