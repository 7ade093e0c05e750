//! Bit-granular cursor over a byte buffer.
//!
//! Bits are consumed least-significant first, one byte at a time, which is the
//! order the LLVM bitstream container writes them in.

use crate::error::TranslateError;
use anyhow::Result;

/// Alphabet for 6-bit character fields.
pub const CHAR6_ALPHABET: &[u8; 64] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._";

/// Place value at which VBR decoding stops producing a plain number.
const VBR_WIDE_THRESHOLD_BITS: u32 = 32;

/// Decoded VBR field.
///
/// Small values come back as a number. Once the place value of a chunk reaches
/// 2^32 the value is returned as a little-endian byte buffer instead, padded to
/// a multiple of 8 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Vbr {
    Word(u64),
    Wide(Vec<u8>),
}

impl Vbr {
    /// Numeric value when it fits in 64 bits, whichever shape it came in.
    pub fn to_u64(&self) -> Option<u64> {
        match self {
            Vbr::Word(v) => Some(*v),
            Vbr::Wide(bytes) => fold_le_bytes(bytes),
        }
    }
}

/// Fold a little-endian byte buffer into a u64, rejecting significant bytes past the eighth.
pub fn fold_le_bytes(bytes: &[u8]) -> Option<u64> {
    if bytes.iter().skip(8).any(|&b| b != 0) {
        return None;
    }
    Some(
        bytes
            .iter()
            .take(8)
            .enumerate()
            .fold(0u64, |acc, (i, &b)| acc | (u64::from(b) << (8 * i))),
    )
}

/// Cursor over a bitstream buffer.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Index of the next byte to pull into `buffer`.
    position: usize,
    buffer: u64,
    buffer_size: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            buffer: 0,
            buffer_size: 0,
        }
    }

    /// Current position in bits from the start of the buffer.
    pub fn bit_offset(&self) -> u64 {
        self.position as u64 * 8 - u64::from(self.buffer_size)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.data.len() && self.buffer_size == 0
    }

    fn error(&self, reason: impl Into<String>) -> anyhow::Error {
        TranslateError::format(self.bit_offset(), reason).into()
    }

    /// Read the next `size` bits (0..=64).
    pub fn read_bits(&mut self, size: u32) -> Result<u64> {
        if size > 64 {
            return Err(self.error(format!("bit width {} out of range", size)));
        }
        if size > 23 {
            // Two sub-reads keep the accumulator well inside 64 bits.
            let low = self.read_bits(16)?;
            let high = self.read_bits(size - 16)?;
            return Ok((high << 16) | low);
        }
        while self.buffer_size < size {
            let Some(&byte) = self.data.get(self.position) else {
                return Err(self.error("EOF"));
            };
            self.buffer |= u64::from(byte) << self.buffer_size;
            self.position += 1;
            self.buffer_size += 8;
        }
        let result = self.buffer & ((1u64 << size) - 1);
        self.buffer >>= size;
        self.buffer_size -= size;
        Ok(result)
    }

    /// Read a little-endian 32-bit word from a 4-byte aligned position.
    pub fn read_u32_aligned(&mut self) -> Result<u32> {
        if self.position & 3 != 0 || self.buffer_size != 0 {
            return Err(self.error("Unaligned"));
        }
        let bytes = self
            .data
            .get(self.position..self.position + 4)
            .ok_or_else(|| self.error("EOF"))?;
        let word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        self.position += 4;
        Ok(word)
    }

    /// Take `len` raw bytes from a byte-aligned position.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.buffer_size != 0 {
            return Err(self.error("Unaligned"));
        }
        let end = self
            .position
            .checked_add(len)
            .ok_or_else(|| self.error("EOF"))?;
        let data = self.data;
        let bytes = data
            .get(self.position..end)
            .ok_or_else(|| self.error("EOF"))?;
        self.position = end;
        Ok(bytes)
    }

    /// Round the cursor up to the next 32-bit boundary, discarding buffered bits.
    pub fn align(&mut self) {
        self.position = (self.position + 3) & !3;
        self.buffer = 0;
        self.buffer_size = 0;
    }

    /// Read a variable bit-rate integer made of `size`-bit chunks.
    pub fn read_vbr(&mut self, size: u32) -> Result<Vbr> {
        if !(2..=32).contains(&size) {
            return Err(self.error(format!("VBR width {} out of range", size)));
        }
        let payload_bits = size - 1;
        let continuation = 1u64 << payload_bits;
        let mut sink = LeBitSink::default();
        let mut wide = false;
        loop {
            let chunk = self.read_bits(size)?;
            if sink.bit_len >= VBR_WIDE_THRESHOLD_BITS as usize {
                wide = true;
            }
            sink.push(chunk & (continuation - 1), payload_bits);
            if chunk & continuation == 0 {
                break;
            }
        }
        if wide {
            let mut bytes = sink.bytes;
            while bytes.len() % 8 != 0 {
                bytes.push(0);
            }
            Ok(Vbr::Wide(bytes))
        } else {
            // Non-wide values span fewer than 32 + 31 payload bits.
            Ok(Vbr::Word(fold_le_bytes(&sink.bytes).unwrap_or_default()))
        }
    }

    /// Read a VBR field that must fit in 64 bits.
    pub fn read_vbr_u64(&mut self, size: u32) -> Result<u64> {
        let offset = self.bit_offset();
        self.read_vbr(size)?.to_u64().ok_or_else(|| {
            TranslateError::format(offset, "VBR value does not fit in 64 bits").into()
        })
    }

    /// Read a 6-bit character.
    pub fn read_char6(&mut self) -> Result<char> {
        let code = self.read_bits(6)?;
        Ok(char::from(CHAR6_ALPHABET[code as usize]))
    }
}

/// Little-endian bit accumulator backing the wide VBR shape.
#[derive(Default)]
struct LeBitSink {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl LeBitSink {
    fn push(&mut self, value: u64, width: u32) {
        for bit in 0..width {
            let byte = self.bit_len / 8;
            if byte == self.bytes.len() {
                self.bytes.push(0);
            }
            if (value >> bit) & 1 == 1 {
                self.bytes[byte] |= 1 << (self.bit_len % 8);
            }
            self.bit_len += 1;
        }
    }
}
