//! Bitstream writer, the encoding mirror of [`BitReader`](super::BitReader).
//!
//! Used to synthesize well-formed (or deliberately malformed) streams: tests
//! build bitcode modules with it instead of shipping binary fixtures.

use super::abbrev::{Abbrev, AbbrevOp};
use super::{
    ABBREV_ID_WIDTH, CHAR6_ENCODING, DEFINE_ABBREV, END_BLOCK, ENTER_SUBBLOCK, UNABBREV_RECORD,
};
use crate::bitstream::reader::CHAR6_ALPHABET;

/// Fields of an abbreviated record, in template order (literals are skipped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbbrevField {
    Scalar(u64),
    Array(Vec<u64>),
    Blob(Vec<u8>),
}

/// Open block: the abbreviation width to restore and the length word to patch.
#[derive(Debug)]
struct OpenBlock {
    outer_width: u32,
    length_word: usize,
}

/// Little-endian bit writer with block bookkeeping.
#[derive(Debug)]
pub struct BitWriter {
    bytes: Vec<u8>,
    current: u64,
    current_bits: u32,
    abbrev_width: u32,
    blocks: Vec<OpenBlock>,
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            current: 0,
            current_bits: 0,
            abbrev_width: ABBREV_ID_WIDTH,
            blocks: Vec::new(),
        }
    }

    /// Total bits written so far.
    pub fn bit_len(&self) -> u64 {
        self.bytes.len() as u64 * 8 + u64::from(self.current_bits)
    }

    pub fn write_bits(&mut self, value: u64, width: u32) {
        for bit in 0..width {
            self.current |= ((value >> bit) & 1) << self.current_bits;
            self.current_bits += 1;
            if self.current_bits == 8 {
                self.bytes.push(self.current as u8);
                self.current = 0;
                self.current_bits = 0;
            }
        }
    }

    pub fn write_vbr(&mut self, mut value: u64, width: u32) {
        let payload = width - 1;
        let continuation = 1u64 << payload;
        loop {
            let chunk = value & (continuation - 1);
            value >>= payload;
            if value == 0 {
                self.write_bits(chunk, width);
                break;
            }
            self.write_bits(chunk | continuation, width);
        }
    }

    pub fn write_char6(&mut self, c: char) {
        let code = CHAR6_ALPHABET
            .iter()
            .position(|&b| char::from(b) == c)
            .unwrap_or(0);
        self.write_bits(code as u64, 6);
    }

    /// Pad with zero bits up to the next 32-bit boundary.
    pub fn align32(&mut self) {
        if self.current_bits > 0 {
            self.write_bits(0, 8 - self.current_bits);
        }
        while self.bytes.len() % 4 != 0 {
            self.bytes.push(0);
        }
    }

    pub fn write_u32_aligned(&mut self, word: u32) {
        self.align32();
        self.bytes.extend_from_slice(&word.to_le_bytes());
    }

    /// Write the `'BC' 0xC0DE` bitstream magic.
    pub fn write_magic(&mut self) {
        for byte in [0x42u64, 0x43, 0xc0, 0xde] {
            self.write_bits(byte, 8);
        }
    }

    /// ENTER_SUBBLOCK with a placeholder length word, patched by `end_block`.
    pub fn enter_block(&mut self, block_id: u64, abbrev_width: u32) {
        self.write_bits(ENTER_SUBBLOCK, self.abbrev_width);
        self.write_vbr(block_id, 8);
        self.write_vbr(u64::from(abbrev_width), 4);
        self.align32();
        let length_word = self.bytes.len();
        self.bytes.extend_from_slice(&[0, 0, 0, 0]);
        self.blocks.push(OpenBlock {
            outer_width: self.abbrev_width,
            length_word,
        });
        self.abbrev_width = abbrev_width;
    }

    pub fn end_block(&mut self) {
        self.write_bits(END_BLOCK, self.abbrev_width);
        self.align32();
        if let Some(open) = self.blocks.pop() {
            let words = ((self.bytes.len() - open.length_word - 4) / 4) as u32;
            self.bytes[open.length_word..open.length_word + 4]
                .copy_from_slice(&words.to_le_bytes());
            self.abbrev_width = open.outer_width;
        }
    }

    /// UNABBREV_RECORD: code and operands as VBR6.
    pub fn record(&mut self, code: u64, ops: &[u64]) {
        self.write_bits(UNABBREV_RECORD, self.abbrev_width);
        self.write_vbr(code, 6);
        self.write_vbr(ops.len() as u64, 6);
        for &op in ops {
            self.write_vbr(op, 6);
        }
    }

    /// Record whose operands are the characters of `text`.
    pub fn string_record(&mut self, code: u64, prefix: &[u64], text: &str) {
        let mut ops = prefix.to_vec();
        ops.extend(text.bytes().map(u64::from));
        self.record(code, &ops);
    }

    pub fn define_abbrev(&mut self, abbrev: &Abbrev) {
        self.write_bits(DEFINE_ABBREV, self.abbrev_width);
        let num_ops: usize = abbrev
            .ops
            .iter()
            .map(|op| if matches!(op, AbbrevOp::Array(_)) { 2 } else { 1 })
            .sum();
        self.write_vbr(num_ops as u64, 5);
        for op in &abbrev.ops {
            self.write_abbrev_op(op);
        }
    }

    fn write_abbrev_op(&mut self, op: &AbbrevOp) {
        match op {
            AbbrevOp::Literal(value) => {
                self.write_bits(1, 1);
                self.write_vbr(*value, 8);
            }
            AbbrevOp::Fixed(width) | AbbrevOp::Vbr(width) => {
                self.write_bits(0, 1);
                self.write_bits(op.encoding_tag(), 3);
                self.write_vbr(u64::from(*width), 5);
            }
            AbbrevOp::Array(element) => {
                self.write_bits(0, 1);
                self.write_bits(op.encoding_tag(), 3);
                self.write_abbrev_op(element);
            }
            AbbrevOp::Char6 | AbbrevOp::Blob => {
                self.write_bits(0, 1);
                self.write_bits(op.encoding_tag(), 3);
            }
        }
    }

    /// Abbreviated record using template `abbrev` registered under `abbrev_id`.
    ///
    /// `fields` supplies one entry per non-literal operand, in order.
    pub fn abbrev_record(&mut self, abbrev_id: u64, abbrev: &Abbrev, fields: &[AbbrevField]) {
        self.write_bits(abbrev_id, self.abbrev_width);
        let mut fields = fields.iter();
        for op in &abbrev.ops {
            if matches!(op, AbbrevOp::Literal(_)) {
                continue;
            }
            match (op, fields.next()) {
                (AbbrevOp::Array(element), Some(AbbrevField::Array(items))) => {
                    self.write_vbr(items.len() as u64, 6);
                    for &item in items {
                        self.write_scalar(element, item);
                    }
                }
                (AbbrevOp::Blob, Some(AbbrevField::Blob(bytes))) => {
                    self.write_vbr(bytes.len() as u64, 6);
                    self.align32();
                    self.bytes.extend_from_slice(bytes);
                    self.align32();
                }
                (_, Some(AbbrevField::Scalar(value))) => self.write_scalar(op, *value),
                _ => {}
            }
        }
    }

    fn write_scalar(&mut self, op: &AbbrevOp, value: u64) {
        match op {
            AbbrevOp::Fixed(width) => self.write_bits(value, *width),
            AbbrevOp::Vbr(width) => self.write_vbr(value, *width),
            AbbrevOp::Char6 => self.write_bits(value, 6),
            _ => {}
        }
    }

    /// Flush the partial byte and return the buffer.
    pub fn into_bytes(mut self) -> Vec<u8> {
        if self.current_bits > 0 {
            self.bytes.push(self.current as u8);
        }
        self.bytes
    }
}

impl AbbrevOp {
    fn encoding_tag(&self) -> u64 {
        match self {
            AbbrevOp::Literal(_) => 0,
            AbbrevOp::Fixed(_) => super::FIXED_ENCODING,
            AbbrevOp::Vbr(_) => super::VBR_ENCODING,
            AbbrevOp::Array(_) => super::ARRAY_ENCODING,
            AbbrevOp::Char6 => CHAR6_ENCODING,
            AbbrevOp::Blob => super::BLOB_ENCODING,
        }
    }
}
