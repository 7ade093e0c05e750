//! Abbreviation templates (DEFINE_ABBREV) and abbreviated record decoding.

use super::reader::{BitReader, Vbr};
use super::{ARRAY_ENCODING, BLOB_ENCODING, CHAR6_ENCODING, FIXED_ENCODING, VBR_ENCODING};
use crate::error::TranslateError;
use anyhow::Result;

/// One operand of an abbreviation template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbbrevOp {
    /// Value replayed without consuming bits.
    Literal(u64),
    Fixed(u32),
    Vbr(u32),
    /// VBR6 length followed by that many elements of the inner encoding.
    Array(Box<AbbrevOp>),
    Char6,
    /// VBR6 length, 32-bit alignment, raw bytes, 32-bit alignment.
    Blob,
}

/// A record template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abbrev {
    pub ops: Vec<AbbrevOp>,
}

/// Decoded operand of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Int(u64),
    /// VBR value past the numeric range (little-endian bytes).
    Wide(Vec<u8>),
    Blob(Vec<u8>),
}

impl Operand {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Operand::Int(v) => Some(*v),
            Operand::Wide(bytes) => super::reader::fold_le_bytes(bytes),
            Operand::Blob(_) => None,
        }
    }
}

impl From<Vbr> for Operand {
    fn from(v: Vbr) -> Self {
        match v {
            Vbr::Word(v) => Operand::Int(v),
            Vbr::Wide(bytes) => Operand::Wide(bytes),
        }
    }
}

impl Abbrev {
    /// Read the body of a DEFINE_ABBREV (the abbreviation ID is already consumed).
    pub fn read_definition(reader: &mut BitReader<'_>) -> Result<Abbrev> {
        let start = reader.bit_offset();
        let num_ops = reader.read_vbr_u64(5)? as usize;
        let mut ops = Vec::with_capacity(num_ops);
        let mut i = 0;
        while i < num_ops {
            let is_literal = reader.read_bits(1)? == 1;
            if is_literal {
                ops.push(AbbrevOp::Literal(reader.read_vbr_u64(8)?));
                i += 1;
                continue;
            }
            let encoding = reader.read_bits(3)?;
            let op = match encoding {
                FIXED_ENCODING => AbbrevOp::Fixed(read_width(reader)?),
                VBR_ENCODING => AbbrevOp::Vbr(read_width(reader)?),
                CHAR6_ENCODING => AbbrevOp::Char6,
                ARRAY_ENCODING => {
                    if i + 2 != num_ops {
                        return Err(TranslateError::format(
                            start,
                            "array operand must be second-to-last in an abbreviation",
                        )
                        .into());
                    }
                    let element = read_array_element(reader, start)?;
                    i += 1;
                    AbbrevOp::Array(Box::new(element))
                }
                BLOB_ENCODING => {
                    if i + 1 != num_ops {
                        return Err(TranslateError::format(
                            start,
                            "blob operand must be last in an abbreviation",
                        )
                        .into());
                    }
                    AbbrevOp::Blob
                }
                other => {
                    return Err(TranslateError::format(
                        start,
                        format!("unknown abbreviation encoding {}", other),
                    )
                    .into())
                }
            };
            ops.push(op);
            i += 1;
        }
        Ok(Abbrev { ops })
    }

    /// Decode one abbreviated record: `(code, operands)`.
    pub fn read_record(&self, reader: &mut BitReader<'_>) -> Result<(u64, Vec<Operand>)> {
        let start = reader.bit_offset();
        let mut values = Vec::new();
        for op in &self.ops {
            match op {
                AbbrevOp::Array(element) => {
                    let len = reader.read_vbr_u64(6)?;
                    for _ in 0..len {
                        values.push(read_scalar(reader, element)?);
                    }
                }
                AbbrevOp::Blob => {
                    let len = reader.read_vbr_u64(6)? as usize;
                    reader.align();
                    let bytes = reader.read_bytes(len)?.to_vec();
                    reader.align();
                    values.push(Operand::Blob(bytes));
                }
                scalar => values.push(read_scalar(reader, scalar)?),
            }
        }
        if values.is_empty() {
            return Err(TranslateError::format(start, "abbreviated record without a code").into());
        }
        let code = values.remove(0).as_u64().ok_or_else(|| {
            anyhow::Error::from(TranslateError::format(start, "record code is not a number"))
        })?;
        Ok((code, values))
    }
}

fn read_width(reader: &mut BitReader<'_>) -> Result<u32> {
    let offset = reader.bit_offset();
    let width = reader.read_vbr_u64(5)?;
    if width > 64 {
        return Err(TranslateError::format(offset, format!("operand width {} too large", width)).into());
    }
    Ok(width as u32)
}

fn read_array_element(reader: &mut BitReader<'_>, start: u64) -> Result<AbbrevOp> {
    if reader.read_bits(1)? == 1 {
        return Err(TranslateError::format(start, "literal array element encoding").into());
    }
    match reader.read_bits(3)? {
        FIXED_ENCODING => Ok(AbbrevOp::Fixed(read_width(reader)?)),
        VBR_ENCODING => Ok(AbbrevOp::Vbr(read_width(reader)?)),
        CHAR6_ENCODING => Ok(AbbrevOp::Char6),
        other => Err(TranslateError::format(
            start,
            format!("unsupported array element encoding {}", other),
        )
        .into()),
    }
}

fn read_scalar(reader: &mut BitReader<'_>, op: &AbbrevOp) -> Result<Operand> {
    Ok(match op {
        AbbrevOp::Literal(value) => Operand::Int(*value),
        AbbrevOp::Fixed(width) => Operand::Int(reader.read_bits(*width)?),
        // Zero-width VBR carries no bits.
        AbbrevOp::Vbr(0) => Operand::Int(0),
        AbbrevOp::Vbr(width) => reader.read_vbr(*width)?.into(),
        AbbrevOp::Char6 => Operand::Int(u64::from(reader.read_char6()? as u8)),
        AbbrevOp::Array(_) | AbbrevOp::Blob => {
            return Err(TranslateError::format(
                reader.bit_offset(),
                "nested array or blob operand",
            )
            .into())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::writer::{AbbrevField, BitWriter};
    use crate::error::{root_translate_error, ErrorKind};

    fn abbrev_bytes(abbrev: &Abbrev) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.define_abbrev(abbrev);
        w.into_bytes()
    }

    #[test]
    fn definition_round_trip() {
        let abbrev = Abbrev {
            ops: vec![
                AbbrevOp::Literal(4),
                AbbrevOp::Vbr(6),
                AbbrevOp::Array(Box::new(AbbrevOp::Char6)),
            ],
        };
        let bytes = abbrev_bytes(&abbrev);
        let mut reader = BitReader::new(&bytes);
        // DEFINE_ABBREV id in the default 2-bit width.
        assert_eq!(reader.read_bits(2).unwrap(), 2);
        assert_eq!(Abbrev::read_definition(&mut reader).unwrap(), abbrev);
    }

    #[test]
    fn array_must_be_second_to_last() {
        let mut w = BitWriter::new();
        w.write_vbr(3, 5);
        // array, char6 element, then a trailing fixed(3)
        w.write_bits(0, 1);
        w.write_bits(ARRAY_ENCODING, 3);
        w.write_bits(0, 1);
        w.write_bits(CHAR6_ENCODING, 3);
        w.write_bits(0, 1);
        w.write_bits(FIXED_ENCODING, 3);
        w.write_vbr(3, 5);
        w.write_bits(0, 1);
        w.write_bits(FIXED_ENCODING, 3);
        w.write_vbr(3, 5);
        let bytes = w.into_bytes();
        let err = Abbrev::read_definition(&mut BitReader::new(&bytes)).unwrap_err();
        assert_eq!(root_translate_error(&err).map(|e| e.kind()), Some(ErrorKind::Format));
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let mut w = BitWriter::new();
        w.write_vbr(1, 5);
        w.write_bits(0, 1);
        w.write_bits(7, 3);
        let bytes = w.into_bytes();
        assert!(Abbrev::read_definition(&mut BitReader::new(&bytes)).is_err());
    }

    #[test]
    fn record_replays_literals_and_reads_blob() {
        let abbrev = Abbrev {
            ops: vec![AbbrevOp::Literal(9), AbbrevOp::Fixed(4), AbbrevOp::Blob],
        };
        let mut w = BitWriter::new();
        w.abbrev_record(
            4,
            &abbrev,
            &[AbbrevField::Scalar(5), AbbrevField::Blob(b"hi!".to_vec())],
        );
        let bytes = w.into_bytes();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_bits(2).unwrap(), 4);
        let (code, ops) = abbrev.read_record(&mut reader).unwrap();
        assert_eq!(code, 9);
        assert_eq!(ops, vec![Operand::Int(5), Operand::Blob(b"hi!".to_vec())]);
    }
}
