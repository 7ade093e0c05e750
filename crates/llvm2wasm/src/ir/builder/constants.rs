//! CONSTANTS_BLOCK decoding, shared by the module and function scopes.

use crate::bitstream::{Block, Entry, Record};
use crate::error::TranslateError;
use crate::ir::codes::*;
use crate::ir::types::{ConstantValue, GlobalVar, Type, TypeId, Value, ValueId, ValueKind};
use crate::ir::values::ValueTable;
use anyhow::Result;
use log::{trace, warn};

/// Decode a constants block, appending one value per constant to `values`.
pub(super) fn decode_constants(
    block: &Block,
    types: &[Type],
    globals: &[GlobalVar],
    values: &mut ValueTable<'_>,
) -> Result<()> {
    // The current type starts out as i32 when the table has one.
    let mut current: Option<TypeId> = types
        .iter()
        .position(|t| *t == Type::Integer { bits: 32 })
        .map(|i| TypeId(i as u32));

    for entry in &block.content {
        let record = match entry {
            Entry::Record(record) => record,
            Entry::Block(inner) => {
                warn!("ignoring block {} inside a constants block", inner.id);
                continue;
            }
        };
        if record.code == CST_CODE_SETTYPE {
            let id = record.op(0)?;
            if id >= types.len() as u64 {
                return Err(
                    TranslateError::semantic(format!("SETTYPE to unknown type {}", id)).into(),
                );
            }
            current = Some(TypeId(id as u32));
            continue;
        }
        let ty = current.ok_or_else(|| {
            anyhow::Error::from(TranslateError::semantic("constant before any SETTYPE"))
        })?;
        let value = decode_constant(record, ty, types, globals, values)?;
        trace!("constant {} : {:?} = {:?}", values.len(), ty, value);
        values.push(Value::new(Some(ty), ValueKind::Constant(value)));
    }
    Ok(())
}

fn decode_constant(
    record: &Record,
    ty: TypeId,
    types: &[Type],
    globals: &[GlobalVar],
    values: &ValueTable<'_>,
) -> Result<ConstantValue> {
    Ok(match record.code {
        CST_CODE_NULL => ConstantValue::Null,
        CST_CODE_UNDEF => ConstantValue::Undef,
        CST_CODE_INTEGER => ConstantValue::Integer(decode_signed(record.op(0)?)),
        CST_CODE_WIDE_INTEGER => {
            return Err(TranslateError::semantic("wide integer constants are not supported").into())
        }
        CST_CODE_FLOAT => {
            let bits = record.op(0)?;
            match types.get(ty.index()) {
                Some(Type::Float) => ConstantValue::Float(f64::from(f32::from_bits(bits as u32))),
                Some(Type::Double) => ConstantValue::Float(f64::from_bits(bits)),
                other => {
                    return Err(TranslateError::semantic(format!(
                        "float constant of non-float type {:?}",
                        other
                    ))
                    .into())
                }
            }
        }
        CST_CODE_AGGREGATE => ConstantValue::Aggregate(
            (0..record.len())
                .map(|i| record.op(i).map(|v| ValueId(v as u32)))
                .collect::<Result<Vec<_>>>()?,
        ),
        CST_CODE_STRING | CST_CODE_CSTRING => {
            let mut bytes = (0..record.len())
                .map(|i| record.op(i).map(|v| v as u8))
                .collect::<Result<Vec<_>>>()?;
            if record.code == CST_CODE_CSTRING {
                bytes.push(0);
            }
            ConstantValue::Bytes(bytes)
        }
        CST_CODE_CE_GEP | CST_CODE_CE_INBOUNDS_GEP => decode_gep(record, globals, values)?,
        other => {
            return Err(
                TranslateError::semantic(format!("unsupported constant code {}", other)).into(),
            )
        }
    })
}

/// Sign-folded integer: the low bit is the sign, the rest the magnitude.
pub(super) fn decode_signed(v: u64) -> i64 {
    if v & 1 == 0 {
        (v >> 1) as i64
    } else if v != 1 {
        -((v >> 1) as i64)
    } else {
        i64::MIN
    }
}

/// `[pointee, basety, base, (ty, idx)*]`, or the same without the pointee type.
///
/// Only all-zero index lists are accepted. A global variable base is replaced
/// by its initializer.
fn decode_gep(
    record: &Record,
    globals: &[GlobalVar],
    values: &ValueTable<'_>,
) -> Result<ConstantValue> {
    let start = if record.len() % 2 == 1 { 1 } else { 0 };
    let base = ValueId(record.op(start + 1)? as u32);
    let mut i = start + 2;
    while i + 1 < record.len() {
        let index = ValueId(record.op(i + 1)? as u32);
        let is_zero = matches!(
            values.get(index).map(|v| &v.kind),
            Some(ValueKind::Constant(ConstantValue::Integer(0)))
                | Some(ValueKind::Constant(ConstantValue::Null))
        );
        if !is_zero {
            return Err(TranslateError::semantic(format!(
                "constant GEP index {} is not a constant zero",
                index
            ))
            .into());
        }
        i += 2;
    }
    let base = match values.get(base).map(|v| &v.kind) {
        Some(ValueKind::Global(g)) => globals.get(*g).and_then(|g| g.init).unwrap_or(base),
        _ => base,
    };
    Ok(ConstantValue::Address(base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::Operand;

    fn record(code: u64, ops: &[u64]) -> Entry {
        Entry::Record(Record {
            code,
            ops: ops.iter().map(|&v| Operand::Int(v)).collect(),
            abbreviated: false,
        })
    }

    fn block(content: Vec<Entry>) -> Block {
        Block {
            id: CONSTANTS_BLOCK_ID,
            abbrevs: Vec::new(),
            content,
            bit_offset: 0,
            meta: None,
        }
    }

    fn kinds(values: &ValueTable<'_>) -> Vec<ValueKind> {
        (0..values.len())
            .filter_map(|i| values.get(ValueId(i)).map(|v| v.kind.clone()))
            .collect()
    }

    #[test]
    fn sign_folding() {
        assert_eq!(decode_signed(0), 0);
        assert_eq!(decode_signed(10), 5);
        assert_eq!(decode_signed(11), -5);
        assert_eq!(decode_signed(1), i64::MIN);
    }

    #[test]
    fn integers_floats_and_strings() {
        let types = vec![Type::Integer { bits: 32 }, Type::Double, Type::Float];
        let mut values = ValueTable::new(&[]);
        decode_constants(
            &block(vec![
                record(CST_CODE_INTEGER, &[84]),
                record(CST_CODE_SETTYPE, &[1]),
                record(CST_CODE_FLOAT, &[2.5f64.to_bits()]),
                record(CST_CODE_SETTYPE, &[2]),
                record(CST_CODE_FLOAT, &[u64::from(1.5f32.to_bits())]),
                record(CST_CODE_CSTRING, &[104, 105]),
            ]),
            &types,
            &[],
            &mut values,
        )
        .unwrap();
        assert_eq!(
            kinds(&values),
            vec![
                ValueKind::Constant(ConstantValue::Integer(42)),
                ValueKind::Constant(ConstantValue::Float(2.5)),
                ValueKind::Constant(ConstantValue::Float(1.5)),
                ValueKind::Constant(ConstantValue::Bytes(vec![104, 105, 0])),
            ]
        );
        assert_eq!(values.get(ValueId(1)).and_then(|v| v.ty), Some(TypeId(1)));
    }

    #[test]
    fn gep_on_global_is_replaced_by_initializer() {
        let types = vec![Type::Integer { bits: 32 }];
        let globals = vec![GlobalVar {
            name: None,
            ty: TypeId(0),
            is_const: true,
            init: Some(ValueId(1)),
            value: ValueId(0),
        }];
        let prefix = vec![Value::new(Some(TypeId(0)), ValueKind::Global(0))];
        let mut values = ValueTable::new(&prefix);
        decode_constants(
            &block(vec![
                // value 1: the initializer, value 2: zero
                record(CST_CODE_INTEGER, &[14]),
                record(CST_CODE_NULL, &[]),
                record(CST_CODE_CE_INBOUNDS_GEP, &[0, 0, 0, 0, 2, 0, 2]),
            ]),
            &types,
            &globals,
            &mut values,
        )
        .unwrap();
        assert_eq!(
            values.get(ValueId(3)).map(|v| v.kind.clone()),
            Some(ValueKind::Constant(ConstantValue::Address(ValueId(1))))
        );
    }

    #[test]
    fn gep_with_nonzero_index_is_rejected() {
        let types = vec![Type::Integer { bits: 32 }];
        let mut values = ValueTable::new(&[]);
        let err = decode_constants(
            &block(vec![
                record(CST_CODE_INTEGER, &[2]),
                record(CST_CODE_CE_GEP, &[0, 0, 0, 0, 0]),
            ]),
            &types,
            &[],
            &mut values,
        )
        .unwrap_err();
        assert!(err.to_string().contains("not a constant zero"));
    }

    #[test]
    fn wide_integer_is_rejected() {
        let types = vec![Type::Integer { bits: 128 }];
        let mut values = ValueTable::new(&[]);
        let err = decode_constants(
            &block(vec![
                record(CST_CODE_SETTYPE, &[0]),
                record(CST_CODE_WIDE_INTEGER, &[1, 2]),
            ]),
            &types,
            &[],
            &mut values,
        )
        .unwrap_err();
        assert!(err.to_string().contains("wide integer"));
    }
}
