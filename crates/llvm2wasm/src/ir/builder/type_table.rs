//! TYPE_BLOCK_ID_NEW decoding.

use crate::bitstream::{Block, Entry, Record};
use crate::error::TranslateError;
use crate::ir::codes::*;
use crate::ir::types::{Type, TypeId};
use anyhow::Result;
use log::{trace, warn};

/// Decode the type table. Entries may only refer to earlier entries.
pub(super) fn decode_types(block: &Block) -> Result<Vec<Type>> {
    let mut types: Vec<Type> = Vec::new();
    let mut pending_name: Option<String> = None;

    for entry in &block.content {
        let record = match entry {
            Entry::Record(record) => record,
            Entry::Block(inner) => {
                warn!("ignoring block {} inside the type table", inner.id);
                continue;
            }
        };
        let ty = match record.code {
            TYPE_CODE_NUMENTRY => {
                types.reserve(record.get(0).unwrap_or(0) as usize);
                continue;
            }
            TYPE_CODE_STRUCT_NAME => {
                pending_name = Some(record.text(0));
                continue;
            }
            TYPE_CODE_VOID => Type::Void,
            TYPE_CODE_HALF => Type::Half,
            TYPE_CODE_FLOAT => Type::Float,
            TYPE_CODE_DOUBLE => Type::Double,
            TYPE_CODE_LABEL => Type::Label,
            TYPE_CODE_METADATA => Type::Metadata,
            TYPE_CODE_OPAQUE => Type::Opaque {
                name: pending_name.take(),
            },
            TYPE_CODE_INTEGER => Type::Integer {
                bits: record.op(0)? as u32,
            },
            TYPE_CODE_POINTER => Type::Pointer {
                pointee: type_ref(&types, record.op(0)?)?,
                addr_space: record.get(1).unwrap_or(0) as u32,
            },
            TYPE_CODE_FUNCTION_OLD => {
                // [vararg, attrid, retty, paramty...]
                function_type(&types, record, 2)?
            }
            TYPE_CODE_FUNCTION => {
                // [vararg, retty, paramty...]
                function_type(&types, record, 1)?
            }
            TYPE_CODE_ARRAY => Type::Array {
                len: record.op(0)?,
                element: type_ref(&types, record.op(1)?)?,
            },
            TYPE_CODE_VECTOR => Type::Vector {
                len: record.op(0)?,
                element: type_ref(&types, record.op(1)?)?,
            },
            TYPE_CODE_STRUCT_ANON | TYPE_CODE_STRUCT_NAMED => {
                let fields = (1..record.len())
                    .map(|i| type_ref(&types, record.op(i)?))
                    .collect::<Result<Vec<_>>>()?;
                Type::Struct {
                    fields,
                    packed: record.op(0)? != 0,
                    name: if record.code == TYPE_CODE_STRUCT_NAMED {
                        pending_name.take()
                    } else {
                        None
                    },
                }
            }
            other => {
                return Err(
                    TranslateError::semantic(format!("unsupported type code {}", other)).into(),
                )
            }
        };
        trace!("type {} = {:?}", types.len(), ty);
        types.push(ty);
    }
    Ok(types)
}

fn function_type(types: &[Type], record: &Record, ret_index: usize) -> Result<Type> {
    let params = (ret_index + 1..record.len())
        .map(|i| type_ref(types, record.op(i)?))
        .collect::<Result<Vec<_>>>()?;
    Ok(Type::Function {
        vararg: record.op(0)? != 0,
        ret: type_ref(types, record.op(ret_index)?)?,
        params,
    })
}

fn type_ref(types: &[Type], id: u64) -> Result<TypeId> {
    if id >= types.len() as u64 {
        return Err(TranslateError::semantic(format!(
            "type reference {} is not an earlier entry (table has {})",
            id,
            types.len()
        ))
        .into());
    }
    Ok(TypeId(id as u32))
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
            id: TYPE_BLOCK_ID_NEW,
            abbrevs: Vec::new(),
            content,
            bit_offset: 0,
            meta: None,
        }
    }

    #[test]
    fn decodes_function_and_pointer_types() {
        let types = decode_types(&block(vec![
            record(TYPE_CODE_NUMENTRY, &[4]),
            record(TYPE_CODE_INTEGER, &[32]),
            record(TYPE_CODE_FUNCTION, &[0, 0, 0, 0]),
            record(TYPE_CODE_POINTER, &[1, 0]),
            record(TYPE_CODE_VOID, &[]),
        ]))
        .unwrap();
        assert_eq!(
            types,
            vec![
                Type::Integer { bits: 32 },
                Type::Function {
                    ret: TypeId(0),
                    params: vec![TypeId(0), TypeId(0)],
                    vararg: false
                },
                Type::Pointer {
                    pointee: TypeId(1),
                    addr_space: 0
                },
                Type::Void,
            ]
        );
    }

    #[test]
    fn old_function_type_is_appended_once() {
        let types = decode_types(&block(vec![
            record(TYPE_CODE_INTEGER, &[8]),
            record(TYPE_CODE_FUNCTION_OLD, &[1, 0, 0, 0]),
        ]))
        .unwrap();
        assert_eq!(types.len(), 2);
        assert!(matches!(
            types[1],
            Type::Function { vararg: true, ref params, .. } if params.len() == 1
        ));
    }

    #[test]
    fn struct_name_attaches_to_next_named_struct() {
        let mut named = vec![record(TYPE_CODE_INTEGER, &[32])];
        named.push(Entry::Record(Record {
            code: TYPE_CODE_STRUCT_NAME,
            ops: "pair".bytes().map(|b| Operand::Int(u64::from(b))).collect(),
            abbreviated: false,
        }));
        named.push(record(TYPE_CODE_STRUCT_NAMED, &[0, 0, 0]));
        let types = decode_types(&block(named)).unwrap();
        assert_eq!(
            types[1],
            Type::Struct {
                fields: vec![TypeId(0), TypeId(0)],
                packed: false,
                name: Some("pair".to_string())
            }
        );
    }

    #[test]
    fn forward_type_reference_is_rejected() {
        let err = decode_types(&block(vec![record(TYPE_CODE_POINTER, &[3, 0])])).unwrap_err();
        assert!(err.to_string().contains("not an earlier entry"));
    }

    #[test]
    fn unknown_type_code_is_rejected() {
        let err = decode_types(&block(vec![record(99, &[])])).unwrap_err();
        assert!(err.to_string().contains("unsupported type code 99"));
    }
}
