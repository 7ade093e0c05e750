//! Semantic decoding of a parsed bitstream into a [`Module`].
//!
//! ```text
//! MODULE_BLOCK ──► ModuleScan ─┬─► TYPE_BLOCK       ─► Module::types
//!                              ├─► CONSTANTS_BLOCK  ─► module values
//!                              ├─► VALUE_SYMTAB     ─► names, FNENTRY offsets
//!                              └─► FUNCTION_BLOCK*  ─► FunctionDecoder ─► FunctionBody
//! ```

mod constants;
mod core;
mod function;
mod symtab;
mod type_table;

use crate::bitstream::{Block, Entry};
use crate::error::TranslateError;
use crate::ir::codes::{IDENTIFICATION_BLOCK_ID, MODULE_BLOCK_ID};
use crate::ir::types::Module;
use anyhow::Result;

/// Decode the top-level entries of a bitstream into a module.
///
/// The stream must hold exactly one MODULE_BLOCK, optionally preceded by an
/// identification block. Top-level records are ignored.
pub fn decode_module(entries: &[Entry]) -> Result<Module> {
    let blocks: Vec<&Block> = entries
        .iter()
        .filter_map(|entry| match entry {
            Entry::Block(block) if block.id != IDENTIFICATION_BLOCK_ID => Some(block),
            _ => None,
        })
        .collect();
    match blocks.as_slice() {
        [block] if block.id == MODULE_BLOCK_ID => core::ModuleScan::scan(block)?.finish(),
        _ => Err(TranslateError::semantic("Invalid content").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::{Operand, Record};
    use crate::error::{root_translate_error, ErrorKind};
    use crate::ir::codes::*;
    use crate::ir::types::*;

    fn rec(code: u64, ops: &[u64]) -> Entry {
        Entry::Record(Record {
            code,
            ops: ops.iter().map(|&v| Operand::Int(v)).collect(),
            abbreviated: false,
        })
    }

    fn named(code: u64, prefix: &[u64], name: &str) -> Entry {
        let mut ops: Vec<Operand> = prefix.iter().map(|&v| Operand::Int(v)).collect();
        ops.extend(name.bytes().map(|b| Operand::Int(u64::from(b))));
        Entry::Record(Record {
            code,
            ops,
            abbreviated: false,
        })
    }

    fn blk(id: u64, bit_offset: u64, content: Vec<Entry>) -> Entry {
        Entry::Block(Block {
            id,
            abbrevs: Vec::new(),
            content,
            bit_offset,
            meta: None,
        })
    }

    /// Types: 0 i32, 1 fn(i32, i32) -> i32, 2 i1, 3 void, 4 fn() -> void.
    fn type_block() -> Entry {
        blk(
            TYPE_BLOCK_ID_NEW,
            0,
            vec![
                rec(TYPE_CODE_NUMENTRY, &[5]),
                rec(TYPE_CODE_INTEGER, &[32]),
                rec(TYPE_CODE_FUNCTION, &[0, 0, 0, 0]),
                rec(TYPE_CODE_INTEGER, &[1]),
                rec(TYPE_CODE_VOID, &[]),
                rec(TYPE_CODE_FUNCTION, &[0, 3]),
            ],
        )
    }

    /// One `fn(i32, i32) -> i32` definition per body, in order.
    fn module_with(bodies: Vec<Vec<Entry>>) -> Vec<Entry> {
        let mut content = vec![rec(MODULE_CODE_VERSION, &[1]), type_block()];
        for _ in &bodies {
            content.push(rec(MODULE_CODE_FUNCTION, &[1, 0, 0, 0]));
        }
        for (i, body) in bodies.into_iter().enumerate() {
            content.push(blk(FUNCTION_BLOCK_ID, 1024 * (i as u64 + 1), body));
        }
        vec![blk(MODULE_BLOCK_ID, 32, content)]
    }

    fn ret_operand(body: &FunctionBody) -> crate::ir::types::Operand {
        let last = body.blocks.last().and_then(|b| b.terminator()).unwrap();
        match &last.kind {
            InstrKind::Ret { value: Some(op) } => *op,
            other => panic!("expected a value return, got {:?}", other),
        }
    }

    fn semantic_reason(err: &anyhow::Error) -> String {
        let root = root_translate_error(err).expect("typed error");
        assert_eq!(root.kind(), ErrorKind::Semantic);
        root.to_string()
    }

    #[test]
    fn decodes_add_function() {
        let module = decode_module(&module_with(vec![vec![
            rec(FUNC_CODE_DECLAREBLOCKS, &[1]),
            rec(FUNC_CODE_INST_BINOP, &[2, 1, 0]),
            rec(FUNC_CODE_INST_RET, &[1]),
        ]]))
        .unwrap();

        assert_eq!(module.version, Some(1));
        assert_eq!(module.functions[0].body, Some(0));
        let body = &module.bodies[0];
        assert_eq!(body.first_local, 1);
        assert_eq!(body.blocks.len(), 1);
        let add = &body.blocks[0].instructions[0];
        match &add.kind {
            InstrKind::Binop { opcode, lhs, rhs, .. } => {
                assert_eq!(*opcode, 0);
                assert_eq!(lhs.value, ValueId(1));
                assert_eq!(rhs.value, ValueId(2));
                assert_eq!(lhs.ty, Some(TypeId(0)));
            }
            other => panic!("expected binop, got {:?}", other),
        }
        assert_eq!(add.result, Some(ValueId(3)));
        assert_eq!(ret_operand(body).value, ValueId(3));
    }

    #[test]
    fn forward_reference_names_the_same_value_as_a_backward_one() {
        let backward = decode_module(&module_with(vec![vec![
            rec(FUNC_CODE_DECLAREBLOCKS, &[2]),
            rec(FUNC_CODE_INST_BINOP, &[2, 1, 0]),
            rec(FUNC_CODE_INST_BR, &[1]),
            rec(FUNC_CODE_INST_RET, &[1]),
        ]]))
        .unwrap();
        // bb0: br bb2; bb1: ret %3 (not yet defined); bb2: %3 = add; br bb1
        let forward = decode_module(&module_with(vec![vec![
            rec(FUNC_CODE_DECLAREBLOCKS, &[3]),
            rec(FUNC_CODE_INST_BR, &[2]),
            rec(FUNC_CODE_INST_RET, &[0, 0]),
            rec(FUNC_CODE_INST_BINOP, &[2, 1, 0]),
            rec(FUNC_CODE_INST_BR, &[1]),
        ]]))
        .unwrap();

        let back_op = ret_operand(&backward.bodies[0]);
        let fwd_body = &forward.bodies[0];
        let fwd_op = match &fwd_body.blocks[1].instructions[0].kind {
            InstrKind::Ret { value: Some(op) } => *op,
            other => panic!("expected ret, got {:?}", other),
        };
        assert!(!back_op.forward);
        assert!(fwd_op.forward);
        assert_eq!(back_op.value, fwd_op.value);
        assert_eq!(back_op.ty, fwd_op.ty);
        assert_eq!(fwd_body.blocks[2].instructions[0].result, Some(fwd_op.value));
    }

    #[test]
    fn forward_condition_takes_the_producer_type() {
        // bb0: br %3, bb1, bb2; bb1: %3 = icmp eq a, b; ret a; bb2: ret b
        let module = decode_module(&module_with(vec![vec![
            rec(FUNC_CODE_DECLAREBLOCKS, &[3]),
            rec(FUNC_CODE_INST_BR, &[1, 2, 0]),
            rec(FUNC_CODE_INST_CMP2, &[2, 1, 32]),
            rec(FUNC_CODE_INST_RET, &[3]),
            rec(FUNC_CODE_INST_RET, &[2]),
        ]]))
        .unwrap();

        let body = &module.bodies[0];
        match &body.blocks[0].instructions[0].kind {
            InstrKind::CondBr {
                if_true,
                if_false,
                cond,
            } => {
                assert_eq!(*if_true, BlockId(1));
                assert_eq!(*if_false, BlockId(2));
                assert_eq!(cond.value, ValueId(3));
                assert!(cond.forward);
                assert_eq!(cond.ty, Some(TypeId(2)));
            }
            other => panic!("expected conditional branch, got {:?}", other),
        }
        assert_eq!(ret_operand(body).value, ValueId(2));
    }

    #[test]
    fn never_produced_forward_reference_is_an_error() {
        let err = decode_module(&module_with(vec![vec![
            rec(FUNC_CODE_DECLAREBLOCKS, &[2]),
            rec(FUNC_CODE_INST_BR, &[1, 1, 0]),
            rec(FUNC_CODE_INST_RET, &[1]),
        ]]))
        .unwrap_err();
        assert!(semantic_reason(&err).contains("never defined"));
    }

    #[test]
    fn block_without_terminator_is_incomplete() {
        let err = decode_module(&module_with(vec![vec![
            rec(FUNC_CODE_DECLAREBLOCKS, &[1]),
            rec(FUNC_CODE_INST_BINOP, &[2, 1, 0]),
        ]]))
        .unwrap_err();
        assert!(semantic_reason(&err).contains("incomplete block"));
    }

    #[test]
    fn unknown_instruction_code_is_rejected_by_number() {
        let err = decode_module(&module_with(vec![vec![
            rec(FUNC_CODE_DECLAREBLOCKS, &[1]),
            rec(99, &[1, 2]),
            rec(FUNC_CODE_INST_RET, &[]),
        ]]))
        .unwrap_err();
        let root = root_translate_error(&err).unwrap();
        assert!(matches!(
            root,
            TranslateError::UnsupportedOpcode { code: 99, .. }
        ));
        assert!(root.to_string().contains("99"));
    }

    #[test]
    fn allow_listed_instruction_is_kept_opaque() {
        let module = decode_module(&module_with(vec![vec![
            rec(FUNC_CODE_DECLAREBLOCKS, &[1]),
            rec(FUNC_CODE_INST_SELECT, &[2, 1, 2]),
            rec(FUNC_CODE_INST_RET, &[1]),
        ]]))
        .unwrap();
        let body = &module.bodies[0];
        let select = &body.blocks[0].instructions[0];
        assert!(matches!(
            select.kind,
            InstrKind::Opaque {
                code: FUNC_CODE_INST_SELECT,
                ..
            }
        ));
        assert_eq!(select.result, Some(ValueId(3)));
        assert_eq!(body.values[2].ty, None);
    }

    #[test]
    fn calls_produce_values_only_for_non_void_returns() {
        let content = vec![
            type_block(),
            rec(MODULE_CODE_FUNCTION, &[1, 0, 1, 0]),
            rec(MODULE_CODE_FUNCTION, &[4, 0, 1, 0]),
            rec(MODULE_CODE_FUNCTION, &[1, 0, 0, 0]),
            blk(
                FUNCTION_BLOCK_ID,
                512,
                vec![
                    rec(FUNC_CODE_DECLAREBLOCKS, &[1]),
                    // %5 = call @0(a, b)
                    rec(FUNC_CODE_INST_CALL, &[0, 0, 5, 2, 1]),
                    // call @1()
                    rec(FUNC_CODE_INST_CALL, &[0, 0, 5]),
                    rec(FUNC_CODE_INST_RET, &[1]),
                ],
            ),
        ];
        let module = decode_module(&[blk(MODULE_BLOCK_ID, 32, content)]).unwrap();

        assert_eq!(module.functions[2].body, Some(0));
        let body = &module.bodies[0];
        let instrs = &body.blocks[0].instructions;
        match &instrs[0].kind {
            InstrKind::Call { callee, args, .. } => {
                assert_eq!(callee.value, ValueId(0));
                let args: Vec<ValueId> = args.iter().map(|a| a.value).collect();
                assert_eq!(args, vec![ValueId(3), ValueId(4)]);
            }
            other => panic!("expected call, got {:?}", other),
        }
        assert_eq!(instrs[0].result, Some(ValueId(5)));
        match &instrs[1].kind {
            InstrKind::Call { callee, args, .. } => {
                assert_eq!(callee.value, ValueId(1));
                assert!(args.is_empty());
            }
            other => panic!("expected call, got {:?}", other),
        }
        assert_eq!(instrs[1].result, None);
        assert_eq!(ret_operand(body).value, ValueId(5));
    }

    #[test]
    fn function_entries_bind_blocks_by_offset() {
        let content = vec![
            type_block(),
            rec(MODULE_CODE_FUNCTION, &[1, 0, 0, 0]),
            rec(MODULE_CODE_FUNCTION, &[1, 0, 0, 0]),
            blk(
                VALUE_SYMTAB_BLOCK_ID,
                0,
                vec![
                    named(VST_CODE_FNENTRY, &[1, 2], "second"),
                    named(VST_CODE_ENTRY, &[0], "first"),
                ],
            ),
            // Word 2: returns the second parameter.
            blk(
                FUNCTION_BLOCK_ID,
                64,
                vec![
                    rec(FUNC_CODE_DECLAREBLOCKS, &[1]),
                    rec(FUNC_CODE_INST_RET, &[1]),
                ],
            ),
            // Word 10: returns the first parameter.
            blk(
                FUNCTION_BLOCK_ID,
                320,
                vec![
                    rec(FUNC_CODE_DECLAREBLOCKS, &[1]),
                    rec(FUNC_CODE_INST_RET, &[2]),
                ],
            ),
        ];
        let module = decode_module(&[blk(MODULE_BLOCK_ID, 32, content)]).unwrap();

        assert_eq!(module.function_name(0), "first");
        assert_eq!(module.function_name(1), "second");
        let first = &module.bodies[module.functions[0].body.unwrap()];
        let second = &module.bodies[module.functions[1].body.unwrap()];
        assert_eq!(ret_operand(first).value, ValueId(2));
        assert_eq!(ret_operand(second).value, ValueId(3));
    }

    #[test]
    fn function_entries_override_block_order() {
        let content = vec![
            type_block(),
            rec(MODULE_CODE_FUNCTION, &[1, 0, 0, 0]),
            rec(MODULE_CODE_FUNCTION, &[1, 0, 0, 0]),
            blk(
                VALUE_SYMTAB_BLOCK_ID,
                0,
                vec![
                    named(VST_CODE_FNENTRY, &[0, 23], "zero"),
                    named(VST_CODE_FNENTRY, &[1, 19], "one"),
                ],
            ),
            // Word 19: returns the second parameter.
            blk(
                FUNCTION_BLOCK_ID,
                19 * 32,
                vec![
                    rec(FUNC_CODE_DECLAREBLOCKS, &[1]),
                    rec(FUNC_CODE_INST_RET, &[1]),
                ],
            ),
            // Word 23: returns the first parameter.
            blk(
                FUNCTION_BLOCK_ID,
                23 * 32,
                vec![
                    rec(FUNC_CODE_DECLAREBLOCKS, &[1]),
                    rec(FUNC_CODE_INST_RET, &[2]),
                ],
            ),
        ];
        let module = decode_module(&[blk(MODULE_BLOCK_ID, 32, content)]).unwrap();

        let zero = &module.bodies[module.functions[0].body.unwrap()];
        let one = &module.bodies[module.functions[1].body.unwrap()];
        assert_eq!(zero.function, 0);
        assert_eq!(ret_operand(zero).value, ValueId(2));
        assert_eq!(ret_operand(one).value, ValueId(3));
    }

    #[test]
    fn identification_block_is_skipped() {
        let mut entries = vec![blk(IDENTIFICATION_BLOCK_ID, 32, Vec::new())];
        entries.extend(module_with(Vec::new()));
        let module = decode_module(&entries).unwrap();
        assert!(module.functions.is_empty());
        assert_eq!(module.types.len(), 5);
    }

    #[test]
    fn stream_without_module_block_is_invalid() {
        let err = decode_module(&[blk(TYPE_BLOCK_ID_NEW, 32, Vec::new())]).unwrap_err();
        assert!(semantic_reason(&err).ends_with("Invalid content"));

        let mut two = module_with(Vec::new());
        two.extend(module_with(Vec::new()));
        assert!(decode_module(&two).is_err());
    }
}
