//! FUNCTION_BLOCK decoding: typed SSA instructions grouped into basic blocks.
//!
//! Operands are encoded relative to the current length of the value sequence.
//! A relative operand that lands at or past the end names a value produced
//! later in the body; its type either travels with it as an explicit operand
//! or is filled from the producer once the whole body is decoded.

use super::constants::decode_constants;
use super::symtab::SymbolTable;
use crate::bitstream::{Block, Entry, Record};
use crate::error::TranslateError;
use crate::ir::codes::*;
use crate::ir::types::*;
use crate::ir::values::{Backpatch, ValueTable};
use anyhow::{Context, Result};
use log::{debug, trace, warn};

/// Position of an operand inside the decoded body.
#[derive(Debug, Clone, Copy)]
struct OperandSite {
    block: usize,
    instruction: usize,
    operand: usize,
}

/// Sequential reader over a record's operands.
struct Cursor<'r> {
    record: &'r Record,
    pos: usize,
}

impl<'r> Cursor<'r> {
    fn new(record: &'r Record) -> Self {
        Self { record, pos: 0 }
    }

    fn read(&mut self) -> Result<u64> {
        let v = self.record.op(self.pos)?;
        self.pos += 1;
        Ok(v)
    }

    fn read_opt(&mut self) -> Option<u64> {
        let v = self.record.get(self.pos)?;
        self.pos += 1;
        Some(v)
    }

    fn remaining(&self) -> usize {
        self.record.len().saturating_sub(self.pos)
    }
}

/// Decoder state for one function body.
pub(super) struct FunctionDecoder<'m> {
    module: &'m Module,
    function: usize,
    values: ValueTable<'m>,
    blocks: Vec<BasicBlock>,
    current: Vec<Instruction>,
    declared_blocks: u64,
    pending: Backpatch<OperandSite>,
}

impl<'m> FunctionDecoder<'m> {
    pub fn new(module: &'m Module, function: usize) -> Self {
        Self {
            module,
            function,
            values: ValueTable::new(&module.values),
            blocks: Vec::new(),
            current: Vec::new(),
            declared_blocks: 0,
            pending: Backpatch::new(),
        }
    }

    pub fn decode(mut self, block: &Block) -> Result<FunctionBody> {
        let module = self.module;
        let declared = module.functions.get(self.function).ok_or_else(|| {
            anyhow::Error::from(TranslateError::semantic(format!(
                "no declared function {}",
                self.function
            )))
        })?;
        let Some(Type::Function { params, .. }) = module.ty(declared.ty) else {
            return Err(TranslateError::semantic(format!(
                "function {} does not have a function type",
                self.function
            ))
            .into());
        };
        for (i, &param) in params.iter().enumerate() {
            self.values.push(Value::new(Some(param), ValueKind::Param(i)));
        }

        let mut symbols = Vec::new();
        for entry in &block.content {
            match entry {
                Entry::Block(inner) if inner.id == CONSTANTS_BLOCK_ID => {
                    decode_constants(inner, &module.types, &module.globals, &mut self.values)
                        .context("decoding function constants")?;
                }
                Entry::Block(inner) if inner.id == VALUE_SYMTAB_BLOCK_ID => {
                    symbols.push(SymbolTable::read(inner)?);
                }
                Entry::Block(inner) => trace!("skipping block {} in function body", inner.id),
                Entry::Record(record) => self.decode_record(record).with_context(|| {
                    format!(
                        "decoding {} in block {}",
                        opcode_name(record.code),
                        self.blocks.len()
                    )
                })?,
            }
        }

        if !self.current.is_empty() {
            return Err(TranslateError::semantic(format!(
                "incomplete block {}: no terminator after {} instruction(s)",
                self.blocks.len(),
                self.current.len()
            ))
            .into());
        }
        if self.declared_blocks != self.blocks.len() as u64 {
            warn!(
                "function {} declares {} blocks but defines {}",
                self.function,
                self.declared_blocks,
                self.blocks.len()
            );
        }

        self.resolve_forward_operands()?;
        for table in symbols {
            self.apply_symbols(table);
        }
        debug!(
            "decoded function {}: {} blocks, {} values",
            self.function,
            self.blocks.len(),
            self.values.len()
        );

        Ok(FunctionBody {
            function: self.function,
            first_local: module.values.len() as u32,
            values: self.values.into_local(),
            blocks: self.blocks,
        })
    }

    fn decode_record(&mut self, record: &Record) -> Result<()> {
        let module = self.module;
        let mut cur = Cursor::new(record);
        trace!("{} {:?}", opcode_name(record.code), record.ops);

        let (kind, result_ty, produces) = match record.code {
            FUNC_CODE_DECLAREBLOCKS => {
                self.declared_blocks = cur.read()?;
                return Ok(());
            }
            FUNC_CODE_DEBUG_LOC | FUNC_CODE_DEBUG_LOC_AGAIN => return Ok(()),
            FUNC_CODE_INST_BINOP => {
                // [lhs, (ty), rhs, opcode, (flags)]
                let lhs = self.typed_value(&mut cur)?;
                let rhs = self.value_of_type(&mut cur, lhs.ty)?;
                let opcode = cur.read()?;
                let flags = cur.read_opt();
                let ty = lhs.ty;
                (
                    InstrKind::Binop {
                        opcode,
                        lhs,
                        rhs,
                        flags,
                    },
                    ty,
                    true,
                )
            }
            FUNC_CODE_INST_CMP2 => {
                // [lhs, (ty), rhs, predicate]
                let lhs = self.typed_value(&mut cur)?;
                let rhs = self.value_of_type(&mut cur, lhs.ty)?;
                let predicate = cur.read()?;
                let bool_ty = module.integer_type(1).ok_or_else(|| {
                    anyhow::Error::from(TranslateError::semantic("compare without an i1 type"))
                })?;
                (
                    InstrKind::Cmp {
                        predicate,
                        lhs,
                        rhs,
                    },
                    Some(bool_ty),
                    true,
                )
            }
            FUNC_CODE_INST_ALLOCA => {
                // [instty, opty, size, align]
                let first = self.type_ref(cur.read()?)?;
                let _size_ty = cur.read()?;
                let size = ValueId(cur.read()? as u32);
                let align = cur.read()?;
                let (allocated, result_ty) = if align & ALLOCA_EXPLICIT_TYPE_BIT != 0 {
                    (first, module.pointer_to(first))
                } else {
                    match module.ty(first) {
                        Some(Type::Pointer { pointee, .. }) => (*pointee, Some(first)),
                        other => {
                            return Err(TranslateError::semantic(format!(
                                "alloca result type is not a pointer: {:?}",
                                other
                            ))
                            .into())
                        }
                    }
                };
                (
                    InstrKind::Alloca {
                        allocated,
                        size,
                        align: align & 0x1f,
                    },
                    result_ty,
                    true,
                )
            }
            FUNC_CODE_INST_LOAD => {
                // [ptr, (ty), (resty), align, vol]
                let ptr = self.typed_value(&mut cur)?;
                let result_ty = if cur.remaining() >= 3 {
                    Some(self.type_ref(cur.read()?)?)
                } else {
                    ptr.ty.and_then(|t| module.pointee(t))
                };
                let align = cur.read()?;
                let volatile = cur.read_opt().unwrap_or(0) != 0;
                (
                    InstrKind::Load {
                        ptr,
                        align,
                        volatile,
                    },
                    result_ty,
                    true,
                )
            }
            FUNC_CODE_INST_STORE => {
                // [ptr, (ty), val, (ty), align, vol]
                let ptr = self.typed_value(&mut cur)?;
                let value = self.typed_value(&mut cur)?;
                let align = cur.read()?;
                let volatile = cur.read_opt().unwrap_or(0) != 0;
                (
                    InstrKind::Store {
                        ptr,
                        value,
                        align,
                        volatile,
                    },
                    None,
                    false,
                )
            }
            FUNC_CODE_INST_BR => {
                // [bb] or [bb, bb, cond]
                let target = BlockId(cur.read()? as u32);
                if cur.remaining() == 0 {
                    (InstrKind::Br { target }, None, false)
                } else {
                    let if_false = BlockId(cur.read()? as u32);
                    let cond = self.value_of_type(&mut cur, None)?;
                    (
                        InstrKind::CondBr {
                            if_true: target,
                            if_false,
                            cond,
                        },
                        None,
                        false,
                    )
                }
            }
            FUNC_CODE_INST_RET => {
                // [] or [val, (ty)]
                let value = if cur.remaining() == 0 {
                    None
                } else {
                    Some(self.typed_value(&mut cur)?)
                };
                (InstrKind::Ret { value }, None, false)
            }
            FUNC_CODE_INST_CALL => self.decode_call(&mut cur)?,
            code if is_allow_listed(code) => {
                let ops = (0..record.len())
                    .map(|i| record.get(i).unwrap_or(0))
                    .collect();
                (InstrKind::Opaque { code, ops }, None, produces_value(code))
            }
            code => {
                return Err(TranslateError::UnsupportedOpcode {
                    code,
                    name: opcode_name(code),
                }
                .into())
            }
        };
        self.push_instruction(kind, result_ty, produces);
        Ok(())
    }

    /// `[attrs, cc, (fmf), (fnty), callee, (ty), args...]`
    fn decode_call(&mut self, cur: &mut Cursor<'_>) -> Result<(InstrKind, Option<TypeId>, bool)> {
        let module = self.module;
        let _attrs = cur.read()?;
        let cc = cur.read()?;
        if cc & CALL_FMF_BIT != 0 {
            cur.read()?;
        }
        let explicit = if cc & CALL_EXPLICIT_TYPE_BIT != 0 {
            Some(self.type_ref(cur.read()?)?)
        } else {
            None
        };
        let callee = self.typed_value(cur)?;
        let fn_ty = explicit
            .or_else(|| callee.ty.and_then(|t| module.function_type_of(t)))
            .ok_or_else(|| {
                anyhow::Error::from(TranslateError::semantic(format!(
                    "call through a non-function type (callee {})",
                    callee.value
                )))
            })?;
        let Some(Type::Function {
            ret,
            params,
            vararg,
        }) = module.ty(fn_ty)
        else {
            return Err(TranslateError::semantic(format!(
                "call through a non-function type {:?}",
                module.ty(fn_ty)
            ))
            .into());
        };

        let mut args = Vec::with_capacity(params.len());
        for &param in params {
            args.push(self.value_of_type(cur, Some(param))?);
        }
        if *vararg {
            while cur.remaining() > 0 {
                args.push(self.typed_value(cur)?);
            }
        }
        let produces = !module.ty(*ret).is_some_and(Type::is_void);
        Ok((
            InstrKind::Call {
                callee,
                fn_ty,
                args,
                calling_conv: (cc >> 1) & 0x3ff,
            },
            produces.then_some(*ret),
            produces,
        ))
    }

    /// Relative operand followed by an explicit type when it is a forward reference.
    fn typed_value(&mut self, cur: &mut Cursor<'_>) -> Result<Operand> {
        let (value, forward) = self.values.relative(cur.read()?);
        let ty = if forward {
            Some(self.type_ref(cur.read()?)?)
        } else {
            self.values.get(value).and_then(|v| v.ty)
        };
        Ok(Operand { ty, value, forward })
    }

    /// Relative operand whose type is implied by context.
    fn value_of_type(&mut self, cur: &mut Cursor<'_>, hint: Option<TypeId>) -> Result<Operand> {
        let (value, forward) = self.values.relative(cur.read()?);
        let ty = if forward {
            hint
        } else {
            self.values.get(value).and_then(|v| v.ty).or(hint)
        };
        Ok(Operand { ty, value, forward })
    }

    fn type_ref(&self, id: u64) -> Result<TypeId> {
        if id >= self.module.types.len() as u64 {
            return Err(TranslateError::semantic(format!("unknown type {}", id)).into());
        }
        Ok(TypeId(id as u32))
    }

    fn push_instruction(&mut self, kind: InstrKind, result_ty: Option<TypeId>, produces: bool) {
        let block = self.blocks.len();
        let instruction = self.current.len();
        for (operand, op) in kind.operands().into_iter().enumerate() {
            if op.forward {
                self.pending.record(
                    op.value,
                    OperandSite {
                        block,
                        instruction,
                        operand,
                    },
                );
            }
        }
        let result = produces.then(|| {
            self.values.push(Value::new(
                result_ty,
                ValueKind::Instruction {
                    block: BlockId(block as u32),
                    index: instruction,
                },
            ))
        });
        let terminator = kind.is_terminator();
        self.current.push(Instruction { kind, result });
        if terminator {
            self.blocks.push(BasicBlock {
                name: None,
                instructions: std::mem::take(&mut self.current),
            });
        }
    }

    /// Check every forward reference was produced and fill missing operand types.
    fn resolve_forward_operands(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        let values = &self.values;
        let filled = pending
            .resolve(|id| values.get(id).map(|v| v.ty))
            .map_err(TranslateError::from)?;
        for (site, ty) in filled {
            let operand = self
                .blocks
                .get_mut(site.block)
                .and_then(|b| b.instructions.get_mut(site.instruction))
                .and_then(|i| i.kind.operands_mut().into_iter().nth(site.operand));
            if let Some(operand) = operand {
                if operand.ty.is_none() {
                    operand.ty = ty;
                }
            }
        }
        Ok(())
    }

    fn apply_symbols(&mut self, table: SymbolTable) {
        for (id, name) in table.values {
            if let Some(value) = self.values.get_local_mut(id) {
                value.name = Some(name);
            }
        }
        for (id, name) in table.blocks {
            if let Some(block) = self.blocks.get_mut(id.index()) {
                block.name = Some(name);
            }
        }
    }
}
