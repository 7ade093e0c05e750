//! Instruction lowering for one basic block.

use super::function::{Callee, FunctionLowering};
use super::slots::ValueClass;
use super::types::{BinOp, CmpOp};
use crate::backend::Backend;
use crate::error::TranslateError;
use crate::ir::codes::opcode_name;
use crate::ir::{InstrKind, Operand};
use crate::sexpr::SExpr;
use anyhow::{Context, Result};
use log::trace;

impl<B: Backend> FunctionLowering<'_, B> {
    /// Statements of basic block `index`, in instruction order.
    pub(super) fn lower_block(&mut self, index: u32) -> Result<Vec<SExpr>> {
        let body = self.body;
        let block = body.blocks.get(index as usize).ok_or_else(|| {
            TranslateError::lowering(format!("shape refers to unknown block {}", index))
        })?;
        trace!("lowering block {} ({} instructions)", index, block.instructions.len());

        let mut out = Vec::new();
        for (i, instr) in block.instructions.iter().enumerate() {
            let expr = match &instr.kind {
                InstrKind::Alloca { .. } | InstrKind::Br { .. } | InstrKind::CondBr { .. } => {
                    continue
                }
                InstrKind::Binop {
                    opcode, lhs, rhs, ..
                } => {
                    let ty = self.operand_type(lhs)?;
                    let op = BinOp::decode(*opcode, ty)?;
                    let lhs = self.operand(lhs)?;
                    let rhs = self.operand(rhs)?;
                    self.backend.emit_binop(ty, op, lhs, rhs)
                }
                InstrKind::Cmp {
                    predicate,
                    lhs,
                    rhs,
                } => {
                    let ty = self.operand_type(lhs)?;
                    let op = CmpOp::decode(*predicate, ty)?;
                    let lhs = self.operand(lhs)?;
                    let rhs = self.operand(rhs)?;
                    self.backend.emit_compare(ty, op, lhs, rhs)
                }
                InstrKind::Load { ptr, .. } => {
                    let slot = self.stack_slot(ptr)?;
                    self.backend.emit_get_local(slot)
                }
                InstrKind::Store { ptr, value, .. } => {
                    let slot = self.stack_slot(ptr)?;
                    let value = self.operand(value)?;
                    out.push(self.backend.emit_set_local(slot, value));
                    continue;
                }
                InstrKind::Ret { value } => {
                    let value = value.as_ref().map(|v| self.operand(v)).transpose()?;
                    out.push(self.backend.emit_return(value));
                    continue;
                }
                InstrKind::Call { callee, args, .. } => self
                    .lower_call(callee, args)
                    .with_context(|| format!("lowering call in block {}", index))?,
                InstrKind::Opaque { code, .. } => {
                    return Err(TranslateError::lowering(format!(
                        "unsupported instruction {} (opcode {}) at block {} instruction {}",
                        opcode_name(*code),
                        code,
                        index,
                        i
                    ))
                    .into())
                }
            };

            match instr.result {
                Some(id) => match self.slots.class_of(self.module, id)? {
                    ValueClass::Local(slot) => out.push(self.backend.emit_set_local(slot, expr)),
                    ValueClass::Inline => self.define_inline(id, expr),
                    _ => out.push(expr),
                },
                None => out.push(expr),
            }
        }
        Ok(out)
    }

    /// Local backing a load or store address.
    fn stack_slot(&self, ptr: &Operand) -> Result<u32> {
        match self.slots.class_of(self.module, ptr.value)? {
            ValueClass::LocalRef(slot) => Ok(slot),
            _ => Err(TranslateError::lowering(format!(
                "memory access through {} which is not a stack slot",
                ptr.value
            ))
            .into()),
        }
    }

    fn lower_call(&mut self, callee: &Operand, args: &[Operand]) -> Result<SExpr> {
        let ValueClass::Function(f) = self.slots.class_of(self.module, callee.value)? else {
            return Err(TranslateError::lowering(format!(
                "indirect call through {}",
                callee.value
            ))
            .into());
        };
        let target = self.callees.get(&f).copied().ok_or_else(|| {
            TranslateError::lowering(format!(
                "call to {} which has no body or import",
                self.module.function_name(f)
            ))
        })?;
        let args = args
            .iter()
            .map(|arg| self.operand(arg))
            .collect::<Result<Vec<_>>>()?;
        Ok(match target {
            Callee::Body(index) => self.backend.emit_call(index, args),
            Callee::Import(index) => self.backend.emit_call_imported(index, args),
        })
    }
}
