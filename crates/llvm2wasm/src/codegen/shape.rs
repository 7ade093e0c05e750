//! Shape tree lowering.

use super::function::FunctionLowering;
use super::types::{CmpOp, WasmType};
use crate::backend::{Backend, Case, Literal};
use crate::error::TranslateError;
use crate::relooper::{CaseValue, Condition, Shape};
use crate::sexpr::SExpr;
use anyhow::Result;

impl<B: Backend> FunctionLowering<'_, B> {
    pub(super) fn lower_shapes(&mut self, shapes: &[Shape]) -> Result<Vec<SExpr>> {
        let mut out = Vec::new();
        for shape in shapes {
            out.extend(self.lower_shape(shape)?);
        }
        Ok(out)
    }

    fn lower_shape(&mut self, shape: &Shape) -> Result<Vec<SExpr>> {
        let expr = match shape {
            Shape::Leaf(block) => return self.lower_block(*block),
            Shape::Block(body) => {
                let body = self.lower_shapes(body)?;
                self.backend.emit_block(None, body)
            }
            Shape::Loop(body) => {
                let body = self.lower_shapes(body)?;
                self.backend.emit_loop(None, body)
            }
            Shape::Labeled { label, shape } => match shape.as_ref() {
                Shape::Block(body) => {
                    let body = self.lower_shapes(body)?;
                    self.backend.emit_block(Some(*label), body)
                }
                Shape::Loop(body) => {
                    let body = self.lower_shapes(body)?;
                    self.backend.emit_loop(Some(*label), body)
                }
                other => {
                    let body = self.lower_shape(other)?;
                    self.backend.emit_block(Some(*label), body)
                }
            },
            Shape::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.condition(cond)?;
                let then = self.lower_shapes(then)?;
                let then = self.backend.emit_block(None, then);
                let otherwise = match otherwise {
                    Some(shapes) => {
                        let body = self.lower_shapes(shapes)?;
                        Some(self.backend.emit_block(None, body))
                    }
                    None => None,
                };
                self.backend.emit_select_if(cond, then, otherwise)
            }
            Shape::Switch { selector, arms } => {
                let selector = self.condition(selector)?;
                let mut cases = Vec::with_capacity(arms.len());
                for arm in arms {
                    let value = match arm.value {
                        None => None,
                        Some(CaseValue::Number(n)) => Some(n),
                        Some(CaseValue::Expr(n)) => {
                            return Err(TranslateError::lowering(format!(
                                "switch case on placeholder \"{}\" is not supported",
                                n
                            ))
                            .into())
                        }
                    };
                    let body = self.lower_shapes(&arm.body)?;
                    cases.push(Case { value, body });
                }
                self.backend.emit_switch(selector, cases)
            }
            Shape::Break(label) => self.backend.emit_break(*label),
            Shape::Continue(label) => self.backend.emit_continue(*label),
            Shape::SetLabel(n) => {
                let slot = self.label_slot()?;
                let value = self.backend.emit_const(WasmType::I32, Literal::Int(i64::from(*n)));
                self.backend.emit_set_local(slot, value)
            }
        };
        Ok(vec![expr])
    }

    fn label_slot(&self) -> Result<u32> {
        self.slots
            .label
            .ok_or_else(|| TranslateError::lowering("label used without a label local").into())
    }

    /// `i32` expression for a guard or selector.
    fn condition(&mut self, cond: &Condition) -> Result<SExpr> {
        Ok(match cond {
            Condition::Const(n) => self
                .backend
                .emit_const(WasmType::I32, Literal::Int(i64::from(*n))),
            Condition::Label => {
                let slot = self.label_slot()?;
                self.backend.emit_get_local(slot)
            }
            Condition::Expr(n) => {
                let value = self.conditions.get(n).copied().ok_or_else(|| {
                    TranslateError::lowering(format!("unknown branch condition \"{}\"", n))
                })?;
                self.value(value)?
            }
            Condition::Not(inner) => {
                let inner = self.condition(inner)?;
                self.backend.emit_eqz(inner)
            }
            Condition::And(lhs, rhs) => {
                let lhs = self.condition(lhs)?;
                let rhs = self.condition(rhs)?;
                let zero = self.backend.emit_const(WasmType::I32, Literal::Int(0));
                self.backend.emit_select_if(lhs, rhs, Some(zero))
            }
            Condition::Eq(lhs, rhs) => {
                let lhs = self.condition(lhs)?;
                let rhs = self.condition(rhs)?;
                self.backend.emit_compare(WasmType::I32, CmpOp::Eq, lhs, rhs)
            }
        })
    }
}
