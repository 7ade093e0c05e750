//! Per-function lowering state.
//!
//! Operands that reference values stored in locals or emitted in place become
//! holes. Every hole is recorded in a [`Backpatch`] list against the value it
//! stands for and filled after the whole shape tree is lowered, since nested
//! shapes may emit a use before the block that produces the value.

use super::slots::{Slots, ValueClass};
use super::types::WasmType;
use crate::backend::{Backend, Literal};
use crate::error::TranslateError;
use crate::ir::{
    Backpatch, ConstantValue, FunctionBody, Module, Operand, Type, TypeId, UnresolvedValue,
    ValueId,
};
use crate::relooper::{parse_shapes, uses_label};
use crate::sexpr::{HoleId, SExpr};
use crate::structure::{build_flow_graph, Structurer};
use anyhow::{Context, Result};
use log::{debug, trace};
use std::collections::{BTreeMap, HashMap};

/// How a call reaches a declared function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callee {
    /// Index into the module's function bodies.
    Body(usize),
    /// Index into the emitted imports.
    Import(usize),
}

/// Lower one function body to a `func` form.
pub fn lower_function<B: Backend>(
    backend: &B,
    module: &Module,
    body: &FunctionBody,
    callees: &HashMap<usize, Callee>,
    structurer: &dyn Structurer,
) -> Result<SExpr> {
    let graph = build_flow_graph(body);
    let text = structurer
        .structure(&graph)
        .context("structuring control flow")?;
    trace!("structured control flow:\n{}", text);
    let shapes = parse_shapes(&text).context("parsing structured control flow")?;

    let slots = Slots::classify(module, body, uses_label(&shapes))?;
    let mut lowering =
        FunctionLowering::new(backend, module, body, callees, slots, graph.conditions);
    let mut items = lowering.lower_shapes(&shapes)?;
    lowering.patch(&mut items)?;

    let ret = module
        .functions
        .get(body.function)
        .and_then(|f| match module.ty(f.ty) {
            Some(Type::Function { ret, .. }) => Some(*ret),
            _ => None,
        })
        .ok_or_else(|| TranslateError::lowering("function without a function type"))?;
    let result = WasmType::of_result(module, ret)?;
    debug!(
        "lowered {}: {} top-level forms",
        module.function_name(body.function),
        items.len()
    );
    Ok(backend.emit_func(
        &lowering.slots.params,
        result,
        &lowering.slots.locals,
        items,
    ))
}

pub(super) struct FunctionLowering<'a, B: Backend> {
    pub(super) backend: &'a B,
    pub(super) module: &'a Module,
    pub(super) body: &'a FunctionBody,
    pub(super) callees: &'a HashMap<usize, Callee>,
    pub(super) slots: Slots,
    /// Placeholder number to branch condition.
    pub(super) conditions: BTreeMap<u32, ValueId>,
    holes: Backpatch<HoleId>,
    next_hole: usize,
    /// Expression each local or in-place value stands for.
    fills: HashMap<ValueId, SExpr>,
}

impl<'a, B: Backend> FunctionLowering<'a, B> {
    pub(super) fn new(
        backend: &'a B,
        module: &'a Module,
        body: &'a FunctionBody,
        callees: &'a HashMap<usize, Callee>,
        slots: Slots,
        conditions: BTreeMap<u32, ValueId>,
    ) -> Self {
        let fills = slots
            .local_values()
            .map(|(id, slot)| (id, backend.emit_get_local(slot)))
            .collect();
        Self {
            backend,
            module,
            body,
            callees,
            slots,
            conditions,
            holes: Backpatch::new(),
            next_hole: 0,
            fills,
        }
    }

    pub(super) fn operand(&mut self, op: &Operand) -> Result<SExpr> {
        self.value(op.value)
    }

    pub(super) fn operand_type(&self, op: &Operand) -> Result<WasmType> {
        let ty = op
            .ty
            .ok_or_else(|| TranslateError::lowering(format!("operand {} has no type", op.value)))?;
        WasmType::of(self.module, ty)
    }

    /// Expression reading `id`, possibly a hole filled later.
    pub(super) fn value(&mut self, id: ValueId) -> Result<SExpr> {
        match self.slots.class_of(self.module, id)? {
            ValueClass::Param(index) => Ok(self.backend.emit_get_local(index)),
            ValueClass::Constant { ty, value } => self.constant(ty, &value, id),
            ValueClass::Local(_) | ValueClass::Inline => {
                let hole = HoleId(self.next_hole);
                self.next_hole += 1;
                self.holes.record(id, hole);
                Ok(SExpr::Hole(hole))
            }
            ValueClass::LocalRef(_) => Err(TranslateError::lowering(format!(
                "stack slot {} is used as a value",
                id
            ))
            .into()),
            ValueClass::Unused => Err(TranslateError::lowering(format!(
                "value {} has no recorded uses",
                id
            ))
            .into()),
            ValueClass::Function(f) => Err(TranslateError::lowering(format!(
                "function {} is used as a value",
                self.module.function_name(f)
            ))
            .into()),
            ValueClass::Global(g) => Err(TranslateError::lowering(format!(
                "global variable {} is not supported",
                g
            ))
            .into()),
        }
    }

    /// Register the in-place expression of `id`.
    pub(super) fn define_inline(&mut self, id: ValueId, expr: SExpr) {
        self.fills.insert(id, expr);
    }

    fn constant(&self, ty: TypeId, value: &ConstantValue, id: ValueId) -> Result<SExpr> {
        let wasm = WasmType::of(self.module, ty)?;
        let literal = match value {
            ConstantValue::Integer(v) => match self.module.ty(ty) {
                Some(Type::Integer { bits: 1 }) => Literal::Int(v & 1),
                _ => Literal::Int(*v),
            },
            ConstantValue::Float(v) => Literal::Float(*v),
            ConstantValue::Null | ConstantValue::Undef => Literal::Int(0),
            other => {
                return Err(TranslateError::lowering(format!(
                    "constant {} is not a scalar: {:?}",
                    id, other
                ))
                .into())
            }
        };
        Ok(self.backend.emit_const(wasm, literal))
    }

    /// Fill every hole in `items` with the expression of its value.
    fn patch(&mut self, items: &mut [SExpr]) -> Result<()> {
        let holes = std::mem::take(&mut self.holes);
        trace!("patching {} expression holes", holes.len());
        let fills = &self.fills;
        let resolved: HashMap<HoleId, SExpr> = holes
            .resolve(|id| fills.get(&id).cloned())
            .map_err(|UnresolvedValue(id)| {
                TranslateError::lowering(format!("value {} is used but never lowered", id))
            })?
            .into_iter()
            .collect();
        for item in items.iter_mut() {
            item.fill_holes(&resolved).map_err(|hole| {
                TranslateError::lowering(format!("expression hole {} cannot be filled", hole.0))
            })?;
        }
        Ok(())
    }
}
