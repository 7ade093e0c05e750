//! Value classification and local slot allocation.
//!
//! Locals are numbered after the parameters, in value order: stack
//! allocations and values that must outlive their producing expression each
//! get one slot. The `label` pseudo-variable, when used, takes the last slot.

use super::types::WasmType;
use crate::error::TranslateError;
use crate::ir::{ConstantValue, FunctionBody, InstrKind, Module, Type, TypeId, ValueId, ValueKind};
use anyhow::Result;
use log::debug;
use std::collections::HashMap;

/// How a value is referenced from lowered code.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueClass {
    Param(u32),
    Constant { ty: TypeId, value: ConstantValue },
    /// Stack allocation kept in a local; only loads and stores may use it.
    LocalRef(u32),
    /// Result stored into a local when produced.
    Local(u32),
    /// Single use in the producing block; the expression is emitted in place.
    Inline,
    /// Produced and never used.
    Unused,
    Function(usize),
    Global(usize),
}

#[derive(Debug, Clone)]
pub struct Slots {
    classes: HashMap<ValueId, ValueClass>,
    first_local: u32,
    pub params: Vec<WasmType>,
    /// Declared locals, numbered from `params.len()`.
    pub locals: Vec<WasmType>,
    /// Local holding the `label` pseudo-variable.
    pub label: Option<u32>,
}

#[derive(Debug, Default)]
struct Uses {
    blocks: Vec<usize>,
    as_condition: bool,
}

impl Slots {
    pub fn classify(module: &Module, body: &FunctionBody, needs_label: bool) -> Result<Self> {
        let fn_ty = module
            .functions
            .get(body.function)
            .map(|f| f.ty)
            .ok_or_else(|| TranslateError::lowering("body without a declared function"))?;
        let Some(Type::Function { params, .. }) = module.ty(fn_ty) else {
            return Err(TranslateError::lowering("function without a function type").into());
        };
        let params = params
            .iter()
            .map(|&p| WasmType::of(module, p))
            .collect::<Result<Vec<_>>>()?;

        let mut uses: HashMap<ValueId, Uses> = HashMap::new();
        for (b, block) in body.blocks.iter().enumerate() {
            for instr in &block.instructions {
                for op in instr.kind.operands() {
                    uses.entry(op.value).or_default().blocks.push(b);
                }
                if let InstrKind::CondBr { cond, .. } = &instr.kind {
                    uses.entry(cond.value).or_default().as_condition = true;
                }
            }
        }

        let mut slots = Slots {
            classes: HashMap::new(),
            first_local: body.first_local,
            locals: Vec::new(),
            label: None,
            params,
        };
        for (offset, value) in body.values.iter().enumerate() {
            let id = ValueId(body.first_local + offset as u32);
            let class = match &value.kind {
                ValueKind::Param(i) => ValueClass::Param(*i as u32),
                ValueKind::Constant(constant) => ValueClass::Constant {
                    ty: value.ty.ok_or_else(|| {
                        TranslateError::lowering(format!("constant {} has no type", id))
                    })?,
                    value: constant.clone(),
                },
                ValueKind::Global(g) => ValueClass::Global(*g),
                ValueKind::Function(f) => ValueClass::Function(*f),
                ValueKind::Instruction { block, index } => {
                    let instr = body.instruction(*block, *index).ok_or_else(|| {
                        TranslateError::lowering(format!("value {} has no producer", id))
                    })?;
                    match (&instr.kind, uses.get(&id)) {
                        (InstrKind::Alloca { allocated, .. }, _) => {
                            ValueClass::LocalRef(slots.allocate(WasmType::of(module, *allocated)?))
                        }
                        (_, None) => ValueClass::Unused,
                        (InstrKind::Load { .. } | InstrKind::Call { .. }, Some(_)) => {
                            ValueClass::Local(slots.allocate_for(module, value.ty, id)?)
                        }
                        (_, Some(u))
                            if !u.as_condition
                                && u.blocks.len() == 1
                                && u.blocks[0] == block.index() =>
                        {
                            ValueClass::Inline
                        }
                        _ => ValueClass::Local(slots.allocate_for(module, value.ty, id)?),
                    }
                }
            };
            slots.classes.insert(id, class);
        }
        if needs_label {
            slots.label = Some(slots.allocate(WasmType::I32));
        }
        debug!(
            "function {}: {} params, {} locals{}",
            module.function_name(body.function),
            slots.params.len(),
            slots.locals.len(),
            if slots.label.is_some() { " (with label)" } else { "" }
        );
        Ok(slots)
    }

    fn allocate(&mut self, ty: WasmType) -> u32 {
        self.locals.push(ty);
        (self.params.len() + self.locals.len() - 1) as u32
    }

    fn allocate_for(&mut self, module: &Module, ty: Option<TypeId>, id: ValueId) -> Result<u32> {
        let ty = ty.ok_or_else(|| TranslateError::lowering(format!("value {} has no type", id)))?;
        Ok(self.allocate(WasmType::of(module, ty)?))
    }

    /// Class of any value visible in the function.
    pub fn class_of(&self, module: &Module, id: ValueId) -> Result<ValueClass> {
        if id.0 >= self.first_local {
            return self.classes.get(&id).cloned().ok_or_else(|| {
                TranslateError::lowering(format!("value {} is not defined in this function", id))
                    .into()
            });
        }
        let value = module
            .values
            .get(id.index())
            .ok_or_else(|| TranslateError::lowering(format!("unknown module value {}", id)))?;
        match (&value.kind, value.ty) {
            (ValueKind::Function(f), _) => Ok(ValueClass::Function(*f)),
            (ValueKind::Global(g), _) => Ok(ValueClass::Global(*g)),
            (ValueKind::Constant(constant), Some(ty)) => Ok(ValueClass::Constant {
                ty,
                value: constant.clone(),
            }),
            (kind, _) => Err(TranslateError::lowering(format!(
                "module value {} cannot be referenced: {:?}",
                id, kind
            ))
            .into()),
        }
    }

    /// Values stored in locals, with their slot.
    pub fn local_values(&self) -> impl Iterator<Item = (ValueId, u32)> + '_ {
        self.classes.iter().filter_map(|(id, class)| match class {
            ValueClass::Local(slot) => Some((*id, *slot)),
            _ => None,
        })
    }
}
