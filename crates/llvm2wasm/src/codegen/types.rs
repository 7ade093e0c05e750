//! Value types and operator names of the output format.

use crate::error::TranslateError;
use crate::ir::{Module, Type, TypeId};
use anyhow::Result;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WasmType {
    I32,
    I64,
    F32,
    F64,
}

impl WasmType {
    pub fn as_str(self) -> &'static str {
        match self {
            WasmType::I32 => "i32",
            WasmType::I64 => "i64",
            WasmType::F32 => "f32",
            WasmType::F64 => "f64",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, WasmType::F32 | WasmType::F64)
    }

    /// Map a decoded type onto its value type.
    ///
    /// Integers up to 32 bits and pointers are `i32`.
    pub fn of(module: &Module, ty: TypeId) -> Result<Self> {
        let wasm = match module.ty(ty) {
            Some(Type::Integer { bits }) if *bits <= 32 => WasmType::I32,
            Some(Type::Integer { bits: 64 }) => WasmType::I64,
            Some(Type::Pointer { .. }) => WasmType::I32,
            Some(Type::Float) => WasmType::F32,
            Some(Type::Double) => WasmType::F64,
            other => {
                return Err(TranslateError::lowering(format!(
                    "type {} ({:?}) has no value type",
                    ty.0, other
                ))
                .into())
            }
        };
        Ok(wasm)
    }

    /// `None` for `void`.
    pub fn of_result(module: &Module, ty: TypeId) -> Result<Option<Self>> {
        if module.ty(ty).is_some_and(Type::is_void) {
            return Ok(None);
        }
        Self::of(module, ty).map(Some)
    }
}

impl fmt::Display for WasmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary arithmetic operator, named without its type prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    DivU,
    DivS,
    RemU,
    RemS,
    Shl,
    ShrU,
    ShrS,
    And,
    Or,
    Xor,
    /// Float division.
    Div,
}

impl BinOp {
    /// Decode a BINOP opcode for operands of type `ty`.
    pub fn decode(opcode: u64, ty: WasmType) -> Result<Self> {
        let op = if ty.is_float() {
            match opcode {
                0 => Some(BinOp::Add),
                1 => Some(BinOp::Sub),
                2 => Some(BinOp::Mul),
                4 => Some(BinOp::Div),
                _ => None,
            }
        } else {
            match opcode {
                0 => Some(BinOp::Add),
                1 => Some(BinOp::Sub),
                2 => Some(BinOp::Mul),
                3 => Some(BinOp::DivU),
                4 => Some(BinOp::DivS),
                5 => Some(BinOp::RemU),
                6 => Some(BinOp::RemS),
                7 => Some(BinOp::Shl),
                8 => Some(BinOp::ShrU),
                9 => Some(BinOp::ShrS),
                10 => Some(BinOp::And),
                11 => Some(BinOp::Or),
                12 => Some(BinOp::Xor),
                _ => None,
            }
        };
        op.ok_or_else(|| {
            TranslateError::lowering(format!("unsupported {} binary opcode {}", ty, opcode)).into()
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::DivU => "div_u",
            BinOp::DivS => "div_s",
            BinOp::RemU => "rem_u",
            BinOp::RemS => "rem_s",
            BinOp::Shl => "shl",
            BinOp::ShrU => "shr_u",
            BinOp::ShrS => "shr_s",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Div => "div",
        }
    }
}

/// Comparison operator, named without its type prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    GtU,
    GeU,
    LtU,
    LeU,
    GtS,
    GeS,
    LtS,
    LeS,
    /// Ordered float comparisons.
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    /// Decode a CMP2 predicate for operands of type `ty`.
    pub fn decode(predicate: u64, ty: WasmType) -> Result<Self> {
        let op = if ty.is_float() {
            match predicate {
                1 => Some(CmpOp::Eq),
                2 => Some(CmpOp::Gt),
                3 => Some(CmpOp::Ge),
                4 => Some(CmpOp::Lt),
                5 => Some(CmpOp::Le),
                6 | 14 => Some(CmpOp::Ne),
                _ => None,
            }
        } else {
            match predicate {
                32 => Some(CmpOp::Eq),
                33 => Some(CmpOp::Ne),
                34 => Some(CmpOp::GtU),
                35 => Some(CmpOp::GeU),
                36 => Some(CmpOp::LtU),
                37 => Some(CmpOp::LeU),
                38 => Some(CmpOp::GtS),
                39 => Some(CmpOp::GeS),
                40 => Some(CmpOp::LtS),
                41 => Some(CmpOp::LeS),
                _ => None,
            }
        };
        op.ok_or_else(|| {
            TranslateError::lowering(format!("unsupported {} compare predicate {}", ty, predicate))
                .into()
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::GtU => "gt_u",
            CmpOp::GeU => "ge_u",
            CmpOp::LtU => "lt_u",
            CmpOp::LeU => "le_u",
            CmpOp::GtS => "gt_s",
            CmpOp::GeS => "ge_s",
            CmpOp::LtS => "lt_s",
            CmpOp::LeS => "le_s",
            CmpOp::Gt => "gt",
            CmpOp::Ge => "ge",
            CmpOp::Lt => "lt",
            CmpOp::Le => "le",
        }
    }
}
