//! Emission backends.
//!
//! The lowering decides what to emit; a [`Backend`] decides how each construct
//! is spelled. [`WastBackend`] produces the s-expression dialect of the
//! textual WebAssembly prototype format.

mod wast;
pub use wast::WastBackend;

use crate::codegen::types::{BinOp, CmpOp, WasmType};
use crate::sexpr::SExpr;

/// Constant operand payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
}

/// One arm of a lowered switch.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    /// `None` for the default arm.
    pub value: Option<u32>,
    pub body: Vec<SExpr>,
}

/// Per-construct emission.
pub trait Backend {
    fn emit_const(&self, ty: WasmType, value: Literal) -> SExpr;

    fn emit_get_local(&self, index: u32) -> SExpr;

    fn emit_set_local(&self, index: u32, value: SExpr) -> SExpr;

    fn emit_binop(&self, ty: WasmType, op: BinOp, lhs: SExpr, rhs: SExpr) -> SExpr;

    fn emit_compare(&self, ty: WasmType, op: CmpOp, lhs: SExpr, rhs: SExpr) -> SExpr;

    /// `i32` test for zero.
    fn emit_eqz(&self, value: SExpr) -> SExpr;

    /// Call a function defined in this module, by body index.
    fn emit_call(&self, body_index: usize, args: Vec<SExpr>) -> SExpr;

    /// Call an imported function, by import index.
    fn emit_call_imported(&self, import_index: usize, args: Vec<SExpr>) -> SExpr;

    fn emit_return(&self, value: Option<SExpr>) -> SExpr;

    fn emit_block(&self, label: Option<u32>, body: Vec<SExpr>) -> SExpr;

    fn emit_loop(&self, label: Option<u32>, body: Vec<SExpr>) -> SExpr;

    /// Two-armed conditional; arms are complete expressions.
    fn emit_select_if(&self, cond: SExpr, then: SExpr, otherwise: Option<SExpr>) -> SExpr;

    fn emit_switch(&self, selector: SExpr, cases: Vec<Case>) -> SExpr;

    fn emit_break(&self, label: Option<u32>) -> SExpr;

    fn emit_continue(&self, label: Option<u32>) -> SExpr;

    fn emit_func(
        &self,
        params: &[WasmType],
        result: Option<WasmType>,
        locals: &[WasmType],
        body: Vec<SExpr>,
    ) -> SExpr;

    fn emit_import(
        &self,
        module: &str,
        name: &str,
        params: &[WasmType],
        result: Option<WasmType>,
    ) -> SExpr;

    fn emit_export(&self, name: &str, body_index: usize) -> SExpr;

    fn emit_module(&self, items: Vec<SExpr>) -> SExpr;
}
