//! Textual WebAssembly prototype s-expressions.

use super::{Backend, Case, Literal};
use crate::codegen::types::{BinOp, CmpOp, WasmType};
use crate::sexpr::SExpr;

fn label_atom(label: u32) -> SExpr {
    SExpr::atom(format!("$L{}", label))
}

fn quoted(text: &str) -> SExpr {
    SExpr::atom(format!("\"{}\"", text.escape_default()))
}

/// Float literal that always reads back as a float.
fn float_text(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        let sign = if value.is_sign_negative() { "-" } else { "" };
        format!("{}inf", sign)
    } else {
        let text = value.to_string();
        if text.contains(['.', 'e']) {
            text
        } else {
            format!("{}.0", text)
        }
    }
}

fn typed(ty: WasmType, keyword: &str) -> SExpr {
    SExpr::atom(format!("{}.{}", ty, keyword))
}

/// Backend for the parenthesized text format.
pub struct WastBackend;

impl WastBackend {
    pub fn new() -> Self {
        WastBackend
    }
}

impl Default for WastBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for WastBackend {
    fn emit_const(&self, ty: WasmType, value: Literal) -> SExpr {
        let text = match (value, ty.is_float()) {
            (Literal::Int(v), false) => v.to_string(),
            (Literal::Int(v), true) => float_text(v as f64),
            (Literal::Float(v), true) => float_text(v),
            (Literal::Float(v), false) => (v as i64).to_string(),
        };
        SExpr::List(vec![typed(ty, "const"), SExpr::atom(text)])
    }

    fn emit_get_local(&self, index: u32) -> SExpr {
        SExpr::op("get_local", [SExpr::atom(index.to_string())])
    }

    fn emit_set_local(&self, index: u32, value: SExpr) -> SExpr {
        SExpr::op("set_local", [SExpr::atom(index.to_string()), value])
    }

    fn emit_binop(&self, ty: WasmType, op: BinOp, lhs: SExpr, rhs: SExpr) -> SExpr {
        SExpr::List(vec![typed(ty, op.as_str()), lhs, rhs])
    }

    fn emit_compare(&self, ty: WasmType, op: CmpOp, lhs: SExpr, rhs: SExpr) -> SExpr {
        SExpr::List(vec![typed(ty, op.as_str()), lhs, rhs])
    }

    fn emit_eqz(&self, value: SExpr) -> SExpr {
        SExpr::op("i32.eqz", [value])
    }

    fn emit_call(&self, body_index: usize, args: Vec<SExpr>) -> SExpr {
        let mut items = vec![SExpr::atom("call"), SExpr::atom(body_index.to_string())];
        items.extend(args);
        SExpr::List(items)
    }

    fn emit_call_imported(&self, import_index: usize, args: Vec<SExpr>) -> SExpr {
        let mut items = vec![
            SExpr::atom("call_imported"),
            SExpr::atom(import_index.to_string()),
        ];
        items.extend(args);
        SExpr::List(items)
    }

    fn emit_return(&self, value: Option<SExpr>) -> SExpr {
        SExpr::op("return", value)
    }

    fn emit_block(&self, label: Option<u32>, body: Vec<SExpr>) -> SExpr {
        SExpr::op("block", label.map(label_atom).into_iter().chain(body))
    }

    fn emit_loop(&self, label: Option<u32>, body: Vec<SExpr>) -> SExpr {
        SExpr::op("loop", label.map(label_atom).into_iter().chain(body))
    }

    fn emit_select_if(&self, cond: SExpr, then: SExpr, otherwise: Option<SExpr>) -> SExpr {
        SExpr::op("if", [cond, then].into_iter().chain(otherwise))
    }

    fn emit_switch(&self, selector: SExpr, cases: Vec<Case>) -> SExpr {
        let arms = cases.into_iter().map(|case| match case.value {
            Some(value) => SExpr::op(
                "case",
                std::iter::once(SExpr::atom(value.to_string())).chain(case.body),
            ),
            None => SExpr::op("default", case.body),
        });
        SExpr::op("switch", std::iter::once(selector).chain(arms))
    }

    fn emit_break(&self, label: Option<u32>) -> SExpr {
        SExpr::op("break", label.map(label_atom))
    }

    fn emit_continue(&self, label: Option<u32>) -> SExpr {
        SExpr::op("continue", label.map(label_atom))
    }

    fn emit_func(
        &self,
        params: &[WasmType],
        result: Option<WasmType>,
        locals: &[WasmType],
        body: Vec<SExpr>,
    ) -> SExpr {
        let mut items = vec![SExpr::atom("func")];
        items.extend(params.iter().map(|ty| SExpr::op("param", [SExpr::atom(ty.as_str())])));
        items.extend(result.map(|ty| SExpr::op("result", [SExpr::atom(ty.as_str())])));
        if !locals.is_empty() {
            items.push(SExpr::op(
                "local",
                locals.iter().map(|ty| SExpr::atom(ty.as_str())),
            ));
        }
        items.extend(body);
        SExpr::List(items)
    }

    fn emit_import(
        &self,
        module: &str,
        name: &str,
        params: &[WasmType],
        result: Option<WasmType>,
    ) -> SExpr {
        let mut items = vec![SExpr::atom("import"), quoted(module), quoted(name)];
        items.extend(params.iter().map(|ty| SExpr::op("param", [SExpr::atom(ty.as_str())])));
        items.extend(result.map(|ty| SExpr::op("result", [SExpr::atom(ty.as_str())])));
        SExpr::List(items)
    }

    fn emit_export(&self, name: &str, body_index: usize) -> SExpr {
        SExpr::List(vec![
            SExpr::atom("export"),
            quoted(name),
            SExpr::atom(body_index.to_string()),
        ])
    }

    fn emit_module(&self, items: Vec<SExpr>) -> SExpr {
        SExpr::op("module", items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_carry_their_type() {
        let b = WastBackend::new();
        assert_eq!(
            b.emit_const(WasmType::I64, Literal::Int(-3)).to_string(),
            "(i64.const -3)"
        );
        assert_eq!(
            b.emit_const(WasmType::F64, Literal::Float(2.0)).to_string(),
            "(f64.const 2.0)"
        );
        assert_eq!(
            b.emit_const(WasmType::F32, Literal::Float(0.5)).to_string(),
            "(f32.const 0.5)"
        );
        assert_eq!(
            b.emit_const(WasmType::F32, Literal::Int(0)).to_string(),
            "(f32.const 0.0)"
        );
        assert_eq!(
            b.emit_const(WasmType::F64, Literal::Float(f64::NEG_INFINITY))
                .to_string(),
            "(f64.const -inf)"
        );
    }

    #[test]
    fn labels_go_in_the_head() {
        let b = WastBackend::new();
        let body = vec![b.emit_continue(Some(1))];
        assert_eq!(
            b.emit_loop(Some(1), body).to_string(),
            "(loop $L1 (continue $L1))"
        );
        assert_eq!(b.emit_break(None).to_string(), "(break)");
        assert_eq!(
            b.emit_block(None, vec![b.emit_get_local(0)]).to_string(),
            "(block (get_local 0))"
        );
    }

    #[test]
    fn switch_arms() {
        let b = WastBackend::new();
        let sw = b.emit_switch(
            b.emit_get_local(2),
            vec![
                Case {
                    value: Some(0),
                    body: vec![b.emit_break(Some(1))],
                },
                Case {
                    value: None,
                    body: Vec::new(),
                },
            ],
        );
        assert_eq!(
            sw.to_string(),
            "(switch (get_local 2) (case 0 (break $L1)) (default))"
        );
    }

    #[test]
    fn function_and_import_signatures() {
        let b = WastBackend::new();
        let func = b.emit_func(
            &[WasmType::I32],
            None,
            &[WasmType::I64, WasmType::I32],
            vec![b.emit_return(None)],
        );
        assert_eq!(
            func.to_string(),
            "(func (param i32) (local i64 i32) (return))"
        );
        let import = b.emit_import("external", "puts", &[WasmType::I32], Some(WasmType::I32));
        assert_eq!(
            import.to_string(),
            "(import \"external\" \"puts\" (param i32) (result i32))"
        );
        assert_eq!(b.emit_export("add", 0).to_string(), "(export \"add\" 0)");
    }
}
