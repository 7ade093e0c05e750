//! Module-level assembly: imports, functions, exports.

use super::function::{lower_function, Callee};
use super::types::WasmType;
use crate::backend::Backend;
use crate::error::TranslateError;
use crate::ir::{Module, Type};
use crate::sexpr::SExpr;
use crate::structure::Structurer;
use crate::TranslateOptions;
use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::HashMap;

/// Lower a decoded module to a `module` form.
pub fn generate_module<B: Backend>(
    backend: &B,
    module: &Module,
    structurer: &dyn Structurer,
    options: &TranslateOptions,
) -> Result<SExpr> {
    let (callees, imported) = resolve_callees(module);

    let mut items = Vec::new();
    for &f in &imported {
        items.push(emit_import(backend, module, f, &options.import_module)?);
    }
    for (index, body) in module.bodies.iter().enumerate() {
        let func = lower_function(backend, module, body, &callees, structurer)
            .with_context(|| {
                format!(
                    "lowering function {} (body {})",
                    module.function_name(body.function),
                    index
                )
            })?;
        items.push(func);
    }
    for (name, index) in export_list(module, options)? {
        items.push(backend.emit_export(&name, index));
    }

    info!(
        "generated {} imports and {} functions",
        imported.len(),
        module.bodies.len()
    );
    Ok(backend.emit_module(items))
}

/// Map every declared function to its body or import index.
///
/// Every bodiless declaration becomes an import, called or not, numbered in
/// declaration order.
fn resolve_callees(module: &Module) -> (HashMap<usize, Callee>, Vec<usize>) {
    let mut callees = HashMap::new();
    let mut imported = Vec::new();
    for (f, function) in module.functions.iter().enumerate() {
        match function.body {
            Some(body) => {
                callees.insert(f, Callee::Body(body));
            }
            None => {
                callees.insert(f, Callee::Import(imported.len()));
                imported.push(f);
            }
        }
    }
    debug!("imports: {:?}", imported);
    (callees, imported)
}

fn emit_import<B: Backend>(
    backend: &B,
    module: &Module,
    f: usize,
    import_module: &str,
) -> Result<SExpr> {
    let name = module.function_name(f);
    let ty = module.functions.get(f).map(|func| func.ty);
    let Some(Type::Function { ret, params, .. }) = ty.and_then(|ty| module.ty(ty)) else {
        return Err(TranslateError::lowering(format!("import {} has no function type", name)).into());
    };
    let params = params
        .iter()
        .map(|&p| WasmType::of(module, p))
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("signature of import {}", name))?;
    let result = WasmType::of_result(module, *ret)?;
    Ok(backend.emit_import(import_module, &name, &params, result))
}

/// `(name, body index)` pairs to export.
fn export_list(module: &Module, options: &TranslateOptions) -> Result<Vec<(String, usize)>> {
    let mut exports: Vec<(String, usize)> = Vec::new();
    if options.export_all {
        for (index, body) in module.bodies.iter().enumerate() {
            if let Some(name) = module.functions.get(body.function).and_then(|f| f.name.clone()) {
                exports.push((name, index));
            }
        }
    }
    for name in &options.exports {
        if exports.iter().any(|(n, _)| n == name) {
            continue;
        }
        let index = module
            .functions
            .iter()
            .find(|f| f.name.as_deref() == Some(name.as_str()))
            .and_then(|f| f.body)
            .ok_or_else(|| {
                TranslateError::lowering(format!("exported function {} is not defined", name))
            })?;
        exports.push((name.clone(), index));
    }
    Ok(exports)
}
