//! llvm2wasm: LLVM bitcode to WebAssembly text translator.
//!
//! The pipeline reads a bitcode file into a tree of blocks and records,
//! decodes that tree into a typed module, structures each function's control
//! flow, and lowers the result to a parenthesized WebAssembly module.
//!
//! ```text
//! bytes ─→ bitstream ─→ ir::decode_module ─→ structure ─→ relooper ─→ codegen ─→ text
//! ```

pub mod backend;
pub mod bitstream;
pub mod codegen;
pub mod error;
pub mod ir;
pub mod relooper;
pub mod sexpr;
pub mod structure;

// Re-export key types for convenience
pub use anyhow::{Context, Result};
pub use error::{root_translate_error, ErrorKind, TranslateError};
pub use ir::Module;
pub use structure::{DispatchStructurer, FlowGraph, Structurer};

use backend::WastBackend;
use bitstream::{open_bitcode, parse_bitstream};
use codegen::CodeGenerator;
use ir::decode_module;
use log::info;

/// Configuration options for translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateOptions {
    /// Module name used for every import.
    pub import_module: String,
    /// Functions to export by name.
    pub exports: Vec<String>,
    /// Export every named function that has a body.
    pub export_all: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            import_module: "external".to_string(),
            exports: Vec::new(),
            export_all: false,
        }
    }
}

/// Translate LLVM bitcode to WebAssembly text.
///
/// Control flow is structured with [`DispatchStructurer`].
///
/// # Example
/// ```no_run
/// use llvm2wasm::{translate, TranslateOptions};
///
/// let bytes = std::fs::read("input.bc").unwrap();
/// let wast = translate(&bytes, &TranslateOptions::default()).unwrap();
/// std::fs::write("output.wast", wast).unwrap();
/// ```
pub fn translate(bytes: &[u8], options: &TranslateOptions) -> Result<String> {
    translate_with(bytes, options, &DispatchStructurer::new())
}

/// Translate LLVM bitcode with a caller-provided control flow structurer.
pub fn translate_with(
    bytes: &[u8],
    options: &TranslateOptions,
    structurer: &dyn Structurer,
) -> Result<String> {
    let module = decode(bytes)?;

    let backend = WastBackend::new();
    let codegen = CodeGenerator::new(&backend);
    let wast = codegen
        .generate_module(&module, structurer, options)
        .context("failed to generate module")?;

    Ok(wast.pretty())
}

/// Parse and decode bitcode without lowering it.
pub fn decode(bytes: &[u8]) -> Result<Module> {
    let stream = open_bitcode(bytes)?;
    let entries = parse_bitstream(stream).context("failed to parse bitstream")?;
    let module = decode_module(&entries).context("failed to decode module")?;
    info!(
        "decoded {} types, {} functions, {} bodies",
        module.types.len(),
        module.functions.len(),
        module.bodies.len()
    );
    Ok(module)
}
