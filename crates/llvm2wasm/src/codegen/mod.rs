//! Code generation: lowers the decoded module to S-expressions.
//!
//! # Overview
//!
//! Each function body goes through the control-flow structurer, the shape
//! parser, and finally the instruction and shape lowering below. The module
//! wrapper collects an import for every bodiless declaration, the lowered
//! functions, and the requested exports.
//!
//! ```text
//!   Module (decoded IR)
//!        │
//!        ├─→ resolve_callees()         bodies + bodiless declarations → imports
//!        │
//!        ├─→ for each body:
//!        │     build_flow_graph() ─→ Structurer ─→ parse_shapes()
//!        │     Slots::classify()      params, locals, label slot
//!        │     lower_shapes()         shapes + instructions → forms with holes
//!        │     patch()                holes → get_local / in-place exprs
//!        │
//!        └─→ emit_module(imports, funcs, exports)
//! ```
//!
//! # Sub-modules
//!
//! - **`module`**: module wrapper (imports, functions, exports)
//! - **`function`**: per-function lowering state and hole patching
//! - **`slots`**: value classification and local numbering
//! - **`instruction`**: instruction lowering within one basic block
//! - **`shape`**: structured-shape lowering
//! - **`types`**: value types and operator names

mod function;
mod instruction;
mod module;
mod shape;
mod slots;
pub mod types;

pub use function::Callee;
pub use types::{BinOp, CmpOp, WasmType};

use crate::backend::Backend;
use crate::ir::Module;
use crate::sexpr::SExpr;
use crate::structure::Structurer;
use crate::TranslateOptions;
use anyhow::Result;

/// Code generator that uses a backend to emit output forms.
pub struct CodeGenerator<'a, B: Backend> {
    backend: &'a B,
}

impl<'a, B: Backend> CodeGenerator<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        CodeGenerator { backend }
    }

    /// Lower the whole module.
    pub fn generate_module(
        &self,
        module: &Module,
        structurer: &dyn Structurer,
        options: &TranslateOptions,
    ) -> Result<SExpr> {
        module::generate_module(self.backend, module, structurer, options)
    }
}
