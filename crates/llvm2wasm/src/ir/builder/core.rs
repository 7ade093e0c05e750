//! Module-level scan and function body binding.
//!
//! Function blocks are not decoded while scanning: a body may refer to
//! globals, constants and functions declared after it in byte order, so the
//! bodies are decoded only once every module-level value has its final id.

use super::constants::decode_constants;
use super::function::FunctionDecoder;
use super::symtab::SymbolTable;
use super::type_table::decode_types;
use crate::bitstream::{Block, Entry, Record};
use crate::error::TranslateError;
use crate::ir::codes::*;
use crate::ir::types::*;
use crate::ir::values::ValueTable;
use anyhow::{Context, Result};
use log::{debug, trace, warn};

/// Module state collected before any function body is decoded.
pub(super) struct ModuleScan<'b> {
    module: Module,
    function_blocks: Vec<&'b Block>,
    symtabs: Vec<SymbolTable>,
}

impl<'b> ModuleScan<'b> {
    pub fn scan(block: &'b Block) -> Result<Self> {
        let mut scan = ModuleScan {
            module: Module::default(),
            function_blocks: Vec::new(),
            symtabs: Vec::new(),
        };
        for entry in &block.content {
            match entry {
                Entry::Record(record) => scan.record(record)?,
                Entry::Block(inner) => scan.block(inner)?,
            }
        }
        Ok(scan)
    }

    fn block(&mut self, block: &'b Block) -> Result<()> {
        match block.id {
            TYPE_BLOCK_ID_NEW => {
                let types = decode_types(block).context("decoding type table")?;
                self.module.types.extend(types);
            }
            CONSTANTS_BLOCK_ID => {
                let module = &mut self.module;
                let mut table = ValueTable::new(&module.values);
                decode_constants(block, &module.types, &module.globals, &mut table)
                    .context("decoding module constants")?;
                let added = table.into_local();
                module.values.extend(added);
            }
            FUNCTION_BLOCK_ID => self.function_blocks.push(block),
            VALUE_SYMTAB_BLOCK_ID => self.symtabs.push(SymbolTable::read(block)?),
            PARAMATTR_BLOCK_ID | PARAMATTR_GROUP_BLOCK_ID | METADATA_BLOCK_ID
            | METADATA_ATTACHMENT_ID | TYPE_SYMTAB_BLOCK_ID => {
                trace!("skipping module block {}", block.id)
            }
            other => warn!("ignoring unknown module block {}", other),
        }
        Ok(())
    }

    fn record(&mut self, record: &Record) -> Result<()> {
        let module = &mut self.module;
        match record.code {
            MODULE_CODE_VERSION => module.version = record.get(0),
            MODULE_CODE_TRIPLE => module.triple = Some(record.text(0)),
            MODULE_CODE_DATALAYOUT => module.datalayout = Some(record.text(0)),
            MODULE_CODE_GLOBALVAR => {
                // [ptrty, isconst, initid, ...]
                let ty = type_ref(module, record.op(0)?)?;
                let init = record.op(2)?;
                let value = ValueId(module.values.len() as u32);
                module.globals.push(GlobalVar {
                    name: None,
                    ty,
                    is_const: record.op(1)? & 1 != 0,
                    init: (init != 0).then(|| ValueId((init - 1) as u32)),
                    value,
                });
                module.values.push(Value::new(
                    Some(ty),
                    ValueKind::Global(module.globals.len() - 1),
                ));
            }
            MODULE_CODE_FUNCTION => {
                // [type, callingconv, isproto, ...]
                let record_ty = type_ref(module, record.op(0)?)?;
                let ty = module.function_type_of(record_ty).ok_or_else(|| {
                    anyhow::Error::from(TranslateError::semantic(format!(
                        "function declared with non-function type {}",
                        record_ty.0
                    )))
                })?;
                let value = ValueId(module.values.len() as u32);
                module.functions.push(DeclaredFunction {
                    name: None,
                    ty,
                    calling_conv: record.op(1)?,
                    is_proto: record.op(2)? != 0,
                    value,
                    body: None,
                });
                module.values.push(Value::new(
                    Some(record_ty),
                    ValueKind::Function(module.functions.len() - 1),
                ));
            }
            other => warn!("ignoring module record {}", other),
        }
        Ok(())
    }

    /// Apply symbol names, bind function blocks and decode every body.
    pub fn finish(mut self) -> Result<Module> {
        for table in std::mem::take(&mut self.symtabs) {
            self.apply_names(&table);
            self.bind_by_offset(&table);
        }
        let bindings = self.bind_remaining()?;

        let module = &self.module;
        let mut bodies = Vec::with_capacity(bindings.len());
        for (function, block) in bindings {
            let body = FunctionDecoder::new(module, function)
                .decode(block)
                .with_context(|| {
                    format!("decoding function body {}", module.function_name(function))
                })?;
            bodies.push(body);
        }

        let mut module = self.module;
        for (index, body) in bodies.iter().enumerate() {
            if let Some(f) = module.functions.get_mut(body.function) {
                f.body = Some(index);
            }
        }
        module.bodies = bodies;
        debug!(
            "module: {} types, {} globals, {} functions, {} bodies",
            module.types.len(),
            module.globals.len(),
            module.functions.len(),
            module.bodies.len()
        );
        Ok(module)
    }

    fn apply_names(&mut self, table: &SymbolTable) {
        let module = &mut self.module;
        for (id, name) in &table.values {
            let Some(value) = module.values.get_mut(id.index()) else {
                warn!("symbol {} names unknown value {}", name, id);
                continue;
            };
            value.name = Some(name.clone());
            match value.kind {
                ValueKind::Global(g) => {
                    if let Some(global) = module.globals.get_mut(g) {
                        global.name = Some(name.clone());
                    }
                }
                ValueKind::Function(f) => {
                    if let Some(function) = module.functions.get_mut(f) {
                        function.name = Some(name.clone());
                    }
                }
                _ => {}
            }
        }
    }

    /// Pending function block bindings found through FNENTRY offsets.
    fn bind_by_offset(&mut self, table: &SymbolTable) {
        for &(id, word) in &table.fn_offsets {
            let Some(&ValueKind::Function(f)) = self.module.values.get(id.index()).map(|v| &v.kind)
            else {
                warn!("function entry for non-function value {}", id);
                continue;
            };
            match self
                .function_blocks
                .iter()
                .position(|b| b.bit_offset / 32 == word)
            {
                Some(position) => {
                    if let Some(function) = self.module.functions.get_mut(f) {
                        trace!("function {} bound to block at word {}", f, word);
                        function.body = Some(position);
                    }
                }
                None => warn!("no function block at word {} for value {}", word, id),
            }
        }
    }

    /// Resolve every function block to the function it defines.
    ///
    /// `DeclaredFunction::body` temporarily holds block positions here. Blocks
    /// not bound by offset are paired in order with the remaining
    /// non-prototype functions.
    fn bind_remaining(&mut self) -> Result<Vec<(usize, &'b Block)>> {
        let mut owner: Vec<Option<usize>> = vec![None; self.function_blocks.len()];
        for (f, function) in self.module.functions.iter_mut().enumerate() {
            if let Some(position) = function.body.take() {
                if let Some(slot) = owner.get_mut(position) {
                    *slot = Some(f);
                }
            }
        }
        let mut candidates = self
            .module
            .functions
            .iter()
            .enumerate()
            .filter(|(f, function)| !function.is_proto && !owner.contains(&Some(*f)))
            .map(|(f, _)| f)
            .collect::<Vec<_>>()
            .into_iter();
        for slot in owner.iter_mut().filter(|slot| slot.is_none()) {
            *slot = Some(candidates.next().ok_or_else(|| {
                anyhow::Error::from(TranslateError::semantic(
                    "function block without a matching declaration",
                ))
            })?);
        }

        let mut bindings: Vec<(usize, &'b Block)> = owner
            .into_iter()
            .zip(self.function_blocks.iter().copied())
            .filter_map(|(f, block)| f.map(|f| (f, block)))
            .collect();
        bindings.sort_by_key(|(f, _)| *f);
        Ok(bindings)
    }
}

fn type_ref(module: &Module, id: u64) -> Result<TypeId> {
    if id >= module.types.len() as u64 {
        return Err(TranslateError::semantic(format!("unknown type {}", id)).into());
    }
    Ok(TypeId(id as u32))
}
