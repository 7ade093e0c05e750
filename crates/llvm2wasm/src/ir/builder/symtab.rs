//! VALUE_SYMTAB decoding.

use crate::bitstream::{Block, Entry};
use crate::ir::codes::{VST_CODE_BBENTRY, VST_CODE_ENTRY, VST_CODE_FNENTRY};
use crate::ir::types::{BlockId, ValueId};
use anyhow::Result;
use log::warn;

/// Names and function-block offsets collected from one symbol table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct SymbolTable {
    pub values: Vec<(ValueId, String)>,
    pub blocks: Vec<(BlockId, String)>,
    /// `(function value, 32-bit word offset of its block)` from FNENTRY.
    pub fn_offsets: Vec<(ValueId, u64)>,
}

impl SymbolTable {
    pub fn read(block: &Block) -> Result<Self> {
        let mut table = SymbolTable::default();
        for entry in &block.content {
            let Entry::Record(record) = entry else {
                continue;
            };
            match record.code {
                VST_CODE_ENTRY => {
                    let id = ValueId(record.op(0)? as u32);
                    table.values.push((id, record.text(1)));
                }
                VST_CODE_BBENTRY => {
                    let id = BlockId(record.op(0)? as u32);
                    table.blocks.push((id, record.text(1)));
                }
                VST_CODE_FNENTRY => {
                    let id = ValueId(record.op(0)? as u32);
                    table.fn_offsets.push((id, record.op(1)?));
                    table.values.push((id, record.text(2)));
                }
                other => warn!("ignoring value symbol table record {}", other),
            }
        }
        Ok(table)
    }
}
