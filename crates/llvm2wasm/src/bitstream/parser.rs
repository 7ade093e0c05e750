//! Structural parser: bits to a tree of blocks and records.
//!
//! The parser keeps a stack of open block scopes. Each scope owns the
//! abbreviations that apply inside it and its own copy of the BLOCKINFO
//! registry, both cloned from the enclosing scope when the block is entered.
//! BLOCKINFO directives write into the enclosing scope's registry, so they are
//! visible to every block entered after them at that level or below.

use super::abbrev::{Abbrev, Operand};
use super::reader::BitReader;
use super::{
    ABBREV_ID_WIDTH, BLOCKINFO_BLOCK_ID, BLOCKINFO_CODE_BLOCKNAME, BLOCKINFO_CODE_SETBID,
    BLOCKINFO_CODE_SETRECORDNAME, DEFINE_ABBREV, END_BLOCK, ENTER_SUBBLOCK,
    FIRST_APPLICATION_ABBREV, UNABBREV_RECORD,
};
use crate::error::TranslateError;
use anyhow::Result;
use log::{trace, warn};
use std::collections::{BTreeMap, HashMap};

/// One item of block content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Block(Block),
    Record(Record),
}

/// A parsed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: u64,
    /// Abbreviations in effect at the end of the block (inherited first, then inline).
    pub abbrevs: Vec<Abbrev>,
    pub content: Vec<Entry>,
    /// Bit offset of the ENTER_SUBBLOCK abbreviation ID, from the start of the stream.
    pub bit_offset: u64,
    /// Names registered through BLOCKINFO for this block id.
    pub meta: Option<BlockMeta>,
}

/// Diagnostic names from BLOCKNAME / SETRECORDNAME.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockMeta {
    pub name: Option<String>,
    pub record_names: BTreeMap<u64, String>,
}

/// A record: code plus operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub code: u64,
    pub ops: Vec<Operand>,
    /// Whether the record was decoded through an abbreviation.
    pub abbreviated: bool,
}

impl Record {
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Numeric operand at `index`, if present.
    pub fn get(&self, index: usize) -> Option<u64> {
        self.ops.get(index).and_then(Operand::as_u64)
    }

    /// Numeric operand at `index`; missing or non-numeric operands are an error.
    pub fn op(&self, index: usize) -> Result<u64> {
        self.get(index).ok_or_else(|| {
            TranslateError::semantic(format!(
                "record {} has no numeric operand {} (len {})",
                self.code,
                index,
                self.ops.len()
            ))
            .into()
        })
    }

    /// Operands from `start` read as characters; blob operands contribute their bytes.
    pub fn text(&self, start: usize) -> String {
        let mut bytes = Vec::new();
        for op in self.ops.iter().skip(start) {
            match op {
                Operand::Blob(blob) => bytes.extend_from_slice(blob),
                other => {
                    if let Some(v) = other.as_u64() {
                        bytes.push(v as u8);
                    }
                }
            }
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[derive(Debug, Clone, Default)]
struct BlockInfo {
    abbrevs: Vec<Abbrev>,
    name: Option<String>,
    record_names: BTreeMap<u64, String>,
}

impl BlockInfo {
    fn meta(&self) -> Option<BlockMeta> {
        if self.name.is_none() && self.record_names.is_empty() {
            return None;
        }
        Some(BlockMeta {
            name: self.name.clone(),
            record_names: self.record_names.clone(),
        })
    }
}

type BlockInfoMap = HashMap<u64, BlockInfo>;

/// An open block. The stream root is a scope with no id.
struct Scope {
    id: Option<u64>,
    abbrev_width: u32,
    abbrevs: Vec<Abbrev>,
    content: Vec<Entry>,
    bit_offset: u64,
    blockinfo: BlockInfoMap,
    /// Target block id selected by SETBID (BLOCKINFO scopes only).
    target: Option<u64>,
}

impl Scope {
    fn root() -> Self {
        Self {
            id: None,
            abbrev_width: ABBREV_ID_WIDTH,
            abbrevs: Vec::new(),
            content: Vec::new(),
            bit_offset: 0,
            blockinfo: HashMap::new(),
            target: None,
        }
    }

    fn is_blockinfo(&self) -> bool {
        self.id == Some(BLOCKINFO_BLOCK_ID)
    }
}

/// Parse a raw bitstream (starting with the `'BC' 0xC0DE` magic) into its top-level entries.
pub fn parse_bitstream(bytes: &[u8]) -> Result<Vec<Entry>> {
    let mut reader = BitReader::new(bytes);
    let first = reader.read_bits(16)?;
    let second = reader.read_bits(16)?;
    if first != 0x4342 || second != 0xdec0 {
        return Err(TranslateError::format(
            0,
            format!("bad magic {:#06x} {:#06x}", first, second),
        )
        .into());
    }
    StreamParser::new(reader).run()
}

struct StreamParser<'a> {
    reader: BitReader<'a>,
    stack: Vec<Scope>,
}

impl<'a> StreamParser<'a> {
    fn new(reader: BitReader<'a>) -> Self {
        Self {
            reader,
            stack: vec![Scope::root()],
        }
    }

    fn run(mut self) -> Result<Vec<Entry>> {
        while !self.reader.is_eof() {
            let offset = self.reader.bit_offset();
            let width = self.current().abbrev_width;
            let abbrev_id = self.reader.read_bits(width)?;
            match abbrev_id {
                END_BLOCK => self.end_block(offset)?,
                ENTER_SUBBLOCK => self.enter_block(offset)?,
                DEFINE_ABBREV => self.define_abbrev()?,
                UNABBREV_RECORD => self.unabbreviated_record()?,
                id => self.abbreviated_record(id, offset)?,
            }
        }
        if self.stack.len() > 1 {
            return Err(TranslateError::format(
                self.reader.bit_offset(),
                format!("{} unterminated block(s)", self.stack.len() - 1),
            )
            .into());
        }
        Ok(self.stack.pop().map(|root| root.content).unwrap_or_default())
    }

    fn current(&self) -> &Scope {
        // The root scope is never popped.
        &self.stack[self.stack.len() - 1]
    }

    fn current_mut(&mut self) -> &mut Scope {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn enter_block(&mut self, offset: u64) -> Result<()> {
        let id = self.reader.read_vbr_u64(8)?;
        let width = self.reader.read_vbr_u64(4)? as u32;
        self.reader.align();
        let _length_words = self.reader.read_u32_aligned()?;
        if width == 0 || width > 32 {
            return Err(
                TranslateError::format(offset, format!("abbreviation width {} out of range", width))
                    .into(),
            );
        }
        trace!("enter block {} at bit {} (width {})", id, offset, width);
        let blockinfo = self.current().blockinfo.clone();
        let abbrevs = blockinfo
            .get(&id)
            .map(|info| info.abbrevs.clone())
            .unwrap_or_default();
        self.stack.push(Scope {
            id: Some(id),
            abbrev_width: width,
            abbrevs,
            content: Vec::new(),
            bit_offset: offset,
            blockinfo,
            target: None,
        });
        Ok(())
    }

    fn end_block(&mut self, offset: u64) -> Result<()> {
        if self.stack.len() < 2 {
            return Err(TranslateError::format(offset, "END_BLOCK outside of any block").into());
        }
        self.reader.align();
        let Some(scope) = self.stack.pop() else {
            return Ok(());
        };
        let Some(id) = scope.id else {
            return Ok(());
        };
        trace!("end block {} ({} entries)", id, scope.content.len());
        if id == BLOCKINFO_BLOCK_ID {
            return Ok(());
        }
        let parent = self.current_mut();
        let meta = parent.blockinfo.get(&id).and_then(BlockInfo::meta);
        parent.content.push(Entry::Block(Block {
            id,
            abbrevs: scope.abbrevs,
            content: scope.content,
            bit_offset: scope.bit_offset,
            meta,
        }));
        Ok(())
    }

    fn define_abbrev(&mut self) -> Result<()> {
        let offset = self.reader.bit_offset();
        let abbrev = Abbrev::read_definition(&mut self.reader)?;
        if !self.current().is_blockinfo() {
            self.current_mut().abbrevs.push(abbrev);
            return Ok(());
        }
        let target = self.current().target.ok_or_else(|| {
            anyhow::Error::from(TranslateError::format(
                offset,
                "DEFINE_ABBREV in BLOCKINFO before SETBID",
            ))
        })?;
        self.parent_registry()
            .entry(target)
            .or_default()
            .abbrevs
            .push(abbrev);
        Ok(())
    }

    /// Registry that BLOCKINFO directives write into.
    fn parent_registry(&mut self) -> &mut BlockInfoMap {
        let index = self.stack.len().saturating_sub(2);
        &mut self.stack[index].blockinfo
    }

    fn unabbreviated_record(&mut self) -> Result<()> {
        let code = self.reader.read_vbr_u64(6)?;
        let count = self.reader.read_vbr_u64(6)?;
        let mut ops = Vec::new();
        for _ in 0..count {
            ops.push(Operand::from(self.reader.read_vbr(6)?));
        }
        let record = Record {
            code,
            ops,
            abbreviated: false,
        };
        if self.current().is_blockinfo() {
            return self.blockinfo_directive(record);
        }
        trace!("record {} ({} ops)", record.code, record.ops.len());
        self.current_mut().content.push(Entry::Record(record));
        Ok(())
    }

    fn abbreviated_record(&mut self, abbrev_id: u64, offset: u64) -> Result<()> {
        let index = (abbrev_id - FIRST_APPLICATION_ABBREV) as usize;
        let abbrev = self.current().abbrevs.get(index).cloned().ok_or_else(|| {
            anyhow::Error::from(TranslateError::format(
                offset,
                format!("unknown abbreviation id {}", abbrev_id),
            ))
        })?;
        let (code, ops) = abbrev.read_record(&mut self.reader)?;
        if self.current().is_blockinfo() {
            warn!("discarding abbreviated record {} inside BLOCKINFO", code);
            return Ok(());
        }
        trace!("abbreviated record {} ({} ops)", code, ops.len());
        self.current_mut().content.push(Entry::Record(Record {
            code,
            ops,
            abbreviated: true,
        }));
        Ok(())
    }

    fn blockinfo_directive(&mut self, record: Record) -> Result<()> {
        match record.code {
            BLOCKINFO_CODE_SETBID => {
                let target = record.get(0).ok_or_else(|| {
                    anyhow::Error::from(TranslateError::format(
                        self.reader.bit_offset(),
                        "SETBID without a block id",
                    ))
                })?;
                self.current_mut().target = Some(target);
            }
            BLOCKINFO_CODE_BLOCKNAME | BLOCKINFO_CODE_SETRECORDNAME => {
                let Some(target) = self.current().target else {
                    warn!("BLOCKINFO name record before SETBID ignored");
                    return Ok(());
                };
                let info = self.parent_registry().entry(target).or_default();
                if record.code == BLOCKINFO_CODE_BLOCKNAME {
                    info.name = Some(record.text(0));
                } else if let Some(code) = record.get(0) {
                    info.record_names.insert(code, record.text(1));
                }
            }
            other => warn!("unknown BLOCKINFO record {} ignored", other),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::abbrev::AbbrevOp;
    use crate::bitstream::writer::{AbbrevField, BitWriter};
    use crate::error::{root_translate_error, ErrorKind};

    fn name_abbrev() -> Abbrev {
        Abbrev {
            ops: vec![
                AbbrevOp::Literal(5),
                AbbrevOp::Fixed(3),
                AbbrevOp::Array(Box::new(AbbrevOp::Char6)),
            ],
        }
    }

    fn name_fields() -> Vec<AbbrevField> {
        vec![
            AbbrevField::Scalar(6),
            AbbrevField::Array("main".bytes().map(|b| (b - b'a') as u64).collect()),
        ]
    }

    fn only_block(entries: &[Entry]) -> &Block {
        match entries {
            [Entry::Block(block)] => block,
            other => panic!("expected a single block, got {:?}", other),
        }
    }

    #[test]
    fn nested_blocks_and_records() {
        let mut w = BitWriter::new();
        w.write_magic();
        w.enter_block(8, 3);
        w.record(1, &[2]);
        w.enter_block(17, 4);
        w.record(7, &[32]);
        w.end_block();
        w.end_block();
        let bytes = w.into_bytes();

        let entries = parse_bitstream(&bytes).unwrap();
        let module = only_block(&entries);
        assert_eq!(module.id, 8);
        assert_eq!(module.bit_offset, 32);
        assert_eq!(module.content.len(), 2);
        match &module.content[0] {
            Entry::Record(r) => {
                assert_eq!(r.code, 1);
                assert_eq!(r.op(0).unwrap(), 2);
                assert!(!r.abbreviated);
            }
            other => panic!("expected record, got {:?}", other),
        }
        match &module.content[1] {
            Entry::Block(b) => {
                assert_eq!(b.id, 17);
                assert_eq!(b.content.len(), 1);
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn blockinfo_abbrev_matches_inline_abbrev() {
        let abbrev = name_abbrev();

        let mut shared = BitWriter::new();
        shared.write_magic();
        shared.enter_block(BLOCKINFO_BLOCK_ID, 2);
        shared.record(BLOCKINFO_CODE_SETBID, &[14]);
        shared.define_abbrev(&abbrev);
        shared.string_record(BLOCKINFO_CODE_BLOCKNAME, &[], "VST");
        shared.end_block();
        shared.enter_block(14, 4);
        shared.abbrev_record(4, &abbrev, &name_fields());
        shared.end_block();
        let shared = parse_bitstream(&shared.into_bytes()).unwrap();

        let mut inline = BitWriter::new();
        inline.write_magic();
        inline.enter_block(14, 4);
        inline.define_abbrev(&abbrev);
        inline.abbrev_record(4, &abbrev, &name_fields());
        inline.end_block();
        let inline = parse_bitstream(&inline.into_bytes()).unwrap();

        let shared = only_block(&shared);
        let inline = only_block(&inline);
        assert_eq!(shared.content, inline.content);
        assert_eq!(shared.abbrevs, inline.abbrevs);
        assert_eq!(
            shared.meta.as_ref().and_then(|m| m.name.clone()).as_deref(),
            Some("VST")
        );
        match &shared.content[0] {
            Entry::Record(r) => {
                assert_eq!(r.code, 5);
                assert_eq!(r.op(0).unwrap(), 6);
                assert_eq!(r.text(1), "main");
                assert!(r.abbreviated);
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn inline_abbrev_does_not_leak_to_siblings() {
        let abbrev = name_abbrev();
        let mut w = BitWriter::new();
        w.write_magic();
        w.enter_block(8, 3);
        w.enter_block(14, 4);
        w.define_abbrev(&abbrev);
        w.end_block();
        w.enter_block(14, 4);
        w.abbrev_record(4, &abbrev, &name_fields());
        w.end_block();
        w.end_block();
        let err = parse_bitstream(&w.into_bytes()).unwrap_err();
        assert_eq!(
            root_translate_error(&err).map(|e| e.kind()),
            Some(ErrorKind::Format)
        );
    }

    #[test]
    fn bad_magic_is_rejected_before_blocks() {
        let err = parse_bitstream(&[0x42, 0x43, 0x00, 0x00, 0x21, 0, 0, 0]).unwrap_err();
        let root = root_translate_error(&err).expect("typed error");
        assert_eq!(root.kind(), ErrorKind::Format);
        assert!(matches!(root, TranslateError::Format { bit_offset: 0, .. }));
    }

    #[test]
    fn unterminated_block_is_an_error() {
        let mut w = BitWriter::new();
        w.write_magic();
        w.enter_block(8, 3);
        let err = parse_bitstream(&w.into_bytes()).unwrap_err();
        assert_eq!(
            root_translate_error(&err).map(|e| e.kind()),
            Some(ErrorKind::Format)
        );
    }
}
