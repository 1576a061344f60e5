//! `linking` and `reloc.*` custom sections, the linker metadata
//! carried by object files. Only linking version 2 is accepted.

use num_enum::TryFromPrimitive;

use crate::binary::read::{
    read_index, read_s32, read_string, read_u32, read_u8, read_vec, ReadCtx,
};
use crate::span::{At, Location, SpanU8};
use crate::types::Index;

pub const LINKING_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum LinkingSubsectionId {
    SegmentInfo = 5,
    InitFunctions = 6,
    ComdatInfo = 7,
    SymbolTable = 8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    pub name: At<Vec<u8>>,
    pub align_log2: At<u32>,
    pub flags: At<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitFunction {
    pub priority: At<u32>,
    pub symbol_index: At<Index>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum ComdatSymbolKind {
    Data = 0,
    Function = 1,
    Global = 2,
    Event = 3,
    Table = 4,
    Section = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComdatSymbol {
    pub kind: At<ComdatSymbolKind>,
    pub index: At<Index>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comdat {
    pub name: At<Vec<u8>>,
    pub flags: At<u32>,
    pub symbols: Vec<At<ComdatSymbol>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum SymbolInfoKind {
    Function = 0,
    Data = 1,
    Global = 2,
    Section = 3,
    Tag = 4,
    Table = 5,
}

// WASM_SYM_* flag bits.
pub const SYM_BINDING_WEAK: u32 = 0x01;
pub const SYM_BINDING_LOCAL: u32 = 0x02;
pub const SYM_VISIBILITY_HIDDEN: u32 = 0x04;
pub const SYM_UNDEFINED: u32 = 0x10;
pub const SYM_EXPORTED: u32 = 0x20;
pub const SYM_EXPLICIT_NAME: u32 = 0x40;
pub const SYM_NO_STRIP: u32 = 0x80;

#[derive(Debug, Clone, PartialEq)]
pub struct DefinedData {
    pub segment_index: At<Index>,
    pub offset: At<u32>,
    pub size: At<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolInfo {
    /// Function, global, tag, or table symbols share one layout.
    Item {
        kind: At<SymbolInfoKind>,
        flags: At<u32>,
        index: At<Index>,
        name: Option<At<Vec<u8>>>,
    },
    Data {
        flags: At<u32>,
        name: At<Vec<u8>>,
        defined: Option<DefinedData>,
    },
    Section {
        flags: At<u32>,
        section_index: At<Index>,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinkingSection {
    pub version: Option<At<u32>>,
    pub segment_infos: Vec<At<SegmentInfo>>,
    pub init_functions: Vec<At<InitFunction>>,
    pub comdats: Vec<At<Comdat>>,
    pub symbols: Vec<At<SymbolInfo>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum RelocationType {
    FunctionIndexLeb = 0,
    TableIndexSleb = 1,
    TableIndexI32 = 2,
    MemoryAddressLeb = 3,
    MemoryAddressSleb = 4,
    MemoryAddressI32 = 5,
    TypeIndexLeb = 6,
    GlobalIndexLeb = 7,
    FunctionOffsetI32 = 8,
    SectionOffsetI32 = 9,
    TagIndexLeb = 10,
}

impl RelocationType {
    /// Memory-address and offset relocations carry an addend.
    pub fn has_addend(self) -> bool {
        matches!(
            self,
            RelocationType::MemoryAddressLeb
                | RelocationType::MemoryAddressSleb
                | RelocationType::MemoryAddressI32
                | RelocationType::FunctionOffsetI32
                | RelocationType::SectionOffsetI32
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationEntry {
    pub ty: At<RelocationType>,
    pub offset: At<u32>,
    pub index: At<Index>,
    pub addend: Option<At<i32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelocationSection {
    pub section_index: At<Index>,
    pub entries: Vec<At<RelocationEntry>>,
}

fn read_segment_info(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<SegmentInfo>> {
    let start = span.pos();
    let name = read_string(span, ctx, "segment name")?;
    let align_log2 = read_u32(span, ctx)?;
    let flags = read_u32(span, ctx)?;
    Some(At::new(
        Location::new(start, span.pos()),
        SegmentInfo { name, align_log2, flags },
    ))
}

fn read_init_function(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<InitFunction>> {
    let start = span.pos();
    let priority = read_u32(span, ctx)?;
    let symbol_index = read_index(span, ctx)?;
    Some(At::new(
        Location::new(start, span.pos()),
        InitFunction { priority, symbol_index },
    ))
}

fn read_comdat_symbol(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<ComdatSymbol>> {
    let start = span.pos();
    let kind_byte = read_u8(span, ctx)?;
    let kind = match ComdatSymbolKind::try_from(kind_byte.value) {
        Ok(kind) => At::new(kind_byte.loc, kind),
        Err(_) => {
            ctx.error(
                kind_byte.loc,
                format!("unknown comdat symbol kind: {:#04x}", kind_byte.value),
            );
            return None;
        }
    };
    let index = read_index(span, ctx)?;
    Some(At::new(
        Location::new(start, span.pos()),
        ComdatSymbol { kind, index },
    ))
}

fn read_comdat(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<Comdat>> {
    let start = span.pos();
    let name = read_string(span, ctx, "comdat name")?;
    let flags = read_u32(span, ctx)?;
    let symbols = read_vec(span, ctx, read_comdat_symbol)?;
    Some(At::new(
        Location::new(start, span.pos()),
        Comdat { name, flags, symbols },
    ))
}

fn read_symbol_info(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<SymbolInfo>> {
    let start = span.pos();
    let kind_byte = read_u8(span, ctx)?;
    let Ok(kind) = SymbolInfoKind::try_from(kind_byte.value) else {
        ctx.error(
            kind_byte.loc,
            format!("unknown symbol kind: {:#04x}", kind_byte.value),
        );
        return None;
    };
    let flags = read_u32(span, ctx)?;
    let info = match kind {
        SymbolInfoKind::Function
        | SymbolInfoKind::Global
        | SymbolInfoKind::Tag
        | SymbolInfoKind::Table => {
            let index = read_index(span, ctx)?;
            // Imported symbols reuse the import name unless an
            // explicit one is present.
            let has_name =
                flags.value & SYM_UNDEFINED == 0 || flags.value & SYM_EXPLICIT_NAME != 0;
            let name = if has_name {
                Some(read_string(span, ctx, "symbol name")?)
            } else {
                None
            };
            SymbolInfo::Item {
                kind: At::new(kind_byte.loc, kind),
                flags,
                index,
                name,
            }
        }
        SymbolInfoKind::Data => {
            let name = read_string(span, ctx, "symbol name")?;
            let defined = if flags.value & SYM_UNDEFINED == 0 {
                let segment_index = read_index(span, ctx)?;
                let offset = read_u32(span, ctx)?;
                let size = read_u32(span, ctx)?;
                Some(DefinedData { segment_index, offset, size })
            } else {
                None
            };
            SymbolInfo::Data { flags, name, defined }
        }
        SymbolInfoKind::Section => {
            let section_index = read_index(span, ctx)?;
            SymbolInfo::Section { flags, section_index }
        }
    };
    Some(At::new(Location::new(start, span.pos()), info))
}

pub fn read_linking_section(mut span: SpanU8, ctx: &mut ReadCtx) -> Option<LinkingSection> {
    let mut section = LinkingSection::default();
    ctx.in_context(span.loc(), "linking section", |ctx| {
        let version = read_u32(&mut span, ctx)?;
        if version.value != LINKING_VERSION {
            ctx.error(
                version.loc,
                format!(
                    "Expected linking section version: {}, got {}",
                    LINKING_VERSION, version.value
                ),
            );
            return None;
        }
        section.version = Some(version);
        while !span.is_empty() {
            let id = read_u8(&mut span, ctx)?;
            let size = read_u32(&mut span, ctx)?;
            let Some(mut payload) = span.take(size.value as usize) else {
                ctx.error(
                    size.loc,
                    format!("Subsection size {} extends past the end", size.value),
                );
                return None;
            };
            match LinkingSubsectionId::try_from(id.value) {
                Ok(LinkingSubsectionId::SegmentInfo) => {
                    if let Some(infos) = read_vec(&mut payload, ctx, read_segment_info) {
                        section.segment_infos = infos;
                    }
                }
                Ok(LinkingSubsectionId::InitFunctions) => {
                    if let Some(funcs) = read_vec(&mut payload, ctx, read_init_function) {
                        section.init_functions = funcs;
                    }
                }
                Ok(LinkingSubsectionId::ComdatInfo) => {
                    if let Some(comdats) = read_vec(&mut payload, ctx, read_comdat) {
                        section.comdats = comdats;
                    }
                }
                Ok(LinkingSubsectionId::SymbolTable) => {
                    if let Some(symbols) = read_vec(&mut payload, ctx, read_symbol_info) {
                        section.symbols = symbols;
                    }
                }
                Err(_) => {
                    ctx.error(
                        id.loc,
                        format!("unknown linking subsection id: {}", id.value),
                    );
                }
            }
        }
        Some(())
    })?;
    Some(section)
}

fn read_relocation_entry(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<RelocationEntry>> {
    let start = span.pos();
    let ty_byte = read_u8(span, ctx)?;
    let Ok(ty) = RelocationType::try_from(ty_byte.value) else {
        ctx.error(
            ty_byte.loc,
            format!("unknown relocation type: {:#04x}", ty_byte.value),
        );
        return None;
    };
    let offset = read_u32(span, ctx)?;
    let index = read_index(span, ctx)?;
    let addend = if ty.has_addend() {
        Some(read_s32(span, ctx)?)
    } else {
        None
    };
    Some(At::new(
        Location::new(start, span.pos()),
        RelocationEntry { ty: At::new(ty_byte.loc, ty), offset, index, addend },
    ))
}

pub fn read_relocation_section(
    mut span: SpanU8,
    ctx: &mut ReadCtx,
) -> Option<RelocationSection> {
    ctx.in_context(span.loc(), "relocation section", |ctx| {
        let section_index = read_index(&mut span, ctx)?;
        let entries = read_vec(&mut span, ctx, read_relocation_entry)?;
        Some(RelocationSection { section_index, entries })
    })
}
