//! Binary-format AST and the streaming reader/writer over it.

pub mod lazy;
pub mod leb;
pub mod linking_section;
pub mod module;
pub mod name_section;
pub mod read;
pub mod write;

pub use lazy::{LazySection, LazySequence};
pub use module::{read_module, SectionId};
pub use read::ReadCtx;
pub use write::write_module;

use num_enum::TryFromPrimitive;

use crate::span::At;
use crate::types::{
    DefinedType, ExternalKind, GlobalType, Index, Instruction, LocalsRun, MemoryType,
    ReferenceType, TableType, TagType,
};

use self::linking_section::{LinkingSection, RelocationSection};
use self::name_section::NameSection;

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: At<Vec<u8>>,
    pub name: At<Vec<u8>>,
    pub desc: ImportDesc,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportDesc {
    Function(At<Index>),
    Table(At<TableType>),
    Memory(At<MemoryType>),
    Global(At<GlobalType>),
    Tag(At<TagType>),
}

impl ImportDesc {
    pub fn kind(&self) -> ExternalKind {
        match self {
            ImportDesc::Function(_) => ExternalKind::Function,
            ImportDesc::Table(_) => ExternalKind::Table,
            ImportDesc::Memory(_) => ExternalKind::Memory,
            ImportDesc::Global(_) => ExternalKind::Global,
            ImportDesc::Tag(_) => ExternalKind::Tag,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Function {
    pub type_index: At<Index>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table {
    pub ty: At<TableType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Memory {
    pub ty: At<MemoryType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub ty: At<GlobalType>,
    pub init: At<ConstantExpression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub ty: At<TagType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub kind: At<ExternalKind>,
    pub name: At<Vec<u8>>,
    pub index: At<Index>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Start {
    pub func_index: At<Index>,
}

/// Instruction run terminated by `end` at depth zero. The terminator
/// is kept as the last instruction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expression {
    pub instructions: Vec<At<Instruction>>,
}

/// Same shape as [`Expression`]; the validator restricts the opcodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstantExpression {
    pub instructions: Vec<At<Instruction>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentMode {
    Active {
        table_index: At<Index>,
        offset: At<ConstantExpression>,
    },
    Passive,
    Declared,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementInit {
    Indices(Vec<At<Index>>),
    Expressions(Vec<At<ConstantExpression>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementSegment {
    pub mode: SegmentMode,
    pub elem_type: At<ReferenceType>,
    pub init: ElementInit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataMode {
    Active {
        memory_index: At<Index>,
        offset: At<ConstantExpression>,
    },
    Passive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    pub mode: DataMode,
    pub init: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub locals: Vec<At<LocalsRun>>,
    pub body: At<Expression>,
}

/// Custom section payloads recognized by name.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomContent {
    Unknown,
    Name(NameSection),
    Linking(LinkingSection),
    Reloc(RelocationSection),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomSection {
    pub name: At<Vec<u8>>,
    pub data: Vec<u8>,
    pub content: CustomContent,
}

/// `name` custom section subsection ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum NameSubsectionId {
    Module = 0,
    Function = 1,
    Local = 2,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub types: Vec<At<DefinedType>>,
    pub imports: Vec<At<Import>>,
    pub functions: Vec<At<Function>>,
    pub tables: Vec<At<Table>>,
    pub memories: Vec<At<Memory>>,
    pub globals: Vec<At<Global>>,
    pub tags: Vec<At<Tag>>,
    pub exports: Vec<At<Export>>,
    pub start: Option<At<Start>>,
    pub element_segments: Vec<At<ElementSegment>>,
    pub data_count: Option<At<u32>>,
    pub codes: Vec<At<Code>>,
    pub data_segments: Vec<At<DataSegment>>,
    pub customs: Vec<At<CustomSection>>,
}

impl Module {
    pub fn imported_count(&self, kind: ExternalKind) -> u32 {
        self.imports
            .iter()
            .filter(|i| i.desc.kind() == kind)
            .count() as u32
    }
}
