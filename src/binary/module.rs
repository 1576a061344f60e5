//! Section walk and eager module assembly.

use num_enum::TryFromPrimitive;

use crate::binary::lazy::LazySection;
use crate::binary::linking_section::{read_linking_section, read_relocation_section};
use crate::binary::name_section::read_name_section;
use crate::binary::read::*;
use crate::binary::*;
use crate::errors::Errors;
use crate::features::Features;
use crate::span::{At, Location, SpanU8};
use crate::types::{ExternalKind, ReferenceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum SectionId {
    Custom = 0,
    Type = 1,
    Import = 2,
    Function = 3,
    Table = 4,
    Memory = 5,
    Global = 6,
    Export = 7,
    Start = 8,
    Element = 9,
    Code = 10,
    Data = 11,
    DataCount = 12,
    Tag = 13,
}

impl SectionId {
    /// Position in the required section order. Ids were assigned as
    /// proposals landed, so the rank differs from the raw id.
    fn order(self) -> u8 {
        match self {
            SectionId::Custom => 0,
            SectionId::Type => 1,
            SectionId::Import => 2,
            SectionId::Function => 3,
            SectionId::Table => 4,
            SectionId::Memory => 5,
            SectionId::Tag => 6,
            SectionId::Global => 7,
            SectionId::Export => 8,
            SectionId::Start => 9,
            SectionId::Element => 10,
            SectionId::DataCount => 11,
            SectionId::Code => 12,
            SectionId::Data => 13,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SectionId::Custom => "custom",
            SectionId::Type => "type",
            SectionId::Import => "import",
            SectionId::Function => "function",
            SectionId::Table => "table",
            SectionId::Memory => "memory",
            SectionId::Global => "global",
            SectionId::Export => "export",
            SectionId::Start => "start",
            SectionId::Element => "element",
            SectionId::Code => "code",
            SectionId::Data => "data",
            SectionId::DataCount => "data count",
            SectionId::Tag => "tag",
        }
    }
}

const MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6D];
const VERSION: u32 = 1;

/// Decode a whole module. Best-effort: most errors drop the offending
/// element or section and decoding resumes at the next boundary. Bad
/// magic or version discards the module.
pub fn read_module(
    data: &[u8],
    features: Features,
    errors: &mut dyn Errors,
) -> Option<Module> {
    let mut ctx = ReadCtx::new(features, errors);
    let mut span = SpanU8::new(data);

    let magic = read_bytes(&mut span, 4, &mut ctx)?;
    if magic.value != &MAGIC[..] {
        ctx.error(magic.loc, format!("bad magic value: {:02x?}", magic.value));
        return None;
    }
    let version = read_bytes(&mut span, 4, &mut ctx)?;
    let version_value = u32::from_le_bytes([
        version.value[0],
        version.value[1],
        version.value[2],
        version.value[3],
    ]);
    if version_value != VERSION {
        ctx.error(version.loc, format!("unknown version {}", version_value));
        return None;
    }

    let mut module = Module::default();
    let mut last_order: u8 = 0;
    while !span.is_empty() {
        let Some(id_byte) = read_u8(&mut span, &mut ctx) else {
            break;
        };
        let Some(size) = read_u32(&mut span, &mut ctx) else {
            // Truncated section header: no known boundary to resume at.
            break;
        };
        let Some(payload) = span.take(size.value as usize) else {
            ctx.error(
                size.loc,
                format!(
                    "Section size {} extends past the end of the module",
                    size.value
                ),
            );
            break;
        };
        let id = match SectionId::try_from(id_byte.value) {
            Ok(SectionId::Tag) if !features.contains(Features::EXCEPTIONS) => {
                ctx.error(id_byte.loc, format!("unknown section id: {}", id_byte.value));
                continue;
            }
            Ok(id) => id,
            Err(_) => {
                ctx.error(id_byte.loc, format!("unknown section id: {}", id_byte.value));
                continue;
            }
        };
        if id != SectionId::Custom {
            if id.order() <= last_order {
                ctx.error(
                    id_byte.loc,
                    format!("section out of order: {}", id.name()),
                );
                continue;
            }
            last_order = id.order();
        }
        read_known_section(id, payload, &mut module, &mut ctx);
    }

    end_module(span.loc(), &mut ctx);
    Some(module)
}

fn read_known_section(
    id: SectionId,
    payload: SpanU8,
    module: &mut Module,
    ctx: &mut ReadCtx,
) {
    let loc = payload.loc();
    let desc = format!("{} section", id.name());
    let _ = ctx.in_context(loc, &desc, |ctx| -> Option<()> {
        match id {
            SectionId::Custom => {
                read_custom_section(payload, module, ctx);
            }
            SectionId::Type => {
                read_lazy(payload, ctx, read_defined_type, &mut module.types)
            }
            SectionId::Import => read_lazy(payload, ctx, read_import, &mut module.imports),
            SectionId::Function => {
                read_lazy(payload, ctx, read_function, &mut module.functions);
                ctx.defined_function_count = module.functions.len() as u32;
            }
            SectionId::Table => read_lazy(payload, ctx, read_table, &mut module.tables),
            SectionId::Memory => read_lazy(payload, ctx, read_memory, &mut module.memories),
            SectionId::Global => read_lazy(payload, ctx, read_global, &mut module.globals),
            SectionId::Tag => read_lazy(payload, ctx, read_tag, &mut module.tags),
            SectionId::Export => read_lazy(payload, ctx, read_export, &mut module.exports),
            SectionId::Start => {
                let mut span = payload;
                if let Some(index) = read_index(&mut span, ctx) {
                    module.start = Some(At::new(index.loc, Start { func_index: index }));
                }
            }
            SectionId::Element => {
                read_lazy(payload, ctx, read_element_segment, &mut module.element_segments)
            }
            SectionId::DataCount => {
                if !ctx.features.contains(Features::BULK_MEMORY) {
                    ctx.error(loc, "unknown section id: 12".to_string());
                    return Some(());
                }
                let mut span = payload;
                if let Some(count) = read_u32(&mut span, ctx) {
                    module.data_count = Some(count);
                    ctx.declared_data_count = Some(count.value);
                }
            }
            SectionId::Code => {
                read_lazy(payload, ctx, read_code, &mut module.codes);
                ctx.code_count = module.codes.len() as u32;
            }
            SectionId::Data => {
                read_lazy(payload, ctx, read_data_segment, &mut module.data_segments);
                ctx.data_count = module.data_segments.len() as u32;
            }
        }
        Some(())
    });
}

fn read_lazy<'a, T>(
    payload: SpanU8<'a>,
    ctx: &mut ReadCtx,
    read: fn(&mut SpanU8<'a>, &mut ReadCtx) -> Option<At<T>>,
    out: &mut Vec<At<T>>,
) {
    let Some(mut section) = LazySection::new(payload, ctx, read) else {
        return;
    };
    for item in &mut section {
        out.push(item);
    }
    section.finish();
}

fn read_custom_section(mut span: SpanU8, module: &mut Module, ctx: &mut ReadCtx) {
    let Some(name) = read_string(&mut span, ctx, "custom section name") else {
        return;
    };
    let data = span.as_slice().to_vec();
    let content = match name.value.as_slice() {
        b"name" => match read_name_section(span, ctx) {
            Some(names) => CustomContent::Name(names),
            None => CustomContent::Unknown,
        },
        b"linking" => match read_linking_section(span, ctx) {
            Some(linking) => CustomContent::Linking(linking),
            None => CustomContent::Unknown,
        },
        n if n.starts_with(b"reloc.") => match read_relocation_section(span, ctx) {
            Some(reloc) => CustomContent::Reloc(reloc),
            None => CustomContent::Unknown,
        },
        _ => CustomContent::Unknown,
    };
    module
        .customs
        .push(At::new(name.loc, CustomSection { name, data, content }));
}

// Per-element readers for the lazy sections.

fn read_function(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<Function>> {
    let index = read_index(span, ctx)?;
    Some(At::new(index.loc, Function { type_index: index }))
}

fn read_table(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<Table>> {
    let ty = read_table_type(span, ctx)?;
    Some(At::new(ty.loc, Table { ty }))
}

fn read_memory(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<Memory>> {
    let ty = read_memory_type(span, ctx)?;
    Some(At::new(ty.loc, Memory { ty }))
}

fn read_global(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<Global>> {
    let start = span.pos();
    let ty = read_global_type(span, ctx)?;
    let init = read_constant_expression(span, ctx)?;
    Some(At::new(Location::new(start, span.pos()), Global { ty, init }))
}

fn read_tag(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<Tag>> {
    let ty = read_tag_type(span, ctx)?;
    Some(At::new(ty.loc, Tag { ty }))
}

fn read_import(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<Import>> {
    let start = span.pos();
    let module = read_string(span, ctx, "import module name")?;
    let name = read_string(span, ctx, "import field name")?;
    let kind = read_u8(span, ctx)?;
    let desc = match ExternalKind::try_from(kind.value) {
        Ok(ExternalKind::Function) => ImportDesc::Function(read_index(span, ctx)?),
        Ok(ExternalKind::Table) => ImportDesc::Table(read_table_type(span, ctx)?),
        Ok(ExternalKind::Memory) => ImportDesc::Memory(read_memory_type(span, ctx)?),
        Ok(ExternalKind::Global) => ImportDesc::Global(read_global_type(span, ctx)?),
        Ok(ExternalKind::Tag) if ctx.features.contains(Features::EXCEPTIONS) => {
            ImportDesc::Tag(read_tag_type(span, ctx)?)
        }
        _ => {
            ctx.error(kind.loc, format!("unknown external kind: {:#04x}", kind.value));
            return None;
        }
    };
    Some(At::new(
        Location::new(start, span.pos()),
        Import { module, name, desc },
    ))
}

fn read_export(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<Export>> {
    let start = span.pos();
    let name = read_string(span, ctx, "export name")?;
    let kind_byte = read_u8(span, ctx)?;
    let kind = match ExternalKind::try_from(kind_byte.value) {
        Ok(ExternalKind::Tag) if !ctx.features.contains(Features::EXCEPTIONS) => {
            ctx.error(
                kind_byte.loc,
                format!("unknown external kind: {:#04x}", kind_byte.value),
            );
            return None;
        }
        Ok(kind) => At::new(kind_byte.loc, kind),
        Err(_) => {
            ctx.error(
                kind_byte.loc,
                format!("unknown external kind: {:#04x}", kind_byte.value),
            );
            return None;
        }
    };
    let index = read_index(span, ctx)?;
    Some(At::new(
        Location::new(start, span.pos()),
        Export { kind, name, index },
    ))
}

fn read_element_kind(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<ReferenceType>> {
    let byte = read_u8(span, ctx)?;
    if byte.value != 0x00 {
        ctx.error(byte.loc, format!("unknown element kind: {:#04x}", byte.value));
        return None;
    }
    Some(At::new(byte.loc, ReferenceType::Funcref))
}

fn read_element_segment(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<ElementSegment>> {
    let start = span.pos();
    let flags = read_u32(span, ctx)?;
    if flags.value > 7 {
        ctx.error(
            flags.loc,
            format!("unknown element segment flags: {:#04x}", flags.value),
        );
        return None;
    }
    let features = ctx.features;
    if flags.value & 0b011 != 0 && !features.contains(Features::BULK_MEMORY) {
        ctx.error(
            flags.loc,
            format!("unknown element segment flags: {:#04x}", flags.value),
        );
        return None;
    }
    if matches!(flags.value, 3 | 7) && !features.contains(Features::REFERENCE_TYPES) {
        ctx.error(
            flags.loc,
            format!("unknown element segment flags: {:#04x}", flags.value),
        );
        return None;
    }

    let has_table_index = flags.value & 0b010 != 0 && flags.value & 0b001 == 0;
    let is_passive = flags.value & 0b001 != 0 && flags.value & 0b010 == 0;
    let is_declared = flags.value & 0b011 == 0b011;
    let uses_expressions = flags.value & 0b100 != 0;

    let mode = if is_passive {
        SegmentMode::Passive
    } else if is_declared {
        SegmentMode::Declared
    } else {
        let table_index = if has_table_index {
            read_index(span, ctx)?
        } else {
            At::new(flags.loc, 0)
        };
        let offset = read_constant_expression(span, ctx)?;
        SegmentMode::Active { table_index, offset }
    };

    // Flag 0/4 imply funcref with no element-kind byte on the wire.
    let elem_type = match flags.value {
        0 | 4 => At::new(flags.loc, ReferenceType::Funcref),
        1 | 2 | 3 => read_element_kind(span, ctx)?,
        _ => read_reference_type(span, ctx)?,
    };

    let init = if uses_expressions {
        ElementInit::Expressions(read_vec(span, ctx, read_constant_expression)?)
    } else {
        ElementInit::Indices(read_vec(span, ctx, read_index)?)
    };

    Some(At::new(
        Location::new(start, span.pos()),
        ElementSegment { mode, elem_type, init },
    ))
}

fn read_data_segment(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<DataSegment>> {
    let start = span.pos();
    let flags = read_u32(span, ctx)?;
    let mode = match flags.value {
        0 => {
            let offset = read_constant_expression(span, ctx)?;
            DataMode::Active {
                memory_index: At::new(flags.loc, 0),
                offset,
            }
        }
        1 if ctx.features.contains(Features::BULK_MEMORY) => DataMode::Passive,
        2 => {
            let memory_index = read_index(span, ctx)?;
            let offset = read_constant_expression(span, ctx)?;
            DataMode::Active { memory_index, offset }
        }
        _ => {
            ctx.error(
                flags.loc,
                format!("unknown data segment flags: {:#04x}", flags.value),
            );
            return None;
        }
    };
    let len = read_u32(span, ctx)?;
    let init = read_bytes(span, len.value as usize, ctx)?;
    Some(At::new(
        Location::new(start, span.pos()),
        DataSegment { mode, init: init.value.to_vec() },
    ))
}

/// End-of-module consistency. Function/code mismatch is a hard error;
/// declared-data-count mismatch is soft so malformed files still get
/// a best-effort AST.
fn end_module(loc: Location, ctx: &mut ReadCtx) {
    if ctx.defined_function_count != ctx.code_count {
        ctx.error(
            loc,
            format!(
                "Expected code count of {}, but got {}",
                ctx.defined_function_count, ctx.code_count
            ),
        );
    }
    if let Some(declared) = ctx.declared_data_count {
        if declared != ctx.data_count {
            ctx.error(
                loc,
                format!(
                    "Expected data count of {}, but got {}",
                    declared, ctx.data_count
                ),
            );
        }
    }
}
