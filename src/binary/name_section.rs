//! `name` custom section: module, function, and local names.

use crate::binary::read::{read_index, read_string, read_u32, read_u8, read_vec, ReadCtx};
use crate::binary::NameSubsectionId;
use crate::span::{At, Location, SpanU8};
use crate::types::Index;

#[derive(Debug, Clone, PartialEq)]
pub struct NameAssoc {
    pub index: At<Index>,
    pub name: At<Vec<u8>>,
}

/// Names for the items owned by one outer item, e.g. the locals of
/// one function.
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectNameAssoc {
    pub index: At<Index>,
    pub names: Vec<At<NameAssoc>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NameSection {
    pub module_name: Option<At<Vec<u8>>>,
    pub function_names: Vec<At<NameAssoc>>,
    pub local_names: Vec<At<IndirectNameAssoc>>,
}

fn read_name_assoc(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<NameAssoc>> {
    let start = span.pos();
    let index = read_index(span, ctx)?;
    let name = read_string(span, ctx, "name")?;
    Some(At::new(Location::new(start, span.pos()), NameAssoc { index, name }))
}

fn read_indirect_name_assoc(
    span: &mut SpanU8,
    ctx: &mut ReadCtx,
) -> Option<At<IndirectNameAssoc>> {
    let start = span.pos();
    let index = read_index(span, ctx)?;
    let names = read_vec(span, ctx, read_name_assoc)?;
    Some(At::new(
        Location::new(start, span.pos()),
        IndirectNameAssoc { index, names },
    ))
}

/// Subsections may appear at most once each; unknown ids are skipped
/// with an error so later subsections still decode.
pub fn read_name_section(mut span: SpanU8, ctx: &mut ReadCtx) -> Option<NameSection> {
    let mut section = NameSection::default();
    ctx.in_context(span.loc(), "name section", |ctx| {
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
            match NameSubsectionId::try_from(id.value) {
                Ok(NameSubsectionId::Module) => {
                    section.module_name = read_string(&mut payload, ctx, "module name");
                }
                Ok(NameSubsectionId::Function) => {
                    if let Some(names) = read_vec(&mut payload, ctx, read_name_assoc) {
                        section.function_names = names;
                    }
                }
                Ok(NameSubsectionId::Local) => {
                    if let Some(names) = read_vec(&mut payload, ctx, read_indirect_name_assoc) {
                        section.local_names = names;
                    }
                }
                Err(_) => {
                    ctx.error(
                        id.loc,
                        format!("unknown name subsection id: {}", id.value),
                    );
                }
            }
        }
        Some(())
    })?;
    Some(section)
}
