//! Expand surface abbreviations into primitive items before index
//! assignment, so the numbering scheme is deterministic: inline
//! imports become `Import` items, inline exports become `Export`
//! items referring to the index the definition will receive, and
//! inline elem/data become separate segments.

use crate::errors::Errors;
use crate::span::{At, Location};
use crate::text::types::*;
use crate::types::{ExternalKind, Index, IndexType, Limits, Opcode};

const PAGE_SIZE: u64 = 65536;

#[derive(Default)]
struct Counts {
    functions: Index,
    tables: Index,
    memories: Index,
    globals: Index,
    tags: Index,
    defined: [bool; 5],
}

impl Counts {
    fn bump(&mut self, kind: ExternalKind) -> Index {
        let counter = match kind {
            ExternalKind::Function => &mut self.functions,
            ExternalKind::Table => &mut self.tables,
            ExternalKind::Memory => &mut self.memories,
            ExternalKind::Global => &mut self.globals,
            ExternalKind::Tag => &mut self.tags,
        };
        let index = *counter;
        *counter += 1;
        index
    }
}

pub fn desugar_module(module: &mut TextModule, errors: &mut dyn Errors) {
    let mut counts = Counts::default();
    let items = std::mem::take(&mut module.items);
    let mut out: Vec<At<ModuleItem>> = Vec::with_capacity(items.len());

    for item in items {
        let loc = item.loc;
        match item.value {
            ModuleItem::Function(func) => desugar_function(loc, func, &mut counts, &mut out, errors),
            ModuleItem::Table(table) => desugar_table(loc, table, &mut counts, &mut out, errors),
            ModuleItem::Memory(memory) => desugar_memory(loc, memory, &mut counts, &mut out, errors),
            ModuleItem::Global(global) => desugar_global(loc, global, &mut counts, &mut out, errors),
            ModuleItem::Tag(tag) => desugar_tag(loc, tag, &mut counts, &mut out, errors),
            ModuleItem::Import(import) => {
                check_import_position(loc, import.desc.kind(), &counts, errors);
                counts.bump(import.desc.kind());
                out.push(At::new(loc, ModuleItem::Import(import)));
            }
            other => out.push(At::new(loc, other)),
        }
    }

    module.items = out;
}

fn check_import_position(
    loc: Location,
    kind: ExternalKind,
    counts: &Counts,
    errors: &mut dyn Errors,
) {
    if counts.defined[kind as usize] {
        errors.on_error(loc, "imports must occur before all definitions".to_string());
    }
}

fn push_exports(
    loc: Location,
    exports: Vec<At<InlineExport>>,
    kind: ExternalKind,
    index: Index,
    out: &mut Vec<At<ModuleItem>>,
) {
    for export in exports {
        out.push(At::new(
            loc,
            ModuleItem::Export(Export {
                name: export.value.name,
                kind: At::new(export.loc, kind),
                var: At::new(export.loc, Var::Index(index)),
            }),
        ));
    }
}

fn desugar_function(
    loc: Location,
    func: Function,
    counts: &mut Counts,
    out: &mut Vec<At<ModuleItem>>,
    errors: &mut dyn Errors,
) {
    let index = counts.bump(ExternalKind::Function);
    if let Some(import) = &func.import {
        check_import_position(loc, ExternalKind::Function, counts, errors);
        out.push(At::new(
            loc,
            ModuleItem::Import(Import {
                module: import.value.module.clone(),
                name: import.value.name.clone(),
                desc: ImportDesc::Function {
                    name: func.name,
                    type_use: func.type_use,
                },
            }),
        ));
    } else {
        counts.defined[ExternalKind::Function as usize] = true;
        out.push(At::new(
            loc,
            ModuleItem::Function(Function {
                exports: Vec::new(),
                import: None,
                ..func.clone()
            }),
        ));
    }
    push_exports(loc, func.exports.clone(), ExternalKind::Function, index, out);
}

fn i32_const_zero(loc: Location) -> At<ConstantExpression> {
    At::new(
        loc,
        vec![At::new(
            loc,
            Instruction {
                opcode: At::new(loc, Opcode::I32Const),
                immediate: Immediate::S32(At::new(loc, 0)),
            },
        )],
    )
}

fn desugar_table(
    loc: Location,
    table: Table,
    counts: &mut Counts,
    out: &mut Vec<At<ModuleItem>>,
    errors: &mut dyn Errors,
) {
    let index = counts.bump(ExternalKind::Table);
    let exports = table.exports.clone();
    match table.body {
        TableBody::Type(ty) => {
            if let Some(import) = &table.import {
                check_import_position(loc, ExternalKind::Table, counts, errors);
                out.push(At::new(
                    loc,
                    ModuleItem::Import(Import {
                        module: import.value.module.clone(),
                        name: import.value.name.clone(),
                        desc: ImportDesc::Table { name: table.name, ty },
                    }),
                ));
            } else {
                counts.defined[ExternalKind::Table as usize] = true;
                out.push(At::new(
                    loc,
                    ModuleItem::Table(Table {
                        name: table.name,
                        exports: Vec::new(),
                        import: None,
                        body: TableBody::Type(ty),
                    }),
                ));
            }
        }
        TableBody::Inline { elem_type, init } => {
            if table.import.is_some() {
                errors.on_error(loc, "imported tables cannot have inline elements".to_string());
            }
            let count = match &init {
                ElementInit::Vars(vars) => vars.len() as u64,
                ElementInit::Expressions(exprs) => exprs.len() as u64,
            };
            counts.defined[ExternalKind::Table as usize] = true;
            let limits = Limits {
                min: count,
                max: Some(count),
                shared: false,
                index_type: IndexType::I32,
            };
            out.push(At::new(
                loc,
                ModuleItem::Table(Table {
                    name: table.name,
                    exports: Vec::new(),
                    import: None,
                    body: TableBody::Type(At::new(
                        loc,
                        TableType {
                            limits: At::new(loc, limits),
                            elem_type: elem_type.clone(),
                        },
                    )),
                }),
            ));
            out.push(At::new(
                loc,
                ModuleItem::Element(ElementSegment {
                    name: None,
                    mode: SegmentMode::Active {
                        table: Some(At::new(loc, Var::Index(index))),
                        offset: i32_const_zero(loc),
                    },
                    elem_type,
                    init,
                }),
            ));
        }
    }
    push_exports(loc, exports, ExternalKind::Table, index, out);
}

fn desugar_memory(
    loc: Location,
    memory: Memory,
    counts: &mut Counts,
    out: &mut Vec<At<ModuleItem>>,
    errors: &mut dyn Errors,
) {
    let index = counts.bump(ExternalKind::Memory);
    let exports = memory.exports.clone();
    match memory.body {
        MemoryBody::Type(ty) => {
            if let Some(import) = &memory.import {
                check_import_position(loc, ExternalKind::Memory, counts, errors);
                out.push(At::new(
                    loc,
                    ModuleItem::Import(Import {
                        module: import.value.module.clone(),
                        name: import.value.name.clone(),
                        desc: ImportDesc::Memory { name: memory.name, ty },
                    }),
                ));
            } else {
                counts.defined[ExternalKind::Memory as usize] = true;
                out.push(At::new(
                    loc,
                    ModuleItem::Memory(Memory {
                        name: memory.name,
                        exports: Vec::new(),
                        import: None,
                        body: MemoryBody::Type(ty),
                    }),
                ));
            }
        }
        MemoryBody::Inline { data } => {
            if memory.import.is_some() {
                errors.on_error(loc, "imported memories cannot have inline data".to_string());
            }
            counts.defined[ExternalKind::Memory as usize] = true;
            let pages = (data.len() as u64).div_ceil(PAGE_SIZE);
            let limits = Limits {
                min: pages,
                max: Some(pages),
                shared: false,
                index_type: IndexType::I32,
            };
            out.push(At::new(
                loc,
                ModuleItem::Memory(Memory {
                    name: memory.name,
                    exports: Vec::new(),
                    import: None,
                    body: MemoryBody::Type(At::new(loc, limits)),
                }),
            ));
            out.push(At::new(
                loc,
                ModuleItem::Data(DataSegment {
                    name: None,
                    mode: DataMode::Active {
                        memory: Some(At::new(loc, Var::Index(index))),
                        offset: i32_const_zero(loc),
                    },
                    init: data,
                }),
            ));
        }
    }
    push_exports(loc, exports, ExternalKind::Memory, index, out);
}

fn desugar_global(
    loc: Location,
    global: Global,
    counts: &mut Counts,
    out: &mut Vec<At<ModuleItem>>,
    errors: &mut dyn Errors,
) {
    let index = counts.bump(ExternalKind::Global);
    let exports = global.exports.clone();
    if let Some(import) = &global.import {
        check_import_position(loc, ExternalKind::Global, counts, errors);
        out.push(At::new(
            loc,
            ModuleItem::Import(Import {
                module: import.value.module.clone(),
                name: import.value.name.clone(),
                desc: ImportDesc::Global { name: global.name, ty: global.ty },
            }),
        ));
    } else {
        counts.defined[ExternalKind::Global as usize] = true;
        out.push(At::new(
            loc,
            ModuleItem::Global(Global {
                exports: Vec::new(),
                import: None,
                ..global
            }),
        ));
    }
    push_exports(loc, exports, ExternalKind::Global, index, out);
}

fn desugar_tag(
    loc: Location,
    tag: Tag,
    counts: &mut Counts,
    out: &mut Vec<At<ModuleItem>>,
    errors: &mut dyn Errors,
) {
    let index = counts.bump(ExternalKind::Tag);
    let exports = tag.exports.clone();
    if let Some(import) = &tag.import {
        check_import_position(loc, ExternalKind::Tag, counts, errors);
        out.push(At::new(
            loc,
            ModuleItem::Import(Import {
                module: import.value.module.clone(),
                name: import.value.name.clone(),
                desc: ImportDesc::Tag { name: tag.name, type_use: tag.type_use },
            }),
        ));
    } else {
        counts.defined[ExternalKind::Tag as usize] = true;
        out.push(At::new(
            loc,
            ModuleItem::Tag(Tag {
                exports: Vec::new(),
                import: None,
                ..tag
            }),
        ));
    }
    push_exports(loc, exports, ExternalKind::Tag, index, out);
}
