//! Lower a desugared, resolved text module into the binary AST. All
//! symbolic references must already be numeric; a leftover name is an
//! internal error reported through the sink.

use crate::binary;
use crate::errors::Errors;
use crate::span::{At, Location};
use crate::text::types as text;
use crate::types::*;

/// Convert a resolved bound function type to the unbound shared form.
/// `None` if any type reference is still symbolic.
pub(crate) fn bound_function_type(ft: &text::BoundFunctionType) -> Option<FunctionType> {
    let mut params = Vec::with_capacity(ft.params.len());
    for param in &ft.params {
        params.push(At::new(param.loc, value_type(&param.value.ty.value)?));
    }
    let mut results = Vec::with_capacity(ft.results.len());
    for result in &ft.results {
        results.push(At::new(result.loc, value_type(&result.value)?));
    }
    Some(FunctionType { params, results })
}

pub(crate) fn heap_type(heap: &text::HeapType) -> Option<HeapType> {
    Some(match heap {
        text::HeapType::Func => HeapType::Func,
        text::HeapType::Extern => HeapType::Extern,
        text::HeapType::Any => HeapType::Any,
        text::HeapType::Eq => HeapType::Eq,
        text::HeapType::I31 => HeapType::I31,
        text::HeapType::Var(var) => HeapType::Index(var.value.index()?),
    })
}

pub(crate) fn reference_type(ty: &text::ReferenceType) -> Option<ReferenceType> {
    Some(match ty {
        text::ReferenceType::Funcref => ReferenceType::Funcref,
        text::ReferenceType::Externref => ReferenceType::Externref,
        text::ReferenceType::Anyref => ReferenceType::Anyref,
        text::ReferenceType::Eqref => ReferenceType::Eqref,
        text::ReferenceType::I31ref => ReferenceType::I31ref,
        text::ReferenceType::Ref(r) => ReferenceType::Ref(RefType {
            heap: heap_type(&r.heap.value)?,
            nullable: r.nullable,
        }),
    })
}

pub(crate) fn value_type(ty: &text::ValueType) -> Option<ValueType> {
    Some(match ty {
        text::ValueType::Numeric(n) => ValueType::Numeric(*n),
        text::ValueType::Reference(r) => ValueType::Reference(reference_type(r)?),
        text::ValueType::Rtt(rtt) => ValueType::Rtt(Rtt {
            depth: rtt.depth.value,
            heap: heap_type(&rtt.heap.value)?,
        }),
    })
}

/// Back-conversion used when deferred function types are appended to
/// the text module as synthesized entries.
pub(crate) fn unconvert_value_type(ty: &ValueType) -> text::ValueType {
    match ty {
        ValueType::Numeric(n) => text::ValueType::Numeric(*n),
        ValueType::Reference(r) => text::ValueType::Reference(unconvert_reference_type(r)),
        ValueType::Rtt(rtt) => text::ValueType::Rtt(text::Rtt {
            depth: At::new(Location::default(), rtt.depth),
            heap: At::new(Location::default(), unconvert_heap_type(&rtt.heap)),
        }),
    }
}

fn unconvert_reference_type(ty: &ReferenceType) -> text::ReferenceType {
    match ty {
        ReferenceType::Funcref => text::ReferenceType::Funcref,
        ReferenceType::Externref => text::ReferenceType::Externref,
        ReferenceType::Anyref => text::ReferenceType::Anyref,
        ReferenceType::Eqref => text::ReferenceType::Eqref,
        ReferenceType::I31ref => text::ReferenceType::I31ref,
        ReferenceType::Ref(r) => text::ReferenceType::Ref(text::RefType {
            heap: At::new(Location::default(), unconvert_heap_type(&r.heap)),
            nullable: r.nullable,
        }),
    }
}

fn unconvert_heap_type(heap: &HeapType) -> text::HeapType {
    match heap {
        HeapType::Func => text::HeapType::Func,
        HeapType::Extern => text::HeapType::Extern,
        HeapType::Any => text::HeapType::Any,
        HeapType::Eq => text::HeapType::Eq,
        HeapType::I31 => text::HeapType::I31,
        HeapType::Index(i) => {
            text::HeapType::Var(At::new(Location::default(), text::Var::Index(*i)))
        }
    }
}

struct Converter<'e> {
    errors: &'e mut dyn Errors,
    ok: bool,
}

impl<'e> Converter<'e> {
    fn error(&mut self, loc: Location, message: impl Into<String>) {
        self.ok = false;
        self.errors.on_error(loc, message.into());
    }

    fn index(&mut self, var: &At<text::Var>) -> At<Index> {
        match var.value.index() {
            Some(index) => At::new(var.loc, index),
            None => {
                self.error(var.loc, format!("unresolved identifier {}", var.value));
                At::new(var.loc, 0)
            }
        }
    }

    fn index_or_zero(&mut self, var: &Option<At<text::Var>>, loc: Location) -> At<Index> {
        match var {
            Some(var) => self.index(var),
            None => At::new(loc, 0),
        }
    }

    fn heap(&mut self, heap: &At<text::HeapType>) -> At<HeapType> {
        match heap_type(&heap.value) {
            Some(converted) => At::new(heap.loc, converted),
            None => {
                self.error(heap.loc, "unresolved type reference");
                At::new(heap.loc, HeapType::Func)
            }
        }
    }

    fn reference(&mut self, ty: &At<text::ReferenceType>) -> At<ReferenceType> {
        match reference_type(&ty.value) {
            Some(converted) => At::new(ty.loc, converted),
            None => {
                self.error(ty.loc, "unresolved type reference");
                At::new(ty.loc, ReferenceType::Funcref)
            }
        }
    }

    fn value(&mut self, ty: &At<text::ValueType>) -> At<ValueType> {
        match value_type(&ty.value) {
            Some(converted) => At::new(ty.loc, converted),
            None => {
                self.error(ty.loc, "unresolved type reference");
                At::new(ty.loc, ValueType::I32)
            }
        }
    }

    fn storage(&mut self, ty: &At<text::StorageType>) -> At<StorageType> {
        match &ty.value {
            text::StorageType::Value(v) => {
                let v = self.value(&At::new(ty.loc, v.clone()));
                At::new(ty.loc, StorageType::Value(v.value))
            }
            text::StorageType::Packed(p) => At::new(ty.loc, StorageType::Packed(*p)),
        }
    }

    fn field(&mut self, field: &At<text::FieldType>) -> At<FieldType> {
        let ty = self.storage(&field.value.ty);
        At::new(
            field.loc,
            FieldType { ty, mutability: field.value.mutability },
        )
    }

    fn defined_type(&mut self, entry: &text::TypeEntry, loc: Location) -> At<DefinedType> {
        match &entry.ty.value {
            text::DefinedType::Func(ft) => {
                let converted = match bound_function_type(&ft.value) {
                    Some(converted) => converted,
                    None => {
                        self.error(ft.loc, "unresolved type reference");
                        FunctionType::default()
                    }
                };
                At::new(loc, DefinedType::Func(At::new(ft.loc, converted)))
            }
            text::DefinedType::Struct(st) => {
                let fields = st
                    .fields
                    .iter()
                    .map(|f| {
                        let field = self.field(&f.value.field);
                        At::new(f.loc, field.value)
                    })
                    .collect();
                At::new(loc, DefinedType::Struct(At::new(st.loc, StructType { fields })))
            }
            text::DefinedType::Array(at) => {
                let field = self.field(&at.field);
                At::new(loc, DefinedType::Array(At::new(at.loc, ArrayType { field })))
            }
        }
    }

    fn table_type(&mut self, ty: &At<text::TableType>) -> At<TableType> {
        let elem_type = self.reference(&ty.value.elem_type);
        At::new(ty.loc, TableType { limits: ty.value.limits, elem_type })
    }

    fn global_type(&mut self, ty: &At<text::GlobalType>) -> At<GlobalType> {
        let valtype = self.value(&ty.value.valtype);
        At::new(ty.loc, GlobalType { valtype, mutability: ty.value.mutability })
    }

    fn type_use_index(&mut self, use_: &text::FunctionTypeUse, loc: Location) -> At<Index> {
        match &use_.type_use {
            Some(var) => self.index(var),
            None => {
                self.error(loc, "missing type use");
                At::new(loc, 0)
            }
        }
    }

    fn block_type(&mut self, use_: &text::FunctionTypeUse, loc: Location) -> At<BlockType> {
        if let Some(var) = &use_.type_use {
            // Either an explicit `(type $t)` or an index synthesized
            // for a signature the short forms cannot express.
            let index = self.index(var);
            return At::new(loc, BlockType::Index(index.value));
        }
        let ty = &use_.ty.value;
        match ty.results.len() {
            0 => At::new(loc, BlockType::Void),
            1 => {
                let result = self.value(&ty.results[0]);
                At::new(loc, BlockType::Value(result.value))
            }
            _ => {
                self.error(loc, "multi-value block without a type use");
                At::new(loc, BlockType::Void)
            }
        }
    }

    fn memarg(
        &mut self,
        memarg: &text::MemArgImmediate,
        op: Opcode,
        loc: Location,
    ) -> MemArgImmediate {
        let natural = op.natural_alignment_log2().unwrap_or(0);
        let align_log2 = memarg.align_log2.unwrap_or(At::new(loc, natural));
        let offset = memarg.offset.unwrap_or(At::new(loc, 0));
        MemArgImmediate { align_log2, offset }
    }

    fn locals_runs(&mut self, locals: &[At<text::BoundValueType>]) -> Vec<At<LocalsRun>> {
        let mut runs: Vec<At<LocalsRun>> = Vec::new();
        for local in locals {
            let ty = self.value(&local.value.ty);
            match runs.last_mut() {
                Some(run) if run.ty.value == ty.value => {
                    run.value.count.value += 1;
                }
                _ => runs.push(At::new(
                    local.loc,
                    LocalsRun { count: At::new(local.loc, 1), ty },
                )),
            }
        }
        runs
    }

    fn instruction(&mut self, instr: &At<text::Instruction>) -> At<Instruction> {
        let loc = instr.loc;
        let op = instr.value.opcode;
        let immediate = match &instr.value.immediate {
            text::Immediate::None => Immediate::None,
            text::Immediate::S32(v) => Immediate::S32(*v),
            text::Immediate::S64(v) => Immediate::S64(*v),
            text::Immediate::F32(v) => Immediate::F32(*v),
            text::Immediate::F64(v) => Immediate::F64(*v),
            text::Immediate::V128(v) => Immediate::V128(*v),
            text::Immediate::Var(var) => Immediate::Index(self.index(var)),
            text::Immediate::Block(block) => {
                Immediate::BlockType(self.block_type(&block.type_use, loc))
            }
            text::Immediate::BrTable(imm) => Immediate::BrTable(BrTableImmediate {
                targets: imm.targets.iter().map(|t| self.index(t)).collect(),
                default_target: self.index(&imm.default_target),
            }),
            text::Immediate::CallIndirect(imm) => {
                Immediate::CallIndirect(CallIndirectImmediate {
                    type_index: self.type_use_index(&imm.type_use, loc),
                    table_index: self.index_or_zero(&imm.table, loc),
                })
            }
            text::Immediate::Copy(imm) => Immediate::Copy(CopyImmediate {
                dst: self.index_or_zero(&imm.dst, loc),
                src: self.index_or_zero(&imm.src, loc),
            }),
            text::Immediate::Init(imm) => Immediate::Init(InitImmediate {
                segment_index: self.index(&imm.segment),
                dst: self.index_or_zero(&imm.dst, loc),
            }),
            text::Immediate::MemArg(memarg) => {
                Immediate::MemArg(self.memarg(memarg, op.value, loc))
            }
            text::Immediate::SelectTypes(types) => Immediate::SelectTypes(
                types.iter().map(|t| self.value(t)).collect(),
            ),
            text::Immediate::SimdLane(lane) => Immediate::SimdLane(*lane),
            text::Immediate::SimdShuffle(lanes) => Immediate::SimdShuffle(*lanes),
            text::Immediate::Let(imm) => Immediate::Let(LetImmediate {
                block_type: self.block_type(&imm.block.type_use, loc),
                locals: self.locals_runs(&imm.locals),
            }),
            text::Immediate::RefType(ty) => Immediate::RefType(self.reference(ty)),
            text::Immediate::HeapType(heap) => Immediate::HeapType(self.heap(heap)),
            text::Immediate::BrOnCast(imm) => Immediate::BrOnCast(BrOnCastImmediate {
                target: self.index(&imm.target),
                types: HeapType2Immediate {
                    parent: self.heap(&imm.types.parent),
                    child: self.heap(&imm.types.child),
                },
            }),
            text::Immediate::HeapType2(imm) => Immediate::HeapType2(HeapType2Immediate {
                parent: self.heap(&imm.parent),
                child: self.heap(&imm.child),
            }),
            text::Immediate::RttSub(imm) => Immediate::RttSub(RttSubImmediate {
                depth: imm.depth,
                types: HeapType2Immediate {
                    parent: self.heap(&imm.types.parent),
                    child: self.heap(&imm.types.child),
                },
            }),
            text::Immediate::StructField(imm) => {
                Immediate::StructField(StructFieldImmediate {
                    struct_index: self.index(&imm.struct_var),
                    field_index: self.index(&imm.field_var),
                })
            }
            text::Immediate::SimdMemoryLane(imm) => {
                Immediate::SimdMemoryLane(SimdMemoryLaneImmediate {
                    memarg: self.memarg(&imm.memarg, op.value, loc),
                    lane: imm.lane,
                })
            }
            text::Immediate::FuncBind(use_) => {
                Immediate::FuncBind(self.type_use_index(use_, loc))
            }
        };
        At::new(loc, Instruction { opcode: op, immediate })
    }

    fn expression(&mut self, instructions: &[At<text::Instruction>], loc: Location) -> At<binary::Expression> {
        let mut converted: Vec<At<Instruction>> =
            instructions.iter().map(|i| self.instruction(i)).collect();
        converted.push(At::new(
            loc,
            Instruction { opcode: At::new(loc, Opcode::End), immediate: Immediate::None },
        ));
        At::new(loc, binary::Expression { instructions: converted })
    }

    fn constant_expression(
        &mut self,
        expr: &At<text::ConstantExpression>,
    ) -> At<binary::ConstantExpression> {
        let mut converted: Vec<At<Instruction>> =
            expr.value.iter().map(|i| self.instruction(i)).collect();
        converted.push(At::new(
            expr.loc,
            Instruction {
                opcode: At::new(expr.loc, Opcode::End),
                immediate: Immediate::None,
            },
        ));
        At::new(expr.loc, binary::ConstantExpression { instructions: converted })
    }
}

/// Convert the whole module. Items keep their text order; the binary
/// module's sections reassemble them by kind, which preserves indices
/// because imports precede definitions in every space.
pub fn convert_module(
    module: &text::TextModule,
    errors: &mut dyn Errors,
) -> Option<binary::Module> {
    let mut converter = Converter { errors, ok: true };
    let mut out = binary::Module::default();

    for item in &module.items {
        let loc = item.loc;
        match &item.value {
            text::ModuleItem::Type(entry) => {
                let ty = converter.defined_type(entry, loc);
                out.types.push(ty);
            }
            text::ModuleItem::Import(import) => {
                let desc = match &import.desc {
                    text::ImportDesc::Function { type_use, .. } => {
                        binary::ImportDesc::Function(converter.type_use_index(type_use, loc))
                    }
                    text::ImportDesc::Table { ty, .. } => {
                        binary::ImportDesc::Table(converter.table_type(ty))
                    }
                    text::ImportDesc::Memory { ty, .. } => {
                        binary::ImportDesc::Memory(At::new(ty.loc, MemoryType { limits: *ty }))
                    }
                    text::ImportDesc::Global { ty, .. } => {
                        binary::ImportDesc::Global(converter.global_type(ty))
                    }
                    text::ImportDesc::Tag { type_use, .. } => {
                        binary::ImportDesc::Tag(At::new(
                            loc,
                            TagType {
                                attribute: At::new(loc, TagAttribute::Exception),
                                type_index: converter.type_use_index(type_use, loc),
                            },
                        ))
                    }
                };
                out.imports.push(At::new(
                    loc,
                    binary::Import {
                        module: import.module.clone(),
                        name: import.name.clone(),
                        desc,
                    },
                ));
            }
            text::ModuleItem::Function(func) => {
                let type_index = converter.type_use_index(&func.type_use, loc);
                out.functions.push(At::new(loc, binary::Function { type_index }));
                let locals = converter.locals_runs(&func.locals);
                let body = converter.expression(&func.instructions, loc);
                out.codes.push(At::new(loc, binary::Code { locals, body }));
            }
            text::ModuleItem::Table(table) => match &table.body {
                text::TableBody::Type(ty) => {
                    let ty = converter.table_type(ty);
                    out.tables.push(At::new(loc, binary::Table { ty }));
                }
                text::TableBody::Inline { .. } => {
                    converter.error(loc, "inline elements survived desugaring");
                }
            },
            text::ModuleItem::Memory(memory) => match &memory.body {
                text::MemoryBody::Type(ty) => {
                    out.memories.push(At::new(
                        loc,
                        binary::Memory { ty: At::new(ty.loc, MemoryType { limits: *ty }) },
                    ));
                }
                text::MemoryBody::Inline { .. } => {
                    converter.error(loc, "inline data survived desugaring");
                }
            },
            text::ModuleItem::Global(global) => {
                let ty = converter.global_type(&global.ty);
                let init = match &global.init {
                    Some(init) => converter.constant_expression(init),
                    None => {
                        converter.error(loc, "global without an initializer");
                        At::new(loc, binary::ConstantExpression::default())
                    }
                };
                out.globals.push(At::new(loc, binary::Global { ty, init }));
            }
            text::ModuleItem::Tag(tag) => {
                let type_index = converter.type_use_index(&tag.type_use, loc);
                out.tags.push(At::new(
                    loc,
                    binary::Tag {
                        ty: At::new(
                            loc,
                            TagType {
                                attribute: At::new(loc, TagAttribute::Exception),
                                type_index,
                            },
                        ),
                    },
                ));
            }
            text::ModuleItem::Export(export) => {
                let index = converter.index(&export.var);
                out.exports.push(At::new(
                    loc,
                    binary::Export {
                        kind: export.kind,
                        name: export.name.clone(),
                        index,
                    },
                ));
            }
            text::ModuleItem::Start(start) => {
                let func_index = converter.index(&start.var);
                out.start = Some(At::new(loc, binary::Start { func_index }));
            }
            text::ModuleItem::Element(segment) => {
                let elem_type = converter.reference(&segment.elem_type);
                let mode = match &segment.mode {
                    text::SegmentMode::Active { table, offset } => binary::SegmentMode::Active {
                        table_index: converter.index_or_zero(table, loc),
                        offset: converter.constant_expression(offset),
                    },
                    text::SegmentMode::Passive => binary::SegmentMode::Passive,
                    text::SegmentMode::Declared => binary::SegmentMode::Declared,
                };
                let init = match &segment.init {
                    text::ElementInit::Vars(vars) => binary::ElementInit::Indices(
                        vars.iter().map(|v| converter.index(v)).collect(),
                    ),
                    text::ElementInit::Expressions(exprs) => binary::ElementInit::Expressions(
                        exprs.iter().map(|e| converter.constant_expression(e)).collect(),
                    ),
                };
                out.element_segments.push(At::new(
                    loc,
                    binary::ElementSegment { mode, elem_type, init },
                ));
            }
            text::ModuleItem::Data(segment) => {
                let mode = match &segment.mode {
                    text::DataMode::Active { memory, offset } => binary::DataMode::Active {
                        memory_index: converter.index_or_zero(memory, loc),
                        offset: converter.constant_expression(offset),
                    },
                    text::DataMode::Passive => binary::DataMode::Passive,
                };
                out.data_segments.push(At::new(
                    loc,
                    binary::DataSegment { mode, init: segment.init.clone() },
                ));
            }
        }
    }

    if converter.ok {
        Some(out)
    } else {
        None
    }
}
