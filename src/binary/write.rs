//! Binary encoder. Inverse of the reader over the same AST; the
//! round-trip law is `read(write(m)) == m` modulo locations.

use crate::binary::leb::{encode_signed_i64, encode_unsigned_u64};
use crate::binary::module::SectionId;
use crate::binary::*;
use crate::types::*;

fn write_u32(out: &mut Vec<u8>, value: u32) {
    encode_unsigned_u64(u64::from(value), out);
}

fn write_u64(out: &mut Vec<u8>, value: u64) {
    encode_unsigned_u64(value, out);
}

fn write_s32(out: &mut Vec<u8>, value: i32) {
    encode_signed_i64(i64::from(value), out);
}

fn write_s64(out: &mut Vec<u8>, value: i64) {
    encode_signed_i64(value, out);
}

fn write_s33(out: &mut Vec<u8>, value: i64) {
    encode_signed_i64(value, out);
}

fn write_string(out: &mut Vec<u8>, bytes: &[u8]) {
    write_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

fn write_heap_type(out: &mut Vec<u8>, heap: HeapType) {
    match heap {
        HeapType::Func => write_s33(out, -0x10),
        HeapType::Extern => write_s33(out, -0x11),
        HeapType::Any => write_s33(out, -0x12),
        HeapType::Eq => write_s33(out, -0x13),
        HeapType::I31 => write_s33(out, -0x16),
        HeapType::Index(i) => write_s33(out, i64::from(i)),
    }
}

fn write_reference_type(out: &mut Vec<u8>, ty: ReferenceType) {
    match ty {
        ReferenceType::Funcref => out.push(0x70),
        ReferenceType::Externref => out.push(0x6F),
        ReferenceType::Anyref => out.push(0x6E),
        ReferenceType::Eqref => out.push(0x6D),
        ReferenceType::I31ref => out.push(0x6A),
        ReferenceType::Ref(r) => {
            out.push(if r.nullable { 0x6C } else { 0x6B });
            write_heap_type(out, r.heap);
        }
    }
}

fn write_value_type(out: &mut Vec<u8>, ty: ValueType) {
    match ty {
        ValueType::Numeric(NumericType::I32) => out.push(0x7F),
        ValueType::Numeric(NumericType::I64) => out.push(0x7E),
        ValueType::Numeric(NumericType::F32) => out.push(0x7D),
        ValueType::Numeric(NumericType::F64) => out.push(0x7C),
        ValueType::Numeric(NumericType::V128) => out.push(0x7B),
        ValueType::Reference(r) => write_reference_type(out, r),
        ValueType::Rtt(rtt) => {
            out.push(0x69);
            write_u32(out, rtt.depth);
            write_heap_type(out, rtt.heap);
        }
    }
}

fn write_storage_type(out: &mut Vec<u8>, ty: StorageType) {
    match ty {
        StorageType::Value(v) => write_value_type(out, v),
        StorageType::Packed(PackedType::I8) => out.push(0x7A),
        StorageType::Packed(PackedType::I16) => out.push(0x79),
    }
}

fn write_field_type(out: &mut Vec<u8>, field: &FieldType) {
    write_storage_type(out, field.ty.value);
    out.push(field.mutability.value as u8);
}

fn write_defined_type(out: &mut Vec<u8>, ty: &DefinedType) {
    match ty {
        DefinedType::Func(ft) => {
            out.push(0x60);
            write_u32(out, ft.params.len() as u32);
            for p in &ft.params {
                write_value_type(out, p.value);
            }
            write_u32(out, ft.results.len() as u32);
            for r in &ft.results {
                write_value_type(out, r.value);
            }
        }
        DefinedType::Struct(st) => {
            out.push(0x5F);
            write_u32(out, st.fields.len() as u32);
            for field in &st.fields {
                write_field_type(out, &field.value);
            }
        }
        DefinedType::Array(at) => {
            out.push(0x5E);
            write_field_type(out, &at.field.value);
        }
    }
}

fn write_limits(out: &mut Vec<u8>, limits: &Limits) {
    let mut flags = 0u8;
    if limits.max.is_some() {
        flags |= 0x01;
    }
    if limits.shared {
        flags |= 0x02;
    }
    let index64 = limits.index_type == IndexType::I64;
    if index64 {
        flags |= 0x04;
    }
    out.push(flags);
    if index64 {
        write_u64(out, limits.min);
        if let Some(max) = limits.max {
            write_u64(out, max);
        }
    } else {
        write_u32(out, limits.min as u32);
        if let Some(max) = limits.max {
            write_u32(out, max as u32);
        }
    }
}

fn write_table_type(out: &mut Vec<u8>, ty: &TableType) {
    write_reference_type(out, ty.elem_type.value);
    write_limits(out, &ty.limits.value);
}

fn write_global_type(out: &mut Vec<u8>, ty: &GlobalType) {
    write_value_type(out, ty.valtype.value);
    out.push(ty.mutability.value as u8);
}

fn write_tag_type(out: &mut Vec<u8>, ty: &TagType) {
    out.push(ty.attribute.value as u8);
    write_u32(out, ty.type_index.value);
}

fn write_block_type(out: &mut Vec<u8>, ty: BlockType) {
    match ty {
        BlockType::Void => out.push(0x40),
        BlockType::Value(v) => write_value_type(out, v),
        BlockType::Index(i) => write_s33(out, i64::from(i)),
    }
}

fn write_memarg(out: &mut Vec<u8>, memarg: &MemArgImmediate) {
    write_u32(out, memarg.align_log2.value);
    write_u64(out, memarg.offset.value);
}

fn write_locals(out: &mut Vec<u8>, locals: &[At<LocalsRun>]) {
    write_u32(out, locals.len() as u32);
    for run in locals {
        write_u32(out, run.count.value);
        write_value_type(out, run.ty.value);
    }
}

pub fn write_instruction(out: &mut Vec<u8>, instr: &Instruction) {
    let (prefix, code) = instr.opcode.encoding();
    match prefix {
        Some(p) => {
            out.push(p);
            write_u32(out, code);
        }
        None => out.push(code as u8),
    }
    match &instr.immediate {
        Immediate::None => {
            if instr.opcode.value == Opcode::AtomicFence {
                out.push(0x00);
            }
        }
        Immediate::S32(v) => write_s32(out, v.value),
        Immediate::S64(v) => write_s64(out, v.value),
        Immediate::F32(v) => out.extend_from_slice(&v.value.to_le_bytes()),
        Immediate::F64(v) => out.extend_from_slice(&v.value.to_le_bytes()),
        Immediate::V128(v) => out.extend_from_slice(&v.value),
        Immediate::Index(i) => write_u32(out, i.value),
        Immediate::BlockType(bt) => write_block_type(out, bt.value),
        Immediate::BrTable(imm) => {
            write_u32(out, imm.targets.len() as u32);
            for target in &imm.targets {
                write_u32(out, target.value);
            }
            write_u32(out, imm.default_target.value);
        }
        Immediate::CallIndirect(imm) => {
            write_u32(out, imm.type_index.value);
            write_u32(out, imm.table_index.value);
        }
        Immediate::Copy(imm) => {
            write_u32(out, imm.dst.value);
            write_u32(out, imm.src.value);
        }
        Immediate::Init(imm) => {
            write_u32(out, imm.segment_index.value);
            write_u32(out, imm.dst.value);
        }
        Immediate::MemArg(memarg) => write_memarg(out, memarg),
        Immediate::SelectTypes(types) => {
            write_u32(out, types.len() as u32);
            for ty in types {
                write_value_type(out, ty.value);
            }
        }
        Immediate::SimdLane(lane) => out.push(lane.value),
        Immediate::SimdShuffle(lanes) => out.extend_from_slice(&lanes.value),
        Immediate::Let(imm) => {
            write_block_type(out, imm.block_type.value);
            write_locals(out, &imm.locals);
        }
        Immediate::RefType(ty) => write_reference_type(out, ty.value),
        Immediate::HeapType(heap) => write_heap_type(out, heap.value),
        Immediate::BrOnCast(imm) => {
            write_u32(out, imm.target.value);
            write_heap_type(out, imm.types.parent.value);
            write_heap_type(out, imm.types.child.value);
        }
        Immediate::HeapType2(imm) => {
            write_heap_type(out, imm.parent.value);
            write_heap_type(out, imm.child.value);
        }
        Immediate::RttSub(imm) => {
            write_u32(out, imm.depth.value);
            write_heap_type(out, imm.types.parent.value);
            write_heap_type(out, imm.types.child.value);
        }
        Immediate::StructField(imm) => {
            write_u32(out, imm.struct_index.value);
            write_u32(out, imm.field_index.value);
        }
        Immediate::SimdMemoryLane(imm) => {
            write_memarg(out, &imm.memarg);
            out.push(imm.lane.value);
        }
        Immediate::FuncBind(i) => write_u32(out, i.value),
    }
}

fn write_expression(out: &mut Vec<u8>, expr: &Expression) {
    for instr in &expr.instructions {
        write_instruction(out, instr);
    }
}

fn write_constant_expression(out: &mut Vec<u8>, expr: &ConstantExpression) {
    for instr in &expr.instructions {
        write_instruction(out, instr);
    }
}

fn write_element_segment(out: &mut Vec<u8>, segment: &ElementSegment) {
    let uses_expressions = matches!(segment.init, ElementInit::Expressions(_));
    let plain_funcref = segment.elem_type.value == ReferenceType::Funcref;
    let (flags, table_index, offset) = match &segment.mode {
        SegmentMode::Active { table_index, offset } => {
            let explicit_table = table_index.value != 0 || (uses_expressions && !plain_funcref);
            let flags = match (uses_expressions, explicit_table) {
                (false, false) => 0u32,
                (false, true) => 2,
                (true, false) => 4,
                (true, true) => 6,
            };
            (flags, Some(table_index), Some(offset))
        }
        SegmentMode::Passive => (if uses_expressions { 5 } else { 1 }, None, None),
        SegmentMode::Declared => (if uses_expressions { 7 } else { 3 }, None, None),
    };
    write_u32(out, flags);
    if matches!(flags, 2 | 6) {
        if let Some(table_index) = table_index {
            write_u32(out, table_index.value);
        }
    }
    if let Some(offset) = offset {
        write_constant_expression(out, offset);
    }
    match flags {
        1 | 2 | 3 => out.push(0x00),
        5 | 6 | 7 => write_reference_type(out, segment.elem_type.value),
        _ => {}
    }
    match &segment.init {
        ElementInit::Indices(indices) => {
            write_u32(out, indices.len() as u32);
            for index in indices {
                write_u32(out, index.value);
            }
        }
        ElementInit::Expressions(exprs) => {
            write_u32(out, exprs.len() as u32);
            for expr in exprs {
                write_constant_expression(out, expr);
            }
        }
    }
}

fn write_data_segment(out: &mut Vec<u8>, segment: &DataSegment) {
    match &segment.mode {
        DataMode::Active { memory_index, offset } => {
            if memory_index.value == 0 {
                write_u32(out, 0);
            } else {
                write_u32(out, 2);
                write_u32(out, memory_index.value);
            }
            write_constant_expression(out, offset);
        }
        DataMode::Passive => write_u32(out, 1),
    }
    write_u32(out, segment.init.len() as u32);
    out.extend_from_slice(&segment.init);
}

fn write_code(out: &mut Vec<u8>, code: &Code) {
    let mut body = Vec::new();
    write_locals(&mut body, &code.locals);
    write_expression(&mut body, &code.body.value);
    write_u32(out, body.len() as u32);
    out.extend_from_slice(&body);
}

fn write_section(out: &mut Vec<u8>, id: SectionId, body: &[u8]) {
    out.push(id as u8);
    write_u32(out, body.len() as u32);
    out.extend_from_slice(body);
}

fn write_counted_section<T>(
    out: &mut Vec<u8>,
    id: SectionId,
    items: &[At<T>],
    write_item: impl Fn(&mut Vec<u8>, &T),
) {
    if items.is_empty() {
        return;
    }
    let mut body = Vec::new();
    write_u32(&mut body, items.len() as u32);
    for item in items {
        write_item(&mut body, &item.value);
    }
    write_section(out, id, &body);
}

pub fn write_module(module: &Module) -> Vec<u8> {
    let mut out = vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];

    write_counted_section(&mut out, SectionId::Type, &module.types, write_defined_type);
    write_counted_section(&mut out, SectionId::Import, &module.imports, |out, import| {
        write_string(out, &import.module.value);
        write_string(out, &import.name.value);
        match &import.desc {
            ImportDesc::Function(i) => {
                out.push(ExternalKind::Function as u8);
                write_u32(out, i.value);
            }
            ImportDesc::Table(ty) => {
                out.push(ExternalKind::Table as u8);
                write_table_type(out, &ty.value);
            }
            ImportDesc::Memory(ty) => {
                out.push(ExternalKind::Memory as u8);
                write_limits(out, &ty.limits.value);
            }
            ImportDesc::Global(ty) => {
                out.push(ExternalKind::Global as u8);
                write_global_type(out, &ty.value);
            }
            ImportDesc::Tag(ty) => {
                out.push(ExternalKind::Tag as u8);
                write_tag_type(out, &ty.value);
            }
        }
    });
    write_counted_section(&mut out, SectionId::Function, &module.functions, |out, f| {
        write_u32(out, f.type_index.value);
    });
    write_counted_section(&mut out, SectionId::Table, &module.tables, |out, t| {
        write_table_type(out, &t.ty.value);
    });
    write_counted_section(&mut out, SectionId::Memory, &module.memories, |out, m| {
        write_limits(out, &m.ty.limits.value);
    });
    write_counted_section(&mut out, SectionId::Tag, &module.tags, |out, t| {
        write_tag_type(out, &t.ty.value);
    });
    write_counted_section(&mut out, SectionId::Global, &module.globals, |out, g| {
        write_global_type(out, &g.ty.value);
        write_constant_expression(out, &g.init.value);
    });
    write_counted_section(&mut out, SectionId::Export, &module.exports, |out, e| {
        write_string(out, &e.name.value);
        out.push(e.kind.value as u8);
        write_u32(out, e.index.value);
    });
    if let Some(start) = &module.start {
        let mut body = Vec::new();
        write_u32(&mut body, start.func_index.value);
        write_section(&mut out, SectionId::Start, &body);
    }
    write_counted_section(
        &mut out,
        SectionId::Element,
        &module.element_segments,
        write_element_segment,
    );
    if let Some(count) = &module.data_count {
        let mut body = Vec::new();
        write_u32(&mut body, count.value);
        write_section(&mut out, SectionId::DataCount, &body);
    }
    write_counted_section(&mut out, SectionId::Code, &module.codes, write_code);
    write_counted_section(
        &mut out,
        SectionId::Data,
        &module.data_segments,
        write_data_segment,
    );
    for custom in &module.customs {
        let mut body = Vec::new();
        write_string(&mut body, &custom.name.value);
        body.extend_from_slice(&custom.data);
        write_section(&mut out, SectionId::Custom, &body);
    }

    out
}
