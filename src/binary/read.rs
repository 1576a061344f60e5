//! Primitive and composite element readers. Every function takes a
//! cursor plus the read context and returns a located value, or
//! `None` after reporting to the sink. The cursor advances by exactly
//! the bytes consumed and stops at the offending byte on failure.

use crate::binary::leb::{self, LebError};
use crate::binary::{Code, ConstantExpression, Expression};
use crate::errors::Errors;
use crate::features::Features;
use crate::span::{At, Location, SpanU8};
use crate::types::*;

pub struct ReadCtx<'e> {
    pub features: Features,
    pub errors: &'e mut dyn Errors,
    // End-of-module bookkeeping, filled in by the section walk.
    pub defined_function_count: u32,
    pub code_count: u32,
    pub declared_data_count: Option<u32>,
    pub data_count: u32,
}

impl<'e> ReadCtx<'e> {
    pub fn new(features: Features, errors: &'e mut dyn Errors) -> Self {
        ReadCtx {
            features,
            errors,
            defined_function_count: 0,
            code_count: 0,
            declared_data_count: None,
            data_count: 0,
        }
    }

    pub fn error(&mut self, loc: Location, message: impl Into<String>) {
        self.errors.on_error(loc, message.into());
    }

    /// Run `f` under a nested error context, popping on every path.
    pub fn in_context<T>(
        &mut self,
        loc: Location,
        desc: &str,
        f: impl FnOnce(&mut Self) -> Option<T>,
    ) -> Option<T> {
        self.errors.push_context(loc, desc);
        let result = f(self);
        self.errors.pop_context();
        result
    }
}

pub fn read_u8(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<u8>> {
    let loc = span.loc();
    match span.advance(1) {
        Some(bytes) => Some(At::new(Location::new(loc.start, loc.start + 1), bytes[0])),
        None => {
            ctx.error(loc, "Unable to read u8");
            None
        }
    }
}

pub fn read_bytes<'a>(
    span: &mut SpanU8<'a>,
    n: usize,
    ctx: &mut ReadCtx,
) -> Option<At<&'a [u8]>> {
    let start = span.pos();
    match span.advance(n) {
        Some(bytes) => Some(At::new(Location::new(start, start + n), bytes)),
        None => {
            ctx.error(span.loc(), format!("Unable to read {} bytes", n));
            None
        }
    }
}

fn leb_error_message(kind: LebError, name: &str) -> String {
    match kind {
        LebError::Truncated => format!("Unable to read {} leb128", name),
        LebError::Overflow => format!("Invalid {} leb128 encoding", name),
    }
}

macro_rules! read_leb_fn {
    ($fn_name:ident, $ty:ty, $decode:expr, $name:literal) => {
        pub fn $fn_name(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<$ty>> {
            let start = span.pos();
            match $decode(span.as_slice()) {
                Ok((value, len)) => {
                    let _ = span.advance(len);
                    Some(At::new(Location::new(start, start + len), value))
                }
                Err(kind) => {
                    ctx.error(span.loc(), leb_error_message(kind, $name));
                    None
                }
            }
        }
    };
}

read_leb_fn!(read_u32, u32, leb::decode_unsigned::<u32>, "u32");
read_leb_fn!(read_u64, u64, leb::decode_unsigned::<u64>, "u64");
read_leb_fn!(read_s32, i32, leb::decode_signed::<i32>, "s32");
read_leb_fn!(read_s64, i64, leb::decode_signed::<i64>, "s64");

/// Signed 33-bit, the width block types and heap types use.
pub fn read_s33(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<i64>> {
    let start = span.pos();
    match leb::decode_signed_bits(span.as_slice(), 33) {
        Ok((value, len)) => {
            let _ = span.advance(len);
            Some(At::new(Location::new(start, start + len), value))
        }
        Err(kind) => {
            ctx.error(span.loc(), leb_error_message(kind, "s33"));
            None
        }
    }
}

pub fn read_index(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<Index>> {
    read_u32(span, ctx)
}

/// Element count for a vector. Bounded by the remaining bytes so a
/// hostile count cannot drive allocation.
pub fn read_count(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<u32>> {
    let count = read_u32(span, ctx)?;
    if count.value as usize > span.len() {
        ctx.error(
            count.loc,
            format!(
                "Count extends past end: {}, only {} bytes left",
                count.value,
                span.len()
            ),
        );
        return None;
    }
    Some(count)
}

/// Length-prefixed byte string. UTF-8 is not enforced at this layer.
pub fn read_string(span: &mut SpanU8, ctx: &mut ReadCtx, desc: &str) -> Option<At<Vec<u8>>> {
    let start = span.pos();
    ctx.in_context(span.loc(), desc, |ctx| {
        let len = read_u32(span, ctx)?;
        let bytes = read_bytes(span, len.value as usize, ctx)?;
        Some(At::new(
            Location::new(start, span.pos()),
            bytes.value.to_vec(),
        ))
    })
}

pub fn read_f32(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<f32>> {
    let bytes = read_bytes(span, 4, ctx)?;
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes.value);
    Some(At::new(bytes.loc, f32::from_le_bytes(raw)))
}

pub fn read_f64(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<f64>> {
    let bytes = read_bytes(span, 8, ctx)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes.value);
    Some(At::new(bytes.loc, f64::from_le_bytes(raw)))
}

pub fn read_v128(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<[u8; 16]>> {
    let bytes = read_bytes(span, 16, ctx)?;
    let mut raw = [0u8; 16];
    raw.copy_from_slice(bytes.value);
    Some(At::new(bytes.loc, raw))
}

pub fn read_vec<T>(
    span: &mut SpanU8,
    ctx: &mut ReadCtx,
    read: impl Fn(&mut SpanU8, &mut ReadCtx) -> Option<At<T>>,
) -> Option<Vec<At<T>>> {
    let count = read_count(span, ctx)?;
    let mut out = Vec::with_capacity(count.value.min(1024) as usize);
    for _ in 0..count.value {
        out.push(read(span, ctx)?);
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// Types.

pub fn read_heap_type(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<HeapType>> {
    let value = read_s33(span, ctx)?;
    if value.value >= 0 {
        return Some(value.map(|v| HeapType::Index(v as Index)));
    }
    let heap = match value.value {
        -0x10 => HeapType::Func,
        -0x11 => HeapType::Extern,
        -0x12 if ctx.features.contains(Features::GC) => HeapType::Any,
        -0x13 if ctx.features.contains(Features::GC) => HeapType::Eq,
        -0x16 if ctx.features.contains(Features::GC) => HeapType::I31,
        _ => {
            ctx.error(
                value.loc,
                format!("unknown heap type: {:#04x}", (value.value as u8) & 0x7F),
            );
            return None;
        }
    };
    Some(value.map(|_| heap))
}

pub fn read_value_type(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<ValueType>> {
    let start = span.pos();
    let byte = read_u8(span, ctx)?;
    let features = ctx.features;
    let value = match byte.value {
        0x7F => ValueType::I32,
        0x7E => ValueType::I64,
        0x7D => ValueType::F32,
        0x7C => ValueType::F64,
        0x7B if features.contains(Features::SIMD) => ValueType::V128,
        0x70 if features.contains(Features::REFERENCE_TYPES) => ValueType::FUNCREF,
        0x6F if features.contains(Features::REFERENCE_TYPES) => ValueType::EXTERNREF,
        0x6E if features.contains(Features::GC) => ValueType::Reference(ReferenceType::Anyref),
        0x6D if features.contains(Features::GC) => ValueType::Reference(ReferenceType::Eqref),
        0x6A if features.contains(Features::GC) => ValueType::Reference(ReferenceType::I31ref),
        0x6C if features.contains(Features::FUNCTION_REFERENCES) => {
            let heap = read_heap_type(span, ctx)?;
            ValueType::Reference(ReferenceType::Ref(RefType {
                heap: heap.value,
                nullable: true,
            }))
        }
        0x6B if features.contains(Features::FUNCTION_REFERENCES) => {
            let heap = read_heap_type(span, ctx)?;
            ValueType::Reference(ReferenceType::Ref(RefType {
                heap: heap.value,
                nullable: false,
            }))
        }
        0x69 if features.contains(Features::GC) => {
            let depth = read_u32(span, ctx)?;
            let heap = read_heap_type(span, ctx)?;
            ValueType::Rtt(Rtt { depth: depth.value, heap: heap.value })
        }
        b => {
            ctx.error(byte.loc, format!("unknown value type: {:#04x}", b));
            return None;
        }
    };
    Some(At::new(Location::new(start, span.pos()), value))
}

/// Reference types as they appear in table element position and the
/// `ref.null`/select immediates. `funcref` is valid without any
/// proposal here.
pub fn read_reference_type(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<ReferenceType>> {
    let start = span.pos();
    let byte = read_u8(span, ctx)?;
    let features = ctx.features;
    let value = match byte.value {
        0x70 => ReferenceType::Funcref,
        0x6F if features.contains(Features::REFERENCE_TYPES) => ReferenceType::Externref,
        0x6E if features.contains(Features::GC) => ReferenceType::Anyref,
        0x6D if features.contains(Features::GC) => ReferenceType::Eqref,
        0x6A if features.contains(Features::GC) => ReferenceType::I31ref,
        0x6C if features.contains(Features::FUNCTION_REFERENCES) => {
            let heap = read_heap_type(span, ctx)?;
            ReferenceType::Ref(RefType { heap: heap.value, nullable: true })
        }
        0x6B if features.contains(Features::FUNCTION_REFERENCES) => {
            let heap = read_heap_type(span, ctx)?;
            ReferenceType::Ref(RefType { heap: heap.value, nullable: false })
        }
        b => {
            ctx.error(byte.loc, format!("unknown reference type: {:#04x}", b));
            return None;
        }
    };
    Some(At::new(Location::new(start, span.pos()), value))
}

pub fn read_block_type(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<BlockType>> {
    let start = span.pos();
    let Some(byte) = span.peek_u8() else {
        ctx.error(span.loc(), "Unable to read block type");
        return None;
    };
    let value = if byte == 0x40 {
        let _ = span.advance(1);
        BlockType::Void
    } else if byte & 0x80 == 0 && byte > 0x40 {
        // Single-byte negative s33 values are the value-type space.
        let vt = read_value_type(span, ctx)?;
        BlockType::Value(vt.value)
    } else {
        let index = read_s33(span, ctx)?;
        if index.value < 0 {
            ctx.error(index.loc, format!("unknown block type: {}", index.value));
            return None;
        }
        if !ctx.features.contains(Features::MULTI_VALUE) {
            ctx.error(index.loc, "block type index requires multi-value");
            return None;
        }
        BlockType::Index(index.value as Index)
    };
    Some(At::new(Location::new(start, span.pos()), value))
}

pub fn read_mutability(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<Mutability>> {
    let byte = read_u8(span, ctx)?;
    match Mutability::try_from(byte.value) {
        Ok(m) => Some(At::new(byte.loc, m)),
        Err(_) => {
            ctx.error(byte.loc, format!("unknown mutability: {:#04x}", byte.value));
            None
        }
    }
}

pub fn read_limits(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<Limits>> {
    let start = span.pos();
    let flags = read_u8(span, ctx)?;
    if flags.value & !0x07 != 0 {
        ctx.error(flags.loc, format!("unknown limits flag: {:#04x}", flags.value));
        return None;
    }
    let has_max = flags.value & 0x01 != 0;
    let shared = flags.value & 0x02 != 0;
    let index64 = flags.value & 0x04 != 0;
    if shared && !ctx.features.contains(Features::THREADS) {
        ctx.error(flags.loc, format!("unknown limits flag: {:#04x}", flags.value));
        return None;
    }
    if index64 && !ctx.features.contains(Features::MEMORY64) {
        ctx.error(flags.loc, format!("unknown limits flag: {:#04x}", flags.value));
        return None;
    }
    let index_type = if index64 { IndexType::I64 } else { IndexType::I32 };
    let min = if index64 {
        read_u64(span, ctx)?.value
    } else {
        read_u32(span, ctx)?.value as u64
    };
    let max = if has_max {
        Some(if index64 {
            read_u64(span, ctx)?.value
        } else {
            read_u32(span, ctx)?.value as u64
        })
    } else {
        None
    };
    Some(At::new(
        Location::new(start, span.pos()),
        Limits { min, max, shared, index_type },
    ))
}

pub fn read_table_type(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<TableType>> {
    let start = span.pos();
    let elem_type = read_reference_type(span, ctx)?;
    let limits = read_limits(span, ctx)?;
    if limits.shared {
        ctx.error(limits.loc, "tables may not be shared");
        return None;
    }
    Some(At::new(
        Location::new(start, span.pos()),
        TableType { limits, elem_type },
    ))
}

pub fn read_memory_type(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<MemoryType>> {
    let limits = read_limits(span, ctx)?;
    Some(At::new(limits.loc, MemoryType { limits }))
}

pub fn read_global_type(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<GlobalType>> {
    let start = span.pos();
    let valtype = read_value_type(span, ctx)?;
    let mutability = read_mutability(span, ctx)?;
    Some(At::new(
        Location::new(start, span.pos()),
        GlobalType { valtype, mutability },
    ))
}

pub fn read_tag_type(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<TagType>> {
    let start = span.pos();
    let byte = read_u8(span, ctx)?;
    let attribute = match TagAttribute::try_from(byte.value) {
        Ok(a) => At::new(byte.loc, a),
        Err(_) => {
            ctx.error(byte.loc, format!("unknown tag attribute: {:#04x}", byte.value));
            return None;
        }
    };
    let type_index = read_index(span, ctx)?;
    Some(At::new(
        Location::new(start, span.pos()),
        TagType { attribute, type_index },
    ))
}

fn read_storage_type(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<StorageType>> {
    let Some(byte) = span.peek_u8() else {
        ctx.error(span.loc(), "Unable to read storage type");
        return None;
    };
    match byte {
        0x7A => {
            let at = read_u8(span, ctx)?;
            Some(At::new(at.loc, StorageType::Packed(PackedType::I8)))
        }
        0x79 => {
            let at = read_u8(span, ctx)?;
            Some(At::new(at.loc, StorageType::Packed(PackedType::I16)))
        }
        _ => {
            let vt = read_value_type(span, ctx)?;
            Some(At::new(vt.loc, StorageType::Value(vt.value)))
        }
    }
}

fn read_field_type(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<FieldType>> {
    let start = span.pos();
    let ty = read_storage_type(span, ctx)?;
    let mutability = read_mutability(span, ctx)?;
    Some(At::new(
        Location::new(start, span.pos()),
        FieldType { ty, mutability },
    ))
}

pub fn read_function_type(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<FunctionType>> {
    let start = span.pos();
    let params = read_vec(span, ctx, read_value_type)?;
    let results = read_vec(span, ctx, read_value_type)?;
    Some(At::new(
        Location::new(start, span.pos()),
        FunctionType { params, results },
    ))
}

/// One type-section entry: function, struct, or array form.
pub fn read_defined_type(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<DefinedType>> {
    let start = span.pos();
    let form = read_u8(span, ctx)?;
    let value = match form.value {
        0x60 => DefinedType::Func(read_function_type(span, ctx)?),
        0x5F if ctx.features.contains(Features::GC) => {
            let fields = read_vec(span, ctx, read_field_type)?;
            DefinedType::Struct(At::new(
                Location::new(start, span.pos()),
                StructType { fields },
            ))
        }
        0x5E if ctx.features.contains(Features::GC) => {
            let field = read_field_type(span, ctx)?;
            DefinedType::Array(At::new(Location::new(start, span.pos()), ArrayType { field }))
        }
        b => {
            ctx.error(form.loc, format!("unknown type form: {:#04x}", b));
            return None;
        }
    };
    Some(At::new(Location::new(start, span.pos()), value))
}

// ---------------------------------------------------------------------------
// Instructions.

fn read_memarg(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<MemArgImmediate> {
    let align_log2 = read_u32(span, ctx)?;
    let offset = if ctx.features.contains(Features::MEMORY64) {
        read_u64(span, ctx)?
    } else {
        let o = read_u32(span, ctx)?;
        o.map(u64::from)
    };
    Some(MemArgImmediate { align_log2, offset })
}

fn read_locals_run(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<LocalsRun>> {
    let start = span.pos();
    let count = read_u32(span, ctx)?;
    let ty = read_value_type(span, ctx)?;
    Some(At::new(Location::new(start, span.pos()), LocalsRun { count, ty }))
}

/// Locals declarations for code bodies and `let`. The summed count
/// must stay in index range.
pub fn read_locals(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<Vec<At<LocalsRun>>> {
    let runs = read_vec(span, ctx, read_locals_run)?;
    let mut total: u64 = 0;
    for run in &runs {
        total += u64::from(run.count.value);
        if total > u64::from(u32::MAX) {
            ctx.error(run.loc, "too many locals");
            return None;
        }
    }
    Some(runs)
}

fn read_heap_type_2(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<HeapType2Immediate> {
    let parent = read_heap_type(span, ctx)?;
    let child = read_heap_type(span, ctx)?;
    Some(HeapType2Immediate { parent, child })
}

fn read_immediate(
    span: &mut SpanU8,
    ctx: &mut ReadCtx,
    opcode: Opcode,
) -> Option<Immediate> {
    let imm = match opcode.immediate_kind() {
        ImmediateKind::Empty => {
            if opcode == Opcode::AtomicFence {
                let byte = read_u8(span, ctx)?;
                if byte.value != 0 {
                    ctx.error(
                        byte.loc,
                        format!("unexpected atomic.fence consistency model: {:#04x}", byte.value),
                    );
                    return None;
                }
            }
            Immediate::None
        }
        ImmediateKind::S32 => Immediate::S32(read_s32(span, ctx)?),
        ImmediateKind::S64 => Immediate::S64(read_s64(span, ctx)?),
        ImmediateKind::F32 => Immediate::F32(read_f32(span, ctx)?),
        ImmediateKind::F64 => Immediate::F64(read_f64(span, ctx)?),
        ImmediateKind::V128 => Immediate::V128(read_v128(span, ctx)?),
        ImmediateKind::Index => Immediate::Index(read_index(span, ctx)?),
        ImmediateKind::BlockType => Immediate::BlockType(read_block_type(span, ctx)?),
        ImmediateKind::BrTable => {
            let targets = read_vec(span, ctx, read_index)?;
            let default_target = read_index(span, ctx)?;
            Immediate::BrTable(BrTableImmediate { targets, default_target })
        }
        ImmediateKind::CallIndirect => {
            let type_index = read_index(span, ctx)?;
            let table_index = read_index(span, ctx)?;
            if table_index.value != 0 && !ctx.features.contains(Features::REFERENCE_TYPES) {
                ctx.error(table_index.loc, "call_indirect reserved value must be 0");
                return None;
            }
            Immediate::CallIndirect(CallIndirectImmediate { type_index, table_index })
        }
        ImmediateKind::Copy => {
            let dst = read_index(span, ctx)?;
            let src = read_index(span, ctx)?;
            Immediate::Copy(CopyImmediate { dst, src })
        }
        ImmediateKind::Init => {
            let segment_index = read_index(span, ctx)?;
            let dst = read_index(span, ctx)?;
            Immediate::Init(InitImmediate { segment_index, dst })
        }
        ImmediateKind::MemArg => Immediate::MemArg(read_memarg(span, ctx)?),
        ImmediateKind::SelectTypes => Immediate::SelectTypes(read_vec(span, ctx, read_value_type)?),
        ImmediateKind::SimdLane => Immediate::SimdLane(read_u8(span, ctx)?),
        ImmediateKind::SimdShuffle => Immediate::SimdShuffle(read_v128(span, ctx)?),
        ImmediateKind::Let => {
            let block_type = read_block_type(span, ctx)?;
            let locals = read_locals(span, ctx)?;
            Immediate::Let(LetImmediate { block_type, locals })
        }
        ImmediateKind::RefType => Immediate::RefType(read_reference_type(span, ctx)?),
        ImmediateKind::HeapType => Immediate::HeapType(read_heap_type(span, ctx)?),
        ImmediateKind::BrOnCast => {
            let target = read_index(span, ctx)?;
            let types = read_heap_type_2(span, ctx)?;
            Immediate::BrOnCast(BrOnCastImmediate { target, types })
        }
        ImmediateKind::HeapType2 => Immediate::HeapType2(read_heap_type_2(span, ctx)?),
        ImmediateKind::RttSub => {
            let depth = read_u32(span, ctx)?;
            let types = read_heap_type_2(span, ctx)?;
            Immediate::RttSub(RttSubImmediate { depth, types })
        }
        ImmediateKind::StructField => {
            let struct_index = read_index(span, ctx)?;
            let field_index = read_index(span, ctx)?;
            Immediate::StructField(StructFieldImmediate { struct_index, field_index })
        }
        ImmediateKind::SimdMemoryLane => {
            let memarg = read_memarg(span, ctx)?;
            let lane = read_u8(span, ctx)?;
            Immediate::SimdMemoryLane(SimdMemoryLaneImmediate { memarg, lane })
        }
        ImmediateKind::FuncBind => Immediate::FuncBind(read_index(span, ctx)?),
    };
    Some(imm)
}

pub fn read_opcode(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<Opcode>> {
    let start = span.pos();
    let byte = read_u8(span, ctx)?;
    let (prefix, code) = match byte.value {
        0xFB | 0xFC | 0xFD | 0xFE => {
            let code = read_u32(span, ctx)?;
            (Some(byte.value), code.value)
        }
        b => (None, u32::from(b)),
    };
    let loc = Location::new(start, span.pos());
    let opcode = Opcode::decode(prefix, code).filter(|op| op.is_enabled(ctx.features));
    match opcode {
        Some(op) => Some(At::new(loc, op)),
        None => {
            let message = match prefix {
                Some(p) => format!("unknown opcode {:#04x} {}", p, code),
                None => format!("unknown opcode {:#04x}", code),
            };
            ctx.error(loc, message);
            None
        }
    }
}

pub fn read_instruction(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<Instruction>> {
    let start = span.pos();
    let opcode = read_opcode(span, ctx)?;
    let immediate = read_immediate(span, ctx, opcode.value)?;
    Some(At::new(
        Location::new(start, span.pos()),
        Instruction { opcode, immediate },
    ))
}

/// Instructions up to and including the `end` that closes nesting
/// depth zero. `delegate` closes a `try` frame like `end` does.
fn read_instruction_run(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<Vec<At<Instruction>>> {
    let mut instructions = Vec::new();
    let mut depth = 0usize;
    loop {
        let index = instructions.len();
        let instr = ctx.in_context(
            span.loc(),
            &format!("instruction {}", index),
            |ctx| read_instruction(span, ctx),
        )?;
        let opcode = instr.opcode.value;
        instructions.push(instr);
        if opcode.is_block_start() {
            depth += 1;
        } else if opcode == Opcode::End {
            if depth == 0 {
                return Some(instructions);
            }
            depth -= 1;
        } else if opcode == Opcode::Delegate {
            if depth == 0 {
                ctx.error(span.loc(), "unexpected delegate");
                return None;
            }
            depth -= 1;
        }
    }
}

pub fn read_expression(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<Expression>> {
    let start = span.pos();
    let instructions = read_instruction_run(span, ctx)?;
    Some(At::new(
        Location::new(start, span.pos()),
        Expression { instructions },
    ))
}

/// Same wire shape as an expression; the validator applies the
/// constant-opcode whitelist later.
pub fn read_constant_expression(
    span: &mut SpanU8,
    ctx: &mut ReadCtx,
) -> Option<At<ConstantExpression>> {
    let start = span.pos();
    let instructions = read_instruction_run(span, ctx)?;
    Some(At::new(
        Location::new(start, span.pos()),
        ConstantExpression { instructions },
    ))
}

/// One code-section entry: size-prefixed locals + body.
pub fn read_code(span: &mut SpanU8, ctx: &mut ReadCtx) -> Option<At<Code>> {
    let start = span.pos();
    let size = read_u32(span, ctx)?;
    let Some(mut body_span) = span.take(size.value as usize) else {
        ctx.error(size.loc, format!("Unable to read code size: {}", size.value));
        return None;
    };
    let locals = read_locals(&mut body_span, ctx)?;
    let body = read_expression(&mut body_span, ctx)?;
    if !body_span.is_empty() {
        ctx.error(body_span.loc(), "unused bytes at end of code body");
    }
    Some(At::new(Location::new(start, span.pos()), Code { locals, body }))
}
