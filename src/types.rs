//! Shared data model: value and heap types, composite (defined)
//! types, limits, and the opcode/immediate tables used by every
//! pipeline stage.

use std::fmt;

use num_enum::TryFromPrimitive;

use crate::features::Features;
use crate::span::At;

pub type Index = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericType {
    I32,
    I64,
    F32,
    F64,
    V128,
}

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            NumericType::I32 => "i32",
            NumericType::I64 => "i64",
            NumericType::F32 => "f32",
            NumericType::F64 => "f64",
            NumericType::V128 => "v128",
        };
        f.write_str(s)
    }
}

/// Target of a reference: a named kind or a type-section index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapType {
    Func,
    Extern,
    Any,
    Eq,
    I31,
    Index(Index),
}

impl fmt::Display for HeapType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HeapType::Func => f.write_str("func"),
            HeapType::Extern => f.write_str("extern"),
            HeapType::Any => f.write_str("any"),
            HeapType::Eq => f.write_str("eq"),
            HeapType::I31 => f.write_str("i31"),
            HeapType::Index(i) => write!(f, "{}", i),
        }
    }
}

/// The parameterised `(ref null? heap)` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefType {
    pub heap: HeapType,
    pub nullable: bool,
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.nullable {
            write!(f, "(ref null {})", self.heap)
        } else {
            write!(f, "(ref {})", self.heap)
        }
    }
}

/// Reference types keep the spelling used by the source (keyword vs
/// parameterised form); `canonicalize` gives the uniform shape used
/// for subtyping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceType {
    Funcref,
    Externref,
    Anyref,
    Eqref,
    I31ref,
    Ref(RefType),
}

impl ReferenceType {
    pub fn canonicalize(self) -> RefType {
        match self {
            ReferenceType::Funcref => RefType { heap: HeapType::Func, nullable: true },
            ReferenceType::Externref => RefType { heap: HeapType::Extern, nullable: true },
            ReferenceType::Anyref => RefType { heap: HeapType::Any, nullable: true },
            ReferenceType::Eqref => RefType { heap: HeapType::Eq, nullable: true },
            ReferenceType::I31ref => RefType { heap: HeapType::I31, nullable: true },
            ReferenceType::Ref(r) => r,
        }
    }
}

impl PartialEq<RefType> for ReferenceType {
    fn eq(&self, other: &RefType) -> bool {
        self.canonicalize() == *other
    }
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReferenceType::Funcref => f.write_str("funcref"),
            ReferenceType::Externref => f.write_str("externref"),
            ReferenceType::Anyref => f.write_str("anyref"),
            ReferenceType::Eqref => f.write_str("eqref"),
            ReferenceType::I31ref => f.write_str("i31ref"),
            ReferenceType::Ref(r) => r.fmt(f),
        }
    }
}

/// `(rtt depth heap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rtt {
    pub depth: u32,
    pub heap: HeapType,
}

impl fmt::Display for Rtt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(rtt {} {})", self.depth, self.heap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Numeric(NumericType),
    Reference(ReferenceType),
    Rtt(Rtt),
}

impl ValueType {
    pub const I32: ValueType = ValueType::Numeric(NumericType::I32);
    pub const I64: ValueType = ValueType::Numeric(NumericType::I64);
    pub const F32: ValueType = ValueType::Numeric(NumericType::F32);
    pub const F64: ValueType = ValueType::Numeric(NumericType::F64);
    pub const V128: ValueType = ValueType::Numeric(NumericType::V128);
    pub const FUNCREF: ValueType = ValueType::Reference(ReferenceType::Funcref);
    pub const EXTERNREF: ValueType = ValueType::Reference(ReferenceType::Externref);

    pub fn is_reference(self) -> bool {
        matches!(self, ValueType::Reference(_))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValueType::Numeric(t) => t.fmt(f),
            ValueType::Reference(t) => t.fmt(f),
            ValueType::Rtt(t) => t.fmt(f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackedType {
    I8,
    I16,
}

impl fmt::Display for PackedType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            PackedType::I8 => "i8",
            PackedType::I16 => "i16",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    Value(ValueType),
    Packed(PackedType),
}

impl StorageType {
    /// The value type this storage widens to on the operand stack.
    pub fn unpack(self) -> ValueType {
        match self {
            StorageType::Value(v) => v,
            StorageType::Packed(_) => ValueType::I32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum Mutability {
    Const = 0,
    Var = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldType {
    pub ty: At<StorageType>,
    pub mutability: At<Mutability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FunctionType {
    pub params: Vec<At<ValueType>>,
    pub results: Vec<At<ValueType>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructType {
    pub fields: Vec<At<FieldType>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayType {
    pub field: At<FieldType>,
}

/// One type-section entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DefinedType {
    Func(At<FunctionType>),
    Struct(At<StructType>),
    Array(At<ArrayType>),
}

impl DefinedType {
    pub fn as_function_type(&self) -> Option<&At<FunctionType>> {
        match self {
            DefinedType::Func(ft) => Some(ft),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    I32,
    I64,
}

impl IndexType {
    pub fn value_type(self) -> ValueType {
        match self {
            IndexType::I32 => ValueType::I32,
            IndexType::I64 => ValueType::I64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Limits {
    pub min: u64,
    pub max: Option<u64>,
    pub shared: bool,
    pub index_type: IndexType,
}

impl Limits {
    pub fn new(min: u64, max: Option<u64>) -> Self {
        Limits { min, max, shared: false, index_type: IndexType::I32 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableType {
    pub limits: At<Limits>,
    pub elem_type: At<ReferenceType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryType {
    pub limits: At<Limits>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalType {
    pub valtype: At<ValueType>,
    pub mutability: At<Mutability>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum TagAttribute {
    Exception = 0,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagType {
    pub attribute: At<TagAttribute>,
    pub type_index: At<Index>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum ExternalKind {
    Function = 0,
    Table = 1,
    Memory = 2,
    Global = 3,
    Tag = 4,
}

impl fmt::Display for ExternalKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ExternalKind::Function => "func",
            ExternalKind::Table => "table",
            ExternalKind::Memory => "memory",
            ExternalKind::Global => "global",
            ExternalKind::Tag => "tag",
        })
    }
}

/// Block signature: nothing, one result, or a type-section index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    Void,
    Value(ValueType),
    Index(Index),
}

// ---------------------------------------------------------------------------
// Instruction immediates.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemArgImmediate {
    pub align_log2: At<u32>,
    pub offset: At<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrTableImmediate {
    pub targets: Vec<At<Index>>,
    pub default_target: At<Index>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallIndirectImmediate {
    pub type_index: At<Index>,
    pub table_index: At<Index>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CopyImmediate {
    pub dst: At<Index>,
    pub src: At<Index>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InitImmediate {
    pub segment_index: At<Index>,
    pub dst: At<Index>,
}

/// Locals run, as written in code bodies and `let`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalsRun {
    pub count: At<u32>,
    pub ty: At<ValueType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LetImmediate {
    pub block_type: At<BlockType>,
    pub locals: Vec<At<LocalsRun>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapType2Immediate {
    pub parent: At<HeapType>,
    pub child: At<HeapType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BrOnCastImmediate {
    pub target: At<Index>,
    pub types: HeapType2Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RttSubImmediate {
    pub depth: At<u32>,
    pub types: HeapType2Immediate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructFieldImmediate {
    pub struct_index: At<Index>,
    pub field_index: At<Index>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimdMemoryLaneImmediate {
    pub memarg: MemArgImmediate,
    pub lane: At<u8>,
}

/// Which immediate an opcode carries. Total function of the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImmediateKind {
    Empty,
    S32,
    S64,
    F32,
    F64,
    V128,
    Index,
    BlockType,
    BrTable,
    CallIndirect,
    Copy,
    Init,
    MemArg,
    SelectTypes,
    SimdLane,
    SimdShuffle,
    Let,
    RefType,
    HeapType,
    BrOnCast,
    HeapType2,
    RttSub,
    StructField,
    SimdMemoryLane,
    FuncBind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Immediate {
    None,
    S32(At<i32>),
    S64(At<i64>),
    F32(At<f32>),
    F64(At<f64>),
    V128(At<[u8; 16]>),
    Index(At<Index>),
    BlockType(At<BlockType>),
    BrTable(BrTableImmediate),
    CallIndirect(CallIndirectImmediate),
    Copy(CopyImmediate),
    Init(InitImmediate),
    MemArg(MemArgImmediate),
    SelectTypes(Vec<At<ValueType>>),
    SimdLane(At<u8>),
    SimdShuffle(At<[u8; 16]>),
    Let(LetImmediate),
    RefType(At<ReferenceType>),
    HeapType(At<HeapType>),
    BrOnCast(BrOnCastImmediate),
    HeapType2(HeapType2Immediate),
    RttSub(RttSubImmediate),
    StructField(StructFieldImmediate),
    SimdMemoryLane(SimdMemoryLaneImmediate),
    FuncBind(At<Index>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: At<Opcode>,
    pub immediate: Immediate,
}

impl Instruction {
    pub fn new(opcode: At<Opcode>, immediate: Immediate) -> Self {
        Instruction { opcode, immediate }
    }

    pub fn plain(opcode: At<Opcode>) -> Self {
        Instruction { opcode, immediate: Immediate::None }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.opcode.mnemonic())
    }
}

// ---------------------------------------------------------------------------
// Opcode table.
//
// One row per opcode: wire code, variant, mnemonic, immediate kind,
// gating feature. `decode`/`encoding`/`mnemonic`/`immediate_kind`/
// `features` are all generated from the same table so they cannot
// drift apart.

macro_rules! define_opcodes {
    (
        plain { $( $pcode:literal $pname:ident $ptext:literal $pimm:ident $pfeat:ident; )* }
        $( prefix $pfx:literal { $( $code:literal $name:ident $text:literal $imm:ident $feat:ident; )* } )*
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $( $pname, )*
            $( $( $name, )* )*
        }

        impl Opcode {
            pub fn decode(prefix: Option<u8>, code: u32) -> Option<Opcode> {
                match prefix {
                    None => match code {
                        $( $pcode => Some(Opcode::$pname), )*
                        _ => None,
                    },
                    $(
                        Some($pfx) => match code {
                            $( $code => Some(Opcode::$name), )*
                            _ => None,
                        },
                    )*
                    Some(_) => None,
                }
            }

            pub fn encoding(self) -> (Option<u8>, u32) {
                match self {
                    $( Opcode::$pname => (None, $pcode), )*
                    $( $( Opcode::$name => (Some($pfx), $code), )* )*
                }
            }

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $( Opcode::$pname => $ptext, )*
                    $( $( Opcode::$name => $text, )* )*
                }
            }

            /// First opcode with the given mnemonic; the typed
            /// `select` shares its spelling with the plain one and is
            /// chosen by the parser from the immediates instead.
            #[allow(unreachable_patterns)]
            pub fn from_mnemonic(text: &str) -> Option<Opcode> {
                match text {
                    $( $ptext => Some(Opcode::$pname), )*
                    $( $( $text => Some(Opcode::$name), )* )*
                    _ => None,
                }
            }

            pub fn immediate_kind(self) -> ImmediateKind {
                match self {
                    $( Opcode::$pname => ImmediateKind::$pimm, )*
                    $( $( Opcode::$name => ImmediateKind::$imm, )* )*
                }
            }

            /// Features that must all be enabled for this opcode.
            pub fn features(self) -> Features {
                match self {
                    $( Opcode::$pname => Features::$pfeat, )*
                    $( $( Opcode::$name => Features::$feat, )* )*
                }
            }

            pub fn is_enabled(self, features: Features) -> bool {
                features.contains(self.features())
            }
        }
    };
}

define_opcodes! {
    plain {
        0x00 Unreachable "unreachable" Empty NONE;
        0x01 Nop "nop" Empty NONE;
        0x02 Block "block" BlockType NONE;
        0x03 Loop "loop" BlockType NONE;
        0x04 If "if" BlockType NONE;
        0x05 Else "else" Empty NONE;
        0x06 Try "try" BlockType EXCEPTIONS;
        0x07 Catch "catch" Index EXCEPTIONS;
        0x08 Throw "throw" Index EXCEPTIONS;
        0x09 Rethrow "rethrow" Index EXCEPTIONS;
        0x0B End "end" Empty NONE;
        0x0C Br "br" Index NONE;
        0x0D BrIf "br_if" Index NONE;
        0x0E BrTable "br_table" BrTable NONE;
        0x0F Return "return" Empty NONE;
        0x10 Call "call" Index NONE;
        0x11 CallIndirect "call_indirect" CallIndirect NONE;
        0x12 ReturnCall "return_call" Index TAIL_CALL;
        0x13 ReturnCallIndirect "return_call_indirect" CallIndirect TAIL_CALL;
        0x14 CallRef "call_ref" Empty FUNCTION_REFERENCES;
        0x15 ReturnCallRef "return_call_ref" Empty FUNCTION_REFERENCES;
        0x16 FuncBind "func.bind" FuncBind FUNCTION_REFERENCES;
        0x17 Let "let" Let FUNCTION_REFERENCES;
        0x18 Delegate "delegate" Index EXCEPTIONS;
        0x19 CatchAll "catch_all" Empty EXCEPTIONS;
        0x1A Drop "drop" Empty NONE;
        0x1B Select "select" Empty NONE;
        0x1C SelectT "select" SelectTypes REFERENCE_TYPES;
        0x20 LocalGet "local.get" Index NONE;
        0x21 LocalSet "local.set" Index NONE;
        0x22 LocalTee "local.tee" Index NONE;
        0x23 GlobalGet "global.get" Index NONE;
        0x24 GlobalSet "global.set" Index NONE;
        0x25 TableGet "table.get" Index REFERENCE_TYPES;
        0x26 TableSet "table.set" Index REFERENCE_TYPES;
        0x28 I32Load "i32.load" MemArg NONE;
        0x29 I64Load "i64.load" MemArg NONE;
        0x2A F32Load "f32.load" MemArg NONE;
        0x2B F64Load "f64.load" MemArg NONE;
        0x2C I32Load8S "i32.load8_s" MemArg NONE;
        0x2D I32Load8U "i32.load8_u" MemArg NONE;
        0x2E I32Load16S "i32.load16_s" MemArg NONE;
        0x2F I32Load16U "i32.load16_u" MemArg NONE;
        0x30 I64Load8S "i64.load8_s" MemArg NONE;
        0x31 I64Load8U "i64.load8_u" MemArg NONE;
        0x32 I64Load16S "i64.load16_s" MemArg NONE;
        0x33 I64Load16U "i64.load16_u" MemArg NONE;
        0x34 I64Load32S "i64.load32_s" MemArg NONE;
        0x35 I64Load32U "i64.load32_u" MemArg NONE;
        0x36 I32Store "i32.store" MemArg NONE;
        0x37 I64Store "i64.store" MemArg NONE;
        0x38 F32Store "f32.store" MemArg NONE;
        0x39 F64Store "f64.store" MemArg NONE;
        0x3A I32Store8 "i32.store8" MemArg NONE;
        0x3B I32Store16 "i32.store16" MemArg NONE;
        0x3C I64Store8 "i64.store8" MemArg NONE;
        0x3D I64Store16 "i64.store16" MemArg NONE;
        0x3E I64Store32 "i64.store32" MemArg NONE;
        0x3F MemorySize "memory.size" Index NONE;
        0x40 MemoryGrow "memory.grow" Index NONE;
        0x41 I32Const "i32.const" S32 NONE;
        0x42 I64Const "i64.const" S64 NONE;
        0x43 F32Const "f32.const" F32 NONE;
        0x44 F64Const "f64.const" F64 NONE;
        0x45 I32Eqz "i32.eqz" Empty NONE;
        0x46 I32Eq "i32.eq" Empty NONE;
        0x47 I32Ne "i32.ne" Empty NONE;
        0x48 I32LtS "i32.lt_s" Empty NONE;
        0x49 I32LtU "i32.lt_u" Empty NONE;
        0x4A I32GtS "i32.gt_s" Empty NONE;
        0x4B I32GtU "i32.gt_u" Empty NONE;
        0x4C I32LeS "i32.le_s" Empty NONE;
        0x4D I32LeU "i32.le_u" Empty NONE;
        0x4E I32GeS "i32.ge_s" Empty NONE;
        0x4F I32GeU "i32.ge_u" Empty NONE;
        0x50 I64Eqz "i64.eqz" Empty NONE;
        0x51 I64Eq "i64.eq" Empty NONE;
        0x52 I64Ne "i64.ne" Empty NONE;
        0x53 I64LtS "i64.lt_s" Empty NONE;
        0x54 I64LtU "i64.lt_u" Empty NONE;
        0x55 I64GtS "i64.gt_s" Empty NONE;
        0x56 I64GtU "i64.gt_u" Empty NONE;
        0x57 I64LeS "i64.le_s" Empty NONE;
        0x58 I64LeU "i64.le_u" Empty NONE;
        0x59 I64GeS "i64.ge_s" Empty NONE;
        0x5A I64GeU "i64.ge_u" Empty NONE;
        0x5B F32Eq "f32.eq" Empty NONE;
        0x5C F32Ne "f32.ne" Empty NONE;
        0x5D F32Lt "f32.lt" Empty NONE;
        0x5E F32Gt "f32.gt" Empty NONE;
        0x5F F32Le "f32.le" Empty NONE;
        0x60 F32Ge "f32.ge" Empty NONE;
        0x61 F64Eq "f64.eq" Empty NONE;
        0x62 F64Ne "f64.ne" Empty NONE;
        0x63 F64Lt "f64.lt" Empty NONE;
        0x64 F64Gt "f64.gt" Empty NONE;
        0x65 F64Le "f64.le" Empty NONE;
        0x66 F64Ge "f64.ge" Empty NONE;
        0x67 I32Clz "i32.clz" Empty NONE;
        0x68 I32Ctz "i32.ctz" Empty NONE;
        0x69 I32Popcnt "i32.popcnt" Empty NONE;
        0x6A I32Add "i32.add" Empty NONE;
        0x6B I32Sub "i32.sub" Empty NONE;
        0x6C I32Mul "i32.mul" Empty NONE;
        0x6D I32DivS "i32.div_s" Empty NONE;
        0x6E I32DivU "i32.div_u" Empty NONE;
        0x6F I32RemS "i32.rem_s" Empty NONE;
        0x70 I32RemU "i32.rem_u" Empty NONE;
        0x71 I32And "i32.and" Empty NONE;
        0x72 I32Or "i32.or" Empty NONE;
        0x73 I32Xor "i32.xor" Empty NONE;
        0x74 I32Shl "i32.shl" Empty NONE;
        0x75 I32ShrS "i32.shr_s" Empty NONE;
        0x76 I32ShrU "i32.shr_u" Empty NONE;
        0x77 I32Rotl "i32.rotl" Empty NONE;
        0x78 I32Rotr "i32.rotr" Empty NONE;
        0x79 I64Clz "i64.clz" Empty NONE;
        0x7A I64Ctz "i64.ctz" Empty NONE;
        0x7B I64Popcnt "i64.popcnt" Empty NONE;
        0x7C I64Add "i64.add" Empty NONE;
        0x7D I64Sub "i64.sub" Empty NONE;
        0x7E I64Mul "i64.mul" Empty NONE;
        0x7F I64DivS "i64.div_s" Empty NONE;
        0x80 I64DivU "i64.div_u" Empty NONE;
        0x81 I64RemS "i64.rem_s" Empty NONE;
        0x82 I64RemU "i64.rem_u" Empty NONE;
        0x83 I64And "i64.and" Empty NONE;
        0x84 I64Or "i64.or" Empty NONE;
        0x85 I64Xor "i64.xor" Empty NONE;
        0x86 I64Shl "i64.shl" Empty NONE;
        0x87 I64ShrS "i64.shr_s" Empty NONE;
        0x88 I64ShrU "i64.shr_u" Empty NONE;
        0x89 I64Rotl "i64.rotl" Empty NONE;
        0x8A I64Rotr "i64.rotr" Empty NONE;
        0x8B F32Abs "f32.abs" Empty NONE;
        0x8C F32Neg "f32.neg" Empty NONE;
        0x8D F32Ceil "f32.ceil" Empty NONE;
        0x8E F32Floor "f32.floor" Empty NONE;
        0x8F F32Trunc "f32.trunc" Empty NONE;
        0x90 F32Nearest "f32.nearest" Empty NONE;
        0x91 F32Sqrt "f32.sqrt" Empty NONE;
        0x92 F32Add "f32.add" Empty NONE;
        0x93 F32Sub "f32.sub" Empty NONE;
        0x94 F32Mul "f32.mul" Empty NONE;
        0x95 F32Div "f32.div" Empty NONE;
        0x96 F32Min "f32.min" Empty NONE;
        0x97 F32Max "f32.max" Empty NONE;
        0x98 F32Copysign "f32.copysign" Empty NONE;
        0x99 F64Abs "f64.abs" Empty NONE;
        0x9A F64Neg "f64.neg" Empty NONE;
        0x9B F64Ceil "f64.ceil" Empty NONE;
        0x9C F64Floor "f64.floor" Empty NONE;
        0x9D F64Trunc "f64.trunc" Empty NONE;
        0x9E F64Nearest "f64.nearest" Empty NONE;
        0x9F F64Sqrt "f64.sqrt" Empty NONE;
        0xA0 F64Add "f64.add" Empty NONE;
        0xA1 F64Sub "f64.sub" Empty NONE;
        0xA2 F64Mul "f64.mul" Empty NONE;
        0xA3 F64Div "f64.div" Empty NONE;
        0xA4 F64Min "f64.min" Empty NONE;
        0xA5 F64Max "f64.max" Empty NONE;
        0xA6 F64Copysign "f64.copysign" Empty NONE;
        0xA7 I32WrapI64 "i32.wrap_i64" Empty NONE;
        0xA8 I32TruncF32S "i32.trunc_f32_s" Empty NONE;
        0xA9 I32TruncF32U "i32.trunc_f32_u" Empty NONE;
        0xAA I32TruncF64S "i32.trunc_f64_s" Empty NONE;
        0xAB I32TruncF64U "i32.trunc_f64_u" Empty NONE;
        0xAC I64ExtendI32S "i64.extend_i32_s" Empty NONE;
        0xAD I64ExtendI32U "i64.extend_i32_u" Empty NONE;
        0xAE I64TruncF32S "i64.trunc_f32_s" Empty NONE;
        0xAF I64TruncF32U "i64.trunc_f32_u" Empty NONE;
        0xB0 I64TruncF64S "i64.trunc_f64_s" Empty NONE;
        0xB1 I64TruncF64U "i64.trunc_f64_u" Empty NONE;
        0xB2 F32ConvertI32S "f32.convert_i32_s" Empty NONE;
        0xB3 F32ConvertI32U "f32.convert_i32_u" Empty NONE;
        0xB4 F32ConvertI64S "f32.convert_i64_s" Empty NONE;
        0xB5 F32ConvertI64U "f32.convert_i64_u" Empty NONE;
        0xB6 F32DemoteF64 "f32.demote_f64" Empty NONE;
        0xB7 F64ConvertI32S "f64.convert_i32_s" Empty NONE;
        0xB8 F64ConvertI32U "f64.convert_i32_u" Empty NONE;
        0xB9 F64ConvertI64S "f64.convert_i64_s" Empty NONE;
        0xBA F64ConvertI64U "f64.convert_i64_u" Empty NONE;
        0xBB F64PromoteF32 "f64.promote_f32" Empty NONE;
        0xBC I32ReinterpretF32 "i32.reinterpret_f32" Empty NONE;
        0xBD I64ReinterpretF64 "i64.reinterpret_f64" Empty NONE;
        0xBE F32ReinterpretI32 "f32.reinterpret_i32" Empty NONE;
        0xBF F64ReinterpretI64 "f64.reinterpret_i64" Empty NONE;
        0xC0 I32Extend8S "i32.extend8_s" Empty SIGN_EXTENSION;
        0xC1 I32Extend16S "i32.extend16_s" Empty SIGN_EXTENSION;
        0xC2 I64Extend8S "i64.extend8_s" Empty SIGN_EXTENSION;
        0xC3 I64Extend16S "i64.extend16_s" Empty SIGN_EXTENSION;
        0xC4 I64Extend32S "i64.extend32_s" Empty SIGN_EXTENSION;
        0xD0 RefNull "ref.null" HeapType REFERENCE_TYPES;
        0xD1 RefIsNull "ref.is_null" Empty REFERENCE_TYPES;
        0xD2 RefFunc "ref.func" Index REFERENCE_TYPES;
        0xD3 RefAsNonNull "ref.as_non_null" Empty FUNCTION_REFERENCES;
        0xD4 BrOnNull "br_on_null" Index FUNCTION_REFERENCES;
        0xD5 RefEq "ref.eq" Empty GC;
        0xD6 BrOnNonNull "br_on_non_null" Index FUNCTION_REFERENCES;
    }
    prefix 0xFB {
        0x01 StructNewWithRtt "struct.new_with_rtt" Index GC;
        0x02 StructNewDefaultWithRtt "struct.new_default_with_rtt" Index GC;
        0x03 StructGet "struct.get" StructField GC;
        0x04 StructGetS "struct.get_s" StructField GC;
        0x05 StructGetU "struct.get_u" StructField GC;
        0x06 StructSet "struct.set" StructField GC;
        0x11 ArrayNewWithRtt "array.new_with_rtt" Index GC;
        0x12 ArrayNewDefaultWithRtt "array.new_default_with_rtt" Index GC;
        0x13 ArrayGet "array.get" Index GC;
        0x14 ArrayGetS "array.get_s" Index GC;
        0x15 ArrayGetU "array.get_u" Index GC;
        0x16 ArraySet "array.set" Index GC;
        0x17 ArrayLen "array.len" Index GC;
        0x20 I31New "i31.new" Empty GC;
        0x21 I31GetS "i31.get_s" Empty GC;
        0x22 I31GetU "i31.get_u" Empty GC;
        0x30 RttCanon "rtt.canon" HeapType GC;
        0x31 RttSub "rtt.sub" RttSub GC;
        0x40 RefTest "ref.test" HeapType2 GC;
        0x41 RefCast "ref.cast" HeapType2 GC;
        0x42 BrOnCast "br_on_cast" BrOnCast GC;
    }
    prefix 0xFC {
        0x00 I32TruncSatF32S "i32.trunc_sat_f32_s" Empty SATURATING_FLOAT_TO_INT;
        0x01 I32TruncSatF32U "i32.trunc_sat_f32_u" Empty SATURATING_FLOAT_TO_INT;
        0x02 I32TruncSatF64S "i32.trunc_sat_f64_s" Empty SATURATING_FLOAT_TO_INT;
        0x03 I32TruncSatF64U "i32.trunc_sat_f64_u" Empty SATURATING_FLOAT_TO_INT;
        0x04 I64TruncSatF32S "i64.trunc_sat_f32_s" Empty SATURATING_FLOAT_TO_INT;
        0x05 I64TruncSatF32U "i64.trunc_sat_f32_u" Empty SATURATING_FLOAT_TO_INT;
        0x06 I64TruncSatF64S "i64.trunc_sat_f64_s" Empty SATURATING_FLOAT_TO_INT;
        0x07 I64TruncSatF64U "i64.trunc_sat_f64_u" Empty SATURATING_FLOAT_TO_INT;
        0x08 MemoryInit "memory.init" Init BULK_MEMORY;
        0x09 DataDrop "data.drop" Index BULK_MEMORY;
        0x0A MemoryCopy "memory.copy" Copy BULK_MEMORY;
        0x0B MemoryFill "memory.fill" Index BULK_MEMORY;
        0x0C TableInit "table.init" Init BULK_MEMORY;
        0x0D ElemDrop "elem.drop" Index BULK_MEMORY;
        0x0E TableCopy "table.copy" Copy BULK_MEMORY;
        0x0F TableGrow "table.grow" Index REFERENCE_TYPES;
        0x10 TableSize "table.size" Index REFERENCE_TYPES;
        0x11 TableFill "table.fill" Index REFERENCE_TYPES;
    }
    prefix 0xFD {
        0x00 V128Load "v128.load" MemArg SIMD;
        0x01 V128Load8X8S "v128.load8x8_s" MemArg SIMD;
        0x02 V128Load8X8U "v128.load8x8_u" MemArg SIMD;
        0x03 V128Load16X4S "v128.load16x4_s" MemArg SIMD;
        0x04 V128Load16X4U "v128.load16x4_u" MemArg SIMD;
        0x05 V128Load32X2S "v128.load32x2_s" MemArg SIMD;
        0x06 V128Load32X2U "v128.load32x2_u" MemArg SIMD;
        0x07 V128Load8Splat "v128.load8_splat" MemArg SIMD;
        0x08 V128Load16Splat "v128.load16_splat" MemArg SIMD;
        0x09 V128Load32Splat "v128.load32_splat" MemArg SIMD;
        0x0A V128Load64Splat "v128.load64_splat" MemArg SIMD;
        0x0B V128Store "v128.store" MemArg SIMD;
        0x0C V128Const "v128.const" V128 SIMD;
        0x0D I8X16Shuffle "i8x16.shuffle" SimdShuffle SIMD;
        0x0E I8X16Swizzle "i8x16.swizzle" Empty SIMD;
        0x0F I8X16Splat "i8x16.splat" Empty SIMD;
        0x10 I16X8Splat "i16x8.splat" Empty SIMD;
        0x11 I32X4Splat "i32x4.splat" Empty SIMD;
        0x12 I64X2Splat "i64x2.splat" Empty SIMD;
        0x13 F32X4Splat "f32x4.splat" Empty SIMD;
        0x14 F64X2Splat "f64x2.splat" Empty SIMD;
        0x15 I8X16ExtractLaneS "i8x16.extract_lane_s" SimdLane SIMD;
        0x16 I8X16ExtractLaneU "i8x16.extract_lane_u" SimdLane SIMD;
        0x17 I8X16ReplaceLane "i8x16.replace_lane" SimdLane SIMD;
        0x18 I16X8ExtractLaneS "i16x8.extract_lane_s" SimdLane SIMD;
        0x19 I16X8ExtractLaneU "i16x8.extract_lane_u" SimdLane SIMD;
        0x1A I16X8ReplaceLane "i16x8.replace_lane" SimdLane SIMD;
        0x1B I32X4ExtractLane "i32x4.extract_lane" SimdLane SIMD;
        0x1C I32X4ReplaceLane "i32x4.replace_lane" SimdLane SIMD;
        0x1D I64X2ExtractLane "i64x2.extract_lane" SimdLane SIMD;
        0x1E I64X2ReplaceLane "i64x2.replace_lane" SimdLane SIMD;
        0x1F F32X4ExtractLane "f32x4.extract_lane" SimdLane SIMD;
        0x20 F32X4ReplaceLane "f32x4.replace_lane" SimdLane SIMD;
        0x21 F64X2ExtractLane "f64x2.extract_lane" SimdLane SIMD;
        0x22 F64X2ReplaceLane "f64x2.replace_lane" SimdLane SIMD;
        0x23 I8X16Eq "i8x16.eq" Empty SIMD;
        0x24 I8X16Ne "i8x16.ne" Empty SIMD;
        0x25 I8X16LtS "i8x16.lt_s" Empty SIMD;
        0x26 I8X16LtU "i8x16.lt_u" Empty SIMD;
        0x27 I8X16GtS "i8x16.gt_s" Empty SIMD;
        0x28 I8X16GtU "i8x16.gt_u" Empty SIMD;
        0x29 I8X16LeS "i8x16.le_s" Empty SIMD;
        0x2A I8X16LeU "i8x16.le_u" Empty SIMD;
        0x2B I8X16GeS "i8x16.ge_s" Empty SIMD;
        0x2C I8X16GeU "i8x16.ge_u" Empty SIMD;
        0x2D I16X8Eq "i16x8.eq" Empty SIMD;
        0x2E I16X8Ne "i16x8.ne" Empty SIMD;
        0x2F I16X8LtS "i16x8.lt_s" Empty SIMD;
        0x30 I16X8LtU "i16x8.lt_u" Empty SIMD;
        0x31 I16X8GtS "i16x8.gt_s" Empty SIMD;
        0x32 I16X8GtU "i16x8.gt_u" Empty SIMD;
        0x33 I16X8LeS "i16x8.le_s" Empty SIMD;
        0x34 I16X8LeU "i16x8.le_u" Empty SIMD;
        0x35 I16X8GeS "i16x8.ge_s" Empty SIMD;
        0x36 I16X8GeU "i16x8.ge_u" Empty SIMD;
        0x37 I32X4Eq "i32x4.eq" Empty SIMD;
        0x38 I32X4Ne "i32x4.ne" Empty SIMD;
        0x39 I32X4LtS "i32x4.lt_s" Empty SIMD;
        0x3A I32X4LtU "i32x4.lt_u" Empty SIMD;
        0x3B I32X4GtS "i32x4.gt_s" Empty SIMD;
        0x3C I32X4GtU "i32x4.gt_u" Empty SIMD;
        0x3D I32X4LeS "i32x4.le_s" Empty SIMD;
        0x3E I32X4LeU "i32x4.le_u" Empty SIMD;
        0x3F I32X4GeS "i32x4.ge_s" Empty SIMD;
        0x40 I32X4GeU "i32x4.ge_u" Empty SIMD;
        0x41 F32X4Eq "f32x4.eq" Empty SIMD;
        0x42 F32X4Ne "f32x4.ne" Empty SIMD;
        0x43 F32X4Lt "f32x4.lt" Empty SIMD;
        0x44 F32X4Gt "f32x4.gt" Empty SIMD;
        0x45 F32X4Le "f32x4.le" Empty SIMD;
        0x46 F32X4Ge "f32x4.ge" Empty SIMD;
        0x47 F64X2Eq "f64x2.eq" Empty SIMD;
        0x48 F64X2Ne "f64x2.ne" Empty SIMD;
        0x49 F64X2Lt "f64x2.lt" Empty SIMD;
        0x4A F64X2Gt "f64x2.gt" Empty SIMD;
        0x4B F64X2Le "f64x2.le" Empty SIMD;
        0x4C F64X2Ge "f64x2.ge" Empty SIMD;
        0x4D V128Not "v128.not" Empty SIMD;
        0x4E V128And "v128.and" Empty SIMD;
        0x4F V128Andnot "v128.andnot" Empty SIMD;
        0x50 V128Or "v128.or" Empty SIMD;
        0x51 V128Xor "v128.xor" Empty SIMD;
        0x52 V128Bitselect "v128.bitselect" Empty SIMD;
        0x53 V128AnyTrue "v128.any_true" Empty SIMD;
        0x54 V128Load8Lane "v128.load8_lane" SimdMemoryLane SIMD;
        0x55 V128Load16Lane "v128.load16_lane" SimdMemoryLane SIMD;
        0x56 V128Load32Lane "v128.load32_lane" SimdMemoryLane SIMD;
        0x57 V128Load64Lane "v128.load64_lane" SimdMemoryLane SIMD;
        0x58 V128Store8Lane "v128.store8_lane" SimdMemoryLane SIMD;
        0x59 V128Store16Lane "v128.store16_lane" SimdMemoryLane SIMD;
        0x5A V128Store32Lane "v128.store32_lane" SimdMemoryLane SIMD;
        0x5B V128Store64Lane "v128.store64_lane" SimdMemoryLane SIMD;
        0x5C V128Load32Zero "v128.load32_zero" MemArg SIMD;
        0x5D V128Load64Zero "v128.load64_zero" MemArg SIMD;
        0x5E F32X4DemoteF64X2Zero "f32x4.demote_f64x2_zero" Empty SIMD;
        0x5F F64X2PromoteLowF32X4 "f64x2.promote_low_f32x4" Empty SIMD;
        0x60 I8X16Abs "i8x16.abs" Empty SIMD;
        0x61 I8X16Neg "i8x16.neg" Empty SIMD;
        0x62 I8X16Popcnt "i8x16.popcnt" Empty SIMD;
        0x63 I8X16AllTrue "i8x16.all_true" Empty SIMD;
        0x64 I8X16Bitmask "i8x16.bitmask" Empty SIMD;
        0x65 I8X16NarrowI16X8S "i8x16.narrow_i16x8_s" Empty SIMD;
        0x66 I8X16NarrowI16X8U "i8x16.narrow_i16x8_u" Empty SIMD;
        0x67 F32X4Ceil "f32x4.ceil" Empty SIMD;
        0x68 F32X4Floor "f32x4.floor" Empty SIMD;
        0x69 F32X4Trunc "f32x4.trunc" Empty SIMD;
        0x6A F32X4Nearest "f32x4.nearest" Empty SIMD;
        0x6B I8X16Shl "i8x16.shl" Empty SIMD;
        0x6C I8X16ShrS "i8x16.shr_s" Empty SIMD;
        0x6D I8X16ShrU "i8x16.shr_u" Empty SIMD;
        0x6E I8X16Add "i8x16.add" Empty SIMD;
        0x6F I8X16AddSatS "i8x16.add_sat_s" Empty SIMD;
        0x70 I8X16AddSatU "i8x16.add_sat_u" Empty SIMD;
        0x71 I8X16Sub "i8x16.sub" Empty SIMD;
        0x72 I8X16SubSatS "i8x16.sub_sat_s" Empty SIMD;
        0x73 I8X16SubSatU "i8x16.sub_sat_u" Empty SIMD;
        0x74 F64X2Ceil "f64x2.ceil" Empty SIMD;
        0x75 F64X2Floor "f64x2.floor" Empty SIMD;
        0x76 I8X16MinS "i8x16.min_s" Empty SIMD;
        0x77 I8X16MinU "i8x16.min_u" Empty SIMD;
        0x78 I8X16MaxS "i8x16.max_s" Empty SIMD;
        0x79 I8X16MaxU "i8x16.max_u" Empty SIMD;
        0x7A F64X2Trunc "f64x2.trunc" Empty SIMD;
        0x7B I8X16AvgrU "i8x16.avgr_u" Empty SIMD;
        0x7C I16X8ExtaddPairwiseI8X16S "i16x8.extadd_pairwise_i8x16_s" Empty SIMD;
        0x7D I16X8ExtaddPairwiseI8X16U "i16x8.extadd_pairwise_i8x16_u" Empty SIMD;
        0x7E I32X4ExtaddPairwiseI16X8S "i32x4.extadd_pairwise_i16x8_s" Empty SIMD;
        0x7F I32X4ExtaddPairwiseI16X8U "i32x4.extadd_pairwise_i16x8_u" Empty SIMD;
        0x80 I16X8Abs "i16x8.abs" Empty SIMD;
        0x81 I16X8Neg "i16x8.neg" Empty SIMD;
        0x82 I16X8Q15MulrSatS "i16x8.q15mulr_sat_s" Empty SIMD;
        0x83 I16X8AllTrue "i16x8.all_true" Empty SIMD;
        0x84 I16X8Bitmask "i16x8.bitmask" Empty SIMD;
        0x85 I16X8NarrowI32X4S "i16x8.narrow_i32x4_s" Empty SIMD;
        0x86 I16X8NarrowI32X4U "i16x8.narrow_i32x4_u" Empty SIMD;
        0x87 I16X8ExtendLowI8X16S "i16x8.extend_low_i8x16_s" Empty SIMD;
        0x88 I16X8ExtendHighI8X16S "i16x8.extend_high_i8x16_s" Empty SIMD;
        0x89 I16X8ExtendLowI8X16U "i16x8.extend_low_i8x16_u" Empty SIMD;
        0x8A I16X8ExtendHighI8X16U "i16x8.extend_high_i8x16_u" Empty SIMD;
        0x8B I16X8Shl "i16x8.shl" Empty SIMD;
        0x8C I16X8ShrS "i16x8.shr_s" Empty SIMD;
        0x8D I16X8ShrU "i16x8.shr_u" Empty SIMD;
        0x8E I16X8Add "i16x8.add" Empty SIMD;
        0x8F I16X8AddSatS "i16x8.add_sat_s" Empty SIMD;
        0x90 I16X8AddSatU "i16x8.add_sat_u" Empty SIMD;
        0x91 I16X8Sub "i16x8.sub" Empty SIMD;
        0x92 I16X8SubSatS "i16x8.sub_sat_s" Empty SIMD;
        0x93 I16X8SubSatU "i16x8.sub_sat_u" Empty SIMD;
        0x94 F64X2Nearest "f64x2.nearest" Empty SIMD;
        0x95 I16X8Mul "i16x8.mul" Empty SIMD;
        0x96 I16X8MinS "i16x8.min_s" Empty SIMD;
        0x97 I16X8MinU "i16x8.min_u" Empty SIMD;
        0x98 I16X8MaxS "i16x8.max_s" Empty SIMD;
        0x99 I16X8MaxU "i16x8.max_u" Empty SIMD;
        0x9B I16X8AvgrU "i16x8.avgr_u" Empty SIMD;
        0x9C I16X8ExtmulLowI8X16S "i16x8.extmul_low_i8x16_s" Empty SIMD;
        0x9D I16X8ExtmulHighI8X16S "i16x8.extmul_high_i8x16_s" Empty SIMD;
        0x9E I16X8ExtmulLowI8X16U "i16x8.extmul_low_i8x16_u" Empty SIMD;
        0x9F I16X8ExtmulHighI8X16U "i16x8.extmul_high_i8x16_u" Empty SIMD;
        0xA0 I32X4Abs "i32x4.abs" Empty SIMD;
        0xA1 I32X4Neg "i32x4.neg" Empty SIMD;
        0xA3 I32X4AllTrue "i32x4.all_true" Empty SIMD;
        0xA4 I32X4Bitmask "i32x4.bitmask" Empty SIMD;
        0xA7 I32X4ExtendLowI16X8S "i32x4.extend_low_i16x8_s" Empty SIMD;
        0xA8 I32X4ExtendHighI16X8S "i32x4.extend_high_i16x8_s" Empty SIMD;
        0xA9 I32X4ExtendLowI16X8U "i32x4.extend_low_i16x8_u" Empty SIMD;
        0xAA I32X4ExtendHighI16X8U "i32x4.extend_high_i16x8_u" Empty SIMD;
        0xAB I32X4Shl "i32x4.shl" Empty SIMD;
        0xAC I32X4ShrS "i32x4.shr_s" Empty SIMD;
        0xAD I32X4ShrU "i32x4.shr_u" Empty SIMD;
        0xAE I32X4Add "i32x4.add" Empty SIMD;
        0xB1 I32X4Sub "i32x4.sub" Empty SIMD;
        0xB5 I32X4Mul "i32x4.mul" Empty SIMD;
        0xB6 I32X4MinS "i32x4.min_s" Empty SIMD;
        0xB7 I32X4MinU "i32x4.min_u" Empty SIMD;
        0xB8 I32X4MaxS "i32x4.max_s" Empty SIMD;
        0xB9 I32X4MaxU "i32x4.max_u" Empty SIMD;
        0xBA I32X4DotI16X8S "i32x4.dot_i16x8_s" Empty SIMD;
        0xBC I32X4ExtmulLowI16X8S "i32x4.extmul_low_i16x8_s" Empty SIMD;
        0xBD I32X4ExtmulHighI16X8S "i32x4.extmul_high_i16x8_s" Empty SIMD;
        0xBE I32X4ExtmulLowI16X8U "i32x4.extmul_low_i16x8_u" Empty SIMD;
        0xBF I32X4ExtmulHighI16X8U "i32x4.extmul_high_i16x8_u" Empty SIMD;
        0xC0 I64X2Abs "i64x2.abs" Empty SIMD;
        0xC1 I64X2Neg "i64x2.neg" Empty SIMD;
        0xC3 I64X2AllTrue "i64x2.all_true" Empty SIMD;
        0xC4 I64X2Bitmask "i64x2.bitmask" Empty SIMD;
        0xC7 I64X2ExtendLowI32X4S "i64x2.extend_low_i32x4_s" Empty SIMD;
        0xC8 I64X2ExtendHighI32X4S "i64x2.extend_high_i32x4_s" Empty SIMD;
        0xC9 I64X2ExtendLowI32X4U "i64x2.extend_low_i32x4_u" Empty SIMD;
        0xCA I64X2ExtendHighI32X4U "i64x2.extend_high_i32x4_u" Empty SIMD;
        0xCB I64X2Shl "i64x2.shl" Empty SIMD;
        0xCC I64X2ShrS "i64x2.shr_s" Empty SIMD;
        0xCD I64X2ShrU "i64x2.shr_u" Empty SIMD;
        0xCE I64X2Add "i64x2.add" Empty SIMD;
        0xD1 I64X2Sub "i64x2.sub" Empty SIMD;
        0xD5 I64X2Mul "i64x2.mul" Empty SIMD;
        0xD6 I64X2Eq "i64x2.eq" Empty SIMD;
        0xD7 I64X2Ne "i64x2.ne" Empty SIMD;
        0xD8 I64X2LtS "i64x2.lt_s" Empty SIMD;
        0xD9 I64X2GtS "i64x2.gt_s" Empty SIMD;
        0xDA I64X2LeS "i64x2.le_s" Empty SIMD;
        0xDB I64X2GeS "i64x2.ge_s" Empty SIMD;
        0xDC I64X2ExtmulLowI32X4S "i64x2.extmul_low_i32x4_s" Empty SIMD;
        0xDD I64X2ExtmulHighI32X4S "i64x2.extmul_high_i32x4_s" Empty SIMD;
        0xDE I64X2ExtmulLowI32X4U "i64x2.extmul_low_i32x4_u" Empty SIMD;
        0xDF I64X2ExtmulHighI32X4U "i64x2.extmul_high_i32x4_u" Empty SIMD;
        0xE0 F32X4Abs "f32x4.abs" Empty SIMD;
        0xE1 F32X4Neg "f32x4.neg" Empty SIMD;
        0xE3 F32X4Sqrt "f32x4.sqrt" Empty SIMD;
        0xE4 F32X4Add "f32x4.add" Empty SIMD;
        0xE5 F32X4Sub "f32x4.sub" Empty SIMD;
        0xE6 F32X4Mul "f32x4.mul" Empty SIMD;
        0xE7 F32X4Div "f32x4.div" Empty SIMD;
        0xE8 F32X4Min "f32x4.min" Empty SIMD;
        0xE9 F32X4Max "f32x4.max" Empty SIMD;
        0xEA F32X4Pmin "f32x4.pmin" Empty SIMD;
        0xEB F32X4Pmax "f32x4.pmax" Empty SIMD;
        0xEC F64X2Abs "f64x2.abs" Empty SIMD;
        0xED F64X2Neg "f64x2.neg" Empty SIMD;
        0xEF F64X2Sqrt "f64x2.sqrt" Empty SIMD;
        0xF0 F64X2Add "f64x2.add" Empty SIMD;
        0xF1 F64X2Sub "f64x2.sub" Empty SIMD;
        0xF2 F64X2Mul "f64x2.mul" Empty SIMD;
        0xF3 F64X2Div "f64x2.div" Empty SIMD;
        0xF4 F64X2Min "f64x2.min" Empty SIMD;
        0xF5 F64X2Max "f64x2.max" Empty SIMD;
        0xF6 F64X2Pmin "f64x2.pmin" Empty SIMD;
        0xF7 F64X2Pmax "f64x2.pmax" Empty SIMD;
        0xF8 I32X4TruncSatF32X4S "i32x4.trunc_sat_f32x4_s" Empty SIMD;
        0xF9 I32X4TruncSatF32X4U "i32x4.trunc_sat_f32x4_u" Empty SIMD;
        0xFA F32X4ConvertI32X4S "f32x4.convert_i32x4_s" Empty SIMD;
        0xFB F32X4ConvertI32X4U "f32x4.convert_i32x4_u" Empty SIMD;
        0xFC I32X4TruncSatF64X2SZero "i32x4.trunc_sat_f64x2_s_zero" Empty SIMD;
        0xFD I32X4TruncSatF64X2UZero "i32x4.trunc_sat_f64x2_u_zero" Empty SIMD;
        0xFE F64X2ConvertLowI32X4S "f64x2.convert_low_i32x4_s" Empty SIMD;
        0xFF F64X2ConvertLowI32X4U "f64x2.convert_low_i32x4_u" Empty SIMD;
    }
    prefix 0xFE {
        0x00 MemoryAtomicNotify "memory.atomic.notify" MemArg THREADS;
        0x01 MemoryAtomicWait32 "memory.atomic.wait32" MemArg THREADS;
        0x02 MemoryAtomicWait64 "memory.atomic.wait64" MemArg THREADS;
        0x03 AtomicFence "atomic.fence" Empty THREADS;
        0x10 I32AtomicLoad "i32.atomic.load" MemArg THREADS;
        0x11 I64AtomicLoad "i64.atomic.load" MemArg THREADS;
        0x12 I32AtomicLoad8U "i32.atomic.load8_u" MemArg THREADS;
        0x13 I32AtomicLoad16U "i32.atomic.load16_u" MemArg THREADS;
        0x14 I64AtomicLoad8U "i64.atomic.load8_u" MemArg THREADS;
        0x15 I64AtomicLoad16U "i64.atomic.load16_u" MemArg THREADS;
        0x16 I64AtomicLoad32U "i64.atomic.load32_u" MemArg THREADS;
        0x17 I32AtomicStore "i32.atomic.store" MemArg THREADS;
        0x18 I64AtomicStore "i64.atomic.store" MemArg THREADS;
        0x19 I32AtomicStore8 "i32.atomic.store8" MemArg THREADS;
        0x1A I32AtomicStore16 "i32.atomic.store16" MemArg THREADS;
        0x1B I64AtomicStore8 "i64.atomic.store8" MemArg THREADS;
        0x1C I64AtomicStore16 "i64.atomic.store16" MemArg THREADS;
        0x1D I64AtomicStore32 "i64.atomic.store32" MemArg THREADS;
        0x1E I32AtomicRmwAdd "i32.atomic.rmw.add" MemArg THREADS;
        0x1F I64AtomicRmwAdd "i64.atomic.rmw.add" MemArg THREADS;
        0x20 I32AtomicRmw8AddU "i32.atomic.rmw8.add_u" MemArg THREADS;
        0x21 I32AtomicRmw16AddU "i32.atomic.rmw16.add_u" MemArg THREADS;
        0x22 I64AtomicRmw8AddU "i64.atomic.rmw8.add_u" MemArg THREADS;
        0x23 I64AtomicRmw16AddU "i64.atomic.rmw16.add_u" MemArg THREADS;
        0x24 I64AtomicRmw32AddU "i64.atomic.rmw32.add_u" MemArg THREADS;
        0x25 I32AtomicRmwSub "i32.atomic.rmw.sub" MemArg THREADS;
        0x26 I64AtomicRmwSub "i64.atomic.rmw.sub" MemArg THREADS;
        0x27 I32AtomicRmw8SubU "i32.atomic.rmw8.sub_u" MemArg THREADS;
        0x28 I32AtomicRmw16SubU "i32.atomic.rmw16.sub_u" MemArg THREADS;
        0x29 I64AtomicRmw8SubU "i64.atomic.rmw8.sub_u" MemArg THREADS;
        0x2A I64AtomicRmw16SubU "i64.atomic.rmw16.sub_u" MemArg THREADS;
        0x2B I64AtomicRmw32SubU "i64.atomic.rmw32.sub_u" MemArg THREADS;
        0x2C I32AtomicRmwAnd "i32.atomic.rmw.and" MemArg THREADS;
        0x2D I64AtomicRmwAnd "i64.atomic.rmw.and" MemArg THREADS;
        0x2E I32AtomicRmw8AndU "i32.atomic.rmw8.and_u" MemArg THREADS;
        0x2F I32AtomicRmw16AndU "i32.atomic.rmw16.and_u" MemArg THREADS;
        0x30 I64AtomicRmw8AndU "i64.atomic.rmw8.and_u" MemArg THREADS;
        0x31 I64AtomicRmw16AndU "i64.atomic.rmw16.and_u" MemArg THREADS;
        0x32 I64AtomicRmw32AndU "i64.atomic.rmw32.and_u" MemArg THREADS;
        0x33 I32AtomicRmwOr "i32.atomic.rmw.or" MemArg THREADS;
        0x34 I64AtomicRmwOr "i64.atomic.rmw.or" MemArg THREADS;
        0x35 I32AtomicRmw8OrU "i32.atomic.rmw8.or_u" MemArg THREADS;
        0x36 I32AtomicRmw16OrU "i32.atomic.rmw16.or_u" MemArg THREADS;
        0x37 I64AtomicRmw8OrU "i64.atomic.rmw8.or_u" MemArg THREADS;
        0x38 I64AtomicRmw16OrU "i64.atomic.rmw16.or_u" MemArg THREADS;
        0x39 I64AtomicRmw32OrU "i64.atomic.rmw32.or_u" MemArg THREADS;
        0x3A I32AtomicRmwXor "i32.atomic.rmw.xor" MemArg THREADS;
        0x3B I64AtomicRmwXor "i64.atomic.rmw.xor" MemArg THREADS;
        0x3C I32AtomicRmw8XorU "i32.atomic.rmw8.xor_u" MemArg THREADS;
        0x3D I32AtomicRmw16XorU "i32.atomic.rmw16.xor_u" MemArg THREADS;
        0x3E I64AtomicRmw8XorU "i64.atomic.rmw8.xor_u" MemArg THREADS;
        0x3F I64AtomicRmw16XorU "i64.atomic.rmw16.xor_u" MemArg THREADS;
        0x40 I64AtomicRmw32XorU "i64.atomic.rmw32.xor_u" MemArg THREADS;
        0x41 I32AtomicRmwXchg "i32.atomic.rmw.xchg" MemArg THREADS;
        0x42 I64AtomicRmwXchg "i64.atomic.rmw.xchg" MemArg THREADS;
        0x43 I32AtomicRmw8XchgU "i32.atomic.rmw8.xchg_u" MemArg THREADS;
        0x44 I32AtomicRmw16XchgU "i32.atomic.rmw16.xchg_u" MemArg THREADS;
        0x45 I64AtomicRmw8XchgU "i64.atomic.rmw8.xchg_u" MemArg THREADS;
        0x46 I64AtomicRmw16XchgU "i64.atomic.rmw16.xchg_u" MemArg THREADS;
        0x47 I64AtomicRmw32XchgU "i64.atomic.rmw32.xchg_u" MemArg THREADS;
        0x48 I32AtomicRmwCmpxchg "i32.atomic.rmw.cmpxchg" MemArg THREADS;
        0x49 I64AtomicRmwCmpxchg "i64.atomic.rmw.cmpxchg" MemArg THREADS;
        0x4A I32AtomicRmw8CmpxchgU "i32.atomic.rmw8.cmpxchg_u" MemArg THREADS;
        0x4B I32AtomicRmw16CmpxchgU "i32.atomic.rmw16.cmpxchg_u" MemArg THREADS;
        0x4C I64AtomicRmw8CmpxchgU "i64.atomic.rmw8.cmpxchg_u" MemArg THREADS;
        0x4D I64AtomicRmw16CmpxchgU "i64.atomic.rmw16.cmpxchg_u" MemArg THREADS;
        0x4E I64AtomicRmw32CmpxchgU "i64.atomic.rmw32.cmpxchg_u" MemArg THREADS;
    }
}

impl Opcode {
    /// Opens a new control frame.
    pub fn is_block_start(self) -> bool {
        matches!(
            self,
            Opcode::Block | Opcode::Loop | Opcode::If | Opcode::Try | Opcode::Let
        )
    }

    /// Natural alignment of a memory-access opcode, `None` otherwise.
    /// The text format defaults `align=` to this, and the validator
    /// bounds explicit alignments by it.
    pub fn natural_alignment_log2(self) -> Option<u32> {
        if let Some((align, _, _)) = load_shape(self) {
            return Some(align);
        }
        if let Some((align, _, _)) = store_shape(self) {
            return Some(align);
        }
        if let Some((align, _)) = rmw_shape(self) {
            return Some(align);
        }
        if let Some((align, _)) = cmpxchg_shape(self) {
            return Some(align);
        }
        match self {
            Opcode::MemoryAtomicNotify | Opcode::MemoryAtomicWait32 => Some(2),
            Opcode::MemoryAtomicWait64 => Some(3),
            _ => {
                let (align, _) = simd_lane_memop(self)?;
                Some(align)
            }
        }
    }
}

/// `(natural alignment, loaded type, atomic)` for plain and atomic
/// loads, including the widening and splatting simd forms.
pub fn load_shape(op: Opcode) -> Option<(u32, ValueType, bool)> {
    use Opcode::*;
    use ValueType as V;
    Some(match op {
        I32Load => (2, V::I32, false),
        I64Load => (3, V::I64, false),
        F32Load => (2, V::F32, false),
        F64Load => (3, V::F64, false),
        I32Load8S | I32Load8U => (0, V::I32, false),
        I32Load16S | I32Load16U => (1, V::I32, false),
        I64Load8S | I64Load8U => (0, V::I64, false),
        I64Load16S | I64Load16U => (1, V::I64, false),
        I64Load32S | I64Load32U => (2, V::I64, false),
        V128Load => (4, V::V128, false),
        V128Load8X8S | V128Load8X8U | V128Load16X4S | V128Load16X4U | V128Load32X2S
        | V128Load32X2U | V128Load64Splat => (3, V::V128, false),
        V128Load8Splat => (0, V::V128, false),
        V128Load16Splat => (1, V::V128, false),
        V128Load32Splat | V128Load32Zero => (2, V::V128, false),
        V128Load64Zero => (3, V::V128, false),
        I32AtomicLoad => (2, V::I32, true),
        I64AtomicLoad => (3, V::I64, true),
        I32AtomicLoad8U => (0, V::I32, true),
        I32AtomicLoad16U => (1, V::I32, true),
        I64AtomicLoad8U => (0, V::I64, true),
        I64AtomicLoad16U => (1, V::I64, true),
        I64AtomicLoad32U => (2, V::I64, true),
        _ => return None,
    })
}

/// `(natural alignment, stored type, atomic)` for stores.
pub fn store_shape(op: Opcode) -> Option<(u32, ValueType, bool)> {
    use Opcode::*;
    use ValueType as V;
    Some(match op {
        I32Store => (2, V::I32, false),
        I64Store => (3, V::I64, false),
        F32Store => (2, V::F32, false),
        F64Store => (3, V::F64, false),
        I32Store8 => (0, V::I32, false),
        I32Store16 => (1, V::I32, false),
        I64Store8 => (0, V::I64, false),
        I64Store16 => (1, V::I64, false),
        I64Store32 => (2, V::I64, false),
        V128Store => (4, V::V128, false),
        I32AtomicStore => (2, V::I32, true),
        I64AtomicStore => (3, V::I64, true),
        I32AtomicStore8 => (0, V::I32, true),
        I32AtomicStore16 => (1, V::I32, true),
        I64AtomicStore8 => (0, V::I64, true),
        I64AtomicStore16 => (1, V::I64, true),
        I64AtomicStore32 => (2, V::I64, true),
        _ => return None,
    })
}

/// `(natural alignment, operand type)` for the single-operand atomic
/// read-modify-write family.
pub fn rmw_shape(op: Opcode) -> Option<(u32, ValueType)> {
    use Opcode::*;
    use ValueType as V;
    Some(match op {
        I32AtomicRmwAdd | I32AtomicRmwSub | I32AtomicRmwAnd | I32AtomicRmwOr
        | I32AtomicRmwXor | I32AtomicRmwXchg => (2, V::I32),
        I64AtomicRmwAdd | I64AtomicRmwSub | I64AtomicRmwAnd | I64AtomicRmwOr
        | I64AtomicRmwXor | I64AtomicRmwXchg => (3, V::I64),
        I32AtomicRmw8AddU | I32AtomicRmw8SubU | I32AtomicRmw8AndU | I32AtomicRmw8OrU
        | I32AtomicRmw8XorU | I32AtomicRmw8XchgU => (0, V::I32),
        I32AtomicRmw16AddU | I32AtomicRmw16SubU | I32AtomicRmw16AndU | I32AtomicRmw16OrU
        | I32AtomicRmw16XorU | I32AtomicRmw16XchgU => (1, V::I32),
        I64AtomicRmw8AddU | I64AtomicRmw8SubU | I64AtomicRmw8AndU | I64AtomicRmw8OrU
        | I64AtomicRmw8XorU | I64AtomicRmw8XchgU => (0, V::I64),
        I64AtomicRmw16AddU | I64AtomicRmw16SubU | I64AtomicRmw16AndU | I64AtomicRmw16OrU
        | I64AtomicRmw16XorU | I64AtomicRmw16XchgU => (1, V::I64),
        I64AtomicRmw32AddU | I64AtomicRmw32SubU | I64AtomicRmw32AndU | I64AtomicRmw32OrU
        | I64AtomicRmw32XorU | I64AtomicRmw32XchgU => (2, V::I64),
        _ => return None,
    })
}

pub fn cmpxchg_shape(op: Opcode) -> Option<(u32, ValueType)> {
    use Opcode::*;
    use ValueType as V;
    Some(match op {
        I32AtomicRmwCmpxchg => (2, V::I32),
        I64AtomicRmwCmpxchg => (3, V::I64),
        I32AtomicRmw8CmpxchgU => (0, V::I32),
        I32AtomicRmw16CmpxchgU => (1, V::I32),
        I64AtomicRmw8CmpxchgU => (0, V::I64),
        I64AtomicRmw16CmpxchgU => (1, V::I64),
        I64AtomicRmw32CmpxchgU => (2, V::I64),
        _ => return None,
    })
}

/// `(natural alignment, lane count)` for the per-lane simd memory
/// accesses.
pub fn simd_lane_memop(op: Opcode) -> Option<(u32, u8)> {
    use Opcode::*;
    Some(match op {
        V128Load8Lane | V128Store8Lane => (0, 16),
        V128Load16Lane | V128Store16Lane => (1, 8),
        V128Load32Lane | V128Store32Lane => (2, 4),
        V128Load64Lane | V128Store64Lane => (3, 2),
        _ => return None,
    })
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_matches_encoding() {
        for op in [
            Opcode::Unreachable,
            Opcode::I32Add,
            Opcode::MemoryInit,
            Opcode::V128Load,
            Opcode::I64AtomicRmw32CmpxchgU,
            Opcode::BrOnCast,
        ] {
            let (prefix, code) = op.encoding();
            assert_eq!(Opcode::decode(prefix, code), Some(op));
        }
        assert_eq!(Opcode::decode(None, 0xFF), None);
        assert_eq!(Opcode::decode(Some(0xFC), 0x7F), None);
    }

    #[test]
    fn immediate_kind_is_total() {
        assert_eq!(Opcode::I32Const.immediate_kind(), ImmediateKind::S32);
        assert_eq!(Opcode::BrTable.immediate_kind(), ImmediateKind::BrTable);
        assert_eq!(
            Opcode::V128Load8Lane.immediate_kind(),
            ImmediateKind::SimdMemoryLane
        );
        assert_eq!(Opcode::Let.immediate_kind(), ImmediateKind::Let);
    }

    #[test]
    fn feature_gating() {
        assert!(Opcode::I32Add.is_enabled(Features::mvp()));
        assert!(!Opcode::MemoryInit.is_enabled(Features::mvp()));
        assert!(Opcode::MemoryInit.is_enabled(Features::standard()));
        assert!(!Opcode::V128Load.is_enabled(Features::standard()));
    }

    #[test]
    fn mnemonic_lookup_prefers_plain_select() {
        assert_eq!(Opcode::from_mnemonic("select"), Some(Opcode::Select));
        assert_eq!(Opcode::from_mnemonic("i32.add"), Some(Opcode::I32Add));
        assert_eq!(Opcode::from_mnemonic("bogus"), None);
    }
}
