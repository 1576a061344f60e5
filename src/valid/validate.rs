//! The module and function-body type checker.

use std::collections::HashSet;

use crate::binary::{
    Code, ConstantExpression, DataMode, ElementInit, ImportDesc, Module, SegmentMode,
};
use crate::errors::Errors;
use crate::features::Features;
use crate::span::{At, Location};
use crate::types::*;
use crate::valid::{to_stack_types, Label, LabelKind, StackType};

/// Validate a whole module. Returns false if any diagnostic was
/// reported; the sink receives every error, not just the first.
pub fn validate_module(
    module: &Module,
    features: Features,
    errors: &mut dyn Errors,
) -> bool {
    let mut validator = Validator::new(module, features, errors);
    validator.run();
    validator.ok
}

struct Validator<'a, 'e> {
    features: Features,
    errors: &'e mut dyn Errors,
    module: &'a Module,
    ok: bool,

    // Module context, imports first in every index space.
    functions: Vec<Index>,
    tables: Vec<TableType>,
    memories: Vec<MemoryType>,
    globals: Vec<GlobalType>,
    tags: Vec<TagType>,
    imported_function_count: u32,
    imported_global_count: u32,
    element_segment_types: Vec<ReferenceType>,
    declared_functions: HashSet<Index>,

    // Function context.
    locals: Vec<ValueType>,
    label_stack: Vec<Label>,
    operand_stack: Vec<StackType>,
}

impl<'a, 'e> Validator<'a, 'e> {
    fn new(module: &'a Module, features: Features, errors: &'e mut dyn Errors) -> Self {
        Validator {
            features,
            errors,
            module,
            ok: true,
            functions: Vec::new(),
            tables: Vec::new(),
            memories: Vec::new(),
            globals: Vec::new(),
            tags: Vec::new(),
            imported_function_count: 0,
            imported_global_count: 0,
            element_segment_types: Vec::new(),
            declared_functions: HashSet::new(),
            locals: Vec::new(),
            label_stack: Vec::new(),
            operand_stack: Vec::new(),
        }
    }

    fn error(&mut self, loc: Location, message: impl Into<String>) {
        self.ok = false;
        self.errors.on_error(loc, message.into());
    }

    fn run(&mut self) {
        self.check_types();
        self.collect_imports();
        self.collect_definitions();

        self.check_globals();
        self.check_element_segments();
        self.check_data_segments();
        self.check_exports();
        self.check_start();
        self.check_codes();
    }

    // -- module context ----------------------------------------------------

    fn function_type(&self, type_index: Index) -> Option<&'a FunctionType> {
        self.module
            .types
            .get(type_index as usize)
            .and_then(|t| t.as_function_type())
            .map(|ft| &ft.value)
    }

    fn check_function_type_index(&mut self, index: At<Index>) -> bool {
        if self.function_type(index.value).is_none() {
            self.error(index.loc, format!("unknown type {}", index.value));
            return false;
        }
        true
    }

    fn check_types(&mut self) {
        for ty in &self.module.types {
            if let DefinedType::Func(ft) = &ty.value {
                if ft.results.len() > 1 && !self.features.contains(Features::MULTI_VALUE) {
                    self.error(
                        ft.loc,
                        format!(
                            "multiple results require multi-value: got {}",
                            ft.results.len()
                        ),
                    );
                }
            }
        }
    }

    fn check_table_type(&mut self, ty: &At<TableType>) {
        let limits = &ty.limits;
        if let Some(max) = limits.max {
            if max < limits.min {
                self.error(
                    limits.loc,
                    format!("table max {} must be >= min {}", max, limits.min),
                );
            }
        }
    }

    fn check_memory_type(&mut self, ty: &At<MemoryType>) {
        let limits = &ty.limits;
        let page_limit: u64 = if limits.index_type == IndexType::I64 {
            1 << 48
        } else {
            1 << 16
        };
        if limits.min > page_limit {
            self.error(
                limits.loc,
                format!("memory min {} exceeds page limit {}", limits.min, page_limit),
            );
        }
        if let Some(max) = limits.max {
            if max < limits.min {
                self.error(
                    limits.loc,
                    format!("memory max {} must be >= min {}", max, limits.min),
                );
            }
            if max > page_limit {
                self.error(
                    limits.loc,
                    format!("memory max {} exceeds page limit {}", max, page_limit),
                );
            }
        } else if limits.shared {
            self.error(limits.loc, "shared memory must have a max size");
        }
    }

    fn check_tag_type(&mut self, ty: &At<TagType>) {
        if !self.check_function_type_index(ty.type_index) {
            return;
        }
        if let Some(ft) = self.function_type(ty.type_index.value) {
            if !ft.results.is_empty() {
                self.error(ty.type_index.loc, "tag results must be empty");
            }
        }
    }

    fn collect_imports(&mut self) {
        for import in &self.module.imports {
            match &import.desc {
                ImportDesc::Function(type_index) => {
                    self.check_function_type_index(*type_index);
                    self.functions.push(type_index.value);
                    self.imported_function_count += 1;
                }
                ImportDesc::Table(ty) => {
                    self.check_table_type(ty);
                    self.tables.push(ty.value);
                }
                ImportDesc::Memory(ty) => {
                    self.check_memory_type(ty);
                    self.memories.push(ty.value);
                }
                ImportDesc::Global(ty) => {
                    if ty.mutability.value == Mutability::Var
                        && !self.features.contains(Features::MUTABLE_GLOBALS)
                    {
                        self.error(ty.loc, "mutable globals cannot be imported");
                    }
                    self.globals.push(ty.value);
                    self.imported_global_count += 1;
                }
                ImportDesc::Tag(ty) => {
                    self.check_tag_type(ty);
                    self.tags.push(ty.value);
                }
            }
        }
    }

    fn collect_definitions(&mut self) {
        for function in &self.module.functions {
            self.check_function_type_index(function.type_index);
            self.functions.push(function.type_index.value);
        }
        for table in &self.module.tables {
            let ty = table.ty;
            self.check_table_type(&ty);
            self.tables.push(ty.value);
        }
        for memory in &self.module.memories {
            let ty = memory.ty;
            self.check_memory_type(&ty);
            self.memories.push(ty.value);
        }
        for global in &self.module.globals {
            self.globals.push(global.ty.value);
        }
        for tag in &self.module.tags {
            let ty = tag.ty;
            self.check_tag_type(&ty);
            self.tags.push(ty.value);
        }
        for segment in &self.module.element_segments {
            self.element_segment_types.push(segment.elem_type.value);
        }
    }

    // -- subtyping ---------------------------------------------------------

    fn is_heap_subtype(&self, sub: HeapType, sup: HeapType) -> bool {
        if sub == sup {
            return true;
        }
        let extended = self.features.contains(Features::GC)
            || self.features.contains(Features::FUNCTION_REFERENCES);
        if !extended {
            return false;
        }
        match sup {
            HeapType::Any => !matches!(sub, HeapType::Extern),
            HeapType::Eq => match sub {
                HeapType::I31 => true,
                HeapType::Index(i) => matches!(
                    self.module.types.get(i as usize).map(|t| &t.value),
                    Some(DefinedType::Struct(_)) | Some(DefinedType::Array(_))
                ),
                _ => false,
            },
            HeapType::Func => match sub {
                HeapType::Index(i) => matches!(
                    self.module.types.get(i as usize).map(|t| &t.value),
                    Some(DefinedType::Func(_))
                ),
                _ => false,
            },
            _ => false,
        }
    }

    fn is_ref_subtype(&self, sub: RefType, sup: RefType) -> bool {
        if sub.nullable && !sup.nullable {
            return false;
        }
        self.is_heap_subtype(sub.heap, sup.heap)
    }

    fn is_value_subtype(&self, sub: ValueType, sup: ValueType) -> bool {
        if sub == sup {
            return true;
        }
        match (sub, sup) {
            (ValueType::Reference(a), ValueType::Reference(b)) => {
                self.is_ref_subtype(a.canonicalize(), b.canonicalize())
            }
            (ValueType::Rtt(a), ValueType::Rtt(b)) => a == b,
            _ => false,
        }
    }

    fn is_stack_subtype(&self, sub: StackType, sup: StackType) -> bool {
        match (sub, sup) {
            (StackType::Any, _) | (_, StackType::Any) => true,
            (StackType::Value(a), StackType::Value(b)) => self.is_value_subtype(a, b),
        }
    }

    // -- operand stack -----------------------------------------------------

    fn top_label(&self) -> &Label {
        // A function frame is pushed before any instruction runs.
        self.label_stack.last().unwrap_or_else(|| unreachable!())
    }

    fn pop_operand(&mut self, loc: Location) -> StackType {
        let floor = self.top_label().stack_floor;
        if self.operand_stack.len() <= floor {
            if self.top_label().unreachable {
                return StackType::Any;
            }
            self.error(loc, "type mismatch: expected an operand, but nothing on stack");
            return StackType::Any;
        }
        self.operand_stack.pop().unwrap_or(StackType::Any)
    }

    fn pop_expect(&mut self, loc: Location, expected: StackType) -> StackType {
        let floor = self.top_label().stack_floor;
        if self.operand_stack.len() <= floor {
            if self.top_label().unreachable {
                return StackType::Any;
            }
            self.error(
                loc,
                format!("type mismatch: expected {}, but nothing on stack", expected),
            );
            return StackType::Any;
        }
        let actual = self.operand_stack.pop().unwrap_or(StackType::Any);
        if !self.is_stack_subtype(actual, expected) {
            self.error(
                loc,
                format!("type mismatch: expected {}, got {}", expected, actual),
            );
        }
        actual
    }

    fn pop_value_expect(&mut self, loc: Location, expected: ValueType) -> StackType {
        self.pop_expect(loc, StackType::Value(expected))
    }

    fn push(&mut self, ty: StackType) {
        self.operand_stack.push(ty);
    }

    fn push_value(&mut self, ty: ValueType) {
        self.operand_stack.push(StackType::Value(ty));
    }

    /// Pop `params` in reverse, push `results`.
    fn apply(&mut self, loc: Location, params: &[ValueType], results: &[ValueType]) {
        for param in params.iter().rev() {
            self.pop_value_expect(loc, *param);
        }
        for result in results {
            self.push_value(*result);
        }
    }

    fn set_unreachable(&mut self) {
        let floor = self.top_label().stack_floor;
        self.operand_stack.truncate(floor);
        if let Some(label) = self.label_stack.last_mut() {
            label.unreachable = true;
        }
    }

    // -- control frames ----------------------------------------------------

    fn block_signature(
        &mut self,
        loc: Location,
        block_type: BlockType,
    ) -> (Vec<StackType>, Vec<StackType>) {
        match block_type {
            BlockType::Void => (Vec::new(), Vec::new()),
            BlockType::Value(v) => (Vec::new(), vec![StackType::Value(v)]),
            BlockType::Index(i) => match self.function_type(i) {
                Some(ft) => (to_stack_types(&ft.params), to_stack_types(&ft.results)),
                None => {
                    self.error(loc, format!("unknown type {}", i));
                    (Vec::new(), Vec::new())
                }
            },
        }
    }

    fn push_label(
        &mut self,
        loc: Location,
        kind: LabelKind,
        params: Vec<StackType>,
        results: Vec<StackType>,
    ) {
        for param in params.iter().rev() {
            self.pop_expect(loc, *param);
        }
        let stack_floor = self.operand_stack.len();
        self.operand_stack.extend(params.iter().copied());
        self.label_stack.push(Label {
            kind,
            param_types: params,
            result_types: results,
            stack_floor,
            unreachable: false,
            let_locals: 0,
        });
    }

    /// Pop the current frame: results come off the stack, the stack
    /// must be back at the frame floor, then results are re-pushed
    /// into the enclosing frame.
    fn pop_label(&mut self, loc: Location) -> Option<Label> {
        let label = self.label_stack.last()?.clone();
        for result in label.result_types.iter().rev() {
            self.pop_expect(loc, *result);
        }
        if self.operand_stack.len() != label.stack_floor && !label.unreachable {
            self.error(
                loc,
                format!(
                    "type mismatch: block left {} extra values on stack",
                    self.operand_stack.len() - label.stack_floor
                ),
            );
        }
        self.operand_stack.truncate(label.stack_floor);
        if label.let_locals > 0 {
            self.locals.drain(..label.let_locals as usize);
        }
        self.label_stack.pop()
    }

    fn get_label(&mut self, loc: Location, depth: u32) -> Option<Label> {
        let len = self.label_stack.len();
        if depth as usize >= len {
            self.error(
                loc,
                format!("unknown label {} (max {})", depth, len.saturating_sub(1)),
            );
            return None;
        }
        Some(self.label_stack[len - 1 - depth as usize].clone())
    }

    // -- constant expressions ----------------------------------------------

    /// Only `const`, `ref.null`, `ref.func`, and reads of imported
    /// immutable globals are allowed. Referenced functions become
    /// declared for `ref.func` purposes.
    fn check_constant_expression(
        &mut self,
        expr: &At<ConstantExpression>,
        expected: ValueType,
    ) {
        let mut stack: Vec<ValueType> = Vec::new();
        let mut ended = false;
        for instr in &expr.instructions {
            let loc = instr.loc;
            if ended {
                self.error(loc, "instruction after end in constant expression");
                break;
            }
            match (instr.opcode.value, &instr.immediate) {
                (Opcode::I32Const, _) => stack.push(ValueType::I32),
                (Opcode::I64Const, _) => stack.push(ValueType::I64),
                (Opcode::F32Const, _) => stack.push(ValueType::F32),
                (Opcode::F64Const, _) => stack.push(ValueType::F64),
                (Opcode::V128Const, _) => stack.push(ValueType::V128),
                (Opcode::RefNull, Immediate::HeapType(heap)) => {
                    stack.push(ValueType::Reference(ReferenceType::Ref(RefType {
                        heap: heap.value,
                        nullable: true,
                    })));
                }
                (Opcode::RefFunc, Immediate::Index(index)) => {
                    if index.value as usize >= self.functions.len() {
                        self.error(index.loc, format!("unknown function {}", index.value));
                    } else {
                        self.declared_functions.insert(index.value);
                    }
                    stack.push(ValueType::FUNCREF);
                }
                (Opcode::GlobalGet, Immediate::Index(index)) => {
                    if index.value >= self.imported_global_count {
                        self.error(
                            index.loc,
                            "initializer expression can only reference an imported global",
                        );
                        stack.push(expected);
                    } else {
                        let global = self.globals[index.value as usize];
                        if global.mutability.value == Mutability::Var {
                            self.error(
                                index.loc,
                                "initializer expression cannot reference a mutable global",
                            );
                        }
                        stack.push(global.valtype.value);
                    }
                }
                (Opcode::End, _) => ended = true,
                (op, _) => {
                    self.error(
                        loc,
                        format!("invalid instruction in constant expression: {}", op),
                    );
                    return;
                }
            }
        }
        if !ended {
            self.error(expr.loc, "constant expression must end with end");
        }
        match stack.as_slice() {
            [single] => {
                if !self.is_value_subtype(*single, expected) {
                    self.error(
                        expr.loc,
                        format!("type mismatch: expected {}, got {}", expected, single),
                    );
                }
            }
            [] => self.error(
                expr.loc,
                format!("type mismatch: expected {}, got nothing", expected),
            ),
            _ => self.error(
                expr.loc,
                format!(
                    "constant expression must produce a single value, got {}",
                    stack.len()
                ),
            ),
        }
    }

    // -- module items ------------------------------------------------------

    fn check_globals(&mut self) {
        for global in &self.module.globals {
            self.check_constant_expression(&global.init, global.ty.valtype.value);
        }
    }

    fn check_element_segments(&mut self) {
        for segment in &self.module.element_segments {
            let elem_type = segment.elem_type;
            if let SegmentMode::Active { table_index, offset } = &segment.mode {
                match self.tables.get(table_index.value as usize).copied() {
                    None => {
                        self.error(
                            table_index.loc,
                            format!("unknown table {}", table_index.value),
                        );
                    }
                    Some(table) => {
                        let sub = elem_type.value.canonicalize();
                        let sup = table.elem_type.value.canonicalize();
                        if !(sub == sup || self.is_ref_subtype(sub, sup)) {
                            self.error(
                                elem_type.loc,
                                format!(
                                    "type mismatch: expected {}, got {}",
                                    table.elem_type.value, elem_type.value
                                ),
                            );
                        }
                    }
                }
                self.check_constant_expression(offset, ValueType::I32);
            }
            match &segment.init {
                ElementInit::Indices(indices) => {
                    for index in indices {
                        if index.value as usize >= self.functions.len() {
                            self.error(
                                index.loc,
                                format!("unknown function {}", index.value),
                            );
                        } else {
                            self.declared_functions.insert(index.value);
                        }
                    }
                }
                ElementInit::Expressions(exprs) => {
                    let expected = ValueType::Reference(elem_type.value);
                    for expr in exprs {
                        self.check_constant_expression(expr, expected);
                    }
                }
            }
        }
    }

    fn check_data_segments(&mut self) {
        for segment in &self.module.data_segments {
            if let DataMode::Active { memory_index, offset } = &segment.mode {
                match self.memories.get(memory_index.value as usize).copied() {
                    None => {
                        self.error(
                            memory_index.loc,
                            format!("unknown memory {}", memory_index.value),
                        );
                        self.check_constant_expression(offset, ValueType::I32);
                    }
                    Some(memory) => {
                        let index_type = memory.limits.index_type.value_type();
                        self.check_constant_expression(offset, index_type);
                    }
                }
            }
        }
    }

    fn check_exports(&mut self) {
        let mut names: HashSet<&[u8]> = HashSet::new();
        for export in &self.module.exports {
            if !names.insert(export.name.value.as_slice()) {
                self.error(
                    export.name.loc,
                    format!(
                        "duplicate export name: \"{}\"",
                        String::from_utf8_lossy(&export.name.value)
                    ),
                );
            }
            let index = export.index;
            match export.kind.value {
                ExternalKind::Function => {
                    if index.value as usize >= self.functions.len() {
                        self.error(index.loc, format!("unknown function {}", index.value));
                    } else {
                        self.declared_functions.insert(index.value);
                    }
                }
                ExternalKind::Table => {
                    if index.value as usize >= self.tables.len() {
                        self.error(index.loc, format!("unknown table {}", index.value));
                    }
                }
                ExternalKind::Memory => {
                    if index.value as usize >= self.memories.len() {
                        self.error(index.loc, format!("unknown memory {}", index.value));
                    }
                }
                ExternalKind::Global => match self.globals.get(index.value as usize) {
                    None => {
                        self.error(index.loc, format!("unknown global {}", index.value));
                    }
                    Some(global) => {
                        if global.mutability.value == Mutability::Var
                            && !self.features.contains(Features::MUTABLE_GLOBALS)
                        {
                            self.error(index.loc, "mutable globals cannot be exported");
                        }
                    }
                },
                ExternalKind::Tag => {
                    if index.value as usize >= self.tags.len() {
                        self.error(index.loc, format!("unknown tag {}", index.value));
                    }
                }
            }
        }
    }

    fn check_start(&mut self) {
        let Some(start) = &self.module.start else {
            return;
        };
        let index = start.func_index;
        let Some(type_index) = self.functions.get(index.value as usize).copied() else {
            self.error(index.loc, format!("unknown function {}", index.value));
            return;
        };
        if let Some(ft) = self.function_type(type_index) {
            if !ft.params.is_empty() || !ft.results.is_empty() {
                self.error(index.loc, "start function must have type [] -> []");
            }
        }
    }

    // -- function bodies ---------------------------------------------------

    fn check_codes(&mut self) {
        let defined = self.functions.len() as u32 - self.imported_function_count;
        if defined != self.module.codes.len() as u32 {
            let loc = self
                .module
                .codes
                .last()
                .map(|c| c.loc)
                .unwrap_or_default();
            self.error(
                loc,
                format!(
                    "Expected code count of {}, but got {}",
                    defined,
                    self.module.codes.len()
                ),
            );
        }
        let codes: Vec<&At<Code>> = self.module.codes.iter().collect();
        for (i, code) in codes.into_iter().enumerate() {
            let func_index = self.imported_function_count + i as u32;
            let Some(type_index) = self.functions.get(func_index as usize).copied() else {
                continue;
            };
            let Some(ft) = self.function_type(type_index) else {
                continue;
            };
            let params: Vec<ValueType> = ft.params.iter().map(|p| p.value).collect();
            let results = to_stack_types(&ft.results);
            self.begin_function(code, params, results);
            let instructions = &code.body.instructions;
            for instr in instructions {
                if self.label_stack.is_empty() {
                    self.error(instr.loc, "instruction after function end");
                    break;
                }
                self.on_instruction(instr);
            }
            if !self.label_stack.is_empty() {
                let loc = code.body.loc;
                self.error(loc, "unbalanced control: missing end");
                self.label_stack.clear();
            }
        }
    }

    fn begin_function(
        &mut self,
        code: &At<Code>,
        params: Vec<ValueType>,
        results: Vec<StackType>,
    ) {
        self.locals = params;
        for run in &code.locals {
            let ty = run.ty.value;
            if !self.is_defaultable(ty) {
                self.error(run.ty.loc, format!("non-defaultable local type: {}", ty));
            }
            for _ in 0..run.count.value {
                self.locals.push(ty);
            }
        }
        self.operand_stack.clear();
        self.label_stack.clear();
        self.label_stack.push(Label {
            kind: LabelKind::Function,
            param_types: Vec::new(),
            result_types: results,
            stack_floor: 0,
            unreachable: false,
            let_locals: 0,
        });
    }

    fn is_defaultable(&self, ty: ValueType) -> bool {
        match ty {
            ValueType::Numeric(_) => true,
            ValueType::Reference(r) => r.canonicalize().nullable,
            ValueType::Rtt(_) => false,
        }
    }

    fn local_type(&mut self, index: At<Index>) -> Option<ValueType> {
        match self.locals.get(index.value as usize).copied() {
            Some(ty) => Some(ty),
            None => {
                self.error(index.loc, format!("unknown local {}", index.value));
                None
            }
        }
    }

    fn global_type(&mut self, index: At<Index>) -> Option<GlobalType> {
        match self.globals.get(index.value as usize).copied() {
            Some(ty) => Some(ty),
            None => {
                self.error(index.loc, format!("unknown global {}", index.value));
                None
            }
        }
    }

    fn table_type(&mut self, index: At<Index>) -> Option<TableType> {
        match self.tables.get(index.value as usize).copied() {
            Some(ty) => Some(ty),
            None => {
                self.error(index.loc, format!("unknown table {}", index.value));
                None
            }
        }
    }

    fn memory_index_type(&mut self, loc: Location, index: u32) -> ValueType {
        match self.memories.get(index as usize) {
            Some(memory) => memory.limits.index_type.value_type(),
            None => {
                self.error(loc, format!("unknown memory {}", index));
                ValueType::I32
            }
        }
    }

    fn callee_signature(&mut self, index: At<Index>) -> Option<(Vec<ValueType>, Vec<ValueType>)> {
        let Some(type_index) = self.functions.get(index.value as usize).copied() else {
            self.error(index.loc, format!("unknown function {}", index.value));
            return None;
        };
        let ft = self.function_type(type_index)?;
        Some((
            ft.params.iter().map(|p| p.value).collect(),
            ft.results.iter().map(|r| r.value).collect(),
        ))
    }

    fn type_signature(&mut self, index: At<Index>) -> Option<(Vec<ValueType>, Vec<ValueType>)> {
        let Some(ft) = self.function_type(index.value) else {
            self.error(index.loc, format!("unknown type {}", index.value));
            return None;
        };
        Some((
            ft.params.iter().map(|p| p.value).collect(),
            ft.results.iter().map(|r| r.value).collect(),
        ))
    }

    /// Tail calls require the callee results to match the caller's.
    fn check_tail_results(&mut self, loc: Location, results: &[ValueType]) {
        let caller = self.label_stack[0].result_types.clone();
        let callee: Vec<StackType> =
            results.iter().map(|r| StackType::Value(*r)).collect();
        if caller.len() != callee.len()
            || !callee
                .iter()
                .zip(caller.iter())
                .all(|(a, b)| self.is_stack_subtype(*a, *b))
        {
            self.error(loc, "tail-call result types must match the caller");
        }
    }

    fn check_memarg(
        &mut self,
        memarg: &MemArgImmediate,
        natural_align_log2: u32,
        atomic: bool,
    ) {
        let align = memarg.align_log2;
        if atomic {
            if align.value != natural_align_log2 {
                self.error(
                    align.loc,
                    format!(
                        "alignment must be equal to natural alignment ({})",
                        natural_align_log2
                    ),
                );
            }
        } else if align.value > natural_align_log2 {
            self.error(
                align.loc,
                format!(
                    "alignment must not be larger than natural alignment ({})",
                    natural_align_log2
                ),
            );
        }
    }

    fn check_lane(&mut self, lane: At<u8>, lanes: u8) {
        if lane.value >= lanes {
            self.error(
                lane.loc,
                format!("lane index {} out of range (max {})", lane.value, lanes - 1),
            );
        }
    }

    fn check_data_index(&mut self, index: At<Index>) {
        match self.module.data_count {
            None => {
                self.error(index.loc, "memory.init requires a data count section");
            }
            Some(count) => {
                if index.value >= count.value {
                    self.error(
                        index.loc,
                        format!("unknown data segment {}", index.value),
                    );
                }
            }
        }
    }

    fn check_elem_index(&mut self, index: At<Index>) -> Option<ReferenceType> {
        match self.element_segment_types.get(index.value as usize).copied() {
            Some(ty) => Some(ty),
            None => {
                self.error(
                    index.loc,
                    format!("unknown element segment {}", index.value),
                );
                None
            }
        }
    }

    fn on_instruction(&mut self, instr: &At<Instruction>) {
        let loc = instr.loc;
        let op = instr.opcode.value;
        use Opcode::*;
        match (op, &instr.immediate) {
            // -- control ---------------------------------------------------
            (Unreachable, _) => self.set_unreachable(),
            (Nop, _) => {}
            (Block, Immediate::BlockType(bt)) => {
                let (params, results) = self.block_signature(loc, bt.value);
                self.push_label(loc, LabelKind::Block, params, results);
            }
            (Loop, Immediate::BlockType(bt)) => {
                let (params, results) = self.block_signature(loc, bt.value);
                self.push_label(loc, LabelKind::Loop, params, results);
            }
            (If, Immediate::BlockType(bt)) => {
                self.pop_value_expect(loc, ValueType::I32);
                let (params, results) = self.block_signature(loc, bt.value);
                self.push_label(loc, LabelKind::If, params, results);
            }
            (Else, _) => {
                let Some(label) = self.label_stack.last().cloned() else {
                    return self.error(loc, "unexpected else");
                };
                if label.kind != LabelKind::If {
                    return self.error(loc, "else must follow if");
                }
                self.pop_label(loc);
                // The else arm restarts from the frame floor with the
                // same parameters on the stack.
                let stack_floor = self.operand_stack.len();
                self.operand_stack.extend(label.param_types.iter().copied());
                self.label_stack.push(Label {
                    kind: LabelKind::Else,
                    param_types: label.param_types,
                    result_types: label.result_types,
                    stack_floor,
                    unreachable: false,
                    let_locals: 0,
                });
            }
            (Try, Immediate::BlockType(bt)) => {
                let (params, results) = self.block_signature(loc, bt.value);
                self.push_label(loc, LabelKind::Try, params, results);
            }
            (Catch, Immediate::Index(tag_index)) => {
                let Some(label) = self.label_stack.last().cloned() else {
                    return self.error(loc, "unexpected catch");
                };
                if !matches!(label.kind, LabelKind::Try | LabelKind::Catch) {
                    return self.error(loc, "catch must follow try");
                }
                let tag_params = match self.tags.get(tag_index.value as usize).copied() {
                    Some(tag) => self
                        .function_type(tag.type_index.value)
                        .map(|ft| to_stack_types(&ft.params))
                        .unwrap_or_default(),
                    None => {
                        self.error(
                            tag_index.loc,
                            format!("unknown tag {}", tag_index.value),
                        );
                        Vec::new()
                    }
                };
                self.pop_label(loc);
                self.label_stack.push(Label {
                    kind: LabelKind::Catch,
                    param_types: label.param_types,
                    result_types: label.result_types,
                    stack_floor: self.operand_stack.len(),
                    unreachable: false,
                    let_locals: 0,
                });
                self.operand_stack.extend(tag_params);
            }
            (CatchAll, _) => {
                let Some(label) = self.label_stack.last().cloned() else {
                    return self.error(loc, "unexpected catch_all");
                };
                if !matches!(label.kind, LabelKind::Try | LabelKind::Catch) {
                    return self.error(loc, "catch_all must follow try");
                }
                self.pop_label(loc);
                self.label_stack.push(Label {
                    kind: LabelKind::Catch,
                    param_types: label.param_types,
                    result_types: label.result_types,
                    stack_floor: self.operand_stack.len(),
                    unreachable: false,
                    let_locals: 0,
                });
            }
            (Delegate, Immediate::Index(depth)) => {
                let Some(label) = self.label_stack.last().cloned() else {
                    return self.error(loc, "unexpected delegate");
                };
                if label.kind != LabelKind::Try {
                    return self.error(loc, "delegate must close a try");
                }
                self.get_label(loc, depth.value + 1);
                self.pop_label(loc);
                for result in label.result_types {
                    self.push(result);
                }
            }
            (End, _) => {
                let Some(label) = self.label_stack.last().cloned() else {
                    return self.error(loc, "unexpected end");
                };
                // An if without else must have matching params and
                // results, since the missing arm is a no-op.
                if label.kind == LabelKind::If && label.param_types != label.result_types {
                    self.error(loc, "if without else must leave the stack unchanged");
                }
                self.pop_label(loc);
                // The function frame's end leaves nothing behind; a
                // block's results flow into the enclosing frame.
                if !self.label_stack.is_empty() {
                    for result in label.result_types {
                        self.push(result);
                    }
                }
            }
            (Br, Immediate::Index(depth)) => {
                if let Some(label) = self.get_label(loc, depth.value) {
                    let types = label.branch_types().to_vec();
                    for ty in types.iter().rev() {
                        self.pop_expect(loc, *ty);
                    }
                }
                self.set_unreachable();
            }
            (BrIf, Immediate::Index(depth)) => {
                self.pop_value_expect(loc, ValueType::I32);
                if let Some(label) = self.get_label(loc, depth.value) {
                    let types = label.branch_types().to_vec();
                    for ty in types.iter().rev() {
                        self.pop_expect(loc, *ty);
                    }
                    for ty in &types {
                        self.push(*ty);
                    }
                }
            }
            (BrTable, Immediate::BrTable(imm)) => {
                self.pop_value_expect(loc, ValueType::I32);
                let default = self.get_label(loc, imm.default_target.value);
                if let Some(default) = default {
                    let types = default.branch_types().to_vec();
                    for target in &imm.targets {
                        if let Some(label) = self.get_label(loc, target.value) {
                            if label.branch_types().len() != types.len() {
                                self.error(
                                    target.loc,
                                    "br_table labels have inconsistent arity",
                                );
                            }
                        }
                    }
                    for ty in types.iter().rev() {
                        self.pop_expect(loc, *ty);
                    }
                }
                self.set_unreachable();
            }
            (Return, _) => {
                let results = self.label_stack[0].result_types.clone();
                for ty in results.iter().rev() {
                    self.pop_expect(loc, *ty);
                }
                self.set_unreachable();
            }
            (Call, Immediate::Index(index)) => {
                if let Some((params, results)) = self.callee_signature(*index) {
                    self.apply(loc, &params, &results);
                }
            }
            (CallIndirect, Immediate::CallIndirect(imm)) => {
                self.table_type(imm.table_index);
                self.pop_value_expect(loc, ValueType::I32);
                if let Some((params, results)) = self.type_signature(imm.type_index) {
                    self.apply(loc, &params, &results);
                }
            }
            (ReturnCall, Immediate::Index(index)) => {
                if let Some((params, results)) = self.callee_signature(*index) {
                    self.check_tail_results(loc, &results);
                    self.apply(loc, &params, &[]);
                }
                self.set_unreachable();
            }
            (ReturnCallIndirect, Immediate::CallIndirect(imm)) => {
                self.table_type(imm.table_index);
                self.pop_value_expect(loc, ValueType::I32);
                if let Some((params, results)) = self.type_signature(imm.type_index) {
                    self.check_tail_results(loc, &results);
                    self.apply(loc, &params, &[]);
                }
                self.set_unreachable();
            }
            (CallRef | ReturnCallRef, _) => {
                let callee = self.pop_operand(loc);
                let signature = match callee {
                    StackType::Any => None,
                    StackType::Value(ValueType::Reference(r)) => {
                        match r.canonicalize().heap {
                            HeapType::Index(i) => {
                                self.type_signature(At::new(loc, i))
                            }
                            HeapType::Func => None,
                            _ => {
                                self.error(
                                    loc,
                                    format!("type mismatch: expected (ref func), got {}", callee),
                                );
                                None
                            }
                        }
                    }
                    other => {
                        self.error(
                            loc,
                            format!("type mismatch: expected (ref func), got {}", other),
                        );
                        None
                    }
                };
                if let Some((params, results)) = signature {
                    if op == ReturnCallRef {
                        self.check_tail_results(loc, &results);
                        self.apply(loc, &params, &[]);
                    } else {
                        self.apply(loc, &params, &results);
                    }
                }
                if op == ReturnCallRef {
                    self.set_unreachable();
                }
            }
            (FuncBind, Immediate::FuncBind(type_index)) => {
                let source = self.pop_operand(loc);
                if let Some((target_params, _)) = self.type_signature(*type_index) {
                    if let StackType::Value(ValueType::Reference(r)) = source {
                        if let HeapType::Index(i) = r.canonicalize().heap {
                            if let Some((source_params, _)) =
                                self.type_signature(At::new(loc, i))
                            {
                                let bound = source_params.len().saturating_sub(target_params.len());
                                let extra: Vec<ValueType> =
                                    source_params[..bound].to_vec();
                                self.apply(loc, &extra, &[]);
                            }
                        }
                    }
                    self.push_value(ValueType::Reference(ReferenceType::Ref(RefType {
                        heap: HeapType::Index(type_index.value),
                        nullable: false,
                    })));
                }
            }
            (Let, Immediate::Let(imm)) => {
                let (params, results) = self.block_signature(loc, imm.block_type.value);
                let mut let_types: Vec<ValueType> = Vec::new();
                for run in &imm.locals {
                    for _ in 0..run.count.value {
                        let_types.push(run.ty.value);
                    }
                }
                // let-bound locals are initialized from the stack.
                for ty in let_types.iter().rev() {
                    self.pop_value_expect(loc, *ty);
                }
                self.push_label(loc, LabelKind::Let, params, results);
                if let Some(label) = self.label_stack.last_mut() {
                    label.let_locals = let_types.len() as u32;
                }
                for (i, ty) in let_types.into_iter().enumerate() {
                    self.locals.insert(i, ty);
                }
            }
            (Throw, Immediate::Index(index)) => {
                let params = match self.tags.get(index.value as usize).copied() {
                    Some(tag) => self
                        .function_type(tag.type_index.value)
                        .map(|ft| ft.params.iter().map(|p| p.value).collect::<Vec<_>>())
                        .unwrap_or_default(),
                    None => {
                        self.error(index.loc, format!("unknown tag {}", index.value));
                        Vec::new()
                    }
                };
                self.apply(loc, &params, &[]);
                self.set_unreachable();
            }
            (Rethrow, Immediate::Index(depth)) => {
                if let Some(label) = self.get_label(loc, depth.value) {
                    if label.kind != LabelKind::Catch {
                        self.error(loc, "rethrow target must be a catch block");
                    }
                }
                self.set_unreachable();
            }

            // -- parametric ------------------------------------------------
            (Drop, _) => {
                self.pop_operand(loc);
            }
            (Select, _) => {
                self.pop_value_expect(loc, ValueType::I32);
                let b = self.pop_operand(loc);
                let a = self.pop_operand(loc);
                if let (StackType::Value(a), StackType::Value(b)) = (a, b) {
                    if a.is_reference() || b.is_reference() {
                        self.error(loc, "select without type cannot choose references");
                    } else if a != b {
                        self.error(
                            loc,
                            format!("type mismatch: expected {}, got {}", a, b),
                        );
                    }
                }
                match (a, b) {
                    (StackType::Any, other) | (other, StackType::Any) => self.push(other),
                    (first, _) => self.push(first),
                }
            }
            (SelectT, Immediate::SelectTypes(types)) => {
                if types.len() != 1 {
                    self.error(loc, "select requires exactly one result type");
                    return;
                }
                let ty = types[0].value;
                self.pop_value_expect(loc, ValueType::I32);
                self.pop_value_expect(loc, ty);
                self.pop_value_expect(loc, ty);
                self.push_value(ty);
            }

            // -- variables -------------------------------------------------
            (LocalGet, Immediate::Index(index)) => {
                if let Some(ty) = self.local_type(*index) {
                    self.push_value(ty);
                }
            }
            (LocalSet, Immediate::Index(index)) => {
                if let Some(ty) = self.local_type(*index) {
                    self.pop_value_expect(loc, ty);
                } else {
                    self.pop_operand(loc);
                }
            }
            (LocalTee, Immediate::Index(index)) => {
                if let Some(ty) = self.local_type(*index) {
                    self.pop_value_expect(loc, ty);
                    self.push_value(ty);
                }
            }
            (GlobalGet, Immediate::Index(index)) => {
                if let Some(ty) = self.global_type(*index) {
                    self.push_value(ty.valtype.value);
                }
            }
            (GlobalSet, Immediate::Index(index)) => {
                if let Some(ty) = self.global_type(*index) {
                    if ty.mutability.value == Mutability::Const {
                        self.error(
                            index.loc,
                            format!("global.set on immutable global {}", index.value),
                        );
                    }
                    self.pop_value_expect(loc, ty.valtype.value);
                } else {
                    self.pop_operand(loc);
                }
            }

            // -- tables ----------------------------------------------------
            (TableGet, Immediate::Index(index)) => {
                if let Some(table) = self.table_type(*index) {
                    self.pop_value_expect(loc, ValueType::I32);
                    self.push_value(ValueType::Reference(table.elem_type.value));
                }
            }
            (TableSet, Immediate::Index(index)) => {
                if let Some(table) = self.table_type(*index) {
                    self.pop_value_expect(loc, ValueType::Reference(table.elem_type.value));
                    self.pop_value_expect(loc, ValueType::I32);
                }
            }
            (TableGrow, Immediate::Index(index)) => {
                if let Some(table) = self.table_type(*index) {
                    self.pop_value_expect(loc, ValueType::I32);
                    self.pop_value_expect(loc, ValueType::Reference(table.elem_type.value));
                    self.push_value(ValueType::I32);
                }
            }
            (TableSize, Immediate::Index(index)) => {
                self.table_type(*index);
                self.push_value(ValueType::I32);
            }
            (TableFill, Immediate::Index(index)) => {
                if let Some(table) = self.table_type(*index) {
                    self.pop_value_expect(loc, ValueType::I32);
                    self.pop_value_expect(loc, ValueType::Reference(table.elem_type.value));
                    self.pop_value_expect(loc, ValueType::I32);
                }
            }
            (TableCopy, Immediate::Copy(imm)) => {
                let dst = self.table_type(imm.dst);
                let src = self.table_type(imm.src);
                if let (Some(dst), Some(src)) = (dst, src) {
                    let sub = src.elem_type.value.canonicalize();
                    let sup = dst.elem_type.value.canonicalize();
                    if !(sub == sup || self.is_ref_subtype(sub, sup)) {
                        self.error(
                            loc,
                            format!(
                                "type mismatch: expected {}, got {}",
                                dst.elem_type.value, src.elem_type.value
                            ),
                        );
                    }
                }
                self.apply(
                    loc,
                    &[ValueType::I32, ValueType::I32, ValueType::I32],
                    &[],
                );
            }
            (TableInit, Immediate::Init(imm)) => {
                let table = self.table_type(imm.dst);
                let elem = self.check_elem_index(imm.segment_index);
                if let (Some(table), Some(elem)) = (table, elem) {
                    let sub = elem.canonicalize();
                    let sup = table.elem_type.value.canonicalize();
                    if !(sub == sup || self.is_ref_subtype(sub, sup)) {
                        self.error(
                            loc,
                            format!(
                                "type mismatch: expected {}, got {}",
                                table.elem_type.value, elem
                            ),
                        );
                    }
                }
                self.apply(
                    loc,
                    &[ValueType::I32, ValueType::I32, ValueType::I32],
                    &[],
                );
            }
            (ElemDrop, Immediate::Index(index)) => {
                self.check_elem_index(*index);
            }

            // -- memory ----------------------------------------------------
            (MemorySize, Immediate::Index(index)) => {
                let ty = self.memory_index_type(loc, index.value);
                self.push_value(ty);
            }
            (MemoryGrow, Immediate::Index(index)) => {
                let ty = self.memory_index_type(loc, index.value);
                self.pop_value_expect(loc, ty);
                self.push_value(ty);
            }
            (MemoryFill, Immediate::Index(index)) => {
                let ty = self.memory_index_type(loc, index.value);
                self.apply(loc, &[ty, ValueType::I32, ty], &[]);
            }
            (MemoryCopy, Immediate::Copy(imm)) => {
                let dst = self.memory_index_type(loc, imm.dst.value);
                let src = self.memory_index_type(loc, imm.src.value);
                let len = if dst == ValueType::I64 && src == ValueType::I64 {
                    ValueType::I64
                } else {
                    ValueType::I32
                };
                self.apply(loc, &[dst, src, len], &[]);
            }
            (MemoryInit, Immediate::Init(imm)) => {
                self.check_data_index(imm.segment_index);
                let ty = self.memory_index_type(loc, imm.dst.value);
                self.apply(loc, &[ty, ValueType::I32, ValueType::I32], &[]);
            }
            (DataDrop, Immediate::Index(index)) => {
                self.check_data_index(*index);
            }
            (MemoryAtomicNotify, Immediate::MemArg(memarg)) => {
                self.check_memarg(memarg, 2, true);
                let ty = self.memory_index_type(loc, 0);
                self.apply(loc, &[ty, ValueType::I32], &[ValueType::I32]);
            }
            (MemoryAtomicWait32, Immediate::MemArg(memarg)) => {
                self.check_memarg(memarg, 2, true);
                let ty = self.memory_index_type(loc, 0);
                self.apply(loc, &[ty, ValueType::I32, ValueType::I64], &[ValueType::I32]);
            }
            (MemoryAtomicWait64, Immediate::MemArg(memarg)) => {
                self.check_memarg(memarg, 3, true);
                let ty = self.memory_index_type(loc, 0);
                self.apply(loc, &[ty, ValueType::I64, ValueType::I64], &[ValueType::I32]);
            }
            (AtomicFence, _) => {}

            // -- references ------------------------------------------------
            (RefNull, Immediate::HeapType(heap)) => {
                self.push_value(ValueType::Reference(ReferenceType::Ref(RefType {
                    heap: heap.value,
                    nullable: true,
                })));
            }
            (RefIsNull, _) => {
                let value = self.pop_operand(loc);
                if let StackType::Value(v) = value {
                    if !v.is_reference() {
                        self.error(
                            loc,
                            format!("type mismatch: expected a reference, got {}", v),
                        );
                    }
                }
                self.push_value(ValueType::I32);
            }
            (RefFunc, Immediate::Index(index)) => {
                if index.value as usize >= self.functions.len() {
                    self.error(index.loc, format!("unknown function {}", index.value));
                    self.push_value(ValueType::FUNCREF);
                } else {
                    if !self.declared_functions.contains(&index.value) {
                        self.error(
                            index.loc,
                            format!("undeclared function reference {}", index.value),
                        );
                    }
                    if self.features.contains(Features::FUNCTION_REFERENCES) {
                        let type_index = self.functions[index.value as usize];
                        self.push_value(ValueType::Reference(ReferenceType::Ref(RefType {
                            heap: HeapType::Index(type_index),
                            nullable: false,
                        })));
                    } else {
                        self.push_value(ValueType::FUNCREF);
                    }
                }
            }
            (RefAsNonNull, _) => {
                let value = self.pop_operand(loc);
                match value {
                    StackType::Value(ValueType::Reference(r)) => {
                        let mut canonical = r.canonicalize();
                        canonical.nullable = false;
                        self.push_value(ValueType::Reference(ReferenceType::Ref(canonical)));
                    }
                    StackType::Any => self.push(StackType::Any),
                    other => {
                        self.error(
                            loc,
                            format!("type mismatch: expected a reference, got {}", other),
                        );
                        self.push(other);
                    }
                }
            }
            (BrOnNull, Immediate::Index(depth)) => {
                let value = self.pop_operand(loc);
                if let Some(label) = self.get_label(loc, depth.value) {
                    let types = label.branch_types().to_vec();
                    for ty in types.iter().rev() {
                        self.pop_expect(loc, *ty);
                    }
                    for ty in &types {
                        self.push(*ty);
                    }
                }
                match value {
                    StackType::Value(ValueType::Reference(r)) => {
                        let mut canonical = r.canonicalize();
                        canonical.nullable = false;
                        self.push_value(ValueType::Reference(ReferenceType::Ref(canonical)));
                    }
                    other => self.push(other),
                }
            }
            (BrOnNonNull, Immediate::Index(depth)) => {
                let value = self.pop_operand(loc);
                if let StackType::Value(v) = value {
                    if !v.is_reference() {
                        self.error(
                            loc,
                            format!("type mismatch: expected a reference, got {}", v),
                        );
                    }
                }
                self.get_label(loc, depth.value);
            }
            (RefEq, _) => {
                self.apply(
                    loc,
                    &[
                        ValueType::Reference(ReferenceType::Eqref),
                        ValueType::Reference(ReferenceType::Eqref),
                    ],
                    &[ValueType::I32],
                );
            }

            // -- gc --------------------------------------------------------
            (I31New, _) => {
                self.apply(loc, &[ValueType::I32], &[]);
                self.push_value(ValueType::Reference(ReferenceType::Ref(RefType {
                    heap: HeapType::I31,
                    nullable: false,
                })));
            }
            (I31GetS | I31GetU, _) => {
                self.apply(
                    loc,
                    &[ValueType::Reference(ReferenceType::I31ref)],
                    &[ValueType::I32],
                );
            }
            (RttCanon, Immediate::HeapType(heap)) => {
                self.push_value(ValueType::Rtt(Rtt { depth: 0, heap: heap.value }));
            }
            (RttSub, Immediate::RttSub(imm)) => {
                self.pop_value_expect(
                    loc,
                    ValueType::Rtt(Rtt {
                        depth: imm.depth.value,
                        heap: imm.types.parent.value,
                    }),
                );
                self.push_value(ValueType::Rtt(Rtt {
                    depth: imm.depth.value + 1,
                    heap: imm.types.child.value,
                }));
            }
            (RefTest, Immediate::HeapType2(imm)) => {
                let rtt = self.pop_operand(loc);
                self.check_rtt_for(loc, rtt, imm.child.value);
                self.pop_value_expect(
                    loc,
                    ValueType::Reference(ReferenceType::Ref(RefType {
                        heap: imm.parent.value,
                        nullable: true,
                    })),
                );
                self.push_value(ValueType::I32);
            }
            (RefCast, Immediate::HeapType2(imm)) => {
                let rtt = self.pop_operand(loc);
                self.check_rtt_for(loc, rtt, imm.child.value);
                self.pop_value_expect(
                    loc,
                    ValueType::Reference(ReferenceType::Ref(RefType {
                        heap: imm.parent.value,
                        nullable: true,
                    })),
                );
                self.push_value(ValueType::Reference(ReferenceType::Ref(RefType {
                    heap: imm.child.value,
                    nullable: false,
                })));
            }
            (BrOnCast, Immediate::BrOnCast(imm)) => {
                let rtt = self.pop_operand(loc);
                self.check_rtt_for(loc, rtt, imm.types.child.value);
                self.pop_value_expect(
                    loc,
                    ValueType::Reference(ReferenceType::Ref(RefType {
                        heap: imm.types.parent.value,
                        nullable: true,
                    })),
                );
                self.get_label(loc, imm.target.value);
                self.push_value(ValueType::Reference(ReferenceType::Ref(RefType {
                    heap: imm.types.parent.value,
                    nullable: true,
                })));
            }
            (StructNewWithRtt, Immediate::Index(index)) => {
                let fields = self.struct_fields(*index);
                let rtt = self.pop_operand(loc);
                self.check_rtt_for(loc, rtt, HeapType::Index(index.value));
                if let Some(fields) = fields {
                    let params: Vec<ValueType> =
                        fields.iter().map(|f| f.ty.value.unpack()).collect();
                    self.apply(loc, &params, &[]);
                }
                self.push_value(ValueType::Reference(ReferenceType::Ref(RefType {
                    heap: HeapType::Index(index.value),
                    nullable: false,
                })));
            }
            (StructNewDefaultWithRtt, Immediate::Index(index)) => {
                self.struct_fields(*index);
                let rtt = self.pop_operand(loc);
                self.check_rtt_for(loc, rtt, HeapType::Index(index.value));
                self.push_value(ValueType::Reference(ReferenceType::Ref(RefType {
                    heap: HeapType::Index(index.value),
                    nullable: false,
                })));
            }
            (StructGet | StructGetS | StructGetU, Immediate::StructField(imm)) => {
                let field = self.struct_field(imm);
                self.pop_value_expect(
                    loc,
                    ValueType::Reference(ReferenceType::Ref(RefType {
                        heap: HeapType::Index(imm.struct_index.value),
                        nullable: true,
                    })),
                );
                if let Some(field) = field {
                    let packed = matches!(field.ty.value, StorageType::Packed(_));
                    if packed && op == StructGet {
                        self.error(loc, "struct.get on a packed field requires _s or _u");
                    }
                    if !packed && op != StructGet {
                        self.error(loc, "struct.get_s/_u require a packed field");
                    }
                    self.push_value(field.ty.value.unpack());
                }
            }
            (StructSet, Immediate::StructField(imm)) => {
                let field = self.struct_field(imm);
                if let Some(field) = field {
                    if field.mutability.value == Mutability::Const {
                        self.error(loc, "struct.set on an immutable field");
                    }
                    self.pop_value_expect(loc, field.ty.value.unpack());
                }
                self.pop_value_expect(
                    loc,
                    ValueType::Reference(ReferenceType::Ref(RefType {
                        heap: HeapType::Index(imm.struct_index.value),
                        nullable: true,
                    })),
                );
            }
            (ArrayNewWithRtt, Immediate::Index(index)) => {
                let field = self.array_field(*index);
                let rtt = self.pop_operand(loc);
                self.check_rtt_for(loc, rtt, HeapType::Index(index.value));
                self.pop_value_expect(loc, ValueType::I32);
                if let Some(field) = field {
                    self.pop_value_expect(loc, field.ty.value.unpack());
                }
                self.push_value(ValueType::Reference(ReferenceType::Ref(RefType {
                    heap: HeapType::Index(index.value),
                    nullable: false,
                })));
            }
            (ArrayNewDefaultWithRtt, Immediate::Index(index)) => {
                self.array_field(*index);
                let rtt = self.pop_operand(loc);
                self.check_rtt_for(loc, rtt, HeapType::Index(index.value));
                self.pop_value_expect(loc, ValueType::I32);
                self.push_value(ValueType::Reference(ReferenceType::Ref(RefType {
                    heap: HeapType::Index(index.value),
                    nullable: false,
                })));
            }
            (ArrayGet | ArrayGetS | ArrayGetU, Immediate::Index(index)) => {
                let field = self.array_field(*index);
                self.pop_value_expect(loc, ValueType::I32);
                self.pop_value_expect(
                    loc,
                    ValueType::Reference(ReferenceType::Ref(RefType {
                        heap: HeapType::Index(index.value),
                        nullable: true,
                    })),
                );
                if let Some(field) = field {
                    let packed = matches!(field.ty.value, StorageType::Packed(_));
                    if packed && op == ArrayGet {
                        self.error(loc, "array.get on a packed field requires _s or _u");
                    }
                    if !packed && op != ArrayGet {
                        self.error(loc, "array.get_s/_u require a packed field");
                    }
                    self.push_value(field.ty.value.unpack());
                }
            }
            (ArraySet, Immediate::Index(index)) => {
                let field = self.array_field(*index);
                if let Some(field) = field {
                    if field.mutability.value == Mutability::Const {
                        self.error(loc, "array.set on an immutable field");
                    }
                    self.pop_value_expect(loc, field.ty.value.unpack());
                }
                self.pop_value_expect(loc, ValueType::I32);
                self.pop_value_expect(
                    loc,
                    ValueType::Reference(ReferenceType::Ref(RefType {
                        heap: HeapType::Index(index.value),
                        nullable: true,
                    })),
                );
            }
            (ArrayLen, Immediate::Index(index)) => {
                self.array_field(*index);
                self.pop_value_expect(
                    loc,
                    ValueType::Reference(ReferenceType::Ref(RefType {
                        heap: HeapType::Index(index.value),
                        nullable: true,
                    })),
                );
                self.push_value(ValueType::I32);
            }

            // -- simd specials ---------------------------------------------
            (I8X16Splat | I16X8Splat | I32X4Splat, _) => {
                self.apply(loc, &[ValueType::I32], &[ValueType::V128]);
            }
            (I64X2Splat, _) => self.apply(loc, &[ValueType::I64], &[ValueType::V128]),
            (F32X4Splat, _) => self.apply(loc, &[ValueType::F32], &[ValueType::V128]),
            (F64X2Splat, _) => self.apply(loc, &[ValueType::F64], &[ValueType::V128]),
            (I8X16Shuffle, Immediate::SimdShuffle(lanes)) => {
                for (i, lane) in lanes.value.iter().enumerate() {
                    if *lane >= 32 {
                        self.error(
                            lanes.loc,
                            format!("shuffle lane {} out of range: {}", i, lane),
                        );
                        break;
                    }
                }
                self.apply(
                    loc,
                    &[ValueType::V128, ValueType::V128],
                    &[ValueType::V128],
                );
            }
            (
                I8X16ExtractLaneS | I8X16ExtractLaneU | I16X8ExtractLaneS | I16X8ExtractLaneU
                | I32X4ExtractLane | I64X2ExtractLane | F32X4ExtractLane | F64X2ExtractLane
                | I8X16ReplaceLane | I16X8ReplaceLane | I32X4ReplaceLane | I64X2ReplaceLane
                | F32X4ReplaceLane | F64X2ReplaceLane,
                Immediate::SimdLane(lane),
            ) => {
                let (lanes, scalar) = lane_shape(op);
                self.check_lane(*lane, lanes);
                let replace = matches!(
                    op,
                    I8X16ReplaceLane | I16X8ReplaceLane | I32X4ReplaceLane | I64X2ReplaceLane
                        | F32X4ReplaceLane | F64X2ReplaceLane
                );
                if replace {
                    self.apply(loc, &[ValueType::V128, scalar], &[ValueType::V128]);
                } else {
                    self.apply(loc, &[ValueType::V128], &[scalar]);
                }
            }
            (
                I8X16Shl | I8X16ShrS | I8X16ShrU | I16X8Shl | I16X8ShrS | I16X8ShrU
                | I32X4Shl | I32X4ShrS | I32X4ShrU | I64X2Shl | I64X2ShrS | I64X2ShrU,
                _,
            ) => {
                self.apply(loc, &[ValueType::V128, ValueType::I32], &[ValueType::V128]);
            }
            (V128Bitselect, _) => {
                self.apply(
                    loc,
                    &[ValueType::V128, ValueType::V128, ValueType::V128],
                    &[ValueType::V128],
                );
            }
            (
                V128AnyTrue | I8X16AllTrue | I16X8AllTrue | I32X4AllTrue | I64X2AllTrue
                | I8X16Bitmask | I16X8Bitmask | I32X4Bitmask | I64X2Bitmask,
                _,
            ) => {
                self.apply(loc, &[ValueType::V128], &[ValueType::I32]);
            }
            (
                V128Load8Lane | V128Load16Lane | V128Load32Lane | V128Load64Lane
                | V128Store8Lane | V128Store16Lane | V128Store32Lane | V128Store64Lane,
                Immediate::SimdMemoryLane(imm),
            ) => {
                let (align, lanes) = simd_lane_memop(op).unwrap_or((3, 2));
                self.check_memarg(&imm.memarg, align, false);
                self.check_lane(imm.lane, lanes);
                let index = self.memory_index_type(loc, 0);
                let store = matches!(
                    op,
                    V128Store8Lane | V128Store16Lane | V128Store32Lane | V128Store64Lane
                );
                if store {
                    self.apply(loc, &[index, ValueType::V128], &[]);
                } else {
                    self.apply(loc, &[index, ValueType::V128], &[ValueType::V128]);
                }
            }

            // -- loads, stores, rmw ----------------------------------------
            (_, Immediate::MemArg(memarg)) => {
                let index = self.memory_index_type(loc, 0);
                if let Some((align, ty, atomic)) = load_shape(op) {
                    self.check_memarg(memarg, align, atomic);
                    self.apply(loc, &[index], &[ty]);
                } else if let Some((align, ty, atomic)) = store_shape(op) {
                    self.check_memarg(memarg, align, atomic);
                    self.apply(loc, &[index, ty], &[]);
                } else if let Some((align, ty)) = rmw_shape(op) {
                    self.check_memarg(memarg, align, true);
                    self.apply(loc, &[index, ty], &[ty]);
                } else if let Some((align, ty)) = cmpxchg_shape(op) {
                    self.check_memarg(memarg, align, true);
                    self.apply(loc, &[index, ty, ty], &[ty]);
                } else {
                    self.error(loc, format!("unexpected memory operand for {}", op));
                }
            }

            // -- scalar and simd value ops ---------------------------------
            (_, Immediate::S32(_)) => self.push_value(ValueType::I32),
            (_, Immediate::S64(_)) => self.push_value(ValueType::I64),
            (_, Immediate::F32(_)) => self.push_value(ValueType::F32),
            (_, Immediate::F64(_)) => self.push_value(ValueType::F64),
            (_, Immediate::V128(_)) => self.push_value(ValueType::V128),
            (op, _) => match simple_signature(op) {
                Some((params, results)) => self.apply(loc, params, results),
                None => self.error(loc, format!("no validation rule for {}", op)),
            },
        }
    }

    fn check_rtt_for(&mut self, loc: Location, rtt: StackType, heap: HeapType) {
        match rtt {
            StackType::Any => {}
            StackType::Value(ValueType::Rtt(r)) => {
                if r.heap != heap {
                    self.error(
                        loc,
                        format!("type mismatch: expected (rtt {}), got (rtt {})", heap, r.heap),
                    );
                }
            }
            other => {
                self.error(loc, format!("type mismatch: expected an rtt, got {}", other));
            }
        }
    }

    fn struct_fields(&mut self, index: At<Index>) -> Option<Vec<FieldType>> {
        match self.module.types.get(index.value as usize).map(|t| &t.value) {
            Some(DefinedType::Struct(st)) => {
                Some(st.fields.iter().map(|f| f.value).collect())
            }
            _ => {
                self.error(index.loc, format!("unknown struct type {}", index.value));
                None
            }
        }
    }

    fn struct_field(&mut self, imm: &StructFieldImmediate) -> Option<FieldType> {
        let fields = self.struct_fields(imm.struct_index)?;
        match fields.get(imm.field_index.value as usize).copied() {
            Some(field) => Some(field),
            None => {
                self.error(
                    imm.field_index.loc,
                    format!("unknown field {}", imm.field_index.value),
                );
                None
            }
        }
    }

    fn array_field(&mut self, index: At<Index>) -> Option<FieldType> {
        match self.module.types.get(index.value as usize).map(|t| &t.value) {
            Some(DefinedType::Array(at)) => Some(at.field.value),
            _ => {
                self.error(index.loc, format!("unknown array type {}", index.value));
                None
            }
        }
    }
}

fn lane_shape(op: Opcode) -> (u8, ValueType) {
    use Opcode::*;
    match op {
        I8X16ExtractLaneS | I8X16ExtractLaneU | I8X16ReplaceLane => (16, ValueType::I32),
        I16X8ExtractLaneS | I16X8ExtractLaneU | I16X8ReplaceLane => (8, ValueType::I32),
        I32X4ExtractLane | I32X4ReplaceLane => (4, ValueType::I32),
        I64X2ExtractLane | I64X2ReplaceLane => (2, ValueType::I64),
        F32X4ExtractLane | F32X4ReplaceLane => (4, ValueType::F32),
        _ => (2, ValueType::F64),
    }
}

/// Fixed signatures for the pure value operators. Control, variable,
/// memory, and reference instructions are handled individually above.
fn simple_signature(op: Opcode) -> Option<(&'static [ValueType], &'static [ValueType])> {
    use Opcode::*;
    use ValueType as V;
    const I32: &[ValueType] = &[V::I32];
    const I64: &[ValueType] = &[V::I64];
    const F32: &[ValueType] = &[V::F32];
    const F64: &[ValueType] = &[V::F64];
    const V128: &[ValueType] = &[V::V128];
    const I32_I32: &[ValueType] = &[V::I32, V::I32];
    const I64_I64: &[ValueType] = &[V::I64, V::I64];
    const F32_F32: &[ValueType] = &[V::F32, V::F32];
    const F64_F64: &[ValueType] = &[V::F64, V::F64];
    const V128_V128: &[ValueType] = &[V::V128, V::V128];

    Some(match op {
        // i32 unary and binary.
        I32Eqz | I32Clz | I32Ctz | I32Popcnt | I32Extend8S | I32Extend16S => (I32, I32),
        I32Eq | I32Ne | I32LtS | I32LtU | I32GtS | I32GtU | I32LeS | I32LeU | I32GeS
        | I32GeU | I32Add | I32Sub | I32Mul | I32DivS | I32DivU | I32RemS | I32RemU
        | I32And | I32Or | I32Xor | I32Shl | I32ShrS | I32ShrU | I32Rotl | I32Rotr => {
            (I32_I32, I32)
        }

        // i64.
        I64Clz | I64Ctz | I64Popcnt | I64Extend8S | I64Extend16S | I64Extend32S => (I64, I64),
        I64Eqz => (I64, I32),
        I64Eq | I64Ne | I64LtS | I64LtU | I64GtS | I64GtU | I64LeS | I64LeU | I64GeS
        | I64GeU => (I64_I64, I32),
        I64Add | I64Sub | I64Mul | I64DivS | I64DivU | I64RemS | I64RemU | I64And
        | I64Or | I64Xor | I64Shl | I64ShrS | I64ShrU | I64Rotl | I64Rotr => (I64_I64, I64),

        // f32.
        F32Abs | F32Neg | F32Ceil | F32Floor | F32Trunc | F32Nearest | F32Sqrt => (F32, F32),
        F32Eq | F32Ne | F32Lt | F32Gt | F32Le | F32Ge => (F32_F32, I32),
        F32Add | F32Sub | F32Mul | F32Div | F32Min | F32Max | F32Copysign => (F32_F32, F32),

        // f64.
        F64Abs | F64Neg | F64Ceil | F64Floor | F64Trunc | F64Nearest | F64Sqrt => (F64, F64),
        F64Eq | F64Ne | F64Lt | F64Gt | F64Le | F64Ge => (F64_F64, I32),
        F64Add | F64Sub | F64Mul | F64Div | F64Min | F64Max | F64Copysign => (F64_F64, F64),

        // Conversions.
        I32WrapI64 => (I64, I32),
        I32TruncF32S | I32TruncF32U | I32TruncSatF32S | I32TruncSatF32U
        | I32ReinterpretF32 => (F32, I32),
        I32TruncF64S | I32TruncF64U | I32TruncSatF64S | I32TruncSatF64U => (F64, I32),
        I64ExtendI32S | I64ExtendI32U => (I32, I64),
        I64TruncF32S | I64TruncF32U | I64TruncSatF32S | I64TruncSatF32U => (F32, I64),
        I64TruncF64S | I64TruncF64U | I64TruncSatF64S | I64TruncSatF64U
        | I64ReinterpretF64 => (F64, I64),
        F32ConvertI32S | F32ConvertI32U | F32ReinterpretI32 => (I32, F32),
        F32ConvertI64S | F32ConvertI64U => (I64, F32),
        F32DemoteF64 => (F64, F32),
        F64ConvertI32S | F64ConvertI32U => (I32, F64),
        F64ConvertI64S | F64ConvertI64U | F64ReinterpretI64 => (I64, F64),
        F64PromoteF32 => (F32, F64),

        // v128 unary.
        V128Not | I8X16Abs | I8X16Neg | I8X16Popcnt | I16X8Abs | I16X8Neg | I32X4Abs
        | I32X4Neg | I64X2Abs | I64X2Neg | F32X4Abs | F32X4Neg | F32X4Sqrt | F32X4Ceil
        | F32X4Floor | F32X4Trunc | F32X4Nearest | F64X2Abs | F64X2Neg | F64X2Sqrt
        | F64X2Ceil | F64X2Floor | F64X2Trunc | F64X2Nearest
        | I16X8ExtendLowI8X16S | I16X8ExtendHighI8X16S | I16X8ExtendLowI8X16U
        | I16X8ExtendHighI8X16U | I32X4ExtendLowI16X8S | I32X4ExtendHighI16X8S
        | I32X4ExtendLowI16X8U | I32X4ExtendHighI16X8U | I64X2ExtendLowI32X4S
        | I64X2ExtendHighI32X4S | I64X2ExtendLowI32X4U | I64X2ExtendHighI32X4U
        | I16X8ExtaddPairwiseI8X16S | I16X8ExtaddPairwiseI8X16U
        | I32X4ExtaddPairwiseI16X8S | I32X4ExtaddPairwiseI16X8U
        | F32X4DemoteF64X2Zero | F64X2PromoteLowF32X4 | I32X4TruncSatF32X4S
        | I32X4TruncSatF32X4U | I32X4TruncSatF64X2SZero | I32X4TruncSatF64X2UZero
        | F32X4ConvertI32X4S | F32X4ConvertI32X4U | F64X2ConvertLowI32X4S
        | F64X2ConvertLowI32X4U => (V128, V128),

        // v128 binary.
        I8X16Swizzle | V128And | V128Andnot | V128Or | V128Xor
        | I8X16Eq | I8X16Ne | I8X16LtS | I8X16LtU | I8X16GtS | I8X16GtU | I8X16LeS
        | I8X16LeU | I8X16GeS | I8X16GeU
        | I16X8Eq | I16X8Ne | I16X8LtS | I16X8LtU | I16X8GtS | I16X8GtU | I16X8LeS
        | I16X8LeU | I16X8GeS | I16X8GeU
        | I32X4Eq | I32X4Ne | I32X4LtS | I32X4LtU | I32X4GtS | I32X4GtU | I32X4LeS
        | I32X4LeU | I32X4GeS | I32X4GeU
        | I64X2Eq | I64X2Ne | I64X2LtS | I64X2GtS | I64X2LeS | I64X2GeS
        | F32X4Eq | F32X4Ne | F32X4Lt | F32X4Gt | F32X4Le | F32X4Ge
        | F64X2Eq | F64X2Ne | F64X2Lt | F64X2Gt | F64X2Le | F64X2Ge
        | I8X16NarrowI16X8S | I8X16NarrowI16X8U | I16X8NarrowI32X4S | I16X8NarrowI32X4U
        | I8X16Add | I8X16AddSatS | I8X16AddSatU | I8X16Sub | I8X16SubSatS
        | I8X16SubSatU | I8X16MinS | I8X16MinU | I8X16MaxS | I8X16MaxU | I8X16AvgrU
        | I16X8Add | I16X8AddSatS | I16X8AddSatU | I16X8Sub | I16X8SubSatS
        | I16X8SubSatU | I16X8Mul | I16X8MinS | I16X8MinU | I16X8MaxS | I16X8MaxU
        | I16X8AvgrU | I16X8Q15MulrSatS
        | I16X8ExtmulLowI8X16S | I16X8ExtmulHighI8X16S | I16X8ExtmulLowI8X16U
        | I16X8ExtmulHighI8X16U
        | I32X4Add | I32X4Sub | I32X4Mul | I32X4MinS | I32X4MinU | I32X4MaxS
        | I32X4MaxU | I32X4DotI16X8S
        | I32X4ExtmulLowI16X8S | I32X4ExtmulHighI16X8S | I32X4ExtmulLowI16X8U
        | I32X4ExtmulHighI16X8U
        | I64X2Add | I64X2Sub | I64X2Mul
        | I64X2ExtmulLowI32X4S | I64X2ExtmulHighI32X4S | I64X2ExtmulLowI32X4U
        | I64X2ExtmulHighI32X4U
        | F32X4Add | F32X4Sub | F32X4Mul | F32X4Div | F32X4Min | F32X4Max | F32X4Pmin
        | F32X4Pmax
        | F64X2Add | F64X2Sub | F64X2Mul | F64X2Div | F64X2Min | F64X2Max | F64X2Pmin
        | F64X2Pmax => (V128_V128, V128),

        _ => return None,
    })
}
