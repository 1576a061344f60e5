//! Replace every symbolic `Var` with a numeric index. One name map
//! per index space, per-type field maps, scoped local and label maps,
//! and a function-type map that reuses equal entries and defers new
//! implicit ones to the end of the module in first-use order.

use std::collections::BTreeMap;

use crate::errors::Errors;
use crate::span::{At, Location};
use crate::text::convert;
use crate::text::name_map::NameMap;
use crate::text::types::*;
use crate::types::{FunctionType, Index, Opcode};

/// Function types are referenced by `(type $x)`, inline
/// `(param …) (result …)`, or both. An inline type with no use is
/// looked up among the defined types first; a miss reserves a
/// deferred entry appended after all defined types, in the order the
/// types were first used.
#[derive(Debug, Default)]
pub struct FunctionTypeMap {
    defined: Vec<Option<FunctionType>>,
    deferred: Vec<FunctionType>,
}

impl FunctionTypeMap {
    pub fn define(&mut self, ty: FunctionType) {
        self.defined.push(Some(ty));
    }

    /// Non-function type entries occupy an index without a signature.
    pub fn skip_index(&mut self) {
        self.defined.push(None);
    }

    pub fn size(&self) -> Index {
        (self.defined.len() + self.deferred.len()) as Index
    }

    pub fn get(&self, index: Index) -> Option<&FunctionType> {
        let index = index as usize;
        if index < self.defined.len() {
            self.defined[index].as_ref()
        } else {
            self.deferred.get(index - self.defined.len())
        }
    }

    pub fn use_type(&mut self, ty: FunctionType) -> Index {
        if let Some(found) = self
            .defined
            .iter()
            .position(|entry| entry.as_ref() == Some(&ty))
        {
            return found as Index;
        }
        if let Some(found) = self.deferred.iter().position(|entry| *entry == ty) {
            return (self.defined.len() + found) as Index;
        }
        self.deferred.push(ty);
        (self.defined.len() + self.deferred.len() - 1) as Index
    }

    pub fn take_deferred(&mut self) -> Vec<FunctionType> {
        std::mem::take(&mut self.deferred)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Space {
    Type,
    Function,
    Table,
    Memory,
    Global,
    Tag,
    Element,
    Data,
    Local,
    Label,
}

pub struct ResolveCtx<'e> {
    errors: &'e mut dyn Errors,
    types: NameMap,
    functions: NameMap,
    tables: NameMap,
    memories: NameMap,
    globals: NameMap,
    tags: NameMap,
    element_segments: NameMap,
    data_segments: NameMap,
    field_names: BTreeMap<Index, NameMap>,
    function_type_map: FunctionTypeMap,
    // Function context.
    local_names: NameMap,
    label_names: NameMap,
    blocks: Vec<Opcode>,
}

/// Resolve the module in place. Deferred function types are appended
/// as new type entries. Returns false if any error was reported.
pub fn resolve_module(module: &mut TextModule, errors: &mut dyn Errors) -> bool {
    let mut ctx = ResolveCtx {
        errors,
        types: NameMap::new(),
        functions: NameMap::new(),
        tables: NameMap::new(),
        memories: NameMap::new(),
        globals: NameMap::new(),
        tags: NameMap::new(),
        element_segments: NameMap::new(),
        data_segments: NameMap::new(),
        field_names: BTreeMap::new(),
        function_type_map: FunctionTypeMap::default(),
        local_names: NameMap::new(),
        label_names: NameMap::new(),
        blocks: Vec::new(),
    };
    ctx.run(module)
}

/// Definitions are pushed in reverse so that a plain label-style
/// `get` yields the forward index of the innermost binding.
fn define_reversed(
    map: &mut NameMap,
    names: &[(Option<At<BindVar>>, Location)],
    errors: &mut dyn Errors,
    ok: &mut bool,
) {
    for (name, _loc) in names.iter().rev() {
        match name {
            Some(name) => {
                if !map.new_bound(name.value.clone()) {
                    errors.on_error(
                        name.loc,
                        format!("duplicate identifier {}", name.value),
                    );
                    *ok = false;
                }
            }
            None => map.new_unbound(),
        }
    }
}

impl ResolveCtx<'_> {
    fn error(&mut self, loc: Location, message: impl Into<String>) {
        self.errors.on_error(loc, message.into());
    }

    fn run(&mut self, module: &mut TextModule) -> bool {
        let mut ok = true;

        // Type names first: value types anywhere may reference them.
        let mut type_names = Vec::new();
        for item in &module.items {
            if let ModuleItem::Type(entry) = &item.value {
                type_names.push((entry.name.clone(), item.loc));
            }
        }
        define_reversed(&mut self.types, &type_names, self.errors, &mut ok);

        // Resolve the type entries themselves, then seed the function
        // type map and the per-struct field maps.
        let mut type_index: Index = 0;
        for item in &mut module.items {
            let loc = item.loc;
            let ModuleItem::Type(entry) = &mut item.value else {
                continue;
            };
            match &mut entry.ty.value {
                DefinedType::Func(ft) => {
                    Self::resolve_bound_function_type(
                        &self.types,
                        self.errors,
                        &mut ok,
                        ft,
                    );
                    match convert::bound_function_type(&ft.value) {
                        Some(converted) => self.function_type_map.define(converted),
                        None => {
                            self.error(loc, "unresolved type in function type");
                            ok = false;
                            self.function_type_map.skip_index();
                        }
                    }
                }
                DefinedType::Struct(st) => {
                    let mut field_map = NameMap::new();
                    let names: Vec<(Option<At<BindVar>>, Location)> = st
                        .fields
                        .iter()
                        .map(|f| (f.name.clone(), f.loc))
                        .collect();
                    define_reversed(&mut field_map, &names, self.errors, &mut ok);
                    for field in &mut st.fields {
                        Self::resolve_field_type(
                            &self.types,
                            self.errors,
                            &mut ok,
                            &mut field.value.field.value,
                        );
                    }
                    self.field_names.insert(type_index, field_map);
                    self.function_type_map.skip_index();
                }
                DefinedType::Array(at) => {
                    Self::resolve_field_type(
                        &self.types,
                        self.errors,
                        &mut ok,
                        &mut at.field.value,
                    );
                    self.function_type_map.skip_index();
                }
            }
            type_index += 1;
        }

        // Module-level names for the remaining index spaces.
        let mut functions = Vec::new();
        let mut tables = Vec::new();
        let mut memories = Vec::new();
        let mut globals = Vec::new();
        let mut tags = Vec::new();
        let mut elements = Vec::new();
        let mut datas = Vec::new();
        for item in &module.items {
            let loc = item.loc;
            match &item.value {
                ModuleItem::Import(import) => match &import.desc {
                    ImportDesc::Function { name, .. } => functions.push((name.clone(), loc)),
                    ImportDesc::Table { name, .. } => tables.push((name.clone(), loc)),
                    ImportDesc::Memory { name, .. } => memories.push((name.clone(), loc)),
                    ImportDesc::Global { name, .. } => globals.push((name.clone(), loc)),
                    ImportDesc::Tag { name, .. } => tags.push((name.clone(), loc)),
                },
                ModuleItem::Function(f) => functions.push((f.name.clone(), loc)),
                ModuleItem::Table(t) => tables.push((t.name.clone(), loc)),
                ModuleItem::Memory(m) => memories.push((m.name.clone(), loc)),
                ModuleItem::Global(g) => globals.push((g.name.clone(), loc)),
                ModuleItem::Tag(t) => tags.push((t.name.clone(), loc)),
                ModuleItem::Element(e) => elements.push((e.name.clone(), loc)),
                ModuleItem::Data(d) => datas.push((d.name.clone(), loc)),
                _ => {}
            }
        }
        define_reversed(&mut self.functions, &functions, self.errors, &mut ok);
        define_reversed(&mut self.tables, &tables, self.errors, &mut ok);
        define_reversed(&mut self.memories, &memories, self.errors, &mut ok);
        define_reversed(&mut self.globals, &globals, self.errors, &mut ok);
        define_reversed(&mut self.tags, &tags, self.errors, &mut ok);
        define_reversed(&mut self.element_segments, &elements, self.errors, &mut ok);
        define_reversed(&mut self.data_segments, &datas, self.errors, &mut ok);

        // Resolve every use.
        let mut items = std::mem::take(&mut module.items);
        for item in &mut items {
            ok &= self.resolve_item(item);
        }
        module.items = items;

        // Deferred implicit types become real entries at the end.
        for ty in self.function_type_map.take_deferred() {
            let loc = Location::default();
            let params = ty
                .params
                .iter()
                .map(|p| {
                    At::new(
                        loc,
                        BoundValueType {
                            name: None,
                            ty: At::new(loc, convert::unconvert_value_type(&p.value)),
                        },
                    )
                })
                .collect();
            let results = ty
                .results
                .iter()
                .map(|r| At::new(loc, convert::unconvert_value_type(&r.value)))
                .collect();
            module.items.push(At::new(
                loc,
                ModuleItem::Type(TypeEntry {
                    name: None,
                    ty: At::new(
                        loc,
                        DefinedType::Func(At::new(loc, BoundFunctionType { params, results })),
                    ),
                }),
            ));
        }

        ok
    }

    // -- var resolution ----------------------------------------------------

    fn map_for(&mut self, space: Space) -> &NameMap {
        match space {
            Space::Type => &self.types,
            Space::Function => &self.functions,
            Space::Table => &self.tables,
            Space::Memory => &self.memories,
            Space::Global => &self.globals,
            Space::Tag => &self.tags,
            Space::Element => &self.element_segments,
            Space::Data => &self.data_segments,
            Space::Local => &self.local_names,
            Space::Label => &self.label_names,
        }
    }

    fn resolve_var(&mut self, space: Space, var: &mut At<Var>) -> bool {
        let Var::Name(name) = &var.value else {
            return true;
        };
        let name = name.clone();
        match self.map_for(space).get(&name) {
            Some(index) => {
                var.value = Var::Index(index);
                true
            }
            None => {
                let loc = var.loc;
                self.error(loc, format!("undefined identifier {}", name));
                false
            }
        }
    }

    fn resolve_var_opt(&mut self, space: Space, var: &mut Option<At<Var>>) -> bool {
        match var {
            Some(var) => self.resolve_var(space, var),
            None => true,
        }
    }

    // -- type resolution (static helpers: borrow only the type map) --------

    fn resolve_heap_type(
        types: &NameMap,
        errors: &mut dyn Errors,
        ok: &mut bool,
        heap: &mut HeapType,
    ) {
        if let HeapType::Var(var) = heap {
            if let Var::Name(name) = &var.value {
                match types.get(name) {
                    Some(index) => var.value = Var::Index(index),
                    None => {
                        errors.on_error(var.loc, format!("undefined identifier {}", name));
                        *ok = false;
                    }
                }
            }
        }
    }

    fn resolve_value_type(
        types: &NameMap,
        errors: &mut dyn Errors,
        ok: &mut bool,
        ty: &mut ValueType,
    ) {
        match ty {
            ValueType::Numeric(_) => {}
            ValueType::Reference(ReferenceType::Ref(r)) => {
                Self::resolve_heap_type(types, errors, ok, &mut r.heap.value);
            }
            ValueType::Reference(_) => {}
            ValueType::Rtt(rtt) => {
                Self::resolve_heap_type(types, errors, ok, &mut rtt.heap.value);
            }
        }
    }

    fn resolve_field_type(
        types: &NameMap,
        errors: &mut dyn Errors,
        ok: &mut bool,
        field: &mut FieldType,
    ) {
        if let StorageType::Value(ty) = &mut field.ty.value {
            Self::resolve_value_type(types, errors, ok, ty);
        }
    }

    fn resolve_bound_function_type(
        types: &NameMap,
        errors: &mut dyn Errors,
        ok: &mut bool,
        ft: &mut At<BoundFunctionType>,
    ) {
        for param in &mut ft.value.params {
            Self::resolve_value_type(types, errors, ok, &mut param.value.ty.value);
        }
        for result in &mut ft.value.results {
            Self::resolve_value_type(types, errors, ok, &mut result.value);
        }
    }

    fn resolve_types_in_place(&mut self, ft: &mut At<BoundFunctionType>) -> bool {
        let mut ok = true;
        Self::resolve_bound_function_type(&self.types, self.errors, &mut ok, ft);
        ok
    }

    /// Resolve a type use. `require` forces an index to exist even
    /// for an empty inline type (functions, tags, call_indirect);
    /// blocks only need one when the signature demands it.
    fn resolve_type_use(&mut self, use_: &mut FunctionTypeUse, require: bool) -> bool {
        let mut ok = self.resolve_types_in_place(&mut use_.ty);
        if let Some(var) = &mut use_.type_use {
            let loc = var.loc;
            if !self.resolve_var(Space::Type, var) {
                return false;
            }
            let Some(index) = var.value.index() else {
                return false;
            };
            match self.function_type_map.get(index).cloned() {
                None => {
                    self.error(loc, format!("type {} is not a function type", index));
                    ok = false;
                }
                Some(defined) => {
                    if !use_.ty.value.is_empty() {
                        match convert::bound_function_type(&use_.ty.value) {
                            Some(explicit) if explicit != defined => {
                                self.error(
                                    loc,
                                    "explicit function type does not match the type use"
                                        .to_string(),
                                );
                                ok = false;
                            }
                            Some(_) => {}
                            None => ok = false,
                        }
                    }
                }
            }
            return ok;
        }
        let needs_index =
            require || !use_.ty.value.params.is_empty() || use_.ty.value.results.len() > 1;
        if needs_index {
            match convert::bound_function_type(&use_.ty.value) {
                Some(converted) => {
                    let index = self.function_type_map.use_type(converted);
                    use_.type_use = Some(At::new(use_.ty.loc, Var::Index(index)));
                }
                None => ok = false,
            }
        }
        ok
    }

    // -- items -------------------------------------------------------------

    fn resolve_item(&mut self, item: &mut At<ModuleItem>) -> bool {
        let loc = item.loc;
        match &mut item.value {
            ModuleItem::Type(_) => true,
            ModuleItem::Import(import) => self.resolve_import(import),
            ModuleItem::Function(func) => self.resolve_function(loc, func),
            ModuleItem::Table(table) => {
                let mut ok = true;
                if let TableBody::Type(ty) = &mut table.body {
                    if let ReferenceType::Ref(r) = &mut ty.value.elem_type.value {
                        Self::resolve_heap_type(
                            &self.types,
                            self.errors,
                            &mut ok,
                            &mut r.heap.value,
                        );
                    }
                }
                ok
            }
            ModuleItem::Memory(_) => true,
            ModuleItem::Global(global) => {
                let mut ok = true;
                Self::resolve_value_type(
                    &self.types,
                    self.errors,
                    &mut ok,
                    &mut global.ty.value.valtype.value,
                );
                if let Some(init) = &mut global.init {
                    ok &= self.resolve_expression(&mut init.value);
                }
                ok
            }
            ModuleItem::Tag(tag) => self.resolve_type_use(&mut tag.type_use, true),
            ModuleItem::Export(export) => {
                let space = match export.kind.value {
                    crate::types::ExternalKind::Function => Space::Function,
                    crate::types::ExternalKind::Table => Space::Table,
                    crate::types::ExternalKind::Memory => Space::Memory,
                    crate::types::ExternalKind::Global => Space::Global,
                    crate::types::ExternalKind::Tag => Space::Tag,
                };
                self.resolve_var(space, &mut export.var)
            }
            ModuleItem::Start(start) => self.resolve_var(Space::Function, &mut start.var),
            ModuleItem::Element(segment) => self.resolve_element_segment(segment),
            ModuleItem::Data(segment) => {
                let mut ok = true;
                if let DataMode::Active { memory, offset } = &mut segment.mode {
                    ok &= self.resolve_var_opt(Space::Memory, memory);
                    ok &= self.resolve_expression(&mut offset.value);
                }
                ok
            }
        }
    }

    fn resolve_import(&mut self, import: &mut Import) -> bool {
        match &mut import.desc {
            ImportDesc::Function { type_use, .. } | ImportDesc::Tag { type_use, .. } => {
                self.resolve_type_use(type_use, true)
            }
            ImportDesc::Table { ty, .. } => {
                let mut ok = true;
                if let ReferenceType::Ref(r) = &mut ty.value.elem_type.value {
                    Self::resolve_heap_type(&self.types, self.errors, &mut ok, &mut r.heap.value);
                }
                ok
            }
            ImportDesc::Memory { .. } => true,
            ImportDesc::Global { ty, .. } => {
                let mut ok = true;
                Self::resolve_value_type(
                    &self.types,
                    self.errors,
                    &mut ok,
                    &mut ty.value.valtype.value,
                );
                ok
            }
        }
    }

    fn resolve_element_segment(&mut self, segment: &mut ElementSegment) -> bool {
        let mut ok = true;
        if let ReferenceType::Ref(r) = &mut segment.elem_type.value {
            Self::resolve_heap_type(&self.types, self.errors, &mut ok, &mut r.heap.value);
        }
        if let SegmentMode::Active { table, offset } = &mut segment.mode {
            ok &= self.resolve_var_opt(Space::Table, table);
            ok &= self.resolve_expression(&mut offset.value);
        }
        match &mut segment.init {
            ElementInit::Vars(vars) => {
                for var in vars {
                    ok &= self.resolve_var(Space::Function, var);
                }
            }
            ElementInit::Expressions(exprs) => {
                for expr in exprs {
                    ok &= self.resolve_expression(&mut expr.value);
                }
            }
        }
        ok
    }

    fn resolve_function(&mut self, loc: Location, func: &mut Function) -> bool {
        let mut ok = self.resolve_type_use(&mut func.type_use, true);

        // Locals: parameters first, then declared locals, defined in
        // reverse so `get` yields forward indices and `let` frames
        // shift them.
        self.local_names.reset();
        self.label_names.reset();
        self.blocks.clear();

        let mut slots: Vec<(Option<At<BindVar>>, Location)> = Vec::new();
        if func.type_use.ty.value.params.is_empty() {
            // Params come from the type use; they are anonymous here.
            if let Some(index) = func.type_use.type_use.as_ref().and_then(|v| v.value.index()) {
                if let Some(ft) = self.function_type_map.get(index) {
                    for _ in &ft.params {
                        slots.push((None, loc));
                    }
                }
            }
        } else {
            for param in &func.type_use.ty.value.params {
                slots.push((param.value.name.clone(), param.loc));
            }
        }
        for local in &mut func.locals {
            Self::resolve_value_type(
                &self.types,
                self.errors,
                &mut ok,
                &mut local.value.ty.value,
            );
            slots.push((local.value.name.clone(), local.loc));
        }
        define_reversed(&mut self.local_names, &slots, self.errors, &mut ok);

        let mut instructions = std::mem::take(&mut func.instructions);
        for instr in &mut instructions {
            ok &= self.resolve_instruction(instr);
        }
        func.instructions = instructions;
        ok
    }

    // -- instructions ------------------------------------------------------

    fn plain_var_space(op: Opcode) -> Space {
        use Opcode::*;
        match op {
            Br | BrIf | BrOnNull | BrOnNonNull | Rethrow | Delegate => Space::Label,
            LocalGet | LocalSet | LocalTee => Space::Local,
            GlobalGet | GlobalSet => Space::Global,
            TableGet | TableSet | TableGrow | TableSize | TableFill => Space::Table,
            MemorySize | MemoryGrow | MemoryFill => Space::Memory,
            Call | ReturnCall | RefFunc => Space::Function,
            Throw | Catch => Space::Tag,
            ElemDrop => Space::Element,
            DataDrop => Space::Data,
            StructNewWithRtt | StructNewDefaultWithRtt | ArrayNewWithRtt
            | ArrayNewDefaultWithRtt | ArrayGet | ArrayGetS | ArrayGetU | ArraySet
            | ArrayLen => Space::Type,
            _ => Space::Function,
        }
    }

    fn begin_block(&mut self, op: Opcode, block: &mut BlockImmediate) -> bool {
        let ok = self.resolve_type_use(&mut block.type_use, false);
        self.label_names.push();
        self.label_names.declare(block.label.as_ref().map(|l| l.value.clone()));
        self.blocks.push(op);
        ok
    }

    fn end_block(&mut self) {
        self.label_names.pop();
        if self.blocks.pop() == Some(Opcode::Let) {
            self.local_names.pop();
        }
    }

    fn resolve_instruction(&mut self, instr: &mut At<Instruction>) -> bool {
        let op = instr.value.opcode.value;
        let mut ok = true;
        match &mut instr.value.immediate {
            Immediate::None => {
                if op == Opcode::End {
                    self.end_block();
                }
                // `else`, `catch_all` keep the current frame.
            }
            Immediate::S32(_) | Immediate::S64(_) | Immediate::F32(_) | Immediate::F64(_)
            | Immediate::V128(_) | Immediate::SimdLane(_) | Immediate::SimdShuffle(_)
            | Immediate::MemArg(_) => {}
            Immediate::Var(var) => {
                // `delegate` closes its try frame like `end`, and its
                // label is relative to the context outside the try.
                if op == Opcode::Delegate {
                    self.end_block();
                }
                let space = Self::plain_var_space(op);
                ok &= self.resolve_var(space, var);
            }
            Immediate::Block(block) => {
                ok &= self.begin_block(op, block);
            }
            Immediate::BrTable(imm) => {
                for target in &mut imm.targets {
                    ok &= self.resolve_var(Space::Label, target);
                }
                ok &= self.resolve_var(Space::Label, &mut imm.default_target);
            }
            Immediate::CallIndirect(imm) => {
                ok &= self.resolve_var_opt(Space::Table, &mut imm.table);
                ok &= self.resolve_type_use(&mut imm.type_use, true);
            }
            Immediate::Copy(imm) => {
                let space = if op == Opcode::TableCopy {
                    Space::Table
                } else {
                    Space::Memory
                };
                ok &= self.resolve_var_opt(space, &mut imm.dst);
                ok &= self.resolve_var_opt(space, &mut imm.src);
            }
            Immediate::Init(imm) => {
                let (segment_space, dst_space) = if op == Opcode::TableInit {
                    (Space::Element, Space::Table)
                } else {
                    (Space::Data, Space::Memory)
                };
                ok &= self.resolve_var(segment_space, &mut imm.segment);
                ok &= self.resolve_var_opt(dst_space, &mut imm.dst);
            }
            Immediate::SelectTypes(types) => {
                for ty in types {
                    let mut type_ok = true;
                    Self::resolve_value_type(
                        &self.types,
                        self.errors,
                        &mut type_ok,
                        &mut ty.value,
                    );
                    ok &= type_ok;
                }
            }
            Immediate::Let(imm) => {
                ok &= self.resolve_type_use(&mut imm.block.type_use, false);
                self.label_names.push();
                self.label_names
                    .declare(imm.block.label.as_ref().map(|l| l.value.clone()));
                self.blocks.push(Opcode::Let);
                // let-bound locals live in a fresh frame, shifting
                // the outer ones.
                self.local_names.push();
                let mut slots: Vec<(Option<At<BindVar>>, Location)> = Vec::new();
                for local in &mut imm.locals {
                    let mut type_ok = true;
                    Self::resolve_value_type(
                        &self.types,
                        self.errors,
                        &mut type_ok,
                        &mut local.value.ty.value,
                    );
                    ok &= type_ok;
                    slots.push((local.value.name.clone(), local.loc));
                }
                define_reversed(&mut self.local_names, &slots, self.errors, &mut ok);
            }
            Immediate::RefType(ty) => {
                if let ReferenceType::Ref(r) = &mut ty.value {
                    let mut type_ok = true;
                    Self::resolve_heap_type(
                        &self.types,
                        self.errors,
                        &mut type_ok,
                        &mut r.heap.value,
                    );
                    ok &= type_ok;
                }
            }
            Immediate::HeapType(heap) => {
                let mut type_ok = true;
                Self::resolve_heap_type(&self.types, self.errors, &mut type_ok, &mut heap.value);
                ok &= type_ok;
            }
            Immediate::BrOnCast(imm) => {
                ok &= self.resolve_var(Space::Label, &mut imm.target);
                ok &= self.resolve_heap_type_2(&mut imm.types);
            }
            Immediate::HeapType2(imm) => {
                ok &= self.resolve_heap_type_2(imm);
            }
            Immediate::RttSub(imm) => {
                ok &= self.resolve_heap_type_2(&mut imm.types);
            }
            Immediate::StructField(imm) => {
                ok &= self.resolve_var(Space::Type, &mut imm.struct_var);
                if let Some(struct_index) = imm.struct_var.value.index() {
                    if let Var::Name(field_name) = &imm.field_var.value {
                        let field_name = field_name.clone();
                        let found = self
                            .field_names
                            .get(&struct_index)
                            .and_then(|map| map.get(&field_name));
                        match found {
                            Some(index) => {
                                imm.field_var.value = Var::Index(index);
                            }
                            None => {
                                let loc = imm.field_var.loc;
                                self.error(
                                    loc,
                                    format!("undefined identifier {}", field_name),
                                );
                                ok = false;
                            }
                        }
                    }
                }
            }
            Immediate::SimdMemoryLane(_) => {}
            Immediate::FuncBind(use_) => {
                ok &= self.resolve_type_use(use_, true);
            }
        }
        ok
    }

    fn resolve_heap_type_2(&mut self, imm: &mut HeapType2Immediate) -> bool {
        let mut ok = true;
        Self::resolve_heap_type(&self.types, self.errors, &mut ok, &mut imm.parent.value);
        Self::resolve_heap_type(&self.types, self.errors, &mut ok, &mut imm.child.value);
        ok
    }

    fn resolve_expression(&mut self, instructions: &mut [At<Instruction>]) -> bool {
        let mut ok = true;
        for instr in instructions {
            ok &= self.resolve_instruction(instr);
        }
        ok
    }
}
