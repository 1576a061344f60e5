//! Hand-written recursive-descent parser from the token stream to the
//! raw text AST. Folded instructions are flattened in postorder;
//! abbreviations (inline imports/exports, inline elem/data) are kept
//! as written and expanded by the desugarer.

use crate::errors::Errors;
use crate::features::Features;
use crate::span::{At, Location};
use crate::text::lex::Lexer;
use crate::text::num;
use crate::text::token::{Token, TokenKind};
use crate::text::types::*;
use crate::types::{
    ExternalKind, IndexType, Limits, Mutability, NumericType, Opcode, PackedType,
};

pub fn parse_module(
    source: &str,
    features: Features,
    errors: &mut dyn Errors,
) -> Option<TextModule> {
    let mut parser = Parser { lexer: Lexer::new(source), errors, features };
    parser.parse_module()
}

struct Parser<'a, 'e> {
    lexer: Lexer<'a>,
    errors: &'e mut dyn Errors,
    features: Features,
}

impl<'a, 'e> Parser<'a, 'e> {
    fn peek(&mut self, n: usize) -> &Token {
        self.lexer.peek(&mut *self.errors, n)
    }

    fn read(&mut self) -> Token {
        self.lexer.read(&mut *self.errors)
    }

    fn error(&mut self, loc: Location, message: impl Into<String>) {
        self.errors.on_error(loc, message.into());
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let loc = self.peek(0).loc;
        self.error(loc, message);
    }

    fn expect_lpar(&mut self) -> Option<Location> {
        let token = self.read();
        if token.kind == TokenKind::Lpar {
            Some(token.loc)
        } else {
            self.error(token.loc, format!("expected (, got {:?}", token.text));
            None
        }
    }

    fn expect_rpar(&mut self) -> Option<()> {
        let token = self.read();
        if token.kind == TokenKind::Rpar {
            Some(())
        } else {
            self.error(token.loc, format!("expected ), got {:?}", token.text));
            None
        }
    }

    fn expect_word(&mut self, word: &str) -> Option<Location> {
        let token = self.read();
        if token.is_word(word) {
            Some(token.loc)
        } else {
            self.error(token.loc, format!("expected {}, got {:?}", word, token.text));
            None
        }
    }

    fn match_word(&mut self, word: &str) -> bool {
        if self.peek(0).is_word(word) {
            self.read();
            true
        } else {
            false
        }
    }

    fn peek_lpar_word(&mut self, word: &str) -> bool {
        self.peek(0).kind == TokenKind::Lpar && self.peek(1).is_word(word)
    }

    /// Consume `( word` if the next two tokens match.
    fn match_lpar_word(&mut self, word: &str) -> Option<Location> {
        if self.peek_lpar_word(word) {
            let loc = self.read().loc;
            self.read();
            Some(loc)
        } else {
            None
        }
    }

    /// Error recovery: skip to the matching close paren, assuming one
    /// paren is already open.
    fn skip_to_close(&mut self) {
        let mut depth = 1usize;
        loop {
            match self.peek(0).kind {
                TokenKind::Eof => return,
                TokenKind::Lpar => {
                    depth += 1;
                    self.read();
                }
                TokenKind::Rpar => {
                    self.read();
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {
                    self.read();
                }
            }
        }
    }

    fn parse_bind_var_opt(&mut self) -> Option<At<BindVar>> {
        if self.peek(0).kind == TokenKind::Id {
            let token = self.read();
            Some(At::new(token.loc, token.text))
        } else {
            None
        }
    }

    fn parse_var(&mut self) -> Option<At<Var>> {
        match self.parse_var_opt() {
            Some(var) => Some(var),
            None => {
                let token = self.read();
                self.error(token.loc, format!("expected an index or name, got {:?}", token.text));
                None
            }
        }
    }

    fn parse_var_opt(&mut self) -> Option<At<Var>> {
        match self.peek(0).kind {
            TokenKind::Nat => {
                let token = self.read();
                let info = token.literal?;
                match num::parse_u32(info, &token.text) {
                    Some(index) => Some(At::new(token.loc, Var::Index(index))),
                    None => {
                        self.error(token.loc, format!("invalid index: {}", token.text));
                        None
                    }
                }
            }
            TokenKind::Id => {
                let token = self.read();
                Some(At::new(token.loc, Var::Name(token.text)))
            }
            _ => None,
        }
    }

    fn parse_string(&mut self, what: &str) -> Option<At<Vec<u8>>> {
        let token = self.read();
        if token.kind != TokenKind::String {
            self.error(token.loc, format!("expected {}, got {:?}", what, token.text));
            return None;
        }
        token.string.map(|bytes| At::new(token.loc, bytes))
    }

    /// String that must be valid UTF-8 (module, import, export names).
    fn parse_utf8_string(&mut self, what: &str) -> Option<At<Vec<u8>>> {
        let string = self.parse_string(what)?;
        if std::str::from_utf8(&string.value).is_err() {
            self.error(string.loc, format!("invalid UTF-8 encoding in {}", what));
            return None;
        }
        Some(string)
    }

    fn parse_nat_u32(&mut self, what: &str) -> Option<At<u32>> {
        let token = self.read();
        let value = token
            .literal
            .filter(|_| token.kind == TokenKind::Nat)
            .and_then(|info| num::parse_u32(info, &token.text));
        match value {
            Some(v) => Some(At::new(token.loc, v)),
            None => {
                self.error(token.loc, format!("expected {}, got {:?}", what, token.text));
                None
            }
        }
    }

    fn parse_nat_u64(&mut self, what: &str) -> Option<At<u64>> {
        let token = self.read();
        let value = token
            .literal
            .filter(|_| token.kind == TokenKind::Nat)
            .and_then(|info| num::parse_unsigned(info, &token.text, u64::MAX));
        match value {
            Some(v) => Some(At::new(token.loc, v)),
            None => {
                self.error(token.loc, format!("expected {}, got {:?}", what, token.text));
                None
            }
        }
    }

    // -- types -------------------------------------------------------------

    fn feature_gate(&mut self, loc: Location, enabled: Features, what: &str) -> Option<()> {
        if self.features.contains(enabled) {
            Some(())
        } else {
            self.error(loc, format!("{} not allowed", what));
            None
        }
    }

    fn parse_heap_type(&mut self) -> Option<At<HeapType>> {
        let token = self.peek(0).clone();
        let heap = match token.text.as_str() {
            "func" => HeapType::Func,
            "extern" => HeapType::Extern,
            "any" => HeapType::Any,
            "eq" => HeapType::Eq,
            "i31" => HeapType::I31,
            _ => {
                let var = self.parse_var()?;
                return Some(At::new(var.loc, HeapType::Var(var)));
            }
        };
        self.read();
        Some(At::new(token.loc, heap))
    }

    fn parse_reference_type(&mut self) -> Option<At<ReferenceType>> {
        let token = self.peek(0).clone();
        let simple = match token.text.as_str() {
            "funcref" => Some(ReferenceType::Funcref),
            "externref" => Some(ReferenceType::Externref),
            "anyref" => Some(ReferenceType::Anyref),
            "eqref" => Some(ReferenceType::Eqref),
            "i31ref" => Some(ReferenceType::I31ref),
            _ => None,
        };
        if let Some(simple) = simple {
            match simple {
                ReferenceType::Funcref => {}
                ReferenceType::Externref => {
                    self.feature_gate(token.loc, Features::REFERENCE_TYPES, "externref")?;
                }
                _ => {
                    self.feature_gate(token.loc, Features::GC, &token.text)?;
                }
            }
            self.read();
            return Some(At::new(token.loc, simple));
        }
        if let Some(loc) = self.match_lpar_word("ref") {
            self.feature_gate(loc, Features::FUNCTION_REFERENCES, "(ref …)")?;
            let nullable = self.match_word("null");
            let heap = self.parse_heap_type()?;
            self.expect_rpar()?;
            return Some(At::new(loc, ReferenceType::Ref(RefType { heap, nullable })));
        }
        let loc = token.loc;
        self.error(loc, format!("expected a reference type, got {:?}", token.text));
        None
    }

    fn parse_value_type(&mut self) -> Option<At<ValueType>> {
        let token = self.peek(0).clone();
        let numeric = match token.text.as_str() {
            "i32" => Some(NumericType::I32),
            "i64" => Some(NumericType::I64),
            "f32" => Some(NumericType::F32),
            "f64" => Some(NumericType::F64),
            "v128" => Some(NumericType::V128),
            _ => None,
        };
        if let Some(numeric) = numeric {
            if numeric == NumericType::V128 {
                self.feature_gate(token.loc, Features::SIMD, "v128")?;
            }
            self.read();
            return Some(At::new(token.loc, ValueType::Numeric(numeric)));
        }
        if let Some(loc) = self.match_lpar_word("rtt") {
            self.feature_gate(loc, Features::GC, "rtt")?;
            let depth = self.parse_nat_u32("rtt depth")?;
            let heap = self.parse_heap_type()?;
            self.expect_rpar()?;
            return Some(At::new(loc, ValueType::Rtt(Rtt { depth, heap })));
        }
        let reference = self.parse_reference_type()?;
        Some(At::new(reference.loc, ValueType::Reference(reference.value)))
    }

    fn parse_storage_type(&mut self) -> Option<At<StorageType>> {
        let token = self.peek(0).clone();
        match token.text.as_str() {
            "i8" => {
                self.read();
                Some(At::new(token.loc, StorageType::Packed(PackedType::I8)))
            }
            "i16" => {
                self.read();
                Some(At::new(token.loc, StorageType::Packed(PackedType::I16)))
            }
            _ => {
                let vt = self.parse_value_type()?;
                Some(At::new(vt.loc, StorageType::Value(vt.value)))
            }
        }
    }

    fn parse_field_type(&mut self) -> Option<At<FieldType>> {
        if let Some(loc) = self.match_lpar_word("mut") {
            let ty = self.parse_storage_type()?;
            self.expect_rpar()?;
            return Some(At::new(
                loc,
                FieldType { ty, mutability: At::new(loc, Mutability::Var) },
            ));
        }
        let ty = self.parse_storage_type()?;
        let loc = ty.loc;
        Some(At::new(
            loc,
            FieldType { ty, mutability: At::new(loc, Mutability::Const) },
        ))
    }

    fn parse_global_type(&mut self) -> Option<At<GlobalType>> {
        if let Some(loc) = self.match_lpar_word("mut") {
            let valtype = self.parse_value_type()?;
            self.expect_rpar()?;
            return Some(At::new(
                loc,
                GlobalType { valtype, mutability: At::new(loc, Mutability::Var) },
            ));
        }
        let valtype = self.parse_value_type()?;
        let loc = valtype.loc;
        Some(At::new(
            loc,
            GlobalType { valtype, mutability: At::new(loc, Mutability::Const) },
        ))
    }

    fn parse_limits(&mut self) -> Option<At<Limits>> {
        let start = self.peek(0).loc;
        let index_type = if self.match_word("i64") {
            self.feature_gate(start, Features::MEMORY64, "i64 limits")?;
            IndexType::I64
        } else {
            self.match_word("i32");
            IndexType::I32
        };
        let min = self.parse_nat_u64("limits minimum")?;
        let max = if self.peek(0).kind == TokenKind::Nat {
            Some(self.parse_nat_u64("limits maximum")?.value)
        } else {
            None
        };
        let shared = if self.match_word("shared") {
            self.feature_gate(start, Features::THREADS, "shared limits")?;
            true
        } else {
            false
        };
        Some(At::new(
            start,
            Limits { min: min.value, max, shared, index_type },
        ))
    }

    /// `(param …)* (result …)*` with an optional leading `(type $x)`.
    fn parse_type_use(&mut self) -> Option<FunctionTypeUse> {
        let type_use = if let Some(_loc) = self.match_lpar_word("type") {
            let var = self.parse_var()?;
            self.expect_rpar()?;
            Some(var)
        } else {
            None
        };
        let ty = self.parse_bound_function_type()?;
        Some(FunctionTypeUse { type_use, ty })
    }

    fn parse_bound_function_type(&mut self) -> Option<At<BoundFunctionType>> {
        let start = self.peek(0).loc;
        let mut params: Vec<At<BoundValueType>> = Vec::new();
        while let Some(loc) = self.match_lpar_word("param") {
            if let Some(name) = self.parse_bind_var_opt() {
                let ty = self.parse_value_type()?;
                params.push(At::new(loc, BoundValueType { name: Some(name), ty }));
                self.expect_rpar()?;
            } else {
                while self.peek(0).kind != TokenKind::Rpar {
                    let ty = self.parse_value_type()?;
                    params.push(At::new(ty.loc, BoundValueType { name: None, ty }));
                }
                self.read();
            }
        }
        let mut results: Vec<At<ValueType>> = Vec::new();
        while self.match_lpar_word("result").is_some() {
            while self.peek(0).kind != TokenKind::Rpar {
                results.push(self.parse_value_type()?);
            }
            self.read();
        }
        Some(At::new(start, BoundFunctionType { params, results }))
    }

    // -- module ------------------------------------------------------------

    fn parse_module(&mut self) -> Option<TextModule> {
        let mut module = TextModule::default();
        if self.peek(0).kind == TokenKind::Eof {
            return Some(module);
        }
        self.expect_lpar()?;
        self.expect_word("module")?;
        module.name = self.parse_bind_var_opt();
        while self.peek(0).kind == TokenKind::Lpar {
            if let Some(item) = self.parse_item() {
                module.items.push(item);
            }
        }
        self.expect_rpar()?;
        let trailing = self.peek(0).clone();
        if trailing.kind != TokenKind::Eof {
            self.error(trailing.loc, format!("unexpected token after module: {:?}", trailing.text));
        }
        Some(module)
    }

    /// One `(field …)`. Returns `None` after recovering to the next
    /// field so one bad field doesn't hide the rest.
    fn parse_item(&mut self) -> Option<At<ModuleItem>> {
        let start = self.peek(0).loc;
        let keyword = self.peek(1).text.clone();
        let item = match keyword.as_str() {
            "type" => self.parse_type_entry().map(ModuleItem::Type),
            "import" => self.parse_import().map(ModuleItem::Import),
            "func" => self.parse_func().map(ModuleItem::Function),
            "table" => self.parse_table().map(ModuleItem::Table),
            "memory" => self.parse_memory().map(ModuleItem::Memory),
            "global" => self.parse_global().map(ModuleItem::Global),
            "tag" => self.parse_tag().map(ModuleItem::Tag),
            "export" => self.parse_export().map(ModuleItem::Export),
            "start" => self.parse_start().map(ModuleItem::Start),
            "elem" => self.parse_elem().map(ModuleItem::Element),
            "data" => self.parse_data().map(ModuleItem::Data),
            other => {
                self.error(start, format!("unexpected module field: {:?}", other));
                None
            }
        };
        match item {
            Some(item) => Some(At::new(Location::new(start.start, self.peek(0).loc.start), item)),
            None => {
                // parse_* consumed the opening paren of the field.
                self.skip_to_close();
                None
            }
        }
    }

    fn parse_type_entry(&mut self) -> Option<TypeEntry> {
        self.expect_lpar()?;
        self.expect_word("type")?;
        let name = self.parse_bind_var_opt();
        let loc = self.expect_lpar()?;
        let keyword = self.read();
        let ty = match keyword.text.as_str() {
            "func" => {
                let ft = self.parse_bound_function_type()?;
                self.expect_rpar()?;
                DefinedType::Func(ft)
            }
            "struct" => {
                self.feature_gate(keyword.loc, Features::GC, "struct types")?;
                let mut fields = Vec::new();
                while let Some(field_loc) = self.match_lpar_word("field") {
                    let field_name = self.parse_bind_var_opt();
                    if field_name.is_some() {
                        let field = self.parse_field_type()?;
                        fields.push(At::new(
                            field_loc,
                            BoundField { name: field_name, field },
                        ));
                        self.expect_rpar()?;
                    } else {
                        while self.peek(0).kind != TokenKind::Rpar {
                            let field = self.parse_field_type()?;
                            fields.push(At::new(field.loc, BoundField { name: None, field }));
                        }
                        self.read();
                    }
                }
                self.expect_rpar()?;
                DefinedType::Struct(At::new(loc, StructType { fields }))
            }
            "array" => {
                self.feature_gate(keyword.loc, Features::GC, "array types")?;
                let field = if self.match_lpar_word("field").is_some() {
                    let field = self.parse_field_type()?;
                    self.expect_rpar()?;
                    field
                } else {
                    self.parse_field_type()?
                };
                self.expect_rpar()?;
                DefinedType::Array(At::new(loc, ArrayType { field }))
            }
            other => {
                self.error(keyword.loc, format!("expected a type form, got {:?}", other));
                return None;
            }
        };
        self.expect_rpar()?;
        Some(TypeEntry { name, ty: At::new(loc, ty) })
    }

    fn parse_import(&mut self) -> Option<Import> {
        self.expect_lpar()?;
        self.expect_word("import")?;
        let module = self.parse_utf8_string("import module name")?;
        let name = self.parse_utf8_string("import field name")?;
        self.expect_lpar()?;
        let keyword = self.read();
        let bound = self.parse_bind_var_opt();
        let desc = match keyword.text.as_str() {
            "func" => ImportDesc::Function { name: bound, type_use: self.parse_type_use()? },
            "table" => {
                let start = self.peek(0).loc;
                let limits = self.parse_limits()?;
                let elem_type = self.parse_reference_type()?;
                ImportDesc::Table {
                    name: bound,
                    ty: At::new(start, TableType { limits, elem_type }),
                }
            }
            "memory" => ImportDesc::Memory { name: bound, ty: self.parse_limits()? },
            "global" => ImportDesc::Global { name: bound, ty: self.parse_global_type()? },
            "tag" => {
                self.feature_gate(keyword.loc, Features::EXCEPTIONS, "tags")?;
                ImportDesc::Tag { name: bound, type_use: self.parse_type_use()? }
            }
            other => {
                self.error(keyword.loc, format!("unexpected import kind: {:?}", other));
                return None;
            }
        };
        self.expect_rpar()?;
        self.expect_rpar()?;
        Some(Import { module, name, desc })
    }

    fn parse_inline_export_import(
        &mut self,
    ) -> Option<(Vec<At<InlineExport>>, Option<At<InlineImport>>)> {
        let mut exports = Vec::new();
        while let Some(loc) = self.match_lpar_word("export") {
            let name = self.parse_utf8_string("export name")?;
            self.expect_rpar()?;
            exports.push(At::new(loc, InlineExport { name }));
        }
        let import = if let Some(loc) = self.match_lpar_word("import") {
            let module = self.parse_utf8_string("import module name")?;
            let name = self.parse_utf8_string("import field name")?;
            self.expect_rpar()?;
            Some(At::new(loc, InlineImport { module, name }))
        } else {
            None
        };
        Some((exports, import))
    }

    fn parse_func(&mut self) -> Option<Function> {
        self.expect_lpar()?;
        self.expect_word("func")?;
        let name = self.parse_bind_var_opt();
        let (exports, import) = self.parse_inline_export_import()?;
        let type_use = self.parse_type_use()?;
        if import.is_some() {
            self.expect_rpar()?;
            return Some(Function {
                name,
                exports,
                import,
                type_use,
                locals: Vec::new(),
                instructions: Vec::new(),
            });
        }
        let locals = self.parse_locals()?;
        let mut instructions = Vec::new();
        self.parse_instruction_list(&mut instructions, &[])?;
        self.expect_rpar()?;
        Some(Function { name, exports, import, type_use, locals, instructions })
    }

    fn parse_locals(&mut self) -> Option<Vec<At<BoundValueType>>> {
        let mut locals = Vec::new();
        while let Some(loc) = self.match_lpar_word("local") {
            if let Some(name) = self.parse_bind_var_opt() {
                let ty = self.parse_value_type()?;
                locals.push(At::new(loc, BoundValueType { name: Some(name), ty }));
                self.expect_rpar()?;
            } else {
                while self.peek(0).kind != TokenKind::Rpar {
                    let ty = self.parse_value_type()?;
                    locals.push(At::new(ty.loc, BoundValueType { name: None, ty }));
                }
                self.read();
            }
        }
        Some(locals)
    }

    fn parse_table(&mut self) -> Option<Table> {
        self.expect_lpar()?;
        self.expect_word("table")?;
        let name = self.parse_bind_var_opt();
        let (exports, import) = self.parse_inline_export_import()?;
        // Inline elem form: reference type then (elem …).
        let reference_keyword = matches!(
            self.peek(0).text.as_str(),
            "funcref" | "externref" | "anyref" | "eqref" | "i31ref"
        );
        let body = if reference_keyword || self.peek_lpar_word("ref") {
            let elem_type = self.parse_reference_type()?;
            if self.match_lpar_word("elem").is_some() {
                let init = self.parse_element_list()?;
                self.expect_rpar()?;
                TableBody::Inline { elem_type, init }
            } else {
                self.error_here("expected (elem …) after inline table type");
                return None;
            }
        } else {
            let start = self.peek(0).loc;
            let limits = self.parse_limits()?;
            let elem_type = self.parse_reference_type()?;
            TableBody::Type(At::new(start, TableType { limits, elem_type }))
        };
        self.expect_rpar()?;
        Some(Table { name, exports, import, body })
    }

    fn parse_memory(&mut self) -> Option<Memory> {
        self.expect_lpar()?;
        self.expect_word("memory")?;
        let name = self.parse_bind_var_opt();
        let (exports, import) = self.parse_inline_export_import()?;
        let body = if self.match_lpar_word("data").is_some() {
            let mut data = Vec::new();
            while self.peek(0).kind == TokenKind::String {
                if let Some(bytes) = self.parse_string("data string") {
                    data.extend_from_slice(&bytes.value);
                }
            }
            self.expect_rpar()?;
            MemoryBody::Inline { data }
        } else {
            MemoryBody::Type(self.parse_limits()?)
        };
        self.expect_rpar()?;
        Some(Memory { name, exports, import, body })
    }

    fn parse_global(&mut self) -> Option<Global> {
        self.expect_lpar()?;
        self.expect_word("global")?;
        let name = self.parse_bind_var_opt();
        let (exports, import) = self.parse_inline_export_import()?;
        let ty = self.parse_global_type()?;
        let init = if import.is_none() {
            let start = self.peek(0).loc;
            let mut instructions = Vec::new();
            self.parse_instruction_list(&mut instructions, &[])?;
            Some(At::new(start, instructions))
        } else {
            None
        };
        self.expect_rpar()?;
        Some(Global { name, exports, import, ty, init })
    }

    fn parse_tag(&mut self) -> Option<Tag> {
        let loc = self.expect_lpar()?;
        self.expect_word("tag")?;
        self.feature_gate(loc, Features::EXCEPTIONS, "tags")?;
        let name = self.parse_bind_var_opt();
        let (exports, import) = self.parse_inline_export_import()?;
        let type_use = self.parse_type_use()?;
        self.expect_rpar()?;
        Some(Tag { name, exports, import, type_use })
    }

    fn parse_export(&mut self) -> Option<Export> {
        self.expect_lpar()?;
        self.expect_word("export")?;
        let name = self.parse_utf8_string("export name")?;
        self.expect_lpar()?;
        let keyword = self.read();
        let kind = match keyword.text.as_str() {
            "func" => ExternalKind::Function,
            "table" => ExternalKind::Table,
            "memory" => ExternalKind::Memory,
            "global" => ExternalKind::Global,
            "tag" => ExternalKind::Tag,
            other => {
                self.error(keyword.loc, format!("unexpected export kind: {:?}", other));
                return None;
            }
        };
        let var = self.parse_var()?;
        self.expect_rpar()?;
        self.expect_rpar()?;
        Some(Export { name, kind: At::new(keyword.loc, kind), var })
    }

    fn parse_start(&mut self) -> Option<Start> {
        self.expect_lpar()?;
        self.expect_word("start")?;
        let var = self.parse_var()?;
        self.expect_rpar()?;
        Some(Start { var })
    }

    /// `(offset instr*)` or a single folded instruction.
    fn parse_offset(&mut self) -> Option<At<ConstantExpression>> {
        let start = self.peek(0).loc;
        let mut instructions = Vec::new();
        if self.match_lpar_word("offset").is_some() {
            self.parse_instruction_list(&mut instructions, &[])?;
            self.expect_rpar()?;
        } else {
            self.parse_folded_instruction(&mut instructions)?;
        }
        Some(At::new(start, instructions))
    }

    fn parse_element_expression(&mut self) -> Option<At<ConstantExpression>> {
        let start = self.peek(0).loc;
        let mut instructions = Vec::new();
        if self.match_lpar_word("item").is_some() {
            self.parse_instruction_list(&mut instructions, &[])?;
            self.expect_rpar()?;
        } else {
            self.parse_folded_instruction(&mut instructions)?;
        }
        Some(At::new(start, instructions))
    }

    fn parse_element_list(&mut self) -> Option<ElementInit> {
        if self.peek(0).kind == TokenKind::Lpar {
            let mut exprs = Vec::new();
            while self.peek(0).kind == TokenKind::Lpar {
                exprs.push(self.parse_element_expression()?);
            }
            Some(ElementInit::Expressions(exprs))
        } else {
            let mut vars = Vec::new();
            while let Some(var) = self.parse_var_opt() {
                vars.push(var);
            }
            Some(ElementInit::Vars(vars))
        }
    }

    fn parse_elem(&mut self) -> Option<ElementSegment> {
        self.expect_lpar()?;
        self.expect_word("elem")?;
        let name = self.parse_bind_var_opt();
        let declared = self.match_word("declare");
        let table = if let Some(_loc) = self.match_lpar_word("table") {
            let var = self.parse_var()?;
            self.expect_rpar()?;
            Some(var)
        } else if !declared
            && matches!(self.peek(0).kind, TokenKind::Nat | TokenKind::Id)
        {
            // Legacy form: (elem 0 (i32.const 0) …).
            self.parse_var_opt()
        } else {
            None
        };
        let mode = if declared {
            SegmentMode::Declared
        } else if self.peek(0).kind == TokenKind::Lpar && !self.peek_lpar_word("item") {
            SegmentMode::Active { table, offset: self.parse_offset()? }
        } else if table.is_some() {
            self.error_here("expected an offset expression");
            return None;
        } else {
            SegmentMode::Passive
        };
        // Element list: `func idx*`, a reference type with
        // expressions, or bare function indices.
        let (elem_type, init) = if self.match_word("func") {
            let init = self.parse_element_list()?;
            (At::new(self.peek(0).loc, ReferenceType::Funcref), init)
        } else if self.peek(0).kind == TokenKind::Word || self.peek_lpar_word("ref") {
            let elem_type = self.parse_reference_type()?;
            let init = self.parse_element_list()?;
            (elem_type, init)
        } else {
            let init = self.parse_element_list()?;
            (At::new(self.peek(0).loc, ReferenceType::Funcref), init)
        };
        self.expect_rpar()?;
        Some(ElementSegment { name, mode, elem_type, init })
    }

    fn parse_data(&mut self) -> Option<DataSegment> {
        self.expect_lpar()?;
        self.expect_word("data")?;
        let name = self.parse_bind_var_opt();
        let memory = if let Some(_loc) = self.match_lpar_word("memory") {
            let var = self.parse_var()?;
            self.expect_rpar()?;
            Some(var)
        } else if matches!(self.peek(0).kind, TokenKind::Nat | TokenKind::Id)
            && self.peek(1).kind == TokenKind::Lpar
        {
            self.parse_var_opt()
        } else {
            None
        };
        let mode = if self.peek(0).kind == TokenKind::Lpar {
            DataMode::Active { memory, offset: self.parse_offset()? }
        } else if memory.is_some() {
            self.error_here("expected an offset expression");
            return None;
        } else {
            DataMode::Passive
        };
        let mut init = Vec::new();
        while self.peek(0).kind == TokenKind::String {
            if let Some(bytes) = self.parse_string("data string") {
                init.extend_from_slice(&bytes.value);
            }
        }
        self.expect_rpar()?;
        Some(DataSegment { name, mode, init })
    }

    // -- instructions ------------------------------------------------------

    /// Parse instructions until a closing paren (left unconsumed) or
    /// one of `terminators` (consumed). Returns the terminator word.
    fn parse_instruction_list(
        &mut self,
        out: &mut Vec<At<Instruction>>,
        terminators: &[&str],
    ) -> Option<String> {
        loop {
            let token = self.peek(0).clone();
            match token.kind {
                TokenKind::Rpar => return Some(String::new()),
                TokenKind::Eof => {
                    self.error(token.loc, "unexpected end of input");
                    return None;
                }
                TokenKind::Lpar => {
                    self.parse_folded_instruction(out)?;
                }
                TokenKind::Word => {
                    if terminators.contains(&token.text.as_str()) {
                        self.read();
                        return Some(token.text);
                    }
                    self.parse_flat_instruction(out)?;
                }
                _ => {
                    self.read();
                    self.error(token.loc, format!("unexpected token: {:?}", token.text));
                    return None;
                }
            }
        }
    }

    fn lookup_opcode(&mut self, token: &Token) -> Option<Opcode> {
        let Some(op) = Opcode::from_mnemonic(&token.text) else {
            self.error(token.loc, format!("unknown operator: {}", token.text));
            return None;
        };
        if !op.is_enabled(self.features) {
            self.error(token.loc, format!("opcode not allowed: {}", token.text));
            return None;
        }
        Some(op)
    }

    fn parse_flat_instruction(&mut self, out: &mut Vec<At<Instruction>>) -> Option<()> {
        let token = self.read();
        let op = self.lookup_opcode(&token)?;
        match op {
            Opcode::Block | Opcode::Loop => self.parse_flat_block(out, token.loc, op),
            Opcode::If => self.parse_flat_if(out, token.loc),
            Opcode::Try => self.parse_flat_try(out, token.loc),
            Opcode::Let => self.parse_flat_let(out, token.loc),
            _ => {
                let instr = self.parse_plain_instruction(token.loc, op)?;
                out.push(instr);
                Some(())
            }
        }
    }

    fn parse_block_immediate(&mut self) -> Option<BlockImmediate> {
        let label = self.parse_bind_var_opt();
        let type_use = self.parse_type_use()?;
        Some(BlockImmediate { label, type_use })
    }

    /// The optional label after `end`/`else` must repeat the block
    /// label.
    fn check_end_label(&mut self, label: &Option<At<BindVar>>) {
        if let Some(end_label) = self.parse_bind_var_opt() {
            if label.as_ref().map(|l| &l.value) != Some(&end_label.value) {
                self.error(
                    end_label.loc,
                    format!("mismatched label: {}", end_label.value),
                );
            }
        }
    }

    fn parse_flat_block(
        &mut self,
        out: &mut Vec<At<Instruction>>,
        loc: Location,
        op: Opcode,
    ) -> Option<()> {
        let imm = self.parse_block_immediate()?;
        let label = imm.label.clone();
        out.push(At::new(
            loc,
            Instruction { opcode: At::new(loc, op), immediate: Immediate::Block(imm) },
        ));
        let terminator = self.parse_instruction_list(out, &["end"])?;
        if terminator.is_empty() {
            self.error_here("expected end");
            return None;
        }
        self.check_end_label(&label);
        out.push(end_instruction(self.peek(0).loc));
        Some(())
    }

    fn parse_flat_if(&mut self, out: &mut Vec<At<Instruction>>, loc: Location) -> Option<()> {
        let imm = self.parse_block_immediate()?;
        let label = imm.label.clone();
        out.push(At::new(
            loc,
            Instruction { opcode: At::new(loc, Opcode::If), immediate: Immediate::Block(imm) },
        ));
        let terminator = self.parse_instruction_list(out, &["else", "end"])?;
        match terminator.as_str() {
            "else" => {
                let else_loc = self.peek(0).loc;
                self.check_end_label(&label);
                out.push(At::new(
                    else_loc,
                    Instruction {
                        opcode: At::new(else_loc, Opcode::Else),
                        immediate: Immediate::None,
                    },
                ));
                let terminator = self.parse_instruction_list(out, &["end"])?;
                if terminator.is_empty() {
                    self.error_here("expected end");
                    return None;
                }
            }
            "end" => {}
            _ => {
                self.error_here("expected end");
                return None;
            }
        }
        self.check_end_label(&label);
        out.push(end_instruction(self.peek(0).loc));
        Some(())
    }

    fn parse_flat_try(&mut self, out: &mut Vec<At<Instruction>>, loc: Location) -> Option<()> {
        let imm = self.parse_block_immediate()?;
        let label = imm.label.clone();
        out.push(At::new(
            loc,
            Instruction { opcode: At::new(loc, Opcode::Try), immediate: Immediate::Block(imm) },
        ));
        let mut terminator =
            self.parse_instruction_list(out, &["catch", "catch_all", "delegate", "end"])?;
        loop {
            match terminator.as_str() {
                "catch" => {
                    let catch_loc = self.peek(0).loc;
                    let tag = self.parse_var()?;
                    out.push(At::new(
                        catch_loc,
                        Instruction {
                            opcode: At::new(catch_loc, Opcode::Catch),
                            immediate: Immediate::Var(tag),
                        },
                    ));
                    terminator =
                        self.parse_instruction_list(out, &["catch", "catch_all", "end"])?;
                }
                "catch_all" => {
                    let catch_loc = self.peek(0).loc;
                    out.push(At::new(
                        catch_loc,
                        Instruction {
                            opcode: At::new(catch_loc, Opcode::CatchAll),
                            immediate: Immediate::None,
                        },
                    ));
                    terminator = self.parse_instruction_list(out, &["end"])?;
                }
                "delegate" => {
                    let delegate_loc = self.peek(0).loc;
                    let depth = self.parse_var()?;
                    out.push(At::new(
                        delegate_loc,
                        Instruction {
                            opcode: At::new(delegate_loc, Opcode::Delegate),
                            immediate: Immediate::Var(depth),
                        },
                    ));
                    return Some(());
                }
                "end" => {
                    self.check_end_label(&label);
                    out.push(end_instruction(self.peek(0).loc));
                    return Some(());
                }
                _ => {
                    self.error_here("expected end");
                    return None;
                }
            }
        }
    }

    fn parse_flat_let(&mut self, out: &mut Vec<At<Instruction>>, loc: Location) -> Option<()> {
        let block = self.parse_block_immediate()?;
        let label = block.label.clone();
        let locals = self.parse_locals()?;
        out.push(At::new(
            loc,
            Instruction {
                opcode: At::new(loc, Opcode::Let),
                immediate: Immediate::Let(LetImmediate { block, locals }),
            },
        ));
        let terminator = self.parse_instruction_list(out, &["end"])?;
        if terminator.is_empty() {
            self.error_here("expected end");
            return None;
        }
        self.check_end_label(&label);
        out.push(end_instruction(self.peek(0).loc));
        Some(())
    }

    /// `(op …)`: operands are flattened before the operator.
    fn parse_folded_instruction(&mut self, out: &mut Vec<At<Instruction>>) -> Option<()> {
        let lpar = self.expect_lpar()?;
        let token = self.read();
        if token.kind != TokenKind::Word {
            self.error(token.loc, format!("expected an instruction, got {:?}", token.text));
            return None;
        }
        let op = self.lookup_opcode(&token)?;
        match op {
            Opcode::Block | Opcode::Loop => {
                let imm = self.parse_block_immediate()?;
                out.push(At::new(
                    lpar,
                    Instruction {
                        opcode: At::new(token.loc, op),
                        immediate: Immediate::Block(imm),
                    },
                ));
                self.parse_instruction_list(out, &[])?;
                self.expect_rpar()?;
                out.push(end_instruction(lpar));
                Some(())
            }
            Opcode::If => self.parse_folded_if(out, lpar, token.loc),
            Opcode::Try => self.parse_folded_try(out, lpar, token.loc),
            Opcode::Let => {
                let block = self.parse_block_immediate()?;
                let locals = self.parse_locals()?;
                out.push(At::new(
                    lpar,
                    Instruction {
                        opcode: At::new(token.loc, Opcode::Let),
                        immediate: Immediate::Let(LetImmediate { block, locals }),
                    },
                ));
                self.parse_instruction_list(out, &[])?;
                self.expect_rpar()?;
                out.push(end_instruction(lpar));
                Some(())
            }
            _ => {
                let instr = self.parse_plain_instruction(token.loc, op)?;
                // Folded operands run before the operator.
                while self.peek(0).kind == TokenKind::Lpar {
                    self.parse_folded_instruction(out)?;
                }
                self.expect_rpar()?;
                out.push(instr);
                Some(())
            }
        }
    }

    fn parse_folded_if(
        &mut self,
        out: &mut Vec<At<Instruction>>,
        lpar: Location,
        op_loc: Location,
    ) -> Option<()> {
        let imm = self.parse_block_immediate()?;
        // Condition expressions come before (then …).
        while self.peek(0).kind == TokenKind::Lpar && !self.peek_lpar_word("then") {
            self.parse_folded_instruction(out)?;
        }
        out.push(At::new(
            lpar,
            Instruction {
                opcode: At::new(op_loc, Opcode::If),
                immediate: Immediate::Block(imm),
            },
        ));
        if self.match_lpar_word("then").is_none() {
            self.error_here("expected (then …)");
            return None;
        }
        self.parse_instruction_list(out, &[])?;
        self.expect_rpar()?;
        if let Some(else_loc) = self.match_lpar_word("else") {
            out.push(At::new(
                else_loc,
                Instruction {
                    opcode: At::new(else_loc, Opcode::Else),
                    immediate: Immediate::None,
                },
            ));
            self.parse_instruction_list(out, &[])?;
            self.expect_rpar()?;
        }
        self.expect_rpar()?;
        out.push(end_instruction(lpar));
        Some(())
    }

    fn parse_folded_try(
        &mut self,
        out: &mut Vec<At<Instruction>>,
        lpar: Location,
        op_loc: Location,
    ) -> Option<()> {
        let imm = self.parse_block_immediate()?;
        out.push(At::new(
            lpar,
            Instruction {
                opcode: At::new(op_loc, Opcode::Try),
                immediate: Immediate::Block(imm),
            },
        ));
        if self.match_lpar_word("do").is_none() {
            self.error_here("expected (do …)");
            return None;
        }
        self.parse_instruction_list(out, &[])?;
        self.expect_rpar()?;
        loop {
            if let Some(catch_loc) = self.match_lpar_word("catch") {
                let tag = self.parse_var()?;
                out.push(At::new(
                    catch_loc,
                    Instruction {
                        opcode: At::new(catch_loc, Opcode::Catch),
                        immediate: Immediate::Var(tag),
                    },
                ));
                self.parse_instruction_list(out, &[])?;
                self.expect_rpar()?;
            } else if let Some(catch_loc) = self.match_lpar_word("catch_all") {
                out.push(At::new(
                    catch_loc,
                    Instruction {
                        opcode: At::new(catch_loc, Opcode::CatchAll),
                        immediate: Immediate::None,
                    },
                ));
                self.parse_instruction_list(out, &[])?;
                self.expect_rpar()?;
            } else if let Some(delegate_loc) = self.match_lpar_word("delegate") {
                let depth = self.parse_var()?;
                out.push(At::new(
                    delegate_loc,
                    Instruction {
                        opcode: At::new(delegate_loc, Opcode::Delegate),
                        immediate: Immediate::Var(depth),
                    },
                ));
                self.expect_rpar()?;
                self.expect_rpar()?;
                return Some(());
            } else {
                break;
            }
        }
        self.expect_rpar()?;
        out.push(end_instruction(lpar));
        Some(())
    }

    fn parse_plain_instruction(
        &mut self,
        loc: Location,
        mut op: Opcode,
    ) -> Option<At<Instruction>> {
        use crate::types::ImmediateKind as K;
        let immediate = match op.immediate_kind() {
            K::Empty => {
                // `select` with a result annotation is the typed form.
                if op == Opcode::Select && self.peek_lpar_word("result") {
                    self.feature_gate(loc, Features::REFERENCE_TYPES, "typed select")?;
                    op = Opcode::SelectT;
                    let mut types = Vec::new();
                    while self.match_lpar_word("result").is_some() {
                        while self.peek(0).kind != TokenKind::Rpar {
                            types.push(self.parse_value_type()?);
                        }
                        self.read();
                    }
                    Immediate::SelectTypes(types)
                } else {
                    Immediate::None
                }
            }
            K::S32 => Immediate::S32(self.parse_s32_literal()?),
            K::S64 => Immediate::S64(self.parse_s64_literal()?),
            K::F32 => Immediate::F32(self.parse_f32_literal()?),
            K::F64 => Immediate::F64(self.parse_f64_literal()?),
            K::V128 => Immediate::V128(self.parse_v128_literal()?),
            K::Index => match op {
                // Mem ops default to memory/table 0 with no operand.
                Opcode::MemorySize | Opcode::MemoryGrow | Opcode::MemoryFill => {
                    match self.parse_var_opt() {
                        Some(var) => Immediate::Var(var),
                        None => Immediate::Var(At::new(loc, Var::Index(0))),
                    }
                }
                _ => Immediate::Var(self.parse_var()?),
            },
            K::BlockType => {
                // Blocks are parsed structurally, never here.
                Immediate::Block(self.parse_block_immediate()?)
            }
            K::BrTable => {
                let mut targets = vec![self.parse_var()?];
                while let Some(var) = self.parse_var_opt() {
                    targets.push(var);
                }
                let default_target = targets.pop()?;
                Immediate::BrTable(BrTableImmediate { targets, default_target })
            }
            K::CallIndirect => {
                let table = self.parse_var_opt();
                let type_use = self.parse_type_use()?;
                Immediate::CallIndirect(CallIndirectImmediate { table, type_use })
            }
            K::Copy => {
                let first = self.parse_var_opt();
                let second = first.is_some().then(|| self.parse_var_opt()).flatten();
                match (first, second) {
                    (Some(dst), Some(src)) => {
                        Immediate::Copy(CopyImmediate { dst: Some(dst), src: Some(src) })
                    }
                    (first, None) => {
                        // A single operand names both sides.
                        Immediate::Copy(CopyImmediate { dst: first.clone(), src: first })
                    }
                    (None, Some(_)) => return None,
                }
            }
            K::Init => {
                let first = self.parse_var()?;
                match self.parse_var_opt() {
                    Some(segment) => Immediate::Init(InitImmediate {
                        segment,
                        dst: Some(first),
                    }),
                    None => Immediate::Init(InitImmediate { segment: first, dst: None }),
                }
            }
            K::MemArg => Immediate::MemArg(self.parse_memarg()?),
            K::SelectTypes => Immediate::SelectTypes(Vec::new()),
            K::SimdLane => Immediate::SimdLane(self.parse_lane_u8()?),
            K::SimdShuffle => {
                let start = self.peek(0).loc;
                let mut lanes = [0u8; 16];
                for lane in &mut lanes {
                    *lane = self.parse_lane_u8()?.value;
                }
                Immediate::SimdShuffle(At::new(start, lanes))
            }
            K::Let => {
                let block = self.parse_block_immediate()?;
                let locals = self.parse_locals()?;
                Immediate::Let(LetImmediate { block, locals })
            }
            K::RefType => Immediate::RefType(self.parse_reference_type()?),
            K::HeapType => Immediate::HeapType(self.parse_heap_type()?),
            K::BrOnCast => {
                let target = self.parse_var()?;
                let parent = self.parse_heap_type()?;
                let child = self.parse_heap_type()?;
                Immediate::BrOnCast(BrOnCastImmediate {
                    target,
                    types: HeapType2Immediate { parent, child },
                })
            }
            K::HeapType2 => {
                let parent = self.parse_heap_type()?;
                let child = self.parse_heap_type()?;
                Immediate::HeapType2(HeapType2Immediate { parent, child })
            }
            K::RttSub => {
                let depth = self.parse_nat_u32("rtt depth")?;
                let parent = self.parse_heap_type()?;
                let child = self.parse_heap_type()?;
                Immediate::RttSub(RttSubImmediate {
                    depth,
                    types: HeapType2Immediate { parent, child },
                })
            }
            K::StructField => {
                let struct_var = self.parse_var()?;
                let field_var = self.parse_var()?;
                Immediate::StructField(StructFieldImmediate { struct_var, field_var })
            }
            K::SimdMemoryLane => {
                let memarg = self.parse_memarg()?;
                let lane = self.parse_lane_u8()?;
                Immediate::SimdMemoryLane(SimdMemoryLaneImmediate { memarg, lane })
            }
            K::FuncBind => Immediate::FuncBind(self.parse_type_use()?),
        };
        Some(At::new(loc, Instruction { opcode: At::new(loc, op), immediate }))
    }

    fn parse_memarg(&mut self) -> Option<MemArgImmediate> {
        let mut offset = None;
        let mut align_log2 = None;
        if self.peek(0).kind == TokenKind::Word || self.peek(0).kind == TokenKind::Reserved {
            let token = self.peek(0).clone();
            if let Some(text) = token.text.strip_prefix("offset=") {
                self.read();
                match num::parse_nat_text(text, u64::MAX) {
                    Some(value) => offset = Some(At::new(token.loc, value)),
                    None => {
                        self.error(token.loc, format!("invalid offset: {}", token.text));
                        return None;
                    }
                }
            }
        }
        if self.peek(0).kind == TokenKind::Word || self.peek(0).kind == TokenKind::Reserved {
            let token = self.peek(0).clone();
            if let Some(text) = token.text.strip_prefix("align=") {
                self.read();
                let align = num::parse_nat_text(text, u64::from(u32::MAX));
                match align {
                    Some(value) if value.is_power_of_two() => {
                        align_log2 = Some(At::new(token.loc, value.trailing_zeros()));
                    }
                    Some(_) => {
                        self.error(token.loc, "alignment must be a power of 2");
                        return None;
                    }
                    None => {
                        self.error(token.loc, format!("invalid alignment: {}", token.text));
                        return None;
                    }
                }
            }
        }
        Some(MemArgImmediate { align_log2, offset })
    }

    fn parse_lane_u8(&mut self) -> Option<At<u8>> {
        let token = self.read();
        let value = token
            .literal
            .filter(|_| matches!(token.kind, TokenKind::Nat))
            .and_then(|info| num::parse_u8(info, &token.text));
        match value {
            Some(v) => Some(At::new(token.loc, v)),
            None => {
                self.error(token.loc, format!("invalid lane index: {}", token.text));
                None
            }
        }
    }

    fn parse_s32_literal(&mut self) -> Option<At<i32>> {
        let token = self.read();
        let value = token
            .literal
            .filter(|_| matches!(token.kind, TokenKind::Nat | TokenKind::Int))
            .and_then(|info| num::parse_i32(info, &token.text));
        match value {
            Some(v) => Some(At::new(token.loc, v)),
            None => {
                self.error(token.loc, format!("invalid literal: {}", token.text));
                None
            }
        }
    }

    fn parse_s64_literal(&mut self) -> Option<At<i64>> {
        let token = self.read();
        let value = token
            .literal
            .filter(|_| matches!(token.kind, TokenKind::Nat | TokenKind::Int))
            .and_then(|info| num::parse_i64(info, &token.text));
        match value {
            Some(v) => Some(At::new(token.loc, v)),
            None => {
                self.error(token.loc, format!("invalid literal: {}", token.text));
                None
            }
        }
    }

    fn parse_f32_literal(&mut self) -> Option<At<f32>> {
        let token = self.read();
        let value = token
            .literal
            .filter(|_| {
                matches!(token.kind, TokenKind::Nat | TokenKind::Int | TokenKind::Float)
            })
            .and_then(|info| num::parse_f32(info, &token.text));
        match value {
            Some(v) => Some(At::new(token.loc, v)),
            None => {
                self.error(token.loc, format!("invalid literal: {}", token.text));
                None
            }
        }
    }

    fn parse_f64_literal(&mut self) -> Option<At<f64>> {
        let token = self.read();
        let value = token
            .literal
            .filter(|_| {
                matches!(token.kind, TokenKind::Nat | TokenKind::Int | TokenKind::Float)
            })
            .and_then(|info| num::parse_f64(info, &token.text));
        match value {
            Some(v) => Some(At::new(token.loc, v)),
            None => {
                self.error(token.loc, format!("invalid literal: {}", token.text));
                None
            }
        }
    }

    /// Integer lane of a `v128.const`, in the two's-complement range
    /// of the given width.
    fn parse_lane_bits(&mut self, bits: u32) -> Option<u64> {
        let token = self.read();
        let value = token
            .literal
            .filter(|_| matches!(token.kind, TokenKind::Nat | TokenKind::Int))
            .and_then(|info| num::parse_int_bits(info, &token.text, bits));
        match value {
            Some(v) => Some(v),
            None => {
                self.error(token.loc, format!("invalid lane literal: {}", token.text));
                None
            }
        }
    }

    /// `v128.const shape lane*`.
    fn parse_v128_literal(&mut self) -> Option<At<[u8; 16]>> {
        let shape = self.read();
        let start = shape.loc;
        let mut bytes = [0u8; 16];
        match shape.text.as_str() {
            "i8x16" => {
                for i in 0..16 {
                    bytes[i] = self.parse_lane_bits(8)? as u8;
                }
            }
            "i16x8" => {
                for i in 0..8 {
                    let value = self.parse_lane_bits(16)? as u16;
                    bytes[i * 2..i * 2 + 2].copy_from_slice(&value.to_le_bytes());
                }
            }
            "i32x4" => {
                for i in 0..4 {
                    let value = self.parse_lane_bits(32)? as u32;
                    bytes[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
                }
            }
            "i64x2" => {
                for i in 0..2 {
                    let value = self.parse_lane_bits(64)?;
                    bytes[i * 8..i * 8 + 8].copy_from_slice(&value.to_le_bytes());
                }
            }
            "f32x4" => {
                for i in 0..4 {
                    let value = self.parse_f32_literal()?;
                    bytes[i * 4..i * 4 + 4].copy_from_slice(&value.value.to_le_bytes());
                }
            }
            "f64x2" => {
                for i in 0..2 {
                    let value = self.parse_f64_literal()?;
                    bytes[i * 8..i * 8 + 8].copy_from_slice(&value.value.to_le_bytes());
                }
            }
            other => {
                self.error(start, format!("unexpected v128 shape: {:?}", other));
                return None;
            }
        }
        Some(At::new(start, bytes))
    }
}

fn end_instruction(loc: Location) -> At<Instruction> {
    At::new(
        loc,
        Instruction { opcode: At::new(loc, Opcode::End), immediate: Immediate::None },
    )
}
