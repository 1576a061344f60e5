use crate::binary::{CustomContent, ElementInit, Module, SegmentMode};
use crate::errors::ErrorList;
use crate::features::Features;
use crate::types::{DefinedType, Immediate, Opcode, ValueType};
use crate::*;

fn decode(data: &[u8]) -> (Option<Module>, ErrorList) {
    let mut errors = ErrorList::new();
    let module = read_binary_module(data, Features::default(), &mut errors);
    (module, errors)
}

fn parse_wat(source: &str) -> (Option<Module>, ErrorList) {
    let mut errors = ErrorList::new();
    let module = read_text_module(source, Features::default(), &mut errors);
    (module, errors)
}

fn validated(source: &str) -> (bool, ErrorList) {
    let (module, parse_errors) = parse_wat(source);
    assert!(parse_errors.is_empty(), "{:?}", parse_errors.messages());
    let module = module.expect("module");
    let mut errors = ErrorList::new();
    let ok = validate_module(&module, Features::default(), &mut errors);
    (ok, errors)
}

#[test]
fn decode_empty_module() {
    let data = [
        0x00, 0x61, 0x73, 0x6d, // \0asm
        0x01, 0x00, 0x00, 0x00, // version 1
    ];
    let (module, errors) = decode(&data);
    assert!(errors.is_empty(), "{:?}", errors.messages());
    assert_eq!(module, Some(Module::default()));
}

#[test]
fn decode_unknown_version() {
    let data = [
        0x00, 0x61, 0x73, 0x6d, // \0asm
        0x02, 0x00, 0x00, 0x00, // version 2
    ];
    let (module, errors) = decode(&data);
    assert!(module.is_none());
    assert_eq!(errors.messages(), vec!["unknown version 2"]);
}

#[test]
fn decode_type_section() {
    let data = [
        0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
        0x01, 0x05, // type section, 5 bytes
        0x01, // one entry
        0x60, // function form
        0x01, 0x7f, // params [i32]
        0x01, 0x7f, // results [i32]
    ];
    let (module, errors) = decode(&data);
    assert!(errors.is_empty(), "{:?}", errors.messages());
    let module = module.expect("module");
    assert_eq!(module.types.len(), 1);
    let DefinedType::Func(ft) = &module.types[0].value else {
        panic!("expected a function type");
    };
    assert_eq!(ft.params.len(), 1);
    assert_eq!(ft.params[0].value, ValueType::I32);
    assert_eq!(ft.results.len(), 1);
    assert_eq!(ft.results[0].value, ValueType::I32);
}

#[test]
fn decode_bad_magic() {
    let data = [0x00, 0x61, 0x73, 0x00, 0x01, 0x00, 0x00, 0x00];
    let (module, errors) = decode(&data);
    assert!(module.is_none());
    assert_eq!(errors.len(), 1);
    assert!(errors.messages()[0].starts_with("bad magic value"));
}

#[test]
fn decode_truncated_section_is_fatal_but_keeps_prefix() {
    let data = [
        0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
        0x01, 0x05, 0x01, 0x60, 0x00, 0x00, // type section: [] -> []
        0x03, 0x7f, // function section claiming 127 bytes
    ];
    let (module, errors) = decode(&data);
    let module = module.expect("module");
    assert_eq!(module.types.len(), 1);
    assert!(errors
        .messages()
        .iter()
        .any(|m| m.contains("extends past the end")));
}

#[test]
fn decode_section_out_of_order() {
    let data = [
        0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
        0x03, 0x02, 0x01, 0x00, // function section: [0]
        0x01, 0x04, 0x01, 0x60, 0x00, 0x00, // type section after it
        0x0a, 0x04, 0x01, 0x02, 0x00, 0x0b, // code section: one empty body
    ];
    let (module, errors) = decode(&data);
    let module = module.expect("module");
    // The misplaced type section is dropped, everything else sticks.
    assert_eq!(module.types.len(), 0);
    assert_eq!(module.functions.len(), 1);
    assert_eq!(module.codes.len(), 1);
    assert!(errors
        .messages()
        .iter()
        .any(|m| m.contains("section out of order: type")));
}

#[test]
fn decode_code_count_mismatch_is_reported() {
    let data = [
        0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
        0x01, 0x04, 0x01, 0x60, 0x00, 0x00, // type section
        0x03, 0x02, 0x01, 0x00, // function section: [0]
        // no code section
    ];
    let (module, errors) = decode(&data);
    assert!(module.is_some());
    assert_eq!(errors.messages(), vec!["Expected code count of 1, but got 0"]);
}

#[test]
fn decode_data_count_mismatch_is_soft() {
    let data = [
        0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
        0x0c, 0x01, 0x02, // data count section: 2
        // no data section
    ];
    let (module, errors) = decode(&data);
    let module = module.expect("module");
    assert_eq!(module.data_count.map(|c| c.value), Some(2));
    assert_eq!(errors.messages(), vec!["Expected data count of 2, but got 0"]);
}

#[test]
fn decode_name_custom_section() {
    let data = [
        0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
        0x00, 0x0f, // custom section, 15 bytes
        0x04, 0x6e, 0x61, 0x6d, 0x65, // "name"
        0x00, 0x02, 0x01, 0x6d, // module name subsection: "m"
        0x01, 0x04, // function names subsection
        0x01, // one entry
        0x00, 0x01, 0x66, // function 0 is "f"
    ];
    let (module, errors) = decode(&data);
    assert!(errors.is_empty(), "{:?}", errors.messages());
    let module = module.expect("module");
    assert_eq!(module.customs.len(), 1);
    let CustomContent::Name(names) = &module.customs[0].content else {
        panic!("expected a name section");
    };
    assert_eq!(names.module_name.as_ref().map(|n| n.value.clone()), Some(b"m".to_vec()));
    assert_eq!(names.function_names.len(), 1);
    assert_eq!(names.function_names[0].index.value, 0);
    assert_eq!(names.function_names[0].name.value, b"f".to_vec());
}

#[test]
fn decode_linking_custom_section() {
    let data = [
        0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
        0x00, 0x11, // custom section, 17 bytes
        0x07, 0x6c, 0x69, 0x6e, 0x6b, 0x69, 0x6e, 0x67, // "linking"
        0x02, // version 2
        0x08, 0x06, // symbol table subsection, 6 bytes
        0x01, // one symbol
        0x00, // function kind
        0x00, // flags
        0x00, // index 0
        0x01, 0x66, // name "f"
    ];
    let (module, errors) = decode(&data);
    assert!(errors.is_empty(), "{:?}", errors.messages());
    let module = module.expect("module");
    let CustomContent::Linking(linking) = &module.customs[0].content else {
        panic!("expected a linking section");
    };
    assert_eq!(linking.version.map(|v| v.value), Some(2));
    assert_eq!(linking.symbols.len(), 1);
}

#[test]
fn decode_linking_section_rejects_other_versions() {
    let data = [
        0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
        0x00, 0x09, // custom section
        0x07, 0x6c, 0x69, 0x6e, 0x6b, 0x69, 0x6e, 0x67, // "linking"
        0x01, // version 1
    ];
    let (module, errors) = decode(&data);
    let module = module.expect("module");
    // The section is preserved verbatim even when undecodable.
    assert_eq!(module.customs.len(), 1);
    assert_eq!(module.customs[0].content, CustomContent::Unknown);
    assert!(errors
        .messages()
        .iter()
        .any(|m| m.contains("Expected linking section version: 2, got 1")));
}

#[test]
fn decode_reloc_custom_section() {
    let data = [
        0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
        0x00, 0x10, // custom section, 16 bytes
        0x0a, 0x72, 0x65, 0x6c, 0x6f, 0x63, 0x2e, 0x43, 0x4f, 0x44, 0x45, // "reloc.CODE"
        0x03, // section index 3
        0x01, // one entry
        0x00, // R_WASM_FUNCTION_INDEX_LEB, no addend
        0x05, // offset
        0x00, // index
    ];
    let (module, errors) = decode(&data);
    assert!(errors.is_empty(), "{:?}", errors.messages());
    let module = module.expect("module");
    let CustomContent::Reloc(reloc) = &module.customs[0].content else {
        panic!("expected a relocation section");
    };
    assert_eq!(reloc.section_index.value, 3);
    assert_eq!(reloc.entries.len(), 1);
    assert_eq!(reloc.entries[0].offset.value, 5);
    assert!(reloc.entries[0].addend.is_none());
}

// -- text pipeline ----------------------------------------------------------

#[test]
fn parse_resolve_validate_const_function() {
    let (module, errors) = parse_wat("(module (func (result i32) i32.const 42))");
    assert!(errors.is_empty(), "{:?}", errors.messages());
    let module = module.expect("module");

    // The implicit [] -> [i32] type is synthesized at the end.
    assert_eq!(module.types.len(), 1);
    let DefinedType::Func(ft) = &module.types[0].value else {
        panic!("expected a function type");
    };
    assert!(ft.params.is_empty());
    assert_eq!(ft.results.len(), 1);
    assert_eq!(ft.results[0].value, ValueType::I32);

    assert_eq!(module.functions.len(), 1);
    assert_eq!(module.functions[0].type_index.value, 0);
    let body = &module.codes[0].body.instructions;
    assert_eq!(body.len(), 2);
    assert_eq!(body[0].opcode.value, Opcode::I32Const);
    assert_eq!(body[0].immediate, Immediate::S32(At::new(Location::default(), 42)));
    assert_eq!(body[1].opcode.value, Opcode::End);

    let mut errors = ErrorList::new();
    assert!(validate_module(&module, Features::default(), &mut errors));
}

#[test]
fn validate_type_mismatch() {
    let (ok, errors) = validated("(module (func i32.const 1 i64.add))");
    assert!(!ok);
    assert_eq!(errors.messages()[0], "type mismatch: expected i64, got i32");
}

#[test]
fn resolve_duplicate_identifier() {
    let mut errors = ErrorList::new();
    let module =
        read_text_module("(module (func $a) (func $a))", Features::default(), &mut errors);
    assert!(module.is_none());
    assert!(errors
        .messages()
        .iter()
        .any(|m| m == "duplicate identifier $a"));
}

#[test]
fn resolve_undefined_identifier() {
    let mut errors = ErrorList::new();
    let module =
        read_text_module("(module (func call $missing))", Features::default(), &mut errors);
    assert!(module.is_none());
    assert!(errors
        .messages()
        .iter()
        .any(|m| m == "undefined identifier $missing"));
}

#[test]
fn resolve_shadowed_labels_innermost_wins() {
    let (module, errors) =
        parse_wat("(module (func (block $l (block $l (br $l)))))");
    assert!(errors.is_empty(), "{:?}", errors.messages());
    let module = module.expect("module");
    let body = &module.codes[0].body.instructions;
    // block, block, br, end, end, end
    assert_eq!(body[2].opcode.value, Opcode::Br);
    assert_eq!(body[2].immediate, Immediate::Index(At::new(Location::default(), 0)));
}

#[test]
fn resolve_locals_after_params() {
    let (module, errors) =
        parse_wat("(module (func (param $p i32) (local $x i64) local.get $x local.get $p drop drop))");
    assert!(errors.is_empty(), "{:?}", errors.messages());
    let module = module.expect("module");
    let body = &module.codes[0].body.instructions;
    assert_eq!(body[0].immediate, Immediate::Index(At::new(Location::default(), 1)));
    assert_eq!(body[1].immediate, Immediate::Index(At::new(Location::default(), 0)));
}

#[test]
fn resolve_type_use_consistency() {
    let mut errors = ErrorList::new();
    let source = "(module (type $t (func (param i32))) (func (type $t) (param f32)))";
    let module = read_text_module(source, Features::default(), &mut errors);
    assert!(module.is_none());
    assert!(errors
        .messages()
        .iter()
        .any(|m| m.contains("explicit function type does not match the type use")));
}

#[test]
fn resolve_reuses_equal_function_types() {
    let (module, errors) = parse_wat(
        "(module (type $t (func (param i32))) (func (param i32)) (func (param i32)))",
    );
    assert!(errors.is_empty(), "{:?}", errors.messages());
    let module = module.expect("module");
    // Both functions reuse the defined type; nothing is deferred.
    assert_eq!(module.types.len(), 1);
    assert_eq!(module.functions[0].type_index.value, 0);
    assert_eq!(module.functions[1].type_index.value, 0);
}

#[test]
fn deferred_types_append_in_first_use_order() {
    let (module, errors) = parse_wat(
        "(module (func (param i32)) (func (param f64)) (func (param i32)))",
    );
    assert!(errors.is_empty(), "{:?}", errors.messages());
    let module = module.expect("module");
    assert_eq!(module.types.len(), 2);
    let DefinedType::Func(first) = &module.types[0].value else {
        panic!()
    };
    assert_eq!(first.params[0].value, ValueType::I32);
    let DefinedType::Func(second) = &module.types[1].value else {
        panic!()
    };
    assert_eq!(second.params[0].value, ValueType::F64);
    assert_eq!(module.functions[0].type_index.value, 0);
    assert_eq!(module.functions[1].type_index.value, 1);
    assert_eq!(module.functions[2].type_index.value, 0);
}

#[test]
fn desugar_inline_export_and_import() {
    let (module, errors) = parse_wat(
        r#"(module
             (func $imported (import "env" "f") (param i32))
             (func $defined (export "go") (result i32) i32.const 7))"#,
    );
    assert!(errors.is_empty(), "{:?}", errors.messages());
    let module = module.expect("module");
    assert_eq!(module.imports.len(), 1);
    assert_eq!(module.imports[0].module.value, b"env".to_vec());
    assert_eq!(module.exports.len(), 1);
    assert_eq!(module.exports[0].name.value, b"go".to_vec());
    // The export refers to the index the definition received, after
    // the import.
    assert_eq!(module.exports[0].index.value, 1);
}

#[test]
fn desugar_inline_table_elem() {
    let (module, errors) =
        parse_wat("(module (func $f) (table funcref (elem $f $f)))");
    assert!(errors.is_empty(), "{:?}", errors.messages());
    let module = module.expect("module");
    assert_eq!(module.tables.len(), 1);
    let limits = module.tables[0].ty.limits;
    assert_eq!(limits.min, 2);
    assert_eq!(limits.max, Some(2));
    assert_eq!(module.element_segments.len(), 1);
    let segment = &module.element_segments[0].value;
    let SegmentMode::Active { table_index, .. } = &segment.mode else {
        panic!("expected an active segment");
    };
    assert_eq!(table_index.value, 0);
    let ElementInit::Indices(indices) = &segment.init else {
        panic!("expected function indices");
    };
    assert_eq!(indices.len(), 2);
    assert_eq!(indices[0].value, 0);
}

#[test]
fn desugar_inline_memory_data() {
    let (module, errors) = parse_wat(r#"(module (memory (data "hello")))"#);
    assert!(errors.is_empty(), "{:?}", errors.messages());
    let module = module.expect("module");
    assert_eq!(module.memories.len(), 1);
    assert_eq!(module.memories[0].ty.limits.min, 1);
    assert_eq!(module.memories[0].ty.limits.max, Some(1));
    assert_eq!(module.data_segments.len(), 1);
    assert_eq!(module.data_segments[0].init, b"hello".to_vec());
}

#[test]
fn folded_instructions_flatten_in_postorder() {
    let (module, errors) = parse_wat(
        "(module (func (result i32) (i32.add (i32.const 1) (i32.const 2))))",
    );
    assert!(errors.is_empty(), "{:?}", errors.messages());
    let module = module.expect("module");
    let ops: Vec<Opcode> = module.codes[0]
        .body
        .instructions
        .iter()
        .map(|i| i.opcode.value)
        .collect();
    assert_eq!(
        ops,
        vec![Opcode::I32Const, Opcode::I32Const, Opcode::I32Add, Opcode::End]
    );
}

// -- validator --------------------------------------------------------------

#[test]
fn validate_unreachable_is_stack_polymorphic() {
    let (ok, errors) = validated("(module (func (result i32) unreachable i32.add))");
    assert!(ok, "{:?}", errors.messages());
}

#[test]
fn validate_branch_to_loop_takes_params() {
    let source = "(module (func i32.const 0 loop (param i32) br 0 end))";
    let (ok, errors) = validated(source);
    assert!(ok, "{:?}", errors.messages());
}

#[test]
fn validate_if_without_else_must_be_balanced() {
    let (ok, errors) =
        validated("(module (func (result i32) i32.const 1 if (result i32) i32.const 2 end))");
    assert!(!ok);
    assert!(errors
        .messages()
        .iter()
        .any(|m| m.contains("if without else")));
}

#[test]
fn validate_start_function_signature() {
    let (ok, errors) =
        validated("(module (func $s (result i32) i32.const 1) (start $s))");
    assert!(!ok);
    assert!(errors
        .messages()
        .iter()
        .any(|m| m.contains("start function must have type [] -> []")));
}

#[test]
fn validate_duplicate_export_names() {
    let (ok, errors) = validated(
        r#"(module (func $f) (export "x" (func $f)) (export "x" (func $f)))"#,
    );
    assert!(!ok);
    assert!(errors
        .messages()
        .iter()
        .any(|m| m.contains("duplicate export name")));
}

#[test]
fn validate_memory_init_requires_data_count() {
    // Binary without a data count section but with memory.init.
    let data = [
        0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
        0x01, 0x04, 0x01, 0x60, 0x00, 0x00, // type: [] -> []
        0x03, 0x02, 0x01, 0x00, // function section
        0x05, 0x03, 0x01, 0x00, 0x01, // memory section: min 1, no max
        0x0a, 0x0e, 0x01, // code section, one body
        0x0c, // body size 12
        0x00, // no locals
        0x41, 0x00, // i32.const 0
        0x41, 0x00, // i32.const 0
        0x41, 0x00, // i32.const 0
        0xfc, 0x08, 0x00, 0x00, // memory.init 0 0
        0x0b, // end
    ];
    let (module, errors) = decode(&data);
    assert!(errors.is_empty(), "{:?}", errors.messages());
    let module = module.expect("module");
    let mut errors = ErrorList::new();
    assert!(!validate_module(&module, Features::default(), &mut errors));
    assert!(errors
        .messages()
        .iter()
        .any(|m| m.contains("memory.init requires a data count section")));
}

#[test]
fn validate_global_initializer_rules() {
    let (ok, errors) = validated(
        "(module (global $a i32 (i32.const 1)) (global $b i32 (global.get $a)))",
    );
    assert!(!ok);
    assert!(errors
        .messages()
        .iter()
        .any(|m| m.contains("can only reference an imported global")));

    let (ok, errors) = validated(
        r#"(module (global $imp (import "env" "g") i32) (global $b i32 (global.get $imp)))"#,
    );
    assert!(ok, "{:?}", errors.messages());
}

#[test]
fn validate_ref_func_requires_declaration() {
    let (ok, errors) = validated("(module (func $f ref.func $f drop))");
    assert!(!ok);
    assert!(errors
        .messages()
        .iter()
        .any(|m| m.contains("undeclared function reference")));

    let (ok, errors) =
        validated("(module (func $f ref.func $f drop) (elem declare func $f))");
    assert!(ok, "{:?}", errors.messages());
}

// -- round trips ------------------------------------------------------------

#[test]
fn binary_round_trip() {
    let source = r#"
      (module
        (type $t (func (param i32) (result i32)))
        (import "env" "mul" (func $mul (type $t)))
        (memory 1 2)
        (table 2 funcref)
        (global $g (mut i32) (i32.const 7))
        (func $id (type $t) local.get 0)
        (func $main (result i32)
          (block $b (result i32)
            i32.const 3
            call $mul
            br $b))
        (export "main" (func $main))
        (start $start)
        (func $start global.get $g global.set $g)
        (elem (i32.const 0) func $id $main)
        (data (i32.const 0) "abc"))
    "#;
    let (module, errors) = parse_wat(source);
    assert!(errors.is_empty(), "{:?}", errors.messages());
    let mut module = module.expect("module");
    // Exercise the data count section as well.
    module.data_count = Some(At::new(Location::default(), 1));

    let bytes = write_binary_module(&module);
    let mut errors = ErrorList::new();
    let reread = read_binary_module(&bytes, Features::default(), &mut errors);
    assert!(errors.is_empty(), "{:?}", errors.messages());
    // Structural equality; locations differ and are ignored.
    assert_eq!(reread, Some(module));
}

#[test]
fn text_and_binary_validation_agree() {
    let sources = [
        "(module (func (result i32) i32.const 42))",
        "(module (func (param i32) (result i32) local.get 0))",
        "(module (memory 1) (func (result i32) i32.const 0 i32.load))",
    ];
    for source in sources {
        let (module, errors) = parse_wat(source);
        assert!(errors.is_empty(), "{:?}", errors.messages());
        let module = module.expect("module");

        let mut direct = ErrorList::new();
        let direct_ok = validate_module(&module, Features::default(), &mut direct);

        let bytes = write_binary_module(&module);
        let mut decode_errors = ErrorList::new();
        let reread = read_binary_module(&bytes, Features::default(), &mut decode_errors)
            .expect("module");
        let mut indirect = ErrorList::new();
        let indirect_ok = validate_module(&reread, Features::default(), &mut indirect);

        assert_eq!(direct_ok, indirect_ok, "{}", source);
        assert_eq!(direct.len(), indirect.len(), "{}", source);
    }
}
