use crate::{Args, DumpArgs};

use std::fs;

use anyhow::Result;

use wasm_rs::binary::{CustomContent, ElementInit, ImportDesc, Module};
use wasm_rs::{ErrorList, Features};

pub fn dump(args: &Args, sub: &DumpArgs, features: Features) -> Result<i32> {
    let data = fs::read(&args.input)?;
    let mut errors = ErrorList::new();

    let Some(module) = wasm_rs::read_binary_module(&data, features, &mut errors) else {
        for line in errors.display_binary() {
            eprintln!("{}: {}", args.input.display(), line);
        }
        return Ok(2);
    };
    // Decoding is best effort; dump what was recovered but still
    // report what went wrong.
    for line in errors.display_binary() {
        eprintln!("{}: {}", args.input.display(), line);
    }

    if sub.headers || !(sub.details || sub.disassemble) {
        dump_headers(&module);
    }
    if sub.details {
        dump_details(&module);
    }
    if sub.disassemble {
        dump_code(&module);
    }

    if errors.is_empty() {
        Ok(0)
    } else {
        Ok(2)
    }
}

fn dump_headers(module: &Module) {
    println!("Sections:");
    let counts: [(&str, usize); 10] = [
        ("type", module.types.len()),
        ("import", module.imports.len()),
        ("function", module.functions.len()),
        ("table", module.tables.len()),
        ("memory", module.memories.len()),
        ("tag", module.tags.len()),
        ("global", module.globals.len()),
        ("export", module.exports.len()),
        ("element", module.element_segments.len()),
        ("data", module.data_segments.len()),
    ];
    for (name, count) in counts {
        if count > 0 {
            println!("  {:<8} count: {}", name, count);
        }
    }
    if let Some(start) = &module.start {
        println!("  start    function: {}", start.func_index.value);
    }
    if let Some(count) = &module.data_count {
        println!("  data count: {}", count.value);
    }
    for custom in &module.customs {
        println!(
            "  custom   \"{}\" ({} bytes)",
            String::from_utf8_lossy(&custom.name.value),
            custom.data.len()
        );
    }
}

fn dump_details(module: &Module) {
    for (i, ty) in module.types.iter().enumerate() {
        println!("type[{}]: {:?}", i, ty.value);
    }
    for (i, import) in module.imports.iter().enumerate() {
        let desc = match &import.desc {
            ImportDesc::Function(index) => format!("func type {}", index.value),
            ImportDesc::Table(ty) => format!("table {:?}", ty.value),
            ImportDesc::Memory(ty) => format!("memory {:?}", ty.limits.value),
            ImportDesc::Global(ty) => format!("global {:?}", ty.value),
            ImportDesc::Tag(ty) => format!("tag type {}", ty.type_index.value),
        };
        println!(
            "import[{}]: \"{}\".\"{}\" {}",
            i,
            String::from_utf8_lossy(&import.module.value),
            String::from_utf8_lossy(&import.name.value),
            desc
        );
    }
    for (i, function) in module.functions.iter().enumerate() {
        println!("func[{}]: type {}", i, function.type_index.value);
    }
    for (i, table) in module.tables.iter().enumerate() {
        println!("table[{}]: {:?}", i, table.ty.value);
    }
    for (i, memory) in module.memories.iter().enumerate() {
        println!("memory[{}]: {:?}", i, memory.ty.limits.value);
    }
    for (i, global) in module.globals.iter().enumerate() {
        println!("global[{}]: {:?}", i, global.ty.value);
    }
    for (i, export) in module.exports.iter().enumerate() {
        println!(
            "export[{}]: \"{}\" {} {}",
            i,
            String::from_utf8_lossy(&export.name.value),
            export.kind.value,
            export.index.value
        );
    }
    for (i, segment) in module.element_segments.iter().enumerate() {
        let count = match &segment.init {
            ElementInit::Indices(indices) => indices.len(),
            ElementInit::Expressions(exprs) => exprs.len(),
        };
        println!(
            "elem[{}]: {:?} {} ({} entries)",
            i, segment.mode, segment.elem_type.value, count
        );
    }
    for (i, segment) in module.data_segments.iter().enumerate() {
        println!("data[{}]: {:?} ({} bytes)", i, segment.mode, segment.init.len());
    }
    for custom in &module.customs {
        match &custom.content {
            CustomContent::Name(names) => {
                if let Some(name) = &names.module_name {
                    println!("name: module \"{}\"", String::from_utf8_lossy(&name.value));
                }
                for assoc in &names.function_names {
                    println!(
                        "name: func[{}] \"{}\"",
                        assoc.index.value,
                        String::from_utf8_lossy(&assoc.name.value)
                    );
                }
            }
            CustomContent::Linking(linking) => {
                println!("linking: {} symbols", linking.symbols.len());
            }
            CustomContent::Reloc(reloc) => {
                println!(
                    "reloc \"{}\": section {} ({} entries)",
                    String::from_utf8_lossy(&custom.name.value),
                    reloc.section_index.value,
                    reloc.entries.len()
                );
            }
            CustomContent::Unknown => {}
        }
    }
}

fn dump_code(module: &Module) {
    for (i, code) in module.codes.iter().enumerate() {
        println!("func[{}]:", i);
        let mut indent = 1usize;
        for instr in &code.body.instructions {
            let op = instr.opcode.value;
            if matches!(
                op,
                wasm_rs::types::Opcode::End
                    | wasm_rs::types::Opcode::Else
                    | wasm_rs::types::Opcode::Catch
                    | wasm_rs::types::Opcode::CatchAll
                    | wasm_rs::types::Opcode::Delegate
            ) {
                indent = indent.saturating_sub(1);
            }
            println!("{}{}", "  ".repeat(indent.max(1)), instr.value);
            if op.is_block_start() || matches!(
                op,
                wasm_rs::types::Opcode::Else
                    | wasm_rs::types::Opcode::Catch
                    | wasm_rs::types::Opcode::CatchAll
            ) {
                indent += 1;
            }
        }
    }
}
