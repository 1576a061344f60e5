use crate::{Args, Wat2WasmArgs};

use std::fs;

use anyhow::Result;

use wasm_rs::{ErrorList, Features};

pub fn wat2wasm(args: &Args, sub: &Wat2WasmArgs, features: Features) -> Result<i32> {
    let source = fs::read_to_string(&args.input)?;
    let mut errors = ErrorList::new();

    let module = wasm_rs::read_text_module(&source, features, &mut errors);
    let module = match module {
        Some(module) if errors.is_empty() => module,
        _ => {
            for line in errors.display_text(&source) {
                eprintln!("{}: {}", args.input.display(), line);
            }
            return Ok(2);
        }
    };

    let mut errors = ErrorList::new();
    if !wasm_rs::validate_module(&module, features, &mut errors) {
        for line in errors.display_text(&source) {
            eprintln!("{}: {}", args.input.display(), line);
        }
        return Ok(2);
    }

    fs::write(&sub.output, wasm_rs::write_binary_module(&module))?;
    Ok(0)
}
