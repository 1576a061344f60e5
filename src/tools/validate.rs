use crate::Args;

use std::fs;

use anyhow::Result;

use wasm_rs::{ErrorList, Features};

pub fn validate(args: &Args, features: Features) -> Result<i32> {
    let data = fs::read(&args.input)?;
    let mut errors = ErrorList::new();

    let module = wasm_rs::read_binary_module(&data, features, &mut errors);
    let valid = match &module {
        Some(module) => wasm_rs::validate_module(module, features, &mut errors),
        None => false,
    };

    if !errors.is_empty() || !valid {
        for line in errors.display_binary() {
            eprintln!("{}: {}", args.input.display(), line);
        }
        return Ok(2);
    }
    Ok(0)
}
