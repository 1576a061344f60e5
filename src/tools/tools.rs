mod dump;
use dump::dump;
mod validate;
use validate::validate;
mod wat2wasm;
use wat2wasm::wat2wasm;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use wasm_rs::Features;

/// Parse, validate, and convert WebAssembly modules
#[derive(Clone, Debug, Parser)]
struct Args {
    /// input filename
    #[arg(short, long)]
    input: PathBuf,
    /// enable a feature (repeatable), e.g. --enable simd
    #[arg(long, value_name = "FEATURE")]
    enable: Vec<String>,
    /// disable a feature (repeatable)
    #[arg(long, value_name = "FEATURE")]
    disable: Vec<String>,
    // operation to execute
    #[command(subcommand)]
    operation: Operation,
}

#[derive(Clone, Debug, Subcommand)]
enum Operation {
    /// Convert a text module to a binary module
    Wat2Wasm(Wat2WasmArgs),
    /// Decode and validate a binary module
    Validate,
    /// Dump the contents of a binary module
    Dump(DumpArgs),
}

#[derive(Clone, Debug, Parser)]
struct Wat2WasmArgs {
    /// output filename
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Clone, Debug, Parser)]
struct DumpArgs {
    /// print the section overview
    #[arg(long)]
    headers: bool,
    /// print every item of every section
    #[arg(long)]
    details: bool,
    /// print the instructions of every code body
    #[arg(long)]
    disassemble: bool,
}

impl Args {
    fn features(&self) -> Result<Features> {
        let mut features = Features::default();
        for name in &self.enable {
            let feature = Features::by_name(name)
                .ok_or_else(|| anyhow!("unknown feature: {name}"))?;
            features.enable(feature);
        }
        for name in &self.disable {
            let feature = Features::by_name(name)
                .ok_or_else(|| anyhow!("unknown feature: {name}"))?;
            features.disable(feature);
        }
        Ok(features)
    }
}

// Exit codes: 0 ok, 1 I/O error, 2 parse/validation error.
fn run() -> Result<i32> {
    let args = Args::parse();
    let features = args.features()?;
    match &args.operation {
        Operation::Wat2Wasm(sub) => wat2wasm(&args, sub, features),
        Operation::Validate => validate(&args, features),
        Operation::Dump(sub) => dump(&args, sub, features),
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:?}");
            std::process::exit(1);
        }
    }
}
