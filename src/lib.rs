#![forbid(unsafe_code)]

//! Toolkit for the WebAssembly module format: a streaming binary
//! decoder and encoder, a text-format lexer/parser/resolver producing
//! the same AST, and a structural validator, all gated by proposal
//! [`Features`] flags.

pub mod binary;
pub mod errors;
pub mod features;
pub mod span;
pub mod text;
pub mod types;
pub mod valid;

#[cfg(test)]
mod test;

pub use errors::{Error, ErrorList, Errors};
pub use features::Features;
pub use span::{At, Location, SpanU8};

/// Decode a binary module. Best-effort: on most errors the offending
/// element is dropped and decoding continues, so one run can surface
/// several diagnostics.
pub fn read_binary_module(
    data: &[u8],
    features: Features,
    errors: &mut dyn Errors,
) -> Option<binary::Module> {
    binary::read_module(data, features, errors)
}

/// Parse and resolve a text module, then lower it to the binary AST.
pub fn read_text_module(
    source: &str,
    features: Features,
    errors: &mut dyn Errors,
) -> Option<binary::Module> {
    let module = text::read_module(source, features, errors)?;
    text::convert_module(&module, errors)
}

/// Validate a module produced by either reader.
pub fn validate_module(
    module: &binary::Module,
    features: Features,
    errors: &mut dyn Errors,
) -> bool {
    valid::validate_module(module, features, errors)
}

/// Encode a module back to bytes.
pub fn write_binary_module(module: &binary::Module) -> Vec<u8> {
    binary::write_module(module)
}
