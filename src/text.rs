//! Text-format pipeline: lexer, parser, desugarer, resolver, and the
//! lowering into the binary AST.

pub mod convert;
pub mod desugar;
pub mod lex;
pub mod name_map;
pub mod num;
pub mod parse;
pub mod resolve;
pub mod token;
pub mod types;

pub use convert::convert_module;
pub use desugar::desugar_module;
pub use lex::Lexer;
pub use name_map::NameMap;
pub use parse::parse_module;
pub use resolve::resolve_module;

use crate::errors::Errors;
use crate::features::Features;

/// Parse, desugar, and resolve a text module in one step.
pub fn read_module(
    source: &str,
    features: Features,
    errors: &mut dyn Errors,
) -> Option<types::TextModule> {
    let mut module = parse_module(source, features, errors)?;
    desugar_module(&mut module, errors);
    if !resolve_module(&mut module, errors) {
        return None;
    }
    Some(module)
}
