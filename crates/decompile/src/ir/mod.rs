pub mod emit;
pub mod parser;
pub mod passes;
pub mod tokenizer;
pub mod types;


use std::collections::BTreeSet;

pub use emit::PythonEmitter;
pub use parser::Parser;
pub use tokenizer::{Token, Tokenizer};
pub use types::{Expr, FunctionDef, Module, Stmt};

use crate::error::{Error, ParseError};

/// Parses contract source into a syntax tree.
pub fn parse_source(source: &str) -> Result<Module, ParseError> {
    Parser::parse(source)
}

/// Parses compiled contract source, rewrites it back to source form and prints it. Also returns
/// the ORM variable names declared in it.
pub fn decompile_source(source: &str) -> Result<(String, BTreeSet<String>), Error> {
    let module = parse_source(source)?;

    let (module, orm_variables) = passes::run_all_passes(module);

    let printed = PythonEmitter::new().try_emit(&module).ok_or_else(|| {
        Error::Unprintable("an f-string needs a backslash or a reused quote in a field".to_string())
    })?;
    Ok((printed, orm_variables))
}
