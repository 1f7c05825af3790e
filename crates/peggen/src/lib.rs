//! Parser generator for Parsing Expression Grammars. Compiles a
//! grammar file into a self-contained recursive-descent C++11 parser
//! with packrat memoization and farthest-failure error reporting.
//!
//! The pipeline is linear: tokenize, parse to an AST, run the semantic
//! passes, emit a header and a source file.

pub mod analyze;
pub mod ast;
pub mod codegen;
pub mod error;
pub mod literal;
pub mod parser;
pub mod ranges;
pub mod source;
pub mod span;
pub mod tokenizer;

pub use codegen::{EmitNames, Output};
pub use error::{Diagnostic, ErrorAccumulator, FatalError, Severity};
pub use source::Source;
pub use span::Span;

/// Runs the whole pipeline. Diagnostics land in `err`; `None` is
/// returned when any error (or a fatal one) prevented emission.
pub fn compile(source: &Source, names: &EmitNames, err: &ErrorAccumulator) -> Option<Output> {
    let result: Result<Option<Output>, FatalError> = (|| {
        let mut grammar = parser::parse_grammar(source, err)?;
        analyze::analyze(&mut grammar, err);
        if err.has_errors() {
            return Ok(None);
        }
        Ok(Some(codegen::emit(&grammar, source, names)))
    })();
    result.unwrap_or(None)
}
