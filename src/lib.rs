//! Floyd: a PEG parser-generator runtime.
//!
//! Floyd grammars are parsing expression grammars with semantic
//! actions, predicates, automatic whitespace/comment ("filler")
//! insertion, left-recursion support, and operator-precedence
//! climbing. This crate parses a grammar, analyzes it, and executes
//! it against input text with a packrat interpreter.
//!
//! # Example
//!
//! ```
//! let result = floyd::parse("grammar = 'hello' ' '* 'world' end -> true", "hello  world");
//! assert_eq!(result.err, None);
//! assert_eq!(result.val, Some(floyd::Value::Bool(true)));
//! ```
//!
//! Grammars can bind matches to labels and compute values with a
//! small host-expression language:
//!
//! ```
//! let g = "num = <'0'..'9'+>:ds -> atoi(ds, 10)";
//! let result = floyd::parse(g, "123");
//! assert_eq!(result.val, Some(floyd::Value::Int(123)));
//! ```

pub mod analysis;
pub mod ast;
pub mod error;
pub mod functions;
pub mod grammar;
pub mod runtime;
pub mod source;
pub mod value;

use std::collections::HashMap;

pub use error::{Error, HostError};
pub use grammar::Grammar;
pub use runtime::{ExternValue, Interpreter, ParserView};
pub use value::{FuncRef, Value};

/// The outcome of matching input text against a grammar.
///
/// On success `err` is `None`, `val` holds the starting rule's value,
/// and `pos` is the final offset. On failure `val` is `None`, `err`
/// holds the formatted message, and `pos` is the farthest offset any
/// match reached.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub val: Option<Value>,
    pub err: Option<String>,
    pub pos: usize,
}

/// Options for `compile_to_parser`.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Memoize (rule, position) results during parses. Linear-time
    /// parsing for pathological grammars, at some bookkeeping cost.
    pub memoize: bool,
}

/// Options for `Parser::parse_with`.
#[derive(Clone)]
pub struct ParseOptions {
    /// Shown in error messages, e.g. a file path.
    pub path: String,
    /// Extern bindings; every name must be declared by the grammar.
    pub externs: HashMap<String, ExternValue>,
    /// Override the starting rule.
    pub start: Option<String>,
    /// Recursion ceiling for rule application.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> ParseOptions {
        ParseOptions {
            path: "<string>".to_string(),
            externs: HashMap::new(),
            start: None,
            max_depth: 512,
        }
    }
}

/// A compiled grammar, ready to parse input text. Parsers are
/// immutable; each parse gets independent runtime state.
pub struct Parser {
    grammar: Grammar,
    memoize: bool,
}

impl Parser {
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn parse(&self, text: &str) -> ParseResult {
        self.parse_with(text, ParseOptions::default())
    }

    pub fn parse_with(&self, text: &str, opts: ParseOptions) -> ParseResult {
        Interpreter::new(&self.grammar, self.memoize).parse(
            text,
            &opts.path,
            opts.externs,
            opts.start.as_deref(),
            opts.max_depth,
        )
    }
}

/// Compile grammar source into a `Parser`.
pub fn compile_to_parser(
    grammar: &str,
    path: &str,
    opts: CompileOptions,
) -> Result<Parser, Error> {
    let ast = grammar::parser::parse(grammar, path)?;
    let g = analysis::analyze(ast)?;
    Ok(Parser { grammar: g, memoize: opts.memoize })
}

/// Compile `grammar` and run it against `text` in one step.
pub fn parse(grammar: &str, text: &str) -> ParseResult {
    match compile_to_parser(grammar, "<string>", CompileOptions::default()) {
        Ok(p) => p.parse(text),
        Err(e) => ParseResult {
            val: None,
            err: Some(e.to_string()),
            pos: 0,
        },
    }
}
