//! C source code front-end
//!
//! This module transforms C source text into an Abstract Syntax Tree (AST):
//! - [`lexer`]: Tokenization (source text → tokens with byte spans)
//! - [`preprocessor`]: directives and macro expansion over the token stream
//! - [`parse`]: parser core, diagnostics and the [`parse_source`] entry point
//! - [`ast`]: AST node definitions
//!
//! # Supported C Subset
//!
//! - Types: integer kinds, `float`, `double`, pointers (including pointers to
//!   functions), arrays, structs, unions, typedefs
//! - Statements: declarations, expression statements, blocks, `if`, `while`,
//!   `do-while`, `for`, `switch`, `break`, `continue`, `return`
//! - Expressions: the full C operator set except `_Generic` and compound
//!   literals
//! - Preprocessor: object-like and function-like macros and conditional
//!   compilation; `#include` is accepted and ignored
//!
//! # Parser Implementation
//!
//! Hand-written recursive descent parser with precedence climbing for binary operators.
//! No external parser generator dependencies.

pub mod ast;
mod declarations;
mod expressions;
pub mod lexer;
pub mod parse;
pub mod preprocessor;
mod statements;

pub use parse::{parse_source, Diagnostic, DiagnosticKind, DiagnosticSink, ParseError, Parser, Severity, SilentSink};
