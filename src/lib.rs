//! # Introduction
//!
//! crepl is an incremental read-eval-print loop for C. Declarations,
//! statements and expressions are entered a line (or a block) at a time;
//! each accepted entry is compiled against everything entered before,
//! linked into a growing program image and run right away. Expressions
//! print their value together with their type.
//!
//! ## Pipeline
//!
//! ```text
//! Input → Analyzer → Classifier → Splitter → Wrapper → Compile → Link → Invoke → Result
//! ```
//!
//! 1. [`repl`]: the session engine. Completeness analysis, classification,
//!    statement splitting, wrapper synthesis and the session state machine.
//! 2. [`parser`]: lexer, preprocessor and recursive-descent parser
//!    producing a span-accurate AST.
//! 3. [`sema`]: the C type model and the checker that types expressions.
//! 4. [`interpreter`]: compiled units, the append-only
//!    [`interpreter::image::ProgramImage`] and the tree-walking engine that
//!    executes it.
//! 5. [`memory`]: byte-addressed data, stack and heap regions.
//!
//! ## Supported C subset
//!
//! Types: all integer kinds, `float`, `double`, pointers (including function
//! pointers), arrays, structs, unions, typedefs.
//! Control flow: `if/else`, `while`, `for`, `do-while`, `switch/case`,
//! `break`, `continue`, `return`.
//! Library: `printf`, `puts`, `putchar`, `malloc`, `calloc`, `free`,
//! `strlen`, `strcmp`, `strcpy`, `memset`, `abs`.

pub mod interpreter;
pub mod memory;
pub mod parser;
pub mod repl;
pub mod sema;
