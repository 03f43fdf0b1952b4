//! Incremental program image and its execution engine
//!
//! This module provides the linking and execution side of the session:
//! - [`image`]: compiles checked units and merges them into a
//!   [`image::ProgramImage`] that only ever grows
//! - [`engine`]: walks function bodies against the image's memory
//! - [`builtins`]: the small C library available to user code
//! - [`errors`]: link and runtime error types
//!
//! # Execution Model
//!
//! Every top-level input becomes a unit of functions and globals. Linking a
//! unit allocates its globals in the data region and runs their
//! initializers. Statements and expressions are wrapped in a zero-argument
//! function by the session and invoked through [`image::ProgramImage::invoke`].
//!
//! Output from `printf` and friends is captured by a [`terminal::Terminal`]
//! and drained by the caller after each invocation.

pub mod builtins;
pub mod constants;
pub mod engine;
pub mod errors;
mod expressions;
pub mod image;
pub mod terminal;
