//! The incremental session engine
//!
//! - [`analyzer`]: decides whether buffered input is complete
//! - [`classifier`]: top-level code versus function-body code
//! - [`splitter`]: pasted statement blocks into ordered units
//! - [`wrapper`]: host code that lets a unit be compiled and its value kept
//! - [`session`]: the state machine tying it together
//! - [`diagnostics`]: one report per diagnostic across repeated parses
//! - [`format`]: `=> (type) value` result lines
//! - [`commands`]: `:help`, `:version`, `:quit`

pub mod analyzer;
pub mod classifier;
pub mod commands;
pub mod diagnostics;
pub mod format;
pub mod session;
pub mod splitter;
pub mod wrapper;

pub use session::{CodeLine, Event, LineKind, Reply, ReplError, Session, SessionOptions, State};
