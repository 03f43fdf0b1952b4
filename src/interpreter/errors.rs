//! Error types for linking and running compiled units
//!
//! [`RuntimeError`] covers faults while executing user code. [`LinkError`]
//! covers failures merging a compiled unit into the program image; nothing
//! from a unit that fails to link is kept.
//!
//! Runtime errors abort the current invocation only. The program image and
//! all memory it owns stay intact for the next input.

use thiserror::Error;

/// Runtime errors that can occur during execution
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("null pointer dereference")]
    NullDereference,

    #[error("invalid memory access at address 0x{address:x}")]
    InvalidAccess { address: u64 },

    #[error("use of freed memory at address 0x{address:x}")]
    UseAfterFree { address: u64 },

    #[error("double free of address 0x{address:x}")]
    DoubleFree { address: u64 },

    #[error("invalid free of address 0x{address:x}")]
    InvalidFree { address: u64 },

    #[error("out of memory: requested {requested} bytes, limit is {limit}")]
    OutOfMemory { requested: usize, limit: usize },

    #[error("stack region exhausted")]
    StackExhausted,

    #[error("call stack exhausted: maximum depth is {depth}")]
    CallDepthExceeded { depth: usize },

    #[error("{operation} by zero")]
    DivisionByZero { operation: &'static str },

    #[error("call through invalid function pointer 0x{address:x}")]
    BadFunctionPointer { address: u64 },

    #[error("call to undefined function '{name}'")]
    UndefinedFunction { name: String },

    #[error("reference to unresolved symbol '{name}'")]
    UnresolvedSymbol { name: String },

    #[error("invalid printf format: {message}")]
    InvalidFormat { message: String },

    #[error("no entry point named '{name}'")]
    NoEntryPoint { name: String },

    #[error("execution thread failed: {message}")]
    EngineThread { message: String },

    #[error("unsupported operation: {message}")]
    Unsupported { message: String },
}

/// Failures merging a compiled unit into the program image
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkError {
    #[error("redefinition of function '{name}'")]
    DuplicateFunction { name: String },

    #[error("redefinition of global '{name}'")]
    DuplicateGlobal { name: String },

    #[error("conflicting types for '{name}'")]
    ConflictingTypes { name: String },

    #[error("undefined symbol '{name}'")]
    UndefinedSymbol { name: String },

    #[error("cannot initialize '{name}': {source}")]
    Initializer { name: String, source: RuntimeError },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            RuntimeError::DivisionByZero { operation: "division" }.to_string(),
            "division by zero"
        );
        assert_eq!(
            LinkError::UndefinedSymbol { name: "foo".into() }.to_string(),
            "undefined symbol 'foo'"
        );
        assert_eq!(
            RuntimeError::InvalidAccess { address: 0x3039 }.to_string(),
            "invalid memory access at address 0x3039"
        );
    }
}
