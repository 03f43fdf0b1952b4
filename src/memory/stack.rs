//! Call stack implementation
//!
//! This module provides the call stack for function execution:
//! - [`CallStack`]: The call stack containing frames
//! - [`Frame`]: A single function's activation record
//! - [`Local`]: A local variable's address and type
//!
//! Storage for locals lives in the stack region of [`super::heap::Memory`];
//! each scope remembers the stack pointer at entry so leaving it releases
//! everything declared inside.

use super::value::Address;
use crate::interpreter::errors::RuntimeError;
use crate::sema::types::CType;
use rustc_hash::FxHashMap;

/// Local variable on the stack
#[derive(Debug, Clone)]
pub struct Local {
    pub address: Address,
    pub ty: CType,
}

#[derive(Debug, Clone)]
struct Scope {
    locals: FxHashMap<String, Local>,
    stack_mark: Address,
}

/// Stack frame for a function call
#[derive(Debug, Clone)]
pub struct Frame {
    pub function: String,
    scopes: Vec<Scope>,
}

impl Frame {
    fn new(function: String, stack_mark: Address) -> Self {
        Frame {
            function,
            scopes: vec![Scope {
                locals: FxHashMap::default(),
                stack_mark,
            }],
        }
    }

    /// Stack pointer at frame entry
    pub fn stack_mark(&self) -> Address {
        self.scopes.first().map_or(0, |s| s.stack_mark)
    }
}

/// The call stack
#[derive(Debug, Clone)]
pub struct CallStack {
    frames: Vec<Frame>,
    max_depth: usize,
}

impl CallStack {
    pub fn new(max_depth: usize) -> Self {
        CallStack {
            frames: Vec::new(),
            max_depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_frame(&mut self, function: &str, stack_mark: Address) -> Result<(), RuntimeError> {
        if self.frames.len() >= self.max_depth {
            return Err(RuntimeError::CallDepthExceeded { depth: self.max_depth });
        }
        self.frames.push(Frame::new(function.to_string(), stack_mark));
        Ok(())
    }

    /// Pop the current frame, returning its entry stack mark
    pub fn pop_frame(&mut self) -> Option<Address> {
        self.frames.pop().map(|f| f.stack_mark())
    }

    pub fn enter_scope(&mut self, stack_mark: Address) {
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.push(Scope {
                locals: FxHashMap::default(),
                stack_mark,
            });
        }
    }

    /// Leave the innermost scope, returning the stack mark to release to
    pub fn exit_scope(&mut self) -> Option<Address> {
        let frame = self.frames.last_mut()?;
        if frame.scopes.len() <= 1 {
            return None;
        }
        frame.scopes.pop().map(|s| s.stack_mark)
    }

    pub fn declare(&mut self, name: &str, local: Local) {
        if let Some(scope) = self.frames.last_mut().and_then(|f| f.scopes.last_mut()) {
            scope.locals.insert(name.to_string(), local);
        }
    }

    /// Innermost visible local named `name` in the current frame
    pub fn lookup(&self, name: &str) -> Option<&Local> {
        let frame = self.frames.last()?;
        frame.scopes.iter().rev().find_map(|scope| scope.locals.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(address: Address) -> Local {
        Local {
            address,
            ty: CType::int(),
        }
    }

    #[test]
    fn test_scoped_lookup() {
        let mut stack = CallStack::new(8);
        stack.push_frame("f", 100).unwrap();
        stack.declare("x", local(100));
        stack.enter_scope(104);
        stack.declare("x", local(104));
        assert_eq!(stack.lookup("x").unwrap().address, 104);
        assert_eq!(stack.exit_scope(), Some(104));
        assert_eq!(stack.lookup("x").unwrap().address, 100);
    }

    #[test]
    fn test_frames_hide_callers() {
        let mut stack = CallStack::new(8);
        stack.push_frame("outer", 0).unwrap();
        stack.declare("a", local(8));
        stack.push_frame("inner", 16).unwrap();
        assert!(stack.lookup("a").is_none());
        assert_eq!(stack.pop_frame(), Some(16));
        assert!(stack.lookup("a").is_some());
    }

    #[test]
    fn test_depth_limit() {
        let mut stack = CallStack::new(2);
        stack.push_frame("a", 0).unwrap();
        stack.push_frame("b", 0).unwrap();
        assert_eq!(
            stack.push_frame("c", 0),
            Err(RuntimeError::CallDepthExceeded { depth: 2 })
        );
    }
}
