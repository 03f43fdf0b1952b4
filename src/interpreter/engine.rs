// Execution engine: function calls and statement execution

use crate::interpreter::errors::RuntimeError;
use crate::interpreter::image::{Callable, Program};
use crate::interpreter::terminal::Terminal;
use crate::memory::stack::{CallStack, Local};
use crate::memory::value::{convert, Address, Value};
use crate::parser::ast::*;
use crate::sema::types::{promote, CType};
use std::sync::Arc;

/// How a statement finished
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    /// Returned value with its static type
    Return(Value, CType),
}

/// Execution state that outlives a single invocation
#[derive(Debug)]
pub struct Engine {
    pub(crate) stack: CallStack,
    pub(crate) terminal: Terminal,
}

impl Engine {
    pub fn new(max_call_depth: usize) -> Self {
        Engine {
            stack: CallStack::new(max_call_depth),
            terminal: Terminal::new(),
        }
    }
}

/// An engine executing against a program
pub(crate) struct Interpreter<'a> {
    pub(crate) program: &'a mut Program,
    pub(crate) engine: &'a mut Engine,
}

impl<'a> Interpreter<'a> {
    pub fn new(program: &'a mut Program, engine: &'a mut Engine) -> Self {
        Interpreter { program, engine }
    }

    pub(crate) fn size_of(&self, ty: &CType) -> usize {
        self.program.types.size_of(ty).unwrap_or(0)
    }

    /// Pointee size for pointer arithmetic; `void *` steps by one byte
    pub(crate) fn stride_of(&self, pointer: &CType) -> usize {
        pointer
            .pointee()
            .and_then(|p| self.program.types.size_of(p))
            .unwrap_or(1)
            .max(1)
    }

    pub(crate) fn load(&self, address: Address, ty: &CType) -> Result<Value, RuntimeError> {
        let bytes = self.program.memory.read(address, self.size_of(ty))?;
        Ok(Value::decode(bytes, ty))
    }

    pub(crate) fn store(&mut self, address: Address, ty: &CType, value: &Value) -> Result<(), RuntimeError> {
        let bytes = value.encode(ty, self.size_of(ty));
        self.program.memory.write(address, &bytes)
    }

    fn enter_scope(&mut self) {
        let mark = self.program.memory.stack_pointer();
        self.engine.stack.enter_scope(mark);
    }

    fn exit_scope(&mut self) {
        if let Some(mark) = self.engine.stack.exit_scope() {
            self.program.memory.release_stack(mark);
        }
    }

    /// Call through a function address
    pub(crate) fn call_address(&mut self, address: Address, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match self.program.callable_at(address) {
            Some(Callable::User(func)) => self.call_function(func, args),
            Some(Callable::Builtin(name)) => self.call_builtin(name, &args),
            None => Err(RuntimeError::BadFunctionPointer { address }),
        }
    }

    /// Call a user function with arguments already converted to its
    /// parameter types
    pub(crate) fn call_function(&mut self, func: Arc<FunctionDef>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let mark = self.program.memory.stack_pointer();
        self.engine.stack.push_frame(&func.name, mark)?;
        let result = self.run_function(&func, args);
        if let Some(mark) = self.engine.stack.pop_frame() {
            self.program.memory.release_stack(mark);
        }
        result
    }

    fn run_function(&mut self, func: &FunctionDef, args: Vec<Value>) -> Result<Value, RuntimeError> {
        for (param, value) in func.params.iter().zip(args) {
            let address = self.allocate_local(&param.ty)?;
            self.store(address, &param.ty, &value)?;
            if let Some(name) = &param.name {
                self.engine.stack.declare(
                    name,
                    Local {
                        address,
                        ty: param.ty.clone(),
                    },
                );
            }
        }

        let ret = &func.ty.ret;
        match self.execute(&func.body)? {
            Flow::Return(_, _) if ret.is_void() => Ok(Value::Void),
            Flow::Return(value, from) => Ok(convert(value, &from, ret)),
            _ => Ok(self.zero_value(ret)),
        }
    }

    fn zero_value(&self, ty: &CType) -> Value {
        match ty {
            CType::Void => Value::Void,
            CType::Float | CType::Double => Value::Float(0.0),
            CType::Pointer(_) => Value::Pointer(0),
            CType::Struct(_) => Value::Aggregate(vec![0; self.size_of(ty)]),
            _ => Value::Int(0),
        }
    }

    fn allocate_local(&mut self, ty: &CType) -> Result<Address, RuntimeError> {
        let size = self.size_of(ty);
        let align = self.program.types.align_of(ty);
        self.program.memory.alloc_stack(size, align)
    }

    /// Execute a single statement
    pub(crate) fn execute(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }

            StmtKind::Decl(decl) => {
                self.declare_locals(decl)?;
                Ok(Flow::Normal)
            }

            StmtKind::Compound(stmts) => {
                self.enter_scope();
                let result = self.execute_block(stmts);
                self.exit_scope();
                result
            }

            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval(cond)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            StmtKind::While { cond, body } => {
                while self.eval(cond)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Break => break,
                        flow @ Flow::Return(..) => return Ok(flow),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }

            StmtKind::DoWhile { body, cond } => {
                loop {
                    match self.execute(body)? {
                        Flow::Break => break,
                        flow @ Flow::Return(..) => return Ok(flow),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if !self.eval(cond)?.is_truthy() {
                        break;
                    }
                }
                Ok(Flow::Normal)
            }

            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.enter_scope();
                let result = self.execute_for(init.as_deref(), cond.as_ref(), step.as_ref(), body);
                self.exit_scope();
                result
            }

            StmtKind::Switch { cond, cases } => {
                self.enter_scope();
                let result = self.execute_switch(cond, cases);
                self.exit_scope();
                result
            }

            StmtKind::Break => Ok(Flow::Break),
            StmtKind::Continue => Ok(Flow::Continue),

            StmtKind::Return(value) => match value {
                Some(expr) => {
                    let value = self.eval(expr)?;
                    Ok(Flow::Return(value, expr.ty.decay()))
                }
                None => Ok(Flow::Return(Value::Void, CType::Void)),
            },

            StmtKind::Empty => Ok(Flow::Normal),
        }
    }

    fn execute_block(&mut self, stmts: &[Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in stmts {
            let flow = self.execute(stmt)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        step: Option<&Expr>,
        body: &Stmt,
    ) -> Result<Flow, RuntimeError> {
        if let Some(init) = init {
            self.execute(init)?;
        }
        loop {
            if let Some(cond) = cond {
                if !self.eval(cond)?.is_truthy() {
                    break;
                }
            }
            match self.execute(body)? {
                Flow::Break => break,
                flow @ Flow::Return(..) => return Ok(flow),
                Flow::Normal | Flow::Continue => {}
            }
            if let Some(step) = step {
                self.eval(step)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_switch(&mut self, cond: &Expr, cases: &[SwitchCase]) -> Result<Flow, RuntimeError> {
        let from = cond.ty.decay();
        let promoted = promote(&from);
        let value = convert(self.eval(cond)?, &from, &promoted);

        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(label) = &case.value {
                let label_value = convert(self.eval(label)?, &label.ty, &promoted);
                if label_value == value {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = start.or_else(|| cases.iter().position(|c| c.value.is_none()));

        let Some(start) = start else {
            return Ok(Flow::Normal);
        };
        for case in &cases[start..] {
            match self.execute_block(&case.body)? {
                Flow::Normal => {}
                Flow::Break => return Ok(Flow::Normal),
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn declare_locals(&mut self, decl: &Declaration) -> Result<(), RuntimeError> {
        if matches!(decl.storage, Storage::Typedef | Storage::Extern) {
            return Ok(());
        }
        for declarator in &decl.declarators {
            if declarator.ty.is_function() {
                continue;
            }
            let address = self.allocate_local(&declarator.ty)?;
            self.engine.stack.declare(
                &declarator.name,
                Local {
                    address,
                    ty: declarator.ty.clone(),
                },
            );
            if let Some(init) = &declarator.init {
                self.initialize(address, &declarator.ty, init)?;
            }
        }
        Ok(())
    }

    /// Write `init` into the object of type `ty` at `address`. Members and
    /// elements without an initializer keep their zeroed bytes.
    pub(crate) fn initialize(&mut self, address: Address, ty: &CType, init: &Initializer) -> Result<(), RuntimeError> {
        match init {
            Initializer::Expr(expr) => {
                if let (CType::Array(..), ExprKind::StringLiteral(bytes)) = (ty, &expr.kind) {
                    let capacity = self.size_of(ty);
                    let mut data = bytes.clone();
                    data.push(0);
                    data.truncate(capacity);
                    return self.program.memory.write(address, &data);
                }
                let value = self.eval(expr)?;
                let value = convert(value, &expr.ty.decay(), ty);
                self.store(address, ty, &value)
            }
            Initializer::List { items, .. } => match ty {
                CType::Array(elem, _) => {
                    let stride = self.size_of(elem) as u64;
                    for (i, item) in items.iter().enumerate() {
                        self.initialize(address + i as u64 * stride, elem, item)?;
                    }
                    Ok(())
                }
                CType::Struct(key) => {
                    // A union takes its first member only
                    let fields: Vec<(u64, CType)> = match self.program.types.get(key) {
                        Some(def) => {
                            let count = if def.is_union { 1 } else { def.fields.len() };
                            def.fields
                                .iter()
                                .take(count)
                                .map(|f| (f.offset as u64, f.ty.clone()))
                                .collect()
                        }
                        None => Vec::new(),
                    };
                    for (item, (offset, field_ty)) in items.iter().zip(fields) {
                        self.initialize(address + offset, &field_ty, item)?;
                    }
                    Ok(())
                }
                scalar => match items.first() {
                    Some(item) => self.initialize(address, scalar, item),
                    None => Ok(()),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::image::{compile_unit, ProgramImage};
    use crate::memory::value::Value;

    fn run(source: &str) -> Value {
        let mut image = ProgramImage::new(1 << 20, 64);
        let unit = compile_unit(source, 0, &mut Vec::new()).unwrap();
        image.link(unit).unwrap();
        image.invoke("entry").unwrap()
    }

    #[test]
    fn test_loops() {
        let source = "int entry(void) { int s = 0; for (int i = 0; i < 10; i++) { if (i == 5) continue; s += i; } return s; }";
        assert_eq!(run(source), Value::Int(40));

        let source = "int entry(void) { int n = 0; while (1) { n++; if (n > 6) break; } do { n--; } while (n > 3); return n; }";
        assert_eq!(run(source), Value::Int(3));
    }

    #[test]
    fn test_switch_fallthrough() {
        let source = "int classify(int x) { int r = 0; switch (x) { case 1: r += 1; case 2: r += 10; break; default: r = -1; } return r; }\n\
                      int entry(void) { return classify(1) * 1000 + classify(2) * 10 + classify(9); }";
        assert_eq!(run(source), Value::Int(11 * 1000 + 100 - 1));
    }

    #[test]
    fn test_recursion() {
        let source = "int fib(int n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); } int entry(void) { return fib(15); }";
        assert_eq!(run(source), Value::Int(610));
    }

    #[test]
    fn test_local_initializers() {
        let source = "struct P { int x; int y; };\n\
                      int entry(void) { int a[4] = {1, 2, 3}; struct P p = {5, 6}; char s[] = \"hi\"; return a[2] + a[3] + p.y + s[1] + sizeof(s); }";
        assert_eq!(run(source), Value::Int(3 + 0 + 6 + 'i' as i64 + 3));
    }

    #[test]
    fn test_call_depth_limit() {
        let mut image = ProgramImage::new(1 << 20, 8);
        let unit = compile_unit("int down(int n) { return down(n + 1); } int entry(void) { return down(0); }", 0, &mut Vec::new()).unwrap();
        image.link(unit).unwrap();
        assert!(image.invoke("entry").is_err());
        // The engine is reusable after the fault
        let unit = compile_unit("int ok(void) { return 1; }", 0, &mut Vec::new()).unwrap();
        image.link(unit).unwrap();
        assert_eq!(image.invoke("ok").unwrap(), Value::Int(1));
    }
}
