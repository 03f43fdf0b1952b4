//! Compiled units and the cumulative program image
//!
//! [`compile_unit`] turns one source text into a [`CompiledUnit`]. The text
//! is the session's declaration context followed by an appendix; only
//! definitions that start inside the appendix are emitted, everything before
//! it is context that already lives in the image.
//!
//! [`ProgramImage::link`] merges a unit append-only. Validation happens
//! before anything is committed, so a unit that fails to link leaves no
//! trace. Global initializers run at link time; they are constant, so no
//! user code executes.
//!
//! [`ProgramImage::invoke`] calls a zero-argument entry point. The execution
//! engine is bound on the first invocation and reused afterwards.

use crate::interpreter::builtins::{self, BUILTIN_NAMES};
use crate::interpreter::constants::{ENGINE_STACK_SIZE, TEXT_ADDRESS_START, TEXT_ENTRY_STRIDE};
use crate::interpreter::engine::{Engine, Interpreter};
use crate::interpreter::errors::{LinkError, RuntimeError};
use crate::memory::heap::Memory;
use crate::memory::value::{Address, Value};
use crate::parser::ast::{ExternalDecl, FunctionDef, Initializer, Storage};
use crate::parser::{parse_source, Diagnostic, DiagnosticSink};
use crate::sema::check::{check_unit, compatible};
use crate::sema::types::{CType, TypeTable};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::thread;

/// A global variable emitted by a unit
#[derive(Debug, Clone)]
pub struct GlobalDef {
    pub name: String,
    pub ty: CType,
    pub init: Option<Initializer>,
}

/// Output of [`compile_unit`]: everything the appendix defines
#[derive(Debug, Clone, Default)]
pub struct CompiledUnit {
    pub functions: Vec<FunctionDef>,
    pub globals: Vec<GlobalDef>,
    pub types: TypeTable,
    /// File-scope names the unit's code refers to
    pub references: Vec<String>,
}

impl CompiledUnit {
    pub fn defines_function(&self, name: &str) -> bool {
        self.functions.iter().any(|f| f.name == name)
    }
}

/// Preprocess, parse and type-check `source`, emitting definitions at or
/// after `appendix_start`
pub fn compile_unit(
    source: &str,
    appendix_start: usize,
    sink: &mut dyn DiagnosticSink,
) -> Result<CompiledUnit, Diagnostic> {
    let mut unit = parse_source(source).map_err(|e| e.into_diagnostic())?;
    let references = check_unit(&mut unit, sink)?;

    let mut compiled = CompiledUnit {
        references,
        ..CompiledUnit::default()
    };
    for item in unit.items {
        if item.span().start < appendix_start {
            continue;
        }
        match item {
            ExternalDecl::Function(func) => compiled.functions.push(func),
            ExternalDecl::Declaration(decl) => {
                if matches!(decl.storage, Storage::Typedef | Storage::Extern) {
                    continue;
                }
                for declarator in decl.declarators {
                    if declarator.ty.is_function() {
                        continue;
                    }
                    merge_global(
                        &mut compiled.globals,
                        GlobalDef {
                            name: declarator.name,
                            ty: declarator.ty,
                            init: declarator.init,
                        },
                    );
                }
            }
        }
    }
    compiled.types = unit.types;

    log::debug!(
        "compiled unit: {} function(s), {} global(s), references {:?}",
        compiled.functions.len(),
        compiled.globals.len(),
        compiled.references
    );
    Ok(compiled)
}

/// Fold tentative redeclarations within one unit into a single definition
fn merge_global(globals: &mut Vec<GlobalDef>, def: GlobalDef) {
    match globals.iter_mut().find(|g| g.name == def.name) {
        Some(existing) => {
            if matches!(existing.ty, CType::Array(_, None)) {
                existing.ty = def.ty;
            }
            if def.init.is_some() {
                existing.init = def.init;
            }
        }
        None => globals.push(def),
    }
}

/// Something a function pointer can point at
#[derive(Debug, Clone)]
pub(crate) enum Callable {
    User(Arc<FunctionDef>),
    Builtin(&'static str),
}

/// A linked global variable
#[derive(Debug, Clone)]
pub(crate) struct Global {
    pub address: Address,
    pub ty: CType,
    pub initialized: bool,
}

/// Code, data and symbol tables of everything linked so far
#[derive(Debug)]
pub(crate) struct Program {
    pub functions: FxHashMap<String, Arc<FunctionDef>>,
    pub entries: FxHashMap<String, Address>,
    pub targets: FxHashMap<Address, Callable>,
    pub globals: FxHashMap<String, Global>,
    pub types: TypeTable,
    pub memory: Memory,
    strings: FxHashMap<Vec<u8>, Address>,
    next_text: Address,
}

impl Program {
    fn new(heap_limit: usize) -> Self {
        let mut program = Program {
            functions: FxHashMap::default(),
            entries: FxHashMap::default(),
            targets: FxHashMap::default(),
            globals: FxHashMap::default(),
            types: TypeTable::new(),
            memory: Memory::new(heap_limit),
            strings: FxHashMap::default(),
            next_text: TEXT_ADDRESS_START,
        };
        for name in BUILTIN_NAMES {
            let address = program.next_entry();
            program.entries.insert(name.to_string(), address);
            program.targets.insert(address, Callable::Builtin(name));
        }
        program
    }

    fn next_entry(&mut self) -> Address {
        let address = self.next_text;
        self.next_text += TEXT_ENTRY_STRIDE;
        address
    }

    /// Address of the function currently bound to `name`
    pub fn function_address(&self, name: &str) -> Option<Address> {
        self.entries.get(name).copied()
    }

    pub fn callable_at(&self, address: Address) -> Option<Callable> {
        self.targets.get(&address).cloned()
    }

    /// Address of a NUL-terminated copy of `bytes`, shared by equal literals
    pub fn intern_string(&mut self, bytes: &[u8]) -> Address {
        if let Some(&address) = self.strings.get(bytes) {
            return address;
        }
        let mut data = bytes.to_vec();
        data.push(0);
        let address = self.memory.alloc_static(data, 1);
        self.strings.insert(bytes.to_vec(), address);
        address
    }

    fn is_defined(&self, name: &str) -> bool {
        self.functions.contains_key(name) || self.globals.contains_key(name)
    }
}

/// The cumulative linked program of a session
pub struct ProgramImage {
    program: Program,
    engine: Option<Engine>,
    max_call_depth: usize,
    units: usize,
}

impl ProgramImage {
    pub fn new(heap_limit: usize, max_call_depth: usize) -> Self {
        ProgramImage {
            program: Program::new(heap_limit),
            engine: None,
            max_call_depth,
            units: 0,
        }
    }

    /// Number of units linked so far
    pub fn unit_count(&self) -> usize {
        self.units
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.program.functions.contains_key(name)
    }

    pub fn has_global(&self, name: &str) -> bool {
        self.program.globals.contains_key(name)
    }

    pub fn memory(&self) -> &Memory {
        &self.program.memory
    }

    pub fn types(&self) -> &TypeTable {
        &self.program.types
    }

    /// Merge `unit` into the image
    pub fn link(&mut self, unit: CompiledUnit) -> Result<(), LinkError> {
        self.validate(&unit)?;

        for def in unit.types.iter() {
            self.program.types.insert(def.clone());
        }

        let mut added_functions = Vec::new();
        for func in unit.functions {
            let address = self.program.next_entry();
            let name = func.name.clone();
            let func = Arc::new(func);
            self.program.entries.insert(name.clone(), address);
            self.program.targets.insert(address, Callable::User(Arc::clone(&func)));
            self.program.functions.insert(name.clone(), func);
            log::debug!("linked function '{}' at 0x{:x}", name, address);
            added_functions.push(name);
        }

        let mut added_globals = Vec::new();
        let mut pending = Vec::new();
        for def in unit.globals {
            let address = match self.program.globals.get_mut(&def.name) {
                Some(existing) => {
                    existing.initialized |= def.init.is_some();
                    existing.address
                }
                None => {
                    let size = self.program.types.size_of(&def.ty).unwrap_or(0);
                    let align = self.program.types.align_of(&def.ty);
                    let address = self.program.memory.alloc_static(vec![0; size], align);
                    self.program.globals.insert(
                        def.name.clone(),
                        Global {
                            address,
                            ty: def.ty.clone(),
                            initialized: def.init.is_some(),
                        },
                    );
                    log::debug!("linked global '{}' at 0x{:x}", def.name, address);
                    added_globals.push(def.name.clone());
                    address
                }
            };
            if let Some(init) = def.init {
                pending.push((def.name, address, def.ty, init));
            }
        }

        let mut scratch = Engine::new(self.max_call_depth);
        for (name, address, ty, init) in pending {
            let result = Interpreter::new(&mut self.program, &mut scratch).initialize(address, &ty, &init);
            if let Err(source) = result {
                self.rollback(&added_functions, &added_globals);
                return Err(LinkError::Initializer { name, source });
            }
        }

        self.units += 1;
        Ok(())
    }

    fn validate(&self, unit: &CompiledUnit) -> Result<(), LinkError> {
        for func in &unit.functions {
            if self.program.functions.contains_key(&func.name) {
                return Err(LinkError::DuplicateFunction { name: func.name.clone() });
            }
            if self.program.globals.contains_key(&func.name) {
                return Err(LinkError::ConflictingTypes { name: func.name.clone() });
            }
        }

        for def in &unit.globals {
            if self.program.functions.contains_key(&def.name) {
                return Err(LinkError::ConflictingTypes { name: def.name.clone() });
            }
            if let Some(existing) = self.program.globals.get(&def.name) {
                if !compatible(&existing.ty, &def.ty) {
                    return Err(LinkError::ConflictingTypes { name: def.name.clone() });
                }
                if existing.initialized && def.init.is_some() {
                    return Err(LinkError::DuplicateGlobal { name: def.name.clone() });
                }
            }
        }

        for name in &unit.references {
            let resolved = self.program.is_defined(name)
                || unit.defines_function(name)
                || unit.globals.iter().any(|g| &g.name == name)
                || builtins::signature(name).is_some();
            if !resolved {
                return Err(LinkError::UndefinedSymbol { name: name.clone() });
            }
        }
        Ok(())
    }

    fn rollback(&mut self, functions: &[String], globals: &[String]) {
        for name in functions {
            self.program.functions.remove(name);
            if let Some(address) = self.program.entries.remove(name) {
                self.program.targets.remove(&address);
            }
            // Builtins occupy the first entries, in declaration order
            if let Some(index) = BUILTIN_NAMES.iter().position(|b| *b == name.as_str()) {
                let address = TEXT_ADDRESS_START + index as u64 * TEXT_ENTRY_STRIDE;
                self.program.entries.insert(name.clone(), address);
            }
        }
        for name in globals {
            self.program.globals.remove(name);
        }
    }

    /// Call the zero-argument function `name`
    pub fn invoke(&mut self, name: &str) -> Result<Value, RuntimeError> {
        let func = self
            .program
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::NoEntryPoint { name: name.to_string() })?;

        let max_call_depth = self.max_call_depth;
        let program = &mut self.program;
        let engine = self.engine.get_or_insert_with(|| {
            log::debug!("binding execution engine");
            Engine::new(max_call_depth)
        });
        log::debug!("invoking '{}'", name);

        // User code recurses on the host stack
        thread::scope(|scope| {
            let handle = thread::Builder::new()
                .name("engine".to_string())
                .stack_size(ENGINE_STACK_SIZE)
                .spawn_scoped(scope, move || Interpreter::new(program, engine).call_function(func, Vec::new()))
                .map_err(|err| RuntimeError::EngineThread {
                    message: err.to_string(),
                })?;
            handle.join().map_err(|_| RuntimeError::EngineThread {
                message: "execution thread panicked".to_string(),
            })?
        })
    }

    /// Output printed by user code since the last call
    pub fn take_output(&mut self) -> String {
        self.engine.as_mut().map(|e| e.terminal.drain()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str, appendix_start: usize) -> CompiledUnit {
        compile_unit(source, appendix_start, &mut Vec::new()).unwrap()
    }

    fn image() -> ProgramImage {
        ProgramImage::new(1 << 20, 64)
    }

    #[test]
    fn test_only_appendix_is_emitted() {
        let context = "int f(int x);\nint g;\n";
        let source = format!("{}int h(void) {{ return f(g); }}\n", context);
        let unit = compile(&source, context.len());
        assert_eq!(unit.functions.len(), 1);
        assert_eq!(unit.functions[0].name, "h");
        assert!(unit.globals.is_empty());
        assert_eq!(unit.references, vec!["f".to_string(), "g".to_string()]);
    }

    #[test]
    fn test_link_and_invoke() {
        let mut image = image();
        image.link(compile("int twice(int x) { return x * 2; }", 0)).unwrap();
        let context = "int twice(int x);\n";
        let source = format!("{}int __anon0(void) {{ return twice(21); }}\n", context);
        image.link(compile(&source, context.len())).unwrap();
        assert_eq!(image.invoke("__anon0").unwrap(), Value::Int(42));
        assert_eq!(image.unit_count(), 2);
    }

    #[test]
    fn test_undefined_symbol_is_link_error() {
        let mut image = image();
        let unit = compile("int missing(void);\nint __anon0(void) { return missing(); }", 0);
        assert_eq!(
            image.link(unit),
            Err(LinkError::UndefinedSymbol { name: "missing".into() })
        );
        assert!(!image.has_function("__anon0"));
    }

    #[test]
    fn test_duplicate_definitions() {
        let mut image = image();
        image.link(compile("int f(void) { return 1; }", 0)).unwrap();
        assert_eq!(
            image.link(compile("int f(void) { return 2; }", 0)),
            Err(LinkError::DuplicateFunction { name: "f".into() })
        );

        image.link(compile("int x = 1;", 0)).unwrap();
        image.link(compile("int x;", 0)).unwrap();
        assert_eq!(
            image.link(compile("int x = 2;", 0)),
            Err(LinkError::DuplicateGlobal { name: "x".into() })
        );
    }

    #[test]
    fn test_global_initializers() {
        let mut image = image();
        image
            .link(compile("int a = 5; int *p = &a; char *s = \"hey\"; int arr[3] = {1, 2};", 0))
            .unwrap();
        let context = "int a; int *p; char *s; int arr[3];\n";
        let source = format!("{}int __anon0(void) {{ return *p + arr[1] + s[1]; }}\n", context);
        image.link(compile(&source, context.len())).unwrap();
        assert_eq!(image.invoke("__anon0").unwrap(), Value::Int(5 + 2 + 'e' as i64));
    }

    #[test]
    fn test_runtime_error_keeps_image() {
        let mut image = image();
        image.link(compile("int *p; int f(void) { return *p; }", 0)).unwrap();
        assert_eq!(image.invoke("f"), Err(RuntimeError::NullDereference));
        assert!(image.has_global("p"));
        assert!(image.invoke("nope").is_err());
    }

    #[test]
    fn test_output_is_captured() {
        let mut image = image();
        image
            .link(compile("int f(void) { printf(\"%d-%s\\n\", 7, \"ok\"); return 0; }", 0))
            .unwrap();
        image.invoke("f").unwrap();
        assert_eq!(image.take_output(), "7-ok\n");
        assert_eq!(image.take_output(), "");
    }
}
