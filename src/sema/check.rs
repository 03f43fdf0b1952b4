//! Scoped name resolution and expression typing
//!
//! [`check_unit`] walks a parsed [`TranslationUnit`], fills in [`Expr::ty`]
//! for every expression and rejects programs the engine could not run:
//! undeclared identifiers, bad operand types, non-assignable targets, arity
//! mismatches on prototyped calls and conflicting redeclarations. The first
//! error stops the walk; warnings go to the supplied [`DiagnosticSink`].
//! On success it returns the file-scope names the unit refers to, which the
//! linker must resolve.
//!
//! [`is_constant_initializer`] answers whether an initializer can be
//! evaluated once at load time without running any user code.

use super::fold;
use super::types::{promote, type_name, usual_arithmetic, CType, FunctionType, IntKind, TypeTable};
use crate::interpreter::builtins;
use crate::parser::ast::*;
use crate::parser::parse::{Diagnostic, DiagnosticKind, DiagnosticSink};
use rustc_hash::{FxHashMap, FxHashSet};

type CheckResult<T> = Result<T, Diagnostic>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobalKind {
    Function { defined: bool },
    Variable { initialized: bool },
}

#[derive(Debug, Clone)]
struct GlobalSymbol {
    ty: CType,
    kind: GlobalKind,
}

/// Type-check a translation unit in place. Returns the sorted file-scope
/// names referenced anywhere in the unit.
pub fn check_unit(unit: &mut TranslationUnit, sink: &mut dyn DiagnosticSink) -> Result<Vec<String>, Diagnostic> {
    let mut checker = Checker {
        types: &unit.types,
        globals: FxHashMap::default(),
        scopes: Vec::new(),
        references: FxHashSet::default(),
        current_return: None,
        loop_depth: 0,
        break_depth: 0,
        sink,
    };

    for item in unit.items.iter_mut() {
        checker.external(item)?;
    }

    let mut references: Vec<String> = checker.references.into_iter().collect();
    references.sort();
    Ok(references)
}

/// Whether two declarations of the same entity agree
pub fn compatible(a: &CType, b: &CType) -> bool {
    match (a, b) {
        (CType::Array(x, n), CType::Array(y, m)) => compatible(x, y) && (n.is_none() || m.is_none() || n == m),
        (CType::Pointer(x), CType::Pointer(y)) => compatible(x, y),
        (CType::Function(f), CType::Function(g)) => {
            compatible(&f.ret, &g.ret)
                && f.variadic == g.variadic
                && f.params.len() == g.params.len()
                && f.params.iter().zip(&g.params).all(|(p, q)| compatible(p, q))
        }
        _ => a == b,
    }
}

/// Integer constant zero, possibly cast to `void *`
pub fn is_null_constant(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Cast { target, operand } if *target == CType::Void.pointer_to() => is_null_constant(operand),
        _ => expr.ty.is_integer() && fold::eval_int(expr) == Some(0),
    }
}

/// Whether `init` is fully determined before any code runs. `is_static`
/// reports whether a name refers to an object or function with static
/// storage (its address is a constant).
pub fn is_constant_initializer(init: &Initializer, is_static: &dyn Fn(&str) -> bool) -> bool {
    match init {
        Initializer::Expr(expr) => is_constant_expr(expr, is_static),
        Initializer::List { items, .. } => items.iter().all(|item| is_constant_initializer(item, is_static)),
    }
}

fn is_constant_expr(expr: &Expr, is_static: &dyn Fn(&str) -> bool) -> bool {
    match &expr.kind {
        ExprKind::IntLiteral(_)
        | ExprKind::FloatLiteral(_)
        | ExprKind::CharLiteral(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::SizeofType(_)
        | ExprKind::SizeofExpr(_) => true,
        // Arrays and functions decay to their (constant) address
        ExprKind::Ident(name) => (expr.ty.is_array() || expr.ty.is_function()) && is_static(name),
        ExprKind::Unary { op, operand } => match op {
            UnOp::AddrOf => is_address_constant(operand, is_static),
            UnOp::Neg | UnOp::Plus | UnOp::Not | UnOp::BitNot => is_constant_expr(operand, is_static),
            _ => false,
        },
        ExprKind::Binary { lhs, rhs, .. } => is_constant_expr(lhs, is_static) && is_constant_expr(rhs, is_static),
        ExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            is_constant_expr(cond, is_static)
                && is_constant_expr(then_expr, is_static)
                && is_constant_expr(else_expr, is_static)
        }
        ExprKind::Cast { operand, .. } => is_constant_expr(operand, is_static),
        _ => false,
    }
}

fn is_address_constant(expr: &Expr, is_static: &dyn Fn(&str) -> bool) -> bool {
    match &expr.kind {
        ExprKind::Ident(name) => is_static(name),
        ExprKind::StringLiteral(_) => true,
        ExprKind::Index { base, index } => {
            (is_address_constant(base, is_static) || is_constant_expr(base, is_static))
                && is_constant_expr(index, is_static)
        }
        ExprKind::Member { base, arrow: false, .. } => is_address_constant(base, is_static),
        ExprKind::Unary {
            op: UnOp::Deref,
            operand,
        } => is_constant_expr(operand, is_static),
        _ => false,
    }
}

fn error(kind: DiagnosticKind, message: impl Into<String>, offset: usize) -> Diagnostic {
    Diagnostic::error(kind, message, offset)
}

/// Whether `expr` designates an object
pub fn is_lvalue(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Ident(_) => !expr.ty.is_function(),
        ExprKind::StringLiteral(_) => true,
        ExprKind::Unary { op: UnOp::Deref, .. } | ExprKind::Index { .. } => true,
        ExprKind::Member { arrow: true, .. } => true,
        ExprKind::Member { base, arrow: false, .. } => is_lvalue(base),
        _ => false,
    }
}

fn pointers_compatible(a: &CType, b: &CType) -> bool {
    match (a.pointee(), b.pointee()) {
        (Some(x), Some(y)) => x.is_void() || y.is_void() || compatible(x, y),
        _ => false,
    }
}

struct Checker<'a> {
    types: &'a TypeTable,
    globals: FxHashMap<String, GlobalSymbol>,
    scopes: Vec<FxHashMap<String, CType>>,
    references: FxHashSet<String>,
    current_return: Option<CType>,
    loop_depth: usize,
    break_depth: usize,
    sink: &'a mut dyn DiagnosticSink,
}

impl<'a> Checker<'a> {
    fn warn(&mut self, kind: DiagnosticKind, message: impl Into<String>, offset: usize) {
        self.sink.report(Diagnostic::warning(kind, message, offset));
    }

    fn lookup(&self, name: &str) -> Option<CType> {
        for scope in self.scopes.iter().rev() {
            if let Some(ty) = scope.get(name) {
                return Some(ty.clone());
            }
        }
        if let Some(symbol) = self.globals.get(name) {
            return Some(symbol.ty.clone());
        }
        builtins::signature(name).map(|f| CType::Function(Box::new(f)))
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains_key(name))
    }

    fn declare_global(&mut self, name: &str, ty: &CType, kind: GlobalKind, offset: usize) -> CheckResult<()> {
        let Some(existing) = self.globals.get_mut(name) else {
            self.globals.insert(
                name.to_string(),
                GlobalSymbol {
                    ty: ty.clone(),
                    kind,
                },
            );
            return Ok(());
        };

        if !compatible(&existing.ty, ty) {
            return Err(error(
                DiagnosticKind::Redefinition,
                format!(
                    "conflicting types for '{}' ('{}' vs '{}')",
                    name,
                    type_name(ty),
                    type_name(&existing.ty)
                ),
                offset,
            ));
        }

        existing.kind = match (existing.kind, kind) {
            (GlobalKind::Function { defined: true }, GlobalKind::Function { defined: true }) => {
                return Err(error(
                    DiagnosticKind::Redefinition,
                    format!("redefinition of '{}'", name),
                    offset,
                ))
            }
            (GlobalKind::Function { defined: a }, GlobalKind::Function { defined: b }) => {
                GlobalKind::Function { defined: a || b }
            }
            (GlobalKind::Variable { initialized: true }, GlobalKind::Variable { initialized: true }) => {
                return Err(error(
                    DiagnosticKind::Redefinition,
                    format!("redefinition of '{}'", name),
                    offset,
                ))
            }
            (GlobalKind::Variable { initialized: a }, GlobalKind::Variable { initialized: b }) => {
                GlobalKind::Variable { initialized: a || b }
            }
            _ => {
                return Err(error(
                    DiagnosticKind::Redefinition,
                    format!("'{}' redeclared as a different kind of symbol", name),
                    offset,
                ))
            }
        };
        // Keep the completed array type if this declaration supplied it
        if matches!(existing.ty, CType::Array(_, None)) {
            existing.ty = ty.clone();
        }
        Ok(())
    }

    fn external(&mut self, item: &mut ExternalDecl) -> CheckResult<()> {
        match item {
            ExternalDecl::Declaration(decl) => self.global_declaration(decl),
            ExternalDecl::Function(func) => self.function(func),
        }
    }

    fn global_declaration(&mut self, decl: &mut Declaration) -> CheckResult<()> {
        if decl.storage == Storage::Typedef {
            return Ok(());
        }
        for declarator in decl.declarators.iter_mut() {
            let offset = declarator.span.start;
            if declarator.ty.is_function() {
                self.declare_global(&declarator.name, &declarator.ty, GlobalKind::Function { defined: false }, offset)?;
                continue;
            }

            if declarator.ty.is_void() {
                return Err(error(
                    DiagnosticKind::IncompleteType,
                    format!("variable '{}' has incomplete type 'void'", declarator.name),
                    offset,
                ));
            }
            if let CType::Struct(key) = &declarator.ty {
                if !self.types.contains(key) && decl.storage != Storage::Extern {
                    return Err(error(
                        DiagnosticKind::IncompleteType,
                        format!("variable '{}' has incomplete type '{}'", declarator.name, key),
                        offset,
                    ));
                }
            }

            let initialized = declarator.init.is_some();
            self.declare_global(&declarator.name, &declarator.ty, GlobalKind::Variable { initialized }, offset)?;

            if let Some(init) = declarator.init.as_mut() {
                self.initializer(&declarator.ty, init)?;
                let constant = {
                    let globals = &self.globals;
                    is_constant_initializer(init, &|name| {
                        globals.contains_key(name) || builtins::signature(name).is_some()
                    })
                };
                if !constant {
                    return Err(error(
                        DiagnosticKind::TypeMismatch,
                        "initializer element is not a compile-time constant",
                        init.span().start,
                    ));
                }
            }
        }
        Ok(())
    }

    fn function(&mut self, func: &mut FunctionDef) -> CheckResult<()> {
        let ty = CType::Function(Box::new(func.ty.clone()));
        self.declare_global(&func.name, &ty, GlobalKind::Function { defined: true }, func.signature.start)?;

        if let CType::Struct(key) = &func.ty.ret {
            if !self.types.contains(key) {
                return Err(error(
                    DiagnosticKind::IncompleteType,
                    format!("incomplete result type '{}' in function definition", key),
                    func.signature.start,
                ));
            }
        }

        let mut params = FxHashMap::default();
        for param in &func.params {
            if let Some(name) = &param.name {
                params.insert(name.clone(), param.ty.clone());
            }
        }

        self.scopes.push(params);
        self.current_return = Some(func.ty.ret.clone());
        let result = self.stmt(&mut func.body);
        self.current_return = None;
        self.scopes.clear();
        result
    }

    // ===== Statements =====

    fn stmt(&mut self, stmt: &mut Stmt) -> CheckResult<()> {
        let offset = stmt.span.start;
        match &mut stmt.kind {
            StmtKind::Expr(expr) => self.expr(expr),
            StmtKind::Decl(decl) => self.local_declaration(decl),
            StmtKind::Compound(stmts) => {
                self.scopes.push(FxHashMap::default());
                let result = stmts.iter_mut().try_for_each(|s| self.stmt(s));
                self.scopes.pop();
                result
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.condition(cond)?;
                self.stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.stmt(else_branch)?;
                }
                Ok(())
            }
            StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
                self.condition(cond)?;
                self.loop_body(body)
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.scopes.push(FxHashMap::default());
                let result = self.for_clauses(init.as_deref_mut(), cond.as_mut(), step.as_mut(), body);
                self.scopes.pop();
                result
            }
            StmtKind::Switch { cond, cases } => {
                self.expr(cond)?;
                if !cond.ty.decay().is_integer() {
                    return Err(error(
                        DiagnosticKind::TypeMismatch,
                        format!("statement requires expression of integer type ('{}' invalid)", type_name(&cond.ty)),
                        cond.span.start,
                    ));
                }
                let mut seen = Vec::new();
                self.scopes.push(FxHashMap::default());
                self.break_depth += 1;
                let result = cases.iter_mut().try_for_each(|case| {
                    if let Some(value) = case.value.as_mut() {
                        self.expr(value)?;
                        let folded = fold::eval_int_with(value, self.types).ok_or_else(|| {
                            error(
                                DiagnosticKind::TypeMismatch,
                                "case label is not an integer constant expression",
                                value.span.start,
                            )
                        })?;
                        if seen.contains(&folded) {
                            return Err(error(
                                DiagnosticKind::Redefinition,
                                format!("duplicate case value '{}'", folded),
                                value.span.start,
                            ));
                        }
                        seen.push(folded);
                    }
                    case.body.iter_mut().try_for_each(|s| self.stmt(s))
                });
                self.break_depth -= 1;
                self.scopes.pop();
                result
            }
            StmtKind::Break => {
                if self.break_depth == 0 {
                    return Err(error(
                        DiagnosticKind::Syntax,
                        "'break' statement not in loop or switch statement",
                        offset,
                    ));
                }
                Ok(())
            }
            StmtKind::Continue => {
                if self.loop_depth == 0 {
                    return Err(error(DiagnosticKind::Syntax, "'continue' statement not in loop statement", offset));
                }
                Ok(())
            }
            StmtKind::Return(value) => {
                let ret = self.current_return.clone().unwrap_or(CType::Void);
                match value {
                    Some(expr) => {
                        self.expr(expr)?;
                        if ret.is_void() {
                            if !expr.ty.is_void() {
                                return Err(error(
                                    DiagnosticKind::TypeMismatch,
                                    "void function should not return a value",
                                    expr.span.start,
                                ));
                            }
                            Ok(())
                        } else {
                            self.check_assignable(&ret, expr, "returning")
                        }
                    }
                    None => {
                        if !ret.is_void() {
                            self.warn(
                                DiagnosticKind::TypeMismatch,
                                "non-void function should return a value",
                                offset,
                            );
                        }
                        Ok(())
                    }
                }
            }
            StmtKind::Empty => Ok(()),
        }
    }

    fn for_clauses(
        &mut self,
        init: Option<&mut Stmt>,
        cond: Option<&mut Expr>,
        step: Option<&mut Expr>,
        body: &mut Stmt,
    ) -> CheckResult<()> {
        if let Some(init) = init {
            self.stmt(init)?;
        }
        if let Some(cond) = cond {
            self.condition(cond)?;
        }
        if let Some(step) = step {
            self.expr(step)?;
        }
        self.loop_body(body)
    }

    fn loop_body(&mut self, body: &mut Stmt) -> CheckResult<()> {
        self.loop_depth += 1;
        self.break_depth += 1;
        let result = self.stmt(body);
        self.loop_depth -= 1;
        self.break_depth -= 1;
        result
    }

    fn condition(&mut self, cond: &mut Expr) -> CheckResult<()> {
        self.expr(cond)?;
        if !cond.ty.decay().is_scalar() {
            return Err(error(
                DiagnosticKind::TypeMismatch,
                format!("statement requires expression of scalar type ('{}' invalid)", type_name(&cond.ty)),
                cond.span.start,
            ));
        }
        Ok(())
    }

    fn local_declaration(&mut self, decl: &mut Declaration) -> CheckResult<()> {
        if decl.storage == Storage::Typedef {
            return Ok(());
        }
        if decl.storage == Storage::Static {
            return Err(error(
                DiagnosticKind::Unsupported,
                "static local variables are not supported",
                decl.span.start,
            ));
        }

        for declarator in decl.declarators.iter_mut() {
            let offset = declarator.span.start;
            let is_object = !declarator.ty.is_function() && decl.storage != Storage::Extern;
            if is_object && self.types.size_of(&declarator.ty).is_none() {
                return Err(error(
                    DiagnosticKind::IncompleteType,
                    format!(
                        "variable '{}' has incomplete type '{}'",
                        declarator.name,
                        type_name(&declarator.ty)
                    ),
                    offset,
                ));
            }

            let scope = self.scopes.last_mut().ok_or_else(|| {
                error(DiagnosticKind::Syntax, "declaration outside of any scope", offset)
            })?;
            if scope.contains_key(&declarator.name) {
                return Err(error(
                    DiagnosticKind::Redefinition,
                    format!("redefinition of '{}'", declarator.name),
                    offset,
                ));
            }
            scope.insert(declarator.name.clone(), declarator.ty.clone());

            if let Some(init) = declarator.init.as_mut() {
                if !is_object {
                    return Err(error(
                        DiagnosticKind::TypeMismatch,
                        format!("declaration of '{}' cannot have an initializer", declarator.name),
                        init.span().start,
                    ));
                }
                self.initializer(&declarator.ty, init)?;
            }
        }
        Ok(())
    }

    fn initializer(&mut self, ty: &CType, init: &mut Initializer) -> CheckResult<()> {
        let types = self.types;
        match init {
            Initializer::Expr(expr) => {
                self.expr(expr)?;
                if let CType::Array(elem, size) = ty {
                    return match &expr.kind {
                        ExprKind::StringLiteral(bytes) if elem.is_char_like() => {
                            if size.is_some_and(|n| bytes.len() > n) {
                                self.warn(
                                    DiagnosticKind::TypeMismatch,
                                    "initializer-string for char array is too long",
                                    expr.span.start,
                                );
                            }
                            Ok(())
                        }
                        _ => Err(error(
                            DiagnosticKind::TypeMismatch,
                            "array initializer must be an initializer list",
                            expr.span.start,
                        )),
                    };
                }
                self.check_assignable(ty, expr, "initializing")
            }
            Initializer::List { items, span } => match ty {
                CType::Array(elem, size) => {
                    if size.is_some_and(|n| items.len() > n) {
                        return Err(error(
                            DiagnosticKind::TypeMismatch,
                            "excess elements in array initializer",
                            span.start,
                        ));
                    }
                    items.iter_mut().try_for_each(|item| self.initializer(elem, item))
                }
                CType::Struct(key) => {
                    let def = types.get(key).ok_or_else(|| {
                        error(
                            DiagnosticKind::IncompleteType,
                            format!("initializing incomplete type '{}'", key),
                            span.start,
                        )
                    })?;
                    let limit = if def.is_union { 1 } else { def.fields.len() };
                    if items.len() > limit {
                        return Err(error(
                            DiagnosticKind::TypeMismatch,
                            format!("excess elements in {} initializer", if def.is_union { "union" } else { "struct" }),
                            span.start,
                        ));
                    }
                    items
                        .iter_mut()
                        .zip(&def.fields)
                        .try_for_each(|(item, field)| self.initializer(&field.ty, item))
                }
                scalar => match items.as_mut_slice() {
                    [single] => self.initializer(scalar, single),
                    [] => Err(error(DiagnosticKind::TypeMismatch, "scalar initializer cannot be empty", span.start)),
                    _ => Err(error(
                        DiagnosticKind::TypeMismatch,
                        "excess elements in scalar initializer",
                        span.start,
                    )),
                },
            },
        }
    }

    // ===== Expressions =====

    fn expr(&mut self, expr: &mut Expr) -> CheckResult<()> {
        let offset = expr.span.start;
        let ty = match &mut expr.kind {
            ExprKind::IntLiteral(_) | ExprKind::FloatLiteral(_) | ExprKind::CharLiteral(_) | ExprKind::StringLiteral(_) => {
                return Ok(())
            }
            ExprKind::Ident(name) => {
                let ty = self.lookup(name).ok_or_else(|| {
                    error(
                        DiagnosticKind::Undeclared,
                        format!("use of undeclared identifier '{}'", name),
                        offset,
                    )
                })?;
                if !self.is_local(name) {
                    self.references.insert(name.clone());
                }
                ty
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.expr(lhs)?;
                self.expr(rhs)?;
                self.binary_type(*op, lhs, rhs, offset)?
            }
            ExprKind::Unary { op, operand } => {
                self.expr(operand)?;
                self.unary_type(*op, operand, offset)?
            }
            ExprKind::Assign { op, target, value } => {
                self.expr(target)?;
                self.expr(value)?;
                self.require_modifiable(target)?;
                match op {
                    Some(op) => {
                        let result = self.binary_type(*op, target, value, offset)?;
                        if result.is_pointer() != target.ty.is_pointer() {
                            return Err(error(
                                DiagnosticKind::TypeMismatch,
                                format!(
                                    "invalid operands to compound assignment ('{}' and '{}')",
                                    type_name(&target.ty),
                                    type_name(&value.ty)
                                ),
                                offset,
                            ));
                        }
                    }
                    None => self.check_assignable(&target.ty, value, "assigning to")?,
                }
                target.ty.clone()
            }
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.condition(cond)?;
                self.expr(then_expr)?;
                self.expr(else_expr)?;
                self.ternary_type(then_expr, else_expr, offset)?
            }
            ExprKind::Call { callee, args } => {
                self.expr(callee)?;
                for arg in args.iter_mut() {
                    self.expr(arg)?;
                }
                self.call_type(callee, args, offset)?
            }
            ExprKind::Index { base, index } => {
                self.expr(base)?;
                self.expr(index)?;
                let element = match (base.ty.decay(), index.ty.decay()) {
                    (CType::Pointer(elem), i) if i.is_integer() => *elem,
                    (i, CType::Pointer(elem)) if i.is_integer() => *elem,
                    _ => {
                        return Err(error(
                            DiagnosticKind::TypeMismatch,
                            "subscripted value is not an array or pointer",
                            offset,
                        ))
                    }
                };
                if element.is_void() || element.is_function() {
                    return Err(error(
                        DiagnosticKind::TypeMismatch,
                        format!("subscript of pointer to incomplete type '{}'", type_name(&element)),
                        offset,
                    ));
                }
                element
            }
            ExprKind::Member { base, field, arrow } => {
                self.expr(base)?;
                self.member_type(base, field, *arrow, offset)?
            }
            ExprKind::Cast { target, operand } => {
                self.expr(operand)?;
                let from = operand.ty.decay();
                let ok = target.is_void()
                    || (target.is_arithmetic() && from.is_arithmetic())
                    || (target.is_pointer() && (from.is_pointer() || from.is_integer()))
                    || (target.is_integer() && from.is_pointer());
                if !ok {
                    return Err(error(
                        DiagnosticKind::TypeMismatch,
                        format!("invalid cast from '{}' to '{}'", type_name(&from), type_name(target)),
                        offset,
                    ));
                }
                target.clone()
            }
            ExprKind::SizeofType(ty) => {
                if self.types.size_of(ty).is_none() {
                    return Err(error(
                        DiagnosticKind::IncompleteType,
                        format!("invalid application of 'sizeof' to an incomplete type '{}'", type_name(ty)),
                        offset,
                    ));
                }
                CType::Int(IntKind::ULong)
            }
            ExprKind::SizeofExpr(operand) => {
                self.expr(operand)?;
                if self.types.size_of(&operand.ty).is_none() {
                    return Err(error(
                        DiagnosticKind::IncompleteType,
                        format!(
                            "invalid application of 'sizeof' to an incomplete type '{}'",
                            type_name(&operand.ty)
                        ),
                        offset,
                    ));
                }
                CType::Int(IntKind::ULong)
            }
            ExprKind::Comma(lhs, rhs) => {
                self.expr(lhs)?;
                self.expr(rhs)?;
                rhs.ty.decay()
            }
        };

        expr.ty = ty;
        Ok(())
    }

    fn invalid_operands(&self, lhs: &Expr, rhs: &Expr, offset: usize) -> Diagnostic {
        error(
            DiagnosticKind::TypeMismatch,
            format!(
                "invalid operands to binary expression ('{}' and '{}')",
                type_name(&lhs.ty),
                type_name(&rhs.ty)
            ),
            offset,
        )
    }

    fn binary_type(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, offset: usize) -> CheckResult<CType> {
        let l = lhs.ty.decay();
        let r = rhs.ty.decay();

        let ty = match op {
            BinOp::Add => match (&l, &r) {
                _ if l.is_arithmetic() && r.is_arithmetic() => usual_arithmetic(&l, &r),
                (CType::Pointer(_), i) if i.is_integer() => l.clone(),
                (i, CType::Pointer(_)) if i.is_integer() => r.clone(),
                _ => return Err(self.invalid_operands(lhs, rhs, offset)),
            },
            BinOp::Sub => match (&l, &r) {
                _ if l.is_arithmetic() && r.is_arithmetic() => usual_arithmetic(&l, &r),
                (CType::Pointer(_), i) if i.is_integer() => l.clone(),
                (CType::Pointer(_), CType::Pointer(_)) => {
                    if !pointers_compatible(&l, &r) {
                        return Err(self.invalid_operands(lhs, rhs, offset));
                    }
                    CType::Int(IntKind::Long)
                }
                _ => return Err(self.invalid_operands(lhs, rhs, offset)),
            },
            BinOp::Mul | BinOp::Div => {
                if !(l.is_arithmetic() && r.is_arithmetic()) {
                    return Err(self.invalid_operands(lhs, rhs, offset));
                }
                usual_arithmetic(&l, &r)
            }
            BinOp::Mod | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
                if !(l.is_integer() && r.is_integer()) {
                    return Err(self.invalid_operands(lhs, rhs, offset));
                }
                usual_arithmetic(&l, &r)
            }
            BinOp::BitShl | BinOp::BitShr => {
                if !(l.is_integer() && r.is_integer()) {
                    return Err(self.invalid_operands(lhs, rhs, offset));
                }
                promote(&l)
            }
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                if l.is_arithmetic() && r.is_arithmetic() {
                    // fine
                } else if l.is_pointer() && r.is_pointer() {
                    if !pointers_compatible(&l, &r) {
                        self.warn(
                            DiagnosticKind::TypeMismatch,
                            format!(
                                "comparison of distinct pointer types ('{}' and '{}')",
                                type_name(&l),
                                type_name(&r)
                            ),
                            offset,
                        );
                    }
                } else if (l.is_pointer() && r.is_integer()) || (l.is_integer() && r.is_pointer()) {
                    let int_side = if l.is_integer() { lhs } else { rhs };
                    if !is_null_constant(int_side) {
                        self.warn(
                            DiagnosticKind::TypeMismatch,
                            "comparison between pointer and integer",
                            offset,
                        );
                    }
                } else {
                    return Err(self.invalid_operands(lhs, rhs, offset));
                }
                CType::int()
            }
            BinOp::And | BinOp::Or => {
                if !(l.is_scalar() && r.is_scalar()) {
                    return Err(self.invalid_operands(lhs, rhs, offset));
                }
                CType::int()
            }
        };
        Ok(ty)
    }

    fn unary_type(&mut self, op: UnOp, operand: &Expr, offset: usize) -> CheckResult<CType> {
        let v = operand.ty.decay();
        let invalid = || {
            error(
                DiagnosticKind::TypeMismatch,
                format!("invalid argument type '{}' to unary expression", type_name(&operand.ty)),
                offset,
            )
        };

        let ty = match op {
            UnOp::Neg | UnOp::Plus => {
                if !v.is_arithmetic() {
                    return Err(invalid());
                }
                promote(&v)
            }
            UnOp::BitNot => {
                if !v.is_integer() {
                    return Err(invalid());
                }
                promote(&v)
            }
            UnOp::Not => {
                if !v.is_scalar() {
                    return Err(invalid());
                }
                CType::int()
            }
            UnOp::AddrOf => {
                if !is_lvalue(operand) && !operand.ty.is_function() {
                    return Err(error(
                        DiagnosticKind::NotAssignable,
                        "cannot take the address of an rvalue",
                        offset,
                    ));
                }
                operand.ty.clone().pointer_to()
            }
            UnOp::Deref => match v {
                CType::Pointer(pointee) => *pointee,
                _ => {
                    return Err(error(
                        DiagnosticKind::TypeMismatch,
                        format!("indirection requires pointer operand ('{}' invalid)", type_name(&operand.ty)),
                        offset,
                    ))
                }
            },
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                self.require_modifiable(operand)?;
                if !v.is_scalar() {
                    return Err(invalid());
                }
                operand.ty.clone()
            }
        };
        Ok(ty)
    }

    fn require_modifiable(&self, expr: &Expr) -> CheckResult<()> {
        let modifiable = is_lvalue(expr)
            && !expr.ty.is_array()
            && !expr.ty.is_function()
            && !matches!(expr.kind, ExprKind::StringLiteral(_));
        if modifiable {
            Ok(())
        } else {
            Err(error(DiagnosticKind::NotAssignable, "expression is not assignable", expr.span.start))
        }
    }

    fn check_assignable(&mut self, target: &CType, value: &Expr, context: &str) -> CheckResult<()> {
        let v = value.ty.decay();
        let offset = value.span.start;
        match (target, &v) {
            _ if target.is_arithmetic() && v.is_arithmetic() => Ok(()),
            (CType::Pointer(_), CType::Pointer(_)) => {
                if !pointers_compatible(target, &v) {
                    self.warn(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "incompatible pointer types {} '{}' from '{}'",
                            context,
                            type_name(target),
                            type_name(&v)
                        ),
                        offset,
                    );
                }
                Ok(())
            }
            (CType::Pointer(_), i) if i.is_integer() => {
                if !is_null_constant(value) {
                    self.warn(
                        DiagnosticKind::TypeMismatch,
                        format!("incompatible integer to pointer conversion {} '{}'", context, type_name(target)),
                        offset,
                    );
                }
                Ok(())
            }
            (i, CType::Pointer(_)) if i.is_integer() => {
                self.warn(
                    DiagnosticKind::TypeMismatch,
                    format!("incompatible pointer to integer conversion {} '{}'", context, type_name(target)),
                    offset,
                );
                Ok(())
            }
            (CType::Struct(a), CType::Struct(b)) if a == b => Ok(()),
            _ => Err(error(
                DiagnosticKind::TypeMismatch,
                format!(
                    "incompatible types {} '{}' from '{}'",
                    context,
                    type_name(target),
                    type_name(&v)
                ),
                offset,
            )),
        }
    }

    fn ternary_type(&mut self, then_expr: &Expr, else_expr: &Expr, offset: usize) -> CheckResult<CType> {
        let t = then_expr.ty.decay();
        let e = else_expr.ty.decay();

        let ty = if t.is_arithmetic() && e.is_arithmetic() {
            usual_arithmetic(&t, &e)
        } else if t.is_pointer() && e.is_pointer() {
            if t.pointee().is_some_and(CType::is_void) {
                t
            } else if e.pointee().is_some_and(CType::is_void) {
                e
            } else {
                if !pointers_compatible(&t, &e) {
                    self.warn(
                        DiagnosticKind::TypeMismatch,
                        "pointer type mismatch in conditional expression",
                        offset,
                    );
                }
                t
            }
        } else if t.is_pointer() && is_null_constant(else_expr) {
            t
        } else if e.is_pointer() && is_null_constant(then_expr) {
            e
        } else if t.is_void() && e.is_void() {
            CType::Void
        } else if matches!((&t, &e), (CType::Struct(a), CType::Struct(b)) if a == b) {
            t
        } else {
            return Err(error(
                DiagnosticKind::TypeMismatch,
                format!(
                    "incompatible operand types ('{}' and '{}')",
                    type_name(&t),
                    type_name(&e)
                ),
                offset,
            ));
        };
        Ok(ty)
    }

    fn call_type(&mut self, callee: &Expr, args: &[Expr], offset: usize) -> CheckResult<CType> {
        let func: FunctionType = callee.ty.function_type().cloned().ok_or_else(|| {
            error(
                DiagnosticKind::TypeMismatch,
                format!(
                    "called object type '{}' is not a function or function pointer",
                    type_name(&callee.ty)
                ),
                offset,
            )
        })?;

        if args.len() < func.params.len() || (!func.variadic && args.len() > func.params.len()) {
            let which = if args.len() < func.params.len() { "few" } else { "many" };
            return Err(error(
                DiagnosticKind::Arity,
                format!(
                    "too {} arguments to function call, expected {}, have {}",
                    which,
                    func.params.len(),
                    args.len()
                ),
                offset,
            ));
        }

        for (arg, param) in args.iter().zip(&func.params) {
            self.check_assignable(param, arg, "passing")?;
        }
        for arg in args.iter().skip(func.params.len()) {
            if arg.ty.is_void() {
                return Err(error(
                    DiagnosticKind::TypeMismatch,
                    "argument may not have 'void' type",
                    arg.span.start,
                ));
            }
        }

        Ok(func.ret)
    }

    fn member_type(&self, base: &Expr, field: &str, arrow: bool, offset: usize) -> CheckResult<CType> {
        let aggregate = if arrow {
            match base.ty.decay() {
                CType::Pointer(pointee) => *pointee,
                other => {
                    return Err(error(
                        DiagnosticKind::TypeMismatch,
                        format!("member reference type '{}' is not a pointer", type_name(&other)),
                        offset,
                    ))
                }
            }
        } else {
            base.ty.clone()
        };

        let CType::Struct(key) = &aggregate else {
            return Err(error(
                DiagnosticKind::TypeMismatch,
                format!(
                    "member reference base type '{}' is not a structure or union",
                    type_name(&aggregate)
                ),
                offset,
            ));
        };
        let def = self.types.get(key).ok_or_else(|| {
            error(
                DiagnosticKind::IncompleteType,
                format!("incomplete definition of type '{}'", type_name(&aggregate)),
                offset,
            )
        })?;
        def.field(field).map(|f| f.ty.clone()).ok_or_else(|| {
            error(
                DiagnosticKind::Undeclared,
                format!("no member named '{}' in '{}'", field, type_name(&aggregate)),
                offset,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn check(source: &str) -> Result<TranslationUnit, Diagnostic> {
        let mut unit = parse_source(source).expect("parse");
        check_unit(&mut unit, &mut Vec::new())?;
        Ok(unit)
    }

    fn first_return_type(unit: &TranslationUnit) -> CType {
        for item in &unit.items {
            if let ExternalDecl::Function(f) = item {
                if let StmtKind::Compound(stmts) = &f.body.kind {
                    for stmt in stmts {
                        if let StmtKind::Return(Some(expr)) = &stmt.kind {
                            return expr.ty.clone();
                        }
                    }
                }
            }
        }
        panic!("no return statement");
    }

    #[test]
    fn test_expression_types() {
        let unit = check("long f(void) { char c = 1; return c + 1L; }").unwrap();
        assert_eq!(first_return_type(&unit), CType::Int(IntKind::Long));

        let unit = check("int a[4]; int *f(void) { return a + 1; }").unwrap();
        assert_eq!(first_return_type(&unit), CType::int().pointer_to());

        let unit = check("double f(void) { return 1 ? 2 : 3.0; }").unwrap();
        assert_eq!(first_return_type(&unit), CType::Double);
    }

    #[test]
    fn test_undeclared_identifier() {
        let err = check("int f(void) { return missing; }").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Undeclared);
        assert!(err.message.contains("missing"));
    }

    #[test]
    fn test_not_assignable() {
        let err = check("int a[2]; void f(void) { a = 0; }").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::NotAssignable);
        assert!(check("void f(void) { 3 = 4; }").is_err());
    }

    #[test]
    fn test_call_arity() {
        let err = check("int g(int a, int b); int f(void) { return g(1); }").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Arity);
        assert!(check("int f(void) { return printf(\"%d %d\", 1, 2); }").is_ok());
    }

    #[test]
    fn test_members() {
        let source = "struct P { int x; double y; }; double f(struct P *p) { return p->y + (*p).x; }";
        let unit = check(source).unwrap();
        assert_eq!(first_return_type(&unit), CType::Double);
        assert!(check("struct P { int x; }; int f(struct P p) { return p.z; }").is_err());
    }

    #[test]
    fn test_redefinition() {
        let err = check("int f(void) { return 1; } int f(void) { return 2; }").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Redefinition);
        assert!(check("int x; int x; int x = 3;").is_ok());
        assert!(check("int x = 1; int x = 2;").is_err());
        assert!(check("int f(int); int f(int a) { return a; }").is_ok());
    }

    #[test]
    fn test_global_initializer_must_be_constant() {
        assert!(check("int a = 5; int *p = &a; char *s = \"hi\"; int n = sizeof(int) * 2;").is_ok());
        let err = check("int a = 5; int b = a + 1;").unwrap_err();
        assert!(err.message.contains("compile-time constant"));
    }

    #[test]
    fn test_void_return_value() {
        assert!(check("void f(void) { return 1; }").is_err());
    }

    #[test]
    fn test_pointer_warning_is_not_fatal() {
        let mut unit = parse_source("void f(void) { int *p; char *q; p = q; }").unwrap();
        let mut diags = Vec::new();
        check_unit(&mut unit, &mut diags).unwrap();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].severity, crate::parser::Severity::Warning);
    }

    #[test]
    fn test_references() {
        let mut unit = parse_source("int g; int h(int); int f(int g2) { int local = g2; return h(local) + g; }").unwrap();
        let references = check_unit(&mut unit, &mut Vec::new()).unwrap();
        assert_eq!(references, vec!["g".to_string(), "h".to_string()]);
    }

    #[test]
    fn test_break_outside_loop() {
        assert!(check("void f(void) { break; }").is_err());
        assert!(check("void f(int x) { switch (x) { case 1: break; } }").is_ok());
    }
}
