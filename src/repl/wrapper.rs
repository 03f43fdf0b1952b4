// Host code synthesis: wraps a statement-level unit as file-scope code

use crate::parser::ast::*;
use crate::parser::{parse_source, Diagnostic, DiagnosticKind};
use crate::repl::diagnostics::DiagnosticsDeduplicator;
use crate::repl::session::{CodeLine, LineKind};
use crate::sema::types::{spell, type_name, CType, TypeTable};
use crate::sema::{check_unit, is_constant_initializer};

/// Name of the function a unit is type-checked inside of
pub const PROBE_HOST: &str = "__probe";

/// What a unit turned out to be
#[derive(Debug, Clone, PartialEq)]
pub enum UnitKind {
    /// An expression whose value is returned as `ty`. When `printable` is
    /// false the wrapper fell back to `void` and `ty` is only a tag.
    Expression { ty: CType, printable: bool },
    Declaration,
    Statement,
}

/// Generated file-scope code for one unit
#[derive(Debug, Clone, PartialEq)]
pub struct WrappedUnit {
    pub kind: UnitKind,
    pub appendix: String,
    /// Zero-argument function to invoke after linking
    pub entry: Option<String>,
    /// Lines to record once the unit is linked
    pub lines: Vec<CodeLine>,
    /// Where the user's text starts inside `appendix`
    pub text_offset: usize,
}

/// Name of the wrapper function for the `counter`-th statement line
pub fn entry_name(counter: usize) -> String {
    format!("__anon{}", counter)
}

fn probe_header() -> String {
    format!("void {}(void) {{\n", PROBE_HOST)
}

/// Wrap a single statement-level `unit`.
///
/// `counter` is the number of statement lines recorded so far and names the
/// entry point. Diagnostics from the probe go to `diagnostics`; a probe
/// error is returned with its offset relative to `unit`.
pub fn wrap(
    context: &str,
    unit: &str,
    counter: usize,
    diagnostics: &mut DiagnosticsDeduplicator,
) -> Result<WrappedUnit, Diagnostic> {
    let base = context.len() + probe_header().len();
    let source = format!("{}{}{}\n}}\n", context, probe_header(), unit);
    let relative = |mut d: Diagnostic| {
        d.offset = d.offset.saturating_sub(base);
        d
    };

    let mut parsed = parse_source(&source).map_err(|e| relative(e.into_diagnostic()))?;

    let verbatim = match probe_statement(&parsed, context.len()) {
        Some(StmtKind::Decl(decl)) => {
            matches!(decl.storage, Storage::Typedef | Storage::Extern | Storage::Static) || decl.declarators.is_empty()
        }
        Some(_) => false,
        None => return Ok(statement(unit, counter)),
    };
    if verbatim {
        log::debug!("wrapper: file-scope declaration kept verbatim");
        return Ok(WrappedUnit {
            kind: UnitKind::Declaration,
            appendix: format!("{}\n", unit),
            entry: None,
            lines: vec![CodeLine::new(unit.trim(), LineKind::Declaration)],
            text_offset: 0,
        });
    }

    diagnostics.set_base(base);
    check_unit(&mut parsed, diagnostics).map_err(relative)?;

    let wrapped = match probe_statement(&parsed, context.len()) {
        Some(StmtKind::Expr(expr)) => expression(expr, &source, unit, counter),
        Some(StmtKind::Decl(decl)) => declaration(decl, &source, unit, counter, &parsed.types).map_err(relative)?,
        _ => statement(unit, counter),
    };
    log::debug!("wrapper: {:?} unit\n{}", wrapped.kind, wrapped.appendix);
    Ok(wrapped)
}

/// The only statement of the probe function, if there is exactly one
fn probe_statement(unit: &TranslationUnit, context_len: usize) -> Option<&StmtKind> {
    let body = unit.items.iter().rev().find_map(|item| match item {
        ExternalDecl::Function(func) if func.name == PROBE_HOST && func.span.start >= context_len => Some(&func.body),
        _ => None,
    })?;
    match &body.kind {
        StmtKind::Compound(stmts) if stmts.len() == 1 => Some(&stmts[0].kind),
        _ => None,
    }
}

/// Return type an expression of type `ty` can be captured as
fn return_type(ty: &CType) -> Option<CType> {
    match ty {
        CType::Void | CType::Struct(_) => None,
        CType::Pointer(_) if ty.mentions_anonymous_aggregate() => Some(CType::Void.pointer_to()),
        other => Some(other.clone()),
    }
}

fn expression(expr: &Expr, source: &str, unit: &str, counter: usize) -> WrappedUnit {
    let name = entry_name(counter);
    let ty = expr.ty.decay();
    let lines = vec![CodeLine::new(unit.trim(), LineKind::Statement)];

    match return_type(&ty) {
        Some(ret) => {
            let prologue = format!("{} {{\nreturn ", spell(&ret, &format!("{}(void)", name)));
            WrappedUnit {
                kind: UnitKind::Expression { ty: ret, printable: true },
                appendix: format!("{}{};\n}}\n", prologue, expr.span.text(source)),
                entry: Some(name),
                lines,
                text_offset: prologue.len(),
            }
        }
        None => {
            let header = format!("void {}(void) {{\n", name);
            WrappedUnit {
                kind: UnitKind::Expression {
                    printable: ty.is_void(),
                    ty,
                },
                appendix: format!("{}{}\n}}\n", header, unit),
                entry: Some(name),
                lines,
                text_offset: header.len(),
            }
        }
    }
}

fn statement(unit: &str, counter: usize) -> WrappedUnit {
    let name = entry_name(counter);
    let header = format!("void {}(void) {{\n", name);
    WrappedUnit {
        kind: UnitKind::Statement,
        appendix: format!("{}{}\n}}\n", header, unit),
        entry: Some(name),
        lines: vec![CodeLine::new(unit.trim(), LineKind::Statement)],
        text_offset: header.len(),
    }
}

fn declaration(
    decl: &Declaration,
    source: &str,
    unit: &str,
    counter: usize,
    types: &TypeTable,
) -> Result<WrappedUnit, Diagnostic> {
    let all_static = |_: &str| true;
    let needs_code = decl
        .declarators
        .iter()
        .any(|d| d.init.as_ref().is_some_and(|init| !is_constant_initializer(init, &all_static)));

    if !needs_code {
        return Ok(WrappedUnit {
            kind: UnitKind::Declaration,
            appendix: format!("{}\n", unit),
            entry: None,
            lines: vec![CodeLine::new(unit.trim(), LineKind::Declaration)],
            text_offset: 0,
        });
    }

    let mut globals = Vec::new();
    let mut stmts = Vec::new();

    // A struct body in the specifiers is emitted once, then referred to by tag
    let mut specifiers = decl.specifiers.text(source).to_string();
    if decl.defines_aggregate.is_some() && !decl.base_type.mentions_anonymous_aggregate() {
        globals.push(format!("{};", specifiers));
        specifiers = type_name(&decl.base_type);
    }

    for declarator in &decl.declarators {
        let text = declarator.span.text(source);
        let init = match &declarator.init {
            Some(init) if !is_constant_initializer(init, &all_static) => init,
            Some(init) => {
                globals.push(format!("{} {} = {};", specifiers, text, init.span().text(source)));
                continue;
            }
            None => {
                globals.push(format!("{} {};", specifiers, text));
                continue;
            }
        };

        // The initializer may have supplied the array length
        if text.contains("[]") {
            globals.push(format!("{};", spell(&declarator.ty, &declarator.name)));
        } else {
            globals.push(format!("{} {};", specifiers, text));
        }
        assignments(&declarator.name, &declarator.ty, init, source, types, &mut stmts)?;
    }

    let mut lines: Vec<CodeLine> = globals.iter().map(|g| CodeLine::new(g.as_str(), LineKind::Declaration)).collect();
    let mut appendix: String = globals.iter().map(|g| format!("{}\n", g)).collect();
    if stmts.is_empty() {
        // Nothing to run, so no entry point takes a wrapper name
        return Ok(WrappedUnit {
            kind: UnitKind::Declaration,
            appendix,
            entry: None,
            lines,
            text_offset: 0,
        });
    }

    let name = entry_name(counter);
    let header = format!("void {}(void) {{\n", name);
    let text_offset = appendix.len() + header.len();
    appendix.push_str(&header);
    for stmt in &stmts {
        appendix.push_str(stmt);
        appendix.push('\n');
    }
    appendix.push_str("}\n");

    lines.extend(stmts.into_iter().map(|s| CodeLine::new(s, LineKind::Statement)));

    Ok(WrappedUnit {
        kind: UnitKind::Declaration,
        appendix,
        entry: Some(name),
        lines,
        text_offset,
    })
}

/// Assignments performing `init` on `target`, element sources verbatim
fn assignments(
    target: &str,
    ty: &CType,
    init: &Initializer,
    source: &str,
    types: &TypeTable,
    out: &mut Vec<String>,
) -> Result<(), Diagnostic> {
    let items = match init {
        Initializer::Expr(expr) => {
            out.push(format!("{} = {};", target, expr.span.text(source)));
            return Ok(());
        }
        Initializer::List { items, .. } => items,
    };

    match ty {
        CType::Array(elem, _) => {
            for (i, item) in items.iter().enumerate() {
                assignments(&format!("{}[{}]", target, i), elem, item, source, types, out)?;
            }
        }
        CType::Struct(key) => {
            let def = types.get(key).ok_or_else(|| {
                Diagnostic::error(
                    DiagnosticKind::IncompleteType,
                    format!("initializer for incomplete type '{}'", key),
                    init.span().start,
                )
            })?;
            let count = if def.is_union { 1 } else { def.fields.len() };
            for (item, field) in items.iter().zip(def.fields.iter().take(count)) {
                assignments(&format!("{}.{}", target, field.name), &field.ty, item, source, types, out)?;
            }
        }
        scalar => {
            if let Some(item) = items.first() {
                assignments(target, scalar, item, source, types, out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap_unit(context: &str, unit: &str) -> WrappedUnit {
        wrap(context, unit, 0, &mut DiagnosticsDeduplicator::new()).unwrap()
    }

    #[test]
    fn test_expression_returns_its_type() {
        let wrapped = wrap_unit("", "42 + 1;");
        assert_eq!(wrapped.appendix, "int __anon0(void) {\nreturn 42 + 1;\n}\n");
        assert_eq!(
            wrapped.kind,
            UnitKind::Expression {
                ty: CType::int(),
                printable: true
            }
        );
        assert_eq!(&wrapped.appendix[wrapped.text_offset..wrapped.text_offset + 6], "42 + 1");
    }

    #[test]
    fn test_arrays_decay_and_functions_become_pointers() {
        let wrapped = wrap_unit("int a[3];\n", "a;");
        assert!(wrapped.appendix.starts_with("int *__anon0(void)"));

        let wrapped = wrap_unit("int sq(int x);\n", "sq;");
        assert!(wrapped.appendix.starts_with("int (*__anon0(void))(int)"));
    }

    #[test]
    fn test_struct_values_fall_back_to_void() {
        let wrapped = wrap_unit("struct P { int x; };\nstruct P p;\n", "p;");
        assert!(wrapped.appendix.starts_with("void __anon0(void) {\np;"));
        assert_eq!(
            wrapped.kind,
            UnitKind::Expression {
                ty: CType::Struct("struct P".to_string()),
                printable: false
            }
        );
    }

    #[test]
    fn test_unknown_aggregate_initializer_is_an_error() {
        let source = "int v = {1, 2};";
        let unit = parse_source(source).unwrap();
        let ExternalDecl::Declaration(decl) = &unit.items[0] else {
            panic!("expected a declaration");
        };
        let init = decl.declarators[0].init.as_ref().unwrap();
        let missing = CType::Struct("struct Missing".to_string());

        let mut out = Vec::new();
        let err = assignments("v", &missing, init, source, &TypeTable::new(), &mut out).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::IncompleteType);
        assert_eq!(err.offset, source.find('{').unwrap());
        assert!(out.is_empty());
    }

    #[test]
    fn test_every_entry_records_a_statement() {
        for unit in ["int a = 5, b = a + 1;", "int q = 2 * 3 + 1;", "1;", "if (1) {}"] {
            let wrapped = wrap_unit("", unit);
            if wrapped.entry.is_some() {
                assert!(wrapped.lines.iter().any(|l| l.kind == LineKind::Statement), "{}", unit);
            }
        }
    }

    #[test]
    fn test_constant_declaration_stays_global() {
        let wrapped = wrap_unit("", "int a = 5;");
        assert_eq!(wrapped.entry, None);
        assert_eq!(wrapped.lines, vec![CodeLine::new("int a = 5;", LineKind::Declaration)]);
    }

    #[test]
    fn test_runtime_initializer_becomes_assignment() {
        let wrapped = wrap_unit("", "int a = 5, b = a + 1;");
        assert_eq!(
            wrapped.lines,
            vec![
                CodeLine::new("int a = 5;", LineKind::Declaration),
                CodeLine::new("int b;", LineKind::Declaration),
                CodeLine::new("b = a + 1;", LineKind::Statement),
            ]
        );
        assert_eq!(wrapped.entry.as_deref(), Some("__anon0"));
    }

    #[test]
    fn test_brace_list_becomes_indexed_assignments() {
        let wrapped = wrap_unit("int f(void);\n", "int v[] = {f(), 2, f()};");
        assert_eq!(
            wrapped.lines,
            vec![
                CodeLine::new("int v[3];", LineKind::Declaration),
                CodeLine::new("v[0] = f();", LineKind::Statement),
                CodeLine::new("v[1] = 2;", LineKind::Statement),
                CodeLine::new("v[2] = f();", LineKind::Statement),
            ]
        );
    }

    #[test]
    fn test_struct_brace_list_assigns_members() {
        let context = "struct P { int x; int y; };\nint f(void);\n";
        let wrapped = wrap_unit(context, "struct P p = {f(), 7};");
        assert_eq!(
            wrapped.lines,
            vec![
                CodeLine::new("struct P p;", LineKind::Declaration),
                CodeLine::new("p.x = f();", LineKind::Statement),
                CodeLine::new("p.y = 7;", LineKind::Statement),
            ]
        );
    }

    #[test]
    fn test_other_statements_are_wrapped_as_written() {
        let wrapped = wrap_unit("int x;\n", "if (x) x = 2;");
        assert_eq!(wrapped.kind, UnitKind::Statement);
        assert_eq!(wrapped.appendix, "void __anon0(void) {\nif (x) x = 2;\n}\n");
    }

    #[test]
    fn test_probe_errors_are_relative() {
        let err = wrap("int x;\n", "y + 1;", 0, &mut DiagnosticsDeduplicator::new()).unwrap_err();
        assert_eq!(err.offset, 0);
    }
}
