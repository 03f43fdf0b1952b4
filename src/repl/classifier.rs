//! Top-level versus statement classification
//!
//! A probe parse of the session context followed by the buffer tells the
//! two apart. The parser refuses bare expressions at file scope, so
//! anything that is not a valid translation unit ends up on the statement
//! path. Function definitions and prototypes starting inside the buffer
//! make it top-level.

use crate::parser::ast::ExternalDecl;
use crate::parser::preprocessor::MacroEventKind;
use crate::parser::parse_source;
use crate::repl::session::{CodeLine, LineKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// File-scope code. Carries the lines the session records once the
    /// buffer compiles: function signatures, other declarations and macro
    /// directives, in source order.
    TopLevel(Vec<CodeLine>),
    /// Code that belongs inside a function body
    Stmt,
    /// The lexer hit something the bracket scan cannot see, such as an
    /// open block comment
    Incomplete,
}

/// Classify a complete buffer against the accumulated session source
pub fn classify(context: &str, buffer: &str) -> Classification {
    let offset = context.len();
    let source = format!("{}{}", context, buffer);

    let unit = match parse_source(&source) {
        Ok(unit) => unit,
        Err(err) if err.is_unterminated_comment() => {
            log::debug!("classifier: unterminated comment, waiting for more input");
            return Classification::Incomplete;
        }
        Err(err) => {
            log::debug!("classifier: not a translation unit ({}), treating as statements", err);
            return Classification::Stmt;
        }
    };

    let appended: Vec<&ExternalDecl> = unit.items.iter().filter(|item| item.span().start >= offset).collect();
    let declares_function = appended.iter().any(|item| match item {
        ExternalDecl::Function(_) => true,
        ExternalDecl::Declaration(decl) => decl.declarators.iter().any(|d| d.ty.is_function()),
    });
    if !declares_function {
        return Classification::Stmt;
    }

    let mut lines: Vec<(usize, CodeLine)> = Vec::new();
    for item in appended {
        let line = match item {
            ExternalDecl::Function(func) => format!("{};", func.signature.text(&source).trim()),
            ExternalDecl::Declaration(decl) => decl.span.text(&source).trim().to_string(),
        };
        lines.push((item.span().start, CodeLine::new(line, LineKind::Declaration)));
    }
    for event in unit.macros.iter().filter(|m| m.span.start >= offset) {
        let text = event.span.text(&source).trim_end().to_string();
        log::debug!(
            "classifier: {} of macro '{}'",
            if event.kind == MacroEventKind::Define { "definition" } else { "removal" },
            event.name
        );
        lines.push((event.span.start, CodeLine::new(text, LineKind::Preprocessor)));
    }
    lines.sort_by_key(|(start, _)| *start);

    log::debug!("classifier: top-level input with {} recorded line(s)", lines.len());
    Classification::TopLevel(lines.into_iter().map(|(_, line)| line).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_is_statement() {
        assert_eq!(classify("", "42 + 1;"), Classification::Stmt);
        assert_eq!(classify("", "int x = 5;"), Classification::Stmt);
    }

    #[test]
    fn test_function_definition_is_top_level() {
        let Classification::TopLevel(lines) = classify("", "int sq(int x) { return x * x; }") else {
            panic!("expected top-level");
        };
        assert_eq!(lines, vec![CodeLine::new("int sq(int x);", LineKind::Declaration)]);
    }

    #[test]
    fn test_context_functions_are_not_rediscovered() {
        let context = "int sq(int x);\n";
        assert_eq!(classify(context, "sq(3);"), Classification::Stmt);
    }

    #[test]
    fn test_records_declarations_and_macros() {
        let buffer = "#define TWICE(x) ((x) * 2)\nstruct P { int x; };\nint get(struct P *p) { return TWICE(p->x); }";
        let Classification::TopLevel(lines) = classify("", buffer) else {
            panic!("expected top-level");
        };
        assert_eq!(
            lines,
            vec![
                CodeLine::new("#define TWICE(x) ((x) * 2)", LineKind::Preprocessor),
                CodeLine::new("struct P { int x; };", LineKind::Declaration),
                CodeLine::new("int get(struct P *p);", LineKind::Declaration),
            ]
        );
    }

    #[test]
    fn test_unterminated_comment_is_incomplete() {
        assert_eq!(classify("", "int x; /* still typing;"), Classification::Incomplete);
    }
}
