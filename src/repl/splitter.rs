// Splits pasted statement blocks into independently executed units

use crate::parser::ast::{ExternalDecl, StmtKind};
use crate::parser::{parse_source, Diagnostic};

/// Name of the function the buffer is parsed inside of
pub const SPLIT_HOST: &str = "__split";

/// Text placed between the context and the buffer
pub fn split_header() -> String {
    format!("void {}(void) {{\n", SPLIT_HOST)
}

/// Split `buffer` into its top-level statements, in written order.
///
/// A single statement comes back as the untouched buffer. On a parse error
/// nothing is returned; the diagnostic's offset is relative to `buffer`.
pub fn split(context: &str, buffer: &str) -> Result<Vec<String>, Diagnostic> {
    let base = context.len() + split_header().len();
    let source = format!("{}{}{}\n}}\n", context, split_header(), buffer);

    let unit = parse_source(&source).map_err(|err| {
        let mut diagnostic = err.into_diagnostic();
        diagnostic.offset = diagnostic.offset.saturating_sub(base);
        diagnostic
    })?;

    let body = unit.items.iter().rev().find_map(|item| match item {
        ExternalDecl::Function(func) if func.name == SPLIT_HOST && func.span.start >= context.len() => Some(&func.body),
        _ => None,
    });
    let stmts = match body.map(|b| &b.kind) {
        Some(StmtKind::Compound(stmts)) => stmts,
        _ => return Ok(Vec::new()),
    };

    if stmts.len() <= 1 {
        return Ok(vec![buffer.to_string()]);
    }

    let units = stmts
        .iter()
        .map(|stmt| {
            let mut text = stmt.span.text(&source).to_string();
            let rest = source[stmt.span.end.min(source.len())..].trim_start();
            if rest.starts_with(';') && !text.ends_with(';') && !text.ends_with('}') {
                text.push(';');
            }
            text
        })
        .collect::<Vec<_>>();
    log::debug!("splitter: {} unit(s)", units.len());
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_statement_is_untouched() {
        let buffer = "x = 1;   // keep this comment";
        assert_eq!(split("int x;\n", buffer).unwrap(), vec![buffer.to_string()]);
    }

    #[test]
    fn test_multiple_statements_in_order() {
        let units = split("int x, y, z;\n", "x = 1; y = 2; z = x + y;").unwrap();
        assert_eq!(units, vec!["x = 1;", "y = 2;", "z = x + y;"]);
    }

    #[test]
    fn test_blocks_keep_their_braces() {
        let units = split("int x;\n", "if (x) { x = 0; }\nfor (;;) break;").unwrap();
        assert_eq!(units, vec!["if (x) { x = 0; }", "for (;;) break;"]);
    }

    #[test]
    fn test_parse_error_yields_nothing() {
        let err = split("", "x = ;").unwrap_err();
        assert!(err.offset <= 5);
    }
}
