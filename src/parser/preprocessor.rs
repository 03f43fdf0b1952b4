//! Token-level preprocessor
//!
//! Consumes the lexer's stream, interprets [`TokenKind::Directive`] lines and
//! expands object-like and function-like macros. Every `#define`/`#undef`
//! is reported as a [`MacroEvent`] with the span of its directive line so the
//! caller can keep the directive text around for later compilations.
//!
//! Tokens produced by an expansion carry the span of the invocation site.

use super::ast::Span;
use super::lexer::{Lexer, Token, TokenKind};
use super::parse::{DiagnosticKind, ParseError, Parser};
use crate::sema::fold;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroEventKind {
    Define,
    Undef,
}

/// A macro definition or removal seen while preprocessing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroEvent {
    pub kind: MacroEventKind,
    pub name: String,
    /// Span of the whole directive line
    pub span: Span,
}

#[derive(Debug, Clone)]
struct Macro {
    params: Option<Vec<String>>,
    body: Vec<Token>,
}

#[derive(Debug, Clone, Copy)]
struct Conditional {
    /// Whether the enclosing region is live
    parent_live: bool,
    /// Whether some branch of this group has been taken already
    taken: bool,
    live: bool,
    seen_else: bool,
}

/// Output of [`preprocess`]
#[derive(Debug, Clone, Default)]
pub struct Preprocessed {
    pub tokens: Vec<Token>,
    pub macros: Vec<MacroEvent>,
}

/// Macros every translation unit starts with. `#include` is ignored, so the
/// handful of constants user code expects from the standard headers live here.
const PREDEFINED: &[(&str, &str)] = &[
    ("NULL", "((void *)0)"),
    ("EOF", "(-1)"),
    ("__STDC__", "1"),
];

struct Preprocessor {
    macros: FxHashMap<String, Macro>,
    conditionals: Vec<Conditional>,
    events: Vec<MacroEvent>,
}

/// Run directives and macro expansion over a token stream
pub fn preprocess(tokens: Vec<Token>) -> Result<Preprocessed, ParseError> {
    let mut pp = Preprocessor::new()?;
    let mut output = Vec::with_capacity(tokens.len());
    let mut run = Vec::new();

    for token in tokens {
        match &token.kind {
            TokenKind::Directive(text) => {
                pp.flush(&mut run, &mut output)?;
                pp.directive(text, token.span)?;
            }
            TokenKind::Eof => {
                pp.flush(&mut run, &mut output)?;
                if !pp.conditionals.is_empty() {
                    return Err(ParseError::new(
                        DiagnosticKind::Preprocessor,
                        "unterminated conditional directive",
                        token.span.start,
                    ));
                }
                output.push(token);
                break;
            }
            _ => {
                if pp.is_live() {
                    run.push(token);
                }
            }
        }
    }

    Ok(Preprocessed {
        tokens: output,
        macros: pp.events,
    })
}

impl Preprocessor {
    fn new() -> Result<Self, ParseError> {
        let mut macros = FxHashMap::default();
        for (name, body) in PREDEFINED {
            let mut tokens = Lexer::new(body).tokenize().map_err(ParseError::from)?;
            tokens.pop(); // Eof
            macros.insert(
                name.to_string(),
                Macro {
                    params: None,
                    body: tokens,
                },
            );
        }
        Ok(Preprocessor {
            macros,
            conditionals: Vec::new(),
            events: Vec::new(),
        })
    }

    fn is_live(&self) -> bool {
        self.conditionals.last().map_or(true, |c| c.live)
    }

    fn flush(&self, run: &mut Vec<Token>, output: &mut Vec<Token>) -> Result<(), ParseError> {
        if run.is_empty() {
            return Ok(());
        }
        let tokens = std::mem::take(run);
        self.expand(&tokens, &mut Vec::new(), None, output)
    }

    fn directive(&mut self, text: &str, span: Span) -> Result<(), ParseError> {
        // Skip the '#'
        let body = text.get(1..).unwrap_or("");
        let mut tokens = Lexer::with_base(body, span.start + 1)
            .tokenize()
            .map_err(ParseError::from)?;
        tokens.pop(); // Eof

        let Some(first) = tokens.first() else {
            return Ok(()); // null directive
        };
        let name = match &first.kind {
            TokenKind::Ident(name) => name.clone(),
            kind if !kind.punctuation().is_empty() => kind.punctuation().to_string(),
            _ => {
                return Err(ParseError::new(
                    DiagnosticKind::Preprocessor,
                    "invalid preprocessing directive",
                    first.span.start,
                ))
            }
        };
        let name_span = first.span;
        let args = &tokens[1..];

        match name.as_str() {
            "ifdef" | "ifndef" => {
                let defined = self.macro_name(args, name_span)?.map_or(false, |(n, _)| self.macros.contains_key(&n));
                let cond = if name == "ifdef" { defined } else { !defined };
                self.push_conditional(cond);
            }
            "if" => {
                let cond = self.is_live() && self.evaluate(args, name_span)?;
                self.push_conditional(cond);
            }
            "elif" => {
                let frame = self.current_conditional(&name, name_span)?;
                let cond = frame.parent_live && !frame.taken && self.evaluate(args, name_span)?;
                self.update_conditional(cond);
            }
            "else" => {
                let frame = self.current_conditional(&name, name_span)?;
                if frame.seen_else {
                    return Err(ParseError::new(
                        DiagnosticKind::Preprocessor,
                        "#else after #else",
                        name_span.start,
                    ));
                }
                let cond = frame.parent_live && !frame.taken;
                self.update_conditional(cond);
                if let Some(top) = self.conditionals.last_mut() {
                    top.seen_else = true;
                }
            }
            "endif" => {
                self.current_conditional(&name, name_span)?;
                self.conditionals.pop();
            }
            _ if !self.is_live() => {}
            "define" => self.define(args, name_span, span)?,
            "undef" => {
                if let Some((macro_name, _)) = self.macro_name(args, name_span)? {
                    self.macros.remove(&macro_name);
                    self.events.push(MacroEvent {
                        kind: MacroEventKind::Undef,
                        name: macro_name,
                        span,
                    });
                }
            }
            "error" => {
                let message = text
                    .get(name_span.end - span.start..)
                    .unwrap_or("")
                    .trim()
                    .to_string();
                return Err(ParseError::new(
                    DiagnosticKind::Preprocessor,
                    format!("#error {}", message),
                    span.start,
                ));
            }
            "include" | "pragma" | "line" | "warning" => {
                log::trace!("ignoring #{} directive", name);
            }
            other => {
                return Err(ParseError::new(
                    DiagnosticKind::Preprocessor,
                    format!("invalid preprocessing directive #{}", other),
                    name_span.start,
                ))
            }
        }

        Ok(())
    }

    fn push_conditional(&mut self, cond: bool) {
        let parent_live = self.is_live();
        let live = parent_live && cond;
        self.conditionals.push(Conditional {
            parent_live,
            taken: live,
            live,
            seen_else: false,
        });
    }

    fn update_conditional(&mut self, cond: bool) {
        if let Some(top) = self.conditionals.last_mut() {
            top.live = cond;
            top.taken |= cond;
        }
    }

    fn current_conditional(&self, name: &str, span: Span) -> Result<Conditional, ParseError> {
        self.conditionals.last().copied().ok_or_else(|| {
            ParseError::new(
                DiagnosticKind::Preprocessor,
                format!("#{} without #if", name),
                span.start,
            )
        })
    }

    /// Identifier operand of `#ifdef`, `#ifndef` and `#undef`
    fn macro_name(&self, args: &[Token], at: Span) -> Result<Option<(String, Span)>, ParseError> {
        match args.first() {
            Some(Token {
                kind: TokenKind::Ident(name),
                span,
            }) => Ok(Some((name.clone(), *span))),
            _ => Err(ParseError::new(
                DiagnosticKind::Preprocessor,
                "macro name must be an identifier",
                at.end,
            )),
        }
    }

    fn define(&mut self, args: &[Token], at: Span, line: Span) -> Result<(), ParseError> {
        let Some((name, name_span)) = self.macro_name(args, at)? else {
            return Ok(());
        };
        let mut rest = &args[1..];

        // Function-like only when '(' follows the name without whitespace
        let params = match rest.first() {
            Some(tok) if tok.kind == TokenKind::LParen && tok.span.start == name_span.end => {
                let mut params = Vec::new();
                let mut index = 1;
                loop {
                    match rest.get(index).map(|t| &t.kind) {
                        Some(TokenKind::RParen) if params.is_empty() => break,
                        Some(TokenKind::Ident(param)) => {
                            params.push(param.clone());
                            index += 1;
                            match rest.get(index).map(|t| &t.kind) {
                                Some(TokenKind::Comma) => index += 1,
                                Some(TokenKind::RParen) => break,
                                _ => return Err(self.bad_params(rest.get(index), line)),
                            }
                        }
                        _ => return Err(self.bad_params(rest.get(index), line)),
                    }
                }
                rest = &rest[index + 1..];
                Some(params)
            }
            _ => None,
        };

        if let Some(hash) = rest.iter().find(|t| t.kind == TokenKind::Hash) {
            return Err(ParseError::new(
                DiagnosticKind::Preprocessor,
                "'#' and '##' operators are not supported in macro bodies",
                hash.span.start,
            ));
        }

        self.macros.insert(
            name.clone(),
            Macro {
                params,
                body: rest.to_vec(),
            },
        );
        self.events.push(MacroEvent {
            kind: MacroEventKind::Define,
            name,
            span: line,
        });
        Ok(())
    }

    fn bad_params(&self, token: Option<&Token>, line: Span) -> ParseError {
        ParseError::new(
            DiagnosticKind::Preprocessor,
            "invalid macro parameter list",
            token.map_or(line.end, |t| t.span.start),
        )
    }

    /// Evaluate a `#if`/`#elif` condition
    fn evaluate(&self, args: &[Token], at: Span) -> Result<bool, ParseError> {
        // Resolve `defined X` / `defined(X)` before expansion
        let mut resolved = Vec::with_capacity(args.len());
        let mut index = 0;
        while index < args.len() {
            let token = &args[index];
            if token.kind == TokenKind::Ident("defined".to_string()) {
                let (name, consumed) = match args.get(index + 1).map(|t| &t.kind) {
                    Some(TokenKind::Ident(name)) => (name.clone(), 2),
                    Some(TokenKind::LParen) => match (
                        args.get(index + 2).map(|t| &t.kind),
                        args.get(index + 3).map(|t| &t.kind),
                    ) {
                        (Some(TokenKind::Ident(name)), Some(TokenKind::RParen)) => (name.clone(), 4),
                        _ => {
                            return Err(ParseError::new(
                                DiagnosticKind::Preprocessor,
                                "operator 'defined' requires an identifier",
                                token.span.start,
                            ))
                        }
                    },
                    _ => {
                        return Err(ParseError::new(
                            DiagnosticKind::Preprocessor,
                            "operator 'defined' requires an identifier",
                            token.span.start,
                        ))
                    }
                };
                let value = self.macros.contains_key(&name) as u64;
                resolved.push(Token::new(
                    TokenKind::IntLiteral(value, crate::sema::types::IntKind::Int),
                    token.span,
                ));
                index += consumed;
            } else {
                resolved.push(token.clone());
                index += 1;
            }
        }

        let mut expanded = Vec::new();
        self.expand(&resolved, &mut Vec::new(), None, &mut expanded)?;

        // Identifiers left after expansion evaluate to 0
        for token in expanded.iter_mut() {
            if matches!(token.kind, TokenKind::Ident(_)) {
                token.kind = TokenKind::IntLiteral(0, crate::sema::types::IntKind::Int);
            }
        }

        if expanded.is_empty() {
            return Err(ParseError::new(
                DiagnosticKind::Preprocessor,
                "#if with no expression",
                at.end,
            ));
        }
        let end = expanded.last().map_or(at.end, |t| t.span.end);
        expanded.push(Token::new(TokenKind::Eof, Span::new(end, end)));

        let mut parser = Parser::new(expanded);
        let expr = parser.parse_expression()?;
        parser.expect_end()?;

        fold::eval_int(&expr)
            .map(|v| v != 0)
            .ok_or_else(|| ParseError::new(DiagnosticKind::Preprocessor, "invalid #if expression", at.start))
    }

    fn expand(
        &self,
        tokens: &[Token],
        active: &mut Vec<String>,
        site: Option<Span>,
        output: &mut Vec<Token>,
    ) -> Result<(), ParseError> {
        let mut index = 0;

        while index < tokens.len() {
            let token = &tokens[index];

            if let TokenKind::Ident(name) = &token.kind {
                if let Some(mac) = self.macros.get(name).filter(|_| !active.contains(name)) {
                    match &mac.params {
                        None => {
                            let span = site.unwrap_or(token.span);
                            active.push(name.clone());
                            self.expand(&mac.body, active, Some(span), output)?;
                            active.pop();
                            index += 1;
                            continue;
                        }
                        Some(params) if matches!(tokens.get(index + 1).map(|t| &t.kind), Some(TokenKind::LParen)) => {
                            let (args, close) = collect_arguments(tokens, index + 1)?;
                            let span = site.unwrap_or_else(|| token.span.to(tokens[close].span));

                            let args = if params.is_empty() && args.len() == 1 && args[0].is_empty() {
                                Vec::new()
                            } else {
                                args
                            };
                            if args.len() != params.len() {
                                return Err(ParseError::new(
                                    DiagnosticKind::Preprocessor,
                                    format!(
                                        "macro '{}' expects {} arguments, got {}",
                                        name,
                                        params.len(),
                                        args.len()
                                    ),
                                    token.span.start,
                                ));
                            }

                            let mut expanded_args = Vec::with_capacity(args.len());
                            for arg in &args {
                                let mut expanded = Vec::new();
                                self.expand(arg, active, Some(span), &mut expanded)?;
                                expanded_args.push(expanded);
                            }

                            let body = substitute(&mac.body, params, &expanded_args);
                            active.push(name.clone());
                            self.expand(&body, active, Some(span), output)?;
                            active.pop();
                            index = close + 1;
                            continue;
                        }
                        Some(_) => {}
                    }
                }
            }

            let mut token = token.clone();
            if let Some(span) = site {
                token.span = span;
            }
            output.push(token);
            index += 1;
        }

        Ok(())
    }
}

/// Split a macro call's argument list starting at the `(` at `open`. Returns
/// the arguments and the index of the closing `)`.
fn collect_arguments(tokens: &[Token], open: usize) -> Result<(Vec<Vec<Token>>, usize), ParseError> {
    let mut args = vec![Vec::new()];
    let mut depth = 0usize;

    for (index, token) in tokens.iter().enumerate().skip(open + 1) {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen if depth == 0 => return Ok((args, index)),
            TokenKind::RParen => depth -= 1,
            TokenKind::Comma if depth == 0 => {
                args.push(Vec::new());
                continue;
            }
            _ => {}
        }
        if let Some(current) = args.last_mut() {
            current.push(token.clone());
        }
    }

    Err(ParseError::new(
        DiagnosticKind::Preprocessor,
        "unterminated argument list invoking macro",
        tokens[open].span.start,
    ))
}

fn substitute(body: &[Token], params: &[String], args: &[Vec<Token>]) -> Vec<Token> {
    let mut result = Vec::with_capacity(body.len());
    for token in body {
        match &token.kind {
            TokenKind::Ident(name) => match params.iter().position(|p| p == name) {
                Some(i) => result.extend(args[i].iter().cloned()),
                None => result.push(token.clone()),
            },
            _ => result.push(token.clone()),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::tokenize;

    fn run(source: &str) -> Preprocessed {
        preprocess(tokenize(source).unwrap()).unwrap()
    }

    fn idents(pre: &Preprocessed) -> Vec<String> {
        pre.tokens
            .iter()
            .map(|t| match &t.kind {
                TokenKind::Ident(s) => s.clone(),
                TokenKind::IntLiteral(n, _) => n.to_string(),
                other => other.punctuation().to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect()
    }

    #[test]
    fn test_object_macro() {
        let out = run("#define N 10\nint a = N;");
        assert_eq!(idents(&out), ["int", "a", "=", "10", ";"]);
        assert_eq!(out.macros.len(), 1);
        assert_eq!(out.macros[0].kind, MacroEventKind::Define);
        assert_eq!(out.macros[0].span, Span::new(0, 12));
    }

    #[test]
    fn test_function_macro_carries_site_span() {
        let source = "#define SQ(x) ((x)*(x))\nSQ(y);";
        let out = run(source);
        assert_eq!(idents(&out), ["(", "(", "y", ")", "*", "(", "y", ")", ")", ";"]);
        let call = Span::new(24, 29);
        assert_eq!(call.text(source), "SQ(y)");
        assert!(out.tokens[..9].iter().all(|t| t.span == call));
    }

    #[test]
    fn test_conditionals() {
        let out = run("#define A 1\n#if A && !defined(B)\nx\n#elif 1\ny\n#else\nz\n#endif\n");
        assert_eq!(idents(&out), ["x"]);

        let out = run("#ifdef MISSING\nx\n#else\ny\n#endif\n");
        assert_eq!(idents(&out), ["y"]);
    }

    #[test]
    fn test_undef_and_self_reference() {
        let out = run("#define X X + 1\nX\n#undef X\nX");
        assert_eq!(idents(&out), ["X", "+", "1", "X"]);
        assert_eq!(out.macros[1].kind, MacroEventKind::Undef);
    }

    #[test]
    fn test_error_directive() {
        let err = preprocess(tokenize("#error stop here\n").unwrap()).unwrap_err();
        assert!(err.message.contains("stop here"));
    }

    #[test]
    fn test_unterminated_if() {
        assert!(preprocess(tokenize("#if 1\nint x;").unwrap()).is_err());
    }

    #[test]
    fn test_null_is_predefined() {
        let out = run("p = NULL;");
        assert!(out.tokens.iter().any(|t| t.kind == TokenKind::Void));
    }
}
