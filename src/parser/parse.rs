//! Main parser coordinator
//!
//! This module provides the [`Parser`] struct and core parsing infrastructure,
//! including error and diagnostic types, helper methods, and the main parse
//! entry point.
//!
//! # Parser Architecture
//!
//! The Parser uses a recursive descent approach with the following organization:
//! - This module: Parser struct, helper methods, and coordination
//! - `declarations`: declaration specifiers, declarators, struct/union bodies
//!   and function definitions
//! - `statements`: Parsing statements (if, while, for, etc.)
//! - `expressions`: Parsing expressions with precedence climbing
//!
//! Typedef names are tracked per scope while parsing because `T * x;` is a
//! declaration or a multiplication depending on what `T` is.

use crate::parser::ast::*;
use crate::parser::lexer::{LexError, LexErrorKind, Lexer, Token, TokenKind};
use crate::parser::preprocessor;
use crate::sema::types::{CType, TypeTable};
use rustc_hash::FxHashMap;
use std::fmt;

/// Diagnostic categories. Together with a relative offset they identify a
/// diagnostic across repeated parses of the same input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Lexical(LexErrorKind),
    Syntax,
    Preprocessor,
    ExpressionAtFileScope,
    Undeclared,
    Redefinition,
    TypeMismatch,
    NotAssignable,
    Arity,
    IncompleteType,
    Unsupported,
    Link,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A message produced while processing one source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Byte offset into the source that produced it
    pub offset: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, message: impl Into<String>, offset: usize) -> Self {
        Diagnostic {
            kind,
            severity: Severity::Error,
            offset,
            message: message.into(),
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>, offset: usize) -> Self {
        Diagnostic {
            kind,
            severity: Severity::Warning,
            offset,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Receiver for diagnostics. Probe parses pass a [`SilentSink`].
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Drops everything
#[derive(Debug, Default)]
pub struct SilentSink;

impl DiagnosticSink for SilentSink {
    fn report(&mut self, _diagnostic: Diagnostic) {}
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Parser error type
#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: DiagnosticKind,
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, offset: usize) -> Self {
        ParseError {
            kind,
            message: message.into(),
            offset,
        }
    }

    pub fn syntax(message: impl Into<String>, offset: usize) -> Self {
        Self::new(DiagnosticKind::Syntax, message, offset)
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        Diagnostic::error(self.kind, self.message, self.offset)
    }

    /// The input ended inside a block comment
    pub fn is_unterminated_comment(&self) -> bool {
        self.kind == DiagnosticKind::Lexical(LexErrorKind::UnterminatedComment)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error at offset {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError {
            kind: DiagnosticKind::Lexical(err.kind),
            message: err.message,
            offset: err.offset,
        }
    }
}

/// Lex, preprocess and parse a whole translation unit
pub fn parse_source(source: &str) -> Result<TranslationUnit, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    let preprocessed = preprocessor::preprocess(tokens)?;
    let mut parser = Parser::new(preprocessed.tokens);
    let mut unit = parser.parse_translation_unit()?;
    unit.macros = preprocessed.macros;
    Ok(unit)
}

/// Recursive descent parser for the C subset
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) position: usize,
    pub(crate) types: TypeTable,
    /// Innermost scope last. `Some` marks a typedef name, `None` an ordinary
    /// identifier shadowing an outer typedef.
    pub(crate) typedef_scopes: Vec<FxHashMap<String, Option<CType>>>,
}

impl Parser {
    /// Create a parser over an already preprocessed token stream. The stream
    /// must end with [`TokenKind::Eof`].
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !tokens.last().is_some_and(Token::is_eof) {
            let end = tokens.last().map_or(0, |t| t.span.end);
            tokens.push(Token::new(TokenKind::Eof, Span::new(end, end)));
        }
        Self {
            tokens,
            position: 0,
            types: TypeTable::new(),
            typedef_scopes: vec![FxHashMap::default()],
        }
    }

    /// Parse the entire translation unit (file-scope declarations)
    pub fn parse_translation_unit(&mut self) -> Result<TranslationUnit, ParseError> {
        let mut items = Vec::new();

        while !self.is_at_end() {
            items.push(self.parse_external_declaration()?);
        }

        Ok(TranslationUnit {
            items,
            types: std::mem::take(&mut self.types),
            macros: Vec::new(),
        })
    }

    /// Error unless every token has been consumed
    pub fn expect_end(&self) -> Result<(), ParseError> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(ParseError::syntax(
                format!("Unexpected {} after expression", self.peek_kind()),
                self.current_offset(),
            ))
        }
    }

    // ===== Typedef scopes =====

    pub(crate) fn push_scope(&mut self) {
        self.typedef_scopes.push(FxHashMap::default());
    }

    pub(crate) fn pop_scope(&mut self) {
        if self.typedef_scopes.len() > 1 {
            self.typedef_scopes.pop();
        }
    }

    pub(crate) fn declare_name(&mut self, name: &str, typedef: Option<CType>) {
        if let Some(scope) = self.typedef_scopes.last_mut() {
            scope.insert(name.to_string(), typedef);
        }
    }

    pub(crate) fn lookup_typedef(&self, name: &str) -> Option<&CType> {
        for scope in self.typedef_scopes.iter().rev() {
            if let Some(entry) = scope.get(name) {
                return entry.as_ref();
            }
        }
        None
    }

    // ===== Helper methods =====

    pub(crate) fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind)
    }

    pub(crate) fn check_ahead(&self, n: usize, kind: &TokenKind) -> bool {
        self.peek_ahead(n)
            .is_some_and(|t| std::mem::discriminant(&t.kind) == std::mem::discriminant(kind))
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.position += 1;
        }
        self.previous()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn peek_ahead(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.position + n)
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.position.saturating_sub(1)]
    }

    /// End offset of the last consumed token
    pub(crate) fn previous_end(&self) -> usize {
        if self.position == 0 {
            self.peek().span.start
        } else {
            self.previous().span.end
        }
    }

    pub(crate) fn current_offset(&self) -> usize {
        self.peek().span.start
    }

    pub(crate) fn expect_token(&mut self, kind: &TokenKind, message: &str) -> Result<Span, ParseError> {
        if self.check(kind) {
            Ok(self.advance().span)
        } else {
            Err(ParseError::syntax(
                format!("{}, found {}", message, self.peek_kind()),
                self.current_offset(),
            ))
        }
    }

    pub(crate) fn expect_lparen(&mut self, ctx: &str) -> Result<Span, ParseError> {
        self.expect_token(&TokenKind::LParen, &format!("Expected '(' {ctx}"))
    }

    pub(crate) fn expect_rparen(&mut self, ctx: &str) -> Result<Span, ParseError> {
        self.expect_token(&TokenKind::RParen, &format!("Expected ')' {ctx}"))
    }

    pub(crate) fn expect_rbrace(&mut self, ctx: &str) -> Result<Span, ParseError> {
        self.expect_token(&TokenKind::RBrace, &format!("Expected '}}' {ctx}"))
    }

    pub(crate) fn expect_semicolon(&mut self, ctx: &str) -> Result<Span, ParseError> {
        self.expect_token(&TokenKind::Semicolon, &format!("Expected ';' {ctx}"))
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<(String, Span), ParseError> {
        if let TokenKind::Ident(name) = self.peek_kind() {
            let name = name.clone();
            let span = self.advance().span;
            Ok((name, span))
        } else {
            Err(ParseError::syntax(
                format!("Expected identifier, found {}", self.peek_kind()),
                self.current_offset(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_function() {
        let unit = parse_source("int main() { return 0; }").unwrap();

        assert_eq!(unit.items.len(), 1);
        match &unit.items[0] {
            ExternalDecl::Function(f) => {
                assert_eq!(f.name, "main");
                assert!(f.params.is_empty());
                assert_eq!(f.ty.ret, CType::int());
                assert!(matches!(&f.body.kind, StmtKind::Compound(stmts) if stmts.len() == 1));
            }
            _ => panic!("Expected function definition"),
        }
    }

    #[test]
    fn test_parse_if_statement() {
        let unit = parse_source("int main() { int x = 2; if (x > 0) return 1; else return 0; }").unwrap();
        assert_eq!(unit.items.len(), 1);
    }

    #[test]
    fn test_parse_struct() {
        let unit = parse_source("struct Point { int x; int y; };").unwrap();

        assert_eq!(unit.items.len(), 1);
        let def = unit.types.get("struct Point").unwrap();
        assert_eq!(def.fields.len(), 2);
        assert_eq!(def.size, 8);
    }

    #[test]
    fn test_expression_at_file_scope_is_error() {
        let err = parse_source("42 + 1;").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::ExpressionAtFileScope);

        let err = parse_source("x = 1;").unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::ExpressionAtFileScope);
    }

    #[test]
    fn test_unterminated_comment_detected() {
        let err = parse_source("int x; /* still open").unwrap_err();
        assert!(err.is_unterminated_comment());
    }

    #[test]
    fn test_macros_are_reported() {
        let unit = parse_source("#define TWO 2\nint x = TWO;").unwrap();
        assert_eq!(unit.macros.len(), 1);
        assert_eq!(unit.macros[0].name, "TWO");
    }
}
