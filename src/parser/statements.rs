//! Statement parsing implementation
//!
//! This module handles parsing of all C statement types:
//!
//! - Compound blocks: `{ stmt* }`
//! - Control flow: `if`, `while`, `do-while`, `for`, `switch`
//! - Jump statements: `return`, `break`, `continue`
//! - Declarations and expression statements
//!
//! Every statement's span runs from its first token through its last token,
//! including the terminating `;` where the grammar has one.

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};

impl Parser {
    /// Parse a statement
    pub(crate) fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_offset();

        match self.peek_kind() {
            TokenKind::LBrace => self.parse_compound_statement(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                let end = self.expect_semicolon("after return")?;
                Ok(Stmt {
                    kind: StmtKind::Return(value),
                    span: Span::new(start, end.end),
                })
            }
            TokenKind::Break => {
                self.advance();
                let end = self.expect_semicolon("after 'break'")?;
                Ok(Stmt {
                    kind: StmtKind::Break,
                    span: Span::new(start, end.end),
                })
            }
            TokenKind::Continue => {
                self.advance();
                let end = self.expect_semicolon("after 'continue'")?;
                Ok(Stmt {
                    kind: StmtKind::Continue,
                    span: Span::new(start, end.end),
                })
            }
            TokenKind::Semicolon => {
                let span = self.advance().span;
                Ok(Stmt {
                    kind: StmtKind::Empty,
                    span,
                })
            }
            TokenKind::Case | TokenKind::Default => Err(ParseError::syntax(
                format!("{} label not within a switch statement", self.peek_kind()),
                start,
            )),
            _ if self.is_declaration_start() => {
                let decl = self.parse_declaration()?;
                let span = decl.span;
                Ok(Stmt {
                    kind: StmtKind::Decl(decl),
                    span,
                })
            }
            _ => {
                let expr = self.parse_expression()?;
                let end = self.expect_semicolon("after expression")?;
                Ok(Stmt {
                    kind: StmtKind::Expr(expr),
                    span: Span::new(start, end.end),
                })
            }
        }
    }

    /// Parse `{ statements }` in a fresh typedef scope
    pub(crate) fn parse_compound_statement(&mut self) -> Result<Stmt, ParseError> {
        let open = self.expect_token(&TokenKind::LBrace, "Expected '{'")?;

        self.push_scope();
        let body = self.parse_block_items();
        self.pop_scope();
        let stmts = body?;

        let close = self.expect_rbrace("to close block")?;
        Ok(Stmt {
            kind: StmtKind::Compound(stmts),
            span: open.to(close),
        })
    }

    fn parse_block_items(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }

    fn parse_if_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span.start;
        self.expect_lparen("after 'if'")?;
        let cond = self.parse_expression()?;
        self.expect_rparen("after if condition")?;

        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        let end = else_branch
            .as_ref()
            .map_or(then_branch.span.end, |e| e.span.end);
        Ok(Stmt {
            kind: StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
            span: Span::new(start, end),
        })
    }

    fn parse_while_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span.start;
        self.expect_lparen("after 'while'")?;
        let cond = self.parse_expression()?;
        self.expect_rparen("after while condition")?;
        let body = Box::new(self.parse_statement()?);

        let span = Span::new(start, body.span.end);
        Ok(Stmt {
            kind: StmtKind::While { cond, body },
            span,
        })
    }

    fn parse_do_while_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span.start;
        let body = Box::new(self.parse_statement()?);
        self.expect_token(&TokenKind::While, "Expected 'while' after do body")?;
        self.expect_lparen("after 'while'")?;
        let cond = self.parse_expression()?;
        self.expect_rparen("after do-while condition")?;
        let end = self.expect_semicolon("after do-while")?;

        Ok(Stmt {
            kind: StmtKind::DoWhile { body, cond },
            span: Span::new(start, end.end),
        })
    }

    fn parse_for_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span.start;
        self.expect_lparen("after 'for'")?;

        self.push_scope();
        let result = self.parse_for_rest(start);
        self.pop_scope();
        result
    }

    fn parse_for_rest(&mut self, start: usize) -> Result<Stmt, ParseError> {
        let init = if self.check(&TokenKind::Semicolon) {
            self.advance();
            None
        } else if self.is_declaration_start() {
            let decl = self.parse_declaration()?;
            let span = decl.span;
            Some(Box::new(Stmt {
                kind: StmtKind::Decl(decl),
                span,
            }))
        } else {
            let init_start = self.current_offset();
            let expr = self.parse_expression()?;
            let end = self.expect_semicolon("after for initializer")?;
            Some(Box::new(Stmt {
                kind: StmtKind::Expr(expr),
                span: Span::new(init_start, end.end),
            }))
        };

        let cond = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_semicolon("after for condition")?;

        let step = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_rparen("after for clauses")?;

        let body = Box::new(self.parse_statement()?);
        let span = Span::new(start, body.span.end);
        Ok(Stmt {
            kind: StmtKind::For {
                init,
                cond,
                step,
                body,
            },
            span,
        })
    }

    /// `switch (expr) { case C: ... default: ... }`. Labels must sit directly
    /// in the switch body.
    fn parse_switch_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span.start;
        self.expect_lparen("after 'switch'")?;
        let cond = self.parse_expression()?;
        self.expect_rparen("after switch condition")?;
        self.expect_token(&TokenKind::LBrace, "Expected '{' to open switch body")?;

        self.push_scope();
        let cases = self.parse_switch_cases();
        self.pop_scope();
        let cases = cases?;

        let close = self.expect_rbrace("to close switch body")?;
        Ok(Stmt {
            kind: StmtKind::Switch { cond, cases },
            span: Span::new(start, close.end),
        })
    }

    fn parse_switch_cases(&mut self) -> Result<Vec<SwitchCase>, ParseError> {
        let mut cases: Vec<SwitchCase> = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let label_start = self.current_offset();
            let value = match self.peek_kind() {
                TokenKind::Case => {
                    self.advance();
                    let value = self.parse_conditional_expression()?;
                    Some(value)
                }
                TokenKind::Default => {
                    self.advance();
                    if cases.iter().any(|c| c.value.is_none()) {
                        return Err(ParseError::syntax(
                            "Multiple default labels in one switch",
                            label_start,
                        ));
                    }
                    None
                }
                _ => {
                    return Err(ParseError::syntax(
                        "Statement in switch body must follow a case label",
                        label_start,
                    ))
                }
            };
            let colon = self.expect_token(&TokenKind::Colon, "Expected ':' after case label")?;

            let mut body = Vec::new();
            while !matches!(
                self.peek_kind(),
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                body.push(self.parse_statement()?);
            }

            let end = body.last().map_or(colon.end, |s| s.span.end);
            cases.push(SwitchCase {
                value,
                body,
                span: Span::new(label_start, end),
            });
        }

        Ok(cases)
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::*;
    use crate::parser::parse::parse_source;

    fn body_of(source: &str) -> Vec<Stmt> {
        let unit = parse_source(source).unwrap();
        match unit.items.into_iter().last() {
            Some(ExternalDecl::Function(f)) => match f.body.kind {
                StmtKind::Compound(stmts) => stmts,
                _ => panic!("Expected compound body"),
            },
            _ => panic!("Expected function"),
        }
    }

    #[test]
    fn test_statement_spans_include_semicolon() {
        let source = "void f(void) { int x = 1; x = x + 2; if (x) { x--; } }";
        let stmts = body_of(source);
        assert_eq!(stmts.len(), 3);
        assert_eq!(stmts[0].span.text(source), "int x = 1;");
        assert_eq!(stmts[1].span.text(source), "x = x + 2;");
        assert_eq!(stmts[2].span.text(source), "if (x) { x--; }");
    }

    #[test]
    fn test_do_while_span() {
        let source = "void f(void) { int x = 0; do { x++; } while (x < 10); }";
        let stmts = body_of(source);
        assert_eq!(stmts[1].span.text(source), "do { x++; } while (x < 10);");
    }

    #[test]
    fn test_for_with_declaration() {
        let source = "void f(void) { for (int i = 0; i < 3; i++) ; }";
        let stmts = body_of(source);
        assert!(matches!(
            &stmts[0].kind,
            StmtKind::For { init: Some(init), cond: Some(_), step: Some(_), .. }
                if matches!(init.kind, StmtKind::Decl(_))
        ));
    }

    #[test]
    fn test_switch_cases() {
        let source = "int f(int x) { switch (x) { case 1: return 10; case 2: case 3: break; default: x = 0; } return x; }";
        let stmts = body_of(source);
        match &stmts[0].kind {
            StmtKind::Switch { cases, .. } => {
                assert_eq!(cases.len(), 4);
                assert!(cases[2].value.is_some());
                assert!(cases[1].body.is_empty());
                assert!(cases[3].value.is_none());
            }
            _ => panic!("Expected switch"),
        }
    }

    #[test]
    fn test_case_outside_switch_is_error() {
        assert!(parse_source("void f(void) { case 1: ; }").is_err());
    }
}
