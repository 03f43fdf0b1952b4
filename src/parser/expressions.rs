//! Expression parsing implementation
//!
//! Operator precedence, lowest to highest:
//!
//! ```text
//! ,                      comma
//! = += -= ... >>=        assignment (right associative)
//! ?:                     conditional
//! || && | ^ &            logical / bitwise
//! == != < <= > >=        comparison
//! << >>                  shift
//! + -  * / %             arithmetic
//! (type) sizeof unary    prefix
//! [] () . -> ++ --       postfix
//! ```
//!
//! Binary levels use precedence climbing; everything else is plain recursive
//! descent. Literal nodes get their C type here, everything else is typed by
//! the checker.

use crate::parser::ast::*;
use crate::parser::lexer::TokenKind;
use crate::parser::parse::{ParseError, Parser};
use crate::sema::types::{CType, IntKind};

fn binary_operator(kind: &TokenKind) -> Option<(u8, BinOp)> {
    let entry = match kind {
        TokenKind::OrOr => (1, BinOp::Or),
        TokenKind::AndAnd => (2, BinOp::And),
        TokenKind::Pipe => (3, BinOp::BitOr),
        TokenKind::Caret => (4, BinOp::BitXor),
        TokenKind::Amp => (5, BinOp::BitAnd),
        TokenKind::EqEq => (6, BinOp::Eq),
        TokenKind::NotEq => (6, BinOp::Ne),
        TokenKind::Lt => (7, BinOp::Lt),
        TokenKind::Le => (7, BinOp::Le),
        TokenKind::Gt => (7, BinOp::Gt),
        TokenKind::Ge => (7, BinOp::Ge),
        TokenKind::LtLt => (8, BinOp::BitShl),
        TokenKind::GtGt => (8, BinOp::BitShr),
        TokenKind::Plus => (9, BinOp::Add),
        TokenKind::Minus => (9, BinOp::Sub),
        TokenKind::Star => (10, BinOp::Mul),
        TokenKind::Slash => (10, BinOp::Div),
        TokenKind::Percent => (10, BinOp::Mod),
        _ => return None,
    };
    Some(entry)
}

/// `None` for plain `=`, `Some(op)` for compound assignment
fn assignment_operator(kind: &TokenKind) -> Option<Option<BinOp>> {
    let op = match kind {
        TokenKind::Eq => None,
        TokenKind::PlusEq => Some(BinOp::Add),
        TokenKind::MinusEq => Some(BinOp::Sub),
        TokenKind::StarEq => Some(BinOp::Mul),
        TokenKind::SlashEq => Some(BinOp::Div),
        TokenKind::PercentEq => Some(BinOp::Mod),
        TokenKind::AmpEq => Some(BinOp::BitAnd),
        TokenKind::PipeEq => Some(BinOp::BitOr),
        TokenKind::CaretEq => Some(BinOp::BitXor),
        TokenKind::LtLtEq => Some(BinOp::BitShl),
        TokenKind::GtGtEq => Some(BinOp::BitShr),
        _ => return None,
    };
    Some(op)
}

impl Parser {
    /// Parse a full expression, including the comma operator
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_assignment_expression()?;
        while self.match_token(&TokenKind::Comma) {
            let rhs = self.parse_assignment_expression()?;
            let span = expr.span.to(rhs.span);
            expr = Expr::new(ExprKind::Comma(Box::new(expr), Box::new(rhs)), span);
        }
        Ok(expr)
    }

    pub(crate) fn parse_assignment_expression(&mut self) -> Result<Expr, ParseError> {
        let target = self.parse_conditional_expression()?;

        if let Some(op) = assignment_operator(self.peek_kind()) {
            self.advance();
            let value = self.parse_assignment_expression()?;
            let span = target.span.to(value.span);
            return Ok(Expr::new(
                ExprKind::Assign {
                    op,
                    target: Box::new(target),
                    value: Box::new(value),
                },
                span,
            ));
        }

        Ok(target)
    }

    pub(crate) fn parse_conditional_expression(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_binary_expression(1)?;
        if !self.match_token(&TokenKind::Question) {
            return Ok(cond);
        }

        let then_expr = self.parse_expression()?;
        self.expect_token(&TokenKind::Colon, "Expected ':' in conditional expression")?;
        let else_expr = self.parse_conditional_expression()?;
        let span = cond.span.to(else_expr.span);

        Ok(Expr::new(
            ExprKind::Ternary {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            span,
        ))
    }

    fn parse_binary_expression(&mut self, min_precedence: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_cast_expression()?;

        while let Some((precedence, op)) = binary_operator(self.peek_kind()) {
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let rhs = self.parse_binary_expression(precedence + 1)?;
            let span = lhs.span.to(rhs.span);
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }

        Ok(lhs)
    }

    /// Whether the token `n` ahead starts a type name
    fn is_type_name_at(&self, n: usize) -> bool {
        match self.peek_ahead(n).map(|t| &t.kind) {
            Some(
                TokenKind::Void
                | TokenKind::Char
                | TokenKind::Short
                | TokenKind::Int
                | TokenKind::Long
                | TokenKind::Float
                | TokenKind::Double
                | TokenKind::Signed
                | TokenKind::Unsigned
                | TokenKind::Struct
                | TokenKind::Union
                | TokenKind::Const
                | TokenKind::Volatile,
            ) => true,
            Some(TokenKind::Ident(name)) => self.lookup_typedef(name).is_some(),
            _ => false,
        }
    }

    fn parse_cast_expression(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::LParen) && self.is_type_name_at(1) {
            let start = self.advance().span.start;
            let target = self.parse_type_name()?;
            self.expect_rparen("after cast type")?;
            let operand = self.parse_cast_expression()?;
            let span = Span::new(start, operand.span.end);
            return Ok(Expr::new(
                ExprKind::Cast {
                    target,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_unary_expression()
    }

    fn parse_unary_expression(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_offset();

        let op = match self.peek_kind() {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Plus => Some(UnOp::Plus),
            TokenKind::Bang => Some(UnOp::Not),
            TokenKind::Tilde => Some(UnOp::BitNot),
            TokenKind::Amp => Some(UnOp::AddrOf),
            TokenKind::Star => Some(UnOp::Deref),
            TokenKind::PlusPlus => Some(UnOp::PreInc),
            TokenKind::MinusMinus => Some(UnOp::PreDec),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            let operand = self.parse_cast_expression()?;
            let span = Span::new(start, operand.span.end);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            ));
        }

        if self.match_token(&TokenKind::Sizeof) {
            if self.check(&TokenKind::LParen) && self.is_type_name_at(1) {
                self.advance();
                let ty = self.parse_type_name()?;
                let close = self.expect_rparen("after sizeof type")?;
                return Ok(Expr::new(ExprKind::SizeofType(ty), Span::new(start, close.end)));
            }
            let operand = self.parse_unary_expression()?;
            let span = Span::new(start, operand.span.end);
            return Ok(Expr::new(ExprKind::SizeofExpr(Box::new(operand)), span));
        }

        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary_expression()?;

        loop {
            match self.peek_kind() {
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    let close = self.expect_token(&TokenKind::RBracket, "Expected ']' after index")?;
                    let span = expr.span.to(close);
                    expr = Expr::new(
                        ExprKind::Index {
                            base: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_assignment_expression()?);
                            if !self.match_token(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    let close = self.expect_rparen("after call arguments")?;
                    let span = expr.span.to(close);
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                TokenKind::Dot | TokenKind::Arrow => {
                    let arrow = self.check(&TokenKind::Arrow);
                    self.advance();
                    let (field, field_span) = self.expect_identifier()?;
                    let span = expr.span.to(field_span);
                    expr = Expr::new(
                        ExprKind::Member {
                            base: Box::new(expr),
                            field,
                            arrow,
                        },
                        span,
                    );
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let op = if self.check(&TokenKind::PlusPlus) {
                        UnOp::PostInc
                    } else {
                        UnOp::PostDec
                    };
                    let end = self.advance().span;
                    let span = expr.span.to(end);
                    expr = Expr::new(
                        ExprKind::Unary {
                            op,
                            operand: Box::new(expr),
                        },
                        span,
                    );
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_primary_expression(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();

        match token.kind {
            TokenKind::IntLiteral(value, kind) => {
                self.advance();
                Ok(Expr::typed(ExprKind::IntLiteral(value), token.span, CType::Int(kind)))
            }
            TokenKind::FloatLiteral(value, single) => {
                self.advance();
                let ty = if single { CType::Float } else { CType::Double };
                Ok(Expr::typed(ExprKind::FloatLiteral(value), token.span, ty))
            }
            TokenKind::CharLiteral(c) => {
                self.advance();
                Ok(Expr::typed(ExprKind::CharLiteral(c), token.span, CType::int()))
            }
            TokenKind::StringLiteral(mut bytes) => {
                self.advance();
                let mut span = token.span;
                // Adjacent literals concatenate
                while let TokenKind::StringLiteral(more) = self.peek_kind() {
                    bytes.extend_from_slice(more);
                    span = span.to(self.advance().span);
                }
                let ty = CType::Array(Box::new(CType::Int(IntKind::Char)), Some(bytes.len() + 1));
                Ok(Expr::typed(ExprKind::StringLiteral(bytes), span, ty))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::new(ExprKind::Ident(name), token.span))
            }
            TokenKind::LParen => {
                self.advance();
                let mut inner = self.parse_expression()?;
                let close = self.expect_rparen("after parenthesized expression")?;
                inner.span = token.span.to(close);
                Ok(inner)
            }
            other => Err(ParseError::syntax(
                format!("Expected expression, found {}", other),
                token.span.start,
            )),
        }
    }
}
