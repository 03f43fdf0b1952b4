//! Integer constant expression folding
//!
//! Used for array sizes, `case` labels and `#if` conditions. Values are
//! computed in 64-bit signed arithmetic; casts to narrower integer types wrap.

use super::types::{CType, TypeTable};
use crate::parser::ast::{BinOp, Expr, ExprKind, UnOp};

/// Fold with no struct definitions in scope
pub fn eval_int(expr: &Expr) -> Option<i64> {
    eval_int_with(expr, &TypeTable::new())
}

/// Fold an integer constant expression, or `None` if it is not one
pub fn eval_int_with(expr: &Expr, types: &TypeTable) -> Option<i64> {
    match &expr.kind {
        ExprKind::IntLiteral(value) => Some(match expr.ty {
            CType::Int(kind) => kind.wrap(*value as i64),
            _ => *value as i64,
        }),
        ExprKind::CharLiteral(c) => Some(*c as i8 as i64),
        ExprKind::Unary { op, operand } => {
            let v = eval_int_with(operand, types)?;
            match op {
                UnOp::Neg => Some(v.wrapping_neg()),
                UnOp::Plus => Some(v),
                UnOp::Not => Some((v == 0) as i64),
                UnOp::BitNot => Some(!v),
                _ => None,
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let l = eval_int_with(lhs, types)?;
            // Short-circuit operators only need the right side when it matters
            match op {
                BinOp::And if l == 0 => return Some(0),
                BinOp::Or if l != 0 => return Some(1),
                _ => {}
            }
            let r = eval_int_with(rhs, types)?;
            fold_binary(*op, l, r)
        }
        ExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } => {
            if eval_int_with(cond, types)? != 0 {
                eval_int_with(then_expr, types)
            } else {
                eval_int_with(else_expr, types)
            }
        }
        ExprKind::Cast { target, operand } => {
            let v = eval_int_with(operand, types)?;
            match target {
                CType::Int(kind) => Some(kind.wrap(v)),
                _ => None,
            }
        }
        ExprKind::SizeofType(ty) => types.size_of(ty).map(|s| s as i64),
        ExprKind::SizeofExpr(operand) if !operand.ty.is_void() => types.size_of(&operand.ty).map(|s| s as i64),
        _ => None,
    }
}

fn fold_binary(op: BinOp, l: i64, r: i64) -> Option<i64> {
    let value = match op {
        BinOp::Add => l.wrapping_add(r),
        BinOp::Sub => l.wrapping_sub(r),
        BinOp::Mul => l.wrapping_mul(r),
        BinOp::Div => {
            if r == 0 {
                return None;
            }
            l.wrapping_div(r)
        }
        BinOp::Mod => {
            if r == 0 {
                return None;
            }
            l.wrapping_rem(r)
        }
        BinOp::Eq => (l == r) as i64,
        BinOp::Ne => (l != r) as i64,
        BinOp::Lt => (l < r) as i64,
        BinOp::Le => (l <= r) as i64,
        BinOp::Gt => (l > r) as i64,
        BinOp::Ge => (l >= r) as i64,
        BinOp::And => (l != 0 && r != 0) as i64,
        BinOp::Or => (l != 0 || r != 0) as i64,
        BinOp::BitAnd => l & r,
        BinOp::BitOr => l | r,
        BinOp::BitXor => l ^ r,
        BinOp::BitShl => l.wrapping_shl(r as u32),
        BinOp::BitShr => l.wrapping_shr(r as u32),
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::tokenize;
    use crate::parser::Parser;

    fn fold(source: &str) -> Option<i64> {
        let mut parser = Parser::new(tokenize(source).unwrap());
        eval_int(&parser.parse_expression().unwrap())
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(fold("2 + 3 * 4"), Some(14));
        assert_eq!(fold("(1 << 4) | 1"), Some(17));
        assert_eq!(fold("-7 / 2"), Some(-3));
        assert_eq!(fold("'A' + 1"), Some(66));
    }

    #[test]
    fn test_logic_and_ternary() {
        assert_eq!(fold("0 && (1 / 0)"), Some(0));
        assert_eq!(fold("3 > 2 ? 10 : 20"), Some(10));
    }

    #[test]
    fn test_not_constant() {
        assert_eq!(fold("x + 1"), None);
        assert_eq!(fold("1 / 0"), None);
    }

    #[test]
    fn test_casts_and_sizeof() {
        assert_eq!(fold("(char)300"), Some(44));
        assert_eq!(fold("sizeof(long) * 2"), Some(16));
    }
}
