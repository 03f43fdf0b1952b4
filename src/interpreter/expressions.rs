//! Expression evaluation
//!
//! Expressions arrive fully typed by the checker, so evaluation only needs
//! to apply the conversions those types imply. Objects are addressed through
//! [`Interpreter::eval_lvalue`]; everything else produces a [`Value`].
//!
//! Integer arithmetic wraps to the width of the operation's type. Division
//! and remainder by zero are runtime errors rather than undefined behavior.

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::value::{convert, Address, Value};
use crate::memory::{pointer_add, pointer_diff};
use crate::parser::ast::*;
use crate::sema::check::is_lvalue;
use crate::sema::types::{promote, usual_arithmetic, CType, IntKind};

impl Interpreter<'_> {
    /// Evaluate an expression to an rvalue. Arrays and functions decay to
    /// their address.
    pub(crate) fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::IntLiteral(n) => Ok(match &expr.ty {
                CType::Int(kind) => Value::Int(kind.wrap(*n as i64)),
                _ => Value::Int(*n as i64),
            }),

            ExprKind::FloatLiteral(f) => Ok(match expr.ty {
                CType::Float => Value::Float(*f as f32 as f64),
                _ => Value::Float(*f),
            }),

            ExprKind::CharLiteral(c) => Ok(Value::Int(*c as i8 as i64)),

            ExprKind::StringLiteral(bytes) => Ok(Value::Pointer(self.program.intern_string(bytes))),

            ExprKind::Ident(_) | ExprKind::Index { .. } | ExprKind::Unary { op: UnOp::Deref, .. } => {
                let address = self.eval_lvalue(expr)?;
                self.load_object(address, &expr.ty)
            }

            ExprKind::Member { base, field, arrow } => {
                if is_lvalue(expr) {
                    let address = self.eval_lvalue(expr)?;
                    return self.load_object(address, &expr.ty);
                }
                // Member of an rvalue struct, e.g. `make_point().x`
                let value = self.eval(base)?;
                let (offset, ty) = self.field_of(&base.ty, field, *arrow)?;
                let size = self.size_of(&ty);
                match value {
                    Value::Aggregate(bytes) => {
                        let end = (offset + size).min(bytes.len());
                        let start = offset.min(end);
                        Ok(Value::decode(&bytes[start..end], &ty))
                    }
                    _ => Err(RuntimeError::Unsupported {
                        message: format!("member access '{}' on a non-aggregate value", field),
                    }),
                }
            }

            ExprKind::Binary { op: BinOp::And, lhs, rhs } => {
                if !self.eval(lhs)?.is_truthy() {
                    return Ok(Value::Int(0));
                }
                Ok(Value::Int(self.eval(rhs)?.is_truthy() as i64))
            }

            ExprKind::Binary { op: BinOp::Or, lhs, rhs } => {
                if self.eval(lhs)?.is_truthy() {
                    return Ok(Value::Int(1));
                }
                Ok(Value::Int(self.eval(rhs)?.is_truthy() as i64))
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                let (value, _) = self.binary(*op, l, &lhs.ty.decay(), r, &rhs.ty.decay())?;
                Ok(value)
            }

            ExprKind::Unary { op, operand } => self.eval_unary(*op, operand),

            ExprKind::Assign { op, target, value } => self.eval_assign(*op, target, value),

            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                let branch = if self.eval(cond)?.is_truthy() { then_expr } else { else_expr };
                let value = self.eval(branch)?;
                if expr.ty.is_scalar() {
                    Ok(convert(value, &branch.ty.decay(), &expr.ty))
                } else {
                    Ok(value)
                }
            }

            ExprKind::Call { callee, args } => self.eval_call(callee, args),

            ExprKind::Cast { target, operand } => {
                let value = self.eval(operand)?;
                Ok(convert(value, &operand.ty.decay(), target))
            }

            ExprKind::SizeofType(ty) => Ok(Value::Int(self.size_of(ty) as i64)),
            ExprKind::SizeofExpr(operand) => Ok(Value::Int(self.size_of(&operand.ty) as i64)),

            ExprKind::Comma(lhs, rhs) => {
                self.eval(lhs)?;
                self.eval(rhs)
            }
        }
    }

    /// Address of the object (or function) an expression designates
    pub(crate) fn eval_lvalue(&mut self, expr: &Expr) -> Result<Address, RuntimeError> {
        match &expr.kind {
            ExprKind::Ident(name) => self.resolve(name, &expr.ty),

            ExprKind::StringLiteral(bytes) => Ok(self.program.intern_string(bytes)),

            ExprKind::Unary {
                op: UnOp::Deref,
                operand,
            } => {
                let value = self.eval(operand)?;
                Ok(value.as_pointer().unwrap_or(0))
            }

            ExprKind::Index { base, index } => {
                let b = self.eval(base)?;
                let i = self.eval(index)?;
                let (pointer, offset, pointer_ty) = if base.ty.decay().is_pointer() {
                    (b, i, base.ty.decay())
                } else {
                    (i, b, index.ty.decay())
                };
                let stride = self.stride_of(&pointer_ty);
                Ok(pointer_add(
                    pointer.as_pointer().unwrap_or(0),
                    offset.as_int().unwrap_or(0),
                    stride,
                ))
            }

            ExprKind::Member { base, field, arrow } => {
                let base_address = if *arrow {
                    self.eval(base)?.as_pointer().unwrap_or(0)
                } else {
                    self.eval_lvalue(base)?
                };
                let (offset, _) = self.field_of(&base.ty, field, *arrow)?;
                if *arrow && base_address == 0 {
                    return Err(RuntimeError::NullDereference);
                }
                Ok(base_address.wrapping_add(offset as u64))
            }

            _ => Err(RuntimeError::Unsupported {
                message: "expression does not designate an object".to_string(),
            }),
        }
    }

    fn resolve(&self, name: &str, ty: &CType) -> Result<Address, RuntimeError> {
        if let Some(local) = self.engine.stack.lookup(name) {
            return Ok(local.address);
        }
        if let Some(global) = self.program.globals.get(name) {
            return Ok(global.address);
        }
        if ty.is_function() {
            return self
                .program
                .function_address(name)
                .ok_or_else(|| RuntimeError::UndefinedFunction { name: name.to_string() });
        }
        Err(RuntimeError::UnresolvedSymbol { name: name.to_string() })
    }

    /// Rvalue of the object at `address`
    fn load_object(&self, address: Address, ty: &CType) -> Result<Value, RuntimeError> {
        match ty {
            CType::Array(..) | CType::Function(_) => Ok(Value::Pointer(address)),
            _ => self.load(address, ty),
        }
    }

    fn field_of(&self, base: &CType, field: &str, arrow: bool) -> Result<(usize, CType), RuntimeError> {
        let aggregate = if arrow { base.decay().pointee().cloned() } else { Some(base.clone()) };
        let found = match aggregate {
            Some(CType::Struct(key)) => self
                .program
                .types
                .get(&key)
                .and_then(|def| def.field(field))
                .map(|f| (f.offset, f.ty.clone())),
            _ => None,
        };
        found.ok_or_else(|| RuntimeError::Unsupported {
            message: format!("no member named '{}'", field),
        })
    }

    /// Apply a non-logical binary operator to operands of the given
    /// (decayed) types. Returns the result with its type.
    fn binary(&self, op: BinOp, l: Value, lt: &CType, r: Value, rt: &CType) -> Result<(Value, CType), RuntimeError> {
        if op.is_comparison() {
            return Ok((Value::Int(compare(op, &l, lt, &r, rt) as i64), CType::int()));
        }

        match (op, lt, rt) {
            (BinOp::Add, CType::Pointer(_), i) | (BinOp::Sub, CType::Pointer(_), i) if i.is_integer() => {
                let offset = r.as_int().unwrap_or(0);
                let offset = if op == BinOp::Sub { offset.wrapping_neg() } else { offset };
                let address = pointer_add(l.as_pointer().unwrap_or(0), offset, self.stride_of(lt));
                return Ok((Value::Pointer(address), lt.clone()));
            }
            (BinOp::Add, i, CType::Pointer(_)) if i.is_integer() => {
                let address = pointer_add(r.as_pointer().unwrap_or(0), l.as_int().unwrap_or(0), self.stride_of(rt));
                return Ok((Value::Pointer(address), rt.clone()));
            }
            (BinOp::Sub, CType::Pointer(_), CType::Pointer(_)) => {
                let diff = pointer_diff(
                    l.as_pointer().unwrap_or(0),
                    r.as_pointer().unwrap_or(0),
                    self.stride_of(lt),
                );
                return Ok((Value::Int(diff), CType::Int(IntKind::Long)));
            }
            _ => {}
        }

        if op.is_shift() {
            let ty = promote(lt);
            let value = convert(l, lt, &ty);
            let count = r.as_int().unwrap_or(0) as u32 & 63;
            let kind = ty.int_kind().unwrap_or(IntKind::Int);
            let n = value.as_int().unwrap_or(0);
            let shifted = match op {
                BinOp::BitShl => n.wrapping_shl(count),
                _ if kind.is_signed() => n >> count,
                _ => ((n as u64) >> count) as i64,
            };
            return Ok((Value::Int(kind.wrap(shifted)), ty));
        }

        let ty = usual_arithmetic(lt, rt);
        let a = convert(l, lt, &ty);
        let b = convert(r, rt, &ty);
        let value = match &ty {
            CType::Float | CType::Double => {
                let (x, y) = (a.as_float().unwrap_or(0.0), b.as_float().unwrap_or(0.0));
                let result = match op {
                    BinOp::Add => x + y,
                    BinOp::Sub => x - y,
                    BinOp::Mul => x * y,
                    BinOp::Div => x / y,
                    _ => {
                        return Err(RuntimeError::Unsupported {
                            message: "invalid floating-point operator".to_string(),
                        })
                    }
                };
                convert(Value::Float(result), &CType::Double, &ty)
            }
            _ => {
                let kind = ty.int_kind().unwrap_or(IntKind::Int);
                let (x, y) = (a.as_int().unwrap_or(0), b.as_int().unwrap_or(0));
                Value::Int(kind.wrap(integer_op(op, x, y, kind.is_signed())?))
            }
        };
        Ok((value, ty))
    }

    fn eval_unary(&mut self, op: UnOp, operand: &Expr) -> Result<Value, RuntimeError> {
        let ty = operand.ty.decay();
        match op {
            UnOp::Plus | UnOp::Neg | UnOp::BitNot => {
                let result_ty = promote(&ty);
                let value = convert(self.eval(operand)?, &ty, &result_ty);
                Ok(match (op, value) {
                    (UnOp::Plus, value) => value,
                    (UnOp::Neg, Value::Float(f)) => Value::Float(-f),
                    (UnOp::Neg, Value::Int(n)) => Value::Int(wrap_as(&result_ty, n.wrapping_neg())),
                    (UnOp::BitNot, Value::Int(n)) => Value::Int(wrap_as(&result_ty, !n)),
                    (_, value) => value,
                })
            }
            UnOp::Not => Ok(Value::Int(!self.eval(operand)?.is_truthy() as i64)),
            UnOp::AddrOf => Ok(Value::Pointer(self.eval_lvalue(operand)?)),
            UnOp::Deref => {
                let address = self.eval_lvalue(operand)?;
                self.load_object(address, &operand.ty)
            }
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                let address = self.eval_lvalue(operand)?;
                let old = self.load(address, &operand.ty)?;
                let delta: i64 = if matches!(op, UnOp::PreInc | UnOp::PostInc) { 1 } else { -1 };
                let new = match &operand.ty {
                    CType::Pointer(_) => Value::Pointer(pointer_add(
                        old.as_pointer().unwrap_or(0),
                        delta,
                        self.stride_of(&operand.ty),
                    )),
                    CType::Float | CType::Double => convert(
                        Value::Float(old.as_float().unwrap_or(0.0) + delta as f64),
                        &CType::Double,
                        &operand.ty,
                    ),
                    other => Value::Int(wrap_as(other, old.as_int().unwrap_or(0).wrapping_add(delta))),
                };
                self.store(address, &operand.ty, &new)?;
                Ok(if matches!(op, UnOp::PreInc | UnOp::PreDec) { new } else { old })
            }
        }
    }

    fn eval_assign(&mut self, op: Option<BinOp>, target: &Expr, value: &Expr) -> Result<Value, RuntimeError> {
        let address = self.eval_lvalue(target)?;
        let rhs = self.eval(value)?;
        let rhs_ty = value.ty.decay();

        let (result, from) = match op {
            None => (rhs, rhs_ty),
            Some(op) => {
                let current = self.load(address, &target.ty)?;
                self.binary(op, current, &target.ty, rhs, &rhs_ty)?
            }
        };
        let stored = convert(result, &from, &target.ty);
        self.store(address, &target.ty, &stored)?;
        Ok(stored)
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value, RuntimeError> {
        let target = self.eval(callee)?.as_pointer().unwrap_or(0);
        let callee_ty = callee.ty.decay();
        let params: Vec<CType> = callee_ty
            .pointee()
            .and_then(CType::function_type)
            .map(|f| f.params.clone())
            .unwrap_or_default();

        let mut values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let value = self.eval(arg)?;
            let from = arg.ty.decay();
            let to = match params.get(i) {
                Some(param) => param.clone(),
                // Default argument promotions for the variadic tail
                None => match from {
                    CType::Float => CType::Double,
                    ref other => promote(other),
                },
            };
            values.push(convert(value, &from, &to));
        }

        if target == 0 {
            return Err(RuntimeError::NullDereference);
        }
        self.call_address(target, values)
    }
}

fn wrap_as(ty: &CType, raw: i64) -> i64 {
    match ty.int_kind() {
        Some(kind) => kind.wrap(raw),
        None => raw,
    }
}

fn integer_op(op: BinOp, x: i64, y: i64, signed: bool) -> Result<i64, RuntimeError> {
    let result = match op {
        BinOp::Add => x.wrapping_add(y),
        BinOp::Sub => x.wrapping_sub(y),
        BinOp::Mul => x.wrapping_mul(y),
        BinOp::Div | BinOp::Mod if y == 0 => {
            let operation = if op == BinOp::Div { "division" } else { "remainder" };
            return Err(RuntimeError::DivisionByZero { operation });
        }
        BinOp::Div if signed => x.wrapping_div(y),
        BinOp::Div => ((x as u64) / (y as u64)) as i64,
        BinOp::Mod if signed => x.wrapping_rem(y),
        BinOp::Mod => ((x as u64) % (y as u64)) as i64,
        BinOp::BitAnd => x & y,
        BinOp::BitOr => x | y,
        BinOp::BitXor => x ^ y,
        _ => {
            return Err(RuntimeError::Unsupported {
                message: format!("operator {:?} on integers", op),
            })
        }
    };
    Ok(result)
}

fn compare(op: BinOp, l: &Value, lt: &CType, r: &Value, rt: &CType) -> bool {
    use std::cmp::Ordering;

    let ordering = if lt.is_pointer() || rt.is_pointer() {
        let a = l.as_pointer().unwrap_or(0);
        let b = r.as_pointer().unwrap_or(0);
        a.cmp(&b)
    } else {
        let ty = usual_arithmetic(lt, rt);
        let a = convert(l.clone(), lt, &ty);
        let b = convert(r.clone(), rt, &ty);
        match (&ty, a, b) {
            (_, Value::Float(x), Value::Float(y)) => match x.partial_cmp(&y) {
                Some(ordering) => ordering,
                // NaN compares unequal to everything
                None => return op == BinOp::Ne,
            },
            (CType::Int(kind), Value::Int(x), Value::Int(y)) if !kind.is_signed() => (x as u64).cmp(&(y as u64)),
            (_, a, b) => a.as_int().unwrap_or(0).cmp(&b.as_int().unwrap_or(0)),
        }
    };

    match op {
        BinOp::Eq => ordering == Ordering::Equal,
        BinOp::Ne => ordering != Ordering::Equal,
        BinOp::Lt => ordering == Ordering::Less,
        BinOp::Le => ordering != Ordering::Greater,
        BinOp::Gt => ordering == Ordering::Greater,
        BinOp::Ge => ordering != Ordering::Less,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use crate::interpreter::errors::RuntimeError;
    use crate::interpreter::image::{compile_unit, ProgramImage};
    use crate::memory::value::Value;

    fn eval(body: &str) -> Result<Value, RuntimeError> {
        let mut image = ProgramImage::new(1 << 20, 64);
        let source = format!("long entry(void) {{ {} }}", body);
        let unit = compile_unit(&source, 0, &mut Vec::new()).unwrap();
        image.link(unit).unwrap();
        image.invoke("entry")
    }

    #[test]
    fn test_integer_wrapping() {
        assert_eq!(eval("unsigned char c = 250; c += 10; return c;"), Ok(Value::Int(4)));
        assert_eq!(eval("int x = 2147483647; x++; return x;"), Ok(Value::Int(-2147483648)));
        assert_eq!(eval("unsigned u = 0; u--; return u;"), Ok(Value::Int(4294967295)));
    }

    #[test]
    fn test_signedness_in_comparison() {
        assert_eq!(eval("unsigned u = 1; int n = -1; return n < u;"), Ok(Value::Int(0)));
        assert_eq!(eval("return -7 / 2 * 10 + -7 % 2;"), Ok(Value::Int(-31)));
        assert_eq!(eval("return -16 >> 2;"), Ok(Value::Int(-4)));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            eval("int z = 0; return 5 % z;"),
            Err(RuntimeError::DivisionByZero { operation: "remainder" })
        );
    }

    #[test]
    fn test_pointer_arithmetic() {
        assert_eq!(
            eval("int a[5] = {1, 2, 3, 4, 5}; int *p = a + 1; int *q = &a[4]; return (q - p) * 100 + *(p + 2) + p[-1];"),
            Ok(Value::Int(304 + 1))
        );
    }

    #[test]
    fn test_logical_short_circuit() {
        assert_eq!(eval("int *p = 0; return p && *p;"), Ok(Value::Int(0)));
        assert_eq!(eval("int *p = 0; return *p;"), Err(RuntimeError::NullDereference));
    }

    #[test]
    fn test_float_to_int() {
        assert_eq!(eval("double d = 2.75; float f = 0.5f; return (long)(d * 4 + f);"), Ok(Value::Int(11)));
    }

    #[test]
    fn test_function_pointers_and_structs() {
        let mut image = ProgramImage::new(1 << 20, 64);
        let source = "struct P { int x; int y; };\n\
                      struct P make(int x) { struct P p; p.x = x; p.y = x * 2; return p; }\n\
                      int twice(int v) { return v * 2; }\n\
                      int entry(void) { int (*f)(int) = twice; struct P p = make(3); return f(p.y) + make(5).x; }";
        let unit = compile_unit(source, 0, &mut Vec::new()).unwrap();
        image.link(unit).unwrap();
        assert_eq!(image.invoke("entry"), Ok(Value::Int(17)));
    }
}
