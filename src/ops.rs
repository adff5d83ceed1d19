//! Arithmetic, comparison and conversion of values.
//!
//! Both the constant folder and the interpreter evaluate operators through
//! these functions, so a folded expression always has the value it would have
//! at runtime.

use std::{cmp::Ordering, rc::Rc};

use crate::{
    compiler::{
        ast::{BinOp, UnOp},
        typing::ScalarType,
    },
    errors::RuntimeErrorKind,
    utils::Float,
    value::Value,
};

fn invalid_operand(operator: &'static str, value: &Value) -> RuntimeErrorKind {
    RuntimeErrorKind::InvalidOperand {
        operator,
        ty: value.type_name(),
    }
}

const fn bin_op_name(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Rem => "%",
        BinOp::Pow => "**",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::And => "&&",
        BinOp::Or => "||",
    }
}

/// Implements `op value`.
pub fn unary(op: UnOp, value: &Value) -> Result<Value, RuntimeErrorKind> {
    match (op, value) {
        (UnOp::Neg, Value::Int(v)) => Ok(Value::Int(v.wrapping_neg())),
        (UnOp::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
        (UnOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
        (UnOp::Neg, _) => Err(invalid_operand("-", value)),
        (UnOp::Not, _) => Err(invalid_operand("!", value)),
    }
}

/// Implements `lhs op rhs`. `&&` and `||` evaluate both operands, the
/// short circuit is the caller's job.
pub fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeErrorKind> {
    use Value::{Bool, Float as F, Int, Str};
    let value = match (op, lhs, rhs) {
        (BinOp::Add, Int(l), Int(r)) => Int(l.wrapping_add(*r)),
        (BinOp::Add, F(l), F(r)) => F(l + r),
        (BinOp::Add, Str(l), Str(r)) => {
            let mut s = l.clone();
            s.push_str(r);
            Str(s)
        }

        (BinOp::Sub, Int(l), Int(r)) => Int(l.wrapping_sub(*r)),
        (BinOp::Sub, F(l), F(r)) => F(l - r),

        (BinOp::Mul, Int(l), Int(r)) => Int(l.wrapping_mul(*r)),
        (BinOp::Mul, F(l), F(r)) => F(l * r),

        (BinOp::Div | BinOp::Rem, Int(_), Int(0)) => return Err(RuntimeErrorKind::DivisionByZero),
        (BinOp::Div | BinOp::Rem, F(_), F(r)) if *r == 0.0 => {
            return Err(RuntimeErrorKind::DivisionByZero)
        }
        (BinOp::Div, Int(l), Int(r)) => Int(l.wrapping_div(*r)),
        (BinOp::Div, F(l), F(r)) => F(l / r),
        (BinOp::Rem, Int(l), Int(r)) => Int(l.wrapping_rem(*r)),
        (BinOp::Rem, F(l), F(r)) => F(l % r),

        (BinOp::Pow, Int(_), Int(r)) if *r < 0 => {
            return Err(RuntimeErrorKind::NegativeExponent(*r))
        }
        (BinOp::Pow, Int(l), Int(r)) => Int(wrapping_pow(*l, r.unsigned_abs())),
        (BinOp::Pow, F(l), F(r)) => F(l.powf(*r)),

        (BinOp::Eq, _, _) => Bool(lhs == rhs),
        (BinOp::Ne, _, _) => Bool(lhs != rhs),

        (BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge, _, _) => {
            let ordering = match (lhs, rhs) {
                (Int(l), Int(r)) => Some(l.cmp(r)),
                (F(l), F(r)) => l.partial_cmp(r),
                (Str(l), Str(r)) => Some(l.cmp(r)),
                _ => return Err(invalid_operand(bin_op_name(op), lhs)),
            };
            Bool(match (op, ordering) {
                (_, None) => false,
                (BinOp::Lt, Some(o)) => o == Ordering::Less,
                (BinOp::Le, Some(o)) => o != Ordering::Greater,
                (BinOp::Gt, Some(o)) => o == Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            })
        }

        (BinOp::And, Bool(l), Bool(r)) => Bool(*l && *r),
        (BinOp::Or, Bool(l), Bool(r)) => Bool(*l || *r),

        _ => return Err(invalid_operand(bin_op_name(op), lhs)),
    };
    Ok(value)
}

/// Integer power by squaring, wrapping on overflow.
fn wrapping_pow(mut base: i64, mut exp: u64) -> i64 {
    let mut acc: i64 = 1;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    acc
}

/// Implements `value as target`.
pub fn cast(value: &Value, target: ScalarType) -> Result<Value, RuntimeErrorKind> {
    let invalid = || RuntimeErrorKind::InvalidCast {
        value: value.repr(),
        target: target.name(),
    };
    Ok(match (value, target) {
        (Value::Int(v), ScalarType::Int) => Value::Int(*v),
        (Value::Int(v), ScalarType::Float) => Value::Float(*v as f64),
        (Value::Int(v), ScalarType::Bool) => Value::Bool(*v != 0),
        (Value::Int(v), ScalarType::Str) => Value::Str(v.to_string().into()),

        (Value::Float(v), ScalarType::Int) => {
            // The range check is exclusive at the top: 2^63 is not an i64.
            if v.is_finite() && *v >= -9_223_372_036_854_775_808.0 && *v < 9_223_372_036_854_775_808.0 {
                Value::Int(v.trunc() as i64)
            } else {
                return Err(invalid());
            }
        }
        (Value::Float(v), ScalarType::Float) => Value::Float(*v),
        (Value::Float(v), ScalarType::Bool) => Value::Bool(*v != 0.0),
        (Value::Float(v), ScalarType::Str) => Value::Str(Float(*v).to_string().into()),

        (Value::Bool(v), ScalarType::Int) => Value::Int(i64::from(*v)),
        (Value::Bool(v), ScalarType::Float) => Value::Float(f64::from(u8::from(*v))),
        (Value::Bool(v), ScalarType::Bool) => Value::Bool(*v),
        (Value::Bool(v), ScalarType::Str) => Value::Str(v.to_string().into()),

        (Value::Str(v), ScalarType::Int) => Value::Int(v.trim().parse().map_err(|_| invalid())?),
        (Value::Str(v), ScalarType::Float) => {
            Value::Float(v.trim().parse().map_err(|_| invalid())?)
        }
        (Value::Str(v), ScalarType::Bool) => match v.trim() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(invalid()),
        },
        (Value::Str(v), ScalarType::Str) => Value::Str(v.clone()),

        _ => return Err(invalid()),
    })
}

fn checked_index(index: &Value, len: usize) -> Result<usize, RuntimeErrorKind> {
    match index {
        Value::Int(i) => usize::try_from(*i)
            .ok()
            .filter(|i| *i < len)
            .ok_or(RuntimeErrorKind::IndexOutOfRange { index: *i, len }),
        _ => Err(invalid_operand("[]", index)),
    }
}

/// Implements `target[index]`. Strings are indexed by character.
pub fn get_item(target: &Value, index: &Value) -> Result<Value, RuntimeErrorKind> {
    match target {
        Value::List(items) => Ok(items[checked_index(index, items.len())?].clone()),
        Value::Str(s) => {
            let len = s.chars().count();
            let i = checked_index(index, len)?;
            Ok(Value::Str(s.chars().skip(i).take(1).collect()))
        }
        _ => Err(invalid_operand("[]", target)),
    }
}

/// Implements `target[index] = value`, returning the updated list.
pub fn set_item(target: Value, index: &Value, value: Value) -> Result<Value, RuntimeErrorKind> {
    match target {
        Value::List(mut items) => {
            let i = checked_index(index, items.len())?;
            Rc::make_mut(&mut items)[i] = value;
            Ok(Value::List(items))
        }
        _ => Err(invalid_operand("[]=", &target)),
    }
}

/// The length of a list or string in items or characters.
pub fn len(value: &Value) -> Result<usize, RuntimeErrorKind> {
    match value {
        Value::List(items) => Ok(items.len()),
        Value::Str(s) => Ok(s.chars().count()),
        _ => Err(invalid_operand("len", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_wraps() {
        assert_eq!(
            binary(BinOp::Add, &Value::Int(i64::MAX), &Value::Int(1)),
            Ok(Value::Int(i64::MIN))
        );
        assert_eq!(
            binary(BinOp::Div, &Value::Int(i64::MIN), &Value::Int(-1)),
            Ok(Value::Int(i64::MIN))
        );
        assert_eq!(
            binary(BinOp::Pow, &Value::Int(2), &Value::Int(10)),
            Ok(Value::Int(1024))
        );
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(
            binary(BinOp::Div, &Value::Int(1), &Value::Int(0)),
            Err(RuntimeErrorKind::DivisionByZero)
        );
        assert_eq!(
            binary(BinOp::Rem, &Value::Float(1.0), &Value::Float(0.0)),
            Err(RuntimeErrorKind::DivisionByZero)
        );
        assert_eq!(
            binary(BinOp::Pow, &Value::Int(2), &Value::Int(-1)),
            Err(RuntimeErrorKind::NegativeExponent(-1))
        );
    }

    #[test]
    fn comparisons() {
        assert_eq!(
            binary(BinOp::Lt, &Value::Str("a".into()), &Value::Str("b".into())),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            binary(BinOp::Ge, &Value::Float(f64::NAN), &Value::Float(1.0)),
            Ok(Value::Bool(false))
        );
        assert_eq!(
            binary(
                BinOp::Eq,
                &Value::list(vec![Value::Int(1)]),
                &Value::list(vec![Value::Int(1)])
            ),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn casts() {
        assert_eq!(cast(&Value::Float(2.9), ScalarType::Int), Ok(Value::Int(2)));
        assert_eq!(cast(&Value::Int(2), ScalarType::Str), Ok(Value::Str("2".into())));
        assert_eq!(cast(&Value::Float(2.0), ScalarType::Str), Ok(Value::Str("2.0".into())));
        assert_eq!(cast(&Value::Str(" 42 ".into()), ScalarType::Int), Ok(Value::Int(42)));
        assert!(matches!(
            cast(&Value::Str("x".into()), ScalarType::Int),
            Err(RuntimeErrorKind::InvalidCast { .. })
        ));
        assert!(matches!(
            cast(&Value::Float(f64::INFINITY), ScalarType::Int),
            Err(RuntimeErrorKind::InvalidCast { .. })
        ));
    }

    #[test]
    fn items() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let copy = list.clone();
        let updated = set_item(list, &Value::Int(1), Value::Int(5)).unwrap();
        assert_eq!(updated, Value::list(vec![Value::Int(1), Value::Int(5)]));
        assert_eq!(copy, Value::list(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(
            get_item(&copy, &Value::Int(2)),
            Err(RuntimeErrorKind::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            get_item(&Value::Str("héllo".into()), &Value::Int(1)),
            Ok(Value::Str("é".into()))
        );
    }
}
