use std::{io, rc::Rc};

use crate::{errors::RuntimeErrorKind, ops, value::Value};

use super::Builtin;

/// Calls a builtin. `inputs` are the run inputs read by `arg`, `output`
/// receives what `print` writes.
pub(crate) fn call_builtin<W: io::Write>(
    builtin: Builtin,
    args: Vec<Value>,
    inputs: &[String],
    output: &mut W,
) -> Result<Value, RuntimeErrorKind> {
    if args.len() != builtin.arity() {
        return Err(RuntimeErrorKind::ArityMismatch {
            expected: builtin.arity(),
            found: args.len(),
        });
    }
    let mut args = args.into_iter();
    let mut arg = || args.next().unwrap_or_default();
    match builtin {
        Builtin::Print => {
            writeln!(output, "{}", arg()).map_err(|e| RuntimeErrorKind::Output(e.to_string()))?;
            Ok(Value::Unit)
        }
        Builtin::Len => Ok(Value::Int(ops::len(&arg())? as i64)),
        Builtin::Arg => match arg() {
            Value::Int(index) => usize::try_from(index)
                .ok()
                .and_then(|i| inputs.get(i))
                .map(|input| Value::Str(input.as_str().into()))
                .ok_or(RuntimeErrorKind::IndexOutOfRange {
                    index,
                    len: inputs.len(),
                }),
            value => Err(RuntimeErrorKind::InvalidOperand {
                operator: "arg",
                ty: value.type_name(),
            }),
        },
        Builtin::ArgCount => Ok(Value::Int(inputs.len() as i64)),
        Builtin::Push => match (arg(), arg()) {
            (Value::List(mut items), item) => {
                Rc::make_mut(&mut items).push(item);
                Ok(Value::List(items))
            }
            (value, _) => Err(RuntimeErrorKind::InvalidOperand {
                operator: "push",
                ty: value.type_name(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(builtin: Builtin, args: Vec<Value>) -> (Result<Value, RuntimeErrorKind>, String) {
        let mut output = Vec::new();
        let inputs = ["7".to_owned(), "x".to_owned()];
        let result = call_builtin(builtin, args, &inputs, &mut output);
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn print_writes_a_line() {
        let list = Value::list(vec![Value::Int(1), Value::Str("a".into())]);
        assert_eq!(call(Builtin::Print, vec![list]), (Ok(Value::Unit), "[1, \"a\"]\n".to_owned()));
        assert_eq!(
            call(Builtin::Print, vec![Value::Str("a".into())]),
            (Ok(Value::Unit), "a\n".to_owned())
        );
    }

    #[test]
    fn inputs() {
        assert_eq!(call(Builtin::ArgCount, vec![]).0, Ok(Value::Int(2)));
        assert_eq!(call(Builtin::Arg, vec![Value::Int(1)]).0, Ok(Value::Str("x".into())));
        assert_eq!(
            call(Builtin::Arg, vec![Value::Int(2)]).0,
            Err(RuntimeErrorKind::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn push_copies_shared_lists() {
        let list = Value::list(vec![Value::Int(1)]);
        assert_eq!(
            call(Builtin::Push, vec![list.clone(), Value::Int(2)]).0,
            Ok(Value::list(vec![Value::Int(1), Value::Int(2)]))
        );
        assert_eq!(list, Value::list(vec![Value::Int(1)]));
    }

    #[test]
    fn arity_is_checked() {
        assert_eq!(
            call(Builtin::Len, vec![]).0,
            Err(RuntimeErrorKind::ArityMismatch {
                expected: 1,
                found: 0
            })
        );
    }
}
