//! Native handlers for built-in method kinds.
//!
//! The emitter encodes the selected kind as an instruction operand; these
//! handlers execute it. `dispatch_by_name` backs the `CallMethod` path
//! for receivers whose static type was `Dynamic`; it routes through the
//! same fixed tables, so behavior cannot diverge between the two paths.

use std::sync::Arc;

use ardc_types::{
    BoolMethodKind, FloatMethodKind, IntMethodKind, ListMethodKind, MapMethodKind, MaybeMethodKind,
    ResultMethodKind, StrMethodKind,
};

use crate::error::RuntimeError;
use crate::value::{ListRef, MapKey, MapRef, Value, UNKNOWN_TYPE};

pub fn str_method(
    kind: StrMethodKind,
    receiver: &Arc<str>,
    args: &[Value],
    ret_tid: u32,
) -> Result<Value, RuntimeError> {
    match kind {
        StrMethodKind::Size => Ok(Value::Int(receiver.len() as i64)),
        StrMethodKind::IsEmpty => Ok(Value::Bool(receiver.is_empty())),
        StrMethodKind::Contains => Ok(Value::Bool(receiver.contains(expect_str(&args[0])?))),
        StrMethodKind::StartsWith => {
            Ok(Value::Bool(receiver.starts_with(expect_str(&args[0])?)))
        }
        StrMethodKind::EndsWith => Ok(Value::Bool(receiver.ends_with(expect_str(&args[0])?))),
        StrMethodKind::Trim => Ok(Value::str(receiver.trim())),
        StrMethodKind::ToUpper => Ok(Value::str(receiver.to_uppercase())),
        StrMethodKind::ToLower => Ok(Value::str(receiver.to_lowercase())),
        StrMethodKind::Split => {
            let separator = expect_str(&args[0])?;
            let parts: Vec<Value> = if separator.is_empty() {
                receiver.chars().map(|c| Value::str(c.to_string())).collect()
            } else {
                receiver.split(separator).map(Value::str).collect()
            };
            Ok(Value::list(ret_tid, parts))
        }
        StrMethodKind::Replace => {
            let from = expect_str(&args[0])?;
            let to = expect_str(&args[1])?;
            Ok(Value::str(receiver.replace(from, to)))
        }
        StrMethodKind::ToInt => Ok(match receiver.trim().parse::<i64>() {
            Ok(value) => Value::some(ret_tid, Value::Int(value)),
            Err(_) => Value::none(ret_tid),
        }),
        StrMethodKind::Chars => {
            let parts = receiver.chars().map(|c| Value::str(c.to_string())).collect();
            Ok(Value::list(ret_tid, parts))
        }
    }
}

pub fn int_method(kind: IntMethodKind, receiver: i64) -> Value {
    match kind {
        IntMethodKind::ToStr => Value::str(receiver.to_string()),
        IntMethodKind::ToFloat => Value::Float(receiver as f64),
        // wrapping keeps i64::MIN total, consistent with wrapping arithmetic
        IntMethodKind::Abs => Value::Int(receiver.wrapping_abs()),
    }
}

pub fn float_method(kind: FloatMethodKind, receiver: f64) -> Value {
    match kind {
        FloatMethodKind::ToStr => Value::str(receiver.to_string()),
        FloatMethodKind::ToInt => Value::Int(receiver as i64),
        FloatMethodKind::Floor => Value::Float(receiver.floor()),
        FloatMethodKind::Ceil => Value::Float(receiver.ceil()),
        FloatMethodKind::Round => Value::Float(receiver.round()),
        FloatMethodKind::Abs => Value::Float(receiver.abs()),
    }
}

pub fn bool_method(kind: BoolMethodKind, receiver: bool) -> Value {
    match kind {
        BoolMethodKind::ToStr => Value::str(receiver.to_string()),
    }
}

pub fn list_method(
    kind: ListMethodKind,
    receiver: &ListRef,
    args: &[Value],
    ret_tid: u32,
) -> Result<Value, RuntimeError> {
    match kind {
        ListMethodKind::Size => Ok(Value::Int(receiver.items.read().len() as i64)),
        ListMethodKind::IsEmpty => Ok(Value::Bool(receiver.items.read().is_empty())),
        ListMethodKind::Push => {
            receiver.items.write().push(args[0].clone());
            Ok(Value::Void)
        }
        ListMethodKind::Prepend => {
            receiver.items.write().insert(0, args[0].clone());
            Ok(Value::Void)
        }
        ListMethodKind::Pop => Ok(match receiver.items.write().pop() {
            Some(value) => Value::some(ret_tid, value),
            None => Value::none(ret_tid),
        }),
        ListMethodKind::Get => {
            let index = expect_int(&args[0])?;
            let items = receiver.items.read();
            Ok(match usize::try_from(index).ok().and_then(|i| items.get(i)) {
                Some(value) => Value::some(ret_tid, value.clone()),
                None => Value::none(ret_tid),
            })
        }
        ListMethodKind::Set => {
            let index = expect_int(&args[0])?;
            let mut items = receiver.items.write();
            let slot = usize::try_from(index)
                .ok()
                .and_then(|i| items.get_mut(i))
                .ok_or(RuntimeError::IndexOutOfRange(index))?;
            *slot = args[1].clone();
            Ok(Value::Void)
        }
        ListMethodKind::First => Ok(match receiver.items.read().first() {
            Some(value) => Value::some(ret_tid, value.clone()),
            None => Value::none(ret_tid),
        }),
        ListMethodKind::Last => Ok(match receiver.items.read().last() {
            Some(value) => Value::some(ret_tid, value.clone()),
            None => Value::none(ret_tid),
        }),
        ListMethodKind::Contains => {
            Ok(Value::Bool(receiver.items.read().contains(&args[0])))
        }
        ListMethodKind::Clear => {
            receiver.items.write().clear();
            Ok(Value::Void)
        }
    }
}

pub fn map_method(
    kind: MapMethodKind,
    receiver: &MapRef,
    args: &[Value],
    ret_tid: u32,
) -> Result<Value, RuntimeError> {
    match kind {
        MapMethodKind::Size => Ok(Value::Int(receiver.entries.read().len() as i64)),
        MapMethodKind::Has => {
            let key = value_to_key(&args[0])?;
            Ok(Value::Bool(receiver.entries.read().contains_key(&key)))
        }
        MapMethodKind::Get => {
            let key = value_to_key(&args[0])?;
            Ok(match receiver.entries.read().get(&key) {
                Some(value) => Value::some(ret_tid, value.clone()),
                None => Value::none(ret_tid),
            })
        }
        MapMethodKind::Set => {
            let key = value_to_key(&args[0])?;
            // IndexMap keeps a replaced key at its original position
            receiver.entries.write().insert(key, args[1].clone());
            Ok(Value::Void)
        }
        MapMethodKind::Drop => {
            let key = value_to_key(&args[0])?;
            receiver.entries.write().shift_remove(&key);
            Ok(Value::Void)
        }
        MapMethodKind::Keys => {
            let keys = receiver
                .entries
                .read()
                .keys()
                .map(|k| k.to_value())
                .collect();
            Ok(Value::list(ret_tid, keys))
        }
        MapMethodKind::Values => {
            let values = receiver.entries.read().values().cloned().collect();
            Ok(Value::list(ret_tid, values))
        }
        MapMethodKind::Clear => {
            receiver.entries.write().clear();
            Ok(Value::Void)
        }
    }
}

pub fn maybe_method(
    kind: MaybeMethodKind,
    receiver: Value,
    args: &[Value],
    ret_tid: u32,
) -> Result<Value, RuntimeError> {
    if kind == MaybeMethodKind::Some {
        // constructor: wrap the subject itself
        return Ok(Value::some(ret_tid, receiver));
    }
    let Value::Maybe { value, .. } = receiver else {
        return Err(RuntimeError::bad_operand("maybe method", receiver.kind_name()));
    };
    match kind {
        MaybeMethodKind::Expect => match value {
            Some(inner) => Ok(*inner),
            None => Err(RuntimeError::ExpectFailed(
                expect_str(&args[0])?.to_string(),
            )),
        },
        MaybeMethodKind::Or => Ok(match value {
            Some(inner) => *inner,
            None => args[0].clone(),
        }),
        MaybeMethodKind::IsSome => Ok(Value::Bool(value.is_some())),
        MaybeMethodKind::IsNone => Ok(Value::Bool(value.is_none())),
        MaybeMethodKind::Some => unreachable!("constructor handled above"),
    }
}

pub fn result_method(
    kind: ResultMethodKind,
    receiver: Value,
    args: &[Value],
    ret_tid: u32,
) -> Result<Value, RuntimeError> {
    match kind {
        ResultMethodKind::MakeOk => return Ok(Value::ok(ret_tid, receiver)),
        ResultMethodKind::MakeErr => return Ok(Value::err(ret_tid, receiver)),
        _ => {}
    }
    let Value::Result { is_ok, value, .. } = receiver else {
        return Err(RuntimeError::bad_operand("result method", receiver.kind_name()));
    };
    match kind {
        ResultMethodKind::Expect => {
            if is_ok {
                Ok(*value)
            } else {
                Err(RuntimeError::ExpectFailed(format!(
                    "{}: {}",
                    expect_str(&args[0])?,
                    value.display()
                )))
            }
        }
        ResultMethodKind::Or => Ok(if is_ok { *value } else { args[0].clone() }),
        ResultMethodKind::IsOk => Ok(Value::Bool(is_ok)),
        ResultMethodKind::IsErr => Ok(Value::Bool(!is_ok)),
        ResultMethodKind::Err => Ok(if is_ok {
            Value::none(ret_tid)
        } else {
            Value::some(ret_tid, *value)
        }),
        ResultMethodKind::UnwrapErr => {
            if is_ok {
                Err(RuntimeError::BadCast("unwrapped err on an ok result".into()))
            } else {
                Ok(*value)
            }
        }
        ResultMethodKind::MakeOk | ResultMethodKind::MakeErr => {
            unreachable!("constructors handled above")
        }
    }
}

/// Convert a value into a map key; only hashable kinds qualify.
pub fn value_to_key(value: &Value) -> Result<MapKey, RuntimeError> {
    match value {
        Value::Int(v) => Ok(MapKey::Int(*v)),
        Value::Str(s) => Ok(MapKey::Str(Arc::clone(s))),
        Value::Bool(b) => Ok(MapKey::Bool(*b)),
        Value::Enum {
            type_id,
            discriminant,
        } => Ok(MapKey::Enum(*type_id, *discriminant)),
        other => Err(RuntimeError::BadCast(format!(
            "{} cannot be a map key",
            other.kind_name()
        ))),
    }
}

/// By-name dispatch for `CallMethod` on built-in kinds.
pub fn dispatch_by_name(
    name: &str,
    receiver: Value,
    args: &[Value],
) -> Result<Value, RuntimeError> {
    let no_method = || RuntimeError::NoSuchMethod {
        method: name.to_string(),
        receiver: receiver.kind_name().to_string(),
    };
    match &receiver {
        Value::Str(s) => {
            let kind = StrMethodKind::from_name(name).ok_or_else(no_method)?;
            str_method(kind, s, args, UNKNOWN_TYPE)
        }
        Value::Int(v) => {
            let kind = IntMethodKind::from_name(name).ok_or_else(no_method)?;
            Ok(int_method(kind, *v))
        }
        Value::Float(v) => {
            let kind = FloatMethodKind::from_name(name).ok_or_else(no_method)?;
            Ok(float_method(kind, *v))
        }
        Value::Bool(v) => {
            let kind = BoolMethodKind::from_name(name).ok_or_else(no_method)?;
            Ok(bool_method(kind, *v))
        }
        Value::List(list) => {
            let kind = ListMethodKind::from_name(name).ok_or_else(no_method)?;
            list_method(kind, list, args, UNKNOWN_TYPE)
        }
        Value::Map(map) => {
            let kind = MapMethodKind::from_name(name).ok_or_else(no_method)?;
            map_method(kind, map, args, UNKNOWN_TYPE)
        }
        Value::Maybe { .. } => {
            let kind = MaybeMethodKind::from_name(name).ok_or_else(no_method)?;
            maybe_method(kind, receiver.clone(), args, UNKNOWN_TYPE)
        }
        Value::Result { .. } => {
            let kind = ResultMethodKind::from_name(name).ok_or_else(no_method)?;
            result_method(kind, receiver.clone(), args, UNKNOWN_TYPE)
        }
        _ => Err(no_method()),
    }
}

fn expect_str(value: &Value) -> Result<&str, RuntimeError> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(RuntimeError::bad_operand("string argument", other.kind_name())),
    }
}

fn expect_int(value: &Value) -> Result<i64, RuntimeError> {
    match value {
        Value::Int(v) => Ok(*v),
        other => Err(RuntimeError::bad_operand("int argument", other.kind_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_size_is_bytes() {
        let s: Arc<str> = Arc::from("héllo");
        let size = str_method(StrMethodKind::Size, &s, &[], 0).unwrap();
        assert_eq!(size, Value::Int(6));
    }

    #[test]
    fn test_str_split_literal_separator() {
        let s: Arc<str> = Arc::from("a,b,,c");
        let parts = str_method(StrMethodKind::Split, &s, &[Value::str(",")], 0).unwrap();
        assert_eq!(
            parts,
            Value::list(
                0,
                vec![
                    Value::str("a"),
                    Value::str("b"),
                    Value::str(""),
                    Value::str("c")
                ]
            )
        );
    }

    #[test]
    fn test_str_trim_strips_spaces() {
        let s: Arc<str> = Arc::from("  pad  ");
        assert_eq!(
            str_method(StrMethodKind::Trim, &s, &[], 0).unwrap(),
            Value::str("pad")
        );
    }

    #[test]
    fn test_str_to_int() {
        let good: Arc<str> = Arc::from("42");
        let bad: Arc<str> = Arc::from("4x");
        assert_eq!(
            str_method(StrMethodKind::ToInt, &good, &[], 0).unwrap(),
            Value::some(0, Value::Int(42))
        );
        assert_eq!(
            str_method(StrMethodKind::ToInt, &bad, &[], 0).unwrap(),
            Value::none(0)
        );
    }

    #[test]
    fn test_int_to_str() {
        assert_eq!(int_method(IntMethodKind::ToStr, 20), Value::str("20"));
    }

    #[test]
    fn test_list_get_out_of_range_is_none() {
        let list = match Value::list(0, vec![Value::Int(1)]) {
            Value::List(l) => l,
            _ => unreachable!(),
        };
        assert_eq!(
            list_method(ListMethodKind::Get, &list, &[Value::Int(5)], 0).unwrap(),
            Value::none(0)
        );
        assert_eq!(
            list_method(ListMethodKind::Get, &list, &[Value::Int(0)], 0).unwrap(),
            Value::some(0, Value::Int(1))
        );
    }

    #[test]
    fn test_map_replacement_keeps_position() {
        let map = MapRef {
            type_id: 0,
            entries: Default::default(),
        };
        map_method(MapMethodKind::Set, &map, &[Value::str("a"), Value::Int(1)], 0).unwrap();
        map_method(MapMethodKind::Set, &map, &[Value::str("b"), Value::Int(2)], 0).unwrap();
        map_method(MapMethodKind::Set, &map, &[Value::str("a"), Value::Int(9)], 0).unwrap();
        let keys = map_method(MapMethodKind::Keys, &map, &[], 0).unwrap();
        assert_eq!(
            keys,
            Value::list(0, vec![Value::str("a"), Value::str("b")])
        );
    }

    #[test]
    fn test_maybe_expect() {
        let some = Value::some(0, Value::Int(42));
        assert_eq!(
            maybe_method(MaybeMethodKind::Expect, some, &[Value::str("nope")], 0).unwrap(),
            Value::Int(42)
        );
        let none = Value::none(0);
        let err =
            maybe_method(MaybeMethodKind::Expect, none, &[Value::str("was none")], 0).unwrap_err();
        assert!(err.to_string().contains("was none"));
    }

    #[test]
    fn test_maybe_or() {
        assert_eq!(
            maybe_method(MaybeMethodKind::Or, Value::none(0), &[Value::Int(9)], 0).unwrap(),
            Value::Int(9)
        );
        assert_eq!(
            maybe_method(
                MaybeMethodKind::Or,
                Value::some(0, Value::Int(1)),
                &[Value::Int(9)],
                0
            )
            .unwrap(),
            Value::Int(1)
        );
    }

    #[test]
    fn test_result_constructors_and_expect() {
        let ok = result_method(ResultMethodKind::MakeOk, Value::Int(3), &[], 0).unwrap();
        assert_eq!(
            result_method(ResultMethodKind::Expect, ok, &[Value::str("m")], 0).unwrap(),
            Value::Int(3)
        );
        let err = result_method(ResultMethodKind::MakeErr, Value::str("bad"), &[], 0).unwrap();
        let failure =
            result_method(ResultMethodKind::Expect, err, &[Value::str("ctx")], 0).unwrap_err();
        assert!(failure.to_string().contains("ctx"));
        assert!(failure.to_string().contains("bad"));
    }

    #[test]
    fn test_dispatch_by_name() {
        assert_eq!(
            dispatch_by_name("to_str", Value::Int(7), &[]).unwrap(),
            Value::str("7")
        );
        assert!(matches!(
            dispatch_by_name("nope", Value::Int(7), &[]),
            Err(RuntimeError::NoSuchMethod { .. })
        ));
    }
}
