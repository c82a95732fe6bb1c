//! Conversion of generated values to a column's storage type.
//!
//! Integer, float and boolean targets use permissive casts; every other
//! target stores text. When no type is declared it is inferred from the
//! original value, and a `null` original leaves the generated value as is.

use serde_json::{Number, Value};

use datamask_core::StorageType;
use datamask_core::loose::{leading_number, to_number, to_text};

pub fn convert_value(value: Value, declared: Option<StorageType>, original: &Value) -> Value {
    let Some(target) = declared.or_else(|| StorageType::infer(original)) else {
        return value;
    };
    if value.is_null() {
        return Value::Null;
    }
    match target {
        StorageType::Integer => Value::from(to_integer(&value)),
        StorageType::Float => Number::from_f64(to_number(&value))
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(0)),
        StorageType::Boolean => Value::Bool(to_bool(&value)),
        StorageType::Json => value,
        StorageType::String | StorageType::Text | StorageType::Date | StorageType::Datetime => {
            Value::String(stringify(&value))
        }
    }
}

fn to_integer(value: &Value) -> i64 {
    let number = match value {
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                return int;
            }
            number.as_f64().unwrap_or(0.0)
        }
        Value::String(text) => leading_number(text),
        other => to_number(other),
    };
    if number.is_finite() {
        number.trunc() as i64
    } else {
        0
    }
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !(text.is_empty() || text == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => to_text(other).unwrap_or_else(|| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn declared_type_wins_over_original() {
        assert_eq!(
            convert_value(json!("42abc"), Some(StorageType::Integer), &json!("x")),
            json!(42)
        );
        assert_eq!(
            convert_value(json!(3.9), Some(StorageType::Integer), &json!(null)),
            json!(3)
        );
        assert_eq!(
            convert_value(json!(12), Some(StorageType::String), &json!(1)),
            json!("12")
        );
    }

    #[test]
    fn type_is_inferred_from_original() {
        assert_eq!(convert_value(json!("7"), None, &json!(1)), json!(7));
        assert_eq!(convert_value(json!("1.5"), None, &json!(0.5)), json!(1.5));
        assert_eq!(convert_value(json!("0"), None, &json!(true)), json!(false));
        assert_eq!(convert_value(json!(true), None, &json!("yes")), json!("1"));
        assert_eq!(convert_value(json!(false), None, &json!("yes")), json!(""));
    }

    #[test]
    fn null_original_keeps_generated_value() {
        assert_eq!(convert_value(json!(5), None, &json!(null)), json!(5));
        assert_eq!(
            convert_value(json!(null), Some(StorageType::Integer), &json!(3)),
            json!(null)
        );
    }

    #[test]
    fn non_numeric_text_casts_to_zero() {
        assert_eq!(
            convert_value(json!("abc"), Some(StorageType::Integer), &json!(1)),
            json!(0)
        );
        assert_eq!(
            convert_value(json!("abc"), Some(StorageType::Float), &json!(1.0)),
            json!(0.0)
        );
    }

    #[test]
    fn json_targets_keep_structure() {
        let value = json!({"a": [1, 2]});
        assert_eq!(
            convert_value(value.clone(), None, &json!({"old": true})),
            value
        );
        assert_eq!(
            convert_value(json!([1]), Some(StorageType::Text), &json!("x")),
            json!("[1]")
        );
    }
}
