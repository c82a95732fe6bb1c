use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::errors::GenerationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    String,
    Date,
    Any,
}

#[derive(Clone, Copy, Debug)]
pub struct ParamSpec {
    pub key: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    pub const fn new(key: &'static str, kind: ParamKind, required: bool) -> Self {
        Self {
            key,
            kind,
            required,
        }
    }
}

/// Validated view over a generator's options.
#[derive(Clone, Copy, Debug)]
pub struct ParamMap<'a> {
    map: &'a Map<String, Value>,
}

/// Check `options` against `specs`: unknown keys, wrong types and missing
/// required keys are all rejected.
pub fn validate_params<'a>(
    options: &'a Map<String, Value>,
    specs: &[ParamSpec],
    ctx: &str,
) -> Result<ParamMap<'a>, GenerationError> {
    for (key, value) in options {
        let Some(spec) = specs.iter().find(|spec| spec.key == key.as_str()) else {
            return Err(GenerationError::InvalidOptions(format!(
                "{ctx}: unknown option '{key}'"
            )));
        };
        validate_kind(ctx, key, spec.kind, value)?;
    }

    for spec in specs {
        if spec.required && !options.contains_key(spec.key) {
            return Err(GenerationError::InvalidOptions(format!(
                "{ctx}: missing required option '{}'",
                spec.key
            )));
        }
    }

    Ok(ParamMap { map: options })
}

impl<'a> ParamMap<'a> {
    /// View without validation, for generators that accept any options.
    pub fn unchecked(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.map.get(key).and_then(|value| value.as_i64())
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.map
            .get(key)
            .and_then(|value| value.as_u64())
            .and_then(|value| usize::try_from(value).ok())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.map.get(key).and_then(|value| value.as_f64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key).and_then(|value| value.as_bool())
    }

    pub fn get_str(&self, key: &str) -> Option<&'a str> {
        self.map.get(key).and_then(|value| value.as_str())
    }

    pub fn get_date(&self, key: &str) -> Option<NaiveDate> {
        self.get_str(key).and_then(parse_date_value)
    }
}

fn validate_kind(
    ctx: &str,
    key: &str,
    kind: ParamKind,
    value: &Value,
) -> Result<(), GenerationError> {
    let valid = match kind {
        ParamKind::Bool => value.is_boolean(),
        ParamKind::Int => value.as_i64().is_some(),
        ParamKind::Float => value.as_f64().is_some(),
        ParamKind::String => value.is_string(),
        ParamKind::Date => value.as_str().and_then(parse_date_value).is_some(),
        ParamKind::Any => true,
    };

    if valid {
        Ok(())
    } else {
        Err(GenerationError::InvalidOptions(format!(
            "{ctx}: invalid value for option '{key}'"
        )))
    }
}

pub fn parse_date_value(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Reject negative integer options that count characters or items.
pub fn non_negative(
    params: &ParamMap<'_>,
    key: &str,
    ctx: &str,
) -> Result<Option<usize>, GenerationError> {
    match params.get_i64(key) {
        None => Ok(None),
        Some(value) if value < 0 => Err(GenerationError::InvalidOptions(format!(
            "{ctx}: {key} must be >= 0"
        ))),
        Some(value) => Ok(Some(value as usize)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SPECS: &[ParamSpec] = &[
        ParamSpec::new("min", ParamKind::Int, false),
        ParamSpec::new("source_field", ParamKind::String, true),
        ParamSpec::new("since", ParamKind::Date, false),
    ];

    fn options(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("options must be an object"),
        }
    }

    #[test]
    fn accepts_declared_options() {
        let map = options(json!({"min": 3, "source_field": "email", "since": "2020-01-31"}));
        let params = validate_params(&map, SPECS, "test").expect("valid");
        assert_eq!(params.get_i64("min"), Some(3));
        assert_eq!(params.get_str("source_field"), Some("email"));
        assert_eq!(
            params.get_date("since"),
            NaiveDate::from_ymd_opt(2020, 1, 31)
        );
    }

    #[test]
    fn rejects_unknown_wrong_typed_and_missing_options() {
        let unknown = options(json!({"source_field": "email", "max": 1}));
        assert!(validate_params(&unknown, SPECS, "test").is_err());

        let wrong = options(json!({"source_field": "email", "since": "31/01/2020"}));
        assert!(validate_params(&wrong, SPECS, "test").is_err());

        let missing = options(json!({"min": 1}));
        let err = validate_params(&missing, SPECS, "test").expect_err("missing");
        assert!(err.to_string().contains("source_field"));
    }

    #[test]
    fn negative_counts_are_rejected() {
        let map = options(json!({"min": -1, "source_field": "x"}));
        let params = validate_params(&map, SPECS, "test").expect("valid");
        assert!(non_negative(&params, "min", "test").is_err());
    }
}
