use std::fmt::Write;

use chrono::{Duration, NaiveDate};
use fake::Fake;
use fake::faker::lorem::en::Words;
use rand::{Rng, RngCore};
use serde_json::{Number, Value};

use crate::errors::GenerationError;
use crate::generators::{Generator, GeneratorContext, GeneratorRegistry};
use crate::params::{ParamKind, ParamMap, ParamSpec, non_negative};

pub fn register(registry: &mut GeneratorRegistry) {
    registry.register_generator(Box::new(TextGenerator));
    registry.register_generator(Box::new(NumberGenerator));
    registry.register_generator(Box::new(FloatGenerator));
    registry.register_generator(Box::new(BooleanGenerator));
    registry.register_generator(Box::new(DateGenerator));
    registry.register_generator(Box::new(UuidGenerator));
    registry.register_generator(Box::new(ConstantGenerator));
    registry.register_generator(Box::new(NullGenerator));
}

struct TextGenerator;

const TEXT_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("words", ParamKind::Int, false),
    ParamSpec::new("max_len", ParamKind::Int, false),
];

impl Generator for TextGenerator {
    fn id(&self) -> &str {
        "text"
    }

    fn params(&self) -> Option<&'static [ParamSpec]> {
        Some(TEXT_PARAMS)
    }

    fn check(&self, params: &ParamMap<'_>) -> Result<(), GenerationError> {
        if non_negative(params, "words", "text")? == Some(0) {
            return Err(GenerationError::InvalidOptions(
                "text: words must be >= 1".to_string(),
            ));
        }
        non_negative(params, "max_len", "text").map(|_| ())
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        self.check(params)?;
        let words = non_negative(params, "words", "text")?.unwrap_or(5);
        let words: Vec<String> = Words(words..words + 1).fake_with_rng(rng);
        let mut value = words.join(" ");
        if let Some(max_len) = non_negative(params, "max_len", "text")? {
            value = value.chars().take(max_len).collect();
        }
        Ok(Value::String(value))
    }
}

struct NumberGenerator;

const NUMBER_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min", ParamKind::Int, false),
    ParamSpec::new("max", ParamKind::Int, false),
];

impl NumberGenerator {
    fn bounds(params: &ParamMap<'_>) -> Result<(i64, i64), GenerationError> {
        let min = params.get_i64("min").unwrap_or(0);
        let max = params.get_i64("max").unwrap_or(10_000);
        if min > max {
            return Err(GenerationError::InvalidOptions(
                "number: min must be <= max".to_string(),
            ));
        }
        Ok((min, max))
    }
}

impl Generator for NumberGenerator {
    fn id(&self) -> &str {
        "number"
    }

    fn params(&self) -> Option<&'static [ParamSpec]> {
        Some(NUMBER_PARAMS)
    }

    fn check(&self, params: &ParamMap<'_>) -> Result<(), GenerationError> {
        Self::bounds(params).map(|_| ())
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        let (min, max) = Self::bounds(params)?;
        Ok(Value::from(rng.random_range(min..=max)))
    }
}

struct FloatGenerator;

const FLOAT_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min", ParamKind::Float, false),
    ParamSpec::new("max", ParamKind::Float, false),
    ParamSpec::new("decimals", ParamKind::Int, false),
];

impl FloatGenerator {
    fn bounds(params: &ParamMap<'_>) -> Result<(f64, f64), GenerationError> {
        let min = params.get_f64("min").unwrap_or(0.0);
        let max = params.get_f64("max").unwrap_or(1_000.0);
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(GenerationError::InvalidOptions(
                "float: min must be <= max".to_string(),
            ));
        }
        Ok((min, max))
    }
}

impl Generator for FloatGenerator {
    fn id(&self) -> &str {
        "float"
    }

    fn params(&self) -> Option<&'static [ParamSpec]> {
        Some(FLOAT_PARAMS)
    }

    fn check(&self, params: &ParamMap<'_>) -> Result<(), GenerationError> {
        Self::bounds(params)?;
        non_negative(params, "decimals", "float").map(|_| ())
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        let (min, max) = Self::bounds(params)?;
        let decimals = non_negative(params, "decimals", "float")?.unwrap_or(2);
        let raw = if min == max {
            min
        } else {
            rng.random_range(min..=max)
        };
        let factor = 10_f64.powi(decimals.min(15) as i32);
        let value = (raw * factor).round() / factor;
        Number::from_f64(value)
            .map(Value::Number)
            .ok_or_else(|| GenerationError::Failed("float: value is not finite".to_string()))
    }
}

struct BooleanGenerator;

const BOOLEAN_PARAMS: &[ParamSpec] = &[ParamSpec::new("probability", ParamKind::Float, false)];

impl Generator for BooleanGenerator {
    fn id(&self) -> &str {
        "boolean"
    }

    fn params(&self) -> Option<&'static [ParamSpec]> {
        Some(BOOLEAN_PARAMS)
    }

    fn check(&self, params: &ParamMap<'_>) -> Result<(), GenerationError> {
        match params.get_f64("probability") {
            Some(p) if !(0.0..=1.0).contains(&p) => Err(GenerationError::InvalidOptions(
                "boolean: probability must be between 0 and 1".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        self.check(params)?;
        let probability = params.get_f64("probability").unwrap_or(0.5);
        Ok(Value::Bool(rng.random_bool(probability)))
    }
}

struct DateGenerator;

const DATE_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min", ParamKind::Date, false),
    ParamSpec::new("max", ParamKind::Date, false),
    ParamSpec::new("format", ParamKind::String, false),
];

impl DateGenerator {
    fn bounds(params: &ParamMap<'_>) -> Result<(NaiveDate, NaiveDate), GenerationError> {
        let min = params
            .get_date("min")
            .or_else(|| NaiveDate::from_ymd_opt(1950, 1, 1))
            .ok_or_else(|| GenerationError::Failed("date: invalid default".to_string()))?;
        let max = params
            .get_date("max")
            .or_else(|| NaiveDate::from_ymd_opt(2005, 12, 31))
            .ok_or_else(|| GenerationError::Failed("date: invalid default".to_string()))?;
        if min > max {
            return Err(GenerationError::InvalidOptions(
                "date: min must be <= max".to_string(),
            ));
        }
        Ok((min, max))
    }
}

impl Generator for DateGenerator {
    fn id(&self) -> &str {
        "date"
    }

    fn params(&self) -> Option<&'static [ParamSpec]> {
        Some(DATE_PARAMS)
    }

    fn check(&self, params: &ParamMap<'_>) -> Result<(), GenerationError> {
        let (min, _) = Self::bounds(params)?;
        format_date(min, params).map(|_| ())
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        let (min, max) = Self::bounds(params)?;
        let span = (max - min).num_days();
        let date = min + Duration::days(rng.random_range(0..=span));
        format_date(date, params).map(Value::String)
    }
}

fn format_date(date: NaiveDate, params: &ParamMap<'_>) -> Result<String, GenerationError> {
    let format = params.get_str("format").unwrap_or("%Y-%m-%d");
    let mut out = String::new();
    write!(out, "{}", date.format(format))
        .map_err(|_| GenerationError::InvalidOptions(format!("date: invalid format '{format}'")))?;
    Ok(out)
}

struct UuidGenerator;

impl Generator for UuidGenerator {
    fn id(&self) -> &str {
        "uuid"
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        _params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        let mut bytes = [0_u8; 16];
        rng.fill_bytes(&mut bytes);
        let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
        Ok(Value::String(uuid.to_string()))
    }
}

struct ConstantGenerator;

const CONSTANT_PARAMS: &[ParamSpec] = &[ParamSpec::new("value", ParamKind::Any, true)];

impl Generator for ConstantGenerator {
    fn id(&self) -> &str {
        "constant"
    }

    fn params(&self) -> Option<&'static [ParamSpec]> {
        Some(CONSTANT_PARAMS)
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        params: &ParamMap<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        Ok(params.get("value").cloned().unwrap_or(Value::Null))
    }
}

struct NullGenerator;

impl Generator for NullGenerator {
    fn id(&self) -> &str {
        "null"
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        _params: &ParamMap<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::generators::test_support::{record, run};

    #[test]
    fn number_respects_bounds() {
        let row = record(json!({"age": 40}));
        let value = run("number", &row, "age", json!({"min": 18, "max": 20})).expect("number");
        let age = value.as_i64().expect("int");
        assert!((18..=20).contains(&age));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let row = record(json!({"age": 40}));
        assert!(run("number", &row, "age", json!({"min": 5, "max": 1})).is_err());
        assert!(
            run(
                "date",
                &row,
                "age",
                json!({"min": "2020-01-02", "max": "2020-01-01"})
            )
            .is_err()
        );
    }

    #[test]
    fn float_rounds_to_decimals() {
        let row = record(json!({"score": 1.5}));
        let value = run(
            "float",
            &row,
            "score",
            json!({"min": 1.0, "max": 2.0, "decimals": 1}),
        )
        .expect("float");
        let score = value.as_f64().expect("float");
        assert!((1.0..=2.0).contains(&score));
        assert_eq!((score * 10.0).fract(), 0.0);
    }

    #[test]
    fn date_stays_in_range_and_formats() {
        let row = record(json!({"birthday": "1990-05-01"}));
        let value = run(
            "date",
            &row,
            "birthday",
            json!({"min": "2000-01-01", "max": "2000-01-31", "format": "%d/%m/%Y"}),
        )
        .expect("date");
        let text = value.as_str().expect("string");
        assert!(text.ends_with("/01/2000"), "{text}");
    }

    #[test]
    fn invalid_date_format_is_an_option_error() {
        let row = record(json!({"birthday": "1990-05-01"}));
        let err = run("date", &row, "birthday", json!({"format": "%Q"})).expect_err("format");
        assert!(err.to_string().contains("invalid format"));
    }

    #[test]
    fn uuid_is_version_four() {
        let row = record(json!({"token": "x"}));
        let value = run("uuid", &row, "token", json!({})).expect("uuid");
        let parsed = uuid::Uuid::parse_str(value.as_str().expect("string")).expect("parse");
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn constant_and_null() {
        let row = record(json!({"status": "vip"}));
        assert_eq!(
            run("constant", &row, "status", json!({"value": "redacted"})).expect("constant"),
            json!("redacted")
        );
        assert!(run("constant", &row, "status", json!({})).is_err());
        assert_eq!(
            run("null", &row, "status", json!({})).expect("null"),
            json!(null)
        );
    }

    #[test]
    fn boolean_probability_extremes() {
        let row = record(json!({"flag": true}));
        assert_eq!(
            run("boolean", &row, "flag", json!({"probability": 0.0})).expect("bool"),
            json!(false)
        );
        assert!(run("boolean", &row, "flag", json!({"probability": 1.5})).is_err());
    }
}
