//! Generators that derive the substitute from the record itself.
//!
//! `copy` and `pattern_based` read other fields from the in-progress record,
//! so they see substitutes of properties that ran earlier (lower weight).

use std::collections::BTreeMap;
use std::sync::Mutex;

use rand::RngCore;
use regex::Regex;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::errors::GenerationError;
use crate::generators::{Generator, GeneratorContext, GeneratorRegistry, value_to_text};
use crate::params::{ParamKind, ParamMap, ParamSpec, non_negative};

/// Trailing counter such as `(5)` in `a@b.com(5)`.
pub const DEFAULT_SUFFIX_PATTERN: &str = r"\(\d+\)$";

pub fn register(registry: &mut GeneratorRegistry) {
    registry.register_generator(Box::new(CopyGenerator));
    registry.register_generator(Box::new(PatternBasedGenerator::default()));
    registry.register_generator(Box::new(HashGenerator));
    registry.register_generator(Box::new(MaskGenerator));
}

fn source_value<'a>(
    ctx: &GeneratorContext<'a>,
    params: &ParamMap<'_>,
    id: &str,
) -> Result<&'a Value, GenerationError> {
    let field = params
        .get_str("source_field")
        .ok_or_else(|| GenerationError::InvalidOptions(format!("{id} requires source_field")))?;
    ctx.record.resolve(field).ok_or_else(|| {
        GenerationError::Failed(format!("{id}: record has no field '{field}'"))
    })
}

struct CopyGenerator;

const COPY_PARAMS: &[ParamSpec] = &[ParamSpec::new("source_field", ParamKind::String, true)];

impl Generator for CopyGenerator {
    fn id(&self) -> &str {
        "copy"
    }

    fn params(&self) -> Option<&'static [ParamSpec]> {
        Some(COPY_PARAMS)
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        params: &ParamMap<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        source_value(ctx, params, "copy").cloned()
    }
}

/// Current value of `source_field` plus the part of the original value
/// captured by `pattern` (first group if present, else the whole match).
#[derive(Default)]
struct PatternBasedGenerator {
    compiled: Mutex<BTreeMap<String, Regex>>,
}

const PATTERN_BASED_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("source_field", ParamKind::String, true),
    ParamSpec::new("pattern", ParamKind::String, false),
];

impl PatternBasedGenerator {
    /// Compiled once per distinct pattern text.
    fn pattern(&self, params: &ParamMap<'_>) -> Result<Regex, GenerationError> {
        let pattern = params.get_str("pattern").unwrap_or(DEFAULT_SUFFIX_PATTERN);
        let mut compiled = self.compiled.lock().map_err(|_| {
            GenerationError::Failed("pattern_based: pattern cache poisoned".to_string())
        })?;
        if let Some(regex) = compiled.get(pattern) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(pattern).map_err(|err| {
            GenerationError::InvalidOptions(format!("pattern_based: invalid pattern: {err}"))
        })?;
        compiled.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

impl Generator for PatternBasedGenerator {
    fn id(&self) -> &str {
        "pattern_based"
    }

    fn params(&self) -> Option<&'static [ParamSpec]> {
        Some(PATTERN_BASED_PARAMS)
    }

    fn check(&self, params: &ParamMap<'_>) -> Result<(), GenerationError> {
        self.pattern(params).map(|_| ())
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        params: &ParamMap<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        let base = value_to_text(source_value(ctx, params, "pattern_based")?);
        let pattern = self.pattern(params)?;
        let original = value_to_text(ctx.original);
        let suffix = pattern
            .captures(&original)
            .and_then(|captures| captures.get(1).or_else(|| captures.get(0)))
            .map(|found| found.as_str())
            .unwrap_or_default();
        Ok(Value::String(format!("{base}{suffix}")))
    }
}

/// Hex SHA-256 of the original value. `null` stays `null`.
struct HashGenerator;

const HASH_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("salt", ParamKind::String, false),
    ParamSpec::new("length", ParamKind::Int, false),
];

impl Generator for HashGenerator {
    fn id(&self) -> &str {
        "hash"
    }

    fn params(&self) -> Option<&'static [ParamSpec]> {
        Some(HASH_PARAMS)
    }

    fn check(&self, params: &ParamMap<'_>) -> Result<(), GenerationError> {
        non_negative(params, "length", "hash").map(|_| ())
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        params: &ParamMap<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        if ctx.original.is_null() {
            return Ok(Value::Null);
        }
        let mut hasher = Sha256::new();
        if let Some(salt) = params.get_str("salt") {
            hasher.update(salt.as_bytes());
        }
        hasher.update(value_to_text(ctx.original).as_bytes());
        let mut digest = hex::encode(hasher.finalize());
        if let Some(length) = non_negative(params, "length", "hash")? {
            digest.truncate(length);
        }
        Ok(Value::String(digest))
    }
}

/// Keeps `keep_start`/`keep_end` characters and masks the rest. A value too
/// short to keep anything is masked entirely.
struct MaskGenerator;

const MASK_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("keep_start", ParamKind::Int, false),
    ParamSpec::new("keep_end", ParamKind::Int, false),
    ParamSpec::new("char", ParamKind::String, false),
];

impl MaskGenerator {
    fn mask_char(params: &ParamMap<'_>) -> Result<char, GenerationError> {
        let raw = params.get_str("char").unwrap_or("*");
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => Ok(ch),
            _ => Err(GenerationError::InvalidOptions(
                "mask: char must be a single character".to_string(),
            )),
        }
    }
}

impl Generator for MaskGenerator {
    fn id(&self) -> &str {
        "mask"
    }

    fn params(&self) -> Option<&'static [ParamSpec]> {
        Some(MASK_PARAMS)
    }

    fn check(&self, params: &ParamMap<'_>) -> Result<(), GenerationError> {
        non_negative(params, "keep_start", "mask")?;
        non_negative(params, "keep_end", "mask")?;
        Self::mask_char(params).map(|_| ())
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        params: &ParamMap<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        if ctx.original.is_null() {
            return Ok(Value::Null);
        }
        let keep_start = non_negative(params, "keep_start", "mask")?.unwrap_or(0);
        let keep_end = non_negative(params, "keep_end", "mask")?.unwrap_or(0);
        let mask = Self::mask_char(params)?;

        let chars: Vec<char> = value_to_text(ctx.original).chars().collect();
        let len = chars.len();
        let masked: String = if keep_start + keep_end >= len {
            std::iter::repeat_n(mask, len).collect()
        } else {
            chars
                .iter()
                .enumerate()
                .map(|(idx, ch)| {
                    if idx < keep_start || idx >= len - keep_end {
                        *ch
                    } else {
                        mask
                    }
                })
                .collect()
        };
        Ok(Value::String(masked))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde_json::json;

    use super::*;
    use crate::generators::test_support::{options, record, run};
    use crate::params::validate_params;

    #[test]
    fn pattern_based_keeps_the_original_counter() {
        let row = record(json!({"email": "new@example.org", "username": "a@b.com(5)"}));
        let value = run("pattern_based", &row, "username", json!({"source_field": "email"}))
            .expect("derive");
        assert_eq!(value, json!("new@example.org(5)"));
    }

    #[test]
    fn pattern_based_compiles_each_pattern_once() {
        let generator = PatternBasedGenerator::default();
        let custom = options(json!({"source_field": "email", "pattern": r"#(\d+)$"}));
        let custom =
            validate_params(&custom, PATTERN_BASED_PARAMS, "pattern_based").expect("params");
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for (row_index, username) in ["a#1", "b#22", "c"].into_iter().enumerate() {
            let row = record(json!({"email": "new@example.org", "username": username}));
            let original = json!(username);
            let ctx = GeneratorContext {
                source: "main",
                entity: "User",
                field: "username",
                column: "username",
                original: &original,
                record: &row,
                row_index: row_index as u64,
            };
            let value = generator.generate(&ctx, &custom, &mut rng).expect("derive");
            let expected = match username {
                "a#1" => "new@example.org1",
                "b#22" => "new@example.org22",
                _ => "new@example.org",
            };
            assert_eq!(value, json!(expected));
        }
        generator.check(&custom).expect("check");

        let bad = options(json!({"source_field": "email", "pattern": "("}));
        let bad = validate_params(&bad, PATTERN_BASED_PARAMS, "pattern_based").expect("params");
        assert!(matches!(generator.check(&bad), Err(GenerationError::InvalidOptions(_))));
        assert_eq!(generator.compiled.lock().expect("cache").len(), 1);
    }

    #[test]
    fn pattern_based_without_match_uses_source_only() {
        let row = record(json!({"email": "new@example.org", "username": "plain"}));
        let value = run("pattern_based", &row, "username", json!({"source_field": "email"}))
            .expect("derive");
        assert_eq!(value, json!("new@example.org"));
    }

    #[test]
    fn pattern_based_uses_first_capture_group() {
        let row = record(json!({"email": "x@y.z", "login": "old#42"}));
        let value = run(
            "pattern_based",
            &row,
            "login",
            json!({"source_field": "email", "pattern": "(#\\d+)$"}),
        )
        .expect("derive");
        assert_eq!(value, json!("x@y.z#42"));
    }

    #[test]
    fn pattern_based_rejects_bad_regex_and_missing_source() {
        let row = record(json!({"username": "a(1)"}));
        assert!(
            run(
                "pattern_based",
                &row,
                "username",
                json!({"source_field": "email", "pattern": "("})
            )
            .is_err()
        );
        assert!(run("pattern_based", &row, "username", json!({"source_field": "email"})).is_err());
    }

    #[test]
    fn copy_reads_nested_fields() {
        let row = record(json!({"alias": "x", "profile": {"nick": "ada"}}));
        let value = run("copy", &row, "alias", json!({"source_field": "profile.nick"}))
            .expect("copy");
        assert_eq!(value, json!("ada"));
    }

    #[test]
    fn hash_is_stable_salted_and_truncated() {
        let row = record(json!({"ssn": "123-45-6789"}));
        let plain = run("hash", &row, "ssn", json!({})).expect("hash");
        let again = run("hash", &row, "ssn", json!({})).expect("hash");
        let salted = run("hash", &row, "ssn", json!({"salt": "pepper"})).expect("hash");
        let short = run("hash", &row, "ssn", json!({"length": 12})).expect("hash");

        assert_eq!(plain, again);
        assert_eq!(plain.as_str().map(str::len), Some(64));
        assert_ne!(plain, salted);
        assert_eq!(short.as_str().map(str::len), Some(12));
        assert!(plain.as_str().is_some_and(|h| h.starts_with(short.as_str().unwrap_or("-"))));
    }

    #[test]
    fn mask_keeps_edges() {
        let row = record(json!({"phone": "5551234567", "pin": "12"}));
        assert_eq!(
            run("mask", &row, "phone", json!({"keep_end": 2})).expect("mask"),
            json!("********67")
        );
        assert_eq!(
            run("mask", &row, "phone", json!({"keep_start": 3, "keep_end": 2, "char": "#"}))
                .expect("mask"),
            json!("555#####67")
        );
        assert_eq!(
            run("mask", &row, "pin", json!({"keep_end": 2})).expect("mask"),
            json!("**")
        );
        assert!(run("mask", &row, "pin", json!({"char": "ab"})).is_err());
    }

    #[test]
    fn null_originals_stay_null() {
        let row = record(json!({"ssn": null}));
        assert_eq!(run("hash", &row, "ssn", json!({})).expect("hash"), json!(null));
        assert_eq!(run("mask", &row, "ssn", json!({})).expect("mask"), json!(null));
    }
}
