//! Generator registry and the built-in generators.
//!
//! The engine only knows generators by identifier. Anything implementing
//! [`Generator`] (or a plain closure via [`GeneratorRegistry::register_fn`])
//! can be injected; the built-ins are registered by
//! [`GeneratorRegistry::with_builtins`].

use std::collections::BTreeMap;
use std::fmt;

use rand::RngCore;
use serde_json::{Map, Value};

use datamask_core::Record;

use crate::errors::GenerationError;
use crate::params::{ParamMap, ParamSpec, validate_params};

pub mod derive;
pub mod primitives;
pub mod semantic;

/// Run-time context handed to a generator for one property of one record.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorContext<'a> {
    pub source: &'a str,
    pub entity: &'a str,
    pub field: &'a str,
    pub column: &'a str,
    /// Value stored before the run touched this record.
    pub original: &'a Value,
    /// The record with every earlier property's substitute already applied.
    pub record: &'a Record,
    pub row_index: u64,
}

pub trait Generator: Send + Sync {
    fn id(&self) -> &str;

    /// Accepted options. `None` disables option checking.
    fn params(&self) -> Option<&'static [ParamSpec]> {
        Some(&[])
    }

    /// Checks beyond option types, run during pre-flight.
    fn check(&self, _params: &ParamMap<'_>) -> Result<(), GenerationError> {
        Ok(())
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError>;
}

type GenerateFn = dyn Fn(
        &GeneratorContext<'_>,
        &ParamMap<'_>,
        &mut dyn RngCore,
    ) -> Result<Value, GenerationError>
    + Send
    + Sync;

struct FnGenerator {
    id: String,
    generate: Box<GenerateFn>,
}

impl Generator for FnGenerator {
    fn id(&self) -> &str {
        &self.id
    }

    fn params(&self) -> Option<&'static [ParamSpec]> {
        None
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        (self.generate)(ctx, params, rng)
    }
}

/// Generator identifier to implementation.
#[derive(Default)]
pub struct GeneratorRegistry {
    generators: BTreeMap<String, Box<dyn Generator>>,
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("generators", &self.generators.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl GeneratorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in generator.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        semantic::register(&mut registry);
        primitives::register(&mut registry);
        derive::register(&mut registry);
        registry
    }

    /// Register a generator, replacing any previous one with the same id.
    pub fn register_generator(&mut self, generator: Box<dyn Generator>) {
        self.generators.insert(generator.id().to_string(), generator);
    }

    /// Register a closure as a generator. Its options are not checked.
    pub fn register_fn<F>(&mut self, id: impl Into<String>, generate: F)
    where
        F: Fn(
                &GeneratorContext<'_>,
                &ParamMap<'_>,
                &mut dyn RngCore,
            ) -> Result<Value, GenerationError>
            + Send
            + Sync
            + 'static,
    {
        self.register_generator(Box::new(FnGenerator {
            id: id.into(),
            generate: Box::new(generate),
        }));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.generators.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.generators.keys().map(String::as_str)
    }

    /// Validate options for `id` without generating anything.
    pub fn validate_options(
        &self,
        id: &str,
        options: &Map<String, Value>,
    ) -> Result<(), GenerationError> {
        let generator = self.lookup(id)?;
        let params = bind_params(generator, options)?;
        generator.check(&params)
    }

    pub fn generate(
        &self,
        id: &str,
        ctx: &GeneratorContext<'_>,
        options: &Map<String, Value>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        let generator = self.lookup(id)?;
        let params = bind_params(generator, options)?;
        generator.generate(ctx, &params, rng)
    }

    fn lookup(&self, id: &str) -> Result<&dyn Generator, GenerationError> {
        self.generators
            .get(id)
            .map(|generator| generator.as_ref())
            .ok_or_else(|| GenerationError::UnknownGenerator(id.to_string()))
    }
}

fn bind_params<'a>(
    generator: &dyn Generator,
    options: &'a Map<String, Value>,
) -> Result<ParamMap<'a>, GenerationError> {
    match generator.params() {
        Some(specs) => validate_params(options, specs, generator.id()),
        None => Ok(ParamMap::unchecked(options)),
    }
}

/// Text form of a value for generators that operate on strings.
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => datamask_core::loose::to_text(other).unwrap_or_else(|| other.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde_json::{Map, Value};

    use datamask_core::Record;

    use super::{GeneratorContext, GeneratorRegistry};
    use crate::errors::GenerationError;

    pub fn options(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("options must be an object"),
        }
    }

    pub fn record(value: Value) -> Record {
        Record::try_from(value).expect("record")
    }

    /// Run `id` against `column` of `record` with a fixed seed.
    pub fn run(
        id: &str,
        record: &Record,
        column: &str,
        options: Value,
    ) -> Result<Value, GenerationError> {
        let registry = GeneratorRegistry::with_builtins();
        let original = record.get(column).cloned().unwrap_or(Value::Null);
        let ctx = GeneratorContext {
            source: "main",
            entity: "User",
            field: column,
            column,
            original: &original,
            record,
            row_index: 0,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        registry.generate(id, &ctx, &self::options(options), &mut rng)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::test_support::{options, record, run};
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = GeneratorRegistry::with_builtins();
        for id in [
            "email",
            "safe_email",
            "name",
            "first_name",
            "last_name",
            "username",
            "phone",
            "company",
            "address",
            "city",
            "text",
            "number",
            "float",
            "boolean",
            "date",
            "uuid",
            "hash",
            "mask",
            "constant",
            "null",
            "copy",
            "pattern_based",
        ] {
            assert!(registry.contains(id), "missing builtin {id}");
        }
    }

    #[test]
    fn unknown_generator_is_reported() {
        let err = run("nope", &record(json!({"a": 1})), "a", json!({})).expect_err("unknown");
        assert!(matches!(err, GenerationError::UnknownGenerator(id) if id == "nope"));
    }

    #[test]
    fn closures_can_be_registered() {
        let mut registry = GeneratorRegistry::new();
        registry.register_fn("upper", |ctx, _params, _rng| {
            Ok(Value::String(value_to_text(ctx.original).to_uppercase()))
        });
        assert!(registry.validate_options("upper", &options(json!({"any": 1}))).is_ok());

        let row = record(json!({"name": "ada"}));
        let original = json!("ada");
        let ctx = GeneratorContext {
            source: "main",
            entity: "User",
            field: "name",
            column: "name",
            original: &original,
            record: &row,
            row_index: 0,
        };
        let mut rng = <rand_chacha::ChaCha8Rng as rand::SeedableRng>::seed_from_u64(1);
        let value = registry
            .generate("upper", &ctx, &Map::new(), &mut rng)
            .expect("generate");
        assert_eq!(value, json!("ADA"));
    }

    #[test]
    fn builtin_options_are_checked() {
        let registry = GeneratorRegistry::with_builtins();
        let email = options(json!({"domain": "example.org"}));
        assert!(registry.validate_options("email", &email).is_ok());
        assert!(registry.validate_options("email", &options(json!({"domian": "x"}))).is_err());
        assert!(registry.validate_options("pattern_based", &Map::new()).is_err());
    }
}
