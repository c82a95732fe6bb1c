use fake::Fake;
use fake::faker::address::en::{BuildingNumber, CityName, StreetName};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::{SafeEmail, Username};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use rand::RngCore;
use serde_json::Value;

use crate::errors::GenerationError;
use crate::generators::{Generator, GeneratorContext, GeneratorRegistry};
use crate::params::{ParamKind, ParamMap, ParamSpec};

pub fn register(registry: &mut GeneratorRegistry) {
    registry.register_generator(Box::new(EmailGenerator { id: "email" }));
    registry.register_generator(Box::new(EmailGenerator { id: "safe_email" }));
    for (id, kind) in [
        ("name", FakerKind::Name),
        ("first_name", FakerKind::FirstName),
        ("last_name", FakerKind::LastName),
        ("username", FakerKind::Username),
        ("phone", FakerKind::Phone),
        ("company", FakerKind::Company),
        ("address", FakerKind::Address),
        ("city", FakerKind::City),
    ] {
        registry.register_generator(Box::new(FakerGenerator { id, kind }));
    }
}

const EMAIL_PARAMS: &[ParamSpec] = &[ParamSpec::new("domain", ParamKind::String, false)];

/// Email address from the reserved example domains, or from `domain`.
struct EmailGenerator {
    id: &'static str,
}

impl Generator for EmailGenerator {
    fn id(&self) -> &str {
        self.id
    }

    fn params(&self) -> Option<&'static [ParamSpec]> {
        Some(EMAIL_PARAMS)
    }

    fn check(&self, params: &ParamMap<'_>) -> Result<(), GenerationError> {
        match params.get_str("domain") {
            Some(domain) if domain.is_empty() || domain.contains('@') => Err(
                GenerationError::InvalidOptions(format!("{}: invalid domain '{domain}'", self.id)),
            ),
            _ => Ok(()),
        }
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        let value = match params.get_str("domain") {
            Some(domain) => {
                let local: String = Username().fake_with_rng(rng);
                format!("{local}@{domain}")
            }
            None => SafeEmail().fake_with_rng(rng),
        };
        Ok(Value::String(value))
    }
}

#[derive(Clone, Copy, Debug)]
enum FakerKind {
    Name,
    FirstName,
    LastName,
    Username,
    Phone,
    Company,
    Address,
    City,
}

/// Parameterless text fakers.
struct FakerGenerator {
    id: &'static str,
    kind: FakerKind,
}

impl Generator for FakerGenerator {
    fn id(&self) -> &str {
        self.id
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        _params: &ParamMap<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        let value: String = match self.kind {
            FakerKind::Name => Name().fake_with_rng(rng),
            FakerKind::FirstName => FirstName().fake_with_rng(rng),
            FakerKind::LastName => LastName().fake_with_rng(rng),
            FakerKind::Username => Username().fake_with_rng(rng),
            FakerKind::Phone => PhoneNumber().fake_with_rng(rng),
            FakerKind::Company => CompanyName().fake_with_rng(rng),
            FakerKind::City => CityName().fake_with_rng(rng),
            FakerKind::Address => {
                let number: String = BuildingNumber().fake_with_rng(rng);
                let street: String = StreetName().fake_with_rng(rng);
                format!("{number} {street}")
            }
        };
        Ok(Value::String(value))
    }
}
