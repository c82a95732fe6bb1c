use datamask_core::{EntityDescriptor, PatternConfig, PatternSet, PropertyDescriptor, Record};
use serde_json::json;

#[test]
fn serializes_entity_descriptor_deterministically() {
    let mut entity = EntityDescriptor::new("App\\Entity\\User", "users");
    entity.exclude = PatternConfig::Set(PatternSet::new().with("role", "admin"));

    let json = serde_json::to_string_pretty(&entity).expect("serialize entity");
    let expected = r#"{
  "id": "App\\Entity\\User",
  "table": "users",
  "identifiers": [
    "id"
  ],
  "exclude": {
    "role": "admin"
  },
  "anonymizable": true
}"#;
    assert_eq!(json, expected);
}

#[test]
fn property_descriptor_defaults_from_minimal_json() {
    let property: PropertyDescriptor = serde_json::from_value(json!({
        "field": "email",
        "column": "email_address",
        "generator": "email"
    }))
    .expect("parse property");

    assert_eq!(property.weight, None);
    assert!(property.options.is_empty());
    assert!(property.include.is_empty());
    assert!(property.exclude.is_empty());
}

#[test]
fn patterns_parse_from_toml() {
    let source = r#"
include = [{ status = "active" }, { status = ["pending", "trial"], "type.name" = "%corp%" }]
exclude = { email = "%@internal.test" }
"#;

    #[derive(serde::Deserialize)]
    struct Gates {
        include: PatternConfig,
        exclude: PatternConfig,
    }

    let gates: Gates = toml::from_str(source).expect("parse toml");
    assert_eq!(gates.include.sets().len(), 2);
    assert_eq!(gates.exclude.sets().len(), 1);

    let row = Record::try_from(json!({
        "status": "trial",
        "type": { "name": "MegaCorp Ltd" },
        "email": "x@example.com"
    }))
    .expect("record");
    assert!(datamask_core::matches(&row, &gates.include, &gates.exclude).expect("compile"));
}
