use std::fs;
use std::path::Path;

use datamask_config::{
    config_json_schema, load_config, validate_config, validate_config_json,
};

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../configs/examples")
        .join(name)
}

#[test]
fn minimal_config_validates() {
    let config = load_config(&fixture("minimal.toml")).expect("load minimal.toml");
    let report = validate_config(&config);
    assert!(report.is_ok(), "unexpected errors: {:?}", report.errors);
    assert!(report.warnings.is_empty(), "unexpected warnings: {:?}", report.warnings);

    let source = config.source("app").expect("app source");
    assert_eq!(source.entities.len(), 3);
    let user = source.entity("App\\Entity\\User").expect("user entity");
    assert_eq!(user.properties.len(), 4);
    assert!(user.to_descriptor().anonymizable);
}

#[test]
fn toml_and_json_fixtures_agree() {
    let from_toml = load_config(&fixture("minimal.toml")).expect("load toml");
    let from_json = load_config(&fixture("minimal.json")).expect("load json");
    assert_eq!(
        serde_json::to_value(&from_toml).expect("toml to json"),
        serde_json::to_value(&from_json).expect("json to json")
    );
}

#[test]
fn json_fixture_passes_structural_validation() {
    let contents = fs::read_to_string(fixture("minimal.json")).expect("read minimal.json");
    let config_json: serde_json::Value = serde_json::from_str(&contents).expect("parse json");
    let report = validate_config_json(&config_json).expect("compile config schema");
    assert!(report.errors.is_empty(), "structural errors: {:?}", report.errors);
}

#[test]
fn structural_validation_rejects_wrong_types() {
    let config_json = serde_json::json!({
        "batch_size": "many",
        "sources": [{ "id": "app", "entities": [{ "id": "x" }] }]
    });
    let report = validate_config_json(&config_json).expect("compile config schema");
    assert!(!report.errors.is_empty());
    assert!(report.errors.iter().all(|issue| issue.code == "schema_violation"));
}

#[test]
fn json_schema_describes_root_fields() {
    let schema = serde_json::to_value(config_json_schema()).expect("serialize schema");
    let properties = schema
        .get("properties")
        .and_then(|value| value.as_object())
        .expect("root properties");
    let keys = [
        "config_version",
        "seed",
        "batch_size",
        "dry_run",
        "generator_options",
        "sources",
    ];
    for key in keys {
        assert!(properties.contains_key(key), "missing {key}");
    }
}

#[test]
fn rejects_unknown_extension() {
    let dir = std::env::temp_dir().join(format!("datamask_config_{}", std::process::id()));
    fs::create_dir_all(&dir).expect("create temp dir");
    let path = dir.join("config.yaml");
    fs::write(&path, "sources: []").expect("write yaml");
    assert!(load_config(&path).is_err());
}
