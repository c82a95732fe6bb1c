//! Inclusion/exclusion pattern matching over flat records.
//!
//! A [`PatternConfig`] is either a single [`PatternSet`] (every field rule must
//! match) or a list of sets (any set may match). Rule strings support a small
//! operator language:
//!
//! - `>=`, `<=`, `>`, `<` compare numerically against the remaining literal;
//! - `!=`/`<>` and `=` compare loosely against the remaining literal;
//! - `%` and `_` turn the rule into a case-insensitive, anchored LIKE match;
//! - `a|b` matches when the value contains or equals any alternative;
//! - anything else is loose equality.
//!
//! Configurations are compiled once into a [`PatternMatcher`] so malformed
//! rules surface before any record is evaluated.

use std::collections::BTreeMap;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::loose;
use crate::record::Record;

/// One field's rule: a single rule string or a list of alternatives (OR).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RuleSpec {
    One(String),
    AnyOf(Vec<String>),
}

impl RuleSpec {
    pub fn rules(&self) -> &[String] {
        match self {
            RuleSpec::One(rule) => std::slice::from_ref(rule),
            RuleSpec::AnyOf(rules) => rules,
        }
    }
}

impl From<&str> for RuleSpec {
    fn from(value: &str) -> Self {
        RuleSpec::One(value.to_string())
    }
}

/// Field to rule mapping; all entries must match (AND).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct PatternSet(pub BTreeMap<String, RuleSpec>);

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, rule: impl Into<RuleSpec>) -> Self {
        self.0.insert(field.into(), rule.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RuleSpec)> {
        self.0.iter()
    }
}

/// Include or exclude configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PatternConfig {
    /// OR across sets, each AND-combined internally.
    AnyOf(Vec<PatternSet>),
    Set(PatternSet),
}

impl Default for PatternConfig {
    fn default() -> Self {
        PatternConfig::Set(PatternSet::default())
    }
}

impl PatternConfig {
    pub fn is_empty(&self) -> bool {
        match self {
            PatternConfig::AnyOf(sets) => sets.is_empty(),
            PatternConfig::Set(set) => set.is_empty(),
        }
    }

    /// Sets in declaration order, whatever the shape.
    pub fn sets(&self) -> &[PatternSet] {
        match self {
            PatternConfig::AnyOf(sets) => sets,
            PatternConfig::Set(set) => std::slice::from_ref(set),
        }
    }
}

impl From<PatternSet> for PatternConfig {
    fn from(value: PatternSet) -> Self {
        PatternConfig::Set(value)
    }
}

impl From<Vec<PatternSet>> for PatternConfig {
    fn from(value: Vec<PatternSet>) -> Self {
        PatternConfig::AnyOf(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Gte,
    Lte,
    Gt,
    Lt,
}

#[derive(Debug, Clone)]
enum Rule {
    Compare(CompareOp, f64),
    NotEqual(String),
    Equal(String),
    Like(Regex),
    Alternatives(Vec<String>),
    Exact(String),
}

impl Rule {
    fn parse(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(Error::InvalidPattern("rule must not be empty".to_string()));
        }

        let operators: [(&str, fn(&str) -> Rule); 7] = [
            (">=", |rest| Rule::Compare(CompareOp::Gte, loose::leading_number(rest))),
            ("<=", |rest| Rule::Compare(CompareOp::Lte, loose::leading_number(rest))),
            ("<>", |rest| Rule::NotEqual(rest.trim().to_string())),
            ("!=", |rest| Rule::NotEqual(rest.trim().to_string())),
            (">", |rest| Rule::Compare(CompareOp::Gt, loose::leading_number(rest))),
            ("<", |rest| Rule::Compare(CompareOp::Lt, loose::leading_number(rest))),
            ("=", |rest| Rule::Equal(rest.trim().to_string())),
        ];
        for (prefix, build) in operators {
            if let Some(rest) = text.strip_prefix(prefix) {
                return Ok(build(rest));
            }
        }

        if has_wildcard(text) {
            return Ok(Rule::Like(like_regex(text)?));
        }

        if text.contains('|') {
            let alternatives = text.split('|').map(str::to_string).collect();
            return Ok(Rule::Alternatives(alternatives));
        }

        Ok(Rule::Exact(text.to_string()))
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Rule::Compare(op, operand) => {
                let lhs = loose::to_number(value);
                match op {
                    CompareOp::Gte => lhs >= *operand,
                    CompareOp::Lte => lhs <= *operand,
                    CompareOp::Gt => lhs > *operand,
                    CompareOp::Lt => lhs < *operand,
                }
            }
            Rule::NotEqual(literal) => !loose::loose_eq(value, literal),
            Rule::Equal(literal) | Rule::Exact(literal) => loose::loose_eq(value, literal),
            Rule::Like(regex) => loose::to_text(value).is_some_and(|text| regex.is_match(&text)),
            Rule::Alternatives(alternatives) => {
                let Some(text) = loose::to_text(value) else {
                    return false;
                };
                alternatives
                    .iter()
                    .any(|needle| text.contains(needle.as_str()))
            }
        }
    }
}

fn has_wildcard(text: &str) -> bool {
    text.contains('%') || text.contains('_')
}

/// Translate a SQL LIKE pattern into an anchored, case-insensitive regex.
fn like_regex(pattern: &str) -> Result<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push_str("(?is)^");
    let mut buf = [0_u8; 4];
    for ch in pattern.chars() {
        match ch {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    source.push('$');
    Regex::new(&source).map_err(|err| Error::InvalidPattern(format!("'{pattern}': {err}")))
}

#[derive(Debug, Clone)]
struct FieldRule {
    field: String,
    rules: Vec<Rule>,
}

impl FieldRule {
    fn matches(&self, record: &Record) -> bool {
        match record.resolve(&self.field) {
            Some(value) => self.rules.iter().any(|rule| rule.matches(value)),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct CompiledSet {
    fields: Vec<FieldRule>,
}

impl CompiledSet {
    fn compile(set: &PatternSet) -> Result<Self> {
        let mut fields = Vec::with_capacity(set.0.len());
        for (field, spec) in set.iter() {
            if field.trim().is_empty() {
                return Err(Error::InvalidPattern(
                    "pattern field name must not be empty".to_string(),
                ));
            }
            if spec.rules().is_empty() {
                return Err(Error::InvalidPattern(format!(
                    "field '{field}' has an empty rule list"
                )));
            }
            let rules = spec
                .rules()
                .iter()
                .map(|rule| {
                    Rule::parse(rule).map_err(|err| match err {
                        Error::InvalidPattern(msg) => {
                            Error::InvalidPattern(format!("field '{field}': {msg}"))
                        }
                        other => other,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            fields.push(FieldRule {
                field: field.clone(),
                rules,
            });
        }
        Ok(Self { fields })
    }

    fn matches(&self, record: &Record) -> bool {
        self.fields.iter().all(|field| field.matches(record))
    }
}

#[derive(Debug, Clone)]
enum CompiledConfig {
    Empty,
    Set(CompiledSet),
    AnyOf(Vec<CompiledSet>),
}

impl CompiledConfig {
    fn compile(config: &PatternConfig) -> Result<Self> {
        if config.is_empty() {
            return Ok(CompiledConfig::Empty);
        }
        match config {
            PatternConfig::Set(set) => Ok(CompiledConfig::Set(CompiledSet::compile(set)?)),
            PatternConfig::AnyOf(sets) => Ok(CompiledConfig::AnyOf(
                sets.iter()
                    .map(CompiledSet::compile)
                    .collect::<Result<Vec<_>>>()?,
            )),
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, CompiledConfig::Empty)
    }

    fn matches(&self, record: &Record) -> bool {
        match self {
            CompiledConfig::Empty => false,
            CompiledConfig::Set(set) => set.matches(record),
            CompiledConfig::AnyOf(sets) => sets.iter().any(|set| set.matches(record)),
        }
    }
}

/// Compiled include/exclude pair.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    include: CompiledConfig,
    exclude: CompiledConfig,
}

impl PatternMatcher {
    /// Compile include and exclude configurations.
    pub fn compile(include: &PatternConfig, exclude: &PatternConfig) -> Result<Self> {
        Ok(Self {
            include: CompiledConfig::compile(include)?,
            exclude: CompiledConfig::compile(exclude)?,
        })
    }

    /// Matcher that accepts every record.
    pub fn accept_all() -> Self {
        Self {
            include: CompiledConfig::Empty,
            exclude: CompiledConfig::Empty,
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Exclusion wins; an empty include set admits everything not excluded.
    pub fn matches(&self, record: &Record) -> bool {
        if !self.exclude.is_empty() && self.exclude.matches(record) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.matches(record)
    }
}

/// One-shot evaluation of include/exclude configurations against a record.
pub fn matches(record: &Record, include: &PatternConfig, exclude: &PatternConfig) -> Result<bool> {
    Ok(PatternMatcher::compile(include, exclude)?.matches(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::try_from(value).expect("object record")
    }

    fn set(pairs: &[(&str, &str)]) -> PatternConfig {
        let mut set = PatternSet::new();
        for (field, rule) in pairs {
            set = set.with(*field, *rule);
        }
        PatternConfig::Set(set)
    }

    fn rule_matches(rule: &str, value: Value) -> bool {
        let row = record(json!({ "field": value }));
        matches(&row, &set(&[("field", rule)]), &PatternConfig::default()).expect("compile")
    }

    #[test]
    fn empty_configs_are_neutral() {
        let row = record(json!({ "a": 1 }));
        let empty = PatternConfig::default();
        assert!(matches(&row, &empty, &empty).expect("compile"));
        assert!(matches(&row, &PatternConfig::AnyOf(Vec::new()), &empty).expect("compile"));
        assert!(PatternMatcher::accept_all().is_neutral());
    }

    #[test]
    fn exclusion_wins_over_inclusion() {
        let row = record(json!({ "status": "active", "role": "admin" }));
        let include = set(&[("status", "active")]);
        let exclude = set(&[("role", "admin")]);
        assert!(!matches(&row, &include, &exclude).expect("compile"));
        assert!(!matches(&row, &PatternConfig::default(), &exclude).expect("compile"));
    }

    #[test]
    fn or_of_and_groups() {
        let include = PatternConfig::AnyOf(vec![
            PatternSet::new().with("a", "1"),
            PatternSet::new().with("b", "2"),
        ]);
        let exclude = PatternConfig::default();
        assert!(matches(&record(json!({ "a": 1, "b": 9 })), &include, &exclude).expect("compile"));
        assert!(!matches(&record(json!({ "a": 9, "b": 9 })), &include, &exclude).expect("compile"));
    }

    #[test]
    fn set_requires_every_field() {
        let include = set(&[("a", "1"), ("b", "2")]);
        let exclude = PatternConfig::default();
        assert!(matches(&record(json!({ "a": "1", "b": "2" })), &include, &exclude).expect("ok"));
        assert!(!matches(&record(json!({ "a": "1", "b": "3" })), &include, &exclude).expect("ok"));
    }

    #[test]
    fn wildcard_translation() {
        assert!(rule_matches("%@test.com", json!("john@test.com")));
        assert!(rule_matches("%@TEST.com", json!("john@test.com")));
        assert!(!rule_matches("%@test.com", json!("john@test.org")));
        assert!(rule_matches("a_c", json!("abc")));
        assert!(!rule_matches("a_c", json!("ac")));
        assert!(rule_matches("a.c%", json!("a.cde")));
        assert!(!rule_matches("a.c%", json!("abcde")));
    }

    #[test]
    fn pipe_alternation() {
        let rule = "inactive|unsubscribed";
        assert!(rule_matches(rule, json!("inactive")));
        assert!(rule_matches(rule, json!("unsubscribed")));
        assert!(rule_matches(rule, json!("user_unsubscribed_2024")));
        assert!(!rule_matches(rule, json!("active")));
    }

    #[test]
    fn wildcard_takes_precedence_over_pipe() {
        assert!(rule_matches("a%|b", json!("aX|b")));
        assert!(!rule_matches("a%|b", json!("b")));
    }

    #[test]
    fn comparison_operators() {
        assert!(rule_matches(">=100", json!(150)));
        assert!(!rule_matches(">=100", json!(50)));
        assert!(rule_matches("<50", json!(10)));
        assert!(!rule_matches("<50", json!(100)));
        assert!(rule_matches(">10", json!("11")));
        assert!(rule_matches("<=0", json!("abc")));
        assert!(!rule_matches(">0", Value::Null));
    }

    #[test]
    fn equality_operators_are_loose() {
        assert!(rule_matches("=5", json!("5.0")));
        assert!(rule_matches("=5", json!(5)));
        assert!(rule_matches("!=5", json!(6)));
        assert!(rule_matches("<>active", json!("inactive")));
        assert!(!rule_matches("<>active", json!("active")));
        assert!(rule_matches("active", json!("active")));
        assert!(!rule_matches("active", json!("Active")));
    }

    #[test]
    fn rule_lists_are_or() {
        let mut set = PatternSet::new();
        set.0.insert(
            "status".to_string(),
            RuleSpec::AnyOf(vec!["pending".to_string(), "banned".to_string()]),
        );
        let include = PatternConfig::Set(set);
        let empty = PatternConfig::default();
        assert!(matches(&record(json!({ "status": "banned" })), &include, &empty).expect("ok"));
        assert!(!matches(&record(json!({ "status": "active" })), &include, &empty).expect("ok"));
    }

    #[test]
    fn missing_fields_never_match() {
        let include = set(&[("type.name", "HR")]);
        let exclude = set(&[("type.name", "HR")]);
        let empty = PatternConfig::default();
        let row = record(json!({ "id": 1 }));
        assert!(!matches(&row, &include, &empty).expect("ok"));
        assert!(matches(&row, &empty, &exclude).expect("ok"));
        assert!(!matches(&row, &set(&[("type.name", "!=HR")]), &empty).expect("ok"));
    }

    #[test]
    fn relation_fields_resolve_through_nesting() {
        let include = set(&[("type.name", "HR")]);
        let empty = PatternConfig::default();
        let nested = record(json!({ "type": { "name": "HR" } }));
        let flat = record(json!({ "type.name": "HR" }));
        assert!(matches(&nested, &include, &empty).expect("ok"));
        assert!(matches(&flat, &include, &empty).expect("ok"));
    }

    #[test]
    fn rejects_malformed_rules() {
        let empty = PatternConfig::default();
        assert!(PatternMatcher::compile(&set(&[("status", "")]), &empty).is_err());
        assert!(PatternMatcher::compile(&set(&[("", "x")]), &empty).is_err());
        let mut blank = PatternSet::new();
        blank.0.insert("status".to_string(), RuleSpec::AnyOf(Vec::new()));
        assert!(PatternMatcher::compile(&empty, &PatternConfig::Set(blank)).is_err());
    }

    #[test]
    fn deserializes_both_shapes() {
        let single: PatternConfig =
            serde_json::from_value(json!({ "status": ["a", "b"], "email": "%@x.io" }))
                .expect("single set");
        assert!(matches!(single, PatternConfig::Set(_)));
        let many: PatternConfig =
            serde_json::from_value(json!([{ "a": "1" }, { "b": "2" }])).expect("list");
        assert_eq!(many.sets().len(), 2);
    }
}
