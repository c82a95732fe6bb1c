use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row/document as read from storage: column name to scalar value.
///
/// Related (joined) data may appear either as a flat key containing a dot
/// (`type.name`) or as a nested object (`type: { name: ... }`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(column.into(), value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Overlay a set of column updates onto this record.
    pub fn apply<'a>(&mut self, updates: impl IntoIterator<Item = (&'a String, &'a Value)>) {
        for (column, value) in updates {
            self.0.insert(column.clone(), value.clone());
        }
    }

    /// Resolve a field reference, supporting dot notation.
    ///
    /// A flat key with the dot in it wins; otherwise the prefix is treated as
    /// a nested object and the remainder is resolved inside it.
    pub fn resolve(&self, field: &str) -> Option<&Value> {
        if let Some(value) = self.0.get(field) {
            return Some(value);
        }
        let (head, tail) = field.split_once('.')?;
        resolve_nested(self.0.get(head)?, tail)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

fn resolve_nested<'a>(value: &'a Value, field: &str) -> Option<&'a Value> {
    let object = value.as_object()?;
    if let Some(value) = object.get(field) {
        return Some(value);
    }
    let (head, tail) = field.split_once('.')?;
    resolve_nested(object.get(head)?, tail)
}

impl From<Map<String, Value>> for Record {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

impl TryFrom<Value> for Record {
    type Error = crate::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(crate::Error::Other(format!(
                "record must be a JSON object, got {other}"
            ))),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
