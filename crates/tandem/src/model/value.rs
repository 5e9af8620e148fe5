//! Identified document values.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Opaque identifier of one element of the document tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    pub fn new(id: impl Into<String>) -> Self {
        ElementId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ElementId {
    fn from(id: &str) -> Self {
        ElementId(id.to_string())
    }
}

impl From<String> for ElementId {
    fn from(id: String) -> Self {
        ElementId(id)
    }
}

/// Generates `<prefix>:<counter>` element ids.
///
/// Each participant uses its own prefix (typically its session id), so ids
/// minted concurrently never collide.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    next: u64,
}

impl IdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }

    pub fn next_id(&mut self) -> ElementId {
        let id = ElementId(format!("{}:{}", self.prefix, self.next));
        self.next += 1;
        id
    }
}

/// The payload of a [`DataValue`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DataKind {
    Null,
    String(String),
    Number(f64),
    Boolean(bool),
    /// Milliseconds since the Unix epoch.
    Date(i64),
    Array(Vec<DataValue>),
    Object(IndexMap<String, DataValue>),
}

impl DataKind {
    /// Short type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataKind::Null => "null",
            DataKind::String(_) => "string",
            DataKind::Number(_) => "number",
            DataKind::Boolean(_) => "boolean",
            DataKind::Date(_) => "date",
            DataKind::Array(_) => "array",
            DataKind::Object(_) => "object",
        }
    }
}

/// A value together with the id of the element it becomes in the tree.
///
/// Containers carry identified children, so operations issued later can
/// target any element a value introduced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValue {
    pub id: ElementId,
    #[serde(flatten)]
    pub kind: DataKind,
}

impl DataValue {
    pub fn new(id: ElementId, kind: DataKind) -> Self {
        Self { id, kind }
    }

    pub fn string(id: ElementId, value: impl Into<String>) -> Self {
        Self::new(id, DataKind::String(value.into()))
    }

    pub fn number(id: ElementId, value: f64) -> Self {
        Self::new(id, DataKind::Number(value))
    }

    /// Build an identified value from plain JSON, minting ids depth-first.
    ///
    /// ```
    /// use serde_json::json;
    /// use tandem::model::{DataValue, IdGenerator};
    ///
    /// let mut ids = IdGenerator::new("s1");
    /// let value = DataValue::from_json(&json!({"a": [1, 2]}), &mut ids);
    /// assert_eq!(value.id.as_str(), "s1:0");
    /// assert_eq!(value.to_json(), json!({"a": [1, 2]}));
    /// ```
    pub fn from_json(value: &Value, ids: &mut IdGenerator) -> Self {
        let id = ids.next_id();
        let kind = match value {
            Value::Null => DataKind::Null,
            Value::Bool(b) => DataKind::Boolean(*b),
            Value::Number(n) => DataKind::Number(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => DataKind::String(s.clone()),
            Value::Array(items) => {
                DataKind::Array(items.iter().map(|v| DataValue::from_json(v, ids)).collect())
            }
            Value::Object(map) => DataKind::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), DataValue::from_json(v, ids)))
                    .collect(),
            ),
        };
        Self { id, kind }
    }

    /// Render as plain JSON, dropping ids. Integral numbers render as JSON
    /// integers and dates as epoch milliseconds.
    pub fn to_json(&self) -> Value {
        match &self.kind {
            DataKind::Null => Value::Null,
            DataKind::String(s) => Value::String(s.clone()),
            DataKind::Number(n) => number_to_json(*n),
            DataKind::Boolean(b) => Value::Bool(*b),
            DataKind::Date(ms) => Value::Number(Number::from(*ms)),
            DataKind::Array(items) => Value::Array(items.iter().map(DataValue::to_json).collect()),
            DataKind::Object(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json());
                }
                Value::Object(out)
            }
        }
    }

    /// Visit this value and every nested value, parents first.
    pub fn for_each<F: FnMut(&DataValue)>(&self, f: &mut F) {
        f(self);
        match &self.kind {
            DataKind::Array(items) => items.iter().for_each(|v| v.for_each(f)),
            DataKind::Object(map) => map.values().for_each(|v| v.for_each(f)),
            _ => {}
        }
    }

    /// First non-finite number carried by this value or its descendants.
    pub(crate) fn first_non_finite(&self) -> Option<f64> {
        let mut found = None;
        self.for_each(&mut |v| {
            if let DataKind::Number(n) = v.kind {
                if !n.is_finite() && found.is_none() {
                    found = Some(n);
                }
            }
        });
        found
    }
}

fn number_to_json(n: f64) -> Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}
