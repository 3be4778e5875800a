use rust_decimal::Decimal;
use serde_json::Value;
use std::fmt;

/// A single request parameter value.
///
/// The canonical signing rules require a stable textual rendering of every
/// value: `Decimal` keeps exact numeric values without ever producing
/// exponent notation, which the exchange's parser rejects.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    UInt(u64),
    Decimal(Decimal),
    Bool(bool),
    /// Nested structure, passed through verbatim in JSON bodies.
    Json(Value),
}

impl ParamValue {
    /// JSON representation used in non-GET request bodies.
    ///
    /// Decimals become JSON strings: Bybit's V5 API takes all prices and
    /// quantities as strings, and the string form round-trips exactly.
    pub fn to_json_value(&self) -> Value {
        match self {
            Self::Str(s) => Value::String(s.clone()),
            Self::Int(n) => Value::from(*n),
            Self::UInt(n) => Value::from(*n),
            Self::Decimal(d) => Value::String(d.to_string()),
            Self::Bool(b) => Value::Bool(*b),
            Self::Json(v) => v.clone(),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{}", n),
            Self::UInt(n) => write!(f, "{}", n),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for ParamValue {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        Self::UInt(u64::from(v))
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Decimal> for ParamValue {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<Value> for ParamValue {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

/// Insertion-ordered request parameter map.
///
/// Keys behave like a map (inserting an existing key replaces its value) but
/// iteration preserves insertion order. The canonical query string sorts keys
/// itself, so callers never need to care about ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, replacing any existing value under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Canonical query string: keys in ascending lexicographic byte order,
    /// keys and values percent-encoded. Empty map encodes to the empty
    /// string. The server re-derives this exact form when verifying the
    /// request signature.
    pub fn to_query(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }

        let mut pairs: Vec<(&str, String)> = self
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.to_string()))
            .collect();
        pairs.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in pairs {
            serializer.append_pair(key, &value);
        }
        serializer.finish()
    }

    /// JSON object representation used for non-GET request bodies.
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (key, value) in &self.entries {
            map.insert(key.clone(), value.to_json_value());
        }
        Value::Object(map)
    }

    /// Compact JSON body, the literal `{}` when no parameters are present.
    /// This exact string is both signed and transmitted.
    pub fn to_body(&self) -> String {
        if self.entries.is_empty() {
            "{}".to_string()
        } else {
            self.to_json().to_string()
        }
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}
