//! Value types shared by the engine adapter, parameters and the value store.

use serde::{Deserialize, Serialize};

/// Data type of a field or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    String,
    Bool,
    /// A packed object list, carried as a string on the command line.
    List,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::List => "list",
        }
    }

    /// Bool values are switches; everything else takes a string value.
    pub fn is_switch(&self) -> bool {
        matches!(self, Self::Bool)
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed value held by a parameter or a record attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    String(String),
}

impl Value {
    /// Build a value of the given type from its command-line text.
    pub fn parse(value_type: ValueType, raw: &str) -> Self {
        match value_type {
            ValueType::Bool => Self::Bool(matches!(
                raw.to_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            )),
            ValueType::String | ValueType::List => Self::String(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::String(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Where a parsed value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    CommandLine,
    Env,
    Default,
}

/// A value found in a parse context.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedValue {
    pub value: Value,
    pub source: ValueSource,
}

impl ParsedValue {
    pub fn explicit(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            source: ValueSource::CommandLine,
        }
    }

    pub fn default_value(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            source: ValueSource::Default,
        }
    }

    /// True if nobody supplied the value at parse time.
    pub fn is_default(&self) -> bool {
        self.source == ValueSource::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_parse() {
        assert_eq!(Value::parse(ValueType::Bool, "true"), Value::Bool(true));
        assert_eq!(Value::parse(ValueType::Bool, "no"), Value::Bool(false));
        assert_eq!(
            Value::parse(ValueType::List, "a,b"),
            Value::String("a,b".to_string())
        );
    }

    #[test]
    fn test_value_as_bool_from_string() {
        assert_eq!(Value::from("true").as_bool(), Some(true));
        assert_eq!(Value::from("maybe").as_bool(), None);
    }
}
