//! Value store: parsed object data, keyed by object and instance.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::types::Value;

/// Reserved attribute naming the action that produced a record.
pub const ACTION_ATTR: &str = "action";

/// Action recorded on records created while the schema is declared.
pub const SETUP_ACTION: &str = "setup";

/// One attribute of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attr {
    /// `None` when the field is known but has no value yet.
    pub value: Option<Value>,
    pub is_default: bool,
}

/// A value returned by the store, with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub is_default: bool,
}

/// Attributes of one object instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForjRecord {
    attrs: BTreeMap<String, Attr>,
}

impl ForjRecord {
    pub fn set(&mut self, field: &str, value: Option<Value>, is_default: bool) {
        self.attrs
            .insert(field.to_string(), Attr { value, is_default });
    }

    pub fn get(&self, field: &str) -> Option<&Attr> {
        self.attrs.get(field)
    }

    pub fn attrs(&self) -> &BTreeMap<String, Attr> {
        &self.attrs
    }

    pub fn action(&self) -> Option<&str> {
        self.attrs
            .get(ACTION_ATTR)
            .and_then(|a| a.value.as_ref())
            .and_then(Value::as_str)
    }

    pub fn set_action(&mut self, action: &str) {
        self.set(ACTION_ATTR, Some(Value::from(action)), false);
    }
}

/// All records of one object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForjRecords {
    records: BTreeMap<String, ForjRecord>,
}

impl ForjRecords {
    pub fn record(&self, key: &str) -> Option<&ForjRecord> {
        self.records.get(key)
    }

    pub fn record_mut(&mut self, key: &str) -> &mut ForjRecord {
        self.records.entry(key.to_string()).or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Attribute `field` of record `key`.
    ///
    /// An empty key selects the only record, if there is exactly one.
    pub fn get(&self, key: &str, field: &str) -> Option<&Attr> {
        let record = if key.is_empty() && self.records.len() == 1 {
            self.records.values().next()
        } else {
            self.records.get(key)
        };
        record?.get(field)
    }
}

impl fmt::Display for ForjRecords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, record) in &self.records {
            writeln!(f, "{}:", key)?;
            for (name, attr) in &record.attrs {
                match &attr.value {
                    Some(v) if attr.is_default => writeln!(f, "  {}: {} (default)", name, v)?,
                    Some(v) => writeln!(f, "  {}: {}", name, v)?,
                    None => writeln!(f, "  {}: -", name)?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_write_overwrites_single_attribute() {
        let mut records = ForjRecords::default();
        let r = records.record_mut("infra");
        r.set("title", Some(Value::from("a")), true);
        r.set("flow", Some(Value::from("b")), false);
        records.record_mut("infra").set("title", Some(Value::from("c")), false);

        let title = records.get("infra", "title").unwrap();
        assert_eq!(title.value, Some(Value::from("c")));
        assert!(!title.is_default);
        assert!(records.get("infra", "flow").is_some());
    }

    #[test]
    fn test_empty_key_selects_single_record() {
        let mut records = ForjRecords::default();
        records.record_mut("only").set_action("update");
        assert_eq!(
            records.get("", ACTION_ATTR).and_then(|a| a.value.clone()),
            Some(Value::from("update"))
        );

        records.record_mut("second");
        assert!(records.get("", ACTION_ATTR).is_none());
    }
}
