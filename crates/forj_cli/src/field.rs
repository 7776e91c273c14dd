//! Object fields.

use std::collections::BTreeMap;
use std::fmt;

use crate::options::ForjOpts;
use crate::types::ValueType;

/// Regex used when a field is declared without one.
pub const DEFAULT_FIELD_REGEX: &str = ".*";

/// One typed attribute of an object or of an object instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub help: String,
    pub value_type: ValueType,
    /// Regex fragment used when the field appears in a list template.
    pub regex: String,
    pub options: ForjOpts,
    pub key: bool,
    /// Action name -> name of the action-level flag bound to this field.
    pub in_actions: BTreeMap<String, String>,
}

impl Field {
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        value_type: ValueType,
        regex: &str,
        options: Option<ForjOpts>,
    ) -> Self {
        let regex = if regex.is_empty() {
            DEFAULT_FIELD_REGEX
        } else {
            regex
        };
        Self {
            name: name.into(),
            help: help.into(),
            value_type,
            regex: regex.to_string(),
            options: options.unwrap_or_default(),
            key: false,
            in_actions: BTreeMap::new(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "field '{}' ({}){}", self.name, self.value_type, if self.key { " key" } else { "" })?;
        writeln!(f, "  help: '{}'", self.help)?;
        writeln!(f, "  regexp: '{}'", self.regex)?;
        for (action, param) in &self.in_actions {
            writeln!(f, "  in action '{}' as '{}'", action, param)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_regex_defaults() {
        let f = Field::new("name", "help", ValueType::String, "", None);
        assert_eq!(f.regex, DEFAULT_FIELD_REGEX);
        assert!(!f.key);
    }
}
