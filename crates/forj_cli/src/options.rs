//! Flag and argument options.

use crate::types::{Value, ValueType};

/// Options applied to a flag or argument when it is created in the engine.
///
/// Every option is optional so that [`ForjOpts::merge`] can update an
/// existing parameter without resetting what the caller did not mention.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForjOpts {
    pub required: Option<bool>,
    pub default: Option<String>,
    pub envar: Option<String>,
    pub short: Option<char>,
    pub hidden: Option<bool>,
}

/// Shorthand for `ForjOpts::default()`, reads well in builder chains.
pub fn opts() -> ForjOpts {
    ForjOpts::default()
}

impl ForjOpts {
    pub fn required(mut self) -> Self {
        self.required = Some(true);
        self
    }

    pub fn not_required(mut self) -> Self {
        self.required = Some(false);
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn envar(mut self, name: impl Into<String>) -> Self {
        self.envar = Some(name.into());
        self
    }

    pub fn short(mut self, c: char) -> Self {
        self.short = Some(c);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = Some(true);
        self
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.unwrap_or(false)
    }

    /// Override the options set in `other`, keep the others.
    pub fn merge(&mut self, other: &ForjOpts) {
        if other.required.is_some() {
            self.required = other.required;
        }
        if other.default.is_some() {
            self.default = other.default.clone();
        }
        if other.envar.is_some() {
            self.envar = other.envar.clone();
        }
        if other.short.is_some() {
            self.short = other.short;
        }
        if other.hidden.is_some() {
            self.hidden = other.hidden;
        }
    }

    /// Default value typed for `value_type`, if a default is set.
    pub fn default_for(&self, value_type: ValueType) -> Option<Value> {
        self.default
            .as_deref()
            .map(|raw| Value::parse(value_type, raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_unset_options() {
        let mut base = opts().required().with_default("a").short('a');
        base.merge(&opts().with_default("b"));

        assert!(base.is_required());
        assert_eq!(base.default.as_deref(), Some("b"));
        assert_eq!(base.short, Some('a'));
    }

    #[test]
    fn test_default_for_bool() {
        let o = opts().with_default("true");
        assert_eq!(o.default_for(ValueType::Bool), Some(Value::Bool(true)));
        assert_eq!(opts().default_for(ValueType::String), None);
    }

    #[test]
    fn test_empty_options() {
        let empty = ForjOpts::default();
        assert_eq!(empty, opts());
        assert!(!empty.is_required());
        assert!(!empty.is_hidden());
        assert_eq!(opts().with_default("x").default.as_deref(), Some("x"));
    }
}
