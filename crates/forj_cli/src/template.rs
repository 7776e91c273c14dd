//! Object list template compiler.
//!
//! A list template describes how one element of a packed list is laid out,
//! using object field names and `[...]` for optional parts:
//!
//! ```text
//! instance[:driver[:type]]
//! ```
//!
//! Grammar:
//!
//! ```text
//! template := item*
//! item     := '[' template ']'     optional group
//!           | '\' CHAR             escaped literal
//!           | IDENT                field reference
//!           | CHAR                 literal
//! ```
//!
//! Each field becomes a named capture group wrapping the field regex, so
//! capture groups inside a field regex never shift field numbering.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

use regex::{Captures, Regex};

use crate::error::{CliError, CliResult};

const PLACEHOLDER: &str = r"\{\{(f[0-9]+)\}\}";

/// A compiled list template.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    pub sample: String,
    /// Final regex text, anchored.
    pub pattern: String,
    pub regex: Regex,
    /// Capture group index -> field name.
    pub fields: BTreeMap<usize, String>,
}

impl CompiledTemplate {
    /// Field values found in `element`, or `None` when it does not match.
    pub fn decode(&self, element: &str) -> Option<BTreeMap<String, String>> {
        let caps = self.regex.captures(element)?;
        let mut data = BTreeMap::new();
        for (index, field) in &self.fields {
            if let Some(m) = caps.get(*index) {
                data.insert(field.clone(), m.as_str().to_string());
            }
        }
        Some(data)
    }

    pub fn captures_field(&self, field: &str) -> bool {
        self.fields.values().any(|f| f == field)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Literal(char),
    Field(String),
    Optional(Vec<Node>),
}

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// True if `[` and `]` are balanced, escaped ones excluded.
pub fn has_valid_brackets(sample: &str) -> bool {
    let mut depth: i32 = 0;
    let mut chars = sample.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn sequence(&mut self, nested: bool) -> Result<Vec<Node>, String> {
        let mut nodes = Vec::new();
        loop {
            match self.chars.peek().copied() {
                None if nested => return Err("missing ']'".to_string()),
                None => return Ok(nodes),
                Some(']') if nested => {
                    self.chars.next();
                    return Ok(nodes);
                }
                Some(']') => return Err("unexpected ']'".to_string()),
                Some('[') => {
                    self.chars.next();
                    nodes.push(Node::Optional(self.sequence(true)?));
                }
                Some('\\') => {
                    self.chars.next();
                    match self.chars.next() {
                        Some(c) => nodes.push(Node::Literal(c)),
                        None => return Err("trailing escape character".to_string()),
                    }
                }
                Some(c) if is_ident(c) => {
                    let mut ident = String::new();
                    while let Some(c) = self.chars.peek().copied().filter(|c| is_ident(*c)) {
                        ident.push(c);
                        self.chars.next();
                    }
                    nodes.push(Node::Field(ident));
                }
                Some(c) => {
                    self.chars.next();
                    nodes.push(Node::Literal(c));
                }
            }
        }
    }
}

/// Expand `#key` capture shortcuts. `##` stands for a literal `#`.
///
/// The longest registered key wins when several keys share a prefix.
pub fn expand_captures(pattern: &str, captures: &BTreeMap<String, String>) -> String {
    let mut keys: Vec<&String> = captures.keys().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(pos) = rest.find('#') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if let Some(stripped) = after.strip_prefix('#') {
            out.push('#');
            rest = stripped;
            continue;
        }
        match keys.iter().find(|k| after.starts_with(k.as_str())) {
            Some(key) => {
                out.push_str(&captures[key.as_str()]);
                rest = &after[key.len()..];
            }
            None => {
                out.push('#');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Compile `sample` against the fields of an object.
///
/// `field_regex` gives the regex of a field, or `None` if the object has no
/// such field. `captures` holds the registered `#key` shortcuts.
pub fn compile<'f, F>(
    sample: &str,
    field_regex: F,
    captures: &BTreeMap<String, String>,
) -> CliResult<CompiledTemplate>
where
    F: Fn(&str) -> Option<&'f str>,
{
    if !has_valid_brackets(sample) {
        return Err(CliError::UnbalancedBrackets(sample.to_string()));
    }

    let nodes = Parser {
        chars: sample.chars().peekable(),
    }
    .sequence(false)
    .map_err(|message| CliError::InvalidTemplate {
        template: sample.to_string(),
        message,
    })?;

    let mut names: Vec<String> = Vec::new();
    let mut skeleton = String::new();
    emit(&nodes, sample, &mut names, &mut skeleton)?;

    let mut fragments = BTreeMap::new();
    for (index, name) in names.iter().enumerate() {
        let regex = field_regex(name).ok_or_else(|| CliError::UnknownListField {
            template: sample.to_string(),
            field: name.clone(),
        })?;
        fragments.insert(
            format!("f{}", index),
            format!("(?P<f{}>{})", index, expand_captures(regex, captures)),
        );
    }

    let body = render(&skeleton, &fragments)?;
    let pattern = format!("^(?:{})$", body);
    let regex = Regex::new(&pattern).map_err(|source| CliError::InvalidRegex {
        pattern: pattern.clone(),
        source,
    })?;

    let mut fields = BTreeMap::new();
    for (group, name) in regex.capture_names().enumerate() {
        let Some(index) = name.and_then(|n| n.strip_prefix('f')).and_then(|n| n.parse::<usize>().ok()) else {
            continue;
        };
        if let Some(field) = names.get(index) {
            fields.insert(group, field.clone());
        }
    }

    Ok(CompiledTemplate {
        sample: sample.to_string(),
        pattern,
        regex,
        fields,
    })
}

fn emit(nodes: &[Node], sample: &str, names: &mut Vec<String>, out: &mut String) -> CliResult<()> {
    for node in nodes {
        match node {
            Node::Literal(c) => out.push_str(&regex::escape(&c.to_string())),
            Node::Field(name) => {
                if names.contains(name) {
                    return Err(CliError::InvalidTemplate {
                        template: sample.to_string(),
                        message: format!("field '{}' is used more than once", name),
                    });
                }
                out.push_str(&format!("{{{{f{}}}}}", names.len()));
                names.push(name.clone());
            }
            Node::Optional(inner) => {
                out.push_str("(?:");
                emit(inner, sample, names, out)?;
                out.push_str(")?");
            }
        }
    }
    Ok(())
}

fn render(skeleton: &str, fragments: &BTreeMap<String, String>) -> CliResult<String> {
    let placeholder = Regex::new(PLACEHOLDER).map_err(|source| CliError::InvalidRegex {
        pattern: PLACEHOLDER.to_string(),
        source,
    })?;
    Ok(placeholder
        .replace_all(skeleton, |caps: &Captures| {
            fragments.get(&caps[1]).cloned().unwrap_or_default()
        })
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const W_F: &str = "[a-z]+[a-z0-9_-]*";

    fn abc(name: &str) -> Option<&'static str> {
        match name {
            "a" | "b" | "c" => Some(W_F),
            _ => None,
        }
    }

    #[test]
    fn test_brackets() {
        assert!(has_valid_brackets("a[:b[:c]]"));
        assert!(has_valid_brackets(r"a\[b"));
        assert!(!has_valid_brackets("a[:b"));
        assert!(!has_valid_brackets("a]:b["));
    }

    #[test]
    fn test_unbalanced_fails_first() {
        let err = compile("a[:zz", abc, &BTreeMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid syntax. square delimiter error in a[:zz.");
    }

    #[test]
    fn test_nested_optional_round_trip() {
        let t = compile("a[:b[:c]]", abc, &BTreeMap::new()).unwrap();

        let full = t.decode("x:y:z").unwrap();
        assert_eq!(full.len(), 3);
        assert_eq!(full["a"], "x");
        assert_eq!(full["b"], "y");
        assert_eq!(full["c"], "z");

        let only = t.decode("x").unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only["a"], "x");

        assert!(t.decode("X:y").is_none());
    }

    #[test]
    fn test_unknown_and_duplicate_fields() {
        let err = compile("a:d", abc, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, CliError::UnknownListField { ref field, .. } if field == "d"));

        let err = compile("a:a", abc, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, CliError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_field_regex_groups_do_not_shift_fields() {
        let mut captures = BTreeMap::new();
        captures.insert("w".to_string(), format!("({})", W_F));
        let t = compile("a[:b]", |_| Some("#w"), &captures).unwrap();

        let data = t.decode("x:y").unwrap();
        assert_eq!(data["a"], "x");
        assert_eq!(data["b"], "y");
    }

    #[test]
    fn test_escaped_literals() {
        let t = compile(r"a\[b\]", abc, &BTreeMap::new()).unwrap();
        assert!(t.captures_field("a"));
        assert!(t.captures_field("b"));
        assert_eq!(t.decode("x[y]").unwrap()["b"], "y");
    }

    #[test]
    fn test_expand_captures() {
        let mut captures = BTreeMap::new();
        captures.insert("w".to_string(), "(W)".to_string());
        captures.insert("wx".to_string(), "(WX)".to_string());

        assert_eq!(expand_captures("#w-#wx", &captures), "(W)-(WX)");
        assert_eq!(expand_captures("##w", &captures), "#w");
        assert_eq!(expand_captures("#z", &captures), "#z");
    }
}
