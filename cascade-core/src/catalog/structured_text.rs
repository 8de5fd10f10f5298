//! Two-level structured-text parser for bundle manifests and document headers
//!
//! Bundle manifests (`bundle.yaml`) and the `---` headers of customization
//! documents are authored in-house and only ever use a small subset of YAML.
//! This module reads exactly that subset:
//!
//! ```text
//! name: Frontend Team                 # indent 0, scalar
//! tags: [react, "typescript"]         # indent 0, bracketed list
//! metadata:                           # indent 0, opens a mapping
//!   team_size: 5                      # indent 2, scalar in mapping
//! dependencies:
//!   rules:                            # indent 2, opens a sequence
//!     - path: language/typescript.md  # item mapping
//!       activation: always_on         # indent >= 4, continues the item
//!     - plain-scalar                  # scalar item
//! ```
//!
//! Nesting depth is taken from the raw indentation (0, 2, and 4 or more)
//! rather than from an indent stack. Deeper documents are not supported and
//! degrade by having their lines absorbed into the nearest open collection
//! or dropped. Parsing never fails.

use serde::Serialize;
use std::collections::BTreeMap;

/// A parsed mapping, keyed by field name
pub type Mapping = BTreeMap<String, Value>;

/// A value in the structured-text dialect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(String),
    List(Vec<Value>),
    Map(Mapping),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key when this value is a mapping
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Flatten a scalar or list of scalars into strings
    pub fn to_string_list(&self) -> Vec<String> {
        match self {
            Value::Scalar(s) => vec![s.clone()],
            Value::List(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Value::Map(_) => Vec::new(),
        }
    }
}

/// Where the parser is currently appending
#[derive(Default)]
struct Cursor {
    /// Top-level key of the open mapping
    section: Option<String>,
    /// (section, key) of the open sequence
    sequence: Option<(String, String)>,
    /// Index of the open item mapping inside the sequence
    item: Option<usize>,
}

/// Parse structured text into a mapping
pub fn parse(text: &str) -> Mapping {
    let mut result = Mapping::new();
    let mut cursor = Cursor::default();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let indent = line.chars().count() - line.trim_start().chars().count();

        if trimmed.contains(':') && !trimmed.starts_with('-') {
            let (key, raw_value) = split_key_value(trimmed);
            let value = clean_scalar(raw_value);

            if indent == 0 {
                if value.is_empty() {
                    result.insert(key.clone(), Value::Map(Mapping::new()));
                    cursor = Cursor {
                        section: Some(key),
                        ..Cursor::default()
                    };
                } else {
                    result.insert(key, parse_inline_value(&value));
                }
            } else if indent == 2 {
                let Some(section) = cursor.section.clone() else {
                    continue;
                };
                let Some(Value::Map(map)) = result.get_mut(&section) else {
                    continue;
                };

                if value.is_empty() {
                    map.insert(key.clone(), Value::List(Vec::new()));
                    cursor.sequence = Some((section, key));
                    cursor.item = None;
                } else {
                    map.insert(key, parse_inline_value(&value));
                }
            } else if indent >= 4 {
                if let Some(Value::Map(item)) = open_item(&mut result, &cursor) {
                    item.insert(key, Value::Scalar(value));
                }
            }
        } else if trimmed.starts_with('-') {
            let Some(sequence) = open_sequence(&mut result, &cursor) else {
                continue;
            };

            let content = trimmed[1..].trim();
            if content.contains(':') {
                let (key, raw_value) = split_key_value(content);
                let mut item = Mapping::new();
                item.insert(key, Value::Scalar(clean_scalar(raw_value)));
                sequence.push(Value::Map(item));
                cursor.item = Some(sequence.len() - 1);
            } else if !content.is_empty() {
                sequence.push(Value::Scalar(content.to_string()));
                cursor.item = None;
            } else {
                sequence.push(Value::Map(Mapping::new()));
                cursor.item = Some(sequence.len() - 1);
            }
        }
    }

    result
}

/// Parse a bracketed list (`[a, "b"]`)
///
/// Attempts a strict JSON parse first and falls back to splitting on commas
/// with all quote characters removed. Returns `None` when the input is not
/// bracketed at all.
pub fn parse_bracketed_list(value: &str) -> Option<Vec<Value>> {
    if !(value.starts_with('[') && value.ends_with(']')) || value.len() < 2 {
        return None;
    }

    match serde_json::from_str::<Vec<serde_json::Value>>(value) {
        Ok(items) => Some(items.into_iter().map(from_json).collect()),
        Err(_) => Some(
            value[1..value.len() - 1]
                .split(',')
                .map(|part| Value::Scalar(part.trim().replace(['"', '\''], "")))
                .collect(),
        ),
    }
}

/// Trim a raw value and strip one leading and one trailing quote character
pub fn clean_scalar(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix(['"', '\'']).unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix(['"', '\'']).unwrap_or(trimmed);
    trimmed.to_string()
}

fn split_key_value(line: &str) -> (String, &str) {
    match line.split_once(':') {
        Some((key, value)) => (key.trim().to_string(), value),
        None => (line.trim().to_string(), ""),
    }
}

fn parse_inline_value(value: &str) -> Value {
    match parse_bracketed_list(value) {
        Some(items) => Value::List(items),
        None => Value::Scalar(value.to_string()),
    }
}

fn open_sequence<'a>(result: &'a mut Mapping, cursor: &Cursor) -> Option<&'a mut Vec<Value>> {
    let (section, key) = cursor.sequence.as_ref()?;
    match result.get_mut(section)? {
        Value::Map(map) => match map.get_mut(key)? {
            Value::List(items) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn open_item<'a>(result: &'a mut Mapping, cursor: &Cursor) -> Option<&'a mut Value> {
    let index = cursor.item?;
    open_sequence(result, cursor)?.get_mut(index)
}

fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::String(s) => Value::Scalar(s),
        serde_json::Value::Null => Value::Scalar(String::new()),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            Value::Map(map.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
        other => Value::Scalar(other.to_string()),
    }
}
