//! Output filters for device responses.
//!
//! Two independent extractors:
//!
//! - [`find_subconfig`] / [`filter_cli`] narrow hierarchical CLI text by
//!   indentation, then scan the narrowed block with a value pattern.
//! - [`filter_data`] walks nested structured output (JSON) by keys, indices
//!   and row predicates.
//!
//! # Example
//!
//! ```rust
//! use nodelink::filter::{filter_cli, to_regex, CliMatch};
//!
//! let config = "router ospf 1\n  router-id 1.1.1.1\n  area 0 range 10.0.0.0/8\n";
//! let context = [to_regex("/^router ospf 1/").unwrap()];
//! let value = to_regex(r"/router-id (\S+)/").unwrap();
//!
//! let result = filter_cli(config, &context, Some(&value));
//! assert_eq!(result, Some(CliMatch::Values(vec!["1.1.1.1".to_string()])));
//! ```

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use thiserror::Error;

/// Lookup failures raised by the filters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// A pattern string could not be compiled.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A map key was not present.
    #[error("No key '{key}' in {found}")]
    MissingKey { key: String, found: String },

    /// An array index was out of range.
    #[error("Index {index} out of range for array of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A row predicate was applied to something other than an array.
    #[error("Expected an array to match {filter}, found {found}")]
    ExpectedArray { filter: String, found: String },

    /// A row predicate matched no rows.
    #[error("No match found for {filter}")]
    NoMatch { filter: String },

    /// A row predicate matched more than one row.
    #[error("Multiple matches found for {filter} ({count} rows)")]
    MultipleMatches { filter: String, count: usize },
}

/// Result of [`filter_cli`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliMatch {
    /// The narrowed block, when no value pattern was given.
    Block(String),
    /// One entry per match: the single capture group, or the whole match
    /// when the pattern has no groups.
    Values(Vec<String>),
    /// One tuple per match, for patterns with several capture groups.
    Groups(Vec<Vec<String>>),
}

/// One step of a [`filter_data`] walk.
#[derive(Debug, Clone, PartialEq)]
pub enum DataKey {
    /// Descend into a map by key.
    Key(String),
    /// Descend into an array by position.
    Index(usize),
    /// Select the single array row whose fields equal every pair given.
    Match(Map<String, Value>),
}

impl From<&str> for DataKey {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for DataKey {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for DataKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<Map<String, Value>> for DataKey {
    fn from(predicate: Map<String, Value>) -> Self {
        Self::Match(predicate)
    }
}

impl DataKey {
    /// Build a row predicate from `(field, value)` pairs.
    pub fn matching<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Match(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Compile a user-supplied pattern.
///
/// `/body/flags` (flags from `imx`) is a regex. Any other string is a literal
/// that must make up a whole line, surrounding whitespace aside. Line anchors
/// are always multi-line.
pub fn to_regex(pattern: &str) -> Result<Regex, FilterError> {
    let invalid = |e: regex::Error| FilterError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    };

    if let Some((body, flags)) = split_delimited(pattern) {
        RegexBuilder::new(body)
            .multi_line(true)
            .case_insensitive(flags.contains('i'))
            .dot_matches_new_line(flags.contains('m'))
            .ignore_whitespace(flags.contains('x'))
            .build()
            .map_err(invalid)
    } else {
        RegexBuilder::new(&format!(r"^\s*{}\s*$", regex::escape(pattern.trim())))
            .multi_line(true)
            .build()
            .map_err(invalid)
    }
}

fn split_delimited(pattern: &str) -> Option<(&str, &str)> {
    let rest = pattern.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    let (body, flags) = (&rest[..end], &rest[end + 1..]);
    flags
        .chars()
        .all(|c| matches!(c, 'i' | 'm' | 'x'))
        .then_some((body, flags))
}

/// Extract the block nested under the first line matching `pattern`.
///
/// The block is every line directly after the match that starts with
/// whitespace. The smallest common indentation is removed so the result
/// starts at column zero. Returns `None` if nothing matched or the matched
/// line has no nested lines.
pub fn find_subconfig(body: &str, pattern: &Regex) -> Option<String> {
    let rows: Vec<&str> = body
        .split('\n')
        .map(|row| row.trim_end_matches('\r'))
        .collect();

    let start = rows.iter().position(|row| pattern.is_match(row))?;

    let nested: Vec<&str> = rows[start + 1..]
        .iter()
        .take_while(|row| row.starts_with(char::is_whitespace))
        .copied()
        .collect();

    let indent = nested.iter().map(|row| leading_whitespace(row)).min()?;

    Some(
        nested
            .iter()
            .map(|row| &row[indent..])
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

fn leading_whitespace(row: &str) -> usize {
    row.len() - row.trim_start_matches([' ', '\t']).len()
}

/// Narrow `text` through each `context` pattern in turn, then scan it.
///
/// Without a `value` pattern the narrowed block itself is returned. With one,
/// every match in the block is collected. `None` means no match at any step.
pub fn filter_cli(text: &str, context: &[Regex], value: Option<&Regex>) -> Option<CliMatch> {
    let mut block = text.to_string();
    for pattern in context {
        block = find_subconfig(&block, pattern)?;
    }

    let Some(value) = value else {
        return Some(CliMatch::Block(block));
    };

    let groups = value.captures_len() - 1;
    let mut values = Vec::new();
    let mut tuples = Vec::new();

    for caps in value.captures_iter(&block) {
        let group = |i: usize| caps.get(i).map_or_else(String::new, |m| m.as_str().to_string());
        match groups {
            0 => values.push(group(0)),
            1 => values.push(group(1)),
            n => tuples.push((1..=n).map(group).collect()),
        }
    }

    if groups > 1 {
        (!tuples.is_empty()).then_some(CliMatch::Groups(tuples))
    } else {
        (!values.is_empty()).then_some(CliMatch::Values(values))
    }
}

/// Walk `data` along `keys` and return the node reached.
pub fn filter_data(data: &Value, keys: &[DataKey]) -> Result<Value, FilterError> {
    let mut node = data;

    for key in keys {
        node = match key {
            DataKey::Key(name) => node.get(name.as_str()).ok_or_else(|| FilterError::MissingKey {
                key: name.clone(),
                found: describe(node),
            })?,
            DataKey::Index(index) => {
                let rows = node.as_array().ok_or_else(|| FilterError::ExpectedArray {
                    filter: format!("[{index}]"),
                    found: describe(node),
                })?;
                rows.get(*index).ok_or(FilterError::IndexOutOfRange {
                    index: *index,
                    len: rows.len(),
                })?
            }
            DataKey::Match(predicate) => select_row(node, predicate)?,
        };
    }

    Ok(node.clone())
}

fn select_row<'a>(node: &'a Value, predicate: &Map<String, Value>) -> Result<&'a Value, FilterError> {
    let filter = Value::Object(predicate.clone()).to_string();
    let rows = node.as_array().ok_or_else(|| FilterError::ExpectedArray {
        filter: filter.clone(),
        found: describe(node),
    })?;

    let matches: Vec<&Value> = rows
        .iter()
        .filter(|row| predicate.iter().all(|(k, v)| row.get(k.as_str()) == Some(v)))
        .collect();

    match matches.as_slice() {
        [] => Err(FilterError::NoMatch { filter }),
        [row] => Ok(row),
        many => Err(FilterError::MultipleMatches {
            filter,
            count: many.len(),
        }),
    }
}

fn describe(node: &Value) -> String {
    match node {
        Value::Null => "null".into(),
        Value::Bool(_) => "a boolean".into(),
        Value::Number(_) => "a number".into(),
        Value::String(_) => "a string".into(),
        Value::Array(a) => format!("an array of {}", a.len()),
        Value::Object(o) => {
            let keys: Vec<&str> = o.keys().map(String::as_str).collect();
            format!("a map with keys {keys:?}")
        }
    }
}
