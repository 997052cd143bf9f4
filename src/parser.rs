//! Line level access to raw iCalendar text.
//!
//! Nothing here builds a tree of components: a block of text is unfolded,
//! split into lines, and only the lines that start with the requested property
//! name are run through the content-line grammar.

use anyhow::{bail, Error};
use log::trace;
use once_cell::sync::Lazy;
use pest::{iterators::Pair, Parser};
use regex::Regex;

use crate::parameters::ParameterSet;

static FOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n[\t ]").unwrap());

static VEVENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)BEGIN:VEVENT\r?\n.*?END:VEVENT(?:\r?\n)?").unwrap());

/// Joins folded lines back into logical lines. A continuation is a line break
/// followed by exactly one space or tab, both of which are dropped.
pub fn strip_folds(s: &str) -> String {
    FOLD.replace_all(s, "").into_owned()
}

/// Splits a document into its `VEVENT` blocks and the calendar-level text
/// that remains once those blocks are cut out.
pub fn explode(document: &str) -> (Vec<&str>, String) {
    let events = VEVENT.find_iter(document).map(|m| m.as_str()).collect();
    let remainder = VEVENT.replace_all(document, "").into_owned();

    (events, remainder)
}

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct LineParser;

/// A single property: `NAME;PARAM=value:value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: String,
    pub parameters: Vec<Parameter>,
}

impl Property {
    /// Parses one already unfolded content line.
    pub fn parse_line(line: &str) -> Result<Property, Error> {
        let mut pairs = LineParser::parse(Rule::content_line, line)?;
        match pairs.next() {
            Some(pair) => Property::from_pair(pair),
            None => bail!("Empty content line"),
        }
    }

    fn from_pair(pair: Pair<Rule>) -> Result<Property, Error> {
        let span = pair.as_span();
        let mut name = None;
        let mut value = None;
        let mut parameters = Vec::new();

        for inner_pair in pair.into_inner() {
            match inner_pair.as_rule() {
                Rule::name => name = Some(inner_pair.as_str().to_string()),
                Rule::property_value => value = Some(inner_pair.as_str().to_string()),
                Rule::param => parameters.push(Parameter::from_pair(inner_pair)?),
                Rule::EOI => {}
                _ => bail!("Unexpected type {:?}", inner_pair.as_rule()),
            }
        }

        if let (Some(name), Some(value)) = (name, value) {
            Ok(Property {
                name,
                value,
                parameters,
            })
        } else {
            bail!("No name for property: {:?}", span.as_str());
        }
    }

    /// Parses a content line, splitting it by hand when the grammar rejects
    /// it, e.g. for a quoted parameter value followed by more text.
    pub fn parse_lenient(line: &str) -> Option<Property> {
        match Property::parse_line(line) {
            Ok(property) => Some(property),
            Err(err) => {
                trace!("Splitting {:?} by hand: {}", line, err);
                Property::split_line(line)
            }
        }
    }

    /// `NAME;PARAM=a,b;PARAM=c:value` split on `;`, `,` and the first `:`
    /// that is not inside double quotes. Quotes are dropped from parameter
    /// values.
    fn split_line(line: &str) -> Option<Property> {
        let colon = find_unquoted(line, ':')?;
        let mut head = split_unquoted(&line[..colon], ';').into_iter();

        let name = head.next()?.trim();
        if name.is_empty() {
            return None;
        }

        let parameters = head
            .filter_map(|part| {
                let (name, values) = part.split_once('=')?;
                Some(Parameter {
                    name: name.trim().to_string(),
                    values: split_unquoted(values, ',')
                        .into_iter()
                        .map(|v| v.replace('"', ""))
                        .collect(),
                })
            })
            .collect();

        Some(Property {
            name: name.to_string(),
            value: line[colon + 1..].to_string(),
            parameters,
        })
    }

    pub fn parameter_set(&self) -> ParameterSet {
        self.parameters.iter().cloned().into()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub values: Vec<String>,
}

impl Parameter {
    fn from_pair(pair: Pair<Rule>) -> Result<Parameter, Error> {
        let span = pair.as_span();
        let mut name = None;
        let mut values = Vec::new();
        for inner_pair in pair.into_inner() {
            match inner_pair.as_rule() {
                Rule::name => name = Some(inner_pair.as_str().to_string()),
                Rule::param_value => values.push(inner_pair.as_str().trim_matches('"').to_string()),
                _ => bail!("Unexpected type {:?}", inner_pair.as_rule()),
            }
        }

        if values.is_empty() {
            bail!("No values for param {:?}", span.as_str());
        }

        if let Some(name) = name {
            Ok(Parameter { name, values })
        } else {
            bail!("No name for parameter: {:?}", span.as_str());
        }
    }
}

fn find_unquoted(s: &str, needle: char) -> Option<usize> {
    let mut quoted = false;
    s.char_indices()
        .find(|&(_, c)| {
            if c == '"' {
                quoted = !quoted;
            }
            c == needle && !quoted
        })
        .map(|(index, _)| index)
}

fn split_unquoted(s: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = s;
    while let Some(index) = find_unquoted(rest, separator) {
        parts.push(&rest[..index]);
        rest = &rest[index + separator.len_utf8()..];
    }
    parts.push(rest);
    parts
}

fn starts_with_name(line: &str, name: &str) -> bool {
    line.len() > name.len()
        && line.is_char_boundary(name.len())
        && line[..name.len()].eq_ignore_ascii_case(name)
        && matches!(line.as_bytes()[name.len()], b':' | b';')
}

/// Every occurrence of the property `name` in `block`, in document order.
///
/// Lines that look like the property but do not match the content-line
/// grammar are split by hand, see [`Property::parse_lenient`].
pub fn find_properties(block: &str, name: &str) -> Vec<Property> {
    strip_folds(block)
        .lines()
        .filter(|line| starts_with_name(line, name))
        .filter_map(Property::parse_lenient)
        .collect()
}

/// The first occurrence of the property `name` in `block`.
pub fn find_property(block: &str, name: &str) -> Option<Property> {
    strip_folds(block)
        .lines()
        .filter(|line| starts_with_name(line, name))
        .find_map(Property::parse_lenient)
}

/// The trimmed value of the first `name` property, or an empty string when
/// the block has none. Backslash escapes are left as they are.
pub fn field(block: &str, name: &str) -> String {
    find_property(block, name)
        .map(|p| p.value.trim().to_string())
        .unwrap_or_default()
}
