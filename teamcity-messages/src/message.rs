// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ParseMessageError, ParseMessageErrorKind},
    escape::{escape, unescape},
};
use indexmap::IndexMap;
use std::{fmt, str::FromStr};

/// A single TeamCity service message, e.g. `##teamcity[testStarted name='MyTest']`.
///
/// Attributes are kept in insertion order, which is also the order they are rendered in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceMessage {
    name: String,
    attributes: IndexMap<String, String>,
}

impl ServiceMessage {
    /// The prefix every service message starts with.
    pub const PREFIX: &'static str = "##teamcity[";

    /// Creates a new message with the given name and no attributes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
        }
    }

    /// Returns the name of the message.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value of an attribute, if present.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Iterates over the attributes in order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Sets an attribute, replacing any existing value while keeping its position.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder-style version of [`set_attribute`](Self::set_attribute).
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }
}

impl fmt::Display for ServiceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.name)?;
        for (key, value) in &self.attributes {
            write!(f, " {key}='{}'", escape(value))?;
        }
        f.write_str("]")
    }
}

impl FromStr for ServiceMessage {
    type Err = ParseMessageError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let error = |kind| ParseMessageError::new(input, kind);

        let line = input.trim_end_matches(['\r', '\n']);
        let body = line
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| error(ParseMessageErrorKind::MissingPrefix))?;
        let body = body
            .strip_suffix(']')
            .ok_or_else(|| error(ParseMessageErrorKind::MissingTerminator))?;

        let (name, mut rest) = match body.find(char::is_whitespace) {
            Some(index) => body.split_at(index),
            None => (body, ""),
        };
        if name.is_empty() {
            return Err(error(ParseMessageErrorKind::EmptyName));
        }

        let mut message = ServiceMessage::new(name);
        let mut offset = name.len();
        loop {
            let trimmed = rest.trim_start();
            offset += rest.len() - trimmed.len();
            rest = trimmed;
            if rest.is_empty() {
                break;
            }

            let expected_attribute = |position| {
                error(ParseMessageErrorKind::ExpectedAttribute { position })
            };
            let eq = rest.find('=').ok_or_else(|| expected_attribute(offset))?;
            let key = &rest[..eq];
            if key.is_empty() || key.contains(|c: char| c.is_whitespace() || c == '\'') {
                return Err(expected_attribute(offset));
            }
            let quoted = rest[eq + 1..]
                .strip_prefix('\'')
                .ok_or_else(|| expected_attribute(offset + eq + 1))?;
            let value_start = offset + eq + 2;
            let end = find_value_end(quoted).ok_or_else(|| {
                error(ParseMessageErrorKind::UnterminatedValue {
                    position: value_start,
                })
            })?;
            let value = unescape(&quoted[..end]).map_err(|err| error(err.into()))?;
            message.set_attribute(key, value);

            // key, `=`, opening quote, value, closing quote
            let consumed = eq + 2 + end + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }

        Ok(message)
    }
}

/// Returns the byte index of the unescaped `'` that ends a value.
fn find_value_end(quoted: &str) -> Option<usize> {
    let mut chars = quoted.char_indices();
    while let Some((index, c)) = chars.next() {
        match c {
            '|' => {
                chars.next();
            }
            '\'' => return Some(index),
            _ => {}
        }
    }
    None
}
