// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Escaping of attribute values inside service messages.
//!
//! TeamCity uses `|` as its escape character. Besides the characters that would otherwise terminate
//! a value or a message (`'`, `[`, `]`, line breaks), every character outside of ASCII is written
//! as `|0xNNNN`, one escape per UTF-16 code unit.

use crate::errors::{UnescapeError, UnescapeErrorKind};
use std::borrow::Cow;
use swrite::{SWrite, swrite};

/// Escapes a value so that it can be placed between single quotes in a service message.
///
/// Returns the input unchanged (and unallocated) if nothing needs to be escaped.
pub fn escape(value: &str) -> Cow<'_, str> {
    if !value.chars().any(needs_escape) {
        return Cow::Borrowed(value);
    }

    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '|' => escaped.push_str("||"),
            '\'' => escaped.push_str("|'"),
            '\n' => escaped.push_str("|n"),
            '\r' => escaped.push_str("|r"),
            '[' => escaped.push_str("|["),
            ']' => escaped.push_str("|]"),
            '\u{0085}' => escaped.push_str("|x"),
            '\u{2028}' => escaped.push_str("|l"),
            '\u{2029}' => escaped.push_str("|p"),
            c if !c.is_ascii() => {
                for unit in c.encode_utf16(&mut [0; 2]) {
                    swrite!(escaped, "|0x{unit:04x}");
                }
            }
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Reverses [`escape`].
///
/// Both lowercase and uppercase hex digits are accepted in `|0xNNNN` escapes.
pub fn unescape(value: &str) -> Result<Cow<'_, str>, UnescapeError> {
    if !value.contains('|') {
        return Ok(Cow::Borrowed(value));
    }

    let mut unescaped = String::with_capacity(value.len());
    // Consecutive `|0xNNNN` escapes may form a surrogate pair, so they're decoded together.
    let mut units: Vec<u16> = Vec::new();
    let mut chars = value.char_indices();

    while let Some((position, c)) = chars.next() {
        if c != '|' {
            flush_units(value, position, &mut units, &mut unescaped)?;
            unescaped.push(c);
            continue;
        }

        let error = |kind| UnescapeError::new(value, position, kind);
        let Some((_, next)) = chars.next() else {
            return Err(error(UnescapeErrorKind::TrailingPipe));
        };
        let decoded = match next {
            '|' => '|',
            '\'' => '\'',
            'n' => '\n',
            'r' => '\r',
            '[' => '[',
            ']' => ']',
            'x' => '\u{0085}',
            'l' => '\u{2028}',
            'p' => '\u{2029}',
            '0' => {
                if !matches!(chars.next(), Some((_, 'x'))) {
                    return Err(error(UnescapeErrorKind::InvalidCodeUnit));
                }
                let digits: String = chars.by_ref().take(4).map(|(_, c)| c).collect();
                if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(error(UnescapeErrorKind::InvalidCodeUnit));
                }
                let unit = u16::from_str_radix(&digits, 16)
                    .map_err(|_| error(UnescapeErrorKind::InvalidCodeUnit))?;
                units.push(unit);
                continue;
            }
            other => return Err(error(UnescapeErrorKind::UnknownEscape(other))),
        };
        flush_units(value, position, &mut units, &mut unescaped)?;
        unescaped.push(decoded);
    }

    flush_units(value, value.len(), &mut units, &mut unescaped)?;
    Ok(Cow::Owned(unescaped))
}

fn needs_escape(c: char) -> bool {
    matches!(c, '|' | '\'' | '\n' | '\r' | '[' | ']') || !c.is_ascii()
}

fn flush_units(
    value: &str,
    position: usize,
    units: &mut Vec<u16>,
    out: &mut String,
) -> Result<(), UnescapeError> {
    for decoded in char::decode_utf16(units.drain(..)) {
        let c = decoded.map_err(|err| {
            UnescapeError::new(
                value,
                position,
                UnescapeErrorKind::UnpairedSurrogate(err.unpaired_surrogate()),
            )
        })?;
        out.push(c);
    }
    Ok(())
}
