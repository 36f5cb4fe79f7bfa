// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io;
use thiserror::Error;

/// An error that occurs while writing service messages.
///
/// Returned by the block handles and by [`TeamCityWriter`](crate::TeamCityWriter).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteError {
    /// An error occurred while writing to the underlying sink.
    #[error("error writing service message")]
    Io(#[from] io::Error),

    /// A block was closed while a block nested inside it was still open.
    #[error(
        "block `{name}` closed out of order (innermost open block is {})",
        innermost.as_deref().map_or_else(|| "none".to_owned(), |inner| format!("`{inner}`")),
    )]
    OutOfOrderClose {
        /// The name of the block that was being closed.
        name: String,

        /// The name of the innermost block that is still open, if any.
        innermost: Option<String>,
    },

    /// The writer was finished while blocks were still open.
    #[error("blocks still open when finishing writer: {}", names.join(", "))]
    UnclosedBlocks {
        /// The names of the blocks that are still open, outermost first.
        names: Vec<String>,
    },
}

impl WriteError {
    /// Returns true if this error indicates misuse of the block protocol, as opposed to a failure
    /// of the underlying sink.
    pub fn is_protocol_violation(&self) -> bool {
        match self {
            WriteError::Io(_) => false,
            WriteError::OutOfOrderClose { .. } | WriteError::UnclosedBlocks { .. } => true,
        }
    }
}

/// An error that occurs while unescaping a service message value.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid escape at byte {position} in `{input}`: {kind}")]
pub struct UnescapeError {
    input: String,
    position: usize,
    kind: UnescapeErrorKind,
}

impl UnescapeError {
    pub(crate) fn new(input: impl Into<String>, position: usize, kind: UnescapeErrorKind) -> Self {
        Self {
            input: input.into(),
            position,
            kind,
        }
    }

    /// Returns the byte offset of the offending escape.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the kind of error that occurred.
    pub fn kind(&self) -> &UnescapeErrorKind {
        &self.kind
    }
}

/// The kind of [`UnescapeError`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum UnescapeErrorKind {
    /// The value ended with a lone `|`.
    #[error("value ends with an unfinished escape")]
    TrailingPipe,

    /// `|` was followed by a character that isn't a known escape.
    #[error("unknown escape `|{0}`")]
    UnknownEscape(char),

    /// A `|0xNNNN` escape did not have four hex digits.
    #[error("expected `|0x` followed by four hex digits")]
    InvalidCodeUnit,

    /// A `|0xNNNN` escape sequence produced an unpaired UTF-16 surrogate.
    #[error("unpaired UTF-16 surrogate 0x{0:04x}")]
    UnpairedSurrogate(u16),
}

/// An error that occurs while parsing a [`ServiceMessage`](crate::ServiceMessage) from a string.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("failed to parse service message `{input}`")]
pub struct ParseMessageError {
    input: String,
    #[source]
    kind: ParseMessageErrorKind,
}

impl ParseMessageError {
    pub(crate) fn new(input: impl Into<String>, kind: ParseMessageErrorKind) -> Self {
        Self {
            input: input.into(),
            kind,
        }
    }

    /// Returns the kind of error that occurred.
    pub fn kind(&self) -> &ParseMessageErrorKind {
        &self.kind
    }
}

/// The kind of [`ParseMessageError`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseMessageErrorKind {
    /// The line does not start with `##teamcity[`.
    #[error("missing `##teamcity[` prefix")]
    MissingPrefix,

    /// The line does not end with `]`.
    #[error("missing closing `]`")]
    MissingTerminator,

    /// The message has no name.
    #[error("message name is empty")]
    EmptyName,

    /// Something other than `key='value'` was found where an attribute was expected.
    #[error("expected `key='value'` at byte {position}")]
    ExpectedAttribute {
        /// The byte offset within the message body.
        position: usize,
    },

    /// A quoted value was not terminated.
    #[error("unterminated value starting at byte {position}")]
    UnterminatedValue {
        /// The byte offset within the message body.
        position: usize,
    },

    /// A value contained an invalid escape.
    #[error(transparent)]
    Unescape(#[from] UnescapeError),
}
