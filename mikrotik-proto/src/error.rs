//! Error types for the sans-IO protocol engine.

use crate::length::LengthError;
use crate::word::{Word, WordError};

/// Errors that can occur while decoding a byte stream into sentences.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReceiverError {
    /// The length prefix did not match any of the five valid encodings.
    #[error("invalid length prefix")]
    InvalidLengthPrefix,
    /// A word's payload could not be decoded.
    #[error("word error: {0}")]
    Word(#[from] WordError),
}

impl From<LengthError> for ReceiverError {
    fn from(_: LengthError) -> Self {
        ReceiverError::InvalidLengthPrefix
    }
}

/// Errors that can occur while turning a decoded sentence into a
/// [`CommandResponse`](crate::response::CommandResponse).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A sentence produced no words at all.
    #[error("empty sentence")]
    EmptySentence,
    /// A required word is missing from the sentence.
    #[error("incomplete response, missing {0}")]
    Incomplete(MissingWord),
    /// A word appeared where a different [`WordType`] was expected.
    #[error("unexpected word type: found {word:?}, expected one of {expected:?}")]
    WordSequence {
        /// The word type actually found.
        word: WordType,
        /// The word types that would have been valid here.
        expected: Vec<WordType>,
    },
    /// A `!trap` response carried an attribute other than `category` or
    /// `message`.
    #[error("unexpected attribute in trap: {key}")]
    UnexpectedTrapAttribute {
        /// The offending attribute key.
        key: String,
    },
    /// A `!trap` response had no `message` attribute.
    #[error("trap response missing message attribute")]
    TrapMissingMessage,
    /// A `!trap`'s `category` value was not a recognized trap category.
    #[error("invalid trap category: {0}")]
    InvalidTrapCategory(u8),
    /// A `!trap`'s `category` value was not an integer in range 0-255.
    #[error("trap category is not a valid number")]
    TrapCategoryNotANumber,
}

impl From<Word> for WordType {
    fn from(word: Word) -> Self {
        match word {
            Word::Tag(_) => WordType::Tag,
            Word::Section(_) => WordType::Section,
            Word::Category(_) => WordType::Category,
            Word::Attribute(_) => WordType::Attribute,
            Word::Message(_) => WordType::Message,
        }
    }
}

/// A word that is required but was not found while parsing a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingWord {
    /// The `.tag=` word.
    Tag,
    /// The category word (`!done`, `!re`, `!trap`, `!fatal`).
    Category,
    /// The `!fatal` reason message.
    Message,
}

impl std::fmt::Display for MissingWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MissingWord::Tag => "tag",
            MissingWord::Category => "category",
            MissingWord::Message => "message",
        })
    }
}

/// Coarse classification of a [`Word`], used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordType {
    /// A `.tag=` word.
    Tag,
    /// A `.section=` word.
    Section,
    /// A category word.
    Category,
    /// An `=key=value` word.
    Attribute,
    /// A free-form message word.
    Message,
}

/// Error building a command with the given parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The input contains a character that cannot be represented in
    /// Windows-1252, the wire encoding RouterOS expects.
    #[error("the input contains a character that cannot be encoded as Windows-1252: {0:?}")]
    HasInvalidCharacter(char),
}
