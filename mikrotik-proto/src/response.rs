//! Decoded command responses: the result of classifying a [`Sentence`] by
//! its reply category and pulling out the fields each category carries.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::num::ParseIntError;

use crate::error::{MissingWord, ProtocolError, WordType};
use crate::sentence::Sentence;
use crate::word::{Word, WordAttribute, WordCategory};

/// Type alias for a `!fatal` response's reason string.
pub type FatalResponse = String;

/// A response decoded from one wire sentence.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResponse {
    /// `!done` — successful command completion.
    Done(DoneResponse),
    /// `!re` — one data row.
    Reply(ReplyResponse),
    /// `!trap` — a command-scoped error or warning.
    Trap(TrapResponse),
    /// `!fatal` — a connection-scoped error.
    Fatal(FatalResponse),
}

impl CommandResponse {
    /// The tag this response is addressed to, if any. `!fatal` has no tag —
    /// it applies to every open command on the connection.
    pub fn tag(&self) -> Option<u16> {
        match self {
            Self::Done(d) => Some(d.tag),
            Self::Reply(r) => Some(r.tag),
            Self::Trap(t) => Some(t.tag),
            Self::Fatal(_) => None,
        }
    }
}

impl TryFrom<Sentence> for CommandResponse {
    type Error = ProtocolError;

    fn try_from(sentence: Sentence) -> Result<Self, Self::Error> {
        let mut words = sentence.into_iter();
        let first = words.next().ok_or(ProtocolError::EmptySentence)?;

        let category = first.category().copied().ok_or(ProtocolError::WordSequence {
            word: first.into(),
            expected: vec![WordType::Category],
        })?;

        match category {
            WordCategory::Done => {
                let mut tag = None;
                let mut attributes = HashMap::new();

                for word in words {
                    match word {
                        Word::Tag(t) => tag = Some(t),
                        Word::Attribute(WordAttribute { key, value }) => {
                            attributes.insert(key, value);
                        }
                        other => {
                            return Err(ProtocolError::WordSequence {
                                word: other.into(),
                                expected: vec![WordType::Tag, WordType::Attribute],
                            });
                        }
                    }
                }

                let tag = tag.ok_or(ProtocolError::Incomplete(MissingWord::Tag))?;
                Ok(CommandResponse::Done(DoneResponse { tag, attributes }))
            }
            WordCategory::Reply => {
                let mut tag = None;
                let mut section = None;
                let mut attributes = HashMap::new();

                for word in words {
                    match word {
                        Word::Tag(t) => tag = Some(t),
                        Word::Section(s) => section = Some(s),
                        Word::Attribute(WordAttribute { key, value }) => {
                            attributes.insert(key, value);
                        }
                        other => {
                            return Err(ProtocolError::WordSequence {
                                word: other.into(),
                                expected: vec![WordType::Tag, WordType::Section, WordType::Attribute],
                            });
                        }
                    }
                }

                let tag = tag.ok_or(ProtocolError::Incomplete(MissingWord::Tag))?;
                Ok(CommandResponse::Reply(ReplyResponse { tag, section, attributes }))
            }
            WordCategory::Trap => {
                let mut tag = None;
                let mut category = None;
                let mut message = None;

                for word in words {
                    match word {
                        Word::Tag(t) => tag = Some(t),
                        Word::Attribute(WordAttribute { key, value }) => match key.as_str() {
                            "category" => {
                                category = value
                                    .as_deref()
                                    .map(TrapCategory::from_str)
                                    .transpose()?;
                            }
                            "message" => message = value,
                            _ => {
                                return Err(ProtocolError::UnexpectedTrapAttribute { key });
                            }
                        },
                        other => {
                            return Err(ProtocolError::WordSequence {
                                word: other.into(),
                                expected: vec![WordType::Tag, WordType::Attribute],
                            });
                        }
                    }
                }

                let tag = tag.ok_or(ProtocolError::Incomplete(MissingWord::Tag))?;
                let message = message.ok_or(ProtocolError::TrapMissingMessage)?;

                Ok(CommandResponse::Trap(TrapResponse { tag, category, message }))
            }
            WordCategory::Fatal => {
                let word = words.next().ok_or(ProtocolError::Incomplete(MissingWord::Message))?;
                let reason = word.message().map(str::to_string).ok_or(ProtocolError::WordSequence {
                    word: word.into(),
                    expected: vec![WordType::Message],
                })?;
                Ok(CommandResponse::Fatal(reason))
            }
        }
    }
}

/// A (tagged) successful command completion.
///
/// Usually carries no attributes, but some commands — notably the first leg
/// of the MD5 challenge-response login handshake — return a `!done` with a
/// `ret` attribute alongside the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoneResponse {
    /// The tag this completion is for.
    pub tag: u16,
    /// Any attributes the `!done` carried.
    pub attributes: HashMap<String, Option<String>>,
}

impl DoneResponse {
    /// Convenience accessor for the `ret` attribute used by the
    /// challenge-response login handshake.
    pub fn ret(&self) -> Option<&str> {
        self.attributes.get("ret").and_then(|v| v.as_deref())
    }
}

impl Display for DoneResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "DoneResponse {{ tag: {}, attributes: {:?} }}", self.tag, self.attributes)
    }
}

/// One data row of a command's reply stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyResponse {
    /// The tag this row belongs to.
    pub tag: u16,
    /// The `.section=<id>` this row belongs to, if the router included one.
    /// Used by streaming commands (e.g. `/tool/torch`) to demarcate
    /// full-refresh boundaries.
    pub section: Option<String>,
    /// The row's attributes. A present key with no `=value` (a flag
    /// attribute) maps to `Some(String::new())`, distinguishing it from a
    /// key that never appeared.
    pub attributes: HashMap<String, Option<String>>,
}

impl Display for ReplyResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ReplyResponse {{ tag: {}, section: {:?}, attributes: {:?} }}",
            self.tag, self.section, self.attributes
        )
    }
}

/// A command-scoped error or warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrapResponse {
    /// The tag the trap is for.
    pub tag: u16,
    /// The trap's category, if the router included one.
    pub category: Option<TrapCategory>,
    /// The human-readable trap message.
    pub message: String,
}

impl TrapResponse {
    /// True for the non-error pause acknowledgement a stream sees when it
    /// cancels its own in-flight command (`message=interrupted`).
    pub fn is_interrupted(&self) -> bool {
        self.message == "interrupted"
    }
}

impl Display for TrapResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TrapResponse {{ tag: {}, category: {:?}, message: \"{}\" }}",
            self.tag, self.category, self.message
        )
    }
}

/// Categories for [`TrapResponse`], defining the nature of the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TrapCategory {
    /// 0 — missing item or command.
    MissingItemOrCommand = 0,
    /// 1 — argument value failure.
    ArgumentValueFailure = 1,
    /// 2 — execution of command interrupted.
    CommandExecutionInterrupted = 2,
    /// 3 — scripting related failure.
    ScriptingFailure = 3,
    /// 4 — general failure.
    GeneralFailure = 4,
    /// 5 — API related failure.
    ApiFailure = 5,
    /// 6 — TTY related failure.
    TtyFailure = 6,
    /// 7 — value generated with `:return`.
    ReturnValue = 7,
}

impl TrapCategory {
    fn from_str(s: &str) -> Result<Self, ProtocolError> {
        let n: u8 = s.parse().map_err(|_: ParseIntError| ProtocolError::TrapCategoryNotANumber)?;
        Self::try_from(n)
    }
}

impl TryFrom<u8> for TrapCategory {
    type Error = ProtocolError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            0 => Ok(Self::MissingItemOrCommand),
            1 => Ok(Self::ArgumentValueFailure),
            2 => Ok(Self::CommandExecutionInterrupted),
            3 => Ok(Self::ScriptingFailure),
            4 => Ok(Self::GeneralFailure),
            5 => Ok(Self::ApiFailure),
            6 => Ok(Self::TtyFailure),
            7 => Ok(Self::ReturnValue),
            n => Err(ProtocolError::InvalidTrapCategory(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sentence(words: Vec<Word>) -> Sentence {
        Sentence(words)
    }

    #[test]
    fn parses_done() {
        let s = sentence(vec![Word::Category(WordCategory::Done), Word::Tag(5)]);
        let resp = CommandResponse::try_from(s).unwrap();
        assert_eq!(resp, CommandResponse::Done(DoneResponse { tag: 5, attributes: HashMap::new() }));
    }

    #[test]
    fn parses_done_with_ret_attribute_for_challenge_response_login() {
        let s = sentence(vec![
            Word::Category(WordCategory::Done),
            Word::Tag(1),
            Word::Attribute(WordAttribute { key: "ret".into(), value: Some("ad1f4b90".into()) }),
        ]);
        let CommandResponse::Done(done) = CommandResponse::try_from(s).unwrap() else {
            panic!("expected done");
        };
        assert_eq!(done.ret(), Some("ad1f4b90"));
    }

    #[test]
    fn parses_reply_with_attributes_in_any_order() {
        let s = sentence(vec![
            Word::Category(WordCategory::Reply),
            Word::Attribute(WordAttribute { key: "name".into(), value: Some("ether1".into()) }),
            Word::Tag(7),
        ]);
        let CommandResponse::Reply(reply) = CommandResponse::try_from(s).unwrap() else {
            panic!("expected reply");
        };
        assert_eq!(reply.tag, 7);
        assert_eq!(reply.attributes.get("name"), Some(&Some("ether1".to_string())));
        assert_eq!(reply.section, None);
    }

    #[test]
    fn parses_reply_with_section() {
        let s = sentence(vec![
            Word::Category(WordCategory::Reply),
            Word::Tag(7),
            Word::Section("1".to_string()),
            Word::Attribute(WordAttribute { key: "name".into(), value: Some("ether1".into()) }),
        ]);
        let CommandResponse::Reply(reply) = CommandResponse::try_from(s).unwrap() else {
            panic!("expected reply");
        };
        assert_eq!(reply.section.as_deref(), Some("1"));
    }

    #[test]
    fn parses_trap_with_category_and_message() {
        let s = sentence(vec![
            Word::Category(WordCategory::Trap),
            Word::Attribute(WordAttribute { key: "category".into(), value: Some("1".into()) }),
            Word::Attribute(WordAttribute {
                key: "message".into(),
                value: Some("missing value for 'name'".into()),
            }),
            Word::Tag(9),
        ]);
        let CommandResponse::Trap(trap) = CommandResponse::try_from(s).unwrap() else {
            panic!("expected trap");
        };
        assert_eq!(trap.tag, 9);
        assert_eq!(trap.category, Some(TrapCategory::ArgumentValueFailure));
        assert_eq!(trap.message, "missing value for 'name'");
        assert!(!trap.is_interrupted());
    }

    #[test]
    fn trap_interrupted_message_is_flagged() {
        let s = sentence(vec![
            Word::Category(WordCategory::Trap),
            Word::Tag(3),
            Word::Attribute(WordAttribute { key: "message".into(), value: Some("interrupted".into()) }),
        ]);
        let CommandResponse::Trap(trap) = CommandResponse::try_from(s).unwrap() else {
            panic!("expected trap");
        };
        assert!(trap.is_interrupted());
    }

    #[test]
    fn parses_fatal() {
        let s = sentence(vec![
            Word::Category(WordCategory::Fatal),
            Word::Message("server down".to_string()),
        ]);
        let resp = CommandResponse::try_from(s).unwrap();
        assert_eq!(resp, CommandResponse::Fatal("server down".to_string()));
        assert_eq!(resp.tag(), None);
    }

    #[test]
    fn trap_without_message_is_an_error() {
        let s = sentence(vec![Word::Category(WordCategory::Trap), Word::Tag(1)]);
        assert_eq!(
            CommandResponse::try_from(s),
            Err(ProtocolError::TrapMissingMessage)
        );
    }

    #[test]
    fn empty_sentence_is_an_error() {
        assert_eq!(
            CommandResponse::try_from(sentence(vec![])),
            Err(ProtocolError::EmptySentence)
        );
    }
}
