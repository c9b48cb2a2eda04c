//! Command encoding (L4): a typestate builder that can only be finished once
//! at least one word (the command path) has been written, producing a
//! [`Command`] ready to hand to a transport.

use std::marker::PhantomData;
use std::mem::size_of;

use crate::error::CommandError;
use crate::word::encode_str_word;

/// Marker: no command path has been written yet.
pub struct NoCmd;
/// Marker: a command path has been written; attributes and queries may follow.
#[derive(Clone)]
pub struct Cmd;

/// Builds a [`Command`] one word at a time.
///
/// The typestate parameter ensures `build()` is only reachable after
/// `.command(...)` has been called, so it is impossible to construct a
/// command consisting only of a tag.
#[derive(Clone)]
pub struct CommandBuilder<State> {
    tag: u16,
    buf: Vec<u8>,
    state: PhantomData<State>,
}

impl Default for CommandBuilder<NoCmd> {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuilder<NoCmd> {
    /// Starts a new command with a randomly generated tag.
    pub fn new() -> Self {
        let mut dest = [0u8; size_of::<u16>()];
        getrandom::getrandom(&mut dest).expect("failed to generate random tag");
        Self {
            tag: u16::from_be_bytes(dest),
            buf: Vec::new(),
            state: PhantomData,
        }
    }

    /// Starts a new command with a caller-supplied tag. The caller is
    /// responsible for tag uniqueness among commands in flight.
    pub fn with_tag(tag: u16) -> Self {
        Self { tag, buf: Vec::new(), state: PhantomData }
    }

    /// Builds a `/login` command.
    pub fn login(username: &str, password: Option<&str>) -> Result<Command, CommandError> {
        Ok(Self::new()
            .command("/login")?
            .attribute("name", Some(username))?
            .attribute("password", password)?
            .build())
    }

    /// Builds a `/cancel` command targeting `tag`.
    pub fn cancel(tag: u16) -> Command {
        Self::new()
            .command("/cancel")
            .expect("/cancel has no non-ASCII characters")
            .attribute("tag", Some(tag.to_string().as_str()))
            .expect("a formatted u16 has no non-ASCII characters")
            .build()
    }

    /// Sets the command path (e.g. `/interface/print`), transitioning the
    /// builder to a state where attributes and queries can be appended.
    pub fn command(self, command: &str) -> Result<CommandBuilder<Cmd>, CommandError> {
        let Self { tag, mut buf, .. } = self;
        write_word(&mut buf, command)?;
        write_word(&mut buf, &format!(".tag={tag}"))?;
        Ok(CommandBuilder { tag, buf, state: PhantomData })
    }
}

impl CommandBuilder<Cmd> {
    /// Appends an `=key=value` attribute, or `=key=` if `value` is `None`
    /// (a flag attribute).
    pub fn attribute(mut self, key: &str, value: Option<&str>) -> Result<Self, CommandError> {
        match value {
            Some(v) => write_word(&mut self.buf, &format!("={key}={v}"))?,
            None => write_word(&mut self.buf, &format!("={key}="))?,
        }
        Ok(self)
    }

    /// Query: true if `name` has any value set.
    pub fn query_is_present(mut self, name: &str) -> Result<Self, CommandError> {
        write_word(&mut self.buf, &format!("?{name}"))?;
        Ok(self)
    }

    /// Query: true if `name` has no value set.
    pub fn query_not_present(mut self, name: &str) -> Result<Self, CommandError> {
        write_word(&mut self.buf, &format!("?-{name}"))?;
        Ok(self)
    }

    /// Query: true if `name`'s value equals `value`.
    pub fn query_equal(mut self, name: &str, value: &str) -> Result<Self, CommandError> {
        write_word(&mut self.buf, &format!("?{name}={value}"))?;
        Ok(self)
    }

    /// Query: true if `name`'s value is greater than `value`.
    pub fn query_gt(mut self, name: &str, value: &str) -> Result<Self, CommandError> {
        write_word(&mut self.buf, &format!("?>{name}={value}"))?;
        Ok(self)
    }

    /// Query: true if `name`'s value is less than `value`.
    pub fn query_lt(mut self, name: &str, value: &str) -> Result<Self, CommandError> {
        write_word(&mut self.buf, &format!("?<{name}={value}"))?;
        Ok(self)
    }

    /// Combines previously pushed query results with the given operator
    /// sequence, applied stack-wise left to right.
    pub fn query_operations(mut self, operations: impl Iterator<Item = QueryOperator>) -> Self {
        let mut word = String::from("?#");
        word.extend(operations.map(QueryOperator::code));
        encode_str_word(&word, &mut self.buf);
        self
    }

    /// Terminates the command with a zero-length word, producing the final
    /// [`Command`].
    pub fn build(mut self) -> Command {
        self.buf.push(0x00);
        Command { tag: self.tag, data: self.buf }
    }
}

fn write_word(buf: &mut Vec<u8>, s: &str) -> Result<(), CommandError> {
    if let Some(ch) = s.chars().find(|ch| encoding_rs::WINDOWS_1252.encode(&ch.to_string()).2) {
        return Err(CommandError::HasInvalidCharacter(ch));
    }
    encode_str_word(s, buf);
    Ok(())
}

/// A finished command: a tag for correlating replies, and the raw
/// length-prefixed, null-terminated wire bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The tag this command's replies will carry.
    pub tag: u16,
    /// The complete wire-ready sentence, including its terminating
    /// zero-length word.
    pub data: Vec<u8>,
}

/// Operators combining prior query results on the implicit query stack.
/// See the RouterOS API query documentation for semantics.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum QueryOperator {
    /// `!` — negates the top of the stack.
    Not,
    /// `&` — ANDs the top two entries.
    And,
    /// `|` — ORs the top two entries.
    Or,
    /// `.` — pushes an explicit period (rarely used).
    Dot,
}

impl QueryOperator {
    fn code(self) -> char {
        match self {
            QueryOperator::Not => '!',
            QueryOperator::And => '&',
            QueryOperator::Or => '|',
            QueryOperator::Dot => '.',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_a_tag() {
        let builder = CommandBuilder::<NoCmd>::new();
        assert_eq!(builder.buf.len(), 0);
    }

    #[test]
    fn with_tag_uses_the_given_tag() {
        let builder = CommandBuilder::<NoCmd>::with_tag(1234);
        assert_eq!(builder.tag, 1234);
    }

    #[test]
    fn command_writes_path_then_tag_word() {
        let builder = CommandBuilder::<NoCmd>::with_tag(1234).command("/interface/print").unwrap();
        assert_eq!(builder.buf[0] as usize, "/interface/print".len());
        assert_eq!(&builder.buf[1..18], b"/interface/print");
        assert_eq!(&builder.buf[19..], b".tag=1234");
    }

    #[test]
    fn attribute_appends_key_value_word() {
        let cmd = CommandBuilder::<NoCmd>::with_tag(1)
            .command("/interface/print")
            .unwrap()
            .attribute("name", Some("ether1"))
            .unwrap()
            .build();
        let rendered = String::from_utf8_lossy(&cmd.data);
        assert!(rendered.contains("=name=ether1"));
    }

    #[test]
    fn flag_attribute_has_no_value() {
        let cmd = CommandBuilder::<NoCmd>::with_tag(1)
            .command("/interface/print")
            .unwrap()
            .attribute("disabled", None)
            .unwrap()
            .build();
        let rendered = String::from_utf8_lossy(&cmd.data);
        assert!(rendered.contains("=disabled="));
    }

    #[test]
    fn build_terminates_with_zero_byte() {
        let cmd = CommandBuilder::<NoCmd>::with_tag(1).command("/ping").unwrap().build();
        assert_eq!(*cmd.data.last().unwrap(), 0x00);
    }

    #[test]
    fn login_produces_name_and_password_attributes() {
        let cmd = CommandBuilder::login("admin", Some("hunter2")).unwrap();
        let rendered = String::from_utf8_lossy(&cmd.data);
        assert!(rendered.contains("/login"));
        assert!(rendered.contains("=name=admin"));
        assert!(rendered.contains("=password=hunter2"));
    }

    #[test]
    fn cancel_targets_the_given_tag() {
        let cmd = CommandBuilder::cancel(42);
        let rendered = String::from_utf8_lossy(&cmd.data);
        assert!(rendered.contains("/cancel"));
        assert!(rendered.contains("=tag=42"));
    }

    #[test]
    fn non_windows_1252_character_is_rejected() {
        let err = CommandBuilder::<NoCmd>::with_tag(1).command("/interface/print🎉").unwrap_err();
        assert_eq!(err, CommandError::HasInvalidCharacter('🎉'));
    }

    #[test]
    fn query_operations_combine_with_stack_operators() {
        let cmd = CommandBuilder::<NoCmd>::with_tag(1)
            .command("/interface/print")
            .unwrap()
            .query_equal("type", "ether")
            .unwrap()
            .query_equal("running", "true")
            .unwrap()
            .query_operations([QueryOperator::And].into_iter())
            .build();
        let rendered = String::from_utf8_lossy(&cmd.data);
        assert!(rendered.contains("?#&"));
    }
}
