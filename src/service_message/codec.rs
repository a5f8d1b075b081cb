// src/service_message/codec.rs

//! Wire form of service messages
//!
//! ```text
//! ##octopus[<name> <key>='<base64(value)>' ...]
//! ```
//!
//! The decoder is a small state machine fed one character at a time. Its
//! state survives across chunks and lines, so a message split by the pipe
//! or wrapped over several lines still decodes. Anything that does not
//! parse is dropped; decoding never fails the caller.

use super::ServiceMessage;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use thiserror::Error;
use tracing::debug;

/// Literal introducing a message; matched case-sensitively
pub const PREFIX: &str = "##octopus";

/// Upper bound on a buffered message body
const MAX_MESSAGE_LEN: usize = 4 * 1024 * 1024;

/// Why a message body was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedMessage {
    #[error("message has no name")]
    MissingName,

    #[error("invalid message name '{0}'")]
    InvalidName(String),

    #[error("expected key='value' at '{0}'")]
    InvalidAttribute(String),

    #[error("attribute '{0}' is not terminated")]
    UnterminatedValue(String),

    #[error("attribute '{0}' appears more than once")]
    DuplicateAttribute(String),

    #[error("attribute '{0}' is not valid base64")]
    InvalidBase64(String),

    #[error("attribute '{0}' is not valid UTF-8")]
    InvalidUtf8(String),
}

/// Encode a message as a single wire line
///
/// Values are base64 encoded and single-quoted, so any text (quotes,
/// brackets, newlines, multi-byte characters) survives transport.
pub fn encode(message: &ServiceMessage) -> String {
    let mut out = String::with_capacity(PREFIX.len() + message.name().len() + 2);
    out.push_str(PREFIX);
    out.push('[');
    out.push_str(message.name());
    for (key, value) in message.properties() {
        out.push(' ');
        out.push_str(key);
        out.push_str("='");
        out.push_str(&BASE64.encode(value.as_bytes()));
        out.push('\'');
    }
    out.push(']');
    out
}

/// Parse the text between `[` and `]`
///
/// CR and LF are removed first, so bodies wrapped over several lines parse.
/// Attribute values may use single or double quotes.
pub fn parse_body(body: &str) -> Result<ServiceMessage, MalformedMessage> {
    let cleaned: String = body.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    let text = cleaned.trim().trim_start_matches('[');

    let name_end = text.find(char::is_whitespace).unwrap_or(text.len());
    let name = &text[..name_end];
    if name.is_empty() {
        return Err(MalformedMessage::MissingName);
    }
    if !name.chars().all(is_name_char) {
        return Err(MalformedMessage::InvalidName(name.to_string()));
    }

    let mut message = ServiceMessage::new(name);
    let mut rest = text[name_end..].trim_start();

    while !rest.is_empty() {
        let eq = rest
            .find('=')
            .ok_or_else(|| MalformedMessage::InvalidAttribute(rest.to_string()))?;
        let key = rest[..eq].trim_end();
        if key.is_empty() || !key.chars().all(is_name_char) {
            return Err(MalformedMessage::InvalidAttribute(rest.to_string()));
        }

        let after_eq = rest[eq + 1..].trim_start();
        let quote = match after_eq.chars().next() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(MalformedMessage::InvalidAttribute(rest.to_string())),
        };
        let value_text = &after_eq[1..];
        let close = value_text
            .find(quote)
            .ok_or_else(|| MalformedMessage::UnterminatedValue(key.to_string()))?;
        let encoded = &value_text[..close];

        if message.get(key).is_some() {
            return Err(MalformedMessage::DuplicateAttribute(key.to_string()));
        }

        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| MalformedMessage::InvalidBase64(key.to_string()))?;
        let value = String::from_utf8(bytes).map_err(|_| MalformedMessage::InvalidUtf8(key.to_string()))?;
        message.push_property(key, value);

        rest = value_text[close + 1..].trim_start();
    }

    Ok(message)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

/// Decoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecoderState {
    /// Plain text
    #[default]
    Idle,
    /// Some leading characters of the prefix have been seen
    MaybePrefix { matched: usize },
    /// Inside `[ ... ]`, buffering the body
    InMessage,
}

/// Streaming decoder
#[derive(Debug, Default)]
pub struct ServiceMessageDecoder {
    state: DecoderState,
    buffer: String,
}

impl ServiceMessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Feed a chunk of output, returning every message it completes
    pub fn push(&mut self, chunk: &str) -> Vec<ServiceMessage> {
        chunk.chars().filter_map(|c| self.push_char(c)).collect()
    }

    /// Feed one character
    pub fn push_char(&mut self, c: char) -> Option<ServiceMessage> {
        match self.state {
            DecoderState::Idle => {
                if c == '#' {
                    self.state = DecoderState::MaybePrefix { matched: 1 };
                }
                None
            }
            DecoderState::MaybePrefix { matched } if matched == PREFIX.len() => {
                if c == '[' {
                    self.state = DecoderState::InMessage;
                    self.buffer.clear();
                } else {
                    self.state = Self::rematch(PREFIX, c);
                }
                None
            }
            DecoderState::MaybePrefix { matched } => {
                if PREFIX[matched..].starts_with(c) {
                    self.state = DecoderState::MaybePrefix { matched: matched + 1 };
                } else {
                    self.state = Self::rematch(&PREFIX[..matched], c);
                }
                None
            }
            DecoderState::InMessage => {
                if c == '[' && self.buffer.ends_with(PREFIX) {
                    // A new message started inside an unterminated one
                    debug!("Dropping unterminated service message body");
                    self.buffer.clear();
                    return None;
                }
                if c == ']' {
                    self.state = DecoderState::Idle;
                    let body = std::mem::take(&mut self.buffer);
                    match parse_body(&body) {
                        Ok(message) => Some(message),
                        Err(e) => {
                            debug!("Could not parse '{}[{}]': {}", PREFIX, body, e);
                            None
                        }
                    }
                } else {
                    if self.buffer.len() >= MAX_MESSAGE_LEN {
                        debug!("Dropping oversized service message body");
                        self.reset();
                        return None;
                    }
                    self.buffer.push(c);
                    None
                }
            }
        }
    }

    /// Discard any partial message
    pub fn reset(&mut self) {
        self.state = DecoderState::Idle;
        self.buffer.clear();
    }

    /// Longest prefix of `PREFIX` that ends `seen + c`, as the next state
    fn rematch(seen: &str, c: char) -> DecoderState {
        let mut candidate = String::with_capacity(seen.len() + 1);
        candidate.push_str(seen);
        candidate.push(c);

        let longest = (1..=PREFIX.len().min(candidate.len()))
            .rev()
            .find(|&k| candidate.ends_with(&PREFIX[..k]));

        match longest {
            Some(matched) => DecoderState::MaybePrefix { matched },
            None => DecoderState::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(text: &str) -> Vec<ServiceMessage> {
        ServiceMessageDecoder::new().push(text)
    }

    #[test]
    fn test_encode_set_variable() {
        let message = ServiceMessage::new("setVariable")
            .with_property("name", "Greeting")
            .with_property("value", "World");
        assert_eq!(
            encode(&message),
            "##octopus[setVariable name='R3JlZXRpbmc=' value='V29ybGQ=']"
        );
    }

    #[test]
    fn test_decode_with_surrounding_text() {
        let messages = decode_all("before ##octopus[setVariable name='R3JlZXRpbmc=' value='V29ybGQ='] after");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].name(), "setVariable");
        assert_eq!(messages[0].get("NAME"), Some("Greeting"));
        assert_eq!(messages[0].get("value"), Some("World"));
    }

    #[test]
    fn test_decode_double_quotes_and_no_attributes() {
        let messages = decode_all("##octopus[stdout-verbose]##octopus[resultMessage message=\"ZG9uZQ==\"]");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].name(), "stdout-verbose");
        assert_eq!(messages[0].properties().count(), 0);
        assert_eq!(messages[1].get("message"), Some("done"));
    }

    #[test]
    fn test_decode_across_chunks() {
        let wire = encode(&ServiceMessage::set_variable("Name", "Välue ✓", false));
        let mut decoder = ServiceMessageDecoder::new();
        let mut found = Vec::new();
        for piece in [&wire[..3], &wire[3..12], &wire[12..]] {
            found.extend(decoder.push(piece));
        }
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("value"), Some("Välue ✓"));
    }

    #[test]
    fn test_decode_body_wrapped_over_lines() {
        let messages = decode_all("##octopus[setVariable name='R3Jl\r\nZXRpbmc='\nvalue='V29ybGQ=']");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].get("name"), Some("Greeting"));
    }

    #[test]
    fn test_prefix_is_case_sensitive() {
        assert!(decode_all("##OCTOPUS[stdout-verbose]").is_empty());
        assert!(decode_all("##octopus stdout-verbose]").is_empty());
    }

    #[test]
    fn test_extra_hashes_before_prefix() {
        let messages = decode_all("###octopus[stdout-warning]");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].name(), "stdout-warning");
    }

    #[test]
    fn test_garbage_is_dropped_and_decoder_recovers() {
        let mut decoder = ServiceMessageDecoder::new();
        assert!(decoder.push("##octopus[setVariable name='!!!not base64']").is_empty());
        assert!(decoder.push("##octopus[name='x']").is_empty());
        assert!(decoder.push("##octopus[]").is_empty());
        assert_eq!(decoder.state(), DecoderState::Idle);

        let messages = decoder.push("##octopus[stdout-default]");
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_unterminated_message_does_not_swallow_later_ones() {
        let mut decoder = ServiceMessageDecoder::new();
        assert!(decoder.push("##octopus[not valid xml\n").is_empty());
        assert!(decoder.push("normal text\n").is_empty());

        let messages = decoder.push("##octopus[setVariable name='R3JlZXRpbmc=' value='V29ybGQ=']\n");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].get("name"), Some("Greeting"));
        assert_eq!(messages[0].get("value"), Some("World"));
        assert_eq!(decoder.state(), DecoderState::Idle);
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        assert_eq!(
            parse_body("setVariable name='eA==' NAME='eQ=='").unwrap_err(),
            MalformedMessage::DuplicateAttribute("NAME".to_string())
        );
    }

    #[test]
    fn test_unterminated_value_rejected() {
        assert!(matches!(
            parse_body("setVariable name='eA=="),
            Err(MalformedMessage::UnterminatedValue(_))
        ));
    }

    #[test]
    fn test_empty_value() {
        let message = parse_body("setVariable name='eA==' value=''").unwrap();
        assert_eq!(message.get("value"), Some(""));
    }
}
