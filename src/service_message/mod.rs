// src/service_message/mod.rs

//! Service messages: a sideband protocol inside script stdout
//!
//! Scripts talk back to the agent by printing specially formatted lines
//! among their ordinary output. The [`codec`] turns characters into
//! [`ServiceMessage`]s and back; the [`sink`] applies their effects to a
//! running deployment.

pub mod codec;
pub mod names;
pub mod sink;

pub use codec::{DecoderState, MalformedMessage, ServiceMessageDecoder, encode, parse_body};
pub use names::MessageKind;
pub use sink::{Artifact, DeltaVerification, FoundPackage, ScriptOutputReport, ServiceMessageSink};

use std::fmt;

/// A decoded message: a name plus case-insensitive text properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceMessage {
    name: String,
    properties: Vec<(String, String)>,
}

impl ServiceMessage {
    /// Create a message with no properties
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Message that sets a variable in the agent
    pub fn set_variable(name: &str, value: &str, sensitive: bool) -> Self {
        let message = Self::new(names::SET_VARIABLE)
            .with_property(names::attr::NAME, name)
            .with_property(names::attr::VALUE, value);
        if sensitive {
            message.with_property(names::attr::SENSITIVE, "True")
        } else {
            message
        }
    }

    /// Builder form of [`push_property`](Self::push_property)
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_property(key, value);
        self
    }

    /// Set a property, replacing any existing one with the same key
    pub fn push_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.properties.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
            Some(existing) => existing.1 = value,
            None => self.properties.push((key, value)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Property value, looked up case-insensitively
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Properties in wire order
    pub fn properties(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Recognized kind, if any
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_name(&self.name)
    }

    /// Wire form
    pub fn encode(&self) -> String {
        codec::encode(self)
    }
}

impl fmt::Display for ServiceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_properties() {
        let message = ServiceMessage::new("createArtifact")
            .with_property("Path", "/tmp/out.zip")
            .with_property("PATH", "/tmp/other.zip");
        assert_eq!(message.properties().count(), 1);
        assert_eq!(message.get("path"), Some("/tmp/other.zip"));
    }

    #[test]
    fn test_set_variable_constructor() {
        let plain = ServiceMessage::set_variable("A", "1", false);
        assert_eq!(plain.get("sensitive"), None);

        let secret = ServiceMessage::set_variable("A", "1", true);
        assert_eq!(secret.get("Sensitive"), Some("True"));
        assert_eq!(secret.kind(), Some(MessageKind::SetVariable));
    }

    #[test]
    fn test_display_is_wire_form() {
        let message = ServiceMessage::new("stdout-verbose");
        assert_eq!(message.to_string(), "##octopus[stdout-verbose]");
    }
}
