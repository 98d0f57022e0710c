use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One chat turn as it streams in.
///
/// Deltas are kept in arrival order next to the concatenated content. Once the
/// transport signals completion the message is frozen and further appends fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    role: Role,
    deltas: Vec<String>,
    content: String,
    complete: bool,
}

impl Message {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            deltas: Vec::new(),
            content: String::new(),
            complete: false,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn deltas(&self) -> &[String] {
        &self.deltas
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn push_delta(&mut self, text: &str) -> Result<()> {
        if self.complete {
            bail!("cannot append to a completed {} message", self.role.as_str());
        }
        if text.is_empty() {
            return Ok(());
        }
        self.deltas.push(text.to_string());
        self.content.push_str(text);
        Ok(())
    }

    pub fn complete(&mut self) {
        self.complete = true;
    }
}

/// Inbound events from the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Delta { role: Role, text: String },
    Complete,
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_concatenates_deltas_in_order() {
        let mut message = Message::new(Role::Assistant);
        message.push_delta("Here ").expect("first delta");
        message.push_delta("").expect("empty delta is ignored");
        message.push_delta("is code").expect("second delta");

        assert_eq!(message.content(), "Here is code");
        assert_eq!(message.deltas(), ["Here ", "is code"]);
    }

    #[test]
    fn test_completed_message_rejects_appends() {
        let mut message = Message::new(Role::User);
        message.push_delta("hi").expect("delta before completion");
        message.complete();

        let err = message
            .push_delta(" again")
            .expect_err("completed message must be immutable");
        assert!(err.to_string().contains("completed user message"));
        assert_eq!(message.content(), "hi");
    }

    #[test]
    fn test_role_parse_accepts_known_roles_only() {
        assert_eq!(Role::parse(" Assistant "), Some(Role::Assistant));
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("system"), None);
    }
}
