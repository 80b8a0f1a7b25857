//! Routable events.
//!
//! A [`RoutableEvent`] is what travels through the message hub: a payload,
//! the character that caused it (if any) and the hop path describing where
//! it has been so far.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::source::Source;

// ============================================================================
// Event Kind
// ============================================================================

/// What a routable event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A chat message; the payload is the message text.
    #[default]
    Message,
    /// A presence change; the payload describes who came online or left.
    Online,
    /// Any other structured event.
    Event,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Online => "online",
            Self::Event => "event",
        }
    }
}

impl FromStr for EventKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "message" => Self::Message,
            "online" => Self::Online,
            "event" => Self::Event,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Character
// ============================================================================

/// The character an event is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<u32>,
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            dimension: None,
        }
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }
}

// ============================================================================
// RoutableEvent
// ============================================================================

/// An event submitted to the message hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutableEvent {
    #[serde(rename = "type", default)]
    pub kind: EventKind,
    #[serde(default)]
    pub path: Vec<Source>,
    #[serde(rename = "char", default, skip_serializing_if = "Option::is_none")]
    pub character: Option<Character>,
    #[serde(default)]
    pub data: Value,
}

impl RoutableEvent {
    /// A chat message from `path` with the given text.
    pub fn message(path: Vec<Source>, text: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Message,
            path,
            character: None,
            data: Value::String(text.into()),
        }
    }

    pub fn with_character(mut self, character: Character) -> Self {
        self.character = Some(character);
        self
    }

    /// The message text, if the payload is a string.
    pub fn text(&self) -> Option<&str> {
        self.data.as_str()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.data = Value::String(text.into());
    }

    pub fn first_hop(&self) -> Option<&Source> {
        self.path.first()
    }

    pub fn last_hop(&self) -> Option<&Source> {
        self.path.last()
    }

    /// Adds a hop in front of the path. Used when an event arrives from
    /// another bot and must be attributed to the relay it came through.
    pub fn prepend_hop(&mut self, hop: Source) {
        self.path.insert(0, hop);
    }

    pub fn append_hop(&mut self, hop: Source) {
        self.path.push(hop);
    }
}
