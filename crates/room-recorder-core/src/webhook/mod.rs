//! # Webhook Events
//!
//! Parsing of LiveKit webhook envelopes. Parsing is split in two so that
//! deliveries the service does not act on are only decoded far enough to read
//! their `event` tag.
//!
//! Authentication of the raw delivery lives in [`auth`].

use serde::{Deserialize, Deserializer};

pub mod auth;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

/// Event tag that triggers a recording
pub const ROOM_STARTED: &str = "room_started";

/// Errors for payloads that cannot be interpreted
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid webhook payload: {message}")]
    InvalidJson { message: String },

    #[error("Webhook payload is missing required field '{field}'")]
    MissingField { field: String },
}

impl ParseError {
    fn invalid(error: serde_json::Error) -> Self {
        Self::InvalidJson {
            message: error.to_string(),
        }
    }

    fn missing(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
        }
    }
}

/// Room described by a room event
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Room {
    pub sid: String,
    pub name: String,
}

/// A decoded webhook envelope
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundEvent {
    pub event: String,
    #[serde(default)]
    pub id: String,
    /// Unix seconds; LiveKit sends this as a string or a number
    #[serde(
        default,
        rename = "createdAt",
        alias = "created_at",
        deserialize_with = "deserialize_timestamp"
    )]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub room: Option<Room>,
}

impl InboundEvent {
    pub fn is_room_started(&self) -> bool {
        self.event == ROOM_STARTED
    }

    /// Room a `room_started` event refers to.
    ///
    /// # Errors
    /// `ParseError::MissingField` when the room or its name is absent.
    pub fn started_room(&self) -> Result<&Room, ParseError> {
        match &self.room {
            Some(room) if !room.name.is_empty() => Ok(room),
            Some(_) => Err(ParseError::missing("room.name")),
            None => Err(ParseError::missing("room")),
        }
    }
}

#[derive(Deserialize)]
struct EventTag {
    #[serde(default)]
    event: Option<String>,
}

/// Read only the `event` tag of a payload.
///
/// An absent or `null` tag reads as the empty string, so such deliveries are
/// simply not `room_started`. Only invalid JSON or a non-string tag fails.
pub fn peek_event_type(body: &[u8]) -> Result<String, ParseError> {
    let tag: EventTag = serde_json::from_slice(body).map_err(ParseError::invalid)?;
    Ok(tag.event.unwrap_or_default())
}

/// Decode the full envelope
pub fn parse_event(body: &[u8]) -> Result<InboundEvent, ParseError> {
    serde_json::from_slice(body).map_err(ParseError::invalid)
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timestamp {
        Number(i64),
        Text(String),
    }

    match Option::<Timestamp>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Timestamp::Number(seconds)) => Ok(Some(seconds)),
        Some(Timestamp::Text(text)) if text.is_empty() => Ok(None),
        Some(Timestamp::Text(text)) => text
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid timestamp '{}'", text))),
    }
}
