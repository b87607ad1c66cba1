//! Per-delivery recording dispatch.
//!
//! Runs after the delivery has been authenticated: filters on the event tag,
//! builds the egress request for `room_started` and awaits the egress call.
//! The outcome of the call is logged and reported but never retried.

use crate::config::Configuration;
use crate::egress::{EgressClient, RoomCompositeEgressRequest};
use crate::webhook::{parse_event, peek_event_type, ParseError, ROOM_STARTED};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;

/// What happened to an authenticated delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Event type the service does not act on
    Ignored { event: String },
    Dispatched { room: String, egress_id: String },
    /// The egress call failed; the delivery is still acknowledged
    Failed { room: String, error: String },
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignored { .. } => "ignored",
            Self::Dispatched { .. } => "dispatched",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Turns `room_started` events into room-composite egress requests
#[derive(Clone)]
pub struct RecordingDispatcher {
    config: Arc<Configuration>,
    egress: Arc<dyn EgressClient>,
}

impl RecordingDispatcher {
    pub fn new(config: Arc<Configuration>, egress: Arc<dyn EgressClient>) -> Self {
        Self { config, egress }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Handle one authenticated delivery body.
    ///
    /// # Errors
    /// `ParseError` when the body is not a usable event envelope. Egress
    /// failures are not errors; they are reported as
    /// [`DispatchOutcome::Failed`].
    #[instrument(skip_all, fields(body_len = body.len()))]
    pub async fn dispatch(&self, body: &[u8]) -> Result<DispatchOutcome, ParseError> {
        let event_type = peek_event_type(body)?;
        if event_type != ROOM_STARTED {
            debug!(event = %event_type, "Ignoring webhook event");
            return Ok(DispatchOutcome::Ignored { event: event_type });
        }

        let event = parse_event(body)?;
        let room = event.started_room()?;
        info!(
            room = %room.name,
            room_sid = %room.sid,
            event_id = %event.id,
            "Room started, requesting recording"
        );

        let request = RoomCompositeEgressRequest::for_room(&self.config, &room.name);
        match self.egress.start_room_composite_egress(request).await {
            Ok(info) => {
                info!(
                    room = %room.name,
                    egress_id = %info.egress_id,
                    storage = %self.config.storage.provider(),
                    "Recording started"
                );
                Ok(DispatchOutcome::Dispatched {
                    room: room.name.clone(),
                    egress_id: info.egress_id,
                })
            }
            Err(e) => {
                error!(room = %room.name, error = %e, "Failed to start recording");
                Ok(DispatchOutcome::Failed {
                    room: room.name.clone(),
                    error: e.to_string(),
                })
            }
        }
    }
}
