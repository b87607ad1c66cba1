//! # Room-Recorder Core
//!
//! Domain logic for the Room-Recorder webhook dispatcher.
//!
//! The service listens for LiveKit webhooks and, when a room starts, asks the
//! LiveKit egress service to record that room into one of four supported
//! cloud storage backends.
//!
//! ## Architecture
//!
//! - [`config`] resolves defaults, an optional YAML file and environment
//!   overrides into one immutable [`Configuration`].
//! - [`storage`] holds the closed set of upload destinations.
//! - [`webhook`] parses and authenticates inbound event envelopes.
//! - [`egress`] models the outbound recording request and the client seam.
//! - [`dispatcher`] ties the pieces together for a single delivery.
//!
//! Infrastructure (HTTP server, Twirp client) lives in `room-recorder-api` and
//! is injected through the [`WebhookAuthenticator`] and [`EgressClient`] traits.
//!
//! ## Usage
//!
//! ```rust
//! use room_recorder_core::{ConfigLayer, Configuration};
//!
//! let file = ConfigLayer::from_yaml(
//!     "livekit_api_key: key\nlivekit_api_secret: secret\nwebhook_api_key: key\nstorage:\n  s3:\n    bucket: recordings\n",
//!     |_| None,
//! )
//! .unwrap();
//!
//! let merged = ConfigLayer::defaults().merge(file);
//! let config = Configuration::from_layer(merged).unwrap();
//! assert_eq!(config.layout, "grid");
//! ```

pub mod config;
pub mod dispatcher;
pub mod egress;
pub mod storage;
pub mod token;
pub mod webhook;

pub use config::{ConfigError, ConfigLayer, ConfigResolver, Configuration, FileType};
pub use dispatcher::{DispatchOutcome, RecordingDispatcher};
pub use egress::{DispatchError, EgressClient, EgressInfo, RoomCompositeEgressRequest};
pub use storage::{StorageProvider, StorageSelection};
pub use webhook::{
    auth::{AuthError, KeyProvider, SimpleKeyProvider, TokenWebhookAuthenticator, WebhookAuthenticator},
    InboundEvent, ParseError,
};
