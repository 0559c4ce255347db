//! # Chorus Common Library
//!
//! Shared code for the chorus playback coordinator:
//! - Identifier newtypes and shared playback types
//! - Event types (`ChorusEvent`, `NodeEvent`) and the `EventBus`
//! - Common error type
//! - Bootstrap configuration file resolution

pub mod config;
pub mod error;
pub mod events;
pub mod model;

pub use error::{Error, Result};
pub use events::{ChorusEvent, EventBus, NodeEvent};
pub use model::{ActionKind, ChannelId, EqPreset, ParticipantId, SessionId, Track, TrackId};
