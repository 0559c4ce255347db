//! # Chorus Playback Coordinator (chorus-pc)
//!
//! Shared-control playback coordination for multi-participant listening
//! sessions.
//!
//! **Purpose:** Manage per-channel playback sessions in which control is
//! shared by the participants: actions either bypass voting (privileged
//! actors, track requesters) or accumulate votes until a quorum of the
//! channel's members agrees.
//!
//! **Architecture:** One `PlaybackSession` state machine per audio channel,
//! held in a `SessionRegistry`, fronted by an HTTP/SSE control interface.
//! Audio output and membership lookups are delegated to external
//! collaborators behind the `AudioNode` and `MembershipSource` traits.

pub mod api;
pub mod collab;
pub mod config;
pub mod error;
pub mod registry;
pub mod session;

pub use error::{Error, Result};
pub use registry::SessionRegistry;
pub use session::{Action, ActionOutcome, PlaybackSession};
