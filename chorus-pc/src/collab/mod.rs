//! Collaborator contracts
//!
//! The coordinator never streams audio or stores membership itself; both
//! concerns belong to external services reached through the traits below.
//! The session state machine holds trait objects so tests can substitute
//! in-process fakes for the HTTP-backed implementations.

pub mod http;
#[cfg(test)]
pub(crate) mod mock;

use crate::error::Result;
use async_trait::async_trait;
use chorus_common::model::{ChannelId, EqPreset, ParticipantId, SessionId, Track, TrackId};
use std::collections::HashSet;
use std::fmt;

pub use http::{HttpAudioNode, HttpMembership};

/// Track metadata returned by resolution, before a requester is attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrack {
    pub id: TrackId,
    pub title: String,
    pub duration_ms: Option<u64>,
}

/// Result of resolving a free-text or URL query into playable tracks.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// Single playable track
    Track(ResolvedTrack),
    /// A playlist; all tracks are enqueued together
    Playlist {
        name: String,
        tracks: Vec<ResolvedTrack>,
    },
    /// Nothing matched the query
    NotFound,
}

/// Capability grants queried against the membership source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Platform-level session management grant; bypasses voting
    ManageSession,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ManageSession => "manage_session",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External audio transport/decoding node.
///
/// Accepts playback commands for a given session and emits `NodeEvent`s
/// asynchronously (delivered to the registry via the node callback route).
#[async_trait]
pub trait AudioNode: Send + Sync {
    /// Bind the session to an audio channel
    async fn connect(&self, session_id: SessionId, channel: ChannelId) -> Result<()>;

    /// Release the session's audio connection
    async fn disconnect(&self, session_id: SessionId) -> Result<()>;

    /// Start playing a track; a later `TrackEnded` reports completion
    async fn play(&self, session_id: SessionId, track: &Track) -> Result<()>;

    /// Stop the current track (emits `TrackEnded` on the node side)
    async fn stop(&self, session_id: SessionId) -> Result<()>;

    async fn set_paused(&self, session_id: SessionId, paused: bool) -> Result<()>;

    async fn set_volume(&self, session_id: SessionId, volume: u8) -> Result<()>;

    async fn set_equalizer(&self, session_id: SessionId, preset: EqPreset) -> Result<()>;

    /// Resolve a query into track metadata
    async fn resolve(&self, query: &str) -> Result<Resolved>;
}

/// Identity/membership source.
///
/// Supplies per-channel participant lists (the automated entity is never
/// included) and boolean capability grants.
#[async_trait]
pub trait MembershipSource: Send + Sync {
    /// Human members of the channel
    async fn channel_members(&self, channel: ChannelId) -> Result<HashSet<ParticipantId>>;

    /// Whether the actor holds the capability in the channel context
    async fn has_capability(
        &self,
        actor: ParticipantId,
        capability: Capability,
        channel: ChannelId,
    ) -> Result<bool>;

    /// The channel the actor is currently joined to, if any
    async fn actor_channel(
        &self,
        session_id: SessionId,
        actor: ParticipantId,
    ) -> Result<Option<ChannelId>>;
}
