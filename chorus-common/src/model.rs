//! Identifier newtypes and playback types shared across the chorus crates

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one shared playback session.
///
/// Maps 1:1 to the audio channel the session is bound to; the registry
/// guarantees at most one live session per id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

/// Identifier of a voice/audio channel on the platform side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

/// Identifier of a human participant (the automated entity is never one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

/// Opaque track handle understood by the audio node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! impl_display {
    ($($t:ty),*) => {$(
        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    )*};
}

impl_display!(SessionId, ChannelId, ParticipantId, TrackId);

/// One queued track. Immutable once created; the requester identity is used
/// by the skip authorization rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub requester: ParticipantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Equalizer presets supported by the audio node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqPreset {
    Flat,
    Boost,
    Metal,
    Piano,
}

impl EqPreset {
    /// Parse a user-supplied preset name (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "flat" => Some(EqPreset::Flat),
            "boost" => Some(EqPreset::Boost),
            "metal" => Some(EqPreset::Metal),
            "piano" => Some(EqPreset::Piano),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EqPreset::Flat => "flat",
            EqPreset::Boost => "boost",
            EqPreset::Metal => "metal",
            EqPreset::Piano => "piano",
        }
    }
}

impl fmt::Display for EqPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action kinds subject to collective authorization.
///
/// Fixed enumeration keyed at definition time; every kind has exactly one
/// vote set in the session ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Pause,
    Resume,
    Skip,
    Stop,
    Shuffle,
    Repeat,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::Pause,
        ActionKind::Resume,
        ActionKind::Skip,
        ActionKind::Stop,
        ActionKind::Shuffle,
        ActionKind::Repeat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Pause => "pause",
            ActionKind::Resume => "resume",
            ActionKind::Skip => "skip",
            ActionKind::Stop => "stop",
            ActionKind::Shuffle => "shuffle",
            ActionKind::Repeat => "repeat",
        }
    }

    /// Track-scoped vote sets reset whenever a new track becomes current;
    /// session-scoped sets persist until pass or session teardown.
    pub fn is_track_scoped(&self) -> bool {
        matches!(
            self,
            ActionKind::Skip | ActionKind::Shuffle | ActionKind::Repeat
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
