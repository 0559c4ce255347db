//! Event types for the chorus event system
//!
//! Two kinds of events flow through the coordinator:
//! - `ChorusEvent`: broadcast to presentation-layer subscribers (SSE)
//! - `NodeEvent`: emitted asynchronously by the external audio node
//!
//! Communication pattern:
//! - **EventBus** (tokio::broadcast): one-to-many event broadcasting
//! - **Shared state** (Arc + per-session lock): serialized mutation

use crate::model::{ActionKind, ChannelId, ParticipantId, SessionId, Track};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Coordinator events broadcast to all SSE listeners
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChorusEvent {
    /// Session connected to an audio channel
    SessionConnected {
        session_id: SessionId,
        channel_id: ChannelId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track became current and playback started
    TrackStarted {
        session_id: SessionId,
        track: Track,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue contents changed (enqueue, shuffle, repeat, advance)
    QueueChanged {
        session_id: SessionId,
        queue_len: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Paused flag flipped
    PlaybackStateChanged {
        session_id: SessionId,
        paused: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Volume changed (0-100 user scale)
    VolumeChanged {
        session_id: SessionId,
        volume: u8,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Equalizer preset changed
    EqualizerChanged {
        session_id: SessionId,
        preset: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A vote for an action reached quorum and the action executed
    VotePassed {
        session_id: SessionId,
        action: ActionKind,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A vote was accumulated but quorum is not yet reached
    VotePending {
        session_id: SessionId,
        action: ActionKind,
        actor: ParticipantId,
        remaining: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The audio node reported a track error; queue advanced past it
    TrackErrored {
        session_id: SessionId,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session stopped and destroyed (queue cleared, node disconnected)
    SessionStopped {
        session_id: SessionId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Coalesced refresh notification for sessions with pending UI updates
    SessionUpdated {
        session_id: SessionId,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ChorusEvent {
    /// Get event type as string for SSE event naming and filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            ChorusEvent::SessionConnected { .. } => "SessionConnected",
            ChorusEvent::TrackStarted { .. } => "TrackStarted",
            ChorusEvent::QueueChanged { .. } => "QueueChanged",
            ChorusEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            ChorusEvent::VolumeChanged { .. } => "VolumeChanged",
            ChorusEvent::EqualizerChanged { .. } => "EqualizerChanged",
            ChorusEvent::VotePassed { .. } => "VotePassed",
            ChorusEvent::VotePending { .. } => "VotePending",
            ChorusEvent::TrackErrored { .. } => "TrackErrored",
            ChorusEvent::SessionStopped { .. } => "SessionStopped",
            ChorusEvent::SessionUpdated { .. } => "SessionUpdated",
        }
    }
}

/// Events emitted asynchronously by the external audio node
///
/// Tagged enum matched exhaustively by the session state machine; a
/// `TrackErrored` advances the queue exactly like `TrackEnded` and is
/// additionally surfaced to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeEvent {
    /// The current track finished playing (or was stopped for a skip)
    TrackEnded { session_id: SessionId },

    /// The current track failed; carries the node's error description
    TrackErrored { session_id: SessionId, error: String },
}

impl NodeEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            NodeEvent::TrackEnded { session_id } => *session_id,
            NodeEvent::TrackErrored { session_id, .. } => *session_id,
        }
    }
}

/// Broadcast bus carrying `ChorusEvent`s to all subscribers
pub struct EventBus {
    tx: broadcast::Sender<ChorusEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ChorusEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`; errors when no subscriber is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ChorusEvent,
    ) -> Result<usize, broadcast::error::SendError<ChorusEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    pub fn emit_lossy(&self, event: ChorusEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
