//! Playback session state machine
//!
//! One `PlaybackSession` per audio channel, owning the track queue, the vote
//! ledger, the controller role and the playback settings. The single entry
//! point `request_action` runs the uniform authorization pipeline:
//! connected check, action preconditions, permission-gate bypass (or the
//! requester-skip rule), then the voting engine.
//!
//! Concurrency: all mutable state lives behind one `tokio::sync::Mutex`,
//! held for the full duration of a request including collaborator awaits.
//! Two concurrent vote casts for the same action therefore serialize, and
//! only one of them can observe the ledger size that completes quorum.

pub mod gate;
pub mod queue;
pub mod votes;

use crate::collab::{AudioNode, MembershipSource, Resolved};
use crate::error::{Error, Result};
use chorus_common::events::{ChorusEvent, EventBus, NodeEvent};
use chorus_common::model::{ActionKind, ChannelId, EqPreset, ParticipantId, SessionId, Track};
use queue::TrackQueue;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use votes::{VoteLedger, VoteOutcome};

/// Prefix instructing the audio node to run a free-text search instead of a
/// direct URL load.
const SEARCH_PREFIX: &str = "search:";

/// Default volume applied when a session first connects (0-100 user scale)
pub const DEFAULT_VOLUME: u8 = 40;

/// Audio connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// User-visible actions accepted by `request_action`
#[derive(Debug, Clone)]
pub enum Action {
    Connect { channel: Option<ChannelId> },
    Play { query: String },
    Pause,
    Resume,
    Skip,
    Stop,
    Shuffle,
    Repeat,
    SetVolume { volume: u8 },
    VolumeUp,
    VolumeDown,
    SetEqualizer { preset: EqPreset },
}

/// Outcome reported back to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Action executed (bypass, waiver or quorum reached)
    Executed,
    /// Tracks added to the queue
    Enqueued {
        count: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        playlist: Option<String>,
    },
    /// Vote accumulated; `remaining` more votes are needed
    VotePending { action: ActionKind, remaining: usize },
    /// The actor already holds a standing vote for this action
    AlreadyVoted { action: ActionKind },
    /// Nothing to do (already connected, already unpaused, ...)
    NoOp,
}

/// Read-only view of a session for the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub channel_id: Option<ChannelId>,
    pub state: ConnectionState,
    pub paused: bool,
    pub volume: u8,
    pub equalizer: EqPreset,
    pub controller: Option<ParticipantId>,
    pub current: Option<Track>,
    pub queue_len: usize,
}

/// Commands pushed to the audio node, enumerated so the bounded-retry loop
/// can re-issue them uniformly.
#[derive(Debug, Clone)]
enum NodeCall {
    Connect(ChannelId),
    Disconnect,
    Play(Track),
    Stop,
    SetPaused(bool),
    SetVolume(u8),
    SetEqualizer(EqPreset),
}

/// Mutable session state, serialized behind the per-session lock
struct SessionInner {
    channel: Option<ChannelId>,
    state: ConnectionState,
    controller: Option<ParticipantId>,
    paused: bool,
    volume: u8,
    equalizer: EqPreset,
    queue: TrackQueue,
    ledger: VoteLedger,
    /// Coalesces redundant presentation refreshes; flushed by the registry's
    /// periodic refresh task.
    update_pending: bool,
}

/// One shared playback session bound to one audio channel
pub struct PlaybackSession {
    id: SessionId,
    node: Arc<dyn AudioNode>,
    membership: Arc<dyn MembershipSource>,
    events: Arc<EventBus>,
    /// Number of retries (beyond the first attempt) for node commands
    retry_limit: usize,
    inner: Mutex<SessionInner>,
}

impl PlaybackSession {
    pub fn new(
        id: SessionId,
        node: Arc<dyn AudioNode>,
        membership: Arc<dyn MembershipSource>,
        events: Arc<EventBus>,
        retry_limit: usize,
    ) -> Self {
        Self {
            id,
            node,
            membership,
            events,
            retry_limit,
            inner: Mutex::new(SessionInner {
                channel: None,
                state: ConnectionState::Disconnected,
                controller: None,
                paused: false,
                volume: DEFAULT_VOLUME,
                equalizer: EqPreset::Flat,
                queue: TrackQueue::new(),
                ledger: VoteLedger::new(),
                update_pending: false,
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Single entry point for all user-visible actions.
    ///
    /// The per-session lock is held across the whole request, including
    /// collaborator calls, so a vote decision and its effect commit
    /// atomically with respect to other requests on this session.
    pub async fn request_action(
        &self,
        actor: ParticipantId,
        action: Action,
    ) -> Result<ActionOutcome> {
        let mut inner = self.inner.lock().await;
        debug!("Session {}: {:?} requested by {}", self.id, action, actor);

        match action {
            Action::Connect { channel } => self.connect(&mut inner, actor, channel).await,
            Action::Play { query } => self.play(&mut inner, actor, &query).await,
            Action::SetVolume { volume } => self.set_volume(&mut inner, actor, volume).await,
            Action::VolumeUp => self.ramp_volume(&mut inner, true).await,
            Action::VolumeDown => self.ramp_volume(&mut inner, false).await,
            Action::SetEqualizer { preset } => self.set_equalizer(&mut inner, preset).await,
            Action::Pause => self.voted(&mut inner, actor, ActionKind::Pause).await,
            Action::Resume => self.voted(&mut inner, actor, ActionKind::Resume).await,
            Action::Skip => self.voted(&mut inner, actor, ActionKind::Skip).await,
            Action::Stop => self.voted(&mut inner, actor, ActionKind::Stop).await,
            Action::Shuffle => self.voted(&mut inner, actor, ActionKind::Shuffle).await,
            Action::Repeat => self.voted(&mut inner, actor, ActionKind::Repeat).await,
        }
    }

    /// Consume an asynchronous audio-node event.
    ///
    /// `TrackErrored` advances the queue exactly like `TrackEnded` and is
    /// additionally surfaced to subscribers.
    pub async fn handle_node_event(&self, event: &NodeEvent) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if let NodeEvent::TrackErrored { error, .. } = event {
            warn!("Session {}: track errored: {}", self.id, error);
            self.events.emit_lossy(ChorusEvent::TrackErrored {
                session_id: self.id,
                message: error.clone(),
                timestamp: chrono::Utc::now(),
            });
        }

        // A new track (or idleness) begins: track-scoped votes are void.
        inner.ledger.clear_track_scoped();
        inner.update_pending = true;
        self.start_next(&mut inner).await
    }

    /// Read-only snapshot for the presentation layer
    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock().await;
        SessionSnapshot {
            session_id: self.id,
            channel_id: inner.channel,
            state: inner.state,
            paused: inner.paused,
            volume: inner.volume,
            equalizer: inner.equalizer,
            controller: inner.controller,
            current: inner.queue.current().cloned(),
            queue_len: inner.queue.pending_len(),
        }
    }

    /// Up to `n` upcoming tracks in play order
    pub async fn upcoming(&self, n: usize) -> Vec<Track> {
        self.inner.lock().await.queue.upcoming(n)
    }

    /// True while a track is current on a connected session
    pub async fn is_playing(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.state == ConnectionState::Connected && !inner.queue.is_idle()
    }

    /// Take and reset the coalesced refresh flag
    pub async fn take_update_pending(&self) -> bool {
        let mut inner = self.inner.lock().await;
        std::mem::take(&mut inner.update_pending)
    }

    // ========================================================================
    // Connection and enqueue
    // ========================================================================

    async fn connect(
        &self,
        inner: &mut SessionInner,
        actor: ParticipantId,
        channel: Option<ChannelId>,
    ) -> Result<ActionOutcome> {
        let actor_channel = self
            .membership
            .actor_channel(self.id, actor)
            .await
            .unwrap_or(None);

        if inner.state == ConnectionState::Connected {
            return match actor_channel {
                Some(at) if Some(at) == inner.channel => Ok(ActionOutcome::NoOp),
                Some(_) => Err(Error::AlreadyElsewhere),
                // An actor in no channel has nothing to join from
                None => Err(Error::InvalidChannel),
            };
        }

        let target = channel.or(actor_channel).ok_or(Error::InvalidChannel)?;

        inner.state = ConnectionState::Connecting;
        if let Err(err) = self.push_node(NodeCall::Connect(target)).await {
            inner.state = ConnectionState::Disconnected;
            return Err(err);
        }
        inner.state = ConnectionState::Connected;
        inner.channel = Some(target);
        info!("Session {} connected to channel {}", self.id, target);

        // Pre-playback preparation: apply the session's settings to the node.
        // Best effort; a failure here does not undo the connection.
        if let Err(err) = self.node.set_equalizer(self.id, inner.equalizer).await {
            warn!("Session {}: equalizer preset push failed: {}", self.id, err);
        }
        if let Err(err) = self.node.set_volume(self.id, inner.volume).await {
            warn!("Session {}: volume push failed: {}", self.id, err);
        }

        self.events.emit_lossy(ChorusEvent::SessionConnected {
            session_id: self.id,
            channel_id: target,
            timestamp: chrono::Utc::now(),
        });
        Ok(ActionOutcome::Executed)
    }

    async fn play(
        &self,
        inner: &mut SessionInner,
        actor: ParticipantId,
        query: &str,
    ) -> Result<ActionOutcome> {
        if inner.state != ConnectionState::Connected {
            self.connect(inner, actor, None).await?;
        }

        if inner.controller.is_none() {
            inner.controller = Some(actor);
            info!("Session {}: controller set to {}", self.id, actor);
        }

        let query = normalize_query(query);
        let resolved = self.node.resolve(&query).await?;

        let (count, playlist) = match resolved {
            Resolved::NotFound => return Err(Error::NoTrackFound),
            Resolved::Track(meta) => {
                inner.queue.enqueue(Track {
                    id: meta.id,
                    title: meta.title,
                    requester: actor,
                    duration_ms: meta.duration_ms,
                });
                (1, None)
            }
            Resolved::Playlist { name, tracks } => {
                if tracks.is_empty() {
                    return Err(Error::NoTrackFound);
                }
                let count = tracks.len();
                for meta in tracks {
                    inner.queue.enqueue(Track {
                        id: meta.id,
                        title: meta.title,
                        requester: actor,
                        duration_ms: meta.duration_ms,
                    });
                }
                (count, Some(name))
            }
        };

        if inner.queue.is_idle() {
            self.start_next(inner).await?;
        }

        inner.update_pending = true;
        self.emit_queue_changed(inner);
        Ok(ActionOutcome::Enqueued { count, playlist })
    }

    /// Promote the head of the pending queue to current and start playback,
    /// or go idle when the queue is empty.
    async fn start_next(&self, inner: &mut SessionInner) -> Result<()> {
        let Some(track) = inner.queue.advance().cloned() else {
            debug!("Session {}: queue exhausted, going idle", self.id);
            self.emit_queue_changed(inner);
            return Ok(());
        };

        if let Err(err) = self.push_node(NodeCall::Play(track.clone())).await {
            // Do not keep a current track the node never accepted
            inner.queue.clear();
            return Err(err);
        }
        inner.paused = false;
        info!("Session {}: now playing {}", self.id, track.title);
        self.events.emit_lossy(ChorusEvent::TrackStarted {
            session_id: self.id,
            track,
            timestamp: chrono::Utc::now(),
        });
        self.emit_queue_changed(inner);
        Ok(())
    }

    // ========================================================================
    // Uniform authorization pipeline for voted actions
    // ========================================================================

    async fn voted(
        &self,
        inner: &mut SessionInner,
        actor: ParticipantId,
        kind: ActionKind,
    ) -> Result<ActionOutcome> {
        if inner.state != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }
        let channel = inner.channel.ok_or(Error::NotConnected)?;

        // Action-specific preconditions, checked before any mutation
        match kind {
            ActionKind::Pause if inner.paused => return Ok(ActionOutcome::NoOp),
            ActionKind::Resume if !inner.paused => return Ok(ActionOutcome::NoOp),
            ActionKind::Shuffle if inner.queue.pending_len() < 3 => {
                return Err(Error::InvalidArgument(
                    "at least 3 queued tracks are needed to shuffle".to_string(),
                ));
            }
            ActionKind::Skip | ActionKind::Repeat if inner.queue.is_idle() => {
                return Err(Error::InvalidArgument(
                    "no track is currently playing".to_string(),
                ));
            }
            _ => {}
        }

        // The requester of the current track may always skip it, independent
        // of the permission gate.
        if kind == ActionKind::Skip {
            let is_requester = inner
                .queue
                .current()
                .map(|track| track.requester == actor)
                .unwrap_or(false);
            if is_requester {
                debug!("Session {}: requester {} skips own track", self.id, actor);
                self.execute(inner, kind).await?;
                return Ok(ActionOutcome::Executed);
            }
        }

        if gate::may_bypass(self.membership.as_ref(), actor, inner.controller, channel).await {
            info!("Session {}: {} executed {} as privileged", self.id, actor, kind);
            self.execute(inner, kind).await?;
            return Ok(ActionOutcome::Executed);
        }

        let members = self.membership.channel_members(channel).await?;
        match inner.ledger.cast(actor, kind, &members) {
            VoteOutcome::AlreadyVoted => Ok(ActionOutcome::AlreadyVoted { action: kind }),
            VoteOutcome::Pending { remaining } => {
                self.events.emit_lossy(ChorusEvent::VotePending {
                    session_id: self.id,
                    action: kind,
                    actor,
                    remaining,
                    timestamp: chrono::Utc::now(),
                });
                Ok(ActionOutcome::VotePending {
                    action: kind,
                    remaining,
                })
            }
            VoteOutcome::Passed { voters } => {
                info!("Session {}: vote for {} passed", self.id, kind);
                match self.execute(inner, kind).await {
                    Ok(()) => {
                        self.events.emit_lossy(ChorusEvent::VotePassed {
                            session_id: self.id,
                            action: kind,
                            timestamp: chrono::Utc::now(),
                        });
                        Ok(ActionOutcome::Executed)
                    }
                    Err(err) => {
                        // The decision was committed but the effect was not:
                        // re-open the vote rather than silently losing it.
                        warn!(
                            "Session {}: {} passed but execution failed ({}); vote re-opened",
                            self.id, kind, err
                        );
                        inner.ledger.reopen(kind, &voters);
                        Err(err)
                    }
                }
            }
        }
    }

    /// Execute an authorized action's effects
    async fn execute(&self, inner: &mut SessionInner, kind: ActionKind) -> Result<()> {
        match kind {
            ActionKind::Pause => {
                self.push_node(NodeCall::SetPaused(true)).await?;
                inner.paused = true;
                self.emit_paused(inner);
            }
            ActionKind::Resume => {
                self.push_node(NodeCall::SetPaused(false)).await?;
                inner.paused = false;
                self.emit_paused(inner);
            }
            ActionKind::Skip => {
                // Stopping the current track makes the node emit TrackEnded,
                // which drives the queue advancement.
                self.push_node(NodeCall::Stop).await?;
            }
            ActionKind::Stop => {
                self.push_node(NodeCall::Stop).await?;
                self.push_node(NodeCall::Disconnect).await?;
                inner.queue.clear();
                inner.ledger.clear_all();
                inner.state = ConnectionState::Disconnected;
                inner.channel = None;
                inner.controller = None;
                inner.paused = false;
                info!("Session {} stopped", self.id);
                self.events.emit_lossy(ChorusEvent::SessionStopped {
                    session_id: self.id,
                    timestamp: chrono::Utc::now(),
                });
            }
            ActionKind::Shuffle => {
                inner.queue.shuffle();
                inner.update_pending = true;
                self.emit_queue_changed(inner);
            }
            ActionKind::Repeat => {
                if let Some(current) = inner.queue.current().cloned() {
                    if inner.queue.pending_len() == 0 {
                        inner.queue.enqueue(current);
                    } else {
                        inner.queue.push_front(current);
                    }
                    inner.update_pending = true;
                    self.emit_queue_changed(inner);
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Unvoted settings actions
    // ========================================================================

    async fn set_volume(
        &self,
        inner: &mut SessionInner,
        actor: ParticipantId,
        volume: u8,
    ) -> Result<ActionOutcome> {
        if inner.state != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }
        if !(1..=100).contains(&volume) {
            return Err(Error::InvalidArgument(
                "volume must be between 1 and 100".to_string(),
            ));
        }
        let channel = inner.channel.ok_or(Error::NotConnected)?;

        // Explicit volume levels are reserved for privileged actors in
        // larger sessions; small sessions may adjust freely.
        if !gate::may_bypass(self.membership.as_ref(), actor, inner.controller, channel).await {
            let members = self.membership.channel_members(channel).await?;
            if members.len() > 2 {
                debug!(
                    "Session {}: unprivileged volume change by {} ignored",
                    self.id, actor
                );
                return Ok(ActionOutcome::NoOp);
            }
        }

        self.apply_volume(inner, volume).await?;
        Ok(ActionOutcome::Executed)
    }

    async fn ramp_volume(&self, inner: &mut SessionInner, up: bool) -> Result<ActionOutcome> {
        if inner.state != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }
        let target = if up {
            step_up(inner.volume)
        } else {
            step_down(inner.volume)
        };
        if target == inner.volume {
            return Ok(ActionOutcome::NoOp);
        }
        self.apply_volume(inner, target).await?;
        Ok(ActionOutcome::Executed)
    }

    async fn apply_volume(&self, inner: &mut SessionInner, volume: u8) -> Result<()> {
        self.push_node(NodeCall::SetVolume(volume)).await?;
        inner.volume = volume;
        inner.update_pending = true;
        self.events.emit_lossy(ChorusEvent::VolumeChanged {
            session_id: self.id,
            volume,
            timestamp: chrono::Utc::now(),
        });
        Ok(())
    }

    async fn set_equalizer(
        &self,
        inner: &mut SessionInner,
        preset: EqPreset,
    ) -> Result<ActionOutcome> {
        if inner.state != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }
        self.push_node(NodeCall::SetEqualizer(preset)).await?;
        inner.equalizer = preset;
        inner.update_pending = true;
        self.events.emit_lossy(ChorusEvent::EqualizerChanged {
            session_id: self.id,
            preset: preset.as_str().to_string(),
            timestamp: chrono::Utc::now(),
        });
        Ok(ActionOutcome::Executed)
    }

    // ========================================================================
    // Node command push with bounded retry
    // ========================================================================

    /// Issue one audio-node command, retrying up to `retry_limit` times.
    ///
    /// Callers decide what to do when retries exhaust; for voted actions the
    /// passed vote is re-opened so the decision is not silently lost.
    async fn push_node(&self, call: NodeCall) -> Result<()> {
        let mut attempt = 0;
        loop {
            let result = match &call {
                NodeCall::Connect(channel) => self.node.connect(self.id, *channel).await,
                NodeCall::Disconnect => self.node.disconnect(self.id).await,
                NodeCall::Play(track) => self.node.play(self.id, track).await,
                NodeCall::Stop => self.node.stop(self.id).await,
                NodeCall::SetPaused(paused) => self.node.set_paused(self.id, *paused).await,
                NodeCall::SetVolume(volume) => self.node.set_volume(self.id, *volume).await,
                NodeCall::SetEqualizer(preset) => self.node.set_equalizer(self.id, *preset).await,
            };
            match result {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.retry_limit => {
                    attempt += 1;
                    warn!(
                        "Session {}: node command failed ({}), retry {}/{}",
                        self.id, err, attempt, self.retry_limit
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn emit_queue_changed(&self, inner: &SessionInner) {
        self.events.emit_lossy(ChorusEvent::QueueChanged {
            session_id: self.id,
            queue_len: inner.queue.pending_len(),
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit_paused(&self, inner: &SessionInner) {
        self.events.emit_lossy(ChorusEvent::PlaybackStateChanged {
            session_id: self.id,
            paused: inner.paused,
            timestamp: chrono::Utc::now(),
        });
    }
}

/// Step the volume up to the next multiple of 10, clamped to 100
fn step_up(volume: u8) -> u8 {
    let stepped = (volume as u32 + 19) / 10 * 10;
    stepped.min(100) as u8
}

/// Step the volume down to the previous multiple of 10, clamped to 0
fn step_down(volume: u8) -> u8 {
    let base = volume.saturating_sub(10) as u32;
    (base.div_ceil(10) * 10) as u8
}

/// Strip angle-bracket quoting and turn non-URL queries into node searches
fn normalize_query(query: &str) -> String {
    let query = query.trim().trim_matches(|c| c == '<' || c == '>');
    if query.starts_with("http://") || query.starts_with("https://") {
        query.to_string()
    } else {
        format!("{}{}", SEARCH_PREFIX, query)
    }
}
