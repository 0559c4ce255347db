//! In-process collaborator fakes for unit tests
//!
//! Record every command issued to the audio node and serve membership from
//! plain maps, with counters to inject collaborator failures.

use crate::collab::{AudioNode, Capability, MembershipSource, Resolved};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chorus_common::model::{ChannelId, EqPreset, ParticipantId, SessionId, Track, TrackId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeCommand {
    Connect(SessionId, ChannelId),
    Disconnect(SessionId),
    Play(SessionId, TrackId),
    Stop(SessionId),
    SetPaused(SessionId, bool),
    SetVolume(SessionId, u8),
    SetEqualizer(SessionId, EqPreset),
}

/// Audio node fake recording issued commands
#[derive(Default)]
pub struct MockAudioNode {
    commands: Mutex<Vec<NodeCommand>>,
    /// Number of upcoming commands to fail with `CollaboratorFailure`
    fail_next: AtomicUsize,
    resolve_result: Mutex<Option<Resolved>>,
}

impl MockAudioNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<NodeCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn last_command(&self) -> Option<NodeCommand> {
        self.commands.lock().unwrap().last().cloned()
    }

    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn set_resolve_result(&self, resolved: Resolved) {
        *self.resolve_result.lock().unwrap() = Some(resolved);
    }

    fn record(&self, command: NodeCommand) -> Result<()> {
        if self.fail_next.load(Ordering::SeqCst) > 0 {
            self.fail_next.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::CollaboratorFailure("mock node failure".to_string()));
        }
        self.commands.lock().unwrap().push(command);
        Ok(())
    }
}

#[async_trait]
impl AudioNode for MockAudioNode {
    async fn connect(&self, session_id: SessionId, channel: ChannelId) -> Result<()> {
        self.record(NodeCommand::Connect(session_id, channel))
    }

    async fn disconnect(&self, session_id: SessionId) -> Result<()> {
        self.record(NodeCommand::Disconnect(session_id))
    }

    async fn play(&self, session_id: SessionId, track: &Track) -> Result<()> {
        self.record(NodeCommand::Play(session_id, track.id))
    }

    async fn stop(&self, session_id: SessionId) -> Result<()> {
        self.record(NodeCommand::Stop(session_id))
    }

    async fn set_paused(&self, session_id: SessionId, paused: bool) -> Result<()> {
        self.record(NodeCommand::SetPaused(session_id, paused))
    }

    async fn set_volume(&self, session_id: SessionId, volume: u8) -> Result<()> {
        self.record(NodeCommand::SetVolume(session_id, volume))
    }

    async fn set_equalizer(&self, session_id: SessionId, preset: EqPreset) -> Result<()> {
        self.record(NodeCommand::SetEqualizer(session_id, preset))
    }

    async fn resolve(&self, _query: &str) -> Result<Resolved> {
        Ok(self
            .resolve_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Resolved::NotFound))
    }
}

/// Membership fake backed by plain maps
#[derive(Default)]
pub struct MockMembership {
    members: Mutex<HashMap<ChannelId, HashSet<ParticipantId>>>,
    managers: Mutex<HashSet<ParticipantId>>,
    locations: Mutex<HashMap<ParticipantId, ChannelId>>,
    fail_next: AtomicUsize,
}

impl MockMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `ids` in the channel and record their locations
    pub fn set_members(&self, channel: ChannelId, ids: &[u64]) {
        let set: HashSet<ParticipantId> = ids.iter().map(|id| ParticipantId(*id)).collect();
        for id in &set {
            self.locations.lock().unwrap().insert(*id, channel);
        }
        self.members.lock().unwrap().insert(channel, set);
    }

    pub fn grant_manage(&self, actor: ParticipantId) {
        self.managers.lock().unwrap().insert(actor);
    }

    pub fn locate(&self, actor: ParticipantId, channel: ChannelId) {
        self.locations.lock().unwrap().insert(actor, channel);
    }

    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<()> {
        if self.fail_next.load(Ordering::SeqCst) > 0 {
            self.fail_next.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::CollaboratorFailure(
                "mock membership failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MembershipSource for MockMembership {
    async fn channel_members(&self, channel: ChannelId) -> Result<HashSet<ParticipantId>> {
        self.check_failure()?;
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(&channel)
            .cloned()
            .unwrap_or_default())
    }

    async fn has_capability(
        &self,
        actor: ParticipantId,
        capability: Capability,
        _channel: ChannelId,
    ) -> Result<bool> {
        self.check_failure()?;
        match capability {
            Capability::ManageSession => Ok(self.managers.lock().unwrap().contains(&actor)),
        }
    }

    async fn actor_channel(
        &self,
        _session_id: SessionId,
        actor: ParticipantId,
    ) -> Result<Option<ChannelId>> {
        self.check_failure()?;
        Ok(self.locations.lock().unwrap().get(&actor).copied())
    }
}
