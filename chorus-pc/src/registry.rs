//! Session registry
//!
//! Owns the map from session id to live `PlaybackSession`. The registry lock
//! covers only lookup, creation and removal; all playback work happens under
//! the per-session lock after the registry lock is released.

use crate::collab::{AudioNode, MembershipSource};
use crate::session::PlaybackSession;
use chorus_common::events::{ChorusEvent, EventBus, NodeEvent};
use chorus_common::model::SessionId;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Aggregate coordinator statistics
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub sessions: usize,
    pub playing: usize,
    pub uptime_seconds: u64,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<PlaybackSession>>>,
    node: Arc<dyn AudioNode>,
    membership: Arc<dyn MembershipSource>,
    events: Arc<EventBus>,
    retry_limit: usize,
    started_at: Instant,
}

impl SessionRegistry {
    pub fn new(
        node: Arc<dyn AudioNode>,
        membership: Arc<dyn MembershipSource>,
        events: Arc<EventBus>,
        retry_limit: usize,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            node,
            membership,
            events,
            retry_limit,
            started_at: Instant::now(),
        }
    }

    /// Look up an existing session
    pub async fn get(&self, id: SessionId) -> Option<Arc<PlaybackSession>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Look up or lazily create the session for `id`.
    ///
    /// At most one session exists per id; concurrent callers receive the
    /// same instance.
    pub async fn get_or_create(&self, id: SessionId) -> Arc<PlaybackSession> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id)
            .or_insert_with(|| {
                info!("Creating session {}", id);
                Arc::new(PlaybackSession::new(
                    id,
                    self.node.clone(),
                    self.membership.clone(),
                    self.events.clone(),
                    self.retry_limit,
                ))
            })
            .clone()
    }

    /// Drop a session from the registry. Returns false when no such session
    /// exists.
    pub async fn remove(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!("Removed session {}", id);
        }
        removed
    }

    /// Route an audio-node event to its session.
    ///
    /// Events for unknown sessions are dropped; the node may still report on
    /// a session that was stopped moments earlier.
    pub async fn dispatch(&self, event: &NodeEvent) {
        let session = self.get(event.session_id()).await;
        match session {
            Some(session) => {
                if let Err(err) = session.handle_node_event(event).await {
                    warn!(
                        "Session {}: node event handling failed: {}",
                        event.session_id(),
                        err
                    );
                }
            }
            None => {
                debug!("Dropping node event for unknown session {}", event.session_id());
            }
        }
    }

    /// Emit one coalesced `SessionUpdated` per session whose state changed
    /// since the last flush.
    pub async fn flush_updates(&self) {
        let sessions: Vec<Arc<PlaybackSession>> =
            self.sessions.read().await.values().cloned().collect();
        for session in sessions {
            if session.take_update_pending().await {
                self.events.emit_lossy(ChorusEvent::SessionUpdated {
                    session_id: session.id(),
                    timestamp: chrono::Utc::now(),
                });
            }
        }
    }

    /// Spawn the periodic refresh task flushing coalesced updates
    pub fn spawn_refresh(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                registry.flush_updates().await;
            }
        })
    }

    pub async fn stats(&self) -> RegistryStats {
        let sessions: Vec<Arc<PlaybackSession>> =
            self.sessions.read().await.values().cloned().collect();
        let mut playing = 0;
        for session in &sessions {
            if session.is_playing().await {
                playing += 1;
            }
        }
        RegistryStats {
            sessions: sessions.len(),
            playing,
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::mock::{MockAudioNode, MockMembership};
    use crate::collab::{Resolved, ResolvedTrack};
    use crate::session::Action;
    use chorus_common::model::{ChannelId, ParticipantId, TrackId};

    fn registry_fixture() -> (Arc<SessionRegistry>, Arc<MockAudioNode>, Arc<MockMembership>) {
        let node = Arc::new(MockAudioNode::new());
        let membership = Arc::new(MockMembership::new());
        let events = Arc::new(EventBus::new(100));
        let registry = Arc::new(SessionRegistry::new(
            node.clone(),
            membership.clone(),
            events,
            2,
        ));
        (registry, node, membership)
    }

    #[tokio::test]
    async fn test_one_session_per_id() {
        let (registry, _, _) = registry_fixture();
        let a = registry.get_or_create(SessionId(1)).await;
        let b = registry.get_or_create(SessionId(1)).await;
        let c = registry.get_or_create(SessionId(2)).await;

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.stats().await.sessions, 2);
    }

    #[tokio::test]
    async fn test_remove() {
        let (registry, _, _) = registry_fixture();
        registry.get_or_create(SessionId(1)).await;

        assert!(registry.remove(SessionId(1)).await);
        assert!(!registry.remove(SessionId(1)).await);
        assert!(registry.get(SessionId(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_session_is_dropped() {
        let (registry, _, _) = registry_fixture();
        // Must not panic or create a session
        registry
            .dispatch(&NodeEvent::TrackEnded {
                session_id: SessionId(42),
            })
            .await;
        assert_eq!(registry.stats().await.sessions, 0);
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_session() {
        let (registry, node, membership) = registry_fixture();
        let channel = ChannelId(7);
        membership.set_members(channel, &[1]);
        node.set_resolve_result(Resolved::Track(ResolvedTrack {
            id: TrackId::new(),
            title: "song".to_string(),
            duration_ms: None,
        }));

        let session = registry.get_or_create(SessionId(1)).await;
        session
            .request_action(
                ParticipantId(1),
                Action::Play {
                    query: "song".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(session.is_playing().await);

        registry
            .dispatch(&NodeEvent::TrackEnded {
                session_id: SessionId(1),
            })
            .await;
        assert!(!session.is_playing().await);
    }

    #[tokio::test]
    async fn test_flush_updates_emits_once_per_dirty_session() {
        let node = Arc::new(MockAudioNode::new());
        let membership = Arc::new(MockMembership::new());
        let events = Arc::new(EventBus::new(100));
        let registry = Arc::new(SessionRegistry::new(
            node,
            membership.clone(),
            events.clone(),
            2,
        ));

        let channel = ChannelId(7);
        membership.set_members(channel, &[1]);
        let session = registry.get_or_create(SessionId(1)).await;
        registry.get_or_create(SessionId(2)).await; // stays clean

        session
            .request_action(ParticipantId(1), Action::Connect { channel: None })
            .await
            .unwrap();
        session
            .request_action(ParticipantId(1), Action::SetVolume { volume: 60 })
            .await
            .unwrap();

        let mut rx = events.subscribe();
        registry.flush_updates().await;

        let mut updated = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ChorusEvent::SessionUpdated { session_id, .. } = event {
                updated.push(session_id);
            }
        }
        assert_eq!(updated, vec![SessionId(1)]);

        // The flag was consumed; a second flush emits nothing
        registry.flush_updates().await;
        assert!(rx.try_recv().is_err());
    }
}
