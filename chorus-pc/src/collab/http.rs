//! HTTP-backed collaborator clients
//!
//! JSON-over-HTTP implementations of the `AudioNode` and `MembershipSource`
//! contracts. Both are thin: no retry logic lives here; the session state
//! machine owns the bounded-retry policy so a vote decision can be rolled
//! back when retries exhaust.

use crate::collab::{AudioNode, Capability, MembershipSource, Resolved, ResolvedTrack};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chorus_common::model::{ChannelId, EqPreset, ParticipantId, SessionId, Track, TrackId};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Client for the external audio node's REST surface
pub struct HttpAudioNode {
    client: reqwest::Client,
    base_url: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct ConnectBody {
    channel_id: ChannelId,
}

#[derive(Debug, Serialize)]
struct PlayBody<'a> {
    track_id: TrackId,
    title: &'a str,
}

#[derive(Debug, Serialize)]
struct PausedBody {
    paused: bool,
}

#[derive(Debug, Serialize)]
struct VolumeBody {
    volume: u8,
}

#[derive(Debug, Serialize)]
struct EqualizerBody {
    preset: &'static str,
}

/// Wire format of the node's track-resolution response
#[derive(Debug, Deserialize)]
struct ResolveResponse {
    load_type: String,
    #[serde(default)]
    playlist_name: Option<String>,
    #[serde(default)]
    tracks: Vec<ResolveTrackEntry>,
}

#[derive(Debug, Deserialize)]
struct ResolveTrackEntry {
    id: TrackId,
    title: String,
    #[serde(default)]
    duration_ms: Option<u64>,
}

impl HttpAudioNode {
    pub fn new(base_url: String, password: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            password,
        }
    }

    fn url(&self, session_id: SessionId, op: &str) -> String {
        format!("{}/v1/sessions/{}/{}", self.base_url, session_id, op)
    }

    async fn post<B: Serialize>(&self, url: String, body: &B) -> Result<()> {
        debug!("Audio node command: POST {}", url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.password)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::CollaboratorFailure(format!(
                "audio node returned {} for {}",
                response.status(),
                url
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AudioNode for HttpAudioNode {
    async fn connect(&self, session_id: SessionId, channel: ChannelId) -> Result<()> {
        self.post(
            self.url(session_id, "connect"),
            &ConnectBody {
                channel_id: channel,
            },
        )
        .await
    }

    async fn disconnect(&self, session_id: SessionId) -> Result<()> {
        self.post(self.url(session_id, "disconnect"), &()).await
    }

    async fn play(&self, session_id: SessionId, track: &Track) -> Result<()> {
        self.post(
            self.url(session_id, "play"),
            &PlayBody {
                track_id: track.id,
                title: &track.title,
            },
        )
        .await
    }

    async fn stop(&self, session_id: SessionId) -> Result<()> {
        self.post(self.url(session_id, "stop"), &()).await
    }

    async fn set_paused(&self, session_id: SessionId, paused: bool) -> Result<()> {
        self.post(self.url(session_id, "paused"), &PausedBody { paused })
            .await
    }

    async fn set_volume(&self, session_id: SessionId, volume: u8) -> Result<()> {
        self.post(self.url(session_id, "volume"), &VolumeBody { volume })
            .await
    }

    async fn set_equalizer(&self, session_id: SessionId, preset: EqPreset) -> Result<()> {
        self.post(
            self.url(session_id, "equalizer"),
            &EqualizerBody {
                preset: preset.as_str(),
            },
        )
        .await
    }

    async fn resolve(&self, query: &str) -> Result<Resolved> {
        let url = format!("{}/v1/tracks", self.base_url);
        debug!("Audio node resolve: {}", query);

        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.password)
            .query(&[("query", query)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::CollaboratorFailure(format!(
                "audio node returned {} for track resolution",
                response.status()
            )));
        }

        let body: ResolveResponse = response.json().await?;
        let mut tracks: Vec<ResolvedTrack> = body
            .tracks
            .into_iter()
            .map(|t| ResolvedTrack {
                id: t.id,
                title: t.title,
                duration_ms: t.duration_ms,
            })
            .collect();

        match body.load_type.as_str() {
            "playlist" => Ok(Resolved::Playlist {
                name: body.playlist_name.unwrap_or_else(|| "playlist".to_string()),
                tracks,
            }),
            "track" if !tracks.is_empty() => Ok(Resolved::Track(tracks.remove(0))),
            _ => Ok(Resolved::NotFound),
        }
    }
}

/// Client for the identity/membership service
pub struct HttpMembership {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct MembersResponse {
    members: Vec<ParticipantId>,
}

#[derive(Debug, Deserialize)]
struct CapabilityResponse {
    granted: bool,
}

#[derive(Debug, Deserialize)]
struct ActorChannelResponse {
    channel_id: Option<ChannelId>,
}

impl HttpMembership {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MembershipSource for HttpMembership {
    async fn channel_members(&self, channel: ChannelId) -> Result<HashSet<ParticipantId>> {
        let url = format!("{}/v1/channels/{}/members", self.base_url, channel);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(HashSet::new());
        }
        let body: MembersResponse = response.json().await?;
        Ok(body.members.into_iter().collect())
    }

    async fn has_capability(
        &self,
        actor: ParticipantId,
        capability: Capability,
        channel: ChannelId,
    ) -> Result<bool> {
        let url = format!(
            "{}/v1/channels/{}/members/{}/capabilities/{}",
            self.base_url, channel, actor, capability
        );
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let body: CapabilityResponse = response.json().await?;
        Ok(body.granted)
    }

    async fn actor_channel(
        &self,
        session_id: SessionId,
        actor: ParticipantId,
    ) -> Result<Option<ChannelId>> {
        let url = format!(
            "{}/v1/sessions/{}/members/{}/channel",
            self.base_url, session_id, actor
        );
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: ActorChannelResponse = response.json().await?;
        Ok(body.channel_id)
    }
}
