//! Track queue owned by one playback session
//!
//! FIFO pending sequence plus a separately-held current track. At most one
//! track is current at a time and the pending sequence never contains it;
//! the current track is the only one handed to the audio node.

use chorus_common::model::Track;
use rand::seq::SliceRandom;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct TrackQueue {
    current: Option<Track>,
    pending: VecDeque<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track to the tail of the pending sequence
    pub fn enqueue(&mut self, track: Track) {
        self.pending.push_back(track);
    }

    /// Re-insert a track at the head of the pending sequence (repeat)
    pub fn push_front(&mut self, track: Track) {
        self.pending.push_front(track);
    }

    /// Promote the head of the pending sequence to current.
    ///
    /// The previous current track is dropped; with an empty pending sequence
    /// the queue goes idle. Returns the newly current track.
    pub fn advance(&mut self) -> Option<&Track> {
        self.current = self.pending.pop_front();
        self.current.as_ref()
    }

    /// Randomly permute the pending sequence; the current track is untouched
    pub fn shuffle(&mut self) {
        self.pending
            .make_contiguous()
            .shuffle(&mut rand::thread_rng());
    }

    /// Drop the current track and all pending tracks
    pub fn clear(&mut self) {
        self.current = None;
        self.pending.clear();
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Idle means no track is current
    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// Snapshot of up to `n` upcoming tracks in play order
    pub fn upcoming(&self, n: usize) -> Vec<Track> {
        self.pending.iter().take(n).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_common::model::{ParticipantId, TrackId};

    fn track(title: &str) -> Track {
        Track {
            id: TrackId::new(),
            title: title.to_string(),
            requester: ParticipantId(1),
            duration_ms: Some(180_000),
        }
    }

    #[test]
    fn test_fifo_order_preserved() {
        let mut queue = TrackQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));
        queue.enqueue(track("c"));

        assert_eq!(queue.advance().unwrap().title, "a");
        assert_eq!(queue.advance().unwrap().title, "b");
        assert_eq!(queue.advance().unwrap().title, "c");
        assert!(queue.advance().is_none());
        assert!(queue.is_idle());
    }

    #[test]
    fn test_pending_never_contains_current() {
        let mut queue = TrackQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));

        queue.advance();
        let current_id = queue.current().unwrap().id;
        assert!(queue.upcoming(10).iter().all(|t| t.id != current_id));
    }

    #[test]
    fn test_repeat_reinsertion_at_head() {
        let mut queue = TrackQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));
        queue.advance(); // "a" is current

        let current = queue.current().unwrap().clone();
        queue.push_front(current);

        // "a" plays again before the previously queued "b"
        assert_eq!(queue.advance().unwrap().title, "a");
        assert_eq!(queue.advance().unwrap().title, "b");
    }

    #[test]
    fn test_repeat_with_empty_pending() {
        let mut queue = TrackQueue::new();
        queue.enqueue(track("a"));
        queue.advance();

        let current = queue.current().unwrap().clone();
        queue.enqueue(current);

        // Same track becomes current again after the next track end
        assert_eq!(queue.advance().unwrap().title, "a");
    }

    #[test]
    fn test_shuffle_leaves_current_in_place() {
        let mut queue = TrackQueue::new();
        for i in 0..20 {
            queue.enqueue(track(&format!("t{}", i)));
        }
        queue.advance();
        let current_id = queue.current().unwrap().id;

        queue.shuffle();

        assert_eq!(queue.current().unwrap().id, current_id);
        assert_eq!(queue.pending_len(), 19);
        assert!(queue.upcoming(20).iter().all(|t| t.id != current_id));
    }

    #[test]
    fn test_clear() {
        let mut queue = TrackQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));
        queue.advance();

        queue.clear();
        assert!(queue.is_idle());
        assert_eq!(queue.pending_len(), 0);
    }
}
