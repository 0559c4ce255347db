//! Quorum policy and vote ledger
//!
//! The quorum policy is a pure function of the action kind and the number of
//! human participants; the ledger tracks in-flight votes per action kind
//! within the session's current epoch.

use chorus_common::model::{ActionKind, ParticipantId};
use std::collections::{HashMap, HashSet};

/// Result of casting one vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The actor already holds a standing vote for this action
    AlreadyVoted,
    /// Quorum reached; the ledger was cleared. Carries the voters whose
    /// votes were consumed so a failed execution can re-open the vote.
    Passed { voters: Vec<ParticipantId> },
    /// Vote recorded; `remaining` more distinct votes are needed
    Pending { remaining: usize },
}

/// Number of affirmative votes required to execute `kind` with
/// `participant_count` humans in the channel.
///
/// Small sessions (two or fewer participants) waive voting entirely, except
/// that `stop` with exactly two participants demands unanimity: it clears
/// the whole queue, so the smallest non-trivial group must agree. Larger
/// sessions need ceil(count / 2.5) votes.
pub fn required_votes(kind: ActionKind, participant_count: usize) -> usize {
    if kind == ActionKind::Stop && participant_count == 2 {
        return 2;
    }
    if kind != ActionKind::Stop && participant_count <= 2 {
        return 0;
    }
    // ceil(n / 2.5) in integer arithmetic
    (2 * participant_count).div_ceil(5)
}

/// Per-action-kind sets of participants who have voted in the current epoch.
///
/// Every `ActionKind` has exactly one vote set, created up front; there is
/// no name-derived lookup.
#[derive(Debug)]
pub struct VoteLedger {
    votes: HashMap<ActionKind, HashSet<ParticipantId>>,
}

impl Default for VoteLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl VoteLedger {
    pub fn new() -> Self {
        let votes = ActionKind::ALL
            .iter()
            .map(|kind| (*kind, HashSet::new()))
            .collect();
        Self { votes }
    }

    fn set_mut(&mut self, kind: ActionKind) -> &mut HashSet<ParticipantId> {
        // Every kind is inserted at construction
        self.votes
            .get_mut(&kind)
            .expect("ledger has a vote set for every action kind")
    }

    /// Number of standing votes for `kind`
    pub fn votes_for(&self, kind: ActionKind) -> usize {
        self.votes.get(&kind).map(|set| set.len()).unwrap_or(0)
    }

    pub fn has_voted(&self, kind: ActionKind, actor: ParticipantId) -> bool {
        self.votes
            .get(&kind)
            .map(|set| set.contains(&actor))
            .unwrap_or(false)
    }

    /// Cast one vote for `kind` by `actor`, given the live channel membership.
    ///
    /// Stale votes from participants who have since left the channel are
    /// purged before the quorum check, so a departed member's vote never
    /// counts toward quorum.
    pub fn cast(
        &mut self,
        actor: ParticipantId,
        kind: ActionKind,
        members: &HashSet<ParticipantId>,
    ) -> VoteOutcome {
        let set = self.set_mut(kind);

        if set.contains(&actor) {
            return VoteOutcome::AlreadyVoted;
        }

        let count = members.len();

        // Small-session waiver: a single request auto-passes, clearing any
        // stale votes from when the channel was larger.
        if count < 3 && kind != ActionKind::Stop {
            set.clear();
            return VoteOutcome::Passed { voters: Vec::new() };
        }

        set.insert(actor);
        set.retain(|voter| members.contains(voter));

        let required = required_votes(kind, count);
        if set.len() >= required {
            let voters = set.drain().collect();
            VoteOutcome::Passed { voters }
        } else {
            VoteOutcome::Pending {
                remaining: required - set.len(),
            }
        }
    }

    /// Re-open a passed vote whose action could not be executed.
    ///
    /// Restores the consumed votes so the group does not have to vote again
    /// from scratch after a collaborator failure.
    pub fn reopen(&mut self, kind: ActionKind, voters: &[ParticipantId]) {
        self.set_mut(kind).extend(voters.iter().copied());
    }

    pub fn clear(&mut self, kind: ActionKind) {
        self.set_mut(kind).clear();
    }

    /// Clear the vote sets scoped to the current track (skip/shuffle/repeat);
    /// invoked whenever a new track becomes current.
    pub fn clear_track_scoped(&mut self) {
        for kind in ActionKind::ALL {
            if kind.is_track_scoped() {
                self.set_mut(kind).clear();
            }
        }
    }

    /// Clear every vote set (session teardown)
    pub fn clear_all(&mut self) {
        for kind in ActionKind::ALL {
            self.set_mut(kind).clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(ids: &[u64]) -> HashSet<ParticipantId> {
        ids.iter().map(|id| ParticipantId(*id)).collect()
    }

    #[test]
    fn test_required_votes_formula() {
        for n in 3..=25 {
            let expected = ((n as f64) / 2.5).ceil() as usize;
            for kind in [ActionKind::Pause, ActionKind::Skip, ActionKind::Shuffle] {
                assert_eq!(required_votes(kind, n), expected, "n = {}", n);
            }
        }
    }

    #[test]
    fn test_required_votes_small_session_waiver() {
        for n in 0..=2 {
            assert_eq!(required_votes(ActionKind::Skip, n), 0);
            assert_eq!(required_votes(ActionKind::Pause, n), 0);
        }
    }

    #[test]
    fn test_stop_unanimity_at_two() {
        assert_eq!(required_votes(ActionKind::Stop, 2), 2);
        // The special case applies only at exactly two participants
        assert_eq!(required_votes(ActionKind::Stop, 0), 0);
        assert_eq!(required_votes(ActionKind::Stop, 1), 1);
        assert_eq!(required_votes(ActionKind::Stop, 5), 2);
    }

    #[test]
    fn test_cast_is_idempotent() {
        let mut ledger = VoteLedger::new();
        let channel = members(&[1, 2, 3, 4, 5]);

        let first = ledger.cast(ParticipantId(1), ActionKind::Skip, &channel);
        assert_eq!(first, VoteOutcome::Pending { remaining: 1 });
        assert_eq!(ledger.votes_for(ActionKind::Skip), 1);

        let second = ledger.cast(ParticipantId(1), ActionKind::Skip, &channel);
        assert_eq!(second, VoteOutcome::AlreadyVoted);
        assert_eq!(ledger.votes_for(ActionKind::Skip), 1);
    }

    #[test]
    fn test_quorum_convergence_and_fresh_epoch() {
        let mut ledger = VoteLedger::new();
        let channel = members(&[1, 2, 3, 4, 5]); // required = 2

        assert_eq!(
            ledger.cast(ParticipantId(1), ActionKind::Skip, &channel),
            VoteOutcome::Pending { remaining: 1 }
        );
        assert!(matches!(
            ledger.cast(ParticipantId(2), ActionKind::Skip, &channel),
            VoteOutcome::Passed { .. }
        ));

        // Ledger was cleared: a later vote starts a fresh epoch
        assert_eq!(
            ledger.cast(ParticipantId(3), ActionKind::Skip, &channel),
            VoteOutcome::Pending { remaining: 1 }
        );
    }

    #[test]
    fn test_small_session_waiver_clears_stale_votes() {
        let mut ledger = VoteLedger::new();
        let large = members(&[1, 2, 3, 4, 5]);
        ledger.cast(ParticipantId(1), ActionKind::Pause, &large);
        assert_eq!(ledger.votes_for(ActionKind::Pause), 1);

        // Channel shrank below the threshold: the request auto-passes and
        // the stale vote is gone.
        let small = members(&[1, 2]);
        assert!(matches!(
            ledger.cast(ParticipantId(2), ActionKind::Pause, &small),
            VoteOutcome::Passed { .. }
        ));
        assert_eq!(ledger.votes_for(ActionKind::Pause), 0);
    }

    #[test]
    fn test_stop_is_not_waived_at_two() {
        let mut ledger = VoteLedger::new();
        let channel = members(&[1, 2]);

        assert_eq!(
            ledger.cast(ParticipantId(1), ActionKind::Stop, &channel),
            VoteOutcome::Pending { remaining: 1 }
        );
        assert!(matches!(
            ledger.cast(ParticipantId(2), ActionKind::Stop, &channel),
            VoteOutcome::Passed { .. }
        ));
    }

    #[test]
    fn test_departed_member_vote_is_purged() {
        let mut ledger = VoteLedger::new();
        let channel = members(&[1, 2, 3, 4, 5, 6, 7]); // required = 3

        ledger.cast(ParticipantId(6), ActionKind::Skip, &channel);
        ledger.cast(ParticipantId(7), ActionKind::Skip, &channel);

        // 6 and 7 leave; their standing votes must not count
        let remaining = members(&[1, 2, 3, 4, 5]); // required = 2
        let outcome = ledger.cast(ParticipantId(1), ActionKind::Skip, &remaining);
        assert_eq!(outcome, VoteOutcome::Pending { remaining: 1 });
    }

    #[test]
    fn test_reopen_restores_voters() {
        let mut ledger = VoteLedger::new();
        let channel = members(&[1, 2, 3, 4, 5]);

        ledger.cast(ParticipantId(1), ActionKind::Stop, &channel);
        let outcome = ledger.cast(ParticipantId(2), ActionKind::Stop, &channel);
        let voters = match outcome {
            VoteOutcome::Passed { voters } => voters,
            other => panic!("Expected Passed, got {:?}", other),
        };

        ledger.reopen(ActionKind::Stop, &voters);
        assert_eq!(ledger.votes_for(ActionKind::Stop), 2);
        assert_eq!(
            ledger.cast(ParticipantId(1), ActionKind::Stop, &channel),
            VoteOutcome::AlreadyVoted
        );
    }

    #[test]
    fn test_track_scoped_clear() {
        let mut ledger = VoteLedger::new();
        let channel = members(&[1, 2, 3, 4, 5]);

        for kind in ActionKind::ALL {
            ledger.cast(ParticipantId(1), kind, &channel);
        }
        ledger.clear_track_scoped();

        assert_eq!(ledger.votes_for(ActionKind::Skip), 0);
        assert_eq!(ledger.votes_for(ActionKind::Shuffle), 0);
        assert_eq!(ledger.votes_for(ActionKind::Repeat), 0);
        // Session-scoped ledgers persist across a track change
        assert_eq!(ledger.votes_for(ActionKind::Pause), 1);
        assert_eq!(ledger.votes_for(ActionKind::Resume), 1);
        assert_eq!(ledger.votes_for(ActionKind::Stop), 1);
    }
}
