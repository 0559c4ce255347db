//! Permission gate
//!
//! Decides whether an actor may bypass voting for a session-level action.
//! Pure decision logic: no side effects, and a failing capability query
//! counts as "no".

use crate::collab::{Capability, MembershipSource};
use chorus_common::model::{ChannelId, ParticipantId};
use tracing::debug;

/// Returns true iff the actor is the session's controller or holds the
/// session-management capability in the channel context.
///
/// A session with no controller grants no implicit bypass.
pub async fn may_bypass(
    membership: &dyn MembershipSource,
    actor: ParticipantId,
    controller: Option<ParticipantId>,
    channel: ChannelId,
) -> bool {
    if controller == Some(actor) {
        return true;
    }

    match membership
        .has_capability(actor, Capability::ManageSession, channel)
        .await
    {
        Ok(granted) => granted,
        Err(err) => {
            debug!("Capability query failed for {}: {}", actor, err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::mock::MockMembership;

    #[tokio::test]
    async fn test_controller_bypasses() {
        let membership = MockMembership::new();
        let actor = ParticipantId(1);
        assert!(may_bypass(&membership, actor, Some(actor), ChannelId(9)).await);
    }

    #[tokio::test]
    async fn test_capability_bypasses() {
        let membership = MockMembership::new();
        let actor = ParticipantId(2);
        membership.grant_manage(actor);
        assert!(may_bypass(&membership, actor, Some(ParticipantId(1)), ChannelId(9)).await);
    }

    #[tokio::test]
    async fn test_no_controller_no_capability() {
        let membership = MockMembership::new();
        assert!(!may_bypass(&membership, ParticipantId(3), None, ChannelId(9)).await);
    }

    #[tokio::test]
    async fn test_failing_query_counts_as_no() {
        let membership = MockMembership::new();
        let actor = ParticipantId(4);
        membership.grant_manage(actor);
        membership.fail_next(1);
        assert!(!may_bypass(&membership, actor, None, ChannelId(9)).await);
    }
}
