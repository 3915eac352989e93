//! Relationship graph: the directed follow edges between users.
//!
//! An edge A→B lives in two documents, `A.followings` and `B.followers`. The
//! store only offers single-document atomicity, so every follow or unfollow is
//! two conditional updates:
//!
//! 1. the actor's own side (`followings`), which decides the outcome,
//! 2. the reciprocal side (`target.followers`), retried immediately a few
//!    times if it fails.
//!
//! The reciprocal write is always derived from the follower's current
//! `followings` and re-checked after it lands, so overlapping follow and
//! unfollow requests on the same pair converge. If the reciprocal write still
//! fails, the edge is recorded in a repair ledger and the caller gets
//! [`CoreError::PartialFailure`]. The ledger is drained by
//! [`RelationshipGraph::reconcile`], which settles each pending edge the same
//! way, so replaying a stale entry never undoes a later follow or unfollow.
//!
//! Both updates are set operations, so replays and duplicate requests are
//! harmless.

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::store::{UserFilter, UserStore, UserUpdate};
use crate::types::{UserId, UserView};

/// Change to apply to a user's `followers` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeChange {
    /// Set-union the peer.
    AddFollower,
    /// Set-difference the peer.
    RemoveFollower,
}

/// A reciprocal follow-edge write that has not been applied yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRepair {
    /// User whose `followers` set is out of date (the follow target).
    pub user: UserId,
    /// The change that was intended.
    pub change: EdgeChange,
    /// The follower (the actor of the original request).
    pub peer: UserId,
}

impl EdgeRepair {
    /// The single-document update that completes this edge.
    pub fn update(&self) -> UserUpdate {
        match self.change {
            EdgeChange::AddFollower => UserUpdate::AddFollower(self.peer),
            EdgeChange::RemoveFollower => UserUpdate::RemoveFollower(self.peer),
        }
    }
}

impl fmt::Display for EdgeRepair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.change {
            EdgeChange::AddFollower => "add",
            EdgeChange::RemoveFollower => "remove",
        };
        write!(f, "{verb} follower {} on user {}", self.peer, self.user)
    }
}

/// Outcome of one [`RelationshipGraph::reconcile`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Repairs attempted in this pass.
    pub attempted: usize,
    /// Repairs applied and removed from the ledger.
    pub repaired: usize,
    /// Repairs still pending after the pass.
    pub remaining: usize,
}

/// Bounded number of write-then-recheck rounds in one settle.
const SETTLE_ROUNDS: usize = 4;

/// Pending repairs keyed by (user, peer). One entry per edge: a newer
/// outcome for the same pair replaces the older one and bumps its sequence.
#[derive(Debug, Default)]
struct RepairLedger {
    entries: BTreeMap<(UserId, UserId), (EdgeChange, u64)>,
    next_seq: u64,
}

impl RepairLedger {
    fn record(&mut self, repair: EdgeRepair) {
        self.next_seq += 1;
        self.entries
            .insert((repair.user, repair.peer), (repair.change, self.next_seq));
    }

    fn seq(&self, key: (UserId, UserId)) -> Option<u64> {
        self.entries.get(&key).map(|&(_, seq)| seq)
    }

    /// Drop the entry for `key` only if it is still the one seen as `seq`.
    fn clear_if(&mut self, key: (UserId, UserId), seq: Option<u64>) {
        if seq.is_some() && self.seq(key) == seq {
            self.entries.remove(&key);
        }
    }
}

/// Maintains follow edges on top of a [`UserStore`].
pub struct RelationshipGraph<S> {
    store: Arc<S>,
    repair_attempts: u32,
    ledger: Mutex<RepairLedger>,
}

impl<S: UserStore> RelationshipGraph<S> {
    /// Create a graph over `store`.
    ///
    /// `repair_attempts` is the number of immediate retries of a failed
    /// reciprocal write before the edge goes to the ledger.
    pub fn new(store: Arc<S>, repair_attempts: u32) -> Self {
        Self {
            store,
            repair_attempts,
            ledger: Mutex::new(RepairLedger::default()),
        }
    }

    /// Make `actor` follow `target`. Returns the actor's updated view.
    ///
    /// Idempotent. `InvalidOperation` on self-follow, `NotFound` when either
    /// side is missing or inactive.
    pub async fn follow(&self, actor: UserId, target: UserId) -> CoreResult<UserView> {
        if actor == target {
            return Err(CoreError::InvalidOperation("a user cannot follow themselves".to_string()));
        }

        match self.store.find_user(target).await? {
            Some(user) if user.is_active() => {}
            _ => return Err(CoreError::NotFound("User".to_string())),
        }

        let updated = self
            .store
            .update_user(UserFilter::active(actor), &[UserUpdate::AddFollowing(target)], Utc::now())
            .await?
            .ok_or_else(|| CoreError::NotFound("User".to_string()))?;

        self.complete(EdgeRepair {
            user: target,
            change: EdgeChange::AddFollower,
            peer: actor,
        })
        .await?;

        tracing::debug!(%actor, %target, "follow applied");
        Ok(updated.view())
    }

    /// Make `actor` stop following `target`. Returns the actor's updated view.
    ///
    /// Idempotent: unfollowing someone not followed succeeds and changes
    /// nothing. The target may be inactive but must exist.
    pub async fn unfollow(&self, actor: UserId, target: UserId) -> CoreResult<UserView> {
        if actor == target {
            return Err(CoreError::InvalidOperation("a user cannot unfollow themselves".to_string()));
        }

        if self.store.find_user(target).await?.is_none() {
            return Err(CoreError::NotFound("User".to_string()));
        }

        let updated = self
            .store
            .update_user(UserFilter::active(actor), &[UserUpdate::RemoveFollowing(target)], Utc::now())
            .await?
            .ok_or_else(|| CoreError::NotFound("User".to_string()))?;

        self.complete(EdgeRepair {
            user: target,
            change: EdgeChange::RemoveFollower,
            peer: actor,
        })
        .await?;

        tracing::debug!(%actor, %target, "unfollow applied");
        Ok(updated.view())
    }

    /// Apply the reciprocal side, retrying, and ledger it on failure.
    async fn complete(&self, repair: EdgeRepair) -> CoreResult<()> {
        let key = (repair.user, repair.peer);
        // Entries recorded before this point are covered by the settle below.
        let seen = self.ledger.lock().seq(key);
        let mut last_error = String::new();

        for attempt in 0..=self.repair_attempts {
            match self.settle(repair.user, repair.peer).await {
                Ok(Some(_)) => {
                    self.ledger.lock().clear_if(key, seen);
                    return Ok(());
                }
                Ok(None) => last_error = format!("user {} not found", repair.user),
                Err(e) => last_error = e,
            }
            tracing::trace!(%repair, attempt, error = %last_error, "reciprocal follow write failed");
        }

        self.ledger.lock().record(repair);

        Err(CoreError::PartialFailure {
            message: format!("follow edge recorded on one side only ({last_error}); repair pending"),
            repair,
        })
    }

    /// The reciprocal change the follower's `followings` currently asks for.
    async fn wanted(&self, user: UserId, peer: UserId) -> Result<EdgeChange, String> {
        match self.store.find_user(peer).await {
            Ok(Some(follower)) if follower.followings.contains(&user) => Ok(EdgeChange::AddFollower),
            Ok(_) => Ok(EdgeChange::RemoveFollower),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Bring `user.followers` in line with `peer.followings`.
    ///
    /// Each round writes the wanted state, then re-reads the follower. The
    /// edge is settled only when the state written is still the wanted one
    /// afterwards; a concurrent follow or unfollow in between triggers another
    /// round. Returns `None` if `user` no longer exists.
    async fn settle(&self, user: UserId, peer: UserId) -> Result<Option<EdgeChange>, String> {
        let mut wanted = self.wanted(user, peer).await?;

        for _ in 0..SETTLE_ROUNDS {
            let repair = EdgeRepair {
                user,
                change: wanted,
                peer,
            };
            match self
                .store
                .update_user(UserFilter::id(user), &[repair.update()], Utc::now())
                .await
            {
                Ok(Some(_)) => {}
                Ok(None) => return Ok(None),
                Err(e) => return Err(e.to_string()),
            }

            let current = self.wanted(user, peer).await?;
            if current == wanted {
                return Ok(Some(wanted));
            }
            tracing::trace!(%repair, "follow edge changed while settling");
            wanted = current;
        }

        Err("follow edge kept changing".to_string())
    }

    /// Replay every pending repair once.
    ///
    /// For each pending edge the wanted state is read from the follower's
    /// `followings`, which is written first and therefore authoritative, and
    /// re-checked after the write. An entry is dropped only once both sides
    /// were seen to agree; one that fails stays pending.
    pub async fn reconcile(&self) -> ReconcileReport {
        let pending = self.pending_repairs();
        let mut report = ReconcileReport {
            attempted: pending.len(),
            ..Default::default()
        };

        for stale in pending {
            let key = (stale.user, stale.peer);
            let seen = self.ledger.lock().seq(key);

            match self.settle(stale.user, stale.peer).await {
                Ok(settled) => {
                    self.ledger.lock().clear_if(key, seen);
                    report.repaired += 1;
                    tracing::debug!(repair = %stale, ?settled, "follow edge repaired");
                }
                Err(e) => tracing::trace!(repair = %stale, error = %e, "follow edge repair failed"),
            }
        }

        report.remaining = self.ledger.lock().entries.len();
        report
    }

    /// Snapshot of the repair ledger.
    pub fn pending_repairs(&self) -> Vec<EdgeRepair> {
        self.ledger
            .lock()
            .entries
            .iter()
            .map(|(&(user, peer), &(change, _))| EdgeRepair { user, change, peer })
            .collect()
    }

    /// Who follows `user`. `NotFound` if the user is missing or inactive.
    pub async fn followers_of(&self, user: UserId) -> CoreResult<BTreeSet<UserId>> {
        Ok(self.active_user(user).await?.followers)
    }

    /// Whom `user` follows. `NotFound` if the user is missing or inactive.
    pub async fn followings_of(&self, user: UserId) -> CoreResult<BTreeSet<UserId>> {
        Ok(self.active_user(user).await?.followings)
    }

    async fn active_user(&self, id: UserId) -> CoreResult<crate::types::User> {
        self.store
            .find_user(id)
            .await?
            .filter(|u| u.is_active())
            .ok_or_else(|| CoreError::NotFound("User".to_string()))
    }
}
