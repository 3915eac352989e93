//! Follow graph invariants under random operation sequences and store faults.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use authorship_kernel::credentials::HashedPassword;
use authorship_kernel::store::{StoreError, UserFilter, UserUpdate};
use authorship_kernel::{ErrorKind, InMemoryStore, RelationshipGraph, Status, User, UserId, UserStore};
use chrono::{DateTime, Utc};
use proptest::prelude::*;

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Fails every `followers` write while `failures_left` is non-zero.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryStore,
    failures_left: AtomicU32,
}

impl FlakyStore {
    fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserStore for FlakyStore {
    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        self.inner.insert_user(user).await
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.inner.find_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.inner.find_user_by_email(email).await
    }

    async fn list_users(&self, status: Status) -> Result<Vec<User>, StoreError> {
        self.inner.list_users(status).await
    }

    async fn update_user(
        &self,
        filter: UserFilter,
        updates: &[UserUpdate],
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let reciprocal = updates
            .iter()
            .any(|u| matches!(u, UserUpdate::AddFollower(_) | UserUpdate::RemoveFollower(_)));
        if reciprocal {
            let failed = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(StoreError::Backend("injected fault".to_string()));
            }
        }
        self.inner.update_user(filter, updates, now).await
    }
}

async fn add_users<S: UserStore>(store: &S, n: usize) -> Vec<UserId> {
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let user = User::registered(
            "Test".to_string(),
            "User".to_string(),
            &format!("user{i}@x.com"),
            HashedPassword::from_phc("$argon2id$stub"),
            Utc::now(),
        );
        ids.push(store.insert_user(user).await.unwrap().id);
    }
    ids
}

/// Every user is absent from its own sets, and A ∈ B.followers ⇔ B ∈ A.followings.
fn assert_consistent(users: &[User]) {
    let by_id: BTreeMap<UserId, &User> = users.iter().map(|u| (u.id, u)).collect();
    for user in users {
        assert!(!user.followers.contains(&user.id), "self in followers");
        assert!(!user.followings.contains(&user.id), "self in followings");
        for followed in &user.followings {
            assert!(by_id[followed].followers.contains(&user.id), "missing follower side");
        }
        for follower in &user.followers {
            assert!(by_id[follower].followings.contains(&user.id), "missing following side");
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Follow(usize, usize),
    Unfollow(usize, usize),
}

fn arb_op(users: usize) -> impl Strategy<Value = Op> {
    (any::<bool>(), 0..users, 0..users).prop_map(|(follow, a, b)| {
        if follow {
            Op::Follow(a, b)
        } else {
            Op::Unfollow(a, b)
        }
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    /// No sequence of follows and unfollows breaks symmetry or self-exclusion.
    #[test]
    fn random_sequences_keep_graph_consistent(ops in prop::collection::vec(arb_op(4), 0..40)) {
        runtime().block_on(async {
            let store = Arc::new(InMemoryStore::new());
            let ids = add_users(store.as_ref(), 4).await;
            let graph = RelationshipGraph::new(store.clone(), 2);

            for op in ops {
                let result = match op {
                    Op::Follow(a, b) => graph.follow(ids[a], ids[b]).await,
                    Op::Unfollow(a, b) => graph.unfollow(ids[a], ids[b]).await,
                };
                let self_edge = matches!(op, Op::Follow(a, b) | Op::Unfollow(a, b) if a == b);
                if self_edge {
                    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidOperation);
                } else {
                    assert!(result.is_ok());
                }
            }

            assert_consistent(&store.all_users());
        });
    }

    /// Faults on the reciprocal side are always healed by one reconcile pass.
    #[test]
    fn faults_heal_after_reconcile(
        ops in prop::collection::vec(arb_op(3), 1..20),
        faults in prop::collection::vec(0u32..4, 1..20),
    ) {
        runtime().block_on(async {
            let store = Arc::new(FlakyStore::default());
            let ids = add_users(store.as_ref(), 3).await;
            let graph = RelationshipGraph::new(store.clone(), 1);

            for (op, fault) in ops.into_iter().zip(faults.into_iter().cycle()) {
                store.fail_next(fault);
                let _ = match op {
                    Op::Follow(a, b) => graph.follow(ids[a], ids[b]).await,
                    Op::Unfollow(a, b) => graph.unfollow(ids[a], ids[b]).await,
                };
            }

            store.fail_next(0);
            let report = graph.reconcile().await;
            assert_eq!(report.remaining, 0);
            assert!(graph.pending_repairs().is_empty());
            assert_consistent(&store.inner.all_users());
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Protocol details
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn retries_absorb_transient_faults() {
    let store = Arc::new(FlakyStore::default());
    let ids = add_users(store.as_ref(), 2).await;
    let graph = RelationshipGraph::new(store.clone(), 2);

    // Two failures, two retries: the third attempt lands.
    store.fail_next(2);
    graph.follow(ids[0], ids[1]).await.unwrap();
    assert!(graph.pending_repairs().is_empty());
    assert!(graph.followers_of(ids[1]).await.unwrap().contains(&ids[0]));
}

#[tokio::test]
async fn persistent_fault_reports_partial_failure() {
    let store = Arc::new(FlakyStore::default());
    let ids = add_users(store.as_ref(), 2).await;
    let graph = RelationshipGraph::new(store.clone(), 2);

    store.fail_next(3);
    let err = graph.follow(ids[0], ids[1]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PartialFailure);

    // The actor's side landed; the target's did not.
    assert!(graph.followings_of(ids[0]).await.unwrap().contains(&ids[1]));
    assert!(graph.followers_of(ids[1]).await.unwrap().is_empty());

    let report = graph.reconcile().await;
    assert_eq!(report.repaired, 1);
    assert_consistent(&store.inner.all_users());
}
