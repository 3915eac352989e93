//! End-to-end tests of the kernel over the in-memory store.
//!
//! Each test wires a fresh [`Kernel`] and drives it the way the HTTP layer
//! would: register, log in, resolve the actor from the token, act.

use std::sync::Arc;

use authorship_kernel::config::{CredentialConfig, KernelConfig, PasswordParams};
use authorship_kernel::store::{UserFilter, UserUpdate};
use authorship_kernel::{
    AuthenticatedActor, ErrorKind, InMemoryStore, Kernel, PostDraft, PostPatch, RegistrationPayload,
    Role, Status, UserStore,
};
use chrono::{Duration, Utc};

/// Test HMAC secret for integration tests
const TEST_TOKEN_SECRET: &[u8] = b"test_token_secret_for_scenarios";

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn kernel() -> (Arc<InMemoryStore>, Kernel<InMemoryStore>) {
    let config = KernelConfig::new(
        CredentialConfig::new(TEST_TOKEN_SECRET.to_vec()).with_password_params(PasswordParams::low_cost()),
    );
    let store = Arc::new(InMemoryStore::new());
    let kernel = Kernel::new(store.clone(), &config).unwrap();
    (store, kernel)
}

fn registration(first: &str, email: &str) -> RegistrationPayload {
    RegistrationPayload {
        first_name: first.to_string(),
        last_name: "Tester".to_string(),
        email: email.to_string(),
        password: "password123".to_string(),
    }
}

/// Register, log in and resolve the actor from the issued token.
async fn sign_up(kernel: &Kernel<InMemoryStore>, first: &str, email: &str) -> AuthenticatedActor {
    kernel.identity.register(registration(first, email)).await.unwrap();
    let session = kernel.identity.login(email, "password123").await.unwrap();
    kernel.credentials.verify_token(&session.token).unwrap()
}

async fn promote(store: &InMemoryStore, actor: AuthenticatedActor) -> AuthenticatedActor {
    store
        .update_user(UserFilter::id(actor.id), &[UserUpdate::SetRole(Role::Admin)], Utc::now())
        .await
        .unwrap();
    AuthenticatedActor::new(actor.id, Role::Admin)
}

fn draft(author: &AuthenticatedActor, title: &str) -> PostDraft {
    PostDraft {
        title: title.to_string(),
        description: "A first post".to_string(),
        body: "Hello there".to_string(),
        author: author.id,
        image: None,
        status: None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Credentials
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_login_verify_round_trip() {
    let (_, kernel) = kernel();
    let registered = kernel.identity.register(registration("Ada", "ada@x.com")).await.unwrap();

    let session = kernel.identity.login("ada@x.com", "password123").await.unwrap();
    let actor = kernel.credentials.verify_token(&session.token).unwrap();

    assert_eq!(actor.id, registered.user.id);
    assert_eq!(actor.role, Role::User);
}

#[tokio::test]
async fn wrong_password_leaves_hash_unchanged() {
    let (store, kernel) = kernel();
    let session = kernel.identity.register(registration("Ada", "ada@x.com")).await.unwrap();
    let before = store.find_user(session.user.id).await.unwrap().unwrap().password_hash;

    let err = kernel.identity.login("ada@x.com", "password124").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);

    let after = store.find_user(session.user.id).await.unwrap().unwrap().password_hash;
    assert_eq!(before, after);
}

#[tokio::test]
async fn expired_and_tampered_tokens_are_rejected() {
    let (_, kernel) = kernel();
    let session = kernel.identity.register(registration("Ada", "ada@x.com")).await.unwrap();

    // Warm the cache, then ask again from the future.
    assert!(kernel.credentials.verify_token(&session.token).is_ok());
    let later = Utc::now() + Duration::days(2);
    let err = kernel.credentials.verify_token_at(&session.token, later).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);

    let mut raw = session.token.as_str().to_string();
    raw = raw.replacen(".user.", ".admin.", 1);
    let forged = authorship_kernel::BearerToken::from_string(raw);
    assert_eq!(kernel.credentials.verify_token(&forged).unwrap_err().kind(), ErrorKind::Unauthenticated);
}

// ─────────────────────────────────────────────────────────────────────────────
// Ownership
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ada_b_and_admin_c() {
    let (store, kernel) = kernel();
    let ada = sign_up(&kernel, "Ada", "ada@x.com").await;
    let b = sign_up(&kernel, "Bob", "b@x.com").await;
    let c = sign_up(&kernel, "Cleo", "c@x.com").await;
    let c = promote(&store, c).await;

    let intro = kernel.content.create(&ada, draft(&ada, "Intro")).await.unwrap();

    let patch = PostPatch {
        body: Some("edited".to_string()),
        ..Default::default()
    };
    let err = kernel.content.edit(intro.id, &b, patch.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let edited = kernel.content.edit(intro.id, &c, patch).await.unwrap();
    assert_eq!(edited.body, "edited");
    assert_eq!(edited.author, ada.id);
}

#[tokio::test]
async fn registration_cannot_escalate() {
    let (_, kernel) = kernel();
    let payload: RegistrationPayload = serde_json::from_value(serde_json::json!({
        "firstName": "Eve",
        "lastName": "Sneaky",
        "email": "eve@x.com",
        "password": "password123",
        "role": "admin",
        "status": "inactive",
        "followers": ["00000000-0000-0000-0000-000000000001"]
    }))
    .unwrap();

    let session = kernel.identity.register(payload).await.unwrap();
    assert_eq!(session.user.role, Role::User);
    assert_eq!(session.user.status, Status::Active);
    assert!(session.user.followers.is_empty());

    let actor = kernel.credentials.verify_token(&session.token).unwrap();
    assert!(!actor.is_admin());
}

// ─────────────────────────────────────────────────────────────────────────────
// Content lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn retract_is_soft_delete() {
    let (store, kernel) = kernel();
    let ada = sign_up(&kernel, "Ada", "ada@x.com").await;
    let post = kernel.content.create(&ada, draft(&ada, "Intro")).await.unwrap();

    kernel.content.retract(post.id, &ada).await.unwrap();

    assert_eq!(kernel.content.get_one(post.id).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert!(kernel.content.get_active().await.unwrap().iter().all(|p| p.id != post.id));

    use authorship_kernel::PostStore;
    let stored = store.find_post(post.id).await.unwrap().unwrap();
    assert_eq!(stored.status, Status::Inactive);
}

#[tokio::test]
async fn title_reusable_after_retract() {
    let (_, kernel) = kernel();
    let ada = sign_up(&kernel, "Ada", "ada@x.com").await;

    let first = kernel.content.create(&ada, draft(&ada, "X")).await.unwrap();
    let err = kernel.content.create(&ada, draft(&ada, "X")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    kernel.content.retract(first.id, &ada).await.unwrap();
    let second = kernel.content.create(&ada, draft(&ada, "X")).await.unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(kernel.content.posts_by(ada.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn deactivated_user_disappears_from_listings() {
    let (store, kernel) = kernel();
    let ada = sign_up(&kernel, "Ada", "ada@x.com").await;
    let admin = promote(&store, sign_up(&kernel, "Root", "root@x.com").await).await;

    kernel.identity.deactivate(ada.id, &ada).await.unwrap();

    let listed = kernel.identity.fetch_active_all(&admin).await.unwrap();
    assert!(listed.iter().all(|u| u.id != ada.id));
    assert_eq!(
        kernel.identity.login("ada@x.com", "password123").await.unwrap_err().kind(),
        ErrorKind::Unauthenticated
    );
    assert_eq!(kernel.identity.find(ada.id).await.unwrap().status, Status::Inactive);
}

// ─────────────────────────────────────────────────────────────────────────────
// Follow graph
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn follow_is_idempotent_and_unfollow_is_silent() {
    let (_, kernel) = kernel();
    let a = sign_up(&kernel, "Ada", "ada@x.com").await;
    let b = sign_up(&kernel, "Bob", "b@x.com").await;

    kernel.graph.follow(a.id, b.id).await.unwrap();
    kernel.graph.follow(a.id, b.id).await.unwrap();
    let followers = kernel.graph.followers_of(b.id).await.unwrap();
    assert_eq!(followers.iter().filter(|id| **id == a.id).count(), 1);

    let c = sign_up(&kernel, "Cleo", "c@x.com").await;
    let before = kernel.identity.fetch_self(c.id).await.unwrap();
    kernel.graph.unfollow(a.id, c.id).await.unwrap();
    let after = kernel.identity.fetch_self(c.id).await.unwrap();
    assert_eq!(before.followers, after.followers);
}

#[tokio::test]
async fn self_follow_never_recorded() {
    let (_, kernel) = kernel();
    let a = sign_up(&kernel, "Ada", "ada@x.com").await;

    let err = kernel.graph.follow(a.id, a.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    let me = kernel.identity.fetch_self(a.id).await.unwrap();
    assert!(!me.followers.contains(&a.id));
    assert!(!me.followings.contains(&a.id));
}
