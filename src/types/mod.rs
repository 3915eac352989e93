//! Core types for the authorship kernel.

pub mod ids;
pub mod lifecycle;
pub mod user;
pub mod post;
pub mod actor;

pub use ids::{UserId, PostId};
pub use lifecycle::{Role, Status};
pub use user::{
    User, UserView, UserIdentity, RegistrationPayload, LoginPayload, UserPatch,
    normalize_email,
};
pub use post::{Post, PostDraft, PostPatch, DEFAULT_POST_IMAGE};
pub use actor::{AuthenticatedActor, Session};
