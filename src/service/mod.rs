//! Authorship REST Service
//!
//! Exposes the kernel over HTTP. Validates request bodies, resolves the
//! caller from the bearer token and maps core errors to status codes.
//!
//! ## Endpoints
//!
//! - `POST /users/register` - Create an account (201)
//! - `POST /users/login` - Exchange credentials for a token
//! - `GET /users/get-all` - List active users (admin)
//! - `GET /users/get-own` - Own profile
//! - `PUT /users/edit/:id` - Edit a profile
//! - `DELETE /users/remove-own` - Deactivate own account
//! - `DELETE /users/remove/:id` - Deactivate an account
//! - `PUT /users/:id/follow` - Follow a user
//! - `PUT /users/:id/unfollow` - Unfollow a user
//! - `POST /post/create` - Publish a post (201)
//! - `GET /post/fetch-all` - Active posts
//! - `GET /post/fetch-one/:id` - One active post
//! - `PUT /post/edit/:id` - Edit a post
//! - `DELETE /post/retract/:id` - Retract a post
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe

pub mod middleware;
pub mod routes;
pub mod state;
pub mod validation;

pub use middleware::{metrics_middleware, normalize_path, record_reconcile};
pub use routes::{create_router, Actor, ApiError, Envelope, ErrorResponse};
pub use state::{ServiceState, ServiceStore, StoreHealth};
