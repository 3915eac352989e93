//! Access control policy.

pub mod access;

pub use access::{decide, decide_admin, decide_authorship, decide_role_change, Decision};
