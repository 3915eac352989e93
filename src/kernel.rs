//! The assembled kernel: one store, one credential manager, three components.

use std::sync::Arc;

use crate::config::KernelConfig;
use crate::content::ContentStore;
use crate::credentials::CredentialManager;
use crate::error::CoreResult;
use crate::graph::RelationshipGraph;
use crate::identity::IdentityStore;
use crate::store::{PostStore, UserStore};

/// All core components wired to a shared store.
pub struct Kernel<S> {
    /// Password and token handling.
    pub credentials: Arc<CredentialManager>,
    /// Registration, login, profiles.
    pub identity: IdentityStore<S>,
    /// Follow edges.
    pub graph: RelationshipGraph<S>,
    /// Posts.
    pub content: ContentStore<S>,
}

impl<S: UserStore + PostStore> Kernel<S> {
    /// Build the kernel over `store`.
    ///
    /// Fails only if the password hashing parameters are rejected.
    pub fn new(store: Arc<S>, config: &KernelConfig) -> CoreResult<Self> {
        let credentials = Arc::new(CredentialManager::new(&config.credentials)?);
        Ok(Self {
            identity: IdentityStore::new(store.clone(), credentials.clone()),
            graph: RelationshipGraph::new(store.clone(), config.repair_attempts),
            content: ContentStore::new(store),
            credentials,
        })
    }
}
