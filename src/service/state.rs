//! Service state management.
//!
//! Holds the assembled kernel and the store it runs on.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::KernelConfig;
use crate::error::CoreResult;
use crate::kernel::Kernel;
use crate::store::postgres::PoolStats;
use crate::store::{InMemoryStore, PostStore, PostgresStore, UserStore};

/// Backend health as seen by the probes.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    /// Whether the backend answers.
    async fn is_healthy(&self) -> bool;

    /// Connection pool statistics, if the backend has a pool.
    fn pool_stats(&self) -> Option<PoolStats>;
}

#[async_trait]
impl StoreHealth for PostgresStore {
    async fn is_healthy(&self) -> bool {
        PostgresStore::is_healthy(self).await
    }

    fn pool_stats(&self) -> Option<PoolStats> {
        Some(PostgresStore::pool_stats(self))
    }
}

#[async_trait]
impl StoreHealth for InMemoryStore {
    async fn is_healthy(&self) -> bool {
        true
    }

    fn pool_stats(&self) -> Option<PoolStats> {
        None
    }
}

/// Bound satisfied by every store the service can run on.
pub trait ServiceStore: UserStore + PostStore + StoreHealth + 'static {}

impl<S: UserStore + PostStore + StoreHealth + 'static> ServiceStore for S {}

/// Shared service state.
pub struct ServiceState<S: ServiceStore> {
    /// The document store, for health checks.
    pub store: Arc<S>,
    /// Core components over that store.
    pub kernel: Arc<Kernel<S>>,
    /// Answer ownership failures with 404 instead of 403.
    pub conceal_forbidden: bool,
}

impl<S: ServiceStore> ServiceState<S> {
    /// Build the kernel over `store`.
    pub fn new(store: S, config: &KernelConfig) -> CoreResult<Self> {
        let store = Arc::new(store);
        let kernel = Kernel::new(Arc::clone(&store), config)?;
        Ok(Self {
            store,
            kernel: Arc::new(kernel),
            conceal_forbidden: config.conceal_forbidden,
        })
    }

    /// Build from environment configuration (see [`KernelConfig::from_env`]).
    pub fn from_env(store: S) -> CoreResult<Self> {
        Self::new(store, &KernelConfig::from_env())
    }
}

impl<S: ServiceStore> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            kernel: Arc::clone(&self.kernel),
            conceal_forbidden: self.conceal_forbidden,
        }
    }
}
