//! Storage pool resolution and memoization.
//!
//! The working pool is resolved once per driver and reused for every LUN
//! creation. Concurrent first callers wait on a single in-flight lookup; a
//! failed lookup leaves the cell empty so the next call tries again.

use tokio::sync::OnceCell;
use tracing::info;

use crate::array::{ArrayClient, Pool};
use crate::error::DriverError;

/// How the working pool is identified in configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PoolSelector {
    /// Resolve by array identifier.
    Id(String),
    /// Resolve by pool name.
    Name(String),
}

impl PoolSelector {
    /// Chooses a selector from optional configuration values. The identifier
    /// wins when both are present; blank values are ignored.
    #[must_use]
    pub fn from_options(id: Option<&str>, name: Option<&str>) -> Option<Self> {
        let non_blank = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|trimmed| !trimmed.is_empty())
                .map(str::to_owned)
        };
        non_blank(id)
            .map(Self::Id)
            .or_else(|| non_blank(name).map(Self::Name))
    }
}

/// Lazily resolved, shared handle on the configured pool.
#[derive(Debug)]
pub struct PoolResolver {
    selector: Option<PoolSelector>,
    pool: OnceCell<Pool>,
}

impl PoolResolver {
    /// Creates a resolver. A `None` selector makes every resolution fail with
    /// a configuration error.
    #[must_use]
    pub fn new(selector: Option<PoolSelector>) -> Self {
        Self {
            selector,
            pool: OnceCell::new(),
        }
    }

    /// Returns the pool if it has already been resolved.
    #[must_use]
    pub fn cached(&self) -> Option<&Pool> {
        self.pool.get()
    }

    /// Resolves the working pool, querying the array only on first success.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`] when no pool is configured (without
    /// touching the array) or when the configured pool does not exist, and
    /// [`DriverError::Upstream`] when the lookup itself fails.
    pub async fn resolve<C: ArrayClient>(&self, client: &C) -> Result<&Pool, DriverError> {
        let Some(selector) = self.selector.as_ref() else {
            return Err(DriverError::Config(String::from(
                "no storage pool configured: set storage_pool_id or storage_pool_name",
            )));
        };
        self.pool
            .get_or_try_init(|| Self::lookup(client, selector))
            .await
    }

    async fn lookup<C: ArrayClient>(
        client: &C,
        selector: &PoolSelector,
    ) -> Result<Pool, DriverError> {
        let found = match selector {
            PoolSelector::Id(id) => client
                .pool_by_id(id)
                .await
                .map_err(|err| DriverError::upstream("get pool by id", err))?,
            PoolSelector::Name(name) => client
                .pool_by_name(name)
                .await
                .map_err(|err| DriverError::upstream("get pool by name", err))?,
        };
        let pool = found.ok_or_else(|| {
            DriverError::Config(match selector {
                PoolSelector::Id(id) => format!("storage pool id {id} not found on array"),
                PoolSelector::Name(name) => format!("storage pool {name} not found on array"),
            })
        })?;
        info!(pool_id = %pool.id, pool_name = %pool.name, "resolved storage pool");
        Ok(pool)
    }
}
