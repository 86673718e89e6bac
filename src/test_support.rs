//! Test support utilities shared across unit and integration tests.
//!
//! [`ArrayDouble`] is an in-memory array that records every call made through
//! [`ArrayClient`], so tests can assert both results and the exact number of
//! array round trips and mutations.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard as StdMutexGuard};

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::array::{ArrayClient, ArrayFuture, Host, HostAccess, Lun, LunRequest, Pool};
use crate::identity::{HostIdentity, IdentityError};

/// Operations exposed by [`ArrayClient`], used to count and fail calls.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ArrayOp {
    /// [`ArrayClient::authenticate`].
    Authenticate,
    /// [`ArrayClient::serial_number`].
    SerialNumber,
    /// [`ArrayClient::pool_by_id`].
    PoolById,
    /// [`ArrayClient::pool_by_name`].
    PoolByName,
    /// [`ArrayClient::luns`].
    Luns,
    /// [`ArrayClient::create_lun`].
    CreateLun,
    /// [`ArrayClient::lun_by_id`].
    LunById,
    /// [`ArrayClient::delete_lun`].
    DeleteLun,
    /// [`ArrayClient::host_associations`].
    HostAssociations,
    /// [`ArrayClient::attach_host`].
    AttachHost,
    /// [`ArrayClient::detach_host`].
    DetachHost,
    /// [`ArrayClient::replace_host_access`].
    ReplaceHostAccess,
    /// [`ArrayClient::detach_all_hosts`].
    DetachAllHosts,
    /// [`ArrayClient::host_by_id`].
    HostById,
    /// [`ArrayClient::host_by_name`].
    HostByName,
}

impl ArrayOp {
    const fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::CreateLun
                | Self::DeleteLun
                | Self::AttachHost
                | Self::DetachHost
                | Self::ReplaceHostAccess
                | Self::DetachAllHosts
        )
    }
}

/// Failures injected by [`ArrayDouble`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ArrayDoubleError {
    /// Raised for operations configured with [`ArrayDouble::fail_on`].
    #[error("simulated {0:?} failure")]
    Injected(ArrayOp),
    /// Raised when deleting a LUN that still has host associations.
    #[error("LUN {0} has host access configured")]
    LunInUse(String),
    /// Raised when mutating a LUN the double does not hold.
    #[error("LUN {0} does not exist")]
    UnknownLun(String),
}

#[derive(Debug, Default)]
struct State {
    serial: String,
    pools: Vec<Pool>,
    luns: BTreeMap<String, (String, Lun)>,
    hosts: BTreeMap<String, Host>,
    calls: BTreeMap<ArrayOp, usize>,
    failing: BTreeSet<ArrayOp>,
    next_lun: usize,
}

/// In-memory array double with call accounting and failure injection.
#[derive(Clone, Debug, Default)]
pub struct ArrayDouble {
    state: Arc<Mutex<State>>,
}

impl ArrayDouble {
    /// Creates an empty array reporting serial `APM00000000001`.
    #[must_use]
    pub fn new() -> Self {
        let double = Self::default();
        double.lock().serial = String::from("APM00000000001");
        double
    }

    fn lock(&self) -> StdMutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|err| panic!("array double state poisoned: {err}"))
    }

    fn record(&self, op: ArrayOp) -> Result<StdMutexGuard<'_, State>, ArrayDoubleError> {
        let mut state = self.lock();
        *state.calls.entry(op).or_default() += 1;
        if state.failing.contains(&op) {
            return Err(ArrayDoubleError::Injected(op));
        }
        Ok(state)
    }

    /// Adds a pool.
    pub fn add_pool(&self, id: &str, name: &str) {
        self.lock().pools.push(Pool {
            id: id.to_owned(),
            name: name.to_owned(),
        });
    }

    /// Adds a host object.
    pub fn add_host(&self, id: &str, name: &str) {
        self.lock().hosts.insert(
            id.to_owned(),
            Host {
                id: id.to_owned(),
                name: name.to_owned(),
            },
        );
    }

    /// Adds a LUN to `pool_id` with the given size and attached host ids.
    ///
    /// Host ids without a matching [`Self::add_host`] entry are registered
    /// with the id as name.
    pub fn add_lun(&self, pool_id: &str, id: &str, name: &str, size_total: u64, hosts: &[&str]) {
        let mut state = self.lock();
        let host_access = hosts
            .iter()
            .map(|host_id| {
                let host = state
                    .hosts
                    .entry((*host_id).to_owned())
                    .or_insert_with(|| Host {
                        id: (*host_id).to_owned(),
                        name: (*host_id).to_owned(),
                    })
                    .clone();
                HostAccess::new(host)
            })
            .collect();
        state.luns.insert(
            id.to_owned(),
            (
                pool_id.to_owned(),
                Lun {
                    id: id.to_owned(),
                    name: name.to_owned(),
                    size_total,
                    host_access,
                },
            ),
        );
    }

    /// Makes every later call to `op` fail.
    pub fn fail_on(&self, op: ArrayOp) {
        self.lock().failing.insert(op);
    }

    /// Stops injecting failures for `op`.
    pub fn recover(&self, op: ArrayOp) {
        self.lock().failing.remove(&op);
    }

    /// Number of calls made to `op`, including failed ones.
    #[must_use]
    pub fn calls(&self, op: ArrayOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or_default()
    }

    /// Number of calls made to any operation.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    /// Number of calls to mutating operations.
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(op, _)| op.is_mutation())
            .map(|(_, count)| count)
            .sum()
    }

    /// Returns the stored LUN, if present.
    #[must_use]
    pub fn lun(&self, id: &str) -> Option<Lun> {
        self.lock().luns.get(id).map(|(_, lun)| lun.clone())
    }

    /// Returns the ids of hosts associated with the stored LUN.
    #[must_use]
    pub fn attached_hosts(&self, lun_id: &str) -> Vec<String> {
        self.lun(lun_id)
            .map(|lun| {
                lun.host_access
                    .into_iter()
                    .map(|access| access.host.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of LUNs held by the double.
    #[must_use]
    pub fn lun_count(&self) -> usize {
        self.lock().luns.len()
    }

    fn with_lun<T>(
        &self,
        op: ArrayOp,
        lun_id: &str,
        apply: impl FnOnce(&mut Lun) -> T,
    ) -> Result<T, ArrayDoubleError> {
        let mut state = self.record(op)?;
        state
            .luns
            .get_mut(lun_id)
            .map(|(_, lun)| apply(lun))
            .ok_or_else(|| ArrayDoubleError::UnknownLun(lun_id.to_owned()))
    }
}

impl ArrayClient for ArrayDouble {
    type Error = ArrayDoubleError;

    fn authenticate(&self) -> ArrayFuture<'_, (), Self::Error> {
        Box::pin(async move { self.record(ArrayOp::Authenticate).map(drop) })
    }

    fn serial_number(&self) -> ArrayFuture<'_, String, Self::Error> {
        Box::pin(async move { Ok(self.record(ArrayOp::SerialNumber)?.serial.clone()) })
    }

    fn pool_by_id<'a>(&'a self, id: &'a str) -> ArrayFuture<'a, Option<Pool>, Self::Error> {
        Box::pin(async move {
            let state = self.record(ArrayOp::PoolById)?;
            Ok(state.pools.iter().find(|pool| pool.id == id).cloned())
        })
    }

    fn pool_by_name<'a>(&'a self, name: &'a str) -> ArrayFuture<'a, Option<Pool>, Self::Error> {
        Box::pin(async move {
            let state = self.record(ArrayOp::PoolByName)?;
            Ok(state.pools.iter().find(|pool| pool.name == name).cloned())
        })
    }

    fn luns<'a>(&'a self, pool: &'a Pool) -> ArrayFuture<'a, Vec<Lun>, Self::Error> {
        Box::pin(async move {
            let state = self.record(ArrayOp::Luns)?;
            Ok(state
                .luns
                .values()
                .filter(|(pool_id, _)| *pool_id == pool.id)
                .map(|(_, lun)| lun.clone())
                .collect())
        })
    }

    fn create_lun<'a>(
        &'a self,
        pool: &'a Pool,
        request: &'a LunRequest,
    ) -> ArrayFuture<'a, Lun, Self::Error> {
        Box::pin(async move {
            let mut state = self.record(ArrayOp::CreateLun)?;
            state.next_lun += 1;
            let lun = Lun {
                id: format!("sv_{}", 100 + state.next_lun),
                name: request.name.clone(),
                size_total: request.size_bytes,
                host_access: Vec::new(),
            };
            state
                .luns
                .insert(lun.id.clone(), (pool.id.clone(), lun.clone()));
            Ok(lun)
        })
    }

    fn lun_by_id<'a>(&'a self, id: &'a str) -> ArrayFuture<'a, Option<Lun>, Self::Error> {
        Box::pin(async move {
            let state = self.record(ArrayOp::LunById)?;
            Ok(state.luns.get(id).map(|(_, lun)| lun.clone()))
        })
    }

    fn delete_lun<'a>(&'a self, lun: &'a Lun) -> ArrayFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let mut state = self.record(ArrayOp::DeleteLun)?;
            let in_use = state
                .luns
                .get(&lun.id)
                .map(|(_, stored)| !stored.host_access.is_empty())
                .ok_or_else(|| ArrayDoubleError::UnknownLun(lun.id.clone()))?;
            if in_use {
                return Err(ArrayDoubleError::LunInUse(lun.id.clone()));
            }
            state.luns.remove(&lun.id);
            Ok(())
        })
    }

    fn host_associations<'a>(
        &'a self,
        lun: &'a Lun,
    ) -> ArrayFuture<'a, Vec<HostAccess>, Self::Error> {
        Box::pin(async move {
            self.with_lun(ArrayOp::HostAssociations, &lun.id, |stored| {
                stored.host_access.clone()
            })
        })
    }

    fn attach_host<'a>(
        &'a self,
        lun: &'a Lun,
        host: &'a Host,
    ) -> ArrayFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.with_lun(ArrayOp::AttachHost, &lun.id, |stored| {
                if !stored.host_access.iter().any(|access| access.host == *host) {
                    stored.host_access.push(HostAccess::new(host.clone()));
                }
            })
        })
    }

    fn detach_host<'a>(
        &'a self,
        lun: &'a Lun,
        host: &'a Host,
    ) -> ArrayFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.with_lun(ArrayOp::DetachHost, &lun.id, |stored| {
                stored.host_access.retain(|access| access.host.id != host.id);
            })
        })
    }

    fn replace_host_access<'a>(
        &'a self,
        lun: &'a Lun,
        host: &'a Host,
    ) -> ArrayFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.with_lun(ArrayOp::ReplaceHostAccess, &lun.id, |stored| {
                stored.host_access = vec![HostAccess::new(host.clone())];
            })
        })
    }

    fn detach_all_hosts<'a>(&'a self, lun: &'a Lun) -> ArrayFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.with_lun(ArrayOp::DetachAllHosts, &lun.id, |stored| {
                stored.host_access.clear();
            })
        })
    }

    fn host_by_id<'a>(&'a self, id: &'a str) -> ArrayFuture<'a, Option<Host>, Self::Error> {
        Box::pin(async move {
            let state = self.record(ArrayOp::HostById)?;
            Ok(state.hosts.get(id).cloned())
        })
    }

    fn host_by_name<'a>(&'a self, name: &'a str) -> ArrayFuture<'a, Option<Host>, Self::Error> {
        Box::pin(async move {
            let state = self.record(ArrayOp::HostByName)?;
            Ok(state.hosts.values().find(|host| host.name == name).cloned())
        })
    }
}

/// Host identity returning a fixed GUID, or failing when built with
/// [`StaticIdentity::unavailable`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StaticIdentity {
    guid: Option<String>,
}

impl StaticIdentity {
    /// Creates an identity that always reports `guid`.
    #[must_use]
    pub fn new(guid: &str) -> Self {
        Self {
            guid: Some(guid.to_owned()),
        }
    }

    /// Creates an identity whose lookup always fails.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self { guid: None }
    }
}

impl HostIdentity for StaticIdentity {
    fn host_guid(&self) -> Result<String, IdentityError> {
        self.guid.clone().ok_or_else(|| IdentityError::Empty {
            path: camino::Utf8PathBuf::from("<static>"),
        })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets and clears environment variables while holding a global mutex.
    /// A `None` value removes the variable for the guard's lifetime.
    pub async fn scoped(pairs: &[(&str, Option<&str>)]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            previous.push(((*key).to_owned(), env::var_os(key)));
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`.
            unsafe {
                match value {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in self.previous.iter().rev() {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
