//! Array client abstraction consumed by the driver.
//!
//! The driver never speaks the array protocol itself. Everything it needs
//! from the array is expressed by [`ArrayClient`]; the Unity REST client and
//! the in-memory test double both implement it.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Storage pool LUNs are carved from.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    /// Array identifier, for example `pool_1`.
    pub id: String,
    /// Human readable pool name.
    pub name: String,
}

/// Array-side compute host object.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Host {
    /// Array identifier, for example `Host_3`.
    pub id: String,
    /// Host name as registered on the array.
    pub name: String,
}

/// Association between a LUN and a host that can see it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HostAccess {
    /// Host granted access.
    pub host: Host,
}

impl HostAccess {
    /// Creates an association for `host`.
    #[must_use]
    pub const fn new(host: Host) -> Self {
        Self { host }
    }
}

/// Array-native block volume.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Lun {
    /// Array identifier, for example `sv_12`.
    pub id: String,
    /// LUN name.
    pub name: String,
    /// Provisioned size in bytes.
    pub size_total: u64,
    /// Hosts associated with the LUN when it was fetched.
    pub host_access: Vec<HostAccess>,
}

/// Parameters for carving a new LUN out of a pool.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LunRequest {
    /// Name of the new LUN.
    pub name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Whether the LUN is thin provisioned.
    pub thin: bool,
}

impl LunRequest {
    /// Creates a thin LUN request, trimming the name.
    #[must_use]
    pub fn thin(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into().trim().to_owned(),
            size_bytes,
            thin: true,
        }
    }
}

/// Future returned by array operations.
pub type ArrayFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Capabilities the driver requires from an authenticated array handle.
///
/// Lookups by identifier resolve to `Ok(None)` when the array does not know
/// the object; `Err` is reserved for transport failures and rejections.
pub trait ArrayClient {
    /// Client specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Establishes a session with the array.
    fn authenticate(&self) -> ArrayFuture<'_, (), Self::Error>;

    /// Returns the array serial number.
    fn serial_number(&self) -> ArrayFuture<'_, String, Self::Error>;

    /// Looks up a pool by identifier.
    fn pool_by_id<'a>(&'a self, id: &'a str) -> ArrayFuture<'a, Option<Pool>, Self::Error>;

    /// Looks up a pool by name.
    fn pool_by_name<'a>(&'a self, name: &'a str) -> ArrayFuture<'a, Option<Pool>, Self::Error>;

    /// Lists the LUNs carved from a pool.
    fn luns<'a>(&'a self, pool: &'a Pool) -> ArrayFuture<'a, Vec<Lun>, Self::Error>;

    /// Creates a LUN in the pool and returns it.
    fn create_lun<'a>(
        &'a self,
        pool: &'a Pool,
        request: &'a LunRequest,
    ) -> ArrayFuture<'a, Lun, Self::Error>;

    /// Looks up a LUN by identifier.
    fn lun_by_id<'a>(&'a self, id: &'a str) -> ArrayFuture<'a, Option<Lun>, Self::Error>;

    /// Deletes the LUN. Arrays refuse while hosts remain attached.
    fn delete_lun<'a>(&'a self, lun: &'a Lun) -> ArrayFuture<'a, (), Self::Error>;

    /// Returns the current host associations of a LUN, read from the array
    /// rather than from `lun`.
    fn host_associations<'a>(
        &'a self,
        lun: &'a Lun,
    ) -> ArrayFuture<'a, Vec<HostAccess>, Self::Error>;

    /// Grants a host access to the LUN.
    fn attach_host<'a>(&'a self, lun: &'a Lun, host: &'a Host)
    -> ArrayFuture<'a, (), Self::Error>;

    /// Removes one host's access to the LUN.
    fn detach_host<'a>(&'a self, lun: &'a Lun, host: &'a Host)
    -> ArrayFuture<'a, (), Self::Error>;

    /// Makes `host` the only host with access to the LUN.
    ///
    /// The array applies the swap as one change: on failure the previous
    /// associations are still in place.
    fn replace_host_access<'a>(
        &'a self,
        lun: &'a Lun,
        host: &'a Host,
    ) -> ArrayFuture<'a, (), Self::Error>;

    /// Removes every host association of the LUN.
    fn detach_all_hosts<'a>(&'a self, lun: &'a Lun) -> ArrayFuture<'a, (), Self::Error>;

    /// Looks up a host by identifier.
    fn host_by_id<'a>(&'a self, id: &'a str) -> ArrayFuture<'a, Option<Host>, Self::Error>;

    /// Looks up a host by its registered name.
    fn host_by_name<'a>(&'a self, name: &'a str)
    -> ArrayFuture<'a, Option<Host>, Self::Error>;
}
