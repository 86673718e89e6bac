//! Inbound storage driver contract consumed by the orchestration host.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::error::DriverError;
use crate::instance::Instance;
use crate::volume::{
    Volume, VolumeAttachOpts, VolumeCreateOpts, VolumeDetachOpts, VolumeInspectOpts, VolumesOpts,
};

/// Kind of storage a driver provides.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Block devices attached to instances.
    Block,
    /// Network attached file shares.
    Nas,
    /// Object buckets.
    Object,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => write!(f, "block"),
            Self::Nas => write!(f, "nas"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// Point-in-time copy of a volume.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Snapshot identifier.
    pub id: String,
    /// Snapshot name.
    pub name: String,
    /// Volume the snapshot was taken from.
    pub volume_id: String,
    /// Size in gibibytes.
    pub volume_size: u64,
}

/// Hints for predicting the device name of the next attachment.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextDeviceInfo {
    /// Prefix shared by device names, for example `xvd`.
    pub prefix: String,
    /// Pattern matched by the variable suffix.
    pub pattern: String,
}

/// Future returned by driver operations.
pub type DriverFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DriverError>> + Send + 'a>>;

/// Volume lifecycle exposed by every storage driver.
///
/// The trait is object safe so a host application can hold drivers as
/// `Box<dyn StorageDriver>` after looking them up by name. Every call receives
/// the request context; none of its contents are retained between calls.
pub trait StorageDriver: Send + Sync {
    /// Registered name of the driver.
    fn name(&self) -> &'static str;

    /// Prepares the driver for use, establishing the array session.
    fn init<'a>(&'a self, ctx: &'a RequestContext) -> DriverFuture<'a, ()>;

    /// Kind of storage provided.
    fn storage_type(&self) -> StorageType;

    /// Device naming hints, or `None` when the driver cannot predict names.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when the hints cannot be computed.
    fn next_device_info(&self) -> Result<Option<NextDeviceInfo>, DriverError>;

    /// Describes the calling instance.
    fn instance_inspect<'a>(&'a self, ctx: &'a RequestContext) -> DriverFuture<'a, Instance>;

    /// Lists volumes in the working pool.
    fn volumes<'a>(
        &'a self,
        ctx: &'a RequestContext,
        opts: &'a VolumesOpts,
    ) -> DriverFuture<'a, Vec<Volume>>;

    /// Returns one volume.
    fn volume_inspect<'a>(
        &'a self,
        ctx: &'a RequestContext,
        volume_id: &'a str,
        opts: &'a VolumeInspectOpts,
    ) -> DriverFuture<'a, Volume>;

    /// Creates a volume in the working pool.
    fn volume_create<'a>(
        &'a self,
        ctx: &'a RequestContext,
        name: &'a str,
        opts: &'a VolumeCreateOpts,
    ) -> DriverFuture<'a, Volume>;

    /// Creates a volume from a snapshot.
    fn volume_create_from_snapshot<'a>(
        &'a self,
        ctx: &'a RequestContext,
        snapshot_id: &'a str,
        name: &'a str,
        opts: &'a VolumeCreateOpts,
    ) -> DriverFuture<'a, Volume>;

    /// Copies a volume under a new name.
    fn volume_copy<'a>(
        &'a self,
        ctx: &'a RequestContext,
        volume_id: &'a str,
        name: &'a str,
    ) -> DriverFuture<'a, Volume>;

    /// Snapshots a volume.
    fn volume_snapshot<'a>(
        &'a self,
        ctx: &'a RequestContext,
        volume_id: &'a str,
        snapshot_name: &'a str,
    ) -> DriverFuture<'a, Snapshot>;

    /// Deletes a volume. Volumes must be detached first.
    fn volume_remove<'a>(
        &'a self,
        ctx: &'a RequestContext,
        volume_id: &'a str,
    ) -> DriverFuture<'a, ()>;

    /// Attaches a volume to the calling instance and returns it together with
    /// the token used to locate the device.
    fn volume_attach<'a>(
        &'a self,
        ctx: &'a RequestContext,
        volume_id: &'a str,
        opts: &'a VolumeAttachOpts,
    ) -> DriverFuture<'a, (Volume, String)>;

    /// Detaches a volume from the calling instance.
    fn volume_detach<'a>(
        &'a self,
        ctx: &'a RequestContext,
        volume_id: &'a str,
        opts: &'a VolumeDetachOpts,
    ) -> DriverFuture<'a, Volume>;

    /// Detaches a volume from every host.
    fn volume_detach_all<'a>(
        &'a self,
        ctx: &'a RequestContext,
        volume_id: &'a str,
    ) -> DriverFuture<'a, ()>;

    /// Lists snapshots.
    fn snapshots<'a>(&'a self, ctx: &'a RequestContext) -> DriverFuture<'a, Vec<Snapshot>>;

    /// Returns one snapshot.
    fn snapshot_inspect<'a>(
        &'a self,
        ctx: &'a RequestContext,
        snapshot_id: &'a str,
    ) -> DriverFuture<'a, Snapshot>;

    /// Copies a snapshot, optionally to another region.
    fn snapshot_copy<'a>(
        &'a self,
        ctx: &'a RequestContext,
        snapshot_id: &'a str,
        snapshot_name: &'a str,
        dest_region: &'a str,
    ) -> DriverFuture<'a, Snapshot>;

    /// Deletes a snapshot.
    fn snapshot_remove<'a>(
        &'a self,
        ctx: &'a RequestContext,
        snapshot_id: &'a str,
    ) -> DriverFuture<'a, ()>;
}
