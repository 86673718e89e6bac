//! Core library for the `unityvol` Unity block storage driver.
//!
//! The crate exposes a storage driver abstraction for provisioning block
//! volumes, a Unity implementation that reconciles array LUNs with the local
//! view of attached devices, and a Unisphere REST client backing it
//! (resolve pool → create LUN → attach to host → detach → remove).

pub mod array;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod host;
pub mod identity;
pub mod instance;
pub mod pool;
pub mod registry;
pub mod storage;
pub mod test_support;
pub mod unity;
pub mod volume;

pub use array::{ArrayClient, ArrayFuture, Host, HostAccess, Lun, LunRequest, Pool};
pub use config::{ConfigError, UnityConfig};
pub use context::{LocalDevices, RequestContext};
pub use driver::{DRIVER_NAME, UnityArrayDriver, UnityDriver, unity_factory};
pub use error::{DriverError, ErrorKind, ResourceKind};
pub use host::{HostLocator, HostResolver};
pub use identity::{
    HostIdentity, IdentityError, LocalIdentity, instance_id_for_host, resolve_instance_id,
};
pub use instance::{HostMetadata, Instance, InstanceId, MetadataError};
pub use pool::{PoolResolver, PoolSelector};
pub use registry::{DriverFactory, DriverRegistry};
pub use storage::{DriverFuture, NextDeviceInfo, Snapshot, StorageDriver, StorageType};
pub use unity::{UnityApiError, UnityClient};
pub use volume::{
    Volume, VolumeAttachOpts, VolumeAttachment, VolumeCreateOpts, VolumeDetachOpts,
    VolumeInspectOpts, VolumesOpts, assemble,
};
