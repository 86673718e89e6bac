//! Unity block storage driver.
//!
//! [`UnityDriver`] wires the pool resolver, the volume assembler, the
//! attachment policy and the instance identity resolver onto an
//! [`ArrayClient`]. It holds no array state besides the resolved pool and
//! local host: every call reads the array afresh and rebuilds the
//! caller-facing volumes.

mod attachment;
mod volumes;


use tracing::info;

use crate::array::{ArrayClient, Host, Lun};
use crate::config::UnityConfig;
use crate::context::RequestContext;
use crate::error::{DriverError, ResourceKind};
use crate::host::{HostLocator, HostResolver};
use crate::identity::{HostIdentity, LocalIdentity, instance_id_for_host};
use crate::instance::{Instance, InstanceId};
use crate::pool::{PoolResolver, PoolSelector};
use crate::storage::{DriverFuture, NextDeviceInfo, Snapshot, StorageDriver, StorageType};
use crate::unity::UnityClient;
use crate::volume::{
    Volume, VolumeAttachOpts, VolumeCreateOpts, VolumeDetachOpts, VolumeInspectOpts, VolumesOpts,
    assemble,
};

/// Name under which the driver registers and tags instance identities.
pub const DRIVER_NAME: &str = "unity";

/// Storage driver backed by a Unity array.
#[derive(Debug)]
pub struct UnityDriver<C, H> {
    client: C,
    identity: H,
    pool: PoolResolver,
    host: HostResolver,
}

impl<C, H> UnityDriver<C, H>
where
    C: ArrayClient + Send + Sync,
    H: HostIdentity + Send + Sync,
{
    /// Creates a driver after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`] when a credential or the pool selection
    /// is missing.
    pub fn new(config: &UnityConfig, client: C, identity: H) -> Result<Self, DriverError> {
        config.validate()?;
        Ok(Self::from_parts(client, identity, config.pool_selector()))
    }

    /// Creates a driver from already validated parts. A `None` selector makes
    /// every pool-dependent call fail with a configuration error.
    ///
    /// Without [`Self::with_host_locator`] the host GUID doubles as the array
    /// host identifier.
    #[must_use]
    pub fn from_parts(client: C, identity: H, selector: Option<PoolSelector>) -> Self {
        Self {
            client,
            identity,
            pool: PoolResolver::new(selector),
            host: HostResolver::new(None),
        }
    }

    /// Finds the array host of this machine through `locator` instead of
    /// assuming the host GUID is the array host identifier.
    #[must_use]
    pub fn with_host_locator(self, locator: HostLocator) -> Self {
        Self {
            host: HostResolver::new(Some(locator)),
            ..self
        }
    }

    async fn connect(&self) -> Result<(), DriverError> {
        self.client
            .authenticate()
            .await
            .map_err(|err| DriverError::upstream("authenticate", err))?;
        let serial = self
            .client
            .serial_number()
            .await
            .map_err(|err| DriverError::upstream("get array serial number", err))?;
        info!(driver = DRIVER_NAME, serial = %serial, "storage driver initialised");
        Ok(())
    }

    async fn instance_id(&self, ctx: &RequestContext) -> Result<InstanceId, DriverError> {
        if let Some(existing) = ctx.authoritative_instance_id() {
            return Ok(existing.clone());
        }
        let array_host = self.host.resolve(&self.client).await?;
        Ok(instance_id_for_host(
            array_host.map(|host| host.id.as_str()),
            &self.identity,
            DRIVER_NAME,
        )?)
    }

    async fn find_lun(&self, volume_id: &str) -> Result<Lun, DriverError> {
        let trimmed = volume_id.trim();
        if trimmed.is_empty() {
            return Err(DriverError::InvalidArgument(String::from(
                "no volume id specified",
            )));
        }
        self.client
            .lun_by_id(trimmed)
            .await
            .map_err(|err| DriverError::upstream("get lun by id", err))?
            .ok_or_else(|| DriverError::not_found(ResourceKind::Volume, trimmed))
    }

    async fn find_host(&self, instance_id: &InstanceId) -> Result<Host, DriverError> {
        if let Some(local) = self
            .host
            .resolve(&self.client)
            .await?
            .filter(|local| local.id == instance_id.id)
        {
            return Ok(local.clone());
        }
        self.client
            .host_by_id(&instance_id.id)
            .await
            .map_err(|err| DriverError::upstream("get host by id", err))?
            .ok_or_else(|| DriverError::not_found(ResourceKind::Host, instance_id.id.clone()))
    }

    async fn assemble_for(
        &self,
        ctx: &RequestContext,
        lun: &Lun,
        include_attachments: bool,
    ) -> Result<Volume, DriverError> {
        let instance_id = self.instance_id(ctx).await?;
        Ok(assemble(lun, &instance_id, &ctx.device_map(include_attachments)))
    }

    async fn inspect_instance(&self, ctx: &RequestContext) -> Result<Instance, DriverError> {
        Ok(Instance {
            instance_id: self.instance_id(ctx).await?,
            provider_name: String::from(DRIVER_NAME),
        })
    }
}

/// Driver wired to a real array and the local host identity.
pub type UnityArrayDriver = UnityDriver<UnityClient, LocalIdentity>;

impl UnityArrayDriver {
    /// Builds the REST client, host identity and host locator described by
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`] when the configuration is incomplete or
    /// the endpoint cannot be used.
    pub fn from_config(config: &UnityConfig) -> Result<Self, DriverError> {
        config.validate()?;
        let client =
            UnityClient::new(config).map_err(|err| DriverError::Config(err.to_string()))?;
        Ok(Self::from_parts(
            client,
            LocalIdentity::from_config(config),
            config.pool_selector(),
        )
        .with_host_locator(HostLocator::from_config(config)))
    }
}

/// Factory registering the array-backed driver with a
/// [`DriverRegistry`](crate::registry::DriverRegistry).
#[must_use]
pub fn unity_factory(
    config: UnityConfig,
) -> impl Fn() -> Result<Box<dyn StorageDriver>, DriverError> + Send + Sync + 'static {
    move || {
        let driver: Box<dyn StorageDriver> = Box::new(UnityArrayDriver::from_config(&config)?);
        Ok(driver)
    }
}

const fn not_implemented<T>(operation: &'static str) -> Result<T, DriverError> {
    Err(DriverError::NotImplemented {
        driver: DRIVER_NAME,
        operation,
    })
}

impl<C, H> StorageDriver for UnityDriver<C, H>
where
    C: ArrayClient + Send + Sync,
    H: HostIdentity + Send + Sync,
{
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn init<'a>(&'a self, _ctx: &'a RequestContext) -> DriverFuture<'a, ()> {
        Box::pin(async move { self.connect().await })
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Block
    }

    fn next_device_info(&self) -> Result<Option<NextDeviceInfo>, DriverError> {
        Ok(None)
    }

    fn instance_inspect<'a>(&'a self, ctx: &'a RequestContext) -> DriverFuture<'a, Instance> {
        Box::pin(async move { self.inspect_instance(ctx).await })
    }

    fn volumes<'a>(
        &'a self,
        ctx: &'a RequestContext,
        opts: &'a VolumesOpts,
    ) -> DriverFuture<'a, Vec<Volume>> {
        Box::pin(async move { self.list_volumes(ctx, *opts).await })
    }

    fn volume_inspect<'a>(
        &'a self,
        ctx: &'a RequestContext,
        volume_id: &'a str,
        opts: &'a VolumeInspectOpts,
    ) -> DriverFuture<'a, Volume> {
        Box::pin(async move { self.inspect_volume(ctx, volume_id, opts.attachments).await })
    }

    fn volume_create<'a>(
        &'a self,
        ctx: &'a RequestContext,
        name: &'a str,
        opts: &'a VolumeCreateOpts,
    ) -> DriverFuture<'a, Volume> {
        Box::pin(async move { self.create_volume(ctx, name, opts).await })
    }

    fn volume_create_from_snapshot<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _snapshot_id: &'a str,
        _name: &'a str,
        _opts: &'a VolumeCreateOpts,
    ) -> DriverFuture<'a, Volume> {
        Box::pin(async move { not_implemented("volume create from snapshot") })
    }

    fn volume_copy<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _volume_id: &'a str,
        _name: &'a str,
    ) -> DriverFuture<'a, Volume> {
        Box::pin(async move { not_implemented("volume copy") })
    }

    fn volume_snapshot<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _volume_id: &'a str,
        _snapshot_name: &'a str,
    ) -> DriverFuture<'a, Snapshot> {
        Box::pin(async move { not_implemented("volume snapshot") })
    }

    fn volume_remove<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        volume_id: &'a str,
    ) -> DriverFuture<'a, ()> {
        Box::pin(async move { self.remove_volume(volume_id).await })
    }

    fn volume_attach<'a>(
        &'a self,
        ctx: &'a RequestContext,
        volume_id: &'a str,
        opts: &'a VolumeAttachOpts,
    ) -> DriverFuture<'a, (Volume, String)> {
        Box::pin(async move { self.attach_volume(ctx, volume_id, opts.force).await })
    }

    fn volume_detach<'a>(
        &'a self,
        ctx: &'a RequestContext,
        volume_id: &'a str,
        _opts: &'a VolumeDetachOpts,
    ) -> DriverFuture<'a, Volume> {
        Box::pin(async move { self.detach_volume(ctx, volume_id).await })
    }

    fn volume_detach_all<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        volume_id: &'a str,
    ) -> DriverFuture<'a, ()> {
        Box::pin(async move { self.detach_all(volume_id).await })
    }

    fn snapshots<'a>(&'a self, _ctx: &'a RequestContext) -> DriverFuture<'a, Vec<Snapshot>> {
        Box::pin(async move { not_implemented("snapshots") })
    }

    fn snapshot_inspect<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _snapshot_id: &'a str,
    ) -> DriverFuture<'a, Snapshot> {
        Box::pin(async move { not_implemented("snapshot inspect") })
    }

    fn snapshot_copy<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _snapshot_id: &'a str,
        _snapshot_name: &'a str,
        _dest_region: &'a str,
    ) -> DriverFuture<'a, Snapshot> {
        Box::pin(async move { not_implemented("snapshot copy") })
    }

    fn snapshot_remove<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _snapshot_id: &'a str,
    ) -> DriverFuture<'a, ()> {
        Box::pin(async move { not_implemented("snapshot remove") })
    }
}
