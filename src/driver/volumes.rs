//! Volume listing, inspection, creation and removal.

use tracing::{info, warn};

use super::UnityDriver;
use crate::array::{ArrayClient, LunRequest};
use crate::context::RequestContext;
use crate::error::DriverError;
use crate::identity::HostIdentity;
use crate::volume::{
    THIN_VOLUME_TYPE, Volume, VolumeCreateOpts, VolumesOpts, assemble, gib_to_bytes,
};

impl<C, H> UnityDriver<C, H>
where
    C: ArrayClient + Send + Sync,
    H: HostIdentity + Send + Sync,
{
    /// Assembles every LUN of the working pool. The identity and the device
    /// map are resolved once and shared by all volumes.
    pub(super) async fn list_volumes(
        &self,
        ctx: &RequestContext,
        opts: VolumesOpts,
    ) -> Result<Vec<Volume>, DriverError> {
        let pool = self.pool.resolve(&self.client).await?;
        let luns = self
            .client
            .luns(pool)
            .await
            .map_err(|err| DriverError::upstream("list luns", err))?;
        let instance_id = self.instance_id(ctx).await?;
        let device_map = ctx.device_map(opts.attachments);
        Ok(luns
            .iter()
            .map(|lun| assemble(lun, &instance_id, &device_map))
            .collect())
    }

    pub(super) async fn inspect_volume(
        &self,
        ctx: &RequestContext,
        volume_id: &str,
        include_attachments: bool,
    ) -> Result<Volume, DriverError> {
        let lun = self.find_lun(volume_id).await?;
        self.assemble_for(ctx, &lun, include_attachments).await
    }

    pub(super) async fn create_volume(
        &self,
        ctx: &RequestContext,
        name: &str,
        opts: &VolumeCreateOpts,
    ) -> Result<Volume, DriverError> {
        let request = lun_request(name, opts)?;
        let pool = self.pool.resolve(&self.client).await?;
        let lun = self
            .client
            .create_lun(pool, &request)
            .await
            .map_err(|err| DriverError::upstream("create lun", err))?;
        info!(
            volume_id = %lun.id,
            name = %lun.name,
            pool_id = %pool.id,
            size_bytes = request.size_bytes,
            "created volume"
        );
        self.inspect_volume(ctx, &lun.id, true).await
    }

    pub(super) async fn remove_volume(&self, volume_id: &str) -> Result<(), DriverError> {
        let lun = self.find_lun(volume_id).await?;
        self.client
            .delete_lun(&lun)
            .await
            .map_err(|err| DriverError::upstream("delete lun", err))?;
        info!(volume_id = %lun.id, "removed volume");
        Ok(())
    }
}

/// Validates creation options and converts them into a thin LUN request.
fn lun_request(name: &str, opts: &VolumeCreateOpts) -> Result<LunRequest, DriverError> {
    if name.trim().is_empty() {
        return Err(DriverError::InvalidArgument(String::from(
            "no volume name specified",
        )));
    }
    let size_gib = match opts.size {
        Some(size) if size > 0 => size,
        _ => {
            return Err(DriverError::InvalidArgument(String::from(
                "volume size must be a positive number of GiB",
            )));
        }
    };
    let size_bytes = gib_to_bytes(size_gib).ok_or_else(|| {
        DriverError::InvalidArgument(format!("volume size {size_gib} GiB is too large"))
    })?;
    if let Some(requested) = opts
        .volume_type
        .as_deref()
        .filter(|kind| !kind.eq_ignore_ascii_case(THIN_VOLUME_TYPE))
    {
        warn!(requested, "only thin volumes are provisioned; ignoring type");
    }
    if let Some(zone) = opts.availability_zone.as_deref() {
        warn!(zone, "availability zones are not supported; ignoring zone");
    }
    if let Some(iops) = opts.iops {
        warn!(iops, "provisioned IOPS are not supported; ignoring iops");
    }
    Ok(LunRequest::thin(name, size_bytes))
}
