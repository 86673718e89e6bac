//! Attach and detach transitions.
//!
//! Attachment state is observed on the array, never stored locally. A volume
//! with host associations counts as attached; attaching it again requires
//! `force`, which swaps every existing association for the caller's host in a
//! single array change, so a rejected swap leaves the old hosts in place.

use tracing::{info, warn};

use super::UnityDriver;
use crate::array::{ArrayClient, HostAccess, Lun};
use crate::context::RequestContext;
use crate::error::DriverError;
use crate::identity::HostIdentity;
use crate::volume::Volume;

impl<C, H> UnityDriver<C, H>
where
    C: ArrayClient + Send + Sync,
    H: HostIdentity + Send + Sync,
{
    async fn associations(&self, lun: &Lun) -> Result<Vec<HostAccess>, DriverError> {
        self.client
            .host_associations(lun)
            .await
            .map_err(|err| DriverError::upstream("get host associations", err))
    }

    /// Attaches the volume to the calling instance's host and returns the
    /// refreshed volume together with its identifier as the device token.
    pub(super) async fn attach_volume(
        &self,
        ctx: &RequestContext,
        volume_id: &str,
        force: bool,
    ) -> Result<(Volume, String), DriverError> {
        let lun = self.find_lun(volume_id).await?;
        let existing = self.associations(&lun).await?;
        if !existing.is_empty() && !force {
            return Err(DriverError::AlreadyAttached {
                volume_id: lun.id,
                host_ids: existing.into_iter().map(|access| access.host.id).collect(),
            });
        }
        let instance_id = self.instance_id(ctx).await?;
        let host = self.find_host(&instance_id).await?;

        if existing.is_empty() {
            self.client
                .attach_host(&lun, &host)
                .await
                .map_err(|err| DriverError::upstream("attach host", err))?;
        } else {
            warn!(
                volume_id = %lun.id,
                previous_hosts = existing.len(),
                "force attach is replacing existing host access"
            );
            self.client
                .replace_host_access(&lun, &host)
                .await
                .map_err(|err| DriverError::upstream("replace host access", err))?;
        }
        info!(volume_id = %lun.id, host_id = %host.id, force, "attached volume");

        let volume = self.assemble_for(ctx, &lun, true).await?;
        let token = volume.id.clone();
        Ok((volume, token))
    }

    /// Removes the calling instance's host from the volume.
    pub(super) async fn detach_volume(
        &self,
        ctx: &RequestContext,
        volume_id: &str,
    ) -> Result<Volume, DriverError> {
        let lun = self.find_lun(volume_id).await?;
        let instance_id = self.instance_id(ctx).await?;
        let host = self.find_host(&instance_id).await?;
        self.client
            .detach_host(&lun, &host)
            .await
            .map_err(|err| DriverError::upstream("detach host", err))?;
        info!(volume_id = %lun.id, host_id = %host.id, "detached volume");
        self.inspect_volume(ctx, &lun.id, true).await
    }

    /// Removes every host association of the volume.
    pub(super) async fn detach_all(&self, volume_id: &str) -> Result<(), DriverError> {
        let lun = self.find_lun(volume_id).await?;
        self.client
            .detach_all_hosts(&lun)
            .await
            .map_err(|err| DriverError::upstream("detach all hosts", err))?;
        info!(volume_id = %lun.id, "detached volume from all hosts");
        Ok(())
    }
}
