//! Canonical volume representation and its assembly from array LUNs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::array::Lun;
use crate::instance::InstanceId;

/// Type tag reported for every volume; the driver only provisions thin LUNs.
pub const THIN_VOLUME_TYPE: &str = "thin";

/// Bits to shift a byte count by to obtain whole gibibytes.
const GIB_SHIFT: u32 = 30;

/// Caller-facing volume, rebuilt from array state on every call.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Volume name.
    pub name: String,
    /// Volume identifier; always the LUN identifier.
    pub id: String,
    /// Size in whole gibibytes, rounded down.
    pub size: u64,
    /// Provisioning type tag.
    #[serde(rename = "type")]
    pub volume_type: String,
    /// Availability zone; the array has no zone concept.
    pub availability_zone: String,
    /// Provider status; not modelled.
    pub status: String,
    /// Provisioned IOPS; not modelled.
    pub iops: u64,
    /// Attachment records in host order.
    pub attachments: Vec<VolumeAttachment>,
}

/// One instance's view of a volume attachment.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeAttachment {
    /// Attached volume identifier.
    pub volume_id: String,
    /// Instance owning this view.
    pub instance_id: InstanceId,
    /// Local device name; empty when the volume is not visible as a block
    /// device on the instance.
    pub device_name: String,
    /// Reserved.
    pub status: String,
}

/// Converts a byte count to whole gibibytes, rounding down.
#[must_use]
pub const fn bytes_to_gib(bytes: u64) -> u64 {
    bytes >> GIB_SHIFT
}

/// Converts gibibytes to bytes, returning `None` on overflow.
#[must_use]
pub const fn gib_to_bytes(gib: u64) -> Option<u64> {
    gib.checked_mul(1 << GIB_SHIFT)
}

/// Builds the canonical volume for `lun` as seen by `instance_id`.
///
/// The single attachment carries the device name mapped to the LUN id, or an
/// empty string when the map has no entry.
#[must_use]
pub fn assemble(
    lun: &Lun,
    instance_id: &InstanceId,
    device_map: &BTreeMap<String, String>,
) -> Volume {
    let attachment = VolumeAttachment {
        volume_id: lun.id.clone(),
        instance_id: instance_id.clone(),
        device_name: device_map.get(&lun.id).cloned().unwrap_or_default(),
        status: String::new(),
    };
    Volume {
        name: lun.name.clone(),
        id: lun.id.clone(),
        size: bytes_to_gib(lun.size_total),
        volume_type: String::from(THIN_VOLUME_TYPE),
        availability_zone: String::new(),
        status: String::new(),
        iops: 0,
        attachments: vec![attachment],
    }
}

/// Options for listing volumes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct VolumesOpts {
    /// Consult the local device map for attachment device names.
    pub attachments: bool,
}

/// Options for inspecting a volume.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VolumeInspectOpts {
    /// Consult the local device map for attachment device names.
    pub attachments: bool,
    /// Pass-through options.
    pub opts: BTreeMap<String, String>,
}

/// Options for creating a volume.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VolumeCreateOpts {
    /// Requested availability zone; ignored by this driver.
    pub availability_zone: Option<String>,
    /// Requested type; only thin provisioning is available.
    pub volume_type: Option<String>,
    /// Size in gibibytes.
    pub size: Option<u64>,
    /// Requested IOPS; ignored by this driver.
    pub iops: Option<u64>,
}

/// Options for attaching a volume.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VolumeAttachOpts {
    /// Replace any existing attachment instead of failing.
    pub force: bool,
    /// Pass-through options.
    pub opts: BTreeMap<String, String>,
}

/// Options for detaching a volume.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VolumeDetachOpts {
    /// Requested by callers that want a forced detach.
    pub force: bool,
    /// Pass-through options.
    pub opts: BTreeMap<String, String>,
}
