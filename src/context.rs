//! Request-scoped context passed down every driver call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::instance::InstanceId;

/// Local block devices visible on this host, keyed by LUN identifier.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalDevices {
    /// Driver that produced the map.
    pub driver: String,
    /// LUN identifier to OS device name, for example `sv_3` → `/dev/sdc`.
    pub device_map: BTreeMap<String, String>,
}

impl LocalDevices {
    /// Creates a device map for the given driver.
    #[must_use]
    pub fn new(driver: impl Into<String>, device_map: BTreeMap<String, String>) -> Self {
        Self {
            driver: driver.into(),
            device_map,
        }
    }
}

/// Typed values established earlier in the request pipeline.
///
/// Both fields are optional: an absent instance identity is derived by the
/// driver, and an absent device map means no device is visible locally. The
/// context is never cached between calls.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RequestContext {
    /// Authoritative identity of the calling instance.
    pub instance_id: Option<InstanceId>,
    /// Local device map of the calling host.
    pub local_devices: Option<LocalDevices>,
}

impl RequestContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the instance identity.
    #[must_use]
    pub fn with_instance_id(mut self, instance_id: InstanceId) -> Self {
        self.instance_id = Some(instance_id);
        self
    }

    /// Sets the local device map.
    #[must_use]
    pub fn with_local_devices(mut self, local_devices: LocalDevices) -> Self {
        self.local_devices = Some(local_devices);
        self
    }

    /// Returns the carried identity when it has a non-empty identifier.
    #[must_use]
    pub fn authoritative_instance_id(&self) -> Option<&InstanceId> {
        self.instance_id.as_ref().filter(|iid| !iid.is_empty())
    }

    /// Returns the device map to consult, or an empty one when attachments
    /// were not requested or no map was supplied.
    #[must_use]
    pub fn device_map(&self, include_attachments: bool) -> BTreeMap<String, String> {
        if !include_attachments {
            return BTreeMap::new();
        }
        self.local_devices
            .as_ref()
            .map(|devices| devices.device_map.clone())
            .unwrap_or_default()
    }
}
