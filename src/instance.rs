//! Instance identity carried through requests and persisted by callers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Driver-scoped identifier of a compute instance.
///
/// The metadata is opaque to callers: it round-trips through
/// [`InstanceId::marshal_metadata`] and [`InstanceId::unmarshal_metadata`] so
/// higher layers can persist an identity without knowing its encoding.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceId {
    /// Identifier string; empty when only metadata is known.
    pub id: String,
    /// Name of the driver that produced the identity.
    pub driver: String,
    /// Driver specific metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl InstanceId {
    /// Creates an identity without metadata.
    #[must_use]
    pub fn new(id: impl Into<String>, driver: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            driver: driver.into(),
            metadata: None,
        }
    }

    /// Returns `true` when the identifier string is blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.trim().is_empty()
    }

    /// Stores `value` as the identity's metadata.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Encode`] when `value` cannot be represented as
    /// JSON.
    pub fn marshal_metadata<T: Serialize>(&mut self, value: &T) -> Result<(), MetadataError> {
        let encoded =
            serde_json::to_value(value).map_err(|err| MetadataError::Encode(err.to_string()))?;
        self.metadata = Some(encoded);
        Ok(())
    }

    /// Decodes the identity's metadata.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Missing`] when no metadata is present and
    /// [`MetadataError::Decode`] when it does not match `T`.
    pub fn unmarshal_metadata<T: DeserializeOwned>(&self) -> Result<T, MetadataError> {
        let raw = self.metadata.clone().ok_or(MetadataError::Missing)?;
        serde_json::from_value(raw).map_err(|err| MetadataError::Decode(err.to_string()))
    }
}

/// Metadata embedded by this driver: the host GUID it derived.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostMetadata {
    /// Stable, host-unique identifier.
    pub host_guid: String,
}

/// Errors raised while encoding or decoding instance metadata.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MetadataError {
    /// Raised when the value cannot be encoded.
    #[error("failed to encode instance metadata: {0}")]
    Encode(String),
    /// Raised when the stored metadata does not decode.
    #[error("failed to decode instance metadata: {0}")]
    Decode(String),
    /// Raised when no metadata is stored.
    #[error("instance metadata is missing")]
    Missing,
}

/// Description of the local compute instance.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Identity of the instance.
    pub instance_id: InstanceId,
    /// Name of the driver that inspected the instance.
    pub provider_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_survives_serialisation() {
        let mut iid = InstanceId::new("guid-1", "unity");
        iid.marshal_metadata(&HostMetadata {
            host_guid: String::from("guid-1"),
        })
        .unwrap_or_else(|err| panic!("marshal: {err}"));

        let json = serde_json::to_string(&iid).unwrap_or_else(|err| panic!("serialise: {err}"));
        assert!(json.contains(r#""hostGuid":"guid-1""#), "json: {json}");

        let restored: InstanceId =
            serde_json::from_str(&json).unwrap_or_else(|err| panic!("deserialise: {err}"));
        let metadata: HostMetadata = restored
            .unmarshal_metadata()
            .unwrap_or_else(|err| panic!("unmarshal: {err}"));
        assert_eq!(metadata.host_guid, "guid-1");
    }

    #[test]
    fn unmarshal_without_metadata_is_an_error() {
        let iid = InstanceId::new("x", "unity");
        assert_eq!(
            iid.unmarshal_metadata::<HostMetadata>(),
            Err(MetadataError::Missing)
        );
    }

    #[test]
    fn blank_id_counts_as_empty() {
        assert!(InstanceId::new("  ", "unity").is_empty());
        assert!(!InstanceId::new("Host_1", "unity").is_empty());
    }
}
