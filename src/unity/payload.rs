//! Wire types for the Unisphere REST API.

use serde::{Deserialize, Serialize};

use crate::array::{Host, HostAccess, Lun, Pool};

/// Access mask granting production access to a host.
const PRODUCTION_ACCESS: u8 = 1;

/// Single-instance response: `{"content": {...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct InstanceResponse<T> {
    pub(crate) content: T,
}

/// Collection response: `{"entries": [{"content": {...}}]}`.
#[derive(Debug, Deserialize)]
pub(crate) struct CollectionResponse<T> {
    #[serde(default = "Vec::new")]
    pub(crate) entries: Vec<InstanceResponse<T>>,
}

impl<T> CollectionResponse<T> {
    pub(crate) fn into_contents(self) -> impl Iterator<Item = T> {
        self.entries.into_iter().map(|entry| entry.content)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct IdRef {
    pub(crate) id: String,
}

impl IdRef {
    pub(crate) fn new(id: &str) -> Self {
        Self { id: id.to_owned() }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PoolContent {
    id: String,
    #[serde(default)]
    name: String,
}

impl From<PoolContent> for Pool {
    fn from(value: PoolContent) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct HostContent {
    id: String,
    #[serde(default)]
    name: String,
}

impl From<HostContent> for Host {
    fn from(value: HostContent) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HostAccessContent {
    host: HostContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LunContent {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    size_total: u64,
    #[serde(default)]
    host_access: Option<Vec<HostAccessContent>>,
}

impl From<LunContent> for Lun {
    fn from(value: LunContent) -> Self {
        Self {
            id: value.id,
            name: value.name,
            size_total: value.size_total,
            host_access: value
                .host_access
                .unwrap_or_default()
                .into_iter()
                .map(|access| HostAccess::new(access.host.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SystemContent {
    #[serde(default)]
    pub(crate) serial_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreatedLun {
    pub(crate) storage_resource: IdRef,
}

/// Body of `storageResource/action/createLun`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateLunRequest {
    name: String,
    lun_parameters: CreateLunParameters,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLunParameters {
    pool: IdRef,
    size: u64,
    is_thin_enabled: bool,
}

impl CreateLunRequest {
    pub(crate) fn new(pool: &Pool, name: &str, size: u64, thin: bool) -> Self {
        Self {
            name: name.to_owned(),
            lun_parameters: CreateLunParameters {
                pool: IdRef::new(&pool.id),
                size,
                is_thin_enabled: thin,
            },
        }
    }
}

/// Body of `storageResource/{id}/action/modifyLun` replacing the host list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ModifyHostAccessRequest {
    lun_parameters: HostAccessParameters,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HostAccessParameters {
    host_access: Vec<HostAccessEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HostAccessEntry {
    host: IdRef,
    access_mask: u8,
}

impl ModifyHostAccessRequest {
    pub(crate) fn new<'a>(host_ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            lun_parameters: HostAccessParameters {
                host_access: host_ids
                    .into_iter()
                    .map(|id| HostAccessEntry {
                        host: IdRef::new(id),
                        access_mask: PRODUCTION_ACCESS,
                    })
                    .collect(),
            },
        }
    }
}

/// Error envelope returned with non-success statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub(crate) error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub(crate) error_code: Option<u64>,
    #[serde(default = "Vec::new")]
    messages: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl ErrorDetail {
    /// First localised message, preferring `en-US`.
    pub(crate) fn message(&self) -> Option<String> {
        self.messages.iter().find_map(|entry| {
            entry
                .get("en-US")
                .or_else(|| entry.values().next())
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        })
    }
}
