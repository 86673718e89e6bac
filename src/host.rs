//! Correlation of the local instance with its array host object.
//!
//! The array grants LUN access to host objects (`Host_1`, `Host_2`, ...)
//! whose identifiers have nothing to do with the local machine identifier.
//! [`HostResolver`] finds the host object registered for this machine once
//! per driver and reuses it, the same way the working pool is resolved.

use camino::Utf8PathBuf;
use tokio::sync::OnceCell;
use tracing::info;

use crate::array::{ArrayClient, Host};
use crate::config::UnityConfig;
use crate::error::{DriverError, ResourceKind};
use crate::identity::{IdentityError, read_identifier};

/// File holding the local host name.
pub const HOSTNAME_PATH: &str = "/etc/hostname";

/// How the array host object of this machine is found.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HostLocator {
    /// Array host identifier given in configuration.
    Id(String),
    /// Host name as registered on the array.
    Name(String),
    /// Host name read from a local file, then looked up by name.
    HostnameFile(Utf8PathBuf),
}

impl HostLocator {
    /// Prefers a configured host id, then a configured host name, and falls
    /// back to the local host name.
    #[must_use]
    pub fn from_config(config: &UnityConfig) -> Self {
        let non_blank = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|trimmed| !trimmed.is_empty())
                .map(str::to_owned)
        };
        non_blank(config.host_id.as_deref())
            .map(Self::Id)
            .or_else(|| non_blank(config.host_name.as_deref()).map(Self::Name))
            .unwrap_or_else(|| Self::HostnameFile(Utf8PathBuf::from(HOSTNAME_PATH)))
    }
}

/// Lazily resolved array host of the local machine.
///
/// Without a locator nothing is looked up and the caller falls back to the
/// host GUID as the array host identifier.
#[derive(Debug)]
pub struct HostResolver {
    locator: Option<HostLocator>,
    host: OnceCell<Host>,
}

impl HostResolver {
    /// Creates a resolver for `locator`.
    #[must_use]
    pub fn new(locator: Option<HostLocator>) -> Self {
        Self {
            locator,
            host: OnceCell::new(),
        }
    }

    /// Resolves the local array host, querying the array only until the first
    /// success. Returns `Ok(None)` when no locator is configured.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::NotFound`] when the array has no matching host,
    /// [`DriverError::Identity`] when the local host name cannot be read, and
    /// [`DriverError::Upstream`] when the lookup fails.
    pub async fn resolve<C: ArrayClient>(&self, client: &C) -> Result<Option<&Host>, DriverError> {
        let Some(locator) = self.locator.as_ref() else {
            return Ok(None);
        };
        self.host
            .get_or_try_init(|| Self::lookup(client, locator))
            .await
            .map(Some)
    }

    async fn lookup<C: ArrayClient>(client: &C, locator: &HostLocator) -> Result<Host, DriverError> {
        let host = match locator {
            HostLocator::Id(id) => client
                .host_by_id(id)
                .await
                .map_err(|err| DriverError::upstream("get host by id", err))?
                .ok_or_else(|| DriverError::not_found(ResourceKind::Host, id.clone()))?,
            HostLocator::Name(name) => Self::by_name(client, name).await?,
            HostLocator::HostnameFile(path) => {
                let name = read_identifier(path)?
                    .ok_or_else(|| IdentityError::Empty { path: path.clone() })?;
                Self::by_name(client, &name).await?
            }
        };
        info!(host_id = %host.id, host_name = %host.name, "resolved array host");
        Ok(host)
    }

    async fn by_name<C: ArrayClient>(client: &C, name: &str) -> Result<Host, DriverError> {
        client
            .host_by_name(name)
            .await
            .map_err(|err| DriverError::upstream("get host by name", err))?
            .ok_or_else(|| DriverError::not_found(ResourceKind::Host, name))
    }
}
