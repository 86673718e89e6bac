//! Error taxonomy shared by every driver operation.
//!
//! Callers branch on [`DriverError::kind`] rather than on message text: a
//! conflict can be retried with `force`, a not-found is never an empty
//! success, and a not-implemented error marks a capability gap.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::identity::IdentityError;

/// Boxed error raised by an array client, kept intact as the error source.
pub type UpstreamError = Box<dyn StdError + Send + Sync + 'static>;

/// Kind of array resource that a lookup can miss.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResourceKind {
    /// A LUN, surfaced to callers as a volume.
    Volume,
    /// An array host object.
    Host,
    /// A storage pool.
    Pool,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Volume => write!(f, "volume"),
            Self::Host => write!(f, "host"),
            Self::Pool => write!(f, "pool"),
        }
    }
}

/// Coarse classification of a [`DriverError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Fatal configuration problem; retrying will not help.
    Config,
    /// The referenced resource does not exist.
    NotFound,
    /// The request conflicts with current array state.
    Conflict,
    /// The caller supplied an unusable argument.
    InvalidArgument,
    /// The array or its transport rejected the call.
    Upstream,
    /// The operation is outside this driver's capabilities.
    NotImplemented,
    /// The local instance identity could not be derived.
    Identity,
}

/// Errors returned by the storage driver surface.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Raised when the driver configuration cannot be used.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when a lookup by identifier misses.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Kind of resource that was looked up.
        kind: ResourceKind,
        /// Identifier used for the lookup.
        id: String,
    },
    /// Raised when attaching an already attached volume without force.
    #[error(
        "volume {volume_id} is already attached to host(s) {}; retry with force to reattach",
        .host_ids.join(", ")
    )]
    AlreadyAttached {
        /// Volume that was requested.
        volume_id: String,
        /// Hosts currently associated with the volume.
        host_ids: Vec<String>,
    },
    /// Raised when a request argument is missing or out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Raised when the array rejects a call or cannot be reached.
    #[error("{operation} failed: {source}")]
    Upstream {
        /// Array operation that failed.
        operation: &'static str,
        /// Error reported by the array client.
        #[source]
        source: UpstreamError,
    },
    /// Raised by operations this driver does not support.
    #[error("{operation} is not implemented by the {driver} driver")]
    NotImplemented {
        /// Driver that received the call.
        driver: &'static str,
        /// Operation that was requested.
        operation: &'static str,
    },
    /// Raised when the local instance identity cannot be derived.
    #[error("instance identity unavailable: {0}")]
    Identity(#[from] IdentityError),
}

impl DriverError {
    /// Wraps an array client error, preserving it as the source.
    pub fn upstream<E>(operation: &'static str, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Upstream {
            operation,
            source: Box::new(source),
        }
    }

    /// Builds a not-found error for the given resource.
    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyAttached { .. } => ErrorKind::Conflict,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::NotImplemented { .. } => ErrorKind::NotImplemented,
            Self::Identity(_) => ErrorKind::Identity,
        }
    }

    /// Returns `true` when the error reports a missing resource.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound)
    }

    /// Returns `true` when the error marks an unsupported operation.
    #[must_use]
    pub const fn is_not_implemented(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotImplemented)
    }
}

impl From<ConfigError> for DriverError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}
