//! Local instance identity derivation.
//!
//! An identity already carried by the request wins. Otherwise a host GUID is
//! read from the configured [`HostIdentity`] strategy and wrapped into a fresh
//! [`InstanceId`]. Both shipped strategies are stable across restarts.
//!
//! The GUID only names the machine. When the array host object is known its
//! identifier becomes the instance id and the GUID moves into the metadata.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;
use uuid::Uuid;

use crate::config::UnityConfig;
use crate::context::RequestContext;
use crate::instance::{HostMetadata, InstanceId, MetadataError};

/// Location of the systemd machine identifier.
pub const MACHINE_ID_PATH: &str = "/etc/machine-id";

/// Errors raised while deriving the host identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Raised when an identity file cannot be read or written.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path being accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when an identity file exists but holds nothing usable.
    #[error("{path} does not contain a host identifier")]
    Empty {
        /// Path that was read.
        path: Utf8PathBuf,
    },
    /// Raised when the identity cannot be embedded as metadata.
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Source of a stable, host-unique identifier.
pub trait HostIdentity {
    /// Returns the host GUID.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when the identifier cannot be obtained.
    fn host_guid(&self) -> Result<String, IdentityError>;
}

/// Identity strategies backed by the local filesystem.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LocalIdentity {
    /// Reads a machine identifier maintained by the operating system.
    MachineId(Utf8PathBuf),
    /// Generates a UUID on first use and keeps it in the given file.
    Persisted(Utf8PathBuf),
}

impl LocalIdentity {
    /// Picks the persisted strategy when `instance_id_file` is configured and
    /// the machine identifier otherwise.
    #[must_use]
    pub fn from_config(config: &UnityConfig) -> Self {
        config
            .instance_id_file
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map_or_else(
                || Self::MachineId(Utf8PathBuf::from(MACHINE_ID_PATH)),
                |path| Self::Persisted(Utf8PathBuf::from(path)),
            )
    }
}

impl HostIdentity for LocalIdentity {
    fn host_guid(&self) -> Result<String, IdentityError> {
        match self {
            Self::MachineId(path) => read_identifier(path)?.ok_or_else(|| IdentityError::Empty {
                path: path.clone(),
            }),
            Self::Persisted(path) => {
                if let Some(existing) = read_identifier(path)? {
                    return Ok(existing);
                }
                let generated = Uuid::new_v4().to_string();
                write_identifier(path, &generated)?;
                Ok(generated)
            }
        }
    }
}

/// Resolves the identity of the calling instance.
///
/// # Errors
///
/// Returns [`IdentityError`] when no identity is carried by `ctx` and the host
/// strategy fails.
pub fn resolve_instance_id<H: HostIdentity + ?Sized>(
    ctx: &RequestContext,
    host: &H,
    driver: &str,
) -> Result<InstanceId, IdentityError> {
    if let Some(existing) = ctx.authoritative_instance_id() {
        return Ok(existing.clone());
    }
    instance_id_for_host(None, host, driver)
}

/// Builds a fresh instance identity keyed by `array_host_id`, falling back to
/// the host GUID when no array host is known. The GUID is always recorded in
/// the metadata.
///
/// # Errors
///
/// Returns [`IdentityError`] when the host strategy fails.
pub fn instance_id_for_host<H: HostIdentity + ?Sized>(
    array_host_id: Option<&str>,
    host: &H,
    driver: &str,
) -> Result<InstanceId, IdentityError> {
    let host_guid = host.host_guid()?;
    let id = array_host_id.map_or_else(|| host_guid.clone(), str::to_owned);
    let mut iid = InstanceId::new(id, driver);
    iid.marshal_metadata(&HostMetadata { host_guid })?;
    Ok(iid)
}

fn split(path: &Utf8Path) -> Result<(&Utf8Path, &str), IdentityError> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_str().is_empty() => dir,
        _ => Utf8Path::new("."),
    };
    let file_name = path.file_name().ok_or_else(|| IdentityError::Io {
        path: path.to_path_buf(),
        message: String::from("identity path is missing a filename"),
    })?;
    Ok((parent, file_name))
}

pub(crate) fn read_identifier(path: &Utf8Path) -> Result<Option<String>, IdentityError> {
    let (parent, file_name) = split(path)?;
    let io_error = |err: io::Error| IdentityError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_error(err)),
    };
    match dir.read_to_string(file_name) {
        Ok(contents) => {
            let trimmed = contents.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_owned()))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_error(err)),
    }
}

fn write_identifier(path: &Utf8Path, value: &str) -> Result<(), IdentityError> {
    let (parent, file_name) = split(path)?;
    let io_error = |err: io::Error| IdentityError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(io_error)?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(io_error)?;
    dir.write(file_name, format!("{value}\n")).map_err(io_error)
}
