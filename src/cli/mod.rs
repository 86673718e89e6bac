//! Command-line interface definitions for the `unityvol` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `unityvol` binary.
#[derive(Debug, Parser)]
#[command(
    name = "unityvol",
    about = "Provision and attach Unity block volumes from the command line",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Identity of the calling instance; derived from the host when omitted.
    #[arg(long, global = true, value_name = "ID")]
    pub(crate) instance_id: Option<String>,
    /// Local device for a LUN, as `LUN_ID=DEVICE`; repeat for each device.
    #[arg(long = "device", global = true, value_name = "LUN_ID=DEVICE", value_parser = parse_device)]
    pub(crate) devices: Vec<(String, String)>,
    /// Operation to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Volume operations exposed by the binary.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Describe the calling instance.
    #[command(name = "instance")]
    Instance,
    /// List volumes in the configured pool.
    #[command(name = "volumes")]
    Volumes(AttachmentsFlag),
    /// Show a single volume.
    #[command(name = "inspect")]
    Inspect(InspectCommand),
    /// Create a thin volume in the configured pool.
    #[command(name = "create")]
    Create(CreateCommand),
    /// Delete a detached volume.
    #[command(name = "remove")]
    Remove(VolumeArg),
    /// Attach a volume to the calling instance.
    #[command(name = "attach")]
    Attach(AttachCommand),
    /// Detach a volume from the calling instance.
    #[command(name = "detach")]
    Detach(VolumeArg),
    /// Detach a volume from every host.
    #[command(name = "detach-all")]
    DetachAll(VolumeArg),
}

/// Shared `--attachments` flag.
#[derive(Debug, Args)]
pub(crate) struct AttachmentsFlag {
    /// Fill in local device names from `--device` mappings.
    #[arg(long)]
    pub(crate) attachments: bool,
}

/// Positional volume identifier.
#[derive(Debug, Args)]
pub(crate) struct VolumeArg {
    /// Volume (LUN) identifier, for example `sv_12`.
    #[arg(value_name = "VOLUME_ID")]
    pub(crate) volume_id: String,
}

/// Arguments for `unityvol inspect`.
#[derive(Debug, Args)]
pub(crate) struct InspectCommand {
    /// Volume (LUN) identifier.
    #[arg(value_name = "VOLUME_ID")]
    pub(crate) volume_id: String,
    /// Fill in local device names from `--device` mappings.
    #[arg(long)]
    pub(crate) attachments: bool,
}

/// Arguments for `unityvol create`.
#[derive(Debug, Args)]
pub(crate) struct CreateCommand {
    /// Name of the new volume.
    #[arg(value_name = "NAME")]
    pub(crate) name: String,
    /// Size in GiB.
    #[arg(long, value_name = "GIB")]
    pub(crate) size: u64,
    /// Requested volume type; only `thin` is provisioned.
    #[arg(long = "type", value_name = "TYPE")]
    pub(crate) volume_type: Option<String>,
    /// Requested availability zone; ignored by the array.
    #[arg(long, value_name = "ZONE")]
    pub(crate) zone: Option<String>,
    /// Requested IOPS; ignored by the array.
    #[arg(long, value_name = "IOPS")]
    pub(crate) iops: Option<u64>,
}

/// Arguments for `unityvol attach`.
#[derive(Debug, Args)]
pub(crate) struct AttachCommand {
    /// Volume (LUN) identifier.
    #[arg(value_name = "VOLUME_ID")]
    pub(crate) volume_id: String,
    /// Replace existing host access instead of failing.
    #[arg(long)]
    pub(crate) force: bool,
}

/// Parses a `LUN_ID=DEVICE` pair.
pub(crate) fn parse_device(raw: &str) -> Result<(String, String), String> {
    let (lun_id, device) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected LUN_ID=DEVICE, got {raw:?}"))?;
    let lun = lun_id.trim();
    let dev = device.trim();
    if lun.is_empty() || dev.is_empty() {
        return Err(format!("expected LUN_ID=DEVICE, got {raw:?}"));
    }
    Ok((lun.to_owned(), dev.to_owned()))
}
