//! Binary entry point for the `unityvol` CLI.

mod cli;

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::process;

use clap::Parser;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use unityvol::{
    DRIVER_NAME, DriverError, DriverRegistry, InstanceId, LocalDevices, RequestContext,
    StorageDriver, UnityConfig, Volume, VolumeAttachOpts, VolumeCreateOpts, VolumeDetachOpts,
    VolumeInspectOpts, VolumesOpts, unity_factory,
};

use cli::{Cli, Command};

/// Environment variable holding the tracing filter directives.
const LOG_ENV: &str = "UNITYVOL_LOG";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("failed to write output: {0}")]
    Output(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttachOutput {
    volume: Volume,
    token: String,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config =
        UnityConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let mut registry = DriverRegistry::new();
    registry.register(DRIVER_NAME, unity_factory(config))?;
    let driver = registry.create(DRIVER_NAME)?;

    let ctx = request_context(&cli);
    driver.init(&ctx).await?;
    let output = dispatch(driver.as_ref(), &ctx, cli.command).await?;
    write_json(io::stdout(), &output)
}

fn request_context(cli: &Cli) -> RequestContext {
    let mut ctx = RequestContext::new();
    if let Some(id) = cli.instance_id.as_deref().filter(|id| !id.trim().is_empty()) {
        ctx = ctx.with_instance_id(InstanceId::new(id.trim(), DRIVER_NAME));
    }
    if !cli.devices.is_empty() {
        let device_map: BTreeMap<String, String> = cli.devices.iter().cloned().collect();
        ctx = ctx.with_local_devices(LocalDevices::new(DRIVER_NAME, device_map));
    }
    ctx
}

async fn dispatch(
    driver: &dyn StorageDriver,
    ctx: &RequestContext,
    command: Command,
) -> Result<serde_json::Value, CliError> {
    let value = match command {
        Command::Instance => to_value(&driver.instance_inspect(ctx).await?)?,
        Command::Volumes(flag) => {
            let opts = VolumesOpts {
                attachments: flag.attachments,
            };
            to_value(&driver.volumes(ctx, &opts).await?)?
        }
        Command::Inspect(args) => {
            let opts = VolumeInspectOpts {
                attachments: args.attachments,
                opts: BTreeMap::new(),
            };
            to_value(&driver.volume_inspect(ctx, &args.volume_id, &opts).await?)?
        }
        Command::Create(args) => {
            let opts = VolumeCreateOpts {
                availability_zone: args.zone,
                volume_type: args.volume_type,
                size: Some(args.size),
                iops: args.iops,
            };
            to_value(&driver.volume_create(ctx, &args.name, &opts).await?)?
        }
        Command::Remove(args) => {
            driver.volume_remove(ctx, &args.volume_id).await?;
            json!({ "volumeId": args.volume_id, "removed": true })
        }
        Command::Attach(args) => {
            let opts = VolumeAttachOpts {
                force: args.force,
                opts: BTreeMap::new(),
            };
            let (volume, token) = driver.volume_attach(ctx, &args.volume_id, &opts).await?;
            to_value(&AttachOutput { volume, token })?
        }
        Command::Detach(args) => {
            let opts = VolumeDetachOpts::default();
            to_value(&driver.volume_detach(ctx, &args.volume_id, &opts).await?)?
        }
        Command::DetachAll(args) => {
            driver.volume_detach_all(ctx, &args.volume_id).await?;
            json!({ "volumeId": args.volume_id, "detached": true })
        }
    };
    Ok(value)
}

fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value, CliError> {
    serde_json::to_value(value).map_err(|err| CliError::Output(err.to_string()))
}

fn write_json(mut target: impl Write, value: &serde_json::Value) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(value).map_err(|err| CliError::Output(err.to_string()))?;
    writeln!(target, "{rendered}").map_err(|err| CliError::Output(err.to_string()))
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
