//! BDD step definitions for attachment behaviour.

use std::collections::BTreeMap;

use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;
use unityvol::test_support::ArrayOp;
use unityvol::{
    DriverError, RequestContext, StorageDriver, Volume, VolumeAttachOpts, VolumeCreateOpts,
    VolumeDetachOpts,
};

use super::test_helpers::{AttachmentContext, POOL_ID, StepOutcome, split_hosts};
use crate::size_constants::BYTES_PER_GIB;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn runtime() -> Runtime {
    Runtime::new().unwrap_or_else(|err| panic!("tokio runtime should start: {err}"))
}

fn record(result: Result<Option<Volume>, DriverError>) -> StepOutcome {
    match result {
        Ok(volume) => StepOutcome::Success(volume),
        Err(err) => StepOutcome::Failure {
            kind: err.kind(),
            message: err.to_string(),
        },
    }
}

fn attach(attachment_context: &AttachmentContext, volume_id: &str) -> StepOutcome {
    let driver = attachment_context.driver();
    let opts = VolumeAttachOpts {
        force: attachment_context.force,
        opts: BTreeMap::new(),
    };
    let result = runtime().block_on(async {
        driver
            .volume_attach(&RequestContext::new(), volume_id, &opts)
            .await
            .map(|(volume, _token)| Some(volume))
    });
    record(result)
}

#[given("an array with hosts \"{hosts}\" and caller \"{caller}\"")]
fn array_with_hosts(
    mut attachment_context: AttachmentContext,
    hosts: String,
    caller: String,
) -> AttachmentContext {
    for host in split_hosts(&hosts) {
        attachment_context
            .array
            .add_host(host, &format!("node-{}", host.to_lowercase()));
    }
    attachment_context.caller = caller;
    attachment_context
}

#[given("LUN \"{lun_id}\" of {size:u64} GiB is detached")]
fn detached_lun(
    attachment_context: AttachmentContext,
    lun_id: String,
    size: u64,
) -> AttachmentContext {
    attachment_context
        .array
        .add_lun(POOL_ID, &lun_id, "data", size * BYTES_PER_GIB, &[]);
    attachment_context
}

#[given("LUN \"{lun_id}\" of {size:u64} GiB is attached to hosts \"{hosts}\"")]
fn attached_lun(
    attachment_context: AttachmentContext,
    lun_id: String,
    size: u64,
    hosts: String,
) -> AttachmentContext {
    attachment_context.array.add_lun(
        POOL_ID,
        &lun_id,
        "data",
        size * BYTES_PER_GIB,
        &split_hosts(&hosts),
    );
    attachment_context
}

#[given("force is enabled")]
fn force_enabled(mut attachment_context: AttachmentContext) -> AttachmentContext {
    attachment_context.force = true;
    attachment_context
}

#[given("the array rejects host access changes")]
fn host_access_rejected(attachment_context: AttachmentContext) -> AttachmentContext {
    for op in [
        ArrayOp::AttachHost,
        ArrayOp::DetachHost,
        ArrayOp::ReplaceHostAccess,
        ArrayOp::DetachAllHosts,
    ] {
        attachment_context.array.fail_on(op);
    }
    attachment_context
}

#[when("I attach volume \"{lun_id}\"")]
fn attach_volume(mut attachment_context: AttachmentContext, lun_id: String) -> AttachmentContext {
    attachment_context.outcome = Some(attach(&attachment_context, &lun_id));
    attachment_context
}

#[when("I detach volume \"{lun_id}\"")]
fn detach_volume(mut attachment_context: AttachmentContext, lun_id: String) -> AttachmentContext {
    let driver = attachment_context.driver();
    let opts = VolumeDetachOpts::default();
    let result = runtime().block_on(async {
        driver
            .volume_detach(&RequestContext::new(), &lun_id, &opts)
            .await
            .map(Some)
    });
    attachment_context.outcome = Some(record(result));
    attachment_context
}

#[when("I remove volume \"{lun_id}\"")]
fn remove_volume(mut attachment_context: AttachmentContext, lun_id: String) -> AttachmentContext {
    let driver = attachment_context.driver();
    let result = runtime().block_on(async {
        driver
            .volume_remove(&RequestContext::new(), &lun_id)
            .await
            .map(|()| None)
    });
    attachment_context.outcome = Some(record(result));
    attachment_context
}

#[when("I create volume \"{name}\" of {size:u64} GiB")]
fn create_volume(
    mut attachment_context: AttachmentContext,
    name: String,
    size: u64,
) -> AttachmentContext {
    let driver = attachment_context.driver();
    let opts = VolumeCreateOpts {
        size: Some(size),
        ..VolumeCreateOpts::default()
    };
    let result = runtime().block_on(async {
        driver
            .volume_create(&RequestContext::new(), &name, &opts)
            .await
    });
    attachment_context.created = result.as_ref().ok().cloned();
    attachment_context.outcome = Some(record(result.map(Some)));
    attachment_context
}

#[when("I attach the created volume")]
fn attach_created(mut attachment_context: AttachmentContext) -> AttachmentContext {
    let Some(created) = attachment_context.created.clone() else {
        panic!("test setup requires a created volume");
    };
    attachment_context.outcome = Some(attach(&attachment_context, &created.id));
    attachment_context
}

#[then("the operation succeeds")]
fn operation_succeeds(attachment_context: &AttachmentContext) -> Result<(), StepError> {
    match attachment_context.outcome {
        Some(StepOutcome::Success(_)) => Ok(()),
        Some(StepOutcome::Failure { ref message, .. }) => Err(StepError::Assertion(format!(
            "expected success, got failure: {message}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the operation fails with kind \"{kind}\"")]
fn operation_fails(attachment_context: &AttachmentContext, kind: String) -> Result<(), StepError> {
    let Some(StepOutcome::Failure {
        kind: actual,
        ref message,
    }) = attachment_context.outcome
    else {
        return Err(StepError::Assertion(format!(
            "expected failure, got {:?}",
            attachment_context.outcome
        )));
    };
    let rendered = format!("{actual:?}").to_lowercase();
    if rendered == kind.trim() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected failure kind {kind}, got {rendered}: {message}"
        )))
    }
}

#[then("LUN \"{lun_id}\" is attached to \"{host}\" only")]
fn attached_only_to(
    attachment_context: &AttachmentContext,
    lun_id: String,
    host: String,
) -> Result<(), StepError> {
    let hosts = attachment_context.array.attached_hosts(&lun_id);
    if hosts == vec![host.clone()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {lun_id} attached to {host} only, got {hosts:?}"
        )))
    }
}

#[then("the returned volume reports instance \"{host}\"")]
fn returned_instance(
    attachment_context: &AttachmentContext,
    host: String,
) -> Result<(), StepError> {
    let Some(StepOutcome::Success(Some(ref volume))) = attachment_context.outcome else {
        return Err(StepError::Assertion(String::from("missing returned volume")));
    };
    let instances: Vec<&str> = volume
        .attachments
        .iter()
        .map(|attachment| attachment.instance_id.id.as_str())
        .collect();
    if instances == vec![host.as_str()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected attachment for {host}, got {instances:?}"
        )))
    }
}

#[then("the array saw no mutations")]
fn no_mutations(attachment_context: &AttachmentContext) -> Result<(), StepError> {
    let mutations = attachment_context.array.mutations();
    if mutations == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no mutations, got {mutations}"
        )))
    }
}

#[then("the array holds {count:u32} LUN")]
fn lun_count(attachment_context: &AttachmentContext, count: u32) -> Result<(), StepError> {
    let held = attachment_context.array.lun_count();
    if held == count as usize {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} LUNs, got {held}"
        )))
    }
}

#[then("the created volume is {size:u64} GiB and attached to \"{host}\"")]
fn created_volume_attached(
    attachment_context: &AttachmentContext,
    size: u64,
    host: String,
) -> Result<(), StepError> {
    let Some(ref created) = attachment_context.created else {
        return Err(StepError::Assertion(String::from("no volume was created")));
    };
    if created.size != size {
        return Err(StepError::Assertion(format!(
            "expected {size} GiB, got {}",
            created.size
        )));
    }
    let hosts = attachment_context.array.attached_hosts(&created.id);
    if hosts == vec![host.clone()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {} attached to {host}, got {hosts:?}",
            created.id
        )))
    }
}
