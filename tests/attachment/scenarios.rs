//! BDD scenarios for the attachment manager.

use rstest_bdd_macros::scenario;

use super::test_helpers::{AttachmentContext, attachment_context};

#[scenario(
    path = "tests/features/attachment.feature",
    name = "Attach a detached volume to the calling host"
)]
fn scenario_attach_detached(attachment_context: AttachmentContext) {
    drop(attachment_context);
}

#[scenario(
    path = "tests/features/attachment.feature",
    name = "Refuse to attach a volume owned by another host"
)]
fn scenario_attach_conflict(attachment_context: AttachmentContext) {
    drop(attachment_context);
}

#[scenario(
    path = "tests/features/attachment.feature",
    name = "Force attach replaces existing host access"
)]
fn scenario_force_attach(attachment_context: AttachmentContext) {
    drop(attachment_context);
}

#[scenario(
    path = "tests/features/attachment.feature",
    name = "Previous hosts stay when a forced attach is rejected"
)]
fn scenario_rejected_force_attach(attachment_context: AttachmentContext) {
    drop(attachment_context);
}

#[scenario(
    path = "tests/features/attachment.feature",
    name = "Detach removes only the calling host"
)]
fn scenario_detach_caller(attachment_context: AttachmentContext) {
    drop(attachment_context);
}

#[scenario(
    path = "tests/features/attachment.feature",
    name = "Refuse to remove an attached volume"
)]
fn scenario_remove_attached(attachment_context: AttachmentContext) {
    drop(attachment_context);
}

#[scenario(
    path = "tests/features/attachment.feature",
    name = "Create then attach a new volume"
)]
fn scenario_create_then_attach(attachment_context: AttachmentContext) {
    drop(attachment_context);
}
