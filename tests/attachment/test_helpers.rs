//! Shared fixtures for attachment BDD scenarios.

use rstest::fixture;
use unityvol::test_support::{ArrayDouble, StaticIdentity};
use unityvol::{ErrorKind, PoolSelector, UnityDriver, Volume};

pub const POOL_ID: &str = "pool_1";

#[derive(Clone, Debug)]
pub enum StepOutcome {
    Success(Option<Volume>),
    Failure { kind: ErrorKind, message: String },
}

#[derive(Clone, Debug)]
pub struct AttachmentContext {
    pub array: ArrayDouble,
    pub caller: String,
    pub force: bool,
    pub created: Option<Volume>,
    pub outcome: Option<StepOutcome>,
}

impl AttachmentContext {
    pub fn driver(&self) -> UnityDriver<ArrayDouble, StaticIdentity> {
        UnityDriver::from_parts(
            self.array.clone(),
            StaticIdentity::new(&self.caller),
            Some(PoolSelector::Id(String::from(POOL_ID))),
        )
    }
}

#[fixture]
pub fn attachment_context() -> AttachmentContext {
    let array = ArrayDouble::new();
    array.add_pool(POOL_ID, "gold");
    AttachmentContext {
        array,
        caller: String::new(),
        force: false,
        created: None,
        outcome: None,
    }
}

pub fn split_hosts(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .collect()
}
