//! Apply a local change, confirm it remotely, and undo it if the remote call fails.

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;

/// A local mutation backed by one remote call.
///
/// `apply` runs before the call and returns whatever `compensate` needs to
/// restore the prior state. Exactly one of `commit` or `compensate` runs
/// afterwards.
#[async_trait]
pub trait OptimisticCommand: Send + Sync {
    type State: ?Sized + Sync;
    type Snapshot: Send;
    type Output: Send;

    fn name(&self) -> &'static str;

    fn apply(&self, state: &Self::State) -> Result<Self::Snapshot>;

    async fn execute(&self) -> Result<Self::Output>;

    fn commit(&self, state: &Self::State, output: &Self::Output, snapshot: Self::Snapshot);

    fn compensate(&self, state: &Self::State, snapshot: Self::Snapshot);
}

pub async fn run<C: OptimisticCommand>(state: &C::State, command: &C) -> Result<C::Output> {
    let snapshot = command.apply(state)?;
    match command.execute().await {
        Ok(output) => {
            command.commit(state, &output, snapshot);
            Ok(output)
        }
        Err(e) => {
            debug!(command = command.name(), error = %e, "Remote call failed, rolling back");
            command.compensate(state, snapshot);
            Err(e)
        }
    }
}
