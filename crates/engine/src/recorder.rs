// SPDX-License-Identifier: MIT

//! Bridges the driver layer's synchronous `CommandRecorder` seam (§4.4) to
//! the async Run Store (§4.1).

use aro_core::{Clock, CommandRecord, RunId};
use aro_drivers::CommandRecorder;
use aro_store::RunStore;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Appends/finalizes Command Records against a `RunStore` from the driver's
/// sync callback. Uses `block_in_place` to bridge into the async store —
/// valid on tokio's multi-threaded runtime, which the coordinator always
/// constructs (see `aro-cli`).
pub struct StoreCommandRecorder<C: Clock> {
    store: Arc<dyn RunStore>,
    run_id: RunId,
    clock: C,
}

impl<C: Clock> StoreCommandRecorder<C> {
    pub fn new(store: Arc<dyn RunStore>, run_id: RunId, clock: C) -> Self {
        Self { store, run_id, clock }
    }
}

impl<C: Clock + 'static> CommandRecorder for StoreCommandRecorder<C> {
    fn begin(&self, command: &str, args: &[String], cwd: &Path) {
        let record = CommandRecord::new(command, args.to_vec(), cwd.to_path_buf(), self.clock.epoch_ms());
        let store = self.store.clone();
        let run_id = self.run_id.clone();
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                if let Err(err) = store.append_command(&run_id, record).await {
                    warn!(error = %err, "failed to append command record");
                }
            });
        });
    }

    fn finish(&self, exit_code: i32) {
        let store = self.store.clone();
        let run_id = self.run_id.clone();
        let finished_at_ms = self.clock.epoch_ms();
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                if let Err(err) = store.finish_command(&run_id, exit_code, finished_at_ms).await {
                    warn!(error = %err, "failed to finish command record");
                }
            });
        });
    }
}
