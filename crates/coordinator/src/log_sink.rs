// SPDX-License-Identifier: MIT

//! Bridges the driver layer's synchronous log callback (§4.4) into the async
//! Run Store's append-only log (§4.1), the same `block_in_place` bridge
//! `aro_engine::StoreCommandRecorder` uses for Command Records.

use aro_core::RunId;
use aro_drivers::LogSink;
use aro_store::RunStore;
use std::sync::Arc;
use tracing::warn;

/// Builds a `LogSink` that durably appends each line to `run_id`'s log.
/// Requires a multi-threaded tokio runtime (see `aro_engine::recorder`).
pub fn store_log_sink(store: Arc<dyn RunStore>, run_id: RunId) -> LogSink {
    Arc::new(move |line: &str| {
        let store = store.clone();
        let run_id = run_id.clone();
        let line = line.to_string();
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                if let Err(err) = store.append_log(&run_id, &line).await {
                    warn!(run_id = %run_id, error = %err, "failed to append log line");
                }
            });
        });
    })
}
