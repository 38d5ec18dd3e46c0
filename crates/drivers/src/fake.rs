// SPDX-License-Identifier: MIT

//! Deterministic driver for engine/coordinator tests.

use crate::context::{DriverContext, IterationResult};
use crate::driver::AgentDriver;
use crate::error::DriverError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Scripted scenario for one `invoke` call.
#[derive(Debug, Clone)]
pub struct ScriptedResult {
    pub output: String,
    pub exit_code: i32,
    pub last_task_id: Option<String>,
}

impl ScriptedResult {
    pub fn completed() -> Self {
        Self {
            output: "<promise>COMPLETE</promise>".to_string(),
            exit_code: 0,
            last_task_id: None,
        }
    }

    pub fn progress(message: impl Into<String>) -> Self {
        Self {
            output: message.into(),
            exit_code: 0,
            last_task_id: None,
        }
    }

    pub fn usage_limit() -> Self {
        Self {
            output: "rate limited".to_string(),
            exit_code: 2,
            last_task_id: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            output: message.into(),
            exit_code: 1,
            last_task_id: None,
        }
    }

    pub fn killed() -> Self {
        Self {
            output: String::new(),
            exit_code: -9,
            last_task_id: None,
        }
    }
}

/// A driver whose `invoke` plays back a fixed script of results in order,
/// repeating the last entry once exhausted.
pub struct FakeAgentDriver {
    name: String,
    script: Mutex<Vec<ScriptedResult>>,
    next: AtomicUsize,
}

impl FakeAgentDriver {
    pub fn new(name: impl Into<String>, script: Vec<ScriptedResult>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(script),
            next: AtomicUsize::new(0),
        }
    }

    pub fn invocation_count(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentDriver for FakeAgentDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, ctx: DriverContext) -> Result<IterationResult, DriverError> {
        ctx.command_recorder.begin(&self.name, &[], &ctx.sandbox_path);
        let script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        let idx = self.next.fetch_add(1, Ordering::SeqCst);
        let scripted = script
            .get(idx.min(script.len().saturating_sub(1)))
            .cloned()
            .unwrap_or_else(ScriptedResult::completed);
        drop(script);

        (ctx.log_sink)(&scripted.output);
        ctx.command_recorder.finish(scripted.exit_code);

        Ok(IterationResult {
            output: scripted.output,
            exit_code: scripted.exit_code,
            last_task_id: scripted.last_task_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AgentConfig;
    use std::sync::Mutex as StdMutex;

    struct NoopRecorder;
    impl crate::context::CommandRecorder for NoopRecorder {
        fn begin(&self, _command: &str, _args: &[String], _cwd: &std::path::Path) {}
        fn finish(&self, _exit_code: i32) {}
    }

    fn ctx(iteration: u32) -> DriverContext {
        DriverContext {
            iteration_number: iteration,
            sandbox_path: std::path::PathBuf::from("/tmp/sandbox"),
            log_sink: std::sync::Arc::new(|_line: &str| {}),
            command_recorder: std::sync::Arc::new(NoopRecorder),
            cancellation_token: tokio_util::sync::CancellationToken::new(),
            config: AgentConfig::default(),
        }
    }

    #[tokio::test]
    async fn plays_back_script_in_order_then_repeats_last() {
        let driver = FakeAgentDriver::new(
            "fake",
            vec![ScriptedResult::progress("one"), ScriptedResult::completed()],
        );
        let first = driver.invoke(ctx(1)).await.expect("invoke 1");
        assert_eq!(first.output, "one");
        let second = driver.invoke(ctx(2)).await.expect("invoke 2");
        assert!(second.output.contains("COMPLETE"));
        let third = driver.invoke(ctx(3)).await.expect("invoke 3");
        assert!(third.output.contains("COMPLETE"));
        assert_eq!(driver.invocation_count(), 3);
    }

    #[tokio::test]
    async fn forwards_output_to_log_sink() {
        let lines = std::sync::Arc::new(StdMutex::new(Vec::new()));
        let captured = lines.clone();
        let mut context = ctx(1);
        context.log_sink = std::sync::Arc::new(move |line: &str| captured.lock().unwrap().push(line.to_string()));

        let driver = FakeAgentDriver::new("fake", vec![ScriptedResult::progress("hello")]);
        driver.invoke(context).await.expect("invoke");
        assert_eq!(*lines.lock().unwrap(), vec!["hello".to_string()]);
    }
}
