// SPDX-License-Identifier: MIT

//! CLI Agent Driver (§4.4): invokes an external agent CLI via the Process
//! Supervisor and streams its stdout as log lines.

use crate::context::{AgentConfig, DriverContext, IterationResult};
use crate::driver::AgentDriver;
use crate::error::DriverError;
use crate::path_rewrite::relativize;
use crate::prompt::compose_prompt;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Drives an agent reachable as a plain executable (e.g. `claude -p <prompt>`).
pub struct CliAgentDriver {
    name: String,
    binary: String,
}

impl CliAgentDriver {
    pub fn new(name: impl Into<String>, binary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binary: binary.into(),
        }
    }

    fn build_args(&self, config: &AgentConfig, prompt: &str) -> Vec<String> {
        let mut args = vec!["-p".to_string(), prompt.to_string()];
        if let Some(model) = &config.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if let Some(mode) = &config.permission_mode {
            args.push("--permission-mode".to_string());
            args.push(mode.clone());
        }
        args.extend(config.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl AgentDriver for CliAgentDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, ctx: DriverContext) -> Result<IterationResult, DriverError> {
        let prompt = compose_prompt(ctx.iteration_number, &ctx.config);
        let args = self.build_args(&ctx.config, &prompt);

        ctx.command_recorder.begin(&self.binary, &args, &ctx.sandbox_path);

        let sandbox_path = ctx.sandbox_path.clone();
        let log_sink = ctx.log_sink.clone();
        let accumulated = Arc::new(Mutex::new(String::new()));
        let accumulated_for_stdout = accumulated.clone();
        let sandbox_for_stdout = sandbox_path.clone();

        let on_stdout_line: aro_supervisor::LineSink = Box::new(move |line| {
            let relativized = relativize(line, &sandbox_for_stdout);
            accumulated_for_stdout.lock().push_str(&relativized);
            accumulated_for_stdout.lock().push('\n');
            (log_sink)(&relativized);
        });
        let stderr_log_sink = ctx.log_sink.clone();
        let sandbox_for_stderr = sandbox_path.clone();
        let on_stderr_line: aro_supervisor::LineSink = Box::new(move |line| {
            (stderr_log_sink)(&relativize(line, &sandbox_for_stderr));
        });

        let result = aro_supervisor::spawn(aro_supervisor::SpawnRequest {
            command: self.binary.clone(),
            args: args.clone(),
            cwd: sandbox_path,
            env: std::collections::HashMap::new(),
            timeout: aro_core::env::iteration_timeout(),
            on_stdout_line,
            on_stderr_line,
            cancel: ctx.cancellation_token,
        })
        .await?;

        ctx.command_recorder.finish(result.exit_code);

        Ok(IterationResult {
            output: accumulated.lock().clone(),
            exit_code: result.exit_code,
            last_task_id: None,
        })
    }
}
