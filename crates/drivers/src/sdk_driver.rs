// SPDX-License-Identifier: MIT

//! SDK Agent Driver (§4.4): drives an agent that streams structured,
//! newline-delimited JSON events on stdout instead of raw text.

use crate::context::{DriverContext, IterationResult, EXIT_CODE_USAGE_LIMIT};
use crate::driver::AgentDriver;
use crate::error::DriverError;
use crate::path_rewrite::relativize;
use crate::prompt::compose_prompt;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;

/// One structured event emitted by an SDK-backed agent, one JSON object per
/// stdout line.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriverEvent {
    Text { content: String },
    ToolCall { name: String, input: serde_json::Value },
    Result {
        #[serde(default)]
        task_id: Option<String>,
        #[serde(default)]
        usage_limit: bool,
    },
    Error { message: String },
}

#[derive(Default)]
struct SdkState {
    output: String,
    last_task_id: Option<String>,
    usage_limit_signaled: bool,
    error_signaled: bool,
}

pub struct SdkAgentDriver {
    name: String,
    binary: String,
}

impl SdkAgentDriver {
    pub fn new(name: impl Into<String>, binary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binary: binary.into(),
        }
    }
}

fn handle_event(event_line: &str, sandbox: &std::path::Path, state: &Mutex<SdkState>, log_sink: &crate::context::LogSink) {
    let parsed: Result<DriverEvent, _> = serde_json::from_str(event_line);
    match parsed {
        Ok(DriverEvent::Text { content }) => {
            let relativized = relativize(&content, sandbox);
            let mut st = state.lock();
            st.output.push_str(&relativized);
            st.output.push('\n');
            drop(st);
            (log_sink)(&relativized);
        }
        Ok(DriverEvent::ToolCall { name, input }) => {
            let rendered = relativize(&format!("[tool] {name}({input})"), sandbox);
            (log_sink)(&rendered);
        }
        Ok(DriverEvent::Result { task_id, usage_limit }) => {
            let mut st = state.lock();
            if task_id.is_some() {
                st.last_task_id = task_id;
            }
            st.usage_limit_signaled = usage_limit;
        }
        Ok(DriverEvent::Error { message }) => {
            let rendered = relativize(&message, sandbox);
            let mut st = state.lock();
            st.output.push_str(&rendered);
            st.output.push('\n');
            st.error_signaled = true;
            drop(st);
            (log_sink)(&rendered);
        }
        Err(_) => {
            // Tolerate non-JSON lines (banners, warnings) as plain text.
            let relativized = relativize(event_line, sandbox);
            let mut st = state.lock();
            st.output.push_str(&relativized);
            st.output.push('\n');
            drop(st);
            (log_sink)(&relativized);
        }
    }
}

#[async_trait]
impl AgentDriver for SdkAgentDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, ctx: DriverContext) -> Result<IterationResult, DriverError> {
        let prompt = compose_prompt(ctx.iteration_number, &ctx.config);
        let mut args = vec!["--output-format".to_string(), "stream-json".to_string(), "-p".to_string(), prompt];
        args.extend(ctx.config.extra_args.iter().cloned());

        ctx.command_recorder.begin(&self.binary, &args, &ctx.sandbox_path);

        let state = Arc::new(Mutex::new(SdkState::default()));
        let sandbox_path = ctx.sandbox_path.clone();

        let stdout_state = state.clone();
        let stdout_sandbox = sandbox_path.clone();
        let stdout_log_sink = ctx.log_sink.clone();
        let on_stdout_line: aro_supervisor::LineSink = Box::new(move |line| {
            handle_event(line, &stdout_sandbox, &stdout_state, &stdout_log_sink);
        });

        let stderr_log_sink = ctx.log_sink.clone();
        let stderr_sandbox = sandbox_path.clone();
        let on_stderr_line: aro_supervisor::LineSink = Box::new(move |line| {
            (stderr_log_sink)(&relativize(line, &stderr_sandbox));
        });

        let spawn_result = aro_supervisor::spawn(aro_supervisor::SpawnRequest {
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

        ctx.command_recorder.finish(spawn_result.exit_code);

        let st = state.lock();
        let exit_code = if spawn_result.exit_code != 0 {
            spawn_result.exit_code
        } else if st.usage_limit_signaled {
            EXIT_CODE_USAGE_LIMIT
        } else if st.error_signaled {
            1
        } else {
            0
        };

        Ok(IterationResult {
            output: st.output.clone(),
            exit_code,
            last_task_id: st.last_task_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn run(lines: &[&str]) -> (SdkState, Vec<String>) {
        let state = Mutex::new(SdkState::default());
        let captured: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let inner = captured.clone();
        let sink: crate::context::LogSink = Arc::new(move |line: &str| inner.lock().push(line.to_string()));
        let sandbox = PathBuf::from("/tmp/sandbox");
        for line in lines {
            handle_event(line, &sandbox, &state, &sink);
        }
        let st = state.into_inner();
        let out_lines = captured.lock().clone();
        (st, out_lines)
    }

    #[test]
    fn accumulates_text_events_into_output() {
        let (state, lines) = run(&[r#"{"type":"text","content":"hello"}"#, r#"{"type":"text","content":"world"}"#]);
        assert_eq!(state.output, "hello\nworld\n");
        assert_eq!(lines, vec!["hello", "world"]);
    }

    #[test]
    fn result_event_captures_task_id_and_usage_limit() {
        let (state, _) = run(&[r#"{"type":"result","task_id":"t-1","usage_limit":true}"#]);
        assert_eq!(state.last_task_id, Some("t-1".to_string()));
        assert!(state.usage_limit_signaled);
    }

    #[test]
    fn error_event_sets_error_signaled() {
        let (state, _) = run(&[r#"{"type":"error","message":"boom"}"#]);
        assert!(state.error_signaled);
        assert!(state.output.contains("boom"));
    }

    #[test]
    fn non_json_line_is_tolerated_as_plain_text() {
        let (state, lines) = run(&["plain banner line"]);
        assert_eq!(state.output, "plain banner line\n");
        assert_eq!(lines, vec!["plain banner line"]);
    }

    #[test]
    fn tool_call_event_renders_without_polluting_output() {
        let (state, lines) = run(&[r#"{"type":"tool_call","name":"read_file","input":{"path":"/tmp/sandbox/a.rs"}}"#]);
        assert!(state.output.is_empty());
        assert!(lines[0].contains("[tool] read_file"));
        assert!(lines[0].contains("a.rs"));
        assert!(!lines[0].contains("/tmp/sandbox"));
    }
}
