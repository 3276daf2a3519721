//! Scripted executor for unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::app::error::AppError;
use crate::app::exec::runner::{LaunchStatus, ProcessExecutor};

#[derive(Default)]
pub struct FakeExecutor {
    responses: Mutex<HashMap<String, VecDeque<Result<String, AppError>>>>,
    launches: Mutex<HashMap<String, LaunchStatus>>,
    calls: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(program: &str, args: &[String]) -> String {
        if args.is_empty() {
            program.to_string()
        } else {
            format!("{program} {}", args.join(" "))
        }
    }

    /// Queues a response for an exact command line. The last queued response
    /// for a key is repeated once the queue is drained.
    pub fn respond(&self, command_line: &str, response: Result<&str, AppError>) -> &Self {
        let mut guard = self.responses.lock().expect("responses");
        guard
            .entry(command_line.to_string())
            .or_default()
            .push_back(response.map(str::to_string));
        self
    }

    pub fn ok(&self, command_line: &str, stdout: &str) -> &Self {
        self.respond(command_line, Ok(stdout))
    }

    pub fn fail(&self, command_line: &str, stderr: &str) -> &Self {
        self.respond(
            command_line,
            Err(AppError::execution("scripted failure", stderr, Some(1), "fake")),
        )
    }

    pub fn launch(&self, command_line: &str, status: LaunchStatus) -> &Self {
        self.launches
            .lock()
            .expect("launches")
            .insert(command_line.to_string(), status);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

impl ProcessExecutor for FakeExecutor {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        _working_dir: Option<&Path>,
        trace_id: &str,
    ) -> Result<String, AppError> {
        let key = Self::key(program, args);
        self.calls.lock().expect("calls").push(key.clone());
        let mut guard = self.responses.lock().expect("responses");
        let Some(queue) = guard.get_mut(&key) else {
            return Err(AppError::execution(
                format!("unexpected command: {key}"),
                "",
                Some(127),
                trace_id,
            ));
        };
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match response {
            Some(Ok(stdout)) => Ok(stdout),
            Some(Err(mut err)) => {
                err.trace_id = trace_id.to_string();
                Err(err)
            }
            None => Err(AppError::execution("no scripted response", "", None, trace_id)),
        }
    }

    fn spawn_detached(
        &self,
        program: &str,
        args: &[String],
        _grace: Duration,
        _trace_id: &str,
    ) -> Result<LaunchStatus, AppError> {
        let key = Self::key(program, args);
        self.calls.lock().expect("calls").push(key.clone());
        Ok(self
            .launches
            .lock()
            .expect("launches")
            .get(&key)
            .cloned()
            .unwrap_or(LaunchStatus::Running))
    }
}
