use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::app::actions::{build_action, Action, ActionEnv, ActionOutcome, ActionRequest, ActionTag};
use crate::app::context::ExecutionContext;
use crate::app::error::AppError;
use crate::app::logging::resolve_trace_id;
use crate::app::models::{Device, Platform};
use crate::app::scheduler::SerialQueue;

pub type Reporter = Arc<dyn Fn(ActionEvent) + Send + Sync>;
pub type Confirmer = Arc<dyn Fn(&Action) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// Final report for one dispatched action.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ActionEvent {
    pub trace_id: String,
    pub device_name: String,
    pub platform: Platform,
    pub tag: ActionTag,
    pub status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ActionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AppError>,
    pub finished_at: String,
}

impl ActionEvent {
    fn new(trace_id: &str, device: &Device, tag: ActionTag, status: ActionStatus) -> Self {
        Self {
            trace_id: trace_id.to_string(),
            device_name: device.name.clone(),
            platform: device.platform,
            tag,
            status,
            outcome: None,
            error: None,
            finished_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    fn from_result(
        trace_id: &str,
        device: &Device,
        tag: ActionTag,
        result: Result<ActionOutcome, AppError>,
    ) -> Self {
        match result {
            Ok(outcome) => Self {
                outcome: Some(outcome),
                ..Self::new(trace_id, device, tag, ActionStatus::Succeeded)
            },
            Err(err) => Self {
                error: Some(err),
                ..Self::new(trace_id, device, tag, ActionStatus::Failed)
            },
        }
    }
}

/// Runs actions one at a time on a dedicated queue. Failures never escape
/// as panics or return values; every dispatch ends in exactly one event on
/// the reporter.
pub struct ActionDispatcher {
    queue: SerialQueue,
    env: Arc<ActionEnv>,
    reporter: Reporter,
    confirmer: Confirmer,
}

impl ActionDispatcher {
    pub fn new(env: Arc<ActionEnv>, reporter: Reporter, confirmer: Confirmer) -> Self {
        Self {
            queue: SerialQueue::new("devicebar-actions"),
            env,
            reporter,
            confirmer,
        }
    }

    /// Builds and confirms on the caller, then queues execution. Returns the
    /// trace id the event will carry.
    pub fn dispatch(&self, device: &Device, request: &ActionRequest, trace_id: Option<String>) -> String {
        let trace_id = resolve_trace_id(trace_id);

        let action = match build_action(device, request, &trace_id) {
            Ok(action) => action,
            Err(err) => {
                warn!(trace_id = %trace_id, device = %device.name, tag = ?request.tag, error = %err, "action rejected");
                (self.reporter)(ActionEvent::from_result(&trace_id, device, request.tag, Err(err)));
                return trace_id;
            }
        };

        if action.requires_confirmation() && !(self.confirmer)(&action) {
            info!(trace_id = %trace_id, device = %device.name, tag = ?request.tag, "action cancelled");
            (self.reporter)(ActionEvent::new(&trace_id, device, request.tag, ActionStatus::Cancelled));
            return trace_id;
        }

        let env = self.env.clone();
        let reporter = self.reporter.clone();
        let job_trace = trace_id.clone();
        let queued = self.queue.dispatch(move || {
            let result = action.execute(&env, ExecutionContext::Background, &job_trace);
            match &result {
                Ok(_) => info!(trace_id = %job_trace, tag = ?action.tag(), device = %action.device().name, "action succeeded"),
                Err(err) => error!(trace_id = %job_trace, tag = ?action.tag(), device = %action.device().name, error = %err, "action failed"),
            }
            reporter(ActionEvent::from_result(&job_trace, action.device(), action.tag(), result));
        });

        if !queued {
            let err = AppError::system("Action queue is shut down", &trace_id);
            (self.reporter)(ActionEvent::from_result(&trace_id, device, request.tag, Err(err)));
        }
        trace_id
    }

    /// Waits for queued actions to finish and stops accepting new ones.
    pub fn shutdown(&self) {
        self.queue.shutdown();
    }
}
