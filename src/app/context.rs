use crate::app::error::AppError;

/// Where the caller is running. Discovery, device services and actions
/// block on subprocesses and must never run on the presentation thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    Background,
    Presentation,
}

impl ExecutionContext {
    pub fn ensure_background(self, operation: &str, trace_id: &str) -> Result<(), AppError> {
        match self {
            ExecutionContext::Background => Ok(()),
            ExecutionContext::Presentation => Err(AppError::validation(
                format!("{operation} must not run on the presentation thread"),
                trace_id,
            )),
        }
    }
}
