use serde::Serialize;
use std::fmt;

pub const ERR_CONFIGURATION: &str = "ERR_CONFIGURATION";
pub const ERR_EXECUTION: &str = "ERR_EXECUTION";
pub const ERR_NOT_FOUND: &str = "ERR_NOT_FOUND";
pub const ERR_UNSUPPORTED: &str = "ERR_UNSUPPORTED";
pub const ERR_VALIDATION: &str = "ERR_VALIDATION";
pub const ERR_SYSTEM: &str = "ERR_SYSTEM";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AppError {
    pub error: String,
    pub code: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            trace_id: trace_id.into(),
            stderr: None,
            exit_code: None,
        }
    }

    /// Android SDK or Xcode tooling is missing or misconfigured.
    pub fn configuration(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_CONFIGURATION, message, trace_id)
    }

    /// A subprocess could not be spawned or exited non-zero.
    pub fn execution(
        message: impl Into<String>,
        stderr: impl Into<String>,
        exit_code: Option<i32>,
        trace_id: impl Into<String>,
    ) -> Self {
        let mut err = Self::new(ERR_EXECUTION, message, trace_id);
        err.stderr = Some(stderr.into());
        err.exit_code = exit_code;
        err
    }

    pub fn not_found(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_NOT_FOUND, message, trace_id)
    }

    pub fn unsupported(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_UNSUPPORTED, message, trace_id)
    }

    pub fn validation(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_VALIDATION, message, trace_id)
    }

    pub fn system(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_SYSTEM, message, trace_id)
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }

    /// Raw diagnostic text of a failed subprocess, falling back to the message.
    pub fn diagnostic(&self) -> &str {
        self.stderr
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(&self.error)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.code)
    }
}

impl std::error::Error for AppError {}
