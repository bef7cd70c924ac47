use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed, missing or conflicting workflow configuration.
    Config,
    /// A named entry does not exist in the merged configuration.
    Lookup,
    /// A strict workflow task could not complete.
    Execution,
    /// The UI accessor (adb, device) failed underneath a task.
    Device,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Config => "ERR_CONFIG",
            ErrorKind::Lookup => "ERR_LOOKUP",
            ErrorKind::Execution => "ERR_EXECUTION",
            ErrorKind::Device => "ERR_DEVICE",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub kind: ErrorKind,
    pub error: String,
    pub trace_id: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            kind,
            error: message.into(),
            trace_id: trace_id.into(),
        }
    }

    pub fn config(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message, trace_id)
    }

    pub fn lookup(category: &str, name: &str, trace_id: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::Lookup,
            format!("Unknown {category} '{name}' in workflow config"),
            trace_id,
        )
    }

    pub fn execution(
        workflow: &str,
        task_index: usize,
        task_type: &str,
        message: impl fmt::Display,
        trace_id: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorKind::Execution,
            format!("Workflow '{workflow}' failed at task #{task_index} ({task_type}): {message}"),
            trace_id,
        )
    }

    pub fn device(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ErrorKind::Device, message, trace_id)
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Prefixes the message, keeping kind and trace id.
    pub fn context(mut self, prefix: impl fmt::Display) -> Self {
        self.error = format!("{prefix}: {}", self.error);
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.code())
    }
}

impl std::error::Error for AppError {}
