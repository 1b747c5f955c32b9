//! Hook input: task environment and the optional stdin payload

use serde::{Deserialize, Serialize};
use std::io::{IsTerminal, Read};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

pub const ENV_EVENT: &str = "GOPEED_EVENT";
pub const ENV_TASK_ID: &str = "GOPEED_TASK_ID";
pub const ENV_TASK_NAME: &str = "GOPEED_TASK_NAME";
pub const ENV_TASK_STATUS: &str = "GOPEED_TASK_STATUS";
pub const ENV_TASK_PATH: &str = "GOPEED_TASK_PATH";

/// Lifecycle event the download manager fires the hook for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
pub enum HookEvent {
    #[serde(rename = "DOWNLOAD_DONE")]
    #[value(name = "DOWNLOAD_DONE")]
    DownloadDone,
    #[serde(rename = "DOWNLOAD_ERROR")]
    #[value(name = "DOWNLOAD_ERROR")]
    DownloadError,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::DownloadDone => "DOWNLOAD_DONE",
            HookEvent::DownloadError => "DOWNLOAD_ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DOWNLOAD_DONE" => Some(HookEvent::DownloadDone),
            "DOWNLOAD_ERROR" => Some(HookEvent::DownloadError),
            _ => None,
        }
    }
}

/// Numeric task status as reported in `GOPEED_TASK_STATUS`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Prepare,
    Ready,
    Running,
    Pause,
    Error,
    Done,
    Unknown,
}

impl TaskStatus {
    /// Accepts a bare code or the `%!s(base.Status=5)` form the manager emits
    pub fn from_code(code: &str) -> Self {
        let code = code.trim().trim_end_matches(')');
        let digits = code.rsplit('=').next().unwrap_or(code);
        match digits.trim().parse::<u8>() {
            Ok(0) => TaskStatus::Prepare,
            Ok(1) => TaskStatus::Ready,
            Ok(2) => TaskStatus::Running,
            Ok(3) => TaskStatus::Pause,
            Ok(4) => TaskStatus::Error,
            Ok(5) => TaskStatus::Done,
            _ => TaskStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Prepare => "prepare",
            TaskStatus::Ready => "ready",
            TaskStatus::Running => "running",
            TaskStatus::Pause => "pause",
            TaskStatus::Error => "error",
            TaskStatus::Done => "done",
            TaskStatus::Unknown => "unknown",
        }
    }
}

/// Task information handed over through environment variables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskEnv {
    pub event: Option<String>,
    pub task_id: Option<String>,
    pub task_name: Option<String>,
    pub task_status: Option<String>,
    pub task_path: Option<String>,
}

impl TaskEnv {
    /// Read task variables from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read task variables through an arbitrary lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Self {
            event: get(ENV_EVENT),
            task_id: get(ENV_TASK_ID),
            task_name: get(ENV_TASK_NAME),
            task_status: get(ENV_TASK_STATUS),
            task_path: get(ENV_TASK_PATH),
        }
    }

    pub fn hook_event(&self) -> Option<HookEvent> {
        self.event.as_deref().and_then(HookEvent::parse)
    }

    pub fn display_name(&self) -> &str {
        self.task_name.as_deref().unwrap_or("unknown")
    }

    pub fn status(&self) -> TaskStatus {
        self.task_status
            .as_deref()
            .map(TaskStatus::from_code)
            .unwrap_or(TaskStatus::Unknown)
    }
}

/// Full task document the manager may pipe on stdin
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StdinPayload {
    #[serde(default)]
    pub event: Option<String>,
    /// Unix timestamp in milliseconds
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub payload: Option<StdinTask>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StdinTask {
    #[serde(default)]
    pub task: Option<serde_json::Value>,
}

impl StdinPayload {
    /// Parse stdin contents; anything that is not a JSON object yields `None`
    pub fn parse(input: &str) -> Option<Self> {
        if input.trim().is_empty() {
            debug!("No task data on stdin");
            return None;
        }

        match serde_json::from_str::<StdinPayload>(input) {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!("Ignoring unparseable stdin payload: {}", e);
                None
            }
        }
    }

    pub fn task(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref().and_then(|p| p.task.as_ref())
    }
}

/// Read a payload from `reader`, giving up after `timeout`.
///
/// The read happens on a detached thread so a caller that never closes
/// the stream cannot keep the process alive.
pub async fn read_payload_from<R>(mut reader: R, timeout: Duration) -> Option<StdinPayload>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut input = String::new();
        let result = reader.read_to_string(&mut input).map(|_| input);
        let _ = tx.send(result);
    });

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(Ok(input))) => StdinPayload::parse(&input),
        Ok(Ok(Err(e))) => {
            debug!("Failed to read stdin: {}", e);
            None
        }
        Ok(Err(_)) => None,
        Err(_) => {
            debug!("Timed out after {:?} waiting for stdin", timeout);
            None
        }
    }
}

/// The process stdin, unless it is a terminal nobody will write task data to
pub fn piped_stdin() -> Option<std::io::Stdin> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        debug!("stdin is a terminal, not reading task data");
        return None;
    }
    Some(stdin)
}
