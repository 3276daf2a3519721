use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::app::error::AppError;

const READER_SETTLE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Outcome of a launch that is expected to keep running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchStatus {
    Running,
    Exited(CommandOutput),
}

pub trait ProcessExecutor: Send + Sync {
    /// Runs `program` to completion and returns its stdout. Blocks the
    /// caller; there is no timeout.
    fn execute(
        &self,
        program: &str,
        args: &[String],
        working_dir: Option<&Path>,
        trace_id: &str,
    ) -> Result<String, AppError>;

    /// Starts `program` and watches it for `grace`. A child still alive
    /// after that is left running in the background.
    fn spawn_detached(
        &self,
        program: &str,
        args: &[String],
        grace: Duration,
        trace_id: &str,
    ) -> Result<LaunchStatus, AppError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl ProcessExecutor for SystemExecutor {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        working_dir: Option<&Path>,
        trace_id: &str,
    ) -> Result<String, AppError> {
        let output = run_command(program, args, working_dir, trace_id)?;
        if output.success() {
            return Ok(output.stdout);
        }
        let stderr = output.stderr.trim().to_string();
        warn!(
            trace_id = %trace_id,
            program = %program,
            exit_code = ?output.exit_code,
            stderr = %stderr,
            "command exited with failure"
        );
        Err(AppError::execution(
            format!("{program} exited with status {:?}", output.exit_code),
            stderr,
            output.exit_code,
            trace_id,
        ))
    }

    fn spawn_detached(
        &self,
        program: &str,
        args: &[String],
        grace: Duration,
        trace_id: &str,
    ) -> Result<LaunchStatus, AppError> {
        spawn_with_grace(program, args, grace, trace_id)
    }
}

/// `sh -c <command>` invocation for user templates and profile probes.
pub fn shell(command: &str) -> (String, Vec<String>) {
    ("sh".to_string(), vec!["-c".to_string(), command.to_string()])
}

pub fn run_command(
    program: &str,
    args: &[String],
    working_dir: Option<&Path>,
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    debug!(trace_id = %trace_id, program = %program, args = ?args, "run command");
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }
    let mut child = command.spawn().map_err(|err| {
        AppError::execution(
            format!("Failed to spawn {program}: {err}"),
            err.to_string(),
            None,
            trace_id,
        )
    })?;

    // Both pipes are drained concurrently; a chatty child would otherwise
    // block once one pipe buffer fills.
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stdout", trace_id))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stderr", trace_id))?;
    let stdout_handle = std::thread::spawn(move || drain(stdout));
    let stderr_handle = std::thread::spawn(move || drain(stderr));

    let status = child.wait();
    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();
    let status = status.map_err(|err| {
        AppError::execution(
            format!("Failed to wait for {program}: {err}"),
            String::from_utf8_lossy(&stderr_bytes).to_string(),
            None,
            trace_id,
        )
    })?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).to_string(),
        stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
        exit_code: status.code(),
    })
}

fn drain<R: Read>(mut reader: R) -> Vec<u8> {
    let mut buffer = Vec::<u8>::new();
    let mut temp = [0u8; 4096];
    loop {
        match reader.read(&mut temp) {
            Ok(0) => break,
            Ok(count) => buffer.extend_from_slice(&temp[..count]),
            Err(_) => break,
        }
    }
    buffer
}

/// Collects a pipe while `capturing` is set and discards it afterwards, so a
/// detached child never blocks on a full pipe and its output is not kept.
fn capture_then_discard<R: Read + Send + 'static>(
    mut reader: R,
    capturing: Arc<AtomicBool>,
) -> (Arc<Mutex<Vec<u8>>>, JoinHandle<()>) {
    let buffer = Arc::new(Mutex::new(Vec::<u8>::new()));
    let sink = buffer.clone();
    let handle = std::thread::spawn(move || {
        let mut temp = [0u8; 4096];
        loop {
            match reader.read(&mut temp) {
                Ok(0) | Err(_) => break,
                Ok(count) => {
                    if capturing.load(Ordering::SeqCst) {
                        if let Ok(mut guard) = sink.lock() {
                            guard.extend_from_slice(&temp[..count]);
                        }
                    }
                }
            }
        }
    });
    (buffer, handle)
}

fn captured_text(buffer: &Mutex<Vec<u8>>) -> String {
    buffer
        .lock()
        .map(|guard| String::from_utf8_lossy(&guard).to_string())
        .unwrap_or_default()
}

fn spawn_with_grace(
    program: &str,
    args: &[String],
    grace: Duration,
    trace_id: &str,
) -> Result<LaunchStatus, AppError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| {
            AppError::execution(
                format!("Failed to spawn {program}: {err}"),
                err.to_string(),
                None,
                trace_id,
            )
        })?;

    let capturing = Arc::new(AtomicBool::new(true));
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stdout", trace_id))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stderr", trace_id))?;
    let (stdout_buffer, stdout_handle) = capture_then_discard(stdout, capturing.clone());
    let (stderr_buffer, stderr_handle) = capture_then_discard(stderr, capturing.clone());

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                // Grandchildren may hold the pipes open; wait briefly for
                // the readers and take whatever arrived.
                let settle = Instant::now();
                while !(stdout_handle.is_finished() && stderr_handle.is_finished())
                    && settle.elapsed() < READER_SETTLE
                {
                    std::thread::sleep(Duration::from_millis(10));
                }
                capturing.store(false, Ordering::SeqCst);
                return Ok(LaunchStatus::Exited(CommandOutput {
                    stdout: captured_text(&stdout_buffer),
                    stderr: captured_text(&stderr_buffer),
                    exit_code: status.code(),
                }));
            }
            Ok(None) => {
                if start.elapsed() >= grace {
                    capturing.store(false, Ordering::SeqCst);
                    debug!(trace_id = %trace_id, program = %program, "child still running; detaching");
                    reap_in_background(child);
                    return Ok(LaunchStatus::Running);
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                capturing.store(false, Ordering::SeqCst);
                reap_in_background(child);
                return Err(AppError::execution(
                    format!("Failed to poll {program}: {err}"),
                    err.to_string(),
                    None,
                    trace_id,
                ));
            }
        }
    }
}

fn reap_in_background(mut child: Child) {
    std::thread::spawn(move || {
        let _ = child.wait();
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn execute_returns_stdout() {
        let stdout = SystemExecutor
            .execute("sh", &args(&["-c", "echo hello"]), None, "trace-1")
            .expect("echo");
        assert_eq!(stdout.trim(), "hello");
    }

    #[test]
    fn execute_reports_stderr_and_status_on_failure() {
        let err = SystemExecutor
            .execute("sh", &args(&["-c", "echo boom >&2; exit 3"]), None, "trace-2")
            .expect_err("expected failure");
        assert_eq!(err.code, "ERR_EXECUTION");
        assert_eq!(err.exit_code, Some(3));
        assert_eq!(err.diagnostic(), "boom");
        assert_eq!(err.trace_id, "trace-2");
    }

    #[test]
    fn execute_reports_spawn_failure() {
        let err = SystemExecutor
            .execute("/this/path/should/not/exist/tool", &[], None, "trace-3")
            .expect_err("expected spawn failure");
        assert_eq!(err.code, "ERR_EXECUTION");
        assert_eq!(err.exit_code, None);
    }

    #[test]
    fn execute_honours_working_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stdout = SystemExecutor
            .execute("sh", &args(&["-c", "pwd"]), Some(dir.path()), "trace-4")
            .expect("pwd");
        let expected = dir.path().canonicalize().expect("canonicalize");
        let actual = std::path::PathBuf::from(stdout.trim())
            .canonicalize()
            .expect("canonicalize");
        assert_eq!(actual, expected);
    }

    #[test]
    fn run_command_does_not_deadlock_on_large_stdout() {
        let output = run_command(
            "sh",
            &args(&[
                "-c",
                "i=0; while [ $i -lt 100000 ]; do echo 1234567890; i=$((i+1)); done",
            ]),
            None,
            "trace-large",
        )
        .expect("large output");
        assert_eq!(output.exit_code, Some(0));
        assert!(output.stdout.len() >= 1_000_000);
    }

    #[test]
    fn spawn_detached_captures_quick_exit() {
        let status = SystemExecutor
            .spawn_detached(
                "sh",
                &args(&["-c", "echo already running >&2; exit 1"]),
                Duration::from_secs(5),
                "trace-5",
            )
            .expect("spawn");
        match status {
            LaunchStatus::Exited(output) => {
                assert_eq!(output.exit_code, Some(1));
                assert!(output.stderr.contains("already running"));
            }
            LaunchStatus::Running => panic!("expected quick exit"),
        }
    }

    #[test]
    fn spawn_detached_leaves_long_running_child() {
        let status = SystemExecutor
            .spawn_detached(
                "sh",
                &args(&["-c", "sleep 2"]),
                Duration::from_millis(200),
                "trace-6",
            )
            .expect("spawn");
        assert_eq!(status, LaunchStatus::Running);
    }

    #[test]
    fn detached_child_output_is_drained_after_grace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let marker = dir.path().join("done");
        let script = format!(
            "sleep 1; i=0; while [ $i -lt 20000 ]; do echo 1234567890; i=$((i+1)); done; touch '{}'",
            marker.display()
        );
        let status = SystemExecutor
            .spawn_detached("sh", &args(&["-c", &script]), Duration::from_millis(100), "trace-7")
            .expect("spawn");
        assert_eq!(status, LaunchStatus::Running);

        let deadline = Instant::now() + Duration::from_secs(15);
        while !marker.exists() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(50));
        }
        assert!(marker.exists(), "child blocked writing to its pipe");
    }
}
