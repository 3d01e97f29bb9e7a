//! External process execution
//!
//! Shared by the test oracle and the mechanical formatter. Output is drained
//! on background threads so a chatty tool cannot block on a full pipe while
//! we poll for the timeout. On Unix each tool runs in its own process group,
//! and a timeout kills the whole group, including `sh -c` children and test
//! worker processes.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result from running an external tool
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Whether the tool ran to completion (its exit code may still be non-zero)
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub return_code: Option<i32>,
    pub timed_out: bool,
    /// Error message if the tool could not be run
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn success(stdout: String, stderr: String, return_code: i32) -> Self {
        Self {
            success: true,
            stdout,
            stderr,
            return_code: Some(return_code),
            timed_out: false,
            error: None,
        }
    }

    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            return_code: None,
            timed_out: false,
            error: Some(error),
        }
    }

    pub fn timeout(tool_name: &str, timeout_secs: u64) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            return_code: None,
            timed_out: true,
            error: Some(format!("{} timed out after {}s", tool_name, timeout_secs)),
        }
    }

    /// stdout and stderr together, for tools that report on either
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Run `cmd` in `cwd`, killing it after `timeout_secs` (0 = no timeout)
pub fn run_tool(cmd: &[String], tool_name: &str, timeout_secs: u64, cwd: &Path) -> ToolOutput {
    let Some((program, args)) = cmd.split_first() else {
        return ToolOutput::failure("Empty command".to_string());
    };

    debug!("Running {}: {} {:?}", tool_name, program, args);

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt as _;
        command.process_group(0);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            if e.kind() == std::io::ErrorKind::NotFound {
                return ToolOutput::failure(format!("{} not found. Please install it first.", tool_name));
            }
            return ToolOutput::failure(format!("Failed to run {}: {}", tool_name, e));
        }
    };

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    match wait(&mut child, timeout_secs) {
        Ok(Some(code)) => ToolOutput::success(collect(stdout), collect(stderr), code),
        Ok(None) => {
            kill_group(&mut child);
            warn!("{} timed out after {}s", tool_name, timeout_secs);
            ToolOutput::timeout(tool_name, timeout_secs)
        }
        Err(e) => ToolOutput::failure(format!("Failed to wait for {}: {}", tool_name, e)),
    }
}

/// Exit code once the child finishes, `None` on timeout
fn wait(child: &mut Child, timeout_secs: u64) -> std::io::Result<Option<i32>> {
    if timeout_secs == 0 {
        return child.wait().map(|status| Some(status.code().unwrap_or(-1)));
    }

    let start = Instant::now();
    let timeout = Duration::from_secs(timeout_secs);
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status.code().unwrap_or(-1)));
        }
        if start.elapsed() > timeout {
            return Ok(None);
        }
        thread::sleep(Duration::from_millis(50));
    }
}

/// Kill the child and everything else in its process group
fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pid) = i32::try_from(child.id()) {
            // SAFETY: plain syscall; the group id is the child's own pid
            unsafe {
                let _ = libc::kill(-pid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[test]
    fn test_captures_output_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_tool(&sh("echo out; echo err >&2; exit 3"), "sh", 10, dir.path());
        assert!(out.success);
        assert_eq!(out.return_code, Some(3));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[test]
    fn test_timeout_kills_the_process() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_tool(&sh("sleep 5"), "sleeper", 1, dir.path());
        assert!(out.timed_out);
        assert!(!out.success);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_timeout_kills_background_children() {
        let dir = tempfile::tempdir().unwrap();
        let ticks = dir.path().join("ticks");
        let script = "(while true; do echo x >> ticks; sleep 0.1; done) & wait";
        let out = run_tool(&sh(script), "ticker", 1, dir.path());
        assert!(out.timed_out);

        let len = || std::fs::metadata(&ticks).map(|m| m.len()).unwrap_or(0);
        thread::sleep(Duration::from_millis(300));
        let settled = len();
        thread::sleep(Duration::from_millis(600));
        assert_eq!(len(), settled, "background loop survived the timeout");
    }

    #[test]
    fn test_missing_program_and_empty_command() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_tool(
            &["definitely-not-a-real-tool-archfix".to_string()],
            "fake",
            10,
            dir.path(),
        );
        assert!(!out.success);
        assert!(out.error.unwrap().contains("not found"));

        assert!(!run_tool(&[], "none", 10, dir.path()).success);
    }

    #[test]
    fn test_large_output_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_tool(&sh("yes line | head -n 200000"), "yes", 30, dir.path());
        assert!(out.success);
        assert_eq!(out.stdout.lines().count(), 200000);
    }
}
