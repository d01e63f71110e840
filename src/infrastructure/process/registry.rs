use std::sync::{Arc, Mutex, PoisonError};
use tokio::process::{Child, Command};
use tracing::{error, info};

/// Handle to one spawned transcode subprocess. Cloning shares the underlying
/// child, so the registry and a streaming response can both reach it.
#[derive(Clone)]
pub struct ProcessHandle {
    pid: Option<u32>,
    child: Arc<Mutex<Child>>,
}

impl ProcessHandle {
    pub fn new(child: Child) -> Self {
        Self {
            pid: child.id(),
            child: Arc::new(Mutex::new(child)),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_alive(&self) -> bool {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(child.try_wait(), Ok(None))
    }

    pub fn exit_code(&self) -> Option<i32> {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        match child.try_wait() {
            Ok(Some(status)) => status.code(),
            _ => None,
        }
    }

    /// Sends a forceful kill to the subprocess. Safe to call on an already
    /// exited child.
    pub fn kill(&self) {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(None) = child.try_wait() {
            if let Err(e) = child.start_kill() {
                error!("Failed to kill process {:?}: {}", self.pid, e);
            } else {
                info!("kill process: {:?}", self.pid);
            }
        }
    }
}

/// Tracks live-transcode subprocesses so at most one is in flight at a time.
pub struct ProcessRegistry {
    handles: Mutex<Vec<ProcessHandle>>,
    probe_argv: Vec<String>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::with_probe_command(vec!["ps".to_string(), "aux".to_string()])
    }

    /// Override the host process-list command. Tests point this at a command
    /// that prints canned output.
    pub fn with_probe_command(probe_argv: Vec<String>) -> Self {
        Self {
            handles: Mutex::new(Vec::new()),
            probe_argv,
        }
    }

    pub fn register(&self, handle: ProcessHandle) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.push(handle);
    }

    /// Kills every tracked subprocess that has not yet exited and empties the
    /// set. Idempotent.
    pub fn kill_all_and_clear(&self) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in handles.drain(..) {
            handle.kill();
        }
    }

    /// Scans the host process list for transform-style ffmpeg invocations,
    /// including ones this server did not spawn. Never errors; a failed scan
    /// reads as "nothing running".
    pub async fn has_external_transform_running(&self) -> bool {
        let Some((bin, args)) = self.probe_argv.split_first() else {
            return false;
        };
        let output = match Command::new(bin).args(args).output().await {
            Ok(output) => output,
            Err(e) => {
                error!("Error checking ffmpeg processes: {}", e);
                return false;
            }
        };
        if !output.status.success() {
            error!("Error running process list command: {}", output.status);
            return false;
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout.lines().any(is_transform_invocation)
    }
}

/// Matches cut (`-vcodec copy`) and queued transcode (`-preset slow`) command
/// lines while ignoring the process-list command itself and live-stream
/// encodes, which use the fast preset and may coexist with a queued job.
fn is_transform_invocation(line: &str) -> bool {
    if !line.contains("ffmpeg") || line.contains("ps aux") || line.contains("grep") {
        return false;
    }
    line.contains("-vcodec") || line.contains("-preset slow")
}
