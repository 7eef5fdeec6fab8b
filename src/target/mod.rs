//! Local target server lifecycle
//!
//! Starts a single-process server for a project on a loopback port, waits
//! for it to accept connections, and records `{pid, port, baseUrl}` so
//! later invocations can find and stop it.
//!
//! Only the invocation that started a target should stop it. The record is
//! read and written without a lock: two invocations racing on the same
//! target can both decide to start one.

pub mod record;

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::common::config::ServerConfig;
use crate::common::{paths, Error, Result};

pub use record::{RecordStore, TargetRecord};

/// Longest single connection attempt while polling
const CONNECT_ATTEMPT: Duration = Duration::from_millis(500);

/// Interval between liveness checks while stopping
const STOP_POLL: Duration = Duration::from_millis(100);

/// What the manager needs to know about a target
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSpec {
    pub name: String,
    /// Project root; entry points are relative to it
    pub root: PathBuf,
    /// Explicit entry point, tried before the conventional locations
    pub entry: Option<PathBuf>,
    /// Launch command overriding the configured one
    pub command: Option<Vec<String>>,
}

pub struct TargetProcessManager {
    records: RecordStore,
    server: ServerConfig,
    children: Mutex<HashMap<String, Child>>,
}

impl TargetProcessManager {
    pub fn new(state_dir: impl Into<PathBuf>, server: ServerConfig) -> Self {
        Self {
            records: RecordStore::new(state_dir),
            server,
            children: Mutex::new(HashMap::new()),
        }
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// The persisted record, without checking that the process still runs
    pub fn status(&self, target: &TargetSpec) -> Option<TargetRecord> {
        self.records.read(&target.name)
    }

    /// First existing entry point for `target`
    pub fn resolve_entry(&self, target: &TargetSpec) -> Result<PathBuf> {
        let candidates = target
            .entry
            .iter()
            .chain(self.server.entry_candidates.iter());

        let mut searched = Vec::new();
        for candidate in candidates {
            let path = target.root.join(candidate);
            if path.is_file() {
                return Ok(path);
            }
            searched.push(path.display().to_string());
        }
        Err(Error::entry_point_not_found(&target.name, &searched))
    }

    /// Launch `target` and wait until its port accepts connections
    ///
    /// On timeout the process is killed and reaped before the error returns.
    pub async fn start(
        &self,
        target: &TargetSpec,
        port: Option<u16>,
        timeout: Duration,
    ) -> Result<TargetRecord> {
        let entry = self.resolve_entry(target)?;
        let docroot = entry
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| target.root.clone());
        let host = self.server.host.clone();
        let port = match port {
            Some(port) => port,
            None => free_port(&host)?,
        };

        let template = target.command.as_ref().unwrap_or(&self.server.command);
        let argv: Vec<String> = template
            .iter()
            .map(|arg| {
                arg.replace("{host}", &host)
                    .replace("{port}", &port.to_string())
                    .replace("{docroot}", &docroot.to_string_lossy())
                    .replace("{entry}", &entry.to_string_lossy())
                    .replace("{root}", &target.root.to_string_lossy())
            })
            .collect();
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::Config("Server command is empty".to_string()));
        };
        let program = locate_program(&target.name, program)?;

        paths::ensure_dir(self.records.dir())?;
        let log_path = self.records.log_path(&target.name);
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| Error::file_read(&log_path, e))?;
        let log_err = log.try_clone()?;

        info!(project = %target.name, port, command = ?argv, "Starting target");

        let mut command = Command::new(&program);
        command
            .args(args)
            .current_dir(&docroot)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err));
        detach(&mut command);

        let mut child = command.spawn().map_err(|e| Error::TargetSpawn {
            target: target.name.clone(),
            reason: e.to_string(),
        })?;

        let deadline = Instant::now() + timeout;
        let poll = Duration::from_millis(self.server.poll_interval_ms.max(1));
        loop {
            if let Ok(Some(status)) = child.try_wait() {
                return Err(Error::TargetExited {
                    target: target.name.clone(),
                    status: status.to_string(),
                    log: log_path.display().to_string(),
                });
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                terminate(&mut child);
                return Err(Error::StartupTimeout {
                    target: target.name.clone(),
                    port,
                    secs: timeout.as_secs(),
                });
            }

            if port_open(&host, port, CONNECT_ATTEMPT.min(remaining)).await {
                break;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            tokio::time::sleep(poll.min(remaining)).await;
        }

        let record = TargetRecord {
            pid: child.id(),
            port,
            base_url: format!("http://{host}:{port}"),
        };
        if let Err(e) = self.records.write(&target.name, &record) {
            terminate(&mut child);
            return Err(e);
        }
        self.lock_children().insert(target.name.clone(), child);

        info!(project = %target.name, pid = record.pid, base_url = %record.base_url, "Target is up");
        Ok(record)
    }

    /// Terminate the recorded process and delete the record
    ///
    /// No record is a no-op. The record is removed even when the process
    /// outlives `timeout`.
    pub async fn stop(&self, target: &TargetSpec, timeout: Duration) -> Result<()> {
        let Some(record) = self.status(target) else {
            debug!(project = %target.name, "No target record, nothing to stop");
            return Ok(());
        };

        info!(project = %target.name, pid = record.pid, "Stopping target");
        request_termination(record.pid);

        let deadline = Instant::now() + timeout;
        loop {
            self.reap(&target.name);
            if !is_alive(record.pid) {
                break;
            }
            if Instant::now() >= deadline {
                warn!(project = %target.name, pid = record.pid, "Target still running after stop timeout");
                break;
            }
            tokio::time::sleep(STOP_POLL).await;
        }

        self.records.remove(&target.name)
    }

    /// Reuse a live recorded target or start a new one
    ///
    /// Returns the record and whether this call started it.
    pub async fn ensure_running(
        &self,
        target: &TargetSpec,
        timeout: Duration,
    ) -> Result<(TargetRecord, bool)> {
        if let Some(record) = self.status(target) {
            if self.is_reachable(&record).await {
                debug!(project = %target.name, pid = record.pid, "Reusing running target");
                return Ok((record, false));
            }
            warn!(project = %target.name, pid = record.pid, "Discarding stale target record");
            self.records.remove(&target.name)?;
        }
        let record = self.start(target, None, timeout).await?;
        Ok((record, true))
    }

    /// Process alive and port accepting connections
    pub async fn is_reachable(&self, record: &TargetRecord) -> bool {
        is_alive(record.pid) && port_open(&self.server.host, record.port, CONNECT_ATTEMPT).await
    }

    fn lock_children(&self) -> std::sync::MutexGuard<'_, HashMap<String, Child>> {
        self.children
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Collect the exit status of a child we spawned, once it has exited
    fn reap(&self, name: &str) {
        let mut children = self.lock_children();
        if let Some(child) = children.get_mut(name) {
            if let Ok(Some(status)) = child.try_wait() {
                debug!(project = name, %status, "Target exited");
                children.remove(name);
            }
        }
    }
}

/// Ask the OS for an unused loopback port
pub fn free_port(host: &str) -> Result<u16> {
    let listener = std::net::TcpListener::bind((host, 0))?;
    Ok(listener.local_addr()?.port())
}

async fn port_open(host: &str, port: u16, attempt: Duration) -> bool {
    matches!(
        tokio::time::timeout(attempt, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

/// Bare program names must be on PATH
fn locate_program(target: &str, program: &str) -> Result<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return Ok(path.to_path_buf());
    }
    which::which(program).map_err(|_| Error::TargetSpawn {
        target: target.to_string(),
        reason: format!("'{program}' not found in PATH"),
    })
}

#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
    command.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

/// Kill a child we spawned, with its process group, and reap it
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Ok(pid) = i32::try_from(child.id()) {
        // SAFETY: the child leads its own process group
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn request_termination(pid: u32) {
    let Ok(pid) = i32::try_from(pid) else {
        return;
    };
    // SAFETY: plain signal delivery; the group is tried first since the
    // target leads its own process group
    unsafe {
        if libc::kill(-pid, libc::SIGTERM) != 0 {
            libc::kill(pid, libc::SIGTERM);
        }
    }
}

#[cfg(windows)]
fn request_termination(pid: u32) {
    let _ = Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}

/// Whether `pid` names a live process
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    // Signal 0 tests process existence without side effects
    let result = unsafe { libc::kill(pid, 0) };
    result == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(windows)]
pub fn is_alive(pid: u32) -> bool {
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {pid}"), "/NH"])
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}
