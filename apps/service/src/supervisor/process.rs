//! Launching and signalling worker processes.
//!
//! A worker is identified by the pid recorded at launch together with its
//! exact argument vector. Liveness checks compare that vector against the
//! live process (where `/proc` is available) so a recycled pid is never
//! mistaken for a worker.

use std::fs::OpenOptions;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
#[cfg(unix)]
use std::time::Duration;

use super::registry::WorkerHandle;
use crate::models::MonitorConfig;
use crate::storage::WORKER_LOG_FILE;

/// Result of asking a worker to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Signalled,
    /// The process was gone by the time the signal was sent
    AlreadyExited,
}

/// Process operations the supervisor needs
pub trait WorkerLauncher: Send + Sync {
    /// Start a detached worker for `monitor`, logging into `monitor_dir`
    fn launch(&self, monitor: &MonitorConfig, monitor_dir: &Path) -> IoResult<WorkerHandle>;

    fn is_alive(&self, handle: &WorkerHandle) -> bool;

    fn terminate(&self, handle: &WorkerHandle) -> IoResult<Termination>;
}

/// Launches workers as child processes of a program (normally this binary)
pub struct ProcessLauncher {
    program: PathBuf,
    base_args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, base_args: Vec<String>) -> Self {
        Self { program: program.into(), base_args }
    }

    /// Re-invoke the running executable with the same settings
    pub fn current(config_path: Option<&Path>, monitors_root: &Path) -> IoResult<Self> {
        let mut base_args =
            vec!["--monitors-dir".to_string(), monitors_root.to_string_lossy().into_owned()];
        if let Some(path) = config_path {
            base_args.push("--config".to_string());
            base_args.push(path.to_string_lossy().into_owned());
        }

        Ok(Self::new(std::env::current_exe()?, base_args))
    }

    pub fn worker_args(&self, domain: &str) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push("run".to_string());
        args.push(domain.to_string());
        args
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self, monitor: &MonitorConfig, monitor_dir: &Path) -> IoResult<WorkerHandle> {
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(monitor_dir.join(WORKER_LOG_FILE))?;

        let args = self.worker_args(monitor.domain());
        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log));

        // Own process group, so the worker outlives the operator's terminal
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let child = command.spawn()?;
        Ok(WorkerHandle::new(monitor.domain(), child.id(), args))
    }

    #[cfg(unix)]
    fn is_alive(&self, handle: &WorkerHandle) -> bool {
        let Ok(pid) = libc::pid_t::try_from(handle.pid) else { return false };
        if pid <= 0 {
            return false;
        }

        let result = unsafe { libc::kill(pid, 0) };
        if result != 0 && IoError::last_os_error().raw_os_error() != Some(libc::EPERM) {
            return false;
        }

        proc_argv_matches(pid, &handle.args)
    }

    #[cfg(not(unix))]
    fn is_alive(&self, _handle: &WorkerHandle) -> bool {
        false
    }

    #[cfg(unix)]
    fn terminate(&self, handle: &WorkerHandle) -> IoResult<Termination> {
        let pid = libc::pid_t::try_from(handle.pid)
            .map_err(|_| IoError::new(ErrorKind::InvalidInput, "pid out of range"))?;

        let result = unsafe { libc::kill(pid, libc::SIGTERM) };
        if result == 0 {
            return Ok(Termination::Signalled);
        }

        let errno = IoError::last_os_error();
        if errno.raw_os_error() == Some(libc::ESRCH) {
            return Ok(Termination::AlreadyExited);
        }
        Err(errno)
    }

    #[cfg(not(unix))]
    fn terminate(&self, _handle: &WorkerHandle) -> IoResult<Termination> {
        Err(IoError::new(ErrorKind::Unsupported, "stopping workers is only supported on unix"))
    }
}

/// A process that is still exec'ing shows an empty cmdline for a moment
#[cfg(unix)]
const CMDLINE_ATTEMPTS: usize = 20;
#[cfg(unix)]
const CMDLINE_RETRY: Duration = Duration::from_millis(10);

/// Compare the live argv of `pid` against `expected`. An empty cmdline is
/// only final once the process is a zombie.
#[cfg(unix)]
fn proc_argv_matches(pid: libc::pid_t, expected: &[String]) -> bool {
    for _ in 0..CMDLINE_ATTEMPTS {
        match std::fs::read(format!("/proc/{pid}/cmdline")) {
            Ok(raw) if !raw.is_empty() => return argv_matches(&raw, expected),
            Ok(_) => {}
            // No /proc on this platform: the signal probe is all we have
            Err(_) => return true,
        }
        if is_zombie(pid) {
            return false;
        }
        std::thread::sleep(CMDLINE_RETRY);
    }
    false
}

/// State field of `/proc/<pid>/stat`, which follows the parenthesized name
#[cfg(unix)]
fn is_zombie(pid: libc::pid_t) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| stat.rsplit_once(')').and_then(|(_, rest)| rest.trim_start().chars().next()))
        == Some('Z')
}

/// NUL-separated argv from `/proc/<pid>/cmdline`, program skipped, compared
/// argument by argument
fn argv_matches(raw: &[u8], expected: &[String]) -> bool {
    let argv: Vec<&[u8]> = raw.split(|byte| *byte == 0).filter(|arg| !arg.is_empty()).collect();
    argv.len() == expected.len() + 1
        && argv[1..].iter().zip(expected).all(|(actual, wanted)| *actual == wanted.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_args() {
        let launcher = ProcessLauncher::new("/usr/bin/domainwatch", vec!["--monitors-dir".into(), "/srv/m".into()]);
        assert_eq!(launcher.worker_args("example.com"), vec!["--monitors-dir", "/srv/m", "run", "example.com"]);
    }

    #[test]
    fn test_argv_matching_is_exact() {
        let expected = vec!["run".to_string(), "example.com".to_string()];

        assert!(argv_matches(b"/bin/domainwatch\0run\0example.com\0", &expected));
        // Substrings of another worker's arguments do not match
        assert!(!argv_matches(b"/bin/domainwatch\0run\0example.com.au\0", &expected));
        assert!(!argv_matches(b"/bin/domainwatch\0run\0sub.example.com\0", &expected));
        assert!(!argv_matches(b"/bin/domainwatch\0run\0", &expected));
        // Zombies expose an empty cmdline
        assert!(!argv_matches(b"", &expected));
    }

    #[cfg(target_os = "linux")]
    fn wait_for_cmdline(pid: u32) {
        for _ in 0..200 {
            if std::fs::read(format!("/proc/{pid}/cmdline")).is_ok_and(|raw| !raw.is_empty()) {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("cmdline of {pid} never appeared");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_freshly_spawned_process_is_alive() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let launcher = ProcessLauncher::new("sleep", Vec::new());
        let handle = WorkerHandle::new("example.com", child.id(), vec!["30".to_string()]);

        // No waiting for exec to finish: an empty cmdline is retried
        assert!(launcher.is_alive(&handle));

        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_zombie_is_not_alive() {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = libc::pid_t::try_from(child.id()).unwrap();
        for _ in 0..200 {
            if is_zombie(pid) {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(is_zombie(pid));

        let launcher = ProcessLauncher::new("true", Vec::new());
        let handle = WorkerHandle::new("example.com", child.id(), Vec::new());
        assert!(!launcher.is_alive(&handle));

        child.wait().unwrap();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_liveness_and_termination_of_real_process() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        wait_for_cmdline(child.id());
        let launcher = ProcessLauncher::new("sleep", Vec::new());
        let handle = WorkerHandle::new("example.com", child.id(), vec!["30".to_string()]);
        let impostor = WorkerHandle::new("example.com", child.id(), vec!["31".to_string()]);

        assert!(launcher.is_alive(&handle));
        assert!(!launcher.is_alive(&impostor));

        assert_eq!(launcher.terminate(&handle).unwrap(), Termination::Signalled);
        child.wait().unwrap();

        assert!(!launcher.is_alive(&handle));
        assert_eq!(launcher.terminate(&handle).unwrap(), Termination::AlreadyExited);
    }
}
