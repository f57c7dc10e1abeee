use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_KILL_TIMEOUT_MS: u64 = 5000;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Signals and liveness
// ---------------------------------------------------------------------------

fn nix_pid(pid: u32) -> Pid {
    Pid::from_raw(pid as i32)
}

pub fn send_signal(pid: u32, signal: Signal) -> io::Result<()> {
    signal::kill(nix_pid(pid), signal).map_err(io::Error::from)
}

/// Zero-signal probe. A process we may not signal still exists; a zombie
/// has already exited and only waits to be reaped.
pub fn check_pid(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    match signal::kill(nix_pid(pid), None) {
        Ok(()) | Err(nix::errno::Errno::EPERM) => !is_zombie(pid),
        Err(_) => false,
    }
}

fn is_zombie(pid: u32) -> bool {
    let pid = sysinfo::Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    sys.process(pid)
        .is_some_and(|process| process.status() == ProcessStatus::Zombie)
}

/// SIGTERM, then poll until the process is gone. Escalates to SIGKILL once
/// `timeout` has elapsed. Returns false if the process was already gone.
pub async fn terminate(pid: u32, timeout: Duration) -> bool {
    if send_signal(pid, Signal::SIGTERM).is_err() {
        return false;
    }

    let deadline = tokio::time::Instant::now() + timeout;
    while check_pid(pid) {
        if tokio::time::Instant::now() >= deadline {
            let _ = send_signal(pid, Signal::SIGKILL);
            tokio::time::sleep(Duration::from_millis(100)).await;
            break;
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
    }
    true
}

// ---------------------------------------------------------------------------
// Process discovery
// ---------------------------------------------------------------------------

/// File name of the running executable, the identity used for kill-by-name.
pub fn current_exe_name() -> io::Result<OsString> {
    let exe = std::env::current_exe()?;
    exe.file_name()
        .map(OsStr::to_os_string)
        .ok_or_else(|| io::Error::other("executable path has no file name"))
}

/// Pids of live processes named `name`, excluding the calling process.
pub fn find_processes_by_name(name: &OsStr) -> Vec<u32> {
    let own = std::process::id();
    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::nothing().with_exe(UpdateKind::OnlyIfNotSet),
    );

    let mut pids: Vec<u32> = sys
        .processes()
        .values()
        .filter(|process| process.status() != ProcessStatus::Zombie)
        .filter(|process| {
            process.name() == name
                || process.exe().and_then(Path::file_name) == Some(name)
        })
        .map(|process| process.pid().as_u32())
        .filter(|&pid| pid != own)
        .collect();
    pids.sort_unstable();
    pids
}

// ---------------------------------------------------------------------------
// Detached spawn
// ---------------------------------------------------------------------------

/// Builds a command that runs fully detached from the caller's terminal:
/// new session, stdin from /dev/null, output appended to `log`.
pub fn detached_command(exe: &Path, args: &[String], log: File) -> io::Result<Command> {
    let stderr = log.try_clone()?;
    let mut cmd = Command::new(exe);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(stderr));

    // SAFETY: pre_exec runs after fork, before exec, and setsid is
    // async-signal-safe. A new session is the only way to drop the
    // controlling terminal; `Command::process_group` keeps it.
    unsafe {
        cmd.pre_exec(|| {
            nix::unistd::setsid()?;
            Ok(())
        });
    }

    Ok(cmd)
}

// ---------------------------------------------------------------------------
// Signal shutdown (async)
// ---------------------------------------------------------------------------

/// SIGTERM and SIGINT handlers, installed as soon as this is built so a
/// signal that arrives before anyone awaits [`recv`](Self::recv) is not lost.
pub struct ShutdownSignals {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    pub fn register() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    pub async fn recv(mut self) {
        tokio::select! {
            _ = self.sigterm.recv() => {}
            _ = self.sigint.recv() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_pid_self() {
        assert!(check_pid(std::process::id()));
    }

    #[test]
    fn test_check_pid_bogus() {
        assert!(!check_pid(4294967));
        assert!(!check_pid(0));
        assert!(!check_pid(u32::MAX));
    }

    #[test]
    fn test_check_pid_reaped_child() {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!check_pid(pid));
    }

    #[test]
    fn test_check_pid_zombie_is_dead() {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id();
        // Not yet reaped: the kernel keeps a zombie entry around.
        std::thread::sleep(Duration::from_millis(300));
        assert!(!check_pid(pid));
        child.wait().unwrap();
    }

    #[tokio::test]
    async fn test_terminate_stops_process() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();

        // Reap in the background so the pid does not linger as a zombie.
        let waiter = std::thread::spawn(move || child.wait());

        assert!(terminate(pid, Duration::from_secs(5)).await);
        waiter.join().unwrap().unwrap();
        assert!(!check_pid(pid));
    }

    #[tokio::test]
    async fn test_terminate_missing_process() {
        assert!(!terminate(4294967, Duration::from_millis(100)).await);
    }

    #[test]
    fn test_find_processes_by_name_excludes_self() {
        let name = current_exe_name().unwrap();
        assert!(!find_processes_by_name(&name).contains(&std::process::id()));
    }

    #[test]
    fn test_find_processes_by_name_finds_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();

        let found = find_processes_by_name(OsStr::new("sleep"));
        let _ = child.kill();
        let _ = child.wait();

        assert!(found.contains(&pid), "expected {pid} in {found:?}");
    }

    #[test]
    fn test_find_processes_by_name_unknown() {
        assert!(find_processes_by_name(OsStr::new("no-such-process-name-xyz")).is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_signals_receive_sigterm() {
        let signals = ShutdownSignals::register().unwrap();
        let waiter = tokio::spawn(signals.recv());

        send_signal(std::process::id(), Signal::SIGTERM).unwrap();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("SIGTERM should be observed")
            .unwrap();
    }

    #[test]
    fn test_detached_command_runs_in_new_session() {
        let dir = tempfile::tempdir().unwrap();
        let log = File::create(dir.path().join("out.log")).unwrap();
        let args = vec!["-c".to_string(), "cut -d' ' -f6 /proc/$$/stat".to_string()];

        let mut child = detached_command(Path::new("/bin/sh"), &args, log)
            .unwrap()
            .spawn()
            .unwrap();
        let pid = child.id();
        child.wait().unwrap();

        let output = std::fs::read_to_string(dir.path().join("out.log")).unwrap();
        assert_eq!(output.trim(), pid.to_string());
    }
}
