//! Start / kill / restart, coordinated through the pid marker.
//!
//! A start without `--background` or `--foreground` never serves itself: it
//! checks the marker, re-runs the current executable detached with
//! `--background`, records the child's pid and returns. The child skips the
//! marker check (its parent already claimed the marker for it) and serves.

use crate::banner;
use crate::config::{ConfigError, KillStrategy, RunConfiguration};
use crate::console;
use crate::echo::EchoState;
use crate::log;
use crate::paths::Paths;
use crate::pid;
use crate::server::ServerHandle;
use crate::sys;
use std::ffi::OsString;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("info server is already running (pid {0})")]
    AlreadyRunning(u32),
    #[error("failed to listen on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("cannot access pid marker: {0}")]
    MarkerIo(#[source] io::Error),
    #[error("failed to start background instance: {0}")]
    Spawn(#[source] io::Error),
    #[error("server error: {0}")]
    Serve(#[source] io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// How a successful start ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Started {
    /// A detached instance was spawned; this process should exit.
    Detached { pid: u32, port: u16 },
    /// This process served until it was told to stop.
    Served,
}

pub struct Supervisor {
    config: RunConfiguration,
    paths: Paths,
}

impl Supervisor {
    pub fn new(config: RunConfiguration, paths: Paths) -> Self {
        Self { config, paths }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    // -----------------------------------------------------------------------
    // start
    // -----------------------------------------------------------------------

    pub async fn start(&self) -> Result<Started, SupervisorError> {
        if self.config.background || self.config.foreground {
            self.serve().await?;
            return Ok(Started::Served);
        }

        self.resolve_marker()?;
        let pid = self.spawn_detached()?;
        pid::write(&self.paths, pid).map_err(SupervisorError::MarkerIo)?;
        Ok(Started::Detached {
            pid,
            port: self.config.port,
        })
    }

    /// Refuses when the marker names a live process; removes a marker whose
    /// process is gone.
    pub fn resolve_marker(&self) -> Result<(), SupervisorError> {
        let Some(recorded) = pid::read(&self.paths).map_err(SupervisorError::MarkerIo)? else {
            return Ok(());
        };
        if pid::is_alive(recorded) {
            return Err(SupervisorError::AlreadyRunning(recorded));
        }
        pid::clear(&self.paths).map_err(SupervisorError::MarkerIo)
    }

    /// Arguments the detached child is started with. Only the port and the
    /// verbose switch travel; everything else comes from the same config file.
    pub fn background_args(&self) -> Vec<String> {
        let mut args = vec![
            "--background".to_string(),
            "--port".to_string(),
            self.config.port.to_string(),
        ];
        if self.config.verbose {
            args.push("--verbose".to_string());
        }
        args
    }

    fn spawn_detached(&self) -> Result<u32, SupervisorError> {
        let exe = std::env::current_exe().map_err(SupervisorError::Spawn)?;
        let log = log::open_background_log(&self.paths).map_err(SupervisorError::Spawn)?;
        let mut cmd = sys::detached_command(&exe, &self.background_args(), log)
            .map_err(SupervisorError::Spawn)?;
        cmd.current_dir(self.paths.base_dir());
        let child = cmd.spawn().map_err(SupervisorError::Spawn)?;
        Ok(child.id())
    }

    // -----------------------------------------------------------------------
    // serve
    // -----------------------------------------------------------------------

    async fn serve(&self) -> Result<(), SupervisorError> {
        let own_pid = std::process::id();
        let port = self.config.port;
        let signals = sys::ShutdownSignals::register().map_err(SupervisorError::Serve)?;

        if self.config.foreground {
            self.resolve_marker()?;
            pid::write(&self.paths, own_pid).map_err(SupervisorError::MarkerIo)?;
        }

        let handle = match ServerHandle::bind(port).await {
            Ok(handle) => handle,
            Err(source) => {
                self.release_marker(own_pid);
                return Err(SupervisorError::Bind { port, source });
            }
        };

        if self.config.verbose {
            banner::print();
        }
        console::success(&format!(
            "info-server {} listening to {port}",
            env!("CARGO_PKG_VERSION")
        ));
        if self.config.verbose {
            console::notice("Running in verbose mode. All requests info will be printed here..");
        }

        let trigger = handle.shutdown_trigger();
        tokio::spawn(async move {
            signals.recv().await;
            console::killed("Info Server Killed");
            let _ = trigger.send(true);
        });

        let state = EchoState {
            verbose: self.config.verbose,
            trust_proxy: self.config.trust_proxy,
        };
        let result = handle.serve(state).await;
        self.release_marker(own_pid);
        result.map_err(SupervisorError::Serve)
    }

    fn release_marker(&self, own_pid: u32) {
        if let Err(e) = pid::clear_if_owned(&self.paths, own_pid) {
            console::warn(&format!("failed to remove pid marker: {e}"));
        }
    }

    // -----------------------------------------------------------------------
    // kill / restart
    // -----------------------------------------------------------------------

    /// Terminates running instances with the configured strategy and returns
    /// the pids that were signalled. Finding nothing is not an error. The
    /// marker is left alone; the next start reconciles it.
    pub async fn kill(&self) -> Result<Vec<u32>, SupervisorError> {
        match self.config.kill_strategy {
            KillStrategy::ByName => Ok(self.kill_all_by_name().await),
            KillStrategy::RecordedPid => {
                Ok(self.stop_by_recorded_pid().await?.into_iter().collect())
            }
        }
    }

    /// Every process running this executable except the caller.
    pub async fn kill_all_by_name(&self) -> Vec<u32> {
        let name = sys::current_exe_name()
            .unwrap_or_else(|_| OsString::from(env!("CARGO_PKG_NAME")));

        let mut stopped = Vec::new();
        for pid in sys::find_processes_by_name(&name) {
            if sys::terminate(pid, self.config.kill_timeout).await {
                stopped.push(pid);
            }
        }
        stopped
    }

    /// Only the pid the marker names, if it is still alive.
    pub async fn stop_by_recorded_pid(&self) -> Result<Option<u32>, SupervisorError> {
        let Some(recorded) = pid::read(&self.paths).map_err(SupervisorError::MarkerIo)? else {
            return Ok(None);
        };
        if recorded == std::process::id() || !pid::is_alive(recorded) {
            return Ok(None);
        }
        if sys::terminate(recorded, self.config.kill_timeout).await {
            Ok(Some(recorded))
        } else {
            Ok(None)
        }
    }

    /// Kill, then start straight away. A port the old instance has not yet
    /// released surfaces as [`SupervisorError::Bind`].
    pub async fn restart(&self) -> Result<(Vec<u32>, Started), SupervisorError> {
        let killed = self.kill().await?;
        let started = self.start().await?;
        Ok((killed, started))
    }
}
