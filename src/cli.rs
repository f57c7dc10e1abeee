use crate::config::{Action, FileConfig, RunConfiguration};
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "info-server",
    about = "Echoes HTTP request details back to the client",
    version,
    disable_help_flag = true,
    disable_version_flag = true,
    args_override_self = true
)]
pub struct Cli {
    /// Show the version number and exit
    #[arg(short = 'v', long)]
    pub version: bool,

    /// Show this help message and exit
    #[arg(short, long)]
    pub help: bool,

    /// Set the port to listen on (default: 3000)
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Print every request and a system summary on the console
    #[arg(short = 'i', long)]
    pub verbose: bool,

    /// Start the info server in the background
    #[arg(short, long)]
    pub start: bool,

    /// Terminate running info servers
    #[arg(short, long)]
    pub kill: bool,

    /// Terminate the previous info server and start a new one
    #[arg(short, long)]
    pub restart: bool,

    /// Serve attached to this terminal instead of detaching
    #[arg(short, long)]
    pub foreground: bool,

    #[arg(long, hide = true)]
    pub background: bool,
}

impl Cli {
    /// Version beats help, help beats kill, kill beats restart, restart
    /// beats start. Without any start-like flag the answer is help.
    pub fn action(&self) -> Action {
        if self.version {
            Action::ShowVersion
        } else if self.help {
            Action::ShowHelp
        } else if self.kill {
            Action::Stop
        } else if self.restart {
            Action::Restart
        } else if self.start || self.background || self.foreground {
            Action::Start
        } else {
            Action::ShowHelp
        }
    }

    pub fn into_run_configuration(self, file: &FileConfig) -> RunConfiguration {
        let defaults = RunConfiguration::default();
        RunConfiguration {
            action: self.action(),
            port: self.port.or(file.port).unwrap_or(defaults.port),
            verbose: self.verbose || file.verbose.unwrap_or(defaults.verbose),
            background: self.background,
            foreground: self.foreground,
            trust_proxy: file.trust_proxy.unwrap_or(defaults.trust_proxy),
            kill_strategy: file.kill_strategy.unwrap_or(defaults.kill_strategy),
            kill_timeout: file
                .kill_timeout
                .map(Duration::from_millis)
                .unwrap_or(defaults.kill_timeout),
        }
    }
}
