use clap::{CommandFactory, Parser};
use info_server::cli::Cli;
use info_server::config::{self, Action};
use info_server::console;
use info_server::paths::Paths;
use info_server::supervisor::{Started, Supervisor, SupervisorError};
use owo_colors::{OwoColorize, Stream};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    match cli.action() {
        Action::ShowVersion => {
            let version = format!("v{}", env!("CARGO_PKG_VERSION"));
            println!("{}", version.if_supports_color(Stream::Stdout, |t| t.blue()));
            return Ok(());
        }
        Action::ShowHelp => {
            Cli::command().print_help()?;
            return Ok(());
        }
        Action::Start | Action::Stop | Action::Restart => {}
    }

    let paths = Paths::new()?;
    if let Err(e) = run(cli, paths).await {
        console::error(&e.to_string());
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli, paths: Paths) -> Result<(), SupervisorError> {
    let file_config = config::load_config(&paths.config_file())?;
    let config = cli.into_run_configuration(&file_config);
    let action = config.action;
    let supervisor = Supervisor::new(config, paths);

    match action {
        Action::Start => report_started(supervisor.start().await?),
        Action::Stop => report_killed(&supervisor.kill().await?),
        Action::Restart => {
            let (killed, started) = supervisor.restart().await?;
            report_killed(&killed);
            report_started(started);
        }
        Action::ShowVersion | Action::ShowHelp => {}
    }

    Ok(())
}

fn report_started(started: Started) {
    match started {
        Started::Detached { pid, port } => {
            console::success(&format!("info server started on port {port} (pid {pid})"));
        }
        Started::Served => {}
    }
}

fn report_killed(pids: &[u32]) {
    if pids.is_empty() {
        console::notice("no running info server found");
    } else {
        let list: Vec<String> = pids.iter().map(u32::to_string).collect();
        console::success(&format!("stopped: {}", list.join(", ")));
    }
}
