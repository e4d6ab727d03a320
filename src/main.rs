use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use django_commands_lib::catalog::Catalog;
use django_commands_lib::config::{self, Settings};
use django_commands_lib::debugger::{DebugpyLauncher, LaunchConfigPrinter};
use django_commands_lib::host::DebugLauncher;
use django_commands_lib::logging;
use django_commands_lib::process::SystemProcessRunner;
use django_commands_lib::search::WorkspaceSearch;
use django_commands_lib::session::{Capabilities, Outcome, Session};
use django_commands_lib::state::JsonFileStore;
use django_commands_lib::terminal::PtyTerminalHost;
use django_commands_lib::toolchain::PythonToolchain;
use django_commands_lib::tui::{TuiInputBox, TuiPicker};

#[derive(Parser, Debug)]
#[command(name = "django-commands", version, about = "Pick and run Django management commands")]
struct Cli {
    /// Project directory to search for the entry point
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    /// Python interpreter, overriding settings and detection
    #[arg(long, global = true)]
    python: Option<PathBuf>,

    /// Directory holding settings.json and state.json
    #[arg(long, global = true, env = "DJANGO_COMMANDS_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Debug-level logging (overridden by DJANGO_COMMANDS_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pick a command and run it in a terminal
    Run(LaunchArgs),
    /// Pick a command and start it under debugpy
    Debug {
        #[command(flatten)]
        launch: LaunchArgs,
        /// Print the launch configuration as JSON instead of starting debugpy
        #[arg(long)]
        print_config: bool,
    },
    /// Re-read the command list and clear recently used commands
    Reload,
    /// Print the command list grouped by app
    List,
    /// Print recently used commands, most recent first
    Recent,
}

#[derive(Args, Debug)]
struct LaunchArgs {
    /// Run this command without showing the picker
    #[arg(long)]
    command: Option<String>,

    /// Arguments passed to the command; skips the argument prompt
    #[arg(last = true)]
    args: Vec<String>,
}

impl LaunchArgs {
    fn args_text(&self) -> Option<String> {
        (!self.args.is_empty()).then(|| self.args.join(" "))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("django-commands: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_settings(dir: &Path) -> Settings {
    let settings = config::load_settings(dir);
    if !dir.join(config::SETTINGS_FILE).exists()
        && let Err(e) = config::save_settings(dir, &settings)
    {
        tracing::warn!("{e}");
    }
    settings
}

fn run(cli: Cli) -> Result<()> {
    let project_root = match cli.project_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    let project_root = project_root
        .canonicalize()
        .with_context(|| format!("project directory {} is not accessible", project_root.display()))?;

    let config_dir = cli.config_dir.unwrap_or_else(config::config_dir);
    let mut settings = load_settings(&config_dir);
    if let Some(python) = cli.python {
        settings.python_path = Some(python);
        settings.python_exec_command = None;
    }
    tracing::debug!(project = %project_root.display(), config = %config_dir.display(), "starting");

    let debugger: Box<dyn DebugLauncher> = match &cli.command {
        Command::Debug { print_config: true, .. } => Box::new(LaunchConfigPrinter::new(std::io::stdout())),
        _ => Box::new(DebugpyLauncher::new(&settings.debug_listen, settings.debug_wait_for_client)),
    };
    let mut terminals = PtyTerminalHost::new(None);
    let caps = Capabilities {
        store: Box::new(JsonFileStore::open(&config_dir)),
        toolchain: Some(Box::new(PythonToolchain::new(&project_root, &settings))),
        search: Box::new(WorkspaceSearch),
        process: Box::new(SystemProcessRunner),
        picker: Box::new(TuiPicker),
        input: Box::new(TuiInputBox),
        terminals: Box::new(terminals.clone()),
        debugger,
    };
    let mut session = Session::new(settings, &project_root, caps);

    match cli.command {
        Command::Reload => {
            session.reload()?;
            let catalog = session.list();
            println!(
                "Loaded {} commands in {} groups.",
                catalog.command_count(),
                catalog.group_count()
            );
        }
        Command::List => {
            session.activate()?;
            print_catalog(session.list());
        }
        Command::Recent => {
            for name in session.recent() {
                println!("{name}");
            }
        }
        Command::Run(launch) => {
            let outcome = match &launch.command {
                Some(name) => session.run_command(name, launch.args_text().as_deref())?,
                None => {
                    activate_for_picker(&mut session)?;
                    session.run()?
                }
            };
            if report(&outcome) {
                terminals.attach_shown().map_err(anyhow::Error::msg)?;
            }
        }
        Command::Debug { launch, .. } => {
            let outcome = match &launch.command {
                Some(name) => session.debug_command(name, launch.args_text().as_deref())?,
                None => {
                    activate_for_picker(&mut session)?;
                    session.debug()?
                }
            };
            report(&outcome);
        }
    }
    Ok(())
}

/// Activation errors are fatal here since the picker would have nothing to run.
fn activate_for_picker(session: &mut Session) -> Result<()> {
    session.activate()?;
    if session.list().is_empty() {
        tracing::warn!("no management commands found; try `django-commands reload`");
    }
    Ok(())
}

fn report(outcome: &Outcome) -> bool {
    match outcome {
        Outcome::Dispatched(request) => {
            tracing::debug!(command = %request.command, "dispatched");
            true
        }
        Outcome::Cancelled => {
            tracing::debug!("cancelled");
            false
        }
    }
}

fn print_catalog(catalog: &Catalog) {
    for (group, commands) in catalog.groups() {
        println!("[{group}]");
        for command in commands {
            println!("    {command}");
        }
    }
}
