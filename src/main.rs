//! Stackplan CLI entrypoint.
//!
//! This is the main entrypoint for the stackplan command-line tool.

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use stackplan::backend::LocalBackend;
use stackplan::cli::{
    ChangeSetCommands, ChangeSetPrinter, Cli, Commands, EXIT_FAILURE, EXIT_SUCCESS,
    OutputFormatter, TerminalConfirmer, exit_status, update_exit_status,
};
use stackplan::config::{ConfigParser, ConfigValidator, ProjectConfig, find_config_file};
use stackplan::error::Result;
use stackplan::planner::{ChangeSetPresenter, Confirm, Plan, StackAction, StackActions};
use stackplan::stack::StackGraph;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.debug);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(status) => ExitCode::from(status),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over `--debug` when set.
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<u8> {
    let formatter = OutputFormatter::new(cli.output);
    let config = cli.config.as_ref();

    match cli.command {
        Commands::Validate { warnings } => cmd_validate(config, warnings, &formatter),
        Commands::Plan { path } => cmd_plan(config, &path, &formatter),
        Commands::Launch { path, yes } => cmd_launch(config, &path, yes, &formatter).await,
        Commands::Update {
            path,
            change_set,
            verbose,
            yes,
        } => {
            if change_set {
                cmd_update_with_change_sets(config, &path, verbose, yes, &formatter).await
            } else {
                cmd_update(config, &path, yes, &formatter).await
            }
        }
        Commands::Status { path } => cmd_status(config, &path, &formatter).await,
        Commands::ChangeSet { command } => cmd_change_set(config, command, &formatter).await,
    }
}

/// Validate configuration.
fn cmd_validate(config_path: Option<&PathBuf>, show_warnings: bool, formatter: &OutputFormatter) -> Result<u8> {
    let config = load_config(config_path)?;
    let result = ConfigValidator::new().with_template_check(true).check(&config);

    println!("{}", formatter.format_validation(&config, &result, show_warnings));
    if !result.is_valid() {
        return Ok(exit_code(false));
    }

    // The graph catches what the validator leaves to construction
    StackGraph::from_config(&config)?;
    Ok(exit_code(true))
}

/// Show the launch order of a target.
fn cmd_plan(config_path: Option<&PathBuf>, path: &str, formatter: &OutputFormatter) -> Result<u8> {
    let plan = load_project(config_path)?.plan(path);
    let batches = plan.launch_order()?;

    println!("{}", formatter.format_launch_order(path, batches));
    Ok(exit_code(true))
}

/// Launch stacks.
async fn cmd_launch(config_path: Option<&PathBuf>, path: &str, yes: bool, formatter: &OutputFormatter) -> Result<u8> {
    let plan = load_project(config_path)?.plan(path);
    plan.launch_order()?;

    if !TerminalConfirmer::new().confirm("launch", yes, path)? {
        eprintln!("Launch cancelled.");
        return Ok(EXIT_FAILURE);
    }

    let result = plan.launch().await?;
    println!("{}", formatter.format_results("launch", &result));
    Ok(exit_status(&result))
}

/// Update stacks directly.
async fn cmd_update(config_path: Option<&PathBuf>, path: &str, yes: bool, formatter: &OutputFormatter) -> Result<u8> {
    let plan = load_project(config_path)?.plan(path);
    plan.launch_order()?;

    if !TerminalConfirmer::new().confirm("update", yes, path)? {
        eprintln!("Update cancelled.");
        return Ok(EXIT_FAILURE);
    }

    let result = plan.update().await?;
    println!("{}", formatter.format_results("update", &result));
    Ok(exit_status(&result))
}

/// Update stacks through change sets.
async fn cmd_update_with_change_sets(
    config_path: Option<&PathBuf>,
    path: &str,
    verbose: bool,
    yes: bool,
    formatter: &OutputFormatter,
) -> Result<u8> {
    let plan = load_project(config_path)?.plan(path);
    let printer = ChangeSetPrinter::new(io::stdout(), formatter.format(), verbose);

    let result = plan
        .update_with_change_sets(&TerminalConfirmer::new(), &printer, yes)
        .await;

    match &result {
        Ok(report) => println!("{}", formatter.format_update_report(report)),
        Err(e) => eprintln!("Error: {e}"),
    }
    Ok(update_exit_status(&result))
}

/// Show stack status.
async fn cmd_status(config_path: Option<&PathBuf>, path: &str, formatter: &OutputFormatter) -> Result<u8> {
    let plan = load_project(config_path)?.plan(path);
    let result = plan.status().await?;

    println!("{}", formatter.format_results("status", &result));
    Ok(exit_status(&result))
}

/// Run a single change-set action over a target.
async fn cmd_change_set(
    config_path: Option<&PathBuf>,
    command: ChangeSetCommands,
    formatter: &OutputFormatter,
) -> Result<u8> {
    let (path, action, yes, verbose) = match command {
        ChangeSetCommands::Create { path, name, yes } => (path, StackAction::CreateChangeSet(name), yes, false),
        ChangeSetCommands::Wait { path, name } => (path, StackAction::WaitForChangeSet(name), false, false),
        ChangeSetCommands::Describe { path, name, verbose } => {
            (path, StackAction::DescribeChangeSet(name), false, verbose)
        }
        ChangeSetCommands::Execute { path, name, yes } => (path, StackAction::ExecuteChangeSet(name), yes, false),
        ChangeSetCommands::Delete { path, name, yes } => (path, StackAction::DeleteChangeSet(name), yes, false),
    };

    let plan = load_project(config_path)?.plan(&path);
    plan.launch_order()?;

    if action.is_mutating() && !TerminalConfirmer::new().confirm(action.name(), yes, &path)? {
        eprintln!("{} cancelled.", action.name());
        return Ok(EXIT_FAILURE);
    }

    let result = plan.execute(&action).await?;

    if matches!(action, StackAction::DescribeChangeSet(_)) {
        let printer = ChangeSetPrinter::new(io::stdout(), formatter.format(), verbose);
        for (stack, outcome) in result.iter() {
            match outcome.description() {
                Some(description) => printer.present(stack, Some(description.status), Some(description)),
                None => eprintln!("{stack}: {outcome}"),
            }
        }
    } else {
        println!("{}", formatter.format_results(action.name(), &result));
    }

    Ok(exit_status(&result))
}

/// Everything a command needs to build plans.
struct Project {
    graph: Arc<StackGraph>,
    actions: StackActions,
}

impl Project {
    fn plan(&self, target: &str) -> Plan {
        Plan::new(target, Arc::clone(&self.graph), self.actions.clone())
    }
}

/// Loads configuration, builds the stack graph and opens the backend.
fn load_project(config_path: Option<&PathBuf>) -> Result<Project> {
    let config = load_config(config_path)?;
    ConfigValidator::new().validate(&config)?;

    let graph = StackGraph::from_config(&config)?;
    let state_dir = config.state_dir();
    info!(
        "Project {} with {} stacks, state in {}",
        config.project.name,
        graph.len(),
        state_dir.display()
    );

    let backend = LocalBackend::with_base_dir(state_dir);
    let actions = StackActions::new(Arc::new(backend))
        .with_wait_timeout(config.settings.change_set_timeout_secs.map(Duration::from_secs));

    Ok(Project {
        graph: Arc::new(graph),
        actions,
    })
}

/// Loads `.env` and the configuration file with environment overrides.
fn load_config(config_path: Option<&PathBuf>) -> Result<ProjectConfig> {
    let config_file = resolve_config_path(config_path)?;
    let parser = ConfigParser::new().with_base_path(config_file.parent().unwrap_or_else(|| Path::new(".")));
    parser.load_dotenv()?;
    parser.load_with_env(&config_file)
}

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |p| Ok(p.clone()))
}

/// Maps a success flag to an exit status.
const fn exit_code(success: bool) -> u8 {
    if success { EXIT_SUCCESS } else { EXIT_FAILURE }
}
