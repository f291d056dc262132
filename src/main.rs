use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::{Generator, generate};
use snaptrack::cli::{Cli, Commands};
use snaptrack::output::{self, Verbosity};
use snaptrack::{TrackerContext, commands};
use std::io;
use std::process;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "SNAPTRACK_LOG";

fn main() {
    if let Err(e) = run() {
        output::error(&format!("Error: {e:#}"));
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    output::set_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose));
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Completion { shell } => print_completions(shell, &mut Cli::command()),
        command => {
            let ctx = TrackerContext::new(cli.root, cli.config)?;
            dispatch(&ctx, command)?;
        }
    }

    Ok(())
}

fn dispatch(ctx: &TrackerContext, command: Commands) -> Result<()> {
    match command {
        Commands::Init => commands::init::execute(ctx),
        Commands::Status { short } => commands::status::execute(ctx, short),
        Commands::Save { message } => commands::save::execute(ctx, &message),
        Commands::List => commands::list::execute(ctx),
        Commands::Show { id } => commands::show::execute(ctx, &id),
        Commands::Restore { id, reconcile } => commands::restore::execute(ctx, &id, reconcile),
        Commands::Verify { id } => commands::verify::execute(ctx, &id),
        Commands::Autosave {
            enable,
            disable,
            interval,
        } => {
            let toggle = match (enable, disable) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            commands::autosave::execute(ctx, toggle, interval)
        }
        Commands::Watch => commands::watch::execute(ctx),
        Commands::Completion { shell } => {
            print_completions(shell, &mut Cli::command());
            Ok(())
        }
    }
}

/// Library diagnostics go to stderr; `SNAPTRACK_LOG` overrides the level.
fn init_tracing(verbose: bool) {
    let default = if verbose { "snaptrack=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn print_completions<G: Generator>(g: G, cmd: &mut clap::Command) {
    generate(g, cmd, cmd.get_name().to_string(), &mut io::stdout());
}
