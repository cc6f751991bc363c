//! commit-gate - pre-commit quality gate for PHP projects.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commit_gate::cli::{self, Cli, Commands};
use commit_gate::process::SystemRunner;
use commit_gate::Error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Cli::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "commit_gate=debug"
    } else {
        "commit_gate=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(args: Cli) -> Result<(), Error> {
    let root = cli::current_root(&SystemRunner, args.root).await?;

    match args.command.unwrap_or(Commands::Run) {
        Commands::Run => cli::run::run(&root).await?,
        Commands::Install => cli::hooks::install(&root).await?,
        Commands::Uninstall => cli::hooks::uninstall(&root).await?,
        Commands::Files => cli::files::run(&root).await?,
        Commands::Config => cli::config::show(&root)?,
    }

    Ok(())
}
