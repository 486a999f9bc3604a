use crate::commands::{
    run_deactivation, run_unit_counts, run_vacancy_scan, DeactivateArgs, UnitCountsArgs,
    VacancyScanArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use position_ops::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Position Operations",
    about = "Find vacant positions and deactivate positions with reportee reassignment",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Vacancy analysis over a directory snapshot
    Vacancy {
        #[command(subcommand)]
        command: VacancyCommand,
    },
    /// Deactivate one position, moving its reportees to its manager first
    Deactivate(DeactivateArgs),
}

#[derive(Subcommand, Debug)]
enum VacancyCommand {
    /// Classify active positions of the given employee groups
    Scan(VacancyScanArgs),
    /// Count active incumbents per business unit
    Units(UnitCountsArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Directory snapshot to serve (defaults to APP_DIRECTORY_SNAPSHOT)
    #[arg(long)]
    pub(crate) snapshot: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Vacancy {
            command: VacancyCommand::Scan(args),
        } => run_vacancy_scan(args).await,
        Command::Vacancy {
            command: VacancyCommand::Units(args),
        } => run_unit_counts(args).await,
        Command::Deactivate(args) => run_deactivation(args).await,
    }
}
