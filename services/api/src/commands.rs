use crate::infra::{DirectoryContext, PresetConfirmation, TerminalConfirmation};
use chrono::{Local, NaiveDate};
use clap::Args;
use position_ops::config::AppConfig;
use position_ops::domain::PositionCode;
use position_ops::error::AppError;
use position_ops::telemetry;
use position_ops::workflows::deactivation::{ConfirmationPrompt, SagaReport};
use position_ops::workflows::vacancy::{UnitCount, VacancySummary};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct VacancyScanArgs {
    /// Directory snapshot (defaults to APP_DIRECTORY_SNAPSHOT)
    #[arg(long)]
    pub(crate) snapshot: Option<PathBuf>,
    /// Employee group to include; repeat for several groups
    #[arg(long = "group", required = true)]
    pub(crate) groups: Vec<String>,
}

#[derive(Args, Debug)]
pub(crate) struct UnitCountsArgs {
    /// Directory snapshot (defaults to APP_DIRECTORY_SNAPSHOT)
    #[arg(long)]
    pub(crate) snapshot: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct DeactivateArgs {
    /// Directory snapshot (defaults to APP_DIRECTORY_SNAPSHOT)
    #[arg(long)]
    pub(crate) snapshot: Option<PathBuf>,
    /// Position to deactivate
    #[arg(long = "position")]
    pub(crate) positions: Vec<String>,
    /// Effective start date of the change (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) effective_date: Option<NaiveDate>,
    /// Answer yes to both confirmations
    #[arg(long)]
    pub(crate) yes: bool,
}

fn open_directory(snapshot: Option<PathBuf>) -> Result<DirectoryContext, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let path = config.pipeline.snapshot_or(snapshot)?;
    DirectoryContext::load(&path, config.pipeline)
}

pub(crate) async fn run_vacancy_scan(args: VacancyScanArgs) -> Result<(), AppError> {
    let context = open_directory(args.snapshot)?;
    let summary = context.scanner().scan(args.groups.as_slice()).await?;
    print!("{}", render_scan(&summary));
    Ok(())
}

pub(crate) async fn run_unit_counts(args: UnitCountsArgs) -> Result<(), AppError> {
    let context = open_directory(args.snapshot)?;
    let counts = context.aggregator().aggregate_counts().await?;
    print!("{}", render_unit_counts(&counts));
    Ok(())
}

pub(crate) async fn run_deactivation(args: DeactivateArgs) -> Result<(), AppError> {
    let DeactivateArgs {
        snapshot,
        positions,
        effective_date,
        yes,
    } = args;

    let context = open_directory(snapshot)?;
    let selection: Vec<PositionCode> = positions.into_iter().map(PositionCode::from).collect();
    let effective_date = effective_date.unwrap_or_else(|| Local::now().date_naive());

    let prompt: Arc<dyn ConfirmationPrompt> = if yes {
        Arc::new(PresetConfirmation::affirm_all())
    } else {
        Arc::new(TerminalConfirmation::stdio())
    };

    let report = context.saga(prompt).run(&selection, effective_date).await?;
    println!("{}", render_report(&report));
    Ok(())
}

pub(crate) fn render_scan(summary: &VacancySummary) -> String {
    let mut text = format!("{}\n{}\n", summary.positions_title(), summary.vacancy_title());
    for position in &summary.vacant {
        match &position.name {
            Some(name) => text.push_str(&format!("  {}  {}\n", position.code, name)),
            None => text.push_str(&format!("  {}\n", position.code)),
        }
    }
    if !summary.unresolved.is_empty() {
        text.push_str(&format!("Unresolved ({})\n", summary.unresolved.len()));
        for position in &summary.unresolved {
            text.push_str(&format!("  {}  {}\n", position.code, position.reason));
        }
    }
    text
}

pub(crate) fn render_unit_counts(counts: &[UnitCount]) -> String {
    let mut text = String::from("Business unit incumbents\n");
    for tally in counts {
        let count = tally
            .count
            .map(|count| count.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        text.push_str(&format!(
            "  {:<10} {:<30} {:>6}\n",
            tally.unit_code, tally.unit_label, count
        ));
    }
    text
}

fn render_report(report: &SagaReport) -> String {
    let phases: Vec<String> = report
        .trail
        .iter()
        .map(|phase| format!("{phase:?}"))
        .collect();
    format!("{}\n\nPhases: {}", report.render(), phases.join(" -> "))
}
