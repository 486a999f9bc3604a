use async_trait::async_trait;
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use position_ops::config::PipelineConfig;
use position_ops::directory::{DirectorySnapshot, InMemoryDirectory};
use position_ops::error::AppError;
use position_ops::workflows::deactivation::{
    ConfirmationPrompt, DeactivationSaga, Prompt, PromptAction, PromptKind,
};
use position_ops::workflows::vacancy::{BusinessUnitAggregator, VacancyScanner};
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout,
};
use tokio::sync::Mutex;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Directory plus the pipeline settings every workflow is built from.
#[derive(Clone)]
pub(crate) struct DirectoryContext {
    pub(crate) directory: Arc<InMemoryDirectory>,
    pub(crate) pipeline: PipelineConfig,
    deactivations: Arc<Mutex<()>>,
}

impl DirectoryContext {
    pub(crate) fn new(directory: InMemoryDirectory, pipeline: PipelineConfig) -> Self {
        Self {
            directory: Arc::new(directory),
            pipeline,
            deactivations: Arc::new(Mutex::new(())),
        }
    }

    pub(crate) fn load(path: &Path, pipeline: PipelineConfig) -> Result<Self, AppError> {
        let snapshot = DirectorySnapshot::load(path)?;
        info!(
            path = %path.display(),
            positions = snapshot.positions.len(),
            employment_records = snapshot.employment_records.len(),
            business_units = snapshot.business_units.len(),
            "directory snapshot loaded"
        );
        Ok(Self::new(InMemoryDirectory::new(snapshot), pipeline))
    }

    pub(crate) fn scanner(&self) -> VacancyScanner<InMemoryDirectory> {
        VacancyScanner::new(
            Arc::clone(&self.directory),
            self.pipeline.reader(),
            self.pipeline.grouper(),
        )
    }

    pub(crate) fn aggregator(&self) -> BusinessUnitAggregator<InMemoryDirectory> {
        BusinessUnitAggregator::with_exclusions(
            Arc::clone(&self.directory),
            self.pipeline.reader(),
            self.pipeline.excluded_business_units.iter().cloned(),
        )
    }

    pub(crate) fn saga<P>(&self, prompt: Arc<P>) -> DeactivationSaga<InMemoryDirectory, P>
    where
        P: ConfirmationPrompt + ?Sized,
    {
        DeactivationSaga::new(Arc::clone(&self.directory), prompt, self.pipeline.reader())
    }

    /// Held for the duration of a saga run; runs never overlap.
    pub(crate) async fn deactivation_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.deactivations.lock().await
    }
}

/// Answers both confirmation gates up front, e.g. from an HTTP request body.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PresetConfirmation {
    pub(crate) deactivation: bool,
    pub(crate) reassignment: bool,
}

impl PresetConfirmation {
    pub(crate) fn affirm_all() -> Self {
        Self {
            deactivation: true,
            reassignment: true,
        }
    }
}

#[async_trait]
impl ConfirmationPrompt for PresetConfirmation {
    async fn confirm(&self, prompt: &Prompt) -> PromptAction {
        let affirmed = match prompt.kind {
            PromptKind::Deactivation => self.deactivation,
            PromptKind::Reassignment => self.reassignment,
        };
        if affirmed {
            PromptAction::Affirm
        } else {
            PromptAction::Decline
        }
    }
}

/// Asks on a terminal-like writer and waits for one answer line per prompt.
///
/// The reader lives as long as the prompt so buffered answers survive
/// between the two saga gates.
pub(crate) struct TerminalConfirmation<R, W> {
    input: Mutex<R>,
    output: Mutex<W>,
}

impl TerminalConfirmation<BufReader<Stdin>, Stdout> {
    pub(crate) fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> TerminalConfirmation<R, W> {
    pub(crate) fn new(input: R, output: W) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
        }
    }
}

#[async_trait]
impl<R, W> ConfirmationPrompt for TerminalConfirmation<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&self, prompt: &Prompt) -> PromptAction {
        let choices: Vec<String> = prompt
            .actions()
            .iter()
            .map(|action| {
                if *action == prompt.emphasized {
                    action.label().to_uppercase()
                } else {
                    action.label().to_string()
                }
            })
            .collect();
        let question = format!(
            "\n{}\n{}\n[{}] ",
            prompt.title,
            prompt.message,
            choices.join("/")
        );

        {
            let mut output = self.output.lock().await;
            if output.write_all(question.as_bytes()).await.is_err()
                || output.flush().await.is_err()
            {
                return PromptAction::Decline;
            }
        }

        let mut answer = String::new();
        match self.input.lock().await.read_line(&mut answer).await {
            Ok(_) => parse_answer(&answer),
            Err(_) => PromptAction::Decline,
        }
    }
}

pub(crate) fn parse_answer(raw: &str) -> PromptAction {
    match raw.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => PromptAction::Affirm,
        _ => PromptAction::Decline,
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn deserialize_optional_date<'de, D>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.map(|value| parse_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}
