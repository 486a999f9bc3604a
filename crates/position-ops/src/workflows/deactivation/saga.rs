use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::payload::{self, REASSIGNMENT_COMMENT};
use super::prompt::{ConfirmationPrompt, Prompt, PromptAction, PromptKind};
use super::{DeactivationError, ValidationError};
use crate::directory::{
    Collection, Filter, PaginatedReader, QueryService, ReadRequest, UpsertRequest,
};
use crate::domain::{EffectiveStatus, Position, PositionCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaPhase {
    Idle,
    ConfirmingDeactivation,
    DeactivatingDirect,
    FetchingManager,
    ConfirmingReassignment,
    ReassigningReportees,
    DeactivatingPosition,
    RollingBack,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    Reassign,
    Revert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ItemResult {
    Applied,
    Failed(String),
}

/// Outcome of one reportee upsert, in the order it was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub reportee: PositionCode,
    pub action: LogAction,
    pub result: ItemResult,
}

impl LogEntry {
    pub fn is_applied(&self) -> bool {
        self.result == ItemResult::Applied
    }

    pub fn line(&self) -> String {
        match (&self.result, self.action) {
            (ItemResult::Applied, LogAction::Reassign) => {
                format!("Manager updated for reportee position {}", self.reportee)
            }
            (ItemResult::Applied, LogAction::Revert) => {
                format!("Manager reverted for reportee position {}", self.reportee)
            }
            (ItemResult::Failed(message), _) => {
                format!("Manager update failed for position {}: {message}", self.reportee)
            }
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SagaOutcome {
    /// Declined at a confirmation gate; nothing was written.
    Cancelled { at: PromptKind },
    Deactivated { message: String },
    DeactivationFailed { message: String },
}

/// Mutable record threaded through the phases of one saga run.
#[derive(Debug, Clone)]
pub struct SagaState {
    pub selected_position: PositionCode,
    pub reportees: Vec<PositionCode>,
    pub current_manager: Option<PositionCode>,
    pub effective_date: NaiveDate,
    pub reassignment_log: Vec<LogEntry>,
    pub phase: SagaPhase,
    trail: Vec<SagaPhase>,
}

impl SagaState {
    fn new(selected_position: PositionCode, effective_date: NaiveDate) -> Self {
        Self {
            selected_position,
            reportees: Vec::new(),
            current_manager: None,
            effective_date,
            reassignment_log: Vec::new(),
            phase: SagaPhase::Idle,
            trail: vec![SagaPhase::Idle],
        }
    }

    fn enter(&mut self, phase: SagaPhase) {
        debug!(position = %self.selected_position, ?phase, "saga phase");
        self.phase = phase;
        self.trail.push(phase);
    }

    pub fn trail(&self) -> &[SagaPhase] {
        &self.trail
    }

    fn finish(mut self, outcome: SagaOutcome) -> SagaReport {
        self.enter(SagaPhase::Done);
        SagaReport {
            position: self.selected_position,
            effective_date: self.effective_date,
            manager: self.current_manager,
            reportees: self.reportees,
            outcome,
            entries: self.reassignment_log,
            trail: self.trail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SagaReport {
    pub position: PositionCode,
    pub effective_date: NaiveDate,
    pub manager: Option<PositionCode>,
    pub reportees: Vec<PositionCode>,
    pub outcome: SagaOutcome,
    pub entries: Vec<LogEntry>,
    pub trail: Vec<SagaPhase>,
}

impl SagaReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SagaOutcome::Deactivated { .. })
    }

    pub fn entries_for(&self, action: LogAction) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |entry| entry.action == action)
    }

    /// Human-readable summary: item lines plus the terminal message.
    pub fn render(&self) -> String {
        match &self.outcome {
            SagaOutcome::Cancelled { .. } => {
                format!("Deactivation of position {} cancelled.", self.position)
            }
            SagaOutcome::Deactivated { .. } => {
                let mut text = String::new();
                for entry in self.entries_for(LogAction::Reassign) {
                    text.push_str(&entry.line());
                    text.push('\n');
                }
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&format!("Successfully deactivated the position {}", self.position));
                text
            }
            SagaOutcome::DeactivationFailed { message } => {
                let mut text = format!("Position {} deactivation failed.\n{message}", self.position);
                let reverts: Vec<String> = self
                    .entries_for(LogAction::Revert)
                    .map(LogEntry::line)
                    .collect();
                if !reverts.is_empty() {
                    text.push_str("\n\n");
                    text.push_str(&reverts.join("\n"));
                }
                text
            }
        }
    }
}

fn reportee_filter(position: &PositionCode) -> Filter {
    Filter::and([
        Filter::eq("parentPosition/code", position.as_str()),
        Filter::eq("effectiveStatus", EffectiveStatus::Active.code()),
    ])
}

fn manager_request(position: &PositionCode) -> ReadRequest {
    ReadRequest::filtered(Filter::and([
        Filter::eq("effectiveStatus", EffectiveStatus::Active.code()),
        Filter::eq("code", position.as_str()),
    ]))
    .expand("parentPosition")
}

fn reassignment_message(
    reportees: &[PositionCode],
    manager: &PositionCode,
    position: &PositionCode,
) -> String {
    let codes: Vec<&str> = reportees.iter().map(PositionCode::as_str).collect();
    format!(
        "Position {position} has {} reportee position(s): {}.\n\
         They will be assigned to manager position {manager} before {position} is deactivated.\n\n\
         If the deactivation fails, the reportees will be reverted to position {position}.",
        reportees.len(),
        codes.join(", "),
    )
}

/// Deactivates one position, moving its reportees up to its own manager first
/// and moving them back if the deactivation is refused.
///
/// Runs for the same position must be serialized by the caller.
pub struct DeactivationSaga<S: ?Sized, P: ?Sized> {
    service: Arc<S>,
    prompt: Arc<P>,
    reader: PaginatedReader,
}

impl<S, P> DeactivationSaga<S, P>
where
    S: QueryService + ?Sized,
    P: ConfirmationPrompt + ?Sized,
{
    pub fn new(service: Arc<S>, prompt: Arc<P>, reader: PaginatedReader) -> Self {
        Self {
            service,
            prompt,
            reader,
        }
    }

    pub async fn run(
        &self,
        selection: &[PositionCode],
        effective_date: NaiveDate,
    ) -> Result<SagaReport, DeactivationError> {
        let selected = match selection {
            [] => return Err(ValidationError::NoPositionSelected.into()),
            [single] => single.clone(),
            many => return Err(ValidationError::MultiplePositionsSelected(many.len()).into()),
        };

        let mut state = SagaState::new(selected, effective_date);

        state.enter(SagaPhase::ConfirmingDeactivation);
        let question = format!(
            "Are you sure you want to deactivate the position {}?",
            state.selected_position
        );
        if !self.confirm(PromptKind::Deactivation, question).await {
            info!(position = %state.selected_position, "deactivation declined");
            return Ok(state.finish(SagaOutcome::Cancelled {
                at: PromptKind::Deactivation,
            }));
        }

        state.reportees = self.fetch_reportees(&state.selected_position).await?;
        if state.reportees.is_empty() {
            state.enter(SagaPhase::DeactivatingDirect);
            let outcome = self.deactivate(&state).await;
            return Ok(state.finish(outcome));
        }

        state.enter(SagaPhase::FetchingManager);
        let manager = self.fetch_manager(&state.selected_position).await?;
        let Some(manager) = manager else {
            error!(position = %state.selected_position, "position with reportees has no manager");
            return Err(ValidationError::ManagerUnresolved(state.selected_position).into());
        };
        state.current_manager = Some(manager.clone());

        state.enter(SagaPhase::ConfirmingReassignment);
        let question =
            reassignment_message(&state.reportees, &manager, &state.selected_position);
        if !self.confirm(PromptKind::Reassignment, question).await {
            info!(position = %state.selected_position, "reassignment declined");
            return Ok(state.finish(SagaOutcome::Cancelled {
                at: PromptKind::Reassignment,
            }));
        }

        state.enter(SagaPhase::ReassigningReportees);
        for reportee in state.reportees.clone() {
            let request =
                payload::parent_change(&reportee, &manager, effective_date, REASSIGNMENT_COMMENT);
            let entry = self.apply(reportee, LogAction::Reassign, request).await;
            state.reassignment_log.push(entry);
        }

        state.enter(SagaPhase::DeactivatingPosition);
        let outcome = self.deactivate(&state).await;
        if matches!(outcome, SagaOutcome::DeactivationFailed { .. }) {
            state.enter(SagaPhase::RollingBack);
            self.compensate(&mut state).await;
        }

        Ok(state.finish(outcome))
    }

    async fn confirm(&self, kind: PromptKind, message: String) -> bool {
        let prompt = Prompt::confirmation(kind, message);
        self.prompt.confirm(&prompt).await == PromptAction::Affirm
    }

    async fn fetch_reportees(
        &self,
        position: &PositionCode,
    ) -> Result<Vec<PositionCode>, DeactivationError> {
        let request = ReadRequest::filtered(reportee_filter(position));
        let reportees: Vec<Position> = self
            .reader
            .read_all_as(self.service.as_ref(), Collection::Position, &request)
            .await?;
        debug!(%position, reportees = reportees.len(), "reportees fetched");
        Ok(reportees.into_iter().map(|reportee| reportee.code).collect())
    }

    async fn fetch_manager(
        &self,
        position: &PositionCode,
    ) -> Result<Option<PositionCode>, DeactivationError> {
        let page = self
            .service
            .read(Collection::Position, manager_request(position))
            .await?;
        let versions: Vec<Position> = page.decode(Collection::Position)?;
        Ok(versions
            .into_iter()
            .next()
            .and_then(|version| version.parent_position))
    }

    async fn apply(
        &self,
        reportee: PositionCode,
        action: LogAction,
        request: UpsertRequest,
    ) -> LogEntry {
        let result = match self.service.upsert(request).await {
            Ok(outcome) if outcome.is_ok() => ItemResult::Applied,
            Ok(outcome) => ItemResult::Failed(outcome.message),
            Err(err) => ItemResult::Failed(err.to_string()),
        };

        match &result {
            ItemResult::Applied => debug!(%reportee, ?action, "reportee updated"),
            ItemResult::Failed(message) => {
                warn!(%reportee, ?action, %message, "reportee update failed")
            }
        }
        LogEntry {
            reportee,
            action,
            result,
        }
    }

    async fn deactivate(&self, state: &SagaState) -> SagaOutcome {
        let position = &state.selected_position;
        let request = payload::deactivation(position, state.effective_date);
        match self.service.upsert(request).await {
            Ok(outcome) if outcome.is_ok() => {
                info!(%position, "position deactivated");
                SagaOutcome::Deactivated {
                    message: outcome.message,
                }
            }
            Ok(outcome) => {
                error!(%position, message = %outcome.message, "deactivation refused");
                SagaOutcome::DeactivationFailed {
                    message: outcome.message,
                }
            }
            Err(err) => {
                error!(%position, error = %err, "deactivation request failed");
                SagaOutcome::DeactivationFailed {
                    message: err.to_string(),
                }
            }
        }
    }

    /// Points every reportee back at the selected position, whatever its manager was before.
    async fn compensate(&self, state: &mut SagaState) {
        let comment = payload::revert_comment(&state.selected_position);
        for reportee in state.reportees.clone() {
            let request = payload::parent_change(
                &reportee,
                &state.selected_position,
                state.effective_date,
                &comment,
            );
            let entry = self.apply(reportee, LogAction::Revert, request).await;
            state.reassignment_log.push(entry);
        }
        warn!(
            position = %state.selected_position,
            reverted = state
                .reassignment_log
                .iter()
                .filter(|entry| entry.action == LogAction::Revert && entry.is_applied())
                .count(),
            "reportees reverted after failed deactivation"
        );
    }
}
