use async_trait::async_trait;
use chrono::NaiveDate;
use position_ops::directory::{
    BatchResponse, Collection, DirectorySnapshot, Filter, InMemoryDirectory, Page,
    PaginatedReader, QueryService, QueuedRead, ReadRequest, TransportError, UpsertOutcome,
    UpsertRequest,
};
use position_ops::domain::{EffectiveStatus, Position, PositionCode};
use position_ops::workflows::deactivation::{
    ConfirmationPrompt, DeactivationError, DeactivationSaga, ItemResult, LogAction, Prompt,
    PromptAction, PromptKind, SagaOutcome, SagaPhase, ValidationError,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

fn code(value: &str) -> PositionCode {
    PositionCode::from(value)
}

fn effective_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 1).expect("valid effective date")
}

fn position(value: &str, parent: Option<&str>) -> Position {
    Position {
        code: code(value),
        effective_start_date: NaiveDate::from_ymd_opt(2022, 1, 1).expect("valid start"),
        parent_position: parent.map(code),
        effective_status: EffectiveStatus::Active,
        employee_group: Some("E".to_string()),
        name: None,
    }
}

/// 1 manages 10; 10 manages 11 and 12; 20 has no reportees; 30 has a reportee but no manager.
fn org_chart() -> DirectorySnapshot {
    DirectorySnapshot {
        positions: vec![
            position("1", None),
            position("10", Some("1")),
            position("11", Some("10")),
            position("12", Some("10")),
            position("20", Some("1")),
            position("30", None),
            position("31", Some("30")),
        ],
        employment_records: Vec::new(),
        business_units: Vec::new(),
    }
}

struct ScriptedPrompt {
    answers: Mutex<VecDeque<PromptAction>>,
    asked: Mutex<Vec<Prompt>>,
}

impl ScriptedPrompt {
    fn answering(answers: impl IntoIterator<Item = PromptAction>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        })
    }

    fn asked(&self) -> Vec<Prompt> {
        self.asked.lock().expect("prompt log").clone()
    }
}

#[async_trait]
impl ConfirmationPrompt for ScriptedPrompt {
    async fn confirm(&self, prompt: &Prompt) -> PromptAction {
        self.asked.lock().expect("prompt log").push(prompt.clone());
        self.answers
            .lock()
            .expect("prompt answers")
            .pop_front()
            .unwrap_or(PromptAction::Decline)
    }
}

fn saga<S: QueryService + ?Sized>(
    directory: Arc<S>,
    prompt: Arc<ScriptedPrompt>,
) -> DeactivationSaga<S, ScriptedPrompt> {
    DeactivationSaga::new(directory, prompt, PaginatedReader::default())
}

fn parent_of(request: &UpsertRequest) -> Option<&str> {
    request
        .patch
        .pointer("/parentPosition/results/0/code")
        .and_then(|value| value.as_str())
}

#[tokio::test]
async fn position_without_reportees_is_deactivated_directly() {
    let directory = Arc::new(InMemoryDirectory::new(org_chart()));
    let prompt = ScriptedPrompt::answering([PromptAction::Affirm]);

    let report = saga(Arc::clone(&directory), Arc::clone(&prompt))
        .run(&[code("20")], effective_date())
        .await
        .expect("saga runs");

    assert!(report.is_success());
    assert!(report.entries.is_empty());
    assert_eq!(
        report.trail,
        vec![
            SagaPhase::Idle,
            SagaPhase::ConfirmingDeactivation,
            SagaPhase::DeactivatingDirect,
            SagaPhase::Done,
        ]
    );
    assert_eq!(
        report.render(),
        "Successfully deactivated the position 20"
    );

    let upserts = directory.upserts().await;
    assert_eq!(upserts.len(), 1);
    assert_eq!(upserts[0].patch["effectiveStatus"], "I");

    let asked = prompt.asked();
    assert_eq!(asked.len(), 1);
    assert_eq!(asked[0].title, "Confirmation...");
    assert_eq!(
        asked[0].message,
        "Are you sure you want to deactivate the position 20?"
    );

    let current = directory
        .current_position(&code("20"))
        .await
        .expect("position exists");
    assert_eq!(current.effective_status, EffectiveStatus::Inactive);
    assert_eq!(current.effective_start_date, effective_date());
}

#[tokio::test]
async fn reportees_move_to_the_manager_before_deactivation() {
    let directory = Arc::new(InMemoryDirectory::new(org_chart()));
    let prompt = ScriptedPrompt::answering([PromptAction::Affirm, PromptAction::Affirm]);

    let report = saga(Arc::clone(&directory), Arc::clone(&prompt))
        .run(&[code("10")], effective_date())
        .await
        .expect("saga runs");

    assert!(report.is_success());
    assert_eq!(report.manager, Some(code("1")));
    assert_eq!(report.reportees, vec![code("11"), code("12")]);
    assert_eq!(
        report.render(),
        "Manager updated for reportee position 11\n\
         Manager updated for reportee position 12\n\n\
         Successfully deactivated the position 10"
    );
    assert!(!report.trail.contains(&SagaPhase::RollingBack));

    let upserts = directory.upserts().await;
    assert_eq!(upserts.len(), 3);
    assert_eq!(parent_of(&upserts[0]), Some("1"));
    assert_eq!(parent_of(&upserts[1]), Some("1"));
    assert_eq!(upserts[2].entity.code, code("10"));

    let asked = prompt.asked();
    assert_eq!(asked[1].kind, PromptKind::Reassignment);
    assert!(asked[1].message.contains("11, 12"));

    let moved = directory
        .current_position(&code("11"))
        .await
        .expect("reportee exists");
    assert_eq!(moved.parent_position, Some(code("1")));
    assert_eq!(directory.position_history(&code("11")).await.len(), 2);
}

#[tokio::test]
async fn missing_manager_aborts_before_any_write() {
    let directory = Arc::new(InMemoryDirectory::new(org_chart()));
    let prompt = ScriptedPrompt::answering([PromptAction::Affirm, PromptAction::Affirm]);

    let err = saga(Arc::clone(&directory), Arc::clone(&prompt))
        .run(&[code("30")], effective_date())
        .await
        .expect_err("no manager to take the reportees");

    assert!(matches!(
        err,
        DeactivationError::Validation(ValidationError::ManagerUnresolved(ref position))
            if position == &code("30")
    ));
    assert!(directory.upserts().await.is_empty());
    assert_eq!(prompt.asked().len(), 1);
}

#[tokio::test]
async fn refused_deactivation_reverts_every_reportee_to_the_selected_position() {
    let directory = Arc::new(
        InMemoryDirectory::new(org_chart()).reject_upserts_for(code("10"), "Position is locked"),
    );
    let prompt = ScriptedPrompt::answering([PromptAction::Affirm, PromptAction::Affirm]);

    let report = saga(Arc::clone(&directory), prompt)
        .run(&[code("10")], effective_date())
        .await
        .expect("saga runs");

    assert!(!report.is_success());
    assert_eq!(
        report.outcome,
        SagaOutcome::DeactivationFailed {
            message: "Position is locked".to_string()
        }
    );
    assert_eq!(
        report.trail,
        vec![
            SagaPhase::Idle,
            SagaPhase::ConfirmingDeactivation,
            SagaPhase::FetchingManager,
            SagaPhase::ConfirmingReassignment,
            SagaPhase::ReassigningReportees,
            SagaPhase::DeactivatingPosition,
            SagaPhase::RollingBack,
            SagaPhase::Done,
        ]
    );

    let reverts: Vec<_> = report.entries_for(LogAction::Revert).collect();
    assert_eq!(reverts.len(), 2);
    assert!(reverts.iter().all(|entry| entry.result == ItemResult::Applied));
    assert_eq!(
        report.render(),
        "Position 10 deactivation failed.\nPosition is locked\n\n\
         Manager reverted for reportee position 11\n\
         Manager reverted for reportee position 12"
    );

    let upserts = directory.upserts().await;
    assert_eq!(upserts.len(), 5);
    assert_eq!(parent_of(&upserts[3]), Some("10"));
    assert_eq!(parent_of(&upserts[4]), Some("10"));
    assert_eq!(
        upserts[3].patch["comment"],
        "Manager reverted after failed deactivation of 10"
    );

    for reportee in ["11", "12"] {
        let current = directory
            .current_position(&code(reportee))
            .await
            .expect("reportee exists");
        assert_eq!(current.parent_position, Some(code("10")));
    }
}

/// Delegates to a directory but drops every deactivation request on the floor.
struct UnreachableDeactivation {
    inner: InMemoryDirectory,
}

#[async_trait]
impl QueryService for UnreachableDeactivation {
    async fn read(
        &self,
        collection: Collection,
        request: ReadRequest,
    ) -> Result<Page, TransportError> {
        self.inner.read(collection, request).await
    }

    async fn count(&self, collection: Collection, filter: Filter) -> Result<u64, TransportError> {
        self.inner.count(collection, filter).await
    }

    async fn submit_batch(
        &self,
        group_id: &str,
        reads: Vec<QueuedRead>,
    ) -> Result<BatchResponse, TransportError> {
        self.inner.submit_batch(group_id, reads).await
    }

    async fn upsert(&self, request: UpsertRequest) -> Result<UpsertOutcome, TransportError> {
        if request.patch.get("effectiveStatus").is_some() {
            return Err(TransportError::Unavailable("connection reset".to_string()));
        }
        self.inner.upsert(request).await
    }
}

#[tokio::test]
async fn transport_failure_on_deactivation_also_compensates() {
    let directory = Arc::new(UnreachableDeactivation {
        inner: InMemoryDirectory::new(org_chart()),
    });
    let prompt = ScriptedPrompt::answering([PromptAction::Affirm, PromptAction::Affirm]);

    let report = saga(Arc::clone(&directory), prompt)
        .run(&[code("10")], effective_date())
        .await
        .expect("saga runs");

    match &report.outcome {
        SagaOutcome::DeactivationFailed { message } => {
            assert!(message.contains("connection reset"))
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(report.entries_for(LogAction::Revert).count(), 2);

    let restored = directory
        .inner
        .current_position(&code("12"))
        .await
        .expect("reportee exists");
    assert_eq!(restored.parent_position, Some(code("10")));
}

#[tokio::test]
async fn declining_either_prompt_writes_nothing() {
    for (answers, gate) in [
        (vec![PromptAction::Decline], PromptKind::Deactivation),
        (
            vec![PromptAction::Affirm, PromptAction::Decline],
            PromptKind::Reassignment,
        ),
    ] {
        let directory = Arc::new(InMemoryDirectory::new(org_chart()));
        let prompt = ScriptedPrompt::answering(answers.clone());

        let report = saga(Arc::clone(&directory), Arc::clone(&prompt))
            .run(&[code("10")], effective_date())
            .await
            .expect("saga runs");

        assert_eq!(report.outcome, SagaOutcome::Cancelled { at: gate });
        assert_eq!(report.trail.last(), Some(&SagaPhase::Done));
        assert!(directory.upserts().await.is_empty());
        assert_eq!(prompt.asked().len(), answers.len());
    }
}

#[tokio::test]
async fn selection_must_name_exactly_one_position() {
    let directory = Arc::new(InMemoryDirectory::new(org_chart()));
    let prompt = ScriptedPrompt::answering([PromptAction::Affirm]);
    let runner = saga(Arc::clone(&directory), Arc::clone(&prompt));

    let none = runner
        .run(&[], effective_date())
        .await
        .expect_err("nothing selected");
    let many = runner
        .run(&[code("10"), code("20")], effective_date())
        .await
        .expect_err("two selected");

    assert!(matches!(
        none,
        DeactivationError::Validation(ValidationError::NoPositionSelected)
    ));
    assert!(matches!(
        many,
        DeactivationError::Validation(ValidationError::MultiplePositionsSelected(2))
    ));
    assert_ne!(none.to_string(), many.to_string());
    assert!(prompt.asked().is_empty());
    assert!(directory.upserts().await.is_empty());
}

#[tokio::test]
async fn failed_reassignment_does_not_stop_the_run() {
    let directory = Arc::new(
        InMemoryDirectory::new(org_chart()).reject_upserts_for(code("11"), "Reportee is locked"),
    );
    let prompt = ScriptedPrompt::answering([PromptAction::Affirm, PromptAction::Affirm]);

    let report = saga(Arc::clone(&directory), prompt)
        .run(&[code("10")], effective_date())
        .await
        .expect("saga runs");

    assert!(report.is_success());
    let lines: Vec<String> = report
        .entries_for(LogAction::Reassign)
        .map(|entry| entry.line())
        .collect();
    assert_eq!(
        lines,
        vec![
            "Manager update failed for position 11: Reportee is locked".to_string(),
            "Manager updated for reportee position 12".to_string(),
        ]
    );
    assert_eq!(directory.upserts().await.len(), 3);
}

#[tokio::test]
async fn second_run_on_a_deactivated_position_fails() {
    let directory = Arc::new(InMemoryDirectory::new(org_chart()));

    let first = saga(
        Arc::clone(&directory),
        ScriptedPrompt::answering([PromptAction::Affirm]),
    )
    .run(&[code("20")], effective_date())
    .await
    .expect("first run");
    let second = saga(
        Arc::clone(&directory),
        ScriptedPrompt::answering([PromptAction::Affirm]),
    )
    .run(&[code("20")], effective_date())
    .await
    .expect("second run");

    assert!(first.is_success());
    assert!(!second.is_success());
    assert!(second.render().contains("already inactive"));
}
