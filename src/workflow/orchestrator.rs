//! Sole owner of the stage pointer.
//!
//! Stages only report success; the orchestrator decides whether that moves
//! the workflow forward. The stage never decreases and never skips.

use std::sync::{Mutex, PoisonError, RwLock};

use super::{
    infer_stage, progress, AiSuggestionStage, AiSuggestionView, CompletionStage, CompletionView,
    FieldErrors, Progress, ResultEntryStage, ResultField, ResultForm, Stage, StageBanner,
    WorkflowContext, WorkflowError,
};
use crate::models::LabTestRequest;

pub struct Orchestrator {
    ctx: WorkflowContext,
    stage: RwLock<Stage>,
    form: Mutex<ResultForm>,
    field_errors: Mutex<FieldErrors>,
    result_entry: ResultEntryStage,
    ai_suggestion: AiSuggestionStage,
    completion: CompletionStage,
}

impl Orchestrator {
    /// Start at result entry regardless of what the record already holds.
    pub fn new(ctx: WorkflowContext) -> Self {
        Self::at(ctx, Stage::ResultEntry, ResultForm::default())
    }

    /// Fetch the record and start wherever it stands, with the form
    /// prefilled from any result already recorded.
    pub fn resume(ctx: WorkflowContext) -> Result<Self, WorkflowError> {
        let record = ctx.record()?;
        let stage = infer_stage(&record);
        tracing::info!(request_id = %ctx.request_id(), %stage, "Resuming workflow");
        Ok(Self::at(ctx, stage, ResultForm::from_record(&record)))
    }

    fn at(ctx: WorkflowContext, stage: Stage, form: ResultForm) -> Self {
        Self {
            ctx,
            stage: RwLock::new(stage),
            form: Mutex::new(form),
            field_errors: Mutex::new(FieldErrors::default()),
            result_entry: ResultEntryStage::new(),
            ai_suggestion: AiSuggestionStage::new(),
            completion: CompletionStage::new(),
        }
    }

    pub fn context(&self) -> &WorkflowContext {
        &self.ctx
    }

    pub fn stage(&self) -> Stage {
        *self.stage.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn progress(&self) -> Progress {
        progress(self.stage())
    }

    pub fn banner(&self) -> StageBanner {
        StageBanner::from(self.stage())
    }

    /// The record behind the workflow, through the shared cache.
    pub fn record(&self) -> Result<LabTestRequest, WorkflowError> {
        self.ctx.record()
    }

    // ─── Stage 1 ────────────────────────────────────────────

    pub fn set_field(&self, field: ResultField, value: impl Into<String>) {
        self.form
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set(field, value);
    }

    pub fn form(&self) -> ResultForm {
        self.form
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Inline errors from the last submit attempt.
    pub fn field_errors(&self) -> FieldErrors {
        self.field_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Submit the form; on success the workflow moves to the AI stage.
    ///
    /// The trigger stays claimed until the stage has advanced, so a second
    /// submit either finds it busy or finds the workflow already past
    /// result entry. `Ok(None)` means the result was saved but could not be
    /// reloaded.
    pub fn submit_result(&self) -> Result<Option<LabTestRequest>, WorkflowError> {
        self.require(Stage::ResultEntry)?;

        let validated = self.form().validate();
        *self
            .field_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = validated.clone().err().unwrap_or_default();
        let entry = validated.map_err(WorkflowError::Validation)?;

        let _permit = self.result_entry.begin()?;
        self.require(Stage::ResultEntry)?;
        let record = self.result_entry.send(&self.ctx, &entry)?;
        self.advance(Stage::ResultEntry)?;
        Ok(record)
    }

    // ─── Stage 2 ────────────────────────────────────────────

    pub fn ai_view(&self) -> Result<AiSuggestionView, WorkflowError> {
        self.require(Stage::AiSuggestion)?;
        self.ai_suggestion.view(&self.ctx)
    }

    pub fn request_ai_suggestion(&self) -> Result<AiSuggestionView, WorkflowError> {
        self.require(Stage::AiSuggestion)?;
        self.ai_suggestion.trigger(&self.ctx)
    }

    /// Move on to completion once a suggestion is on the record.
    pub fn continue_to_completion(&self) -> Result<(), WorkflowError> {
        self.require(Stage::AiSuggestion)?;
        if !self.ai_suggestion.can_continue(&self.ctx)? {
            return Err(WorkflowError::SuggestionMissing);
        }
        self.advance(Stage::AiSuggestion)
    }

    // ─── Stage 3 ────────────────────────────────────────────

    pub fn completion_view(&self) -> Result<CompletionView, WorkflowError> {
        self.require(Stage::Completion)?;
        self.completion.view(&self.ctx)
    }

    pub fn finalize(&self) -> Result<CompletionView, WorkflowError> {
        self.require(Stage::Completion)?;
        self.completion.finalize(&self.ctx)
    }

    /// At the last stage with a report link on the record.
    ///
    /// Reads the cached record only; nothing is fetched.
    pub fn is_terminal(&self) -> bool {
        self.stage() == Stage::Completion
            && self
                .ctx
                .cache()
                .get(self.ctx.request_id())
                .is_some_and(|record| record.pdf_link().is_some())
    }

    fn require(&self, expected: Stage) -> Result<(), WorkflowError> {
        let current = self.stage();
        if current == expected {
            Ok(())
        } else {
            tracing::debug!(%expected, %current, "Operation refused in current stage");
            Err(WorkflowError::WrongStage { expected, current })
        }
    }

    /// Step forward from `from`. Only the stage that just succeeded may move
    /// the pointer, and only by one.
    fn advance(&self, from: Stage) -> Result<(), WorkflowError> {
        let mut stage = self.stage.write().unwrap_or_else(PoisonError::into_inner);
        if *stage != from {
            return Err(WorkflowError::WrongStage {
                expected: from,
                current: *stage,
            });
        }
        if let Some(next) = from.next() {
            *stage = next;
            tracing::info!(request_id = %self.ctx.request_id(), stage = %next, "Workflow advanced");
        }
        Ok(())
    }
}
