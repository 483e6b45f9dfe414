use serde::Serialize;

use super::{InFlight, RequestSummary, WorkflowContext, WorkflowError};
use crate::gateway::GatewayError;

/// What stage 2 renders: the request summary, the suggestion once it
/// exists, and which controls are live.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiSuggestionView {
    pub summary: RequestSummary,
    pub suggestion: Option<String>,
    pub can_trigger: bool,
    pub can_continue: bool,
    pub pending: bool,
}

/// Stage 2: ask the server for an interpretation of the recorded result.
pub struct AiSuggestionStage {
    trigger: InFlight,
}

impl AiSuggestionStage {
    pub fn new() -> Self {
        Self {
            trigger: InFlight::new("Generating AI suggestion"),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.trigger.is_pending()
    }

    pub fn view(&self, ctx: &WorkflowContext) -> Result<AiSuggestionView, WorkflowError> {
        let record = ctx.record()?;
        let suggestion = record.ai_suggestion().map(str::to_string);
        let pending = self.is_pending();
        Ok(AiSuggestionView {
            summary: RequestSummary::from(&record),
            can_trigger: suggestion.is_none() && !pending,
            can_continue: suggestion.is_some(),
            suggestion,
            pending,
        })
    }

    /// Generate the suggestion.
    ///
    /// Once a suggestion exists the trigger is spent: the current view is
    /// returned without another call. The result fields must all be on the
    /// record first, otherwise nothing is sent.
    pub fn trigger(&self, ctx: &WorkflowContext) -> Result<AiSuggestionView, WorkflowError> {
        {
            let _permit = self.trigger.try_begin()?;

            let record = ctx.record()?;
            if record.ai_suggestion().is_some() {
                tracing::debug!(request_id = %ctx.request_id(), "Suggestion already present");
            } else {
                let entry = record
                    .result_entry()
                    .ok_or_else(|| ctx.reject(WorkflowError::IncompleteResult))?;

                match ctx.gateway().request_ai_suggestion(ctx.request_id(), &entry) {
                    Ok(_) => {
                        ctx.mutation_succeeded();
                        tracing::info!(request_id = %ctx.request_id(), "AI suggestion generated");
                    }
                    // Stored server-side; the view below reloads and reports on its own.
                    Err(GatewayError::ReloadFailed(_)) => ctx.mutation_succeeded(),
                    Err(err) => return Err(ctx.report(err, "Failed to generate AI suggestion")),
                }
            }
        }

        self.view(ctx)
    }

    pub fn can_continue(&self, ctx: &WorkflowContext) -> Result<bool, WorkflowError> {
        Ok(ctx.record()?.ai_suggestion().is_some())
    }
}

impl Default for AiSuggestionStage {
    fn default() -> Self {
        Self::new()
    }
}
