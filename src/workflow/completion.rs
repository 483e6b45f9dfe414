use serde::Serialize;

use super::{InFlight, RequestSummary, WorkflowContext, WorkflowError};
use crate::gateway::GatewayError;

/// What stage 3 renders. Once `terminal` is set the workflow is over and the
/// report link is all that remains to show.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionView {
    pub summary: RequestSummary,
    pub ai_suggestion: Option<String>,
    pub pdf_link: Option<String>,
    pub can_trigger: bool,
    pub terminal: bool,
    pub pending: bool,
}

/// Stage 3: generate the report and close the request.
pub struct CompletionStage {
    trigger: InFlight,
}

impl CompletionStage {
    pub fn new() -> Self {
        Self {
            trigger: InFlight::new("Generating PDF"),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.trigger.is_pending()
    }

    pub fn view(&self, ctx: &WorkflowContext) -> Result<CompletionView, WorkflowError> {
        let record = ctx.record()?;
        let pdf_link = record.pdf_link().map(str::to_string);
        let pending = self.is_pending();
        Ok(CompletionView {
            summary: RequestSummary::from(&record),
            ai_suggestion: record.ai_suggestion().map(str::to_string),
            can_trigger: pdf_link.is_none() && !pending,
            terminal: pdf_link.is_some(),
            pdf_link,
            pending,
        })
    }

    /// Finalize the request. A record that already has a report link is
    /// returned as-is.
    pub fn finalize(&self, ctx: &WorkflowContext) -> Result<CompletionView, WorkflowError> {
        {
            let _permit = self.trigger.try_begin()?;

            let record = ctx.record()?;
            if record.pdf_link().is_none() {
                match ctx.gateway().finalize_request(ctx.request_id()) {
                    Ok(_) => {
                        ctx.mutation_succeeded();
                        ctx.notices().success("Test request completed successfully");
                        tracing::info!(request_id = %ctx.request_id(), "Request finalized");
                    }
                    Err(GatewayError::ReloadFailed(_)) => {
                        ctx.mutation_succeeded();
                        ctx.notices().success("Test request completed successfully");
                    }
                    Err(err) => return Err(ctx.report(err, "Failed to complete request")),
                }
            }
        }

        self.view(ctx)
    }
}

impl Default for CompletionStage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::gateway::{MockGateway, Operation, RequestGateway, MOCK_PDF_LINK};
    use crate::models::{LabTestRequest, Priority, RequestStatus};
    use crate::notify::NoticeLevel;

    fn suggested() -> LabTestRequest {
        let mut record =
            LabTestRequest::new("a1", "R-1001", Priority::Urgent, RequestStatus::SendingLab);
        record.result_value = Some("5.4".into());
        record.result_unit = Some("mg/dL".into());
        record.reference_range = Some("3.5-5.5".into());
        record.remarks = Some("Normal".into());
        record.ai_suggestion = Some("Values within normal range".into());
        record
    }

    fn setup(record: LabTestRequest) -> (Arc<MockGateway>, WorkflowContext) {
        let mock = Arc::new(MockGateway::new().with_record(record));
        let ctx = WorkflowContext::new("a1", Arc::clone(&mock) as Arc<dyn RequestGateway>);
        (mock, ctx)
    }

    #[test]
    fn finalize_exposes_link_and_is_terminal() {
        let (mock, ctx) = setup(suggested());
        let view = CompletionStage::new().finalize(&ctx).unwrap();
        assert_eq!(view.pdf_link.as_deref(), Some(MOCK_PDF_LINK));
        assert!(view.terminal);
        assert!(!view.can_trigger);
        assert_eq!(view.summary.status, "COMPLETE");
        assert_eq!(mock.calls(Operation::Finalize), 1);

        let notices = ctx.notices().active();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Success);
    }

    #[test]
    fn existing_link_is_not_regenerated() {
        let mut record = suggested();
        record.pdf_link = Some("https://reports.example/existing.pdf".into());
        let (mock, ctx) = setup(record);
        let view = CompletionStage::new().finalize(&ctx).unwrap();
        assert_eq!(
            view.pdf_link.as_deref(),
            Some("https://reports.example/existing.pdf")
        );
        assert_eq!(mock.calls(Operation::Finalize), 0);
    }

    #[test]
    fn completed_but_not_reloaded_still_shows_link() {
        let (mock, ctx) = setup(suggested());
        mock.fail_next(
            Operation::Finalize,
            GatewayError::ReloadFailed("Service unavailable: down".into()),
        );
        let view = CompletionStage::new().finalize(&ctx).unwrap();
        assert!(view.terminal);
        assert!(ctx.notices().errors().is_empty());
    }

    #[test]
    fn failure_leaves_trigger_enabled() {
        let (mock, ctx) = setup(suggested());
        mock.fail_next(Operation::Finalize, GatewayError::Unauthorized);
        let stage = CompletionStage::new();
        assert!(stage.finalize(&ctx).is_err());
        assert_eq!(
            ctx.notices().errors()[0].message,
            "Failed to complete request: Your session has expired. Please sign in again."
        );
        let view = stage.view(&ctx).unwrap();
        assert!(view.can_trigger);
        assert!(!view.terminal);
    }
}
