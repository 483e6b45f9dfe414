use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::WorkflowError;
use crate::cache::RecordCache;
use crate::gateway::{GatewayError, RequestGateway};
use crate::models::{LabTestRequest, Priority, ResultEntry};
use crate::notify::NoticeBoard;

/// Everything a stage needs to work on one request: which id, how to reach
/// the server, the shared record cache and the notice board.
#[derive(Clone)]
pub struct WorkflowContext {
    request_id: String,
    gateway: Arc<dyn RequestGateway>,
    cache: Arc<RecordCache>,
    notices: Arc<NoticeBoard>,
}

impl WorkflowContext {
    pub fn new(request_id: &str, gateway: Arc<dyn RequestGateway>) -> Self {
        Self {
            request_id: request_id.to_string(),
            gateway,
            cache: Arc::new(RecordCache::new()),
            notices: Arc::new(NoticeBoard::new()),
        }
    }

    /// Share a cache with other screens.
    pub fn with_cache(mut self, cache: Arc<RecordCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Share a notice board with other screens.
    pub fn with_notices(mut self, notices: Arc<NoticeBoard>) -> Self {
        self.notices = notices;
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn gateway(&self) -> &dyn RequestGateway {
        self.gateway.as_ref()
    }

    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    /// The record, from cache or freshly fetched on a miss.
    pub fn record(&self) -> Result<LabTestRequest, WorkflowError> {
        if let Some(record) = self.cache.get(&self.request_id) {
            return Ok(record);
        }
        match self.gateway.fetch_request(&self.request_id) {
            Ok(record) => {
                self.cache.put(record.clone());
                Ok(record)
            }
            Err(err) => Err(self.report(err, "Failed to load test request details")),
        }
    }

    /// Called after a mutation succeeded: the next read refetches.
    pub(crate) fn mutation_succeeded(&self) {
        self.cache.invalidate(&self.request_id);
    }

    /// Log a gateway failure, post it as a notice and hand it back.
    pub(crate) fn report(&self, err: GatewayError, context: &str) -> WorkflowError {
        tracing::warn!(
            request_id = %self.request_id,
            error = %err,
            "{context}"
        );
        self.notices
            .error(format!("{context}: {}", err.user_message()));
        WorkflowError::Gateway(err)
    }

    /// The server applied a mutation but the record could not be read back.
    /// The write counts as done; the reload problem is reported on its own.
    pub(crate) fn saved_unconfirmed(&self, err: &GatewayError) {
        self.cache.invalidate(&self.request_id);
        tracing::warn!(request_id = %self.request_id, error = %err, "Saved without reload");
        self.notices.error(err.user_message());
    }

    /// Post a blocking precondition message and hand back the error.
    pub(crate) fn reject(&self, err: WorkflowError) -> WorkflowError {
        tracing::warn!(request_id = %self.request_id, error = %err, "Precondition failed");
        self.notices.error(err.to_string());
        err
    }
}

/// Read-only summary rendered above the AI and completion steps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSummary {
    pub request_id: String,
    pub priority: Priority,
    pub status: String,
    pub clinical_notes: Option<String>,
    pub is_sample_collected: bool,
    pub result: Option<ResultEntry>,
    pub result_date: Option<DateTime<Utc>>,
}

impl From<&LabTestRequest> for RequestSummary {
    fn from(record: &LabTestRequest) -> Self {
        Self {
            request_id: record.request_id.clone(),
            priority: record.priority,
            status: record.status.label(),
            clinical_notes: record.clinical_notes.clone(),
            is_sample_collected: record.is_sample_collected,
            result: record.result_entry(),
            result_date: record.result_date,
        }
    }
}
