//! Lab-staff worklist: requests waiting in the lab and those already done.

use serde::Serialize;

use crate::cache::RecordCache;
use crate::gateway::GatewayError;
use crate::models::{LabTestRequest, Priority, RequestStatus};
use crate::notify::NoticeBoard;

/// Listing endpoints for the lab-staff screens.
pub trait WorklistSource: Send + Sync {
    fn list_sending_lab(&self) -> Result<Vec<LabTestRequest>, GatewayError>;
    fn list_completed(&self) -> Result<Vec<LabTestRequest>, GatewayError>;
}

/// Counters shown in the worklist header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorklistStats {
    pub total: usize,
    pub urgent: usize,
    pub completed: usize,
    /// Requests still sitting with the lab (`SENDING_LAB`).
    pub pending: usize,
}

pub fn summarize(requests: &[LabTestRequest]) -> WorklistStats {
    requests.iter().fold(
        WorklistStats {
            total: requests.len(),
            ..WorklistStats::default()
        },
        |mut stats, request| {
            if request.priority == Priority::Urgent {
                stats.urgent += 1;
            }
            match request.status {
                RequestStatus::Complete => stats.completed += 1,
                RequestStatus::SendingLab => stats.pending += 1,
                _ => {}
            }
            stats
        },
    )
}

/// A loaded list with its counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Worklist {
    pub requests: Vec<LabTestRequest>,
    pub stats: WorklistStats,
}

impl Worklist {
    fn from_requests(requests: Vec<LabTestRequest>) -> Self {
        let stats = summarize(&requests);
        Self { requests, stats }
    }

    /// Requests sent to the lab. Loaded records seed the shared cache so
    /// opening one skips the detail fetch.
    pub fn sending_lab(
        source: &dyn WorklistSource,
        cache: &RecordCache,
        notices: &NoticeBoard,
    ) -> Result<Self, GatewayError> {
        let requests = source
            .list_sending_lab()
            .inspect_err(|err| report(notices, err, "Failed to load lab requests"))?;
        for request in &requests {
            cache.put(request.clone());
        }
        tracing::debug!(count = requests.len(), "Worklist loaded");
        Ok(Self::from_requests(requests))
    }

    pub fn completed(
        source: &dyn WorklistSource,
        notices: &NoticeBoard,
    ) -> Result<Self, GatewayError> {
        let requests = source
            .list_completed()
            .inspect_err(|err| report(notices, err, "Failed to load completed requests"))?;
        Ok(Self::from_requests(requests))
    }
}

fn report(notices: &NoticeBoard, err: &GatewayError, context: &str) {
    tracing::warn!(error = %err, "{context}");
    notices.error(format!("{context}: {}", err.user_message()));
}
