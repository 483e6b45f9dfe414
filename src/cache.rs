//! Per-id cache of fetched lab test requests.
//!
//! All three workflow stages read the same record through this cache.
//! Reads never mutate cached data; an entry is replaced only by a fresh
//! fetch and dropped only by `invalidate`, which the workflow calls after a
//! successful mutation.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::LabTestRequest;

#[derive(Default)]
pub struct RecordCache {
    records: RwLock<HashMap<String, LabTestRequest>>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<LabTestRequest> {
        self.records.read().ok()?.get(id).cloned()
    }

    pub fn put(&self, record: LabTestRequest) {
        if let Ok(mut records) = self.records.write() {
            records.insert(record.id.clone(), record);
        }
    }

    /// Drop the cached record so the next read refetches.
    pub fn invalidate(&self, id: &str) {
        if let Ok(mut records) = self.records.write() {
            if records.remove(id).is_some() {
                tracing::debug!(request_id = id, "Cached record invalidated");
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records
            .read()
            .map(|records| records.contains_key(id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
