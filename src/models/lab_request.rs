use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Priority, RequestStatus};

/// A lab test request as held by the lab API.
///
/// Only `id`, `requestId`, `priority` and `status` are required on the wire.
/// Everything the result workflow fills in is nullable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabTestRequest {
    pub id: String,
    pub request_id: String,
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub test_id: Option<String>,
    pub priority: Priority,
    #[serde(default)]
    pub clinical_notes: Option<String>,
    pub status: RequestStatus,
    #[serde(default)]
    pub collection_location: Option<String>,
    #[serde(default)]
    pub collection_time_slot: Option<String>,
    #[serde(default)]
    pub is_sample_collected: bool,
    #[serde(default)]
    pub patient_verification: bool,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub result_value: Option<String>,
    #[serde(default)]
    pub result_unit: Option<String>,
    #[serde(default)]
    pub reference_range: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub ai_suggestion: Option<String>,
    #[serde(default)]
    pub pdf_link: Option<String>,
    #[serde(default)]
    pub result_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// `Some(trimmed)` when the field holds non-blank text.
pub fn present(field: &Option<String>) -> Option<&str> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl LabTestRequest {
    /// A fresh request with nothing recorded yet.
    pub fn new(id: &str, request_id: &str, priority: Priority, status: RequestStatus) -> Self {
        Self {
            id: id.to_string(),
            request_id: request_id.to_string(),
            patient_id: None,
            test_id: None,
            priority,
            clinical_notes: None,
            status,
            collection_location: None,
            collection_time_slot: None,
            is_sample_collected: false,
            patient_verification: false,
            payment_method: None,
            is_paid: false,
            result_value: None,
            result_unit: None,
            reference_range: None,
            remarks: None,
            ai_suggestion: None,
            pdf_link: None,
            result_date: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// The recorded result, if all four fields are present.
    pub fn result_entry(&self) -> Option<ResultEntry> {
        Some(ResultEntry {
            result_value: present(&self.result_value)?.to_string(),
            result_unit: present(&self.result_unit)?.to_string(),
            reference_range: present(&self.reference_range)?.to_string(),
            remarks: present(&self.remarks)?.to_string(),
        })
    }

    pub fn has_result(&self) -> bool {
        self.result_entry().is_some()
    }

    pub fn ai_suggestion(&self) -> Option<&str> {
        present(&self.ai_suggestion)
    }

    pub fn pdf_link(&self) -> Option<&str> {
        present(&self.pdf_link)
    }

    pub fn is_urgent(&self) -> bool {
        self.priority == Priority::Urgent
    }
}

/// The four result fields, as sent by the result and AI-suggestion calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub result_value: String,
    pub result_unit: String,
    pub reference_range: String,
    pub remarks: String,
}
