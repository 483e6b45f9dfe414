use std::collections::BTreeMap;

use serde::Serialize;

use super::{InFlight, InFlightGuard, WorkflowContext, WorkflowError};
use crate::gateway::GatewayError;
use crate::models::{LabTestRequest, ResultEntry};

/// The four inputs of the result form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultField {
    ResultValue,
    ResultUnit,
    ReferenceRange,
    Remarks,
}

impl ResultField {
    pub const ALL: [ResultField; 4] = [
        ResultField::ResultValue,
        ResultField::ResultUnit,
        ResultField::ReferenceRange,
        ResultField::Remarks,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::ResultValue => "Result Value",
            Self::ResultUnit => "Result Unit",
            Self::ReferenceRange => "Reference Range",
            Self::Remarks => "Remarks",
        }
    }

    fn required_message(&self) -> &'static str {
        match self {
            Self::ResultValue => "Result value is required",
            Self::ResultUnit => "Result unit is required",
            Self::ReferenceRange => "Reference range is required",
            Self::Remarks => "Remarks are required",
        }
    }
}

/// Inline validation messages, keyed by the offending field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<ResultField, &'static str>);

impl FieldErrors {
    pub fn get(&self, field: ResultField) -> Option<&'static str> {
        self.0.get(&field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = ResultField> + '_ {
        self.0.keys().copied()
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<&str> = self.0.values().copied().collect();
        f.write_str(&messages.join("; "))
    }
}

/// Raw form state, exactly as typed. Values are trimmed only when validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultForm {
    pub result_value: String,
    pub result_unit: String,
    pub reference_range: String,
    pub remarks: String,
}

impl ResultForm {
    /// Prefill from whatever the record already holds.
    pub fn from_record(record: &LabTestRequest) -> Self {
        let text = |field: &Option<String>| field.clone().unwrap_or_default();
        Self {
            result_value: text(&record.result_value),
            result_unit: text(&record.result_unit),
            reference_range: text(&record.reference_range),
            remarks: text(&record.remarks),
        }
    }

    pub fn get(&self, field: ResultField) -> &str {
        match field {
            ResultField::ResultValue => &self.result_value,
            ResultField::ResultUnit => &self.result_unit,
            ResultField::ReferenceRange => &self.reference_range,
            ResultField::Remarks => &self.remarks,
        }
    }

    pub fn set(&mut self, field: ResultField, value: impl Into<String>) {
        let slot = match field {
            ResultField::ResultValue => &mut self.result_value,
            ResultField::ResultUnit => &mut self.result_unit,
            ResultField::ReferenceRange => &mut self.reference_range,
            ResultField::Remarks => &mut self.remarks,
        };
        *slot = value.into();
    }

    /// Every field is required; nothing else is checked because units and
    /// reference ranges differ per test.
    pub fn validate(&self) -> Result<ResultEntry, FieldErrors> {
        let mut errors = FieldErrors::default();
        for field in ResultField::ALL {
            if self.get(field).trim().is_empty() {
                errors.0.insert(field, field.required_message());
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ResultEntry {
            result_value: self.result_value.trim().to_string(),
            result_unit: self.result_unit.trim().to_string(),
            reference_range: self.reference_range.trim().to_string(),
            remarks: self.remarks.trim().to_string(),
        })
    }
}

/// Stage 1: record the result.
pub struct ResultEntryStage {
    trigger: InFlight,
}

impl ResultEntryStage {
    pub fn new() -> Self {
        Self {
            trigger: InFlight::new("Saving result"),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.trigger.is_pending()
    }

    /// Claim the submit trigger. Held for the whole call by whoever sends.
    pub(crate) fn begin(&self) -> Result<InFlightGuard<'_>, WorkflowError> {
        self.trigger.try_begin()
    }

    /// Send a validated entry. The caller holds the permit from `begin`.
    ///
    /// `Ok(None)` when the server saved the result but the record could not
    /// be reloaded.
    pub(crate) fn send(
        &self,
        ctx: &WorkflowContext,
        entry: &ResultEntry,
    ) -> Result<Option<LabTestRequest>, WorkflowError> {
        match ctx.gateway().submit_result(ctx.request_id(), entry) {
            Ok(record) => {
                ctx.mutation_succeeded();
                tracing::info!(request_id = %ctx.request_id(), "Result recorded");
                Ok(Some(record))
            }
            Err(err @ GatewayError::ReloadFailed(_)) => {
                ctx.saved_unconfirmed(&err);
                Ok(None)
            }
            Err(err) => Err(ctx.report(err, "Failed to save result")),
        }
    }

    /// Validate and submit the form.
    ///
    /// Validation failures make no call. The form is only borrowed, so the
    /// caller still holds every value for a retry after a failure.
    pub fn submit(
        &self,
        ctx: &WorkflowContext,
        form: &ResultForm,
    ) -> Result<Option<LabTestRequest>, WorkflowError> {
        let entry = form.validate().map_err(WorkflowError::Validation)?;
        let _permit = self.begin()?;
        self.send(ctx, &entry)
    }
}

impl Default for ResultEntryStage {
    fn default() -> Self {
        Self::new()
    }
}
