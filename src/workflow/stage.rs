use serde::Serialize;

use crate::models::LabTestRequest;

/// One of the three sequential phases of the result workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ResultEntry,
    AiSuggestion,
    Completion,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::ResultEntry, Stage::AiSuggestion, Stage::Completion];

    /// 1-based position shown to the user.
    pub fn number(&self) -> u8 {
        match self {
            Self::ResultEntry => 1,
            Self::AiSuggestion => 2,
            Self::Completion => 3,
        }
    }

    pub fn next(&self) -> Option<Stage> {
        match self {
            Self::ResultEntry => Some(Self::AiSuggestion),
            Self::AiSuggestion => Some(Self::Completion),
            Self::Completion => None,
        }
    }

    /// Short label for the progress indicator.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ResultEntry => "Fill Result",
            Self::AiSuggestion => "AI Suggestion",
            Self::Completion => "Complete",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::ResultEntry => "Fill Result Details",
            Self::AiSuggestion => "AI Clinical Suggestion",
            Self::Completion => "Complete Request",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ResultEntry => {
                "Enter the laboratory test results with appropriate values, units, reference ranges, and clinical remarks."
            }
            Self::AiSuggestion => {
                "Get AI-powered insights and interpretations based on the test results and clinical context."
            }
            Self::Completion => {
                "Generate the final PDF report and send it to the patient to complete the test request process."
            }
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.number(), self.label())
    }
}

/// Where a fetched record stands in the workflow.
///
/// A suggestion or a report link means completion is next; all four result
/// fields without a suggestion means the AI step; anything less means the
/// result still has to be entered.
pub fn infer_stage(record: &LabTestRequest) -> Stage {
    if record.ai_suggestion().is_some() || record.pdf_link().is_some() {
        Stage::Completion
    } else if record.has_result() {
        Stage::AiSuggestion
    } else {
        Stage::ResultEntry
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Completed,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressStep {
    pub number: u8,
    pub label: &'static str,
    pub state: StepState,
}

/// Progress indicator: the three steps plus how far along the line is filled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub steps: Vec<ProgressStep>,
    pub fraction: f32,
}

pub fn progress(current: Stage) -> Progress {
    let steps = Stage::ALL
        .iter()
        .map(|stage| ProgressStep {
            number: stage.number(),
            label: stage.label(),
            state: match stage.cmp(&current) {
                std::cmp::Ordering::Less => StepState::Completed,
                std::cmp::Ordering::Equal => StepState::Current,
                std::cmp::Ordering::Greater => StepState::Upcoming,
            },
        })
        .collect();

    let last = (Stage::ALL.len() - 1) as f32;
    Progress {
        steps,
        fraction: f32::from(current.number() - 1) / last,
    }
}

/// Heading shown above the active stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageBanner {
    pub step: u8,
    pub title: &'static str,
    pub description: &'static str,
}

impl From<Stage> for StageBanner {
    fn from(stage: Stage) -> Self {
        Self {
            step: stage.number(),
            title: stage.title(),
            description: stage.description(),
        }
    }
}
