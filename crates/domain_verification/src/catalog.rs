//! Verification step catalog

use serde::{Deserialize, Serialize};

use crate::error::VerificationError;

/// Kind of verification step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    DocumentIntake,
    TextExtraction,
    EntityExtraction,
    SpatialValidation,
    FieldVerification,
    TechnicalReview,
    RecommendationAnalysis,
    FinalApproval,
}

impl StepKind {
    /// Display name shown to reviewers
    pub fn display_name(self) -> &'static str {
        match self {
            StepKind::DocumentIntake => "Document Intake",
            StepKind::TextExtraction => "Text Extraction",
            StepKind::EntityExtraction => "Entity Extraction",
            StepKind::SpatialValidation => "Spatial Validation",
            StepKind::FieldVerification => "Field Verification",
            StepKind::TechnicalReview => "Technical Review",
            StepKind::RecommendationAnalysis => "Recommendation Analysis",
            StepKind::FinalApproval => "Final Approval",
        }
    }

    /// Whether the step is attested by a person rather than computed
    pub fn is_attested(self) -> bool {
        matches!(
            self,
            StepKind::FieldVerification | StepKind::TechnicalReview | StepKind::FinalApproval
        )
    }
}

/// Whether a step may be skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepRequirement {
    Required,
    Optional,
}

/// One entry of the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub kind: StepKind,
    pub requirement: StepRequirement,
}

impl StepDefinition {
    pub const fn required(kind: StepKind) -> Self {
        Self { kind, requirement: StepRequirement::Required }
    }

    pub const fn optional(kind: StepKind) -> Self {
        Self { kind, requirement: StepRequirement::Optional }
    }
}

/// Ordered list of steps every workflow walks through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCatalog {
    steps: Vec<StepDefinition>,
}

impl StepCatalog {
    /// The standard eight-step verification sequence
    pub fn standard() -> Self {
        Self {
            steps: vec![
                StepDefinition::required(StepKind::DocumentIntake),
                StepDefinition::required(StepKind::TextExtraction),
                StepDefinition::required(StepKind::EntityExtraction),
                StepDefinition::required(StepKind::SpatialValidation),
                StepDefinition::required(StepKind::FieldVerification),
                StepDefinition::required(StepKind::TechnicalReview),
                StepDefinition::optional(StepKind::RecommendationAnalysis),
                StepDefinition::required(StepKind::FinalApproval),
            ],
        }
    }

    /// Builds a custom catalog; it must be non-empty and list each kind once
    pub fn new(steps: Vec<StepDefinition>) -> Result<Self, VerificationError> {
        if steps.is_empty() {
            return Err(VerificationError::InvalidCatalog("catalog has no steps".to_string()));
        }
        for (i, step) in steps.iter().enumerate() {
            if steps[..i].iter().any(|s| s.kind == step.kind) {
                return Err(VerificationError::InvalidCatalog(format!(
                    "step '{}' listed twice",
                    step.kind.display_name()
                )));
            }
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for StepCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
