//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for claims, documents, spatial links and
//! scheme recommendations. Fixtures are consistent and predictable.

use core_kernel::{DocumentId, UserId};
use domain_processing::{AnalysisResult, ExtractedEntity};
use domain_verification::{ClaimDocument, SchemeRecommendation, SpatialLink};

/// Fixture for claim documents
pub struct DocumentFixtures;

impl DocumentFixtures {
    /// Scan path of the n-th document of a claim
    pub fn scan_path(n: usize) -> String {
        format!("/scans/claim-docs/page-{n:03}.pdf")
    }

    /// A claim document pointing at the n-th scan
    pub fn document(n: usize) -> ClaimDocument {
        ClaimDocument::new(Self::scan_path(n), "pdf")
    }

    /// `count` documents with distinct scan paths
    pub fn documents(count: usize) -> Vec<ClaimDocument> {
        (0..count).map(Self::document).collect()
    }
}

/// Fixture for analysis output
pub struct AnalysisFixtures;

impl AnalysisFixtures {
    /// Analysis result with entities of the usual kinds
    pub fn patta_result() -> AnalysisResult {
        AnalysisResult {
            text: "Individual forest rights title, survey no. 112/4, 1.6 ha".to_string(),
            confidence: 0.88,
            entities: vec![
                Self::entity("survey_number", "112/4", 0.93),
                Self::entity("area_hectares", "1.6", 0.81),
            ],
        }
    }

    /// Analysis result without any recognised entity
    pub fn blank_result() -> AnalysisResult {
        AnalysisResult {
            text: String::new(),
            confidence: 0.12,
            entities: Vec::new(),
        }
    }

    pub fn entity(kind: &str, value: &str, confidence: f64) -> ExtractedEntity {
        ExtractedEntity {
            kind: kind.to_string(),
            value: value.to_string(),
            confidence,
        }
    }
}

/// Fixture for spatial linkage answers
pub struct SpatialFixtures;

impl SpatialFixtures {
    /// Village and district matched with high confidence
    pub fn resolved() -> SpatialLink {
        SpatialLink {
            village: Some("Barkagaon".to_string()),
            district: Some("Hazaribagh".to_string()),
            state: Some("Jharkhand".to_string()),
            confidence: 0.92,
        }
    }

    /// District matched below the default minimum confidence
    pub fn low_confidence() -> SpatialLink {
        SpatialLink {
            village: None,
            district: Some("Hazaribagh".to_string()),
            state: Some("Jharkhand".to_string()),
            confidence: 0.35,
        }
    }

    /// Nothing matched
    pub fn unresolved() -> SpatialLink {
        SpatialLink {
            village: None,
            district: None,
            state: None,
            confidence: 0.0,
        }
    }
}

/// Fixture for scheme recommendations
pub struct RecommendationFixtures;

impl RecommendationFixtures {
    /// Recommendations in deliberately unsorted order
    pub fn schemes() -> Vec<SchemeRecommendation> {
        vec![
            Self::scheme("MGNREGA", "Rural Employment Guarantee", 0.64),
            Self::scheme("PMAY-G", "Rural Housing", 0.91),
            Self::scheme("PM-KISAN", "Farmer Income Support", 0.77),
        ]
    }

    pub fn scheme(code: &str, name: &str, score: f64) -> SchemeRecommendation {
        SchemeRecommendation {
            scheme_code: code.to_string(),
            scheme_name: name.to_string(),
            eligibility_score: score,
            rationale: None,
        }
    }
}

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    /// A reviewer acting on workflows
    pub fn reviewer() -> UserId {
        UserId::new_v7()
    }

    pub fn document_id() -> DocumentId {
        DocumentId::new_v7()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_have_distinct_paths() {
        let docs = DocumentFixtures::documents(3);
        assert_eq!(docs.len(), 3);
        assert_ne!(docs[0].file_path, docs[1].file_path);
        assert_ne!(docs[0].document_id, docs[1].document_id);
    }

    #[test]
    fn test_spatial_fixtures() {
        assert!(SpatialFixtures::resolved().is_resolved());
        assert!(SpatialFixtures::low_confidence().is_resolved());
        assert!(!SpatialFixtures::unresolved().is_resolved());
    }
}
