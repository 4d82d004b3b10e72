//! Canned results for demos without a prediction service.

use super::{AnalysisError, Analyzer};
use crate::models::{AnalysisResult, Prediction};
use crate::upload::UploadedFile;
use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

/// How the mock picks its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Random,
    Fixed(usize),
}

/// Analyzer returning one of three fixed records.
#[derive(Debug, Clone)]
pub struct MockAnalyzer {
    selection: Selection,
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAnalyzer {
    /// Pick uniformly at random on every call.
    pub fn new() -> Self {
        Self {
            selection: Selection::Random,
        }
    }

    /// Always return the record at `index` (wrapped to the record count).
    pub fn fixed(index: usize) -> Self {
        Self {
            selection: Selection::Fixed(index),
        }
    }

    /// Produce a fresh copy of one canned record.
    pub fn generate(&self) -> AnalysisResult {
        let records = canned_results();
        let index = match self.selection {
            Selection::Random => random_index(records.len()),
            Selection::Fixed(index) => index % records.len(),
        };

        let now = Utc::now();
        AnalysisResult {
            id: format!("result-{}", now.timestamp_millis()),
            timestamp: now.to_rfc3339(),
            ..records[index].clone()
        }
    }
}

/// Uniform-enough draw in `0..len` for picking a demo record.
///
/// A v4 UUID carries 122 random bits; the version nibble sits in bits
/// 12..16 of the high word, so the top 48 bits of that word are all random.
fn random_index(len: usize) -> usize {
    let (high, _) = Uuid::new_v4().as_u64_pair();
    ((high >> 16) % len as u64) as usize
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn analyze(&self, file: &UploadedFile) -> Result<AnalysisResult, AnalysisError> {
        let result = self.generate();
        debug!("Mock analysis of {} -> {}", file.name, result.main_label);
        Ok(result)
    }
}

/// The three fixed records the mock draws from.
pub fn canned_results() -> Vec<AnalysisResult> {
    let common_advice = [
        "Consult a neuroradiologist for a professional interpretation.",
        "This result does not take your medical history into account.",
    ];

    vec![
        AnalysisResult {
            id: "result-001".to_string(),
            timestamp: String::new(),
            main_label: "Meningiome".to_string(),
            main_confidence: 0.62,
            main_percentage: None,
            top3: vec![
                Prediction::new("Meningiome", 0.62),
                Prediction::new("Gliome", 0.28),
                Prediction::new("Adenome hypophysaire", 0.10),
            ],
            all_classes: None,
            is_uncertain: false,
            summary: "The model estimates a 62% probability of a meningioma. This result is \
                      indicative and is not a medical diagnosis."
                .to_string(),
            advice: vec![
                common_advice[0].to_string(),
                common_advice[1].to_string(),
                "A complementary MRI may be needed to confirm.".to_string(),
            ],
        },
        AnalysisResult {
            id: "result-002".to_string(),
            timestamp: String::new(),
            main_label: "Gliome".to_string(),
            main_confidence: 0.85,
            main_percentage: None,
            top3: vec![
                Prediction::new("Gliome", 0.85),
                Prediction::new("Meningiome", 0.10),
                Prediction::new("Adenome hypophysaire", 0.05),
            ],
            all_classes: None,
            is_uncertain: false,
            summary: "The model estimates an 85% probability of a glioma. This result is \
                      indicative and is not a medical diagnosis."
                .to_string(),
            advice: vec![
                common_advice[0].to_string(),
                common_advice[1].to_string(),
                "Further examinations are recommended.".to_string(),
            ],
        },
        AnalysisResult {
            id: "result-003".to_string(),
            timestamp: String::new(),
            main_label: "Adenome hypophysaire".to_string(),
            main_confidence: 0.42,
            main_percentage: None,
            top3: vec![
                Prediction::new("Adenome hypophysaire", 0.42),
                Prediction::new("Meningiome", 0.35),
                Prediction::new("Gliome", 0.23),
            ],
            all_classes: None,
            is_uncertain: true,
            summary: "The model could not determine the tumor type with confidence. The highest \
                      probability is 42%, which is not enough for a reliable estimate."
                .to_string(),
            advice: vec![
                "The result is uncertain: consult a specialist without fail.".to_string(),
                "The image may need cropping or a higher resolution.".to_string(),
                "A complementary analysis by a professional is essential.".to_string(),
            ],
        },
    ]
}
