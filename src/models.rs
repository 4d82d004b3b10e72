//! Data models for classification results.
//!
//! This module contains the result shape returned by the prediction
//! service (and by the mock generator), plus the display helpers the
//! report renderer relies on.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single class prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Class name.
    pub label: String,
    /// Model confidence in [0, 1].
    pub confidence: f64,
    /// Optional display override for the percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

impl Prediction {
    /// Creates a prediction without a percentage override.
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
            percentage: None,
        }
    }

    /// Percentage shown to the user: the override when present, else the
    /// rounded confidence.
    pub fn display_percentage(&self) -> u32 {
        match self.percentage {
            Some(pct) => pct.round().clamp(0.0, 100.0) as u32,
            None => to_percent(self.confidence),
        }
    }
}

/// Outcome of one classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Unique identifier.
    pub id: String,
    /// ISO-8601 creation time.
    pub timestamp: String,
    /// Predicted class name.
    pub main_label: String,
    /// Confidence of the predicted class in [0, 1].
    pub main_confidence: f64,
    /// Optional display override for the main percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_percentage: Option<f64>,
    /// Top three predictions, highest first by convention.
    pub top3: Vec<Prediction>,
    /// Every class the model scored, when the service provides them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_classes: Option<Vec<Prediction>>,
    /// Set by the source when the top confidence is too low to rely on.
    pub is_uncertain: bool,
    /// Free-text explanation.
    pub summary: String,
    /// Ordered recommendations.
    pub advice: Vec<String>,
}

impl AnalysisResult {
    /// Percentage shown on the headline badge.
    pub fn main_display_percentage(&self) -> u32 {
        match self.main_percentage {
            Some(pct) => pct.round().clamp(0.0, 100.0) as u32,
            None => to_percent(self.main_confidence),
        }
    }

    /// Parsed creation time, if the timestamp is RFC 3339.
    pub fn analysed_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.timestamp).ok()
    }

    /// Creation time formatted for display (`dd/mm/YYYY HH:MM`), falling
    /// back to the raw timestamp.
    pub fn formatted_time(&self) -> String {
        self.analysed_at()
            .map(|t| t.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_else(|| self.timestamp.clone())
    }

    /// Badge shown next to the predicted label.
    pub fn badge(&self) -> Badge {
        if self.is_uncertain {
            Badge::Uncertain
        } else {
            Badge::Confident(self.main_display_percentage())
        }
    }
}

/// Headline badge of a result card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Confident(u32),
    Uncertain,
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Badge::Confident(pct) => write!(f, "{}%", pct),
            Badge::Uncertain => write!(f, "⚠️ Uncertain"),
        }
    }
}

fn to_percent(confidence: f64) -> u32 {
    (confidence * 100.0).round().clamp(0.0, 100.0) as u32
}
