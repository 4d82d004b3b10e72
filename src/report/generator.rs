//! Result report generation.
//!
//! This module renders a classification result the way the result
//! screen shows it: the result card, the explainability panel and the
//! mandatory disclaimers. Markdown is used for the terminal and for
//! exported reports; JSON is the raw result.

use crate::models::{AnalysisResult, Badge, Prediction};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Output format for rendered results.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

const BAR_WIDTH: usize = 30;

/// Generate a complete Markdown report for one result.
pub fn generate_markdown_report(result: &AnalysisResult) -> String {
    let mut output = String::new();

    output.push_str("# JRscan Analysis\n\n");
    output.push_str(&generate_result_card(result));
    output.push_str(&generate_explainability_section(result));
    output.push_str(&generate_footer());

    output
}

/// Generate the result card: banner, predicted type, badge, top 3.
fn generate_result_card(result: &AnalysisResult) -> String {
    let mut section = String::new();

    section.push_str("> ℹ️ Indicative result, not a substitute for medical advice.\n\n");

    section.push_str("## Predicted Type\n\n");
    section.push_str(&format!("**{}** · {}\n\n", result.main_label, result.badge()));

    if result.badge() == Badge::Uncertain {
        section.push_str(
            "> ⚠️ **Uncertain result:** the model's confidence is low. \
             Interpretation by a professional is essential.\n\n",
        );
    }

    if !result.top3.is_empty() {
        section.push_str("### Top 3 Predictions\n\n");
        section.push_str("```\n");
        let label_width = result
            .top3
            .iter()
            .map(|p| p.label.chars().count())
            .max()
            .unwrap_or(0);
        for (i, prediction) in result.top3.iter().enumerate() {
            section.push_str(&generate_prediction_line(prediction, label_width, i == 0));
        }
        section.push_str("```\n\n");
    }

    if let Some(ref all_classes) = result.all_classes {
        section.push_str("### All Classes\n\n");
        section.push_str("| Class | Probability |\n");
        section.push_str("|:---|:---:|\n");
        for prediction in all_classes {
            section.push_str(&format!(
                "| {} | {}% |\n",
                prediction.label,
                prediction.display_percentage()
            ));
        }
        section.push('\n');
    }

    section.push_str(&format!("*Analysis performed on {}*\n\n", result.formatted_time()));

    section
}

/// One line of the top-3 list.
fn generate_prediction_line(prediction: &Prediction, label_width: usize, is_main: bool) -> String {
    let pct = prediction.display_percentage();
    let marker = if is_main { '▶' } else { ' ' };
    format!(
        "{} {:<width$}  {}  {:>3}%\n",
        marker,
        prediction.label,
        confidence_bar(pct, BAR_WIDTH),
        pct,
        width = label_width
    )
}

/// Textual progress bar for a percentage.
pub fn confidence_bar(pct: u32, width: usize) -> String {
    let pct = pct.min(100) as usize;
    let filled = (pct * width + 50) / 100;
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}

/// Generate the summary, advice and interpretation guide.
fn generate_explainability_section(result: &AnalysisResult) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str(&result.summary);
    section.push_str("\n\n");

    if !result.advice.is_empty() {
        section.push_str("## Advice\n\n");
        for item in &result.advice {
            section.push_str(&format!("- 💡 {}\n", item));
        }
        section.push('\n');
    }

    section.push_str("<details>\n<summary>How to interpret these results?</summary>\n\n");
    section.push_str(INTERPRETATION_GUIDE);
    section.push_str("\n</details>\n\n");

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(
        "*JRscan is a research demonstration tool. It is not a medical device.*\n",
    );

    footer
}

/// Text of the one-time medical disclaimer.
pub fn render_disclaimer() -> String {
    let mut text = String::new();

    text.push_str("🛡️  Medical disclaimer\n\n");
    text.push_str(
        "This tool is a research demonstrator intended for educational and experimental\n\
         purposes. It is in no way a certified medical device.\n\n",
    );
    text.push_str("  • The results shown are algorithmic estimates, not diagnoses.\n");
    text.push_str("  • Always consult a qualified health professional for any medical question.\n");
    text.push_str("  • Do not make any medical decision based on this tool alone.\n");

    text
}

/// Generate a JSON report.
pub fn generate_json_report(result: &AnalysisResult) -> Result<String> {
    serde_json::to_string_pretty(result).map_err(Into::into)
}

/// Render a result in the requested format.
pub fn render(result: &AnalysisResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(generate_markdown_report(result)),
        OutputFormat::Json => generate_json_report(result),
    }
}

/// Write the report to a file (the "export report" action).
pub fn write_report(result: &AnalysisResult, format: OutputFormat, path: &Path) -> Result<()> {
    let content = render(result, format)?;

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report file: {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    Ok(())
}

const INTERPRETATION_GUIDE: &str = "\
The displayed percentage is the probability the AI model estimates for each tumor \
type. It is not a medical certainty.

A high score (> 70%) means the model is confident, but it never replaces the \
expertise of a radiologist or an oncologist.

A low score (< 50%) means the model hesitates between several types. In that case \
the result is marked as \"uncertain\" and a specialist consultation is strongly \
recommended.
";
