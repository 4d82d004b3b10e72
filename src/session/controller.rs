//! View-state controller for the upload → analysis → results lifecycle.
//!
//! The controller owns the selected file, the consent flag, the last
//! error and the last result. Every user action goes through one method
//! here; rendering code only reads the accessors.

use crate::analyzer::{AnalysisError, Analyzer};
use crate::models::AnalysisResult;
use crate::upload::{PreviewHandle, UploadPolicy, UploadedFile, ValidationError};
use std::fmt;
use tracing::{debug, info, warn};

/// Which screen the client is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// No file held.
    Upload,
    /// File held, no request in flight.
    Ready,
    /// Request in flight; consent and replace controls are disabled.
    Analyzing,
    /// A result is held.
    Results,
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewState::Upload => write!(f, "upload"),
            ViewState::Ready => write!(f, "ready"),
            ViewState::Analyzing => write!(f, "analyzing"),
            ViewState::Results => write!(f, "results"),
        }
    }
}

/// Owner of the analysis lifecycle.
pub struct ViewController {
    policy: UploadPolicy,
    state: ViewState,
    file: Option<UploadedFile>,
    preview: Option<PreviewHandle>,
    consent: bool,
    error: Option<String>,
    result: Option<AnalysisResult>,
}

impl Default for ViewController {
    fn default() -> Self {
        Self::new(UploadPolicy::default())
    }
}

impl ViewController {
    pub fn new(policy: UploadPolicy) -> Self {
        Self {
            policy,
            state: ViewState::Upload,
            file: None,
            preview: None,
            consent: false,
            error: None,
            result: None,
        }
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn file(&self) -> Option<&UploadedFile> {
        self.file.as_ref()
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    pub fn consent(&self) -> bool {
        self.consent
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    /// Whether the analyze control is enabled.
    pub fn can_analyze(&self) -> bool {
        self.file.is_some() && self.consent && self.state != ViewState::Analyzing
    }

    /// Select a new image.
    ///
    /// A rejected file leaves file and state untouched and surfaces the
    /// validation message. An accepted file replaces any held file (its
    /// preview is released and consent is reset). Ignored while a request
    /// is in flight, since the input is disabled then.
    pub fn select_file(&mut self, file: UploadedFile) -> Result<(), ValidationError> {
        if self.state == ViewState::Analyzing {
            debug!("Ignoring file selection while analyzing");
            return Ok(());
        }

        if let Err(e) = self.policy.validate(&file) {
            warn!("Rejected {}: {}", file.name, e);
            self.error = Some(e.to_string());
            return Err(e);
        }

        if self.file.is_some() {
            self.consent = false;
        }
        self.release_preview();

        self.preview = match PreviewHandle::create(&file) {
            Ok(preview) => Some(preview),
            Err(e) => {
                warn!("Preview unavailable for {}: {:#}", file.name, e);
                None
            }
        };

        info!("Selected {} ({})", file.name, file.size_label());
        self.file = Some(file);
        self.error = None;
        self.result = None;
        self.state = ViewState::Ready;
        Ok(())
    }

    /// Drop the held file and go back to the upload screen.
    pub fn replace(&mut self) {
        if self.state == ViewState::Analyzing {
            debug!("Ignoring replace while analyzing");
            return;
        }
        self.reset();
    }

    /// Start over after a result. Only active on the results screen.
    pub fn new_analysis(&mut self) {
        if self.state != ViewState::Results {
            debug!("New analysis inactive in state {}", self.state);
            return;
        }
        self.reset();
    }

    /// Flip the consent checkbox. Only active on the ready screen.
    pub fn toggle_consent(&mut self) {
        let next = !self.consent;
        self.set_consent(next);
    }

    /// Set the consent checkbox. Only active on the ready screen.
    pub fn set_consent(&mut self, consent: bool) {
        if self.state != ViewState::Ready {
            debug!("Consent control inactive in state {}", self.state);
            return;
        }
        self.consent = consent;
    }

    /// Hide the error banner.
    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Enter `analyzing` and hand out the file to send.
    ///
    /// Returns `None` without changing anything unless a file is held,
    /// consent is given and no request is in flight.
    pub fn begin_analysis(&mut self) -> Option<&UploadedFile> {
        if !self.can_analyze() {
            debug!(
                "Analyze is a no-op (file: {}, consent: {}, state: {})",
                self.file.is_some(),
                self.consent,
                self.state
            );
            return None;
        }

        self.error = None;
        self.result = None;
        self.state = ViewState::Analyzing;
        self.file.as_ref()
    }

    /// Record the outcome of the in-flight request.
    pub fn complete_analysis(&mut self, outcome: Result<AnalysisResult, AnalysisError>) {
        if self.state != ViewState::Analyzing {
            warn!("Discarding analysis outcome received in state {}", self.state);
            return;
        }

        match outcome {
            Ok(result) => {
                info!(
                    "Analysis complete: {} ({}%)",
                    result.main_label,
                    result.main_display_percentage()
                );
                self.result = Some(result);
                self.state = ViewState::Results;
            }
            Err(e) => {
                warn!("Analysis failed: {}", e);
                self.error = Some(e.user_message());
                self.state = ViewState::Ready;
            }
        }
    }

    /// Run one analysis cycle. Returns whether a request was issued.
    pub async fn analyze(&mut self, analyzer: &dyn Analyzer) -> bool {
        if self.begin_analysis().is_none() {
            return false;
        }

        let outcome = match self.file.as_ref() {
            Some(file) => {
                debug!("Sending {} to {} analyzer", file.name, analyzer.name());
                analyzer.analyze(file).await
            }
            None => return false,
        };

        self.complete_analysis(outcome);
        true
    }

    fn reset(&mut self) {
        self.release_preview();
        self.file = None;
        self.result = None;
        self.error = None;
        self.consent = false;
        self.state = ViewState::Upload;
    }

    fn release_preview(&mut self) {
        if let Some(preview) = self.preview.take() {
            preview.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{MockAnalyzer, FAILURE_MESSAGE};
    use crate::models::Prediction;
    use async_trait::async_trait;

    const MIB: usize = 1024 * 1024;

    struct CannedAnalyzer {
        outcome: Result<AnalysisResult, AnalysisError>,
    }

    #[async_trait]
    impl Analyzer for CannedAnalyzer {
        fn name(&self) -> &str {
            "canned"
        }

        async fn analyze(&self, _file: &UploadedFile) -> Result<AnalysisResult, AnalysisError> {
            self.outcome.clone()
        }
    }

    fn glioma() -> AnalysisResult {
        AnalysisResult {
            id: "result-1".to_string(),
            timestamp: "2026-10-18T09:30:00Z".to_string(),
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
            summary: "85% glioma.".to_string(),
            advice: vec![],
        }
    }

    fn png(size: usize) -> UploadedFile {
        UploadedFile::new("scan.png", "image/png", vec![0; size])
    }

    fn ready_with_consent() -> ViewController {
        let mut controller = ViewController::default();
        controller.select_file(png(1024)).unwrap();
        controller.set_consent(true);
        controller
    }

    #[test]
    fn test_valid_selection_enters_ready() {
        let mut controller = ViewController::default();
        assert_eq!(controller.state(), ViewState::Upload);

        controller.select_file(png(2 * MIB)).unwrap();
        assert_eq!(controller.state(), ViewState::Ready);
        assert_eq!(controller.file().map(|f| f.name.as_str()), Some("scan.png"));
        assert!(controller.error().is_none());
        assert!(!controller.consent());
    }

    #[test]
    fn test_unsupported_type_never_enters_ready() {
        let mut controller = ViewController::default();
        let gif = UploadedFile::new("anim.gif", "image/gif", vec![0; 64]);

        assert!(controller.select_file(gif).is_err());
        assert_eq!(controller.state(), ViewState::Upload);
        assert!(controller.file().is_none());
        assert!(controller.error().is_some());
    }

    #[test]
    fn test_oversized_jpeg_is_rejected_in_upload() {
        let mut controller = ViewController::default();
        let jpeg = UploadedFile::new("big.jpg", "image/jpeg", vec![0; 15 * MIB]);

        assert!(controller.select_file(jpeg).is_err());
        assert_eq!(controller.state(), ViewState::Upload);
        assert!(controller.error().unwrap().contains("10 MiB"));
    }

    #[test]
    fn test_rejection_keeps_previous_file() {
        let mut controller = ready_with_consent();
        let pdf = UploadedFile::new("doc.pdf", "application/pdf", vec![0; 64]);

        assert!(controller.select_file(pdf).is_err());
        assert_eq!(controller.state(), ViewState::Ready);
        assert_eq!(controller.file().map(|f| f.name.as_str()), Some("scan.png"));
        assert!(controller.consent());
    }

    #[test]
    fn test_valid_selection_clears_error() {
        let mut controller = ViewController::default();
        let _ = controller.select_file(UploadedFile::new("a.gif", "image/gif", vec![0; 8]));
        assert!(controller.error().is_some());

        controller.select_file(png(8)).unwrap();
        assert!(controller.error().is_none());
    }

    #[test]
    fn test_analyze_requires_consent() {
        let mut controller = ViewController::default();
        controller.select_file(png(1024)).unwrap();

        assert!(controller.begin_analysis().is_none());
        assert_eq!(controller.state(), ViewState::Ready);
    }

    #[test]
    fn test_analyze_requires_file() {
        let mut controller = ViewController::default();
        controller.set_consent(true);
        assert!(!controller.consent());
        assert!(controller.begin_analysis().is_none());
        assert_eq!(controller.state(), ViewState::Upload);
    }

    #[test]
    fn test_single_request_in_flight() {
        let mut controller = ready_with_consent();
        assert!(controller.begin_analysis().is_some());
        assert_eq!(controller.state(), ViewState::Analyzing);

        assert!(controller.begin_analysis().is_none());
        assert_eq!(controller.state(), ViewState::Analyzing);
    }

    #[test]
    fn test_controls_disabled_while_analyzing() {
        let mut controller = ready_with_consent();
        controller.begin_analysis();

        controller.toggle_consent();
        assert!(controller.consent());

        controller.replace();
        assert_eq!(controller.state(), ViewState::Analyzing);
        assert!(controller.file().is_some());

        assert!(controller.select_file(png(16)).is_ok());
        assert_eq!(controller.file().map(|f| f.size()), Some(1024));
    }

    #[tokio::test]
    async fn test_successful_analysis_holds_parsed_result() {
        let mut controller = ready_with_consent();
        let analyzer = CannedAnalyzer {
            outcome: Ok(glioma()),
        };

        assert!(controller.analyze(&analyzer).await);
        assert_eq!(controller.state(), ViewState::Results);
        assert_eq!(controller.result(), Some(&glioma()));
        assert_eq!(controller.result().unwrap().main_display_percentage(), 85);
    }

    #[tokio::test]
    async fn test_failed_analysis_returns_to_ready() {
        let mut controller = ready_with_consent();
        let analyzer = CannedAnalyzer {
            outcome: Err(AnalysisError::Transport("connection refused".to_string())),
        };

        assert!(controller.analyze(&analyzer).await);
        assert_eq!(controller.state(), ViewState::Ready);
        assert!(controller.file().is_some());
        assert!(controller.consent());
        assert!(controller.result().is_none());
        assert_eq!(controller.error(), Some(FAILURE_MESSAGE));

        controller.dismiss_error();
        assert!(controller.error().is_none());
    }

    #[tokio::test]
    async fn test_server_message_is_kept_verbatim() {
        let mut controller = ready_with_consent();
        let analyzer = CannedAnalyzer {
            outcome: Err(AnalysisError::Server("Image illisible".to_string())),
        };

        controller.analyze(&analyzer).await;
        assert_eq!(controller.error(), Some("Image illisible"));
    }

    #[tokio::test]
    async fn test_analyze_without_consent_issues_no_request() {
        let mut controller = ViewController::default();
        controller.select_file(png(1024)).unwrap();

        assert!(!controller.analyze(&MockAnalyzer::fixed(0)).await);
        assert_eq!(controller.state(), ViewState::Ready);
    }

    #[tokio::test]
    async fn test_replace_and_new_analysis_are_idempotent() {
        let mut controller = ready_with_consent();
        controller.analyze(&MockAnalyzer::fixed(1)).await;
        assert_eq!(controller.state(), ViewState::Results);

        controller.new_analysis();
        controller.new_analysis();
        assert_eq!(controller.state(), ViewState::Upload);
        assert!(controller.file().is_none());
        assert!(controller.result().is_none());
        assert!(controller.error().is_none());
        assert!(!controller.consent());

        let mut controller = ready_with_consent();
        controller.replace();
        controller.replace();
        assert_eq!(controller.state(), ViewState::Upload);
        assert!(controller.file().is_none());
        assert!(!controller.consent());
    }

    #[test]
    fn test_new_analysis_outside_results_is_noop() {
        let mut controller = ready_with_consent();
        controller.new_analysis();

        assert_eq!(controller.state(), ViewState::Ready);
        assert_eq!(controller.file().map(|f| f.name.as_str()), Some("scan.png"));
        assert!(controller.consent());
        assert!(controller.preview().is_some());

        let mut controller = ViewController::default();
        controller.new_analysis();
        assert_eq!(controller.state(), ViewState::Upload);
    }

    #[test]
    fn test_replace_releases_preview() {
        let mut controller = ready_with_consent();
        let path = controller.preview().unwrap().path().to_path_buf();
        assert!(path.exists());

        controller.replace();
        assert!(controller.preview().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_selecting_new_file_resets_consent_and_preview() {
        let mut controller = ready_with_consent();
        let old_preview = controller.preview().unwrap().path().to_path_buf();

        controller
            .select_file(UploadedFile::new("other.webp", "image/webp", vec![1; 32]))
            .unwrap();
        assert!(!controller.consent());
        assert!(!old_preview.exists());
        assert_eq!(controller.file().map(|f| f.name.as_str()), Some("other.webp"));
    }

    #[test]
    fn test_late_outcome_is_discarded() {
        let mut controller = ready_with_consent();
        controller.complete_analysis(Ok(glioma()));
        assert_eq!(controller.state(), ViewState::Ready);
        assert!(controller.result().is_none());
    }

    #[tokio::test]
    async fn test_full_scenario_with_two_mib_png() {
        let mut controller = ViewController::default();
        controller.select_file(png(2 * MIB)).unwrap();
        assert_eq!(controller.state(), ViewState::Ready);

        controller.toggle_consent();
        assert!(controller.consent());

        let analyzer = CannedAnalyzer {
            outcome: Ok(glioma()),
        };
        controller.analyze(&analyzer).await;

        let result = controller.result().unwrap();
        assert_eq!(controller.state(), ViewState::Results);
        assert_eq!(result.main_label, "Gliome");
        assert_eq!(result.badge().to_string(), "85%");
    }
}
