//! Terminal driver for an analysis session.
//!
//! Two front ends share one [`Session`]: a one-shot run for a single
//! image given on the command line, and an interactive loop reading one
//! command per line. Every command maps to exactly one controller action.

use super::controller::{ViewController, ViewState};
use crate::analyzer::Analyzer;
use crate::disclaimer::{DisclaimerGate, KeyValueStore};
use crate::report::{self, OutputFormat};
use crate::upload::UploadedFile;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

/// A parsed interactive command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Select(PathBuf),
    Consent,
    Analyze,
    Replace,
    New,
    Dismiss,
    Disclaimer,
    Accept,
    Export(PathBuf),
    Status,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    let path_arg = |command: &str| -> Result<PathBuf, String> {
        if rest.is_empty() {
            Err(format!("Usage: {} <path>", command))
        } else {
            Ok(PathBuf::from(rest))
        }
    };

    let command = match name.to_lowercase().as_str() {
        "select" | "open" => Command::Select(path_arg("select")?),
        "consent" => Command::Consent,
        "analyze" | "analyse" => Command::Analyze,
        "replace" => Command::Replace,
        "new" => Command::New,
        "dismiss" => Command::Dismiss,
        "disclaimer" => Command::Disclaimer,
        "accept" | "ok" => Command::Accept,
        "export" => Command::Export(path_arg("export")?),
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("Unknown command '{}'. Type 'help'.", other)),
    };

    Ok(Some(command))
}

const HELP: &str = "\
Commands:
  select <path>   choose an image (JPG, PNG or WebP, 10 MiB max)
  consent         toggle the \"not a medical diagnosis\" acknowledgement
  analyze         send the image for analysis
  replace         drop the selected image
  new             start a new analysis
  dismiss         hide the error message
  disclaimer      show the medical disclaimer again
  accept          acknowledge the disclaimer
  export <path>   write the current result to a file
  status          show the current state
  help            show this help
  quit            leave
";

/// Options shared by both front ends.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Format used to print and export results.
    pub format: OutputFormat,
    /// Export the result here after each successful analysis.
    pub output: Option<PathBuf>,
    /// Show a spinner while a request is in flight.
    pub show_progress: bool,
    /// Acknowledge the disclaimer without displaying it.
    pub accept_disclaimer: bool,
}

/// Whether the interactive loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// One analysis session bound to an analyzer and a disclaimer store.
pub struct Session<S: KeyValueStore> {
    controller: ViewController,
    analyzer: Box<dyn Analyzer>,
    disclaimer: DisclaimerGate<S>,
    options: SessionOptions,
}

impl<S: KeyValueStore> Session<S> {
    pub fn new(
        controller: ViewController,
        analyzer: Box<dyn Analyzer>,
        disclaimer: DisclaimerGate<S>,
        options: SessionOptions,
    ) -> Self {
        Self {
            controller,
            analyzer,
            disclaimer,
            options,
        }
    }

    pub fn controller(&self) -> &ViewController {
        &self.controller
    }

    pub fn disclaimer(&self) -> &DisclaimerGate<S> {
        &self.disclaimer
    }

    /// Analyze a single image. Returns the process exit code.
    pub async fn run_once<W: Write>(
        &mut self,
        image: &Path,
        consent: bool,
        out: &mut W,
    ) -> Result<i32> {
        if self.disclaimer.is_open() {
            if !self.options.accept_disclaimer {
                writeln!(out, "{}", report::render_disclaimer())?;
            }
            self.disclaimer.acknowledge()?;
        }

        let file = UploadedFile::from_path(image).await?;
        let selected = format!("📥 Selected {} ({})", file.name, file.size_label());

        if let Err(e) = self.controller.select_file(file) {
            writeln!(out, "❌ {}", e)?;
            return Ok(1);
        }
        writeln!(out, "{}", selected)?;

        if !consent {
            writeln!(
                out,
                "❌ Consent is required. Rerun with --consent to confirm the result \
                 is not a medical diagnosis."
            )?;
            return Ok(1);
        }
        self.controller.set_consent(true);

        self.analyze(out).await?;

        Ok(if self.controller.state() == ViewState::Results {
            0
        } else {
            1
        })
    }

    /// Read commands until `quit` or end of input.
    pub async fn run_interactive<R, W>(&mut self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        if self.disclaimer.is_open() {
            if self.options.accept_disclaimer {
                self.disclaimer.acknowledge()?;
            } else {
                self.show_disclaimer(out)?;
            }
        }
        writeln!(out, "Type 'help' for the list of commands.")?;

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let command = match parse_command(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(message) => {
                    writeln!(out, "{}", message)?;
                    continue;
                }
            };

            debug!("Command: {:?}", command);
            if self.handle(command, out).await? == Flow::Quit {
                break;
            }
        }

        info!("Session ended in state {}", self.controller.state());
        Ok(())
    }

    async fn handle<W: Write>(&mut self, command: Command, out: &mut W) -> Result<Flow> {
        // The disclaimer is modal until acknowledged.
        if self.disclaimer.is_open()
            && !matches!(
                command,
                Command::Accept | Command::Disclaimer | Command::Help | Command::Quit
            )
        {
            writeln!(out, "Please read the disclaimer and type 'accept' to continue.")?;
            return Ok(Flow::Continue);
        }

        match command {
            Command::Select(path) => match UploadedFile::from_path(&path).await {
                Ok(file) => {
                    if let Err(e) = self.controller.select_file(file) {
                        writeln!(out, "❌ {}", e)?;
                    }
                }
                Err(e) => writeln!(out, "❌ {:#}", e)?,
            },
            Command::Consent => match self.controller.state() {
                ViewState::Ready => self.controller.toggle_consent(),
                ViewState::Upload => writeln!(out, "Select an image first.")?,
                ViewState::Analyzing | ViewState::Results => {
                    writeln!(out, "Consent can only be changed before analysis.")?
                }
            },
            Command::Analyze => {
                if !self.controller.can_analyze() {
                    writeln!(
                        out,
                        "Select an image and give your consent before analyzing."
                    )?;
                } else {
                    self.analyze(out).await?;
                }
            }
            Command::Replace => self.controller.replace(),
            Command::New => self.controller.new_analysis(),
            Command::Dismiss => self.controller.dismiss_error(),
            Command::Disclaimer => {
                self.disclaimer.reopen();
                self.show_disclaimer(out)?;
                return Ok(Flow::Continue);
            }
            Command::Accept => {
                if self.disclaimer.is_open() {
                    self.disclaimer.acknowledge()?;
                }
            }
            Command::Export(path) => self.export(&path, out)?,
            Command::Status => {
                self.print_status(out)?;
                return Ok(Flow::Continue);
            }
            Command::Help => {
                write!(out, "{}", HELP)?;
                return Ok(Flow::Continue);
            }
            Command::Quit => return Ok(Flow::Quit),
        }

        writeln!(out, "{}", self.status_line())?;
        Ok(Flow::Continue)
    }

    async fn analyze<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let spinner = match (self.options.show_progress, self.controller.file()) {
            (true, Some(file)) => Some(analysis_spinner(&file.name)),
            _ => None,
        };

        self.controller.analyze(self.analyzer.as_ref()).await;

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        if let Some(result) = self.controller.result() {
            let rendered = report::render(result, self.options.format)?;
            writeln!(out, "{}", rendered)?;

            if let Some(path) = self.options.output.clone() {
                self.export(&path, out)?;
            }
        } else if let Some(message) = self.controller.error() {
            writeln!(out, "❌ {}", message)?;
        }

        Ok(())
    }

    fn export<W: Write>(&self, path: &Path, out: &mut W) -> Result<()> {
        let Some(result) = self.controller.result() else {
            writeln!(out, "No result to export yet.")?;
            return Ok(());
        };

        match report::write_report(result, self.options.format, path) {
            Ok(()) => {
                info!("Report exported to {}", path.display());
                writeln!(out, "✅ Report saved to: {}", path.display())?;
            }
            Err(e) => {
                warn!("Export failed: {:#}", e);
                writeln!(out, "❌ {:#}", e)?;
            }
        }
        Ok(())
    }

    fn show_disclaimer<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "{}", report::render_disclaimer())?;
        writeln!(out, "Type 'accept' to confirm you have read it.")?;
        Ok(())
    }

    fn status_line(&self) -> String {
        let mut line = format!("[{}]", self.controller.state());
        if let Some(file) = self.controller.file() {
            line.push_str(&format!(" {} ({})", file.name, file.size_label()));
            line.push_str(if self.controller.consent() {
                " · consent given"
            } else {
                " · consent pending"
            });
        }
        if self.controller.error().is_some() {
            line.push_str(" · error shown");
        }
        line
    }

    fn print_status<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "State: {}", self.controller.state())?;
        match self.controller.file() {
            Some(file) => {
                writeln!(
                    out,
                    "Image: {} ({}, {})",
                    file.name,
                    file.mime_type,
                    file.size_label()
                )?;
                if let Some(preview) = self.controller.preview() {
                    writeln!(out, "Preview: {}", preview.path().display())?;
                }
                writeln!(
                    out,
                    "Consent: {}",
                    if self.controller.consent() { "yes" } else { "no" }
                )?;
            }
            None => writeln!(out, "Image: none")?,
        }
        if let Some(error) = self.controller.error() {
            writeln!(out, "Error: {}", error)?;
        }
        if let Some(result) = self.controller.result() {
            writeln!(out, "Result: {} · {}", result.main_label, result.badge())?;
        }
        writeln!(out, "Analyzer: {}", self.analyzer.name())?;
        writeln!(
            out,
            "Disclaimer: {}",
            if self.disclaimer.has_seen() { "acknowledged" } else { "not acknowledged" }
        )?;
        Ok(())
    }
}

fn analysis_spinner(file_name: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(format!("🤖 Analyzing {}...", file_name));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{AnalysisError, MockAnalyzer};
    use crate::disclaimer::{MemoryStore, DISCLAIMER_KEY};
    use crate::models::AnalysisResult;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FailingAnalyzer;

    #[async_trait]
    impl Analyzer for FailingAnalyzer {
        fn name(&self) -> &str {
            "failing"
        }

        async fn analyze(&self, _file: &UploadedFile) -> Result<AnalysisResult, AnalysisError> {
            Err(AnalysisError::Server("Image illisible".to_string()))
        }
    }

    fn acknowledged_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.set(DISCLAIMER_KEY, "true").unwrap();
        store
    }

    fn session_with(
        analyzer: Box<dyn Analyzer>,
        store: MemoryStore,
        options: SessionOptions,
    ) -> Session<MemoryStore> {
        let gate = DisclaimerGate::load(store).unwrap();
        Session::new(ViewController::default(), analyzer, gate, options)
    }

    fn mock_session() -> Session<MemoryStore> {
        session_with(
            Box::new(MockAnalyzer::fixed(1)),
            acknowledged_store(),
            SessionOptions::default(),
        )
    }

    fn write_image(dir: &TempDir, name: &str, size: usize) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, vec![0u8; size]).unwrap();
        path
    }

    async fn run_script(session: &mut Session<MemoryStore>, script: &str) -> String {
        let mut out = Vec::new();
        session
            .run_interactive(script.as_bytes(), &mut out)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(
            parse_command("select  my scan.png "),
            Ok(Some(Command::Select(PathBuf::from("my scan.png"))))
        );
        assert_eq!(parse_command("ANALYZE"), Ok(Some(Command::Analyze)));
        assert_eq!(parse_command("q"), Ok(Some(Command::Quit)));
        assert_eq!(
            parse_command("export out.md"),
            Ok(Some(Command::Export(PathBuf::from("out.md"))))
        );
        assert!(parse_command("select").is_err());
        assert!(parse_command("frobnicate").is_err());
    }

    #[tokio::test]
    async fn test_run_once_success() {
        let dir = TempDir::new().unwrap();
        let image = write_image(&dir, "scan.png", 1024);
        let report_path = dir.path().join("report.md");

        let mut session = session_with(
            Box::new(MockAnalyzer::fixed(1)),
            acknowledged_store(),
            SessionOptions {
                output: Some(report_path.clone()),
                ..SessionOptions::default()
            },
        );

        let mut out = Vec::new();
        let code = session.run_once(&image, true, &mut out).await.unwrap();
        let out = String::from_utf8(out).unwrap();

        assert_eq!(code, 0);
        assert_eq!(session.controller().state(), ViewState::Results);
        assert!(out.contains("**Gliome** · 85%"));
        assert!(out.contains("Report saved to"));
        assert!(std::fs::read_to_string(&report_path)
            .unwrap()
            .contains("# JRscan Analysis"));
    }

    #[tokio::test]
    async fn test_run_once_requires_consent() {
        let dir = TempDir::new().unwrap();
        let image = write_image(&dir, "scan.png", 1024);
        let mut session = mock_session();

        let mut out = Vec::new();
        let code = session.run_once(&image, false, &mut out).await.unwrap();

        assert_eq!(code, 1);
        assert_eq!(session.controller().state(), ViewState::Ready);
        assert!(session.controller().result().is_none());
        assert!(String::from_utf8(out).unwrap().contains("Consent is required"));
    }

    #[tokio::test]
    async fn test_run_once_rejects_unsupported_type() {
        let dir = TempDir::new().unwrap();
        let image = write_image(&dir, "anim.gif", 64);
        let mut session = mock_session();

        let mut out = Vec::new();
        let code = session.run_once(&image, true, &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        assert_eq!(code, 1);
        assert_eq!(session.controller().state(), ViewState::Upload);
        assert!(out.contains("Unsupported format"));
        assert!(!out.contains("Selected"));
    }

    #[tokio::test]
    async fn test_run_once_analysis_failure() {
        let dir = TempDir::new().unwrap();
        let image = write_image(&dir, "scan.jpg", 1024);
        let mut session = session_with(
            Box::new(FailingAnalyzer),
            acknowledged_store(),
            SessionOptions::default(),
        );

        let mut out = Vec::new();
        let code = session.run_once(&image, true, &mut out).await.unwrap();

        assert_eq!(code, 1);
        assert_eq!(session.controller().state(), ViewState::Ready);
        assert!(session.controller().consent());
        assert!(String::from_utf8(out).unwrap().contains("❌ Image illisible"));
    }

    #[tokio::test]
    async fn test_run_once_shows_disclaimer_on_first_run() {
        let dir = TempDir::new().unwrap();
        let image = write_image(&dir, "scan.png", 1024);
        let mut session = session_with(
            Box::new(MockAnalyzer::fixed(0)),
            MemoryStore::new(),
            SessionOptions::default(),
        );

        let mut out = Vec::new();
        session.run_once(&image, true, &mut out).await.unwrap();

        assert!(String::from_utf8(out).unwrap().contains("Medical disclaimer"));
        assert!(session.disclaimer().has_seen());
    }

    #[tokio::test]
    async fn test_run_once_accept_disclaimer_skips_text() {
        let dir = TempDir::new().unwrap();
        let image = write_image(&dir, "scan.png", 1024);
        let mut session = session_with(
            Box::new(MockAnalyzer::fixed(0)),
            MemoryStore::new(),
            SessionOptions {
                accept_disclaimer: true,
                ..SessionOptions::default()
            },
        );

        let mut out = Vec::new();
        session.run_once(&image, true, &mut out).await.unwrap();

        assert!(!String::from_utf8(out).unwrap().contains("Medical disclaimer"));
        assert_eq!(
            session
                .disclaimer()
                .store()
                .get(DISCLAIMER_KEY)
                .unwrap()
                .as_deref(),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_interactive_full_cycle() {
        let dir = TempDir::new().unwrap();
        let image = write_image(&dir, "scan.webp", 2048);
        let export = dir.path().join("result.md");
        let mut session = mock_session();

        let script = format!(
            "select {}\nconsent\nanalyze\nexport {}\nquit\nstatus\n",
            image.display(),
            export.display()
        );
        let out = run_script(&mut session, &script).await;

        assert!(out.contains("[ready] scan.webp"));
        assert!(out.contains("consent given"));
        assert!(out.contains("**Gliome** · 85%"));
        assert!(out.contains("[results]"));
        assert!(export.exists());
        // Nothing after quit runs.
        assert!(!out.contains("State:"));
        assert_eq!(session.controller().state(), ViewState::Results);
    }

    #[tokio::test]
    async fn test_interactive_analyze_without_consent_is_noop() {
        let dir = TempDir::new().unwrap();
        let image = write_image(&dir, "scan.png", 1024);
        let mut session = mock_session();

        let script = format!("select {}\nanalyze\n", image.display());
        let out = run_script(&mut session, &script).await;

        assert!(out.contains("give your consent"));
        assert_eq!(session.controller().state(), ViewState::Ready);
        assert!(session.controller().result().is_none());
    }

    #[tokio::test]
    async fn test_interactive_new_analysis_resets() {
        let dir = TempDir::new().unwrap();
        let image = write_image(&dir, "scan.png", 1024);
        let mut session = mock_session();

        let script = format!("select {}\nconsent\nanalyze\nnew\n", image.display());
        run_script(&mut session, &script).await;

        let controller = session.controller();
        assert_eq!(controller.state(), ViewState::Upload);
        assert!(controller.file().is_none());
        assert!(controller.result().is_none());
        assert!(!controller.consent());
    }

    #[tokio::test]
    async fn test_interactive_error_then_dismiss() {
        let dir = TempDir::new().unwrap();
        let image = write_image(&dir, "scan.png", 1024);
        let mut session = session_with(
            Box::new(FailingAnalyzer),
            acknowledged_store(),
            SessionOptions::default(),
        );

        let script = format!("select {}\nconsent\nanalyze\n", image.display());
        let out = run_script(&mut session, &script).await;
        assert!(out.contains("❌ Image illisible"));
        assert_eq!(
            session.controller().error(),
            Some("Image illisible")
        );

        run_script(&mut session, "dismiss\n").await;
        assert!(session.controller().error().is_none());
        assert_eq!(session.controller().state(), ViewState::Ready);
    }

    #[tokio::test]
    async fn test_interactive_disclaimer_is_modal() {
        let dir = TempDir::new().unwrap();
        let image = write_image(&dir, "scan.png", 1024);
        let mut session = session_with(
            Box::new(MockAnalyzer::fixed(0)),
            MemoryStore::new(),
            SessionOptions::default(),
        );

        let script = format!("select {}\n", image.display());
        let out = run_script(&mut session, &script).await;
        assert!(out.contains("Medical disclaimer"));
        assert!(out.contains("type 'accept'"));
        assert_eq!(session.controller().state(), ViewState::Upload);

        let script = format!("accept\nselect {}\n", image.display());
        run_script(&mut session, &script).await;
        assert!(session.disclaimer().has_seen());
        assert_eq!(session.controller().state(), ViewState::Ready);
    }

    #[tokio::test]
    async fn test_run_once_reports_selection_after_validation() {
        let dir = TempDir::new().unwrap();
        let image = write_image(&dir, "big.jpg", 15 * 1024 * 1024);
        let mut session = mock_session();

        let mut out = Vec::new();
        let code = session.run_once(&image, true, &mut out).await.unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(code, 1);
        assert!(out.contains("File too large"));
        assert!(!out.contains("📥 Selected"));

        let image = write_image(&dir, "scan.png", 1024);
        let mut out = Vec::new();
        session.run_once(&image, true, &mut out).await.unwrap();
        assert!(String::from_utf8(out).unwrap().contains("📥 Selected scan.png"));
    }

    #[tokio::test]
    async fn test_interactive_consent_message_depends_on_state() {
        let dir = TempDir::new().unwrap();
        let image = write_image(&dir, "scan.png", 1024);
        let mut session = mock_session();

        let out = run_script(&mut session, "consent\n").await;
        assert!(out.contains("Select an image first."));

        let script = format!("select {}\nconsent\nanalyze\nconsent\n", image.display());
        let out = run_script(&mut session, &script).await;
        assert!(out.contains("Consent can only be changed before analysis."));
        assert!(!out.contains("Select an image first."));
        assert_eq!(session.controller().state(), ViewState::Results);
        assert!(session.controller().consent());
    }

    #[tokio::test]
    async fn test_interactive_export_without_result() {
        let dir = TempDir::new().unwrap();
        let export = dir.path().join("none.md");
        let mut session = mock_session();

        let out = run_script(&mut session, &format!("export {}\n", export.display())).await;
        assert!(out.contains("No result to export yet."));
        assert!(!export.exists());
    }

    #[tokio::test]
    async fn test_interactive_unknown_command() {
        let mut session = mock_session();
        let out = run_script(&mut session, "frobnicate\nhelp\n").await;
        assert!(out.contains("Unknown command 'frobnicate'"));
        assert!(out.contains("select <path>"));
    }
}
