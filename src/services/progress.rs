//! Progress reporting service
//!
//! This module separates progress reporting concerns from the pipeline,
//! allowing the CLI to draw progress bars while library callers stay silent.

use crate::pipeline::RunSummary;
use std::time::Instant;

/// Stages of one dataset pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Resolving catalog entries and validating configuration
    Initialization,
    /// Accumulating the mean image or flow means
    MeanComputation,
    /// Windowing image frames into clips
    ClipGeneration,
    /// Windowing optical-flow frames into clips
    FlowClipGeneration,
    /// Writing the run manifest
    ManifestWriting,
    /// All selected datasets processed
    Completed,
}

impl PipelineStage {
    /// Get a human-readable description of the stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            PipelineStage::Initialization => "Preparing datasets",
            PipelineStage::MeanComputation => "Computing mean field",
            PipelineStage::ClipGeneration => "Generating clips",
            PipelineStage::FlowClipGeneration => "Generating optical-flow clips",
            PipelineStage::ManifestWriting => "Writing manifest",
            PipelineStage::Completed => "Processing completed",
        }
    }
}

/// Progress update for one unit of work (usually one video)
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,
    /// `dataset/split` being processed
    pub dataset: String,
    /// Units finished in this stage
    pub completed: usize,
    /// Units expected in this stage
    pub total: usize,
    pub description: String,
    /// Elapsed time since the tracker started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: PipelineStage, dataset: &str, start_time: Instant) -> Self {
        Self {
            stage,
            dataset: dataset.to_string(),
            completed: 0,
            total: 0,
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        }
    }

    #[must_use]
    pub fn with_counts(mut self, completed: usize, total: usize) -> Self {
        self.completed = completed;
        self.total = total;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    /// Completion percentage of this stage (0-100)
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed.min(self.total) * 100) / self.total) as u8
    }
}

/// Trait for reporting progress of dataset preparation
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report the end of a run with its summary
    fn report_completion(&self, summary: &RunSummary);

    /// Report an error during processing
    fn report_error(&self, stage: PipelineStage, error: &str);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _summary: &RunSummary) {}

    fn report_error(&self, _stage: PipelineStage, _error: &str) {}
}

/// Console progress reporter that emits tracing events
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// `verbose` adds per-video updates; otherwise only stage boundaries are logged
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        let boundary = update.completed == 0 || update.completed >= update.total;
        if !self.verbose && !boundary {
            return;
        }
        tracing::info!(
            dataset = %update.dataset,
            completed = update.completed,
            total = update.total,
            elapsed_ms = update.elapsed_ms,
            "[{}%] {}",
            update.percentage(),
            update.description
        );
    }

    fn report_completion(&self, summary: &RunSummary) {
        tracing::info!(
            datasets = summary.datasets.len(),
            windows = summary.total_windows(),
            frames_read = summary.total_frames_read(),
            "Dataset preparation completed in {}ms",
            summary.elapsed_ms
        );

        if self.verbose {
            for dataset in &summary.datasets {
                tracing::info!(
                    dataset = %dataset.label(),
                    windows = dataset.total_windows(),
                    "Dataset summary"
                );
            }
        }
    }

    fn report_error(&self, stage: PipelineStage, error: &str) {
        tracing::error!("Error during {}: {}", stage.description(), error);
    }
}

/// Progress bar reporter for interactive terminals
#[cfg(feature = "cli")]
pub struct ProgressBarReporter {
    bar: indicatif::ProgressBar,
}

#[cfg(feature = "cli")]
impl ProgressBarReporter {
    #[must_use]
    pub fn new() -> Self {
        let bar = indicatif::ProgressBar::new(0);
        let style = indicatif::ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
        .progress_chars("#>-");
        bar.set_style(style);
        Self { bar }
    }
}

#[cfg(feature = "cli")]
impl Default for ProgressBarReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "cli")]
impl ProgressReporter for ProgressBarReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if update.completed == 0 {
            self.bar.reset();
        }
        self.bar.set_length(update.total as u64);
        self.bar.set_position(update.completed as u64);
        self.bar
            .set_message(format!("{} {}", update.dataset, update.description));
    }

    fn report_completion(&self, summary: &RunSummary) {
        self.bar.finish_with_message(format!(
            "{} clips from {} dataset splits in {}ms",
            summary.total_windows(),
            summary.datasets.len(),
            summary.elapsed_ms
        ));
    }

    fn report_error(&self, stage: PipelineStage, error: &str) {
        self.bar
            .abandon_with_message(format!("Error during {}: {}", stage.description(), error));
    }
}

/// Progress tracker that manages timing and progress reporting
pub struct ProgressTracker {
    reporter: Box<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<PipelineStage>,
}

impl ProgressTracker {
    /// Create a new progress tracker with the specified reporter
    #[must_use]
    pub fn new(reporter: Box<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    /// Create a progress tracker with no-op reporter
    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Box::new(NoOpProgressReporter))
    }

    /// Create a progress tracker with console reporter
    #[must_use]
    pub fn console(verbose: bool) -> Self {
        Self::new(Box::new(ConsoleProgressReporter::new(verbose)))
    }

    /// Report `completed` of `total` units of `stage` for `dataset`
    pub fn report_step(&mut self, stage: PipelineStage, dataset: &str, completed: usize, total: usize) {
        self.current_stage = Some(stage);
        let update = ProgressUpdate::new(stage, dataset, self.start_time).with_counts(completed, total);
        self.reporter.report_progress(update);
    }

    /// Report progress with custom description
    pub fn report_step_with_description(
        &mut self,
        stage: PipelineStage,
        dataset: &str,
        completed: usize,
        total: usize,
        description: String,
    ) {
        self.current_stage = Some(stage);
        let update = ProgressUpdate::new(stage, dataset, self.start_time)
            .with_counts(completed, total)
            .with_description(description);
        self.reporter.report_progress(update);
    }

    pub fn report_completion(&mut self, summary: &RunSummary) {
        self.current_stage = Some(PipelineStage::Completed);
        self.reporter.report_completion(summary);
    }

    /// Report an error against the current stage
    pub fn report_error(&self, error: &str) {
        let stage = self.current_stage.unwrap_or(PipelineStage::Initialization);
        self.reporter.report_error(stage, error);
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<PipelineStage> {
        self.current_stage
    }
}

/// Create the progress reporter matching the CLI flags
///
/// `--progress` draws a progress bar; otherwise progress goes to the log.
#[cfg(feature = "cli")]
#[must_use]
pub fn create_cli_progress_reporter(enable_progress: bool, verbose: bool) -> Box<dyn ProgressReporter> {
    if enable_progress {
        Box::new(ProgressBarReporter::new())
    } else {
        Box::new(ConsoleProgressReporter::new(verbose))
    }
}
