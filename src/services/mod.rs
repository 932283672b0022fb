//! Services separating I/O and progress reporting from the pipeline logic

pub mod io;
pub mod progress;

pub use io::{FrameIO, NpyArray, NpyIO};
#[cfg(feature = "cli")]
pub use progress::{create_cli_progress_reporter, ProgressBarReporter};
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, PipelineStage, ProgressReporter,
    ProgressTracker, ProgressUpdate,
};
