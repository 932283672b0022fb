//! Video anomaly detection clip preparation CLI
//!
//! Command-line interface over the dataset pipeline, the clip loader and
//! the preview helpers.

use super::config::CliConfigBuilder;
use crate::{
    loader::ClipDataset,
    mean::MeanField,
    pipeline::{ClipManifest, DatasetPipeline, RunSteps, RunSummary},
    preview::{clip_frame, decenter_to_image, normalized_to_image},
    services::create_cli_progress_reporter,
    tracing_config::{events, init_cli_tracing, spans},
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Prepare frame clips for video anomaly detection
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "vad-clips")]
pub struct Cli {
    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Draw a progress bar instead of logging progress lines
    #[arg(long, global = true)]
    pub progress: bool,

    /// Emit JSON structured logs (needs the `tracing-json` feature)
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute mean fields over the train split of the selected datasets
    Mean(MeanArgs),
    /// Generate clips for the selected datasets
    Clips(ClipsArgs),
    /// Compute train means, then generate clips for every selected split
    Prepare(ClipsArgs),
    /// Count generated clips and report the first clip's layout
    Inspect(InspectArgs),
    /// Render one clip frame as a PNG
    Preview(PreviewArgs),
    /// Print the effective dataset catalog as JSON
    Catalog(CatalogArgs),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Mean(_) => "mean",
            Self::Clips(_) => "clips",
            Self::Prepare(_) => "prepare",
            Self::Inspect(_) => "inspect",
            Self::Preview(_) => "preview",
            Self::Catalog(_) => "catalog",
        }
    }
}

/// Options selecting datasets under a data root
#[derive(Args, Debug, Clone)]
pub struct DatasetArgs {
    /// Folder containing one sub-folder per dataset
    #[arg(long, value_name = "DIR")]
    pub data_root: PathBuf,

    /// Dataset name, `name|name|...` or `all`
    #[arg(long, default_value = "all")]
    pub dataset: String,

    /// JSON catalog replacing the built-in dataset list
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Frames per clip
    #[arg(long, default_value_t = crate::config::DEFAULT_TARGET_LENGTH)]
    pub target_length: usize,

    /// Also process the optical-flow frames
    #[arg(long)]
    pub optical_flow: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MeanArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ClipsArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Restrict to one split
    #[arg(long, value_enum)]
    pub split: Option<CliSplit>,

    /// How pixels are stored in clips
    #[arg(long, value_enum, default_value_t = CliEncoding::Raw)]
    pub encoding: CliEncoding,

    /// Frame strides overriding the catalog (comma separated)
    #[arg(long, value_delimiter = ',', value_name = "N[,N...]")]
    pub frame_stride: Vec<usize>,

    /// Window start step overriding the catalog
    #[arg(long, value_name = "N")]
    pub sample_stride: Option<usize>,

    /// Skip writing manifest.json next to the clips
    #[arg(long)]
    pub no_manifest: bool,

    /// Write the run summary as JSON
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Clip directories
    #[arg(long = "dir", value_name = "DIR", required = true)]
    pub dirs: Vec<PathBuf>,

    /// Search the directories recursively
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PreviewArgs {
    /// Clip file (.npy)
    #[arg(long, value_name = "FILE")]
    pub clip: PathBuf,

    /// Frame index inside the clip
    #[arg(long, default_value_t = 0)]
    pub frame: usize,

    /// Output PNG
    #[arg(short, long, value_name = "PNG")]
    pub output: PathBuf,

    /// Mean image (.npy) for centered clips
    #[arg(long, value_name = "NPY")]
    pub mean: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    /// JSON catalog to validate and print instead of the built-in one
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliSplit {
    Train,
    Test,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliEncoding {
    Raw,
    Centered,
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = init_cli_tracing(cli.verbose, cli.json_logs).context("Failed to initialize tracing")?;
    let _session = spans::session(&session_id, cli.command.name()).entered();

    let result = match &cli.command {
        Commands::Mean(args) => run_pipeline(&cli, &args.dataset, None, RunSteps::MEANS),
        Commands::Clips(args) => run_pipeline(&cli, &args.dataset, Some(args), RunSteps::CLIPS),
        Commands::Prepare(args) => run_pipeline(&cli, &args.dataset, Some(args), RunSteps::ALL),
        Commands::Inspect(args) => inspect(args),
        Commands::Preview(args) => preview(args),
        Commands::Catalog(args) => print_catalog(args),
    };

    if let Err(e) = &result {
        events::error_with_context(&format!("{:#}", e), cli.command.name());
    }
    result
}

fn run_pipeline(cli: &Cli, dataset: &DatasetArgs, clips: Option<&ClipsArgs>, steps: RunSteps) -> Result<()> {
    CliConfigBuilder::validate_dataset_args(dataset).context("Invalid CLI arguments")?;
    if let Some(clips) = clips {
        CliConfigBuilder::validate_clips_args(clips).context("Invalid CLI arguments")?;
    }

    let config = CliConfigBuilder::pipeline_config(dataset, clips).context("Failed to build configuration")?;
    let catalog = CliConfigBuilder::load_catalog(dataset.catalog.as_deref())?;
    let specs = CliConfigBuilder::select_specs(&catalog, dataset, clips, steps)?;
    if specs.is_empty() {
        warn!(selector = %dataset.dataset, "No catalog entries match the selection");
        return Ok(());
    }

    let _selection = spans::selection(&dataset.dataset, specs.len()).entered();
    info!(
        data_root = %config.data_root.display(),
        encoding = %config.encoding,
        target_length = config.target_length,
        optical_flow = config.optical_flow,
        "Starting dataset preparation"
    );
    if config.encoding == crate::config::SampleEncoding::Centered && !steps.means {
        events::warning_with_recommendation(
            "Centered clips read persisted means",
            "run `mean` (or use `prepare`) on the train split first",
        );
    }

    let reporter = create_cli_progress_reporter(cli.progress, cli.verbose > 0);
    let mut pipeline = DatasetPipeline::with_reporter(config, reporter).context("Failed to create pipeline")?;
    let summary = pipeline.run(&specs, steps).context("Dataset preparation failed")?;

    for dataset_summary in &summary.datasets {
        events::dataset_completed(dataset_summary);
    }
    events::run_completed(&summary);

    if let Some(path) = clips.and_then(|c| c.summary.as_deref()) {
        write_summary(&summary, path)?;
    }
    Ok(())
}

fn write_summary(summary: &RunSummary, path: &Path) -> Result<()> {
    summary
        .write_json(path)
        .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    info!(path = %path.display(), "Run summary written");
    Ok(())
}

fn inspect(args: &InspectArgs) -> Result<()> {
    let _span = spans::inspection(args.dirs.len()).entered();

    let dataset = if args.recursive {
        let mut paths = Vec::new();
        for dir in &args.dirs {
            let found = ClipDataset::open_recursive(dir)
                .with_context(|| format!("Failed to scan {}", dir.display()))?;
            paths.extend(found.entries().iter().map(|entry| entry.path.clone()));
        }
        ClipDataset::from_paths(paths)
    } else {
        ClipDataset::open(&args.dirs).context("Failed to list clips")?
    };

    println!("{} clip(s)", dataset.len());
    for ((name, video_id, frame_stride), count) in dataset.counts_by_video() {
        println!("  {} video {:02} frame stride {}: {}", name, video_id, frame_stride, count);
    }

    if let Some(first) = dataset.entry(0) {
        let raw = dataset.get_raw(0).with_context(|| format!("Failed to read {}", first.path.display()))?;
        println!("first clip: {} shape {:?} dtype {}", first.path.display(), raw.shape(), raw.dtype());
    }

    for dir in &args.dirs {
        match ClipManifest::read(dir) {
            Ok(manifest) => println!(
                "{}: {} {} {:?} clips, {} encoding, {} frames per clip",
                dir.display(),
                manifest.dataset,
                manifest.split,
                manifest.kind,
                manifest.encoding,
                manifest.clip_frames
            ),
            Err(e) => debug!(dir = %dir.display(), error = %e, "No manifest"),
        }
    }
    Ok(())
}

fn preview(args: &PreviewArgs) -> Result<()> {
    let clip = crate::loader::load_clip(&args.clip)
        .with_context(|| format!("Failed to load clip {}", args.clip.display()))?;
    let frame = clip_frame(&clip, args.frame)?;

    let image = match &args.mean {
        Some(mean_path) => {
            let mean = MeanField::load(mean_path)
                .with_context(|| format!("Failed to load mean {}", mean_path.display()))?;
            decenter_to_image(frame, mean.values())?
        },
        None => normalized_to_image(frame)?,
    };

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    image
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!(output = %args.output.display(), frame = args.frame, "Preview written");
    Ok(())
}

fn print_catalog(args: &CatalogArgs) -> Result<()> {
    let catalog = CliConfigBuilder::load_catalog(args.catalog.as_deref())?;
    println!("{}", catalog.to_json_pretty()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prepare() {
        let cli = Cli::try_parse_from([
            "vad-clips",
            "-vv",
            "prepare",
            "--data-root",
            "/data",
            "--dataset",
            "ped2|avenue",
            "--encoding",
            "centered",
            "--frame-stride",
            "1,2",
            "--sample-stride",
            "3",
            "--optical-flow",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Prepare(args) => {
                assert_eq!(args.dataset.data_root, PathBuf::from("/data"));
                assert_eq!(args.dataset.dataset, "ped2|avenue");
                assert_eq!(args.encoding, CliEncoding::Centered);
                assert_eq!(args.frame_stride, vec![1, 2]);
                assert_eq!(args.sample_stride, Some(3));
                assert!(args.dataset.optical_flow);
                assert!(args.split.is_none());
            },
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["vad-clips", "mean", "--data-root", "d"]).unwrap();
        match cli.command {
            Commands::Mean(args) => {
                assert_eq!(args.dataset.dataset, "all");
                assert_eq!(args.dataset.target_length, 10);
                assert!(!args.dataset.optical_flow);
            },
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["vad-clips", "inspect", "--dir", "a", "--dir", "b", "--progress", "-v"]).unwrap();
        assert!(cli.progress);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Inspect(args) => assert_eq!(args.dirs.len(), 2),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_args() {
        assert!(Cli::try_parse_from(["vad-clips", "clips"]).is_err());
        assert!(Cli::try_parse_from(["vad-clips", "inspect"]).is_err());
        assert!(Cli::try_parse_from(["vad-clips", "preview", "--clip", "c.npy"]).is_err());
        assert!(Cli::try_parse_from(["vad-clips", "clips", "--data-root", "d", "--encoding", "zscore"]).is_err());
    }

    #[test]
    fn test_catalog_command_prints_builtin() {
        let args = CatalogArgs { catalog: None };
        assert!(print_catalog(&args).is_ok());
    }
}
