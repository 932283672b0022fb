//! Video anomaly detection clip preparation CLI
//!
//! Command-line interface for indexing frames, computing mean fields and
//! writing sliding-window clips with the vad-clips library.

#[cfg(feature = "cli")]
use vad_clips::cli;

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    cli::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
