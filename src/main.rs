//! CLI tool for rendering a score directory to a WAV file
//!
//! Usage: trackmaker <directory>
//!
//! The directory holds `instruments.txt` and `score.txt`; the track is
//! written there as `trackmaker_output.wav`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use trackmaker::pipeline::parser::{DEFAULT_SPACING, MAX_SPACING};
use trackmaker::pipeline::scheduler::{render_project, PipelineConfig, OUTPUT_FILE};

#[derive(Parser, Debug)]
#[command(name = "trackmaker", about = "Render a text score from sampled instruments")]
struct Cli {
    /// Directory containing instruments.txt and score.txt
    directory: PathBuf,

    /// Output file name, written inside the directory
    #[arg(short, long, default_value = OUTPUT_FILE)]
    output: String,

    /// Samples per score line before any j: directive
    #[arg(short, long, default_value_t = DEFAULT_SPACING)]
    spacing: usize,

    /// Length of the fade-out tail in seconds
    #[arg(long, default_value_t = 1.0)]
    fade_seconds: f64,

    /// Log every note resolution
    #[arg(short, long)]
    verbose: bool,
}

/// Check the arguments and turn them into a pipeline configuration
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig> {
    if !cli.directory.is_dir() {
        bail!("{} is not a directory", cli.directory.display());
    }
    if cli.spacing == 0 {
        bail!("spacing must be positive");
    }
    if cli.spacing > MAX_SPACING {
        bail!("spacing must be at most {MAX_SPACING} samples");
    }
    if !cli.fade_seconds.is_finite() || cli.fade_seconds < 0.0 {
        bail!("fade length must be a finite, non-negative number of seconds");
    }

    let defaults = PipelineConfig::default();
    let fade_samples = (cli.fade_seconds * defaults.sample_rate as f64).round();
    if fade_samples > defaults.max_frames as f64 {
        bail!("fade of {} seconds is longer than the track limit", cli.fade_seconds);
    }

    Ok(PipelineConfig {
        spacing: cli.spacing,
        fade_samples: fade_samples as usize,
        ..defaults
    })
}

fn run(cli: Cli) -> Result<()> {
    let config = config_from_cli(&cli)?;

    let summary = render_project(&cli.directory, &cli.output, config)
        .with_context(|| format!("rendering {}", cli.directory.display()))?;

    info!(
        definition_failures = summary.definition_failures.len(),
        diagnostics = summary.diagnostics.len(),
        "rendered {} frames to {}",
        summary.frame_count,
        summary.output_path.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("trackmaker").chain(args.iter().copied())).unwrap()
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("instruments.txt"), "").unwrap();
        fs::write(dir.path().join("score.txt"), "j:100\n\n\n").unwrap();
        dir
    }

    #[test]
    fn test_defaults_give_default_config() {
        let dir = project();
        let config = config_from_cli(&cli(&[dir.path().to_str().unwrap()])).unwrap();
        assert_eq!(config.spacing, DEFAULT_SPACING);
        assert_eq!(config.fade_samples, config.sample_rate as usize);
    }

    #[test]
    fn test_missing_argument_is_a_usage_error() {
        assert!(Cli::try_parse_from(["trackmaker"]).is_err());
        assert!(Cli::try_parse_from(["trackmaker", "a", "b"]).is_err());
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(run(cli(&[missing.to_str().unwrap()])).is_err());
    }

    #[test]
    fn test_bad_spacing_fails() {
        let dir = project();
        let path = dir.path().to_str().unwrap();
        assert!(config_from_cli(&cli(&[path, "--spacing", "0"])).is_err());

        let too_big = (MAX_SPACING + 1).to_string();
        assert!(config_from_cli(&cli(&[path, "--spacing", &too_big])).is_err());
    }

    #[test]
    fn test_bad_fade_fails() {
        let dir = project();
        let path = dir.path().to_str().unwrap();
        for fade in ["inf", "NaN", "-1", "1e300"] {
            let flag = format!("--fade-seconds={fade}");
            let args = cli(&[path, &flag]);
            assert!(config_from_cli(&args).is_err(), "{fade} was accepted");
            assert!(run(args).is_err());
        }
        assert!(!dir.path().join(OUTPUT_FILE).exists());
    }

    #[test]
    fn test_run_writes_output() {
        let dir = project();
        run(cli(&[dir.path().to_str().unwrap(), "--fade-seconds", "0"])).unwrap();

        let output = trackmaker::wav::Wav::load(dir.path().join(OUTPUT_FILE)).unwrap();
        assert_eq!(output.frame_count(), 300);
    }
}
