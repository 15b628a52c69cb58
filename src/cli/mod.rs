//! Command-line interface for the fundus screening tool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::batch::BatchScreener;
use crate::codec::{Codec, WireCodec, WireMessage};
use crate::config::ScreeningConfig;
use crate::error::{Result, ScreeningError};
use crate::metrics::ScreeningMetrics;
use crate::pipeline::{PipelineBuilder, ScreeningResult};
use crate::response::ResponseParser;
use crate::RawImage;

/// Fundus Screening Tool
///
/// Sends fundus photographs to the optic-disc inference service and reports
/// rim-to-cup ratios, DDLS stage and clinical status.
#[derive(Parser, Debug)]
#[command(name = "fundus-screen")]
#[command(author = "Medical Imaging Team")]
#[command(version)]
#[command(about = "Glaucoma screening of fundus photographs via the inference service")]
#[command(long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Screen a single fundus photograph
    Screen {
        /// Input image path
        #[arg(short, long)]
        input: PathBuf,

        /// TOML configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Store annotated bitmaps here instead of the configured bucket
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Encode an image into a wire message without sending it
    Encode {
        /// Input image path
        #[arg(short, long)]
        input: PathBuf,

        /// Output wire message path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show the header of an encoded wire message
    Inspect {
        /// Wire message path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Score a saved inference service response
    Score {
        /// JSON response body
        #[arg(short, long)]
        response: PathBuf,

        /// Print the metrics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Screen every image in a directory
    Batch {
        /// Input directory
        #[arg(short, long)]
        input_dir: PathBuf,

        /// TOML configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Store annotated bitmaps here instead of the configured bucket
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Scan subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Parallel jobs (defaults to the number of CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,
    },
}

/// Run the CLI application.
pub fn run(cli: Cli) -> Result<()> {
    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
            .init();
    } else if !cli.quiet {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .init();
    }

    match cli.command {
        Commands::Screen {
            input,
            config,
            store,
            json,
        } => run_screen(&input, &config, store, json, cli.quiet),
        Commands::Encode { input, output } => run_encode(&input, &output, cli.quiet),
        Commands::Inspect { input } => run_inspect(&input),
        Commands::Score { response, json } => run_score(&response, json),
        Commands::Batch {
            input_dir,
            config,
            store,
            recursive,
            jobs,
        } => run_batch(&input_dir, &config, store, recursive, jobs, cli.quiet),
    }
}

fn build_pipeline(
    config_path: &Path,
    store: Option<PathBuf>,
) -> Result<crate::ScreeningPipeline<crate::HttpWireClient, crate::LocalImageStore>> {
    let config = ScreeningConfig::load(config_path)?;
    let mut builder = PipelineBuilder::new().config(config);
    if let Some(root) = store {
        builder = builder.store_root(root);
    }
    builder.build()
}

/// Run screen command.
fn run_screen(
    input: &Path,
    config_path: &Path,
    store: Option<PathBuf>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let pipeline = build_pipeline(config_path, store)?;

    let spinner = (!quiet).then(|| {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("Screening {}", input.display()));
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    });

    let result = pipeline.screen_file(input);
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let result = result?;

    if json {
        println!("{}", to_json(&result)?);
    } else if !quiet {
        print_screening_result(&result);
    }
    Ok(())
}

/// Run encode command.
fn run_encode(input: &Path, output: &Path, quiet: bool) -> Result<()> {
    let bytes = std::fs::read(input)?;
    let raw = RawImage::from_encoded(&bytes)?;
    let message = WireCodec::new().encode(&raw)?;
    std::fs::write(output, message.as_bytes())?;

    if !quiet {
        println!(
            "Encoded {}x{} ({} ch, {} B/sample) -> {} ({} bytes, header {:#04x})",
            raw.width,
            raw.height,
            raw.channels,
            raw.byte_depth,
            output.display(),
            message.len(),
            message.header_byte()
        );
    }
    Ok(())
}

/// Run inspect command.
fn run_inspect(input: &Path) -> Result<()> {
    let message = WireMessage::from_bytes(std::fs::read(input)?)?;
    let header = message.header()?;

    println!("Wire Message");
    println!("============");
    println!("File: {}", input.display());
    println!("  Header: {:#04x}", header.flags);
    println!("  Dimensions: {}x{}", header.width, header.height);
    println!("  Channels: {}", header.channels);
    println!("  Bytes/Sample: {}", header.depth.bytes());
    println!("  Spacing: {:?}", header.spacing);
    println!("  Origin: {:?}", header.origin);
    println!("  Pixel Data: {} bytes", message.pixel_data().len());
    Ok(())
}

/// Run score command.
fn run_score(response: &Path, json: bool) -> Result<()> {
    let body = std::fs::read_to_string(response)?;
    let result = ResponseParser::default().parse(&body)?;
    let metrics = ScreeningMetrics::compute(&result)?;

    if json {
        println!("{}", to_json(&metrics)?);
        return Ok(());
    }

    println!("Screening Metrics");
    println!("=================");
    println!("  Distance Ratio: {}", metrics.ratios.distance_ratio);
    println!("  Perimeter Ratio: {}", metrics.ratios.perimeter_ratio);
    println!("  Area Ratio: {}", metrics.ratios.area_ratio);
    println!("  DDLS Stage: {}", metrics.stage);
    println!("  Status: {} ({})", metrics.status, metrics.status.code());
    Ok(())
}

/// Run batch command.
fn run_batch(
    input_dir: &Path,
    config_path: &Path,
    store: Option<PathBuf>,
    recursive: bool,
    jobs: Option<usize>,
    quiet: bool,
) -> Result<()> {
    let pipeline = build_pipeline(config_path, store)?;
    let mut screener = BatchScreener::new(&pipeline).recursive(recursive);
    if let Some(jobs) = jobs {
        screener = screener.max_parallel(jobs);
    }

    let report = screener.screen_directory(input_dir)?;

    if !quiet {
        for outcome in &report.outcomes {
            println!("{}", outcome);
        }
        println!();
        println!(
            "Screened {} of {} images in {} ms",
            report.stats.successful, report.stats.total_files, report.stats.total_time_ms
        );
        for (category, count) in &report.stats.failures_by_category {
            println!("  {}: {} failed", category, count);
        }
    }

    if report.stats.failed > 0 {
        return Err(ScreeningError::Internal(format!(
            "{} of {} images failed",
            report.stats.failed, report.stats.total_files
        )));
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| ScreeningError::Internal(e.to_string()))
}

/// Print screening result.
fn print_screening_result(result: &ScreeningResult) {
    println!("Screening Result:");
    println!("  Image ID: {}", result.image_id);
    println!("  Image URL: {}", result.image_url);
    println!(
        "  Ratios (distance/perimeter/area): {} / {} / {}",
        result.distance_ratio, result.perimeter_ratio, result.area_ratio
    );
    println!(
        "  Rim: perimeter {:.2}, area {:.2}",
        result.rim_perimeter, result.rim_area
    );
    println!(
        "  Cup: perimeter {:.2}, area {:.2}",
        result.cup_perimeter, result.cup_area
    );
    println!("  DDLS Stage: {}", result.stage);
    println!("  Status: {} ({})", result.status, result.status.code());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_screen() {
        let cli = Cli::try_parse_from([
            "fundus-screen",
            "screen",
            "--input",
            "od.png",
            "--config",
            "screening.toml",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Screen { input, json, store, .. } => {
                assert_eq!(input, PathBuf::from("od.png"));
                assert!(json);
                assert!(store.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_encode_then_inspect() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let output = dir.path().join("out.bin");
        image::RgbImage::new(10, 10).save(&input).unwrap();

        run_encode(&input, &output, true).unwrap();

        let bytes = std::fs::read(&output).unwrap();
        assert_eq!(bytes.len(), 325);
        assert_eq!(bytes[0], 22);
        run_inspect(&output).unwrap();
    }

    #[test]
    fn test_score_saved_response() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("response.json");
        std::fs::write(
            &path,
            r#"{"image":{"bitmap":""},"coordinates":[],"distances":[1.0,2.0],"perimeters":[1.0,2.0],"areas":[1.0,2.0]}"#,
        )
        .unwrap();
        run_score(&path, true).unwrap();

        std::fs::write(&path, r#"{"image":{"bitmap":""}}"#).unwrap();
        assert!(matches!(
            run_score(&path, false),
            Err(ScreeningError::MalformedServerResponse(_))
        ));
    }
}
