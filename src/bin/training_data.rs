use std::path::PathBuf;
use std::process::ExitCode;

use alarm_finder::config::TrainingConfig;
use alarm_finder::spectrogram::{RenderOptions, Transform};
use alarm_finder::training::TrainingSetGenerator;
use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Parser, Debug)]
#[command(
    name = "training_data",
    about = "Generate labeled spectrogram images from alarm and background recordings"
)]
struct Cli {
    /// JSON settings file; missing fields use defaults
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    alarms: Option<PathBuf>,
    #[arg(long)]
    backgrounds: Option<PathBuf>,
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long)]
    images_per_class: Option<usize>,
    #[arg(long)]
    max_background_layers: Option<usize>,
    /// Transform to render (repeatable), e.g. Std, Mel, QPlot-freq, reassigned
    #[arg(long = "transform")]
    transforms: Vec<Transform>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
}

fn main() -> ExitCode {
    alarm_finder::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = apply_overrides(
        cli.config
            .as_ref()
            .map(TrainingConfig::load_from_file)
            .unwrap_or_default(),
        &cli,
    );

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut generator = TrainingSetGenerator::new(config).context("preparing generator")?;
    let report = generator.generate(&mut rng)?;

    for (transform, count) in &report.per_transform {
        println!("{transform}: {count} images");
    }
    println!("Created {} images", report.total);

    Ok(ExitCode::SUCCESS)
}

fn apply_overrides(mut config: TrainingConfig, cli: &Cli) -> TrainingConfig {
    if let Some(dir) = &cli.alarms {
        config.alarm_dir = dir.clone();
    }
    if let Some(dir) = &cli.backgrounds {
        config.background_dir = dir.clone();
    }
    if let Some(dir) = &cli.output {
        config.output_root = dir.clone();
    }
    if let Some(count) = cli.images_per_class {
        config.images_per_class = count;
    }
    if let Some(layers) = cli.max_background_layers {
        config.max_background_layers = layers;
    }
    if !cli.transforms.is_empty() {
        config.transforms = cli.transforms.clone();
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    config.image = RenderOptions {
        width: cli.width.unwrap_or(config.image.width),
        height: cli.height.unwrap_or(config.image.height),
    };
    config
}
