use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use alarm_finder::config::DetectorConfig;
use alarm_finder::detection::services::{FsObjectStore, HttpLabelClassifier, LogNotifier};
use alarm_finder::detection::trigger::{parse_upload_event, ObjectRef};
use alarm_finder::detection::{DetectionEvent, InferenceDriver};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "alarm_detector",
    about = "Find alarm sounds in uploaded recordings"
)]
struct Cli {
    /// Directory holding `{bucket}/{key}` objects
    #[arg(long, default_value = ".")]
    store_root: PathBuf,
    /// Classifier URL (overrides CLASSIFIER_ENDPOINT)
    #[arg(long)]
    classifier: Option<String>,
    /// Minimum confidence (overrides MIN_CONFIDENCE)
    #[arg(long)]
    min_confidence: Option<f64>,
    /// Print detections as JSON lines
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check one object
    Check {
        key: String,
        /// Bucket (defaults to AUDIO_BUCKET)
        #[arg(long)]
        bucket: Option<String>,
    },
    /// Process an upload event document
    Event { file: PathBuf },
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
    let mut config = DetectorConfig::from_env().context("reading detector settings")?;
    if let Some(endpoint) = cli.classifier.clone() {
        config.classifier_endpoint = Some(endpoint);
    }
    if let Some(min_confidence) = cli.min_confidence {
        config.min_confidence = min_confidence;
        config.validate()?;
    }

    let objects = match &cli.command {
        Commands::Check { key, bucket } => {
            let bucket = bucket
                .clone()
                .or_else(|| config.bucket.clone())
                .ok_or_else(|| anyhow!("no bucket given and AUDIO_BUCKET is not set"))?;
            vec![ObjectRef::new(bucket, key.clone())]
        }
        Commands::Event { file } => {
            let json = fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            parse_upload_event(&json)?
        }
    };

    let endpoint = config
        .classifier_endpoint
        .clone()
        .ok_or_else(|| anyhow!("no classifier endpoint given and CLASSIFIER_ENDPOINT is not set"))?;
    tracing::info!(
        "[AlarmDetector] Region {}, classifier {}, min confidence {:.2}",
        config.region,
        endpoint,
        config.min_confidence
    );
    let classifier = HttpLabelClassifier::new(&endpoint)?;
    let store = FsObjectStore::new(&cli.store_root);

    let mut driver = InferenceDriver::new(&config, store, classifier, LogNotifier);
    let events = driver.process_batch(&objects)?;

    for event in &events {
        print_event(event, cli.json)?;
    }
    println!("{} detections in {} files", events.len(), objects.len());

    Ok(ExitCode::SUCCESS)
}

fn print_event(event: &DetectionEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else {
        println!("{}", event.message());
    }
    Ok(())
}
