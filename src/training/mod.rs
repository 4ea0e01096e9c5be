//! Training-set generator
//!
//! Builds the labeled image tree used to train the classifier:
//!
//! ```text
//! {output_root}/{transform}/{split}/{class}/img_{n}.png
//! ```
//!
//! For every transform, for both classes (alarm first), for every split, it
//! synthesizes `images_per_class` composites with the [`Mixer`] and renders
//! them. `n` counts across the whole run, so file names never repeat.

use anyhow::{anyhow, Context, Result};
use rand::Rng;
use std::path::PathBuf;

use crate::audio::{Mixer, SampleCache, SourceCatalog, SAMPLE_RATE};
use crate::config::TrainingConfig;
use crate::error::AudioError;
use crate::spectrogram::{SpectrogramRenderer, Transform};

/// Summary of one generation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationReport {
    /// Images written in total
    pub total: usize,
    /// Images written per transform, in run order
    pub per_transform: Vec<(Transform, usize)>,
    /// Leaf folders created or reused
    pub folders: Vec<PathBuf>,
}

pub struct TrainingSetGenerator {
    config: TrainingConfig,
    mixer: Mixer,
    cache: SampleCache,
    renderer: SpectrogramRenderer,
}

impl TrainingSetGenerator {
    /// Discover source recordings from the configured directories
    pub fn new(config: TrainingConfig) -> Result<Self> {
        let catalog = SourceCatalog::discover(&config.alarm_dir, &config.background_dir)
            .context("discovering source recordings")?;
        Self::with_catalog(config, catalog)
    }

    /// Build a generator over an explicit catalog
    pub fn with_catalog(config: TrainingConfig, catalog: SourceCatalog) -> Result<Self> {
        config.validate().context("invalid training settings")?;
        if catalog.alarms.is_empty() {
            return Err(anyhow!(AudioError::EmptyCatalog {
                directory: config.alarm_dir.display().to_string(),
            }));
        }
        if catalog.backgrounds.is_empty() {
            return Err(anyhow!(AudioError::EmptyCatalog {
                directory: config.background_dir.display().to_string(),
            }));
        }

        let mixer = Mixer::new(catalog, config.window_samples(), config.max_background_layers);
        let renderer = SpectrogramRenderer::new(SAMPLE_RATE).with_options(config.image);

        Ok(Self {
            config,
            mixer,
            cache: SampleCache::new(SAMPLE_RATE),
            renderer,
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn cache(&self) -> &SampleCache {
        &self.cache
    }

    /// Leaf folder for one transform / split / class
    pub fn output_folder(&self, transform: Transform, split: &str, with_alarm: bool) -> PathBuf {
        let class = if with_alarm {
            &self.config.alarm_class
        } else {
            &self.config.no_alarm_class
        };
        self.config
            .output_root
            .join(transform.as_str())
            .join(split)
            .join(class)
    }

    /// Generate the whole image tree
    pub fn generate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<GenerationReport> {
        let mut report = GenerationReport::default();
        let transforms = self.config.transforms.clone();
        let splits = self.config.splits.clone();

        for transform in transforms {
            let before = report.total;
            for with_alarm in [true, false] {
                for split in &splits {
                    let folder = self.output_folder(transform, split, with_alarm);
                    std::fs::create_dir_all(&folder)
                        .with_context(|| format!("creating {}", folder.display()))?;
                    tracing::info!("[TrainingSet] Creating images for {}", folder.display());

                    for _ in 0..self.config.images_per_class {
                        let samples = self
                            .mixer
                            .synthesize(&mut self.cache, with_alarm, rng)
                            .context("mixing training clip")?;
                        let path = folder.join(format!("img_{}.png", report.total));
                        self.renderer
                            .render_to_file(&samples, transform, &path)
                            .with_context(|| format!("rendering {}", path.display()))?;
                        report.total += 1;
                    }
                    report.folders.push(folder);
                }
            }
            report.per_transform.push((transform, report.total - before));
        }

        tracing::info!(
            "[TrainingSet] Created {} images ({} sources cached)",
            report.total,
            self.cache.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config(root: &Path) -> TrainingConfig {
        TrainingConfig {
            output_root: root.to_path_buf(),
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_output_folder_layout() {
        let catalog = SourceCatalog {
            alarms: vec![PathBuf::from("a.wav")],
            backgrounds: vec![PathBuf::from("b.wav")],
        };
        let generator =
            TrainingSetGenerator::with_catalog(config(Path::new("/data")), catalog).unwrap();

        assert_eq!(
            generator.output_folder(Transform::ConstantQFrequency, "train", true),
            PathBuf::from("/data/QPlot-freq/train/alarm")
        );
        assert_eq!(
            generator.output_folder(Transform::Standard, "validate", false),
            PathBuf::from("/data/Std/validate/no_alarm")
        );
    }

    #[test]
    fn test_background_layers_capped_by_catalog() {
        let catalog = SourceCatalog {
            alarms: vec![PathBuf::from("a.wav")],
            backgrounds: vec![PathBuf::from("b1.wav"), PathBuf::from("b2.wav")],
        };
        let generator = TrainingSetGenerator::with_catalog(config(Path::new("out")), catalog).unwrap();
        assert_eq!(generator.mixer().max_background_layers(), 2);
    }

    #[test]
    fn test_zero_background_layers_is_a_settings_error() {
        let catalog = SourceCatalog {
            alarms: vec![PathBuf::from("a.wav")],
            backgrounds: vec![PathBuf::from("b.wav")],
        };
        let settings = TrainingConfig {
            max_background_layers: 0,
            ..config(Path::new("out"))
        };

        let err = TrainingSetGenerator::with_catalog(settings, catalog).err().unwrap();
        let report = format!("{err:?}");
        assert!(report.contains("max_background_layers"), "{report}");
        assert!(!report.contains("background sources"), "{report}");
    }

    #[test]
    fn test_empty_catalogs_are_rejected() {
        let no_alarms = SourceCatalog {
            alarms: vec![],
            backgrounds: vec![PathBuf::from("b.wav")],
        };
        assert!(TrainingSetGenerator::with_catalog(config(Path::new("out")), no_alarms).is_err());

        let no_backgrounds = SourceCatalog {
            alarms: vec![PathBuf::from("a.wav")],
            backgrounds: vec![],
        };
        let err = TrainingSetGenerator::with_catalog(config(Path::new("out")), no_backgrounds)
            .err()
            .unwrap();
        assert!(err.to_string().contains("background"));
    }
}
