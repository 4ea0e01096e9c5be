// Mixer - synthetic training clips from alarm and background recordings
//
// Algorithm (one synthesized clip):
// 1. with_alarm: pick a random alarm source (loaded through the SampleCache),
//    otherwise start from silence of the canonical length
// 2. Take a random contiguous sub-window of 50%-100% of the canonical length
// 3. Normalize to exactly the canonical length (random crop or random split
//    zero padding)
// 4. Sum 1..=max_layers randomly chosen backgrounds, each normalized the same
//    way. No gain scaling, so amplitudes may leave [-1, 1]
//
// Randomness is always supplied by the caller so tests can pin a seed.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::audio::decoder::load_wav_file;
use crate::error::{log_audio_error, AudioError};

/// Fully decoded source recordings keyed by path, filled on first read
///
/// Owned by one generation run; entries are never evicted.
#[derive(Debug)]
pub struct SampleCache {
    sample_rate: u32,
    entries: HashMap<PathBuf, Vec<f32>>,
}

impl SampleCache {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            entries: HashMap::new(),
        }
    }

    /// Return the cached waveform for `path`, decoding it on first access
    pub fn get_or_load(&mut self, path: &Path) -> Result<&[f32], AudioError> {
        if !self.entries.contains_key(path) {
            let samples = load_wav_file(path, self.sample_rate).map_err(|err| {
                log_audio_error(&err, &path.display().to_string());
                err
            })?;
            tracing::debug!(
                "[SampleCache] Loaded {} ({} samples)",
                path.display(),
                samples.len()
            );
            self.entries.insert(path.to_path_buf(), samples);
        }

        self.entries
            .get(path)
            .map(Vec::as_slice)
            .ok_or_else(|| AudioError::Io {
                path: path.display().to_string(),
                reason: "cache entry vanished".to_string(),
            })
    }

    /// Seed the cache with already-decoded samples
    pub fn insert(&mut self, path: impl Into<PathBuf>, samples: Vec<f32>) {
        self.entries.insert(path.into(), samples);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Alarm and background source files available for mixing
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    pub alarms: Vec<PathBuf>,
    pub backgrounds: Vec<PathBuf>,
}

impl SourceCatalog {
    /// Collect `*.wav` files from the alarm and background directories
    pub fn discover(alarm_dir: &Path, background_dir: &Path) -> Result<Self, AudioError> {
        let catalog = Self {
            alarms: list_wav_files(alarm_dir)?,
            backgrounds: list_wav_files(background_dir)?,
        };
        tracing::info!(
            "[SourceCatalog] {} alarm sources, {} background sources",
            catalog.alarms.len(),
            catalog.backgrounds.len()
        );
        Ok(catalog)
    }
}

fn list_wav_files(dir: &Path) -> Result<Vec<PathBuf>, AudioError> {
    let entries = fs::read_dir(dir).map_err(|err| AudioError::Io {
        path: dir.display().to_string(),
        reason: err.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("wav"))
                    .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Force `samples` to exactly `target_len` samples
///
/// Longer input is cropped at a random offset, shorter input is zero padded
/// with the padding split randomly between the front and the back. Input that
/// already has the target length is returned unchanged.
pub fn normalize_length<R: Rng + ?Sized>(samples: Vec<f32>, target_len: usize, rng: &mut R) -> Vec<f32> {
    let len = samples.len();

    if len > target_len {
        let offset = rng.gen_range(0..=len - target_len);
        samples[offset..offset + target_len].to_vec()
    } else if len < target_len {
        let pad_amount = target_len - len;
        let split = rng.gen_range(0..=pad_amount);
        let mut padded = Vec::with_capacity(target_len);
        padded.resize(split, 0.0);
        padded.extend_from_slice(&samples);
        padded.resize(target_len, 0.0);
        padded
    } else {
        samples
    }
}

/// Copy a random contiguous piece of `source`, 50% to 100% of `window_len` long
///
/// The piece is capped at the source length and always fits inside it.
pub fn random_subset<R: Rng + ?Sized>(source: &[f32], window_len: usize, rng: &mut R) -> Vec<f32> {
    if source.is_empty() || window_len == 0 {
        return Vec::new();
    }

    let min_len = (window_len / 2).max(1);
    let wanted = if min_len < window_len {
        rng.gen_range(min_len..window_len)
    } else {
        min_len
    };
    let new_len = wanted.min(source.len());
    let offset = rng.gen_range(0..=source.len() - new_len);
    source[offset..offset + new_len].to_vec()
}

/// Sum equal-length layers sample-wise onto `base` (silence when `None`)
pub fn layer_sounds(base: Option<Vec<f32>>, layers: &[Vec<f32>], window_len: usize) -> Vec<f32> {
    let mut mix = base.unwrap_or_else(|| vec![0.0; window_len]);
    for layer in layers {
        for (acc, sample) in mix.iter_mut().zip(layer.iter()) {
            *acc += *sample;
        }
    }
    mix
}

/// Builds randomized alarm/background composites of the canonical length
#[derive(Debug, Clone)]
pub struct Mixer {
    catalog: SourceCatalog,
    window_samples: usize,
    max_background_layers: usize,
}

impl Mixer {
    /// The background layer maximum is capped at the number of background sources.
    pub fn new(catalog: SourceCatalog, window_samples: usize, max_background_layers: usize) -> Self {
        let max_background_layers = max_background_layers.min(catalog.backgrounds.len());
        Self {
            catalog,
            window_samples,
            max_background_layers,
        }
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn window_samples(&self) -> usize {
        self.window_samples
    }

    pub fn max_background_layers(&self) -> usize {
        self.max_background_layers
    }

    /// Synthesize one clip of exactly `window_samples` samples
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        cache: &mut SampleCache,
        with_alarm: bool,
        rng: &mut R,
    ) -> Result<Vec<f32>, AudioError> {
        let foreground = if with_alarm {
            let path = self
                .catalog
                .alarms
                .choose(rng)
                .ok_or_else(|| AudioError::EmptyCatalog {
                    directory: "alarm sources".to_string(),
                })?;
            random_subset(cache.get_or_load(path)?, self.window_samples, rng)
        } else {
            let silence = vec![0.0; self.window_samples];
            random_subset(&silence, self.window_samples, rng)
        };
        let foreground = normalize_length(foreground, self.window_samples, rng);

        if self.max_background_layers == 0 {
            return Err(AudioError::EmptyCatalog {
                directory: "background sources".to_string(),
            });
        }

        let layer_count = rng.gen_range(1..=self.max_background_layers);
        let mut layers = Vec::with_capacity(layer_count);
        for _ in 0..layer_count {
            let path = self
                .catalog
                .backgrounds
                .choose(rng)
                .ok_or_else(|| AudioError::EmptyCatalog {
                    directory: "background sources".to_string(),
                })?;
            let background = cache.get_or_load(path)?.to_vec();
            layers.push(normalize_length(background, self.window_samples, rng));
        }

        Ok(layer_sounds(Some(foreground), &layers, self.window_samples))
    }
}
