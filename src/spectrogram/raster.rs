// Raster module - draws computed transforms onto a tiny-skia pixmap
//
// Three plot shapes cover every transform: heatmaps (matrix laid out
// [row][frame]), scatter clouds (reassigned points), and line plots (raw
// waveform). Images carry no titles, labels, or ticks.

use once_cell::sync::Lazy;
use tiny_skia::{Color, ColorU8, Paint, PathBuilder, Pixmap, PremultipliedColorU8, Stroke};

use super::reassigned::ReassignedPoints;
use super::FrequencyBand;
use crate::error::RenderError;
use crate::spectrogram::mel::hz_to_mel;

/// Opacity of one reassigned point
const SCATTER_ALPHA: f32 = 0.1;

/// Half-size in pixels of the square drawn for one reassigned point
const SCATTER_RADIUS: i64 = 1;

/// Grid divisions of the waveform plot
const GRID_DIVISIONS: u32 = 8;

const LINE_COLOR: (u8, u8, u8) = (31, 119, 180);
const GRID_COLOR: (u8, u8, u8) = (176, 176, 176);

/// How heatmap rows map onto the vertical axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum YAxis {
    /// Linear STFT bins drawn on a logarithmic frequency axis
    LogHz { bin_hz: f32 },
    /// Mel bands drawn on a mel axis
    Mel { fmin: f32, fmax: f32 },
    /// Geometric constant-Q bins drawn on a logarithmic axis
    ConstantQ { fmin: f32, bins_per_octave: usize },
    /// Rows drawn evenly, row 0 at the bottom
    Index,
}

/// A transform output ready to rasterize
#[derive(Debug, Clone)]
pub enum Plot {
    Heatmap {
        values: Vec<Vec<f32>>,
        axis: YAxis,
        band: Option<FrequencyBand>,
    },
    Scatter {
        points: ReassignedPoints,
        band: Option<FrequencyBand>,
        nyquist: f32,
    },
    Line {
        samples: Vec<f32>,
    },
}

/// Color lookup used for heatmaps and scatter points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    Magma,
    Coolwarm,
}

static MAGMA: Lazy<Vec<[u8; 3]>> = Lazy::new(|| {
    build_lut(&[
        (0, 0, 4),
        (28, 16, 68),
        (79, 18, 123),
        (129, 37, 129),
        (181, 54, 122),
        (229, 80, 100),
        (251, 135, 97),
        (254, 194, 135),
        (252, 253, 191),
    ])
});

static COOLWARM: Lazy<Vec<[u8; 3]>> = Lazy::new(|| {
    build_lut(&[
        (59, 76, 192),
        (124, 159, 249),
        (221, 221, 221),
        (244, 154, 123),
        (180, 4, 38),
    ])
});

fn build_lut(anchors: &[(u8, u8, u8)]) -> Vec<[u8; 3]> {
    let segments = (anchors.len() - 1) as f32;
    (0..256)
        .map(|i| {
            let pos = i as f32 / 255.0 * segments;
            let lower = (pos.floor() as usize).min(anchors.len() - 2);
            let t = pos - lower as f32;
            let (a, b) = (anchors[lower], anchors[lower + 1]);
            let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
            [mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2)]
        })
        .collect()
}

impl Colormap {
    /// Sequential map for single-signed data, diverging map when the data crosses zero
    pub fn for_range(min: f32, max: f32) -> Self {
        if min < 0.0 && max > 0.0 {
            Colormap::Coolwarm
        } else {
            Colormap::Magma
        }
    }

    /// Color for `t` in `0..=1`
    pub fn color(&self, t: f32) -> [u8; 3] {
        let lut = match self {
            Colormap::Magma => &*MAGMA,
            Colormap::Coolwarm => &*COOLWARM,
        };
        let index = (t.clamp(0.0, 1.0) * 255.0).round() as usize;
        lut[index.min(255)]
    }
}

/// Rasterize a plot into a fresh pixmap
pub fn rasterize(plot: &Plot, width: u32, height: u32) -> Result<Pixmap, RenderError> {
    let mut pixmap =
        Pixmap::new(width, height).ok_or(RenderError::CanvasFailed { width, height })?;
    pixmap.fill(Color::WHITE);

    match plot {
        Plot::Heatmap { values, axis, band } => draw_heatmap(&mut pixmap, values, *axis, *band),
        Plot::Scatter {
            points,
            band,
            nyquist,
        } => draw_scatter(&mut pixmap, points, *band, *nyquist),
        Plot::Line { samples } => draw_line(&mut pixmap, samples),
    }

    Ok(pixmap)
}

/// Encode a pixmap as PNG bytes
pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, RenderError> {
    pixmap.encode_png().map_err(|e| RenderError::EncodeFailed {
        reason: e.to_string(),
    })
}

fn value_range(values: impl Iterator<Item = f32>) -> (f32, f32) {
    values.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

fn normalize(value: f32, min: f32, max: f32) -> f32 {
    if max > min {
        (value - min) / (max - min)
    } else {
        0.0
    }
}

fn opaque(rgb: [u8; 3]) -> PremultipliedColorU8 {
    ColorU8::from_rgba(rgb[0], rgb[1], rgb[2], 255).premultiply()
}

/// Row index shown at vertical fraction `frac` (0 = bottom, 1 = top)
fn row_at(axis: YAxis, band: Option<FrequencyBand>, rows: usize, frac: f32) -> usize {
    let last = rows.saturating_sub(1);
    let row = match axis {
        YAxis::Index => (frac * rows as f32).floor(),
        YAxis::LogHz { bin_hz } => {
            let (lo, hi) = match band {
                Some(b) => (b.min_hz.max(bin_hz), b.max_hz),
                None => (bin_hz, bin_hz * last.max(1) as f32),
            };
            let hz = lo * (hi / lo).powf(frac);
            (hz / bin_hz).round()
        }
        YAxis::Mel { fmin, fmax } => {
            let (lo, hi) = match band {
                Some(b) => (b.min_hz, b.max_hz),
                None => (fmin, fmax),
            };
            let mel = hz_to_mel(lo) + (hz_to_mel(hi) - hz_to_mel(lo)) * frac;
            let bank_min = hz_to_mel(fmin);
            let step = (hz_to_mel(fmax) - bank_min) / (rows + 1) as f32;
            // band i is centered on bank_min + (i + 1) * step
            ((mel - bank_min) / step - 1.0).round()
        }
        YAxis::ConstantQ {
            fmin,
            bins_per_octave,
        } => {
            let (lo, hi) = match band {
                Some(b) => (b.min_hz.max(fmin), b.max_hz),
                None => (
                    fmin,
                    fmin * 2.0f32.powf(last as f32 / bins_per_octave as f32),
                ),
            };
            let hz = lo * (hi / lo).powf(frac);
            (bins_per_octave as f32 * (hz / fmin).log2()).round()
        }
    };
    (row.max(0.0) as usize).min(last)
}

fn draw_heatmap(
    pixmap: &mut Pixmap,
    values: &[Vec<f32>],
    axis: YAxis,
    band: Option<FrequencyBand>,
) {
    let rows = values.len();
    let frames = values.first().map(Vec::len).unwrap_or(0);
    if rows == 0 || frames == 0 {
        return;
    }
    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;

    let (min, max) = value_range(values.iter().flatten().copied());
    let colormap = Colormap::for_range(min, max);

    let row_lookup: Vec<usize> = (0..height)
        .map(|y| {
            let frac = 1.0 - (y as f32 + 0.5) / height as f32;
            row_at(axis, band, rows, frac)
        })
        .collect();
    let frame_lookup: Vec<usize> = (0..width)
        .map(|x| (((x as f32 + 0.5) / width as f32 * frames as f32) as usize).min(frames - 1))
        .collect();

    let pixels = pixmap.pixels_mut();
    for (y, row) in row_lookup.iter().enumerate() {
        for (x, frame) in frame_lookup.iter().enumerate() {
            let t = normalize(values[*row][*frame], min, max);
            pixels[y * width + x] = opaque(colormap.color(t));
        }
    }
}

fn draw_scatter(
    pixmap: &mut Pixmap,
    points: &ReassignedPoints,
    band: Option<FrequencyBand>,
    nyquist: f32,
) {
    if points.is_empty() {
        return;
    }
    let width = pixmap.width() as i64;
    let height = pixmap.height() as i64;
    let (lo, hi) = match band {
        Some(b) => (b.min_hz, b.max_hz),
        None => (0.0, nyquist),
    };
    if hi <= lo {
        return;
    }
    let duration = if points.duration > 0.0 {
        points.duration
    } else {
        1.0
    };
    let (min, max) = value_range(points.levels.iter().copied());

    let pixels = pixmap.pixels_mut();
    for ((time, freq), level) in points
        .times
        .iter()
        .zip(points.freqs.iter())
        .zip(points.levels.iter())
    {
        if *freq < lo || *freq > hi {
            continue;
        }
        let cx = (time / duration * (width - 1) as f32).round() as i64;
        let cy = ((1.0 - (freq - lo) / (hi - lo)) * (height - 1) as f32).round() as i64;
        let rgb = Colormap::Magma.color(normalize(*level, min, max));

        for y in (cy - SCATTER_RADIUS).max(0)..=(cy + SCATTER_RADIUS).min(height - 1) {
            for x in (cx - SCATTER_RADIUS).max(0)..=(cx + SCATTER_RADIUS).min(width - 1) {
                let slot = &mut pixels[(y * width + x) as usize];
                let blend = |dst: u8, src: u8| {
                    (dst as f32 * (1.0 - SCATTER_ALPHA) + src as f32 * SCATTER_ALPHA).round() as u8
                };
                *slot = opaque([
                    blend(slot.red(), rgb[0]),
                    blend(slot.green(), rgb[1]),
                    blend(slot.blue(), rgb[2]),
                ]);
            }
        }
    }
}

fn draw_line(pixmap: &mut Pixmap, samples: &[f32]) {
    let width = pixmap.width() as f32;
    let height = pixmap.height() as f32;

    let mut grid_paint = Paint::default();
    grid_paint.set_color_rgba8(GRID_COLOR.0, GRID_COLOR.1, GRID_COLOR.2, 255);
    let grid_stroke = Stroke {
        width: 1.0,
        ..Stroke::default()
    };
    let mut grid = PathBuilder::new();
    for i in 1..GRID_DIVISIONS {
        let x = width * i as f32 / GRID_DIVISIONS as f32;
        let y = height * i as f32 / GRID_DIVISIONS as f32;
        grid.move_to(x, 0.0);
        grid.line_to(x, height);
        grid.move_to(0.0, y);
        grid.line_to(width, y);
    }
    if let Some(path) = grid.finish() {
        pixmap.stroke_path(
            &path,
            &grid_paint,
            &grid_stroke,
            tiny_skia::Transform::identity(),
            None,
        );
    }

    if samples.is_empty() {
        return;
    }

    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs())).max(1e-6) * 1.05;
    let to_y = |v: f32| (1.0 - (v / peak + 1.0) / 2.0) * height;

    let mut line = PathBuilder::new();
    let columns = pixmap.width() as usize;
    if samples.len() <= columns {
        let step = width / samples.len().max(2).saturating_sub(1) as f32;
        line.move_to(0.0, to_y(samples[0]));
        for (i, s) in samples.iter().enumerate().skip(1) {
            line.line_to(i as f32 * step, to_y(*s));
        }
        if samples.len() == 1 {
            line.line_to(width, to_y(samples[0]));
        }
    } else {
        // one min/max stroke per pixel column
        for x in 0..columns {
            let start = x * samples.len() / columns;
            let end = ((x + 1) * samples.len() / columns).max(start + 1);
            let (lo, hi) = value_range(samples[start..end].iter().copied());
            let px = x as f32 + 0.5;
            if x == 0 {
                line.move_to(px, to_y(hi));
            } else {
                line.line_to(px, to_y(hi));
            }
            line.line_to(px, to_y(lo));
        }
    }

    let mut paint = Paint::default();
    paint.set_color_rgba8(LINE_COLOR.0, LINE_COLOR.1, LINE_COLOR.2, 255);
    paint.anti_alias = true;
    let stroke = Stroke {
        width: 1.5,
        ..Stroke::default()
    };
    if let Some(path) = line.finish() {
        pixmap.stroke_path(
            &path,
            &paint,
            &stroke,
            tiny_skia::Transform::identity(),
            None,
        );
    }
}
