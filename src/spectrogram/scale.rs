// Scale module - decibel conversion referenced to a window maximum
//
// power_to_db:     10 * log10(max(amin, S)) - 10 * log10(max(amin, ref))
// amplitude_to_db: the same on S^2 with amin^2, i.e. 20 * log10 on magnitudes
// Both clip the result to `max - TOP_DB`.

/// Dynamic range kept below the loudest value
pub const TOP_DB: f32 = 80.0;

const POWER_AMIN: f32 = 1e-10;
const AMPLITUDE_AMIN: f32 = 1e-5;

/// Largest value of a `[row][col]` matrix (0 for an empty matrix)
pub fn max_value(matrix: &[Vec<f32>]) -> f32 {
    matrix
        .iter()
        .flatten()
        .fold(0.0f32, |acc, v| if *v > acc { *v } else { acc })
}

/// Convert power values to dB relative to `reference`
pub fn power_to_db(matrix: &[Vec<f32>], reference: f32) -> Vec<Vec<f32>> {
    let ref_db = 10.0 * reference.abs().max(POWER_AMIN).log10();
    let mut db: Vec<Vec<f32>> = matrix
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| 10.0 * v.max(POWER_AMIN).log10() - ref_db)
                .collect()
        })
        .collect();
    clip_top_db(&mut db);
    db
}

/// Convert magnitude values to dB relative to `reference`
pub fn amplitude_to_db(matrix: &[Vec<f32>], reference: f32) -> Vec<Vec<f32>> {
    let ref_db = 20.0 * reference.abs().max(AMPLITUDE_AMIN).log10();
    let mut db: Vec<Vec<f32>> = matrix
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| 20.0 * v.abs().max(AMPLITUDE_AMIN).log10() - ref_db)
                .collect()
        })
        .collect();
    clip_top_db(&mut db);
    db
}

/// Convert a flat list of power values to dB relative to `reference`
pub fn power_to_db_flat(values: &[f32], reference: f32) -> Vec<f32> {
    let ref_db = 10.0 * reference.abs().max(POWER_AMIN).log10();
    let db: Vec<f32> = values
        .iter()
        .map(|v| 10.0 * v.max(POWER_AMIN).log10() - ref_db)
        .collect();
    let floor = db.iter().copied().fold(f32::NEG_INFINITY, f32::max) - TOP_DB;
    db.into_iter().map(|v| v.max(floor)).collect()
}

fn clip_top_db(db: &mut [Vec<f32>]) {
    let peak = db
        .iter()
        .flatten()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max);
    let floor = peak - TOP_DB;
    for row in db.iter_mut() {
        for v in row.iter_mut() {
            *v = v.max(floor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_maps_to_zero_db() {
        let matrix = vec![vec![1.0, 0.1], vec![0.01, 0.5]];
        let db = amplitude_to_db(&matrix, max_value(&matrix));
        assert!(db[0][0].abs() < 1e-5);
        assert!((db[0][1] + 20.0).abs() < 1e-4);
        assert!((db[1][0] + 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_power_scale_is_ten_log() {
        let matrix = vec![vec![100.0, 1.0]];
        let db = power_to_db(&matrix, 100.0);
        assert!((db[0][1] + 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_dynamic_range_is_clipped() {
        let matrix = vec![vec![1.0, 1e-9]];
        let db = amplitude_to_db(&matrix, 1.0);
        assert!((db[0][1] + TOP_DB).abs() < 1e-4);
    }

    #[test]
    fn test_silence_is_flat() {
        let matrix = vec![vec![0.0; 4]; 3];
        let db = power_to_db(&matrix, max_value(&matrix));
        assert!(db.iter().flatten().all(|v| *v == 0.0));
    }
}
