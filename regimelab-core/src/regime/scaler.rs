//! Per-window feature standardization.

/// Standard deviations at or below this (relative to the feature mean) are
/// treated as zero variance.
const ZERO_VARIANCE_TOLERANCE: f64 = 1e-12;

/// Zero-mean, unit-variance scaler fit on a single window of `D`-dimensional rows.
///
/// Uses the population standard deviation. A dimension with zero variance is
/// passed through raw (neither centered nor scaled).
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler<const D: usize> {
    mean: [f64; D],
    /// `None` marks a zero-variance dimension.
    scale: [Option<f64>; D],
}

impl<const D: usize> StandardScaler<D> {
    /// Fit on `rows`. An empty slice yields a scaler that passes every dimension through.
    pub fn fit(rows: &[[f64; D]]) -> Self {
        let mut mean = [0.0; D];
        let mut scale = [None; D];
        if rows.is_empty() {
            return Self { mean, scale };
        }

        let n = rows.len() as f64;
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut var = [0.0; D];
        for row in rows {
            for d in 0..D {
                let diff = row[d] - mean[d];
                var[d] += diff * diff;
            }
        }
        for d in 0..D {
            let std = (var[d] / n).sqrt();
            if std > ZERO_VARIANCE_TOLERANCE * mean[d].abs().max(1.0) {
                scale[d] = Some(std);
            }
        }

        Self { mean, scale }
    }

    pub fn transform(&self, row: &[f64; D]) -> [f64; D] {
        let mut out = *row;
        for d in 0..D {
            if let Some(std) = self.scale[d] {
                out[d] = (row[d] - self.mean[d]) / std;
            }
        }
        out
    }

    pub fn transform_all(&self, rows: &[[f64; D]]) -> Vec<[f64; D]> {
        rows.iter().map(|r| self.transform(r)).collect()
    }

    pub fn mean(&self) -> &[f64; D] {
        &self.mean
    }

    /// Number of dimensions passed through unscaled.
    pub fn degenerate_dims(&self) -> usize {
        self.scale.iter().filter(|s| s.is_none()).count()
    }
}
