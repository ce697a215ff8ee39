//! Column-wise z-score normalisation with cleaning, applied to raw feature
//! rows before they become a [`FeatureFrame`](super::frame::FeatureFrame).

#[derive(Debug, Clone, PartialEq)]
pub struct ZScore {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
    pub clip: f64,
}

impl ZScore {
    /// Fits per-column mean and sample standard deviation. Non-finite cells
    /// are skipped.
    pub fn fit(rows: &[Vec<f64>], clip: f64) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let mut means = vec![0.0; width];
        let mut stds = vec![0.0; width];

        for col in 0..width {
            let values: Vec<f64> = rows
                .iter()
                .filter_map(|row| row.get(col).copied())
                .filter(|v| v.is_finite())
                .collect();
            if values.is_empty() {
                continue;
            }
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            means[col] = mean;
            if values.len() > 1 {
                let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
                stds[col] = variance.sqrt();
            }
        }

        ZScore { means, stds, clip }
    }

    /// Z-scores one value of `col`. Constant columns, missing values and
    /// non-finite results become 0; everything is clipped to `[-clip, clip]`.
    pub fn transform(&self, col: usize, value: f64) -> f32 {
        let std = self.stds[col];
        if std <= 0.0 {
            return 0.0;
        }
        let z = (value - self.means[col]) / std;
        if !z.is_finite() {
            return 0.0;
        }
        z.clamp(-self.clip, self.clip) as f32
    }

    pub fn apply(&self, rows: &[Vec<f64>]) -> Vec<Vec<f32>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(col, &value)| self.transform(col, value))
                    .collect()
            })
            .collect()
    }
}

/// Cleaning without scaling: non-finite cells become 0, finite values pass
/// through untouched.
pub fn clean(rows: &[Vec<f64>]) -> Vec<Vec<f32>> {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|&v| if v.is_finite() { v as f32 } else { 0.0 })
                .collect()
        })
        .collect()
}
