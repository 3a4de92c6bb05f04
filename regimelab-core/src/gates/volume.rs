//! Rising-volume confirmation.

use serde::{Deserialize, Serialize};

/// Whether volume confirmation is active for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeMode {
    /// `valid[i] = volume[i] > volume[i - 1]`.
    #[default]
    Confirming,
    /// Series carries no volume (total <= 0); every bar is valid.
    Degraded,
}

/// Volume gate output for a whole series.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeGate {
    pub valid: Vec<bool>,
    pub mode: VolumeMode,
}

impl VolumeGate {
    /// Evaluate the gate for every bar.
    ///
    /// Bar 0 has no predecessor and is valid. When the summed volume is not
    /// positive the gate degrades to always-valid.
    pub fn evaluate(volumes: &[f64]) -> Self {
        let total: f64 = volumes.iter().sum();
        if total.is_nan() || total <= 0.0 {
            return Self {
                valid: vec![true; volumes.len()],
                mode: VolumeMode::Degraded,
            };
        }

        let valid = volumes
            .iter()
            .enumerate()
            .map(|(i, &v)| i == 0 || v > volumes[i - 1])
            .collect();
        Self {
            valid,
            mode: VolumeMode::Confirming,
        }
    }

    pub fn is_valid(&self, index: usize) -> bool {
        self.valid.get(index).copied().unwrap_or(false)
    }
}
