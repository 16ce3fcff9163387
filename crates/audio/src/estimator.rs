//! Lautheits-Schaetzung fuer die "spricht gerade"-Anzeige
//!
//! Neue Samples ziehen den Schaetzwert mit einem Ein-Pol-Filter in Richtung
//! des RMS-Werts des Batches. Ohne neue Samples faellt der Wert pro
//! Spiel-Tick exponentiell ab.

use serde::{Deserialize, Serialize};

/// Parameter des Schaetzers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Anteil, um den ein Batch den Schaetzwert Richtung RMS bewegt (0.0..=1.0)
    pub attack: f32,
    /// Abfall pro Sekunde: nach einer Sekunde Stille bleibt `1 - decay_per_second` uebrig
    pub decay_per_second: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            attack: 0.5,
            decay_per_second: 0.95,
        }
    }
}

/// Geglaettete Lautheit eines Sprechers, begrenzt auf 0.0..=1.0
#[derive(Debug, Clone)]
pub struct LoudnessEstimator {
    config: EstimatorConfig,
    value: f32,
}

impl LoudnessEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config: EstimatorConfig {
                attack: config.attack.clamp(0.0, 1.0),
                decay_per_second: config.decay_per_second.clamp(0.0, 1.0),
            },
            value: 0.0,
        }
    }

    /// Verarbeitet einen neuen PCM-Batch
    pub fn update(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        let ziel = rms(samples);
        self.value += (ziel - self.value) * self.config.attack;
        self.value = self.value.clamp(0.0, 1.0);
    }

    /// Laesst den Wert ueber `dt` Sekunden abfallen
    pub fn decay(&mut self, dt: f32) {
        if dt <= 0.0 || !dt.is_finite() {
            return;
        }
        let rest = (1.0 - self.config.decay_per_second).powf(dt);
        self.value = (self.value * rest).clamp(0.0, 1.0);
    }

    pub fn current(&self) -> f32 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

impl Default for LoudnessEstimator {
    fn default() -> Self {
        Self::new(EstimatorConfig::default())
    }
}

/// Berechnet den RMS-Wert eines Batches
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}
