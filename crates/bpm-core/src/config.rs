use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Smallest supported FFT size.
pub const MIN_FFT_SIZE: usize = 64;
/// Largest supported FFT size.
pub const MAX_FFT_SIZE: usize = 4096;

/// Configuration complète du détecteur, sérialisable en TOML.
///
/// Chaque champ a une valeur par défaut saine, alignée sur le firmware de
/// référence (micro MAX9814 sur ADC 12 bits).
///
/// # Example
/// ```
/// use bpm_core::config::DetectorConfig;
/// let config = DetectorConfig::default();
/// assert_eq!(config.sample_rate, 8000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DetectorConfig {
    // === Échantillonnage ===
    /// Fréquence d'échantillonnage en Hz.
    pub sample_rate: u32,
    /// Taille FFT (puissance de deux).
    pub fft_size: usize,

    // === Détection BPM ===
    /// BPM minimum rapporté.
    pub min_bpm: f32,
    /// BPM maximum rapporté.
    pub max_bpm: f32,
    /// Seuil de détection de battement [0.0, 1.0].
    pub detection_threshold: f32,
    /// Confiance minimum pour le statut `Detecting` [0.0, 1.0].
    pub confidence_threshold: f32,
    /// Bord inférieur de la bande de basses (Hz).
    pub bass_freq_min: f32,
    /// Bord supérieur de la bande de basses (Hz).
    pub bass_freq_max: f32,

    // === Enveloppe ===
    /// Facteur de relâchement de l'enveloppe [0.8, 0.99].
    pub envelope_decay: f32,
    /// Intervalle minimum entre deux battements (ms). 300 ms = 200 BPM.
    pub min_beat_interval_ms: u64,
    /// Intervalle maximum entre deux battements (ms). 1000 ms = 60 BPM.
    pub max_beat_interval_ms: u64,
    /// Nombre de battements récents conservés pour l'estimation.
    pub beat_history_size: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            fft_size: 512,
            min_bpm: 60.0,
            max_bpm: 200.0,
            detection_threshold: 0.5,
            confidence_threshold: 0.3,
            bass_freq_min: 40.0,
            bass_freq_max: 200.0,
            envelope_decay: 0.9,
            min_beat_interval_ms: 300,
            max_beat_interval_ms: 1000,
            beat_history_size: 32,
        }
    }
}

impl DetectorConfig {
    /// Frequency covered by one FFT bin, in Hz.
    #[inline]
    #[must_use]
    pub fn freq_resolution(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size as f32
    }

    /// Nyquist frequency for the configured rate, in Hz.
    #[inline]
    #[must_use]
    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Validate the structural invariants.
    ///
    /// Called once at detector construction; a configuration that passes
    /// here can never fail later in the pipeline.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] describing the first rejected field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fft_size.is_power_of_two() {
            return Err(ConfigError::FftSizeNotPowerOfTwo {
                size: self.fft_size,
            });
        }
        if self.fft_size < MIN_FFT_SIZE || self.fft_size > MAX_FFT_SIZE {
            return Err(ConfigError::FftSizeOutOfRange {
                size: self.fft_size,
                min: MIN_FFT_SIZE,
                max: MAX_FFT_SIZE,
            });
        }
        if !(8000..=48000).contains(&self.sample_rate) {
            return Err(ConfigError::SampleRateOutOfRange {
                rate: self.sample_rate,
            });
        }
        if self.min_bpm <= 0.0 || self.min_bpm >= self.max_bpm {
            return Err(ConfigError::InvalidBpmRange {
                min: self.min_bpm,
                max: self.max_bpm,
            });
        }
        if self.min_beat_interval_ms == 0
            || self.min_beat_interval_ms >= self.max_beat_interval_ms
        {
            return Err(ConfigError::InvalidBeatInterval {
                min: self.min_beat_interval_ms,
                max: self.max_beat_interval_ms,
            });
        }
        if self.bass_freq_min <= 0.0
            || self.bass_freq_min >= self.bass_freq_max
            || self.bass_freq_max > self.nyquist()
        {
            return Err(ConfigError::InvalidBassBand {
                min: self.bass_freq_min,
                max: self.bass_freq_max,
                nyquist: self.nyquist(),
            });
        }
        if self.beat_history_size == 0 {
            return Err(ConfigError::EmptyBeatHistory);
        }
        Ok(())
    }

    /// Clamp all tuning fields to their valid ranges.
    /// Called after TOML deserialization to prevent out-of-range values.
    pub fn clamp_all(&mut self) {
        self.detection_threshold = self.detection_threshold.clamp(0.0, 1.0);
        self.confidence_threshold = self.confidence_threshold.clamp(0.0, 1.0);
        self.envelope_decay = self.envelope_decay.clamp(0.8, 0.99);
        self.min_bpm = self.min_bpm.clamp(30.0, 300.0);
        self.max_bpm = self.max_bpm.clamp(30.0, 300.0);
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    audio: Option<AudioSection>,
    detection: Option<DetectionSection>,
    envelope: Option<EnvelopeSection>,
}

/// Audio section of the TOML config, all fields optional for partial override.
#[derive(Deserialize)]
struct AudioSection {
    sample_rate: Option<u32>,
    fft_size: Option<usize>,
}

/// Detection section of the TOML config, all fields optional.
#[derive(Deserialize)]
struct DetectionSection {
    min_bpm: Option<f32>,
    max_bpm: Option<f32>,
    detection_threshold: Option<f32>,
    confidence_threshold: Option<f32>,
    bass_freq_min: Option<f32>,
    bass_freq_max: Option<f32>,
}

/// Envelope section of the TOML config, all fields optional.
#[derive(Deserialize)]
struct EnvelopeSection {
    decay: Option<f32>,
    min_beat_interval_ms: Option<u64>,
    max_beat_interval_ms: Option<u64>,
    beat_history_size: Option<usize>,
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read, parsed, or fails
/// [`DetectorConfig::validate`].
///
/// # Example
/// ```no_run
/// use bpm_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<DetectorConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;

    let file: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Erreur de parsing TOML dans {}", path.display()))?;

    let mut config = DetectorConfig::default();

    if let Some(a) = file.audio {
        if let Some(v) = a.sample_rate {
            config.sample_rate = v;
        }
        if let Some(v) = a.fft_size {
            config.fft_size = v;
        }
    }

    if let Some(d) = file.detection {
        if let Some(v) = d.min_bpm {
            config.min_bpm = v;
        }
        if let Some(v) = d.max_bpm {
            config.max_bpm = v;
        }
        if let Some(v) = d.detection_threshold {
            config.detection_threshold = v;
        }
        if let Some(v) = d.confidence_threshold {
            config.confidence_threshold = v;
        }
        if let Some(v) = d.bass_freq_min {
            config.bass_freq_min = v;
        }
        if let Some(v) = d.bass_freq_max {
            config.bass_freq_max = v;
        }
    }

    if let Some(e) = file.envelope {
        if let Some(v) = e.decay {
            config.envelope_decay = v;
        }
        if let Some(v) = e.min_beat_interval_ms {
            config.min_beat_interval_ms = v;
        }
        if let Some(v) = e.max_beat_interval_ms {
            config.max_beat_interval_ms = v;
        }
        if let Some(v) = e.beat_history_size {
            config.beat_history_size = v;
        }
    }

    config.clamp_all();
    config.validate()?;
    log::info!("Configuration chargée depuis {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(DetectorConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_power_of_two_fft() {
        let config = DetectorConfig {
            fft_size: 500,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::FftSizeNotPowerOfTwo { size: 500 })
        );
    }

    #[test]
    fn rejects_out_of_range_sample_rate() {
        let config = DetectorConfig {
            sample_rate: 4000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SampleRateOutOfRange { rate: 4000 })
        ));
    }

    #[test]
    fn rejects_inverted_bpm_range() {
        let config = DetectorConfig {
            min_bpm: 200.0,
            max_bpm: 60.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBpmRange { .. })
        ));
    }

    #[test]
    fn rejects_bass_band_past_nyquist() {
        let config = DetectorConfig {
            sample_rate: 8000,
            bass_freq_max: 5000.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBassBand { .. })
        ));
    }

    #[test]
    fn clamp_bounds_thresholds() {
        let mut config = DetectorConfig {
            detection_threshold: 1.8,
            envelope_decay: 0.1,
            ..Default::default()
        };
        config.clamp_all();
        assert!((config.detection_threshold - 1.0).abs() < f32::EPSILON);
        assert!((config.envelope_decay - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn freq_resolution_matches_rate_over_size() {
        let config = DetectorConfig::default();
        assert!((config.freq_resolution() - 8000.0 / 512.0).abs() < 1e-4);
    }
}
