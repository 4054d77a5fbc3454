use std::collections::VecDeque;

use bpm_core::config::DetectorConfig;

/// Converts bass-band spectral energy into debounced beat-onset timestamps.
///
/// Instant attack, exponential release, and a threshold that scales with
/// ambient loudness. All state lives on the instance — two trackers never
/// share envelope memory.
///
/// # Example
/// ```
/// use bpm_core::config::DetectorConfig;
/// use bpm_dsp::envelope::BeatEnvelopeTracker;
/// let tracker = BeatEnvelopeTracker::new(&DetectorConfig::default());
/// assert!(tracker.history().is_empty());
/// ```
pub struct BeatEnvelopeTracker {
    /// Lowest bass bin, inclusive.
    bin_min: usize,
    /// Highest bass bin, inclusive.
    bin_max: usize,
    decay: f32,
    base_threshold: f32,
    envelope: f32,
    prev_envelope: f32,
    threshold: f32,
    min_beat_interval_ms: u64,
    capacity: usize,
    history: VecDeque<u64>,
}

impl BeatEnvelopeTracker {
    /// Create a tracker with bass bins derived from `config`.
    ///
    /// Bin edges are `floor(freq / Δf)` with `Δf = sample_rate / fft_size`,
    /// clamped into `[0, fft_size/2 − 1]`. Config validation guarantees a
    /// non-empty band below Nyquist, so `bin_min ≤ bin_max` always holds.
    #[must_use]
    pub fn new(config: &DetectorConfig) -> Self {
        let half = config.fft_size / 2;
        let resolution = config.freq_resolution();
        let bin_min = ((config.bass_freq_min / resolution) as usize).min(half - 1);
        let bin_max = ((config.bass_freq_max / resolution) as usize).min(half - 1);

        Self {
            bin_min,
            bin_max,
            decay: config.envelope_decay,
            base_threshold: config.detection_threshold,
            envelope: 0.0,
            prev_envelope: 0.0,
            threshold: config.detection_threshold,
            min_beat_interval_ms: config.min_beat_interval_ms,
            capacity: config.beat_history_size,
            history: VecDeque::with_capacity(config.beat_history_size),
        }
    }

    /// Process one magnitude spectrum and return whether a beat was accepted.
    ///
    /// A beat fires on a rising-edge threshold crossing, and is accepted only
    /// when at least `min_beat_interval_ms` has passed since the previous
    /// accepted beat. Rejected crossings still update the envelope
    /// bookkeeping but never touch the history.
    pub fn process(&mut self, spectrum: &[f32], normalized_level: f32, now_ms: u64) -> bool {
        let bin_max = self.bin_max.min(spectrum.len().saturating_sub(1));
        let bins = &spectrum[self.bin_min..=bin_max];
        let bass_energy = bins.iter().sum::<f32>() / bins.len() as f32;

        // Instant attack, exponential release.
        if bass_energy > self.envelope {
            self.envelope = bass_energy;
        } else {
            self.envelope = self.envelope * self.decay + bass_energy * (1.0 - self.decay);
        }

        // Threshold scales with ambient loudness.
        self.threshold = self.base_threshold * (0.5 + 0.5 * normalized_level);

        let crossed = self.envelope > self.threshold && self.prev_envelope <= self.threshold;
        let mut accepted = false;

        if crossed {
            let debounced = self
                .history
                .back()
                .is_none_or(|&last| now_ms.saturating_sub(last) >= self.min_beat_interval_ms);
            if debounced {
                self.history.push_back(now_ms);
                if self.history.len() > self.capacity {
                    self.history.pop_front();
                }
                log::debug!(
                    "Beat at {now_ms} ms, envelope={:.3} threshold={:.3}",
                    self.envelope,
                    self.threshold
                );
                accepted = true;
            }
        }

        self.prev_envelope = self.envelope;
        accepted
    }

    /// Accepted beat timestamps, oldest first.
    #[must_use]
    pub fn history(&self) -> &VecDeque<u64> {
        &self.history
    }

    /// Replace the base detection threshold, resetting the adaptive value.
    pub fn set_base_threshold(&mut self, threshold: f32) {
        self.base_threshold = threshold;
        self.threshold = threshold;
    }

    /// Current envelope value.
    #[must_use]
    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    /// Current adaptive threshold.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Clear the envelope state and beat history.
    pub fn reset(&mut self) {
        self.envelope = 0.0;
        self.prev_envelope = 0.0;
        self.threshold = self.base_threshold;
        self.history.clear();
    }
}
