use std::collections::VecDeque;

use bpm_core::config::DetectorConfig;

/// Derives a BPM value and a regularity-based confidence score from a beat
/// timestamp history.
///
/// Robust estimation: the median of the plausible inter-beat intervals gives
/// the tempo, and the coefficient of variation (population standard
/// deviation over mean) gives the confidence.
///
/// # Example
/// ```
/// use std::collections::VecDeque;
/// use bpm_core::config::DetectorConfig;
/// use bpm_dsp::tempo::TempoEstimator;
///
/// let mut estimator = TempoEstimator::new(&DetectorConfig::default());
/// let beats: VecDeque<u64> = (0..4).map(|i| i * 500).collect();
/// assert!((estimator.bpm(&beats) - 120.0).abs() < 0.5);
/// ```
pub struct TempoEstimator {
    min_bpm: f32,
    max_bpm: f32,
    min_interval_ms: u64,
    max_interval_ms: u64,
    /// Interval scratch, reused across cycles.
    intervals: Vec<f32>,
}

impl TempoEstimator {
    /// Create an estimator with bounds taken from `config`.
    #[must_use]
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            min_bpm: config.min_bpm,
            max_bpm: config.max_bpm,
            min_interval_ms: config.min_beat_interval_ms,
            max_interval_ms: config.max_beat_interval_ms,
            intervals: Vec::with_capacity(config.beat_history_size),
        }
    }

    /// Lower BPM bound.
    #[must_use]
    pub fn min_bpm(&self) -> f32 {
        self.min_bpm
    }

    /// Upper BPM bound.
    #[must_use]
    pub fn max_bpm(&self) -> f32 {
        self.max_bpm
    }

    /// Replace the lower BPM bound.
    pub fn set_min_bpm(&mut self, min_bpm: f32) {
        self.min_bpm = min_bpm;
    }

    /// Replace the upper BPM bound.
    pub fn set_max_bpm(&mut self, max_bpm: f32) {
        self.max_bpm = max_bpm;
    }

    /// Median-interval tempo estimate in beats per minute.
    ///
    /// Needs at least 2 timestamps; intervals outside the plausible range
    /// are discarded, and a result outside `[min_bpm, max_bpm]` is zeroed.
    pub fn bpm(&mut self, beats: &VecDeque<u64>) -> f32 {
        if beats.len() < 2 {
            return 0.0;
        }

        self.collect_intervals(beats);
        if self.intervals.is_empty() {
            return 0.0;
        }

        self.intervals.sort_by(f32::total_cmp);
        let n = self.intervals.len();
        let median_interval = if n % 2 == 0 {
            (self.intervals[n / 2 - 1] + self.intervals[n / 2]) / 2.0
        } else {
            self.intervals[n / 2]
        };

        let bpm = 60000.0 / median_interval;
        if !(self.min_bpm..=self.max_bpm).contains(&bpm) {
            return 0.0;
        }
        bpm
    }

    /// Interval-regularity confidence in [0, 1].
    ///
    /// Coefficient of variation of the plausible intervals, mapped so that
    /// perfect regularity scores 1.0 and a CV of 0.5 scores 0. Needs at
    /// least 3 timestamps.
    pub fn confidence(&mut self, beats: &VecDeque<u64>) -> f32 {
        if beats.len() < 3 {
            return 0.0;
        }

        self.collect_intervals(beats);
        if self.intervals.is_empty() {
            return 0.0;
        }

        let n = self.intervals.len() as f32;
        let mean = self.intervals.iter().sum::<f32>() / n;
        if mean < 1.0 {
            return 0.0;
        }

        let variance = self
            .intervals
            .iter()
            .map(|interval| {
                let diff = interval - mean;
                diff * diff
            })
            .sum::<f32>()
            / n;
        let cv = variance.sqrt() / mean;

        (1.0 - 2.0 * cv).clamp(0.0, 1.0)
    }

    /// Consecutive inter-beat intervals filtered into the plausible range.
    fn collect_intervals(&mut self, beats: &VecDeque<u64>) {
        self.intervals.clear();
        let mut iter = beats.iter();
        let Some(mut prev) = iter.next().copied() else {
            return;
        };
        for &beat in iter {
            let interval = beat.saturating_sub(prev);
            if (self.min_interval_ms..=self.max_interval_ms).contains(&interval) {
                self.intervals.push(interval as f32);
            }
            prev = beat;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> TempoEstimator {
        TempoEstimator::new(&DetectorConfig::default())
    }

    fn beats_at(interval_ms: u64, count: u64) -> VecDeque<u64> {
        (0..count).map(|i| i * interval_ms).collect()
    }

    #[test]
    fn ten_beats_at_500ms_is_120_bpm() {
        let mut est = estimator();
        let beats = beats_at(500, 10);
        let bpm = est.bpm(&beats);
        assert!((bpm - 120.0).abs() < 1.0, "got {bpm}");
        assert!(est.confidence(&beats) > 0.9);
    }

    #[test]
    fn ten_beats_at_428ms_is_140_bpm() {
        let mut est = estimator();
        // ≈428.57 ms spacing, rounded to whole milliseconds.
        let beats: VecDeque<u64> = (0..10u64).map(|i| i * 3000 / 7).collect();
        let bpm = est.bpm(&beats);
        assert!((bpm - 140.0).abs() < 2.0, "got {bpm}");
        assert!(est.confidence(&beats) > 0.8);
    }

    #[test]
    fn irregular_beats_have_low_confidence() {
        let mut est = estimator();
        let beats: VecDeque<u64> = [0u64, 500, 900, 1400, 1800, 2400].into_iter().collect();
        let bpm = est.bpm(&beats);
        assert!((110.0..=140.0).contains(&bpm), "got {bpm}");
        assert!(est.confidence(&beats) < 0.8);
    }

    #[test]
    fn fewer_than_two_beats_is_zero_bpm() {
        let mut est = estimator();
        assert_eq!(est.bpm(&VecDeque::new()), 0.0);
        assert_eq!(est.bpm(&VecDeque::from([1000u64])), 0.0);
    }

    #[test]
    fn fewer_than_three_beats_is_zero_confidence() {
        let mut est = estimator();
        assert_eq!(est.confidence(&VecDeque::from([0u64, 500])), 0.0);
    }

    #[test]
    fn too_fast_intervals_are_filtered_out() {
        let mut est = estimator();
        // 100 ms spacing (600 BPM equivalent): every interval rejected.
        assert_eq!(est.bpm(&beats_at(100, 10)), 0.0);
    }

    #[test]
    fn too_slow_intervals_are_filtered_out() {
        let mut est = estimator();
        // 1500 ms spacing (40 BPM equivalent): every interval rejected.
        assert_eq!(est.bpm(&beats_at(1500, 5)), 0.0);
    }

    #[test]
    fn median_of_even_interval_count_averages_middle_pair() {
        let mut est = estimator();
        // Intervals 400, 500, 600 ms (odd count): median 500 → 120 BPM.
        let beats: VecDeque<u64> = [0u64, 400, 900, 1500].into_iter().collect();
        assert!((est.bpm(&beats) - 120.0).abs() < 0.5);

        // Intervals 400, 500, 600, 700 (even): median 550 → ≈109.09 BPM.
        let beats: VecDeque<u64> = [0u64, 400, 900, 1500, 2200].into_iter().collect();
        assert!((est.bpm(&beats) - 60000.0 / 550.0).abs() < 0.5);
    }

    #[test]
    fn bpm_outside_configured_range_is_zeroed() {
        let mut est = estimator();
        est.set_min_bpm(130.0);
        // 500 ms spacing is 120 BPM, below the raised floor.
        assert_eq!(est.bpm(&beats_at(500, 10)), 0.0);
        est.set_min_bpm(60.0);
        est.set_max_bpm(100.0);
        assert_eq!(est.bpm(&beats_at(500, 10)), 0.0);
    }

    #[test]
    fn single_outlier_does_not_move_the_median() {
        let mut est = estimator();
        // Nine 500 ms intervals and one 900 ms dropout.
        let mut beats: Vec<u64> = (0..9u64).map(|i| i * 500).collect();
        beats.push(4000 + 900);
        let beats: VecDeque<u64> = beats.into_iter().collect();
        let bpm = est.bpm(&beats);
        assert!((bpm - 120.0).abs() < 1.0, "got {bpm}");
    }
}
