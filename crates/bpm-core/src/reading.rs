use std::fmt;

use serde::Serialize;

/// Detection cycle outcome, from cold start to a confident lock.
///
/// Every internal condition of the pipeline resolves into one of these
/// variants — data insufficiency is a status, not an error.
///
/// # Example
/// ```
/// use bpm_core::reading::DetectorStatus;
/// let status = DetectorStatus::default();
/// assert!(matches!(status, DetectorStatus::Initializing));
/// assert!(!status.is_tracking());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorStatus {
    /// `begin` has not been called yet.
    #[default]
    Initializing,
    /// Sample window not yet full.
    Buffering,
    /// Normalized signal level below the audible floor.
    LowSignal,
    /// BPM locked with confidence at or above the configured threshold.
    Detecting,
    /// BPM computed but interval regularity is poor.
    LowConfidence,
    /// Signal present but no usable beat history.
    NoBeats,
    /// Spectral analysis failed for this cycle.
    Error,
}

impl DetectorStatus {
    /// Wire-compatible lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Buffering => "buffering",
            Self::LowSignal => "low_signal",
            Self::Detecting => "detecting",
            Self::LowConfidence => "low_confidence",
            Self::NoBeats => "no_beats",
            Self::Error => "error",
        }
    }

    /// `true` when the reading carries a non-zero BPM.
    #[must_use]
    pub fn is_tracking(self) -> bool {
        matches!(self, Self::Detecting | Self::LowConfidence)
    }
}

impl fmt::Display for DetectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tempo estimate, produced by each `detect()` call.
///
/// Immutable after construction; consumers (API layer, displays, LED
/// patterns) read it as-is.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct BpmReading {
    /// Estimated tempo in beats per minute. 0 when no valid estimate.
    pub bpm: f32,
    /// Interval-regularity score in [0, 1].
    pub confidence: f32,
    /// Normalized RMS signal level in [0, 1].
    pub signal_level: f32,
    /// Cycle outcome.
    pub status: DetectorStatus,
    /// Clock timestamp of the cycle, in milliseconds.
    pub timestamp_ms: u64,
}

impl BpmReading {
    /// Reading with zeroed estimates, for cycles that end early.
    #[must_use]
    pub fn empty(status: DetectorStatus, timestamp_ms: u64) -> Self {
        Self {
            bpm: 0.0,
            confidence: 0.0,
            signal_level: 0.0,
            status,
            timestamp_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_are_wire_compatible() {
        assert_eq!(DetectorStatus::Buffering.as_str(), "buffering");
        assert_eq!(DetectorStatus::LowSignal.as_str(), "low_signal");
        assert_eq!(DetectorStatus::LowConfidence.as_str(), "low_confidence");
        assert_eq!(DetectorStatus::NoBeats.to_string(), "no_beats");
    }

    #[test]
    fn tracking_statuses() {
        assert!(DetectorStatus::Detecting.is_tracking());
        assert!(DetectorStatus::LowConfidence.is_tracking());
        assert!(!DetectorStatus::Buffering.is_tracking());
        assert!(!DetectorStatus::Error.is_tracking());
    }

    #[test]
    fn empty_reading_zeroes_estimates() {
        let reading = BpmReading::empty(DetectorStatus::Buffering, 42);
        assert_eq!(reading.bpm, 0.0);
        assert_eq!(reading.confidence, 0.0);
        assert_eq!(reading.status, DetectorStatus::Buffering);
        assert_eq!(reading.timestamp_ms, 42);
    }
}
