use bpm_core::config::DetectorConfig;
use bpm_core::error::ConfigError;
use bpm_core::reading::{BpmReading, DetectorStatus};
use bpm_core::traits::{AdcSource, MonotonicClock};

use crate::envelope::BeatEnvelopeTracker;
use crate::frontend::AnalogFrontEnd;
use crate::spectrum::SpectrumAnalyzer;
use crate::tempo::TempoEstimator;
use crate::window::SampleWindow;

/// Normalized level under which a cycle reports `LowSignal`.
const LOW_SIGNAL_FLOOR: f32 = 0.01;

/// Phase-continuous sine generator substituted for ADC reads in test mode.
struct TestTone {
    frequency_hz: f32,
    phase: f32,
    phase_increment: f32,
}

impl TestTone {
    fn new(frequency_hz: f32, sample_rate: u32) -> Self {
        Self {
            frequency_hz,
            phase: 0.0,
            phase_increment: 2.0 * std::f32::consts::PI * frequency_hz / sample_rate as f32,
        }
    }

    fn next_sample(&mut self) -> f32 {
        if self.frequency_hz <= 0.0 {
            return 0.0;
        }
        let sample = self.phase.sin();
        self.phase += self.phase_increment;
        if self.phase > 2.0 * std::f32::consts::PI {
            self.phase -= 2.0 * std::f32::consts::PI;
        }
        sample
    }
}

/// Real-time tempo detector: one ADC channel (or two) in, one
/// [`BpmReading`] out.
///
/// Owns the full pipeline — front end, sample window, spectrum analyzer,
/// envelope tracker, and tempo estimator — plus the injected ADC and clock
/// capabilities. Instances are fully independent; running several monitors
/// side by side shares nothing.
///
/// Two call rates share this state and must be serialized by the caller:
/// [`BpmDetector::sample`] once per sampling period, and
/// [`BpmDetector::detect`] at the reporting rate (typically every 100 ms).
///
/// # Example
/// ```
/// use bpm_core::config::DetectorConfig;
/// use bpm_core::traits::{AdcSource, SystemClock};
/// use bpm_dsp::detector::BpmDetector;
///
/// struct MidscaleAdc;
/// impl AdcSource for MidscaleAdc {
///     fn configure(&mut self, _pin: u8) {}
///     fn read(&mut self, _pin: u8) -> u16 { 2048 }
///     fn max_code(&self) -> u16 { 4095 }
/// }
///
/// let config = DetectorConfig::default();
/// let mut detector = BpmDetector::new(MidscaleAdc, SystemClock::new(), config).unwrap();
/// detector.begin_mono(5);
/// detector.sample();
/// let reading = detector.detect();
/// assert_eq!(reading.bpm, 0.0);
/// ```
pub struct BpmDetector<A: AdcSource, C: MonotonicClock> {
    config: DetectorConfig,
    clock: C,
    frontend: AnalogFrontEnd<A>,
    window: SampleWindow,
    analyzer: SpectrumAnalyzer,
    tracker: BeatEnvelopeTracker,
    estimator: TempoEstimator,
    /// Linearized window scratch, reused each cycle.
    frame: Vec<f32>,
    /// Magnitude spectrum scratch, reused each cycle.
    spectrum: Vec<f32>,
    test_tone: Option<TestTone>,
    initialized: bool,
}

impl<A: AdcSource, C: MonotonicClock> BpmDetector<A, C> {
    /// Build a detector over the injected ADC and clock.
    ///
    /// Validates the configuration and pre-allocates every pipeline buffer;
    /// nothing allocates after construction.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] for a structurally invalid configuration
    /// (non-power-of-two FFT size, out-of-range rate, inverted bounds, or an
    /// FFT size beyond the window backing's capacity).
    pub fn new(adc: A, clock: C, config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.fft_size > SampleWindow::max_capacity() {
            return Err(ConfigError::FftSizeOutOfRange {
                size: config.fft_size,
                min: bpm_core::config::MIN_FFT_SIZE,
                max: SampleWindow::max_capacity(),
            });
        }

        let frontend = AnalogFrontEnd::new(adc, &config);
        let window = SampleWindow::new(config.fft_size);
        let analyzer = SpectrumAnalyzer::new(config.fft_size);
        let tracker = BeatEnvelopeTracker::new(&config);
        let estimator = TempoEstimator::new(&config);
        let frame = vec![0.0; config.fft_size];
        let spectrum = vec![0.0; config.fft_size / 2];

        log::info!(
            "Detector created: rate={} Hz, fft={}, band={}–{} Hz",
            config.sample_rate,
            config.fft_size,
            config.bass_freq_min,
            config.bass_freq_max
        );

        Ok(Self {
            config,
            clock,
            frontend,
            window,
            analyzer,
            tracker,
            estimator,
            frame,
            spectrum,
            test_tone: None,
            initialized: false,
        })
    }

    /// Start capturing from one ADC channel. Resets the pipeline. Idempotent.
    pub fn begin_mono(&mut self, pin: u8) {
        self.frontend.begin(pin);
        self.reset_pipeline();
        self.initialized = true;
    }

    /// Start capturing from two ADC channels. Resets the pipeline.
    /// Idempotent.
    pub fn begin_stereo(&mut self, left: u8, right: u8) {
        self.frontend.begin_stereo(left, right);
        self.reset_pipeline();
        self.initialized = true;
    }

    /// Acquire one sample into the window. Call once per sampling period.
    ///
    /// In test mode the sample comes from the synthetic tone; in stereo mode
    /// the two conditioned channels are mixed equally.
    pub fn sample(&mut self) {
        if let Some(tone) = &mut self.test_tone {
            let sample = tone.next_sample();
            self.frontend.update_level(sample);
            self.window.push(sample);
        } else if self.frontend.is_stereo() {
            let (mut left, mut right) = (0.0, 0.0);
            self.frontend.read_stereo_samples(&mut left, &mut right);
            self.window.push((left + right) * 0.5);
        } else if self.frontend.is_initialized() {
            let sample = self.frontend.read_sample();
            self.window.push(sample);
        }
    }

    /// `true` once the window holds a full FFT frame.
    #[must_use]
    pub fn is_buffer_ready(&self) -> bool {
        self.window.is_ready()
    }

    /// Run one detection cycle and report the current tempo estimate.
    ///
    /// Never fails: every condition resolves into the reading's `status`,
    /// and the estimate is zeroed rather than misleading.
    pub fn detect(&mut self) -> BpmReading {
        let now = self.clock.now_ms();

        if !self.initialized {
            return BpmReading::empty(DetectorStatus::Initializing, now);
        }
        if !self.window.is_ready() {
            return BpmReading::empty(DetectorStatus::Buffering, now);
        }

        let signal_level = self.frontend.normalized_level();
        if signal_level < LOW_SIGNAL_FLOOR {
            return BpmReading {
                signal_level,
                ..BpmReading::empty(DetectorStatus::LowSignal, now)
            };
        }

        self.window.copy_ordered(&mut self.frame);
        if let Err(e) = self.analyzer.analyze(&self.frame, &mut self.spectrum) {
            log::warn!("Spectral analysis failed, skipping cycle: {e}");
            return BpmReading {
                signal_level,
                ..BpmReading::empty(DetectorStatus::Error, now)
            };
        }

        self.tracker.process(&self.spectrum, signal_level, now);

        let bpm = self.estimator.bpm(self.tracker.history());
        let confidence = self.estimator.confidence(self.tracker.history());

        let status = if bpm > 0.0 && confidence >= self.config.confidence_threshold {
            DetectorStatus::Detecting
        } else if bpm > 0.0 {
            DetectorStatus::LowConfidence
        } else {
            DetectorStatus::NoBeats
        };

        BpmReading {
            bpm,
            confidence,
            signal_level,
            status,
            timestamp_ms: now,
        }
    }

    /// Lower BPM bound currently in force.
    #[must_use]
    pub fn min_bpm(&self) -> f32 {
        self.estimator.min_bpm()
    }

    /// Upper BPM bound currently in force.
    #[must_use]
    pub fn max_bpm(&self) -> f32 {
        self.estimator.max_bpm()
    }

    /// Replace the lower BPM bound, clamped to a sane range.
    pub fn set_min_bpm(&mut self, min_bpm: f32) {
        let clamped = min_bpm.clamp(30.0, 300.0);
        self.config.min_bpm = clamped;
        self.estimator.set_min_bpm(clamped);
    }

    /// Replace the upper BPM bound, clamped to a sane range.
    pub fn set_max_bpm(&mut self, max_bpm: f32) {
        let clamped = max_bpm.clamp(30.0, 300.0);
        self.config.max_bpm = clamped;
        self.estimator.set_max_bpm(clamped);
    }

    /// Replace the beat detection threshold, clamped to [0, 1].
    pub fn set_threshold(&mut self, threshold: f32) {
        let clamped = threshold.clamp(0.0, 1.0);
        self.config.detection_threshold = clamped;
        self.tracker.set_base_threshold(clamped);
    }

    /// Substitute a phase-continuous sine for ADC reads.
    ///
    /// Marks the detector initialized so a bare test rig needs no `begin`.
    pub fn enable_test_mode(&mut self, frequency_hz: f32) {
        log::info!("Test mode enabled: {frequency_hz:.1} Hz");
        self.test_tone = Some(TestTone::new(frequency_hz, self.config.sample_rate));
        self.initialized = true;
    }

    /// Return to ADC-backed sampling.
    pub fn disable_test_mode(&mut self) {
        log::info!("Test mode disabled");
        self.test_tone = None;
        self.initialized = self.frontend.is_initialized();
    }

    /// Zero the front-end signal-level trackers.
    pub fn reset_calibration(&mut self) {
        self.frontend.reset_calibration();
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn reset_pipeline(&mut self) {
        self.window.reset();
        self.tracker.reset();
        self.frame.fill(0.0);
        self.spectrum.fill(0.0);
    }
}
