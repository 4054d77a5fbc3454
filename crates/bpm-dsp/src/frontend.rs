//! Analog front end: calibrated code-to-voltage conversion, DC removal,
//! bass-focused band limiting, and RMS/peak signal-level tracking.

use bpm_core::config::DetectorConfig;
use bpm_core::traits::AdcSource;

/// Cutoff of the trailing high-pass stage, in Hz.
const HIGH_PASS_CUTOFF_HZ: f32 = 20.0;
/// Pole of the DC-blocking stage. Closer to 1 = sharper cutoff.
const DC_BLOCKER_POLE: f32 = 0.995;
/// Number of recent magnitudes in the RMS window.
const RMS_WINDOW: usize = 100;
/// Floor for the normalized-level divisor.
const PEAK_FLOOR: f32 = 0.01;

/// Single-pole IIR DC blocker: `y[n] = x[n] − x[n−1] + pole·y[n−1]`.
struct DcBlocker {
    pole: f32,
    x1: f32,
    y1: f32,
}

impl DcBlocker {
    fn new(pole: f32) -> Self {
        Self {
            pole,
            x1: 0.0,
            y1: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = input - self.x1 + self.pole * self.y1;
        self.x1 = input;
        self.y1 = output;
        output
    }

    fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}

/// First-order RC high-pass: `y[n] = alpha·(y[n−1] + x[n] − x[n−1])`.
struct HighPassFilter {
    alpha: f32,
    prev_input: f32,
    prev_output: f32,
}

impl HighPassFilter {
    fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        let rc = 1.0 / (2.0 * std::f32::consts::PI * cutoff_hz);
        let dt = 1.0 / sample_rate;
        Self {
            alpha: rc / (rc + dt),
            prev_input: 0.0,
            prev_output: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.alpha * (self.prev_output + input - self.prev_input);
        self.prev_input = input;
        self.prev_output = output;
        output
    }

    fn reset(&mut self) {
        self.prev_input = 0.0;
        self.prev_output = 0.0;
    }
}

/// 2nd-order Butterworth band-pass, direct-form I biquad.
///
/// Coefficients are derived once at construction via bilinear transform with
/// pre-warped band edges.
struct BassBandPass {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BassBandPass {
    fn new(low_hz: f32, high_hz: f32, sample_rate: f32) -> Self {
        // Pre-warp the analog band edges, then place the biquad at the
        // geometric center with Q = center / bandwidth.
        let wl = (std::f32::consts::PI * low_hz / sample_rate).tan();
        let wh = (std::f32::consts::PI * high_hz / sample_rate).tan();
        let k = (wl * wh).sqrt();
        let bw = wh - wl;
        let norm = 1.0 / (1.0 + bw + k * k);

        Self {
            b0: bw * norm,
            b1: 0.0,
            b2: -bw * norm,
            a1: 2.0 * (k * k - 1.0) * norm,
            a2: (1.0 - bw + k * k) * norm,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }

    fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// Ordered per-channel conditioning chain.
///
/// Each channel owns its full filter state; stereo channels never share
/// memory.
struct ChannelChain {
    dc: DcBlocker,
    band: BassBandPass,
    high: HighPassFilter,
}

impl ChannelChain {
    fn new(config: &DetectorConfig) -> Self {
        let rate = config.sample_rate as f32;
        Self {
            dc: DcBlocker::new(DC_BLOCKER_POLE),
            band: BassBandPass::new(config.bass_freq_min, config.bass_freq_max, rate),
            high: HighPassFilter::new(HIGH_PASS_CUTOFF_HZ, rate),
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        self.high.process(self.band.process(self.dc.process(input)))
    }

    fn reset(&mut self) {
        self.dc.reset();
        self.band.reset();
        self.high.reset();
    }
}

/// RMS-over-window and running-peak signal level tracker.
struct LevelTracker {
    window: [f32; RMS_WINDOW],
    index: usize,
    level: f32,
    peak: f32,
}

impl LevelTracker {
    fn new() -> Self {
        Self {
            window: [0.0; RMS_WINDOW],
            index: 0,
            level: 0.0,
            peak: 0.0,
        }
    }

    fn update(&mut self, sample: f32) {
        let magnitude = sample.abs();
        self.window[self.index] = magnitude;
        self.index = (self.index + 1) % RMS_WINDOW;
        if magnitude > self.peak {
            self.peak = magnitude;
        }
        self.level = self.rms();
    }

    fn rms(&self) -> f32 {
        let sum_squares: f32 = self.window.iter().map(|s| s * s).sum();
        (sum_squares / RMS_WINDOW as f32).sqrt()
    }

    fn normalized(&self) -> f32 {
        (self.level / self.peak.max(PEAK_FLOOR)).min(1.0)
    }

    fn reset(&mut self) {
        self.window.fill(0.0);
        self.index = 0;
        self.level = 0.0;
        self.peak = 0.0;
    }
}

/// Converts raw ADC codes into calibrated, DC-free, band-limited voltage
/// samples and tracks the running signal level.
///
/// Owns its [`AdcSource`] — one front end per detector, no global ADC
/// state. Mono and stereo channels each hold an independent filter chain.
///
/// # Example
/// ```
/// use bpm_core::config::DetectorConfig;
/// use bpm_core::traits::AdcSource;
/// use bpm_dsp::frontend::AnalogFrontEnd;
///
/// struct MidscaleAdc;
/// impl AdcSource for MidscaleAdc {
///     fn configure(&mut self, _pin: u8) {}
///     fn read(&mut self, _pin: u8) -> u16 { 2048 }
///     fn max_code(&self) -> u16 { 4095 }
/// }
///
/// let mut frontend = AnalogFrontEnd::new(MidscaleAdc, &DetectorConfig::default());
/// frontend.begin(5);
/// let _sample = frontend.read_sample();
/// ```
pub struct AnalogFrontEnd<A: AdcSource> {
    adc: A,
    pin_left: u8,
    pin_right: u8,
    stereo: bool,
    initialized: bool,
    degraded: bool,
    calibration: Option<Vec<f32>>,
    left: ChannelChain,
    right: ChannelChain,
    level: LevelTracker,
}

impl<A: AdcSource> AnalogFrontEnd<A> {
    /// Create a front end over `adc` with filters matched to `config`.
    #[must_use]
    pub fn new(adc: A, config: &DetectorConfig) -> Self {
        Self {
            adc,
            pin_left: 0,
            pin_right: 0,
            stereo: false,
            initialized: false,
            degraded: false,
            calibration: None,
            left: ChannelChain::new(config),
            right: ChannelChain::new(config),
            level: LevelTracker::new(),
        }
    }

    /// Initialize for mono capture on `pin`. Idempotent.
    pub fn begin(&mut self, pin: u8) {
        self.pin_left = pin;
        self.pin_right = 0;
        self.stereo = false;
        self.adc.configure(pin);
        self.reset_channels();
        self.build_calibration();
        self.initialized = true;
        log::info!("Front end initialized on pin {pin}");
    }

    /// Initialize for stereo capture on `left` and `right` pins. Idempotent.
    pub fn begin_stereo(&mut self, left: u8, right: u8) {
        self.pin_left = left;
        self.pin_right = right;
        self.stereo = true;
        self.adc.configure(left);
        self.adc.configure(right);
        self.reset_channels();
        self.build_calibration();
        self.initialized = true;
        log::info!("Front end initialized in stereo on pins {left}/{right}");
    }

    /// Read, convert, and condition one mono sample.
    ///
    /// Returns 0.0 before `begin`.
    pub fn read_sample(&mut self) -> f32 {
        if !self.initialized {
            return 0.0;
        }
        let code = self.adc.read(self.pin_left);
        let volts = self.convert(code);
        let filtered = self.left.process(volts);
        self.level.update(filtered);
        filtered
    }

    /// Read, convert, and condition one sample per stereo channel.
    ///
    /// Each channel keeps fully independent filter state; the level tracker
    /// receives the combined magnitude of both channels.
    pub fn read_stereo_samples(&mut self, left: &mut f32, right: &mut f32) {
        if !self.initialized || !self.stereo {
            *left = 0.0;
            *right = 0.0;
            return;
        }
        let left_code = self.adc.read(self.pin_left);
        let right_code = self.adc.read(self.pin_right);
        *left = self.left.process(self.convert(left_code));
        *right = self.right.process(self.convert(right_code));
        self.level.update((left.abs() + right.abs()) * 0.5);
    }

    /// Feed one externally produced sample into the level tracker.
    ///
    /// Used by the synthetic test-tone path, which bypasses the ADC.
    pub fn update_level(&mut self, sample: f32) {
        self.level.update(sample);
    }

    /// RMS signal level over the last tracked samples.
    #[must_use]
    pub fn signal_level(&self) -> f32 {
        self.level.level
    }

    /// RMS level scaled by the running peak, in [0, 1].
    #[must_use]
    pub fn normalized_level(&self) -> f32 {
        self.level.normalized()
    }

    /// Zero the RMS window and peak tracker.
    pub fn reset_calibration(&mut self) {
        self.level.reset();
    }

    /// `true` once `begin` or `begin_stereo` has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// `true` when the calibration table could not be allocated and the
    /// front end fell back to linear conversion.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// `true` when configured for two channels.
    #[must_use]
    pub fn is_stereo(&self) -> bool {
        self.stereo
    }

    fn reset_channels(&mut self) {
        self.left.reset();
        self.right.reset();
        self.reset_calibration();
    }

    /// Convert one raw code to volts, clamping invalid codes to midscale.
    fn convert(&self, code: u16) -> f32 {
        let max_code = self.adc.max_code();
        let code = if code > max_code { max_code / 2 } else { code };
        match &self.calibration {
            Some(table) => table[code as usize],
            None => f32::from(code) / f32::from(max_code) * self.adc.full_scale_volts(),
        }
    }

    /// Build the code→volts lookup table from the source's calibration
    /// curve. A failed allocation falls back to linear conversion.
    fn build_calibration(&mut self) {
        self.calibration = None;
        self.degraded = false;

        if self.adc.calibrated_volts(0).is_none() {
            return;
        }

        let entries = usize::from(self.adc.max_code()) + 1;
        let mut table: Vec<f32> = Vec::new();
        if table.try_reserve_exact(entries).is_err() {
            log::warn!(
                "Calibration table allocation failed ({entries} entries), using linear conversion"
            );
            self.degraded = true;
            return;
        }

        let max = f32::from(self.adc.max_code());
        let full_scale = self.adc.full_scale_volts();
        for code in 0..=self.adc.max_code() {
            let linear = f32::from(code) / max * full_scale;
            table.push(self.adc.calibrated_volts(code).unwrap_or(linear));
        }
        self.calibration = Some(table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays a fixed code sequence, then holds the last value.
    struct ScriptedAdc {
        codes: Vec<u16>,
        pos: usize,
        calibrated: bool,
    }

    impl ScriptedAdc {
        fn new(codes: Vec<u16>) -> Self {
            Self {
                codes,
                pos: 0,
                calibrated: false,
            }
        }
    }

    impl AdcSource for ScriptedAdc {
        fn configure(&mut self, _pin: u8) {}

        fn read(&mut self, _pin: u8) -> u16 {
            let code = self.codes.get(self.pos).copied().unwrap_or(2048);
            self.pos += 1;
            code
        }

        fn max_code(&self) -> u16 {
            4095
        }

        fn calibrated_volts(&self, code: u16) -> Option<f32> {
            self.calibrated.then(|| f32::from(code) * 0.001)
        }
    }

    fn config() -> DetectorConfig {
        DetectorConfig::default()
    }

    #[test]
    fn rms_of_unit_sine_is_0_707() {
        let mut tracker = LevelTracker::new();
        for i in 0..RMS_WINDOW {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / RMS_WINDOW as f32;
            tracker.update(phase.sin());
        }
        assert!(
            (tracker.level - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.01,
            "RMS {} != 0.707",
            tracker.level
        );
    }

    #[test]
    fn constant_input_converges_to_zero() {
        // DC-only signal: the blocker and high-pass settle toward silence.
        let mut frontend = AnalogFrontEnd::new(ScriptedAdc::new(vec![3000; 3000]), &config());
        frontend.begin(5);
        let mut last = f32::MAX;
        for _ in 0..3000 {
            last = frontend.read_sample();
        }
        assert!(last.abs() < 1e-3, "residual {last} after settling");
    }

    #[test]
    fn band_pass_prefers_bass_over_treble() {
        let rate = config().sample_rate as f32;
        let run = |freq: f32| -> f32 {
            let mut chain = ChannelChain::new(&config());
            let mut energy = 0.0;
            for i in 0..4000 {
                let x = (2.0 * std::f32::consts::PI * freq * i as f32 / rate).sin();
                let y = chain.process(x);
                if i >= 2000 {
                    energy += y * y;
                }
            }
            energy
        };
        let in_band = run(100.0);
        let out_of_band = run(1000.0);
        assert!(
            in_band > out_of_band * 25.0,
            "in-band {in_band} vs out-of-band {out_of_band}"
        );
    }

    #[test]
    fn out_of_range_code_is_clamped_to_midscale() {
        let mut wild = AnalogFrontEnd::new(ScriptedAdc::new(vec![60000]), &config());
        let mut mid = AnalogFrontEnd::new(ScriptedAdc::new(vec![2047]), &config());
        wild.begin(5);
        mid.begin(5);
        let a = wild.read_sample();
        let b = mid.read_sample();
        assert!((a - b).abs() < f32::EPSILON);
    }

    #[test]
    fn calibration_table_overrides_linear_conversion() {
        let mut adc = ScriptedAdc::new(vec![]);
        adc.calibrated = true;
        let mut frontend = AnalogFrontEnd::new(adc, &config());
        frontend.begin(5);
        assert!(!frontend.is_degraded());
        assert!((frontend.convert(1000) - 1.0).abs() < 1e-6);

        let mut linear = AnalogFrontEnd::new(ScriptedAdc::new(vec![]), &config());
        linear.begin(5);
        assert!((linear.convert(4095) - 3.6).abs() < 1e-6);
    }

    #[test]
    fn stereo_channels_keep_independent_state() {
        // Left sees a step, right sees silence; right output must stay at
        // exactly the silent-chain response.
        let codes: Vec<u16> = (0..200).flat_map(|_| [4000u16, 2048u16]).collect();
        let mut frontend = AnalogFrontEnd::new(ScriptedAdc::new(codes), &config());
        frontend.begin_stereo(5, 6);

        let mut reference = ChannelChain::new(&config());
        let silent_volts = f32::from(2048u16) / 4095.0 * 3.6;

        let (mut left, mut right) = (0.0, 0.0);
        for _ in 0..200 {
            frontend.read_stereo_samples(&mut left, &mut right);
            let expected = reference.process(silent_volts);
            assert!((right - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn reset_calibration_reproduces_level_trace() {
        let samples: Vec<f32> = (0..250)
            .map(|i| (2.0 * std::f32::consts::PI * i as f32 / 50.0).sin() * 0.3)
            .collect();

        let mut frontend = AnalogFrontEnd::new(ScriptedAdc::new(vec![]), &config());
        frontend.begin(5);

        let mut first = Vec::new();
        for &s in &samples {
            frontend.update_level(s);
            first.push(frontend.signal_level());
        }

        frontend.reset_calibration();

        let mut second = Vec::new();
        for &s in &samples {
            frontend.update_level(s);
            second.push(frontend.signal_level());
        }

        assert_eq!(first, second);
    }

    #[test]
    fn normalized_level_is_bounded() {
        let mut tracker = LevelTracker::new();
        assert_eq!(tracker.normalized(), 0.0);
        for _ in 0..RMS_WINDOW {
            tracker.update(0.5);
        }
        let n = tracker.normalized();
        assert!((0.0..=1.0).contains(&n));
        assert!(n > 0.9, "steady signal should normalize near 1, got {n}");
    }

    #[test]
    fn read_before_begin_is_silent() {
        let mut frontend = AnalogFrontEnd::new(ScriptedAdc::new(vec![4000]), &config());
        assert_eq!(frontend.read_sample(), 0.0);
        assert!(!frontend.is_initialized());
    }
}
