use realfft::RealFftPlanner;

use crate::error::DspError;

/// Windowed real-FFT magnitude analyzer.
///
/// Pre-allocates the FFT plan and scratch buffers for a zero-allocation hot
/// path; they live as long as the detector.
///
/// # Example
/// ```
/// use bpm_dsp::spectrum::SpectrumAnalyzer;
/// let analyzer = SpectrumAnalyzer::new(512);
/// assert_eq!(analyzer.fft_size(), 512);
/// ```
pub struct SpectrumAnalyzer {
    fft_size: usize,
    plan: std::sync::Arc<dyn realfft::RealToComplex<f32>>,
    input_buf: Vec<f32>,
    spectrum_buf: Vec<realfft::num_complex::Complex<f32>>,
    scratch: Vec<realfft::num_complex::Complex<f32>>,
    /// Hamming window coefficients.
    window: Vec<f32>,
}

impl SpectrumAnalyzer {
    /// Create an analyzer for the given FFT size.
    ///
    /// # Panics
    /// Panics if `size` is 0. Detector construction validates the size
    /// (power of two, bounded) before reaching here.
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "FFT size must be > 0");

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);

        let input_buf = plan.make_input_vec();
        let spectrum_buf = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        // Hamming window
        let window: Vec<f32> = (0..size)
            .map(|i| {
                0.54 - 0.46
                    * (2.0 * std::f32::consts::PI * i as f32 / (size as f32 - 1.0)).cos()
            })
            .collect();

        Self {
            fft_size: size,
            plan,
            input_buf,
            spectrum_buf,
            scratch,
            window,
        }
    }

    /// Compute the magnitude spectrum of one sample frame.
    ///
    /// `samples` must hold exactly `fft_size` values; `out` receives the
    /// unnormalized magnitude of the first `fft_size / 2` bins. Bin `i`
    /// corresponds to `i * sample_rate / fft_size` Hz.
    ///
    /// # Errors
    /// Returns [`DspError`] on a length mismatch or FFT backend failure; the
    /// caller skips the cycle.
    pub fn analyze(&mut self, samples: &[f32], out: &mut [f32]) -> Result<(), DspError> {
        if samples.len() != self.fft_size {
            return Err(DspError::BufferLength {
                got: samples.len(),
                expected: self.fft_size,
            });
        }
        if out.len() != self.fft_size / 2 {
            return Err(DspError::BufferLength {
                got: out.len(),
                expected: self.fft_size / 2,
            });
        }

        for (slot, (&sample, &coeff)) in self
            .input_buf
            .iter_mut()
            .zip(samples.iter().zip(self.window.iter()))
        {
            *slot = sample * coeff;
        }

        self.plan
            .process_with_scratch(&mut self.input_buf, &mut self.spectrum_buf, &mut self.scratch)
            .map_err(|e| DspError::Fft(e.to_string()))?;

        for (slot, c) in out.iter_mut().zip(self.spectrum_buf.iter()) {
            *slot = (c.re * c.re + c.im * c.im).sqrt();
        }

        Ok(())
    }

    /// FFT window size.
    #[must_use]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_frame(freq: f32, sample_rate: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    fn peak_bin(spectrum: &[f32]) -> usize {
        spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map_or(0, |(i, _)| i)
    }

    #[test]
    fn sine_peaks_within_one_bin() {
        let sample_rate = 8000.0;
        let n = 512;
        let mut analyzer = SpectrumAnalyzer::new(n);
        let mut out = vec![0.0f32; n / 2];

        // 125 Hz lands exactly on bin 8 at 8 kHz / 512.
        let frame = sine_frame(125.0, sample_rate, n);
        analyzer.analyze(&frame, &mut out).unwrap();
        let expected = (125.0 / (sample_rate / n as f32)).round() as usize;
        let got = peak_bin(&out);
        assert!(
            got.abs_diff(expected) <= 1,
            "peak at bin {got}, expected {expected}±1"
        );

        // Off-grid frequency still localizes to the nearest bin.
        let frame = sine_frame(93.0, sample_rate, n);
        analyzer.analyze(&frame, &mut out).unwrap();
        let expected = (93.0 / (sample_rate / n as f32)).round() as usize;
        let got = peak_bin(&out);
        assert!(got.abs_diff(expected) <= 1);
    }

    #[test]
    fn rejects_wrong_frame_length() {
        let mut analyzer = SpectrumAnalyzer::new(256);
        let frame = vec![0.0f32; 255];
        let mut out = vec![0.0f32; 128];
        assert!(matches!(
            analyzer.analyze(&frame, &mut out),
            Err(DspError::BufferLength { got: 255, expected: 256 })
        ));
    }

    #[test]
    fn silence_yields_zero_spectrum() {
        let mut analyzer = SpectrumAnalyzer::new(256);
        let frame = vec![0.0f32; 256];
        let mut out = vec![1.0f32; 128];
        analyzer.analyze(&frame, &mut out).unwrap();
        assert!(out.iter().all(|&m| m.abs() < 1e-6));
    }
}
