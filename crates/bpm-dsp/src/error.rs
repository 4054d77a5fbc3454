use thiserror::Error;

/// Errors originating from the signal pipeline.
///
/// These never surface to detector callers; `detect()` maps them onto the
/// `Error` status for the cycle and carries on.
#[derive(Error, Debug)]
pub enum DspError {
    /// The FFT backend rejected the processing call.
    #[error("Erreur FFT : {0}")]
    Fft(String),

    /// Buffer length does not match the configured FFT size.
    #[error("Longueur de buffer invalide : {got} (attendu {expected})")]
    BufferLength {
        /// Length received.
        got: usize,
        /// Length required by the analyzer.
        expected: usize,
    },
}
