use thiserror::Error;

/// Errors rejected at detector construction time.
///
/// Everything past construction is reported through the `status` field of a
/// reading, never as an error value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// FFT size is not a power of two.
    #[error("Taille FFT invalide : {size} (doit être une puissance de deux)")]
    FftSizeNotPowerOfTwo {
        /// The rejected size.
        size: usize,
    },

    /// FFT size outside the supported range.
    #[error("Taille FFT hors limites : {size} (supportée : {min}–{max})")]
    FftSizeOutOfRange {
        /// The rejected size.
        size: usize,
        /// Smallest supported size.
        min: usize,
        /// Largest supported size.
        max: usize,
    },

    /// Sample rate outside the supported range.
    #[error("Fréquence d'échantillonnage invalide : {rate} Hz (supportée : 8000–48000)")]
    SampleRateOutOfRange {
        /// The rejected rate in Hz.
        rate: u32,
    },

    /// BPM bounds are inverted or non-positive.
    #[error("Plage BPM invalide : {min}–{max}")]
    InvalidBpmRange {
        /// Lower bound.
        min: f32,
        /// Upper bound.
        max: f32,
    },

    /// Beat interval bounds are inverted or zero.
    #[error("Plage d'intervalle invalide : {min}–{max} ms")]
    InvalidBeatInterval {
        /// Lower bound in milliseconds.
        min: u64,
        /// Upper bound in milliseconds.
        max: u64,
    },

    /// Bass band is inverted or extends past Nyquist.
    #[error("Bande de basses invalide : {min}–{max} Hz (Nyquist : {nyquist} Hz)")]
    InvalidBassBand {
        /// Lower edge in Hz.
        min: f32,
        /// Upper edge in Hz.
        max: f32,
        /// Nyquist frequency for the configured rate.
        nyquist: f32,
    },

    /// Beat history capacity of zero.
    #[error("Capacité d'historique nulle")]
    EmptyBeatHistory,
}
