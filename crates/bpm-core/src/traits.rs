use std::time::Instant;

/// Fournit des codes ADC bruts au front-end analogique.
///
/// Chaque détecteur possède sa propre instance, injectée à la construction —
/// pas de singleton global. Implémenté par les couches plateforme (ADC
/// matériel, capture micro, générateurs de test).
///
/// # Example
/// ```
/// use bpm_core::traits::AdcSource;
///
/// struct MidscaleAdc;
/// impl AdcSource for MidscaleAdc {
///     fn configure(&mut self, _pin: u8) {}
///     fn read(&mut self, _pin: u8) -> u16 { 2048 }
///     fn max_code(&self) -> u16 { 4095 }
/// }
/// ```
pub trait AdcSource: Send + 'static {
    /// Configure the channel (resolution, attenuation). Idempotent.
    fn configure(&mut self, pin: u8);

    /// Read one raw code from the channel.
    ///
    /// CONTRAT : synchrone et borné — jamais bloquant. Une valeur hors
    /// `[0, max_code]` est tolérée ; le front-end la remplace.
    fn read(&mut self, pin: u8) -> u16;

    /// Largest valid code (4095 for a 12-bit converter).
    fn max_code(&self) -> u16;

    /// Full-scale input voltage for the configured attenuation.
    fn full_scale_volts(&self) -> f32 {
        3.6
    }

    /// Board calibration curve: measured volts for `code`.
    ///
    /// `None` means no calibration data; the front end falls back to the
    /// linear `code / max_code * full_scale` conversion.
    fn calibrated_volts(&self, _code: u16) -> Option<f32> {
        None
    }
}

/// Horloge milliseconde monotone.
///
/// Le détecteur horodate les battements avec `now_ms()` ; les tests
/// injectent une horloge scriptée pour un timing déterministe.
pub trait MonotonicClock: Send + 'static {
    /// Milliseconds elapsed since an arbitrary fixed origin. Never decreases.
    fn now_ms(&self) -> u64;
}

/// [`MonotonicClock`] backed by `std::time::Instant`.
///
/// # Example
/// ```
/// use bpm_core::traits::{MonotonicClock, SystemClock};
/// let clock = SystemClock::new();
/// let t0 = clock.now_ms();
/// assert!(clock.now_ms() >= t0);
/// ```
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock with its origin at the call time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }

    #[test]
    fn default_calibration_is_absent() {
        struct Plain;
        impl AdcSource for Plain {
            fn configure(&mut self, _pin: u8) {}
            fn read(&mut self, _pin: u8) -> u16 {
                0
            }
            fn max_code(&self) -> u16 {
                4095
            }
        }
        let adc = Plain;
        assert!(adc.calibrated_volts(2048).is_none());
        assert!((adc.full_scale_volts() - 3.6).abs() < f32::EPSILON);
    }
}
