use anyhow::Result;
use bpm_core::traits::AdcSource;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, RingBuffer};

/// Largest code of the emulated 12-bit converter.
const MAX_CODE: u16 = 4095;
/// Code for a silent (centered) input.
const MIDSCALE: u16 = 2048;

/// Microphone capture via cpal.
///
/// Writes mono f32 samples into a lock-free ring buffer; the paired
/// [`CapturedAdc`] drains it on the analysis thread. Keep the capture alive
/// for as long as the detector runs.
pub struct MicCapture {
    /// Kept alive for the duration of the capture; dropping it stops cpal.
    _stream: cpal::Stream,
    sample_rate: u32,
}

impl MicCapture {
    /// Start capturing from the default input device.
    ///
    /// # Errors
    /// Returns an error if no input device is available or the stream fails
    /// to start.
    pub fn start_default() -> Result<(Self, CapturedAdc)> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow::anyhow!("Pas de périphérique audio trouvé"))?;

        let config = device.default_input_config()?;
        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;

        // Ring buffer: 2 seconds of audio @ sample_rate
        let buf_size = sample_rate as usize * 2;
        let (mut producer, consumer) = RingBuffer::new(buf_size);

        let stream = device.build_input_stream(
            &config.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Downmix to mono and push into ring buffer
                for chunk in data.chunks(channels) {
                    let mono: f32 = chunk.iter().sum::<f32>() / channels as f32;
                    let _ = producer.push(mono);
                }
            },
            |err| {
                log::error!("Audio stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        log::info!("Microphone capture started @ {sample_rate}Hz");

        Ok((
            Self {
                _stream: stream,
                sample_rate,
            },
            CapturedAdc {
                consumer,
                last_code: MIDSCALE,
            },
        ))
    }

    /// Device sample rate in Hz.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Presents captured microphone samples to the detector as a 12-bit ADC.
///
/// Each normalized sample in [−1, 1] is quantized onto `[0, MAX_CODE]`
/// around midscale — the same shape a biased electret front end feeds a
/// real converter. When the ring buffer runs dry the last code is held.
pub struct CapturedAdc {
    consumer: Consumer<f32>,
    last_code: u16,
}

impl AdcSource for CapturedAdc {
    fn configure(&mut self, pin: u8) {
        log::debug!("Emulated ADC configured on pin {pin}");
    }

    fn read(&mut self, _pin: u8) -> u16 {
        if let Ok(sample) = self.consumer.pop() {
            let centered = (sample.clamp(-1.0, 1.0) + 1.0) * 0.5;
            self.last_code = (centered * f32::from(MAX_CODE)) as u16;
        }
        self.last_code
    }

    fn max_code(&self) -> u16 {
        MAX_CODE
    }
}

/// ADC stand-in for test-tone runs: permanently silent midscale.
pub struct SilentAdc;

impl AdcSource for SilentAdc {
    fn configure(&mut self, _pin: u8) {}

    fn read(&mut self, _pin: u8) -> u16 {
        MIDSCALE
    }

    fn max_code(&self) -> u16 {
        MAX_CODE
    }
}
