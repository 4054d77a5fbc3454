use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use bpm_core::config::{DetectorConfig, load_config};
use bpm_core::reading::BpmReading;
use bpm_core::traits::{AdcSource, SystemClock};
use bpm_dsp::detector::BpmDetector;
use clap::Parser;
use triple_buffer::TripleBuffer;

pub mod capture;
pub mod cli;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Charger la config
    let mut config = match cli.config.as_deref() {
        Some(path) => load_config(path)?,
        None => DetectorConfig::default(),
    };

    // 4. Construire le détecteur et lancer la boucle d'analyse
    if let Some(freq) = cli.test_tone {
        if let Some(fft_size) = cli.fft_size {
            config.fft_size = fft_size;
        }
        let mut detector = BpmDetector::new(capture::SilentAdc, SystemClock::new(), config)?;
        detector.enable_test_mode(freq);
        run(detector, cli.interval, cli.json)
    } else {
        let (mic, adc) = capture::MicCapture::start_default()?;
        // The detector has to run at the device rate for the bin → Hz
        // mapping to hold.
        config.sample_rate = mic.sample_rate().clamp(8000, 48000);
        config.fft_size = cli.fft_size.unwrap_or(1024);
        let mut detector = BpmDetector::new(adc, SystemClock::new(), config)?;
        detector.begin_mono(0);
        // `mic` owns the cpal stream; it must outlive the print loop.
        let _mic = mic;
        run(detector, cli.interval, cli.json)
    }
}

/// Drive sampling + detection on a dedicated thread and print readings.
fn run<A: AdcSource>(
    mut detector: BpmDetector<A, SystemClock>,
    interval_ms: u64,
    json: bool,
) -> Result<()> {
    let sample_rate = detector.config().sample_rate;
    let period = Duration::from_millis(interval_ms.max(10));
    let (mut buf_input, mut buf_output) = TripleBuffer::new(&BpmReading::default()).split();

    thread::Builder::new()
        .name("bpm-analysis".to_string())
        .spawn(move || {
            let started = Instant::now();
            let mut last_detect = Instant::now();
            let mut sampled: u64 = 0;
            loop {
                // Pace sampling against the wall clock so the window covers
                // real time even when the ring buffer delivers in bursts.
                let due = started.elapsed().as_secs_f64() * f64::from(sample_rate);
                while (sampled as f64) < due {
                    detector.sample();
                    sampled += 1;
                }
                if last_detect.elapsed() >= period {
                    last_detect = Instant::now();
                    buf_input.write(detector.detect());
                }
                thread::sleep(Duration::from_millis(2));
            }
        })?;

    loop {
        thread::sleep(period);
        let reading = buf_output.read();
        if json {
            println!("{}", serde_json::to_string(reading)?);
        } else {
            println!(
                "[{}] bpm={:6.1}  confidence={:.2}  level={:.3}",
                reading.status, reading.bpm, reading.confidence, reading.signal_level
            );
        }
    }
}
