use std::path::PathBuf;

use clap::Parser;

/// Command-line options for the tempo monitor.
#[derive(Parser, Debug)]
#[command(name = "bpm-cli", version, about = "Real-time BPM detection from the microphone")]
pub struct Cli {
    /// Chemin du fichier TOML de configuration.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Detection period in milliseconds.
    #[arg(long, default_value_t = 100)]
    pub interval: u64,

    /// FFT size override (power of two). Defaults to 1024 for microphone
    /// rates, which keeps the bass band several bins wide.
    #[arg(long)]
    pub fft_size: Option<usize>,

    /// Emit one JSON object per reading instead of text.
    #[arg(long)]
    pub json: bool,

    /// Replace the microphone with a synthetic sine at this frequency (Hz).
    #[arg(long)]
    pub test_tone: Option<f32>,

    /// Log level: error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}
