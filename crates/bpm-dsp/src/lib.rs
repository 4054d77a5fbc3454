// Acoustic signal pipeline for beatsense: front-end conditioning, windowed
// spectral analysis, envelope beat tracking, and tempo estimation.

pub mod detector;
pub mod envelope;
pub mod error;
pub mod frontend;
pub mod spectrum;
pub mod tempo;
pub mod window;

pub use detector::BpmDetector;
pub use error::DspError;
pub use frontend::AnalogFrontEnd;
pub use spectrum::SpectrumAnalyzer;
pub use window::SampleWindow;
