//! File I/O for chanmix - decoding, WAV output and user defaults

mod config;
mod source;
mod wav;

pub use config::{Config, ConfigFileError};
pub use source::SymphoniaSource;
pub use wav::{to_pcm16, OutputFormat, WavSink};
