//! Command line arguments

use std::path::PathBuf;

use chanmix_dsp::RemixConfig;
use chanmix_io::{Config, OutputFormat};
use clap::{Parser, ValueEnum};

/// Multichannel upmix/downmix with overlap-add reconstruction
#[derive(Parser, Debug)]
#[command(name = "chanmix", version, about)]
pub struct Cli {
    /// Input audio file
    pub input: PathBuf,

    /// Output WAV file; plays on the default device when omitted
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output channel count (1-6, default: same as input)
    #[arg(long, value_name = "N")]
    pub channels: Option<usize>,

    /// Output only the synthesized LFE channel
    #[arg(long)]
    pub lfe_only: bool,

    /// Volume (0.0-2.0, 0.0 is silence)
    #[arg(long, value_name = "GAIN")]
    pub volume: Option<f64>,

    /// Frame duration in milliseconds (10-30)
    #[arg(long = "frame-dur", value_name = "MS")]
    pub frame_duration: Option<u32>,

    /// Frame overlap in percent (0-99, 0 is no overlap)
    #[arg(long, value_name = "PERCENT")]
    pub overlap: Option<u32>,

    /// Playback speed (0.5-1.5), scales the output sample rate
    #[arg(long, value_name = "FACTOR")]
    pub playback_speed: Option<f64>,

    /// Transform length override (at least one frame, at most 2048)
    #[arg(long, value_name = "N")]
    pub transform_size: Option<usize>,

    /// Output sample format
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Defaults file (default: <config dir>/chanmix/config.txt)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Store frame duration, overlap, volume and format as defaults
    #[arg(long)]
    pub save_defaults: bool,

    /// Print a status report and progress details
    #[arg(short, long)]
    pub verbose: bool,
}

/// WAV sample format choices
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Pcm16,
    Float32,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Pcm16 => OutputFormat::Pcm16,
            FormatArg::Float32 => OutputFormat::Float32,
        }
    }
}

impl Cli {
    /// Remix parameters, with `defaults` filling unspecified options
    pub fn remix_config(&self, defaults: &Config) -> RemixConfig {
        let base = RemixConfig::default();
        RemixConfig {
            output_channels: self.channels.unwrap_or(0),
            lfe_only: self.lfe_only,
            volume: self.volume.or(defaults.volume).unwrap_or(base.volume),
            frame_duration_ms: self
                .frame_duration
                .or(defaults.frame_duration)
                .unwrap_or(base.frame_duration_ms),
            overlap_percent: self
                .overlap
                .or(defaults.overlap)
                .unwrap_or(base.overlap_percent),
            playback_speed: self.playback_speed.unwrap_or(base.playback_speed),
            transform_size: self.transform_size,
        }
    }

    pub fn output_format(&self, defaults: &Config) -> OutputFormat {
        self.format
            .map(OutputFormat::from)
            .or(defaults.format)
            .unwrap_or_default()
    }

    /// Defaults worth persisting from this invocation
    pub fn to_defaults(&self, current: &Config) -> Config {
        Config {
            frame_duration: self.frame_duration.or(current.frame_duration),
            overlap: self.overlap.or(current.overlap),
            volume: self.volume.or(current.volume),
            format: self.format.map(OutputFormat::from).or(current.format),
        }
    }
}
