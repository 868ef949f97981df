//! WAV file sink using hound

use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chanmix_dsp::{AudioSink, RemixError, Result};
use hound::{WavSpec, WavWriter};

/// Sample encoding of the output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// 16-bit signed PCM
    #[default]
    Pcm16,
    /// 32-bit IEEE float
    Float32,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Pcm16 => "pcm16",
            OutputFormat::Float32 => "float32",
        }
    }

    fn wav_spec(self, channels: u16, sample_rate: u32) -> WavSpec {
        let (bits_per_sample, sample_format) = match self {
            OutputFormat::Pcm16 => (16, hound::SampleFormat::Int),
            OutputFormat::Float32 => (32, hound::SampleFormat::Float),
        };
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pcm16" => Ok(OutputFormat::Pcm16),
            "float32" => Ok(OutputFormat::Float32),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// Convert one sample to 16-bit PCM
#[inline]
pub fn to_pcm16(sample: f64) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// Writes interleaved frames to a WAV file
pub struct WavSink {
    path: PathBuf,
    writer: Option<WavWriter<BufWriter<File>>>,
    channels: usize,
    format: OutputFormat,
    frames_written: u64,
}

impl WavSink {
    /// Create `path` for `channels` channels at `sample_rate`
    ///
    /// Only `.wav` output is supported; any other extension is rejected.
    pub fn create(path: &Path, channels: usize, sample_rate: u32, format: OutputFormat) -> Result<Self> {
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if !is_wav {
            return Err(RemixError::io(path, "unsupported output format (only .wav is supported)"));
        }
        if channels == 0 || channels > chanmix_dsp::MAX_CHANNELS {
            return Err(RemixError::UnsupportedChannelCount { count: channels });
        }

        let spec = format.wav_spec(channels as u16, sample_rate);
        let writer = WavWriter::create(path, spec).map_err(|e| RemixError::io(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
            channels,
            format,
            frames_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl AudioSink for WavSink {
    fn write(&mut self, samples: &[f64], frames: usize) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| RemixError::io(&self.path, "write after finish"))?;

        let len = (frames * self.channels).min(samples.len());
        for &sample in &samples[..len] {
            let written = match self.format {
                OutputFormat::Pcm16 => writer.write_sample(to_pcm16(sample)),
                OutputFormat::Float32 => writer.write_sample(sample as f32),
            };
            written.map_err(|e| RemixError::io(&self.path, e))?;
        }

        self.frames_written += (len / self.channels) as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(|e| RemixError::io(&self.path, e))?;
            tracing::debug!(
                "Wrote {} frames to {}",
                self.frames_written,
                self.path.display()
            );
        }
        Ok(())
    }
}
