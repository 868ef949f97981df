//! Streaming decoder source using Symphonia

use std::path::{Path, PathBuf};

use chanmix_dsp::{AudioSource, RemixError, Result, StreamSpec};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Audio file decoded packet by packet into interleaved `f64` frames
pub struct SymphoniaSource {
    path: PathBuf,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    spec: StreamSpec,
    /// Decoded samples not yet handed out
    pending: Vec<f64>,
    pending_pos: usize,
    eof: bool,
}

impl SymphoniaSource {
    /// Open and probe an audio file
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| RemixError::io(path, e))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| RemixError::io(path, format!("unrecognized audio file ({})", e)))?;

        let format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| RemixError::io(path, "no audio track found"))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| RemixError::Decode(e.to_string()))?;

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| RemixError::io(path, "unknown sample rate"))?;

        let mut source = Self {
            path: path.to_path_buf(),
            format,
            decoder,
            track_id,
            spec: StreamSpec {
                sample_rate,
                channels: codec_params.channels.map(|c| c.count()).unwrap_or(0),
                total_frames: codec_params.n_frames,
            },
            pending: Vec::new(),
            pending_pos: 0,
            eof: false,
        };

        // Some containers only reveal the channel layout in the first packet
        if source.spec.channels == 0 {
            source.decode_next()?;
            if source.spec.channels == 0 {
                return Err(RemixError::io(path, "unknown channel count"));
            }
        }

        tracing::debug!(
            "Opened {}: {} Hz, {} channels, {:?} frames",
            path.display(),
            source.spec.sample_rate,
            source.spec.channels,
            source.spec.total_frames
        );

        Ok(source)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn pending_frames(&self) -> usize {
        match self.spec.channels {
            0 => 0,
            channels => (self.pending.len() - self.pending_pos) / channels,
        }
    }

    /// Decode the next packet of our track into `pending`
    ///
    /// Returns `false` once the stream is exhausted.
    fn decode_next(&mut self) -> Result<bool> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.eof = true;
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    tracing::debug!("Stream reset requested, treating as end of input");
                    self.eof = true;
                    return Ok(false);
                }
                Err(e) => return Err(RemixError::Decode(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    self.spec.channels = packet_channels(self.spec.channels, spec.channels.count())?;

                    let mut sample_buf = SampleBuffer::<f64>::new(decoded.capacity() as u64, spec);
                    sample_buf.copy_interleaved_ref(decoded);

                    // Drop what was already consumed before appending
                    self.pending.drain(..self.pending_pos);
                    self.pending_pos = 0;
                    self.pending.extend_from_slice(sample_buf.samples());
                    return Ok(true);
                }
                Err(SymphoniaError::DecodeError(msg)) => {
                    tracing::warn!("Skipping corrupt packet in {}: {}", self.path.display(), msg);
                }
                Err(e) => return Err(RemixError::Decode(e.to_string())),
            }
        }
    }
}

/// Channel count after a decoded packet; the layout may not change mid-stream
fn packet_channels(known: usize, decoded: usize) -> Result<usize> {
    if known != 0 && decoded != known {
        return Err(RemixError::Decode(format!(
            "channel count changed from {} to {} mid-stream",
            known, decoded
        )));
    }
    Ok(decoded)
}

impl AudioSource for SymphoniaSource {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn read(&mut self, buf: &mut [f64], max_frames: usize) -> Result<usize> {
        let channels = self.spec.channels;
        let wanted = max_frames.min(buf.len() / channels);

        while self.pending_frames() < wanted && !self.eof {
            self.decode_next()?;
        }

        let frames = wanted.min(self.pending_frames());
        let len = frames * channels;
        buf[..len].copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + len]);
        self.pending_pos += len;
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_wav(name: &str, channels: u16, frames: usize) -> PathBuf {
        let path = std::env::temp_dir().join(format!("chanmix-source-{}-{}.wav", name, std::process::id()));
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..frames {
            for c in 0..channels {
                let value = ((i % 100) as i16 - 50) * 100 * (c as i16 + 1);
                writer.write_sample(value).unwrap();
            }
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn test_reads_every_frame() {
        let path = temp_wav("frames", 2, 1000);
        let mut source = SymphoniaSource::open(&path).unwrap();
        let spec = source.spec();
        assert_eq!(spec.sample_rate, 8000);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.total_frames, Some(1000));

        let mut buf = vec![0.0; 2 * 160];
        let mut total = 0;
        loop {
            let read = source.read(&mut buf, 160).unwrap();
            if read == 0 {
                break;
            }
            total += read;
        }
        assert_eq!(total, 1000);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_samples_are_normalized() {
        let path = temp_wav("values", 2, 10);
        let mut source = SymphoniaSource::open(&path).unwrap();
        let mut buf = vec![0.0; 20];
        assert_eq!(source.read(&mut buf, 10).unwrap(), 10);
        // First frame: -5000 and -10000 as 16-bit
        assert!((buf[0] - (-5000.0 / 32768.0)).abs() < 1e-6);
        assert!((buf[1] - (-10000.0 / 32768.0)).abs() < 1e-6);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_channel_count_change_is_decode_error() {
        assert_eq!(packet_channels(0, 2).unwrap(), 2);
        assert_eq!(packet_channels(6, 6).unwrap(), 6);
        let err = packet_channels(2, 6).unwrap_err();
        assert!(matches!(err, RemixError::Decode(_)));
        assert!(err.to_string().contains("from 2 to 6"));
    }

    #[test]
    fn test_missing_file_names_path() {
        let path = std::env::temp_dir().join("chanmix-does-not-exist.wav");
        let err = SymphoniaSource::open(&path).err().unwrap();
        assert!(err.to_string().contains("chanmix-does-not-exist.wav"));
    }
}
