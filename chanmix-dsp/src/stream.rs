//! Source and sink seams used by the engine

use crate::error::Result;

/// Stream metadata reported by a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: usize,
    /// Total frames, when the container knows it (progress display only)
    pub total_frames: Option<u64>,
}

impl StreamSpec {
    /// Duration in seconds, when the frame count is known
    pub fn duration_secs(&self) -> Option<f64> {
        self.total_frames
            .filter(|_| self.sample_rate > 0)
            .map(|frames| frames as f64 / self.sample_rate as f64)
    }
}

/// Interleaved `f64` frame source
pub trait AudioSource {
    fn spec(&self) -> StreamSpec;

    /// Read up to `max_frames` frames into `buf`
    ///
    /// Returns the number of frames written; 0 means end of stream.
    fn read(&mut self, buf: &mut [f64], max_frames: usize) -> Result<usize>;
}

/// Interleaved `f64` frame sink
pub trait AudioSink {
    /// Write `frames` interleaved frames from `samples`; may block
    fn write(&mut self, samples: &[f64], frames: usize) -> Result<()>;

    /// Flush everything written so far (drain a device, finalize a file)
    fn finish(&mut self) -> Result<()>;
}

impl<S: AudioSource + ?Sized> AudioSource for Box<S> {
    fn spec(&self) -> StreamSpec {
        (**self).spec()
    }

    fn read(&mut self, buf: &mut [f64], max_frames: usize) -> Result<usize> {
        (**self).read(buf, max_frames)
    }
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn write(&mut self, samples: &[f64], frames: usize) -> Result<()> {
        (**self).write(samples, frames)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// In-memory source over interleaved samples
#[derive(Debug, Clone)]
pub struct MemorySource {
    samples: Vec<f64>,
    spec: StreamSpec,
    position: usize,
}

impl MemorySource {
    pub fn new(samples: Vec<f64>, channels: usize, sample_rate: u32) -> Self {
        let frames = if channels == 0 { 0 } else { samples.len() / channels };
        Self {
            samples,
            spec: StreamSpec {
                sample_rate,
                channels,
                total_frames: Some(frames as u64),
            },
            position: 0,
        }
    }
}

impl AudioSource for MemorySource {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn read(&mut self, buf: &mut [f64], max_frames: usize) -> Result<usize> {
        let channels = self.spec.channels.max(1);
        let remaining = (self.samples.len() - self.position) / channels;
        let frames = max_frames.min(remaining).min(buf.len() / channels);
        let len = frames * channels;
        buf[..len].copy_from_slice(&self.samples[self.position..self.position + len]);
        self.position += len;
        Ok(frames)
    }
}

/// In-memory sink collecting everything written
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    channels: usize,
    samples: Vec<f64>,
    finished: bool,
}

impl MemorySink {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            ..Default::default()
        }
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    /// One output channel, de-interleaved
    pub fn channel(&self, index: usize) -> Vec<f64> {
        self.samples
            .iter()
            .skip(index)
            .step_by(self.channels.max(1))
            .copied()
            .collect()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl AudioSink for MemorySink {
    fn write(&mut self, samples: &[f64], frames: usize) -> Result<()> {
        let len = (frames * self.channels).min(samples.len());
        self.samples.extend_from_slice(&samples[..len]);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_reads_in_chunks() {
        let mut source = MemorySource::new((0..10).map(|i| i as f64).collect(), 2, 8000);
        assert_eq!(source.spec().total_frames, Some(5));

        let mut buf = vec![0.0; 6];
        assert_eq!(source.read(&mut buf, 3).unwrap(), 3);
        assert_eq!(buf, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(source.read(&mut buf, 3).unwrap(), 2);
        assert_eq!(&buf[..4], &[6.0, 7.0, 8.0, 9.0]);
        assert_eq!(source.read(&mut buf, 3).unwrap(), 0);
    }

    #[test]
    fn test_memory_sink_channels() {
        let mut sink = MemorySink::new(2);
        sink.write(&[1.0, -1.0, 2.0, -2.0, 9.0, 9.0], 2).unwrap();
        assert_eq!(sink.frames(), 2);
        assert_eq!(sink.channel(0), vec![1.0, 2.0]);
        assert_eq!(sink.channel(1), vec![-1.0, -2.0]);
        assert!(!sink.is_finished());
        sink.finish().unwrap();
        assert!(sink.is_finished());
    }

    #[test]
    fn test_duration() {
        let spec = StreamSpec {
            sample_rate: 8000,
            channels: 1,
            total_frames: Some(16000),
        };
        assert_eq!(spec.duration_secs(), Some(2.0));
    }
}
