//! Remix parameters and their validation
//!
//! Every field has a valid range. [`RemixConfig::validate`] replaces anything
//! outside it with the default and reports what it changed; nothing here is
//! ever an error.

use std::fmt;

use crate::buffer::MAX_CHANNELS;

pub const DEFAULT_VOLUME: f64 = 1.0;
pub const DEFAULT_FRAME_DURATION_MS: u32 = 20;
pub const DEFAULT_OVERLAP_PERCENT: u32 = 50;
pub const DEFAULT_PLAYBACK_SPEED: f64 = 1.0;

pub const VOLUME_RANGE: (f64, f64) = (0.0, 2.0);
pub const FRAME_DURATION_RANGE: (u32, u32) = (10, 30);
pub const MAX_OVERLAP_PERCENT: u32 = 99;
pub const PLAYBACK_SPEED_RANGE: (f64, f64) = (0.5, 1.5);

/// User-facing remix parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RemixConfig {
    /// Output channel count; 0 means same as input
    pub output_channels: usize,
    /// Emit only the synthesized LFE channel
    pub lfe_only: bool,
    pub volume: f64,
    pub frame_duration_ms: u32,
    pub overlap_percent: u32,
    /// Output rate multiplier
    pub playback_speed: f64,
    /// Transform length override
    pub transform_size: Option<usize>,
}

impl Default for RemixConfig {
    fn default() -> Self {
        Self {
            output_channels: 0,
            lfe_only: false,
            volume: DEFAULT_VOLUME,
            frame_duration_ms: DEFAULT_FRAME_DURATION_MS,
            overlap_percent: DEFAULT_OVERLAP_PERCENT,
            playback_speed: DEFAULT_PLAYBACK_SPEED,
            transform_size: None,
        }
    }
}

/// A value replaced during validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNotice {
    FrameDuration { requested: u32 },
    Overlap { requested: u32 },
    OutputChannels { requested: usize, input: usize },
    Volume { requested: f64 },
    PlaybackSpeed { requested: f64 },
}

impl fmt::Display for ConfigNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigNotice::FrameDuration { requested } => write!(
                f,
                "Frame duration {} ms is out of range, using {} ms",
                requested, DEFAULT_FRAME_DURATION_MS
            ),
            ConfigNotice::Overlap { requested } => write!(
                f,
                "Overlap {} % is out of range, using {} %",
                requested, DEFAULT_OVERLAP_PERCENT
            ),
            ConfigNotice::OutputChannels { requested, input } => write!(
                f,
                "Output channel count {} is out of range, using input count ({})",
                requested, input
            ),
            ConfigNotice::Volume { requested } => {
                write!(f, "Volume {:.3} is out of range, leaving volume unchanged", requested)
            }
            ConfigNotice::PlaybackSpeed { requested } => write!(
                f,
                "Playback speed {:.3} is out of range, using {:.1}",
                requested, DEFAULT_PLAYBACK_SPEED
            ),
        }
    }
}

/// Relation between input and output channel counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixDirection {
    Upmix,
    Downmix,
    Unchanged,
    LfeOnly,
}

impl MixDirection {
    pub fn label(self) -> &'static str {
        match self {
            MixDirection::Upmix => "upmix",
            MixDirection::Downmix => "downmix",
            MixDirection::Unchanged => "no upmix/downmix",
            MixDirection::LfeOnly => "LFE output only",
        }
    }
}

impl fmt::Display for MixDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn in_range(value: f64, (low, high): (f64, f64)) -> bool {
    // NaN fails both comparisons
    value >= low && value <= high
}

impl RemixConfig {
    /// Replace out-of-range values with defaults
    ///
    /// Output channels of 0 silently take the input count. LFE-only output
    /// forces a single channel.
    pub fn validate(&mut self, input_channels: usize) -> Vec<ConfigNotice> {
        let mut notices = Vec::new();

        let (min_dur, max_dur) = FRAME_DURATION_RANGE;
        if !(min_dur..=max_dur).contains(&self.frame_duration_ms) {
            notices.push(ConfigNotice::FrameDuration {
                requested: self.frame_duration_ms,
            });
            self.frame_duration_ms = DEFAULT_FRAME_DURATION_MS;
        }

        if self.overlap_percent > MAX_OVERLAP_PERCENT {
            notices.push(ConfigNotice::Overlap {
                requested: self.overlap_percent,
            });
            self.overlap_percent = DEFAULT_OVERLAP_PERCENT;
        }

        if self.output_channels > MAX_CHANNELS {
            notices.push(ConfigNotice::OutputChannels {
                requested: self.output_channels,
                input: input_channels,
            });
            self.output_channels = input_channels;
        } else if self.output_channels == 0 {
            self.output_channels = input_channels;
        }

        if self.lfe_only {
            self.output_channels = 1;
        }

        if !in_range(self.volume, VOLUME_RANGE) {
            notices.push(ConfigNotice::Volume {
                requested: self.volume,
            });
            self.volume = DEFAULT_VOLUME;
        }

        if !in_range(self.playback_speed, PLAYBACK_SPEED_RANGE) {
            notices.push(ConfigNotice::PlaybackSpeed {
                requested: self.playback_speed,
            });
            self.playback_speed = DEFAULT_PLAYBACK_SPEED;
        }

        notices
    }

    /// `floor(input_rate * playback_speed)`
    pub fn output_sample_rate(&self, input_rate: u32) -> u32 {
        (input_rate as f64 * self.playback_speed).floor() as u32
    }

    pub fn mix_direction(&self, input_channels: usize) -> MixDirection {
        if self.lfe_only {
            MixDirection::LfeOnly
        } else if self.output_channels > input_channels {
            MixDirection::Upmix
        } else if self.output_channels == input_channels {
            MixDirection::Unchanged
        } else {
            MixDirection::Downmix
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let mut config = RemixConfig::default();
        let notices = config.validate(2);
        assert!(notices.is_empty());
        assert_eq!(config.output_channels, 2);
        assert_eq!(config.frame_duration_ms, 20);
        assert_eq!(config.overlap_percent, 50);
    }

    #[test]
    fn test_out_of_range_values_fall_back() {
        let mut config = RemixConfig {
            output_channels: 9,
            volume: 3.0,
            frame_duration_ms: 45,
            overlap_percent: 120,
            playback_speed: 0.1,
            ..Default::default()
        };
        let notices = config.validate(5);
        assert_eq!(notices.len(), 5);
        assert_eq!(config.output_channels, 5);
        assert_eq!(config.volume, DEFAULT_VOLUME);
        assert_eq!(config.frame_duration_ms, DEFAULT_FRAME_DURATION_MS);
        assert_eq!(config.overlap_percent, DEFAULT_OVERLAP_PERCENT);
        assert_eq!(config.playback_speed, DEFAULT_PLAYBACK_SPEED);
    }

    #[test]
    fn test_zero_overlap_is_valid() {
        let mut config = RemixConfig {
            overlap_percent: 0,
            ..Default::default()
        };
        assert!(config.validate(1).is_empty());
        assert_eq!(config.overlap_percent, 0);
    }

    #[test]
    fn test_nan_volume_rejected() {
        let mut config = RemixConfig {
            volume: f64::NAN,
            ..Default::default()
        };
        assert_eq!(config.validate(2).len(), 1);
        assert_eq!(config.volume, 1.0);
    }

    #[test]
    fn test_lfe_only_forces_mono() {
        let mut config = RemixConfig {
            output_channels: 6,
            lfe_only: true,
            ..Default::default()
        };
        config.validate(2);
        assert_eq!(config.output_channels, 1);
        assert_eq!(config.mix_direction(2), MixDirection::LfeOnly);
    }

    #[test]
    fn test_mix_direction() {
        let mut config = RemixConfig {
            output_channels: 6,
            ..Default::default()
        };
        config.validate(2);
        assert_eq!(config.mix_direction(2).label(), "upmix");
        assert_eq!(config.mix_direction(6).label(), "no upmix/downmix");
        assert_eq!(config.mix_direction(8), MixDirection::Downmix);
    }

    #[test]
    fn test_output_sample_rate() {
        let config = RemixConfig {
            playback_speed: 1.1,
            ..Default::default()
        };
        // 44100 * 1.1 = 48510.000000000004
        assert_eq!(config.output_sample_rate(44100), 48510);
        assert_eq!(RemixConfig::default().output_sample_rate(44100), 44100);
    }

    #[test]
    fn test_notice_text() {
        let notice = ConfigNotice::FrameDuration { requested: 5 };
        assert_eq!(
            notice.to_string(),
            "Frame duration 5 ms is out of range, using 20 ms"
        );
    }
}
