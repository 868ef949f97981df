//! Remixing engine for chanmix - overlap-add streaming and channel topology
//!
//! This crate provides the core processing pipeline:
//! - Sizing: window and transform length for a frame duration
//! - Topology: separation, upmix synthesis and output layouts
//! - LFE: spectral low-pass for the synthesized LFE channel
//! - Stages: gain and Hamming window
//! - Engine: the streaming overlap-add loop between a source and a sink

mod buffer;
mod config;
mod engine;
mod error;
mod lfe;
mod sizing;
mod stages;
mod stream;
pub mod topology;
pub mod transform;

pub use buffer::{ChannelBuffer, ChannelSlot, MAX_CHANNELS};
pub use config::{
    ConfigNotice, MixDirection, RemixConfig, DEFAULT_FRAME_DURATION_MS, DEFAULT_OVERLAP_PERCENT,
    DEFAULT_VOLUME,
};
pub use engine::{EngineState, OverlapAddEngine, OverlapState, RunSummary};
pub use error::{RemixError, Result};
pub use lfe::{LfeSynthesizer, LFE_CUTOFF_HZ};
pub use sizing::{SizingPolicy, SizingState, MAX_TRANSFORM_SIZE};
pub use stages::{FrameStage, Gain, HammingWindow};
pub use stream::{AudioSink, AudioSource, MemorySink, MemorySource, StreamSpec};
pub use topology::{ChannelLayout, OutputMap, SpeakerPosition};
pub use transform::RealTransform;
