//! chanmix - multichannel upmix/downmix
//!
//! Streams an audio file through the overlap-add remixing engine into a WAV
//! file or the default playback device.

mod cli;
mod device;
mod progress;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chanmix_dsp::{AudioSink, AudioSource, OverlapAddEngine, RemixConfig, StreamSpec};
use chanmix_io::{Config, SymphoniaSource, WavSink};

use cli::Cli;
use device::DeviceSink;
use progress::{format_time, ProgressLine};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Log to stderr; `RUST_LOG` overrides the level chosen by `--verbose`
fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let defaults = match &cli.config {
        Some(path) => Config::load_or_default(path)?,
        None => Config::load(),
    };

    if cli.save_defaults {
        let saved = cli.to_defaults(&defaults);
        let path = match &cli.config {
            Some(path) => {
                saved.save_to(path)?;
                path.clone()
            }
            None => saved.save()?,
        };
        tracing::info!("Saved defaults to {}", path.display());
    }

    let mut source = SymphoniaSource::open(&cli.input).context("Cannot open input")?;
    let spec = source.spec();

    let mut config = cli.remix_config(&defaults);
    for notice in config.validate(spec.channels) {
        tracing::warn!("{}", notice);
    }

    let engine = OverlapAddEngine::new(&config, spec).context("Cannot set up processing")?;
    let output_rate = config.output_sample_rate(spec.sample_rate);
    log_status(cli, &spec, &config, &engine, output_rate);

    let mut sink: Box<dyn AudioSink> = match &cli.output {
        Some(path) => {
            let format = cli.output_format(&defaults);
            let sink = WavSink::create(path, engine.output_channels(), output_rate, format)
                .context("Cannot create output")?;
            Box::new(sink)
        }
        None => {
            let positions = engine.layout().positions(config.lfe_only);
            let sink = DeviceSink::open(engine.output_channels(), output_rate, &positions)
                .context("Cannot open audio device")?;
            Box::new(sink)
        }
    };

    let mut progress = ProgressLine::new(spec.sample_rate);
    let summary = engine
        .run(&mut source, sink.as_mut(), |frames| progress.update(frames))
        .with_context(|| format!("Processing of '{}' failed", cli.input.display()))?;
    progress.finish(summary.frames_read);

    tracing::info!(
        "Processed {} of audio",
        format_time(summary.frames_read, spec.sample_rate)
    );
    tracing::info!("End of processing.");
    Ok(())
}

/// Status report shown with `--verbose`
fn log_status(cli: &Cli, spec: &StreamSpec, config: &RemixConfig, engine: &OverlapAddEngine, output_rate: u32) {
    tracing::info!("Input file: {}", cli.input.display());
    if let Some(frames) = spec.total_frames {
        tracing::info!("Duration: {}", format_time(frames, spec.sample_rate));
    }
    tracing::info!("Sample rate of input audio: {} Hz", spec.sample_rate);
    tracing::info!("Input channels: {}", spec.channels);
    match &cli.output {
        Some(path) => tracing::info!("Output file: {}", path.display()),
        None => tracing::info!("Output: default audio device"),
    }
    tracing::info!("Playback speed of output audio: {:.2} X", config.playback_speed);
    tracing::info!("Sample rate of output audio: {} Hz", output_rate);
    tracing::info!(
        "Output channels: {} ({})",
        engine.output_channels(),
        config.mix_direction(spec.channels)
    );
    tracing::info!("Volume: {:.3}", config.volume);
    tracing::info!("Frame duration: {} ms", engine.sizing().frame_duration_ms);
    tracing::info!("Overlap: {} %", config.overlap_percent);
}
