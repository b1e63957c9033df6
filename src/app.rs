//! Application entry points.
//!
//! Orchestrates the complete capture flow:
//! capture → detect → emit

use crate::audio::capture::{CpalBlockSource, suppress_audio_warnings};
use crate::audio::{BlockSource, WavBlockSource};
use crate::config::Config;
use crate::error::{Result, TrillcastError};
use crate::pipeline::{
    DriverHandle, DriverStats, Mode, Output, build_pipelines, finish, start_pipelines, summarize,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// How often the capture loop checks whether a pipeline has ended on its own.
const PIPELINE_POLL: Duration = Duration::from_millis(200);

/// Capture from the configured input device until Ctrl+C or a fatal stream error.
///
/// # Arguments
/// * `config` - Validated configuration
/// * `mode` - Which detectors to run
/// * `audio_host` - Optional cpal host override (ALSA, JACK, ...)
/// * `quiet` - Suppress status messages
pub async fn run_capture_command(
    config: Config,
    mode: Mode,
    audio_host: Option<&str>,
    quiet: bool,
) -> Result<()> {
    // Suppress noisy JACK/ALSA warnings before audio init
    suppress_audio_warnings();

    let mut source = CpalBlockSource::new(
        audio_host,
        config.audio.device.as_deref(),
        config.audio.sample_rate,
        config.audio.channels,
    )?;

    let pipelines = build_pipelines(&config, mode, Output::Udp, source.sample_rate())?;
    let handles = start_pipelines(&mut source, pipelines)?;

    if !quiet {
        print_destinations(&config, mode);
        eprintln!("Listening. Press Ctrl+C to stop.");
    }

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|e| TrillcastError::Other(format!("Failed to wait for Ctrl+C: {}", e)))?;
            if !quiet {
                eprintln!("\nShutting down...");
            }
        }
        _ = any_finished(&handles) => {
            info!("a pipeline ended, stopping capture");
        }
    }

    // Stopping the source disconnects every pipeline channel
    source.stop()?;
    let stats = finish(handles)?;
    report(&stats, quiet, false)
}

/// Replay a WAV file (or stdin for `-`) through the detectors.
///
/// The file must be recorded at the configured sample rate; no resampling is
/// performed.
pub fn run_analyze_command(
    config: &Config,
    file: &Path,
    mode: Mode,
    output: Output,
    quiet: bool,
    json: bool,
) -> Result<()> {
    let mut source = if file == Path::new("-") {
        WavBlockSource::from_stdin()?
    } else {
        WavBlockSource::open(file)?
    };
    source.require_sample_rate(config.audio.sample_rate)?;

    if !quiet {
        eprintln!(
            "Analysing {:.1}s of audio ({} Hz, {} channel(s))",
            source.duration_secs(),
            source.sample_rate(),
            source.channels()
        );
    }

    let stats = analyze_source(config, &mut source, mode, output)?;
    report(&stats, quiet, json)
}

/// Run the detectors over a finite source and wait for it to drain.
pub fn analyze_source(
    config: &Config,
    source: &mut dyn BlockSource,
    mode: Mode,
    output: Output,
) -> Result<Vec<DriverStats>> {
    let pipelines = build_pipelines(config, mode, output, source.sample_rate())?;
    let handles = start_pipelines(source, pipelines)?;
    // Finite sources close their channels once drained
    let stats = finish(handles);
    source.stop()?;
    stats
}

async fn any_finished(handles: &[DriverHandle]) {
    loop {
        if handles.iter().any(DriverHandle::is_finished) {
            return;
        }
        tokio::time::sleep(PIPELINE_POLL).await;
    }
}

fn print_destinations(config: &Config, mode: Mode) {
    if mode.pitch() {
        eprintln!(
            "pitch → {}:{}",
            config.emitter.host, config.emitter.pitch_port
        );
    }
    if mode.trill() {
        eprintln!(
            "trill → {}:{}",
            config.emitter.host, config.emitter.trill_port
        );
    }
}

fn report(stats: &[DriverStats], quiet: bool, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(stats)
            .map_err(|e| TrillcastError::Other(format!("Failed to serialize stats: {}", e)))?;
        println!("{}", text);
    } else if !quiet {
        for s in stats {
            eprintln!("{}", summarize(s));
        }
    }
    Ok(())
}
