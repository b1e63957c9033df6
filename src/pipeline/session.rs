//! Session assembly: build detectors and emitters from configuration, attach
//! them to a block source, and collect their statistics when done.

use crate::audio::BlockSource;
use crate::config::Config;
use crate::detect::{Detector, PitchTracker, TrillDetector};
use crate::error::{Result, TrillcastError};
use crate::pipeline::driver::{DriverHandle, DriverStats, StreamDriver};
use crate::pipeline::emitter::{SignalEmitter, StdoutEmitter, UdpEmitter};
use crate::pipeline::error::StationError;
use tracing::{info, warn};

/// Which detectors a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Mode {
    /// Pitch tracker and trill detector side by side
    #[default]
    Both,
    /// Pitch tracker only
    Pitch,
    /// Trill detector only
    Trill,
}

impl Mode {
    pub fn pitch(self) -> bool {
        matches!(self, Mode::Both | Mode::Pitch)
    }

    pub fn trill(self) -> bool {
        matches!(self, Mode::Both | Mode::Trill)
    }
}

/// Where a session sends its payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// One datagram per payload to the configured host and port.
    Udp,
    /// One labelled line per payload on stdout.
    Stdout,
}

/// A detector paired with its emitter, ready to be attached to a source.
pub struct PipelineSpec {
    pub detector: Box<dyn Detector>,
    pub emitter: Box<dyn SignalEmitter>,
}

/// Build the detectors `mode` asks for, in pitch-then-trill order.
///
/// # Errors
/// `FilterDesign` when the trill smoothing filter cannot be built.
pub fn build_detectors(
    config: &Config,
    mode: Mode,
    sample_rate: u32,
) -> Result<Vec<Box<dyn Detector>>> {
    let mut detectors: Vec<Box<dyn Detector>> = Vec::new();
    if mode.pitch() {
        detectors.push(Box::new(PitchTracker::new(&config.pitch, sample_rate)));
    }
    if mode.trill() {
        detectors.push(Box::new(TrillDetector::new(&config.trill, sample_rate)?));
    }
    Ok(detectors)
}

/// Build the emitter for one detector.
pub fn build_emitter(
    config: &Config,
    output: Output,
    detector: &dyn Detector,
) -> Result<Box<dyn SignalEmitter>> {
    let name = detector.name();
    match output {
        Output::Stdout => Ok(Box::new(StdoutEmitter::new(name))),
        Output::Udp => {
            let port = if name == "trill" {
                config.emitter.trill_port
            } else {
                config.emitter.pitch_port
            };
            Ok(Box::new(UdpEmitter::new(&config.emitter.host, port)?))
        }
    }
}

/// Pair every detector `mode` asks for with an emitter.
pub fn build_pipelines(
    config: &Config,
    mode: Mode,
    output: Output,
    sample_rate: u32,
) -> Result<Vec<PipelineSpec>> {
    build_detectors(config, mode, sample_rate)?
        .into_iter()
        .map(|detector| {
            let emitter = build_emitter(config, output, detector.as_ref())?;
            Ok(PipelineSpec { detector, emitter })
        })
        .collect()
}

/// Subscribe each pipeline to `source`, spawn its driver, then start the source.
///
/// If the source fails to start, the drivers are wound down before the error
/// is returned.
pub fn start_pipelines(
    source: &mut dyn BlockSource,
    pipelines: Vec<PipelineSpec>,
) -> Result<Vec<DriverHandle>> {
    let mut handles = Vec::with_capacity(pipelines.len());
    for spec in pipelines {
        let events = source.subscribe(spec.detector.block_size());
        let driver = StreamDriver::new(spec.detector, spec.emitter);
        handles.push(driver.spawn(events)?);
    }

    if let Err(e) = source.start() {
        if let Err(stop_err) = source.stop() {
            warn!("failed to release source after start error: {}", stop_err);
        }
        // Drivers see their channels disconnect and exit
        for handle in handles {
            if let Err(join_err) = handle.join() {
                warn!("{}", join_err);
            }
        }
        return Err(e);
    }

    info!(
        pipelines = handles.len(),
        sample_rate = source.sample_rate(),
        channels = source.channels(),
        "source started"
    );
    Ok(handles)
}

/// Wait for every driver and collect its statistics.
///
/// All drivers are joined even when one failed; the first failure is returned.
pub fn finish(handles: Vec<DriverHandle>) -> Result<Vec<DriverStats>> {
    let mut stats = Vec::with_capacity(handles.len());
    let mut first_error = None;

    for handle in handles {
        let name = handle.name();
        match handle.join() {
            Ok(s) => stats.push(s),
            Err(e) => {
                if first_error.is_none() {
                    let message = match e {
                        StationError::Recoverable(m) | StationError::Fatal(m) => m,
                    };
                    first_error = Some(TrillcastError::PipelineFailed {
                        pipeline: name.to_string(),
                        message,
                    });
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}

/// One-line human summary of a pipeline's statistics.
pub fn summarize(stats: &DriverStats) -> String {
    let mut line = format!(
        "{}: {} blocks, {} emitted, {} rejected",
        stats.pipeline,
        stats.blocks,
        stats.emissions,
        stats.total_rejections()
    );
    if !stats.rejections.is_empty() {
        let kinds: Vec<String> = stats
            .rejections
            .iter()
            .map(|(kind, count)| format!("{} {}", kind, count))
            .collect();
        line.push_str(&format!(" ({})", kinds.join(", ")));
    }
    if stats.overflows > 0 {
        line.push_str(&format!(", {} overruns", stats.overflows));
    }
    if stats.dropped > 0 {
        line.push_str(&format!(", {} dropped", stats.dropped));
    }
    if stats.emit_failures > 0 {
        line.push_str(&format!(", {} send failures", stats.emit_failures));
    }
    line
}
