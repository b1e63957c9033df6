//! Stream driver: pulls blocks from a source channel, runs one detector on
//! each, and hands any payload to an emitter.

use crate::audio::{AudioBlock, SourceEvent};
use crate::detect::Detector;
use crate::pipeline::emitter::{Delivery, SignalEmitter};
use crate::pipeline::error::{ErrorReporter, LogReporter, StationError};
use crate::pipeline::payload;
use crossbeam_channel::Receiver;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Counters kept by a driver over its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriverStats {
    /// Detector name.
    pub pipeline: String,
    /// Blocks received from the source.
    pub blocks: u64,
    /// Payloads the emitter sent.
    pub emissions: u64,
    /// Payloads the emitter discarded because its output was busy.
    pub dropped: u64,
    /// Payloads the emitter failed to send.
    pub emit_failures: u64,
    /// Blocks that arrived after one or more dropped blocks.
    pub overflows: u64,
    /// Blocks the source could not fill.
    pub underflows: u64,
    /// Rejections by kind.
    pub rejections: BTreeMap<String, u64>,
}

impl DriverStats {
    fn new(pipeline: &str) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            ..Self::default()
        }
    }

    /// Total rejections across all kinds.
    pub fn total_rejections(&self) -> u64 {
        self.rejections.values().sum()
    }
}

/// Connects one detector to one emitter.
///
/// Holds no analysis state of its own: it forwards each block to the detector
/// synchronously, logs status flags and rejections, and sends the payload.
pub struct StreamDriver {
    detector: Box<dyn Detector>,
    emitter: Box<dyn SignalEmitter>,
    reporter: Arc<dyn ErrorReporter>,
    stats: DriverStats,
}

impl StreamDriver {
    pub fn new(detector: Box<dyn Detector>, emitter: Box<dyn SignalEmitter>) -> Self {
        let stats = DriverStats::new(detector.name());
        Self {
            detector,
            emitter,
            reporter: Arc::new(LogReporter),
            stats,
        }
    }

    /// Replace the default [`LogReporter`].
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn name(&self) -> &'static str {
        self.detector.name()
    }

    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }

    /// Process one block end to end.
    pub fn handle_block(&mut self, block: &AudioBlock) {
        let name = self.detector.name();
        self.stats.blocks += 1;

        if block.status.input_overflow {
            self.stats.overflows += 1;
            warn!(pipeline = name, sequence = block.sequence, "input overflow: blocks were dropped");
        }
        if block.status.input_underflow {
            self.stats.underflows += 1;
            warn!(pipeline = name, sequence = block.sequence, "input underflow: short block");
        }

        let detection = self.detector.process(block);

        if let Some(rejection) = &detection.rejection {
            *self
                .stats
                .rejections
                .entry(rejection.kind().to_string())
                .or_default() += 1;
            debug!(pipeline = name, sequence = block.sequence, "{}", rejection);
        }

        let Some(signal) = detection.signal else {
            return;
        };
        let Some(payload) = payload::encode(signal) else {
            debug!(pipeline = name, ?signal, "non-finite value not sent");
            return;
        };

        match self.emitter.send(&payload) {
            Ok(Delivery::Sent) => self.stats.emissions += 1,
            Ok(Delivery::Dropped) => self.stats.dropped += 1,
            Err(e) => {
                self.stats.emit_failures += 1;
                self.reporter
                    .report(name, &StationError::Recoverable(e.to_string()));
            }
        }
    }

    /// Drive until the source channel disconnects or reports a failure.
    ///
    /// A disconnect is a normal end of stream. A `Failed` event is fatal and
    /// is returned as [`StationError::Fatal`].
    pub fn run(mut self, events: Receiver<SourceEvent>) -> Result<DriverStats, StationError> {
        let name = self.detector.name();
        let mut outcome = Ok(());

        while let Ok(event) = events.recv() {
            match event {
                SourceEvent::Block(block) => self.handle_block(&block),
                SourceEvent::Failed(message) => {
                    let error = StationError::Fatal(message);
                    self.reporter.report(name, &error);
                    outcome = Err(error);
                    break;
                }
            }
        }

        self.detector.shutdown();
        info!(
            pipeline = name,
            blocks = self.stats.blocks,
            emissions = self.stats.emissions,
            dropped = self.stats.dropped,
            rejections = self.stats.total_rejections(),
            overflows = self.stats.overflows,
            "pipeline stopped"
        );
        outcome.map(|()| self.stats)
    }

    /// Run on a dedicated thread.
    pub fn spawn(self, events: Receiver<SourceEvent>) -> std::io::Result<DriverHandle> {
        let name = self.detector.name();
        let handle = thread::Builder::new()
            .name(format!("trillcast-{}", name))
            .spawn(move || self.run(events))?;
        Ok(DriverHandle { handle, name })
    }
}

/// Handle to a driver running on its own thread.
pub struct DriverHandle {
    handle: JoinHandle<Result<DriverStats, StationError>>,
    name: &'static str,
}

impl DriverHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the driver to finish.
    ///
    /// A panicked driver thread is reported as a fatal error.
    pub fn join(self) -> Result<DriverStats, StationError> {
        self.handle.join().map_err(|panic_info| {
            let msg = panic_info
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                .unwrap_or("unknown panic");
            StationError::Fatal(format!("{} pipeline thread panicked: {}", self.name, msg))
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::StreamStatus;
    use crate::detect::{Detection, Rejection, Signal};
    use crate::error::{Result, TrillcastError};
    use crate::pipeline::emitter::CollectorEmitter;
    use crossbeam_channel::bounded;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Emits the block sequence number as a pitch, rejects odd blocks.
    struct EvenDetector {
        shutdown_called: Arc<AtomicBool>,
    }

    impl Detector for EvenDetector {
        fn process(&mut self, block: &AudioBlock) -> Detection {
            if block.sequence % 2 == 0 {
                Detection::emit(Signal::Pitch(block.sequence as f64))
            } else {
                Detection::silent(Rejection::InsufficientPeaks { found: 0 })
            }
        }

        fn name(&self) -> &'static str {
            "even"
        }

        fn block_size(&self) -> usize {
            4
        }

        fn shutdown(&mut self) {
            self.shutdown_called.store(true, Ordering::SeqCst);
        }
    }

    struct FailingEmitter;

    impl SignalEmitter for FailingEmitter {
        fn send(&mut self, _payload: &str) -> Result<Delivery> {
            Err(TrillcastError::EmitterSocket {
                message: "network unreachable".to_string(),
            })
        }
    }

    /// Output that is always busy.
    struct BusyEmitter;

    impl SignalEmitter for BusyEmitter {
        fn send(&mut self, _payload: &str) -> Result<Delivery> {
            Ok(Delivery::Dropped)
        }
    }

    #[derive(Default)]
    struct CollectingReporter {
        errors: Mutex<Vec<(String, StationError)>>,
    }

    impl ErrorReporter for CollectingReporter {
        fn report(&self, station: &str, error: &StationError) {
            if let Ok(mut errors) = self.errors.lock() {
                errors.push((station.to_string(), error.clone()));
            }
        }
    }

    fn block(sequence: u64) -> AudioBlock {
        AudioBlock::mono(vec![0.0; 4], sequence)
    }

    fn even_driver(emitter: Box<dyn SignalEmitter>) -> (StreamDriver, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        let detector = EvenDetector {
            shutdown_called: Arc::clone(&flag),
        };
        (StreamDriver::new(Box::new(detector), emitter), flag)
    }

    #[test]
    fn test_forwards_payloads_and_counts_rejections() {
        let emitter = CollectorEmitter::new();
        let payloads = emitter.payloads();
        let (driver, shutdown) = even_driver(Box::new(emitter));

        let (tx, rx) = bounded(8);
        for seq in 0..5 {
            tx.send(SourceEvent::Block(block(seq))).unwrap();
        }
        drop(tx);

        let stats = driver.run(rx).unwrap();
        assert_eq!(stats.pipeline, "even");
        assert_eq!(stats.blocks, 5);
        assert_eq!(stats.emissions, 3);
        assert_eq!(stats.rejections.get("insufficient_peaks"), Some(&2));
        assert_eq!(*payloads.lock().unwrap(), vec!["0.00", "2.00", "4.00"]);
        assert!(shutdown.load(Ordering::SeqCst));
    }

    #[test]
    fn test_counts_status_flags() {
        let (mut driver, _) = even_driver(Box::new(CollectorEmitter::new()));
        driver.handle_block(&block(0).with_status(StreamStatus {
            input_overflow: true,
            input_underflow: false,
        }));
        driver.handle_block(&block(2).with_status(StreamStatus {
            input_overflow: false,
            input_underflow: true,
        }));
        assert_eq!(driver.stats().overflows, 1);
        assert_eq!(driver.stats().underflows, 1);
        assert_eq!(driver.stats().emissions, 2);
    }

    #[test]
    fn test_emitter_failure_is_recoverable() {
        let reporter = Arc::new(CollectingReporter::default());
        let (driver, _) = even_driver(Box::new(FailingEmitter));
        let driver = driver.with_reporter(reporter.clone());

        let (tx, rx) = bounded(4);
        tx.send(SourceEvent::Block(block(0))).unwrap();
        tx.send(SourceEvent::Block(block(2))).unwrap();
        drop(tx);

        let stats = driver.run(rx).unwrap();
        assert_eq!(stats.blocks, 2);
        assert_eq!(stats.emit_failures, 2);

        let errors = reporter.errors.lock().unwrap();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0].1, StationError::Recoverable(_)));
    }

    #[test]
    fn test_dropped_payloads_are_not_counted_as_emitted() {
        let reporter = Arc::new(CollectingReporter::default());
        let (driver, _) = even_driver(Box::new(BusyEmitter));
        let driver = driver.with_reporter(reporter.clone());

        let (tx, rx) = bounded(4);
        for seq in 0..3 {
            tx.send(SourceEvent::Block(block(seq))).unwrap();
        }
        drop(tx);

        let stats = driver.run(rx).unwrap();
        assert_eq!(stats.blocks, 3);
        assert_eq!(stats.emissions, 0);
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.emit_failures, 0);
        assert!(reporter.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_source_failure_is_fatal() {
        let reporter = Arc::new(CollectingReporter::default());
        let (driver, shutdown) = even_driver(Box::new(CollectorEmitter::new()));
        let driver = driver.with_reporter(reporter.clone());

        let (tx, rx) = bounded(4);
        tx.send(SourceEvent::Block(block(0))).unwrap();
        tx.send(SourceEvent::Failed("device unplugged".to_string()))
            .unwrap();
        tx.send(SourceEvent::Block(block(2))).unwrap();

        let result = driver.run(rx);
        assert_eq!(
            result,
            Err(StationError::Fatal("device unplugged".to_string()))
        );
        assert!(shutdown.load(Ordering::SeqCst));
        assert_eq!(reporter.errors.lock().unwrap()[0].0, "even");
    }

    #[test]
    fn test_spawned_driver_ends_when_source_disconnects() {
        let (driver, _) = even_driver(Box::new(CollectorEmitter::new()));
        let (tx, rx) = bounded(4);
        let handle = driver.spawn(rx).unwrap();
        assert_eq!(handle.name(), "even");

        tx.send(SourceEvent::Block(block(0))).unwrap();
        drop(tx);

        let stats = handle.join().unwrap();
        assert_eq!(stats.blocks, 1);
    }

    #[test]
    fn test_stats_serialize_to_json() {
        let mut stats = DriverStats::new("trill");
        stats.blocks = 3;
        stats.rejections.insert("insufficient_peaks".to_string(), 3);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["pipeline"], "trill");
        assert_eq!(json["rejections"]["insufficient_peaks"], 3);
        assert_eq!(stats.total_rejections(), 3);
    }
}
