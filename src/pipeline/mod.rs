//! Detection pipelines.
//!
//! Each pipeline is one detector driven by one thread: a bounded crossbeam
//! channel from the block source feeds a [`StreamDriver`], which runs the
//! detector synchronously and hands payloads to a [`SignalEmitter`].

pub mod driver;
pub mod emitter;
pub mod error;
pub mod payload;
pub mod session;

pub use driver::{DriverHandle, DriverStats, StreamDriver};
pub use emitter::{CollectorEmitter, Delivery, SignalEmitter, StdoutEmitter, UdpEmitter};
pub use error::{ErrorReporter, LogReporter, StationError};
pub use payload::{PayloadError, decode_pitch, decode_trill, encode_pitch, encode_trill};
pub use session::{
    Mode, Output, PipelineSpec, build_detectors, build_emitter, build_pipelines, finish,
    start_pipelines, summarize,
};
