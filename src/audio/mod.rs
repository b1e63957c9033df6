//! Audio input: block framing and the sources that deliver blocks.

pub mod block;
#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod source;
pub mod wav;

pub use block::{AudioBlock, BlockFramer, StreamStatus};
pub use source::{BlockSource, MockBlockSource, SourceEvent};
pub use wav::WavBlockSource;
