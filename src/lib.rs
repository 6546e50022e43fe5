//! # spdm-stream - Slot-Based Streaming to a Dataflow Device
//!
//! Host side of a signal-detection pipeline: a stack of 16-bit images is
//! streamed pixel by pixel to a dataflow engine, which streams back
//! fixed-layout result records (one per detected signal, plus frame and
//! end-of-run markers).
//!
//! ## Features
//!
//! - **Aligned slot buffers**: 4096-byte aligned, heap or anonymous mmap
//! - **Non-blocking slot channels**: acquire/commit and read/discard protocol
//! - **Single-engine gate**: one loaded engine per process
//! - **Single-threaded orchestration**: active polling, no internal threads
//! - **Simulated device**: in-process engine for tests and benchmarks
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  frames   ┌───────────────────────────────────────┐
//! │ ImageSource  │ ────────▶ │             StreamSession             │
//! └──────────────┘           │  SendChannel<i16>  RecvChannel<Rec>   │
//!                            └───────┬───────────────────▲───────────┘
//!                          from_host │                   │ to_host
//!                                    ▼                   │
//!                            ┌───────────────────────────┴───────────┐
//!                            │  Engine (DeviceConfig + EngineToken)  │
//!                            │        Device: SignalFinder ──▶       │
//!                            │                SignalEstimator        │
//!                            └───────────────────────────────────────┘
//!                                                        │ records
//!                                                        ▼
//!                                                 ┌────────────┐
//!                                                 │ ResultSink │
//!                                                 └────────────┘
//! ```

// Core modules
pub mod buffers;
pub mod channel;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod record;

// Host pipeline
pub mod image;
pub mod report;
pub mod stream;

// Main API re-exports
pub use buffers::{Backing, SlotBuffer, SlotGeometry, SLOT_ALIGNMENT};
pub use channel::{ChannelStats, RecvChannel, SendChannel, SlotChannel};
pub use config::{ChannelConfig, Scalars, SessionConfig};
pub use device::{
    Actions, ChannelDirection, ChannelId, Device, DeviceConstants, ScalarValue, SimulatedDevice,
    SimulatedDeviceBuilder, SimulatedStats, FROM_HOST, TO_HOST,
};
pub use engine::{DeviceConfig, Engine, EngineToken};
pub use error::{Result, StreamError};
pub use image::{
    Frame, ImageSource, MemoryImageSource, RawStackSource, SyntheticSource, TiffStackSource,
};
pub use record::{end_of_results, ResultRecord, END_OF_IMAGE, LAST_PIXEL};
pub use report::{CollectSink, ResultSink, TsvReport};
pub use stream::{run_session, PollOutcome, StreamSession, StreamState, StreamStats};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Mutex, MutexGuard};

    static ENGINE_LOCK: Mutex<()> = Mutex::new(());

    /// Serialize tests that load an engine
    pub fn engine_lock() -> MutexGuard<'static, ()> {
        ENGINE_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }
}
