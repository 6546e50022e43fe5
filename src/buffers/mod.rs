//! Aligned slot buffers
//!
//! Every channel owns exactly one [`SlotBuffer`]: a contiguous region of
//! fixed-length slots whose base address satisfies [`SLOT_ALIGNMENT`].

pub mod buffer;
pub mod config;

pub use buffer::SlotBuffer;
pub use config::{Backing, SlotGeometry, DEFAULT_SLOT_COUNT, SLOT_ALIGNMENT};
