//! Low-latency slot channels between host and device
//!
//! A [`SlotChannel`] owns one [`SlotBuffer`] and the device-side
//! registration built on it. It is never used directly; it is composed into
//! the send-only [`SendChannel`] and receive-only [`RecvChannel`].

pub mod recv;
pub mod send;
pub mod stats;

use std::ptr::NonNull;

use bytemuck::Pod;
use log::{info, warn};

use crate::{
    buffers::{Backing, SlotBuffer, SlotGeometry},
    device::{ChannelDirection, ChannelId, Device},
    engine::Engine,
    error::{Result, StreamError},
};

pub use recv::RecvChannel;
pub use send::SendChannel;
pub use stats::ChannelStats;

/// Shared core of both channel kinds
#[derive(Debug)]
pub struct SlotChannel<'e, T, D: Device> {
    device: &'e D,
    id: ChannelId,
    name: String,
    direction: ChannelDirection,
    buffer: SlotBuffer<T>,
    stats: ChannelStats,
}

impl<'e, T: Pod, D: Device> SlotChannel<'e, T, D> {
    /// Allocate a slot buffer and register it with the engine under `name`
    pub(crate) fn open(
        engine: &'e Engine<'_, D>,
        name: &str,
        direction: ChannelDirection,
        slot_length: usize,
        slot_count: usize,
        backing: Backing,
    ) -> Result<Self> {
        info!("Setting up stream {}", name);

        let geometry = SlotGeometry::with_count::<T>(slot_length, slot_count);
        geometry.validate()?;
        if let Some(max) = engine.constants().max_channel_bytes {
            let bytes = geometry.total_bytes()?;
            if bytes > max {
                return Err(StreamError::configuration(format!(
                    "stream '{}' needs {} bytes of queue, device allows {}",
                    name, bytes, max
                )));
            }
        }

        let buffer = SlotBuffer::<T>::new(slot_length, slot_count, backing)?;
        let device = engine.device();
        let id = unsafe {
            device.register_channel(name, direction, buffer.geometry(), buffer.base_ptr())?
        };

        Ok(Self {
            device,
            id,
            name: name.to_string(),
            direction,
            buffer,
            stats: ChannelStats::new(),
        })
    }

    fn slot(&self, index: usize) -> Result<&[T]> {
        let count = self.buffer.slot_count();
        self.buffer.slot(index).ok_or_else(|| {
            StreamError::device(format!(
                "device returned slot {} of stream '{}' with {} slots",
                index, self.name, count
            ))
        })
    }

    /// Copy of the whole slot region as it is right now.
    ///
    /// Slot memory is shared with the device, so callers only ever get
    /// owned copies of it. Received records come out of `recv`.
    pub fn snapshot(&self) -> Vec<T> {
        self.buffer.as_slice().to_vec()
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut [T]> {
        let count = self.buffer.slot_count();
        let name = &self.name;
        self.buffer.slot_mut(index).ok_or_else(|| {
            StreamError::device(format!(
                "device returned slot {} of stream '{}' with {} slots",
                index, name, count
            ))
        })
    }
}

impl<'e, T, D: Device> SlotChannel<'e, T, D> {
    /// Length of a slot in units of `T`
    pub fn slot_length(&self) -> usize {
        self.buffer.slot_length()
    }

    /// Number of slots available
    pub fn slot_count(&self) -> usize {
        self.buffer.slot_count()
    }

    pub fn geometry(&self) -> SlotGeometry {
        self.buffer.geometry()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn direction(&self) -> ChannelDirection {
        self.direction
    }

    /// Base address registered with the device
    pub fn base_ptr(&self) -> NonNull<u8> {
        self.buffer.base_ptr()
    }

    pub fn backing(&self) -> Backing {
        self.buffer.backing()
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }
}

impl<'e, T, D: Device> Drop for SlotChannel<'e, T, D> {
    fn drop(&mut self) {
        // Unregister before the buffer field is freed
        info!("Releasing stream {}", self.name);
        if let Err(e) = self.device.release_channel(self.id) {
            warn!("Failed to release stream {}: {}", self.name, e);
        }
    }
}
