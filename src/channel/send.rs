//! Host → device channel

use std::ops::Deref;

use bytemuck::Pod;
use log::trace;

use crate::{
    buffers::{Backing, DEFAULT_SLOT_COUNT},
    config::ChannelConfig,
    device::{ChannelDirection, Device},
    engine::Engine,
    error::{Result, StreamError},
};

use super::SlotChannel;

/// Low-latency stream for sending data from host to device
#[derive(Debug)]
pub struct SendChannel<'e, T, D: Device> {
    core: SlotChannel<'e, T, D>,
}

impl<'e, T: Pod, D: Device> SendChannel<'e, T, D> {
    /// Create a double-buffered send channel on the heap
    pub fn open(engine: &'e Engine<'_, D>, name: &str, slot_length: usize) -> Result<Self> {
        Self::open_with(
            engine,
            name,
            &ChannelConfig::new(slot_length)
                .with_slot_count(DEFAULT_SLOT_COUNT)
                .with_backing(Backing::Heap),
        )
    }

    /// Create a send channel with explicit geometry and backing
    pub fn open_with(engine: &'e Engine<'_, D>, name: &str, config: &ChannelConfig) -> Result<Self> {
        let core = SlotChannel::open(
            engine,
            name,
            ChannelDirection::ToDevice,
            config.slot_length,
            config.slot_count,
            config.backing,
        )?;
        Ok(Self { core })
    }

    /// Send one slot of data if a slot is available.
    ///
    /// Copies exactly `slot_length` elements from the front of `source`;
    /// anything beyond that is ignored. Returns `Ok(false)` without touching
    /// any slot when the device has no free slot.
    pub fn send(&mut self, source: &[T]) -> Result<bool> {
        let len = self.core.slot_length();
        if source.len() < len {
            return Err(StreamError::invalid_parameter(
                "source",
                format!(
                    "{} elements given, slot of stream '{}' needs {}",
                    source.len(),
                    self.core.name,
                    len
                ),
            ));
        }

        self.core.stats.attempts += 1;
        let index = match self.core.device.write_acquire(self.core.id)? {
            Some(index) => index,
            None => return Ok(false),
        };

        self.core.slot_mut(index)?.copy_from_slice(&source[..len]);
        self.core.device.write_commit(self.core.id, 1)?;
        self.core.stats.transferred += 1;
        trace!("sent slot {} on {}", index, self.core.name);
        Ok(true)
    }
}

impl<'e, T, D: Device> Deref for SendChannel<'e, T, D> {
    type Target = SlotChannel<'e, T, D>;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}
