//! Device → host channel

use std::ops::Deref;

use bytemuck::Pod;
use log::{trace, warn};

use crate::{
    buffers::{Backing, DEFAULT_SLOT_COUNT},
    config::ChannelConfig,
    device::{ChannelDirection, Device},
    engine::Engine,
    error::Result,
};

use super::SlotChannel;

/// Low-latency stream for receiving data on the host from the device.
///
/// At most one slot is borrowed from the device at a time: every `recv`
/// first hands back the slot returned by the previous call.
#[derive(Debug)]
pub struct RecvChannel<'e, T, D: Device> {
    core: SlotChannel<'e, T, D>,
    outstanding_discards: usize,
}

impl<'e, T: Pod, D: Device> RecvChannel<'e, T, D> {
    /// Create a double-buffered receive channel on the heap
    pub fn open(engine: &'e Engine<'_, D>, name: &str, slot_length: usize) -> Result<Self> {
        Self::open_with(
            engine,
            name,
            &ChannelConfig::new(slot_length)
                .with_slot_count(DEFAULT_SLOT_COUNT)
                .with_backing(Backing::Heap),
        )
    }

    /// Create a receive channel with explicit geometry and backing
    pub fn open_with(engine: &'e Engine<'_, D>, name: &str, config: &ChannelConfig) -> Result<Self> {
        let core = SlotChannel::open(
            engine,
            name,
            ChannelDirection::FromDevice,
            config.slot_length,
            config.slot_count,
            config.backing,
        )?;
        Ok(Self {
            core,
            outstanding_discards: 0,
        })
    }

    /// Receive one slot if available.
    ///
    /// Returns `Ok(None)` when the device has no filled slot. The returned
    /// records stay valid until the next call or until the channel drops.
    pub fn recv(&mut self) -> Result<Option<&[T]>> {
        self.flush()?;

        self.core.stats.attempts += 1;
        let index = match self.core.device.read(self.core.id)? {
            Some(index) => index,
            None => return Ok(None),
        };

        self.outstanding_discards += 1;
        self.core.stats.transferred += 1;
        trace!("received slot {} on {}", index, self.core.name);
        self.core.slot(index).map(Some)
    }
}

impl<'e, T, D: Device> RecvChannel<'e, T, D> {
    /// Hand every read slot back to the device
    pub fn flush(&mut self) -> Result<()> {
        if self.outstanding_discards > 0 {
            let count = self.outstanding_discards;
            self.core.device.read_discard(self.core.id, count)?;
            self.outstanding_discards = 0;
            self.core.stats.discarded += count as u64;
        }
        Ok(())
    }

    /// Slots read but not yet handed back
    pub fn outstanding_discards(&self) -> usize {
        self.outstanding_discards
    }
}

impl<'e, T, D: Device> Deref for RecvChannel<'e, T, D> {
    type Target = SlotChannel<'e, T, D>;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

impl<'e, T, D: Device> Drop for RecvChannel<'e, T, D> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to discard slots of stream {}: {}", self.core.name, e);
        }
    }
}
