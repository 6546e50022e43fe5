//! Dataflow engine capability
//!
//! The accelerator is external to this crate. Everything the host needs from
//! it is captured by the [`Device`] trait: reading compile-time constants,
//! loading and configuring the engine with named scalars, and the
//! non-blocking slot protocol on named channels.
//!
//! ```text
//!   host                                  device
//!   ────                                  ──────
//!   write_acquire ──► free slot index
//!   copy pixels into slot
//!   write_commit  ──────────────────────► consumes slot, frees it
//!
//!                                         fills slot with records
//!   read          ◄── filled slot index
//!   use records
//!   read_discard  ──────────────────────► slot may be refilled
//! ```

pub mod actions;
pub mod estimator;
pub mod simulated;

use std::ptr::NonNull;

use crate::{buffers::SlotGeometry, error::Result};

pub use actions::{Actions, ScalarValue};
pub use simulated::{SimulatedDevice, SimulatedDeviceBuilder, SimulatedStats};

/// Name of the host → device pixel channel
pub const FROM_HOST: &str = "from_host";

/// Name of the device → host result channel
pub const TO_HOST: &str = "to_host";

/// Opaque handle of a registered channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u32);

/// Direction of a channel as seen from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelDirection {
    /// Host writes, device reads
    ToDevice,
    /// Device writes, host reads
    FromDevice,
}

/// Constants compiled into the device configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConstants {
    /// Maximum width of each image frame
    pub max_img_width: usize,
    /// Maximum height of each image frame
    pub max_img_height: usize,
    /// Size in bits of one result record
    pub estimator_result_bitsize: usize,
    /// Largest slot buffer (`slot_count * slot_bytes`) a channel may register.
    /// `None` when the device leaves queue depth unchecked.
    pub max_channel_bytes: Option<usize>,
}

/// Capability of an external dataflow engine.
///
/// All methods take `&self`: the loaded engine and both channels hold shared
/// references to the same device. Slot operations never block; "nothing
/// available" is `Ok(None)`.
pub trait Device {
    /// Human-readable device name for diagnostics
    fn name(&self) -> &str;

    /// Constants declared by the device configuration
    fn constants(&self) -> DeviceConstants;

    /// Load the configuration onto the device
    fn load(&self) -> Result<()>;

    /// Apply scalars, tick counts and stream options, then start execution
    fn run(&self, actions: &Actions) -> Result<()>;

    /// Unload the device; all channels must have been released
    fn unload(&self);

    /// Register a named channel backed by host memory at `base`.
    ///
    /// # Safety
    /// `base` must point to at least `geometry.total_bytes()` bytes aligned
    /// for the channel's element type, and must stay valid and otherwise
    /// unaccessed by the device until [`Device::release_channel`] is called
    /// for the returned id.
    unsafe fn register_channel(
        &self,
        name: &str,
        direction: ChannelDirection,
        geometry: SlotGeometry,
        base: NonNull<u8>,
    ) -> Result<ChannelId>;

    /// Release a channel; the device stops touching its memory
    fn release_channel(&self, id: ChannelId) -> Result<()>;

    /// Try to acquire one free slot of a `ToDevice` channel
    fn write_acquire(&self, id: ChannelId) -> Result<Option<usize>>;

    /// Publish `slots` previously acquired slots to the device
    fn write_commit(&self, id: ChannelId, slots: usize) -> Result<()>;

    /// Try to obtain one filled slot of a `FromDevice` channel
    fn read(&self, id: ChannelId) -> Result<Option<usize>>;

    /// Return `slots` read slots to the device
    fn read_discard(&self, id: ChannelId, slots: usize) -> Result<()>;
}

impl<D: Device + ?Sized> Device for &D {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn constants(&self) -> DeviceConstants {
        (**self).constants()
    }

    fn load(&self) -> Result<()> {
        (**self).load()
    }

    fn run(&self, actions: &Actions) -> Result<()> {
        (**self).run(actions)
    }

    fn unload(&self) {
        (**self).unload()
    }

    unsafe fn register_channel(
        &self,
        name: &str,
        direction: ChannelDirection,
        geometry: SlotGeometry,
        base: NonNull<u8>,
    ) -> Result<ChannelId> {
        (**self).register_channel(name, direction, geometry, base)
    }

    fn release_channel(&self, id: ChannelId) -> Result<()> {
        (**self).release_channel(id)
    }

    fn write_acquire(&self, id: ChannelId) -> Result<Option<usize>> {
        (**self).write_acquire(id)
    }

    fn write_commit(&self, id: ChannelId, slots: usize) -> Result<()> {
        (**self).write_commit(id, slots)
    }

    fn read(&self, id: ChannelId) -> Result<Option<usize>> {
        (**self).read(id)
    }

    fn read_discard(&self, id: ChannelId, slots: usize) -> Result<()> {
        (**self).read_discard(id, slots)
    }
}
