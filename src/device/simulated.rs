//! In-process dataflow engine
//!
//! [`SimulatedDevice`] implements the [`Device`] slot protocol against the
//! host-owned slot buffers, so sessions can run without hardware. Device
//! progress happens inside protocol calls: every `write_acquire` and `read`
//! first lets the device consume committed pixel slots and fill free result
//! slots, unless the device is paused.
//!
//! Results come either from a [`FrameEstimator`] (default) or from a script
//! of pre-built result slots released once enough pixels have arrived.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    ptr::NonNull,
    slice,
};

use log::{debug, info, trace, warn};

use crate::{
    buffers::SlotGeometry,
    error::{Result, StreamError},
    record::ResultRecord,
};

use super::{
    actions::Actions,
    estimator::{EstimatorParams, FrameEstimator},
    ChannelDirection, ChannelId, Device, DeviceConstants, FROM_HOST, TO_HOST,
};

/// Counters describing what the simulated device observed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulatedStats {
    /// Pixel slots consumed from `from_host`
    pub tx_slots_consumed: u64,
    /// Pixels consumed from `from_host`
    pub pixels_consumed: u64,
    /// Result slots filled into `to_host`
    pub rx_slots_filled: u64,
    /// Result slots returned by the host
    pub rx_slots_discarded: u64,
    /// Largest number of result slots the host held at once
    pub max_host_held: usize,
    /// Slots still held by the host when a channel was released
    pub abandoned_slots: u64,
    /// Protocol calls that found nothing to do
    pub empty_polls: u64,
}

/// A scripted result slot and the pixel count that releases it
#[derive(Debug, Clone)]
struct ScriptedSlot {
    /// `None` releases the slot once every expected pixel has arrived
    after_pixels: Option<u64>,
    records: Vec<ResultRecord>,
}

#[derive(Debug)]
enum ResultSource {
    Estimator(Option<FrameEstimator>),
    Script(VecDeque<ScriptedSlot>),
}

/// Ring state of one registered channel
#[derive(Debug)]
struct SimChannel {
    name: String,
    direction: ChannelDirection,
    geometry: SlotGeometry,
    base: NonNull<u8>,
    /// Slots produced into the ring (host commits or device fills)
    write_pos: usize,
    /// Slots consumed out of the ring (device reads or host discards)
    read_pos: usize,
    /// Slots currently held by the host between acquire/read and commit/discard
    host_held: usize,
}

impl SimChannel {
    fn in_flight(&self) -> usize {
        self.write_pos - self.read_pos
    }

    fn slot_index(&self, position: usize) -> usize {
        position % self.geometry.slot_count
    }
}

#[derive(Debug)]
struct SimState {
    loaded: bool,
    actions: Option<Actions>,
    channels: HashMap<ChannelId, SimChannel>,
    next_id: u32,
    source: ResultSource,
    /// Records waiting to fill a whole slot
    pending: VecDeque<ResultRecord>,
    /// Complete result slots waiting for a free ring slot
    outbox: VecDeque<Vec<ResultRecord>>,
    expected_pixels: Option<u64>,
    paused: bool,
    record_pixels: bool,
    pixel_log: Vec<i16>,
    stats: SimulatedStats,
}

/// Simulated dataflow engine implementing [`Device`]
#[derive(Debug)]
pub struct SimulatedDevice {
    name: String,
    constants: DeviceConstants,
    state: RefCell<SimState>,
}

impl SimulatedDevice {
    /// Simulated device with default constants and the built-in estimator
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> SimulatedDeviceBuilder {
        SimulatedDeviceBuilder::new()
    }

    /// Stop (or resume) device-side progress
    pub fn set_paused(&self, paused: bool) {
        self.state.borrow_mut().paused = paused;
    }

    pub fn is_loaded(&self) -> bool {
        self.state.borrow().loaded
    }

    /// Snapshot of the device counters
    pub fn stats(&self) -> SimulatedStats {
        self.state.borrow().stats.clone()
    }

    /// Pixels received so far, in stream order (only when recording)
    pub fn received_pixels(&self) -> Vec<i16> {
        self.state.borrow().pixel_log.clone()
    }

    /// Actions applied by the last `run`
    pub fn applied_actions(&self) -> Option<Actions> {
        self.state.borrow().actions.clone()
    }

    /// Number of channels currently registered
    pub fn registered_channels(&self) -> usize {
        self.state.borrow().channels.len()
    }

    /// Let the device consume and produce as far as it can
    fn advance(state: &mut SimState) {
        if state.paused {
            return;
        }
        Self::consume_pixels(state);
        Self::release_results(state);
        Self::fill_results(state);
    }

    fn consume_pixels(state: &mut SimState) {
        let SimState {
            channels,
            source,
            pending,
            record_pixels,
            pixel_log,
            stats,
            ..
        } = state;

        let channel = match channels.values_mut().find(|c| c.name == FROM_HOST) {
            Some(channel) => channel,
            None => return,
        };

        while channel.read_pos < channel.write_pos {
            let index = channel.slot_index(channel.read_pos);
            let len = channel.geometry.slot_length;
            let pixels = unsafe {
                slice::from_raw_parts((channel.base.as_ptr() as *const i16).add(index * len), len)
            };

            if *record_pixels {
                pixel_log.extend_from_slice(pixels);
            }
            if let ResultSource::Estimator(Some(estimator)) = source {
                estimator.feed(pixels, pending);
            }

            channel.read_pos += 1;
            stats.tx_slots_consumed += 1;
            stats.pixels_consumed += len as u64;
            trace!("device consumed pixel slot {}", index);
        }
    }

    /// Move finished records and due scripted slots into the outbox
    fn release_results(state: &mut SimState) {
        let slot_length = match state.channels.values().find(|c| c.name == TO_HOST) {
            Some(channel) => channel.geometry.slot_length,
            None => return,
        };

        match &mut state.source {
            ResultSource::Estimator(estimator) => {
                let finished = estimator.as_ref().map_or(false, FrameEstimator::is_finished);
                if finished && !state.pending.is_empty() {
                    // The sentinel must be the last record of the last slot
                    let remainder = state.pending.len() % slot_length;
                    if remainder != 0 {
                        let sentinel = state.pending.pop_back();
                        for _ in remainder..slot_length {
                            state.pending.push_back(ResultRecord::end_of_image());
                        }
                        state.pending.extend(sentinel);
                    }
                }
                while state.pending.len() >= slot_length {
                    let records: Vec<_> = state.pending.drain(..slot_length).collect();
                    state.outbox.push_back(records);
                }
            }
            ResultSource::Script(script) => {
                let consumed = state.stats.pixels_consumed;
                while let Some(next) = script.front() {
                    let due = match next.after_pixels.or(state.expected_pixels) {
                        Some(threshold) => consumed >= threshold,
                        None => false,
                    };
                    if !due {
                        break;
                    }
                    if let Some(slot) = script.pop_front() {
                        state.outbox.push_back(slot.records);
                    }
                }
            }
        }
    }

    fn fill_results(state: &mut SimState) {
        let SimState {
            channels,
            outbox,
            stats,
            ..
        } = state;

        let channel = match channels.values_mut().find(|c| c.name == TO_HOST) {
            Some(channel) => channel,
            None => return,
        };

        while channel.in_flight() < channel.geometry.slot_count {
            let records = match outbox.pop_front() {
                Some(records) => records,
                None => break,
            };
            let index = channel.slot_index(channel.write_pos);
            let len = channel.geometry.slot_length;
            let count = records.len().min(len);
            unsafe {
                let dst = (channel.base.as_ptr() as *mut ResultRecord).add(index * len);
                std::ptr::copy_nonoverlapping(records.as_ptr(), dst, count);
            }
            channel.write_pos += 1;
            stats.rx_slots_filled += 1;
            trace!("device filled result slot {}", index);
        }
    }

    fn expected_element_size(name: &str) -> Option<(ChannelDirection, usize)> {
        match name {
            FROM_HOST => Some((ChannelDirection::ToDevice, std::mem::size_of::<i16>())),
            TO_HOST => Some((
                ChannelDirection::FromDevice,
                std::mem::size_of::<ResultRecord>(),
            )),
            _ => None,
        }
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for SimulatedDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn constants(&self) -> DeviceConstants {
        self.constants
    }

    fn load(&self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.loaded {
            return Err(StreamError::device("simulated device is already loaded"));
        }
        state.loaded = true;
        info!("Loaded simulated device '{}'", self.name);
        Ok(())
    }

    fn run(&self, actions: &Actions) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.loaded {
            return Err(StreamError::device("run called before load"));
        }

        let uint = |block: &str, name: &str| -> Result<usize> {
            actions
                .scalar(block, name)
                .and_then(|v| v.as_u64())
                .map(|v| v as usize)
                .ok_or_else(|| StreamError::device(format!("missing scalar {}.{}", block, name)))
        };
        let params = EstimatorParams {
            img_width: uint("SignalFinder", "img_width")?,
            img_height: uint("SignalFinder", "img_height")?,
            total_images: uint("SignalFinder", "total_images")?,
            nm_per_px: actions
                .scalar("SignalEstimator", "nm_per_px")
                .map_or(1.0, |v| v.as_f64()),
        };

        state.expected_pixels =
            Some((params.img_width * params.img_height * params.total_images) as u64);
        if let ResultSource::Estimator(estimator) = &mut state.source {
            *estimator = Some(FrameEstimator::new(params));
        }
        state.actions = Some(actions.clone());
        debug!(
            "Simulated device running {} images of {}x{}",
            params.total_images, params.img_width, params.img_height
        );
        Ok(())
    }

    fn unload(&self) {
        let mut state = self.state.borrow_mut();
        if !state.channels.is_empty() {
            warn!(
                "Unloading simulated device with {} channels still registered",
                state.channels.len()
            );
        }
        state.loaded = false;
        info!("Unloaded simulated device '{}'", self.name);
    }

    unsafe fn register_channel(
        &self,
        name: &str,
        direction: ChannelDirection,
        geometry: SlotGeometry,
        base: NonNull<u8>,
    ) -> Result<ChannelId> {
        let mut state = self.state.borrow_mut();
        if !state.loaded {
            return Err(StreamError::device(format!(
                "cannot set up stream '{}' before the device is loaded",
                name
            )));
        }

        let (expected_direction, element_size) = Self::expected_element_size(name)
            .ok_or_else(|| StreamError::device(format!("unknown stream '{}'", name)))?;
        if direction != expected_direction {
            return Err(StreamError::device(format!(
                "stream '{}' has direction {:?}, requested {:?}",
                name, expected_direction, direction
            )));
        }
        if geometry.element_size != element_size {
            return Err(StreamError::device(format!(
                "stream '{}' carries {}-byte elements, got {}",
                name, element_size, geometry.element_size
            )));
        }
        if state.channels.values().any(|c| c.name == name) {
            return Err(StreamError::device(format!(
                "stream '{}' is already set up",
                name
            )));
        }
        if let ResultSource::Script(script) = &state.source {
            if name == TO_HOST
                && script
                    .iter()
                    .any(|slot| slot.records.len() != geometry.slot_length)
            {
                return Err(StreamError::device(format!(
                    "scripted result slots must hold {} records",
                    geometry.slot_length
                )));
            }
        }

        let id = ChannelId(state.next_id);
        state.next_id += 1;
        state.channels.insert(
            id,
            SimChannel {
                name: name.to_string(),
                direction,
                geometry,
                base,
                write_pos: 0,
                read_pos: 0,
                host_held: 0,
            },
        );
        debug!(
            "Registered stream '{}' as {:?}: {} slots of {} bytes",
            name,
            id,
            geometry.slot_count,
            geometry.slot_bytes()
        );
        Ok(id)
    }

    fn release_channel(&self, id: ChannelId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let channel = state
            .channels
            .remove(&id)
            .ok_or_else(|| StreamError::device(format!("release of unknown channel {:?}", id)))?;
        if channel.host_held > 0 {
            warn!(
                "Stream '{}' released with {} slots still held by the host",
                channel.name, channel.host_held
            );
            state.stats.abandoned_slots += channel.host_held as u64;
        }
        debug!("Released stream '{}'", channel.name);
        Ok(())
    }

    fn write_acquire(&self, id: ChannelId) -> Result<Option<usize>> {
        let mut state = self.state.borrow_mut();
        Self::advance(&mut state);

        let state = &mut *state;
        let channel = channel_mut(&mut state.channels, id, ChannelDirection::ToDevice)?;
        if channel.in_flight() + channel.host_held >= channel.geometry.slot_count {
            state.stats.empty_polls += 1;
            return Ok(None);
        }
        let index = channel.slot_index(channel.write_pos + channel.host_held);
        channel.host_held += 1;
        Ok(Some(index))
    }

    fn write_commit(&self, id: ChannelId, slots: usize) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let channel = channel_mut(&mut state.channels, id, ChannelDirection::ToDevice)?;
        if slots > channel.host_held {
            return Err(StreamError::device(format!(
                "commit of {} slots on '{}', only {} acquired",
                slots, channel.name, channel.host_held
            )));
        }
        channel.host_held -= slots;
        channel.write_pos += slots;
        Ok(())
    }

    fn read(&self, id: ChannelId) -> Result<Option<usize>> {
        let mut state = self.state.borrow_mut();
        Self::advance(&mut state);

        let state = &mut *state;
        let channel = channel_mut(&mut state.channels, id, ChannelDirection::FromDevice)?;
        if channel.read_pos + channel.host_held >= channel.write_pos {
            state.stats.empty_polls += 1;
            return Ok(None);
        }
        let index = channel.slot_index(channel.read_pos + channel.host_held);
        channel.host_held += 1;
        state.stats.max_host_held = state.stats.max_host_held.max(channel.host_held);
        Ok(Some(index))
    }

    fn read_discard(&self, id: ChannelId, slots: usize) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        let channel = channel_mut(&mut state.channels, id, ChannelDirection::FromDevice)?;
        if slots > channel.host_held {
            return Err(StreamError::device(format!(
                "discard of {} slots on '{}', only {} read",
                slots, channel.name, channel.host_held
            )));
        }
        channel.host_held -= slots;
        channel.read_pos += slots;
        state.stats.rx_slots_discarded += slots as u64;
        Ok(())
    }
}

fn channel_mut(
    channels: &mut HashMap<ChannelId, SimChannel>,
    id: ChannelId,
    direction: ChannelDirection,
) -> Result<&mut SimChannel> {
    let channel = channels
        .get_mut(&id)
        .ok_or_else(|| StreamError::device(format!("unknown channel {:?}", id)))?;
    if channel.direction != direction {
        return Err(StreamError::device(format!(
            "stream '{}' does not support {:?} operations",
            channel.name, direction
        )));
    }
    Ok(channel)
}

/// Builder for [`SimulatedDevice`]
#[derive(Debug)]
pub struct SimulatedDeviceBuilder {
    name: String,
    constants: DeviceConstants,
    script: Option<VecDeque<ScriptedSlot>>,
    record_pixels: bool,
}

impl SimulatedDeviceBuilder {
    pub fn new() -> Self {
        Self {
            name: "simulated".to_string(),
            constants: DeviceConstants {
                max_img_width: 512,
                max_img_height: 512,
                estimator_result_bitsize: ResultRecord::BITS,
                max_channel_bytes: None,
            },
            script: None,
            record_pixels: false,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the maximum frame size the device accepts
    pub fn max_image_size(mut self, width: usize, height: usize) -> Self {
        self.constants.max_img_width = width;
        self.constants.max_img_height = height;
        self
    }

    /// Override the declared result record size
    pub fn result_bitsize(mut self, bits: usize) -> Self {
        self.constants.estimator_result_bitsize = bits;
        self
    }

    /// Declare a maximum queue size per channel, in bytes
    pub fn max_channel_bytes(mut self, bytes: usize) -> Self {
        self.constants.max_channel_bytes = Some(bytes);
        self
    }

    /// Keep a copy of every received pixel
    pub fn record_pixels(mut self, enable: bool) -> Self {
        self.record_pixels = enable;
        self
    }

    /// Deliver `records` as one result slot once all pixels have arrived.
    /// Scripted slots replace the built-in estimator.
    pub fn script_slot(mut self, records: Vec<ResultRecord>) -> Self {
        self.script.get_or_insert_with(VecDeque::new).push_back(ScriptedSlot {
            after_pixels: None,
            records,
        });
        self
    }

    /// Deliver `records` as one result slot once `pixels` pixels have arrived
    pub fn script_slot_after(mut self, pixels: u64, records: Vec<ResultRecord>) -> Self {
        self.script.get_or_insert_with(VecDeque::new).push_back(ScriptedSlot {
            after_pixels: Some(pixels),
            records,
        });
        self
    }

    pub fn build(self) -> SimulatedDevice {
        let source = match self.script {
            Some(script) => ResultSource::Script(script),
            None => ResultSource::Estimator(None),
        };
        SimulatedDevice {
            name: self.name,
            constants: self.constants,
            state: RefCell::new(SimState {
                loaded: false,
                actions: None,
                channels: HashMap::new(),
                next_id: 0,
                source,
                pending: VecDeque::new(),
                outbox: VecDeque::new(),
                expected_pixels: None,
                paused: false,
                record_pixels: self.record_pixels,
                pixel_log: Vec::new(),
                stats: SimulatedStats::default(),
            }),
        }
    }
}

impl Default for SimulatedDeviceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buffers::{Backing, SlotBuffer}, config::Scalars, engine::Engine};

    fn register<T: bytemuck::Pod>(
        device: &SimulatedDevice,
        name: &str,
        direction: ChannelDirection,
        buffer: &SlotBuffer<T>,
    ) -> Result<ChannelId> {
        unsafe { device.register_channel(name, direction, buffer.geometry(), buffer.base_ptr()) }
    }

    #[test]
    fn test_protocol_requires_load() {
        let device = SimulatedDevice::new();
        let buffer = SlotBuffer::<i16>::new(4, 2, Backing::Heap).unwrap();

        assert!(register(&device, FROM_HOST, ChannelDirection::ToDevice, &buffer).is_err());
        assert!(device.run(&Actions::new()).is_err());

        device.load().unwrap();
        assert!(device.load().is_err());
        register(&device, FROM_HOST, ChannelDirection::ToDevice, &buffer).unwrap();
    }

    #[test]
    fn test_estimator_pads_sentinel_into_last_slot() {
        let device = SimulatedDevice::new();
        device.load().unwrap();
        device.run(&Engine::<SimulatedDevice>::actions_for(&Scalars::for_stack(2, 2, 1))).unwrap();

        let mut pixels = SlotBuffer::<i16>::new(4, 2, Backing::Heap).unwrap();
        let results = SlotBuffer::<ResultRecord>::new(4, 2, Backing::Heap).unwrap();
        let tx = register(&device, FROM_HOST, ChannelDirection::ToDevice, &pixels).unwrap();
        let rx = register(&device, TO_HOST, ChannelDirection::FromDevice, &results).unwrap();

        let index = device.write_acquire(tx).unwrap().unwrap();
        pixels.slot_mut(index).unwrap().copy_from_slice(&[0, 0, 0, 40]);
        device.write_commit(tx, 1).unwrap();

        let index = device.read(rx).unwrap().unwrap();
        let images: Vec<i32> = results.slot(index).unwrap().iter().map(|r| r.img).collect();
        assert_eq!(images, vec![0, -1, -1, -2]);
        assert!(device.read(rx).unwrap().is_none());

        device.read_discard(rx, 1).unwrap();
        device.release_channel(tx).unwrap();
        device.release_channel(rx).unwrap();
        assert_eq!(device.stats().abandoned_slots, 0);
    }

    #[test]
    fn test_commit_and_discard_checked() {
        let device = SimulatedDevice::builder()
            .script_slot_after(0, vec![ResultRecord::last_pixel(); 2])
            .build();
        device.load().unwrap();

        let pixels = SlotBuffer::<i16>::new(4, 2, Backing::Heap).unwrap();
        let results = SlotBuffer::<ResultRecord>::new(2, 2, Backing::Heap).unwrap();
        let tx = register(&device, FROM_HOST, ChannelDirection::ToDevice, &pixels).unwrap();
        let rx = register(&device, TO_HOST, ChannelDirection::FromDevice, &results).unwrap();

        assert!(device.write_commit(tx, 1).is_err());
        assert!(device.read_discard(rx, 1).is_err());
        assert!(device.read(tx).is_err());
        assert!(device.write_acquire(rx).is_err());

        assert!(device.read(rx).unwrap().is_some());
        device.release_channel(rx).unwrap();
        assert_eq!(device.stats().abandoned_slots, 1);
    }

    #[test]
    fn test_scripted_slot_length_checked() {
        let device = SimulatedDevice::builder()
            .script_slot(vec![ResultRecord::last_pixel(); 3])
            .build();
        device.load().unwrap();

        let results = SlotBuffer::<ResultRecord>::new(2, 2, Backing::Heap).unwrap();
        assert!(register(&device, TO_HOST, ChannelDirection::FromDevice, &results).is_err());
    }
}
