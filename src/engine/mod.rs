//! Loaded dataflow engine
//!
//! Ownership runs strictly outward: channels borrow the [`Engine`], the
//! engine borrows the [`DeviceConfig`]. Channels are therefore always
//! released before the engine is unloaded, and the engine before the
//! configuration goes away.

pub mod device_config;
pub mod token;

use log::info;

use crate::{
    config::Scalars,
    device::{Actions, Device, DeviceConstants, FROM_HOST, TO_HOST},
    error::Result,
};

pub use device_config::DeviceConfig;
pub use token::EngineToken;

/// Kernel block that locates signals in the pixel stream
pub const SIGNAL_FINDER: &str = "SignalFinder";

/// Kernel block that estimates signal parameters
pub const SIGNAL_ESTIMATOR: &str = "SignalEstimator";

/// A device that has been loaded and started with a set of scalars
#[derive(Debug)]
pub struct Engine<'c, D: Device> {
    config: &'c DeviceConfig<D>,
    scalars: Scalars,
    // Dropped after `Drop::drop` has unloaded the device
    _token: EngineToken,
}

impl<'c, D: Device> Engine<'c, D> {
    /// Validate the scalars, load the device and start it.
    pub fn load(config: &'c DeviceConfig<D>, scalars: &Scalars, token: EngineToken) -> Result<Self> {
        scalars.validate(config.constants())?;

        info!("Configuring DFE");
        config.device().load()?;
        let engine = Self {
            config,
            scalars: scalars.clone(),
            _token: token,
        };

        let actions = Self::actions_for(scalars);
        info!("Setting DFE scalars");
        engine.device().run(&actions)?;
        Ok(engine)
    }

    /// Acquire the process-wide token and load in one step
    pub fn open(config: &'c DeviceConfig<D>, scalars: &Scalars) -> Result<Self> {
        let token = EngineToken::acquire()?;
        Self::load(config, scalars, token)
    }

    /// Build the action set for a run with the given scalars
    pub fn actions_for(scalars: &Scalars) -> Actions {
        let mut actions = Actions::new();

        info!("SignalFinder.total_images                  :  {}", scalars.total_images);
        actions.set_uint(SIGNAL_FINDER, "total_images", scalars.total_images as u64);

        info!("SignalFinder.start_image                   :  {}", scalars.start_image);
        actions.set_uint(SIGNAL_FINDER, "start_image", scalars.start_image as u64);

        info!("SignalFinder.bg_threshold_factor           :  {}", scalars.bg_threshold_factor);
        actions.set_uint(SIGNAL_FINDER, "bg_threshold_factor", scalars.bg_threshold_factor);

        info!("SignalFinder.img_width                     :  {}", scalars.img_width);
        actions.set_uint(SIGNAL_FINDER, "img_width", scalars.img_width as u64);

        info!("SignalFinder.img_height                    :  {}", scalars.img_height);
        actions.set_uint(SIGNAL_FINDER, "img_height", scalars.img_height as u64);

        info!("SignalFinder.img_width_offset              :  {}", scalars.img_width);
        actions.set_offset(SIGNAL_FINDER, "img_width_offset", scalars.img_width as u64);

        info!(
            "SignalEstimator.separator_threshold_factor :  {}",
            scalars.separator_threshold_factor
        );
        actions.set_double(
            SIGNAL_ESTIMATOR,
            "separator_threshold_factor",
            scalars.separator_threshold_factor,
        );

        info!("SignalEstimator.nm_per_px                  :  {}", scalars.nm_per_px);
        actions.set_double(SIGNAL_ESTIMATOR, "nm_per_px", scalars.nm_per_px);

        actions.disable_stream_sync(FROM_HOST);
        actions.disable_stream_sync(TO_HOST);

        let pixel_count = scalars.total_pixels();
        info!("Kernel cycles of signal finder             :  {}", pixel_count);
        actions.set_ticks(SIGNAL_FINDER, pixel_count);

        info!("Kernel cycles of signal estimator          :  {}", pixel_count * 2);
        actions.set_ticks(SIGNAL_ESTIMATOR, pixel_count * 2);

        actions
    }

    pub fn device(&self) -> &'c D {
        self.config.device()
    }

    pub fn constants(&self) -> &'c DeviceConstants {
        self.config.constants()
    }

    pub fn scalars(&self) -> &Scalars {
        &self.scalars
    }
}

impl<'c, D: Device> Drop for Engine<'c, D> {
    fn drop(&mut self) {
        info!("Unloading engine");
        self.config.device().unload();
    }
}
