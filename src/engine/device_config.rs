//! Device configuration and its compile-time constants

use log::info;

use crate::{
    device::{Device, DeviceConstants},
    error::{Result, StreamError},
    record::ResultRecord,
};

/// A device together with the constants read from its configuration.
///
/// Created once per process; the record layout is checked here so that a
/// mismatched device is rejected before anything is loaded.
#[derive(Debug)]
pub struct DeviceConfig<D: Device> {
    device: D,
    constants: DeviceConstants,
}

impl<D: Device> DeviceConfig<D> {
    pub fn new(device: D) -> Result<Self> {
        info!("Reading constants of device '{}'", device.name());
        let constants = device.constants();
        info!("max_img_width                              :  {}", constants.max_img_width);
        info!("max_img_height                             :  {}", constants.max_img_height);
        info!(
            "estimator_result_bitsize                   :  {}",
            constants.estimator_result_bitsize
        );

        if constants.estimator_result_bitsize != ResultRecord::BITS {
            return Err(StreamError::configuration(format!(
                "device declares {}-bit result records, host layout has {} bits",
                constants.estimator_result_bitsize,
                ResultRecord::BITS
            )));
        }

        Ok(Self { device, constants })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn constants(&self) -> &DeviceConstants {
        &self.constants
    }

    /// Give the device back
    pub fn into_inner(self) -> D {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedDevice;

    #[test]
    fn test_constants_are_read() {
        let config = DeviceConfig::new(SimulatedDevice::new()).unwrap();
        assert_eq!(config.constants().max_img_width, 512);
        assert_eq!(config.constants().estimator_result_bitsize, 256);
    }

    #[test]
    fn test_record_size_mismatch() {
        let device = SimulatedDevice::builder().result_bitsize(224).build();
        let err = DeviceConfig::new(device).unwrap_err();
        assert!(matches!(err, StreamError::Configuration { .. }));
        assert!(err.to_string().contains("224"));
    }
}
