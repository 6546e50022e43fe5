//! Session configuration: scalars plus channel geometry

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    buffers::{Backing, DEFAULT_SLOT_COUNT},
    error::{Result, StreamError},
};

use super::scalars::Scalars;

/// Default slot length of the pixel channel, in pixels
pub const DEFAULT_SEND_SLOT_LENGTH: usize = 2048;

/// Default slot length of the result channel, in records
pub const DEFAULT_RECV_SLOT_LENGTH: usize = 16;

fn default_slot_count() -> usize {
    DEFAULT_SLOT_COUNT
}

/// Geometry and backing of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Elements per slot
    pub slot_length: usize,
    /// Number of slots
    #[serde(default = "default_slot_count")]
    pub slot_count: usize,
    #[serde(default)]
    pub backing: Backing,
}

impl ChannelConfig {
    pub fn new(slot_length: usize) -> Self {
        Self {
            slot_length,
            slot_count: DEFAULT_SLOT_COUNT,
            backing: Backing::default(),
        }
    }

    fn default_send() -> Self {
        Self::new(DEFAULT_SEND_SLOT_LENGTH)
    }

    fn default_recv() -> Self {
        Self::new(DEFAULT_RECV_SLOT_LENGTH)
    }

    pub fn with_slot_count(mut self, slot_count: usize) -> Self {
        self.slot_count = slot_count;
        self
    }

    pub fn with_backing(mut self, backing: Backing) -> Self {
        self.backing = backing;
        self
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.slot_length == 0 || self.slot_count == 0 {
            return Err(StreamError::configuration(format!(
                "channel '{}' needs a non-zero slot length and slot count",
                name
            )));
        }
        Ok(())
    }
}

/// Everything needed to run one streaming session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub scalars: Scalars,
    /// Host to device pixel channel
    #[serde(default = "ChannelConfig::default_send")]
    pub send: ChannelConfig,
    /// Device to host result channel
    #[serde(default = "ChannelConfig::default_recv")]
    pub recv: ChannelConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scalars: Scalars::default(),
            send: ChannelConfig::default_send(),
            recv: ChannelConfig::default_recv(),
        }
    }
}

impl SessionConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            StreamError::from_io(e, &format!("Failed to read config {}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn with_scalars(mut self, scalars: Scalars) -> Self {
        self.scalars = scalars;
        self
    }

    /// Set the image geometry, keeping the other scalars
    pub fn with_stack(mut self, width: usize, height: usize, total_images: usize) -> Self {
        self.scalars.img_width = width;
        self.scalars.img_height = height;
        self.scalars.total_images = total_images;
        self
    }

    pub fn with_send_slot_length(mut self, slot_length: usize) -> Self {
        self.send.slot_length = slot_length;
        self
    }

    pub fn with_recv_slot_length(mut self, slot_length: usize) -> Self {
        self.recv.slot_length = slot_length;
        self
    }

    pub fn with_backing(mut self, backing: Backing) -> Self {
        self.send.backing = backing;
        self.recv.backing = backing;
        self
    }

    /// Check channel geometry against the frame size
    pub fn validate(&self) -> Result<()> {
        self.send.validate("send")?;
        self.recv.validate("recv")?;
        self.scalars.check_slot_length(self.send.slot_length)
    }

    /// Number of pixel slots needed for the whole run
    pub fn total_send_slots(&self) -> u64 {
        self.scalars.total_pixels() / self.send.slot_length.max(1) as u64
    }
}
