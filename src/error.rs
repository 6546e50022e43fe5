//! Error types and handling for spdm-stream

/// Result type alias for streaming operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors raised while setting up or driving a streaming session.
///
/// Transient conditions (no free transmit slot, no filled receive slot) are
/// never reported through this type; channels express them as `Ok(false)` or
/// `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Invalid geometry or device constants, fatal at setup
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Invalid arguments passed to an API call
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Aligned allocation could not be satisfied
    #[error("Allocation of {requested} bytes aligned to {alignment} failed: {message}")]
    Allocation {
        requested: usize,
        alignment: usize,
        message: String,
    },

    /// Alignment requirements not met
    #[error("Alignment error: address {address:#x} not aligned to {alignment}")]
    Alignment { address: usize, alignment: usize },

    /// Channel registration, release or slot protocol failure
    #[error("Device error: {message}")]
    Device { message: String },

    /// A dataflow engine is already loaded in this process
    #[error("Dataflow engine already in use")]
    EngineInUse,

    /// Image source failures
    #[error("Image error: {message}")]
    Image { message: String },

    /// I/O related errors (config files, image stacks)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration file could not be parsed
    #[error("Config file error: {message}")]
    Config { message: String },

    /// A bounded run gave up before the sentinel arrived
    #[error("Stream stalled: no sentinel after {polls} polls")]
    Stalled { polls: u64 },
}

impl StreamError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an allocation error
    pub fn allocation(requested: usize, alignment: usize, message: impl Into<String>) -> Self {
        Self::Allocation {
            requested,
            alignment,
            message: message.into(),
        }
    }

    /// Create an alignment error
    pub fn alignment(address: usize, alignment: usize) -> Self {
        Self::Alignment { address, alignment }
    }

    /// Create a device error
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
        }
    }

    /// Create an image error
    pub fn image(message: impl Into<String>) -> Self {
        Self::Image {
            message: message.into(),
        }
    }

    /// Whether the error belongs to the setup-time configuration class
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::InvalidParameter { .. } | Self::Config { .. }
        )
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

impl From<toml::de::Error> for StreamError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = StreamError::configuration("slot length does not divide frame");
        assert!(matches!(err, StreamError::Configuration { .. }));
        assert!(err.is_configuration());

        let err = StreamError::device("unknown channel");
        assert!(matches!(err, StreamError::Device { .. }));
        assert!(!err.is_configuration());

        let err = StreamError::allocation(8192, 4096, "out of memory");
        assert!(matches!(err, StreamError::Allocation { requested: 8192, .. }));
    }

    #[test]
    fn test_error_display() {
        let err = StreamError::alignment(0x1010, 4096);
        let display = format!("{}", err);
        assert!(display.contains("0x1010"));
        assert!(display.contains("4096"));

        let display = format!("{}", StreamError::EngineInUse);
        assert!(display.contains("already in use"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: StreamError = io.into();
        assert!(matches!(err, StreamError::Io { source: Some(_), .. }));
    }
}
