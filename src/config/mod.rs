//! Run configuration
//!
//! [`Scalars`] are the named values written to the device kernels;
//! [`SessionConfig`] adds the slot geometry of both channels and can be
//! loaded from TOML.

pub mod scalars;
pub mod session;

pub use scalars::Scalars;
pub use session::{
    ChannelConfig, SessionConfig, DEFAULT_RECV_SLOT_LENGTH, DEFAULT_SEND_SLOT_LENGTH,
};
