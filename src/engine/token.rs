//! Process-wide gate for the loaded engine

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Result, StreamError};

static ENGINE_IN_USE: AtomicBool = AtomicBool::new(false);

/// Proof that the caller holds the only engine slot of this process.
///
/// The token cannot be cloned; [`Engine::load`](super::Engine::load)
/// consumes it and the slot is freed when the engine (and thus the token)
/// is dropped.
#[derive(Debug)]
pub struct EngineToken {
    _private: (),
}

impl EngineToken {
    /// Take the engine slot, failing if another engine is alive
    pub fn acquire() -> Result<Self> {
        ENGINE_IN_USE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| StreamError::EngineInUse)?;
        Ok(Self { _private: () })
    }

    /// Whether some token is currently held
    pub fn is_held() -> bool {
        ENGINE_IN_USE.load(Ordering::Acquire)
    }
}

impl Drop for EngineToken {
    fn drop(&mut self) {
        ENGINE_IN_USE.store(false, Ordering::Release);
    }
}
