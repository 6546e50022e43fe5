//! Helpers shared by the integration tests

#![allow(dead_code)]

use std::sync::{Mutex, MutexGuard};

use spdm_stream::ResultRecord;

static ENGINE_LOCK: Mutex<()> = Mutex::new(());

/// Only one engine may be loaded per process
pub fn engine_lock() -> MutexGuard<'static, ()> {
    ENGINE_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// A measurement record with recognizable fields
pub fn measurement(img: i32) -> ResultRecord {
    ResultRecord {
        img,
        q: 100.0 + img as f32,
        mu_x: 1.5,
        mu_y: 2.5,
        sigma_x: 0.5,
        sigma_y: 0.75,
        delta_mu_x: 0.01,
        delta_mu_y: 0.02,
    }
}
