//! Configuration loading and engine setup tests

mod common;

use std::fs;

use common::engine_lock;
use spdm_stream::{
    run_session, Backing, CollectSink, DeviceConfig, Engine, EngineToken, Scalars, SessionConfig,
    SimulatedDevice, StreamError, SyntheticSource,
};
use tempfile::TempDir;

#[cfg(test)]
mod config_tests {
    use super::*;

    /// Test: A session configuration file drives a full run
    #[test]
    fn test_session_from_toml_file() {
        let _guard = engine_lock();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.toml");
        fs::write(
            &path,
            r#"
[scalars]
nm_per_px = 80.0
bg_threshold_factor = 3

[send]
slot_length = 128
backing = "anonymous-map"

[recv]
slot_length = 8
slot_count = 4
"#,
        )
        .unwrap();

        let session_config = SessionConfig::from_file(&path).unwrap();
        assert_eq!(session_config.send.backing, Backing::AnonymousMap);
        assert_eq!(session_config.recv.slot_count, 4);
        assert_eq!(session_config.scalars.separator_threshold_factor, 0.7);

        let config = DeviceConfig::new(SimulatedDevice::new()).unwrap();
        let source = SyntheticSource::new(16, 16, 2);
        let (stats, sink) =
            run_session(&config, &session_config, &source, CollectSink::new()).unwrap();

        assert_eq!(stats.slots_sent, 4);
        assert_eq!(sink.records().len(), 2);

        let actions = config.device().applied_actions().unwrap();
        assert_eq!(
            actions.scalar("SignalEstimator", "nm_per_px").map(|v| v.as_f64()),
            Some(80.0)
        );
        assert_eq!(
            actions.scalar("SignalFinder", "bg_threshold_factor").and_then(|v| v.as_u64()),
            Some(3)
        );
    }

    /// Test: Malformed configuration files surface as config errors
    #[test]
    fn test_malformed_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        fs::write(&path, "[send]\nslot_length = \"many\"\n").unwrap();

        let err = SessionConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, StreamError::Config { .. }));

        let err = SessionConfig::from_file(temp_dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, StreamError::Io { .. }));
    }

    /// Test: Only one engine can be loaded at a time
    #[test]
    fn test_engine_gate() {
        let _guard = engine_lock();
        let first = DeviceConfig::new(SimulatedDevice::new()).unwrap();
        let second = DeviceConfig::new(SimulatedDevice::new()).unwrap();
        let scalars = Scalars::for_stack(8, 8, 1);

        let token = EngineToken::acquire().unwrap();
        assert!(matches!(EngineToken::acquire(), Err(StreamError::EngineInUse)));

        let engine = Engine::load(&first, &scalars, token).unwrap();
        assert!(matches!(
            Engine::open(&second, &scalars),
            Err(StreamError::EngineInUse)
        ));

        drop(engine);
        assert!(!EngineToken::is_held());
        let engine = Engine::open(&second, &scalars).unwrap();
        assert!(engine.device().is_loaded());
    }

    /// Test: A device declaring a different record size is rejected up front
    #[test]
    fn test_record_size_mismatch() {
        let device = SimulatedDevice::builder().result_bitsize(192).build();
        let err = DeviceConfig::new(device).unwrap_err();
        assert!(err.is_configuration());
    }

    /// Test: Frames larger than the device maxima are rejected before loading
    #[test]
    fn test_frame_exceeds_device_maximum() {
        let _guard = engine_lock();
        let device = SimulatedDevice::builder().max_image_size(64, 64).build();
        let config = DeviceConfig::new(device).unwrap();

        let err = run_session(
            &config,
            &SessionConfig::default().with_send_slot_length(128),
            SyntheticSource::new(128, 32, 1),
            CollectSink::new(),
        )
        .unwrap_err();

        assert!(err.is_configuration());
        assert!(!config.device().is_loaded());
        assert!(!EngineToken::is_held());
    }
}
