//! Host-side orchestration of a streaming run
//!
//! A [`StreamSession`] drives both channels from a single thread. Each
//! [`poll`](StreamSession::poll) makes one non-blocking send attempt (while
//! pixels remain) and one non-blocking receive attempt; [`run`] repeats that
//! until the device reports its last pixel.
//!
//! [`run`]: StreamSession::run

pub mod session;
pub mod stats;

pub use session::{StreamSession, StreamState};
pub use stats::{PollOutcome, StreamStats};

use log::info;

use crate::{
    config::{Scalars, SessionConfig},
    device::Device,
    engine::{DeviceConfig, Engine},
    error::{Result, StreamError},
    image::ImageSource,
    report::ResultSink,
};

/// Take the frame geometry from `source`.
///
/// A zero `total_images` means "every image of the source".
pub fn scalars_for_source<S: ImageSource>(scalars: &Scalars, source: &S) -> Result<Scalars> {
    if source.image_count() == 0 {
        return Err(StreamError::configuration("image source is empty"));
    }
    let first = source.image(0)?;

    let mut scalars = scalars.clone();
    scalars.img_width = first.width();
    scalars.img_height = first.height();
    if scalars.total_images == 0 {
        scalars.total_images = source.image_count();
    }
    Ok(scalars)
}

/// Load an engine, stream every image of `source` through it and hand
/// back the sink once the device has reported its last pixel.
pub fn run_session<D, S, K>(
    device: &DeviceConfig<D>,
    config: &SessionConfig,
    source: S,
    sink: K,
) -> Result<(StreamStats, K)>
where
    D: Device,
    S: ImageSource,
    K: ResultSink,
{
    let config = config
        .clone()
        .with_scalars(scalars_for_source(&config.scalars, &source)?);
    config.validate()?;

    let engine = Engine::open(device, &config.scalars)?;
    let mut session = StreamSession::new(&engine, &config.send, &config.recv, source, sink)?;

    info!("Streaming {} images", config.scalars.total_images);
    let stats = session.run()?;
    info!("{}", stats.summary());

    Ok((stats, session.into_sink()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{MemoryImageSource, SyntheticSource};

    #[test]
    fn test_scalars_from_source() {
        let source = SyntheticSource::new(32, 16, 5);
        let scalars = scalars_for_source(&Scalars::default(), &source).unwrap();
        assert_eq!((scalars.img_width, scalars.img_height), (32, 16));
        assert_eq!(scalars.total_images, 5);
        assert_eq!(scalars.nm_per_px, 102.0);

        let mut limited = Scalars::default();
        limited.total_images = 2;
        assert_eq!(scalars_for_source(&limited, &source).unwrap().total_images, 2);
    }

    #[test]
    fn test_empty_source() {
        let err = scalars_for_source(&Scalars::default(), &MemoryImageSource::default()).unwrap_err();
        assert!(err.is_configuration());
    }
}
