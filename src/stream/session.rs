//! Polling loop that feeds frames to the device and drains its results

use std::time::Instant;

use log::{debug, info, trace};

use crate::{
    channel::{RecvChannel, SendChannel},
    config::ChannelConfig,
    device::{Device, FROM_HOST, TO_HOST},
    engine::Engine,
    error::{Result, StreamError},
    image::{Frame, ImageSource},
    record::{end_of_results, ResultRecord},
    report::ResultSink,
};

use super::stats::{PollOutcome, StreamStats};

/// Where the session is in the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Sending `image`, next slot starts at `pixel`
    Sending { image: usize, pixel: usize },
    /// Every pixel is sent; waiting for the termination marker
    Draining,
    /// Termination marker received
    Done,
}

/// One run of an image stack through a loaded engine
pub struct StreamSession<'e, D: Device, S, K> {
    tx: SendChannel<'e, i16, D>,
    rx: RecvChannel<'e, ResultRecord, D>,
    source: S,
    sink: K,
    frame: Frame,
    width: usize,
    height: usize,
    total_images: usize,
    state: StreamState,
    stats: StreamStats,
    started: Option<Instant>,
}

impl<'e, D, S, K> StreamSession<'e, D, S, K>
where
    D: Device,
    S: ImageSource,
    K: ResultSink,
{
    /// Set up both streams on `engine`.
    ///
    /// The frame must split into whole send slots; this is checked, along
    /// with the source size and the first frame, before any stream exists.
    pub fn new(
        engine: &'e Engine<'_, D>,
        send: &ChannelConfig,
        recv: &ChannelConfig,
        source: S,
        sink: K,
    ) -> Result<Self> {
        let scalars = engine.scalars();
        scalars.check_slot_length(send.slot_length)?;

        if source.image_count() < scalars.total_images {
            return Err(StreamError::configuration(format!(
                "{} images configured, source holds {}",
                scalars.total_images,
                source.image_count()
            )));
        }

        let (width, height) = (scalars.img_width, scalars.img_height);
        let frame = load_frame(&source, 0, width, height)?;

        let tx = SendChannel::open_with(engine, FROM_HOST, send)?;
        let rx = RecvChannel::open_with(engine, TO_HOST, recv)?;

        Ok(Self {
            tx,
            rx,
            source,
            sink,
            frame,
            width,
            height,
            total_images: scalars.total_images,
            state: StreamState::Sending { image: 0, pixel: 0 },
            stats: StreamStats::new(),
            started: None,
        })
    }

    /// Make at most one send and one receive attempt
    pub fn poll(&mut self) -> Result<PollOutcome> {
        let mut outcome = PollOutcome::default();
        if self.state == StreamState::Done {
            outcome.finished = true;
            return Ok(outcome);
        }
        let started = *self.started.get_or_insert_with(Instant::now);

        if let StreamState::Sending { image, pixel } = self.state {
            outcome.sent = self.tx.send(&self.frame.pixels()[pixel..])?;
            if outcome.sent {
                self.advance(image, pixel)?;
            }
        }

        if let Some(slot) = self.rx.recv()? {
            outcome.received = true;
            self.stats.slots_received += 1;
            trace!("result slot {} received", self.stats.slots_received);

            for record in slot {
                if record.is_measurement() {
                    self.sink.report(record)?;
                    self.stats.records_reported += 1;
                } else {
                    self.stats.boundary_records += 1;
                }
            }

            if end_of_results(slot) {
                self.rx.flush()?;
                self.sink.finish()?;
                self.state = StreamState::Done;
                outcome.finished = true;
                info!("All results received");
            }
        }

        if !outcome.made_progress() {
            self.stats.idle_polls += 1;
        }
        self.stats.elapsed = started.elapsed();
        Ok(outcome)
    }

    /// Poll until the termination marker arrives
    pub fn run(&mut self) -> Result<StreamStats> {
        loop {
            let outcome = self.poll()?;
            if outcome.finished {
                return Ok(self.stats.clone());
            }
            if !outcome.made_progress() {
                std::hint::spin_loop();
            }
        }
    }

    /// Like [`run`](Self::run), but give up after `max_polls` polls
    pub fn run_with_limit(&mut self, max_polls: u64) -> Result<StreamStats> {
        for _ in 0..max_polls {
            let outcome = self.poll()?;
            if outcome.finished {
                return Ok(self.stats.clone());
            }
            if !outcome.made_progress() {
                std::hint::spin_loop();
            }
        }
        Err(StreamError::Stalled { polls: max_polls })
    }

    fn advance(&mut self, image: usize, pixel: usize) -> Result<()> {
        let slot_length = self.tx.slot_length();
        self.stats.slots_sent += 1;
        self.stats.pixels_sent += slot_length as u64;

        let next = pixel + slot_length;
        if next < self.frame.pixel_count() {
            self.state = StreamState::Sending { image, pixel: next };
            return Ok(());
        }

        debug!("Image {} sent", image);
        let image = image + 1;
        if image == self.total_images {
            debug!("All {} images sent, draining results", self.total_images);
            self.state = StreamState::Draining;
        } else {
            self.frame = load_frame(&self.source, image, self.width, self.height)?;
            self.state = StreamState::Sending { image, pixel: 0 };
        }
        Ok(())
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn is_done(&self) -> bool {
        self.state == StreamState::Done
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn send_channel(&self) -> &SendChannel<'e, i16, D> {
        &self.tx
    }

    pub fn recv_channel(&self) -> &RecvChannel<'e, ResultRecord, D> {
        &self.rx
    }

    /// Release both streams and hand back the sink
    pub fn into_sink(self) -> K {
        self.sink
    }
}

fn load_frame<S: ImageSource>(source: &S, index: usize, width: usize, height: usize) -> Result<Frame> {
    let frame = source.image(index)?;
    if !frame.has_size(width, height) {
        return Err(StreamError::configuration(format!(
            "image {} is {}x{}, expected {}x{}",
            index,
            frame.width(),
            frame.height(),
            width,
            height
        )));
    }
    debug!("Loaded image {}", index);
    Ok(frame)
}
