use crate::error::{EngineError, Result};
use crate::file_reader::{DecodedAudio, SampleRate};
use rodio::Source;
use std::sync::Arc;
use std::time::Duration;

// `stop` must be idempotent: stopping a stopped transport does nothing.
pub trait Transport {
    fn name(&self) -> &'static str;
    fn start(&mut self, audio: &DecodedAudio, offset_secs: f64) -> Result<()>;
    fn stop(&mut self);
    fn is_active(&self) -> bool;
}

#[derive(Clone)]
pub struct PlaybackSource {
    samples: Arc<[f32]>,
    sample_rate: SampleRate,
    channels: u16,
    // Index into the interleaved samples
    position: usize,
}

impl PlaybackSource {
    pub fn new(audio: &DecodedAudio, offset_secs: f64) -> Self {
        let frame = audio.frame_at(offset_secs);
        Self {
            samples: Arc::clone(audio.samples()),
            sample_rate: audio.sample_rate(),
            channels: audio.channels(),
            position: frame * audio.channels() as usize,
        }
    }
}

impl Iterator for PlaybackSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.samples.get(self.position).copied();
        self.position += 1;
        sample
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.samples.len().saturating_sub(self.position);
        (left, Some(left))
    }
}

impl Source for PlaybackSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> rodio::ChannelCount {
        self.channels
    }

    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

pub struct RodioTransport {
    stream: rodio::OutputStream,
    sink: Option<rodio::Sink>,
}

impl RodioTransport {
    pub fn open() -> Result<Self> {
        let mut stream = rodio::OutputStreamBuilder::open_default_stream()
            .map_err(|err| EngineError::Output(err.to_string()))?;
        stream.log_on_drop(false);
        Ok(Self { stream, sink: None })
    }
}

impl Transport for RodioTransport {
    fn name(&self) -> &'static str {
        "rodio"
    }

    fn start(&mut self, audio: &DecodedAudio, offset_secs: f64) -> Result<()> {
        self.stop();
        let sink = rodio::Sink::connect_new(self.stream.mixer());
        sink.append(PlaybackSource::new(audio, offset_secs));
        sink.play();
        self.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn is_active(&self) -> bool {
        self.sink.is_some()
    }
}

#[derive(Debug, Default)]
pub struct NullTransport {
    active: bool,
}

impl NullTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for NullTransport {
    fn name(&self) -> &'static str {
        "silent"
    }

    fn start(&mut self, _audio: &DecodedAudio, _offset_secs: f64) -> Result<()> {
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

pub fn open_transport(mute: bool) -> Box<dyn Transport> {
    if mute {
        tracing::info!("audio output muted");
        return Box::new(NullTransport::new());
    }
    match RodioTransport::open() {
        Ok(transport) => Box::new(transport),
        Err(err) => {
            tracing::warn!("{err}; continuing without sound");
            Box::new(NullTransport::new())
        }
    }
}
