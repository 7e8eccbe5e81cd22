use crate::error::{EngineError, Result};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

pub type SampleRate = u32;

#[derive(Debug, Clone)]
pub struct DecodedAudio {
    samples: Arc<[f32]>,
    sample_rate: SampleRate,
    channels: u16,
}

impl DecodedAudio {
    pub fn from_samples(samples: Vec<f32>, sample_rate: SampleRate, channels: u16) -> Result<Self> {
        if samples.is_empty() || sample_rate == 0 || channels == 0 {
            return Err(EngineError::EmptyAudio);
        }
        Ok(Self {
            samples: samples.into(),
            sample_rate,
            channels,
        })
    }

    pub fn samples(&self) -> &Arc<[f32]> {
        &self.samples
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn frame_at(&self, seconds: f64) -> usize {
        let frame = (seconds.max(0.0) * self.sample_rate as f64) as usize;
        frame.min(self.frames())
    }

    pub fn mono(&self, frame: usize) -> f32 {
        let ch = self.channels as usize;
        let start = frame * ch;
        match self.samples.get(start..start + ch) {
            Some(s) => s.iter().sum::<f32>() / ch as f32,
            None => 0.0,
        }
    }
}

pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let src = std::fs::File::open(path)?;
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    decode(Box::new(src), hint)
}

pub fn decode_bytes(bytes: Vec<u8>) -> Result<DecodedAudio> {
    decode(Box::new(Cursor::new(bytes)), Hint::new())
}

fn decode(src: Box<dyn MediaSource>, hint: Hint) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(src, Default::default());

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = symphonia::default::get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
    let mut format = probed.format;

    // First audio track with a known (decodeable) codec.
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(EngineError::NoAudioTrack)?;

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &dec_opts)?;
    let track_id = track.id;

    let mut all_samples = Vec::<f32>::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut buf_frames = 0u64;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream
            Err(Error::IoError(_)) => break,
            Err(Error::ResetRequired) => break,
            Err(err) => return Err(err.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                let spec = *audio_buf.spec();
                let capacity = audio_buf.capacity() as u64;
                // Capacity, not length; grow the buffer if a later packet is larger.
                if sample_buf.is_none() || capacity > buf_frames {
                    sample_rate = spec.rate;
                    channels = spec.channels.count() as u16;
                    sample_buf = Some(SampleBuffer::<f32>::new(capacity, spec));
                    buf_frames = capacity;
                }
                if let Some(buf) = &mut sample_buf {
                    buf.copy_interleaved_ref(audio_buf);
                    all_samples.extend_from_slice(buf.samples());
                }
            }
            // Corrupt packets are skipped
            Err(Error::DecodeError(err)) => {
                tracing::debug!("skipping undecodable packet: {err}");
            }
            Err(err) => return Err(err.into()),
        }
    }

    DecodedAudio::from_samples(all_samples, sample_rate, channels)
}
