//! Drum sample playback.
//!
//! One rodio output stream for the process lifetime. Every sample is decoded
//! once at startup into a buffered source; a hit clones the buffer and mixes
//! it into the stream, so there is no per-hit file I/O or decoding.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use rodio::source::Buffered;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Source};
use thiserror::Error;

use crate::config::KitConfig;
use crate::kit::DrumKind;

type Sample = Buffered<Decoder<BufReader<File>>>;

/// Errors from the audio engine.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("failed to open audio output: {0}")]
    Stream(#[from] rodio::StreamError),
    #[error("failed to open sound {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode sound {path}: {source}")]
    Decode {
        path: PathBuf,
        source: rodio::decoder::DecoderError,
    },
    #[error("playback failed: {0}")]
    Play(#[from] rodio::PlayError),
}

/// Owns the output stream and the decoded kit samples.
pub struct AudioEngine {
    // Dropping the stream silences everything; keep it alive with the engine.
    _stream: OutputStream,
    handle: OutputStreamHandle,
    samples: HashMap<DrumKind, Sample>,
}

impl AudioEngine {
    /// Open the default output device and preload every pad's sample.
    pub fn new(config: &KitConfig) -> Result<Self, AudioError> {
        let (stream, handle) = OutputStream::try_default()?;

        let mut samples = HashMap::new();
        for pad in &config.pads {
            let file = File::open(&pad.sound).map_err(|source| AudioError::Open {
                path: pad.sound.clone(),
                source,
            })?;
            let decoder =
                Decoder::new(BufReader::new(file)).map_err(|source| AudioError::Decode {
                    path: pad.sound.clone(),
                    source,
                })?;
            samples.insert(pad.kind, decoder.buffered());
            log::info!("Loaded sample for {:?} from {}", pad.kind, pad.sound.display());
        }

        Ok(Self {
            _stream: stream,
            handle,
            samples,
        })
    }

    /// Fire-and-forget playback of a drum sample. Unknown kinds are a no-op.
    pub fn play(&self, kind: DrumKind) -> Result<(), AudioError> {
        if let Some(sample) = self.samples.get(&kind) {
            self.handle.play_raw(sample.clone().convert_samples())?;
        }
        Ok(())
    }
}
