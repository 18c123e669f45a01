//! Sample buffers and the decoders that produce them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::deferred::{deferred, Promise};
use crate::dsp::tape::Tape;
use crate::error::{DecodeError, TimbreError};

pub mod wav;

pub use wav::WavDecoder;

/// Decoded audio. `samples` is always mono; stereo sources also keep their
/// two channels in `stereo`.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundBuffer {
    pub samples: Arc<[f32]>,
    pub samplerate: u32,
    pub stereo: Option<(Arc<[f32]>, Arc<[f32]>)>,
}

impl SoundBuffer {
    pub fn new(samples: impl Into<Arc<[f32]>>, samplerate: u32) -> Self {
        Self {
            samples: samples.into(),
            samplerate,
            stereo: None,
        }
    }

    /// Mono mix is the mean of the two channels.
    pub fn from_stereo(left: Vec<f32>, right: Vec<f32>, samplerate: u32) -> Self {
        let samples: Vec<f32> = left.iter().zip(&right).map(|(l, r)| (l + r) * 0.5).collect();
        Self {
            samples: samples.into(),
            samplerate,
            stereo: Some((left.into(), right.into())),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> f64 {
        if self.samplerate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1000.0 / self.samplerate as f64
    }

    pub fn to_tape(&self) -> Tape {
        Tape::from_samples(Arc::clone(&self.samples), self.samplerate)
    }
}

impl From<&SoundBuffer> for Tape {
    fn from(buffer: &SoundBuffer) -> Self {
        buffer.to_tape()
    }
}

/// One entry in the decoder list. `None` means "not my format", and the
/// next decoder is tried.
pub trait Decoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn decode(&self, data: &[u8]) -> Option<SoundBuffer>;
}

pub fn default_decoders() -> Vec<Box<dyn Decoder>> {
    vec![Box::new(WavDecoder)]
}

/// Try each decoder in order, failing only when all of them do.
pub fn decode(data: &[u8], decoders: &[Box<dyn Decoder>]) -> Result<SoundBuffer, DecodeError> {
    if decoders.is_empty() {
        return Err(DecodeError::NoDecoders);
    }
    for decoder in decoders {
        if let Some(buffer) = decoder.decode(data) {
            debug!(decoder = decoder.name(), samples = buffer.len(), "decoded");
            return Ok(buffer);
        }
        debug!(decoder = decoder.name(), "decoder rejected data");
    }
    warn!(bytes = data.len(), "no decoder accepted the data");
    Err(DecodeError::Unsupported)
}

/// Read and decode a file on a background thread.
pub fn load(path: impl AsRef<Path>) -> Promise<SoundBuffer, TimbreError> {
    load_with(path, default_decoders())
}

pub fn load_with(path: impl AsRef<Path>, decoders: Vec<Box<dyn Decoder>>) -> Promise<SoundBuffer, TimbreError> {
    let path: PathBuf = path.as_ref().to_path_buf();
    let (resolver, promise) = deferred();
    std::thread::spawn(move || {
        let result = std::fs::read(&path)
            .map_err(TimbreError::from)
            .and_then(|bytes| decode(&bytes, &decoders).map_err(TimbreError::from));
        match result {
            Ok(buffer) => resolver.resolve(buffer),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "load failed");
                resolver.reject(e);
            }
        }
    });
    promise
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Never;

    impl Decoder for Never {
        fn name(&self) -> &'static str {
            "never"
        }

        fn decode(&self, _data: &[u8]) -> Option<SoundBuffer> {
            None
        }
    }

    struct Always;

    impl Decoder for Always {
        fn name(&self) -> &'static str {
            "always"
        }

        fn decode(&self, data: &[u8]) -> Option<SoundBuffer> {
            Some(SoundBuffer::new(vec![0.0; data.len()], 8000))
        }
    }

    #[test]
    fn decoders_are_tried_in_order() {
        let list: Vec<Box<dyn Decoder>> = vec![Box::new(Never), Box::new(Always)];
        let buffer = decode(&[1, 2, 3], &list).unwrap();
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn all_decoders_failing_is_an_error() {
        let list: Vec<Box<dyn Decoder>> = vec![Box::new(Never)];
        assert_eq!(decode(&[0; 8], &list), Err(DecodeError::Unsupported));
        assert_eq!(decode(&[0; 8], &[]), Err(DecodeError::NoDecoders));
    }

    #[test]
    fn stereo_buffer_keeps_channels_and_mixes_mono() {
        let buffer = SoundBuffer::from_stereo(vec![1.0, 0.0], vec![0.0, -1.0], 100);
        assert_eq!(&*buffer.samples, &[0.5, -0.5]);
        assert!(buffer.stereo.is_some());
        assert!((buffer.duration_ms() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn missing_file_rejects() {
        let promise = load("/definitely/not/here.wav");
        for _ in 0..200 {
            if !promise.is_pending() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(promise.is_rejected());
    }
}
