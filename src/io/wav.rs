use super::{Decoder, SoundBuffer};

/*
WAV Decoder
===========

    offset  size  field
    0       4     "RIFF"
    4       4     file length - 8 (must match exactly)
    8       4     "WAVE"
    12      ...   chunks: 4-byte id, 4-byte little-endian length, payload
                  (odd lengths are padded to even)

The "fmt " chunk supplies:

    +2   channels
    +4   sample rate
    +14  bits per sample

and the "data" chunk the interleaved samples. Other chunks are skipped, so
files with LIST/fact chunks or an extensible format header still load.

Samples are scaled by 1 / (2^(bits-1) - 1). 8-bit data is unsigned with a
midpoint of 128. With two or more channels the mono mix is the mean of all
channels; stereo files also keep left and right.
*/

#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

#[derive(Debug, Clone, Copy)]
struct Format {
    channels: usize,
    samplerate: u32,
    bits: u16,
}

fn u16_le(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(data.get(at..at + 2)?.try_into().ok()?))
}

fn u32_le(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(data.get(at..at + 4)?.try_into().ok()?))
}

impl Decoder for WavDecoder {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn decode(&self, data: &[u8]) -> Option<SoundBuffer> {
        if data.get(0..4)? != b"RIFF" {
            return None;
        }
        if u32_le(data, 4)? as usize + 8 != data.len() {
            return None;
        }
        if data.get(8..12)? != b"WAVE" {
            return None;
        }

        let mut format = None;
        let mut pos = 12;
        while pos + 8 <= data.len() {
            let id = &data[pos..pos + 4];
            let len = u32_le(data, pos + 4)? as usize;
            let body = pos + 8;
            match id {
                b"fmt " => {
                    format = Some(Format {
                        channels: u16_le(data, body + 2)? as usize,
                        samplerate: u32_le(data, body + 4)?,
                        bits: u16_le(data, body + 14)?,
                    });
                }
                b"data" => {
                    let payload = data.get(body..body + len)?;
                    return samples(format?, payload);
                }
                _ => {}
            }
            pos = body + len + (len & 1);
        }
        None
    }
}

fn samples(format: Format, payload: &[u8]) -> Option<SoundBuffer> {
    let Format {
        channels,
        samplerate,
        bits,
    } = format;
    if channels == 0 || samplerate == 0 {
        return None;
    }
    let width = match bits {
        8 => 1,
        16 => 2,
        24 => 3,
        32 => 4,
        _ => return None,
    };
    let scale = 1.0 / ((1i64 << (bits - 1)) - 1) as f64;

    let read = |chunk: &[u8]| -> f32 {
        let raw: i64 = match width {
            1 => chunk[0] as i64 - 128,
            2 => i16::from_le_bytes([chunk[0], chunk[1]]) as i64,
            3 => {
                let bb = chunk[0] as i32 | (chunk[1] as i32) << 8 | (chunk[2] as i32) << 16;
                ((bb << 8) >> 8) as i64
            }
            _ => i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as i64,
        };
        (raw as f64 * scale) as f32
    };

    let frames = payload.len() / (width * channels);
    let mut mono = Vec::with_capacity(frames);
    let mut left = Vec::new();
    let mut right = Vec::new();
    for frame in payload.chunks_exact(width * channels).take(frames) {
        let values: Vec<f32> = frame.chunks_exact(width).map(read).collect();
        mono.push(values.iter().sum::<f32>() / channels as f32);
        if channels == 2 {
            left.push(values[0]);
            right.push(values[1]);
        }
    }

    let mut buffer = SoundBuffer::new(mono, samplerate);
    if channels == 2 {
        buffer.stereo = Some((left.into(), right.into()));
    }
    Some(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(channels: u16, samplerate: u32, bits: u16, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + payload.len() as u32).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&samplerate.to_le_bytes());
        let block = channels as u32 * bits as u32 / 8;
        out.extend_from_slice(&(samplerate * block).to_le_bytes());
        out.extend_from_slice(&(block as u16).to_le_bytes());
        out.extend_from_slice(&bits.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn decodes_sixteen_bit_mono() {
        let payload: Vec<u8> = [32767i16, 0, -32767].iter().flat_map(|s| s.to_le_bytes()).collect();
        let buffer = WavDecoder.decode(&header(1, 8000, 16, &payload)).unwrap();
        assert_eq!(buffer.samplerate, 8000);
        assert_eq!(&*buffer.samples, &[1.0, 0.0, -1.0]);
    }

    #[test]
    fn stereo_is_averaged_and_kept() {
        let payload: Vec<u8> = [32767i16, 0, 0, -32767].iter().flat_map(|s| s.to_le_bytes()).collect();
        let buffer = WavDecoder.decode(&header(2, 8000, 16, &payload)).unwrap();
        assert_eq!(buffer.len(), 2, "two frames, not four samples");
        assert_eq!(&*buffer.samples, &[0.5, -0.5]);
        let (l, r) = buffer.stereo.unwrap();
        assert_eq!((&*l, &*r), (&[1.0, 0.0][..], &[0.0, -1.0][..]));
    }

    #[test]
    fn decodes_twenty_four_bit() {
        let payload = [0xff, 0xff, 0x7f, 0x01, 0x00, 0x80];
        let buffer = WavDecoder.decode(&header(1, 8000, 24, &payload)).unwrap();
        assert_eq!(buffer.samples[0], 1.0);
        assert!(buffer.samples[1] < -0.99);
    }

    #[test]
    fn rejects_bad_headers() {
        let good = header(1, 8000, 16, &[0, 0]);
        assert!(WavDecoder.decode(&good).is_some());

        let mut wrong_size = good.clone();
        wrong_size.push(0);
        assert!(WavDecoder.decode(&wrong_size).is_none());

        let mut not_riff = good.clone();
        not_riff[0] = b'X';
        assert!(WavDecoder.decode(&not_riff).is_none());

        assert!(WavDecoder.decode(&good[..20]).is_none());
        assert!(WavDecoder.decode(&[]).is_none());
    }
}
