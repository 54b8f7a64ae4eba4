//! Audio files in and out: decoded media, impulse responses and recordings.

pub mod impulse;
pub mod media;
pub mod recorder;

use std::io::Read;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::buffer::SampleBuffer;
use crate::error::ConsoleError;

pub use impulse::ImpulseSource;
pub use media::WavSource;
pub use recorder::Recorder;

/// Decode a WAV file into deinterleaved float channels.
pub fn read_wav(path: &Path) -> Result<SampleBuffer, ConsoleError> {
    let reader = WavReader::open(path)?;
    decode(reader)
}

/// Decode WAV data from any reader. Integer samples of any width are scaled
/// to -1..1; float samples pass through.
pub fn decode_wav<R: Read>(source: R) -> Result<SampleBuffer, ConsoleError> {
    decode(WavReader::new(source)?)
}

fn decode<R: Read>(mut reader: WavReader<R>) -> Result<SampleBuffer, ConsoleError> {
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|x| x as f32 / max))
                .collect::<Result<_, _>>()?
        }
    };

    let channel_count = spec.channels.max(1) as usize;
    let mut channels = vec![Vec::with_capacity(interleaved.len() / channel_count); channel_count];
    for frame in interleaved.chunks_exact(channel_count) {
        for (channel, sample) in channels.iter_mut().zip(frame) {
            channel.push(*sample);
        }
    }
    log::debug!(
        target: "io",
        "decoded {} channel(s), {} frames at {} Hz",
        channel_count,
        channels[0].len(),
        spec.sample_rate
    );
    Ok(SampleBuffer::new(spec.sample_rate as f32, channels))
}

/// Write stereo float frames as a 32-bit float WAV.
pub fn write_wav(path: &Path, sample_rate: u32, interleaved: &[f32]) -> Result<(), ConsoleError> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in interleaved {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn wav_bytes(spec: WavSpec, write: impl FnOnce(&mut WavWriter<&mut Cursor<Vec<u8>>>)) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            write(&mut writer);
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_16_bit_stereo() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, |w| {
            for s in [16_384i16, -16_384, 0, 32_767] {
                w.write_sample(s).unwrap();
            }
        });
        let buffer = decode_wav(Cursor::new(bytes)).unwrap();
        assert_eq!(buffer.sample_rate(), 22_050.0);
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.channel(0).unwrap()[0], 0.5);
        assert_eq!(buffer.channel(1).unwrap()[0], -0.5);
    }

    #[test]
    fn test_decode_24_bit_mono() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 24,
            sample_format: SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, |w| w.write_sample(-4_194_304i32).unwrap());
        let buffer = decode_wav(Cursor::new(bytes)).unwrap();
        assert_eq!(buffer.channel_count(), 1);
        assert_eq!(buffer.channel(0).unwrap()[0], -0.5);
    }

    #[test]
    fn test_float_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        write_wav(&path, 44_100, &[0.25, -0.25, 0.5, -0.5]).unwrap();
        let buffer = read_wav(&path).unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.channel(1).unwrap(), &[-0.25, -0.5]);
    }

    #[test]
    fn test_garbage_is_a_wav_error() {
        let err = decode_wav(Cursor::new(b"not a wav file".to_vec())).unwrap_err();
        assert!(matches!(err, ConsoleError::Wav(_)));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = read_wav(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, ConsoleError::Wav(_) | ConsoleError::Io(_)));
    }
}
