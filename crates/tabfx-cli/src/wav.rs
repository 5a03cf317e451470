//! Stereo WAV reading and writing.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavWriter};

/// Format of a WAV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Channels in the file.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per sample; 32 means float.
    pub bits_per_sample: u16,
}

impl From<hound::WavSpec> for WavSpec {
    fn from(spec: hound::WavSpec) -> Self {
        Self {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
        }
    }
}

impl From<WavSpec> for hound::WavSpec {
    fn from(spec: WavSpec) -> Self {
        hound::WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            sample_format: if spec.bits_per_sample == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        }
    }
}

/// Deinterleaved stereo audio.
#[derive(Debug, Clone, Default)]
pub struct StereoAudio {
    /// Left channel.
    pub left: Vec<f32>,
    /// Right channel.
    pub right: Vec<f32>,
}

impl StereoAudio {
    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// True if there are no frames.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

/// Reads a WAV file as stereo.
///
/// Mono files are duplicated to both channels; files with more than two
/// channels keep the first two.
pub fn read_stereo(path: impl AsRef<Path>) -> hound::Result<(StereoAudio, WavSpec)> {
    let reader = WavReader::open(path)?;
    let spec = WavSpec::from(reader.spec());
    let channels = usize::from(spec.channels.max(1));

    let samples: Vec<f32> = match reader.spec().sample_format {
        SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()?
        }
    };

    let mut audio = StereoAudio {
        left: Vec::with_capacity(samples.len() / channels),
        right: Vec::with_capacity(samples.len() / channels),
    };
    for frame in samples.chunks_exact(channels) {
        audio.left.push(frame[0]);
        audio.right.push(frame.get(1).copied().unwrap_or(frame[0]));
    }
    Ok((audio, spec))
}

/// Writes stereo audio. Integer formats are clamped to full scale.
pub fn write_stereo(path: impl AsRef<Path>, audio: &StereoAudio, spec: WavSpec) -> hound::Result<()> {
    let spec = WavSpec { channels: 2, ..spec };
    let mut writer = WavWriter::create(path, hound::WavSpec::from(spec))?;

    if spec.bits_per_sample == 32 {
        for (l, r) in audio.left.iter().zip(&audio.right) {
            writer.write_sample(*l)?;
            writer.write_sample(*r)?;
        }
    } else {
        let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
        for (l, r) in audio.left.iter().zip(&audio.right) {
            writer.write_sample((*l * max_val).clamp(-max_val, max_val - 1.0) as i32)?;
            writer.write_sample((*r * max_val).clamp(-max_val, max_val - 1.0) as i32)?;
        }
    }

    writer.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_stereo_float_roundtrip() {
        let audio = StereoAudio {
            left: (0..500).map(|i| (i as f32 / 50.0).sin() * 0.5).collect(),
            right: (0..500).map(|i| (i as f32 / 70.0).cos() * 0.25).collect(),
        };
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 32,
        };
        let file = NamedTempFile::new().unwrap();
        write_stereo(file.path(), &audio, spec).unwrap();

        let (loaded, loaded_spec) = read_stereo(file.path()).unwrap();
        assert_eq!(loaded_spec, spec);
        assert_eq!(loaded.left, audio.left);
        assert_eq!(loaded.right, audio.right);
    }

    #[test]
    fn test_mono_file_is_duplicated() {
        let file = NamedTempFile::new().unwrap();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(file.path(), spec).unwrap();
        for v in [0i16, 16384, -16384] {
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();

        let (audio, spec) = read_stereo(file.path()).unwrap();
        assert_eq!(spec.channels, 1);
        assert_eq!(audio.left, vec![0.0, 0.5, -0.5]);
        assert_eq!(audio.left, audio.right);
    }

    #[test]
    fn test_int_output_is_clamped() {
        let audio = StereoAudio {
            left: vec![2.0, -2.0],
            right: vec![0.0, 0.0],
        };
        let spec = WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 16,
        };
        let file = NamedTempFile::new().unwrap();
        write_stereo(file.path(), &audio, spec).unwrap();

        let (loaded, _) = read_stereo(file.path()).unwrap();
        assert!((loaded.left[0] - 32767.0 / 32768.0).abs() < 1e-6);
        assert_eq!(loaded.left[1], -1.0);
    }
}
