//! 16-bit little-endian PCM WAV I/O: `f32` samples in `[-1, 1]`, canonical
//! 44-byte header.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{OnnxKitError, Result};

pub fn read_samples(path: &str) -> Result<(Vec<f32>, WavSpec)> {
    let mut reader = WavReader::open(path)
        .map_err(|e| OnnxKitError::ModelSourceError(format!("opening wav file {path}: {e}")))?;
    let spec = reader.spec();

    let samples = reader
        .samples::<i16>()
        .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .map_err(|e| OnnxKitError::ModelSourceError(format!("reading wav samples: {e}")))?;

    Ok((samples, spec))
}

pub fn write_samples(path: &str, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)
        .map_err(|e| OnnxKitError::ModelSourceError(format!("creating wav file {path}: {e}")))?;

    for &sample in samples {
        let quantized = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(quantized)
            .map_err(|e| OnnxKitError::ModelSourceError(format!("writing wav sample: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| OnnxKitError::ModelSourceError(format!("finalizing wav file: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_stays_within_per_sample_tolerance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wav");
        let path_str = path.to_str().unwrap();

        let original: Vec<f32> = (0..100).map(|i| (i as f32 / 50.0) - 1.0).collect();
        write_samples(path_str, &original, 16_000).unwrap();
        let (recovered, spec) = read_samples(path_str).unwrap();

        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(recovered.len(), original.len());
        for (a, b) in original.iter().zip(recovered.iter()) {
            assert!((a - b).abs() <= 2.0 / 32768.0);
        }
    }
}
