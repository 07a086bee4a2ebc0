// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Digitized sound effect lumps.
//!
//! A lump is a u16 format tag, a u16 sample rate, a u32 sample count and then
//! unsigned 8 bit mono samples. Some lumps carry 16 bytes of padding on either
//! side of the samples, which is detected and stripped.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hound::{SampleFormat, WavSpec, WavWriter};

const HEADER_LENGTH: usize = 8;
const PADDING: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("sound lump is too short ({0} bytes)")]
    TooShort(usize),

    #[error("sample count {count} doesn't fit in {available} bytes")]
    InvalidSampleCount { count: i64, available: usize },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An immutable sound effect. Cloning shares the sample data.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    name: String,
    sample_rate: u32,
    samples: Arc<[u8]>,
    amplitude: f32,
}

impl AudioAsset {
    /// Creates an asset from unsigned 8 bit mono samples.
    pub fn new(name: &str, sample_rate: u32, samples: Arc<[u8]>) -> AudioAsset {
        let amplitude = base_amplitude(&samples, sample_rate);
        AudioAsset {
            name: name.to_string(),
            sample_rate,
            samples,
            amplitude,
        }
    }

    /// Parses a digitized sound lump.
    pub fn from_lump(name: &str, data: &[u8]) -> Result<AudioAsset, AssetError> {
        if data.len() < HEADER_LENGTH {
            return Err(AssetError::TooShort(data.len()));
        }

        let sample_rate = u16::from_le_bytes([data[2], data[3]]);
        let mut count = i64::from(i32::from_le_bytes([data[4], data[5], data[6], data[7]]));
        let mut offset = HEADER_LENGTH;
        if contains_padding(data) {
            offset += PADDING;
            count -= 2 * PADDING as i64;
        }

        let available = data.len() - offset.min(data.len());
        if count <= 0 || count as usize > available {
            return Err(AssetError::InvalidSampleCount { count, available });
        }

        let samples: Arc<[u8]> = Arc::from(&data[offset..offset + count as usize]);
        Ok(AudioAsset::new(name, u32::from(sample_rate), samples))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Unsigned 8 bit samples, centered on 128.
    pub fn samples(&self) -> &Arc<[u8]> {
        &self.samples
    }

    /// Peak deviation from silence over the first fifth of a second, in [0, 1].
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// Writes the sound as an 8 bit mono WAV file.
    pub fn write_wav<W: Write + Seek>(&self, writer: W) -> Result<(), AssetError> {
        let mut writer = WavWriter::new(
            writer,
            WavSpec {
                channels: 1,
                sample_rate: self.sample_rate,
                bits_per_sample: 8,
                sample_format: SampleFormat::Int,
            },
        )?;
        for sample in self.samples.iter() {
            writer.write_sample((i16::from(*sample) - 128) as i8)?;
        }
        writer.finalize()?;
        Ok(())
    }

    pub fn save_wav(&self, path: &Path) -> Result<(), AssetError> {
        self.write_wav(BufWriter::new(File::create(path)?))
    }
}

/// True if the first 16 and the last 16 samples declared in the header are
/// each identical, which marks a padded lump.
pub fn contains_padding(data: &[u8]) -> bool {
    if data.len() < HEADER_LENGTH {
        return false;
    }
    let count = i32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if count < 2 * PADDING as i32 {
        return false;
    }
    let count = count as usize;
    let Some(samples) = data.get(HEADER_LENGTH..HEADER_LENGTH + count) else {
        return false;
    };

    let head = &samples[..PADDING];
    let tail = &samples[count - PADDING..];
    head.iter().all(|s| *s == head[0]) && tail.iter().all(|s| *s == tail[PADDING - 1])
}

/// Peak normalized deviation from 128 over the first `min(rate / 5, len)` samples.
pub fn base_amplitude(samples: &[u8], sample_rate: u32) -> f32 {
    let count = (sample_rate as usize / 5).min(samples.len());
    let max = samples[..count]
        .iter()
        .map(|s| (i16::from(*s) - 128).unsigned_abs())
        .max()
        .unwrap_or(0);
    f32::from(max) / 128.0
}
