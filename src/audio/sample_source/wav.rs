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
use hound::WavReader;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use super::error::SampleSourceError;
use super::traits::{prepare_output, SampleSource};

/// A sample source that reads WAV files, used for pre-rendered music.
pub struct WavSampleSource {
    wav_reader: WavReader<BufReader<File>>,
    // Interleaved read buffer, reused between chunks.
    sample_buffer: Vec<f32>,
    bits_per_sample: u16,
    sample_format: hound::SampleFormat,
    channels: u16,
    sample_rate: u32,
    duration: Duration,
}

impl WavSampleSource {
    /// Creates a new WAV sample source from a file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SampleSourceError> {
        let wav_reader = WavReader::open(&path)?;
        let spec = wav_reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(SampleSourceError::UnsupportedStream(format!(
                "{} channels at {}Hz",
                spec.channels, spec.sample_rate
            )));
        }
        let duration = Duration::from_secs_f64(
            f64::from(wav_reader.duration()) / f64::from(spec.sample_rate),
        );

        Ok(Self {
            wav_reader,
            sample_buffer: Vec::new(),
            bits_per_sample: spec.bits_per_sample,
            sample_format: spec.sample_format,
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            duration,
        })
    }

    /// Reads up to `count` interleaved samples into the sample buffer.
    fn read_samples(&mut self, count: usize) -> Result<(), SampleSourceError> {
        self.sample_buffer.clear();
        if self.sample_format == hound::SampleFormat::Float {
            for sample in self.wav_reader.samples::<f32>().take(count) {
                self.sample_buffer.push(sample?);
            }
        } else {
            // Use i64 to avoid overflow for 32-bit samples
            let scale = 1.0 / (1i64 << (self.bits_per_sample - 1)) as f32;
            for sample in self.wav_reader.samples::<i32>().take(count) {
                self.sample_buffer.push(sample? as f32 * scale);
            }
        }
        Ok(())
    }
}

impl SampleSource for WavSampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        prepare_output(output, self.channels)?;

        let channels = self.channels as usize;
        self.read_samples(max_frames * channels)?;

        let frames = self.sample_buffer.len() / channels;
        for frame in self.sample_buffer.chunks_exact(channels) {
            for (out_ch, sample) in output.iter_mut().zip(frame) {
                out_ch.push(*sample);
            }
        }
        Ok(frames)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        Some(self.duration)
    }

    fn rewind(&mut self) -> Result<bool, SampleSourceError> {
        self.wav_reader.seek(0)?;
        Ok(true)
    }
}
