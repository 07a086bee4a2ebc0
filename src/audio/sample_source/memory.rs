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
use std::time::Duration;

use super::error::SampleSourceError;
use super::traits::{prepare_output, SampleSource};

/// Plays back float samples held in memory. Used by tests.
/// Samples held in memory. Used to drive mixers and read-ahead buffers in tests.
pub struct MemorySampleSource {
    planar_samples: Vec<Vec<f32>>,
    current_frame: usize,
    channel_count: u16,
    sample_rate: u32,
}

impl MemorySampleSource {
    /// Splits interleaved samples into channels.
    pub fn new(interleaved_samples: Vec<f32>, channel_count: u16, sample_rate: u32) -> Self {
        let num_channels = channel_count as usize;
        let planar_samples = (0..num_channels)
            .map(|ch| {
                interleaved_samples
                    .iter()
                    .skip(ch)
                    .step_by(num_channels)
                    .copied()
                    .collect()
            })
            .collect();

        Self {
            planar_samples,
            current_frame: 0,
            channel_count,
            sample_rate,
        }
    }

    fn total_frames(&self) -> usize {
        self.planar_samples.first().map(|c| c.len()).unwrap_or(0)
    }
}

impl SampleSource for MemorySampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        prepare_output(output, self.channel_count)?;

        let to_copy = self
            .total_frames()
            .saturating_sub(self.current_frame)
            .min(max_frames);
        for (out_ch, samples) in output.iter_mut().zip(self.planar_samples.iter()) {
            out_ch.extend_from_slice(&samples[self.current_frame..self.current_frame + to_copy]);
        }
        self.current_frame += to_copy;
        Ok(to_copy)
    }

    fn channel_count(&self) -> u16 {
        self.channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(
            self.total_frames() as f64 / self.sample_rate as f64,
        ))
    }

    fn rewind(&mut self) -> Result<bool, SampleSourceError> {
        self.current_frame = 0;
        Ok(true)
    }
}
