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
use std::sync::Arc;
use std::time::Duration;

use super::error::SampleSourceError;
use super::traits::{prepare_output, SampleSource};
use crate::sound::AudioAsset;

/// Plays an 8-bit sound effect. The samples are shared with the library, so
/// starting a sound never copies the asset.
pub struct ClipSampleSource {
    asset: Arc<AudioAsset>,
    position: usize,
}

impl ClipSampleSource {
    pub fn new(asset: Arc<AudioAsset>) -> ClipSampleSource {
        ClipSampleSource { asset, position: 0 }
    }
}

/// Maps an unsigned 8-bit sample to [-1, 1).
fn to_f32(sample: u8) -> f32 {
    (f32::from(sample) - 128.0) / 128.0
}

impl SampleSource for ClipSampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        prepare_output(output, 1)?;

        let samples = self.asset.samples();
        let end = samples.len().min(self.position + max_frames);
        output[0].extend(samples[self.position..end].iter().copied().map(to_f32));
        let count = end - self.position;
        self.position = end;
        Ok(count)
    }

    fn channel_count(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.asset.sample_rate()
    }

    fn duration(&self) -> Option<Duration> {
        Some(self.asset.duration())
    }

    fn rewind(&mut self) -> Result<bool, SampleSourceError> {
        self.position = 0;
        Ok(true)
    }
}
