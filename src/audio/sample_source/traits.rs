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

/// Float PCM fed to a playback sink, one frame at a time per channel.
pub trait SampleSource: Send {
    /// Replaces the contents of `output`, one Vec per channel, with up to
    /// `max_frames` frames. Returns the frame count; zero means the source is
    /// exhausted. `output` must hold exactly `channel_count()` Vecs.
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError>;

    fn channel_count(&self) -> u16;

    fn sample_rate(&self) -> u32;

    /// None while the length is unknown, e.g. a score still being rendered.
    fn duration(&self) -> Option<Duration>;

    /// Moves back to the first frame. Returns false if the source can't rewind.
    fn rewind(&mut self) -> Result<bool, SampleSourceError> {
        Ok(false)
    }
}

impl SampleSource for Box<dyn SampleSource> {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        (**self).next_chunk(output, max_frames)
    }

    fn channel_count(&self) -> u16 {
        (**self).channel_count()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn duration(&self) -> Option<Duration> {
        (**self).duration()
    }

    fn rewind(&mut self) -> Result<bool, SampleSourceError> {
        (**self).rewind()
    }
}

/// Checks that an output buffer matches a source's channel count and clears it.
/// Checks the channel count of a caller's buffers and empties them.
pub(crate) fn prepare_output(
    output: &mut [Vec<f32>],
    channels: u16,
) -> Result<(), SampleSourceError> {
    if output.len() != channels as usize {
        return Err(SampleSourceError::ChannelMismatch {
            expected: channels,
            actual: output.len(),
        });
    }
    for channel in output.iter_mut() {
        channel.clear();
    }
    Ok(())
}
