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

use rubato::{FastFixedOut, PolynomialDegree, Resampler};

use super::error::SampleSourceError;
use super::traits::{prepare_output, SampleSource};

/// Output frames produced per resampler pass.
const RESAMPLER_CHUNK_FRAMES: usize = 256;

/// Pitch is limited to two octaves either way.
pub const MIN_PITCH: f32 = 0.25;
pub const MAX_PITCH: f32 = 4.0;

fn planar_len(channels: &[Vec<f32>]) -> usize {
    channels.first().map_or(0, Vec::len)
}

/// Converts a source to the output sample rate and applies a playback pitch.
///
/// A source already at the output rate and played at its natural pitch is
/// passed through untouched. Otherwise frames go through a polynomial
/// resampler whose ratio can be changed while playing.
pub struct Transcoder {
    source: Box<dyn SampleSource>,
    source_rate: u32,
    target_rate: u32,
    channels: u16,
    pitch: f32,
    resampler: Option<FastFixedOut<f32>>,
    /// Source frames waiting for the resampler.
    pending: Vec<Vec<f32>>,
    /// Resampled frames not yet handed out, starting at `read_pos`.
    ready: Vec<Vec<f32>>,
    read_pos: usize,
    read_buffer: Vec<Vec<f32>>,
    scratch: Vec<Vec<f32>>,
    source_finished: bool,
    flushed: bool,
}

impl Transcoder {
    pub fn new(
        source: Box<dyn SampleSource>,
        target_rate: u32,
        pitch: f32,
    ) -> Result<Transcoder, SampleSourceError> {
        let channels = source.channel_count();
        let source_rate = source.sample_rate();
        if channels == 0 || source_rate == 0 || target_rate == 0 {
            return Err(SampleSourceError::UnsupportedStream(format!(
                "{} channels at {}Hz cannot be played at {}Hz",
                channels, source_rate, target_rate
            )));
        }

        let num_channels = channels as usize;
        let mut transcoder = Transcoder {
            source,
            source_rate,
            target_rate,
            channels,
            pitch: 1.0,
            resampler: None,
            pending: vec![Vec::new(); num_channels],
            ready: vec![Vec::new(); num_channels],
            read_pos: 0,
            read_buffer: vec![Vec::with_capacity(RESAMPLER_CHUNK_FRAMES); num_channels],
            scratch: Vec::new(),
            source_finished: false,
            flushed: false,
        };
        transcoder.set_pitch(pitch)?;
        Ok(transcoder)
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// True when frames pass through without resampling.
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }

    /// Changes the playback pitch. 2.0 plays twice as fast, an octave up.
    pub fn set_pitch(&mut self, pitch: f32) -> Result<(), SampleSourceError> {
        self.pitch = pitch.clamp(MIN_PITCH, MAX_PITCH);
        let relative = 1.0 / f64::from(self.pitch);

        match self.resampler.as_mut() {
            Some(resampler) => resampler
                .set_resample_ratio_relative(relative, true)
                .map_err(|e| SampleSourceError::Resampling(e.to_string())),
            None if self.source_rate == self.target_rate && self.pitch == 1.0 => Ok(()),
            None => {
                let mut resampler = FastFixedOut::<f32>::new(
                    f64::from(self.target_rate) / f64::from(self.source_rate),
                    f64::from(MAX_PITCH),
                    PolynomialDegree::Cubic,
                    RESAMPLER_CHUNK_FRAMES,
                    self.channels as usize,
                )
                .map_err(|e| SampleSourceError::Resampling(e.to_string()))?;
                resampler
                    .set_resample_ratio_relative(relative, false)
                    .map_err(|e| SampleSourceError::Resampling(e.to_string()))?;
                self.scratch = resampler.output_buffer_allocate(true);
                self.resampler = Some(resampler);
                Ok(())
            }
        }
    }

    /// Copies up to `max_frames` resampled frames into `output`.
    fn drain_ready(&mut self, output: &mut [Vec<f32>], max_frames: usize) -> usize {
        let count = planar_len(&self.ready)
            .saturating_sub(self.read_pos)
            .min(max_frames);
        if count == 0 {
            return 0;
        }
        for (out, ready) in output.iter_mut().zip(self.ready.iter()) {
            out.extend_from_slice(&ready[self.read_pos..self.read_pos + count]);
        }
        self.read_pos += count;
        if self.read_pos == planar_len(&self.ready) {
            for ready in self.ready.iter_mut() {
                ready.clear();
            }
            self.read_pos = 0;
        }
        count
    }

    /// Runs one resampler pass. Returns false once everything, including the
    /// last partial block, has been resampled.
    fn resample_next(&mut self) -> Result<bool, SampleSourceError> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(false);
        };
        if self.flushed {
            return Ok(false);
        }

        let needed = resampler.input_frames_next();
        while !self.source_finished && planar_len(&self.pending) < needed {
            let wanted = needed - planar_len(&self.pending);
            let frames = self.source.next_chunk(&mut self.read_buffer, wanted)?;
            if frames == 0 {
                self.source_finished = true;
                break;
            }
            for (pending, read) in self.pending.iter_mut().zip(self.read_buffer.iter()) {
                pending.extend_from_slice(&read[..frames]);
            }
        }

        let available = planar_len(&self.pending);
        let result = if available >= needed {
            resampler.process_into_buffer(&self.pending, &mut self.scratch, None)
        } else if available > 0 {
            // The tail is padded with silence.
            self.flushed = true;
            resampler.process_partial_into_buffer(
                Some(self.pending.as_slice()),
                &mut self.scratch,
                None,
            )
        } else {
            self.flushed = true;
            return Ok(false);
        };
        let (consumed, produced) = result.map_err(|e| SampleSourceError::Resampling(e.to_string()))?;

        for pending in self.pending.iter_mut() {
            let consumed = consumed.min(pending.len());
            pending.drain(..consumed);
        }
        for (ready, scratch) in self.ready.iter_mut().zip(self.scratch.iter()) {
            ready.extend_from_slice(&scratch[..produced]);
        }
        Ok(true)
    }
}

impl SampleSource for Transcoder {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        if self.resampler.is_none() {
            return self.source.next_chunk(output, max_frames);
        }
        prepare_output(output, self.channels)?;

        let mut written = 0;
        while written < max_frames {
            written += self.drain_ready(output, max_frames - written);
            if written < max_frames && !self.resample_next()? {
                break;
            }
        }
        Ok(written)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.target_rate
    }

    fn duration(&self) -> Option<Duration> {
        self.source
            .duration()
            .map(|duration| duration.div_f32(self.pitch))
    }

    fn rewind(&mut self) -> Result<bool, SampleSourceError> {
        if !self.source.rewind()? {
            return Ok(false);
        }
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
            resampler
                .set_resample_ratio_relative(1.0 / f64::from(self.pitch), false)
                .map_err(|e| SampleSourceError::Resampling(e.to_string()))?;
        }
        for buffer in self.pending.iter_mut().chain(self.ready.iter_mut()) {
            buffer.clear();
        }
        self.read_pos = 0;
        self.source_finished = false;
        self.flushed = false;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sample_source::MemorySampleSource;

    fn transcoder(samples: Vec<f32>, rate: u32, target: u32, pitch: f32) -> Transcoder {
        Transcoder::new(Box::new(MemorySampleSource::new(samples, 1, rate)), target, pitch)
            .unwrap()
    }

    fn read_all(transcoder: &mut Transcoder) -> Vec<f32> {
        let mut output = vec![Vec::new()];
        let mut all = Vec::new();
        loop {
            let frames = transcoder.next_chunk(&mut output, 1000).unwrap();
            if frames == 0 {
                return all;
            }
            all.extend_from_slice(&output[0]);
        }
    }

    #[test]
    fn test_passthrough() {
        let mut transcoder = transcoder(vec![0.1, 0.2, 0.3], 44100, 44100, 1.0);
        assert!(transcoder.is_passthrough());
        assert_eq!(read_all(&mut transcoder), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_upsampling_doubles_length() {
        let mut transcoder = transcoder(vec![0.5; 2205], 22050, 44100, 1.0);
        assert!(!transcoder.is_passthrough());
        assert_eq!(transcoder.sample_rate(), 44100);

        let output = read_all(&mut transcoder);
        assert!(output.len() >= 4410, "{} frames", output.len());
        assert!(output.len() <= 4410 + 2 * RESAMPLER_CHUNK_FRAMES);
        for sample in &output[1000..4000] {
            assert!((sample - 0.5).abs() < 1e-3, "{sample}");
        }
    }

    #[test]
    fn test_pitch_shortens_playback() {
        let mut transcoder = transcoder(vec![0.5; 4410], 44100, 44100, 2.0);
        assert!(!transcoder.is_passthrough());
        let duration = transcoder.duration().unwrap();
        assert!(duration.abs_diff(Duration::from_millis(50)) < Duration::from_millis(1));

        let output = read_all(&mut transcoder);
        assert!(output.len() >= 2205, "{} frames", output.len());
        assert!(output.len() <= 2205 + 2 * RESAMPLER_CHUNK_FRAMES);
    }

    #[test]
    fn test_pitch_change_starts_resampling() {
        let mut transcoder = transcoder(vec![0.5; 4410], 44100, 44100, 1.0);
        assert!(transcoder.is_passthrough());
        transcoder.set_pitch(0.5).unwrap();
        assert!(!transcoder.is_passthrough());
        assert_eq!(transcoder.pitch(), 0.5);

        transcoder.set_pitch(100.0).unwrap();
        assert_eq!(transcoder.pitch(), MAX_PITCH);
    }

    #[test]
    fn test_rewind_restarts() {
        let mut transcoder = transcoder(vec![0.5; 1000], 11025, 44100, 1.0);
        let first = read_all(&mut transcoder).len();
        assert!(transcoder.rewind().unwrap());
        assert_eq!(read_all(&mut transcoder).len(), first);
    }

    #[test]
    fn test_rejects_empty_format() {
        let source = Box::new(MemorySampleSource::new(Vec::new(), 1, 0));
        assert!(matches!(
            Transcoder::new(source, 44100, 1.0),
            Err(SampleSourceError::UnsupportedStream(_))
        ));
    }
}
