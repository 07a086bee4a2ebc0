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
// Core audio mixing logic that can be used by both CPAL and test implementations
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::sample_source::{SampleSource, Transcoder};
use super::{PlaybackSink, SinkState};

/// Frames pulled from a source at a time.
const SOURCE_CHUNK_FRAMES: usize = 512;

/// One playback slot inside the mixer.
struct Voice {
    /// The source, converted to the output rate and pitch.
    source: Option<Transcoder>,
    output_rate: u32,
    state: SinkState,
    volume: f32,
    pan: f32,
    pitch: f32,
    looping: bool,
    /// Stereo frames at the output rate not yet mixed.
    frames: VecDeque<(f32, f32)>,
    /// True once the source has nothing more to give.
    exhausted: bool,
    /// Planar scratch buffer for the source.
    chunk: Vec<Vec<f32>>,
}

impl Voice {
    fn new(output_rate: u32) -> Voice {
        Voice {
            source: None,
            output_rate,
            state: SinkState::Idle,
            volume: 1.0,
            pan: 0.0,
            pitch: 1.0,
            looping: false,
            frames: VecDeque::new(),
            exhausted: false,
            chunk: Vec::new(),
        }
    }

    fn set_source(&mut self, source: Option<Box<dyn SampleSource>>) {
        self.source = None;
        self.chunk = Vec::new();
        self.frames.clear();
        self.exhausted = false;

        if let Some(source) = source {
            match Transcoder::new(source, self.output_rate, self.pitch) {
                Ok(transcoder) => {
                    self.chunk = vec![
                        Vec::with_capacity(SOURCE_CHUNK_FRAMES);
                        transcoder.channel_count() as usize
                    ];
                    self.source = Some(transcoder);
                }
                Err(e) => {
                    warn!(err = %e, "Unable to convert source to the output format");
                    self.state = SinkState::Failed;
                    return;
                }
            }
        }

        match self.state {
            SinkState::Opening if self.source.is_some() => self.state = SinkState::Playing,
            SinkState::Playing | SinkState::Paused if self.source.is_none() => {
                self.state = SinkState::Stopped
            }
            _ => {}
        }
    }

    fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch;
        let Some(source) = self.source.as_mut() else {
            return;
        };
        if let Err(e) = source.set_pitch(pitch) {
            warn!(err = %e, pitch, "Unable to change pitch");
            self.state = SinkState::Failed;
        }
    }

    /// Pulls the next chunk from the source into the frame queue. Returns
    /// false when the source is finished.
    fn fill(&mut self) -> bool {
        let Some(source) = self.source.as_mut() else {
            return false;
        };

        let mut rewound = false;
        loop {
            match source.next_chunk(&mut self.chunk, SOURCE_CHUNK_FRAMES) {
                Ok(0) => {
                    if !self.looping || rewound {
                        return false;
                    }
                    match source.rewind() {
                        Ok(true) => rewound = true,
                        Ok(false) => return false,
                        Err(_) => {
                            self.state = SinkState::Failed;
                            return false;
                        }
                    }
                }
                Ok(count) => {
                    match self.chunk.as_slice() {
                        [mono] => self.frames.extend(mono[..count].iter().map(|s| (*s, *s))),
                        [left, right, ..] => self.frames.extend(
                            left[..count].iter().copied().zip(right[..count].iter().copied()),
                        ),
                        [] => return false,
                    }
                    return true;
                }
                Err(_) => {
                    self.state = SinkState::Failed;
                    return false;
                }
            }
        }
    }

    fn next_frame(&mut self) -> Option<(f32, f32)> {
        while self.frames.is_empty() && !self.exhausted {
            if !self.fill() {
                self.exhausted = true;
            }
        }
        self.frames.pop_front()
    }

    fn gains(&self) -> (f32, f32) {
        let left = self.volume * (1.0 + self.pan).min(1.0);
        let right = self.volume * (1.0 - self.pan).min(1.0);
        (left, right)
    }

    /// Mixes this voice into an interleaved output buffer.
    fn mix_into(&mut self, output: &mut [f32], channels: usize) {
        if self.state != SinkState::Playing || self.source.is_none() {
            return;
        }
        let (left_gain, right_gain) = self.gains();

        for frame in output.chunks_exact_mut(channels) {
            let Some((left, right)) = self.next_frame() else {
                if self.state != SinkState::Failed {
                    self.state = SinkState::Stopped;
                }
                self.source = None;
                self.frames.clear();
                return;
            };
            let (left, right) = (left * left_gain, right * right_gain);
            match frame {
                [mono] => *mono += (left + right) * 0.5,
                [out_left, out_right, ..] => {
                    *out_left += left;
                    *out_right += right;
                }
                [] => {}
            }
        }
    }
}

type SharedVoice = Arc<Mutex<Voice>>;

/// Core audio mixing logic that's independent of any audio backend
#[derive(Clone)]
pub struct AudioMixer {
    /// Voices of every live sink
    voices: Arc<Mutex<Vec<SharedVoice>>>,
    /// Number of output channels
    num_channels: u16,
    /// Sample rate
    sample_rate: u32,
}

impl AudioMixer {
    /// Creates a new audio mixer
    pub fn new(num_channels: u16, sample_rate: u32) -> Self {
        Self {
            voices: Arc::new(Mutex::new(Vec::new())),
            num_channels,
            sample_rate,
        }
    }

    /// Creates a sink that plays through this mixer. The sink is removed from
    /// the mix when dropped.
    pub fn create_sink(&self) -> MixerSink {
        let voice = Arc::new(Mutex::new(Voice::new(self.sample_rate)));
        self.voices.lock().push(voice.clone());
        MixerSink {
            voice,
            voices: self.voices.clone(),
        }
    }

    /// Mixes every playing voice into an interleaved output buffer. Any
    /// trailing partial frame is left silent.
    pub fn process_into_output(&self, output: &mut [f32]) {
        output.fill(0.0);
        let channels = self.num_channels as usize;
        if channels == 0 {
            return;
        }

        let voices = self.voices.lock();
        for voice in voices.iter() {
            voice.lock().mix_into(output, channels);
        }
    }

    /// Processes multiple frames of audio mixing
    pub fn process_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0f32; num_frames * self.num_channels as usize];
        self.process_into_output(&mut frames);
        frames
    }

    /// Gets the number of output channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of sinks currently attached.
    pub fn sink_count(&self) -> usize {
        self.voices.lock().len()
    }
}

/// A [`PlaybackSink`] backed by one mixer voice.
pub struct MixerSink {
    voice: SharedVoice,
    voices: Arc<Mutex<Vec<SharedVoice>>>,
}

impl PlaybackSink for MixerSink {
    fn set_source(&mut self, source: Option<Box<dyn SampleSource>>) {
        self.voice.lock().set_source(source);
    }

    fn set_volume(&mut self, volume: f32) {
        self.voice.lock().volume = volume.max(0.0);
    }

    fn volume(&self) -> f32 {
        self.voice.lock().volume
    }

    fn set_pan(&mut self, pan: f32) {
        self.voice.lock().pan = pan.clamp(-1.0, 1.0);
    }

    fn set_pitch(&mut self, pitch: f32) {
        self.voice.lock().set_pitch(pitch);
    }

    fn set_looping(&mut self, looping: bool) {
        self.voice.lock().looping = looping;
    }

    fn play(&mut self) {
        let mut voice = self.voice.lock();
        voice.state = if voice.source.is_some() {
            SinkState::Playing
        } else {
            SinkState::Opening
        };
    }

    fn pause(&mut self) {
        let mut voice = self.voice.lock();
        if voice.state == SinkState::Playing {
            voice.state = SinkState::Paused;
        }
    }

    fn stop(&mut self) {
        let mut voice = self.voice.lock();
        voice.set_source(None);
        voice.state = SinkState::Stopped;
    }

    fn state(&self) -> SinkState {
        self.voice.lock().state
    }
}

impl Drop for MixerSink {
    fn drop(&mut self) {
        self.voices
            .lock()
            .retain(|voice| !Arc::ptr_eq(voice, &self.voice));
    }
}
