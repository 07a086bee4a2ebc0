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
use std::fmt;

pub mod cpal;
pub mod mixer;
pub mod mock;
pub mod sample_source;

use sample_source::SampleSource;

/// Errors raised while opening or running the output device.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no output device available")]
    NoDevice,

    #[error("unsupported output sample format {0}")]
    UnsupportedFormat(String),

    #[error("output device error: {0}")]
    Device(String),
}

/// Playback state reported by a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkState {
    /// Nothing has been played yet.
    #[default]
    Idle,
    /// Playback was requested but the source hasn't arrived yet.
    Opening,
    Playing,
    Paused,
    /// Playback was stopped or the source ran out.
    Stopped,
    /// The source failed while playing.
    Failed,
}

impl SinkState {
    /// True when the sink has nothing left to play.
    pub fn is_finished(&self) -> bool {
        matches!(self, SinkState::Idle | SinkState::Stopped | SinkState::Failed)
    }

    /// True while the sink is producing, or about to produce, sound.
    pub fn is_active(&self) -> bool {
        matches!(self, SinkState::Playing | SinkState::Opening)
    }
}

impl fmt::Display for SinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SinkState::Idle => "idle",
            SinkState::Opening => "opening",
            SinkState::Playing => "playing",
            SinkState::Paused => "paused",
            SinkState::Stopped => "stopped",
            SinkState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// A single playback slot that accepts a PCM source and plays it.
pub trait PlaybackSink: Send {
    /// Replaces the source. A sink that is waiting in [`SinkState::Opening`]
    /// starts playing as soon as a source arrives.
    fn set_source(&mut self, source: Option<Box<dyn SampleSource>>);

    /// Output gain, where 1.0 is unity.
    fn set_volume(&mut self, volume: f32);

    fn volume(&self) -> f32;

    /// Stereo balance in [-1, 1]. Positive values lean toward the left speaker.
    fn set_pan(&mut self, pan: f32);

    /// Playback rate multiplier.
    fn set_pitch(&mut self, pitch: f32);

    /// Restarts the source from the beginning when it runs out.
    fn set_looping(&mut self, looping: bool);

    /// Starts or resumes playback.
    fn play(&mut self);

    fn pause(&mut self);

    /// Stops playback and drops the source.
    fn stop(&mut self);

    fn state(&self) -> SinkState;
}

impl PlaybackSink for Box<dyn PlaybackSink> {
    fn set_source(&mut self, source: Option<Box<dyn SampleSource>>) {
        (**self).set_source(source)
    }

    fn set_volume(&mut self, volume: f32) {
        (**self).set_volume(volume)
    }

    fn volume(&self) -> f32 {
        (**self).volume()
    }

    fn set_pan(&mut self, pan: f32) {
        (**self).set_pan(pan)
    }

    fn set_pitch(&mut self, pitch: f32) {
        (**self).set_pitch(pitch)
    }

    fn set_looping(&mut self, looping: bool) {
        (**self).set_looping(looping)
    }

    fn play(&mut self) {
        (**self).play()
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn state(&self) -> SinkState {
        (**self).state()
    }
}
