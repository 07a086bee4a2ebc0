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

use parking_lot::Mutex;

use super::sample_source::SampleSource;
use super::{PlaybackSink, SinkState};

/// What a mock sink has been told to do.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkSnapshot {
    pub state: SinkState,
    pub volume: f32,
    pub pan: f32,
    pub pitch: f32,
    pub looping: bool,
    pub has_source: bool,
    /// Sample rate of the current source, if any.
    pub source_rate: Option<u32>,
    pub plays: usize,
    pub stops: usize,
}

impl Default for SinkSnapshot {
    fn default() -> Self {
        SinkSnapshot {
            state: SinkState::Idle,
            volume: 1.0,
            pan: 0.0,
            pitch: 1.0,
            looping: false,
            has_source: false,
            source_rate: None,
            plays: 0,
            stops: 0,
        }
    }
}

/// A mock sink. Doesn't actually play anything. Clones share state, so a test
/// can keep one clone to inspect what the engine did with the other.
#[derive(Clone, Default)]
pub struct Sink {
    shared: Arc<Mutex<SinkSnapshot>>,
}

impl Sink {
    pub fn new() -> Sink {
        Sink::default()
    }

    pub fn snapshot(&self) -> SinkSnapshot {
        self.shared.lock().clone()
    }

    /// Simulates the source running out.
    pub fn finish(&self) {
        self.shared.lock().state = SinkState::Stopped;
    }

    /// Simulates a playback failure.
    pub fn fail(&self) {
        self.shared.lock().state = SinkState::Failed;
    }
}

impl PlaybackSink for Sink {
    fn set_source(&mut self, source: Option<Box<dyn SampleSource>>) {
        let mut shared = self.shared.lock();
        shared.source_rate = source.as_ref().map(|s| s.sample_rate());
        shared.has_source = source.is_some();
        if shared.has_source && shared.state == SinkState::Opening {
            shared.state = SinkState::Playing;
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.shared.lock().volume = volume;
    }

    fn volume(&self) -> f32 {
        self.shared.lock().volume
    }

    fn set_pan(&mut self, pan: f32) {
        self.shared.lock().pan = pan;
    }

    fn set_pitch(&mut self, pitch: f32) {
        self.shared.lock().pitch = pitch;
    }

    fn set_looping(&mut self, looping: bool) {
        self.shared.lock().looping = looping;
    }

    fn play(&mut self) {
        let mut shared = self.shared.lock();
        shared.plays += 1;
        shared.state = if shared.has_source {
            SinkState::Playing
        } else {
            SinkState::Opening
        };
    }

    fn pause(&mut self) {
        let mut shared = self.shared.lock();
        if shared.state == SinkState::Playing {
            shared.state = SinkState::Paused;
        }
    }

    fn stop(&mut self) {
        let mut shared = self.shared.lock();
        shared.stops += 1;
        shared.has_source = false;
        shared.source_rate = None;
        shared.state = SinkState::Stopped;
    }

    fn state(&self) -> SinkState {
        self.shared.lock().state
    }
}
