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
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, span, Level};

use super::channel::{SoundKind, SoundRequest};
use super::distance::{distance, spatialize, Spatial};
use super::emitter::{EmitterId, EmitterSource, Listener};
use super::library::{SoundId, SoundLibrary};
use super::pool::{priority_weight, Admission, ChannelPool};
use crate::audio::sample_source::ClipSampleSource;
use crate::audio::{PlaybackSink, SinkState};
use crate::config::{self, MAX_VOLUME};

/// Seed of the pitch variation sequence. Every reset restarts the sequence.
const PITCH_SEED: u64 = 0;

/// Pitch spread of voice sounds, as a fraction of the base pitch.
const VOICE_PITCH_SPREAD: f32 = 0.075;

/// Pitch spread of every other sound.
const PITCH_SPREAD: f32 = 0.025;

/// Plays sound effects for a game: a fixed set of prioritized effect channels
/// plus one channel for interface sounds.
pub struct SoundEngine {
    library: Arc<SoundLibrary>,
    pool: ChannelPool,
    sinks: Vec<Box<dyn PlaybackSink>>,
    ui_sink: Box<dyn PlaybackSink>,
    ui_reserved: Option<SoundId>,
    ui_playing: Option<SoundId>,
    listener: Option<Listener>,
    volume: u8,
    update_interval: Duration,
    last_update: Option<Instant>,
    random_pitch: bool,
    rng: StdRng,
}

impl SoundEngine {
    /// Creates an engine with one effect channel per sink.
    pub fn new(
        library: Arc<SoundLibrary>,
        sinks: Vec<Box<dyn PlaybackSink>>,
        ui_sink: Box<dyn PlaybackSink>,
        config: &config::Audio,
    ) -> Result<SoundEngine, config::ConfigError> {
        let engine = SoundEngine {
            library,
            pool: ChannelPool::new(sinks.len()),
            sinks,
            ui_sink,
            ui_reserved: None,
            ui_playing: None,
            listener: None,
            volume: config.sound_volume(),
            update_interval: config.update_interval()?,
            last_update: None,
            random_pitch: config.random_pitch(),
            rng: StdRng::seed_from_u64(PITCH_SEED),
        };
        info!(
            channels = engine.sinks.len(),
            sounds = engine.library.len(),
            volume = engine.volume,
            "Sound engine ready"
        );
        Ok(engine)
    }

    /// Sets or clears the listener. Without a listener every sound is heard
    /// as if it were at the listener's position.
    pub fn set_listener(&mut self, listener: Option<Listener>) {
        self.listener = listener;
    }

    pub fn listener(&self) -> Option<&Listener> {
        self.listener.as_ref()
    }

    /// Requests a sound from an emitter. The sound starts on the next update
    /// if it gets a channel. Requests from emitters that no longer exist are
    /// ignored.
    pub fn start_sound(
        &mut self,
        emitters: &dyn EmitterSource,
        emitter: EmitterId,
        sound: SoundId,
        kind: SoundKind,
        volume: u32,
    ) -> Admission {
        let Some(position) = emitters.position(emitter) else {
            debug!(sound = %sound, "Emitter is gone, ignoring sound");
            return Admission::Dropped;
        };
        if self.library.get(sound).is_none() {
            debug!(sound = %sound, "Unknown sound, ignoring");
            return Admission::Dropped;
        }

        let volume = volume.min(100);
        let distance = self
            .listener
            .as_ref()
            .map(|listener| distance(listener, position))
            .unwrap_or(0.0);
        let priority = priority_weight(kind, self.library.amplitude(sound), distance, volume);

        let request = SoundRequest {
            emitter,
            sound,
            kind,
            volume,
            position,
        };
        self.pool.admit(&request, priority)
    }

    /// Requests an interface sound. The latest request wins.
    pub fn start_ui_sound(&mut self, sound: SoundId) {
        if self.library.get(sound).is_some() {
            self.ui_reserved = Some(sound);
        }
    }

    /// Stops every sound tied to an emitter.
    pub fn stop_sound(&mut self, emitter: EmitterId) {
        let channels: Vec<usize> = self.pool.channels_of(emitter).collect();
        for index in channels {
            if let Some(channel) = self.pool.channel_mut(index) {
                channel.emitter = None;
                channel.volume /= 5;
            }
            let sink = &mut self.sinks[index];
            let volume = sink.volume();
            sink.set_volume(volume / 5.0);
            sink.stop();
        }
    }

    /// Runs channel maintenance unless the last pass was too recent.
    pub fn update(&mut self, emitters: &dyn EmitterSource) {
        self.update_at(emitters, Instant::now());
    }

    /// Runs channel maintenance as of `now`.
    pub fn update_at(&mut self, emitters: &dyn EmitterSource, now: Instant) {
        if let Some(last) = self.last_update {
            if now.saturating_duration_since(last) < self.update_interval {
                return;
            }
        }
        self.last_update = Some(now);

        for index in 0..self.sinks.len() {
            self.maintain_channel(emitters, index);
        }

        if let Some(sound) = self.ui_reserved.take() {
            let master = self.master_volume();
            if let Some(asset) = self.library.get(sound) {
                if self.ui_sink.state().is_active() {
                    self.ui_sink.stop();
                }
                self.ui_sink
                    .set_source(Some(Box::new(ClipSampleSource::new(asset.clone()))));
                self.ui_sink.set_volume(master);
                self.ui_sink.set_pan(0.0);
                self.ui_sink.play();
                self.ui_playing = Some(sound);
            }
        }
        if self.ui_sink.state().is_finished() {
            self.ui_playing = None;
        }
    }

    fn maintain_channel(&mut self, emitters: &dyn EmitterSource, index: usize) {
        let Some(channel) = self.pool.channel_mut(index) else {
            return;
        };

        if channel.playing.is_some() {
            if self.sinks[index].state().is_finished() {
                channel.playing = None;
                if channel.reserved.is_none() {
                    channel.emitter = None;
                    self.sinks[index].set_volume(0.0);
                }
            } else {
                channel.decay();
                self.apply_params(emitters, index);
            }
        }

        let Some(channel) = self.pool.channel_mut(index) else {
            return;
        };
        let Some(sound) = channel.reserved else {
            return;
        };
        let kind = channel.kind;
        let was_playing = channel.playing.is_some();

        let Some(asset) = self.library.get(sound).cloned() else {
            channel.reserved = None;
            return;
        };

        let span = span!(Level::DEBUG, "start sound");
        let _enter = span.enter();

        let sink = &mut self.sinks[index];
        if was_playing {
            sink.stop();
        }
        sink.set_source(Some(Box::new(ClipSampleSource::new(asset))));
        self.apply_params(emitters, index);
        let pitch = self.next_pitch(sound, kind);
        let sink = &mut self.sinks[index];
        sink.set_pitch(pitch);
        sink.play();

        if let Some(channel) = self.pool.channel_mut(index) {
            channel.playing = channel.reserved.take();
        }
        debug!(channel = index, sound = %sound, kind = %kind, pitch, "Sound started");
    }

    /// Recomputes gain and pan of a channel from the current geometry.
    fn apply_params(&mut self, emitters: &dyn EmitterSource, index: usize) {
        let master = self.master_volume();
        let listener = self.listener;
        let Some(channel) = self.pool.channel_mut(index) else {
            return;
        };

        let spatial = if channel.kind.is_diffuse() {
            Spatial::CENTERED
        } else {
            if let Some(emitter) = channel.emitter {
                match emitters.position(emitter) {
                    Some(position) => channel.last_position = position,
                    // The emitter is gone; keep playing from where it was.
                    None => channel.emitter = None,
                }
            }
            listener
                .map(|listener| spatialize(&listener, channel.last_position))
                .unwrap_or(Spatial::CENTERED)
        };

        let gain = 0.01 * master * channel.volume as f32 * spatial.decay;
        let sink = &mut self.sinks[index];
        sink.set_volume(gain);
        sink.set_pan(spatial.pan);
    }

    fn next_pitch(&mut self, sound: SoundId, kind: SoundKind) -> f32 {
        if !self.random_pitch || self.library.is_fixed_pitch(sound) {
            return 1.0;
        }
        let spread = match kind {
            SoundKind::Voice => VOICE_PITCH_SPREAD,
            SoundKind::Diffuse | SoundKind::Positional => PITCH_SPREAD,
        };
        let roll = (f32::from(self.rng.gen::<u8>()) - 128.0) / 128.0;
        1.0 + spread * roll
    }

    /// Stops everything, clears every channel and drops the listener.
    pub fn reset(&mut self) {
        for sink in self.sinks.iter_mut() {
            sink.stop();
        }
        self.ui_sink.stop();
        self.pool.clear();
        self.ui_reserved = None;
        self.ui_playing = None;
        self.listener = None;
        self.rng = StdRng::seed_from_u64(PITCH_SEED);
        debug!("Sound engine reset");
    }

    /// Pauses every playing channel.
    pub fn pause(&mut self) {
        for (channel, sink) in self.pool.channels().iter().zip(self.sinks.iter_mut()) {
            if channel.playing.is_some() && sink.state().is_active() {
                sink.pause();
            }
        }
        if self.ui_sink.state().is_active() {
            self.ui_sink.pause();
        }
    }

    /// Resumes every paused channel.
    pub fn resume(&mut self) {
        for (channel, sink) in self.pool.channels().iter().zip(self.sinks.iter_mut()) {
            if channel.playing.is_some() && sink.state() == SinkState::Paused {
                sink.play();
            }
        }
        if self.ui_sink.state() == SinkState::Paused {
            self.ui_sink.play();
        }
    }

    /// True if the sound is waiting to start or playing on any channel.
    pub fn is_playing(&self, sound: SoundId) -> bool {
        self.pool.is_playing(sound)
            || self.ui_reserved == Some(sound)
            || self.ui_playing == Some(sound)
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Sets the sound volume on the 0-15 scale and re-applies it to
    /// everything that's playing.
    pub fn set_volume(&mut self, emitters: &dyn EmitterSource, volume: u8) {
        self.volume = volume.min(MAX_VOLUME);
        for index in 0..self.sinks.len() {
            let playing = self
                .pool
                .channel(index)
                .is_some_and(|channel| channel.playing.is_some());
            if playing {
                self.apply_params(emitters, index);
            }
        }
        if self.ui_playing.is_some() {
            let master = self.master_volume();
            self.ui_sink.set_volume(master);
        }
    }

    pub fn max_volume(&self) -> u8 {
        MAX_VOLUME
    }

    pub fn library(&self) -> &Arc<SoundLibrary> {
        &self.library
    }

    pub fn pool(&self) -> &ChannelPool {
        &self.pool
    }

    fn master_volume(&self) -> f32 {
        f32::from(self.volume) / f32::from(MAX_VOLUME)
    }
}
