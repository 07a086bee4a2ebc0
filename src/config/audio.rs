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
use std::path::{Path, PathBuf};
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;

/// Highest volume on the 0-15 scale used for both sound and music.
pub const MAX_VOLUME: u8 = 15;

const DEFAULT_VOLUME: u8 = 8;
const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNELS: usize = 8;
const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(10);
const DEFAULT_BUFFER_THREADS: usize = 1;

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// Sound effect volume, 0 to 15 (default: 8).
    sound_volume: Option<u8>,

    /// Music volume, 0 to 15 (default: 8).
    music_volume: Option<u8>,

    /// Whether sound effects get a small random pitch variation (default: true).
    random_pitch: Option<bool>,

    /// Whether the music synthesizer applies reverb and chorus (default: true).
    music_effects: Option<bool>,

    /// Path to the SoundFont used for music.
    soundfont: Option<String>,

    /// Output sample rate in Hz (default: 44100).
    sample_rate: Option<u32>,

    /// Number of sound effect channels (default: 8).
    channels: Option<usize>,

    /// Minimum time between channel maintenance passes (default: 10ms).
    update_interval: Option<String>,

    /// Directory of pre-rendered music. When set, music is rendered to WAV
    /// files in the background instead of being synthesized while it plays.
    music_cache: Option<String>,

    /// Number of worker threads rendering music ahead of playback.
    /// Must be >= 1.
    buffer_threads: Option<usize>,

    /// Directory holding the game's lumps.
    assets: Option<String>,
}

impl Audio {
    /// Returns the sound effect volume, clamped to the 0-15 scale.
    pub fn sound_volume(&self) -> u8 {
        self.sound_volume.unwrap_or(DEFAULT_VOLUME).min(MAX_VOLUME)
    }

    /// Returns the music volume, clamped to the 0-15 scale.
    pub fn music_volume(&self) -> u8 {
        self.music_volume.unwrap_or(DEFAULT_VOLUME).min(MAX_VOLUME)
    }

    pub fn random_pitch(&self) -> bool {
        self.random_pitch.unwrap_or(true)
    }

    pub fn music_effects(&self) -> bool {
        self.music_effects.unwrap_or(true)
    }

    /// Returns the SoundFont path, which music playback requires.
    pub fn soundfont(&self) -> Result<PathBuf, ConfigError> {
        self.soundfont
            .as_ref()
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingSoundFont)
    }

    /// Returns the output sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the number of sound effect channels, at least one.
    pub fn channels(&self) -> usize {
        self.channels.unwrap_or(DEFAULT_CHANNELS).max(1)
    }

    /// Returns the maintenance throttle interval.
    pub fn update_interval(&self) -> Result<Duration, ConfigError> {
        match &self.update_interval {
            Some(interval) => Ok(DurationString::from_string(interval.clone())
                .map_err(|e| ConfigError::InvalidDuration {
                    value: interval.clone(),
                    reason: e.to_string(),
                })?
                .into()),
            None => Ok(DEFAULT_UPDATE_INTERVAL),
        }
    }

    pub fn music_cache(&self) -> Option<&Path> {
        self.music_cache.as_deref().map(Path::new)
    }

    /// Returns the number of worker threads used for buffered music sources.
    pub fn buffer_threads(&self) -> usize {
        self.buffer_threads.unwrap_or(DEFAULT_BUFFER_THREADS).max(1)
    }

    pub fn assets(&self) -> Option<&Path> {
        self.assets.as_deref().map(Path::new)
    }

    pub fn with_soundfont(mut self, soundfont: &Path) -> Audio {
        self.soundfont = Some(soundfont.display().to_string());
        self
    }

    pub fn with_music_cache(mut self, music_cache: &Path) -> Audio {
        self.music_cache = Some(music_cache.display().to_string());
        self
    }

    pub fn with_random_pitch(mut self, random_pitch: bool) -> Audio {
        self.random_pitch = Some(random_pitch);
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Audio {
        self.channels = Some(channels);
        self
    }
}
