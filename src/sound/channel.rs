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

use super::emitter::{EmitterId, Position};
use super::library::SoundId;

/// Priority multiplier per maintenance pass for positional sounds. Halves in
/// seven passes.
pub const FAST_DECAY: f32 = 0.905_723_7;

/// Priority multiplier per maintenance pass for diffuse sounds. Halves in
/// thirty-five passes.
pub const SLOW_DECAY: f32 = 0.980_390_6;

/// How a sound relates to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SoundKind {
    /// Heard everywhere at the same level.
    #[default]
    Diffuse,
    /// Attenuated and panned by distance from the listener.
    Positional,
    /// Positional, with wider pitch variation.
    Voice,
}

impl SoundKind {
    pub fn is_diffuse(&self) -> bool {
        matches!(self, SoundKind::Diffuse)
    }

    /// Priority multiplier applied on each maintenance pass.
    pub fn decay(&self) -> f32 {
        match self {
            SoundKind::Diffuse => SLOW_DECAY,
            SoundKind::Positional | SoundKind::Voice => FAST_DECAY,
        }
    }
}

impl fmt::Display for SoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SoundKind::Diffuse => "diffuse",
            SoundKind::Positional => "positional",
            SoundKind::Voice => "voice",
        };
        write!(f, "{}", name)
    }
}

/// A request to play a sound effect from an emitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundRequest {
    pub emitter: EmitterId,
    pub sound: SoundId,
    pub kind: SoundKind,
    /// Request gain, 0 to 100.
    pub volume: u32,
    /// Where the emitter was when the request was made.
    pub position: Position,
}

/// Bookkeeping for one effect channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelState {
    /// Sound waiting to be started on the next maintenance pass.
    pub reserved: Option<SoundId>,
    /// Sound currently handed to the sink.
    pub playing: Option<SoundId>,
    /// Eviction resistance. Lower priorities are evicted first.
    pub priority: f32,
    /// The emitter the channel is tied to. Cleared once the tie is broken.
    pub emitter: Option<EmitterId>,
    pub kind: SoundKind,
    /// Gain, 0 to 100.
    pub volume: u32,
    /// Last known emitter position, used after the emitter goes away.
    pub last_position: Position,
}

impl ChannelState {
    /// True when nothing is reserved or playing.
    pub fn is_idle(&self) -> bool {
        self.reserved.is_none() && self.playing.is_none()
    }

    /// True if the channel is tied to the given emitter and kind.
    pub fn matches(&self, emitter: EmitterId, kind: SoundKind) -> bool {
        self.emitter == Some(emitter) && self.kind == kind
    }

    /// Reserves the channel for a request.
    pub(crate) fn claim(&mut self, request: &SoundRequest, priority: f32) {
        self.reserved = Some(request.sound);
        self.priority = priority;
        self.emitter = Some(request.emitter);
        self.kind = request.kind;
        self.volume = request.volume;
        self.last_position = request.position;
    }

    /// Multiplies the priority by the decay for this channel's kind.
    pub(crate) fn decay(&mut self) {
        self.priority *= self.kind.decay();
    }

    pub(crate) fn clear(&mut self) {
        *self = ChannelState::default();
    }
}
