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

//! Fixed set of effect channels and the rules deciding which request gets one.

use tracing::debug;

use super::channel::{ChannelState, SoundKind, SoundRequest};
use super::distance::distance_decay;
use super::emitter::EmitterId;
use super::library::SoundId;

/// Eviction resistance of a request. Diffuse sounds are weighted by volume
/// alone, everything else also by how loud the asset reads and how far away
/// the emitter is.
pub fn priority_weight(kind: SoundKind, amplitude: f32, distance: f32, volume: u32) -> f32 {
    let volume = volume as f32;
    if kind.is_diffuse() {
        volume
    } else {
        amplitude * distance_decay(distance) * volume
    }
}

/// The outcome of an admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A channel tied to the same emitter and kind was overwritten.
    Replaced(usize),
    /// An idle channel was claimed.
    Claimed(usize),
    /// The lowest priority channel was taken over.
    Evicted(usize),
    /// Every channel outranks the request.
    Dropped,
}

impl Admission {
    /// The channel that received the request, if any.
    pub fn channel(&self) -> Option<usize> {
        match self {
            Admission::Replaced(index) | Admission::Claimed(index) | Admission::Evicted(index) => {
                Some(*index)
            }
            Admission::Dropped => None,
        }
    }
}

/// The effect channels.
pub struct ChannelPool {
    channels: Vec<ChannelState>,
}

impl ChannelPool {
    pub fn new(capacity: usize) -> ChannelPool {
        ChannelPool {
            channels: vec![ChannelState::default(); capacity],
        }
    }

    /// Finds a channel for the request and reserves it.
    pub fn admit(&mut self, request: &SoundRequest, priority: f32) -> Admission {
        let admission = self.select(request, priority);
        match admission.channel() {
            Some(index) => self.channels[index].claim(request, priority),
            None => debug!(
                sound = %request.sound,
                kind = %request.kind,
                priority,
                "All channels busy, dropping sound"
            ),
        }
        admission
    }

    fn select(&self, request: &SoundRequest, priority: f32) -> Admission {
        if let Some(index) = self
            .channels
            .iter()
            .position(|c| c.matches(request.emitter, request.kind))
        {
            return Admission::Replaced(index);
        }

        if let Some(index) = self.channels.iter().position(ChannelState::is_idle) {
            return Admission::Claimed(index);
        }

        let mut weakest = None;
        let mut min_priority = f32::MAX;
        for (index, channel) in self.channels.iter().enumerate() {
            if channel.priority < min_priority {
                weakest = Some(index);
                min_priority = channel.priority;
            }
        }

        match weakest {
            Some(index) if priority >= min_priority => Admission::Evicted(index),
            _ => Admission::Dropped,
        }
    }

    /// Channels tied to the emitter.
    pub fn channels_of(&self, emitter: EmitterId) -> impl Iterator<Item = usize> + '_ {
        self.channels
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.emitter == Some(emitter))
            .map(|(index, _)| index)
    }

    /// True if the sound is reserved or playing on any channel.
    pub fn is_playing(&self, sound: SoundId) -> bool {
        self.channels
            .iter()
            .any(|c| c.playing == Some(sound) || c.reserved == Some(sound))
    }

    /// Returns every channel to idle.
    pub fn clear(&mut self) {
        self.channels.iter_mut().for_each(ChannelState::clear);
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelState> {
        self.channels.get(index)
    }

    pub(crate) fn channel_mut(&mut self, index: usize) -> Option<&mut ChannelState> {
        self.channels.get_mut(index)
    }

    pub fn channels(&self) -> &[ChannelState] {
        &self.channels
    }

    /// Number of channels that are reserved or playing.
    pub fn occupied(&self) -> usize {
        self.channels.iter().filter(|c| !c.is_idle()).count()
    }

    pub fn capacity(&self) -> usize {
        self.channels.len()
    }
}
