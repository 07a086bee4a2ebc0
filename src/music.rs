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
use std::sync::Arc;

use crate::synth::Synthesizer;

pub mod error;
pub mod midi;
pub mod mus;
pub mod player;
pub mod vlq;

pub use error::FormatError;
pub use midi::MidiDecoder;
pub use mus::MusDecoder;

const MIDI_MAGIC: [u8; 4] = *b"MThd";

/// The music encodings that can be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicFormat {
    Mus,
    Midi,
}

impl MusicFormat {
    /// Detects the format from the leading magic bytes.
    pub fn detect(data: &[u8]) -> Option<MusicFormat> {
        if data.starts_with(&mus::MAGIC) {
            Some(MusicFormat::Mus)
        } else if data.starts_with(&MIDI_MAGIC) {
            Some(MusicFormat::Midi)
        } else {
            None
        }
    }
}

impl fmt::Display for MusicFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MusicFormat::Mus => write!(f, "mus"),
            MusicFormat::Midi => write!(f, "midi"),
        }
    }
}

/// A music decoder. Drives a synthesizer block by block until the end of the
/// sequence.
pub enum Decoder {
    Mus(MusDecoder),
    Midi(MidiDecoder),
}

impl Decoder {
    /// Creates the decoder matching the data's format.
    pub fn new(data: Arc<[u8]>, looping: bool) -> Result<Decoder, FormatError> {
        match MusicFormat::detect(&data) {
            Some(MusicFormat::Mus) => Ok(Decoder::Mus(MusDecoder::new(data, looping)?)),
            Some(MusicFormat::Midi) => Ok(Decoder::Midi(MidiDecoder::new(&data, looping)?)),
            None => Err(FormatError::UnknownFormat),
        }
    }

    pub fn format(&self) -> MusicFormat {
        match self {
            Decoder::Mus(_) => MusicFormat::Mus,
            Decoder::Midi(_) => MusicFormat::Midi,
        }
    }

    pub fn is_end_of_sequence(&self) -> bool {
        match self {
            Decoder::Mus(decoder) => decoder.is_end_of_sequence(),
            Decoder::Midi(decoder) => decoder.is_end_of_sequence(),
        }
    }

    /// Renders `left.len()` frames of both planes.
    pub fn render_block<S: Synthesizer + ?Sized>(
        &mut self,
        synth: &mut S,
        left: &mut [f32],
        right: &mut [f32],
    ) -> Result<(), FormatError> {
        match self {
            Decoder::Mus(decoder) => decoder.render_block(synth, left, right),
            Decoder::Midi(decoder) => decoder.render_block(synth, left, right),
        }
    }
}
