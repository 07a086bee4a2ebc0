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

//! The synthesizer seam. Music decoders only ever talk to a [`Synthesizer`];
//! the SoundFont engine behind it is an external collaborator.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use midly::num::u4;
use midly::MidiMessage;
use rustysynth::{SoundFont, SynthesizerSettings};
use tracing::info;

pub mod mock;

/// Output sample rate used for all synthesized music.
pub const SAMPLE_RATE: u32 = 44100;

/// Frames rendered per synthesizer block. Score ticks run at 140Hz, so one
/// block is exactly one tick.
pub const BLOCK_LENGTH: usize = SAMPLE_RATE as usize / 140;

/// Error raised while loading a SoundFont or building a synthesizer.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("unable to open SoundFont {0}: {1}")]
    Open(String, std::io::Error),

    #[error("invalid SoundFont: {0}")]
    SoundFont(#[from] rustysynth::SoundFontError),

    #[error("unable to create synthesizer: {0}")]
    Synthesizer(#[from] rustysynth::SynthesizerError),
}

/// Channel voice commands and block rendering. Channel numbers are already
/// remapped to the General MIDI layout (percussion on 9).
pub trait Synthesizer {
    /// Number of frames in one synthesizer block.
    fn block_size(&self) -> usize;

    /// Applies a channel voice message.
    fn process(&mut self, channel: u4, message: MidiMessage);

    /// Releases every note on every channel.
    fn note_off_all(&mut self);

    /// Releases every note on one channel.
    fn note_off_channel(&mut self, channel: u4);

    /// Resets all controllers on one channel.
    fn reset_all_controllers(&mut self, channel: u4);

    /// Renders `left.len()` frames into the two planes.
    fn render(&mut self, left: &mut [f32], right: &mut [f32]);

    /// Silences everything and restores the power-on state.
    fn reset(&mut self);
}

impl<S: Synthesizer + ?Sized> Synthesizer for Box<S> {
    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn process(&mut self, channel: u4, message: MidiMessage) {
        (**self).process(channel, message)
    }

    fn note_off_all(&mut self) {
        (**self).note_off_all()
    }

    fn note_off_channel(&mut self, channel: u4) {
        (**self).note_off_channel(channel)
    }

    fn reset_all_controllers(&mut self, channel: u4) {
        (**self).reset_all_controllers(channel)
    }

    fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        (**self).render(left, right)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

impl Synthesizer for rustysynth::Synthesizer {
    fn block_size(&self) -> usize {
        self.get_block_size()
    }

    fn process(&mut self, channel: u4, message: MidiMessage) {
        let channel = i32::from(channel.as_int());
        match message {
            MidiMessage::NoteOn { key, vel } => {
                self.note_on(channel, i32::from(key.as_int()), i32::from(vel.as_int()))
            }
            MidiMessage::NoteOff { key, .. } => self.note_off(channel, i32::from(key.as_int())),
            MidiMessage::Aftertouch { key, vel } => self.process_midi_message(
                channel,
                0xA0,
                i32::from(key.as_int()),
                i32::from(vel.as_int()),
            ),
            MidiMessage::Controller { controller, value } => self.process_midi_message(
                channel,
                0xB0,
                i32::from(controller.as_int()),
                i32::from(value.as_int()),
            ),
            MidiMessage::ProgramChange { program } => {
                self.process_midi_message(channel, 0xC0, i32::from(program.as_int()), 0)
            }
            MidiMessage::ChannelAftertouch { vel } => {
                self.process_midi_message(channel, 0xD0, i32::from(vel.as_int()), 0)
            }
            MidiMessage::PitchBend { bend } => {
                let raw = i32::from(bend.0.as_int());
                self.process_midi_message(channel, 0xE0, raw & 0x7F, raw >> 7)
            }
        }
    }

    fn note_off_all(&mut self) {
        rustysynth::Synthesizer::note_off_all(self, false);
    }

    fn note_off_channel(&mut self, channel: u4) {
        self.note_off_all_channel(i32::from(channel.as_int()), false);
    }

    fn reset_all_controllers(&mut self, channel: u4) {
        self.reset_all_controllers_channel(i32::from(channel.as_int()));
    }

    fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        rustysynth::Synthesizer::render(self, left, right);
    }

    fn reset(&mut self) {
        rustysynth::Synthesizer::reset(self);
    }
}

/// Loads a SoundFont from disk. The result is shared by every synthesizer
/// created for music playback.
pub fn load_soundfont(path: &Path) -> Result<Arc<SoundFont>, SynthError> {
    let file = File::open(path).map_err(|e| SynthError::Open(path.display().to_string(), e))?;
    let mut reader = BufReader::new(file);
    let soundfont = SoundFont::new(&mut reader)?;
    info!(path = ?path, "SoundFont loaded");
    Ok(Arc::new(soundfont))
}

/// Creates a SoundFont synthesizer rendering blocks of [`BLOCK_LENGTH`] frames.
pub fn create(
    soundfont: &Arc<SoundFont>,
    enable_effects: bool,
) -> Result<rustysynth::Synthesizer, SynthError> {
    let mut settings = SynthesizerSettings::new(SAMPLE_RATE as i32);
    settings.block_size = BLOCK_LENGTH;
    settings.enable_reverb_and_chorus = enable_effects;
    Ok(rustysynth::Synthesizer::new(soundfont, &settings)?)
}
