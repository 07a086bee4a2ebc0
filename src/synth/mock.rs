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
use midly::num::u4;
use midly::MidiMessage;

use super::{Synthesizer, BLOCK_LENGTH};

/// A command received by the [`RecordingSynthesizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthCommand {
    Message(u4, MidiMessage),
    NoteOffAll,
    NoteOffChannel(u4),
    ResetAllControllers(u4),
    /// A render call of the given frame count.
    Render(usize),
    Reset,
}

/// A synthesizer that doesn't make a sound. It records every command it
/// receives and renders a constant level into both planes.
#[derive(Debug, Clone)]
pub struct RecordingSynthesizer {
    block_size: usize,
    left_level: f32,
    right_level: f32,
    commands: Vec<SynthCommand>,
}

impl RecordingSynthesizer {
    /// Creates a silent recording synthesizer with the standard block length.
    pub fn new() -> RecordingSynthesizer {
        RecordingSynthesizer {
            block_size: BLOCK_LENGTH,
            left_level: 0.0,
            right_level: 0.0,
            commands: Vec::new(),
        }
    }

    /// Renders the given constant levels instead of silence.
    pub fn with_levels(mut self, left: f32, right: f32) -> RecordingSynthesizer {
        self.left_level = left;
        self.right_level = right;
        self
    }

    /// Uses a different block size.
    pub fn with_block_size(mut self, block_size: usize) -> RecordingSynthesizer {
        self.block_size = block_size;
        self
    }

    /// All recorded commands, in order.
    pub fn commands(&self) -> &[SynthCommand] {
        &self.commands
    }

    /// Recorded commands without the render calls.
    pub fn events(&self) -> Vec<SynthCommand> {
        self.commands
            .iter()
            .filter(|c| !matches!(c, SynthCommand::Render(_)))
            .copied()
            .collect()
    }

    /// Total frames rendered so far.
    pub fn frames_rendered(&self) -> usize {
        self.commands
            .iter()
            .map(|c| match c {
                SynthCommand::Render(frames) => *frames,
                _ => 0,
            })
            .sum()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl Default for RecordingSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synthesizer for RecordingSynthesizer {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn process(&mut self, channel: u4, message: MidiMessage) {
        self.commands.push(SynthCommand::Message(channel, message));
    }

    fn note_off_all(&mut self) {
        self.commands.push(SynthCommand::NoteOffAll);
    }

    fn note_off_channel(&mut self, channel: u4) {
        self.commands.push(SynthCommand::NoteOffChannel(channel));
    }

    fn reset_all_controllers(&mut self, channel: u4) {
        self.commands.push(SynthCommand::ResetAllControllers(channel));
    }

    fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        left.fill(self.left_level);
        right.fill(self.right_level);
        self.commands.push(SynthCommand::Render(left.len()));
    }

    fn reset(&mut self) {
        self.commands.push(SynthCommand::Reset);
    }
}
