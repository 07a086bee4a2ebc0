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

//! Decoder for the legacy event-encoded score format.
//!
//! A score is a header followed by time groups. Each group is a run of events
//! terminated by one with the "last" bit set, followed by a variable length
//! delay in ticks. One tick is one synthesizer block.

use std::cmp::min;
use std::sync::Arc;

use midly::num::{u14, u4, u7};
use midly::{MidiMessage, PitchBend};
use tracing::debug;

use super::error::FormatError;
use super::vlq;
use crate::synth::Synthesizer;

/// Magic bytes at the start of every score.
pub const MAGIC: [u8; 4] = *b"MUS\x1A";

/// Size of the fixed part of the header.
const HEADER_LENGTH: usize = 16;

/// Logical channel used for percussion.
pub const PERCUSSION_CHANNEL: u8 = 9;

/// Raw channel that carries percussion in the score.
const RAW_PERCUSSION_CHANNEL: u8 = 15;

/// Maps a raw score channel to its logical channel. Raw channel 15 is
/// percussion and lands on 9; raw channels 9..=14 shift up by one to make room.
pub fn remap_channel(raw: u8) -> u8 {
    let raw = raw & 0x0F;
    if raw == RAW_PERCUSSION_CHANNEL {
        PERCUSSION_CHANNEL
    } else if raw >= PERCUSSION_CHANNEL {
        raw + 1
    } else {
        raw
    }
}

/// Maps a score controller id to its standard MIDI controller number.
/// Controller 0 is a program change and has no controller number.
pub fn controller_number(controller: u8) -> Option<u8> {
    match controller {
        1 => Some(0x00),  // bank select
        2 => Some(0x01),  // modulation
        3 => Some(0x07),  // volume
        4 => Some(0x0A),  // pan
        5 => Some(0x0B),  // expression
        6 => Some(0x5B),  // reverb send
        7 => Some(0x5D),  // chorus send
        8 => Some(0x40),  // sustain pedal
        _ => None,
    }
}

/// System event sub-actions that have an effect.
const SYSTEM_ALL_NOTES_OFF: u8 = 11;
const SYSTEM_RESET_ALL_CONTROLLERS: u8 = 14;

/// Parsed fixed header of a score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreHeader {
    pub score_length: u16,
    pub score_start: u16,
    pub channel_count: u16,
    pub secondary_channel_count: u16,
    pub instruments: Vec<u16>,
}

impl ScoreHeader {
    /// Parses and checks the header.
    pub fn parse(data: &[u8]) -> Result<ScoreHeader, FormatError> {
        if data.len() < HEADER_LENGTH || data[..MAGIC.len()] != MAGIC {
            return Err(FormatError::InvalidHeader);
        }

        let instrument_count = read_u16(data, 12);
        let instruments = (0..instrument_count as usize)
            .map(|i| {
                let offset = HEADER_LENGTH + 2 * i;
                if offset + 2 > data.len() {
                    Err(FormatError::InvalidHeader)
                } else {
                    Ok(read_u16(data, offset))
                }
            })
            .collect::<Result<Vec<u16>, FormatError>>()?;

        Ok(ScoreHeader {
            score_length: read_u16(data, 4),
            score_start: read_u16(data, 6),
            channel_count: read_u16(data, 8),
            secondary_channel_count: read_u16(data, 10),
            instruments,
        })
    }
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

/// A single decoded score event. Channels are logical (already remapped) and
/// note volumes are resolved against the per-channel volume cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreEvent {
    ReleaseNote { channel: u8, note: u8 },
    PlayNote { channel: u8, note: u8, volume: u8 },
    PitchWheel { channel: u8, value: u8 },
    System { channel: u8, action: u8 },
    Controller { channel: u8, controller: u8, value: u8 },
}

impl ScoreEvent {
    /// Sends the event to the synthesizer.
    pub fn dispatch<S: Synthesizer + ?Sized>(&self, synth: &mut S) {
        match *self {
            ScoreEvent::ReleaseNote { channel, note } => synth.process(
                u4::from(channel),
                MidiMessage::NoteOff {
                    key: u7::from(note & 0x7F),
                    vel: u7::from(0),
                },
            ),
            ScoreEvent::PlayNote {
                channel,
                note,
                volume,
            } => synth.process(
                u4::from(channel),
                MidiMessage::NoteOn {
                    key: u7::from(note & 0x7F),
                    vel: u7::from(volume & 0x7F),
                },
            ),
            ScoreEvent::PitchWheel { channel, value } => {
                // The eight bit wheel value is widened to the 14 bit range, centered at 8192.
                let wide = (u16::from(value) << 7) / 2;
                synth.process(
                    u4::from(channel),
                    MidiMessage::PitchBend {
                        bend: PitchBend(u14::from(wide & 0x3FFF)),
                    },
                )
            }
            ScoreEvent::System { channel, action } => match action {
                SYSTEM_ALL_NOTES_OFF => synth.note_off_channel(u4::from(channel)),
                SYSTEM_RESET_ALL_CONTROLLERS => synth.reset_all_controllers(u4::from(channel)),
                _ => {}
            },
            ScoreEvent::Controller {
                channel,
                controller,
                value,
            } => {
                let value = u7::from(value & 0x7F);
                if controller == 0 {
                    synth.process(
                        u4::from(channel),
                        MidiMessage::ProgramChange { program: value },
                    );
                } else if let Some(number) = controller_number(controller) {
                    synth.process(
                        u4::from(channel),
                        MidiMessage::Controller {
                            controller: u7::from(number),
                            value,
                        },
                    );
                }
            }
        }
    }
}

/// How a time group ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupEnd {
    /// A normal group followed by a delay in ticks.
    Delay(u32),
    /// The end of score marker.
    EndOfScore,
}

/// A decoded time group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeGroup {
    pub events: Vec<ScoreEvent>,
    pub end: GroupEnd,
}

/// Cursor over the event stream. Shared by playback and validation.
struct ScoreReader<'a> {
    data: &'a [u8],
    p: usize,
}

impl ScoreReader<'_> {
    fn byte(&mut self) -> Result<u8, FormatError> {
        let byte = *self
            .data
            .get(self.p)
            .ok_or(FormatError::UnexpectedEnd { offset: self.p })?;
        self.p += 1;
        Ok(byte)
    }

    /// Reads one time group into `events`, which is cleared first.
    fn read_group(
        &mut self,
        last_volume: &mut [u8; 16],
        events: &mut Vec<ScoreEvent>,
    ) -> Result<GroupEnd, FormatError> {
        events.clear();
        loop {
            let offset = self.p;
            let descriptor = self.byte()?;
            let channel = remap_channel(descriptor & 0x0F);
            let event_type = (descriptor & 0x70) >> 4;
            let last = descriptor & 0x80 != 0;

            let event = match event_type {
                0 => ScoreEvent::ReleaseNote {
                    channel,
                    note: self.byte()? & 0x7F,
                },
                1 => {
                    let note = self.byte()?;
                    let volume = if note & 0x80 != 0 {
                        let volume = self.byte()? & 0x7F;
                        last_volume[channel as usize] = volume;
                        volume
                    } else {
                        last_volume[channel as usize]
                    };
                    ScoreEvent::PlayNote {
                        channel,
                        note: note & 0x7F,
                        volume,
                    }
                }
                2 => ScoreEvent::PitchWheel {
                    channel,
                    value: self.byte()?,
                },
                3 => ScoreEvent::System {
                    channel,
                    action: self.byte()?,
                },
                4 => ScoreEvent::Controller {
                    channel,
                    controller: self.byte()?,
                    value: self.byte()?,
                },
                6 => return Ok(GroupEnd::EndOfScore),
                _ => return Err(FormatError::UnknownEventType { event_type, offset }),
            };
            events.push(event);

            if last {
                break;
            }
        }

        let (delay, next) = vlq::decode(self.data, self.p)?;
        self.p = next;
        Ok(GroupEnd::Delay(delay))
    }
}

/// Streams a score into a synthesizer, one tick per synthesizer block.
pub struct MusDecoder {
    data: Arc<[u8]>,
    header: ScoreHeader,
    looping: bool,
    events: Vec<ScoreEvent>,
    last_volume: [u8; 16],
    p: usize,
    delay: u32,
    block_wrote: usize,
    end_of_data: bool,
}

impl MusDecoder {
    /// Creates a decoder. The whole score is walked once up front so that a
    /// malformed score is rejected before any audio is produced.
    pub fn new(data: Arc<[u8]>, looping: bool) -> Result<MusDecoder, FormatError> {
        let header = ScoreHeader::parse(&data)?;
        let groups = read_groups(&data, header.score_start as usize)?;
        debug!(
            groups = groups.len(),
            instruments = header.instruments.len(),
            looping,
            "Score validated"
        );

        let p = header.score_start as usize;
        Ok(MusDecoder {
            data,
            header,
            looping,
            events: Vec::with_capacity(128),
            last_volume: [0; 16],
            p,
            delay: 0,
            block_wrote: usize::MAX,
            end_of_data: false,
        })
    }

    pub fn header(&self) -> &ScoreHeader {
        &self.header
    }

    /// Decodes every time group of the score, in order, up to and including
    /// the end of score marker.
    pub fn groups(&self) -> Result<Vec<TimeGroup>, FormatError> {
        read_groups(&self.data, self.header.score_start as usize)
    }

    pub fn is_end_of_sequence(&self) -> bool {
        self.end_of_data
    }

    /// Renders `left.len()` frames, processing one time group tick whenever a
    /// full synthesizer block has been written.
    pub fn render_block<S: Synthesizer + ?Sized>(
        &mut self,
        synth: &mut S,
        left: &mut [f32],
        right: &mut [f32],
    ) -> Result<(), FormatError> {
        let block_size = synth.block_size();
        let mut wrote = 0;
        while wrote < left.len() {
            if self.block_wrote >= block_size {
                self.process_tick(synth)?;
                self.block_wrote = 0;
            }

            let remaining = min(block_size - self.block_wrote, left.len() - wrote);
            synth.render(
                &mut left[wrote..wrote + remaining],
                &mut right[wrote..wrote + remaining],
            );

            self.block_wrote += remaining;
            wrote += remaining;
        }
        Ok(())
    }

    fn process_tick<S: Synthesizer + ?Sized>(&mut self, synth: &mut S) -> Result<(), FormatError> {
        if self.end_of_data {
            return Ok(());
        }

        if self.delay > 0 {
            self.delay -= 1;
        }
        if self.delay > 0 {
            return Ok(());
        }

        let mut reader = ScoreReader {
            data: &self.data,
            p: self.p,
        };
        let end = reader.read_group(&mut self.last_volume, &mut self.events)?;
        self.p = reader.p;

        for event in &self.events {
            event.dispatch(synth);
        }

        match end {
            GroupEnd::Delay(delay) => self.delay = delay,
            GroupEnd::EndOfScore => {
                synth.note_off_all();
                if self.looping {
                    self.restart();
                } else {
                    self.end_of_data = true;
                }
            }
        }
        Ok(())
    }

    fn restart(&mut self) {
        self.last_volume = [0; 16];
        self.p = self.header.score_start as usize;
        self.delay = 0;
        self.end_of_data = false;
    }
}

fn read_groups(data: &[u8], start: usize) -> Result<Vec<TimeGroup>, FormatError> {
    let mut reader = ScoreReader { data, p: start };
    let mut last_volume = [0u8; 16];
    let mut groups = Vec::new();
    loop {
        let mut events = Vec::new();
        let end = reader.read_group(&mut last_volume, &mut events)?;
        groups.push(TimeGroup { events, end });
        if end == GroupEnd::EndOfScore {
            return Ok(groups);
        }
    }
}
