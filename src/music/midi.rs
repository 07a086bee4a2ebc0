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
use std::cmp::min;

use midly::{Format, Smf};
use nodi::timers::Ticker;
use nodi::{Event, Sheet, Timer};
use tracing::debug;

use super::error::FormatError;
use crate::synth::{Synthesizer, SAMPLE_RATE};

/// Sequences a standard MIDI file into a synthesizer. Each moment of the
/// sheet is one MIDI tick; moments are dispatched at the start of the first
/// synthesizer block that reaches their time.
pub struct MidiDecoder {
    sheet: Sheet,
    initial_ticker: Ticker,
    ticker: Ticker,
    looping: bool,
    started: bool,
    position: usize,
    /// Time of the next moment, in seconds from the start of the pass.
    next_moment: f64,
    /// Time at the start of the next block, in seconds from the start of the pass.
    current_time: f64,
    block_wrote: usize,
    end_of_sequence: bool,
}

impl MidiDecoder {
    /// Parses the file. Nothing is sent to a synthesizer until the first render.
    pub fn new(data: &[u8], looping: bool) -> Result<MidiDecoder, FormatError> {
        let smf = Smf::parse(data)?;
        let ticker = Ticker::try_from(smf.header.timing).map_err(|_| FormatError::Timing)?;
        let sheet = match smf.header.format {
            Format::SingleTrack | Format::Sequential => Sheet::sequential(&smf.tracks),
            Format::Parallel => Sheet::parallel(&smf.tracks),
        };
        debug!(tracks = smf.tracks.len(), moments = sheet.len(), "MIDI file parsed");

        Ok(MidiDecoder {
            sheet,
            initial_ticker: ticker.clone(),
            ticker,
            looping,
            started: false,
            position: 0,
            next_moment: 0.0,
            current_time: 0.0,
            block_wrote: usize::MAX,
            end_of_sequence: false,
        })
    }

    pub fn is_end_of_sequence(&self) -> bool {
        self.end_of_sequence
    }

    pub fn render_block<S: Synthesizer + ?Sized>(
        &mut self,
        synth: &mut S,
        left: &mut [f32],
        right: &mut [f32],
    ) -> Result<(), FormatError> {
        if !self.started {
            self.start();
        }

        let block_size = synth.block_size();
        let mut wrote = 0;
        while wrote < left.len() {
            if self.block_wrote >= block_size {
                self.process_block(synth, block_size);
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

    fn start(&mut self) {
        self.started = true;
        self.rewind(0.0);
    }

    fn rewind(&mut self, at: f64) {
        self.ticker = self.initial_ticker.clone();
        self.position = 0;
        self.next_moment = at;
        self.end_of_sequence = false;
    }

    /// Dispatches every moment due before the end of the coming block.
    fn process_block<S: Synthesizer + ?Sized>(&mut self, synth: &mut S, block_size: usize) {
        if self.end_of_sequence {
            return;
        }

        while self.next_moment <= self.current_time {
            let Some(moment) = self.sheet.get(self.position) else {
                synth.note_off_all();
                if self.looping && !self.sheet.is_empty() {
                    self.rewind(self.current_time);
                    break;
                }
                self.end_of_sequence = true;
                return;
            };

            for event in &moment.events {
                match event {
                    Event::Tempo(tempo) => self.ticker.change_tempo(*tempo),
                    Event::Midi(midi) => synth.process(midi.channel, midi.message),
                    _ => {}
                }
            }

            self.position += 1;
            self.next_moment += self.ticker.sleep_duration(1).as_secs_f64();
        }

        self.current_time += block_size as f64 / f64::from(SAMPLE_RATE);
    }
}

#[cfg(test)]
mod tests {
    use midly::num::{u28, u4, u7};
    use midly::{Header, MidiMessage, Timing, TrackEvent, TrackEventKind};

    use super::*;
    use crate::synth::mock::{RecordingSynthesizer, SynthCommand};

    /// Builds a single track file with 96 ticks per beat at the default tempo.
    /// Events are (delta ticks, key, on).
    fn midi_file(notes: &[(u32, u8, bool)]) -> Vec<u8> {
        let mut track = Vec::new();
        for (delta, key, on) in notes {
            let message = if *on {
                MidiMessage::NoteOn {
                    key: u7::from(*key),
                    vel: u7::from(100),
                }
            } else {
                MidiMessage::NoteOff {
                    key: u7::from(*key),
                    vel: u7::from(0),
                }
            };
            track.push(TrackEvent {
                delta: u28::from(*delta),
                kind: TrackEventKind::Midi {
                    channel: u4::from(0),
                    message,
                },
            });
        }
        track.push(TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
        });

        let smf = Smf {
            header: Header::new(Format::SingleTrack, Timing::Metrical(96.into())),
            tracks: vec![track],
        };
        let mut data = Vec::new();
        smf.write_std(&mut data).unwrap();
        data
    }

    fn render_blocks(decoder: &mut MidiDecoder, synth: &mut RecordingSynthesizer, blocks: usize) {
        let mut left = vec![0.0; synth.block_size()];
        let mut right = vec![0.0; synth.block_size()];
        for _ in 0..blocks {
            decoder.render_block(synth, &mut left, &mut right).unwrap();
        }
    }

    fn note_ons(synth: &RecordingSynthesizer) -> Vec<u8> {
        synth
            .events()
            .iter()
            .filter_map(|c| match c {
                SynthCommand::Message(_, MidiMessage::NoteOn { key, .. }) => Some(key.as_int()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_not_a_midi_file() {
        assert!(matches!(
            MidiDecoder::new(b"RIFF0000", false),
            Err(FormatError::Midi(_))
        ));
    }

    #[test]
    fn test_construction_sends_nothing() {
        let decoder = MidiDecoder::new(&midi_file(&[(0, 60, true)]), false).unwrap();
        assert!(!decoder.is_end_of_sequence());
        assert!(!decoder.started);
    }

    #[test]
    fn test_events_follow_tempo() {
        // At 120bpm and 96 ticks per beat, 96 ticks is half a second: 70 blocks.
        let data = midi_file(&[(0, 60, true), (96, 60, false), (0, 62, true)]);
        let mut decoder = MidiDecoder::new(&data, false).unwrap();
        let mut synth = RecordingSynthesizer::new();

        render_blocks(&mut decoder, &mut synth, 1);
        assert_eq!(note_ons(&synth), vec![60]);

        render_blocks(&mut decoder, &mut synth, 60);
        assert_eq!(note_ons(&synth), vec![60]);

        render_blocks(&mut decoder, &mut synth, 20);
        assert_eq!(note_ons(&synth), vec![60, 62]);
    }

    #[test]
    fn test_end_of_sequence() {
        let data = midi_file(&[(0, 60, true), (10, 60, false)]);
        let mut decoder = MidiDecoder::new(&data, false).unwrap();
        let mut synth = RecordingSynthesizer::new();

        render_blocks(&mut decoder, &mut synth, 50);
        assert!(decoder.is_end_of_sequence());
        assert_eq!(synth.events().last(), Some(&SynthCommand::NoteOffAll));

        synth.clear();
        render_blocks(&mut decoder, &mut synth, 5);
        assert!(synth.events().is_empty());
    }

    #[test]
    fn test_looping_restarts() {
        let data = midi_file(&[(0, 60, true), (10, 60, false)]);
        let mut decoder = MidiDecoder::new(&data, true).unwrap();
        let mut synth = RecordingSynthesizer::new();

        render_blocks(&mut decoder, &mut synth, 50);
        assert!(!decoder.is_end_of_sequence());
        assert!(note_ons(&synth).len() > 1);
    }
}
