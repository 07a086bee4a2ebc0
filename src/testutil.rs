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
use std::{
    error::Error,
    path::Path,
    thread,
    time::{Duration, SystemTime},
};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::music::mus::{GroupEnd, ScoreEvent, TimeGroup, MAGIC};
use crate::music::vlq;

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed();
        if elapsed.is_err() {
            panic!("System time error");
        }
        let elapsed = elapsed.unwrap();

        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Maps a logical channel back to the raw channel that produces it.
fn raw_channel(channel: u8) -> u8 {
    match channel {
        9 => 15,
        10..=15 => channel - 1,
        _ => channel,
    }
}

/// Builds legacy scores event by event. Channels given to the builder are raw
/// score channels. [`ScoreBuilder::delay`] closes the current time group and
/// [`ScoreBuilder::build`] appends the end of score marker.
pub struct ScoreBuilder {
    instruments: Vec<u16>,
    body: Vec<u8>,
    last_descriptor: Option<usize>,
}

impl ScoreBuilder {
    pub fn new() -> ScoreBuilder {
        ScoreBuilder {
            instruments: Vec::new(),
            body: Vec::new(),
            last_descriptor: None,
        }
    }

    /// Rebuilds a score from decoded groups.
    pub fn from_groups(groups: &[TimeGroup]) -> ScoreBuilder {
        let mut builder = ScoreBuilder::new();
        for group in groups {
            for event in &group.events {
                builder = match *event {
                    ScoreEvent::ReleaseNote { channel, note } => {
                        builder.release_note(raw_channel(channel), note)
                    }
                    ScoreEvent::PlayNote {
                        channel,
                        note,
                        volume,
                    } => builder.play_note(raw_channel(channel), note, Some(volume)),
                    ScoreEvent::PitchWheel { channel, value } => {
                        builder.pitch_wheel(raw_channel(channel), value)
                    }
                    ScoreEvent::System { channel, action } => {
                        builder.system(raw_channel(channel), action)
                    }
                    ScoreEvent::Controller {
                        channel,
                        controller,
                        value,
                    } => builder.controller(raw_channel(channel), controller, value),
                };
            }
            if let GroupEnd::Delay(delay) = group.end {
                builder = builder.delay(delay);
            }
        }
        builder
    }

    pub fn instruments(mut self, instruments: &[u16]) -> ScoreBuilder {
        self.instruments = instruments.to_vec();
        self
    }

    fn event(mut self, event_type: u8, channel: u8, data: &[u8]) -> ScoreBuilder {
        self.last_descriptor = Some(self.body.len());
        self.body.push((event_type << 4) | (channel & 0x0F));
        self.body.extend_from_slice(data);
        self
    }

    pub fn release_note(self, channel: u8, note: u8) -> ScoreBuilder {
        self.event(0, channel, &[note & 0x7F])
    }

    /// Plays a note, optionally with an explicit volume. Without one the
    /// channel's last volume is used.
    pub fn play_note(self, channel: u8, note: u8, volume: Option<u8>) -> ScoreBuilder {
        match volume {
            Some(volume) => self.event(1, channel, &[note | 0x80, volume & 0x7F]),
            None => self.event(1, channel, &[note & 0x7F]),
        }
    }

    pub fn pitch_wheel(self, channel: u8, value: u8) -> ScoreBuilder {
        self.event(2, channel, &[value])
    }

    pub fn system(self, channel: u8, action: u8) -> ScoreBuilder {
        self.event(3, channel, &[action])
    }

    pub fn controller(self, channel: u8, controller: u8, value: u8) -> ScoreBuilder {
        self.event(4, channel, &[controller, value])
    }

    /// Closes the current time group with the given delay in ticks.
    pub fn delay(mut self, ticks: u32) -> ScoreBuilder {
        if let Some(descriptor) = self.last_descriptor.take() {
            self.body[descriptor] |= 0x80;
        }
        self.body.extend(vlq::encode(ticks));
        self
    }

    /// Appends raw bytes to the score body.
    pub fn raw(mut self, bytes: &[u8]) -> ScoreBuilder {
        self.body.extend_from_slice(bytes);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let score_start = 16 + 2 * self.instruments.len();
        let mut body = self.body.clone();
        body.push(0x60);

        let mut data = Vec::with_capacity(score_start + body.len());
        data.extend_from_slice(&MAGIC);
        data.extend_from_slice(&(body.len() as u16).to_le_bytes());
        data.extend_from_slice(&(score_start as u16).to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&(self.instruments.len() as u16).to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        for instrument in &self.instruments {
            data.extend_from_slice(&instrument.to_le_bytes());
        }
        data.extend(body);
        data
    }
}

/// A score that plays one note and ends after `ticks` ticks.
pub fn score_of_ticks(ticks: u32) -> Vec<u8> {
    ScoreBuilder::new()
        .play_note(0, 60, Some(100))
        .delay(ticks - 1)
        .build()
}

/// Builds a digitized sound lump around the given unsigned 8 bit samples.
/// When `padded` is set, 16 copies of the first and last sample are added on
/// either side.
pub fn dmx_lump(sample_rate: u16, samples: &[u8], padded: bool) -> Vec<u8> {
    let mut body = Vec::with_capacity(samples.len() + 32);
    if padded {
        let first = samples.first().copied().unwrap_or(128);
        let last = samples.last().copied().unwrap_or(128);
        body.extend(std::iter::repeat(first).take(16));
        body.extend_from_slice(samples);
        body.extend(std::iter::repeat(last).take(16));
    } else {
        body.extend_from_slice(samples);
    }

    let mut data = Vec::with_capacity(8 + body.len());
    data.extend_from_slice(&3u16.to_le_bytes());
    data.extend_from_slice(&sample_rate.to_le_bytes());
    data.extend_from_slice(&(body.len() as u32).to_le_bytes());
    data.extend(body);
    data
}

/// Writes interleaved 16 bit samples to a WAV file.
pub fn write_wav(
    path: &Path,
    samples: &[i16],
    channels: u16,
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    let mut writer = WavWriter::create(
        path,
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
    )?;
    for sample in samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;
    Ok(())
}
