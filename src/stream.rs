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
use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::debug;

use crate::music::{Decoder, FormatError};
use crate::synth::{Synthesizer, SAMPLE_RATE};

pub mod wav;

use wav::PcmFormat;

/// Errors raised by a [`PcmStream`].
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("cannot seek to a negative position")]
    NegativeSeek,

    #[error("{0} is not supported on a generated stream")]
    Unsupported(&'static str),

    #[error("music decode failed: {0}")]
    Format(#[from] FormatError),
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> io::Error {
        let kind = match err {
            StreamError::NegativeSeek => io::ErrorKind::InvalidInput,
            StreamError::Unsupported(_) => io::ErrorKind::Unsupported,
            StreamError::Format(_) => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, err)
    }
}

/// A read-only WAV byte stream that is synthesized on demand.
///
/// Bytes are only generated when a read or seek reaches past what has been
/// produced so far. Both size fields of the header hold [`wav::UNKNOWN_SIZE`]
/// until the decoder reaches the end of its sequence, at which point they are
/// patched with the real sizes.
pub struct PcmStream<S: Synthesizer> {
    synth: S,
    decoder: Decoder,
    format: PcmFormat,
    data: Vec<u8>,
    position: u64,
    header_written: bool,
    end_of_sequence: bool,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl<S: Synthesizer> PcmStream<S> {
    /// Creates a stream over the given decoder. The synthesizer is reset first.
    pub fn new(synth: S, decoder: Decoder) -> PcmStream<S> {
        let mut stream = PcmStream {
            synth,
            decoder,
            format: PcmFormat {
                channels: 2,
                sample_rate: SAMPLE_RATE,
                bits_per_sample: 16,
            },
            data: Vec::new(),
            position: 0,
            header_written: false,
            end_of_sequence: false,
            left: Vec::new(),
            right: Vec::new(),
        };
        stream.synth.reset();
        stream
    }

    /// Declares a different sample rate in the header.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> PcmStream<S> {
        self.format.sample_rate = sample_rate;
        self
    }

    /// Switches to a new track. Everything produced so far is discarded and the
    /// synthesizer is reset so no notes carry over.
    pub fn set_decoder(&mut self, decoder: Decoder) {
        self.synth.reset();
        self.decoder = decoder;
        self.data = Vec::new();
        self.position = 0;
        self.header_written = false;
        self.end_of_sequence = false;
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn synth(&self) -> &S {
        &self.synth
    }

    /// True once the decoder has finished and the header has been patched.
    pub fn is_end_of_sequence(&self) -> bool {
        self.end_of_sequence
    }

    /// The total length, which is only known once the sequence has ended.
    pub fn total_len(&self) -> Option<u64> {
        if self.end_of_sequence {
            Some(self.data.len() as u64)
        } else {
            None
        }
    }

    /// Number of bytes produced so far.
    pub fn materialized_len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// The bytes produced so far.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Reads from the current position, generating audio as needed.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        self.ensure_available(self.position.saturating_add(buf.len() as u64))?;

        let start = min(self.position, self.data.len() as u64) as usize;
        let count = min(buf.len(), self.data.len() - start);
        buf[..count].copy_from_slice(&self.data[start..start + count]);
        self.position += count as u64;
        Ok(count)
    }

    /// Moves the read position. Seeking relative to the end is not supported,
    /// since the end isn't known until everything has been generated.
    pub fn seek_to(&mut self, pos: SeekFrom) -> Result<u64, StreamError> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(offset) => i128::from(self.position) + i128::from(offset),
            SeekFrom::End(_) => return Err(StreamError::Unsupported("seek from end")),
        };
        if target < 0 {
            return Err(StreamError::NegativeSeek);
        }

        let target = u64::try_from(target).unwrap_or(u64::MAX);
        self.ensure_available(target)?;
        self.position = target;
        Ok(target)
    }

    pub fn write_bytes(&mut self, _buf: &[u8]) -> Result<usize, StreamError> {
        Err(StreamError::Unsupported("write"))
    }

    pub fn set_len(&mut self, _len: u64) -> Result<(), StreamError> {
        Err(StreamError::Unsupported("set length"))
    }

    /// Generates blocks until `target` bytes exist or the sequence ends.
    fn ensure_available(&mut self, target: u64) -> Result<(), StreamError> {
        while (self.data.len() as u64) < target && !self.end_of_sequence {
            if !self.header_written {
                wav::write_header(&mut self.data, self.format);
                self.header_written = true;
            }

            if self.decoder.is_end_of_sequence() {
                self.end_of_sequence = true;
                wav::patch_sizes(&mut self.data);
                debug!(
                    bytes = self.data.len(),
                    format = %self.decoder.format(),
                    "Music stream complete"
                );
            } else {
                self.render_block()?;
            }
        }
        Ok(())
    }

    fn render_block(&mut self) -> Result<(), StreamError> {
        let frames = self.synth.block_size();
        self.left.resize(frames, 0.0);
        self.right.resize(frames, 0.0);
        self.decoder
            .render_block(&mut self.synth, &mut self.left, &mut self.right)?;

        self.data.reserve(frames * 4);
        for (left, right) in self.left.iter().zip(self.right.iter()) {
            self.data.extend_from_slice(&to_i16(*left).to_le_bytes());
            self.data.extend_from_slice(&to_i16(*right).to_le_bytes());
        }
        Ok(())
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}

impl<S: Synthesizer> Read for PcmStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_bytes(buf)?)
    }
}

impl<S: Synthesizer> Seek for PcmStream<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_to(pos)?)
    }
}

impl<S: Synthesizer> Write for PcmStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_bytes(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(StreamError::Unsupported("flush").into())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::synth::mock::{RecordingSynthesizer, SynthCommand};
    use crate::testutil::{score_of_ticks, ScoreBuilder};

    fn one_second_stream(left: f32, right: f32) -> PcmStream<RecordingSynthesizer> {
        let decoder = Decoder::new(score_of_ticks(140).into(), false).unwrap();
        PcmStream::new(RecordingSynthesizer::new().with_levels(left, right), decoder)
    }

    #[test]
    fn test_one_second_track() {
        let mut stream = one_second_stream(0.5, -0.5);
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();

        assert!(stream.is_end_of_sequence());
        assert_eq!(out.len(), 44 + 176400);
        assert_eq!(stream.total_len(), Some(176444));
        assert_eq!(wav::data_size(&out), Some(176400));
        assert_eq!(&out[4..8], &176436u32.to_le_bytes());

        let reader = hound::WavReader::new(Cursor::new(out)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 16);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 88200);
        assert_eq!(samples[0], 16384);
        assert_eq!(samples[1], -16384);
    }

    #[test]
    fn test_partial_read_keeps_placeholder() {
        let mut stream = one_second_stream(0.0, 0.0);
        let mut buf = vec![0; 88200];
        stream.read_exact(&mut buf).unwrap();

        assert!(!stream.is_end_of_sequence());
        assert_eq!(stream.total_len(), None);
        assert_eq!(wav::data_size(&buf), Some(wav::UNKNOWN_SIZE));
        assert!(stream.materialized_len() >= 88200);
        assert!(stream.materialized_len() < 88200 + 315 * 4);
        assert_eq!(stream.position(), 88200);
    }

    #[test]
    fn test_no_growth_past_end() {
        let mut stream = one_second_stream(0.1, 0.1);
        stream.seek(SeekFrom::Start(1_000_000)).unwrap();
        assert!(stream.is_end_of_sequence());
        let len = stream.materialized_len();
        assert_eq!(len, 176444);

        let mut buf = [0; 64];
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
        stream.seek(SeekFrom::Current(5_000_000)).unwrap();
        assert_eq!(stream.materialized_len(), len);
    }

    #[test]
    fn test_negative_seek() {
        let mut stream = one_second_stream(0.0, 0.0);
        stream.seek_to(SeekFrom::Start(100)).unwrap();
        assert!(matches!(
            stream.seek_to(SeekFrom::Current(-101)),
            Err(StreamError::NegativeSeek)
        ));
        assert_eq!(stream.position(), 100);

        let err = stream.seek(SeekFrom::Current(-200)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(stream.seek_to(SeekFrom::Current(-100)).unwrap(), 0);
    }

    #[test]
    fn test_unsupported_operations() {
        let mut stream = one_second_stream(0.0, 0.0);
        assert!(matches!(
            stream.write_bytes(b"data"),
            Err(StreamError::Unsupported(_))
        ));
        assert!(matches!(stream.set_len(10), Err(StreamError::Unsupported(_))));
        assert!(matches!(
            stream.seek_to(SeekFrom::End(0)),
            Err(StreamError::Unsupported(_))
        ));
        assert_eq!(
            stream.write(b"data").unwrap_err().kind(),
            io::ErrorKind::Unsupported
        );
        assert_eq!(stream.materialized_len(), 0);
    }

    #[test]
    fn test_samples_are_clamped() {
        let mut stream = one_second_stream(2.0, -3.0);
        let mut buf = [0; 48];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(i16::from_le_bytes([buf[44], buf[45]]), 32767);
        assert_eq!(i16::from_le_bytes([buf[46], buf[47]]), -32767);
    }

    #[test]
    fn test_set_decoder_resets() {
        let mut stream = one_second_stream(0.0, 0.0);
        stream.seek_to(SeekFrom::Start(200_000)).unwrap();
        assert!(stream.is_end_of_sequence());

        let decoder = Decoder::new(score_of_ticks(10).into(), false).unwrap();
        stream.set_decoder(decoder);
        assert!(!stream.is_end_of_sequence());
        assert_eq!(stream.total_len(), None);
        assert_eq!(stream.materialized_len(), 0);
        assert_eq!(stream.position(), 0);
        assert_eq!(stream.synth().events().last(), Some(&SynthCommand::Reset));

        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out.len(), 44 + 10 * 315 * 4);
    }

    #[test]
    fn test_looping_stream_keeps_growing() {
        let decoder = Decoder::new(score_of_ticks(2).into(), true).unwrap();
        let mut stream = PcmStream::new(RecordingSynthesizer::new(), decoder);
        stream.seek_to(SeekFrom::Start(500_000)).unwrap();
        assert!(!stream.is_end_of_sequence());
        assert!(stream.materialized_len() >= 500_000);
    }

    #[test]
    fn test_declared_sample_rate() {
        let data = ScoreBuilder::new().play_note(0, 60, Some(1)).delay(0).build();
        let decoder = Decoder::new(data.into(), false).unwrap();
        let mut stream =
            PcmStream::new(RecordingSynthesizer::new(), decoder).with_sample_rate(22050);
        let mut header = [0; 44];
        stream.read_exact(&mut header).unwrap();
        assert_eq!(wav::read_header(&header).map(|f| f.sample_rate), Some(22050));
    }
}
