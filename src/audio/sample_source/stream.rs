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
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::time::Duration;

use super::error::SampleSourceError;
use super::traits::{prepare_output, SampleSource};
use crate::stream::wav::{self, PcmFormat, HEADER_LENGTH, UNKNOWN_SIZE};

/// Decodes 16-bit PCM from a byte source that starts with a canonical
/// 44-byte WAVE header. Unlike a regular WAV reader this tolerates a header
/// whose sizes are still unknown, which is what a music stream looks like
/// before its track has been rendered to the end.
pub struct PcmStreamSource<R: Read + Seek + Send> {
    reader: R,
    format: PcmFormat,
    data_size: u32,
    bytes: Vec<u8>,
}

impl<R: Read + Seek + Send> PcmStreamSource<R> {
    pub fn new(mut reader: R) -> Result<PcmStreamSource<R>, SampleSourceError> {
        let mut header = [0u8; HEADER_LENGTH];
        reader.read_exact(&mut header)?;

        let format = wav::read_header(&header).ok_or_else(|| {
            SampleSourceError::UnsupportedStream("missing PCM header".to_string())
        })?;
        if format.bits_per_sample != 16 || format.channels == 0 {
            return Err(SampleSourceError::UnsupportedStream(format!(
                "{} channel {} bit PCM",
                format.channels, format.bits_per_sample
            )));
        }

        Ok(PcmStreamSource {
            reader,
            format,
            data_size: wav::data_size(&header).unwrap_or(UNKNOWN_SIZE),
            bytes: Vec::new(),
        })
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Fills `self.bytes` as far as the reader allows. Returns the number of
    /// bytes read.
    fn fill(&mut self) -> Result<usize, SampleSourceError> {
        let mut filled = 0;
        while filled < self.bytes.len() {
            match self.reader.read(&mut self.bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl<R: Read + Seek + Send> SampleSource for PcmStreamSource<R> {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, SampleSourceError> {
        prepare_output(output, self.format.channels)?;

        let block_align = usize::from(self.format.block_align());
        self.bytes.resize(max_frames * block_align, 0);
        let frames = self.fill()? / block_align;

        for frame in self.bytes[..frames * block_align].chunks_exact(block_align) {
            for (channel, sample) in output.iter_mut().zip(frame.chunks_exact(2)) {
                channel.push(f32::from(i16::from_le_bytes([sample[0], sample[1]])) / 32768.0);
            }
        }
        Ok(frames)
    }

    fn channel_count(&self) -> u16 {
        self.format.channels
    }

    fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    fn duration(&self) -> Option<Duration> {
        if self.data_size == UNKNOWN_SIZE {
            return None;
        }
        Some(Duration::from_secs_f64(
            f64::from(self.data_size) / f64::from(self.format.byte_rate()),
        ))
    }

    fn rewind(&mut self) -> Result<bool, SampleSourceError> {
        self.reader.seek(SeekFrom::Start(HEADER_LENGTH as u64))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use super::*;
    use crate::music::Decoder;
    use crate::stream::PcmStream;
    use crate::synth::mock::RecordingSynthesizer;
    use crate::testutil::score_of_ticks;

    fn stream(ticks: u32, looping: bool) -> PcmStream<RecordingSynthesizer> {
        let decoder = Decoder::new(Arc::from(score_of_ticks(ticks)), looping).unwrap();
        PcmStream::new(RecordingSynthesizer::new().with_levels(0.5, -0.25), decoder)
    }

    #[test]
    fn test_reads_rendered_stream() {
        let mut source = PcmStreamSource::new(stream(2, false)).unwrap();
        assert_eq!(source.channel_count(), 2);
        assert_eq!(source.sample_rate(), 44100);
        assert_eq!(source.duration(), None);

        let mut output = vec![Vec::new(), Vec::new()];
        let mut frames = 0;
        loop {
            let count = source.next_chunk(&mut output, 100).unwrap();
            if count == 0 {
                break;
            }
            assert!(output[0].iter().all(|s| (*s - 16384.0 / 32768.0).abs() < 1e-6));
            assert!(output[1].iter().all(|s| (*s + 8192.0 / 32768.0).abs() < 1e-6));
            frames += count;
        }
        assert_eq!(frames, 2 * crate::synth::BLOCK_LENGTH);

        assert!(source.rewind().unwrap());
        assert_eq!(source.next_chunk(&mut output, 10).unwrap(), 10);
    }

    #[test]
    fn test_looping_stream_never_ends() {
        let mut source = PcmStreamSource::new(stream(1, true)).unwrap();
        let mut output = vec![Vec::new(), Vec::new()];
        for _ in 0..20 {
            assert_eq!(source.next_chunk(&mut output, 512).unwrap(), 512);
        }
    }

    #[test]
    fn test_rejects_non_pcm() {
        let result = PcmStreamSource::new(Cursor::new(vec![0u8; 64]));
        assert!(matches!(
            result,
            Err(SampleSourceError::UnsupportedStream(_))
        ));

        let result = PcmStreamSource::new(Cursor::new(vec![0u8; 8]));
        assert!(matches!(result, Err(SampleSourceError::IoError(_))));
    }
}
