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

//! The 44 byte RIFF/WAVE header used by generated streams.

/// Length of the header. Sample data starts right after it.
pub const HEADER_LENGTH: usize = 44;

/// Placeholder written to both size fields until the final length is known.
pub const UNKNOWN_SIZE: u32 = u32::MAX;

const RIFF_SIZE_OFFSET: usize = 4;
const DATA_SIZE_OFFSET: usize = 40;

const FORMAT_PCM: u16 = 1;

/// Basic format of a PCM payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.block_align())
    }
}

/// Appends a header with placeholder sizes.
pub fn write_header(buffer: &mut Vec<u8>, format: PcmFormat) {
    buffer.extend_from_slice(b"RIFF");
    buffer.extend_from_slice(&UNKNOWN_SIZE.to_le_bytes());
    buffer.extend_from_slice(b"WAVE");

    buffer.extend_from_slice(b"fmt ");
    buffer.extend_from_slice(&16u32.to_le_bytes());
    buffer.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    buffer.extend_from_slice(&format.channels.to_le_bytes());
    buffer.extend_from_slice(&format.sample_rate.to_le_bytes());
    buffer.extend_from_slice(&format.byte_rate().to_le_bytes());
    buffer.extend_from_slice(&format.block_align().to_le_bytes());
    buffer.extend_from_slice(&format.bits_per_sample.to_le_bytes());

    buffer.extend_from_slice(b"data");
    buffer.extend_from_slice(&UNKNOWN_SIZE.to_le_bytes());
}

/// Rewrites both size fields of a header at the start of `buffer` with the
/// values implied by the buffer's length.
pub fn patch_sizes(buffer: &mut [u8]) {
    let (riff_size, data_size) = size_fields(buffer.len());
    buffer[RIFF_SIZE_OFFSET..RIFF_SIZE_OFFSET + 4].copy_from_slice(&riff_size.to_le_bytes());
    buffer[DATA_SIZE_OFFSET..DATA_SIZE_OFFSET + 4].copy_from_slice(&data_size.to_le_bytes());
}

/// The RIFF and data sizes of a stream `total_len` bytes long. Streams too
/// long for the format keep [`UNKNOWN_SIZE`].
fn size_fields(total_len: usize) -> (u32, u32) {
    let field = |len: usize| u32::try_from(len).unwrap_or(UNKNOWN_SIZE);
    (
        field(total_len.saturating_sub(8)),
        field(total_len.saturating_sub(HEADER_LENGTH)),
    )
}

/// Reads the format out of a header written by [`write_header`]. Returns
/// `None` if the bytes aren't such a header.
pub fn read_header(header: &[u8]) -> Option<PcmFormat> {
    if header.len() < HEADER_LENGTH
        || &header[0..4] != b"RIFF"
        || &header[8..16] != b"WAVEfmt "
        || &header[36..40] != b"data"
    {
        return None;
    }

    let u16_at = |offset: usize| u16::from_le_bytes([header[offset], header[offset + 1]]);
    if u16_at(20) != FORMAT_PCM {
        return None;
    }

    Some(PcmFormat {
        channels: u16_at(22),
        sample_rate: u32::from_le_bytes([header[24], header[25], header[26], header[27]]),
        bits_per_sample: u16_at(34),
    })
}

/// Reads the data size field. [`UNKNOWN_SIZE`] until the stream completes.
pub fn data_size(header: &[u8]) -> Option<u32> {
    header
        .get(DATA_SIZE_OFFSET..DATA_SIZE_OFFSET + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}
