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

//! Variable length delay values used between score time groups.
//!
//! Each byte carries seven bits of the value, most significant group first. The
//! high bit is set on every byte except the last one.

use super::error::FormatError;

/// Decodes a variable length value starting at `offset`.
///
/// Returns the value and the offset of the first byte after it.
pub fn decode(data: &[u8], offset: usize) -> Result<(u32, usize), FormatError> {
    let mut value: u32 = 0;
    let mut p = offset;
    loop {
        let byte = *data.get(p).ok_or(FormatError::UnexpectedEnd { offset: p })?;
        p += 1;
        value = value.wrapping_mul(128).wrapping_add(u32::from(byte & 0x7F));
        if byte & 0x80 == 0 {
            return Ok((value, p));
        }
    }
}

/// Encodes a value in the same representation. Used to build scores.
pub fn encode(value: u32) -> Vec<u8> {
    let mut groups = vec![(value & 0x7F) as u8];
    let mut rest = value >> 7;
    while rest > 0 {
        groups.push((rest & 0x7F) as u8 | 0x80);
        rest >>= 7;
    }
    groups.reverse();
    groups
}
