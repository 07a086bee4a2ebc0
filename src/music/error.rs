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

/// Errors raised while decoding a music lump. All of them are fatal to the
/// decode attempt; nothing is retried and no partial playback is attempted.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("invalid score header")]
    InvalidHeader,

    #[error("unknown event type {event_type} at offset {offset}")]
    UnknownEventType { event_type: u8, offset: usize },

    #[error("score ended unexpectedly at offset {offset}")]
    UnexpectedEnd { offset: usize },

    #[error("unknown music format")]
    UnknownFormat,

    #[error("MIDI parse error: {0}")]
    Midi(#[from] midly::Error),

    #[error("unsupported MIDI timing")]
    Timing,
}
