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
//! Game audio: a streaming music decoder for MUS and MIDI scores and a
//! prioritized, distance-attenuated sound effect channel engine.

pub mod assets;
pub mod audio;
pub mod config;
pub mod music;
pub mod playsync;
pub mod sound;
pub mod stream;
pub mod synth;
pub mod util;

#[cfg(test)]
mod testutil;
