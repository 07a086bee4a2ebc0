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

//! Sound effects: assets, the channel pool and the game-facing engine.

pub mod asset;
pub mod channel;
pub mod distance;
pub mod emitter;
pub mod engine;
pub mod library;
pub mod pool;

pub use asset::{AssetError, AudioAsset};
pub use channel::{ChannelState, SoundKind, SoundRequest};
pub use emitter::{EmitterId, EmitterRegistry, EmitterSource, Listener, Position};
pub use engine::SoundEngine;
pub use library::{SoundId, SoundLibrary};
pub use pool::{Admission, ChannelPool};
