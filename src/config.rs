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
use std::path::Path;

use config::{Config, Environment, File};
use tracing::debug;

mod audio;
mod error;

pub use audio::{Audio, MAX_VOLUME};
pub use error::ConfigError;

/// Prefix of environment variables that override file settings, e.g.
/// `RETROSOUND_SOUND_VOLUME=4`.
pub const ENV_PREFIX: &str = "RETROSOUND";

/// Loads the audio configuration from a YAML file. Environment variables
/// with the [`ENV_PREFIX`] override values from the file.
pub fn load(path: &Path) -> Result<Audio, ConfigError> {
    let audio: Audio = Config::builder()
        .add_source(File::from(path))
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()?
        .try_deserialize()?;
    debug!(path = ?path, "Loaded audio configuration");
    Ok(audio)
}
