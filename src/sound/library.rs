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
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::asset::AudioAsset;
use crate::assets::AssetStore;

/// Lump name prefix of sound effects.
pub const SOUND_PREFIX: &str = "DS";

/// Sounds that are never pitch shifted.
const FIXED_PITCH_SOUNDS: [&str; 3] = ["ITEMUP", "TINK", "RADIO"];

/// Identifies a loaded sound effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundId(usize);

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The set of playable sound effects.
#[derive(Default)]
pub struct SoundLibrary {
    sounds: Vec<Arc<AudioAsset>>,
    by_name: HashMap<String, SoundId>,
}

impl SoundLibrary {
    pub fn new() -> SoundLibrary {
        SoundLibrary::default()
    }

    /// Loads the named sound effects. Missing or unusable lumps are skipped.
    pub fn load(store: &dyn AssetStore, names: &[&str]) -> SoundLibrary {
        let mut library = SoundLibrary::new();
        for name in names {
            let name = name.to_uppercase();
            let lump = format!("{SOUND_PREFIX}{name}");
            let Some(data) = store.read(&lump) else {
                debug!(lump, "Sound effect missing, skipping");
                continue;
            };

            match AudioAsset::from_lump(&name, &data) {
                Ok(asset) => {
                    library.insert(asset);
                }
                Err(e) => warn!(lump, err = %e, "Unusable sound effect, skipping"),
            }
        }
        info!(sounds = library.len(), "Sound effects loaded");
        library
    }

    /// Loads every sound effect lump in the store.
    pub fn load_all(store: &dyn AssetStore) -> SoundLibrary {
        let names: Vec<String> = store
            .names()
            .into_iter()
            .filter_map(|name| name.strip_prefix(SOUND_PREFIX).map(str::to_string))
            .collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        SoundLibrary::load(store, &names)
    }

    /// Adds a sound, replacing any sound with the same name.
    pub fn insert(&mut self, asset: AudioAsset) -> SoundId {
        let name = asset.name().to_uppercase();
        if let Some(id) = self.by_name.get(&name) {
            self.sounds[id.0] = Arc::new(asset);
            return *id;
        }

        let id = SoundId(self.sounds.len());
        self.sounds.push(Arc::new(asset));
        self.by_name.insert(name, id);
        id
    }

    /// Finds a sound by its logical name (without the lump prefix).
    pub fn id(&self, name: &str) -> Option<SoundId> {
        self.by_name.get(&name.to_uppercase()).copied()
    }

    pub fn get(&self, id: SoundId) -> Option<&Arc<AudioAsset>> {
        self.sounds.get(id.0)
    }

    pub fn amplitude(&self, id: SoundId) -> f32 {
        self.get(id).map(|asset| asset.amplitude()).unwrap_or(0.0)
    }

    /// True if the sound is exempt from random pitch variation.
    pub fn is_fixed_pitch(&self, id: SoundId) -> bool {
        self.get(id).is_some_and(|asset| {
            FIXED_PITCH_SOUNDS
                .iter()
                .any(|name| name.eq_ignore_ascii_case(asset.name()))
        })
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SoundId, &Arc<AudioAsset>)> {
        self.sounds
            .iter()
            .enumerate()
            .map(|(i, asset)| (SoundId(i), asset))
    }
}
