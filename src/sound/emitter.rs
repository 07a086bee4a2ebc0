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
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Stable handle to an in-world sound emitter. A handle outlives the
    /// emitter it names; lookups on a removed emitter simply fail.
    pub struct EmitterId;
}

/// A point in the 2D world.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Position {
        Position { x, y }
    }
}

/// The listener's position and facing angle in radians. An angle of zero
/// faces the positive x axis; angles grow counterclockwise.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Listener {
    pub position: Position,
    pub angle: f32,
}

impl Listener {
    pub fn new(position: Position, angle: f32) -> Listener {
        Listener { position, angle }
    }
}

/// Answers "where is this emitter now", or `None` once it's gone.
pub trait EmitterSource {
    fn position(&self, id: EmitterId) -> Option<Position>;
}

/// The emitters known to the game, keyed by stable ids.
#[derive(Default)]
pub struct EmitterRegistry {
    emitters: SlotMap<EmitterId, Position>,
}

impl EmitterRegistry {
    pub fn new() -> EmitterRegistry {
        EmitterRegistry {
            emitters: SlotMap::with_key(),
        }
    }

    pub fn spawn(&mut self, position: Position) -> EmitterId {
        self.emitters.insert(position)
    }

    /// Moves an emitter. Returns false if it no longer exists.
    pub fn set_position(&mut self, id: EmitterId, position: Position) -> bool {
        match self.emitters.get_mut(id) {
            Some(current) => {
                *current = position;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: EmitterId) -> Option<Position> {
        self.emitters.remove(id)
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }
}

impl EmitterSource for EmitterRegistry {
    fn position(&self, id: EmitterId) -> Option<Position> {
        self.emitters.get(id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_emitter_is_gone() {
        let mut registry = EmitterRegistry::new();
        let imp = registry.spawn(Position::new(10.0, 20.0));
        let door = registry.spawn(Position::new(-5.0, 0.0));
        assert_eq!(registry.position(imp), Some(Position::new(10.0, 20.0)));

        assert!(registry.set_position(imp, Position::new(11.0, 20.0)));
        assert_eq!(registry.remove(imp), Some(Position::new(11.0, 20.0)));
        assert_eq!(registry.position(imp), None);
        assert!(!registry.set_position(imp, Position::new(0.0, 0.0)));

        // A new emitter never reuses a stale id.
        let barrel = registry.spawn(Position::new(1.0, 1.0));
        assert_ne!(barrel, imp);
        assert_eq!(registry.position(imp), None);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.position(door), Some(Position::new(-5.0, 0.0)));
    }
}
