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

//! Maps emitter/listener geometry to attenuation and stereo pan.

use super::emitter::{Listener, Position};

/// Sounds closer than this are not attenuated.
pub const CLOSE_DISTANCE: f32 = 160.0;

/// Sounds at or beyond this distance are silent.
pub const CLIP_DISTANCE: f32 = 1200.0;

/// Distance over which sounds fade out.
pub const ATTENUATION_RANGE: f32 = CLIP_DISTANCE - CLOSE_DISTANCE;

/// Offsets below this on both axes are treated as point-blank.
pub const POINT_BLANK: f32 = 16.0;

/// Linear attenuation in [0, 1] for a sound `distance` units away.
pub fn distance_decay(distance: f32) -> f32 {
    if distance < CLOSE_DISTANCE {
        1.0
    } else {
        ((CLIP_DISTANCE - distance) / ATTENUATION_RANGE).max(0.0)
    }
}

/// Attenuation and pan of a positional sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spatial {
    /// Distance attenuation in [0, 1].
    pub decay: f32,
    /// Stereo balance in [-1, 1]. Positive values lean left.
    pub pan: f32,
}

impl Spatial {
    pub const CENTERED: Spatial = Spatial {
        decay: 1.0,
        pan: 0.0,
    };
}

/// Computes attenuation and pan of a sound at `source` heard by `listener`.
/// Point-blank sounds are centered and unattenuated without computing an angle.
pub fn spatialize(listener: &Listener, source: Position) -> Spatial {
    let dx = source.x - listener.position.x;
    let dy = source.y - listener.position.y;
    if dx.abs() < POINT_BLANK && dy.abs() < POINT_BLANK {
        return Spatial::CENTERED;
    }

    let distance = (dx * dx + dy * dy).sqrt();
    let angle = dy.atan2(dx) - listener.angle;
    Spatial {
        decay: distance_decay(distance),
        pan: angle.sin(),
    }
}

/// Straight line distance between the listener and a source.
pub fn distance(listener: &Listener, source: Position) -> f32 {
    let dx = source.x - listener.position.x;
    let dy = source.y - listener.position.y;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn listener(angle: f32) -> Listener {
        Listener {
            position: Position::new(0.0, 0.0),
            angle,
        }
    }

    #[test]
    fn test_distance_decay() {
        assert_eq!(distance_decay(100.0), 1.0);
        assert_eq!(distance_decay(159.9), 1.0);
        assert_eq!(distance_decay(160.0), 1.0);
        assert_eq!(distance_decay(1200.0), 0.0);
        assert_eq!(distance_decay(5000.0), 0.0);
        assert!((distance_decay(680.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_point_blank_is_centered() {
        let spatial = spatialize(&listener(1.0), Position::new(15.0, -15.0));
        assert_eq!(spatial, Spatial::CENTERED);

        // One axis outside the threshold is enough to compute an angle.
        let spatial = spatialize(&listener(0.0), Position::new(0.0, 16.0));
        assert!((spatial.pan - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pan_follows_facing() {
        // Facing east, a sound to the north is on the left.
        let left = spatialize(&listener(0.0), Position::new(0.0, 400.0));
        assert!((left.pan - 1.0).abs() < 1e-6);
        assert!((left.decay - 0.769_230_8).abs() < 1e-5);

        // Facing north, the same sound is straight ahead.
        let ahead = spatialize(&listener(FRAC_PI_2), Position::new(0.0, 400.0));
        assert!(ahead.pan.abs() < 1e-6);

        // Facing east, a sound to the south is on the right.
        let right = spatialize(&listener(0.0), Position::new(0.0, -400.0));
        assert!((right.pan + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance() {
        assert_eq!(distance(&listener(0.0), Position::new(300.0, 400.0)), 500.0);
    }
}
