//! Aspect ratio, target size and frame rate derivation.
//!
//! Everything in here is pure: the pipeline feeds it probed attributes and
//! gets back the numbers it hands to the transcoder.

use serde::{Deserialize, Serialize};

/// A pixel resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// A resolution reduced by the greatest common divisor of its sides.
///
/// `x * scale == width` and `y * scale == height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub x: u32,
    pub y: u32,
    pub scale: u32,
}

/// Dimensions and frame rate to request from the compressor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeTarget {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The geometry as displayed once a container rotation tag is applied.
    ///
    /// Containers report pre-rotation geometry, so a quarter turn swaps the
    /// sides. Negative and >360 tags are normalised first.
    pub fn rotated(self, rotation_degrees: i32) -> Self {
        match rotation_degrees.rem_euclid(360) {
            90 | 270 => Self {
                width: self.height,
                height: self.width,
            },
            _ => self,
        }
    }

    pub fn short_side(&self) -> u32 {
        self.width.min(self.height)
    }

    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    pub fn aspect(&self) -> AspectRatio {
        let scale = aspect_scale(self.width, self.height);
        AspectRatio {
            x: self.width / scale,
            y: self.height / scale,
            scale,
        }
    }
}

/// Greatest common divisor of width and height.
///
/// Both sides are expected to be positive; a zero side yields the other side
/// (and `1` when both are zero) so callers never divide by zero.
pub fn aspect_scale(width: u32, height: u32) -> u32 {
    let (mut a, mut b) = (width, height);
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a.max(1)
}

/// Largest multiplier of the reduced ratio whose short side fits under
/// `max_short_side` and is even.
///
/// Falls back to the source's own scale (no resize) when no multiplier
/// qualifies, so a target is always produced.
pub fn bounded_multiplier(aspect: AspectRatio, max_short_side: u32) -> u32 {
    let unit = aspect.x.min(aspect.y);
    let mut best = None;
    for i in 1..=aspect.scale {
        let side = unit.saturating_mul(i);
        if side > max_short_side {
            break;
        }
        if side % 2 == 0 {
            best = Some(i);
        }
    }
    best.unwrap_or(aspect.scale)
}

/// Halves a frame rate until it no longer exceeds `max_frame_rate`.
pub fn cap_frame_rate(frame_rate: u32, max_frame_rate: u32) -> u32 {
    let mut rate = frame_rate;
    while rate > max_frame_rate {
        rate /= 2;
    }
    rate
}

/// Derives the compressor target for an (already rotation-corrected) source.
pub fn derive_encode_target(
    source: Resolution,
    source_frame_rate: f64,
    max_short_side: u32,
    max_frame_rate: u32,
) -> EncodeTarget {
    let aspect = source.aspect();
    let multiplier = bounded_multiplier(aspect, max_short_side);
    let rounded_rate = if source_frame_rate.is_finite() && source_frame_rate > 0.0 {
        source_frame_rate.round() as u32
    } else {
        0
    };

    EncodeTarget {
        width: aspect.x * multiplier,
        height: aspect.y * multiplier,
        frame_rate: cap_frame_rate(rounded_rate, max_frame_rate),
    }
}
