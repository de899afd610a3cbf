pub use kurbo::{Affine, Point, Rect, Vec2};

/// Straight-alpha colour packed as `0xAARRGGBB`.
pub type Argb = u32;

/// Opaque white.
pub const WHITE: Argb = 0xffff_ffff;

/// Split a straight `0xAARRGGBB` colour into `[r, g, b, a]` bytes.
pub fn argb_channels(argb: Argb) -> [u8; 4] {
    let [a, r, g, b] = argb.to_be_bytes();
    [r, g, b, a]
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
