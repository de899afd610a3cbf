use crate::foundation::core::{Argb, argb_channels};

/// Effective alpha values below this threshold collapse to exactly zero.
pub(crate) const ALPHA_EPSILON: f64 = 1e-14;

pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

pub(crate) fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

/// Clamp an opacity into `[0, 1]`, flushing float noise below [`ALPHA_EPSILON`] to zero.
pub(crate) fn clamp_alpha(alpha: f64) -> f64 {
    if alpha.is_nan() || alpha < ALPHA_EPSILON {
        0.0
    } else if alpha > 1.0 {
        1.0
    } else {
        alpha
    }
}

/// Multiply `argb` by `alpha` and premultiply, packed as `0xAABBGGRR` for the vertex layout.
pub(crate) fn premultiplied_abgr(argb: Argb, alpha: f64) -> u32 {
    let [r, g, b, a] = argb_channels(argb);
    let a = ((f64::from(a) * alpha.clamp(0.0, 1.0)).round() as u16).min(255);
    let [r, g, b] = [r, g, b].map(|c| mul_div255_u8(u16::from(c), a));
    u32::from_le_bytes([r, g, b, a as u8])
}

/// Source-over blend of one premultiplied RGBA8 pixel.
pub(crate) fn premul_over_px(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    let sa = u16::from(src[3]);
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return src;
    }
    let inv = 255u16 - sa;
    [
        add_sat_u8(src[0], mul_div255_u8(u16::from(dst[0]), inv)),
        add_sat_u8(src[1], mul_div255_u8(u16::from(dst[1]), inv)),
        add_sat_u8(src[2], mul_div255_u8(u16::from(dst[2]), inv)),
        add_sat_u8(src[3], mul_div255_u8(u16::from(dst[3]), inv)),
    ]
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
