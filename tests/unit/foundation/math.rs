use super::*;

#[test]
fn mul_div255_variants_align() {
    for x in [0u16, 1, 127, 255] {
        for y in [0u16, 1, 127, 255] {
            assert_eq!(u16::from(mul_div255_u8(x, y)), mul_div255_u16(x, y));
        }
    }
}

#[test]
fn alpha_clamps_to_unit_range() {
    assert_eq!(clamp_alpha(1e-15), 0.0);
    assert_eq!(clamp_alpha(-0.5), 0.0);
    assert_eq!(clamp_alpha(f64::NAN), 0.0);
    assert_eq!(clamp_alpha(1.7), 1.0);
    assert_eq!(clamp_alpha(0.25), 0.25);
}

#[test]
fn premultiplied_abgr_packs_channels() {
    assert_eq!(premultiplied_abgr(0xffff_0000, 1.0), 0xff00_00ff);
    assert_eq!(premultiplied_abgr(0xffff_ffff, 0.0), 0);
    let half = premultiplied_abgr(0xff00_ff00, 0.5);
    assert_eq!(half >> 24, 128);
    assert_eq!((half >> 8) & 0xff, 128);
}

#[test]
fn over_respects_source_alpha() {
    assert_eq!(premul_over_px([10, 20, 30, 255], [0, 0, 0, 0]), [10, 20, 30, 255]);
    assert_eq!(premul_over_px([10, 20, 30, 255], [1, 2, 3, 255]), [1, 2, 3, 255]);
    let mixed = premul_over_px([255, 255, 255, 255], [128, 0, 0, 128]);
    assert_eq!(mixed[3], 255);
    assert_eq!(mixed[0], 255);
    assert_eq!(mixed[1], 127);
}
