use super::*;

const EPS: f64 = 1e-6;

fn assert_affine_close(a: Affine, b: Affine) {
    let (ca, cb) = (a.as_coeffs(), b.as_coeffs());
    for i in 0..6 {
        assert!(
            (ca[i] - cb[i]).abs() < EPS,
            "coeff {i}: {} vs {}",
            ca[i],
            cb[i]
        );
    }
}

#[test]
fn compose_matches_matrix_product() {
    let parent = LocalTransform {
        x: 40.0,
        y: -12.0,
        scale_x: 1.5,
        scale_y: 0.75,
        rotation: 0.6,
        ..LocalTransform::default()
    }
    .to_context(120.0, 80.0, 0.8);
    let local = LocalTransform {
        x: 7.0,
        y: 3.5,
        scale_x: 2.0,
        scale_y: 2.0,
        rotation: -1.1,
        pivot_x: 0.25,
        pivot_y: 0.0,
        mount_x: 0.5,
        mount_y: 1.0,
    }
    .to_context(30.0, 10.0, 0.5);

    let world = parent.compose(&local);
    assert_affine_close(world.to_affine(), parent.to_affine() * local.to_affine());
    assert!((world.alpha - 0.4).abs() < EPS);
}

#[test]
fn square_fast_path_matches_general_product() {
    let parent = LocalTransform {
        x: 5.0,
        y: 6.0,
        scale_x: 3.0,
        scale_y: 0.5,
        ..LocalTransform::default()
    }
    .to_context(10.0, 10.0, 1.0);
    let local = LocalTransform {
        x: 1.0,
        y: 2.0,
        ..LocalTransform::default()
    }
    .to_context(4.0, 4.0, 1.0);
    assert!(parent.is_square() && local.is_square());

    let world = parent.compose(&local);
    assert!(world.is_square());
    assert_affine_close(world.to_affine(), parent.to_affine() * local.to_affine());
}

#[test]
fn pivot_rotation_keeps_pivot_fixed() {
    let t = LocalTransform {
        x: 100.0,
        y: 50.0,
        rotation: std::f64::consts::FRAC_PI_2,
        ..LocalTransform::default()
    };
    let ctx = t.to_context(20.0, 10.0, 1.0);
    let centre = ctx.apply(10.0, 5.0);
    assert!((centre.x - 110.0).abs() < EPS);
    assert!((centre.y - 55.0).abs() < EPS);
}

#[test]
fn mount_shifts_by_own_size() {
    let t = LocalTransform {
        x: 100.0,
        y: 100.0,
        mount_x: 1.0,
        mount_y: 0.5,
        ..LocalTransform::default()
    };
    let ctx = t.to_context(40.0, 20.0, 1.0);
    assert_eq!((ctx.px, ctx.py), (60.0, 90.0));
}

#[test]
fn bbox_covers_rotated_corners() {
    let ctx = LocalTransform {
        rotation: std::f64::consts::FRAC_PI_4,
        pivot_x: 0.0,
        pivot_y: 0.0,
        ..LocalTransform::default()
    }
    .to_context(10.0, 10.0, 1.0);
    let bb = ctx.bbox(10.0, 10.0);
    let d = 10.0 * std::f64::consts::SQRT_2;
    assert!((bb.width() - d).abs() < EPS);
    assert!((bb.height() - d).abs() < EPS);
    assert!(!ctx.is_square());
}

#[test]
fn identity_checks() {
    assert!(AffineContext::IDENTITY.is_identity());
    let mut c = AffineContext::IDENTITY;
    c.alpha = 0.5;
    assert!(!c.is_identity());
    assert!(c.is_square());
}
