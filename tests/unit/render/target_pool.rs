use super::*;
use crate::render::recording::RecordingBackend;

fn pool(max_pool_texels: u64, per_bucket: usize, idle_frames: u64) -> RenderTargetPool {
    RenderTargetPool::new(RenderTargetPoolOpts {
        max_pool_texels,
        max_targets_per_bucket: per_bucket,
        idle_frames,
    })
}

#[test]
fn released_targets_are_reused_most_recent_first() {
    let mut be = RecordingBackend::new();
    let mut p = pool(1_000_000, 4, 60);
    let a = p.borrow(32, 16, 1, &mut be).unwrap();
    let b = p.borrow(32, 16, 1, &mut be).unwrap();
    p.release(a, 1, &mut be);
    p.release(b, 2, &mut be);

    let again = p.borrow(32, 16, 3, &mut be).unwrap();
    assert_eq!(again.handle, b.handle);
    assert_eq!(again.last_used_frame, 3);

    let s = p.stats();
    assert_eq!(s.alloc_targets, 2);
    assert_eq!(s.reused_targets, 1);
    assert_eq!(s.retained_targets, 1);
    assert_eq!(s.live_texels, 2 * 32 * 16);
}

#[test]
fn sizes_do_not_share_buckets() {
    let mut be = RecordingBackend::new();
    let mut p = pool(1_000_000, 4, 60);
    let a = p.borrow(32, 16, 1, &mut be).unwrap();
    p.release(a, 1, &mut be);
    let b = p.borrow(16, 32, 1, &mut be).unwrap();
    assert_ne!(a.handle, b.handle);
    assert_eq!(be.live_targets(), 2);
}

#[test]
fn full_buckets_destroy_on_release() {
    let mut be = RecordingBackend::new();
    let mut p = pool(1_000_000, 1, 60);
    let a = p.borrow(8, 8, 1, &mut be).unwrap();
    let b = p.borrow(8, 8, 1, &mut be).unwrap();
    p.release(a, 1, &mut be);
    p.release(b, 1, &mut be);

    assert_eq!(p.stats().freed_targets, 1);
    assert_eq!(p.stats().retained_targets, 1);
    assert!(!be.is_live(b.handle));
    assert!(be.is_live(a.handle));
}

#[test]
fn zero_bucket_capacity_never_retains() {
    let mut be = RecordingBackend::new();
    let mut p = pool(1_000_000, 0, 60);
    let a = p.borrow(8, 8, 1, &mut be).unwrap();
    p.release(a, 1, &mut be);
    assert_eq!(be.live_targets(), 0);
    assert_eq!(p.stats().live_texels, 0);
}

#[test]
fn idle_targets_age_out() {
    let mut be = RecordingBackend::new();
    let mut p = pool(1_000_000, 4, 2);
    let a = p.borrow(8, 8, 1, &mut be).unwrap();
    p.release(a, 1, &mut be);

    assert_eq!(p.age_out(3, &mut be), 0);
    assert_eq!(p.age_out(4, &mut be), 1);
    assert_eq!(be.live_targets(), 0);
    assert_eq!(p.stats().retained_texels, 0);
}

#[test]
fn allocation_evicts_retained_targets_to_fit() {
    let mut be = RecordingBackend::new();
    let mut p = pool(200, 4, 60);
    let a = p.borrow(10, 10, 1, &mut be).unwrap();
    p.release(a, 1, &mut be);

    let b = p.borrow(15, 10, 2, &mut be).unwrap();
    assert!(!be.is_live(a.handle));
    assert!(be.is_live(b.handle));
    let s = p.stats();
    assert_eq!(s.live_texels, 150);
    assert_eq!(s.over_budget_allocs, 0);
}

#[test]
fn borrowed_targets_are_never_evicted() {
    let mut be = RecordingBackend::new();
    let mut p = pool(200, 4, 60);
    let a = p.borrow(10, 10, 1, &mut be).unwrap();
    let b = p.borrow(15, 10, 1, &mut be).unwrap();
    assert!(be.is_live(a.handle) && be.is_live(b.handle));
    assert_eq!(p.stats().over_budget_allocs, 1);
    assert_eq!(p.stats().live_texels, 250);
}

#[test]
fn clear_destroys_only_retained_targets() {
    let mut be = RecordingBackend::new();
    let mut p = pool(1_000_000, 4, 60);
    let kept = p.borrow(8, 8, 1, &mut be).unwrap();
    let idle = p.borrow(4, 4, 1, &mut be).unwrap();
    p.release(idle, 1, &mut be);

    p.clear(&mut be);
    assert!(be.is_live(kept.handle));
    assert!(!be.is_live(idle.handle));
    assert_eq!(p.stats().live_texels, 64);
}
