use super::*;
use crate::render::recording::RecordingBackend;
use crate::texture::source::{CancelFn, StaticLoader};
use std::cell::{Cell, RefCell};

/// Loader that parks tickets until the test resolves them.
#[derive(Default)]
struct Deferred {
    tickets: RefCell<Vec<LoadTicket>>,
    started: Cell<usize>,
    cancelled: Rc<Cell<usize>>,
}

impl Deferred {
    fn resolve_next(&self, result: Result<TextureSourceData, LoadError>) {
        let ticket = self.tickets.borrow_mut().remove(0);
        ticket.resolve(result);
    }
}

impl SourceLoader for Deferred {
    fn load(&self, ticket: LoadTicket) -> Option<CancelFn> {
        self.started.set(self.started.get() + 1);
        self.tickets.borrow_mut().push(ticket);
        let cancelled = Rc::clone(&self.cancelled);
        Some(Box::new(move || cancelled.set(cancelled.get() + 1)))
    }
}

fn nodes(n: usize) -> Vec<NodeId> {
    let mut map: SlotMap<NodeId, ()> = SlotMap::with_key();
    (0..n).map(|_| map.insert(())).collect()
}

fn solid(w: u32, h: u32) -> TextureSourceData {
    TextureSourceData::solid(w, h, [255, 0, 0, 255]).unwrap()
}

fn static_texture(m: &mut TextureManager, key: &str, w: u32, h: u32) -> TextureId {
    let src = m.get_or_create(Rc::new(StaticLoader(solid(w, h))), Some(key));
    m.create_texture(src).unwrap()
}

#[test]
fn lookup_keys_deduplicate_resources() {
    let mut m = TextureManager::new(1_000);
    let loader = Rc::new(Deferred::default());
    let a = m.get_or_create(loader.clone(), Some("img:a"));
    let b = m.get_or_create(loader.clone(), Some("img:a"));
    let c = m.get_or_create(loader.clone(), None);
    let d = m.get_or_create(loader.clone(), None);
    assert_eq!(a, b);
    assert_ne!(c, d);
    assert_eq!(m.resource(a).unwrap().key(), Some("img:a"));
    assert_eq!(loader.started.get(), 0);
}

#[test]
fn first_consumer_starts_one_shared_load() {
    let mut be = RecordingBackend::new();
    let mut m = TextureManager::new(1_000);
    let loader = Rc::new(Deferred::default());
    let src = m.get_or_create(loader.clone(), Some("shared"));
    let t1 = m.create_texture(src).unwrap();
    let t2 = m.create_texture(src).unwrap();
    let n = nodes(2);

    assert_eq!(m.add_consumer(t1, n[0], &mut be), DemandOutcome::Pending);
    assert_eq!(m.add_consumer(t2, n[1], &mut be), DemandOutcome::Pending);
    assert_eq!(loader.started.get(), 1);
    assert!(m.resource(src).unwrap().loading_since().is_some());

    loader.resolve_next(Ok(solid(2, 2)));
    let outcomes = m.drain_loads(&mut be);
    assert_eq!(
        outcomes,
        vec![LoadOutcome {
            source: src,
            result: Ok(())
        }]
    );
    assert!(m.is_ready(t1) && m.is_ready(t2));
    assert_eq!(m.used_texels(), 4);
    assert_eq!(be.live_textures(), 1);
    assert_eq!(m.resource(src).unwrap().consumer_count(), 2);
    assert_eq!(m.natural_size(t1), Some((2.0, 2.0)));
}

#[test]
fn last_consumer_leaving_cancels_the_load() {
    let mut be = RecordingBackend::new();
    let mut m = TextureManager::new(1_000);
    let loader = Rc::new(Deferred::default());
    let src = m.get_or_create(loader.clone(), None);
    let t = m.create_texture(src).unwrap();
    let n = nodes(2);

    m.add_consumer(t, n[0], &mut be);
    m.add_consumer(t, n[1], &mut be);
    m.remove_consumer(t, n[0]);
    assert_eq!(loader.cancelled.get(), 0);
    m.remove_consumer(t, n[1]);
    assert_eq!(loader.cancelled.get(), 1);
    assert_eq!(m.stats().loads_cancelled, 1);
    assert!(matches!(m.resource(src).unwrap().state(), LoadState::Idle));

    loader.resolve_next(Ok(solid(1, 1)));
    assert!(m.drain_loads(&mut be).is_empty());
    assert!(!m.resource(src).unwrap().is_uploaded());
}

#[test]
fn superseded_loads_are_ignored() {
    let mut be = RecordingBackend::new();
    let mut m = TextureManager::new(1_000);
    let loader = Rc::new(Deferred::default());
    let src = m.get_or_create(loader.clone(), None);
    let t = m.create_texture(src).unwrap();
    let n = nodes(1);

    m.add_consumer(t, n[0], &mut be);
    m.reload(src).unwrap();
    assert_eq!(loader.started.get(), 2);
    assert_eq!(loader.cancelled.get(), 1);

    loader.resolve_next(Ok(solid(8, 8)));
    loader.resolve_next(Ok(solid(2, 1)));
    let outcomes = m.drain_loads(&mut be);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(m.natural_size(t), Some((2.0, 1.0)));
}

#[test]
fn failures_are_cached_until_reload() {
    let mut be = RecordingBackend::new();
    let mut m = TextureManager::new(1_000);
    let loader = Rc::new(Deferred::default());
    let src = m.get_or_create(loader.clone(), None);
    let t = m.create_texture(src).unwrap();
    let n = nodes(2);

    m.add_consumer(t, n[0], &mut be);
    loader.resolve_next(Err(LoadError::new("404")));
    let outcomes = m.drain_loads(&mut be);
    assert_eq!(outcomes[0].result, Err(LoadError::new("404")));
    assert_eq!(
        m.resource(src).unwrap().error().map(LoadError::message),
        Some("404")
    );

    assert_eq!(
        m.add_consumer(t, n[1], &mut be),
        DemandOutcome::Failed(LoadError::new("404"))
    );
    assert_eq!(loader.started.get(), 1);

    m.reload(src).unwrap();
    assert_eq!(loader.started.get(), 2);
    loader.resolve_next(Ok(solid(1, 1)));
    m.drain_loads(&mut be);
    assert!(m.is_ready(t));
}

#[test]
fn unused_textures_are_evicted_and_reload_on_demand() {
    let mut be = RecordingBackend::new();
    let mut m = TextureManager::new(1_000);
    let t = static_texture(&mut m, "a", 2, 2);
    let n = nodes(1);

    m.add_consumer(t, n[0], &mut be);
    m.drain_loads(&mut be);
    assert!(m.is_ready(t));

    m.remove_consumer(t, n[0]);
    assert!(m.is_ready(t));
    assert_eq!(m.free_unused(&mut be), 4);
    assert!(!m.is_ready(t));
    assert_eq!(be.live_textures(), 0);
    assert_eq!(m.stats().evicted_resources, 1);

    m.add_consumer(t, n[0], &mut be);
    m.drain_loads(&mut be);
    assert!(m.is_ready(t));
    assert_eq!(m.stats().loads_started, 2);
}

#[test]
fn full_budget_sweeps_before_upload() {
    let mut be = RecordingBackend::new();
    let mut m = TextureManager::new(10);
    let a = static_texture(&mut m, "a", 3, 3);
    let b = static_texture(&mut m, "b", 2, 2);
    let n = nodes(1);

    m.add_consumer(a, n[0], &mut be);
    m.drain_loads(&mut be);
    m.remove_consumer(a, n[0]);
    assert_eq!(m.used_texels(), 9);

    m.add_consumer(b, n[0], &mut be);
    m.drain_loads(&mut be);
    assert!(m.is_ready(b));
    assert!(!m.is_ready(a));
    assert_eq!(m.used_texels(), 4);
    assert_eq!(m.stats().over_budget_uploads, 0);
}

#[test]
fn demanded_textures_upload_over_budget() {
    let mut be = RecordingBackend::new();
    let mut m = TextureManager::new(10);
    let a = static_texture(&mut m, "a", 3, 3);
    let b = static_texture(&mut m, "b", 2, 2);
    let n = nodes(2);

    m.add_consumer(a, n[0], &mut be);
    m.add_consumer(b, n[1], &mut be);
    m.drain_loads(&mut be);
    assert!(m.is_ready(a) && m.is_ready(b));
    assert_eq!(m.stats().over_budget_uploads, 1);
    assert!(m.is_full());
}

#[test]
fn backend_capacity_errors_sweep_and_retry() {
    let mut be = RecordingBackend::new().with_texture_limit(Some(10));
    let mut m = TextureManager::new(1_000);
    let a = static_texture(&mut m, "a", 3, 3);
    let b = static_texture(&mut m, "b", 2, 2);
    let n = nodes(1);

    m.add_consumer(a, n[0], &mut be);
    m.drain_loads(&mut be);
    m.remove_consumer(a, n[0]);

    m.add_consumer(b, n[0], &mut be);
    m.drain_loads(&mut be);
    assert!(m.is_ready(b));
    assert!(!m.is_ready(a));
    assert_eq!(be.texture_texels(), 4);
}

#[test]
fn permanent_resources_survive_sweeps() {
    let mut be = RecordingBackend::new();
    let mut m = TextureManager::new(1_000);
    let src = m.get_or_create(Rc::new(StaticLoader(solid(1, 1))), Some("white"));
    let t = m.create_texture(src).unwrap();
    m.set_permanent(src, true);
    m.preload(src);
    m.drain_loads(&mut be);

    assert!(m.is_ready(t));
    assert_eq!(m.free_unused(&mut be), 0);
    assert!(m.resource(src).unwrap().is_permanent());
}

#[test]
fn regions_crop_coordinates_and_size() {
    let mut be = RecordingBackend::new();
    let mut m = TextureManager::new(1_000);
    let t = static_texture(&mut m, "atlas", 8, 4);
    assert!(m.set_region(t, Some(Rect::new(2.0, 2.0, 2.0, 4.0))).is_err());
    assert!(m.set_region(t, Some(Rect::new(-1.0, 0.0, 2.0, 4.0))).is_err());
    m.set_region(t, Some(Rect::new(4.0, 0.0, 8.0, 2.0))).unwrap();

    m.add_consumer(t, nodes(1)[0], &mut be);
    m.drain_loads(&mut be);
    assert_eq!(m.natural_size(t), Some((4.0, 2.0)));
    assert_eq!(m.drawable(t).unwrap().coords, [0.5, 0.0, 1.0, 0.5]);
}

#[test]
fn render_results_borrow_their_handle() {
    let mut be = RecordingBackend::new();
    let mut m = TextureManager::new(1_000);
    let n = nodes(2);
    let src = m.create_render_result(n[0]);
    let t = m.create_texture(src).unwrap();

    assert_eq!(m.add_consumer(t, n[1], &mut be), DemandOutcome::Pending);
    assert!(m.set_render_result(src, Some(GpuHandle(7)), (8, 4)));
    assert!(!m.set_render_result(src, Some(GpuHandle(7)), (8, 4)));
    assert_eq!(m.drawable(t).unwrap().handle, GpuHandle(7));
    assert_eq!(m.used_texels(), 0);

    m.remove_consumer(t, n[1]);
    assert_eq!(m.free_unused(&mut be), 0);
    assert!(m.is_ready(t));

    m.release_render_result(src);
    assert!(!m.is_ready(t));
    assert!(!m.resource(src).unwrap().is_render_result());
}

#[test]
fn unknown_ids_are_rejected() {
    let mut m = TextureManager::new(1_000);
    let src = m.get_or_create(Rc::new(Deferred::default()), None);
    let t = m.create_texture(src).unwrap();
    assert!(m.create_texture(SourceId::default()).is_err());
    assert!(m.set_region(TextureId::default(), None).is_err());
    assert!(m.reload(SourceId::default()).is_err());
    assert_eq!(m.textures_of(src), vec![t]);
}
