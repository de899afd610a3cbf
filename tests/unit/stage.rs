use super::*;
use crate::render::recording::RecordingBackend;
use crate::texture::source::{CancelFn, LoadTicket};
use std::cell::Cell;

fn stage() -> Stage<RecordingBackend> {
    let opts = StageOpts {
        width: 200,
        height: 100,
        ..StageOpts::default()
    };
    Stage::new(opts, RecordingBackend::new()).unwrap()
}

fn rect(stage: &mut Stage<RecordingBackend>, x: f64, y: f64, w: f64, h: f64) -> NodeId {
    let root = stage.root();
    let tree = stage.tree_mut();
    let n = tree.create_node();
    tree.add_child(root, n).unwrap();
    tree.node_mut(n)
        .unwrap()
        .set_position(x, y)
        .set_rect(true)
        .set_size(w, h)
        .unwrap();
    n
}

#[test]
fn new_stage_uploads_the_white_texture() {
    let s = stage();
    assert_eq!(s.backend().live_textures(), 1);
    assert_eq!(s.texture_stats().uploads, 1);
    assert!(s.tree().white_texture.is_some());
}

#[test]
fn invalid_options_are_rejected() {
    let opts = StageOpts {
        width: 0,
        ..StageOpts::default()
    };
    assert!(Stage::new(opts, RecordingBackend::new()).is_err());
}

#[test]
fn rects_draw_on_their_first_frame() {
    let mut s = stage();
    let n = rect(&mut s, 10.0, 10.0, 50.0, 20.0);
    let stats = s.frame(1.0 / 60.0).unwrap();
    assert_eq!(stats.frame, 1);
    assert_eq!(stats.quads, 1);
    assert_eq!(stats.draw_calls, 1);
    assert!(s.drain_events().contains(&StageEvent::NodeActivated(n)));
    assert!(s.drain_events().is_empty());

    let quiet = s.frame(1.0 / 60.0).unwrap();
    assert_eq!(quiet.nodes_updated, 0);
    assert_eq!(quiet.quads, 1);
}

#[test]
fn loaded_textures_display_on_the_next_frame() {
    let mut s = stage();
    let tex = s
        .texture_from_data(TextureSourceData::solid(4, 3, [0, 0, 255, 255]).unwrap(), None)
        .unwrap();
    let root = s.root();
    let n = s.tree_mut().create_node();
    s.tree_mut().add_child(root, n).unwrap();
    s.node_mut(n).unwrap().set_texture(Some(tex));

    assert_eq!(s.frame(0.0).unwrap().quads, 0);
    let stats = s.frame(0.0).unwrap();
    assert_eq!(stats.quads, 1);
    assert_eq!(stats.textures_uploaded, 1);
    assert!(s.drain_events().contains(&StageEvent::TextureLoaded(tex)));
    let node = s.tree().get(n).unwrap();
    assert_eq!((node.width(), node.height()), (4.0, 3.0));
    assert_eq!(node.displayed_texture(), Some(tex));
}

#[test]
fn failed_loads_report_and_reload() {
    let mut s = stage();
    let attempts = Rc::new(Cell::new(0));
    let counter = Rc::clone(&attempts);
    let loader = move |t: LoadTicket| -> Option<CancelFn> {
        counter.set(counter.get() + 1);
        if counter.get() == 1 {
            t.resolve(Err(LoadError::new("offline")));
        } else {
            t.resolve(Ok(TextureSourceData::solid(2, 2, [255; 4]).unwrap()));
        }
        None
    };
    let tex = s.create_texture(Rc::new(loader), Some("flaky")).unwrap();
    let root = s.root();
    let n = s.tree_mut().create_node();
    s.tree_mut().add_child(root, n).unwrap();
    s.node_mut(n)
        .unwrap()
        .set_texture(Some(tex))
        .set_size(10.0, 10.0)
        .unwrap();

    s.frame(0.0).unwrap();
    s.frame(0.0).unwrap();
    assert!(
        s.drain_events()
            .contains(&StageEvent::TextureFailed(tex, LoadError::new("offline")))
    );
    assert_eq!(s.tree().get(n).unwrap().displayed_texture(), None);

    s.reload(tex).unwrap();
    assert_eq!(attempts.get(), 2);
    let stats = s.frame(0.0).unwrap();
    assert_eq!(stats.quads, 1);
    assert!(s.drain_events().contains(&StageEvent::TextureLoaded(tex)));
}

#[test]
fn transitions_advance_with_frames() {
    let mut s = stage();
    let n = rect(&mut s, 0.0, 0.0, 10.0, 10.0);
    s.transition(n, NodeProperty::X, 100.0, TransitionSettings::new(1.0))
        .unwrap();
    s.frame(0.5).unwrap();
    assert_eq!(s.tree().get(n).unwrap().world().px, 50.0);
    s.frame(0.5).unwrap();
    assert_eq!(s.tree().get(n).unwrap().world().px, 100.0);
    assert!(s.transitions_mut().is_empty());
}

#[test]
fn destroying_a_texturizer_returns_its_target() {
    let mut s = stage();
    let t = rect(&mut s, 0.0, 0.0, 40.0, 40.0);
    s.node_mut(t).unwrap().enable_texturizer(false);
    let child = s.tree_mut().create_node();
    s.tree_mut().add_child(t, child).unwrap();
    s.node_mut(child)
        .unwrap()
        .set_rect(true)
        .set_size(10.0, 10.0)
        .unwrap();

    let stats = s.frame(0.0).unwrap();
    assert_eq!(stats.targets_allocated, 1);
    assert_eq!(stats.offscreen_rebuilds, 1);

    s.tree_mut().destroy(t).unwrap();
    s.frame(0.0).unwrap();
    assert_eq!(s.pool_stats().retained_targets, 1);
    assert_eq!(s.backend().live_targets(), 1);
}

#[test]
fn texturizer_texture_requires_a_texturizer() {
    let mut s = stage();
    let n = rect(&mut s, 0.0, 0.0, 10.0, 10.0);
    let err = s.texturizer_texture(n).unwrap_err();
    assert!(matches!(err, StageError::Validation(_)));

    s.node_mut(n).unwrap().enable_texturizer(false);
    let a = s.texturizer_texture(n).unwrap();
    assert_eq!(s.texturizer_texture(n).unwrap(), a);
}

#[test]
fn texture_regions_resize_displaying_nodes() {
    let mut s = stage();
    let tex = s
        .texture_from_data(TextureSourceData::solid(8, 8, [255; 4]).unwrap(), Some("atlas"))
        .unwrap();
    let root = s.root();
    let n = s.tree_mut().create_node();
    s.tree_mut().add_child(root, n).unwrap();
    s.node_mut(n).unwrap().set_texture(Some(tex));
    s.frame(0.0).unwrap();
    s.frame(0.0).unwrap();
    assert_eq!(s.tree().get(n).unwrap().width(), 8.0);

    s.set_texture_region(tex, Some(Rect::new(0.0, 0.0, 4.0, 2.0)))
        .unwrap();
    s.frame(0.0).unwrap();
    let node = s.tree().get(n).unwrap();
    assert_eq!((node.width(), node.height()), (4.0, 2.0));
}

#[test]
fn free_unused_textures_keeps_displayed_ones() {
    let mut s = stage();
    let tex = s
        .texture_from_data(TextureSourceData::solid(2, 2, [255; 4]).unwrap(), None)
        .unwrap();
    let root = s.root();
    let n = s.tree_mut().create_node();
    s.tree_mut().add_child(root, n).unwrap();
    s.node_mut(n).unwrap().set_texture(Some(tex));
    s.frame(0.0).unwrap();
    s.frame(0.0).unwrap();

    assert_eq!(s.free_unused_textures(), 0);
    s.tree_mut().destroy(n).unwrap();
    s.frame(0.0).unwrap();
    assert_eq!(s.free_unused_textures(), 4);
}
