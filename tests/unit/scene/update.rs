use super::*;
use crate::foundation::ids::TextureId;

fn pass(frame: u64) -> PassContext {
    PassContext::new(frame, Rect::new(0.0, 0.0, 1000.0, 1000.0), [100.0; 4])
}

fn run(tree: &mut SceneTree, frame: u64) -> usize {
    let mut p = pass(frame);
    tree.update(&mut p);
    p.nodes_updated
}

fn sized(tree: &mut SceneTree, parent: NodeId, x: f64, y: f64, w: f64, h: f64) -> NodeId {
    let n = tree.create_node();
    tree.add_child(parent, n).unwrap();
    tree.node_mut(n)
        .unwrap()
        .set_position(x, y)
        .set_size(w, h)
        .unwrap();
    n
}

#[test]
fn world_positions_follow_parent_moves() {
    let mut tree = SceneTree::new();
    let root = tree.root();
    let a = sized(&mut tree, root, 10.0, 0.0, 0.0, 0.0);
    let b = sized(&mut tree, a, 5.0, 0.0, 20.0, 20.0);
    run(&mut tree, 1);
    assert_eq!(tree.get(b).unwrap().world().px, 15.0);

    tree.node_mut(a).unwrap().set_x(20.0);
    run(&mut tree, 2);
    assert_eq!(tree.get(b).unwrap().world().px, 25.0);
    assert!(!tree.has_pending_updates());
}

#[test]
fn only_dirty_branches_are_visited() {
    let mut tree = SceneTree::new();
    let root = tree.root();
    let p = sized(&mut tree, root, 0.0, 0.0, 10.0, 10.0);
    sized(&mut tree, p, 0.0, 0.0, 10.0, 10.0);
    let q = sized(&mut tree, root, 50.0, 0.0, 10.0, 10.0);
    assert_eq!(run(&mut tree, 1), 4);
    assert_eq!(run(&mut tree, 2), 0);

    tree.node_mut(q).unwrap().set_y(30.0);
    assert_eq!(run(&mut tree, 3), 2);
    assert_eq!(tree.get(q).unwrap().bbox(), Rect::new(50.0, 30.0, 60.0, 40.0));
}

#[test]
fn alpha_multiplies_down_and_zero_hides() {
    let mut tree = SceneTree::new();
    let root = tree.root();
    let a = sized(&mut tree, root, 0.0, 0.0, 10.0, 10.0);
    let b = sized(&mut tree, a, 0.0, 0.0, 10.0, 10.0);
    tree.node_mut(a).unwrap().set_alpha(0.5);
    tree.node_mut(b).unwrap().set_alpha(0.5);
    run(&mut tree, 1);
    assert_eq!(tree.get(b).unwrap().world().alpha, 0.25);
    assert!(tree.get(b).unwrap().is_active());

    tree.node_mut(a).unwrap().set_visible(false);
    run(&mut tree, 2);
    assert_eq!(tree.get(b).unwrap().world().alpha, 0.0);
    assert!(!tree.get(a).unwrap().is_active());
    assert!(!tree.get(b).unwrap().is_active());

    tree.node_mut(a).unwrap().set_visible(true);
    run(&mut tree, 3);
    assert_eq!(tree.get(b).unwrap().world().alpha, 0.25);
    assert!(tree.get(b).unwrap().is_active());
}

#[test]
fn culling_uses_the_margin() {
    let mut tree = SceneTree::new();
    let root = tree.root();
    let n = sized(&mut tree, root, 2000.0, 0.0, 10.0, 10.0);
    run(&mut tree, 1);
    assert_eq!(tree.get(n).unwrap().out_of_bounds(), OutOfBounds::Outside);
    assert!(!tree.get(n).unwrap().is_active());

    tree.node_mut(n).unwrap().set_x(1050.0);
    run(&mut tree, 2);
    assert_eq!(tree.get(n).unwrap().out_of_bounds(), OutOfBounds::WithinMargin);
    assert!(tree.get(n).unwrap().is_active());

    tree.node_mut(n).unwrap().set_x(500.0);
    run(&mut tree, 3);
    assert_eq!(tree.get(n).unwrap().out_of_bounds(), OutOfBounds::InBounds);
}

#[test]
fn culled_parents_deactivate_their_subtree() {
    let mut tree = SceneTree::new();
    let root = tree.root();
    let p = sized(&mut tree, root, 0.0, 0.0, 10.0, 10.0);
    let c = sized(&mut tree, p, 0.0, 0.0, 10.0, 10.0);
    run(&mut tree, 1);
    assert!(tree.get(c).unwrap().is_active());

    tree.node_mut(p).unwrap().set_y(-5000.0);
    run(&mut tree, 2);
    assert_eq!(tree.get(c).unwrap().out_of_bounds(), OutOfBounds::Outside);
    assert!(!tree.get(c).unwrap().is_active());

    tree.node_mut(p).unwrap().set_y(0.0);
    run(&mut tree, 3);
    assert_eq!(tree.get(c).unwrap().out_of_bounds(), OutOfBounds::InBounds);
    assert!(tree.get(c).unwrap().is_active());
}

#[test]
fn empty_containers_are_never_culled() {
    let mut tree = SceneTree::new();
    let root = tree.root();
    let holder = sized(&mut tree, root, 5000.0, 0.0, 0.0, 0.0);
    let inner = sized(&mut tree, holder, -4900.0, 0.0, 10.0, 10.0);
    let far = sized(&mut tree, holder, 0.0, 0.0, 10.0, 10.0);
    run(&mut tree, 1);
    assert_eq!(tree.get(holder).unwrap().out_of_bounds(), OutOfBounds::InBounds);
    assert_eq!(tree.get(inner).unwrap().out_of_bounds(), OutOfBounds::InBounds);
    assert_eq!(tree.get(far).unwrap().out_of_bounds(), OutOfBounds::Outside);
}

#[test]
fn estimated_size_counts_toward_bounds() {
    let mut tree = SceneTree::new();
    let root = tree.root();
    let n = tree.create_node();
    tree.add_child(root, n).unwrap();
    tree.node_mut(n)
        .unwrap()
        .set_position(-150.0, 0.0)
        .set_texture(Some(TextureId::default()))
        .set_estimated_size(100.0, 100.0)
        .unwrap();
    run(&mut tree, 1);
    assert_eq!(tree.get(n).unwrap().out_of_bounds(), OutOfBounds::WithinMargin);
}

#[test]
fn clipping_narrows_the_childrens_scissor() {
    let mut tree = SceneTree::new();
    let root = tree.root();
    let p = sized(&mut tree, root, 10.0, 10.0, 50.0, 50.0);
    let c = sized(&mut tree, p, 0.0, 0.0, 100.0, 100.0);
    tree.node_mut(p).unwrap().set_clipping(true);
    run(&mut tree, 1);
    assert_eq!(tree.get(p).unwrap().scissor(), None);
    assert_eq!(
        tree.get(c).unwrap().scissor(),
        Some(Rect::new(10.0, 10.0, 60.0, 60.0))
    );

    tree.node_mut(p).unwrap().set_clipping(false);
    run(&mut tree, 2);
    assert_eq!(tree.get(c).unwrap().scissor(), None);
}

#[test]
fn children_outside_the_clip_are_culled() {
    let mut tree = SceneTree::new();
    let root = tree.root();
    let p = sized(&mut tree, root, 0.0, 0.0, 50.0, 50.0);
    tree.node_mut(p)
        .unwrap()
        .set_clipping(true)
        .set_bounds_margin(Some([0.0; 4]));
    let c = sized(&mut tree, p, 100.0, 0.0, 10.0, 10.0);
    run(&mut tree, 1);
    assert_eq!(tree.get(c).unwrap().out_of_bounds(), OutOfBounds::Outside);
}

#[test]
fn texturized_children_render_relative_to_the_target() {
    let mut tree = SceneTree::new();
    let root = tree.root();
    let t = sized(&mut tree, root, 100.0, 50.0, 40.0, 40.0);
    tree.node_mut(t).unwrap().enable_texturizer(false);
    let k = sized(&mut tree, t, 5.0, 6.0, 10.0, 10.0);
    run(&mut tree, 1);

    assert!(tree.get(t).unwrap().renders_to_texture());
    let kr = tree.get(k).unwrap();
    assert_eq!((kr.world().px, kr.world().py), (105.0, 56.0));
    assert_eq!(
        (kr.render_context().px, kr.render_context().py),
        (5.0, 6.0)
    );
    assert_eq!(kr.out_of_bounds(), OutOfBounds::InBounds);
}

#[test]
fn viewport_change_recomputes_bounds() {
    let mut tree = SceneTree::new();
    let root = tree.root();
    let n = sized(&mut tree, root, 1500.0, 0.0, 10.0, 10.0);
    run(&mut tree, 1);
    assert_eq!(tree.get(n).unwrap().out_of_bounds(), OutOfBounds::Outside);

    let mut p = PassContext::new(2, Rect::new(0.0, 0.0, 2000.0, 1000.0), [100.0; 4]);
    tree.update(&mut p);
    assert_eq!(tree.get(n).unwrap().out_of_bounds(), OutOfBounds::InBounds);
}
