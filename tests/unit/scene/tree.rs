use super::*;

fn chain(tree: &mut SceneTree) -> (NodeId, NodeId) {
    let a = tree.create_node();
    let b = tree.create_node();
    tree.add_child(tree.root(), a).unwrap();
    tree.add_child(a, b).unwrap();
    (a, b)
}

#[test]
fn cycles_and_root_moves_are_rejected() {
    let mut tree = SceneTree::new();
    let (a, b) = chain(&mut tree);

    let err = tree.add_child(b, a).unwrap_err();
    assert!(matches!(err, StageError::InvalidTreeOperation(_)));
    assert!(tree.add_child(a, a).is_err());
    assert!(tree.add_child(a, tree.root()).is_err());
    assert!(tree.detach(tree.root()).is_err());
    assert_eq!(tree.get(b).unwrap().parent(), Some(a));
}

#[test]
fn insert_child_clamps_index_and_reparents() {
    let mut tree = SceneTree::new();
    let root = tree.root();
    let (a, b) = chain(&mut tree);
    let c = tree.create_node();
    tree.insert_child(root, c, 0).unwrap();
    assert_eq!(tree.get(root).unwrap().children(), &[c, a]);

    tree.insert_child(root, b, 99).unwrap();
    assert_eq!(tree.get(root).unwrap().children(), &[c, a, b]);
    assert!(tree.get(a).unwrap().children().is_empty());

    tree.set_child_index(b, 0).unwrap();
    assert_eq!(tree.get(root).unwrap().children(), &[b, c, a]);
}

#[test]
fn mutation_flags_the_path_to_the_root() {
    let mut tree = SceneTree::new();
    let (a, b) = chain(&mut tree);
    for id in [tree.root(), a, b] {
        tree.nodes[id].has_updates = false;
    }

    tree.node_mut(b).unwrap().set_x(5.0);
    assert!(tree.get(b).unwrap().has_updates());
    assert!(tree.get(a).unwrap().has_updates());
    assert!(tree.has_pending_updates());
    assert_ne!(tree.nodes[b].recalc & recalc::TRANSLATE, 0);
}

#[test]
fn unchanged_values_do_not_dirty() {
    let mut tree = SceneTree::new();
    let (a, _) = chain(&mut tree);
    tree.nodes[a].has_updates = false;
    tree.nodes[a].recalc = 0;
    tree.node_mut(a).unwrap().set_x(0.0).set_alpha(1.0).set_visible(true);
    assert!(!tree.nodes[a].has_updates);
    assert_eq!(tree.nodes[a].recalc, 0);
}

#[test]
fn invalid_dimensions_are_rejected() {
    let mut tree = SceneTree::new();
    let n = tree.create_node();
    let mut m = tree.node_mut(n).unwrap();
    assert!(m.set_size(-1.0, 2.0).is_err());
    assert!(m.set_width(f64::NAN).is_err());
    assert!(m.set_estimated_size(1.0, -3.0).is_err());
    m.set_size(4.0, 2.0).unwrap();
    assert_eq!(tree.get(n).unwrap().width(), 4.0);
}

#[test]
fn alpha_is_clamped() {
    let mut tree = SceneTree::new();
    let n = tree.create_node();
    tree.node_mut(n).unwrap().set_alpha(3.0);
    assert_eq!(tree.get(n).unwrap().alpha(), 1.0);
    tree.node_mut(n).unwrap().set_alpha(-1.0);
    assert_eq!(tree.get(n).unwrap().alpha(), 0.0);
}

#[test]
fn properties_round_trip_through_setters() {
    let mut tree = SceneTree::new();
    let n = tree.create_node();
    let props = [
        (NodeProperty::X, 3.0),
        (NodeProperty::Y, -2.0),
        (NodeProperty::ScaleX, 2.0),
        (NodeProperty::ScaleY, 0.5),
        (NodeProperty::Rotation, 0.25),
        (NodeProperty::Alpha, 0.75),
        (NodeProperty::Width, 10.0),
        (NodeProperty::Height, 12.0),
        (NodeProperty::PivotX, 0.0),
        (NodeProperty::MountY, 1.0),
    ];
    for (p, v) in props {
        tree.node_mut(n).unwrap().set_property(p, v).unwrap();
    }
    for (p, v) in props {
        assert_eq!(tree.property(n, p), Some(v), "{p:?}");
    }
}

#[test]
fn destroy_removes_subtree_and_reports_it() {
    let mut tree = SceneTree::new();
    let (a, b) = chain(&mut tree);
    tree.signals.clear();

    tree.destroy(a).unwrap();
    assert!(!tree.contains(a));
    assert!(!tree.contains(b));
    assert!(tree.get(tree.root()).unwrap().children().is_empty());

    let destroyed: Vec<NodeId> = tree
        .signals
        .iter()
        .filter_map(|s| match s {
            TreeSignal::Destroyed { node, .. } => Some(*node),
            _ => None,
        })
        .collect();
    assert_eq!(destroyed.len(), 2);
    assert!(destroyed.contains(&a) && destroyed.contains(&b));

    let err = tree.node_mut(a).err().unwrap();
    assert!(err.to_string().contains("stale node id"));
}

#[test]
fn texture_demand_follows_activity() {
    let mut tree = SceneTree::new();
    let (a, _) = chain(&mut tree);
    let tex = TextureId::default();
    tree.signals.clear();

    tree.node_mut(a).unwrap().set_texture(Some(tex));
    assert!(tree.signals.is_empty());

    tree.set_active(a, true);
    assert_eq!(
        tree.signals,
        vec![
            TreeSignal::Activated(a),
            TreeSignal::Demand {
                node: a,
                texture: tex,
                active: true
            }
        ]
    );
    tree.signals.clear();

    tree.set_active(a, false);
    assert_eq!(
        tree.signals,
        vec![
            TreeSignal::Deactivated(a),
            TreeSignal::Demand {
                node: a,
                texture: tex,
                active: false
            }
        ]
    );
}

#[test]
fn detached_subtrees_are_hidden() {
    let mut tree = SceneTree::new();
    let (a, b) = chain(&mut tree);
    tree.nodes[b].world.alpha = 1.0;
    tree.nodes[b].active = true;

    tree.detach(a).unwrap();
    assert!(!tree.is_attached(b));
    assert_eq!(tree.get(b).unwrap().world().alpha, 0.0);
    assert!(!tree.get(b).unwrap().is_active());
    assert!(tree.signals.contains(&TreeSignal::Deactivated(b)));
}
