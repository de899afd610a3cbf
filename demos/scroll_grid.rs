//! Scrolls a grid of lazily texturized rows on the CPU backend and logs per-frame stats.

use stagelight::{CpuBackend, Stage, StageOpts, TextureSourceData};

const TILE: f64 = 40.0;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let opts = StageOpts {
        width: 480,
        height: 320,
        clear_rgba: Some([16, 16, 20, 255]),
        ..StageOpts::default()
    };
    let backend = CpuBackend::new(opts.width, opts.height)?;
    let mut stage = Stage::new(opts, backend)?;

    let dot = stage.texture_from_data(
        TextureSourceData::solid(4, 4, [200, 120, 40, 255])?,
        Some("demo:dot"),
    )?;
    let root = stage.root();
    let tree = stage.tree_mut();
    let content = tree.create_node();
    tree.add_child(root, content)?;
    for r in 0..40u32 {
        let row = tree.create_node();
        tree.add_child(content, row)?;
        tree.node_mut(row)?
            .set_position(0.0, f64::from(r) * (TILE + 4.0))
            .set_size(480.0, TILE)?
            .enable_texturizer(true);
        for c in 0..10u32 {
            let tile = tree.create_node();
            tree.add_child(row, tile)?;
            let mut n = tree.node_mut(tile)?;
            n.set_position(f64::from(c) * (TILE + 8.0), 0.0)
                .set_size(TILE, TILE)?;
            if c % 2 == 0 {
                n.set_texture(Some(dot));
            } else {
                n.set_rect(true).set_color(0xff30_70c0);
            }
        }
    }

    for i in 0..90u32 {
        stage.node_mut(content)?.set_y(-f64::from(i) * 12.0);
        let stats = stage.frame(1.0 / 60.0)?;
        tracing::info!(
            frame = stats.frame,
            updated = stats.nodes_updated,
            quads = stats.quads,
            draws = stats.draw_calls,
            rebuilds = stats.offscreen_rebuilds,
            cached = stats.offscreen_cached,
            "frame"
        );
    }

    let pool = stage.pool_stats();
    let tex = stage.texture_stats();
    tracing::info!(?pool, ?tex, "done");
    Ok(())
}
