use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use stagelight::{
    BackendKind, BackendSettings, FrameStats, NodeId, Stage, StageOpts, TextureSourceData,
};

#[derive(Parser, Debug)]
#[command(name = "stagelight", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scroll a synthetic grid scene and print per-frame stats.
    Scroll(ScrollArgs),
    /// Print the default stage options as JSON.
    Opts,
}

#[derive(Parser, Debug)]
struct ScrollArgs {
    /// Stage options JSON; missing fields use defaults.
    #[arg(long)]
    opts: Option<PathBuf>,

    /// Frames to render.
    #[arg(long, default_value_t = 120)]
    frames: u64,

    /// Grid columns.
    #[arg(long, default_value_t = 12)]
    cols: u32,

    /// Grid rows.
    #[arg(long, default_value_t = 200)]
    rows: u32,

    /// Vertical scroll per frame in pixels.
    #[arg(long, default_value_t = 24.0)]
    speed: f64,

    /// Render each row through a lazy texturizer.
    #[arg(long)]
    texturize_rows: bool,

    /// Backend to use.
    #[arg(long, value_enum, default_value_t = BackendChoice::Recording)]
    backend: BackendChoice,

    /// Emit one JSON object per frame instead of a table row.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendChoice {
    Recording,
    Cpu,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Scroll(args) => cmd_scroll(args),
        Command::Opts => {
            println!("{}", serde_json::to_string_pretty(&StageOpts::default())?);
            Ok(())
        }
    }
}

fn read_opts(path: Option<&Path>) -> anyhow::Result<StageOpts> {
    let Some(path) = path else {
        return Ok(StageOpts::default());
    };
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read stage options '{}'", path.display()))?;
    Ok(StageOpts::from_json_str(&s)?)
}

fn cmd_scroll(args: ScrollArgs) -> anyhow::Result<()> {
    let opts = read_opts(args.opts.as_deref())?;
    let kind = match args.backend {
        BackendChoice::Recording => BackendKind::Recording,
        BackendChoice::Cpu => BackendKind::Cpu,
    };
    let settings = BackendSettings {
        width: opts.width,
        height: opts.height,
        texture_limit_texels: None,
    };
    let backend = stagelight::create_backend(kind, &settings)?;
    let mut stage: Stage = Stage::new(opts, backend)?;

    let content = build_grid(&mut stage, &args)?;

    let mut totals = FrameStats::default();
    for i in 0..args.frames {
        let y = -(i as f64) * args.speed;
        stage.node_mut(content)?.set_y(y);
        let stats = stage.frame(1.0 / 60.0)?;
        print_stats(&stats, args.json)?;
        totals.quads += stats.quads;
        totals.draw_calls += stats.draw_calls;
        totals.offscreen_rebuilds += stats.offscreen_rebuilds;
        totals.targets_allocated += stats.targets_allocated;
        totals.textures_uploaded += stats.textures_uploaded;
    }

    let events = stage.drain_events().len();
    eprintln!(
        "frames={} quads={} draw_calls={} offscreen_rebuilds={} targets_allocated={} uploads={} events={}",
        args.frames,
        totals.quads,
        totals.draw_calls,
        totals.offscreen_rebuilds,
        totals.targets_allocated,
        totals.textures_uploaded,
        events
    );
    Ok(())
}

/// Grid of tiles below one scrolling container; returns the container.
fn build_grid(stage: &mut Stage, args: &ScrollArgs) -> anyhow::Result<NodeId> {
    const TILE: f64 = 96.0;
    const GAP: f64 = 8.0;

    let tile_tex = stage.texture_from_data(checker(32, 32)?, Some("cli:checker"))?;
    let root = stage.root();
    let tree = stage.tree_mut();
    let content = tree.create_node();
    tree.add_child(root, content)?;

    for r in 0..args.rows {
        let row = tree.create_node();
        tree.add_child(content, row)?;
        let width = f64::from(args.cols) * (TILE + GAP);
        tree.node_mut(row)?
            .set_position(0.0, f64::from(r) * (TILE + GAP))
            .set_size(width, TILE)?;
        if args.texturize_rows {
            tree.node_mut(row)?.enable_texturizer(true);
        }

        for c in 0..args.cols {
            let tile = tree.create_node();
            tree.add_child(row, tile)?;
            let mut n = tree.node_mut(tile)?;
            n.set_position(f64::from(c) * (TILE + GAP), 0.0)
                .set_size(TILE, TILE)?;
            if (r + c) % 3 == 0 {
                n.set_texture(Some(tile_tex));
            } else {
                let hue = (r * 31 + c * 17) % 255;
                n.set_rect(true).set_color(0xff00_0000 | (hue << 16) | 0x40a0);
            }
        }
    }
    Ok(content)
}

fn checker(w: u32, h: u32) -> anyhow::Result<TextureSourceData> {
    let mut px: Vec<u8> = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for x in 0..w {
            let on = ((x / 8) + (y / 8)) % 2 == 0;
            px.extend_from_slice(if on {
                &[230, 230, 230, 255]
            } else {
                &[40, 40, 48, 255]
            });
        }
    }
    Ok(TextureSourceData::new(w, h, px)?)
}

fn print_stats(s: &FrameStats, json: bool) -> anyhow::Result<()> {
    if json {
        let v = serde_json::json!({
            "frame": s.frame,
            "nodes_updated": s.nodes_updated,
            "quads": s.quads,
            "operations": s.operations,
            "offscreen_operations": s.offscreen_operations,
            "draw_calls": s.draw_calls,
            "offscreen_rebuilds": s.offscreen_rebuilds,
            "targets_allocated": s.targets_allocated,
            "textures_uploaded": s.textures_uploaded,
            "evicted_texels": s.evicted_texels,
        });
        println!("{}", serde_json::to_string(&v)?);
    } else {
        println!(
            "frame {:>5}  updated {:>6}  quads {:>6}  ops {:>4}  offscreen {:>4}  draws {:>4}",
            s.frame,
            s.nodes_updated,
            s.quads,
            s.operations,
            s.offscreen_operations,
            s.draw_calls
        );
    }
    Ok(())
}
