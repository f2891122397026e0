use std::{num::NonZeroUsize, path::PathBuf, time::Instant};

use anyhow::ensure;
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use itertools::iproduct;
use log::{info, warn};
use minibvh::{
    Bvh, CullSettings, Frustum, FrustumSimd, InstanceBoxes, TriangleBuffer, WorkerCount, cull,
    cull_parallel,
    geometry::{Ray, WorldBox, WorldPoint, WorldVector},
    visible_indices,
};
use rand::{SeedableRng as _, rngs::SmallRng};

#[derive(Parser)]
#[command(name = "minibvh-cli")]
#[command(about = "Ray tracing and frustum culling playground", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cast a grid of camera rays into a triangle scene
    Trace {
        /// Wavefront OBJ file to load instead of a random scene
        #[arg(long)]
        obj: Option<PathBuf>,
        /// Number of triangles in the random scene
        #[arg(long, default_value_t = 50_000)]
        triangles: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Number of rays along each side of the image
        #[arg(long, default_value_t = 512)]
        resolution: usize,
        /// BVH cache file, loaded if present and written otherwise
        #[arg(long)]
        cache: Option<PathBuf>,
        /// Dump the whole tree
        #[arg(long)]
        print_tree: bool,
    },
    /// Cull a square grid of instances against a camera frustum
    Cull {
        /// Number of instances along each side of the grid
        #[arg(long, default_value_t = 300)]
        grid: usize,
        /// Worker thread count, one per CPU if not given
        #[arg(long)]
        threads: Option<NonZeroUsize>,
        /// Number of 8-wide groups handed to a worker at once
        #[arg(long, default_value = "256")]
        chunk: NonZeroUsize,
        /// Number of repetitions for timing
        #[arg(long, default_value_t = 10)]
        frames: usize,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Trace {
            obj,
            triangles,
            seed,
            resolution,
            cache,
            print_tree,
        } => trace(obj, triangles, seed, resolution, cache, print_tree),
        Commands::Cull {
            grid,
            threads,
            chunk,
            frames,
        } => cull_grid(grid, threads, chunk, frames),
    }
}

fn trace(
    obj: Option<PathBuf>,
    triangles: usize,
    seed: u64,
    resolution: usize,
    cache: Option<PathBuf>,
    print_tree: bool,
) -> anyhow::Result<()> {
    let buffer = match obj {
        Some(path) => TriangleBuffer::with_obj(path)?,
        None => TriangleBuffer::random(triangles, 10.0, 0.5, &mut SmallRng::seed_from_u64(seed)),
    };
    let soup = buffer.soup();

    let start = Instant::now();
    let bvh = match cache.as_ref().map(Bvh::load) {
        Some(Ok(bvh)) if bvh.fits(&soup) => bvh,
        cached => {
            match cached {
                Some(Ok(_)) => warn!("Cached BVH doesn't match the scene, rebuilding"),
                Some(Err(e)) => info!("Not using BVH cache: {e}"),
                None => {}
            }
            let bvh = Bvh::build(&soup);
            if let Some(path) = &cache {
                bvh.save(path)?;
            }
            bvh
        }
    };
    println!("BVH ready in {:?}", start.elapsed());

    bvh.print_statistics();
    if print_tree {
        bvh.print_tree();
    }

    if bvh.is_empty() {
        println!("Empty scene, nothing to trace");
        return Ok(());
    }
    let rays = camera_rays(&bvh.bounding_box(), resolution);

    let bar = ProgressBar::new(resolution as u64);
    let start = Instant::now();
    let mut hits = 0usize;
    for row in rays.chunks(resolution) {
        hits += row
            .iter()
            .filter(|ray| bvh.closest_hit(&soup, ray).is_some())
            .count();
        bar.inc(1);
    }
    bar.finish_and_clear();

    let elapsed = start.elapsed();
    println!(
        "{} rays, {} hits in {:?} ({:.2} Mrays/s)",
        rays.len(),
        hits,
        elapsed,
        rays.len() as f64 / elapsed.as_secs_f64() / 1e6
    );

    Ok(())
}

/// Pinhole camera looking at the scene from the front, along -z.
fn camera_rays(bounds: &WorldBox, resolution: usize) -> Vec<Ray> {
    let center = bounds.center();
    let size = bounds.size();
    let eye = center + WorldVector::new(0.0, 0.0, size.z / 2.0 + size.x.max(size.y) * 1.5);
    let forward = WorldVector::new(0.0, 0.0, -1.0);
    let tan_half_fov = 0.4f32;

    iproduct!(0..resolution, 0..resolution)
        .map(|(y, x)| {
            let sx = (2.0 * (x as f32 + 0.5) / resolution as f32 - 1.0) * tan_half_fov;
            let sy = (1.0 - 2.0 * (y as f32 + 0.5) / resolution as f32) * tan_half_fov;
            Ray::new(eye, (forward + WorldVector::new(sx, sy, 0.0)).normalize())
        })
        .collect()
}

fn cull_grid(
    grid: usize,
    threads: Option<NonZeroUsize>,
    chunk: NonZeroUsize,
    frames: usize,
) -> anyhow::Result<()> {
    let spacing = 3.0;
    let object_box = WorldBox::new(
        WorldPoint::new(-0.5, -0.5, -0.5),
        WorldPoint::new(0.5, 0.5, 0.5),
    );
    let displacements: Vec<_> = iproduct!(0..grid, 0..grid)
        .map(|(z, x)| WorldVector::new(x as f32 * spacing, 0.0, z as f32 * spacing))
        .collect();
    let instances = InstanceBoxes::new(&object_box, &displacements);
    println!(
        "{} instances in {} groups",
        instances.len(),
        instances.group_count()
    );

    let extent = (grid as f32 * spacing).max(1.0);
    let frustum = Frustum::builder()
        .eye(WorldPoint::new(-10.0, 20.0, -10.0))
        .forward(WorldVector::new(1.0, -0.3, 1.0))
        .up(WorldVector::new(0.0, 1.0, 0.0))
        .vertical_fov(1.0)
        .aspect_ratio(16.0 / 9.0)
        .near(0.1)
        .far(extent)
        .build();
    let frustum_simd = FrustumSimd::new(&frustum);

    let settings = CullSettings {
        chunk_groups: chunk,
        workers: threads.map_or(WorkerCount::Auto, WorkerCount::Manual),
    };

    let start = Instant::now();
    let mut serial = Vec::new();
    for _ in 0..frames {
        serial = cull(&frustum_simd, &instances);
    }
    let serial_time = start.elapsed() / frames.max(1) as u32;

    let start = Instant::now();
    let mut parallel = Vec::new();
    for _ in 0..frames {
        parallel = cull_parallel(&frustum_simd, &instances, &settings);
    }
    let parallel_time = start.elapsed() / frames.max(1) as u32;

    ensure!(serial == parallel, "Parallel culling disagrees with serial culling");

    println!("Visible: {}", visible_indices(&serial).len());
    println!("Serial: {serial_time:?} per frame");
    println!(
        "Parallel ({} workers): {parallel_time:?} per frame",
        settings.workers.resolve()
    );

    Ok(())
}
