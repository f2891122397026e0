use std::{
    num::NonZeroUsize,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

use log::debug;

use super::{FrustumSimd, InstanceBoxes, cull_groups};

const DEFAULT_CHUNK_GROUPS: NonZeroUsize = NonZeroUsize::new(256).unwrap();

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum WorkerCount {
    /// One worker per logical CPU
    #[default]
    Auto,
    Manual(NonZeroUsize),
}

impl WorkerCount {
    pub fn resolve(self) -> usize {
        match self {
            WorkerCount::Auto => num_cpus::get(),
            WorkerCount::Manual(n) => n.get(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CullSettings {
    /// Number of 8-wide groups a worker claims at once
    pub chunk_groups: NonZeroUsize,
    pub workers: WorkerCount,
}

impl Default for CullSettings {
    fn default() -> Self {
        CullSettings {
            chunk_groups: DEFAULT_CHUNK_GROUPS,
            workers: WorkerCount::Auto,
        }
    }
}

/// Multithreaded version of `cull`, with identical output.
///
/// Workers claim chunks of groups from a shared counter until all chunks are taken.
/// Panics in workers are propagated to the caller.
pub fn cull_parallel(
    frustum: &FrustumSimd,
    instances: &InstanceBoxes,
    settings: &CullSettings,
) -> Vec<u8> {
    let batches = instances.batches();
    let valid = instances.valid_masks();

    let chunk_size = settings.chunk_groups.get();
    let chunk_count = batches.len().div_ceil(chunk_size);
    let worker_count = settings.workers.resolve().min(chunk_count);

    if worker_count <= 1 {
        return cull_groups(frustum, batches, valid);
    }

    debug!("Culling {chunk_count} chunks of {chunk_size} groups in {worker_count} threads");

    let next_chunk_index = AtomicUsize::new(0);
    let next_chunk = || {
        let index = next_chunk_index.fetch_add(1, Ordering::Relaxed);
        (index < chunk_count).then_some(index)
    };

    let partial_results: Vec<Vec<(usize, Vec<u8>)>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..worker_count)
            .map(|_| {
                scope.spawn(|| {
                    let mut results = Vec::new();
                    while let Some(index) = next_chunk() {
                        let start = index * chunk_size;
                        let end = (start + chunk_size).min(batches.len());
                        results.push((start, cull_groups(frustum, &batches[start..end], &valid[start..end])));
                    }
                    results
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    });

    let mut masks = vec![0u8; batches.len()];
    for (start, chunk) in partial_results.into_iter().flatten() {
        masks[start..start + chunk.len()].copy_from_slice(&chunk);
    }
    masks
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        culling::{Frustum, cull},
        geometry::{WorldBox, WorldPoint, WorldVector},
    };

    use assert2::{assert, check};
    use rand::{Rng as _, SeedableRng as _, rngs::SmallRng};
    use test_case::test_matrix;

    fn frustum() -> FrustumSimd {
        FrustumSimd::new(
            &Frustum::builder()
                .eye(WorldPoint::new(0.0, 0.0, -50.0))
                .forward(WorldVector::new(0.2, 0.1, 1.0))
                .up(WorldVector::new(0.0, 1.0, 0.0))
                .vertical_fov(0.8)
                .aspect_ratio(1.6)
                .near(0.5)
                .far(80.0)
                .build(),
        )
    }

    fn random_instances(count: usize) -> InstanceBoxes {
        let mut rng = SmallRng::seed_from_u64(count as u64);
        let object_box = WorldBox::new(WorldPoint::new(-1.0, -1.0, -1.0), WorldPoint::new(1.0, 1.0, 1.0));
        let displacements: Vec<_> = (0..count)
            .map(|_| {
                WorldVector::new(
                    rng.random_range(-60.0..60.0),
                    rng.random_range(-60.0..60.0),
                    rng.random_range(-60.0..60.0),
                )
            })
            .collect();
        InstanceBoxes::new(&object_box, &displacements)
    }

    fn settings(workers: usize, chunk_groups: usize) -> CullSettings {
        CullSettings {
            chunk_groups: NonZeroUsize::new(chunk_groups).unwrap(),
            workers: WorkerCount::Manual(NonZeroUsize::new(workers).unwrap()),
        }
    }

    #[test_matrix(
        [0, 5, 8, 1000, 4099],
        [1, 2, 7],
        [1, 3, 256]
    )]
    fn matches_serial(count: usize, workers: usize, chunk_groups: usize) {
        let frustum = frustum();
        let instances = random_instances(count);

        let serial = cull(&frustum, &instances);
        let parallel = cull_parallel(&frustum, &instances, &settings(workers, chunk_groups));

        assert!(parallel == serial);
    }

    #[test]
    fn auto_workers() {
        let frustum = frustum();
        let instances = random_instances(3000);

        let parallel = cull_parallel(&frustum, &instances, &CullSettings::default());

        check!(parallel == cull(&frustum, &instances));
        check!(WorkerCount::Auto.resolve() >= 1);
    }
}
