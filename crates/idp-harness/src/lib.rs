#![forbid(unsafe_code)]
//! Deterministic stress workloads over the idpool public API.
//!
//! Each workload drives [`idp::IdPool`] through a reproducible operation
//! sequence and returns a serializable report. The CLI in `main.rs` prints
//! the reports; the integration tests assert their invariants. All
//! randomness comes from a fixed-seed LCG so failures replay exactly.

use anyhow::{Result, ensure};
use idp::{IdPool, PoolError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed-increment linear congruential generator (Knuth's MMIX constants).
///
/// Not statistically serious; just a cheap reproducible scrambler.
#[derive(Debug, Clone)]
pub struct Lcg(u64);

impl Lcg {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0
    }

    /// Uniform-ish pick in `[0, bound)`; `bound` must be non-zero.
    pub fn pick(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }
}

/// Outcome of [`run_churn`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChurnReport {
    pub ops: u64,
    pub allocated: u64,
    pub removed: u64,
    pub final_len: usize,
    pub capacity: usize,
    pub expansions: u64,
}

/// Allocate/release churn: two allocations for every release, so the pool
/// grows while ids keep getting recycled.
pub fn run_churn(ops: u64, seed: u64) -> Result<ChurnReport> {
    let pool = IdPool::new();
    let mut rng = Lcg::new(seed);
    let mut live: Vec<usize> = Vec::new();
    let mut allocated = 0_u64;
    let mut removed = 0_u64;

    for op in 0..ops {
        if live.is_empty() || rng.pick(3) != 0 {
            let id = pool
                .allocate(op)
                .map_err(|rejected| anyhow::Error::new(rejected.error))?;
            live.push(id);
            allocated += 1;
        } else {
            let victim = live.swap_remove(rng.pick(live.len()));
            ensure!(pool.remove(victim).is_some(), "live id {victim} was vacant");
            removed += 1;
        }
    }

    ensure!(pool.len() == live.len(), "pool and shadow list disagree");
    Ok(ChurnReport {
        ops,
        allocated,
        removed,
        final_len: pool.len(),
        capacity: pool.capacity(),
        expansions: pool.expansions(),
    })
}

/// Outcome of [`run_sparse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparseReport {
    pub targets: Vec<usize>,
    pub retries: u64,
    pub capacity: usize,
    pub expansions: u64,
}

/// Drive the two-phase protocol at ever higher minimum ids, counting how
/// many Retry/pre_get round trips the growth ladder takes.
pub fn run_sparse(levels: u32, seed: u64) -> Result<SparseReport> {
    let pool = IdPool::new();
    let mut rng = Lcg::new(seed);
    let mut retries = 0_u64;
    let mut targets = Vec::new();

    for level in 0..levels {
        let min_id = (1_usize << (level + 4)) + rng.pick(16);
        let mut value = u64::from(level);
        let id = loop {
            match pool.get_new_above(value, min_id) {
                Ok(id) => break id,
                Err(rejected) => {
                    ensure!(
                        rejected.error == PoolError::Retry,
                        "unexpected failure: {}",
                        rejected.error
                    );
                    retries += 1;
                    value = rejected.into_value();
                    ensure!(pool.pre_get(), "pre_get hit the id ceiling");
                }
            }
        };
        ensure!(id >= min_id, "id {id} below requested minimum {min_id}");
        targets.push(id);
    }

    Ok(SparseReport {
        targets,
        retries,
        capacity: pool.capacity(),
        expansions: pool.expansions(),
    })
}

/// Outcome of [`run_model_check`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    pub steps: u64,
    pub final_len: usize,
    pub capacity: usize,
}

/// Random alloc/remove/replace sequence cross-checked against a `BTreeMap`
/// after every step.
pub fn run_model_check(steps: u64, seed: u64) -> Result<ModelReport> {
    let pool = IdPool::new();
    let mut rng = Lcg::new(seed);
    let mut model: BTreeMap<usize, u64> = BTreeMap::new();

    for step in 0..steps {
        match rng.pick(4) {
            0 | 1 => {
                let id = pool
                    .allocate(step)
                    .map_err(|rejected| anyhow::Error::new(rejected.error))?;
                ensure!(model.insert(id, step).is_none(), "id {id} issued twice");
            }
            2 if !model.is_empty() => {
                let victim = *model
                    .keys()
                    .nth(rng.pick(model.len()))
                    .expect("non-empty model");
                ensure!(
                    pool.remove(victim) == model.remove(&victim),
                    "remove({victim}) diverged from model"
                );
            }
            _ if !model.is_empty() => {
                let target = *model
                    .keys()
                    .nth(rng.pick(model.len()))
                    .expect("non-empty model");
                let previous = pool
                    .replace(target, step)
                    .map_err(|rejected| anyhow::Error::new(rejected.error))?;
                ensure!(
                    model.insert(target, step) == Some(previous),
                    "replace({target}) diverged from model"
                );
            }
            _ => {}
        }
        ensure!(pool.len() == model.len(), "length diverged at step {step}");
    }

    for (&id, &v) in &model {
        ensure!(pool.find(id) == Some(v), "find({id}) diverged from model");
    }

    Ok(ModelReport {
        steps,
        final_len: pool.len(),
        capacity: pool.capacity(),
    })
}
