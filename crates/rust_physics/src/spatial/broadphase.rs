//! Broad-phase pair finding
//!
//! Every strategy reports the same pairs: index pairs `(i, j)` with `i < j`,
//! sorted ascending and free of duplicates, for every pair of boxes that
//! overlap (touching counts). Only the cost differs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::spatial::AABB;

/// Cells a finite box may span per axis before the grid treats it as oversized
const MAX_CELLS_PER_AXIS: i64 = 32;

/// Selectable broad-phase algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadphaseStrategy {
    /// Test every pair
    #[default]
    Naive,
    /// Sort by the X lower bound and sweep
    SweepAndPrune,
    /// Uniform spatial hash grid
    Grid,
}

/// Pluggable broad-phase used by the world
pub trait BroadPhase: Send + Sync {
    /// Replace `pairs` with every overlapping `(i, j)`, `i < j`, sorted
    fn find_pairs(&mut self, aabbs: &[AABB], pairs: &mut Vec<(usize, usize)>);

    /// Which algorithm this is
    fn strategy(&self) -> BroadphaseStrategy;
}

/// Build the broad-phase for `strategy`
pub fn create(strategy: BroadphaseStrategy, grid_cell_size: f32) -> Box<dyn BroadPhase> {
    match strategy {
        BroadphaseStrategy::Naive => Box::new(NaiveBroadPhase),
        BroadphaseStrategy::SweepAndPrune => Box::new(SweepAndPrune::default()),
        BroadphaseStrategy::Grid => Box::new(GridBroadPhase::new(grid_cell_size)),
    }
}

fn canonical(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn finish(pairs: &mut Vec<(usize, usize)>) {
    pairs.sort_unstable();
    pairs.dedup();
}

/// All-pairs test
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveBroadPhase;

impl BroadPhase for NaiveBroadPhase {
    fn find_pairs(&mut self, aabbs: &[AABB], pairs: &mut Vec<(usize, usize)>) {
        pairs.clear();
        for (i, a) in aabbs.iter().enumerate() {
            for (j, b) in aabbs.iter().enumerate().skip(i + 1) {
                if a.intersects(b) {
                    pairs.push((i, j));
                }
            }
        }
    }

    fn strategy(&self) -> BroadphaseStrategy {
        BroadphaseStrategy::Naive
    }
}

/// Sort-and-sweep along X
#[derive(Debug, Clone, Default)]
pub struct SweepAndPrune {
    order: Vec<usize>,
}

impl BroadPhase for SweepAndPrune {
    fn find_pairs(&mut self, aabbs: &[AABB], pairs: &mut Vec<(usize, usize)>) {
        pairs.clear();
        self.order.clear();
        self.order.extend(0..aabbs.len());
        self.order
            .sort_unstable_by(|&a, &b| aabbs[a].min.x.total_cmp(&aabbs[b].min.x).then(a.cmp(&b)));

        for (position, &i) in self.order.iter().enumerate() {
            let a = &aabbs[i];
            for &j in &self.order[position + 1..] {
                let b = &aabbs[j];
                if b.min.x > a.max.x {
                    break;
                }
                if a.intersects(b) {
                    pairs.push(canonical(i, j));
                }
            }
        }
        finish(pairs);
    }

    fn strategy(&self) -> BroadphaseStrategy {
        BroadphaseStrategy::SweepAndPrune
    }
}

type Cell = (i32, i32, i32);

/// Uniform hash grid
///
/// Unbounded boxes (planes) and boxes spanning too many cells skip the grid
/// and are tested against everything.
#[derive(Debug, Clone)]
pub struct GridBroadPhase {
    cell_size: f32,
    cells: HashMap<Cell, Vec<usize>>,
    oversized: Vec<usize>,
}

impl GridBroadPhase {
    /// Grid with cubic cells of edge `cell_size`
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: if cell_size.is_finite() && cell_size > 0.0 { cell_size } else { 1.0 },
            cells: HashMap::new(),
            oversized: Vec::new(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn cell_of(&self, value: f32) -> i32 {
        (value / self.cell_size).floor() as i32
    }

    fn cell_range(&self, aabb: &AABB) -> Option<(Cell, Cell)> {
        if !aabb.is_finite() {
            return None;
        }
        let low = (self.cell_of(aabb.min.x), self.cell_of(aabb.min.y), self.cell_of(aabb.min.z));
        let high = (self.cell_of(aabb.max.x), self.cell_of(aabb.max.y), self.cell_of(aabb.max.z));
        let span = |lo: i32, hi: i32| i64::from(hi) - i64::from(lo) + 1;
        let too_wide = [span(low.0, high.0), span(low.1, high.1), span(low.2, high.2)]
            .iter()
            .any(|&cells| cells > MAX_CELLS_PER_AXIS);
        (!too_wide).then_some((low, high))
    }
}

impl BroadPhase for GridBroadPhase {
    fn find_pairs(&mut self, aabbs: &[AABB], pairs: &mut Vec<(usize, usize)>) {
        pairs.clear();
        self.oversized.clear();
        // keep the allocations of cells used last time, drop the rest
        self.cells.retain(|_, members| {
            let used = !members.is_empty();
            members.clear();
            used
        });

        for (index, aabb) in aabbs.iter().enumerate() {
            let Some((low, high)) = self.cell_range(aabb) else {
                self.oversized.push(index);
                continue;
            };
            for x in low.0..=high.0 {
                for y in low.1..=high.1 {
                    for z in low.2..=high.2 {
                        self.cells.entry((x, y, z)).or_default().push(index);
                    }
                }
            }
        }

        for members in self.cells.values() {
            for (n, &i) in members.iter().enumerate() {
                for &j in &members[n + 1..] {
                    if aabbs[i].intersects(&aabbs[j]) {
                        pairs.push(canonical(i, j));
                    }
                }
            }
        }

        for &i in &self.oversized {
            for (j, other) in aabbs.iter().enumerate() {
                if i != j && aabbs[i].intersects(other) {
                    pairs.push(canonical(i, j));
                }
            }
        }
        finish(pairs);
    }

    fn strategy(&self) -> BroadphaseStrategy {
        BroadphaseStrategy::Grid
    }
}
