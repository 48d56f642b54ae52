//! Maximum-feasible-subset search over constraint disks.
//!
//! Measurements lie: a proxy detour, a congested path, or a bad
//! calibration can produce a disk that excludes the host's true position.
//! Instead of intersecting every disk and frequently ending up empty, the
//! solver finds the **largest subset** of disks whose intersection with
//! the base region is non-empty, breaking cardinality ties toward the
//! smallest area.
//!
//! Subsets are enumerated lexicographically over the disks sorted by
//! ascending area (tight constraints first), as a suffix tree where each
//! node carries its partial intersection, so visiting a child costs one
//! polygon intersection. Two prunes keep the exponential tree tractable
//! for the ≤ ~40 landmarks a batch realistically has: an upper bound on
//! achievable cardinality, and the fact that every superset of an empty
//! intersection is empty.


use tracing::debug;

use crate::constraint::ConstraintSet;
use crate::region::Region;

/// Result of the two-pass feasible-subset refinement.
#[derive(Debug, Clone)]
pub struct Solution {
    /// The refined region (falls back to the physical-pass region when no
    /// empirical disk could be added).
    pub region: Region,
    /// Bitmask over the constraint set's empirical disks: bit *i* set
    /// means disk *i* was intersected into the result.
    pub included: u64,
    /// Number of empirical disks included.
    pub cardinality: usize,
    /// Physical-limit disks included in the physical pass.
    pub physical_selected: usize,
    /// Total physical-limit disks.
    pub physical_total: usize,
}

/// Intersect the base region with as many of `regions` as possible.
///
/// Returns the best intersection and the indices (into `regions`) of the
/// participating disks. Among subsets of equal cardinality the one with
/// the smallest area wins; with no feasible extension the base region
/// itself comes back with an empty index list.
pub fn max_subset_intersection(regions: &[&Region], base: &Region) -> (Region, Vec<usize>) {
    let n = regions.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| regions[a].area().total_cmp(&regions[b].area()));

    let mut search = Search {
        regions,
        order: &order,
        best_region: base.clone(),
        best_set: Vec::new(),
        best_count: 0,
        best_area: base.area(),
    };
    search.explore(&mut Vec::new(), base);

    let mut chosen: Vec<usize> = search.best_set.iter().map(|&i| order[i]).collect();
    chosen.sort_unstable();
    (search.best_region, chosen)
}

struct Search<'a> {
    regions: &'a [&'a Region],
    order: &'a [usize],
    best_region: Region,
    /// Indices into `order`, i.e. positions in the sorted sequence.
    best_set: Vec<usize>,
    best_count: usize,
    best_area: f64,
}

impl Search<'_> {
    fn explore(&mut self, cand: &mut Vec<usize>, parent: &Region) {
        let n = self.order.len();
        let start = cand.last().map_or(0, |&last| last + 1);
        for next in start..n {
            // Cardinality reachable below this child: everything from
            // `next` to the end. Monotone in `next`, so stop the scan
            // once it can no longer beat the best.
            let bound = cand.len() + 1 + (n - 1 - next);
            if bound < self.best_count {
                break;
            }

            let child = parent.intersection(self.regions[self.order[next]]);
            if child.is_empty() {
                // Every superset of an empty intersection is empty.
                continue;
            }

            cand.push(next);
            let area = child.area();
            if cand.len() > self.best_count
                || (cand.len() == self.best_count && area < self.best_area)
            {
                self.best_count = cand.len();
                self.best_area = area;
                self.best_region = child.clone();
                self.best_set = cand.clone();
            }
            self.explore(cand, &child);
            cand.pop();
        }
    }
}

/// Two-pass refinement for one (batch, variant) pair.
///
/// The physical pass intersects the base region with as many
/// physical-limit disks as possible. Empirical disks that miss the
/// physical region entirely, or that are almost equal to their
/// physical-limit twin (and thus add no information), are dropped; the
/// empirical pass then refines the physical region with as many of the
/// survivors as possible.
pub fn solve(constraints: &ConstraintSet, base: &Region) -> Solution {
    debug_assert!(
        constraints.len() <= 64,
        "inclusion bitmask holds at most 64 disks"
    );

    let physical: Vec<&Region> = constraints.physical.iter().map(|d| d.region()).collect();
    let (phy_region, phy_chosen) = max_subset_intersection(&physical, base);

    let mut kept: Vec<usize> = Vec::new();
    for (i, disk) in constraints.empirical.iter().enumerate() {
        if disk.region().intersection(&phy_region).is_empty() {
            debug!(
                landmark = %constraints.landmarks[i],
                "dropping empirical disk outside the physical region"
            );
            continue;
        }
        if disk.region().almost_equal(constraints.physical[i].region()) {
            // An empirical claim indistinguishable from the physical
            // bound adds no constraint.
            continue;
        }
        kept.push(i);
    }

    let empirical: Vec<&Region> = kept
        .iter()
        .map(|&i| constraints.empirical[i].region())
        .collect();
    let (region, chosen) = max_subset_intersection(&empirical, &phy_region);

    let mut included = 0u64;
    for &k in &chosen {
        included |= 1 << kept[k];
    }

    Solution {
        region,
        included,
        cardinality: chosen.len(),
        physical_selected: phy_chosen.len(),
        physical_total: constraints.physical.len(),
    }
}
