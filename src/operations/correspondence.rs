use std::collections::HashMap;

use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;
use tracing::debug;

use super::index::PointSet;
use crate::error::{OperationError, Result};
use crate::math::{mirror_x, Point3, TOLERANCE};
use crate::scene::PointId;

/// Immutable so that any number of points may share a value on one axis,
/// as on a symmetry seam or a lattice plane.
type PointTree = ImmutableKdTree<f64, u64, 3, 32>;

/// How the nearest target point is located.
///
/// Both strategies return the same point: the first point in the target's scan
/// order among those at minimum distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchStrategy {
    /// Compare against every target point.
    #[default]
    BruteForce,
    /// Narrow candidates with a k-d tree, then break ties in scan order.
    KdTree,
}

/// One entry of a deformer's influence table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemberWeight {
    pub point: PointId,
    /// World-space position, read with the deformers disabled.
    pub position: Point3,
    pub weight: f64,
}

/// Target point to weight, in order of first discovery.
///
/// Inserting a point that is already present replaces its weight in place.
#[derive(Debug, Clone, Default)]
pub struct CorrespondenceMap {
    entries: Vec<(PointId, f64)>,
    slots: HashMap<PointId, usize>,
}

impl CorrespondenceMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `weight` for `point`, returning the weight it replaced.
    pub fn insert(&mut self, point: PointId, weight: f64) -> Option<f64> {
        if let Some(&slot) = self.slots.get(&point) {
            let previous = self.entries[slot].1;
            self.entries[slot].1 = weight;
            return Some(previous);
        }
        self.slots.insert(point, self.entries.len());
        self.entries.push((point, weight));
        None
    }

    /// Inserts every entry of `other`, in its order.
    pub fn merge(&mut self, other: &CorrespondenceMap) {
        for (point, weight) in other.iter() {
            self.insert(point, weight);
        }
    }

    #[must_use]
    pub fn get(&self, point: PointId) -> Option<f64> {
        self.slots.get(&point).map(|&slot| self.entries[slot].1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PointId, f64)> + '_ {
        self.entries.iter().copied()
    }

    #[must_use]
    pub fn points(&self) -> Vec<PointId> {
        self.entries.iter().map(|(p, _)| *p).collect()
    }
}

/// Maps each source point to the target point nearest its X-mirrored position.
pub struct FindMirrorCorrespondence<'a> {
    sources: &'a [MemberWeight],
    search: SearchStrategy,
}

impl<'a> FindMirrorCorrespondence<'a> {
    /// Creates a new `FindMirrorCorrespondence` query.
    #[must_use]
    pub fn new(sources: &'a [MemberWeight]) -> Self {
        Self {
            sources,
            search: SearchStrategy::default(),
        }
    }

    #[must_use]
    pub fn with_search(mut self, search: SearchStrategy) -> Self {
        self.search = search;
        self
    }

    /// Executes the query against `target`.
    ///
    /// Source points are processed in order; when two of them land on the same
    /// target point the later weight wins.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::EmptyTargetGeometry`] if `target` has no points
    /// and there is at least one source point.
    pub fn execute(&self, target: &PointSet) -> Result<CorrespondenceMap> {
        let mut map = CorrespondenceMap::new();
        if self.sources.is_empty() {
            return Ok(map);
        }
        if target.is_empty() {
            return Err(OperationError::EmptyTargetGeometry.into());
        }

        let search = Search::new(target, self.search);
        for source in self.sources {
            let mirrored = mirror_x(&source.position);
            let (nearest, _) = search
                .nearest(&mirrored)
                .ok_or(OperationError::EmptyTargetGeometry)?;
            map.insert(nearest, source.weight);
        }

        debug!(
            sources = self.sources.len(),
            targets = map.len(),
            strategy = ?self.search,
            "mirror correspondence found"
        );
        Ok(map)
    }
}

enum Search<'a> {
    Scan(&'a PointSet),
    Tree(&'a PointSet, PointTree),
}

impl<'a> Search<'a> {
    fn new(set: &'a PointSet, strategy: SearchStrategy) -> Self {
        match strategy {
            SearchStrategy::BruteForce => Self::Scan(set),
            SearchStrategy::KdTree => {
                let coords: Vec<[f64; 3]> = set.iter().map(|(_, p)| [p.x, p.y, p.z]).collect();
                Self::Tree(set, PointTree::new_from_slice(&coords))
            }
        }
    }

    /// Returns the nearest point and its distance.
    fn nearest(&self, query: &Point3) -> Option<(PointId, f64)> {
        match self {
            Self::Scan(set) => {
                let mut best: Option<(PointId, f64)> = None;
                for (point, position) in set.iter() {
                    let d = nalgebra::distance(&position, query);
                    if best.is_none_or(|(_, best_d)| d < best_d) {
                        best = Some((point, d));
                    }
                }
                best
            }
            Self::Tree(set, tree) => {
                let q = [query.x, query.y, query.z];
                let nearest = tree.nearest_one::<SquaredEuclidean>(&q);
                let radius = nearest.distance * (1.0 + 1e-9) + TOLERANCE;

                let mut best: Option<(usize, f64)> = None;
                for candidate in tree.within::<SquaredEuclidean>(&q, radius) {
                    #[allow(clippy::cast_possible_truncation)]
                    let i = candidate.item as usize;
                    let Some((_, position)) = set.get(i) else {
                        continue;
                    };
                    let d = nalgebra::distance(&position, query);
                    #[allow(clippy::float_cmp)]
                    let better = best.is_none_or(|(best_i, best_d)| {
                        d < best_d || (d == best_d && i < best_i)
                    });
                    if better {
                        best = Some((i, d));
                    }
                }
                best.and_then(|(i, d)| set.get(i).map(|(point, _)| (point, d)))
            }
        }
    }
}
