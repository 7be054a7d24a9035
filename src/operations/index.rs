use std::collections::HashMap;

use crate::error::{OperationError, Result};
use crate::math::Point3;
use crate::scene::{GeometryId, PointId, Scene};

/// Every point of one geometry with its world-space position, in scan order.
///
/// A snapshot: positions are not updated when the scene changes.
#[derive(Debug, Clone)]
pub struct PointSet {
    geometry: GeometryId,
    points: Vec<(PointId, Point3)>,
    slots: HashMap<PointId, usize>,
}

impl PointSet {
    /// The geometry this set was built from.
    #[must_use]
    pub fn geometry(&self) -> GeometryId {
        self.geometry
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points in scan order.
    pub fn iter(&self) -> impl Iterator<Item = (PointId, Point3)> + '_ {
        self.points.iter().copied()
    }

    /// Returns the `i`-th point in scan order.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<(PointId, Point3)> {
        self.points.get(i).copied()
    }

    #[must_use]
    pub fn position(&self, point: PointId) -> Option<Point3> {
        self.slots.get(&point).map(|&i| self.points[i].1)
    }
}

/// Builds the [`PointSet`] of a mesh or lattice.
pub struct BuildPointIndex {
    geometry: GeometryId,
}

impl BuildPointIndex {
    /// Creates a new `BuildPointIndex` operation.
    #[must_use]
    pub fn new(geometry: GeometryId) -> Self {
        Self { geometry }
    }

    /// Executes the operation, reading every point's current position.
    ///
    /// Mesh points are its vertices; lattice points are its control points,
    /// expanded from compact ranges.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::UnsupportedGeometryKind`] if the geometry is
    /// neither a mesh nor a lattice, or a scene error if a lookup fails.
    pub fn execute<S: Scene + ?Sized>(&self, scene: &S) -> Result<PointSet> {
        let kind = scene.geometry_kind(self.geometry)?;
        if !kind.is_point_searchable() {
            return Err(OperationError::UnsupportedGeometryKind {
                geometries: vec![self.geometry],
                deformers: Vec::new(),
                handles: Vec::new(),
            }
            .into());
        }

        let mut points = Vec::new();
        let mut slots = HashMap::new();
        for range in scene.geometry_components(self.geometry)? {
            for component in range.components() {
                let point = PointId::new(self.geometry, component);
                if slots.contains_key(&point) {
                    continue;
                }
                let position = scene.point_position(point)?;
                slots.insert(point, points.len());
                points.push((point, position));
            }
        }

        Ok(PointSet {
            geometry: self.geometry,
            points,
            slots,
        })
    }
}
