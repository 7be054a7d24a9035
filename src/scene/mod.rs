pub mod memory;

pub use memory::{DeformerData, DeformerKind, GeometryData, GroupData, HandleData, MemoryScene, Shape};

use std::collections::HashSet;
use std::fmt;
use std::ops::RangeInclusive;

use crate::error::SceneError;
use crate::math::Point3;

slotmap::new_key_type! {
    /// Unique identifier for a geometry shape (mesh, lattice, or other) in the scene.
    pub struct GeometryId;
}

slotmap::new_key_type! {
    /// Unique identifier for a deformer node in the scene.
    pub struct DeformerId;
}

slotmap::new_key_type! {
    /// Unique identifier for a deformer's control handle.
    pub struct HandleId;
}

slotmap::new_key_type! {
    /// Unique identifier for a grouping transform that parents other nodes.
    pub struct GroupId;
}

/// A selectable scene node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Geometry(GeometryId),
    Deformer(DeformerId),
    Handle(HandleId),
    Group(GroupId),
}

/// The kind of a geometry shape, as far as mirroring cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryKind {
    Mesh,
    Lattice,
    /// Any other shape, carrying the host's type name (e.g. `nurbsCurve`).
    Other(String),
}

impl GeometryKind {
    /// Whether the nearest-point search can run on this kind of geometry.
    #[must_use]
    pub fn is_point_searchable(&self) -> bool {
        matches!(self, Self::Mesh | Self::Lattice)
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mesh => f.write_str("mesh"),
            Self::Lattice => f.write_str("lattice"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// A single point on a geometry, addressed without reference to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    /// A mesh vertex, `vtx[i]`.
    Vertex(usize),
    /// A lattice control point, `pt[s][t][u]`.
    LatticePoint([usize; 3]),
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex(i) => write!(f, "vtx[{i}]"),
            Self::LatticePoint([s, t, u]) => write!(f, "pt[{s}][{t}][{u}]"),
        }
    }
}

/// Identifies one point of one geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointId {
    pub geometry: GeometryId,
    pub component: Component,
}

impl PointId {
    #[must_use]
    pub fn new(geometry: GeometryId, component: Component) -> Self {
        Self {
            geometry,
            component,
        }
    }

    #[must_use]
    pub fn vertex(geometry: GeometryId, index: usize) -> Self {
        Self::new(geometry, Component::Vertex(index))
    }

    #[must_use]
    pub fn lattice_point(geometry: GeometryId, stu: [usize; 3]) -> Self {
        Self::new(geometry, Component::LatticePoint(stu))
    }

    /// The same component index, reinterpreted on another geometry.
    #[must_use]
    pub fn on(self, geometry: GeometryId) -> Self {
        Self::new(geometry, self.component)
    }
}

/// A compact run of components, as hosts report membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentRange {
    /// `vtx[a:b]`, inclusive.
    Vertices(RangeInclusive<usize>),
    /// `pt[s0:s1][t0:t1][u0:u1]`, inclusive on each axis.
    LatticePoints {
        s: RangeInclusive<usize>,
        t: RangeInclusive<usize>,
        u: RangeInclusive<usize>,
    },
}

impl ComponentRange {
    /// Expands the range into individual components.
    ///
    /// Lattice ranges expand with `s` varying fastest, then `t`, then `u`.
    #[must_use]
    pub fn components(&self) -> Vec<Component> {
        match self {
            Self::Vertices(range) => range.clone().map(Component::Vertex).collect(),
            Self::LatticePoints { s, t, u } => {
                let mut out = Vec::new();
                for ui in u.clone() {
                    for ti in t.clone() {
                        for si in s.clone() {
                            out.push(Component::LatticePoint([si, ti, ui]));
                        }
                    }
                }
                out
            }
        }
    }
}

/// A compact component run on a particular geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRange {
    pub geometry: GeometryId,
    pub range: ComponentRange,
}

/// Flattens compact member ranges into individual points.
///
/// Order of first appearance is preserved; repeated points are dropped.
#[must_use]
pub fn flatten(ranges: &[MemberRange]) -> Vec<PointId> {
    let mut seen = HashSet::new();
    let mut points = Vec::new();
    for member in ranges {
        for component in member.range.components() {
            let point = PointId::new(member.geometry, component);
            if seen.insert(point) {
                points.push(point);
            }
        }
    }
    points
}

/// Cluster `angleInterpolation` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AngleInterpolation {
    #[default]
    Shortest,
    Longest,
    Zero,
}

/// The fixed bundle of scalar cluster settings copied onto a rebuilt cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterAttributes {
    pub relative: bool,
    pub use_partial_resolution: bool,
    pub angle_interpolation: AngleInterpolation,
    pub percent_resolution: f64,
}

impl Default for ClusterAttributes {
    fn default() -> Self {
        Self {
            relative: false,
            use_partial_resolution: false,
            angle_interpolation: AngleInterpolation::default(),
            percent_resolution: 0.01,
        }
    }
}

/// Capabilities the host application provides to the mirroring operations.
///
/// All positions are world space. Implementations serialize access themselves;
/// every call runs to completion.
pub trait Scene {
    /// Returns the current selection.
    fn selection(&self) -> Vec<Node>;

    /// Replaces the current selection.
    fn set_selection(&mut self, nodes: &[Node]);

    /// Lists cluster handles at or below the given nodes.
    fn descendant_handles(&self, roots: &[Node]) -> Vec<HandleId>;

    /// Follows a handle's connections to the deformers it drives.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle does not exist.
    fn handle_deformers(&self, handle: HandleId) -> Result<Vec<DeformerId>, SceneError>;

    /// Lists the cluster deformers a node connects to.
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist.
    fn connected_deformers(&self, node: Node) -> Result<Vec<DeformerId>, SceneError>;

    /// Returns the geometry shape under a node, if it has one.
    fn shape_geometry(&self, node: Node) -> Option<GeometryId>;

    /// # Errors
    ///
    /// Returns an error if the geometry does not exist.
    fn geometry_kind(&self, geometry: GeometryId) -> Result<GeometryKind, SceneError>;

    /// # Errors
    ///
    /// Returns an error if the geometry does not exist.
    fn geometry_name(&self, geometry: GeometryId) -> Result<&str, SceneError>;

    /// Lists every point of a geometry as compact ranges.
    ///
    /// # Errors
    ///
    /// Returns an error if the geometry does not exist.
    fn geometry_components(&self, geometry: GeometryId) -> Result<Vec<ComponentRange>, SceneError>;

    /// Returns the current world-space position of a point.
    ///
    /// # Errors
    ///
    /// Returns an error if the point does not exist.
    fn point_position(&self, point: PointId) -> Result<Point3, SceneError>;

    /// # Errors
    ///
    /// Returns an error if the deformer does not exist.
    fn deformer_name(&self, deformer: DeformerId) -> Result<&str, SceneError>;

    /// Lists the geometries a deformer outputs to.
    ///
    /// # Errors
    ///
    /// Returns an error if the deformer does not exist.
    fn output_geometries(&self, deformer: DeformerId) -> Result<Vec<GeometryId>, SceneError>;

    /// Lists every deformer in a geometry's construction history.
    ///
    /// # Errors
    ///
    /// Returns an error if the geometry does not exist.
    fn deformer_history(&self, geometry: GeometryId) -> Result<Vec<DeformerId>, SceneError>;

    /// Returns the control handle of a deformer, if it has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the deformer does not exist.
    fn deformer_handle(&self, deformer: DeformerId) -> Result<Option<HandleId>, SceneError>;

    /// Lists a deformer's membership as compact ranges; see [`flatten`].
    ///
    /// # Errors
    ///
    /// Returns an error if the deformer does not exist.
    fn membership(&self, deformer: DeformerId) -> Result<Vec<MemberRange>, SceneError>;

    /// # Errors
    ///
    /// Returns an error if the point is not a member of the deformer.
    fn weight(&self, deformer: DeformerId, point: PointId) -> Result<f64, SceneError>;

    /// # Errors
    ///
    /// Returns an error if the point is not a member of the deformer.
    fn set_weight(&mut self, deformer: DeformerId, point: PointId, weight: f64)
        -> Result<(), SceneError>;

    /// # Errors
    ///
    /// Returns an error if the deformer does not exist or is not a cluster.
    fn cluster_attributes(&self, deformer: DeformerId) -> Result<ClusterAttributes, SceneError>;

    /// # Errors
    ///
    /// Returns an error if the deformer does not exist or is not a cluster.
    fn set_cluster_attributes(
        &mut self,
        deformer: DeformerId,
        attributes: &ClusterAttributes,
    ) -> Result<(), SceneError>;

    /// # Errors
    ///
    /// Returns an error if the deformer does not exist.
    fn envelope(&self, deformer: DeformerId) -> Result<f64, SceneError>;

    /// # Errors
    ///
    /// Returns an error if the deformer does not exist.
    fn set_envelope(&mut self, deformer: DeformerId, envelope: f64) -> Result<(), SceneError>;

    /// Creates a new cluster bound to exactly the given points.
    ///
    /// # Errors
    ///
    /// Returns an error if `points` is empty or names a point that does not exist.
    fn create_cluster(&mut self, points: &[PointId]) -> Result<(DeformerId, HandleId), SceneError>;

    /// Shows an error message to the user.
    fn display_error(&mut self, message: &str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn lattice_range_expands_s_fastest() {
        let range = ComponentRange::LatticePoints {
            s: 0..=1,
            t: 0..=0,
            u: 2..=3,
        };
        assert_eq!(
            range.components(),
            vec![
                Component::LatticePoint([0, 0, 2]),
                Component::LatticePoint([1, 0, 2]),
                Component::LatticePoint([0, 0, 3]),
                Component::LatticePoint([1, 0, 3]),
            ]
        );
    }

    #[test]
    fn flatten_keeps_first_occurrence_order() {
        let mut ids: SlotMap<GeometryId, ()> = SlotMap::with_key();
        let g = ids.insert(());
        let ranges = vec![
            MemberRange {
                geometry: g,
                range: ComponentRange::Vertices(3..=4),
            },
            MemberRange {
                geometry: g,
                range: ComponentRange::Vertices(0..=3),
            },
        ];
        let points: Vec<_> = flatten(&ranges).into_iter().map(|p| p.component).collect();
        assert_eq!(
            points,
            vec![
                Component::Vertex(3),
                Component::Vertex(4),
                Component::Vertex(0),
                Component::Vertex(1),
                Component::Vertex(2),
            ]
        );
    }

    #[test]
    fn point_on_other_geometry_keeps_index() {
        let mut ids: SlotMap<GeometryId, ()> = SlotMap::with_key();
        let a = ids.insert(());
        let b = ids.insert(());
        let moved = PointId::vertex(a, 3).on(b);
        assert_eq!(moved, PointId::vertex(b, 3));
    }

    #[test]
    fn component_display_matches_host_notation() {
        assert_eq!(Component::Vertex(7).to_string(), "vtx[7]");
        assert_eq!(Component::LatticePoint([1, 0, 2]).to_string(), "pt[1][0][2]");
    }
}
