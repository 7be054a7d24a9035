use std::collections::HashMap;

use slotmap::SlotMap;

use super::{
    ClusterAttributes, Component, ComponentRange, DeformerId, GeometryId, GeometryKind, GroupId,
    HandleId, MemberRange, Node, PointId, Scene,
};
use crate::error::SceneError;
use crate::math::{Point3, Vector3};

/// Rest-shape data of a geometry.
#[derive(Debug, Clone)]
pub enum Shape {
    Mesh {
        vertices: Vec<Point3>,
    },
    /// Control points stored with `s` varying fastest.
    Lattice {
        divisions: [usize; 3],
        points: Vec<Point3>,
    },
    /// A shape the mirroring operations cannot search.
    Other { type_name: String },
}

/// A geometry node: its rest shape and world translation.
#[derive(Debug, Clone)]
pub struct GeometryData {
    pub name: String,
    pub shape: Shape,
    pub translation: Vector3,
}

impl GeometryData {
    fn kind(&self) -> GeometryKind {
        match &self.shape {
            Shape::Mesh { .. } => GeometryKind::Mesh,
            Shape::Lattice { .. } => GeometryKind::Lattice,
            Shape::Other { type_name } => GeometryKind::Other(type_name.clone()),
        }
    }

    fn rest_position(&self, component: Component) -> Option<Point3> {
        match (&self.shape, component) {
            (Shape::Mesh { vertices }, Component::Vertex(i)) => vertices.get(i).copied(),
            (Shape::Lattice { divisions, points }, Component::LatticePoint([s, t, u])) => {
                let [ds, dt, du] = *divisions;
                if s >= ds || t >= dt || u >= du {
                    return None;
                }
                points.get((u * dt + t) * ds + s).copied()
            }
            _ => None,
        }
    }
}

/// What kind of deformer a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeformerKind {
    Cluster,
    /// Any other deformer in a geometry's history (e.g. `ffd`, `skinCluster`).
    Other(String),
}

/// A deformer node.
#[derive(Debug, Clone)]
pub struct DeformerData {
    pub name: String,
    pub kind: DeformerKind,
    pub geometries: Vec<GeometryId>,
    /// Member points in membership order.
    pub members: Vec<PointId>,
    pub weights: HashMap<PointId, f64>,
    pub attributes: ClusterAttributes,
    pub envelope: f64,
    pub handle: Option<HandleId>,
}

/// A cluster handle; its offset moves the cluster's members.
#[derive(Debug, Clone)]
pub struct HandleData {
    pub name: String,
    pub deformer: DeformerId,
    pub offset: Vector3,
}

/// A grouping transform.
#[derive(Debug, Clone)]
pub struct GroupData {
    pub name: String,
    pub children: Vec<Node>,
}

/// An in-memory scene graph implementing [`Scene`].
///
/// Point positions are evaluated on demand: rest position, plus the geometry's
/// translation, plus `envelope * weight * handle offset` of every cluster that
/// has the point as a member.
#[derive(Debug, Default)]
pub struct MemoryScene {
    geometries: SlotMap<GeometryId, GeometryData>,
    deformers: SlotMap<DeformerId, DeformerData>,
    handles: SlotMap<HandleId, HandleData>,
    groups: SlotMap<GroupId, GroupData>,
    selection: Vec<Node>,
    errors: Vec<String>,
}

impl MemoryScene {
    /// Creates a new, empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Geometry ---

    /// Adds a mesh with the given rest vertex positions.
    pub fn add_mesh(&mut self, name: impl Into<String>, vertices: Vec<Point3>) -> GeometryId {
        self.geometries.insert(GeometryData {
            name: name.into(),
            shape: Shape::Mesh { vertices },
            translation: Vector3::zeros(),
        })
    }

    /// Adds a lattice whose control points evenly span the box `min..max`.
    pub fn add_lattice(
        &mut self,
        name: impl Into<String>,
        divisions: [usize; 3],
        min: Point3,
        max: Point3,
    ) -> GeometryId {
        #[allow(clippy::cast_precision_loss)]
        let step = |axis: usize, i: usize| {
            if divisions[axis] < 2 {
                min[axis]
            } else {
                let frac = i as f64 / (divisions[axis] - 1) as f64;
                min[axis] + frac * (max[axis] - min[axis])
            }
        };
        let [ds, dt, du] = divisions;
        let mut points = Vec::with_capacity(ds * dt * du);
        for u in 0..du {
            for t in 0..dt {
                for s in 0..ds {
                    points.push(Point3::new(step(0, s), step(1, t), step(2, u)));
                }
            }
        }
        self.geometries.insert(GeometryData {
            name: name.into(),
            shape: Shape::Lattice { divisions, points },
            translation: Vector3::zeros(),
        })
    }

    /// Adds a shape of a kind the mirroring operations do not support.
    pub fn add_other_shape(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> GeometryId {
        self.geometries.insert(GeometryData {
            name: name.into(),
            shape: Shape::Other {
                type_name: type_name.into(),
            },
            translation: Vector3::zeros(),
        })
    }

    /// Returns a reference to the geometry data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the scene.
    pub fn geometry(&self, id: GeometryId) -> Result<&GeometryData, SceneError> {
        self.geometries
            .get(id)
            .ok_or_else(|| SceneError::EntityNotFound("geometry".into()))
    }

    /// Returns a mutable reference to the geometry data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the scene.
    pub fn geometry_mut(&mut self, id: GeometryId) -> Result<&mut GeometryData, SceneError> {
        self.geometries
            .get_mut(id)
            .ok_or_else(|| SceneError::EntityNotFound("geometry".into()))
    }

    // --- Deformers ---

    /// Creates a cluster over the given points with the given weights.
    ///
    /// # Errors
    ///
    /// Returns an error if `members` is empty or names a missing point.
    pub fn add_cluster(
        &mut self,
        members: &[(PointId, f64)],
    ) -> Result<(DeformerId, HandleId), SceneError> {
        let points: Vec<PointId> = members.iter().map(|(p, _)| *p).collect();
        let (deformer, handle) = self.create_cluster(&points)?;
        for &(point, weight) in members {
            self.set_weight(deformer, point, weight)?;
        }
        Ok((deformer, handle))
    }

    /// Adds a non-cluster deformer acting on `geometries`. It never moves points.
    ///
    /// # Errors
    ///
    /// Returns an error if any geometry is not in the scene.
    pub fn add_deformer(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        geometries: Vec<GeometryId>,
    ) -> Result<DeformerId, SceneError> {
        for &g in &geometries {
            self.geometry(g)?;
        }
        Ok(self.deformers.insert(DeformerData {
            name: name.into(),
            kind: DeformerKind::Other(type_name.into()),
            geometries,
            members: Vec::new(),
            weights: HashMap::new(),
            attributes: ClusterAttributes::default(),
            envelope: 1.0,
            handle: None,
        }))
    }

    /// Returns a reference to the deformer data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the scene.
    pub fn deformer(&self, id: DeformerId) -> Result<&DeformerData, SceneError> {
        self.deformers
            .get(id)
            .ok_or_else(|| SceneError::EntityNotFound("deformer".into()))
    }

    /// Returns a mutable reference to the deformer data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the scene.
    pub fn deformer_mut(&mut self, id: DeformerId) -> Result<&mut DeformerData, SceneError> {
        self.deformers
            .get_mut(id)
            .ok_or_else(|| SceneError::EntityNotFound("deformer".into()))
    }

    /// Iterates over all deformers in creation order.
    pub fn deformers(&self) -> impl Iterator<Item = (DeformerId, &DeformerData)> {
        self.deformers.iter()
    }

    // --- Handles and groups ---

    /// Returns a reference to the handle data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the scene.
    pub fn handle(&self, id: HandleId) -> Result<&HandleData, SceneError> {
        self.handles
            .get(id)
            .ok_or_else(|| SceneError::EntityNotFound("handle".into()))
    }

    /// Returns a mutable reference to the handle data, or an error if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not found in the scene.
    pub fn handle_mut(&mut self, id: HandleId) -> Result<&mut HandleData, SceneError> {
        self.handles
            .get_mut(id)
            .ok_or_else(|| SceneError::EntityNotFound("handle".into()))
    }

    /// Adds a group parenting `children`.
    pub fn add_group(&mut self, name: impl Into<String>, children: Vec<Node>) -> GroupId {
        self.groups.insert(GroupData {
            name: name.into(),
            children,
        })
    }

    /// Messages shown through [`Scene::display_error`], oldest first.
    #[must_use]
    pub fn displayed_errors(&self) -> &[String] {
        &self.errors
    }

    fn point_exists(&self, point: PointId) -> Result<(), SceneError> {
        let geometry = self.geometry(point.geometry)?;
        if geometry.rest_position(point.component).is_some() {
            Ok(())
        } else {
            Err(SceneError::PointNotFound {
                geometry: geometry.name.clone(),
                component: point.component.to_string(),
            })
        }
    }

    fn not_a_member(&self, deformer: &DeformerData, point: PointId) -> SceneError {
        let geometry = self
            .geometries
            .get(point.geometry)
            .map_or_else(|| deformer.name.clone(), |g| g.name.clone());
        SceneError::PointNotFound {
            geometry,
            component: point.component.to_string(),
        }
    }

    fn cluster(&self, id: DeformerId) -> Result<&DeformerData, SceneError> {
        let deformer = self.deformer(id)?;
        match deformer.kind {
            DeformerKind::Cluster => Ok(deformer),
            DeformerKind::Other(_) => Err(SceneError::NotACluster(deformer.name.clone())),
        }
    }

    fn collect_handles(&self, node: Node, out: &mut Vec<HandleId>) {
        match node {
            Node::Handle(h) => {
                if self.handles.contains_key(h) && !out.contains(&h) {
                    out.push(h);
                }
            }
            Node::Group(g) => {
                if let Some(group) = self.groups.get(g) {
                    for &child in &group.children {
                        self.collect_handles(child, out);
                    }
                }
            }
            Node::Geometry(_) | Node::Deformer(_) => {}
        }
    }
}

impl Scene for MemoryScene {
    fn selection(&self) -> Vec<Node> {
        self.selection.clone()
    }

    fn set_selection(&mut self, nodes: &[Node]) {
        self.selection = nodes.to_vec();
    }

    fn descendant_handles(&self, roots: &[Node]) -> Vec<HandleId> {
        let mut out = Vec::new();
        for &root in roots {
            self.collect_handles(root, &mut out);
        }
        out
    }

    fn handle_deformers(&self, handle: HandleId) -> Result<Vec<DeformerId>, SceneError> {
        Ok(vec![self.handle(handle)?.deformer])
    }

    fn connected_deformers(&self, node: Node) -> Result<Vec<DeformerId>, SceneError> {
        match node {
            Node::Handle(h) => self.handle_deformers(h),
            Node::Deformer(d) => Ok(match self.deformer(d)?.kind {
                DeformerKind::Cluster => vec![d],
                DeformerKind::Other(_) => Vec::new(),
            }),
            Node::Geometry(g) => {
                self.geometry(g)?;
                Ok(self
                    .deformers
                    .iter()
                    .filter(|(_, d)| d.kind == DeformerKind::Cluster && d.geometries.contains(&g))
                    .map(|(id, _)| id)
                    .collect())
            }
            Node::Group(g) => {
                if !self.groups.contains_key(g) {
                    return Err(SceneError::EntityNotFound("group".into()));
                }
                let mut out = Vec::new();
                for handle in self.descendant_handles(&[node]) {
                    for d in self.handle_deformers(handle)? {
                        if !out.contains(&d) {
                            out.push(d);
                        }
                    }
                }
                Ok(out)
            }
        }
    }

    fn shape_geometry(&self, node: Node) -> Option<GeometryId> {
        match node {
            Node::Geometry(g) if self.geometries.contains_key(g) => Some(g),
            _ => None,
        }
    }

    fn geometry_kind(&self, geometry: GeometryId) -> Result<GeometryKind, SceneError> {
        Ok(self.geometry(geometry)?.kind())
    }

    fn geometry_name(&self, geometry: GeometryId) -> Result<&str, SceneError> {
        Ok(self.geometry(geometry)?.name.as_str())
    }

    fn geometry_components(&self, geometry: GeometryId) -> Result<Vec<ComponentRange>, SceneError> {
        Ok(match &self.geometry(geometry)?.shape {
            Shape::Mesh { vertices } if !vertices.is_empty() => {
                vec![ComponentRange::Vertices(0..=vertices.len() - 1)]
            }
            Shape::Lattice {
                divisions: [ds, dt, du],
                ..
            } if *ds > 0 && *dt > 0 && *du > 0 => vec![ComponentRange::LatticePoints {
                s: 0..=ds - 1,
                t: 0..=dt - 1,
                u: 0..=du - 1,
            }],
            _ => Vec::new(),
        })
    }

    fn point_position(&self, point: PointId) -> Result<Point3, SceneError> {
        let geometry = self.geometry(point.geometry)?;
        let rest = geometry
            .rest_position(point.component)
            .ok_or_else(|| SceneError::PointNotFound {
                geometry: geometry.name.clone(),
                component: point.component.to_string(),
            })?;
        let mut position = rest + geometry.translation;
        for deformer in self.deformers.values() {
            let (Some(handle), Some(weight)) = (deformer.handle, deformer.weights.get(&point))
            else {
                continue;
            };
            if let Some(handle) = self.handles.get(handle) {
                position += handle.offset * (deformer.envelope * weight);
            }
        }
        Ok(position)
    }

    fn deformer_name(&self, deformer: DeformerId) -> Result<&str, SceneError> {
        Ok(self.deformer(deformer)?.name.as_str())
    }

    fn output_geometries(&self, deformer: DeformerId) -> Result<Vec<GeometryId>, SceneError> {
        Ok(self.deformer(deformer)?.geometries.clone())
    }

    fn deformer_history(&self, geometry: GeometryId) -> Result<Vec<DeformerId>, SceneError> {
        self.geometry(geometry)?;
        Ok(self
            .deformers
            .iter()
            .filter(|(_, d)| d.geometries.contains(&geometry))
            .map(|(id, _)| id)
            .collect())
    }

    fn deformer_handle(&self, deformer: DeformerId) -> Result<Option<HandleId>, SceneError> {
        Ok(self.deformer(deformer)?.handle)
    }

    fn membership(&self, deformer: DeformerId) -> Result<Vec<MemberRange>, SceneError> {
        let data = self.deformer(deformer)?;
        let mut ranges: Vec<MemberRange> = Vec::new();
        for point in &data.members {
            if let (Component::Vertex(i), Some(last)) = (point.component, ranges.last_mut()) {
                if let ComponentRange::Vertices(run) = &last.range {
                    let (start, end) = (*run.start(), *run.end());
                    if last.geometry == point.geometry && end + 1 == i {
                        last.range = ComponentRange::Vertices(start..=i);
                        continue;
                    }
                }
            }
            let range = match point.component {
                Component::Vertex(i) => ComponentRange::Vertices(i..=i),
                Component::LatticePoint([s, t, u]) => ComponentRange::LatticePoints {
                    s: s..=s,
                    t: t..=t,
                    u: u..=u,
                },
            };
            ranges.push(MemberRange {
                geometry: point.geometry,
                range,
            });
        }
        Ok(ranges)
    }

    fn weight(&self, deformer: DeformerId, point: PointId) -> Result<f64, SceneError> {
        let data = self.deformer(deformer)?;
        data.weights
            .get(&point)
            .copied()
            .ok_or_else(|| self.not_a_member(data, point))
    }

    fn set_weight(
        &mut self,
        deformer: DeformerId,
        point: PointId,
        weight: f64,
    ) -> Result<(), SceneError> {
        let data = self.deformer(deformer)?;
        if !data.weights.contains_key(&point) {
            return Err(self.not_a_member(data, point));
        }
        self.deformer_mut(deformer)?.weights.insert(point, weight);
        Ok(())
    }

    fn cluster_attributes(&self, deformer: DeformerId) -> Result<ClusterAttributes, SceneError> {
        Ok(self.cluster(deformer)?.attributes)
    }

    fn set_cluster_attributes(
        &mut self,
        deformer: DeformerId,
        attributes: &ClusterAttributes,
    ) -> Result<(), SceneError> {
        self.cluster(deformer)?;
        self.deformer_mut(deformer)?.attributes = *attributes;
        Ok(())
    }

    fn envelope(&self, deformer: DeformerId) -> Result<f64, SceneError> {
        Ok(self.deformer(deformer)?.envelope)
    }

    fn set_envelope(&mut self, deformer: DeformerId, envelope: f64) -> Result<(), SceneError> {
        self.deformer_mut(deformer)?.envelope = envelope;
        Ok(())
    }

    fn create_cluster(&mut self, points: &[PointId]) -> Result<(DeformerId, HandleId), SceneError> {
        if points.is_empty() {
            return Err(SceneError::EmptyMembership);
        }
        let mut geometries = Vec::new();
        let mut members = Vec::with_capacity(points.len());
        let mut weights = HashMap::with_capacity(points.len());
        for &point in points {
            self.point_exists(point)?;
            if !geometries.contains(&point.geometry) {
                geometries.push(point.geometry);
            }
            if weights.insert(point, 1.0).is_none() {
                members.push(point);
            }
        }

        let n = self
            .deformers
            .values()
            .filter(|d| d.kind == DeformerKind::Cluster)
            .count()
            + 1;
        let name = format!("cluster{n}");
        let deformer = self.deformers.insert(DeformerData {
            name: name.clone(),
            kind: DeformerKind::Cluster,
            geometries,
            members,
            weights,
            attributes: ClusterAttributes::default(),
            envelope: 1.0,
            handle: None,
        });
        let handle = self.handles.insert(HandleData {
            name: format!("{name}Handle"),
            deformer,
            offset: Vector3::zeros(),
        });
        self.deformer_mut(deformer)?.handle = Some(handle);
        Ok((deformer, handle))
    }

    fn display_error(&mut self, message: &str) {
        self.errors.push(message.to_owned());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad(scene: &mut MemoryScene) -> GeometryId {
        scene.add_mesh(
            "quad",
            vec![
                Point3::new(-1.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(-1.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
        )
    }

    #[test]
    fn cluster_offset_moves_members_scaled_by_envelope_and_weight() {
        let mut scene = MemoryScene::new();
        let mesh = quad(&mut scene);
        let p = PointId::vertex(mesh, 1);
        let (cluster, handle) = scene.add_cluster(&[(p, 0.5)]).unwrap();
        scene.handle_mut(handle).unwrap().offset = Vector3::new(0.0, 2.0, 0.0);

        assert_relative_eq!(scene.point_position(p).unwrap().y, 1.0);

        scene.set_envelope(cluster, 0.0).unwrap();
        assert_relative_eq!(scene.point_position(p).unwrap().y, 0.0);
    }

    #[test]
    fn geometry_translation_applies_to_world_position() {
        let mut scene = MemoryScene::new();
        let mesh = quad(&mut scene);
        scene.geometry_mut(mesh).unwrap().translation = Vector3::new(0.0, 0.0, 3.0);
        let p = scene.point_position(PointId::vertex(mesh, 0)).unwrap();
        assert_relative_eq!(p.z, 3.0);
    }

    #[test]
    fn membership_coalesces_consecutive_vertices() {
        let mut scene = MemoryScene::new();
        let mesh = quad(&mut scene);
        let members: Vec<_> = [0, 1, 2]
            .iter()
            .map(|&i| (PointId::vertex(mesh, i), 1.0))
            .collect();
        let (cluster, _) = scene.add_cluster(&members).unwrap();
        let ranges = scene.membership(cluster).unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].range, ComponentRange::Vertices(0..=2));
    }

    #[test]
    fn lattice_points_span_the_box() {
        let mut scene = MemoryScene::new();
        let lattice = scene.add_lattice(
            "ffd1Lattice",
            [3, 2, 2],
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
        );
        let p = scene
            .point_position(PointId::lattice_point(lattice, [2, 1, 0]))
            .unwrap();
        assert_relative_eq!(p.x, 1.0);
        assert_relative_eq!(p.y, 1.0);
        assert_relative_eq!(p.z, 0.0);
        assert!(scene
            .point_position(PointId::lattice_point(lattice, [3, 0, 0]))
            .is_err());
    }

    #[test]
    fn create_cluster_rejects_missing_points() {
        let mut scene = MemoryScene::new();
        let mesh = quad(&mut scene);
        let result = scene.create_cluster(&[PointId::vertex(mesh, 9)]);
        assert!(matches!(result, Err(SceneError::PointNotFound { .. })));
        assert!(matches!(
            scene.create_cluster(&[]),
            Err(SceneError::EmptyMembership)
        ));
    }

    #[test]
    fn descendant_handles_walks_groups() {
        let mut scene = MemoryScene::new();
        let mesh = quad(&mut scene);
        let (_, handle) = scene
            .add_cluster(&[(PointId::vertex(mesh, 0), 1.0)])
            .unwrap();
        let inner = scene.add_group("inner", vec![Node::Handle(handle)]);
        let outer = scene.add_group("outer", vec![Node::Group(inner), Node::Geometry(mesh)]);
        assert_eq!(scene.descendant_handles(&[Node::Group(outer)]), vec![handle]);
    }

    #[test]
    fn non_cluster_deformer_has_no_cluster_attributes() {
        let mut scene = MemoryScene::new();
        let mesh = quad(&mut scene);
        let ffd = scene.add_deformer("ffd1", "ffd", vec![mesh]).unwrap();
        assert!(matches!(
            scene.cluster_attributes(ffd),
            Err(SceneError::NotACluster(_))
        ));
        assert_eq!(scene.deformer_history(mesh).unwrap(), vec![ffd]);
    }
}
