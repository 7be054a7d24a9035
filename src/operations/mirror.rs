use tracing::{debug, info};

use super::correspondence::{
    CorrespondenceMap, FindMirrorCorrespondence, MemberWeight, SearchStrategy,
};
use super::envelope::EnvelopeBracket;
use super::index::BuildPointIndex;
use super::params::MirrorParams;
use super::report::{MirrorReport, RebuiltCluster, SkipReason};
use crate::error::{OperationError, Result, SelectionError};
use crate::scene::{flatten, DeformerId, GeometryId, HandleId, Scene};

/// Builds a mirrored twin of each cluster driven by the given handles.
///
/// Every twin lives on the same geometry as its source. Each source member is
/// reflected across X and matched to the nearest point of its own geometry;
/// the twin gets those points, the source's weights and the source's settings.
pub struct MirrorClusters {
    handles: Vec<HandleId>,
    params: MirrorParams,
}

impl MirrorClusters {
    /// Creates a new `MirrorClusters` operation.
    #[must_use]
    pub fn new(handles: Vec<HandleId>) -> Self {
        Self {
            handles,
            params: MirrorParams::default(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: MirrorParams) -> Self {
        self.params = params;
        self
    }

    /// Executes the mirror.
    ///
    /// All clusters are validated before anything in the scene changes. Then
    /// every deformer in the history of the affected geometry is disabled so
    /// positions are read from the rest shape, and all of them are restored
    /// afterwards, even when a later step fails.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::NoDeformerHandleSelected`] if no handle
    /// resolves to a deformer, [`OperationError::UnsupportedGeometryKind`] if
    /// any cluster outputs to something other than a mesh or lattice (the scene
    /// is left untouched), or any scene error raised while rebuilding. When
    /// rebuilding fails part way, the clusters already created stay in the
    /// scene; every envelope is still restored.
    pub fn execute<S: Scene + ?Sized>(&self, scene: &mut S) -> Result<MirrorReport> {
        let mut clusters: Vec<DeformerId> = Vec::new();
        for &handle in &self.handles {
            for deformer in scene.handle_deformers(handle)? {
                if !clusters.contains(&deformer) {
                    clusters.push(deformer);
                }
            }
        }
        if clusters.is_empty() {
            return Err(SelectionError::NoDeformerHandleSelected.into());
        }

        let mut report = MirrorReport::default();
        let mut work: Vec<(DeformerId, Vec<GeometryId>)> = Vec::new();
        let mut bad_geometries = Vec::new();
        let mut bad_deformers = Vec::new();
        let mut bad_handles = Vec::new();
        for &cluster in &clusters {
            let outputs = scene.output_geometries(cluster)?;
            let mut unsupported = Vec::new();
            for &geometry in &outputs {
                if !scene.geometry_kind(geometry)?.is_point_searchable() {
                    unsupported.push(geometry);
                }
            }
            if !unsupported.is_empty() {
                bad_geometries.extend(unsupported);
                bad_deformers.push(cluster);
                bad_handles.extend(scene.deformer_handle(cluster)?);
                continue;
            }
            if outputs.is_empty() {
                let name = scene.deformer_name(cluster).unwrap_or_default();
                debug!(cluster = name, "no output geometry");
                report.skip(cluster, SkipReason::NoOutputGeometry);
                continue;
            }
            work.push((cluster, outputs));
        }
        if !bad_deformers.is_empty() {
            return Err(OperationError::UnsupportedGeometryKind {
                geometries: bad_geometries,
                deformers: bad_deformers,
                handles: bad_handles,
            }
            .into());
        }

        let mut touched: Vec<DeformerId> = Vec::new();
        for (cluster, outputs) in &work {
            for &geometry in outputs {
                for deformer in scene.deformer_history(geometry)? {
                    if !touched.contains(&deformer) {
                        touched.push(deformer);
                    }
                }
            }
            if !touched.contains(cluster) {
                touched.push(*cluster);
            }
        }

        let mut bracket = EnvelopeBracket::disable(scene, &touched)?;
        for &(cluster, _) in &work {
            let weights = mirror_membership(&*bracket, cluster, self.params.search)?;
            if weights.is_empty() {
                let name = bracket.deformer_name(cluster).unwrap_or_default();
                debug!(cluster = name, "empty membership");
                report.skip(cluster, SkipReason::EmptyMembership);
                continue;
            }
            let restore_to = match bracket.saved_envelope(cluster) {
                Some(value) => value,
                None => bracket.envelope(cluster)?,
            };
            let (deformer, handle) = rebuild_cluster(&mut *bracket, cluster, &weights)?;
            bracket.hold(deformer, Some(restore_to))?;
            info!(
                source = bracket.deformer_name(cluster).unwrap_or_default(),
                mirrored = bracket.deformer_name(deformer).unwrap_or_default(),
                points = weights.len(),
                "cluster mirrored"
            );
            report.created.push(RebuiltCluster {
                source: cluster,
                deformer,
                handle,
                mirrored: true,
            });
        }
        bracket.close()?;

        Ok(report)
    }
}

/// Mirrors a cluster's membership onto the geometry each member lives on.
///
/// Members are grouped by geometry in order of first appearance; each group is
/// searched against its own geometry's points and the results are merged.
pub(crate) fn mirror_membership<S: Scene + ?Sized>(
    scene: &S,
    cluster: DeformerId,
    search: SearchStrategy,
) -> Result<CorrespondenceMap> {
    let mut groups: Vec<(GeometryId, Vec<MemberWeight>)> = Vec::new();
    for point in flatten(&scene.membership(cluster)?) {
        let member = MemberWeight {
            point,
            position: scene.point_position(point)?,
            weight: scene.weight(cluster, point)?,
        };
        match groups.iter_mut().find(|(g, _)| *g == point.geometry) {
            Some((_, members)) => members.push(member),
            None => groups.push((point.geometry, vec![member])),
        }
    }

    let mut weights = CorrespondenceMap::new();
    for (geometry, members) in &groups {
        let index = BuildPointIndex::new(*geometry).execute(scene)?;
        let found = FindMirrorCorrespondence::new(members)
            .with_search(search)
            .execute(&index)?;
        weights.merge(&found);
    }
    Ok(weights)
}

/// Creates a cluster over `weights`' points with `source`'s settings and those weights.
pub(crate) fn rebuild_cluster<S: Scene + ?Sized>(
    scene: &mut S,
    source: DeformerId,
    weights: &CorrespondenceMap,
) -> Result<(DeformerId, HandleId)> {
    let attributes = scene.cluster_attributes(source)?;
    let (deformer, handle) = scene.create_cluster(&weights.points())?;
    scene.set_cluster_attributes(deformer, &attributes)?;
    for (point, weight) in weights.iter() {
        scene.set_weight(deformer, point, weight)?;
    }
    Ok((deformer, handle))
}
