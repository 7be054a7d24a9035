use tracing::{info, warn};

use super::correspondence::CorrespondenceMap;
use super::envelope::EnvelopeBracket;
use super::mirror::{mirror_membership, rebuild_cluster};
use super::params::MirrorParams;
use super::report::{MirrorReport, RebuiltCluster, SkipReason};
use crate::error::{Result, SelectionError};
use crate::scene::{flatten, DeformerId, GeometryId, GeometryKind, Node, Scene};

/// Copies clusters connected to `sources` onto the `paste` mesh.
///
/// A cluster already deforming the paste mesh is mirrored onto it, as
/// [`super::MirrorClusters`] would. A cluster on any other mesh is copied by
/// vertex index: the paste mesh is assumed to share its topology, so vertex
/// `i` receives the weight of source vertex `i` with no distance search.
pub struct CopyClusters {
    sources: Vec<Node>,
    paste: GeometryId,
    params: MirrorParams,
}

impl CopyClusters {
    /// Creates a new `CopyClusters` operation.
    #[must_use]
    pub fn new(sources: Vec<Node>, paste: GeometryId) -> Self {
        Self {
            sources,
            paste,
            params: MirrorParams::default(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: MirrorParams) -> Self {
        self.params = params;
        self
    }

    /// Executes the copy.
    ///
    /// Clusters outputting to several geometries, or to anything but a mesh,
    /// are skipped with a warning; the rest are still processed.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::InvalidSelection`] if there are no sources,
    /// none of them connects to a cluster, or the paste target is not a mesh.
    /// Scene errors while rebuilding, such as a vertex index missing on the
    /// paste mesh, are returned as-is after envelopes are restored. Clusters
    /// created before the failure stay in the scene.
    pub fn execute<S: Scene + ?Sized>(&self, scene: &mut S) -> Result<MirrorReport> {
        if self.sources.is_empty() {
            return Err(SelectionError::InvalidSelection(
                "select one or more cluster sources followed by a mesh".into(),
            )
            .into());
        }
        if scene.geometry_kind(self.paste)? != GeometryKind::Mesh {
            return Err(SelectionError::InvalidSelection(format!(
                "'{}' is not a mesh",
                scene.geometry_name(self.paste)?
            ))
            .into());
        }

        let mut deformers: Vec<DeformerId> = Vec::new();
        for &source in &self.sources {
            for deformer in scene.connected_deformers(source)? {
                if !deformers.contains(&deformer) {
                    deformers.push(deformer);
                }
            }
        }
        if deformers.is_empty() {
            return Err(SelectionError::InvalidSelection(
                "no cluster is connected to the selected sources".into(),
            )
            .into());
        }

        let mut report = MirrorReport::default();
        let mut plan: Vec<(DeformerId, GeometryId, f64)> = Vec::new();
        for &deformer in &deformers {
            let name = scene.deformer_name(deformer).unwrap_or_default();
            let outputs = scene.output_geometries(deformer)?;
            let target = match outputs.as_slice() {
                [] => {
                    warn!(cluster = name, "cluster has no output geometry, skipped");
                    report.skip(deformer, SkipReason::NoOutputGeometry);
                    continue;
                }
                [single] => *single,
                many => {
                    warn!(
                        cluster = name,
                        outputs = many.len(),
                        "cluster deforms more than one geometry, skipped"
                    );
                    report.skip(deformer, SkipReason::MultipleOutputGeometries(many.len()));
                    continue;
                }
            };
            let kind = scene.geometry_kind(target)?;
            if kind != GeometryKind::Mesh {
                warn!(cluster = name, %kind, "cluster does not deform a mesh, skipped");
                report.skip(deformer, SkipReason::UnsupportedGeometryKind(kind));
                continue;
            }
            plan.push((deformer, target, scene.envelope(deformer)?));
        }

        let touched = if plan.iter().any(|(_, target, _)| *target == self.paste) {
            scene.deformer_history(self.paste)?
        } else {
            Vec::new()
        };

        let mut bracket = EnvelopeBracket::disable(scene, &touched)?;
        for &(source, target, envelope) in &plan {
            let mirrored = target == self.paste;
            let weights = if mirrored {
                mirror_membership(&*bracket, source, self.params.search)?
            } else {
                weights_by_index(&*bracket, source, self.paste)?
            };
            if weights.is_empty() {
                report.skip(source, SkipReason::EmptyMembership);
                continue;
            }

            let (deformer, handle) = rebuild_cluster(&mut *bracket, source, &weights)?;
            bracket.hold(deformer, Some(envelope))?;
            info!(
                source = bracket.deformer_name(source).unwrap_or_default(),
                created = bracket.deformer_name(deformer).unwrap_or_default(),
                mirrored,
                points = weights.len(),
                "cluster copied"
            );
            report.created.push(RebuiltCluster {
                source,
                deformer,
                handle,
                mirrored,
            });
        }
        bracket.close()?;

        Ok(report)
    }
}

/// Reinterprets every member of `cluster` on `paste`, keeping component indices.
fn weights_by_index<S: Scene + ?Sized>(
    scene: &S,
    cluster: DeformerId,
    paste: GeometryId,
) -> Result<CorrespondenceMap> {
    let mut weights = CorrespondenceMap::new();
    for point in flatten(&scene.membership(cluster)?) {
        weights.insert(point.on(paste), scene.weight(cluster, point)?);
    }
    Ok(weights)
}
