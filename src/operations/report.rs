use crate::scene::{DeformerId, GeometryKind, HandleId};

/// A cluster created from a source cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuiltCluster {
    /// The cluster whose membership and settings were copied.
    pub source: DeformerId,
    /// The newly created cluster.
    pub deformer: DeformerId,
    /// The handle driving the new cluster.
    pub handle: HandleId,
    /// `true` when built by nearest-point mirroring, `false` for an index copy.
    pub mirrored: bool,
}

/// Why a deformer was passed over.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The deformer deforms no geometry.
    NoOutputGeometry,
    /// The deformer deforms this many geometries where one is required.
    MultipleOutputGeometries(usize),
    /// The deformed geometry is of a kind that cannot be copied onto.
    UnsupportedGeometryKind(GeometryKind),
    /// The deformer has no member points.
    EmptyMembership,
}

/// A deformer left unprocessed, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedDeformer {
    /// The skipped deformer.
    pub deformer: DeformerId,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Outcome of a mirror or copy operation.
#[derive(Debug, Clone, Default)]
pub struct MirrorReport {
    /// Clusters created, in processing order.
    pub created: Vec<RebuiltCluster>,
    /// Deformers passed over, in processing order.
    pub skipped: Vec<SkippedDeformer>,
}

impl MirrorReport {
    /// Handles of the created clusters, in creation order.
    #[must_use]
    pub fn handles(&self) -> Vec<HandleId> {
        self.created.iter().map(|c| c.handle).collect()
    }

    pub(crate) fn skip(&mut self, deformer: DeformerId, reason: SkipReason) {
        self.skipped.push(SkippedDeformer { deformer, reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_has_no_handles() {
        let report = MirrorReport::default();
        assert!(report.handles().is_empty());
        assert!(report.skipped.is_empty());
    }
}
