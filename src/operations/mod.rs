mod copy;
mod correspondence;
mod envelope;
mod index;
mod mirror;
mod params;
mod report;

pub use copy::CopyClusters;
pub use correspondence::{
    CorrespondenceMap, FindMirrorCorrespondence, MemberWeight, SearchStrategy,
};
pub use envelope::EnvelopeBracket;
pub use index::{BuildPointIndex, PointSet};
pub use mirror::MirrorClusters;
pub use params::MirrorParams;
pub use report::{MirrorReport, RebuiltCluster, SkipReason, SkippedDeformer};
