//! Selection-driven entry points.
//!
//! These translate the host's current selection into explicit operation
//! arguments, report failures through [`Scene::display_error`], and update the
//! selection with the result.

use crate::error::{MirrorError, OperationError, Result, SelectionError};
use crate::operations::{CopyClusters, MirrorClusters, MirrorParams, MirrorReport};
use crate::scene::{Node, Scene};

/// Mirrors every cluster whose handle is selected or below a selected node.
///
/// On success the selection is kept and the new handles are appended to it.
/// When a cluster deforms unsupported geometry, its handles become the
/// selection so they can be inspected.
///
/// # Errors
///
/// Returns the error from [`MirrorClusters::execute`] after displaying it.
pub fn mirror_selected_clusters<S: Scene + ?Sized>(
    scene: &mut S,
    params: MirrorParams,
) -> Result<MirrorReport> {
    let selection = scene.selection();
    let handles = scene.descendant_handles(&selection);
    let result = if handles.is_empty() {
        Err(SelectionError::NoDeformerHandleSelected.into())
    } else {
        MirrorClusters::new(handles)
            .with_params(params)
            .execute(scene)
    };
    finish(scene, selection, result)
}

/// Copies the clusters of all but the last selected item onto the last one,
/// which must be a mesh.
///
/// # Errors
///
/// Returns [`SelectionError::InvalidSelection`] for fewer than two selected
/// items or a last item without geometry, otherwise the error from
/// [`CopyClusters::execute`]; either way it is displayed first.
pub fn copy_selected_clusters<S: Scene + ?Sized>(
    scene: &mut S,
    params: MirrorParams,
) -> Result<MirrorReport> {
    let selection = scene.selection();
    let result = match selection.as_slice() {
        [sources @ .., last] if !sources.is_empty() => match scene.shape_geometry(*last) {
            Some(paste) => CopyClusters::new(sources.to_vec(), paste)
                .with_params(params)
                .execute(scene),
            None => Err(SelectionError::InvalidSelection(
                "the last selected item must be a mesh".into(),
            )
            .into()),
        },
        _ => Err(SelectionError::InvalidSelection(
            "select cluster sources followed by a mesh".into(),
        )
        .into()),
    };
    finish(scene, selection, result)
}

fn finish<S: Scene + ?Sized>(
    scene: &mut S,
    mut selection: Vec<Node>,
    result: Result<MirrorReport>,
) -> Result<MirrorReport> {
    match result {
        Ok(report) => {
            selection.extend(report.handles().into_iter().map(Node::Handle));
            scene.set_selection(&selection);
            Ok(report)
        }
        Err(err) => {
            if let MirrorError::Operation(OperationError::UnsupportedGeometryKind {
                handles, ..
            }) = &err
            {
                if !handles.is_empty() {
                    let offending: Vec<Node> = handles.iter().copied().map(Node::Handle).collect();
                    scene.set_selection(&offending);
                }
            }
            scene.display_error(&err.to_string());
            Err(err)
        }
    }
}
