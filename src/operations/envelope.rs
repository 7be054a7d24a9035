use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::error::Result;
use crate::scene::{DeformerId, Scene};

/// Holds deformers disabled (envelope 0) and restores them when closed.
///
/// Dereferences to the scene so work can continue while the bracket is open.
/// If the bracket is dropped without [`EnvelopeBracket::close`], for example
/// because an error propagated out of the enclosing operation, every held
/// envelope is still restored.
pub struct EnvelopeBracket<'a, S: Scene + ?Sized> {
    scene: &'a mut S,
    saved: Vec<(DeformerId, f64)>,
}

impl<'a, S: Scene + ?Sized> EnvelopeBracket<'a, S> {
    /// Snapshots the envelopes of `deformers`, then sets each to 0.
    ///
    /// # Errors
    ///
    /// Returns an error if an envelope cannot be read or written. Envelopes
    /// already disabled are restored before returning.
    pub fn disable(scene: &'a mut S, deformers: &[DeformerId]) -> Result<Self> {
        let mut bracket = Self {
            scene,
            saved: Vec::with_capacity(deformers.len()),
        };
        for &deformer in deformers {
            bracket.hold(deformer, None)?;
        }
        debug!(count = bracket.saved.len(), "deformers disabled");
        Ok(bracket)
    }

    /// Disables one more deformer.
    ///
    /// It is restored to `restore_to`, or to its current envelope when `None`.
    /// Holding a deformer twice keeps the first restore value.
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope cannot be read or written.
    pub fn hold(&mut self, deformer: DeformerId, restore_to: Option<f64>) -> Result<()> {
        if self.saved_envelope(deformer).is_some() {
            return Ok(());
        }
        let value = match restore_to {
            Some(value) => value,
            None => self.scene.envelope(deformer)?,
        };
        self.scene.set_envelope(deformer, 0.0)?;
        self.saved.push((deformer, value));
        Ok(())
    }

    /// The envelope `deformer` will be restored to, if it is held.
    #[must_use]
    pub fn saved_envelope(&self, deformer: DeformerId) -> Option<f64> {
        self.saved
            .iter()
            .find(|(d, _)| *d == deformer)
            .map(|(_, value)| *value)
    }

    /// Restores every held envelope.
    ///
    /// # Errors
    ///
    /// Returns the first failure; restoration of the remaining deformers is
    /// still attempted.
    pub fn close(mut self) -> Result<()> {
        let mut first_error = None;
        for (deformer, value) in std::mem::take(&mut self.saved) {
            if let Err(err) = self.scene.set_envelope(deformer, value) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

impl<S: Scene + ?Sized> Deref for EnvelopeBracket<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &*self.scene
    }
}

impl<S: Scene + ?Sized> DerefMut for EnvelopeBracket<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut *self.scene
    }
}

impl<S: Scene + ?Sized> Drop for EnvelopeBracket<'_, S> {
    fn drop(&mut self) {
        for (deformer, value) in std::mem::take(&mut self.saved) {
            if let Err(err) = self.scene.set_envelope(deformer, value) {
                warn!(%err, "failed to restore envelope");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::MirrorError;
    use crate::math::Point3;
    use crate::scene::{MemoryScene, PointId};

    fn two_clusters(scene: &mut MemoryScene) -> (DeformerId, DeformerId) {
        let mesh = scene.add_mesh(
            "pPlane1",
            vec![Point3::new(-1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)],
        );
        let (a, _) = scene
            .add_cluster(&[(PointId::vertex(mesh, 0), 1.0)])
            .unwrap();
        let (b, _) = scene
            .add_cluster(&[(PointId::vertex(mesh, 1), 1.0)])
            .unwrap();
        scene.set_envelope(a, 0.75).unwrap();
        (a, b)
    }

    #[test]
    fn close_restores_original_envelopes() {
        let mut scene = MemoryScene::new();
        let (a, b) = two_clusters(&mut scene);

        let bracket = EnvelopeBracket::disable(&mut scene, &[a, b]).unwrap();
        assert_eq!(bracket.envelope(a).unwrap(), 0.0);
        assert_eq!(bracket.envelope(b).unwrap(), 0.0);
        bracket.close().unwrap();

        assert_eq!(scene.envelope(a).unwrap(), 0.75);
        assert_eq!(scene.envelope(b).unwrap(), 1.0);
    }

    #[test]
    fn drop_restores_on_early_return() {
        fn fails(scene: &mut MemoryScene, deformers: &[DeformerId]) -> Result<()> {
            let _bracket = EnvelopeBracket::disable(scene, deformers)?;
            Err(MirrorError::Operation(
                crate::error::OperationError::EmptyTargetGeometry,
            ))
        }

        let mut scene = MemoryScene::new();
        let (a, b) = two_clusters(&mut scene);
        assert!(fails(&mut scene, &[a, b]).is_err());
        assert_eq!(scene.envelope(a).unwrap(), 0.75);
        assert_eq!(scene.envelope(b).unwrap(), 1.0);
    }

    #[test]
    fn held_deformer_restores_to_requested_value() {
        let mut scene = MemoryScene::new();
        let (a, b) = two_clusters(&mut scene);

        let mut bracket = EnvelopeBracket::disable(&mut scene, &[a]).unwrap();
        bracket.hold(b, Some(0.3)).unwrap();
        bracket.hold(a, Some(0.1)).unwrap();
        assert_eq!(bracket.saved_envelope(a), Some(0.75));
        bracket.close().unwrap();

        assert_eq!(scene.envelope(a).unwrap(), 0.75);
        assert_eq!(scene.envelope(b).unwrap(), 0.3);
    }
}
