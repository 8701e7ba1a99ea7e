//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend. A visual
//! backend owns scene objects; the client only holds opaque handles to them.

use crate::player::Pose;

/// Opaque handle to one spawned visual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisualHandle(pub u64);

/// Scene-side collaborator driven by the reconciliation engine.
pub trait VisualBackend: Send {
    /// Creates a visual for `model_ref`. An error leaves the entity tracked
    /// without a visual.
    fn spawn_visual(&mut self, model_ref: &str, initial: Pose) -> anyhow::Result<VisualHandle>;
    fn update_visual_pose(&mut self, handle: VisualHandle, pose: Pose);
    fn despawn_visual(&mut self, handle: VisualHandle);
}

/// A no-op backend useful for headless clients and tests.
#[derive(Debug, Default)]
pub struct NullVisuals {
    next: u64,
}

impl VisualBackend for NullVisuals {
    fn spawn_visual(&mut self, _model_ref: &str, _initial: Pose) -> anyhow::Result<VisualHandle> {
        self.next += 1;
        Ok(VisualHandle(self.next))
    }

    fn update_visual_pose(&mut self, _handle: VisualHandle, _pose: Pose) {}

    fn despawn_visual(&mut self, _handle: VisualHandle) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_visuals_hand_out_distinct_handles() {
        let mut v = NullVisuals::default();
        let a = v.spawn_visual("a", Pose::default()).unwrap();
        let b = v.spawn_visual("b", Pose::default()).unwrap();
        assert_ne!(a, b);
    }
}
