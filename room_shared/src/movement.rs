//! Movement model.
//!
//! Pure mapping from (pose, intent) to the next pose. One call is one
//! processed intent; steps are fixed and not scaled by elapsed time.

use crate::{
    math::Vec3,
    player::{Intent, Pose},
};

/// Per-intent step sizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementParams {
    /// Distance covered by one forward/back intent.
    pub move_speed: f32,
    /// Angle (radians) turned by one turn intent. Only the sign of the axis
    /// matters, never its magnitude.
    pub turn_speed: f32,
}

impl Default for MovementParams {
    fn default() -> Self {
        Self {
            move_speed: 0.5,
            turn_speed: std::f32::consts::PI / 16.0,
        }
    }
}

/// Applies one intent. Movement uses the facing *before* this intent's turn.
pub fn apply(pose: Pose, intent: Intent, params: &MovementParams) -> Pose {
    let mut next = pose;

    if !intent.move_axis.is_zero() {
        next.position += Vec3::forward(pose.facing) * (intent.move_axis.sign() * params.move_speed);
    }

    if !intent.turn_axis.is_zero() {
        next.facing += intent.turn_axis.sign() * params.turn_speed;
    }

    next
}
