//! Player, pose and intent types.
//!
//! `Player` is the authoritative record owned by the room. `Pose` is the part
//! of it that moves; clients interpolate poses and never touch `Player`.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::math::Vec3;

/// Identifies one joined session. Never reused within a server process.
///
/// Serialized as a plain number; snapshot maps carry it as a string key, so
/// deserialization accepts both forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl<'de> de::Visitor<'de> for IdVisitor {
            type Value = SessionId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a session id as number or numeric string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<SessionId, E> {
                Ok(SessionId(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<SessionId, E> {
                u64::try_from(v)
                    .map(SessionId)
                    .map_err(|_| E::custom("negative session id"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<SessionId, E> {
                v.parse().map(SessionId).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// Position plus facing about the vertical axis (radians, unbounded).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Pose {
    pub position: Vec3,
    pub facing: f32,
}

impl Pose {
    pub const fn new(position: Vec3, facing: f32) -> Self {
        Self { position, facing }
    }
}

/// Authoritative per-session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: SessionId,
    pub pose: Pose,
    /// Chosen once at join, never mutated.
    pub model_ref: String,
}

impl Player {
    pub fn new(id: SessionId, pose: Pose, model_ref: impl Into<String>) -> Self {
        Self {
            id,
            pose,
            model_ref: model_ref.into(),
        }
    }

    pub fn state(&self) -> PlayerState {
        PlayerState {
            position: self.pose.position,
            facing: self.pose.facing,
            model_ref: self.model_ref.clone(),
        }
    }
}

/// What a snapshot carries for one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub position: Vec3,
    pub facing: f32,
    pub model_ref: String,
}

impl PlayerState {
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.facing)
    }
}

/// Tri-state axis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Axis {
    Negative,
    #[default]
    Zero,
    Positive,
}

impl Axis {
    /// Reduces any number to its sign. NaN and zero map to `Zero`.
    pub fn from_f64(v: f64) -> Self {
        if v > 0.0 {
            Axis::Positive
        } else if v < 0.0 {
            Axis::Negative
        } else {
            Axis::Zero
        }
    }

    /// Maps a normalized analog value to an axis, collapsing the deadzone.
    pub fn from_analog(v: f32, deadzone: f32) -> Self {
        if v.abs() > deadzone {
            Self::from_f64(v as f64)
        } else {
            Axis::Zero
        }
    }

    pub fn sign(self) -> f32 {
        match self {
            Axis::Negative => -1.0,
            Axis::Zero => 0.0,
            Axis::Positive => 1.0,
        }
    }

    pub fn is_zero(self) -> bool {
        self == Axis::Zero
    }
}

/// A client's movement request for one sampling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Intent {
    /// Forward (+) / back (-), relative to the sender's own facing.
    pub move_axis: Axis,
    /// Rotate left (+) / right (-).
    pub turn_axis: Axis,
}

impl Intent {
    pub const IDLE: Intent = Intent {
        move_axis: Axis::Zero,
        turn_axis: Axis::Zero,
    };

    pub const fn new(move_axis: Axis, turn_axis: Axis) -> Self {
        Self {
            move_axis,
            turn_axis,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.move_axis.is_zero() && self.turn_axis.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_from_number_keeps_only_sign() {
        assert_eq!(Axis::from_f64(0.3), Axis::Positive);
        assert_eq!(Axis::from_f64(-42.0), Axis::Negative);
        assert_eq!(Axis::from_f64(0.0), Axis::Zero);
        assert_eq!(Axis::from_f64(f64::NAN), Axis::Zero);
    }

    #[test]
    fn axis_from_analog_applies_deadzone() {
        assert_eq!(Axis::from_analog(0.19, 0.2), Axis::Zero);
        assert_eq!(Axis::from_analog(-0.2, 0.2), Axis::Zero);
        assert_eq!(Axis::from_analog(0.21, 0.2), Axis::Positive);
        assert_eq!(Axis::from_analog(-0.9, 0.2), Axis::Negative);
    }

    #[test]
    fn session_id_displays_as_number() {
        assert_eq!(SessionId(17).to_string(), "17");
    }

    #[test]
    fn session_id_accepts_number_and_string() {
        let a: SessionId = serde_json::from_str("5").unwrap();
        let b: SessionId = serde_json::from_str("\"5\"").unwrap();
        assert_eq!(a, SessionId(5));
        assert_eq!(b, SessionId(5));
        assert!(serde_json::from_str::<SessionId>("-1").is_err());
        assert!(serde_json::from_str::<SessionId>("\"abc\"").is_err());
    }

    #[test]
    fn player_state_carries_pose_and_model() {
        let p = Player::new(SessionId(1), Pose::new(Vec3::new(1.0, 0.0, 2.0), 0.5), "m.glb");
        let s = p.state();
        assert_eq!(s.pose(), p.pose);
        assert_eq!(s.model_ref, "m.glb");
    }
}
