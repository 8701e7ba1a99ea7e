//! Input handling.
//!
//! Device events (keys, a drag-style virtual stick) land in `SharedInput`
//! whenever they happen; the sampler reads it on its own cadence through the
//! `InputDevice` trait. Both sources are reduced to tri-state axes here, so
//! nothing downstream sees raw magnitudes.

use std::sync::{Arc, Mutex, MutexGuard};

use room_shared::player::{Axis, Intent};

/// Synchronous view of the local input devices.
pub trait InputDevice: Send + Sync {
    /// Axes requested by held keys.
    fn digital_axes(&self) -> Intent;
    /// Axes requested by the analog stick, already deadzoned.
    fn analog_axes(&self) -> Intent;

    /// Combined request: per axis, a non-zero digital value wins.
    fn current_intent(&self) -> Intent {
        combine(self.digital_axes(), self.analog_axes())
    }
}

pub fn combine(digital: Intent, analog: Intent) -> Intent {
    let pick = |d: Axis, a: Axis| if d.is_zero() { a } else { d };
    Intent::new(
        pick(digital.move_axis, analog.move_axis),
        pick(digital.turn_axis, analog.turn_axis),
    )
}

/// Movement keys of the default layout (W/S/A/D or arrows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Forward,
    Back,
    Left,
    Right,
}

impl Key {
    /// Parses a key name as typed on the client console.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "w" | "arrowup" | "forward" => Some(Key::Forward),
            "s" | "arrowdown" | "back" => Some(Key::Back),
            "a" | "arrowleft" | "left" => Some(Key::Left),
            "d" | "arrowright" | "right" => Some(Key::Right),
            _ => None,
        }
    }
}

/// Maps a stick drag offset (pixels, screen coordinates with y down) to axes.
///
/// The offset is clamped to `radius`, normalized, and each component is
/// thresholded against `deadzone`. Dragging up moves forward; dragging right
/// turns right (negative turn).
pub fn analog_from_drag(dx: f32, dy: f32, radius: f32, deadzone: f32) -> Intent {
    let dist = (dx * dx + dy * dy).sqrt();
    let usable = radius > 0.0 && dist > 0.0 && dist.is_finite();
    if !usable {
        return Intent::IDLE;
    }
    let scale = dist.min(radius) / (dist * radius);
    let (nx, ny) = (dx * scale, dy * scale);
    Intent::new(
        Axis::from_analog(-ny, deadzone),
        Axis::from_analog(-nx, deadzone),
    )
}

#[derive(Debug, Default)]
struct InputFrame {
    keys: Intent,
    stick: Intent,
}

/// Cloneable input state written by device handlers and read by the sampler.
#[derive(Debug, Clone, Default)]
pub struct SharedInput {
    inner: Arc<Mutex<InputFrame>>,
}

impl SharedInput {
    pub fn new() -> Self {
        Self::default()
    }

    fn frame(&self) -> MutexGuard<'_, InputFrame> {
        // Input state stays usable even if a writer panicked mid-update.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Key down: the most recent press on an axis wins.
    pub fn press(&self, key: Key) {
        let mut f = self.frame();
        match key {
            Key::Forward => f.keys.move_axis = Axis::Positive,
            Key::Back => f.keys.move_axis = Axis::Negative,
            Key::Left => f.keys.turn_axis = Axis::Positive,
            Key::Right => f.keys.turn_axis = Axis::Negative,
        }
    }

    /// Key up: releasing either key of an axis zeroes that axis.
    pub fn release(&self, key: Key) {
        let mut f = self.frame();
        match key {
            Key::Forward | Key::Back => f.keys.move_axis = Axis::Zero,
            Key::Left | Key::Right => f.keys.turn_axis = Axis::Zero,
        }
    }

    /// Stick moved to `(dx, dy)` from where the drag started.
    pub fn drag_stick(&self, dx: f32, dy: f32, radius: f32, deadzone: f32) {
        self.frame().stick = analog_from_drag(dx, dy, radius, deadzone);
    }

    /// Drag ended: the stick recenters.
    pub fn release_stick(&self) {
        self.frame().stick = Intent::IDLE;
    }

    /// Releases every key and the stick.
    pub fn clear(&self) {
        *self.frame() = InputFrame::default();
    }
}

impl InputDevice for SharedInput {
    fn digital_axes(&self) -> Intent {
        self.frame().keys
    }

    fn analog_axes(&self) -> Intent {
        self.frame().stick
    }
}
