//! Local intent sampler.
//!
//! Runs once per sampling tick and decides whether the current input state
//! is worth a message. At most one intent per tick leaves the client.

use room_shared::{config::EmitPolicy, player::Intent};
use tracing::trace;

use crate::input::InputDevice;

#[derive(Debug, Clone)]
pub struct IntentSampler {
    policy: EmitPolicy,
    last_emitted: Option<Intent>,
}

impl IntentSampler {
    pub fn new(policy: EmitPolicy) -> Self {
        Self {
            policy,
            last_emitted: None,
        }
    }

    pub fn last_emitted(&self) -> Option<Intent> {
        self.last_emitted
    }

    /// Returns the intent to send this tick, if any.
    pub fn sample(&mut self, current: Intent) -> Option<Intent> {
        let emit = match (self.last_emitted, self.policy) {
            (None, _) => true,
            (Some(last), EmitPolicy::OnChange) => current != last,
            (Some(last), EmitPolicy::RepeatWhileActive) => !current.is_idle() || current != last,
        };
        if !emit {
            return None;
        }
        trace!(?current, "Emitting intent");
        self.last_emitted = Some(current);
        Some(current)
    }

    /// Reads `device` and samples it.
    pub fn poll(&mut self, device: &dyn InputDevice) -> Option<Intent> {
        self.sample(device.current_intent())
    }
}
