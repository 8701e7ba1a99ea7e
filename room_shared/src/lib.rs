//! `room_shared`
//!
//! Shared libraries used by both client and server.
//!
//! Design goals:
//! - Deterministic and modular where practical.
//! - Clear separation of concerns (math, movement, net, render, config).
//! - Traits for abstraction and dependency injection.
//! - No `unsafe`.

pub mod config;
pub mod math;
pub mod movement;
pub mod net;
pub mod player;
pub mod render;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::math::*;
    pub use crate::movement::*;
    pub use crate::net::*;
    pub use crate::player::*;
    pub use crate::render::*;
}
