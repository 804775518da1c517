//! Moto application layer: the interaction surface and the terminal front-end.

pub mod cli;
pub mod repl;
pub mod surface;

pub use surface::{ChatRoom, ChatView, InteractionSurface, RoomServices, SurfaceView};
