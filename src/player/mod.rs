mod commands;
mod controller;

pub use commands::PlayerCommand;
pub use controller::{PlaybackController, PlaybackIntent};
