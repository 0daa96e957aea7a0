//! Magic Drum - camera-driven air drum kit
//!
//! Tracks blue/green markers in a live webcam feed, maps their positions to
//! virtual drum-pad hitboxes and plays the mapped drum samples with a fixed
//! per-pad refractory period.

pub mod app;
pub mod audio;
pub mod camera;
pub mod config;
pub mod kit;
pub mod render;
pub mod vision;

pub use app::App;
