// Simulation core and effect library for the shimmer gallery.
//
// Everything here is headless: the windowed app in main.rs owns the event
// loop and the GPU surface, and hands this crate pointer events plus an RGBA
// upload buffer to fill each frame.

pub mod composite;
pub mod driver;
pub mod effects;
pub mod field;
pub mod input;
pub mod ripple;
pub mod tuning;
