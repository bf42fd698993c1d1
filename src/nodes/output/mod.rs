//! Sinks that hand results to the display layer

pub mod display;

pub use display::OutputNode;
