//! Operators combining multiple image inputs

pub mod mix;

pub use mix::MixNode;
