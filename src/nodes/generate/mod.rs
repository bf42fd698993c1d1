//! Source operators that synthesize their output

pub mod color;
pub mod uv_gradient;

pub use color::ColorNode;
pub use uv_gradient::UvGradientNode;
