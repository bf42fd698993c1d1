//! GPU resources: device context, texture pool, and compute kernels

pub mod context;
pub mod kernels;
pub mod pool;
pub mod texture;

pub use context::GpuContext;
pub use kernels::{Kernel, KernelInput};
pub use pool::{PoolStats, TexturePool};
pub use texture::{Texture, TextureHandle, UNIFORM_RESOLUTION};
