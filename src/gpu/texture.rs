//! Pool-owned texture records and the handles everything else holds

use glam::{UVec2, Vec4};

/// Reserved resolution meaning "no device buffer": the texture is a logical
/// uniform value (a single RGBA constant), used by operators whose result is
/// one color rather than an image.
pub const UNIFORM_RESOLUTION: UVec2 = UVec2::ZERO;

/// Non-owning reference to a texture in the [`TexturePool`](crate::gpu::TexturePool).
///
/// Handles are cheap to copy and only valid for the pool that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    pub(crate) resolution: UVec2,
    pub(crate) index: usize,
}

impl TextureHandle {
    /// Resolution of the referenced texture. [`UNIFORM_RESOLUTION`] for
    /// uniform-constant textures.
    pub fn resolution(&self) -> UVec2 {
        self.resolution
    }

    /// Whether the referenced texture is a uniform constant without a
    /// device buffer.
    pub fn is_uniform(&self) -> bool {
        self.resolution == UNIFORM_RESOLUTION
    }
}

/// A GPU-resident image buffer with its resolution and reference count.
///
/// Owned exclusively by the pool. Allocated once, recycled through the
/// reference count, and destroyed only when the pool is dropped.
#[derive(Debug)]
pub struct Texture {
    /// Device texture; `None` for uniform-constant entries.
    pub(crate) texture: Option<wgpu::Texture>,
    /// Cached full view of `texture`.
    pub(crate) view: Option<wgpu::TextureView>,
    pub(crate) resolution: UVec2,
    /// Number of edges currently carrying this texture.
    pub(crate) refs: u32,
    /// Constant value for uniform entries; ignored for image entries.
    pub(crate) uniform: Vec4,
}

impl Texture {
    /// Create a uniform-constant entry with no device buffer.
    pub(crate) fn uniform() -> Self {
        Self {
            texture: None,
            view: None,
            resolution: UNIFORM_RESOLUTION,
            refs: 0,
            uniform: Vec4::ZERO,
        }
    }

    pub fn resolution(&self) -> UVec2 {
        self.resolution
    }

    pub fn ref_count(&self) -> u32 {
        self.refs
    }
}
