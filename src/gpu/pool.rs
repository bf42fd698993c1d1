//! Texture pool: owner and recycler of all GPU image buffers
//!
//! Textures are bucketed by resolution. `acquire` hands out a free
//! (zero-reference) texture before it ever allocates, so steady-state
//! evaluation recycles the same few buffers instead of growing device
//! memory. Nothing is freed until the pool itself is dropped.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{UVec2, Vec4};
use log::{debug, warn};

use crate::error::EvalError;
use crate::gpu::context::GpuContext;
use crate::gpu::texture::{Texture, TextureHandle, UNIFORM_RESOLUTION};

/// Owns every texture used by an evaluation session, grouped by resolution.
pub struct TexturePool {
    device: Arc<wgpu::Device>,
    textures: HashMap<UVec2, Vec<Texture>>,
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Total textures owned, uniform entries included.
    pub textures: usize,
    /// Sum of all reference counts.
    pub references: u32,
    /// Device memory held by image textures, in bytes.
    pub resident_bytes: u64,
}

impl TexturePool {
    pub fn new(gpu: &GpuContext) -> Self {
        Self {
            device: gpu.device_arc(),
            textures: HashMap::new(),
        }
    }

    /// Hand out a texture of the requested resolution.
    ///
    /// Reuses any zero-reference texture in the matching bucket before
    /// allocating. The returned texture stays at reference count zero until
    /// a consumer retains it, and its previous contents are unspecified:
    /// callers overwrite it with a full-resolution write.
    ///
    /// Requesting [`UNIFORM_RESOLUTION`] yields a bufferless uniform entry.
    pub fn acquire(&mut self, resolution: UVec2) -> Result<TextureHandle, EvalError> {
        if let Some(bucket) = self.textures.get(&resolution) {
            for (index, texture) in bucket.iter().enumerate() {
                if texture.refs == 0 {
                    return Ok(TextureHandle { resolution, index });
                }
            }
        }

        let texture = if resolution == UNIFORM_RESOLUTION {
            Texture::uniform()
        } else {
            self.allocate(resolution)?
        };

        let bucket = self.textures.entry(resolution).or_default();
        bucket.push(texture);
        Ok(TextureHandle {
            resolution,
            index: bucket.len() - 1,
        })
    }

    fn allocate(&self, resolution: UVec2) -> Result<Texture, EvalError> {
        // Surface OOM as a pass-fatal error instead of a device loss.
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("pool image"),
            size: wgpu::Extent3d {
                width: resolution.x,
                height: resolution.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(EvalError::AllocationFailed {
                width: resolution.x,
                height: resolution.y,
                reason: error.to_string(),
            });
        }

        debug!("allocated {}x{} pool texture", resolution.x, resolution.y);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Texture {
            texture: Some(texture),
            view: Some(view),
            resolution,
            refs: 0,
            uniform: Vec4::ZERO,
        })
    }

    /// Mark the texture as in use by one more consumer.
    pub fn retain(&mut self, handle: TextureHandle) {
        if let Some(texture) = self.get_mut(handle) {
            texture.refs += 1;
        }
    }

    /// Drop one reference. A texture back at zero references becomes
    /// eligible for the next `acquire` at its resolution. Releasing a
    /// texture already at zero is a no-op.
    pub fn release(&mut self, handle: TextureHandle) {
        let Some(texture) = self.get_mut(handle) else {
            return;
        };
        if texture.refs == 0 {
            warn!(
                "release of {}x{} texture with no references",
                handle.resolution.x, handle.resolution.y
            );
            return;
        }
        texture.refs -= 1;
    }

    pub fn ref_count(&self, handle: TextureHandle) -> u32 {
        self.get(handle).map(|texture| texture.refs).unwrap_or(0)
    }

    /// Device texture backing the handle; `None` for uniform entries.
    pub fn device_texture(&self, handle: TextureHandle) -> Option<&wgpu::Texture> {
        self.get(handle)?.texture.as_ref()
    }

    pub(crate) fn device_view(&self, handle: TextureHandle) -> Option<&wgpu::TextureView> {
        self.get(handle)?.view.as_ref()
    }

    /// Set the constant value of a uniform entry.
    pub fn set_uniform(&mut self, handle: TextureHandle, value: Vec4) {
        if let Some(texture) = self.get_mut(handle) {
            texture.uniform = value;
        }
    }

    /// Constant value of a uniform entry; `Vec4::ZERO` for image entries.
    pub fn uniform(&self, handle: TextureHandle) -> Vec4 {
        self.get(handle)
            .map(|texture| texture.uniform)
            .unwrap_or(Vec4::ZERO)
    }

    /// Number of zero-reference textures in the bucket for `resolution`.
    pub fn free_count(&self, resolution: UVec2) -> usize {
        self.textures
            .get(&resolution)
            .map(|bucket| bucket.iter().filter(|texture| texture.refs == 0).count())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            textures: 0,
            references: 0,
            resident_bytes: 0,
        };
        for bucket in self.textures.values() {
            for texture in bucket {
                stats.textures += 1;
                stats.references += texture.refs;
                if texture.texture.is_some() {
                    stats.resident_bytes +=
                        u64::from(texture.resolution.x) * u64::from(texture.resolution.y) * 16;
                }
            }
        }
        stats
    }

    fn get(&self, handle: TextureHandle) -> Option<&Texture> {
        self.textures.get(&handle.resolution)?.get(handle.index)
    }

    fn get_mut(&mut self, handle: TextureHandle) -> Option<&mut Texture> {
        self.textures.get_mut(&handle.resolution)?.get_mut(handle.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool() -> Option<(GpuContext, TexturePool)> {
        match GpuContext::new() {
            Ok(gpu) => {
                let pool = TexturePool::new(&gpu);
                Some((gpu, pool))
            }
            Err(error) => {
                eprintln!("skipping GPU test: {error}");
                None
            }
        }
    }

    #[test]
    fn acquire_reuses_free_texture() {
        let Some((_gpu, mut pool)) = test_pool() else {
            return;
        };
        let resolution = UVec2::new(8, 8);

        let first = pool.acquire(resolution).unwrap();
        pool.retain(first);

        // First texture is busy, so a second acquire must allocate.
        let second = pool.acquire(resolution).unwrap();
        assert_ne!(first, second);
        assert_eq!(pool.stats().textures, 2);

        // Releasing the first makes it the preferred candidate again.
        pool.release(first);
        let reused = pool.acquire(resolution).unwrap();
        assert_eq!(reused, first);
        assert_eq!(pool.stats().textures, 2);
    }

    #[test]
    fn release_at_zero_is_noop() {
        let Some((_gpu, mut pool)) = test_pool() else {
            return;
        };
        let handle = pool.acquire(UVec2::new(4, 4)).unwrap();

        pool.release(handle);
        pool.release(handle);
        assert_eq!(pool.ref_count(handle), 0);

        pool.retain(handle);
        assert_eq!(pool.ref_count(handle), 1);
        pool.release(handle);
        assert_eq!(pool.ref_count(handle), 0);
    }

    #[test]
    fn uniform_entries_have_no_buffer() {
        let Some((_gpu, mut pool)) = test_pool() else {
            return;
        };
        let handle = pool.acquire(UNIFORM_RESOLUTION).unwrap();

        assert!(handle.is_uniform());
        assert!(pool.device_texture(handle).is_none());
        assert_eq!(pool.stats().resident_bytes, 0);

        pool.set_uniform(handle, Vec4::new(0.1, 0.2, 0.3, 1.0));
        assert_eq!(pool.uniform(handle), Vec4::new(0.1, 0.2, 0.3, 1.0));
    }

    #[test]
    fn resident_bytes_tracks_image_allocations() {
        let Some((_gpu, mut pool)) = test_pool() else {
            return;
        };
        let _image = pool.acquire(UVec2::new(8, 4)).unwrap();
        assert_eq!(pool.stats().resident_bytes, 8 * 4 * 16);
    }
}
