//! Limner Raster - software compositing for avatar portraits
//!
//! Turns an ordered [`Layer`](limner_core::Layer) stack into pixels:
//! texture lookup and caching, the per-layer blend loop, post effects and
//! PNG import/export.

pub mod compositor;
pub mod png;
pub mod texture_ops;
pub mod textures;

pub use compositor::{CompositeError, CompositeStats, Compositor, RenderFlags};
pub use png::{UPSCALED_SIZE, decode_png, encode_png, load_png, save_png, save_upscaled_png};
pub use textures::{
    DirTextureSource, MemoryTextureSource, TextureError, TextureSource, TextureStats, TextureStore,
};
