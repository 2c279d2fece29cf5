//! Texture sources and the shared texture store
//!
//! Art is addressed by slash-separated paths without extension
//! (`Core/Male/Head/AverageNormal`). A [`TextureSource`] turns a path into a
//! [`Bitmap`]; the [`TextureStore`] layers a local art source over an
//! optional host source and memoizes decoded and adapted textures.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use limner_core::{Bitmap, FallbackTexture};
use thiserror::Error;
use tracing::debug;

use crate::png;
use crate::texture_ops;

/// Path of the three-pixel palette used by the vanilla adapter
pub const PALETTE_PATH: &str = "gray";

/// Texture loading errors
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Resolves texture paths to bitmaps
pub trait TextureSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &str;

    /// Load a texture; `Ok(None)` when the path does not exist
    fn load(&self, path: &str) -> Result<Option<Bitmap>, TextureError>;
}

impl<T: TextureSource + ?Sized> TextureSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn load(&self, path: &str) -> Result<Option<Bitmap>, TextureError> {
        (**self).load(path)
    }
}

/// PNG files under a root directory (`<root>/<path>.png`)
#[derive(Debug, Clone)]
pub struct DirTextureSource {
    name: String,
    root: PathBuf,
}

impl DirTextureSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            name: root.display().to_string(),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_for(&self, path: &str) -> PathBuf {
        self.root.join(format!("{path}.png"))
    }
}

impl TextureSource for DirTextureSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self, path: &str) -> Result<Option<Bitmap>, TextureError> {
        let file = self.file_for(path);
        if !file.is_file() {
            return Ok(None);
        }
        png::load_png(&file).map(Some)
    }
}

/// In-memory textures, for tests and generated art
#[derive(Debug, Clone, Default)]
pub struct MemoryTextureSource {
    textures: HashMap<String, Bitmap>,
}

impl MemoryTextureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bitmap: Bitmap) {
        self.textures.insert(path.into(), bitmap);
    }

    pub fn with(mut self, path: impl Into<String>, bitmap: Bitmap) -> Self {
        self.insert(path, bitmap);
        self
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl TextureSource for MemoryTextureSource {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&self, path: &str) -> Result<Option<Bitmap>, TextureError> {
        Ok(self.textures.get(path).cloned())
    }
}

/// Texture store statistics
#[derive(Debug, Clone, Default)]
pub struct TextureStats {
    /// Lookups served from a cache
    pub hits: u64,
    /// Lookups that went to a source
    pub loads: u64,
    /// Lookups that found nothing
    pub missing: u64,
    /// Vanilla adaptations performed
    pub adaptations: u64,
}

/// Decoded and adapted texture cache over a local and a host source
pub struct TextureStore {
    local: Box<dyn TextureSource>,
    host: Option<Box<dyn TextureSource>>,
    decoded: HashMap<String, Arc<Bitmap>>,
    adapted: HashMap<FallbackTexture, Arc<Bitmap>>,
    stats: TextureStats,
}

impl TextureStore {
    /// Store over local art only
    pub fn new(local: impl TextureSource + 'static) -> Self {
        Self {
            local: Box::new(local),
            host: None,
            decoded: HashMap::new(),
            adapted: HashMap::new(),
            stats: TextureStats::default(),
        }
    }

    /// Add a host source consulted when local art is missing
    pub fn with_host(mut self, host: impl TextureSource + 'static) -> Self {
        self.host = Some(Box::new(host));
        self
    }

    /// Local art first, then the host source
    pub fn texture(&mut self, path: &str) -> Result<Option<Arc<Bitmap>>, TextureError> {
        if let Some(found) = self.local_texture(path)? {
            return Ok(Some(found));
        }
        self.host_texture(path)
    }

    /// Local art only; used for masks, which never come from the host
    pub fn local_texture(&mut self, path: &str) -> Result<Option<Arc<Bitmap>>, TextureError> {
        let key = format!("local:{path}");
        if let Some(cached) = self.decoded.get(&key) {
            self.stats.hits += 1;
            return Ok(Some(Arc::clone(cached)));
        }
        let loaded = self.local.load(path)?;
        Ok(self.remember(key, path, loaded))
    }

    fn host_texture(&mut self, path: &str) -> Result<Option<Arc<Bitmap>>, TextureError> {
        let Some(host) = &self.host else {
            return Ok(None);
        };
        let key = format!("host:{path}");
        if let Some(cached) = self.decoded.get(&key) {
            self.stats.hits += 1;
            return Ok(Some(Arc::clone(cached)));
        }
        let loaded = host.load(path)?;
        Ok(self.remember(key, path, loaded))
    }

    fn remember(&mut self, key: String, path: &str, loaded: Option<Bitmap>) -> Option<Arc<Bitmap>> {
        match loaded {
            Some(bitmap) => {
                self.stats.loads += 1;
                let bitmap = Arc::new(bitmap);
                self.decoded.insert(key, Arc::clone(&bitmap));
                Some(bitmap)
            }
            None => {
                self.stats.missing += 1;
                debug!(path, "Texture not found");
                None
            }
        }
    }

    /// Host sprite run through the vanilla adapter, memoized per descriptor
    pub fn adapted(
        &mut self,
        fallback: &FallbackTexture,
    ) -> Result<Option<Arc<Bitmap>>, TextureError> {
        if let Some(cached) = self.adapted.get(fallback) {
            self.stats.hits += 1;
            return Ok(Some(Arc::clone(cached)));
        }
        let raw = match self.host_texture(&fallback.path)? {
            Some(raw) => raw,
            None => match self.local_texture(&fallback.path)? {
                Some(raw) => raw,
                None => return Ok(None),
            },
        };
        let palette = self.local_texture(PALETTE_PATH)?;
        let result = Arc::new(texture_ops::adapt_vanilla(
            &raw,
            palette.as_deref(),
            fallback.y_offset,
            fallback.recolor,
        ));
        self.stats.adaptations += 1;
        debug!(path = %fallback.path, y_offset = fallback.y_offset, "Adapted host texture");
        self.adapted.insert(fallback.clone(), Arc::clone(&result));
        Ok(Some(result))
    }

    /// Drop every decoded and adapted texture
    pub fn reload_all(&mut self) {
        debug!(
            decoded = self.decoded.len(),
            adapted = self.adapted.len(),
            "Clearing texture caches"
        );
        self.decoded.clear();
        self.adapted.clear();
    }

    /// Number of cached textures (decoded + adapted)
    pub fn cached_count(&self) -> usize {
        self.decoded.len() + self.adapted.len()
    }

    pub fn stats(&self) -> &TextureStats {
        &self.stats
    }

    pub fn source_names(&self) -> Vec<&str> {
        let mut names = vec![self.local.name()];
        if let Some(host) = &self.host {
            names.push(host.name());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use limner_core::{Color, Recolor};

    #[test]
    fn test_local_then_host() {
        let local = MemoryTextureSource::new().with("a", Bitmap::filled(1, 1, Color::WHITE));
        let host = MemoryTextureSource::new()
            .with("a", Bitmap::filled(1, 1, Color::BLACK))
            .with("b", Bitmap::filled(1, 1, Color::BLACK));
        let mut store = TextureStore::new(local).with_host(host);

        assert_eq!(store.texture("a").unwrap().unwrap().pixel(0, 0), Color::WHITE);
        assert_eq!(store.texture("b").unwrap().unwrap().pixel(0, 0), Color::BLACK);
        assert!(store.texture("c").unwrap().is_none());
        assert!(store.local_texture("b").unwrap().is_none());
    }

    #[test]
    fn test_decoded_cache() {
        let local = MemoryTextureSource::new().with("a", Bitmap::filled(1, 1, Color::WHITE));
        let mut store = TextureStore::new(local);
        let first = store.texture("a").unwrap().unwrap();
        let second = store.texture("a").unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.stats().loads, 1);
        assert_eq!(store.stats().hits, 1);
    }

    #[test]
    fn test_adapter_cache_and_reload() {
        let host = MemoryTextureSource::new().with(
            "Things/Hair/Mop_south",
            Bitmap::filled(62, 68, Color::gray(0.5)),
        );
        let mut store = TextureStore::new(MemoryTextureSource::new()).with_host(host);
        let fallback = FallbackTexture::new("Things/Hair/Mop_south", 4, Recolor::Keep);

        let first = store.adapted(&fallback).unwrap().unwrap();
        let second = store.adapted(&fallback).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.stats().adaptations, 1);
        assert_eq!(first.dimensions(), (40, 48));

        store.reload_all();
        assert_eq!(store.cached_count(), 0);
        let third = store.adapted(&fallback).unwrap().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(store.stats().adaptations, 2);
    }

    #[test]
    fn test_adapter_missing_source() {
        let mut store = TextureStore::new(MemoryTextureSource::new());
        let fallback = FallbackTexture::new("nope_south", 4, Recolor::Palette);
        assert!(store.adapted(&fallback).unwrap().is_none());
    }

    #[test]
    fn test_dir_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Core/Unisex")).unwrap();
        let bitmap = Bitmap::filled(2, 3, Color::rgb(1.0, 0.0, 0.0));
        png::save_png(dir.path().join("Core/Unisex/Dot.png"), &bitmap).unwrap();

        let source = DirTextureSource::new(dir.path());
        assert_eq!(source.load("Core/Unisex/Dot").unwrap(), Some(bitmap));
        assert!(source.load("Core/Unisex/Missing").unwrap().is_none());
    }
}
