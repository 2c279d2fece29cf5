//! Avatar pipeline orchestration
//!
//! [`AvatarPipeline`] owns everything a host needs to draw avatars: the def
//! database, settings, the texture store, the renderer and the per-subject
//! cache. It also manages static portrait files and portrait generation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use limner_core::{
    AvatarSettings, Bitmap, DefDatabase, DefError, DisplayOptions, Subject, SubjectId,
};
use limner_raster::{
    CompositeError, Compositor, TextureError, TextureSource, TextureStore, save_png,
    save_upscaled_png,
};
use thiserror::Error;
use tracing::{Level, debug, info, span};

use crate::cache::{AvatarCache, CacheStats};
use crate::clock::{Clock, SystemClock};
use crate::generate::{GenerationStatus, PortraitGenerator};
use crate::prompts::{PromptDatabase, build_prompt};
use crate::renderer::{AvatarRenderer, RenderedAvatar};
use crate::selector::{PartSelector, Selection};

/// Suffix added to a disabled static portrait's file stem
pub const BACKUP_SUFFIX: &str = "-backup";

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Texture error: {0}")]
    Texture(#[from] TextureError),

    #[error("Composite error: {0}")]
    Composite(#[from] CompositeError),

    #[error("Definition error: {0}")]
    Def(#[from] DefError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Portrait generation failed: {0}")]
    Generation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Default static portrait directory
pub fn default_static_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("limner")
        .join("avatar")
}

/// Renders, caches and exports avatars
pub struct AvatarPipeline {
    defs: DefDatabase,
    prompts: PromptDatabase,
    settings: AvatarSettings,
    store: TextureStore,
    renderer: AvatarRenderer,
    cache: AvatarCache,
}

impl AvatarPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Current avatar for a subject, from the cache when possible
    ///
    /// A static portrait file, when present, takes priority.
    pub fn avatar(
        &mut self,
        subject: &Subject,
        options: &DisplayOptions,
    ) -> Result<Arc<Bitmap>, PipelineError> {
        let static_path = self.static_path(subject);
        let Self {
            defs,
            settings,
            store,
            renderer,
            cache,
            ..
        } = self;
        cache.get_or_render(subject.id, options, Some(static_path.as_path()), |canvas| {
            renderer
                .render(subject, options, defs, settings, store, canvas)
                .map(|rendered| rendered.bitmap)
                .map_err(PipelineError::from)
        })
    }

    /// Render without touching the cache
    pub fn render_uncached(
        &mut self,
        subject: &Subject,
        options: &DisplayOptions,
    ) -> Result<RenderedAvatar, PipelineError> {
        let mut canvas = Compositor::canvas();
        let rendered = self.renderer.render(
            subject,
            options,
            &self.defs,
            &self.settings,
            &mut self.store,
            &mut canvas,
        )?;
        Ok(rendered)
    }

    /// Resolved layer stack, for inspection
    pub fn selection(&self, subject: &Subject, options: &DisplayOptions) -> Selection {
        PartSelector::new(&self.defs, &self.settings).resolve(subject, options)
    }

    /// Subject state changed
    pub fn invalidate(&mut self, id: &SubjectId) {
        self.cache.invalidate(id);
    }

    /// Subject no longer shown anywhere
    pub fn evict(&mut self, id: &SubjectId) {
        self.cache.evict(id);
    }

    /// Drop cache entries for subjects not in `keep`
    pub fn retain(&mut self, keep: &[SubjectId]) {
        self.cache.retain(|id| keep.contains(id));
    }

    /// Drop every cached texture and avatar
    pub fn reload_all(&mut self) {
        info!(
            cached_textures = self.store.cached_count(),
            cached_avatars = self.cache.len(),
            "Reloading all textures"
        );
        self.store.reload_all();
        self.cache.invalidate_all();
    }

    /// Hit test on the displayed avatar (normalized coordinates)
    pub fn is_opaque_at(
        &mut self,
        subject: &Subject,
        options: &DisplayOptions,
        u: f32,
        v: f32,
    ) -> Result<bool, PipelineError> {
        Ok(self.avatar(subject, options)?.is_opaque_at(u, v))
    }

    /// Export the displayed avatar as PNG, optionally upscaled to 480x576
    pub fn export_png(
        &mut self,
        subject: &Subject,
        options: &DisplayOptions,
        path: &Path,
        upscaled: bool,
    ) -> Result<(), PipelineError> {
        let bitmap = self.avatar(subject, options)?;
        if upscaled {
            save_upscaled_png(path, &bitmap)?;
        } else {
            save_png(path, &bitmap)?;
        }
        debug!(path = %path.display(), upscaled, "Exported avatar");
        Ok(())
    }

    pub fn static_dir(&self) -> PathBuf {
        self.settings
            .static_dir
            .clone()
            .unwrap_or_else(default_static_dir)
    }

    /// Where a subject's static portrait lives
    pub fn static_path(&self, subject: &Subject) -> PathBuf {
        self.static_dir().join(format!("{}.png", subject.file_stem()))
    }

    /// `<stem>-backup.png` next to the portrait
    fn backup_path(path: &Path) -> PathBuf {
        let mut name = path.file_stem().unwrap_or_default().to_os_string();
        name.push(BACKUP_SUFFIX);
        name.push(".png");
        path.with_file_name(name)
    }

    pub fn has_static(&self, subject: &Subject) -> bool {
        self.static_path(subject).is_file()
    }

    /// Switch a subject to a static portrait
    ///
    /// Restores a previously disabled portrait when one exists, otherwise
    /// exports the computed avatar upscaled.
    pub fn enable_static(
        &mut self,
        subject: &Subject,
        options: &DisplayOptions,
    ) -> Result<PathBuf, PipelineError> {
        let path = self.static_path(subject);
        let backup = Self::backup_path(&path);
        if backup.is_file() {
            std::fs::rename(&backup, &path).map_err(io_error(&path))?;
            info!(path = %path.display(), "Restored static portrait");
        } else if !path.is_file() {
            let rendered = self.render_uncached(subject, options)?;
            save_upscaled_png(&path, &rendered.bitmap)?;
            info!(path = %path.display(), "Exported static portrait");
        }
        self.cache.forget_static(&subject.id);
        Ok(path)
    }

    /// Move a subject's static portrait aside
    pub fn disable_static(&mut self, subject: &Subject) -> Result<(), PipelineError> {
        let path = self.static_path(subject);
        if path.is_file() {
            let backup = Self::backup_path(&path);
            if backup.is_file() {
                std::fs::remove_file(&backup).map_err(io_error(&backup))?;
            }
            std::fs::rename(&path, &backup).map_err(io_error(&path))?;
            info!(path = %backup.display(), "Static portrait moved aside");
        }
        self.cache.forget_static(&subject.id);
        Ok(())
    }

    /// Prompt describing the subject for the portrait generator
    pub fn prompt(&self, subject: &Subject, options: &DisplayOptions) -> String {
        build_prompt(subject, &self.prompts, &self.settings, options)
    }

    /// Export a static portrait and run the configured generator on it
    pub fn generate_portrait(
        &mut self,
        subject: &Subject,
        options: &DisplayOptions,
    ) -> Result<GenerationStatus, PipelineError> {
        let span = span!(Level::DEBUG, "generate_portrait", subject = %subject.id);
        let _enter = span.enter();

        let generator = PortraitGenerator::new(self.settings.ai_gen_executable.clone());
        if !generator.is_enabled() {
            return Ok(GenerationStatus::Disabled);
        }
        let path = self.enable_static(subject, options)?;
        let prompt = self.prompt(subject, options);
        let status = generator.run(&path, &prompt);
        self.cache.forget_static(&subject.id);
        Ok(status)
    }

    pub fn defs(&self) -> &DefDatabase {
        &self.defs
    }

    pub fn settings(&self) -> &AvatarSettings {
        &self.settings
    }

    pub fn texture_store(&self) -> &TextureStore {
        &self.store
    }

    pub fn cache_stats(&self) -> &CacheStats {
        self.cache.stats()
    }

    pub fn cache(&self) -> &AvatarCache {
        &self.cache
    }
}

/// Pipeline builder
pub struct PipelineBuilder {
    defs: DefDatabase,
    prompts: PromptDatabase,
    settings: AvatarSettings,
    local: Option<Box<dyn TextureSource>>,
    host: Option<Box<dyn TextureSource>>,
    clock: Option<Arc<dyn Clock>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            defs: DefDatabase::new(),
            prompts: PromptDatabase::new(),
            settings: AvatarSettings::default(),
            local: None,
            host: None,
            clock: None,
        }
    }

    pub fn defs(mut self, defs: DefDatabase) -> Self {
        self.defs = defs;
        self
    }

    pub fn prompts(mut self, prompts: PromptDatabase) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn settings(mut self, settings: AvatarSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Native art source (required)
    pub fn local_source(mut self, source: impl TextureSource + 'static) -> Self {
        self.local = Some(Box::new(source));
        self
    }

    /// Host sprites used for fallbacks
    pub fn host_source(mut self, source: impl TextureSource + 'static) -> Self {
        self.host = Some(Box::new(source));
        self
    }

    /// Time source for throttling and static polling
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn build(self) -> Result<AvatarPipeline, PipelineError> {
        let local = self
            .local
            .ok_or_else(|| PipelineError::Config("no local texture source".to_string()))?;
        let mut store = TextureStore::new(local);
        if let Some(host) = self.host {
            store = store.with_host(host);
        }
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()));
        let cache = AvatarCache::new(
            clock,
            Duration::from_millis(self.settings.throttle_ms),
            Duration::from_millis(self.settings.static_poll_ms),
        );

        info!(
            defs = self.defs.len(),
            prompts = self.prompts.len(),
            sources = ?store.source_names(),
            "Building avatar pipeline"
        );

        Ok(AvatarPipeline {
            defs: self.defs,
            prompts: self.prompts,
            settings: self.settings,
            store,
            renderer: AvatarRenderer::new(),
            cache,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
