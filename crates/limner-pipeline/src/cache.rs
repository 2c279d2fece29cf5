//! Per-subject avatar cache
//!
//! Each subject gets one [`CacheEntry`] owning its working canvas and final
//! bitmap. Invalidations are throttled: inside the throttle window after a
//! render they only mark the entry pending, and the next request performs
//! a single rebuild no matter how many invalidations arrived.
//!
//! A static portrait file, when present, is served instead of the computed
//! bitmap. The file is polled at a slower interval and reloaded only when
//! its modification time changes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use limner_core::{Bitmap, DisplayOptions, SubjectId};
use limner_raster::{Compositor, load_png};
use tracing::{debug, warn};

use crate::clock::Clock;

/// A static portrait loaded from disk
#[derive(Debug, Clone)]
pub struct StaticPortrait {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub bitmap: Arc<Bitmap>,
}

/// Cached avatar state for one subject
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Working canvas reused across renders
    working: Option<Bitmap>,
    /// Last computed bitmap
    final_bitmap: Option<Arc<Bitmap>>,
    /// Final bitmap is stale and must be rebuilt on the next request
    dirty: bool,
    /// Invalidation deferred by the throttle
    pending_invalidate: bool,
    last_render: Option<Duration>,
    last_static_check: Option<Duration>,
    static_portrait: Option<StaticPortrait>,
    options: DisplayOptions,
    created_at: Duration,
    last_accessed: Duration,
    access_count: u64,
}

impl CacheEntry {
    fn new(options: DisplayOptions, now: Duration) -> Self {
        Self {
            working: None,
            final_bitmap: None,
            dirty: false,
            pending_invalidate: false,
            last_render: None,
            last_static_check: None,
            static_portrait: None,
            options,
            created_at: now,
            last_accessed: now,
            access_count: 0,
        }
    }

    fn touch(&mut self, now: Duration) {
        self.last_accessed = now;
        self.access_count += 1;
    }

    /// Release both bitmaps
    fn free(&mut self) {
        self.working = None;
        self.final_bitmap = None;
        self.dirty = false;
        self.pending_invalidate = false;
    }

    /// Whether a computed bitmap is held
    pub fn is_fresh(&self) -> bool {
        self.final_bitmap.is_some() && !self.dirty
    }

    pub fn is_pending(&self) -> bool {
        self.pending_invalidate
    }

    pub fn options(&self) -> &DisplayOptions {
        &self.options
    }

    pub fn static_portrait(&self) -> Option<&StaticPortrait> {
        self.static_portrait.as_ref()
    }

    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    /// Time since creation, by the cache clock
    pub fn age(&self, now: Duration) -> Duration {
        now.saturating_sub(self.created_at)
    }

    /// Estimate memory usage in bytes
    pub fn memory_size(&self) -> usize {
        let working = self.working.as_ref().map(|b| b.memory_size()).unwrap_or(0);
        let computed = self
            .final_bitmap
            .as_ref()
            .map(|b| b.memory_size())
            .unwrap_or(0);
        let portrait = self
            .static_portrait
            .as_ref()
            .map(|p| p.bitmap.memory_size())
            .unwrap_or(0);
        working + computed + portrait + std::mem::size_of::<Self>()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Total avatar requests
    pub lookups: u64,
    /// Requests served from a computed bitmap
    pub hits: u64,
    /// Requests served from a static portrait
    pub static_hits: u64,
    /// Full re-layer and composite runs
    pub renders: u64,
    /// Failed rebuilds answered with the previous bitmap
    pub degraded: u64,
    /// Invalidation requests received
    pub invalidations: u64,
    /// Invalidations folded into an already pending one
    pub coalesced: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate (0.0 - 1.0), static portraits included
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            (self.hits + self.static_hits) as f64 / self.lookups as f64
        }
    }
}

/// Avatar cache keyed by subject
pub struct AvatarCache {
    entries: HashMap<SubjectId, CacheEntry>,
    clock: Arc<dyn Clock>,
    throttle: Duration,
    static_poll: Duration,
    stats: CacheStats,
}

impl AvatarCache {
    pub fn new(clock: Arc<dyn Clock>, throttle: Duration, static_poll: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            clock,
            throttle,
            static_poll,
            stats: CacheStats::default(),
        }
    }

    /// Current avatar for a subject, rendering when needed
    ///
    /// `render` receives the entry's working canvas and returns the final
    /// bitmap. When a rebuild fails but an older bitmap exists, the older
    /// bitmap is returned and the entry stays dirty.
    pub fn get_or_render<E, F>(
        &mut self,
        id: SubjectId,
        options: &DisplayOptions,
        static_path: Option<&Path>,
        render: F,
    ) -> Result<Arc<Bitmap>, E>
    where
        E: std::fmt::Display,
        F: FnOnce(&mut Bitmap) -> Result<Bitmap, E>,
    {
        let now = self.clock.now();
        self.stats.lookups += 1;
        let entry = self
            .entries
            .entry(id)
            .or_insert_with(|| CacheEntry::new(*options, now));
        entry.touch(now);

        if entry.options != *options {
            debug!(subject = %id, "Display options changed");
            entry.options = *options;
            entry.free();
        }

        if entry.pending_invalidate && elapsed_since(entry.last_render, now) >= self.throttle {
            debug!(subject = %id, "Applying deferred invalidation");
            entry.pending_invalidate = false;
            entry.dirty = true;
        }

        if let Some(path) = static_path {
            let nothing_shown = entry.final_bitmap.is_none() && entry.static_portrait.is_none();
            if nothing_shown || elapsed_since(entry.last_static_check, now) >= self.static_poll {
                refresh_static(entry, path, now);
            }
        } else {
            entry.static_portrait = None;
        }

        if let Some(portrait) = &entry.static_portrait {
            self.stats.static_hits += 1;
            return Ok(Arc::clone(&portrait.bitmap));
        }
        if let Some(bitmap) = &entry.final_bitmap {
            if !entry.dirty {
                self.stats.hits += 1;
                return Ok(Arc::clone(bitmap));
            }
        }

        let mut working = entry.working.take().unwrap_or_else(Compositor::canvas);
        self.stats.renders += 1;
        let result = render(&mut working);
        entry.working = Some(working);
        entry.last_render = Some(now);
        match result {
            Ok(bitmap) => {
                let bitmap = Arc::new(bitmap);
                entry.final_bitmap = Some(Arc::clone(&bitmap));
                entry.dirty = false;
                Ok(bitmap)
            }
            Err(err) => match &entry.final_bitmap {
                Some(previous) => {
                    warn!(subject = %id, error = %err, "Rebuild failed, keeping previous avatar");
                    self.stats.degraded += 1;
                    Ok(Arc::clone(previous))
                }
                None => Err(err),
            },
        }
    }

    /// Subject changed; throttled
    pub fn invalidate(&mut self, id: &SubjectId) {
        let now = self.clock.now();
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        self.stats.invalidations += 1;
        if entry.final_bitmap.is_none() {
            return;
        }
        if elapsed_since(entry.last_render, now) >= self.throttle {
            debug!(subject = %id, "Invalidated avatar");
            entry.free();
        } else if entry.pending_invalidate {
            self.stats.coalesced += 1;
        } else {
            debug!(subject = %id, "Invalidation deferred by throttle");
            entry.pending_invalidate = true;
        }
    }

    /// Free every computed bitmap, ignoring the throttle
    pub fn invalidate_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.free();
            entry.last_static_check = None;
        }
    }

    /// Forget the static portrait so the next request checks the disk
    pub fn forget_static(&mut self, id: &SubjectId) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.static_portrait = None;
            entry.last_static_check = None;
        }
    }

    /// Last computed bitmap, ignoring static portraits and staleness
    pub fn computed(&self, id: &SubjectId) -> Option<Arc<Bitmap>> {
        self.entries
            .get(id)
            .and_then(|e| e.final_bitmap.as_ref().map(Arc::clone))
    }

    pub fn entry(&self, id: &SubjectId) -> Option<&CacheEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &SubjectId) -> bool {
        self.entries.contains_key(id)
    }

    /// Drop a subject's entry
    pub fn evict(&mut self, id: &SubjectId) -> Option<CacheEntry> {
        let entry = self.entries.remove(id)?;
        self.stats.evictions += 1;
        Some(entry)
    }

    /// Keep only the subjects for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&SubjectId) -> bool) {
        let before = self.entries.len();
        self.entries.retain(|id, _| keep(id));
        self.stats.evictions += (before - self.entries.len()) as u64;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn throttle(&self) -> Duration {
        self.throttle
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Estimated memory held by all entries
    pub fn memory_size(&self) -> usize {
        self.entries.values().map(CacheEntry::memory_size).sum()
    }
}

fn elapsed_since(then: Option<Duration>, now: Duration) -> Duration {
    match then {
        Some(then) => now.saturating_sub(then),
        None => Duration::MAX,
    }
}

fn refresh_static(entry: &mut CacheEntry, path: &Path, now: Duration) {
    entry.last_static_check = Some(now);
    let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(_) => {
            entry.static_portrait = None;
            return;
        }
    };
    let unchanged = entry
        .static_portrait
        .as_ref()
        .is_some_and(|p| p.path == path && p.modified == modified);
    if unchanged {
        return;
    }
    match load_png(path) {
        Ok(bitmap) => {
            debug!(path = %path.display(), "Loaded static portrait");
            entry.static_portrait = Some(StaticPortrait {
                path: path.to_path_buf(),
                modified,
                bitmap: Arc::new(bitmap),
            });
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable static portrait");
            entry.static_portrait = None;
        }
    }
}
