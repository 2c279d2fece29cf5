//! Limner Pipeline - part selection, caching and orchestration
//!
//! ```text
//! Subject ──► PartSelector ──► [Layer] ──► Compositor ──► Bitmap
//!                 ↑                            ↑             │
//!             DefDatabase                 TextureStore       ▼
//!                                                       AvatarCache
//! ```
//!
//! [`AvatarPipeline`] ties the pieces together for a host: it renders on
//! demand, throttles invalidations per subject, serves static portraits and
//! hands portraits to an external generator.

pub mod cache;
pub mod clock;
pub mod generate;
pub mod pipeline;
pub mod prompts;
pub mod renderer;
pub mod selector;

pub use cache::{AvatarCache, CacheEntry, CacheStats, StaticPortrait};
pub use clock::{Clock, ManualClock, SystemClock};
pub use generate::{GenerationStatus, PortraitGenerator};
pub use pipeline::{AvatarPipeline, PipelineBuilder, PipelineError, default_static_dir};
pub use prompts::{PromptDatabase, PromptDef, build_prompt};
pub use renderer::{AvatarRenderer, RenderedAvatar, render_flags};
pub use selector::{PartSelector, Selection, SelectionFlags};
