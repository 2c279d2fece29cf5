//! Limner Core - data model for layered avatar portraits
//!
//! Limner draws small pixel-art portraits by stacking texture layers. This
//! crate holds the types every other crate shares:
//!
//! ```text
//! Subject + DefDatabase → PartSelector → [Layer] → Compositor → Bitmap
//!                                                        ↑
//!                                       AvatarSettings / DisplayOptions
//! ```
//!
//! Nothing here touches the file system except the JSON loaders for defs
//! and settings.

pub mod bitmap;
pub mod color;
pub mod defs;
pub mod layer;
pub mod settings;
pub mod subject;

/// Working canvas width in pixels
pub const CANVAS_WIDTH: u32 = 40;
/// Working canvas height in pixels
pub const CANVAS_HEIGHT: u32 = 48;

pub use bitmap::Bitmap;
pub use color::Color;
pub use defs::{DefDatabase, DefError, PartDef, SlotCategory, TexturePaths};
pub use layer::{
    EyeMarks, EyePos, FallbackTexture, Gradient, Layer, LayerKind, LayerSource, Recolor, Sides,
};
pub use settings::{AvatarSettings, DisplayOptions};
pub use subject::{
    BirthFields, BodyPart, Bracket, Features, Gender, Gene, GeneAnchor, GeneCategory, GeneColor,
    GeneGraphic, GeneLayer, GradientHair, Injury, InjuryKind, RotState, Side, StyleItem, Subject,
    SubjectId, WornItem,
};
