//! Layer model
//!
//! A [`Layer`] is one entry of the back-to-front render stack. Layers are
//! built fresh for every render and dropped once the stack is composited.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::color::Color;

bitflags! {
    /// Canvas halves a layer may draw into
    ///
    /// `DEXTER` is the left half of the canvas (the subject's right side),
    /// `SINISTER` the right half (the subject's left side).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Sides: u8 {
        const DEXTER   = 0b01;
        const SINISTER = 0b10;
    }
}

impl Default for Sides {
    fn default() -> Self {
        Sides::all()
    }
}

/// How the vanilla adapter recolors a foreign sprite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Recolor {
    /// Map gray levels onto the three-entry palette texture
    #[serde(rename = "yes")]
    Palette,
    /// Quantize to gray levels, leaving tinting to the layer
    #[serde(rename = "gray")]
    Gray,
    /// Keep the source colors
    #[default]
    #[serde(rename = "no")]
    Keep,
}

/// Descriptor for a host sprite that must be adapted before use
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FallbackTexture {
    /// Host texture path (with direction suffix)
    pub path: String,
    /// Rows to skip from the bottom of the resized sprite
    pub y_offset: i32,
    pub recolor: Recolor,
}

impl FallbackTexture {
    pub fn new(path: impl Into<String>, y_offset: i32, recolor: Recolor) -> Self {
        Self {
            path: path.into(),
            y_offset,
            recolor,
        }
    }
}

/// Where a layer's pixels come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerSource {
    /// Native art at a texture path
    Texture(String),
    /// Host sprite run through the vanilla adapter
    Fallback(FallbackTexture),
}

impl LayerSource {
    /// Path used for display and logging
    pub fn path(&self) -> &str {
        match self {
            Self::Texture(path) => path,
            Self::Fallback(fallback) => &fallback.path,
        }
    }
}

/// Two-tone hair gradient: a mask sprite and the secondary tint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gradient {
    pub mask_path: String,
    pub color_b: Color,
}

/// A pair of eye-mark pixel positions (texture space, bottom-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EyePos {
    /// Pixel stamped with the first (iris) color
    pub pos1: (i32, i32),
    /// Pixel stamped with the second (pupil) color
    pub pos2: (i32, i32),
}

impl EyePos {
    pub const fn new(pos1: (i32, i32), pos2: (i32, i32)) -> Self {
        Self { pos1, pos2 }
    }

    /// Default positions for a two-eyed face
    pub fn defaults() -> Vec<EyePos> {
        vec![
            EyePos::new((14, 27), (15, 27)),
            EyePos::new((24, 27), (23, 27)),
        ]
    }
}

/// Explicit eye pixels stamped after the stack is composited
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EyeMarks {
    pub colors: (Color, Color),
    pub positions: Vec<EyePos>,
}

/// What a layer depicts, for inspection and ordering checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    BackGene,
    Backgear,
    Skeleton,
    Neck,
    BodyTattoo,
    BodyScar,
    Bodygear,
    BodyHediff,
    Ears,
    Skull,
    Head,
    Wrinkles,
    Mouth,
    Nose,
    Eyes,
    Facial,
    FaceTattoo,
    FaceScar,
    Injury,
    Gene,
    Beard,
    Brows,
    Facegear,
    Hair,
    Headgear,
    Headbone,
    CoversAll,
}

impl LayerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BackGene => "back-gene",
            Self::Backgear => "backgear",
            Self::Skeleton => "skeleton",
            Self::Neck => "neck",
            Self::BodyTattoo => "body-tattoo",
            Self::BodyScar => "body-scar",
            Self::Bodygear => "bodygear",
            Self::BodyHediff => "body-hediff",
            Self::Ears => "ears",
            Self::Skull => "skull",
            Self::Head => "head",
            Self::Wrinkles => "wrinkles",
            Self::Mouth => "mouth",
            Self::Nose => "nose",
            Self::Eyes => "eyes",
            Self::Facial => "facial",
            Self::FaceTattoo => "face-tattoo",
            Self::FaceScar => "face-scar",
            Self::Injury => "injury",
            Self::Gene => "gene",
            Self::Beard => "beard",
            Self::Brows => "brows",
            Self::Facegear => "facegear",
            Self::Hair => "hair",
            Self::Headgear => "headgear",
            Self::Headbone => "headbone",
            Self::CoversAll => "covers-all",
        }
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One compositable unit of the render stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub kind: LayerKind,
    pub source: LayerSource,
    /// Multiplicative tint; `None` draws the texture colors as-is
    pub tint: Option<Color>,
    /// Texture whose red channel scales the layer's alpha
    pub alpha_mask: Option<String>,
    pub gradient: Option<Gradient>,
    pub eye_marks: Option<EyeMarks>,
    pub sides: Sides,
    /// Mirror the texture horizontally
    pub flip: bool,
    /// Rows the texture is lowered by
    pub offset: i32,
    /// Rows cropped from the top of the canvas
    pub hide_top: i32,
}

impl Layer {
    /// Layer drawing native art from `path`
    pub fn texture(kind: LayerKind, path: impl Into<String>) -> Self {
        Self::from_source(kind, LayerSource::Texture(path.into()))
    }

    /// Layer drawing an adapted host sprite
    pub fn fallback(kind: LayerKind, fallback: FallbackTexture) -> Self {
        Self::from_source(kind, LayerSource::Fallback(fallback))
    }

    fn from_source(kind: LayerKind, source: LayerSource) -> Self {
        Self {
            kind,
            source,
            tint: None,
            alpha_mask: None,
            gradient: None,
            eye_marks: None,
            sides: Sides::all(),
            flip: false,
            offset: 0,
            hide_top: 0,
        }
    }

    pub fn with_tint(mut self, tint: Color) -> Self {
        self.tint = Some(tint);
        self
    }

    pub fn with_offset(mut self, offset: i32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_hide_top(mut self, hide_top: i32) -> Self {
        self.hide_top = hide_top;
        self
    }

    pub fn with_sides(mut self, sides: Sides) -> Self {
        self.sides = sides;
        self
    }

    pub fn with_alpha_mask(mut self, path: impl Into<String>) -> Self {
        self.alpha_mask = Some(path.into());
        self
    }

    pub fn with_eye_marks(mut self, marks: EyeMarks) -> Self {
        self.eye_marks = Some(marks);
        self
    }

    pub fn flipped(mut self) -> Self {
        self.flip = true;
        self
    }

    /// Stop drawing into one canvas half
    pub fn exclude(&mut self, sides: Sides) {
        self.sides.remove(sides);
    }

    /// Native texture path, if this layer draws native art
    pub fn texture_path(&self) -> Option<&str> {
        match &self.source {
            LayerSource::Texture(path) => Some(path),
            LayerSource::Fallback(_) => None,
        }
    }

    /// Same-key mask texture for two-tone tinting
    pub fn mask_path(&self) -> Option<String> {
        self.texture_path().map(|path| format!("{path}m"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_defaults() {
        let layer = Layer::texture(LayerKind::Head, "Core/Male/Head/AverageNormal");
        assert_eq!(layer.sides, Sides::all());
        assert_eq!(layer.offset, 0);
        assert!(layer.tint.is_none());
        assert_eq!(
            layer.mask_path().as_deref(),
            Some("Core/Male/Head/AverageNormalm")
        );
    }

    #[test]
    fn test_fallback_has_no_mask() {
        let layer = Layer::fallback(
            LayerKind::Hair,
            FallbackTexture::new("Things/Hair/Mop_south", 4, Recolor::Palette),
        );
        assert!(layer.mask_path().is_none());
        assert_eq!(layer.source.path(), "Things/Hair/Mop_south");
    }

    #[test]
    fn test_side_exclusion() {
        let mut ears = Layer::texture(LayerKind::Ears, "Core/Unisex/Ears/Ears_Human");
        ears.exclude(Sides::SINISTER);
        assert_eq!(ears.sides, Sides::DEXTER);
        ears.exclude(Sides::DEXTER);
        assert!(ears.sides.is_empty());
    }

    #[test]
    fn test_recolor_serde_names() {
        let r: Recolor = serde_json::from_str("\"yes\"").unwrap();
        assert_eq!(r, Recolor::Palette);
        assert_eq!(serde_json::to_string(&Recolor::Keep).unwrap(), "\"no\"");
    }
}
