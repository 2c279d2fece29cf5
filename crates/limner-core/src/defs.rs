//! Part definitions
//!
//! A [`PartDef`] maps a free-form key (head type, style, apparel def, injury
//! def or gene) to gendered and age-specific texture paths plus the flags
//! the part selector reads. Defs are loaded once from JSON into a
//! [`DefDatabase`] and only ever queried afterwards.
//!
//! ```json
//! { "defs": [
//!   { "category": "Head", "key": "Gaunt", "male": "Core/Male/Head/Gaunt",
//!     "female": "Core/Female/Head/Gaunt", "hide_wrinkles": true }
//! ] }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Color;
use crate::layer::EyePos;
use crate::subject::{Bracket, Gender};

/// Errors raised while loading defs or settings
#[derive(Debug, Error)]
pub enum DefError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid def {category:?}/{key}: {reason}")]
    Invalid {
        category: SlotCategory,
        key: String,
        reason: String,
    },
}

/// Slot category a def belongs to
///
/// Head, style and injury categories are keyed by a type name; apparel
/// categories by the apparel (or style) def name; gene categories by the
/// gene key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotCategory {
    Head,
    Body,
    Hair,
    Beard,
    FaceTattoo,
    BodyTattoo,
    HeadHediff,
    BodyHediff,
    Bodygear,
    Backgear,
    Facegear,
    Headgear,
    Ears,
    Nose,
    Mouth,
    Brows,
    Eyes,
    Facial,
    Headbone,
    Back,
}

impl SlotCategory {
    /// Whether defs of this category are keyed by gene
    pub fn is_gene(self) -> bool {
        matches!(
            self,
            Self::Ears
                | Self::Nose
                | Self::Mouth
                | Self::Brows
                | Self::Eyes
                | Self::Facial
                | Self::Headbone
                | Self::Back
        )
    }

    /// Whether defs of this category are keyed by apparel
    pub fn is_apparel(self) -> bool {
        matches!(
            self,
            Self::Bodygear | Self::Backgear | Self::Facegear | Self::Headgear
        )
    }
}

/// Texture paths per gender and bracket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TexturePaths {
    pub unisex: Option<String>,
    pub unisex_child: Option<String>,
    pub unisex_newborn: Option<String>,
    pub female: Option<String>,
    pub male: Option<String>,
    pub female_child: Option<String>,
    pub male_child: Option<String>,
    pub female_newborn: Option<String>,
    pub male_newborn: Option<String>,
}

impl TexturePaths {
    /// Same path for everyone
    pub fn unisex(path: impl Into<String>) -> Self {
        Self {
            unisex: Some(path.into()),
            ..Self::default()
        }
    }

    /// Pick the most specific path for a gender and bracket
    ///
    /// Unisex paths win over gendered ones; within each group a newborn path
    /// beats a child path, which beats the adult path. Newborns fall back to
    /// child art.
    pub fn resolve(&self, gender: Gender, bracket: Bracket) -> Option<&str> {
        let young = bracket.is_young();
        let newborn = bracket == Bracket::Newborn;

        if newborn && self.unisex_newborn.is_some() {
            return self.unisex_newborn.as_deref();
        }
        if young && self.unisex_child.is_some() {
            return self.unisex_child.as_deref();
        }
        if self.unisex.is_some() {
            return self.unisex.as_deref();
        }

        let (adult, child, baby) = match gender {
            Gender::Female => (&self.female, &self.female_child, &self.female_newborn),
            Gender::Male => (&self.male, &self.male_child, &self.male_newborn),
        };
        if newborn && baby.is_some() {
            return baby.as_deref();
        }
        if young && child.is_some() {
            return child.as_deref();
        }
        adult.as_deref()
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A declarative part definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartDef {
    pub category: SlotCategory,
    /// Type name, apparel def name or gene key
    pub key: String,
    #[serde(flatten)]
    pub paths: TexturePaths,
    /// Gene defs only: suppress the generic gene graphic for this gene
    #[serde(default = "default_true")]
    pub replace_modded_texture: bool,

    #[serde(default)]
    pub hide_wrinkles: bool,
    #[serde(default)]
    pub hide_hair: bool,
    #[serde(default)]
    pub hide_beard: bool,
    #[serde(default)]
    pub hide_tattoo: bool,
    #[serde(default)]
    pub hide_eyes: bool,
    #[serde(default)]
    pub hide_ears: bool,
    #[serde(default)]
    pub hide_nose: bool,
    #[serde(default)]
    pub hide_mouth: bool,
    /// Rows of hair and head hidden under headgear
    #[serde(default)]
    pub hide_top: i32,
    /// Head defs only: a missing jaw swaps to `<head path>NoJaw`
    #[serde(default)]
    pub special_no_jaw: bool,
    /// Head defs only: body def key used for the neck
    #[serde(default)]
    pub force_body_type: Option<String>,
    /// Eye defs only: override eye-mark positions
    #[serde(default)]
    pub eyes_pos: Option<Vec<EyePos>>,
    /// Eye defs only: override eye-mark colors
    #[serde(default)]
    pub color1: Option<Color>,
    #[serde(default)]
    pub color2: Option<Color>,
    /// Gene defs only: vertical offset for the generic gene graphic
    #[serde(default)]
    pub offset: Option<i32>,
}

fn default_true() -> bool {
    true
}

impl PartDef {
    pub fn new(category: SlotCategory, key: impl Into<String>, paths: TexturePaths) -> Self {
        Self {
            category,
            key: key.into(),
            paths,
            replace_modded_texture: true,
            hide_wrinkles: false,
            hide_hair: false,
            hide_beard: false,
            hide_tattoo: false,
            hide_eyes: false,
            hide_ears: false,
            hide_nose: false,
            hide_mouth: false,
            hide_top: 0,
            special_no_jaw: false,
            force_body_type: None,
            eyes_pos: None,
            color1: None,
            color2: None,
            offset: None,
        }
    }

    /// Unisex def with a single path
    pub fn unisex(category: SlotCategory, key: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(category, key, TexturePaths::unisex(path))
    }

    /// Texture path for a gender and bracket
    pub fn path(&self, gender: Gender, bracket: Bracket) -> Option<&str> {
        self.paths.resolve(gender, bracket)
    }

    fn validate(&self) -> Result<(), DefError> {
        let invalid = |reason: &str| DefError::Invalid {
            category: self.category,
            key: self.key.clone(),
            reason: reason.to_string(),
        };
        if self.key.is_empty() {
            return Err(invalid("empty key"));
        }
        if self.paths.is_empty() && self.category != SlotCategory::Eyes {
            return Err(invalid("no texture path"));
        }
        if self.hide_top < 0 {
            return Err(invalid("negative hide_top"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct DefFile {
    defs: Vec<PartDef>,
}

/// Lookup table from (category, key) to def
#[derive(Debug, Clone, Default)]
pub struct DefDatabase {
    defs: HashMap<(SlotCategory, String), PartDef>,
}

impl DefDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `{ "defs": [...] }` document
    pub fn from_json_str(json: &str) -> Result<Self, DefError> {
        let mut db = Self::new();
        db.extend_from_json_str(json)?;
        Ok(db)
    }

    /// Load a def file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DefError> {
        let mut db = Self::new();
        db.load_file(path)?;
        Ok(db)
    }

    /// Merge a def file into this database; later defs replace earlier ones
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize, DefError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DefError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.extend_from_json_str(&json)
    }

    /// Merge defs from JSON; returns the number of defs read
    pub fn extend_from_json_str(&mut self, json: &str) -> Result<usize, DefError> {
        let file: DefFile = serde_json::from_str(json)?;
        let count = file.defs.len();
        for def in file.defs {
            def.validate()?;
            self.insert(def);
        }
        Ok(count)
    }

    /// Add or replace a def
    pub fn insert(&mut self, def: PartDef) {
        self.defs.insert((def.category, def.key.clone()), def);
    }

    pub fn with(mut self, def: PartDef) -> Self {
        self.insert(def);
        self
    }

    pub fn lookup(&self, category: SlotCategory, key: &str) -> Option<&PartDef> {
        self.defs.get(&(category, key.to_string()))
    }

    /// Resolved path for a key, if a def with a matching path exists
    pub fn path(
        &self,
        category: SlotCategory,
        key: &str,
        gender: Gender,
        bracket: Bracket,
    ) -> Option<&str> {
        self.lookup(category, key)
            .and_then(|def| def.path(gender, bracket))
    }

    /// Whether a gene's generic graphic is replaced by a dedicated def
    pub fn gene_claimed(&self, gene_key: &str) -> bool {
        self.defs.values().any(|def| {
            def.category.is_gene() && def.key == gene_key && def.replace_modded_texture
        })
    }

    /// Offset override for a gene's generic graphic
    pub fn gene_offset(&self, gene_key: &str) -> Option<i32> {
        self.defs
            .values()
            .filter(|def| def.category.is_gene() && def.key == gene_key)
            .find_map(|def| def.offset)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// All defs in a category
    pub fn in_category(&self, category: SlotCategory) -> impl Iterator<Item = &PartDef> {
        self.defs.values().filter(move |def| def.category == category)
    }
}
