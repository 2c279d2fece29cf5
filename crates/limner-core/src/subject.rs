//! Subject snapshots
//!
//! A [`Subject`] is everything the renderer reads about the person being
//! portrayed. It is a plain snapshot: the host owns the live entity and hands
//! over a fresh copy whenever it asks for a portrait. Nothing in this crate
//! mutates it.
//!
//! Keys (`head_type`, gene keys, apparel keys, injury def keys) are free-form
//! strings matched against [`PartDef`](crate::defs::PartDef) records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::color::Color;

/// Unique subject identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(pub Uuid);

impl SubjectId {
    /// Create a new random subject ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Binary gender as used by the art set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Gender {
    Female,
    #[default]
    Male,
}

impl Gender {
    /// Path token used in default texture paths
    pub fn token(self) -> &'static str {
        match self {
            Self::Female => "Female",
            Self::Male => "Male",
        }
    }
}

/// Discretized age category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Bracket {
    Newborn,
    Child,
    #[default]
    Adult,
}

impl Bracket {
    /// Ages below this are newborns when no life-stage key is known
    pub const CHILD_AGE: f32 = 3.0;
    /// Ages below this are children when no life-stage key is known
    pub const ADULT_AGE: f32 = 13.0;

    /// Classify a host life-stage key
    pub fn from_life_stage_key(key: &str) -> Self {
        match key {
            "HumanlikeBaby" | "HumanlikeToddler" => Self::Newborn,
            "HumanlikeChild" | "HumanlikePreTeenager" => Self::Child,
            _ => Self::Adult,
        }
    }

    /// Classify by biological age
    pub fn from_age(years: f32) -> Self {
        if years < Self::CHILD_AGE {
            Self::Newborn
        } else if years < Self::ADULT_AGE {
            Self::Child
        } else {
            Self::Adult
        }
    }

    /// Path token used in default texture paths ("" for adults)
    pub fn token(self) -> &'static str {
        match self {
            Self::Newborn => "Newborn",
            Self::Child => "Child",
            Self::Adult => "",
        }
    }

    /// Rows the whole stack is shifted down by
    pub fn y_offset(self) -> i32 {
        match self {
            Self::Newborn => 3,
            Self::Child => 2,
            Self::Adult => 0,
        }
    }

    /// Row adjustment applied to eye-mark positions
    pub fn eye_level(self) -> i32 {
        match self {
            Self::Newborn => -2,
            Self::Child => -1,
            Self::Adult => 0,
        }
    }

    /// Whether this is a child or newborn bracket
    pub fn is_young(self) -> bool {
        self != Self::Adult
    }
}

/// Side of a bilateral body part, from the subject's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// A body part reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyPart {
    /// Part key, e.g. "Eye", "Ear", "Nose", "Jaw", "Head", "Shoulder"
    pub key: String,
    /// Side for bilateral parts
    #[serde(default)]
    pub side: Option<Side>,
}

impl BodyPart {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            side: None,
        }
    }

    pub fn sided(key: impl Into<String>, side: Side) -> Self {
        Self {
            key: key.into(),
            side: Some(side),
        }
    }

    pub fn is(&self, key: &str) -> bool {
        self.key == key
    }
}

/// What an injury record represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InjuryKind {
    /// The part is gone
    Missing,
    /// A prosthetic or implant replaces or augments the part
    AddedPart,
    /// A healed, permanent scar
    PermanentScar,
    /// Anything else (conditions, fresh wounds)
    #[default]
    Other,
}

/// Injury, prosthetic or condition record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Injury {
    /// Def key of the injury, e.g. "MissingBodyPart", "BionicEye", "Cut"
    pub def_key: String,
    /// Affected part; conditions without a part leave this empty
    #[serde(default)]
    pub part: Option<BodyPart>,
    #[serde(default)]
    pub kind: InjuryKind,
    /// Graphic variant suffix for parts drawn with A/B/C variants
    #[serde(default)]
    pub variant: Option<char>,
    /// The host draws this part's graphic mirrored
    #[serde(default)]
    pub flip_graphic: bool,
}

impl Injury {
    pub fn new(def_key: impl Into<String>, kind: InjuryKind, part: Option<BodyPart>) -> Self {
        Self {
            def_key: def_key.into(),
            part,
            kind,
            variant: None,
            flip_graphic: false,
        }
    }

    pub fn mirrored(mut self) -> Self {
        self.flip_graphic = true;
        self
    }

    /// A missing body part
    pub fn missing(part: BodyPart) -> Self {
        Self::new("MissingBodyPart", InjuryKind::Missing, Some(part))
    }

    /// An added part (prosthetic) on a body part
    pub fn added(def_key: impl Into<String>, part: BodyPart) -> Self {
        Self::new(def_key, InjuryKind::AddedPart, Some(part))
    }

    /// A permanent scar on a body part
    pub fn scar(def_key: impl Into<String>, part: BodyPart) -> Self {
        Self::new(def_key, InjuryKind::PermanentScar, Some(part))
    }

    /// A condition with no body part
    pub fn condition(def_key: impl Into<String>) -> Self {
        Self::new(def_key, InjuryKind::Other, None)
    }

    /// Part key, if any
    pub fn part_key(&self) -> Option<&str> {
        self.part.as_ref().map(|p| p.key.as_str())
    }

    /// Side of the affected part, if any
    pub fn side(&self) -> Option<Side> {
        self.part.as_ref().and_then(|p| p.side)
    }
}

/// Endogene category of a gene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeneCategory {
    Ears,
    Nose,
    Jaw,
    Headbone,
    #[default]
    Other,
}

/// Where a gene graphic takes its color from
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum GeneColor {
    Hair,
    Skin,
    Custom(Color),
    #[default]
    Default,
}

/// Draw layer hint of a gene graphic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeneLayer {
    #[default]
    Default,
    PostSkin,
    PostTattoo,
}

/// Where a gene graphic attaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeneAnchor {
    #[default]
    Head,
    Body,
    Eyes,
    Tailbone,
}

/// Host graphic carried by a gene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneGraphic {
    /// Host texture path (without direction suffix)
    pub tex_path: String,
    #[serde(default)]
    pub color: GeneColor,
    #[serde(default)]
    pub layer: GeneLayer,
    #[serde(default)]
    pub anchor: GeneAnchor,
    /// Variant letter when the gene has several graphics
    #[serde(default)]
    pub variant: Option<char>,
}

/// An active gene (or other mutation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    pub key: String,
    #[serde(default)]
    pub category: GeneCategory,
    #[serde(default)]
    pub graphic: Option<GeneGraphic>,
    /// Lifespan multiplier, affects wrinkle age
    #[serde(default)]
    pub lifespan_factor: Option<f32>,
}

impl Gene {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            category: GeneCategory::Other,
            graphic: None,
            lifespan_factor: None,
        }
    }

    pub fn with_category(mut self, category: GeneCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_graphic(mut self, graphic: GeneGraphic) -> Self {
        self.graphic = Some(graphic);
        self
    }

    /// Whether the gene's graphic is colored with the hair color
    pub fn uses_hair_color(&self) -> bool {
        matches!(
            self.graphic,
            Some(GeneGraphic {
                color: GeneColor::Hair,
                ..
            })
        )
    }
}

/// A worn apparel item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WornItem {
    /// Apparel def key
    pub key: String,
    /// Style override key (styled variants win over the base key)
    #[serde(default)]
    pub style_key: Option<String>,
    /// Display label
    #[serde(default)]
    pub label: String,
    /// Draw tint
    #[serde(default)]
    pub tint: Color,
    /// Covered body part groups, e.g. "Torso", "UpperHead", "FullHead"
    #[serde(default)]
    pub body_groups: Vec<String>,
    /// Thing categories, e.g. "ApparelArmor", "ApparelUtility"
    #[serde(default)]
    pub categories: Vec<String>,
    /// Apparel layers, e.g. "Belt", "Overhead", "EyeCover"
    #[serde(default)]
    pub layers: Vec<String>,
    /// Whether the item hides the whole head
    #[serde(default)]
    pub covers_full_head: bool,
    /// Vertical draw offset hint used to order body gear
    #[serde(default)]
    pub draw_offset: f32,
}

impl WornItem {
    pub fn new(key: impl Into<String>, tint: Color) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            style_key: None,
            tint,
            body_groups: Vec::new(),
            categories: Vec::new(),
            layers: Vec::new(),
            covers_full_head: false,
            draw_offset: 0.0,
        }
    }

    pub fn with_body_group(mut self, group: impl Into<String>) -> Self {
        self.body_groups.push(group.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layers.push(layer.into());
        self
    }

    pub fn with_style(mut self, style_key: impl Into<String>) -> Self {
        self.style_key = Some(style_key.into());
        self
    }

    pub fn with_draw_offset(mut self, offset: f32) -> Self {
        self.draw_offset = offset;
        self
    }

    pub fn covering_full_head(mut self) -> Self {
        self.covers_full_head = true;
        self
    }

    pub fn covers(&self, group: &str) -> bool {
        self.body_groups.iter().any(|g| g == group)
    }

    pub fn in_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    pub fn on_layer(&self, layer: &str) -> bool {
        self.layers.iter().any(|l| l == layer)
    }
}

/// A cosmetic style item (hair, beard, tattoo)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleItem {
    pub key: String,
    /// Host texture path, used when no part def covers the key
    #[serde(default)]
    pub tex_path: Option<String>,
}

impl StyleItem {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            tex_path: None,
        }
    }

    pub fn with_tex_path(mut self, path: impl Into<String>) -> Self {
        self.tex_path = Some(path.into());
        self
    }
}

/// Decay state of a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotState {
    #[default]
    Fresh,
    Rotting,
    Desiccated,
}

/// Two-tone hair gradient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientHair {
    /// Host texture path of the gradient mask
    pub mask_path: String,
    /// Secondary hair color
    pub color_b: Color,
}

/// Birth fields used to derive the facial feature seed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BirthFields {
    pub day_of_year: i32,
    pub year: i32,
}

/// Facial feature variants picked from the birth seed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub nose: u32,
    pub eyes: u32,
    pub mouth: u32,
    pub brows: u32,
}

impl BirthFields {
    /// Deterministic seed for feature selection
    pub fn seed(&self) -> i64 {
        2632 * self.day_of_year as i64 + 3341 * self.year as i64
    }

    /// Nose (5), eyes (6), mouth (5) and brows (3) variants, 1-based
    pub fn features(&self) -> Features {
        let v = self.seed();
        Features {
            nose: (v.rem_euclid(450) / 90 + 1) as u32,
            eyes: (v.rem_euclid(90) / 15 + 1) as u32,
            mouth: (v.rem_euclid(15) / 3 + 1) as u32,
            brows: (v.rem_euclid(3) + 1) as u32,
        }
    }
}

/// Snapshot of the subject being portrayed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// Stable identity; names the static portrait file
    pub id: SubjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub gender: Gender,
    pub age_years: f32,
    #[serde(default = "default_life_expectancy")]
    pub life_expectancy: f32,
    /// Host life-stage key; takes precedence over `age_years` for brackets
    #[serde(default)]
    pub life_stage_key: Option<String>,
    #[serde(default)]
    pub head_type: String,
    #[serde(default)]
    pub skin_color: Color,
    #[serde(default)]
    pub hair_color: Color,
    #[serde(default)]
    pub hair: Option<StyleItem>,
    #[serde(default)]
    pub beard: Option<StyleItem>,
    #[serde(default)]
    pub face_tattoo: Option<StyleItem>,
    #[serde(default)]
    pub body_tattoo: Option<StyleItem>,
    #[serde(default)]
    pub gradient_hair: Option<GradientHair>,
    #[serde(default)]
    pub birth: BirthFields,
    /// Active genes, in host order
    #[serde(default)]
    pub genes: Vec<Gene>,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub apparel: Vec<WornItem>,
    #[serde(default)]
    pub injuries: Vec<Injury>,
    #[serde(default)]
    pub downed: bool,
    #[serde(default)]
    pub dead: bool,
    #[serde(default)]
    pub rot: RotState,
    /// Reanimated corpse
    #[serde(default)]
    pub undead: bool,
}

fn default_life_expectancy() -> f32 {
    80.0
}

impl Subject {
    /// Create a subject with neutral defaults
    pub fn new(gender: Gender, age_years: f32) -> Self {
        Self {
            id: SubjectId::new(),
            name: String::new(),
            gender,
            age_years,
            life_expectancy: default_life_expectancy(),
            life_stage_key: None,
            head_type: String::new(),
            skin_color: Color::rgb(0.92, 0.78, 0.66),
            hair_color: Color::rgb(0.3, 0.2, 0.1),
            hair: None,
            beard: None,
            face_tattoo: None,
            body_tattoo: None,
            gradient_hair: None,
            birth: BirthFields::default(),
            genes: Vec::new(),
            traits: Vec::new(),
            apparel: Vec::new(),
            injuries: Vec::new(),
            downed: false,
            dead: false,
            rot: RotState::Fresh,
            undead: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_head_type(mut self, head_type: impl Into<String>) -> Self {
        self.head_type = head_type.into();
        self
    }

    pub fn with_hair(mut self, hair: StyleItem) -> Self {
        self.hair = Some(hair);
        self
    }

    pub fn with_beard(mut self, beard: StyleItem) -> Self {
        self.beard = Some(beard);
        self
    }

    pub fn with_birth(mut self, day_of_year: i32, year: i32) -> Self {
        self.birth = BirthFields { day_of_year, year };
        self
    }

    pub fn with_gene(mut self, gene: Gene) -> Self {
        self.genes.push(gene);
        self
    }

    pub fn with_trait(mut self, key: impl Into<String>) -> Self {
        self.traits.push(key.into());
        self
    }

    pub fn with_apparel(mut self, item: WornItem) -> Self {
        self.apparel.push(item);
        self
    }

    pub fn with_injury(mut self, injury: Injury) -> Self {
        self.injuries.push(injury);
        self
    }

    /// Age bracket, from the life-stage key when present
    pub fn bracket(&self) -> Bracket {
        match &self.life_stage_key {
            Some(key) => Bracket::from_life_stage_key(key),
            None => Bracket::from_age(self.age_years),
        }
    }

    /// Head type with gendered prefixes and suffixes stripped
    pub fn normalized_head_type(&self) -> &str {
        let mut name = self.head_type.as_str();
        for prefix in ["Female_", "Male_"] {
            if let Some(rest) = name.strip_prefix(prefix) {
                name = rest;
            }
        }
        for suffix in ["_Female", "_Male"] {
            if let Some(rest) = name.strip_suffix(suffix) {
                name = rest;
            }
        }
        name
    }

    pub fn has_trait(&self, key: &str) -> bool {
        self.traits.iter().any(|t| t == key)
    }

    pub fn has_gene(&self, key: &str) -> bool {
        self.genes.iter().any(|g| g.key == key)
    }

    /// Whether any injury or condition with this def key is present
    pub fn has_condition(&self, def_key: &str) -> bool {
        self.injuries.iter().any(|i| i.def_key == def_key)
    }

    /// Whether the head itself is missing
    pub fn head_missing(&self) -> bool {
        self.injuries
            .iter()
            .any(|i| i.kind == InjuryKind::Missing && i.part_key() == Some("Head"))
    }

    /// Wrinkles show past 70% of the (gene-adjusted) life expectancy
    pub fn shows_wrinkles(&self) -> bool {
        let mut threshold = 0.7 * self.life_expectancy;
        for gene in &self.genes {
            if gene.key == "Ageless" {
                threshold = f32::INFINITY;
            } else if let Some(factor) = gene.lifespan_factor {
                threshold *= factor;
            }
        }
        self.age_years.floor() >= threshold
    }

    /// File stem used for per-subject files such as static portraits
    pub fn file_stem(&self) -> String {
        let name = self.name.replace('\'', "").replace(' ', "_");
        format!("{}_{}", name, self.id)
    }
}
