//! Part selection
//!
//! Turns a [`Subject`] snapshot into the back-to-front [`Layer`] stack. The
//! rules form an ordered cascade: each pass may claim entries from the pool
//! of cosmetic genes, and the first claim wins.

use limner_core::{
    AvatarSettings, Bracket, Color, DefDatabase, DisplayOptions, EyeMarks, EyePos,
    FallbackTexture, Gender, Gene, GeneAnchor, GeneCategory, GeneColor, GeneLayer, Gradient,
    Injury, InjuryKind, Layer, LayerKind, LayerSource, PartDef, Recolor, RotState, Side, Sides,
    SlotCategory, StyleItem, Subject, WornItem,
};
use tracing::debug;

/// Rows body layers are lowered by so heads line up
pub const BODY_OFFSET: i32 = 8;
/// Default ear art
pub const DEFAULT_EARS: &str = "Core/Unisex/Ears/Ears_Human";
/// Generic silhouettes for body apparel without a def
pub const GENERIC_ARMOR: &str = "Avatar_GenericArmor";
pub const GENERIC_CLOTHES: &str = "Avatar_Generic";

const BONE_TINT: Color = Color::rgb(0.8, 0.7, 0.6);
const TATTOO_TINT: Color = Color::rgba(1.0, 1.0, 1.0, 0.8);
const SPECIAL_EYES: (Color, Color) = (Color::gray(0.7), Color::WHITE);
/// Iris and pupil when no eye def overrides them
pub const DEFAULT_EYE_COLORS: (Color, Color) = (Color::gray(0.6), Color::gray(0.1));
/// Wrinkle art shared by every gender and bracket
pub const WRINKLES: &str = "Core/Unisex/Facial/Wrinkles";
const DESICCATED_HEAD: &str = "SSS_HeadType";
const HAIR_FALLBACK_OFFSET: i32 = 4;
const BEARD_FALLBACK_OFFSET: i32 = 8;

/// Everything a render needs besides the layers themselves
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionFlags {
    pub bracket: Bracket,
    /// Draw through the lying-down remap
    pub downed: bool,
    pub dead: bool,
    pub head_missing: bool,
    pub hide_hair: bool,
    pub hide_beard: bool,
    /// Rows of hair cropped by headgear
    pub hair_hide_top: i32,
    /// Rows of head cropped by headgear
    pub head_hide_top: i32,
    /// Iris and pupil colors
    pub eye_colors: (Color, Color),
}

/// Resolved layer stack plus render flags
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub layers: Vec<Layer>,
    pub flags: SelectionFlags,
}

impl Selection {
    /// Layer kinds in draw order
    pub fn kinds(&self) -> Vec<LayerKind> {
        self.layers.iter().map(|l| l.kind).collect()
    }

    pub fn find(&self, kind: LayerKind) -> Option<&Layer> {
        self.layers.iter().find(|l| l.kind == kind)
    }
}

/// Apparel sorted into draw slots
#[derive(Default)]
struct ApparelSlots {
    back: Vec<Layer>,
    body: Vec<(f32, Layer)>,
    face: Vec<Layer>,
    head: Vec<Layer>,
    covers_all: Option<Layer>,
    hide_hair: bool,
    hide_beard: bool,
    hide_top: i32,
}

/// Per-render facts shared by the passes
struct Context<'s> {
    subject: &'s Subject,
    gender: Gender,
    bracket: Bracket,
    skin: Color,
    hair: Color,
    seed: i64,
    head_type: &'s str,
    gore: bool,
}

impl Context<'_> {
    /// `Core/{gender}{bracket}/{rest}`
    fn core_path(&self, rest: &str) -> String {
        format!("Core/{}{}/{}", self.gender.token(), self.bracket.token(), rest)
    }

    fn rotting_gore(&self) -> bool {
        self.subject.rot == RotState::Rotting && self.gore
    }

    fn scarred_undead(&self) -> bool {
        self.subject.undead && self.subject.rot != RotState::Desiccated && self.gore
    }
}

/// Canvas half a one-sided part lives in
fn half_of(side: Option<Side>) -> Sides {
    match side {
        Some(Side::Left) => Sides::SINISTER,
        _ => Sides::DEXTER,
    }
}

/// Resolves layer stacks against a def database
pub struct PartSelector<'a> {
    defs: &'a DefDatabase,
    settings: &'a AvatarSettings,
}

impl<'a> PartSelector<'a> {
    pub fn new(defs: &'a DefDatabase, settings: &'a AvatarSettings) -> Self {
        Self { defs, settings }
    }

    /// Resolve the ordered layer stack for one subject and view
    pub fn resolve(&self, subject: &Subject, options: &DisplayOptions) -> Selection {
        let bracket = subject.bracket();
        let (head_type, skin) = match subject.rot {
            RotState::Desiccated => (DESICCATED_HEAD, BONE_TINT),
            _ => (subject.normalized_head_type(), subject.skin_color),
        };
        let ctx = Context {
            subject,
            gender: subject.gender,
            bracket,
            skin,
            hair: subject.hair_color,
            seed: subject.birth.seed(),
            head_type,
            gore: !self.settings.no_corpse_gore,
        };
        let head_def = self.defs.lookup(SlotCategory::Head, head_type);
        let apparel = self.classify_apparel(&ctx, options);

        let mut flags = SelectionFlags {
            bracket,
            downed: options.check_downed
                && bracket != Bracket::Newborn
                && subject.downed
                && !subject.dead,
            dead: subject.dead,
            head_missing: subject.head_missing(),
            hide_hair: apparel.hide_hair || head_def.is_some_and(|d| d.hide_hair),
            hide_beard: apparel.hide_beard || head_def.is_some_and(|d| d.hide_beard),
            hair_hide_top: apparel.hide_top,
            head_hide_top: apparel.hide_top,
            eye_colors: DEFAULT_EYE_COLORS,
        };

        let mut layers = Vec::new();
        self.push_back(&ctx, &apparel, &mut layers);
        self.push_body(&ctx, head_def, &mut layers);
        layers.extend(apparel.body.iter().map(|(_, layer)| layer.clone()));
        self.push_body_hediffs(&ctx, &mut layers);

        if !flags.head_missing {
            self.push_head(&ctx, head_def, options, apparel, &mut flags, &mut layers);
        }

        debug!(
            subject = %subject.id,
            layers = layers.len(),
            bracket = ?bracket,
            downed = flags.downed,
            "Resolved layer stack"
        );
        Selection { layers, flags }
    }

    /// Apparel def for an item, the style override first
    fn apparel_def(&self, category: SlotCategory, item: &WornItem) -> Option<&'a PartDef> {
        item.style_key
            .as_deref()
            .and_then(|style| self.defs.lookup(category, style))
            .or_else(|| self.defs.lookup(category, &item.key))
    }

    fn def_layer(
        &self,
        ctx: &Context<'_>,
        kind: LayerKind,
        def: &PartDef,
    ) -> Option<Layer> {
        def.path(ctx.gender, ctx.bracket)
            .map(|path| Layer::texture(kind, path))
    }

    fn classify_apparel(&self, ctx: &Context<'_>, options: &DisplayOptions) -> ApparelSlots {
        let mut slots = ApparelSlots::default();
        if !options.draw_clothes {
            return slots;
        }
        for item in &ctx.subject.apparel {
            if let Some(def) = self.apparel_def(SlotCategory::Bodygear, item) {
                if let Some(layer) = self.def_layer(ctx, LayerKind::Bodygear, def) {
                    let layer = layer.with_tint(item.tint).with_offset(BODY_OFFSET);
                    slots.body.push((item.draw_offset, layer));
                }
            } else if let Some(def) = self.apparel_def(SlotCategory::Backgear, item) {
                if let Some(layer) = self.def_layer(ctx, LayerKind::Backgear, def) {
                    slots
                        .back
                        .push(layer.with_tint(item.tint).with_offset(BODY_OFFSET));
                }
            } else if let Some(def) = self.apparel_def(SlotCategory::Facegear, item) {
                if let Some(layer) = self.def_layer(ctx, LayerKind::Facegear, def) {
                    slots.face.push(layer.with_tint(item.tint));
                }
            } else if let Some(def) = self.apparel_def(SlotCategory::Headgear, item) {
                if !options.draw_headgear {
                    continue;
                }
                if item.covers_full_head {
                    slots.covers_all = self
                        .def_layer(ctx, LayerKind::CoversAll, def)
                        .map(|layer| layer.with_tint(item.tint));
                } else if let Some(layer) = self.def_layer(ctx, LayerKind::Headgear, def) {
                    slots.head.push(layer.with_tint(item.tint));
                }
                slots.hide_hair |= if self.settings.show_hair_with_headgear {
                    def.hide_hair
                } else {
                    item.covers("UpperHead") || item.covers("FullHead")
                };
                slots.hide_top = slots.hide_top.max(def.hide_top);
                slots.hide_beard |= def.hide_beard;
            } else if item.covers("Torso") && !item.categories.is_empty() {
                let generic = if item.in_category("ApparelArmor") {
                    Some(GENERIC_ARMOR)
                } else if !item.in_category("ApparelUtility") {
                    Some(GENERIC_CLOTHES)
                } else {
                    None
                };
                let layer = generic
                    .and_then(|key| self.defs.lookup(SlotCategory::Bodygear, key))
                    .and_then(|def| self.def_layer(ctx, LayerKind::Bodygear, def));
                if let Some(layer) = layer {
                    let layer = layer.with_tint(item.tint).with_offset(BODY_OFFSET);
                    slots.body.push((item.draw_offset, layer));
                }
            }
        }
        slots.body.sort_by(|a, b| a.0.total_cmp(&b.0));
        slots
    }

    fn push_back(&self, ctx: &Context<'_>, apparel: &ApparelSlots, layers: &mut Vec<Layer>) {
        for gene in &ctx.subject.genes {
            if let Some(layer) = self
                .defs
                .lookup(SlotCategory::Back, &gene.key)
                .and_then(|def| self.def_layer(ctx, LayerKind::BackGene, def))
            {
                layers.push(layer);
            }
        }
        layers.extend(apparel.back.iter().cloned());
    }

    fn push_body(&self, ctx: &Context<'_>, head_def: Option<&PartDef>, layers: &mut Vec<Layer>) {
        let mut body = Vec::new();

        let body_type = head_def
            .and_then(|d| d.force_body_type.as_deref())
            .unwrap_or_default();
        let neck = self
            .defs
            .path(SlotCategory::Body, body_type, ctx.gender, ctx.bracket)
            .map(str::to_string)
            .unwrap_or_else(|| ctx.core_path("Neck"));
        body.push(
            Layer::texture(LayerKind::Neck, neck)
                .with_tint(ctx.skin)
                .with_offset(BODY_OFFSET),
        );

        if !head_def.is_some_and(|d| d.hide_tattoo) {
            let key = ctx
                .subject
                .body_tattoo
                .as_ref()
                .map(|t| t.key.as_str())
                .unwrap_or_default();
            let path = self
                .defs
                .path(SlotCategory::BodyTattoo, key, ctx.gender, ctx.bracket)
                .unwrap_or("Core/Unisex/BodyTattoo/NoTattoo");
            body.push(
                Layer::texture(LayerKind::BodyTattoo, path)
                    .with_tint(TATTOO_TINT)
                    .with_offset(BODY_OFFSET),
            );
        }

        if ctx.scarred_undead() {
            let scar = format!("Core/Unisex/Corpse/BodyScar{}", ctx.seed.rem_euclid(125) / 25 + 1);
            body.push(
                Layer::texture(LayerKind::BodyScar, scar)
                    .with_tint(ctx.skin)
                    .with_offset(BODY_OFFSET),
            );
        }

        if ctx.rotting_gore() {
            layers.push(
                Layer::texture(
                    LayerKind::Skeleton,
                    format!("Core/Unisex/Corpse/Skeleton{}", ctx.bracket.token()),
                )
                .with_tint(BONE_TINT)
                .with_offset(BODY_OFFSET),
            );
            let mask = format!("Core/Unisex/Corpse/BodyMask{}", ctx.seed.rem_euclid(625) / 125 + 1);
            body = body
                .into_iter()
                .map(|layer| layer.with_alpha_mask(mask.clone()))
                .collect();
        }
        layers.extend(body);
    }

    fn push_body_hediffs(&self, ctx: &Context<'_>, layers: &mut Vec<Layer>) {
        for injury in &ctx.subject.injuries {
            let Some(part) = &injury.part else {
                continue;
            };
            let Some(mut layer) = self
                .defs
                .lookup(SlotCategory::BodyHediff, &injury.def_key)
                .and_then(|def| self.def_layer(ctx, LayerKind::BodyHediff, def))
            else {
                continue;
            };
            layer.offset = BODY_OFFSET;
            layer.flip = injury.flip_graphic;
            if part.is("Shoulder") {
                layer.tint = Some(ctx.skin);
                layer.sides = half_of(part.side);
            }
            layers.push(layer);
        }
    }

    /// Layer for a gene's own host graphic
    fn gene_layer(&self, ctx: &Context<'_>, kind: LayerKind, gene: &Gene) -> Option<Layer> {
        let graphic = gene.graphic.as_ref()?;
        let (tint, recolor) = match graphic.color {
            GeneColor::Hair => (ctx.hair, Recolor::Palette),
            GeneColor::Skin => (ctx.skin, Recolor::Palette),
            GeneColor::Custom(color) => (color, Recolor::Gray),
            GeneColor::Default => (Color::WHITE, Recolor::Gray),
        };
        let offset = self.defs.gene_offset(&gene.key).unwrap_or(match gene.category {
            GeneCategory::Ears | GeneCategory::Headbone => 2,
            GeneCategory::Nose => 4,
            GeneCategory::Jaw => 6,
            GeneCategory::Other => 0,
        });
        let mut path = graphic.tex_path.clone();
        if let Some(variant) = graphic.variant {
            path.push(variant);
        }
        path.push_str("_south");
        Some(
            Layer::fallback(kind, FallbackTexture::new(path, offset, recolor)).with_tint(tint),
        )
    }

    /// Genes that may still contribute their own graphic
    fn cosmetic_pool<'s>(&self, subject: &'s Subject) -> Vec<&'s Gene> {
        subject
            .genes
            .iter()
            .filter(|gene| {
                gene.graphic
                    .as_ref()
                    .is_some_and(|g| g.anchor == GeneAnchor::Head)
                    && !self.defs.gene_claimed(&gene.key)
            })
            .collect()
    }

    /// Remove and return the first pooled gene matching `pred`
    fn claim<'s>(pool: &mut Vec<&'s Gene>, pred: impl Fn(&Gene) -> bool) -> Option<&'s Gene> {
        let index = pool.iter().position(|gene| pred(*gene))?;
        Some(pool.remove(index))
    }

    fn gene_path(&self, ctx: &Context<'_>, category: SlotCategory, gene: &Gene) -> Option<String> {
        self.defs
            .path(category, &gene.key, ctx.gender, ctx.bracket)
            .map(str::to_string)
    }

    fn push_head(
        &self,
        ctx: &Context<'_>,
        head_def: Option<&PartDef>,
        options: &DisplayOptions,
        apparel: ApparelSlots,
        flags: &mut SelectionFlags,
        layers: &mut Vec<Layer>,
    ) {
        let subject = ctx.subject;
        let features = subject.birth.features();
        let hides = |f: fn(&PartDef) -> bool| head_def.is_some_and(f);
        let young = ctx.bracket.is_young();
        let newborn = ctx.bracket == Bracket::Newborn;

        let head_path = self
            .defs
            .path(SlotCategory::Head, ctx.head_type, ctx.gender, ctx.bracket)
            .map(str::to_string)
            .unwrap_or_else(|| ctx.core_path("Head/AverageNormal"));
        let style_key = |item: &Option<StyleItem>, none: &str| {
            item.as_ref().map(|s| s.key.clone()).unwrap_or_else(|| none.to_string())
        };
        let face_tattoo_path = self
            .defs
            .path(
                SlotCategory::FaceTattoo,
                &style_key(&subject.face_tattoo, ""),
                ctx.gender,
                ctx.bracket,
            )
            .unwrap_or("Core/Unisex/FaceTattoo/NoTattoo")
            .to_string();

        let mut ears_path = DEFAULT_EARS.to_string();
        let mut ears_tint = ctx.skin;
        let mut nose_path = ctx.core_path(&format!("Nose/Nose{}", features.nose));
        let mut nose_tint = ctx.skin;
        let mut eyes_path = ctx.core_path(&format!("Eyes/Eyes{}", features.eyes));
        let mut mouth_path = if self.settings.no_female_lips {
            format!("Core/Male{}/Mouth/Mouth{}", ctx.bracket.token(), features.mouth)
        } else {
            ctx.core_path(&format!("Mouth/Mouth{}", features.mouth))
        };
        let mut brows_path = ctx.core_path(&format!("Brows/Brows{}", features.brows));
        let mut eye_colors = DEFAULT_EYE_COLORS;
        let mut eyes_pos = EyePos::defaults();

        for gene in &subject.genes {
            let gene_tint = if gene.uses_hair_color() { ctx.hair } else { ctx.skin };
            if let Some(path) = self.gene_path(ctx, SlotCategory::Ears, gene) {
                ears_path = path;
                ears_tint = gene_tint;
            }
            if let Some(path) = self.gene_path(ctx, SlotCategory::Nose, gene) {
                nose_path = path;
                nose_tint = gene_tint;
            }
            if let Some(path) = self.gene_path(ctx, SlotCategory::Mouth, gene) {
                mouth_path = path;
            }
            if let Some(path) = self.gene_path(ctx, SlotCategory::Brows, gene) {
                brows_path = path;
            }
            if let Some(def) = self.defs.lookup(SlotCategory::Eyes, &gene.key) {
                if let Some(path) = def.path(ctx.gender, ctx.bracket) {
                    eyes_path = path.to_string();
                }
                if let Some(color) = def.color1 {
                    eye_colors.0 = color;
                }
                if let Some(color) = def.color2 {
                    eye_colors.1 = color;
                }
                if let Some(positions) = &def.eyes_pos {
                    eyes_pos = positions.clone();
                }
            }
        }
        if subject.has_trait("BodyMastery") || subject.has_condition("VoidTouched") {
            eye_colors = SPECIAL_EYES;
        }

        let mut ears = Layer::texture(LayerKind::Ears, ears_path).with_tint(ears_tint);
        let mut nose = Layer::texture(LayerKind::Nose, nose_path).with_tint(nose_tint);

        let mut pool = self.cosmetic_pool(subject);
        if let Some(gene) = Self::claim(&mut pool, |g| {
            matches!(g.category, GeneCategory::Ears | GeneCategory::Nose)
        }) {
            let (slot, kind) = if gene.category == GeneCategory::Ears {
                (&mut ears, LayerKind::Ears)
            } else {
                (&mut nose, LayerKind::Nose)
            };
            if let Some(layer) = self.gene_layer(ctx, kind, gene) {
                *slot = layer;
            }
        }

        if subject.rot == RotState::Rotting || subject.undead {
            let avg = |a: f32, b: f32| (a + 2.0 * b) / 3.0;
            let (c1, c2) = eye_colors;
            let gray = Color::rgba(avg(c1.r, c2.r), avg(c1.g, c2.g), avg(c1.b, c2.b), 1.0);
            eye_colors = (gray, gray);
        }
        flags.eye_colors = eye_colors;

        let eyes = Layer::texture(LayerKind::Eyes, eyes_path)
            .with_tint(ctx.skin)
            .with_eye_marks(EyeMarks {
                colors: eye_colors,
                positions: eyes_pos,
            });
        let mut mouth = Layer::texture(LayerKind::Mouth, mouth_path).with_tint(ctx.skin);
        if self.settings.no_female_lips && ctx.gender == Gender::Female && !newborn {
            mouth.offset = -1;
        }
        let mut head = Layer::texture(LayerKind::Head, head_path)
            .with_tint(ctx.skin)
            .with_hide_top(flags.head_hide_top);

        let injury_layers = self.apply_injuries(ctx, head_def, &mut head, &mut nose, &mut ears);

        let ears_default = ears.source == LayerSource::Texture(DEFAULT_EARS.to_string());
        let hide_ears = hides(|d| d.hide_ears);
        if !hide_ears && (!self.settings.ears_on_top || ears_default) {
            layers.push(ears.clone());
        }

        let mut head_layers = vec![head];
        if !hides(|d| d.hide_wrinkles) && !self.settings.no_wrinkles && subject.shows_wrinkles() {
            head_layers.push(
                Layer::texture(LayerKind::Wrinkles, WRINKLES)
                    .with_tint(ctx.skin),
            );
        }
        if let Some(gene) = Self::claim(&mut pool, |g| {
            g.category == GeneCategory::Jaw
                || g.graphic.as_ref().is_some_and(|gr| gr.layer == GeneLayer::PostSkin)
        }) {
            head_layers.extend(self.gene_layer(ctx, LayerKind::Gene, gene));
        }
        if !hides(|d| d.hide_mouth) {
            head_layers.push(mouth);
        }
        if !hides(|d| d.hide_nose) {
            head_layers.push(nose);
        }
        if !hides(|d| d.hide_eyes) {
            head_layers.push(eyes);
        }
        for gene in &subject.genes {
            if let Some(mut path) = self.gene_path(ctx, SlotCategory::Facial, gene) {
                if let Some(variant) = gene.graphic.as_ref().and_then(|g| g.variant) {
                    path.push(variant);
                }
                let tint = if gene.uses_hair_color() { ctx.hair } else { ctx.skin };
                head_layers.push(Layer::texture(LayerKind::Facial, path).with_tint(tint));
            }
        }
        if !hides(|d| d.hide_tattoo) {
            head_layers.push(
                Layer::texture(LayerKind::FaceTattoo, face_tattoo_path).with_tint(TATTOO_TINT),
            );
        }
        if ctx.scarred_undead() {
            let scar = format!("Core/Unisex/Corpse/FaceScar{}", ctx.seed.rem_euclid(25) / 5 + 1);
            head_layers.push(Layer::texture(LayerKind::FaceScar, scar).with_tint(ctx.skin));
        }
        if ctx.rotting_gore() {
            layers.push(
                Layer::texture(
                    LayerKind::Skull,
                    format!("Core/Unisex/Corpse/Skull{}", ctx.bracket.token()),
                )
                .with_tint(BONE_TINT),
            );
            let mask = format!("Core/Unisex/Corpse/FaceMask{}", ctx.seed.rem_euclid(5) + 1);
            head_layers = head_layers
                .into_iter()
                .map(|layer| layer.with_alpha_mask(mask.clone()))
                .collect();
        }
        layers.extend(head_layers);
        layers.extend(injury_layers);

        if let Some(gene) = Self::claim(&mut pool, |g| {
            g.graphic.as_ref().is_some_and(|gr| gr.layer == GeneLayer::PostTattoo)
        }) {
            layers.extend(self.gene_layer(ctx, LayerKind::Gene, gene));
        }

        let beard = match self.defs.path(
            SlotCategory::Beard,
            &style_key(&subject.beard, "NoBeard"),
            ctx.gender,
            ctx.bracket,
        ) {
            Some(path) => Some(Layer::texture(LayerKind::Beard, path)),
            None => subject
                .beard
                .as_ref()
                .and_then(|b| b.tex_path.as_ref())
                .map(|tex| {
                    Layer::fallback(
                        LayerKind::Beard,
                        FallbackTexture::new(
                            format!("{tex}_south"),
                            BEARD_FALLBACK_OFFSET,
                            Recolor::Palette,
                        ),
                    )
                }),
        };
        if let Some(beard) = beard {
            if !flags.hide_beard && !newborn {
                layers.push(beard.with_tint(ctx.hair));
            }
        }
        if !hides(|d| d.hide_eyes) && !newborn {
            layers.push(Layer::texture(LayerKind::Brows, brows_path).with_tint(ctx.hair));
        }

        let hair = self.hair_layer(ctx, flags.hair_hide_top);
        let show_hair = !flags.hide_hair && !newborn;
        if !options.draw_headgear {
            if show_hair {
                layers.extend(hair);
            }
        } else {
            let face_offset = if young { -1 } else { 0 };
            layers.extend(
                apparel
                    .face
                    .into_iter()
                    .map(|layer| layer.with_offset(face_offset)),
            );
            if show_hair {
                layers.extend(hair);
            }
            if apparel.covers_all.is_none() {
                layers.extend(apparel.head);
            }
        }

        if !hide_ears && self.settings.ears_on_top && !ears_default {
            layers.push(ears);
        }
        for gene in &subject.genes {
            if let Some(layer) = self
                .defs
                .lookup(SlotCategory::Headbone, &gene.key)
                .and_then(|def| self.def_layer(ctx, LayerKind::Headbone, def))
            {
                layers.push(layer);
            }
        }
        for gene in pool {
            layers.extend(self.gene_layer(ctx, LayerKind::Gene, gene));
        }
        if options.draw_headgear {
            layers.extend(apparel.covers_all);
        }
    }

    fn hair_layer(&self, ctx: &Context<'_>, hide_top: i32) -> Option<Layer> {
        let subject = ctx.subject;
        let key = subject
            .hair
            .as_ref()
            .map(|h| h.key.as_str())
            .unwrap_or("Bald");
        let mut layer = match self.defs.path(SlotCategory::Hair, key, ctx.gender, ctx.bracket) {
            Some(path) => Layer::texture(LayerKind::Hair, path),
            None => {
                let tex = subject.hair.as_ref()?.tex_path.as_ref()?;
                Layer::fallback(
                    LayerKind::Hair,
                    FallbackTexture::new(
                        format!("{tex}_south"),
                        HAIR_FALLBACK_OFFSET,
                        Recolor::Palette,
                    ),
                )
            }
        };
        layer.tint = Some(ctx.hair);
        layer.hide_top = hide_top;
        layer.gradient = subject.gradient_hair.as_ref().map(|g| Gradient {
            mask_path: g.mask_path.clone(),
            color_b: g.color_b,
        });
        Some(layer)
    }

    /// Missing parts, prosthetics and scars
    ///
    /// Mutates the already-resolved head, nose and ear layers and returns
    /// the extra layers drawn above the head group, in injury order.
    fn apply_injuries(
        &self,
        ctx: &Context<'_>,
        head_def: Option<&PartDef>,
        head: &mut Layer,
        nose: &mut Layer,
        ears: &mut Layer,
    ) -> Vec<Layer> {
        let token = ctx.bracket.token();
        let young_offset = if ctx.bracket.is_young() { -1 } else { 0 };
        let mut extra = Vec::new();

        for injury in &ctx.subject.injuries {
            let Some(part) = injury.part_key() else {
                continue;
            };
            let side = injury.side();
            match injury.kind {
                InjuryKind::Missing => match part {
                    "Nose" => {
                        *nose = Layer::texture(
                            LayerKind::Nose,
                            format!("Core/Unisex/Nose/Missing{token}"),
                        )
                        .with_tint(ctx.skin);
                    }
                    "Jaw" => {
                        if head_def.is_some_and(|d| d.special_no_jaw) {
                            if let LayerSource::Texture(path) = &mut head.source {
                                path.push_str("NoJaw");
                            }
                        } else {
                            extra.push(
                                Layer::texture(
                                    LayerKind::Injury,
                                    format!("Core/Unisex/Jaw/Missing{token}"),
                                )
                                .with_tint(ctx.skin),
                            );
                        }
                    }
                    "Eye" => extra.push(
                        Layer::texture(LayerKind::Injury, "Core/Unisex/Eyes/Missing")
                            .with_tint(ctx.skin)
                            .with_sides(half_of(side)),
                    ),
                    "Ear" => ears.exclude(half_of(side)),
                    _ => {}
                },
                InjuryKind::AddedPart => {
                    let Some(mut layer) = self.head_hediff_layer(ctx, &injury.def_key, injury)
                    else {
                        continue;
                    };
                    match part {
                        "Nose" => {
                            layer.kind = LayerKind::Nose;
                            *nose = layer;
                        }
                        "Eye" => extra.push(
                            layer.with_sides(half_of(side)).with_offset(young_offset),
                        ),
                        "Ear" => {
                            let half = half_of(side);
                            ears.exclude(half);
                            extra.push(layer.with_sides(half));
                        }
                        _ => {
                            layer.flip = injury.flip_graphic;
                            extra.push(layer);
                        }
                    }
                }
                InjuryKind::PermanentScar => {
                    let key = format!("{part}_{}", injury.def_key);
                    let Some(mut layer) = self.head_hediff_layer(ctx, &key, injury) else {
                        continue;
                    };
                    layer.tint = Some(ctx.skin);
                    layer.offset = young_offset;
                    if part == "Eye" {
                        layer.sides = half_of(side);
                    }
                    extra.push(layer);
                }
                InjuryKind::Other => {}
            }
        }
        extra
    }

    fn head_hediff_layer(&self, ctx: &Context<'_>, key: &str, injury: &Injury) -> Option<Layer> {
        let def = self.defs.lookup(SlotCategory::HeadHediff, key)?;
        let mut path = def.path(ctx.gender, ctx.bracket)?.to_string();
        if let Some(variant) = injury.variant {
            path.push(variant);
        }
        Some(Layer::texture(LayerKind::Injury, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use limner_core::{BodyPart, GeneGraphic};

    fn settings() -> AvatarSettings {
        AvatarSettings::default()
    }

    fn bare_options() -> DisplayOptions {
        DisplayOptions::portrait(false, false)
    }

    fn adult_female() -> Subject {
        Subject::new(Gender::Female, 30.0).with_birth(10, 5500)
    }

    fn resolve(defs: &DefDatabase, subject: &Subject, options: &DisplayOptions) -> Selection {
        let settings = settings();
        PartSelector::new(defs, &settings).resolve(subject, options)
    }

    #[test]
    fn test_plain_adult_layer_order() {
        let defs = DefDatabase::new();
        let selection = resolve(&defs, &adult_female(), &bare_options());
        assert_eq!(
            selection.kinds(),
            vec![
                LayerKind::Neck,
                LayerKind::BodyTattoo,
                LayerKind::Ears,
                LayerKind::Head,
                LayerKind::Mouth,
                LayerKind::Nose,
                LayerKind::Eyes,
                LayerKind::FaceTattoo,
                LayerKind::Brows,
            ]
        );
        let neck = selection.find(LayerKind::Neck).unwrap();
        assert_eq!(neck.texture_path(), Some("Core/Female/Neck"));
        assert_eq!(neck.offset, BODY_OFFSET);
        assert_eq!(
            selection.find(LayerKind::Head).unwrap().texture_path(),
            Some("Core/Female/Head/AverageNormal")
        );
        assert_eq!(selection.flags.bracket, Bracket::Adult);
        assert!(!selection.flags.downed);
        assert_eq!(selection.flags.eye_colors, (Color::gray(0.6), Color::gray(0.1)));
        let marks = selection.find(LayerKind::Eyes).unwrap().eye_marks.as_ref().unwrap();
        assert_eq!(marks.colors, (Color::gray(0.6), Color::gray(0.1)));
    }

    #[test]
    fn test_hair_beard_and_wrinkles() {
        let defs = DefDatabase::new()
            .with(PartDef::unisex(SlotCategory::Hair, "Mop", "Hair/Mop"))
            .with(PartDef::unisex(SlotCategory::Beard, "Full", "Beard/Full"));
        let subject = Subject::new(Gender::Male, 70.0)
            .with_birth(10, 5500)
            .with_hair(StyleItem::new("Mop"))
            .with_beard(StyleItem::new("Full"));
        let selection = resolve(&defs, &subject, &bare_options());
        assert_eq!(
            selection.find(LayerKind::Wrinkles).unwrap().texture_path(),
            Some("Core/Unisex/Facial/Wrinkles")
        );
        let kinds = selection.kinds();
        let pos = |k| kinds.iter().position(|x| *x == k).unwrap();
        assert!(pos(LayerKind::Head) < pos(LayerKind::Wrinkles));
        assert!(pos(LayerKind::Wrinkles) < pos(LayerKind::Mouth));
        assert!(pos(LayerKind::FaceTattoo) < pos(LayerKind::Beard));
        assert!(pos(LayerKind::Beard) < pos(LayerKind::Brows));
        assert_eq!(kinds.last(), Some(&LayerKind::Hair));
    }

    #[test]
    fn test_hair_fallback_uses_adapter() {
        let subject =
            adult_female().with_hair(StyleItem::new("Modded").with_tex_path("Things/Hair/Modded"));
        let selection = resolve(&DefDatabase::new(), &subject, &bare_options());
        let hair = selection.find(LayerKind::Hair).unwrap();
        assert_eq!(
            hair.source,
            LayerSource::Fallback(FallbackTexture::new(
                "Things/Hair/Modded_south",
                4,
                Recolor::Palette
            ))
        );
        assert_eq!(hair.tint, Some(subject.hair_color));
    }

    #[test]
    fn test_newborn_skips_hair_beard_brows() {
        let defs = DefDatabase::new().with(PartDef::unisex(SlotCategory::Hair, "Mop", "Hair/Mop"));
        let mut subject = adult_female().with_hair(StyleItem::new("Mop"));
        subject.age_years = 1.0;
        let selection = resolve(&defs, &subject, &bare_options());
        assert_eq!(selection.flags.bracket, Bracket::Newborn);
        assert!(selection.find(LayerKind::Hair).is_none());
        assert!(selection.find(LayerKind::Brows).is_none());
        assert_eq!(
            selection.find(LayerKind::Neck).unwrap().texture_path(),
            Some("Core/FemaleNewborn/Neck")
        );
    }

    #[test]
    fn test_headgear_order_and_hide_top() {
        let mut hat = PartDef::unisex(SlotCategory::Headgear, "Cowboy", "Apparel/Cowboy");
        hat.hide_top = 3;
        let defs = DefDatabase::new()
            .with(hat)
            .with(PartDef::unisex(SlotCategory::Facegear, "Mask", "Apparel/Mask"))
            .with(PartDef::unisex(SlotCategory::Hair, "Mop", "Hair/Mop"))
            .with(PartDef::unisex(SlotCategory::Bodygear, "Parka", "Apparel/Parka"))
            .with(PartDef::unisex(SlotCategory::Bodygear, "Shirt", "Apparel/Shirt"));
        let subject = adult_female()
            .with_hair(StyleItem::new("Mop"))
            .with_apparel(WornItem::new("Cowboy", Color::BLACK))
            .with_apparel(WornItem::new("Parka", Color::WHITE).with_draw_offset(0.5))
            .with_apparel(WornItem::new("Mask", Color::WHITE))
            .with_apparel(WornItem::new("Shirt", Color::WHITE).with_draw_offset(0.1));
        let selection = resolve(&defs, &subject, &DisplayOptions::portrait(true, true));

        let paths: Vec<_> = selection
            .layers
            .iter()
            .map(|l| l.source.path().to_string())
            .collect();
        let pos = |p: &str| paths.iter().position(|x| x == p).unwrap();
        assert!(pos("Apparel/Shirt") < pos("Apparel/Parka"));
        assert!(pos("Apparel/Mask") < pos("Hair/Mop"));
        assert!(pos("Hair/Mop") < pos("Apparel/Cowboy"));
        assert_eq!(selection.flags.hair_hide_top, 3);
        assert_eq!(selection.find(LayerKind::Hair).unwrap().hide_top, 3);
        assert_eq!(selection.find(LayerKind::Head).unwrap().hide_top, 3);

        let hidden = resolve(&defs, &subject, &DisplayOptions::portrait(false, true));
        assert!(hidden.find(LayerKind::Headgear).is_none());
        assert!(hidden.find(LayerKind::Facegear).is_none());
        assert_eq!(hidden.flags.hair_hide_top, 0);
    }

    #[test]
    fn test_covers_all_draws_last() {
        let mut helmet = PartDef::unisex(SlotCategory::Headgear, "Helmet", "Apparel/Helmet");
        helmet.hide_hair = true;
        let defs = DefDatabase::new()
            .with(helmet)
            .with(PartDef::unisex(SlotCategory::Headgear, "Cap", "Apparel/Cap"))
            .with(PartDef::unisex(SlotCategory::Hair, "Mop", "Hair/Mop"));
        let subject = adult_female()
            .with_hair(StyleItem::new("Mop"))
            .with_apparel(WornItem::new("Helmet", Color::WHITE).covering_full_head())
            .with_apparel(WornItem::new("Cap", Color::WHITE))
            .with_gene(Gene::new("Horns").with_graphic(GeneGraphic {
                tex_path: "Things/Horns".into(),
                color: GeneColor::Default,
                layer: GeneLayer::Default,
                anchor: GeneAnchor::Head,
                variant: None,
            }));
        let selection = resolve(&defs, &subject, &DisplayOptions::portrait(true, true));
        assert_eq!(selection.kinds().last(), Some(&LayerKind::CoversAll));
        assert!(selection.find(LayerKind::Headgear).is_none());
        assert!(selection.find(LayerKind::Hair).is_none());
        assert!(selection.find(LayerKind::Gene).is_some());
    }

    #[test]
    fn test_generic_body_fallbacks() {
        let defs = DefDatabase::new()
            .with(PartDef::unisex(SlotCategory::Bodygear, GENERIC_ARMOR, "Apparel/Armor"))
            .with(PartDef::unisex(SlotCategory::Bodygear, GENERIC_CLOTHES, "Apparel/Generic"));
        let torso = |key: &str, category: &str| {
            WornItem::new(key, Color::WHITE)
                .with_body_group("Torso")
                .with_category(category)
        };
        let subject = adult_female()
            .with_apparel(torso("Plate", "ApparelArmor"))
            .with_apparel(torso("Robe", "Apparel"))
            .with_apparel(torso("Pack", "ApparelUtility"));
        let selection = resolve(&defs, &subject, &DisplayOptions::portrait(false, true));
        let body: Vec<_> = selection
            .layers
            .iter()
            .filter(|l| l.kind == LayerKind::Bodygear)
            .map(|l| l.source.path())
            .collect();
        assert_eq!(body, vec!["Apparel/Armor", "Apparel/Generic"]);
    }

    #[test]
    fn test_style_def_beats_base_item() {
        let defs = DefDatabase::new()
            .with(PartDef::unisex(SlotCategory::Bodygear, "Shirt", "Apparel/Shirt"))
            .with(PartDef::unisex(SlotCategory::Bodygear, "Shirt_Fancy", "Apparel/Fancy"));
        let subject = adult_female()
            .with_apparel(WornItem::new("Shirt", Color::WHITE).with_style("Shirt_Fancy"));
        let selection = resolve(&defs, &subject, &DisplayOptions::portrait(false, true));
        assert_eq!(
            selection.find(LayerKind::Bodygear).unwrap().source.path(),
            "Apparel/Fancy"
        );
    }

    #[test]
    fn test_head_missing_skips_face() {
        let subject = adult_female().with_injury(Injury::missing(BodyPart::new("Head")));
        let selection = resolve(&DefDatabase::new(), &subject, &bare_options());
        assert!(selection.flags.head_missing);
        assert_eq!(
            selection.kinds(),
            vec![LayerKind::Neck, LayerKind::BodyTattoo]
        );
    }

    #[test]
    fn test_missing_ear_restricts_side() {
        let subject =
            adult_female().with_injury(Injury::missing(BodyPart::sided("Ear", Side::Left)));
        let selection = resolve(&DefDatabase::new(), &subject, &bare_options());
        assert_eq!(selection.find(LayerKind::Ears).unwrap().sides, Sides::DEXTER);
    }

    #[test]
    fn test_ear_prosthetic_partitions_sides() {
        let defs = DefDatabase::new().with(PartDef::unisex(
            SlotCategory::HeadHediff,
            "BionicEar",
            "Core/Unisex/Ears/Bionic",
        ));
        let subject = adult_female()
            .with_injury(Injury::added("BionicEar", BodyPart::sided("Ear", Side::Right)));
        let selection = resolve(&defs, &subject, &bare_options());
        let ears = selection.find(LayerKind::Ears).unwrap().sides;
        let prosthetic = selection.find(LayerKind::Injury).unwrap().sides;
        assert!((ears & prosthetic).is_empty());
        assert_eq!(ears | prosthetic, Sides::all());
    }

    #[test]
    fn test_missing_nose_and_jaw() {
        let mut head = PartDef::unisex(SlotCategory::Head, "Narrow", "Core/Unisex/Head/Narrow");
        head.special_no_jaw = true;
        let defs = DefDatabase::new().with(head);
        let subject = adult_female()
            .with_head_type("Female_Narrow")
            .with_injury(Injury::missing(BodyPart::new("Nose")))
            .with_injury(Injury::missing(BodyPart::new("Jaw")));
        let selection = resolve(&defs, &subject, &bare_options());
        assert_eq!(
            selection.find(LayerKind::Nose).unwrap().texture_path(),
            Some("Core/Unisex/Nose/Missing")
        );
        assert_eq!(
            selection.find(LayerKind::Head).unwrap().texture_path(),
            Some("Core/Unisex/Head/NarrowNoJaw")
        );
        assert!(selection.find(LayerKind::Injury).is_none());
    }

    #[test]
    fn test_scar_and_missing_eye_layers() {
        let defs = DefDatabase::new().with(PartDef::unisex(
            SlotCategory::HeadHediff,
            "Eye_Cut",
            "Core/Unisex/Scars/EyeCut",
        ));
        let subject = adult_female()
            .with_injury(Injury::scar("Cut", BodyPart::sided("Eye", Side::Left)))
            .with_injury(Injury::missing(BodyPart::sided("Eye", Side::Right)));
        let selection = resolve(&defs, &subject, &bare_options());
        let injuries: Vec<_> = selection
            .layers
            .iter()
            .filter(|l| l.kind == LayerKind::Injury)
            .collect();
        assert_eq!(injuries.len(), 2);
        assert_eq!(injuries[0].texture_path(), Some("Core/Unisex/Scars/EyeCut"));
        assert_eq!(injuries[0].sides, Sides::SINISTER);
        assert_eq!(injuries[1].texture_path(), Some("Core/Unisex/Eyes/Missing"));
        assert_eq!(injuries[1].sides, Sides::DEXTER);
    }

    #[test]
    fn test_explicit_gene_def_claims_over_pool() {
        let graphic = GeneGraphic {
            tex_path: "Things/Ears/Pig".into(),
            color: GeneColor::Skin,
            layer: GeneLayer::Default,
            anchor: GeneAnchor::Head,
            variant: None,
        };
        let gene = Gene::new("Ears_Pig")
            .with_category(GeneCategory::Ears)
            .with_graphic(graphic);
        let subject = adult_female().with_gene(gene);

        let pooled = resolve(&DefDatabase::new(), &subject, &bare_options());
        let ears = pooled.find(LayerKind::Ears).unwrap();
        assert_eq!(
            ears.source,
            LayerSource::Fallback(FallbackTexture::new(
                "Things/Ears/Pig_south",
                2,
                Recolor::Palette
            ))
        );
        assert!(pooled.find(LayerKind::Gene).is_none());

        let defs = DefDatabase::new().with(PartDef::unisex(
            SlotCategory::Ears,
            "Ears_Pig",
            "Core/Unisex/Ears/Pig",
        ));
        let claimed = resolve(&defs, &subject, &bare_options());
        assert_eq!(
            claimed.find(LayerKind::Ears).unwrap().texture_path(),
            Some("Core/Unisex/Ears/Pig")
        );
    }

    #[test]
    fn test_ears_on_top() {
        let defs = DefDatabase::new()
            .with(PartDef::unisex(SlotCategory::Ears, "Ears_Elf", "Core/Unisex/Ears/Elf"))
            .with(PartDef::unisex(SlotCategory::Hair, "Mop", "Hair/Mop"));
        let subject = adult_female()
            .with_hair(StyleItem::new("Mop"))
            .with_gene(Gene::new("Ears_Elf"));
        let mut settings = settings();
        settings.ears_on_top = true;
        let selection = PartSelector::new(&defs, &settings).resolve(&subject, &bare_options());
        assert_eq!(selection.kinds().last(), Some(&LayerKind::Ears));
    }

    #[test]
    fn test_rotting_eyes_blend_from_default_colors() {
        let mut subject = adult_female();
        subject.dead = true;
        subject.rot = RotState::Rotting;
        let selection = resolve(&DefDatabase::new(), &subject, &bare_options());
        // (0.6 + 2 * 0.1) / 3
        let (c1, c2) = selection.flags.eye_colors;
        assert_eq!(c1, c2);
        assert!((c1.r - 0.8 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_mirrored_prosthetics() {
        let defs = DefDatabase::new()
            .with(PartDef::unisex(SlotCategory::HeadHediff, "Dentures", "Core/Unisex/Jaw/Dentures"))
            .with(PartDef::unisex(SlotCategory::BodyHediff, "BionicArm", "Core/Unisex/Body/BionicArm"));
        let subject = adult_female()
            .with_injury(Injury::added("Dentures", BodyPart::new("Jaw")).mirrored())
            .with_injury(Injury::added("BionicArm", BodyPart::new("Arm")));
        let selection = resolve(&defs, &subject, &bare_options());
        assert!(selection.find(LayerKind::Injury).unwrap().flip);
        assert!(!selection.find(LayerKind::BodyHediff).unwrap().flip);

        let subject = adult_female()
            .with_injury(Injury::added("BionicArm", BodyPart::new("Arm")).mirrored());
        let selection = resolve(&defs, &subject, &bare_options());
        assert!(selection.find(LayerKind::BodyHediff).unwrap().flip);
    }

    #[test]
    fn test_rotting_corpse() {
        let mut subject = adult_female().with_trait("BodyMastery");
        subject.dead = true;
        subject.rot = RotState::Rotting;
        let selection = resolve(&DefDatabase::new(), &subject, &bare_options());
        assert!(selection.flags.dead);
        let kinds = selection.kinds();
        assert_eq!(kinds[0], LayerKind::Skeleton);
        let skull = kinds.iter().position(|k| *k == LayerKind::Skull).unwrap();
        assert_eq!(kinds[skull + 1], LayerKind::Head);
        let head = selection.find(LayerKind::Head).unwrap();
        assert!(head.alpha_mask.as_deref().unwrap().starts_with("Core/Unisex/Corpse/FaceMask"));
        let neck = selection.find(LayerKind::Neck).unwrap();
        assert!(neck.alpha_mask.as_deref().unwrap().starts_with("Core/Unisex/Corpse/BodyMask"));

        // (0.7 + 2 * 1.0) / 3
        let (c1, c2) = selection.flags.eye_colors;
        assert_eq!(c1, c2);
        assert!((c1.r - 0.9).abs() < 1e-5);

        let mut settings = settings();
        settings.no_corpse_gore = true;
        let clean = PartSelector::new(&DefDatabase::new(), &settings)
            .resolve(&subject, &bare_options());
        assert!(clean.find(LayerKind::Skeleton).is_none());
        assert!(clean.find(LayerKind::Skull).is_none());
    }

    #[test]
    fn test_downed_eligibility() {
        let mut subject = adult_female();
        subject.downed = true;
        let bar = DisplayOptions::colonist_bar(false, false);
        assert!(resolve(&DefDatabase::new(), &subject, &bar).flags.downed);
        assert!(!resolve(&DefDatabase::new(), &subject, &bare_options()).flags.downed);

        subject.age_years = 1.0;
        assert!(!resolve(&DefDatabase::new(), &subject, &bar).flags.downed);
    }

    #[test]
    fn test_same_lips_setting() {
        let mut settings = settings();
        settings.no_female_lips = true;
        let selection = PartSelector::new(&DefDatabase::new(), &settings)
            .resolve(&adult_female(), &bare_options());
        let mouth = selection.find(LayerKind::Mouth).unwrap();
        assert!(mouth.texture_path().unwrap().starts_with("Core/Male/Mouth/"));
        assert_eq!(mouth.offset, -1);
    }
}
