//! Portrait prompts
//!
//! Builds the text prompt handed to an external image generator from the
//! subject's visible features. Prompt defs map style, gene and apparel keys
//! to prompt fragments and may name fragments they override.

use std::collections::HashMap;
use std::path::Path;

use limner_core::{AvatarSettings, DefError, DisplayOptions, Gender, Subject};
use serde::{Deserialize, Serialize};

/// Prompt fragment for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDef {
    pub key: String,
    pub prompt: String,
    /// Fragments removed from the final prompt when this one is used
    #[serde(default)]
    pub overrides: Vec<String>,
}

impl PromptDef {
    pub fn new(key: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            prompt: prompt.into(),
            overrides: Vec::new(),
        }
    }

    pub fn overriding(mut self, prompt: impl Into<String>) -> Self {
        self.overrides.push(prompt.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct PromptFile {
    prompts: Vec<PromptDef>,
}

/// Prompt defs by key
#[derive(Debug, Clone, Default)]
pub struct PromptDatabase {
    defs: HashMap<String, PromptDef>,
}

impl PromptDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `{"prompts": [...]}`
    pub fn from_json_str(json: &str) -> Result<Self, DefError> {
        let file: PromptFile = serde_json::from_str(json)?;
        let mut db = Self::new();
        for def in file.prompts {
            db.insert(def);
        }
        Ok(db)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DefError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DefError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn insert(&mut self, def: PromptDef) {
        self.defs.insert(def.key.clone(), def);
    }

    pub fn with(mut self, def: PromptDef) -> Self {
        self.insert(def);
        self
    }

    pub fn get(&self, key: &str) -> Option<&PromptDef> {
        self.defs.get(key)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// Insertion-ordered fragment set
#[derive(Default)]
struct Fragments {
    items: Vec<String>,
    overridden: Vec<String>,
}

impl Fragments {
    fn add(&mut self, prompt: &str) {
        if !prompt.is_empty() && !self.items.iter().any(|p| p == prompt) {
            self.items.push(prompt.to_string());
        }
    }

    fn add_def(&mut self, def: &PromptDef) {
        self.add(&def.prompt);
        self.overridden.extend(def.overrides.iter().cloned());
    }

    fn finish(self) -> Vec<String> {
        let overridden = self.overridden;
        self.items
            .into_iter()
            .filter(|p| !overridden.contains(p))
            .collect()
    }
}

/// Preamble with `{age}`, `{gender}` and `{lifestage}` filled in
pub fn preamble(subject: &Subject, settings: &AvatarSettings) -> String {
    let gender = match subject.gender {
        Gender::Female => "female",
        Gender::Male => "male",
    };
    let life_stage = subject
        .life_stage_key
        .as_deref()
        .and_then(|key| key.get(9..))
        .filter(|rest| !rest.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_else(|| "adult".to_string());
    settings
        .ai_gen_preamble
        .replace("{age}", &(subject.age_years.floor() as i64).to_string())
        .replace("{gender}", gender)
        .replace("{lifestage}", &life_stage)
}

/// Feature fragments in draw-relevant order, overrides applied
pub fn prompt_fragments(
    subject: &Subject,
    db: &PromptDatabase,
    options: &DisplayOptions,
) -> Vec<String> {
    let mut fragments = Fragments::default();
    let add_key = |fragments: &mut Fragments, key: &str, fallback: Option<&str>| {
        match (db.get(key), fallback) {
            (Some(def), _) => fragments.add_def(def),
            (None, Some(text)) => fragments.add(text),
            (None, None) => {}
        }
    };

    if subject.shows_wrinkles() {
        add_key(&mut fragments, "Wrinkles", None);
    }
    if let Some(hair) = &subject.hair {
        add_key(&mut fragments, &hair.key, None);
    }
    let styles = [
        (&subject.beard, "NoBeard", "beard"),
        (&subject.face_tattoo, "NoTattoo_Face", "facial tattoo"),
        (&subject.body_tattoo, "NoTattoo_Body", "body tattoo"),
    ];
    for (item, none, generic) in styles {
        if let Some(item) = item {
            if item.key != none {
                add_key(&mut fragments, &item.key, Some(generic));
            }
        }
    }
    for gene in &subject.genes {
        add_key(&mut fragments, &gene.key, None);
    }
    if options.draw_clothes {
        for item in &subject.apparel {
            if item.on_layer("Belt") {
                continue;
            }
            if !options.draw_headgear && (item.on_layer("Overhead") || item.on_layer("EyeCover")) {
                continue;
            }
            let label = (!item.label.is_empty()).then_some(item.label.as_str());
            add_key(&mut fragments, &item.key, label);
        }
    }
    fragments.finish()
}

/// Full prompt: preamble followed by the comma-separated fragments
pub fn build_prompt(
    subject: &Subject,
    db: &PromptDatabase,
    settings: &AvatarSettings,
    options: &DisplayOptions,
) -> String {
    let fragments = prompt_fragments(subject, db, options);
    format!("{}{}", preamble(subject, settings), fragments.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use limner_core::{Color, Gene, StyleItem, WornItem};

    fn db() -> PromptDatabase {
        PromptDatabase::new()
            .with(PromptDef::new("Mop", "messy hair"))
            .with(PromptDef::new("Wrinkles", "wrinkles"))
            .with(PromptDef::new("Gasmask", "gas mask").overriding("messy hair"))
            .with(PromptDef::new("Skin_Blue", "blue skin"))
    }

    #[test]
    fn test_preamble_placeholders() {
        let mut subject = Subject::new(Gender::Female, 14.7);
        subject.life_stage_key = Some("HumanlikeTeenager".into());
        let settings = AvatarSettings::default();
        assert_eq!(
            preamble(&subject, &settings),
            "front portrait of a 14 year old female teenager, "
        );
        subject.life_stage_key = None;
        assert!(preamble(&subject, &settings).ends_with("female adult, "));
    }

    #[test]
    fn test_fragment_order_and_fallbacks() {
        let subject = Subject::new(Gender::Male, 30.0)
            .with_hair(StyleItem::new("Mop"))
            .with_beard(StyleItem::new("Stubble"))
            .with_gene(Gene::new("Skin_Blue"))
            .with_gene(Gene::new("Unknown"))
            .with_apparel(WornItem::new("Belt", Color::WHITE).with_layer("Belt"))
            .with_apparel(WornItem::new("Parka", Color::WHITE));
        let mut subject = subject;
        subject.apparel[1].label = "parka".into();
        let fragments = prompt_fragments(&subject, &db(), &DisplayOptions::default());
        assert_eq!(fragments, vec!["messy hair", "beard", "blue skin", "parka"]);
    }

    #[test]
    fn test_overrides_and_headgear() {
        let subject = Subject::new(Gender::Male, 30.0)
            .with_hair(StyleItem::new("Mop"))
            .with_apparel(WornItem::new("Gasmask", Color::WHITE).with_layer("Overhead"));
        let db = db();
        let with_hat = prompt_fragments(&subject, &db, &DisplayOptions::default());
        assert_eq!(with_hat, vec!["gas mask"]);

        let options = DisplayOptions::default().with_headgear(false);
        let bare = prompt_fragments(&subject, &db, &options);
        assert_eq!(bare, vec!["messy hair"]);
    }

    #[test]
    fn test_build_prompt_and_dedup() {
        let subject = Subject::new(Gender::Male, 75.0)
            .with_gene(Gene::new("Skin_Blue"))
            .with_gene(Gene::new("Skin_Blue"));
        let prompt = build_prompt(
            &subject,
            &db(),
            &AvatarSettings::default(),
            &DisplayOptions::default(),
        );
        assert_eq!(
            prompt,
            "front portrait of a 75 year old male adult, wrinkles, blue skin"
        );
    }

    #[test]
    fn test_load_from_json() {
        let db = PromptDatabase::from_json_str(
            r#"{"prompts": [{"key": "Mop", "prompt": "messy hair"},
                            {"key": "Hat", "prompt": "hat", "overrides": ["messy hair"]}]}"#,
        )
        .unwrap();
        assert_eq!(db.len(), 2);
        assert_eq!(db.get("Hat").unwrap().overrides, vec!["messy hair"]);
    }
}
