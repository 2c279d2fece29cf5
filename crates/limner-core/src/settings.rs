//! Avatar settings and per-view display options

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::defs::DefError;

/// Background drawn behind the inspector avatar
pub const DEFAULT_BACKGROUND: Color = Color::rgba(0.5, 0.5, 0.6, 0.5);

/// Global avatar settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarSettings {
    /// Displayed avatar width in UI units
    pub display_width: f32,
    /// Upscale with the edge-preserving 2x rule instead of copying
    pub scaling: bool,
    /// Whether new views start with headgear shown
    pub default_draw_headgear: bool,
    /// Hair stays visible under headgear unless the headgear def hides it
    pub show_hair_with_headgear: bool,
    pub add_outline: bool,
    pub hide_background: bool,
    /// Female mouths use male art
    pub no_female_lips: bool,
    pub no_wrinkles: bool,
    /// Non-default ears draw above hair and headgear
    pub ears_on_top: bool,
    /// Skip skeleton, decay masks and scars on corpses
    pub no_corpse_gore: bool,
    /// Minimum milliseconds between accepted invalidations
    pub throttle_ms: u64,
    /// Minimum milliseconds between static portrait checks
    pub static_poll_ms: u64,
    /// Directory holding static portraits; platform data dir when unset
    pub static_dir: Option<PathBuf>,
    /// External portrait generator; empty disables generation
    pub ai_gen_executable: String,
    /// Prompt preamble with `{age}`, `{gender}` and `{lifestage}` placeholders
    pub ai_gen_preamble: String,
}

impl Default for AvatarSettings {
    fn default() -> Self {
        Self {
            display_width: 160.0,
            scaling: true,
            default_draw_headgear: true,
            show_hair_with_headgear: true,
            add_outline: false,
            hide_background: false,
            no_female_lips: false,
            no_wrinkles: false,
            ears_on_top: false,
            no_corpse_gore: false,
            throttle_ms: 100,
            static_poll_ms: 200,
            static_dir: None,
            ai_gen_executable: String::new(),
            ai_gen_preamble: "front portrait of a {age} year old {gender} {lifestage}, ".to_string(),
        }
    }
}

impl AvatarSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a JSON file; missing fields keep their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DefError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DefError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn with_scaling(mut self, scaling: bool) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn with_outline(mut self, outline: bool) -> Self {
        self.add_outline = outline;
        self
    }

    pub fn with_throttle_ms(mut self, ms: u64) -> Self {
        self.throttle_ms = ms;
        self
    }

    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn with_ai_gen_executable(mut self, exe: impl Into<String>) -> Self {
        self.ai_gen_executable = exe.into();
        self
    }

    /// Background for the main inspector view
    pub fn background(&self) -> Color {
        if self.hide_background {
            Color::TRANSPARENT
        } else {
            DEFAULT_BACKGROUND
        }
    }
}

/// Per-view display toggles carried by each cache entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayOptions {
    pub draw_headgear: bool,
    pub draw_clothes: bool,
    pub background: Color,
    /// Render downed subjects lying down
    pub check_downed: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            draw_headgear: true,
            draw_clothes: true,
            background: DEFAULT_BACKGROUND,
            check_downed: false,
        }
    }
}

impl DisplayOptions {
    /// Main inspector pane
    pub fn inspector(settings: &AvatarSettings) -> Self {
        Self {
            draw_headgear: settings.default_draw_headgear,
            draw_clothes: true,
            background: settings.background(),
            check_downed: false,
        }
    }

    /// Colonist bar: transparent and posture-aware
    pub fn colonist_bar(draw_headgear: bool, draw_clothes: bool) -> Self {
        Self {
            draw_headgear,
            draw_clothes,
            background: Color::TRANSPARENT,
            check_downed: true,
        }
    }

    /// Portrait for export and prompt generation
    pub fn portrait(draw_headgear: bool, draw_clothes: bool) -> Self {
        Self {
            draw_headgear,
            draw_clothes,
            background: Color::TRANSPARENT,
            check_downed: false,
        }
    }

    pub fn with_headgear(mut self, draw: bool) -> Self {
        self.draw_headgear = draw;
        self
    }

    pub fn with_clothes(mut self, draw: bool) -> Self {
        self.draw_clothes = draw;
        self
    }

    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    pub fn with_check_downed(mut self, check: bool) -> Self {
        self.check_downed = check;
        self
    }
}
