//! Avatar rendering
//!
//! Glues the [`PartSelector`] to the [`Compositor`]: resolve the layer
//! stack, derive the global render flags, then composite.

use limner_core::{AvatarSettings, Bitmap, Color, DefDatabase, DisplayOptions, Subject};
use limner_raster::{CompositeError, CompositeStats, Compositor, RenderFlags, TextureStore};
use tracing::{Level, debug, span};

use crate::selector::{PartSelector, Selection, SelectionFlags};

/// Result of one render
#[derive(Debug, Clone)]
pub struct RenderedAvatar {
    pub bitmap: Bitmap,
    pub selection: Selection,
    pub stats: CompositeStats,
}

/// Global compositor flags for a resolved selection
pub fn render_flags(
    flags: &SelectionFlags,
    options: &DisplayOptions,
    settings: &AvatarSettings,
) -> RenderFlags {
    RenderFlags {
        background: if settings.hide_background {
            Color::TRANSPARENT
        } else {
            options.background
        },
        y_offset: flags.bracket.y_offset(),
        eye_level: flags.bracket.eye_level(),
        downed: flags.downed,
        dead: flags.dead,
        outline: settings.add_outline,
        scaling: settings.scaling,
    }
}

/// Selector plus compositor
#[derive(Debug, Clone, Default)]
pub struct AvatarRenderer {
    compositor: Compositor,
}

impl AvatarRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `subject` onto `canvas` and return the final bitmap
    pub fn render(
        &self,
        subject: &Subject,
        options: &DisplayOptions,
        defs: &DefDatabase,
        settings: &AvatarSettings,
        store: &mut TextureStore,
        canvas: &mut Bitmap,
    ) -> Result<RenderedAvatar, CompositeError> {
        let span = span!(Level::DEBUG, "render_avatar", subject = %subject.id);
        let _enter = span.enter();

        let selection = PartSelector::new(defs, settings).resolve(subject, options);
        let flags = render_flags(&selection.flags, options, settings);
        let (bitmap, stats) = self
            .compositor
            .render(canvas, &selection.layers, &flags, store)?;

        debug!(
            drawn = stats.drawn,
            skipped = stats.skipped,
            width = bitmap.width,
            height = bitmap.height,
            "Avatar rendered"
        );
        Ok(RenderedAvatar {
            bitmap,
            selection,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use limner_core::{Bracket, CANVAS_HEIGHT, CANVAS_WIDTH, Gender, LayerKind};
    use limner_raster::MemoryTextureSource;

    fn art() -> MemoryTextureSource {
        MemoryTextureSource::new()
            .with("Core/Female/Neck", Bitmap::filled(40, 40, Color::WHITE))
            .with("Core/Female/Head/AverageNormal", Bitmap::filled(40, 48, Color::WHITE))
    }

    fn render(subject: &Subject, options: &DisplayOptions, settings: &AvatarSettings) -> RenderedAvatar {
        let mut store = TextureStore::new(art());
        let mut canvas = Compositor::canvas();
        AvatarRenderer::new()
            .render(
                subject,
                options,
                &DefDatabase::new(),
                settings,
                &mut store,
                &mut canvas,
            )
            .unwrap()
    }

    #[test]
    fn test_render_flags_from_bracket() {
        let flags = SelectionFlags {
            bracket: Bracket::Child,
            downed: true,
            dead: false,
            head_missing: false,
            hide_hair: false,
            hide_beard: false,
            hair_hide_top: 0,
            head_hide_top: 0,
            eye_colors: (Color::WHITE, Color::WHITE),
        };
        let mut settings = AvatarSettings::default();
        settings.hide_background = true;
        let render = render_flags(&flags, &DisplayOptions::default(), &settings);
        assert_eq!(render.y_offset, 2);
        assert_eq!(render.eye_level, -1);
        assert!(render.downed);
        assert_eq!(render.background, Color::TRANSPARENT);
    }

    #[test]
    fn test_render_sizes() {
        let subject = Subject::new(Gender::Female, 30.0);
        let options = DisplayOptions::portrait(false, false);

        let scaled = render(&subject, &options, &AvatarSettings::default());
        assert_eq!(scaled.bitmap.dimensions(), (CANVAS_WIDTH * 2, CANVAS_HEIGHT * 2));
        assert_eq!(scaled.selection.layers[0].kind, LayerKind::Neck);
        assert_eq!(scaled.stats.drawn, 2);

        let plain = render(&subject, &options, &AvatarSettings::default().with_scaling(false));
        assert_eq!(plain.bitmap.dimensions(), (CANVAS_WIDTH, CANVAS_HEIGHT));
    }

    #[test]
    fn test_idempotent_render() {
        let subject = Subject::new(Gender::Female, 30.0).with_birth(40, 5501);
        let options = DisplayOptions::inspector(&AvatarSettings::default());
        let settings = AvatarSettings::default();
        let first = render(&subject, &options, &settings);
        let second = render(&subject, &options, &settings);
        assert_eq!(first.bitmap.content_hash(), second.bitmap.content_hash());
    }

    #[test]
    fn test_downed_render_differs() {
        let mut subject = Subject::new(Gender::Female, 30.0);
        subject.downed = true;
        let settings = AvatarSettings::default();
        let standing = render(&subject, &DisplayOptions::portrait(false, false), &settings);
        let lying = render(&subject, &DisplayOptions::colonist_bar(false, false), &settings);
        assert!(lying.selection.flags.downed);
        assert_ne!(standing.bitmap, lying.bitmap);
    }
}
