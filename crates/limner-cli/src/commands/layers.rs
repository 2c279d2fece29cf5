//! Layers command

use limner_core::{Layer, LayerSource, Sides};
use tracing::info;

use super::{RenderArgs, load_subject};

fn describe_source(layer: &Layer) -> String {
    match &layer.source {
        LayerSource::Texture(path) => path.clone(),
        LayerSource::Fallback(fallback) => format!("{} (adapted)", fallback.path),
    }
}

fn describe_sides(sides: Sides) -> &'static str {
    if sides == Sides::all() {
        "both"
    } else if sides == Sides::DEXTER {
        "dexter"
    } else if sides == Sides::SINISTER {
        "sinister"
    } else {
        "none"
    }
}

pub fn run(input: &str, args: &RenderArgs) -> Result<(), Box<dyn std::error::Error>> {
    info!("Resolving layers for {}", input);

    let subject = load_subject(input)?;
    let settings = args.load_settings()?;
    let options = args.display_options(&settings);
    let pipeline = args.pipeline(settings, None)?;

    let selection = pipeline.selection(&subject, &options);
    let flags = &selection.flags;

    println!("Subject: {} ({:?}, {:?})", subject.name, subject.gender, flags.bracket);
    println!("==========================================\n");

    println!("{:<3} {:<14} {:<9} {:>6} {:>8}  Texture", "#", "Kind", "Sides", "Offset", "HideTop");
    for (i, layer) in selection.layers.iter().enumerate() {
        let mut notes = Vec::new();
        if layer.tint.is_some() {
            notes.push("tinted");
        }
        if layer.gradient.is_some() {
            notes.push("gradient");
        }
        if layer.alpha_mask.is_some() {
            notes.push("masked");
        }
        if layer.eye_marks.is_some() {
            notes.push("eye marks");
        }
        if layer.flip {
            notes.push("flipped");
        }
        let notes = if notes.is_empty() {
            String::new()
        } else {
            format!("  [{}]", notes.join(", "))
        };
        println!(
            "{:<3} {:<14} {:<9} {:>6} {:>8}  {}{}",
            i,
            layer.kind.as_str(),
            describe_sides(layer.sides),
            layer.offset,
            layer.hide_top,
            describe_source(layer),
            notes
        );
    }

    println!();
    println!("Flags:");
    println!("  Downed:       {}", if flags.downed { "Yes" } else { "No" });
    println!("  Dead:         {}", if flags.dead { "Yes" } else { "No" });
    println!("  Head missing: {}", if flags.head_missing { "Yes" } else { "No" });
    println!("  Hide hair:    {}", if flags.hide_hair { "Yes" } else { "No" });
    println!("  Hide beard:   {}", if flags.hide_beard { "Yes" } else { "No" });
    println!("  Hair crop:    {}", flags.hair_hide_top);
    println!("  Head crop:    {}", flags.head_hide_top);

    Ok(())
}
