//! Render command

use std::path::Path;

use tracing::info;

use super::{RenderArgs, load_subject};

pub fn run(
    input: &str,
    args: &RenderArgs,
    output: &str,
    upscaled: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Rendering avatar from {}", input);

    let subject = load_subject(input)?;
    let settings = args.load_settings()?;
    let options = args.display_options(&settings);
    let mut pipeline = args.pipeline(settings, None)?;

    pipeline.export_png(&subject, &options, Path::new(output), upscaled)?;

    let textures = pipeline.texture_store().stats();
    info!(
        "Textures: {} loaded, {} missing, {} adapted",
        textures.loads, textures.missing, textures.adaptations
    );

    println!("Output written to {}", output);
    Ok(())
}
