//! Prompts command

use limner_core::DisplayOptions;
use limner_pipeline::{PromptDatabase, build_prompt};
use tracing::info;

use super::{load_settings, load_subject};

pub fn run(
    input: &str,
    prompts: &str,
    settings: Option<&str>,
    draw_headgear: bool,
    draw_clothes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Building prompt for {}", input);

    let subject = load_subject(input)?;
    let settings = load_settings(settings)?;
    let db = PromptDatabase::load(prompts)?;
    info!("Loaded {} prompt defs", db.len());

    let options = DisplayOptions::portrait(draw_headgear, draw_clothes);
    println!("{}", build_prompt(&subject, &db, &settings, &options));
    Ok(())
}
