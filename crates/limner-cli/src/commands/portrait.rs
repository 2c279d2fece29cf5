//! Portrait command

use limner_core::DisplayOptions;
use limner_pipeline::PromptDatabase;
use tracing::{info, warn};

use super::{RenderArgs, load_subject};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum PortraitAction {
    /// Use a static portrait, exporting the current avatar if none exists
    Enable,
    /// Move the static portrait aside
    Disable,
    /// Export a portrait and run the configured generator on it
    Generate,
}

pub fn run(
    action: PortraitAction,
    input: &str,
    args: &RenderArgs,
    prompts: Option<&str>,
    static_dir: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let subject = load_subject(input)?;
    let mut settings = args.load_settings()?;
    if let Some(dir) = static_dir {
        settings = settings.with_static_dir(dir);
    }
    let prompts = prompts.map(PromptDatabase::load).transpose()?;
    let mut pipeline = args.pipeline(settings, prompts)?;
    let options = DisplayOptions::portrait(!args.no_headgear, !args.no_clothes);

    match action {
        PortraitAction::Enable => {
            let path = pipeline.enable_static(&subject, &options)?;
            println!("Static portrait: {}", path.display());
        }
        PortraitAction::Disable => {
            pipeline.disable_static(&subject)?;
            println!("Static portrait disabled for {}", subject.name);
        }
        PortraitAction::Generate => {
            info!("Generating portrait for {}", subject.name);
            let status = pipeline.generate_portrait(&subject, &options)?;
            if status.is_success() {
                println!("{}: {}", status.message(), pipeline.static_path(&subject).display());
            } else {
                warn!("{}", status.message());
                return Err(status.message().into());
            }
        }
    }
    Ok(())
}
