//! CLI commands

pub mod layers;
pub mod portrait;
pub mod preview;
pub mod prompts;
pub mod render;

use std::error::Error;
use std::fs;

use clap::Args;
use limner_core::{AvatarSettings, DefDatabase, DisplayOptions, Subject};
use limner_pipeline::{AvatarPipeline, PipelineBuilder, PromptDatabase};
use limner_raster::DirTextureSource;
use tracing::{debug, warn};

/// Inputs shared by every command that renders
#[derive(Args)]
pub struct RenderArgs {
    /// Part defs file (JSON)
    #[arg(long)]
    pub defs: String,

    /// Native art directory, optionally followed by a host sprite directory
    #[arg(long, required = true, num_args = 1..)]
    pub assets: Vec<String>,

    /// Settings file (JSON)
    #[arg(long)]
    pub settings: Option<String>,

    /// Hide headgear
    #[arg(long)]
    pub no_headgear: bool,

    /// Hide clothing
    #[arg(long)]
    pub no_clothes: bool,

    /// Draw downed subjects lying down
    #[arg(long)]
    pub check_downed: bool,
}

impl RenderArgs {
    pub fn load_settings(&self) -> Result<AvatarSettings, Box<dyn Error>> {
        load_settings(self.settings.as_deref())
    }

    pub fn display_options(&self, settings: &AvatarSettings) -> DisplayOptions {
        DisplayOptions::inspector(settings)
            .with_headgear(!self.no_headgear)
            .with_clothes(!self.no_clothes)
            .with_check_downed(self.check_downed)
    }

    /// Assemble a pipeline from the command line inputs
    pub fn pipeline(
        &self,
        settings: AvatarSettings,
        prompts: Option<PromptDatabase>,
    ) -> Result<AvatarPipeline, Box<dyn Error>> {
        let defs = DefDatabase::load(&self.defs)?;
        debug!(defs = defs.len(), path = %self.defs, "Loaded part defs");

        let mut builder = PipelineBuilder::new().defs(defs).settings(settings);
        if let Some(prompts) = prompts {
            builder = builder.prompts(prompts);
        }

        let mut dirs = self.assets.iter();
        if let Some(local) = dirs.next() {
            builder = builder.local_source(DirTextureSource::new(local));
        }
        if let Some(host) = dirs.next() {
            builder = builder.host_source(DirTextureSource::new(host));
        }
        let extra: Vec<_> = dirs.collect();
        if !extra.is_empty() {
            warn!("Ignoring extra asset directories: {:?}", extra);
        }

        Ok(builder.build()?)
    }
}

pub fn load_settings(path: Option<&str>) -> Result<AvatarSettings, Box<dyn Error>> {
    match path {
        Some(path) => Ok(AvatarSettings::load(path)?),
        None => Ok(AvatarSettings::default()),
    }
}

pub fn load_subject(path: &str) -> Result<Subject, Box<dyn Error>> {
    let json = fs::read_to_string(path)?;
    let subject: Subject = serde_json::from_str(&json)?;
    Ok(subject)
}
