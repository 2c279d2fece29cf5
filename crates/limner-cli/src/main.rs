//! Limner CLI
//!
//! Command-line front end for rendering and inspecting avatar portraits.

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::RenderArgs;

#[derive(Parser)]
#[command(name = "limner")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a subject to a PNG file
    Render {
        /// Subject file (JSON)
        input: String,

        #[command(flatten)]
        args: RenderArgs,

        /// Output file
        #[arg(short, long, default_value = "avatar.png")]
        output: String,

        /// Write the 480x576 export size instead of the display size
        #[arg(long)]
        upscaled: bool,
    },

    /// Print the resolved layer stack
    Layers {
        /// Subject file (JSON)
        input: String,

        #[command(flatten)]
        args: RenderArgs,
    },

    /// Preview the avatar in the terminal
    Preview {
        /// Subject file (JSON)
        input: String,

        #[command(flatten)]
        args: RenderArgs,
    },

    /// Print the portrait generator prompt
    Prompts {
        /// Subject file (JSON)
        input: String,

        /// Prompt defs file (JSON)
        #[arg(long)]
        prompts: String,

        /// Settings file (JSON)
        #[arg(long)]
        settings: Option<String>,

        /// Leave headgear out of the prompt
        #[arg(long)]
        no_headgear: bool,

        /// Leave clothing out of the prompt
        #[arg(long)]
        no_clothes: bool,
    },

    /// Manage static portraits
    Portrait {
        /// What to do with the portrait
        #[arg(value_enum)]
        action: commands::portrait::PortraitAction,

        /// Subject file (JSON)
        input: String,

        #[command(flatten)]
        args: RenderArgs,

        /// Prompt defs file (JSON), used by generate
        #[arg(long)]
        prompts: Option<String>,

        /// Directory holding static portraits
        #[arg(long)]
        static_dir: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_ansi(!cli.no_color)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Render {
            input,
            args,
            output,
            upscaled,
        } => commands::render::run(&input, &args, &output, upscaled),
        Commands::Layers { input, args } => commands::layers::run(&input, &args),
        Commands::Preview { input, args } => commands::preview::run(&input, &args, !cli.no_color),
        Commands::Prompts {
            input,
            prompts,
            settings,
            no_headgear,
            no_clothes,
        } => commands::prompts::run(
            &input,
            &prompts,
            settings.as_deref(),
            !no_headgear,
            !no_clothes,
        ),
        Commands::Portrait {
            action,
            input,
            args,
            prompts,
            static_dir,
        } => commands::portrait::run(
            action,
            &input,
            &args,
            prompts.as_deref(),
            static_dir.as_deref(),
        ),
    }
}
