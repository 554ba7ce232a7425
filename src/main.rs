//! Lofi CLI
//!
//! Command-line interface for the lo-fi conversion engine.

use clap::Parser;
use env_logger::Env;
use log::info;

use lofi::cli::commands;
use lofi::cli::{Cli, Commands};
use lofi::Result;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    info!("Lofi v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Lofi v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error [{}]: {}", e.error_code(), e);
        eprintln!("Hint: {}", e.recovery_hint());
        std::process::exit(1);
    }
}

fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Process {
            input,
            output,
            settings,
            bit_depth,
        } => commands::process_file(&input, &output, &settings.to_settings(), bit_depth),
        Commands::Extract { locator, config } => commands::extract(&locator, config.as_deref()),
        Commands::Render {
            audio_url,
            settings,
            config,
        } => commands::render(&audio_url, &settings.to_settings(), config.as_deref()),
        Commands::Params { settings } => commands::show_params(&settings.to_settings()),
        Commands::Presets => commands::list_presets(),
        Commands::Analyze { path } => commands::analyze(&path),
    }
}
