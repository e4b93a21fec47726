use std::path::Path;

use clap::Subcommand;

use adboard_core::config::{Config, WarnLevel};

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Load the config and report warnings; non-zero exit on errors
    Validate,
}

pub fn run(config_path: &Path, subcommand: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        ConfigSubcommand::Validate => validate(config_path, json),
    }
}

fn validate(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let warnings = config.validate();

    if json {
        println!("{}", serde_json::to_string_pretty(&warnings)?);
    } else if warnings.is_empty() {
        println!("{} is valid", config_path.display());
    } else {
        for warning in &warnings {
            let tag = match warning.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("{tag}: {}", warning.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("configuration has errors");
    }
    Ok(())
}
