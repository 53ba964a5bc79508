//! Config command - inspect and edit the configuration file.
//!
//! Every subcommand works on the file named by `--config`, falling back to
//! the per-user file under the platform config directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use console::style;
use serde_json::Value;
use tracing::debug;

use glyphscan_core::GlyphConfig;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Write a configuration file with default values
    Init {
        /// Where to write it (default: the active configuration file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Print one value, e.g. "segmentation.margin" or "training.grid.c"
    Get { key: String },

    /// Change one value; bare words are stored as strings
    Set { key: String, value: String },

    /// Print the active configuration file path
    Path,
}

pub async fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let file = config_path.map(PathBuf::from).unwrap_or_else(default_config_path);

    match args.command {
        ConfigCommand::Show => {
            if !file.exists() {
                println!(
                    "{} {} does not exist, showing defaults.",
                    style("ℹ").blue(),
                    file.display()
                );
            }
            println!("{}", serde_json::to_string_pretty(&read_or_default(&file)?)?);
        }
        ConfigCommand::Init { output, force } => {
            init_config(&output.unwrap_or(file), force)?;
        }
        ConfigCommand::Get { key } => {
            let json = serde_json::to_value(read_or_default(&file)?)?;
            let value = json
                .pointer(&pointer(&key))
                .with_context(|| format!("Configuration key not found: {}", key))?;
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        ConfigCommand::Set { key, value } => set_config(&file, &key, &value)?,
        ConfigCommand::Path => {
            println!("Configuration file: {}", file.display());
            if file.exists() {
                println!("Status: {}", style("exists").green());
            } else {
                println!("Status: {}", style("not created").yellow());
                println!();
                println!("Run 'glyphscan config init' to create a configuration file.");
            }
        }
    }

    Ok(())
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("glyphscan")
        .join("config.json")
}

/// Configuration for the other commands: `--config` must exist; the
/// per-user file is optional.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<GlyphConfig> {
    match config_path {
        Some(path) => GlyphConfig::from_file(Path::new(path))
            .with_context(|| format!("Cannot read configuration {}", path)),
        None => read_or_default(&default_config_path()),
    }
}

fn read_or_default(path: &Path) -> anyhow::Result<GlyphConfig> {
    if !path.exists() {
        return Ok(GlyphConfig::default());
    }
    debug!("Using configuration from {}", path.display());
    GlyphConfig::from_file(path).with_context(|| format!("Cannot read configuration {}", path.display()))
}

/// `a.b.c` to the JSON pointer `/a/b/c`.
fn pointer(key: &str) -> String {
    key.split('.').fold(String::new(), |acc, part| acc + "/" + part)
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    GlyphConfig::default().save(path)?;
    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        path.display()
    );
    Ok(())
}

fn set_config(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let parsed: Value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

    let mut json = serde_json::to_value(read_or_default(path)?)?;
    let slot = json
        .pointer_mut(&pointer(key))
        .with_context(|| format!("Configuration key not found: {}", key))?;
    *slot = parsed.clone();

    let config: GlyphConfig =
        serde_json::from_value(json).with_context(|| format!("Invalid value for {}", key))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    config.save(path)?;

    println!(
        "{} Set {} = {}",
        style("✓").green(),
        key,
        serde_json::to_string(&parsed)?
    );
    Ok(())
}
