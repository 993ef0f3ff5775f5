//! Configuration command
//!
//! Shows the effective configuration, where it was loaded from, and an
//! example file.

use anyhow::Result;
use owo_colors::OwoColorize;
use splitter_core::config::{self, LoadedConfig};

/// Print the effective configuration
pub fn run_show(loaded: &LoadedConfig) -> Result<()> {
    let config = &loaded.config;

    println!("{}", "Configuration".bold());
    println!("{}: {}\n", "Source".dimmed(), loaded.source.dimmed());

    println!(
        "  {} = {} {}",
        "split_key".cyan(),
        config.split_key,
        format!("({:#04x})", config.split_key).dimmed()
    );
    println!(
        "  {} = {} {}",
        "pulse_window_ms".cyan(),
        config.pulse_window_ms,
        format!("({}ms)", config.pulse_window_ms).dimmed()
    );
    println!(
        "  {} = {} {}",
        "rescan_interval_secs".cyan(),
        config.rescan_interval_secs,
        format!("({}s)", config.rescan_interval_secs).dimmed()
    );
    println!("  {} = {}", "target_file".cyan(), config.target_file);
    println!("  {} = {}", "count_creates".cyan(), config.count_creates);
    println!(
        "  {} = {}",
        "include_default_paths".cyan(),
        config.include_default_paths
    );
    println!("  {} = [", "paths".cyan());
    for path in &config.paths {
        println!("    {}", path.display());
    }
    println!("  ]");

    println!("\n{}", "[emitter]".yellow());
    println!("  {} = {}", "kind".cyan(), config.emitter.kind);
    if !config.emitter.command.is_empty() {
        println!("  {} = {}", "command".cyan(), config.emitter.command.join(" "));
    }

    println!("\n{}", "[logging]".yellow());
    println!("  {} = {}", "default".cyan(), config.logging.default);
    if let Some(file) = &config.logging.file {
        println!("  {} = {}", "file".cyan(), file.display());
    }

    if !loaded.warnings.is_empty() {
        println!("\n{}", "Warnings:".bold());
        for warning in &loaded.warnings {
            println!("  {}", warning.yellow());
        }
    }

    println!("\n{}", "Valid Ranges:".bold());
    println!("  split_key: 0-255");
    println!("  pulse_window_ms: 1-10,000");
    println!("  rescan_interval_secs: 1-3,600");

    Ok(())
}

/// Show the config file search order
pub fn run_path() -> Result<()> {
    for path in config::search_paths() {
        if path.is_file() {
            println!("{} {}", path.display(), "(found)".green());
        } else {
            println!("{} {}", path.display(), "(not found)".dimmed());
        }
    }
    Ok(())
}

/// Show example configuration
pub fn run_example() -> Result<()> {
    println!("{}", config::example_config());
    Ok(())
}
