//! List candidate directories

use anyhow::Result;
use owo_colors::OwoColorize;
use splitter_core::{candidate_paths, SystemConfig};

/// Print every candidate directory and whether its target file exists
pub fn run(config: &SystemConfig) -> Result<()> {
    let candidates = candidate_paths(config);

    println!("{}", "Watch Candidates".bold());
    if candidates.is_empty() {
        println!("  {}", "(none; add `paths` to the config file)".dimmed());
        return Ok(());
    }

    for path in &candidates {
        let target = path.join(&config.target_file);
        if target.is_file() {
            println!("  {} {} {}", "✓".green(), path.display(), "ready".green());
        } else if path.is_dir() {
            println!(
                "  {} {} {}",
                "·".yellow(),
                path.display(),
                format!("(no {} yet)", config.target_file).dimmed()
            );
        } else {
            println!("  {} {} {}", "✗".red(), path.display(), "missing".dimmed());
        }
    }

    Ok(())
}
