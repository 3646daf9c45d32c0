//! Show or save the effective configuration.

use versereel_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, write: bool) -> anyhow::Result<()> {
    let path = config_file_path();
    let note = if path.exists() {
        ""
    } else {
        " (not present, using defaults)"
    };
    println!("Config file: {}{note}", path.display());
    println!("Readers:     {}", config.readers_path().display());
    println!("Timings:     {}", config.timings_dir().display());
    println!("Work dir:    {}", config.work_dir().display());
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);

    if write {
        config.save()?;
        println!();
        println!("Saved to {}", path.display());
    }
    Ok(())
}
