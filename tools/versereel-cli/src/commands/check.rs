//! Check system capabilities.

use versereel_common::config::AppConfig;
use versereel_project_model::ReaderCatalog;
use versereel_render_engine::ffmpeg::command_exists;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Versereel System Check");
    println!("{}", "=".repeat(50));

    let mut ready = true;

    for (binary, required) in [("ffmpeg", true), ("ffprobe", false)] {
        if command_exists(binary) {
            println!("[OK] {binary} found");
        } else if required {
            ready = false;
            println!("[MISSING] {binary} not found on PATH (required for export)");
        } else {
            println!("[WARN] {binary} not found on PATH (export duration is not verified)");
        }
    }

    let fonts = &config.render.fonts;
    for (role, path) in [
        ("primary", &fonts.primary),
        ("label", &fonts.label),
        ("translation", &fonts.translation),
    ] {
        if path.is_file() {
            println!("[OK] Font ({role}): {}", path.display());
        } else {
            ready = false;
            println!("[MISSING] Font ({role}): {}", path.display());
        }
    }

    let readers = config.readers_path();
    match ReaderCatalog::load(&readers) {
        Ok(catalog) => println!(
            "[OK] Readers: {} in {}",
            catalog.len(),
            readers.display()
        ),
        Err(e) => {
            ready = false;
            println!("[MISSING] Readers: {e}");
        }
    }

    println!();
    if ready {
        println!("All requirements are met. Versereel is ready to export.");
    } else {
        println!("Some requirements are missing. See above for fixes.");
    }
    Ok(())
}
